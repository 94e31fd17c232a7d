//! Test utilities.
//!
//! In-memory archives and a tiny HTTP/1.1 server on the loopback interface, so that no test needs the internet.

use flate2::Compression;
use flate2::write::GzEncoder;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

// How long a stalled or muted connection is held open.
const HOLD: Duration = Duration::from_secs(10);

/// Builds an uncompressed tar archive with the given files.
pub(crate) fn tar(files: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder.append_data(&mut header, path, content.as_bytes()).unwrap();
    }
    builder.into_inner().unwrap()
}

/// Builds a gzip compressed tar archive with the given files.
pub(crate) fn tar_gz(files: &[(&str, &str)]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(&tar(files)).unwrap();
    encoder.finish().unwrap()
}

// A route served by the [TestServer].
#[derive(Clone)]
struct Route {
    body: Vec<u8>,
    content_length: bool,
    stall: bool,
}

impl Route {
    fn new(body: &[u8]) -> Self {
        Self {
            body: body.to_vec(),
            content_length: true,
            stall: false,
        }
    }
}

/// A minimal HTTP server answering `GET` requests from a fixed set of routes.
pub(crate) struct TestServer {
    addr: SocketAddr,
    hits: Arc<Mutex<HashMap<String, usize>>>,
}

impl TestServer {
    /// Starts a server that answers the given routes and `404` for everything else.
    pub(crate) fn start(routes: &[(&str, Vec<u8>)]) -> Self {
        Self::start_with(routes, |_| {}, 0)
    }

    /// Starts a server that answers the given routes without a `Content-Length` header.
    pub(crate) fn start_unsized(routes: &[(&str, Vec<u8>)]) -> Self {
        Self::start_with(routes, |route| route.content_length = false, 0)
    }

    /// Starts a server that sends the headers and half of the body, then stops sending.
    pub(crate) fn start_stalling(routes: &[(&str, Vec<u8>)]) -> Self {
        Self::start_with(routes, |route| route.stall = true, 0)
    }

    /// Starts a server that reads but never answers the first `muted` requests.
    pub(crate) fn start_muted(muted: usize, routes: &[(&str, Vec<u8>)]) -> Self {
        Self::start_with(routes, |_| {}, muted)
    }

    fn start_with(routes: &[(&str, Vec<u8>)], customize: impl Fn(&mut Route), muted: usize) -> Self {
        let routes: HashMap<String, Route> = routes
            .iter()
            .map(|(path, body)| {
                let mut route = Route::new(body);
                customize(&mut route);
                (path.to_string(), route)
            })
            .collect();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(Mutex::new(HashMap::new()));
        let server_hits = hits.clone();
        thread::spawn(move || {
            for (i, stream) in listener.incoming().enumerate() {
                let Ok(stream) = stream else {
                    continue;
                };
                let routes = routes.clone();
                let hits = server_hits.clone();
                let mute = i < muted;
                thread::spawn(move || serve(stream, &routes, &hits, mute));
            }
        });

        Self { addr, hits }
    }

    /// Returns the URL for the given path.
    pub(crate) fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Returns how often the given path has been requested.
    pub(crate) fn hits(&self, path: &str) -> usize {
        self.hits.lock().unwrap().get(path).copied().unwrap_or_default()
    }
}

// Answers a single request and closes the connection.
fn serve(stream: TcpStream, routes: &HashMap<String, Route>, hits: &Mutex<HashMap<String, usize>>, mute: bool) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 || line == "\r\n" || line == "\n" {
            break;
        }
    }

    let path = request_line.split_whitespace().nth(1).unwrap_or("/").to_string();
    *hits.lock().unwrap().entry(path.clone()).or_default() += 1;

    let mut stream = stream;
    if mute {
        thread::sleep(HOLD);
        return Ok(());
    }
    match routes.get(&path) {
        Some(route) => {
            let mut head = String::from("HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nConnection: close\r\n");
            if route.content_length {
                head.push_str(&format!("Content-Length: {}\r\n", route.body.len()));
            }
            head.push_str("\r\n");
            stream.write_all(head.as_bytes())?;
            if route.stall {
                stream.write_all(&route.body[..route.body.len() / 2])?;
                stream.flush()?;
                thread::sleep(HOLD);
                return Ok(());
            }
            stream.write_all(&route.body)?;
        }
        None => {
            stream.write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 9\r\nConnection: close\r\n\r\nnot found")?;
        }
    }
    stream.flush()
}
