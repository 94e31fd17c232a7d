//! Download.
//!
//! This module contains the code to stream a remote resource to a local file with retries on connection failures.

use crate::checksum::ChecksumWrite;
use crate::error::SetupError;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::{Client, Response};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, trace, warn};

/// Default number of bytes read and written at once.
pub(crate) const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Default timeout for establishing a connection and for each read.
pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default number of retries on connection failures.
pub(crate) const DEFAULT_RETRIES: u32 = 5;

// Base delay between two attempts (grows linearly with each attempt).
#[doc(hidden)]
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

// Some mirrors reject the default user agent of http clients.
#[doc(hidden)]
const USER_AGENT: &str = "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:71.0) Gecko/20100101 Firefox/71.0";

// Layout of the progress bar.
#[doc(hidden)]
const PB_STYLE: &str = "{prefix:>12.cyan.bold} [{elapsed_precise}] {wide_bar:.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";

/// Downloads remote resources over one pooled connection.
#[derive(Debug)]
pub(crate) struct Downloader {
    client: Client,
    chunk_size: usize,
    progress: bool,
    retries: u32,
    retry_delay: Duration,
}

impl Downloader {
    /// Creates a new `Downloader` with the given timeout for establishing connections and for each read.
    ///
    /// The timeout does not limit the whole transfer, a body that keeps arriving is streamed to the end.
    pub(crate) fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder() //
            .user_agent(USER_AGENT)
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            chunk_size: DEFAULT_CHUNK_SIZE,
            progress: true,
            retries: DEFAULT_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
        })
    }

    /// Whether to show a progress bar while downloading.
    pub(crate) fn progress(mut self, progress: bool) -> Self {
        self.progress = progress;

        self
    }

    /// How often to retry on connection failures.
    pub(crate) fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;

        self
    }

    /// The base delay between two attempts.
    #[cfg(test)]
    pub(crate) fn retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;

        self
    }

    /// How many bytes to read and write at once.
    #[cfg(test)]
    pub(crate) fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);

        self
    }

    /// Downloads the given URL to the given destination and returns the destination.
    ///
    /// The destination only appears once the whole body was received.
    pub(crate) fn download(&self, url: &str, dest: &Path) -> Result<PathBuf, SetupError> {
        self.download_checked(url, dest, None)
    }

    /// Like [`Downloader::download`], but the SHA512 digest of the body must match the expected one.
    pub(crate) fn download_verified(&self, url: &str, dest: &Path, expected: &str) -> Result<PathBuf, SetupError> {
        self.download_checked(url, dest, Some(expected))
    }

    /// Fetches a (small) text resource.
    #[instrument(level = "trace", skip(self))]
    pub(crate) fn fetch_text(&self, url: &str) -> Result<String, SetupError> {
        let response = self.send(url)?;
        response.text().map_err(|err| SetupError::net(url, err))
    }

    // Downloads and verifies (if requested) the given URL.
    #[instrument(level = "trace", skip(self))]
    fn download_checked(&self, url: &str, dest: &Path, expected: Option<&str>) -> Result<PathBuf, SetupError> {
        let result = self.send(url).and_then(|response| self.write(url, response, dest, expected));
        if let Err(SetupError::Network { source, .. }) = &result {
            if source.is_connect() || source.is_timeout() {
                self.log_recovery(url, dest);
            }
        }

        result
    }

    // Sends the request, retrying on connection failures.
    #[doc(hidden)]
    fn send(&self, url: &str) -> Result<Response, SetupError> {
        let mut attempt = 0;
        loop {
            match self.client.get(url).send() {
                Ok(response) => {
                    trace!(status = %response.status(), headers = ?response.headers());
                    return response.error_for_status().map_err(|err| SetupError::net(url, err));
                }
                Err(err) if (err.is_connect() || err.is_timeout()) && attempt < self.retries => {
                    attempt += 1;
                    debug!(?err, attempt, retries = self.retries, "connection failed, retrying");
                    thread::sleep(self.retry_delay * attempt);
                }
                Err(err) => return Err(SetupError::net(url, err)),
            }
        }
    }

    // Streams the body into a temporary file next to the destination and moves it into place.
    #[doc(hidden)]
    fn write(&self, url: &str, mut response: Response, dest: &Path, expected: Option<&str>) -> Result<PathBuf, SetupError> {
        info!(dest = %dest.display(), "writing downloaded data");
        let dir = match dest.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let tmp = NamedTempFile::new_in(dir).map_err(|err| SetupError::fs(dir, err))?;
        trace!(tmp = %tmp.path().display());

        let pb = self.progress_bar(response.content_length(), dest);
        let mut write = ChecksumWrite::new(tmp);
        let mut buf = vec![0u8; self.chunk_size];
        let mut nbytes = 0u64;
        loop {
            let n = response.read(&mut buf).map_err(|err| SetupError::Transfer {
                url: url.to_string(),
                source: err,
            })?;
            if n == 0 {
                break;
            }
            write.write_all(&buf[..n]).map_err(|err| SetupError::fs(dest, err))?;
            nbytes += n as u64;
            pb.inc(n as u64);
        }
        pb.finish_and_clear();
        trace!(nbytes);

        let (checksum, tmp) = write.finish().map_err(|err| SetupError::fs(dest, err))?;
        trace!(checksum);
        if let Some(expected) = expected {
            if !expected.eq_ignore_ascii_case(&checksum) {
                return Err(SetupError::ChecksumMismatch {
                    url: url.to_string(),
                    expected: expected.to_lowercase(),
                    actual: checksum,
                });
            }
        }

        tmp.persist(dest).map_err(|err| SetupError::fs(dest, err.error))?;
        info!(url, nbytes, "download complete");

        Ok(dest.to_path_buf())
    }

    // Creates a progress bar, hidden if the size is unknown or progress is disabled.
    #[doc(hidden)]
    fn progress_bar(&self, len: Option<u64>, dest: &Path) -> ProgressBar {
        let Some(len) = len.filter(|_| self.progress) else {
            return ProgressBar::hidden();
        };

        let pb = ProgressBar::new(len);
        if let Ok(style) = ProgressStyle::with_template(PB_STYLE) {
            pb.set_style(style);
        }
        if let Some(name) = dest.file_name() {
            pb.set_prefix(name.to_string_lossy().into_owned());
        }

        pb
    }

    // Tells the user how to fetch the archive by hand.
    #[doc(hidden)]
    fn log_recovery(&self, url: &str, dest: &Path) {
        let dir = dest.parent().map_or_else(|| ".".into(), |dir| dir.display().to_string());
        let filename = dest.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default();
        warn!(
            "\n Download of {url} has failed after {} retries\n \
             Fix the download manually:\n\
             $ mkdir -p {dir}\n\
             $ cd {dir}\n\
             $ wget -c {url}\n\
             $ tar xf {filename}\n \
             And re-run once the download is successful\n",
            self.retries
        );
    }
}
