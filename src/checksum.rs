//! Checksum.
//!
//! This module contains code to create a checksum (SHA512) "on the fly" while writing data
//! and to read the digests published next to the Apache archives.

use sha2::{Digest, Sha512};
use std::fs::File;
use std::io::{self, Result as IoResult, Write};
use std::path::Path;

/// Extension of the digest file published next to an archive.
pub(crate) const DIGEST_EXT: &str = "sha512";

// Number of hex digits of a SHA512 digest.
#[doc(hidden)]
const DIGEST_LEN: usize = 128;

// Calculates the checksum (SHA512) for the given file.
pub(crate) fn checksum(path: &Path) -> IoResult<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha512::new();
    io::copy(&mut file, &mut hasher)?;
    let hash = hasher.finalize();
    let checksum = base16ct::lower::encode_string(&hash);

    Ok(checksum)
}

/// Extracts the SHA512 digest from the content of a `.sha512` file.
///
/// Apache used several layouts over the years:
///
/// ```text
/// 0a1b...  hadoop-3.3.1.tar.gz
/// SHA512 (hadoop-3.2.0.tar.gz) = 0a1b...
/// spark-2.4.7-bin-hadoop2.7.tgz: 0A1B2C3D 4E5F6071 ...
///                                8293A4B5 ...
/// ```
pub(crate) fn parse_digest(text: &str) -> Option<String> {
    let text = text.trim();
    let candidate = if let Some((_, hash)) = text.rsplit_once('=') {
        hash
    } else if let Some((_, hash)) = text.split_once(": ") {
        hash
    } else {
        text.split_whitespace().next()?
    };

    let digest: String = candidate //
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_lowercase())
        .collect();

    if digest.len() == DIGEST_LEN && digest.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(digest)
    } else {
        None
    }
}

/// The struct to create the checksum (SHA512) "on the fly".
pub(crate) struct ChecksumWrite<W> {
    hasher: Sha512,
    write: W,
}

impl<W: Write> ChecksumWrite<W> {
    /// Creates a new `ChecksumWrite` on top of the given [Write].
    pub(crate) fn new(write: W) -> Self {
        Self { hasher: Sha512::new(), write }
    }

    /// Returns the checksum and the inner [Write], consuming the `ChecksumWrite`.
    pub(crate) fn finish(mut self) -> IoResult<(String, W)> {
        self.flush()?;
        let hash = self.hasher.finalize();
        let checksum = base16ct::lower::encode_string(&hash);

        Ok((checksum, self.write))
    }
}

impl<W: Write> Write for ChecksumWrite<W> {
    fn write(&mut self, buf: &[u8]) -> IoResult<usize> {
        let n = self.write.write(buf)?;
        self.hasher.update(&buf[..n]);

        Ok(n)
    }

    fn flush(&mut self) -> IoResult<()> {
        self.write.flush()
    }
}
