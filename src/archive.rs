//! Archive.
//!
//! This module contains the code to unpack a downloaded (gzip compressed) tar archive.

use crate::error::SetupError;
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use tar::Archive;
use tracing::{debug, instrument, trace, warn};

// Supported archive extensions (gzip compressed first).
#[doc(hidden)]
const GZ_EXTS: [&str; 2] = [".tar.gz", ".tgz"];

// Extension of an uncompressed archive.
#[doc(hidden)]
const TAR_EXT: &str = ".tar";

// Leading bytes of gzip compressed data.
#[doc(hidden)]
const GZ_MAGIC: [u8; 2] = [0x1f, 0x8b];

// Prefix for the staging directory.
#[doc(hidden)]
const STAGING_PREFIX: &str = ".unpack-";

/// Returns the archive name without its extension or `None` for unsupported archives.
pub(crate) fn stem(name: &str) -> Option<&str> {
    GZ_EXTS
        .iter()
        .chain(std::iter::once(&TAR_EXT))
        .find_map(|ext| name.strip_suffix(ext))
        .filter(|stem| !stem.is_empty())
}

/// Unpacks the given archive into the target directory and deletes the archive afterwards.
///
/// Failing to delete the archive is not an error.
#[instrument(level = "trace")]
pub(crate) fn unpack(archive: &Path, target: &Path) -> Result<(), SetupError> {
    extract(archive, target).map_err(|source| SetupError::Extraction {
        path: archive.to_path_buf(),
        source,
    })?;

    if let Err(err) = fs::remove_file(archive) {
        warn!(?err, archive = %archive.display(), "unable to delete the downloaded archive, please delete it manually");
    }

    Ok(())
}

// Extracts into a staging directory first and moves the top-level entries into place once everything is unpacked.
#[doc(hidden)]
fn extract(archive: &Path, target: &Path) -> io::Result<()> {
    fs::create_dir_all(target)?;
    let staging = tempfile::Builder::new().prefix(STAGING_PREFIX).tempdir_in(target)?;
    trace!(staging = %staging.path().display());

    // unpack to staging directory
    let mut tar = Archive::new(reader(archive)?);
    let mut count = 0usize;
    for entry in tar.entries()? {
        let mut entry = entry?;

        // skip entry with dangerous name
        if !entry.unpack_in(staging.path())? {
            let path_bytes = entry.path_bytes();
            let name = String::from_utf8_lossy(&path_bytes);
            warn!(name = %name, "skipping dangerous name");
            continue;
        }
        count += 1;
    }
    debug!(count, "entries unpacked");

    // move into place
    for entry in fs::read_dir(staging.path())? {
        let entry = entry?;

        let from = entry.path();
        let to = target.join(entry.file_name());
        if to.exists() {
            warn!(path = %to.display(), "skipping already existing entry");
            continue;
        }

        trace!("moving {from:?} to {to:?}");
        fs::rename(from, to)?;
    }

    // cleanup staging directory
    if let Err(err) = staging.close() {
        warn!(?err, "failed to delete staging directory");
    }

    Ok(())
}

// Opens the archive and adds decompression if the content is gzip compressed.
#[doc(hidden)]
fn reader(archive: &Path) -> io::Result<Box<dyn Read>> {
    let mut file = BufReader::new(File::open(archive)?);
    let gzip = file.fill_buf()?.starts_with(&GZ_MAGIC);
    trace!(gzip);
    if gzip { Ok(Box::new(GzDecoder::new(file))) } else { Ok(Box::new(file)) }
}
