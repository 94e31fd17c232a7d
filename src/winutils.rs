//! Winutils.
//!
//! This module contains the code to provide `winutils.exe`, which Hadoop needs on Windows.

use crate::download::Downloader;
use crate::error::SetupError;
use crate::vars::{SimpleVarResolver, VarExpander};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// Download location of the community builds of `winutils.exe`.
pub(crate) const WINUTILS_URL: &str = "https://github.com/cdarlint/winutils/raw/master/hadoop-${version}/winutils.exe";

// Name of the executable.
#[doc(hidden)]
const WINUTILS_EXE: &str = "winutils.exe";

/// Makes sure `<home>/bin/winutils.exe` exists, downloading it if necessary.
///
/// An existing file is taken as-is.
#[instrument(level = "trace", skip(downloader))]
pub(crate) fn ensure_winutils(downloader: &Downloader, template: &str, version: &str, home: &Path) -> Result<PathBuf, SetupError> {
    let bin = home.join("bin");
    let exe = bin.join(WINUTILS_EXE);
    if exe.exists() {
        return Ok(exe);
    }

    let mut vars = SimpleVarResolver::new();
    vars.insert("version", version.trim());
    let url = VarExpander::with_vars(vars).expand(template)?;

    warn!("{WINUTILS_EXE} is not available in {}, proceeding to download it", bin.display());
    info!(%url, dest = %bin.display(), "downloading {WINUTILS_EXE}");
    fs::create_dir_all(&bin).map_err(|err| SetupError::fs(&bin, err))?;
    downloader.download(&url, &exe)
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::testutil::TestServer;
    use std::time::Duration;
    use tempfile::tempdir;
    use test_log::test;

    fn downloader() -> Downloader {
        Downloader::new(Duration::from_secs(2)).unwrap().progress(false).retries(0)
    }

    #[test]
    fn downloads_when_missing() {
        let server = TestServer::start(&[("/hadoop-3.2.0/winutils.exe", b"MZ".to_vec())]);
        let tempdir = tempdir().unwrap();
        let home = tempdir.path().join("hadoop-3.2.0");
        let template = server.url("/hadoop-${version}/winutils.exe");

        let exe = ensure_winutils(&downloader(), &template, "3.2.0", &home).unwrap();

        assert_eq!(exe, home.join("bin").join("winutils.exe"));
        assert_eq!(fs::read(&exe).unwrap(), b"MZ");
    }

    #[test]
    fn keeps_existing() {
        let server = TestServer::start(&[("/hadoop-3.2.0/winutils.exe", b"MZ".to_vec())]);
        let tempdir = tempdir().unwrap();
        let home = tempdir.path().join("hadoop-3.2.0");
        fs::create_dir_all(home.join("bin")).unwrap();
        fs::write(home.join("bin").join("winutils.exe"), b"local").unwrap();
        let template = server.url("/hadoop-${version}/winutils.exe");

        let exe = ensure_winutils(&downloader(), &template, "3.2.0", &home).unwrap();

        assert_eq!(fs::read(&exe).unwrap(), b"local");
        assert_eq!(server.hits("/hadoop-3.2.0/winutils.exe"), 0);
    }
}
