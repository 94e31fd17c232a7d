//! Install.
//!
//! This module contains the idempotent fetch-and-install routine shared by all components.

use crate::archive;
use crate::checksum::{self, DIGEST_EXT};
use crate::component::{Component, Layout};
use crate::download::Downloader;
use crate::env::Environment;
use crate::error::SetupError;
use crate::platform::Platform;
use crate::util::select;
use crate::winutils;
use std::fs;
use std::path::PathBuf;
use tracing::{error, info, instrument, trace, warn};

/// Everything needed to install one component.
#[derive(Clone, Debug)]
pub(crate) struct InstallRequest {
    /// The component to install.
    pub(crate) component: Component,
    /// The version to install.
    pub(crate) version: String,
    /// The profile (companion version) the archive name depends on, if any.
    pub(crate) profile: Option<String>,
    /// The directory the archive gets unpacked into.
    pub(crate) install_dir: PathBuf,
    /// The download URL template.
    pub(crate) url: String,
    /// A home directory set up beforehand (e.g. from `SPARK_HOME`), taken as-is.
    pub(crate) home: Option<PathBuf>,
    /// The platform family to install for.
    pub(crate) platform: Platform,
    /// Whether to verify the archive against the published digest.
    pub(crate) verify: bool,
}

impl InstallRequest {
    /// Creates a new `InstallRequest` with the default download location.
    pub(crate) fn new(component: Component, version: impl Into<String>, install_dir: impl Into<PathBuf>) -> Self {
        Self {
            component,
            version: version.into(),
            profile: None,
            install_dir: install_dir.into(),
            url: component.default_url().to_string(),
            home: None,
            platform: Platform::current(),
            verify: false,
        }
    }
}

/// The outcome of an installation.
#[derive(Debug)]
pub(crate) struct Installation {
    /// The installed component.
    pub(crate) component: Component,
    /// The home directory of the installation.
    pub(crate) home: PathBuf,
    /// Whether the installation was materialised by this run.
    pub(crate) fresh: bool,
    /// The environment the installation asks for.
    pub(crate) env: Environment,
}

/// Installs components with the help of a [Downloader].
#[derive(Debug)]
pub(crate) struct Installer {
    downloader: Downloader,
    dry_run: bool,
    winutils_url: String,
}

impl Installer {
    /// Creates a new `Installer`.
    pub(crate) fn new(downloader: Downloader) -> Self {
        Self {
            downloader,
            dry_run: false,
            winutils_url: winutils::WINUTILS_URL.to_string(),
        }
    }

    /// Whether to perform the installation or not.
    pub(crate) fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;

        self
    }

    /// The download location of `winutils.exe`.
    pub(crate) fn winutils_url(mut self, winutils_url: impl Into<String>) -> Self {
        self.winutils_url = winutils_url.into();

        self
    }

    /// Installs the requested component unless it already exists and returns where it lives.
    pub(crate) fn install(&self, request: &InstallRequest) -> Result<Installation, SetupError> {
        self._install(request).inspect_err(|err| {
            error!(component = request.component.id(), %err, "installation failed");
        })
    }

    // Installs the requested component internally.
    #[instrument(level = "trace", skip(self))]
    fn _install(&self, request: &InstallRequest) -> Result<Installation, SetupError> {
        let component = request.component;
        let layout = Layout::resolve(&request.url, &request.version, request.profile.as_deref())?;
        let home = select(request.home.is_none(), request.install_dir.join(&layout.dir), request.home.clone().unwrap_or_default());
        info!("using {} as {}", home.display(), component.home_var());

        if self.dry_run {
            info!(url = layout.url, "dry-run: not downloading");
        } else if !request.install_dir.is_dir() {
            fs::create_dir_all(&request.install_dir).map_err(|err| SetupError::fs(&request.install_dir, err))?;
        }

        let fresh = !home.exists();
        if !fresh {
            warn!("the {component} installation already exists at {}, skipping installation", home.display());
        } else if !self.dry_run {
            warn!(url = layout.url, "downloading {component}");
            info!("downloading and installing {component} to {}", home.display());
            let archive = request.install_dir.join(&layout.archive);
            let digest = if request.verify { Some(self.digest(&layout.url)?) } else { None };
            if archive.exists() {
                info!(archive = %archive.display(), "using previously downloaded archive");
                if let Some(expected) = digest {
                    let actual = checksum::checksum(&archive).map_err(|err| SetupError::fs(&archive, err))?;
                    if !expected.eq_ignore_ascii_case(&actual) {
                        return Err(SetupError::ChecksumMismatch { url: layout.url, expected, actual });
                    }
                }
            } else if let Some(expected) = digest {
                self.downloader.download_verified(&layout.url, &archive, &expected)?;
            } else {
                self.downloader.download(&layout.url, &archive)?;
            }
            archive::unpack(&archive, &request.install_dir)?;
        }

        if component == Component::Hadoop && request.platform == Platform::Windows && !self.dry_run {
            winutils::ensure_winutils(&self.downloader, &self.winutils_url, &request.version, &home)?;
        }

        let mut env = Environment::new();
        env.set(component.home_var(), home.as_os_str());
        for (key, val) in component.extra_vars() {
            env.set(*key, *val);
        }
        env.push_path(home.join("bin")).push_path(home.join("sbin"));

        Ok(Installation { component, home, fresh, env })
    }

    // Fetches the digest published next to the archive.
    #[doc(hidden)]
    fn digest(&self, url: &str) -> Result<String, SetupError> {
        let digest_url = format!("{url}.{DIGEST_EXT}");
        let digest = self.downloader.fetch_text(&digest_url)?;
        let digest = checksum::parse_digest(&digest).ok_or(SetupError::MissingDigest(digest_url))?;
        trace!(digest);

        Ok(digest)
    }
}
