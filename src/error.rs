//! Errors.
//!
//! This module contains the error type shared by the download, unpack and install steps.

use crate::vars::VarError;
use std::io;
use std::path::PathBuf;

/// The kind of a [`SetupError`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum ErrorKind {
    /// A prerequisite (Java) is missing.
    Prerequisite,
    /// Creating, writing or deleting files failed.
    Filesystem,
    /// The remote resource could not be retrieved.
    Network,
    /// The archive could not be unpacked.
    Extraction,
    /// The downloaded data does not match its published digest.
    Integrity,
    /// The given versions, paths or templates are unusable.
    Input,
}

/// The error type for setting up an installation.
#[derive(Debug, thiserror::Error)]
pub(crate) enum SetupError {
    /// A required prerequisite is not available.
    #[error("{0} is not set")]
    PrerequisiteMissing(String),
    /// A filesystem operation failed.
    #[error("filesystem operation failed at '{}'", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// A request failed (connection, timeout or non-success status).
    #[error("failed to download '{url}'")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// The connection broke while receiving the body.
    #[error("failed to receive '{url}'")]
    Transfer {
        url: String,
        #[source]
        source: io::Error,
    },
    /// The archive could not be unpacked.
    #[error("failed to unpack '{}'", path.display())]
    Extraction {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The downloaded data does not match its published digest.
    #[error("checksum mismatch for '{url}' (expected: {expected}, got: {actual})")]
    ChecksumMismatch { url: String, expected: String, actual: String },
    /// A published digest could not be understood.
    #[error("no usable digest found at '{0}'")]
    MissingDigest(String),
    /// A version is not usable.
    #[error("invalid version '{0}'")]
    InvalidVersion(String),
    /// A URL template does not yield a usable archive name.
    #[error("unable to derive an archive name from '{0}'")]
    InvalidUrl(String),
    /// A template or path referenced an unknown variable.
    #[error(transparent)]
    Var(#[from] VarError),
}

impl SetupError {
    /// Returns the kind of this error.
    pub(crate) fn kind(&self) -> ErrorKind {
        match self {
            Self::PrerequisiteMissing(_) => ErrorKind::Prerequisite,
            Self::Filesystem { .. } => ErrorKind::Filesystem,
            Self::Network { .. } | Self::Transfer { .. } => ErrorKind::Network,
            Self::Extraction { .. } => ErrorKind::Extraction,
            Self::ChecksumMismatch { .. } | Self::MissingDigest(_) => ErrorKind::Integrity,
            Self::InvalidVersion(_) | Self::InvalidUrl(_) | Self::Var(_) => ErrorKind::Input,
        }
    }

    /// Creates a [`SetupError::Filesystem`] for the given path.
    pub(crate) fn fs(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Filesystem { path: path.into(), source }
    }

    /// Creates a [`SetupError::Network`] for the given url.
    pub(crate) fn net(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network { url: url.into(), source }
    }
}
