//! Version.
//!
//! This module contains the build information embedded by the build script.

use std::fmt;

/// The build information of this program.
#[derive(Debug)]
pub(crate) struct Version {
    /// The name of the package.
    pub(crate) pkg_name: &'static str,
    /// The version of the package.
    pub(crate) pkg_version: &'static str,
    /// The value that `git describe` returned.
    pub(crate) git_describe: &'static str,
    /// The date of the build.
    pub(crate) build_date: &'static str,
    /// The version of the rust compiler.
    pub(crate) rustc_semver: &'static str,
}

impl Default for Version {
    fn default() -> Self {
        Self {
            pkg_name: env!("CARGO_PKG_NAME"),
            pkg_version: env!("CARGO_PKG_VERSION"),
            git_describe: env!("VERGEN_GIT_DESCRIBE"),
            build_date: env!("VERGEN_BUILD_DATE"),
            rustc_semver: env!("VERGEN_RUSTC_SEMVER"),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            pkg_name,
            pkg_version,
            git_describe,
            build_date,
            rustc_semver,
        } = self;
        write!(f, "{pkg_name} {pkg_version} (git/{git_describe}) (built/{build_date}) (rustc/{rustc_semver})")
    }
}
