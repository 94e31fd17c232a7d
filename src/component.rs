//! Component.
//!
//! This module contains the installable components and how their download locations are derived.

use crate::archive;
use crate::error::SetupError;
use crate::vars::{SimpleVarResolver, VarExpander};
use std::fmt;

// The id for Spark as component.
#[doc(hidden)]
const SPARK_ID: &str = "spark";

// The name for Spark as component.
#[doc(hidden)]
const SPARK_NAME: &str = "Spark";

// The id for Hadoop as component.
#[doc(hidden)]
const HADOOP_ID: &str = "hadoop";

// The name for Hadoop as component.
#[doc(hidden)]
const HADOOP_NAME: &str = "Hadoop";

/// Default download location for Spark.
pub(crate) const SPARK_URL: &str = "https://archive.apache.org/dist/spark/spark-${version}/spark-${version}-bin-hadoop${profile}.tgz";

/// Default download location for Hadoop.
pub(crate) const HADOOP_URL: &str = "https://archive.apache.org/dist/hadoop/common/hadoop-${version}/hadoop-${version}.tar.gz";

/// Enumeration of installable components.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Component {
    /// Apache Spark
    Spark,
    /// Apache Hadoop
    Hadoop,
}

impl Component {
    /// Returns the id of the component.
    pub(crate) fn id(&self) -> &'static str {
        match self {
            Self::Spark => SPARK_ID,
            Self::Hadoop => HADOOP_ID,
        }
    }

    /// Returns the name of the component.
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Spark => SPARK_NAME,
            Self::Hadoop => HADOOP_NAME,
        }
    }

    /// Returns the name of the environment variable that points to the home directory.
    pub(crate) fn home_var(&self) -> &'static str {
        match self {
            Self::Spark => "SPARK_HOME",
            Self::Hadoop => "HADOOP_HOME",
        }
    }

    /// Returns the default download URL template.
    pub(crate) fn default_url(&self) -> &'static str {
        match self {
            Self::Spark => SPARK_URL,
            Self::Hadoop => HADOOP_URL,
        }
    }

    /// Returns additional environment variables the component needs besides its home.
    pub(crate) fn extra_vars(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Spark => &[],
            Self::Hadoop => &[("HADOOP_USER_CLASSPATH_FIRST", "true")],
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Derives the Hadoop profile (`major.minor`) Spark distributions are built against.
///
/// The profile is only a naming convention of the Spark archives. Versions that don't follow
/// `major.minor[.patch]` need an explicit profile.
pub(crate) fn hadoop_profile(hadoop_version: &str) -> Result<String, SetupError> {
    let hadoop_version = hadoop_version.trim();
    if let Ok(version) = semver::Version::parse(hadoop_version) {
        return Ok(format!("{}.{}", version.major, version.minor));
    }

    let mut parts = hadoop_version.split('.');
    match (parts.next(), parts.next()) {
        (Some(major), Some(minor)) if !major.is_empty() && !minor.is_empty() => Ok(format!("{major}.{minor}")),
        _ => Err(SetupError::InvalidVersion(hadoop_version.to_string())),
    }
}

/// Where to fetch an archive from and what it unpacks to.
#[derive(Debug, Eq, PartialEq)]
pub(crate) struct Layout {
    /// The download URL.
    pub(crate) url: String,
    /// The file name of the archive.
    pub(crate) archive: String,
    /// The name of the top-level directory within the archive.
    pub(crate) dir: String,
}

impl Layout {
    /// Derives the layout from the given URL template.
    pub(crate) fn resolve(template: &str, version: &str, profile: Option<&str>) -> Result<Self, SetupError> {
        let version = version.trim();
        if version.is_empty() {
            return Err(SetupError::InvalidVersion(version.to_string()));
        }

        let mut vars = SimpleVarResolver::new();
        vars.insert("version", version);
        if let Some(profile) = profile {
            vars.insert("profile", profile);
        }
        let url = VarExpander::with_vars(vars).expand(template)?.into_owned();

        let archive = url //
            .rsplit('/')
            .next()
            .map(|name| name.split(['?', '#']).next().unwrap_or(name))
            .filter(|name| !name.is_empty())
            .ok_or_else(|| SetupError::InvalidUrl(url.clone()))?
            .to_string();
        let dir = archive::stem(&archive).ok_or_else(|| SetupError::InvalidUrl(url.clone()))?.to_string();

        Ok(Self { url, archive, dir })
    }
}
