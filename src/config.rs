//! Configuration.
//!
//! This module contains the configuration read from a YAML file.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::fs;
use std::marker::PhantomData;
use std::path::Path;
use tracing::instrument;

/// Name of the default configuration file.
pub(crate) const CONFIG_FILENAME: &str = "setup-spark.yml";

/// The struct that holds the configuration loaded from a YAML file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Config {
    /// Path of the Java installation.
    #[serde(default, rename = "java-home")]
    pub(crate) java_home: Option<String>,
    /// Python interpreter for the Spark driver.
    #[serde(default)]
    pub(crate) python: Option<String>,
    /// Whether to verify the downloaded archives.
    #[serde(default)]
    pub(crate) verify: Option<bool>,
    /// Download location template of `winutils.exe` (Windows only).
    #[serde(default, rename = "winutils-url")]
    pub(crate) winutils_url: Option<String>,
    /// The Spark installation.
    #[serde(default)]
    pub(crate) spark: ComponentConfig,
    /// The Hadoop installation.
    #[serde(default)]
    pub(crate) hadoop: ComponentConfig,
}

impl Config {
    /// Loads the configuration from the given filename.
    #[instrument(err, level = "trace")]
    pub(crate) fn load_from_file<P>(filename: P) -> anyhow::Result<Self>
    where
        P: AsRef<Path> + std::fmt::Debug,
    {
        let content = fs::read_to_string(filename)?;

        // an empty file (or one with comments only) is an empty configuration
        let value: serde_yaml::Value = if content.trim().is_empty() { serde_yaml::Value::Null } else { serde_yaml::from_str(&content)? };
        if value.is_null() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_value(value)?;

        Ok(config)
    }
}

/// The configuration for a component.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ComponentConfig {
    /// Whether to install the component (only honoured for Hadoop, Spark is always installed).
    #[serde(default)]
    pub(crate) enabled: Option<bool>,
    /// The directory to install into.
    #[serde(default)]
    pub(crate) path: Option<String>,
    /// The Hadoop profile of the Spark distribution.
    #[serde(default, deserialize_with = "version_deser")]
    pub(crate) profile: Option<String>,
    /// The download URL template.
    #[serde(default)]
    pub(crate) url: Option<String>,
    /// The version to install (3.1.2, "3.2.0", etc.)
    #[serde(default, deserialize_with = "version_deser")]
    pub(crate) version: Option<String>,
}

// Deserializes a version from either unsigned integer, float or string.
// see https://serde.rs/string-or-struct.html
#[doc(hidden)]
fn version_deser<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct VersionLike(PhantomData<fn() -> Option<String>>);

    impl<'de> Visitor<'de> for VersionLike {
        type Value = Option<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("unsigned integer, float or string")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(VersionLike(PhantomData))
}
