//! Setup.
//!
//! This module resolves the settings from arguments, configuration and environment and drives the
//! installation of Hadoop and Spark.

use crate::args::Args;
use crate::component::{self, Component};
use crate::config::{ComponentConfig, Config};
use crate::env::Environment;
use crate::error::SetupError;
use crate::install::{InstallRequest, Installation, Installer};
use crate::platform::Platform;
use crate::vars::VarExpander;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Default version of Spark.
pub(crate) const DEFAULT_SPARK_VERSION: &str = "3.1.2";

/// Default version of Hadoop.
pub(crate) const DEFAULT_HADOOP_VERSION: &str = "3.2.0";

/// Default directory to install Spark into.
pub(crate) const DEFAULT_SPARK_PATH: &str = "resources/spark";

/// Default directory to install Hadoop into.
pub(crate) const DEFAULT_HADOOP_PATH: &str = "resources/hadoop";

// Name of the variable pointing to the Java installation.
#[doc(hidden)]
const JAVA_HOME_VAR: &str = "JAVA_HOME";

// Name of the variable naming the Python interpreter of the Spark driver.
#[doc(hidden)]
const PYSPARK_PYTHON_VAR: &str = "PYSPARK_DRIVER_PYTHON";

// Interpreters looked up on the search path if none is given.
#[doc(hidden)]
const PYTHON_CANDIDATES: &[&str] = &["python3", "python"];

/// Resolved settings of one component.
#[derive(Clone, Debug)]
pub(crate) struct ComponentSettings {
    /// The version to install.
    pub(crate) version: String,
    /// The directory to install into.
    pub(crate) path: PathBuf,
    /// The download URL template.
    pub(crate) url: String,
    /// A home directory set up beforehand.
    pub(crate) home: Option<PathBuf>,
}

impl ComponentSettings {
    // Resolves the settings of the given component.
    #[doc(hidden)]
    fn resolve<F>(component: Component, cli: ComponentCli<'_>, config: &ComponentConfig, basedir: &Path, lookup: &F) -> Result<Self, SetupError>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let expander = VarExpander::default();

        let version = cli.version.or(config.version.as_deref());
        let version = version.unwrap_or(select_default(component, DEFAULT_SPARK_VERSION, DEFAULT_HADOOP_VERSION));
        let version = version.trim().to_string();

        // command line paths are relative to the working directory, configured ones to the config file
        let path = match (cli.path, config.path.as_deref()) {
            (Some(path), _) => PathBuf::from(expander.expand(path)?.into_owned()),
            (None, Some(path)) => basedir.join(expander.expand(path)?.into_owned()),
            (None, None) => PathBuf::from(select_default(component, DEFAULT_SPARK_PATH, DEFAULT_HADOOP_PATH)),
        };

        let url = config.url.clone().unwrap_or_else(|| component.default_url().to_string());

        let home = lookup(component.home_var()).filter(|home| !home.is_empty()).map(PathBuf::from);

        Ok(Self { version, path, url, home })
    }

    // Builds the request to install the component.
    #[doc(hidden)]
    fn request(&self, component: Component, profile: Option<String>, settings: &Settings) -> InstallRequest {
        InstallRequest {
            component,
            version: self.version.clone(),
            profile,
            install_dir: self.path.clone(),
            url: self.url.clone(),
            home: self.home.clone(),
            platform: settings.platform,
            verify: settings.verify,
        }
    }
}

// Command line values of one component.
#[doc(hidden)]
#[derive(Clone, Copy)]
struct ComponentCli<'a> {
    version: Option<&'a str>,
    path: Option<&'a str>,
}

// Picks the Spark or Hadoop flavour of a default.
#[doc(hidden)]
fn select_default(component: Component, spark: &'static str, hadoop: &'static str) -> &'static str {
    match component {
        Component::Spark => spark,
        Component::Hadoop => hadoop,
    }
}

/// The resolved settings.
#[derive(Clone, Debug)]
pub(crate) struct Settings {
    /// The Java installation.
    pub(crate) java_home: Option<PathBuf>,
    /// Whether `JAVA_HOME` has to be passed on (it didn't come from the environment).
    pub(crate) export_java_home: bool,
    /// The Spark settings.
    pub(crate) spark: ComponentSettings,
    /// The Hadoop settings.
    pub(crate) hadoop: ComponentSettings,
    /// Whether to install Hadoop as well.
    pub(crate) install_hadoop: bool,
    /// The Hadoop profile of the Spark distribution, derived from the Hadoop version if absent.
    pub(crate) hadoop_profile: Option<String>,
    /// The Python interpreter of the Spark driver.
    pub(crate) python: Option<PathBuf>,
    /// The platform to install for.
    pub(crate) platform: Platform,
    /// Whether to verify the downloaded archives.
    pub(crate) verify: bool,
}

impl Settings {
    /// Resolves the settings.
    ///
    /// Command line arguments win over the configuration, which wins over the environment
    /// (queried through `lookup`). Relative paths of the configuration resolve against `basedir`.
    #[instrument(level = "trace", skip(lookup))]
    pub(crate) fn resolve<F>(args: &Args, config: &Config, basedir: &Path, lookup: F) -> Result<Self, SetupError>
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let expander = VarExpander::default();

        let (java_home, export_java_home) = match (&args.java_home, &config.java_home) {
            (Some(java_home), _) => (Some(PathBuf::from(expander.expand(java_home)?.into_owned())), true),
            (None, Some(java_home)) => (Some(basedir.join(expander.expand(java_home)?.into_owned())), true),
            (None, None) => (lookup(JAVA_HOME_VAR).filter(|home| !home.is_empty()).map(PathBuf::from), false),
        };

        let spark_cli = ComponentCli {
            version: args.spark_version.as_deref(),
            path: args.spark_path.as_deref(),
        };
        let spark = ComponentSettings::resolve(Component::Spark, spark_cli, &config.spark, basedir, &lookup)?;

        let hadoop_cli = ComponentCli {
            version: args.hadoop_version.as_deref(),
            path: args.hadoop_path.as_deref(),
        };
        let hadoop = ComponentSettings::resolve(Component::Hadoop, hadoop_cli, &config.hadoop, basedir, &lookup)?;

        let install_hadoop = args.hadoop || config.hadoop.enabled.unwrap_or(false);

        let hadoop_profile = args //
            .hadoop_profile
            .clone()
            .or_else(|| config.hadoop.profile.clone())
            .or_else(|| config.spark.profile.clone());

        let python = match args.python.as_ref().or(config.python.as_ref()) {
            Some(python) => Some(PathBuf::from(expander.expand(python)?.into_owned())),
            None => find_python(),
        };

        let verify = args.verify || config.verify.unwrap_or(false);

        let settings = Self {
            java_home,
            export_java_home,
            spark,
            hadoop,
            install_hadoop,
            hadoop_profile,
            python,
            platform: Platform::current(),
            verify,
        };
        debug!(?settings);

        Ok(settings)
    }
}

// Looks up a Python interpreter on the search path.
#[doc(hidden)]
fn find_python() -> Option<PathBuf> {
    PYTHON_CANDIDATES.iter().find_map(|candidate| which::which(candidate).ok())
}

/// The outcome of a setup.
#[derive(Debug)]
pub(crate) struct Outcome {
    /// The installations in the order they were processed.
    pub(crate) installations: Vec<Installation>,
    /// The combined environment.
    pub(crate) env: Environment,
}

/// Installs Hadoop (if requested) and Spark and collects the resulting environment.
#[instrument(level = "trace", skip_all)]
pub(crate) fn setup(settings: &Settings, installer: &Installer) -> Result<Outcome, SetupError> {
    let Some(java_home) = &settings.java_home else {
        return Err(SetupError::PrerequisiteMissing(JAVA_HOME_VAR.to_string()));
    };
    debug!(platform = %settings.platform);
    info!("using {} as {JAVA_HOME_VAR}", java_home.display());
    if !java_home.is_dir() {
        warn!("{JAVA_HOME_VAR} points to {} which is not a directory", java_home.display());
    }

    let mut installations = Vec::new();
    let mut env = Environment::new();
    if settings.export_java_home {
        env.set(JAVA_HOME_VAR, java_home.as_os_str());
    }

    if settings.install_hadoop {
        let request = settings.hadoop.request(Component::Hadoop, None, settings);
        let installation = installer.install(&request)?;
        env.extend(installation.env.clone());
        installations.push(installation);
    }

    let profile = match &settings.hadoop_profile {
        Some(profile) => profile.clone(),
        None => component::hadoop_profile(&settings.hadoop.version)?,
    };
    debug!(profile);
    let request = settings.spark.request(Component::Spark, Some(profile), settings);
    let installation = installer.install(&request)?;
    env.extend(installation.env.clone());
    installations.push(installation);

    match &settings.python {
        Some(python) => {
            env.set(PYSPARK_PYTHON_VAR, python.as_os_str());
        }
        None => warn!("no Python interpreter found, {PYSPARK_PYTHON_VAR} stays unset"),
    }

    Ok(Outcome { installations, env })
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::download::Downloader;
    use crate::testutil::{TestServer, tar_gz};
    use clap::Parser;
    use std::time::Duration;
    use tempfile::tempdir;
    use test_log::test;

    const HADOOP_PATH: &str = "/hadoop-3.2.0/hadoop-3.2.0.tar.gz";
    const SPARK_PATH: &str = "/spark-3.1.2/spark-3.1.2-bin-hadoop3.2.tgz";

    fn no_env(_: &str) -> Option<OsString> {
        None
    }

    fn args(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("program").chain(args.iter().copied())).unwrap()
    }

    fn installer() -> Installer {
        let downloader = Downloader::new(Duration::from_secs(2)).unwrap().progress(false).retries(0);
        Installer::new(downloader)
    }

    fn server() -> TestServer {
        TestServer::start(&[
            (HADOOP_PATH, tar_gz(&[("hadoop-3.2.0/bin/hadoop", "#!/bin/sh\n")])),
            (SPARK_PATH, tar_gz(&[("spark-3.1.2-bin-hadoop3.2/bin/spark-submit", "#!/bin/sh\n")])),
        ])
    }

    fn settings(server: &TestServer, dir: &Path) -> Settings {
        let mut settings = Settings::resolve(&args(&["--java-home", "/opt/java", "--python", "/usr/bin/python3"]), &Config::default(), dir, no_env).unwrap();
        settings.spark.path = dir.join("spark");
        settings.spark.url = server.url("/spark-${version}/spark-${version}-bin-hadoop${profile}.tgz");
        settings.hadoop.path = dir.join("hadoop");
        settings.hadoop.url = server.url("/hadoop-${version}/hadoop-${version}.tar.gz");
        settings.platform = Platform::Unix;
        settings
    }

    #[test]
    fn resolve_defaults() {
        let settings = Settings::resolve(&args(&[]), &Config::default(), Path::new("/base"), no_env).unwrap();

        assert_eq!(settings.java_home, None);
        assert_eq!(settings.spark.version, DEFAULT_SPARK_VERSION);
        assert_eq!(settings.spark.path, PathBuf::from(DEFAULT_SPARK_PATH));
        assert_eq!(settings.spark.url, component::SPARK_URL);
        assert_eq!(settings.hadoop.version, DEFAULT_HADOOP_VERSION);
        assert_eq!(settings.hadoop.path, PathBuf::from(DEFAULT_HADOOP_PATH));
        assert!(!settings.install_hadoop);
        assert!(!settings.verify);
        assert_eq!(settings.hadoop_profile, None);
    }

    #[test]
    fn resolve_from_environment() {
        let lookup = |key: &str| match key {
            "JAVA_HOME" => Some(OsString::from("/usr/lib/jvm/default")),
            "SPARK_HOME" => Some(OsString::from("/opt/spark")),
            "HADOOP_HOME" => Some(OsString::new()),
            _ => None,
        };

        let settings = Settings::resolve(&args(&[]), &Config::default(), Path::new("/base"), lookup).unwrap();

        assert_eq!(settings.java_home, Some(PathBuf::from("/usr/lib/jvm/default")));
        assert!(!settings.export_java_home);
        assert_eq!(settings.spark.home, Some(PathBuf::from("/opt/spark")));
        assert_eq!(settings.hadoop.home, None);
    }

    #[test]
    fn resolve_config_relative_to_basedir() {
        let config: Config = serde_yaml::from_str(
            r#"
java-home: jdk
verify: true
spark:
  path: lib/spark
  url: https://mirror.example/spark-${version}.tgz
hadoop:
  enabled: true
  version: 2.7.7
  profile: "2.7"
"#,
        )
        .unwrap();

        let settings = Settings::resolve(&args(&[]), &config, Path::new("/base"), no_env).unwrap();

        assert_eq!(settings.java_home, Some(PathBuf::from("/base/jdk")));
        assert!(settings.export_java_home);
        assert_eq!(settings.spark.path, PathBuf::from("/base/lib/spark"));
        assert_eq!(settings.spark.url, "https://mirror.example/spark-${version}.tgz");
        assert_eq!(settings.hadoop.version, "2.7.7");
        assert_eq!(settings.hadoop.path, PathBuf::from(DEFAULT_HADOOP_PATH));
        assert_eq!(settings.hadoop_profile.as_deref(), Some("2.7"));
        assert!(settings.install_hadoop);
        assert!(settings.verify);
    }

    #[test]
    fn resolve_command_line_wins() {
        let config: Config = serde_yaml::from_str("java-home: jdk\nspark:\n  version: 3.0.0\n  path: lib/spark\n").unwrap();
        let args = args(&["--java-home", "/opt/java", "-s", "3.1.1", "--spark-path", "opt/spark", "--hadoop-profile", "3.2"]);

        let settings = Settings::resolve(&args, &config, Path::new("/base"), no_env).unwrap();

        assert_eq!(settings.java_home, Some(PathBuf::from("/opt/java")));
        assert_eq!(settings.spark.version, "3.1.1");
        assert_eq!(settings.spark.path, PathBuf::from("opt/spark"));
        assert_eq!(settings.hadoop_profile.as_deref(), Some("3.2"));
    }

    #[test]
    fn resolve_expands_variables() {
        let lookup = |_: &str| None;
        let config: Config = serde_yaml::from_str("spark:\n  path: ${env.SS_TEST_SPARK_DIR}/spark\n").unwrap();
        // SAFETY: the variable is unique to this test
        unsafe { std::env::set_var("SS_TEST_SPARK_DIR", "/srv") };

        let settings = Settings::resolve(&args(&[]), &config, Path::new("/base"), lookup).unwrap();

        assert_eq!(settings.spark.path, PathBuf::from("/srv/spark"));
    }

    #[test]
    fn setup_without_java() {
        let server = server();
        let tempdir = tempdir().unwrap();
        let mut settings = settings(&server, tempdir.path());
        settings.java_home = None;

        let result = setup(&settings, &installer());

        assert!(matches!(result, Err(SetupError::PrerequisiteMissing(ref var)) if var == "JAVA_HOME"));
        assert_eq!(server.hits(SPARK_PATH), 0);
        assert!(!tempdir.path().join("spark").exists());
    }

    #[test]
    fn setup_spark_only() {
        let server = server();
        let tempdir = tempdir().unwrap();
        let settings = settings(&server, tempdir.path());

        let outcome = setup(&settings, &installer()).unwrap();

        let spark_home = tempdir.path().join("spark").join("spark-3.1.2-bin-hadoop3.2");
        assert_eq!(outcome.installations.len(), 1);
        assert_eq!(outcome.installations[0].home, spark_home);
        assert_eq!(server.hits(HADOOP_PATH), 0);
        assert_eq!(server.hits(SPARK_PATH), 1);
        assert_eq!(outcome.env.get("SPARK_HOME"), Some(&OsString::from(spark_home.as_os_str())));
        assert_eq!(outcome.env.get("JAVA_HOME"), Some(&OsString::from("/opt/java")));
        assert_eq!(outcome.env.get("PYSPARK_DRIVER_PYTHON"), Some(&OsString::from("/usr/bin/python3")));
        assert!(outcome.env.get("HADOOP_HOME").is_none());
    }

    #[test]
    fn setup_hadoop_and_spark() {
        let server = server();
        let tempdir = tempdir().unwrap();
        let mut settings = settings(&server, tempdir.path());
        settings.install_hadoop = true;

        let outcome = setup(&settings, &installer()).unwrap();

        let components: Vec<Component> = outcome.installations.iter().map(|installation| installation.component).collect();
        assert_eq!(components, [Component::Hadoop, Component::Spark]);
        let hadoop_home = tempdir.path().join("hadoop").join("hadoop-3.2.0");
        assert!(hadoop_home.join("bin").join("hadoop").is_file());
        assert_eq!(outcome.env.get("HADOOP_HOME"), Some(&OsString::from(hadoop_home.as_os_str())));
        assert_eq!(outcome.env.get("HADOOP_USER_CLASSPATH_FIRST"), Some(&OsString::from("true")));
        assert_eq!(outcome.env.paths()[0], hadoop_home.join("bin"));
        assert_eq!(server.hits(HADOOP_PATH), 1);
        assert_eq!(server.hits(SPARK_PATH), 1);
    }

    #[test]
    fn setup_with_invalid_hadoop_version() {
        let server = server();
        let tempdir = tempdir().unwrap();
        let mut settings = settings(&server, tempdir.path());
        settings.hadoop.version = "3".to_string();

        let result = setup(&settings, &installer());

        assert!(matches!(result, Err(SetupError::InvalidVersion(_))));
        assert_eq!(server.hits(SPARK_PATH), 0);
    }

    #[test]
    fn setup_dry_run() {
        let server = server();
        let tempdir = tempdir().unwrap();
        let mut settings = settings(&server, tempdir.path());
        settings.install_hadoop = true;

        let outcome = setup(&settings, &installer().dry_run(true)).unwrap();

        assert_eq!(outcome.installations.len(), 2);
        assert!(!tempdir.path().join("spark").exists());
        assert!(!tempdir.path().join("hadoop").exists());
        assert_eq!(server.hits(SPARK_PATH), 0);
    }
}
