//! Arguments.
//!
//! This module contains the definition for the available command-line parameter.

use clap::Parser;

#[derive(Debug, Parser)]
#[clap(author, about)]
pub(crate) struct Args {
    /// Spark version to install
    #[clap(short = 's', long, value_name = "version")]
    pub(crate) spark_version: Option<String>,
    /// Path to install Spark into
    #[clap(long, value_name = "dir")]
    pub(crate) spark_path: Option<String>,
    /// Whether to install Hadoop as well
    #[clap(long, action)]
    pub(crate) hadoop: bool,
    /// Hadoop version to install (and to pick the Spark distribution for)
    #[clap(long, value_name = "version")]
    pub(crate) hadoop_version: Option<String>,
    /// Path to install Hadoop into
    #[clap(long, value_name = "dir")]
    pub(crate) hadoop_path: Option<String>,
    /// Hadoop profile of the Spark distribution (derived from the Hadoop version by default)
    #[clap(long, value_name = "profile")]
    pub(crate) hadoop_profile: Option<String>,
    /// Path of the Java installation
    #[clap(long, value_name = "dir")]
    pub(crate) java_home: Option<String>,
    /// Python interpreter for the Spark driver
    #[clap(long, value_name = "file")]
    pub(crate) python: Option<String>,
    /// Sets a custom config file
    #[clap(short, long, value_name = "file")]
    pub(crate) config: Option<String>,
    /// Whether to really execute the command
    #[clap(short = 'n', long, action)]
    pub(crate) dry_run: bool,
    /// Verify the downloaded archives against the published SHA512 digests
    #[clap(long, action)]
    pub(crate) verify: bool,
    /// Number of retries on connection failures
    #[clap(long, value_name = "count")]
    pub(crate) retries: Option<u32>,
    /// Timeout in seconds for establishing connections
    #[clap(long, value_name = "seconds")]
    pub(crate) timeout: Option<u64>,
    /// Don't show progress bars
    #[clap(long, action)]
    pub(crate) no_progress: bool,
    /// Print the resulting environment as shell statements
    #[clap(long, action)]
    pub(crate) print_env: bool,
    /// Suppress unnecessary information
    #[clap(short = 'q', long, action)]
    pub(crate) quiet: bool,
    /// Change level of verbosity (apply multiple times to increase level)
    #[clap(short, long, action = clap::ArgAction::Count)]
    pub(crate) verbose: u8,
    /// Print version information
    #[clap(short = 'V', long, action)]
    pub(crate) version: bool,
    /// Command to run with the resulting environment
    #[clap(last = true, value_name = "command")]
    pub(crate) command: Vec<String>,
}
