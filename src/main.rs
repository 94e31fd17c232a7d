mod archive;
mod args;
mod checksum;
mod colors;
mod component;
mod config;
mod download;
mod env;
mod error;
mod install;
mod platform;
mod setup;
#[cfg(test)]
mod testutil;
mod util;
mod vars;
mod version;
mod winutils;

use crate::args::Args;
use crate::colors::*;
use crate::config::*;
use crate::download::{DEFAULT_RETRIES, DEFAULT_TIMEOUT, Downloader};
use crate::env::{Environment, PATH_VAR};
use crate::error::ErrorKind;
use crate::install::Installer;
use crate::setup::{Outcome, Settings};
use crate::util::*;
use crate::version::Version;
use anyhow::Context;
use clap::Parser;
use std::path::{self, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use tracing::{level_filters::*, *};
use tracing_subscriber::EnvFilter;

// Exit code used in case there were no errors.
#[doc(hidden)]
const EXIT_OK: i32 = 0;

// Exit code used in case of errors.
#[doc(hidden)]
const EXIT_NOK: i32 = 1;

/// Main entry point for the application.
fn main() {
    // enable ansi support to use colorised/styled output
    #[cfg(windows)]
    let _ = nu_ansi_term::enable_ansi_support();

    // delegate
    match internal_main() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{} {err:?}", ATTENTION_COLOR.paint("Failed!"));
            std::process::exit(EXIT_NOK);
        }
    }
}

// Internal main entry point for the application.
#[doc(hidden)]
fn internal_main() -> anyhow::Result<i32> {
    // remember start date/time
    let start = Instant::now();

    // parse arguments
    let args = Args::parse();

    // with --print-env, stdout carries the environment statements only
    let quiet = args.quiet || args.print_env;

    // print some information
    if !quiet || args.version {
        print_info();
    }

    // stop here in case only the version was requested
    if args.version {
        return Ok(EXIT_OK);
    }

    // init tracing
    init_tracing(&args);

    // print parsed arguments
    trace!("arguments: {args:#?}");

    // load config (explicitly given or the default one if present)
    let config_path = match &args.config {
        Some(config_path) => Some(PathBuf::from(config_path)),
        None => Some(PathBuf::from(CONFIG_FILENAME)).filter(|config_path| config_path.is_file()),
    };
    let (config, basedir) = match config_path {
        Some(config_path) => {
            let config_path = path::absolute(&config_path).unwrap_or(config_path);
            if !quiet {
                println!("Using configuration from {}.", PATH_COLOR.paint(config_path.to_string_lossy()));
            }
            let config = Config::load_from_file(&config_path).with_context(|| format!("failed to load configuration from '{}'", config_path.display()))?;
            // derive base directory from config file
            let basedir = config_path.parent().map(PathBuf::from).unwrap_or_default();
            (config, basedir)
        }
        None => (Config::default(), PathBuf::new()),
    };
    debug!(?config, basedir = %basedir.display());

    // resolve settings
    let settings = Settings::resolve(&args, &config, &basedir, |key| std::env::var_os(key))?;

    // set up the installer
    let timeout = args.timeout.map_or(DEFAULT_TIMEOUT, Duration::from_secs);
    let downloader = Downloader::new(timeout)? //
        .progress(!args.no_progress && !args.quiet)
        .retries(args.retries.unwrap_or(DEFAULT_RETRIES));
    let mut installer = Installer::new(downloader).dry_run(args.dry_run);
    if let Some(winutils_url) = &config.winutils_url {
        installer = installer.winutils_url(winutils_url);
    }

    // install
    let outcome = match setup::setup(&settings, &installer) {
        Ok(outcome) => outcome,
        Err(err) if err.kind() == ErrorKind::Prerequisite => {
            warn!(%err, "stopping");
            let not = ATTENTION_COLOR.paint("NOT");
            eprintln!("{not} setting up Spark -> {err}");
            return Ok(EXIT_OK);
        }
        Err(err) => return Err(err.into()),
    };

    if !quiet {
        print_summary(&outcome, args.dry_run);
    }

    if args.print_env {
        let rendered = outcome.env.render(settings.platform, std::env::var_os(PATH_VAR))?;
        println!("{rendered}");
    }

    let code = match args.command.split_first() {
        Some((program, program_args)) => run(program, program_args, &outcome.env)?,
        None => EXIT_OK,
    };

    // print some statistics
    if !quiet {
        let elapsed = start.elapsed();
        println!("Total time: {}", format_elapsed(elapsed));
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        println!("Finished at: {}", format_now(now));
    }

    Ok(code)
}

// Prints the homes of the installations and the resulting environment.
#[doc(hidden)]
fn print_summary(outcome: &Outcome, dry_run: bool) {
    for installation in &outcome.installations {
        let home = PATH_COLOR.paint(installation.home.to_string_lossy());
        let state = select(installation.fresh, select(dry_run, "would be installed", "installed"), "already present");
        let state = select(installation.fresh, FRESH_COLOR.paint(state), INFO_COLOR.paint(state));
        println!("{} {state} at {home}", installation.component);
    }
    for (key, val) in outcome.env.vars() {
        println!("  {}={}", INFO_COLOR.paint(key), val.to_string_lossy());
    }
    for path in outcome.env.paths() {
        println!("  {} += {}", INFO_COLOR.paint(PATH_VAR), PATH_COLOR.paint(path.to_string_lossy()));
    }
}

// Runs the given program with the resulting environment and returns its exit code.
#[doc(hidden)]
fn run(program: &str, program_args: &[String], env: &Environment) -> anyhow::Result<i32> {
    let mut command = Command::new(program);
    command.args(program_args);
    env.apply(&mut command, std::env::var_os(PATH_VAR))?;

    info!(program, ?program_args, "running");
    let status = command.status().with_context(|| format!("failed to run '{program}'"))?;
    debug!(%status);

    // terminated by a signal
    Ok(status.code().unwrap_or(EXIT_NOK))
}

// Formats the elapsed time with a resolution of seconds.
#[doc(hidden)]
fn format_elapsed(elapsed: Duration) -> String {
    // null out everything below seconds
    let elapsed = Duration::from_secs(elapsed.as_secs());

    // format the remaining duration
    humantime::format_duration(elapsed).to_string()
}

// Formats the given timestamp in the local offset.
#[doc(hidden)]
fn format_now(now: OffsetDateTime) -> String {
    // define format
    const FORMAT: &[FormatItem<'_>] = format_description!("[year]-[month]-[day] [hour]:[minute]:[second][offset_hour sign:mandatory][offset_minute]");

    // local offset or UTC
    let offset = UtcOffset::current_local_offset();
    let offset = offset.unwrap_or(UtcOffset::UTC);
    trace!(?offset);

    // format
    let now = now.to_offset(offset);
    now.format(&FORMAT).unwrap_or(now.to_string())
}

// Prints some information (version, path of executable, etc.).
#[doc(hidden)]
fn print_info() {
    let version = Version::default();
    if let Ok(exe) = std::env::current_exe() {
        let exe = PATH_COLOR.paint(exe.to_string_lossy());
        println!("{version} [{exe}]");
    } else {
        println!("{version}");
    }
}

// Initialises the tracing framework based on given command line arguments.
#[doc(hidden)]
fn init_tracing(args: &Args) {
    // RUST_LOG directives are honoured, the verbosity is added on top
    let level_filter = match args.verbose {
        0 => LevelFilter::ERROR.into(),
        1 => LevelFilter::WARN.into(),
        2 => LevelFilter::INFO.into(),
        3 => LevelFilter::DEBUG.into(),
        _ => LevelFilter::TRACE.into(),
    };
    let env_filter = EnvFilter::from_default_env().add_directive(level_filter);
    tracing_subscriber::fmt().with_env_filter(env_filter).with_writer(std::io::stderr).init();
}

#[cfg(test)]
mod tests {

    use super::*;
    use test_log::test;

    #[test]
    fn elapsed_drops_subseconds() {
        assert_eq!(format_elapsed(Duration::from_millis(61_999)), "1m 1s");
        assert_eq!(format_elapsed(Duration::from_millis(999)), "0s");
    }

    #[test]
    fn now_is_formatted() {
        let now = OffsetDateTime::UNIX_EPOCH;
        let formatted = format_now(now);
        assert_eq!(formatted.len(), "1970-01-01 00:00:00+0000".len());
    }

    #[cfg(unix)]
    #[test]
    fn run_propagates_exit_code() {
        let env = Environment::new();
        let code = run("sh", &["-c".to_string(), "exit 3".to_string()], &env).unwrap();
        assert_eq!(code, 3);
    }

    #[cfg(unix)]
    #[test]
    fn run_passes_environment() {
        let mut env = Environment::new();
        env.set("SPARK_HOME", "/opt/spark");
        let code = run("sh", &["-c".to_string(), "test \"$SPARK_HOME\" = /opt/spark".to_string()], &env).unwrap();
        assert_eq!(code, EXIT_OK);
    }

    #[test]
    fn run_unknown_program() {
        let env = Environment::new();
        assert!(run("setup-spark-no-such-program", &[], &env).is_err());
    }
}
