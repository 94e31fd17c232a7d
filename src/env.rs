//! Environment.
//!
//! This module contains the environment an installation asks for. Nothing here touches the
//! environment of the running process; the caller decides where the variables go.

use crate::platform::Platform;
use std::env;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Command;

/// Name of the search path variable.
pub(crate) const PATH_VAR: &str = "PATH";

/// Environment variables and search path additions.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct Environment {
    vars: Vec<(String, OsString)>,
    paths: Vec<PathBuf>,
}

impl Environment {
    /// Creates a new, empty `Environment`.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Sets a variable, replacing an earlier value of the same variable.
    pub(crate) fn set(&mut self, key: impl Into<String>, val: impl Into<OsString>) -> &mut Self {
        let key = key.into();
        let val = val.into();
        match self.vars.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = val,
            None => self.vars.push((key, val)),
        }

        self
    }

    /// Appends a directory to the search path (once).
    pub(crate) fn push_path(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        let path = path.into();
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }

        self
    }

    /// Merges the other environment into this one.
    pub(crate) fn extend(&mut self, other: Environment) -> &mut Self {
        for (key, val) in other.vars {
            self.set(key, val);
        }
        for path in other.paths {
            self.push_path(path);
        }

        self
    }

    /// Returns the value of the given variable.
    #[cfg(test)]
    pub(crate) fn get(&self, key: &str) -> Option<&OsString> {
        self.vars.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Returns the variables in the order they were set.
    pub(crate) fn vars(&self) -> impl Iterator<Item = (&str, &OsString)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the search path additions.
    pub(crate) fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Returns the given search path followed by the additions.
    pub(crate) fn path(&self, current: Option<OsString>) -> Result<OsString, env::JoinPathsError> {
        let current = current.map(|current| env::split_paths(&current).collect::<Vec<_>>()).unwrap_or_default();
        env::join_paths(current.into_iter().chain(self.paths.iter().cloned()))
    }

    /// Renders the environment as statements for the default shell of the given platform.
    pub(crate) fn render(&self, platform: Platform, current_path: Option<OsString>) -> Result<String, env::JoinPathsError> {
        let mut lines: Vec<String> = self //
            .vars()
            .map(|(key, val)| platform.export(key, &val.to_string_lossy()))
            .collect();
        if !self.paths.is_empty() {
            let path = self.path(current_path)?;
            lines.push(platform.export(PATH_VAR, &path.to_string_lossy()));
        }

        Ok(lines.join("\n"))
    }

    /// Applies the environment to the given command.
    pub(crate) fn apply(&self, command: &mut Command, current_path: Option<OsString>) -> Result<(), env::JoinPathsError> {
        for (key, val) in self.vars() {
            command.env(key, val);
        }
        if !self.paths.is_empty() {
            command.env(PATH_VAR, self.path(current_path)?);
        }

        Ok(())
    }
}
