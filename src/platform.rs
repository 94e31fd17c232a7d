//! Platform.
//!
//! This module contains the platform family the program runs on.

use std::fmt;

/// Enumeration of supported platform families.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Platform {
    /// Linux, macOS and the other unix-like systems.
    Unix,
    /// Windows
    Windows,
}

impl Platform {
    /// Returns the platform family of the running program.
    pub(crate) fn current() -> Self {
        if cfg!(windows) { Self::Windows } else { Self::Unix }
    }

    /// Renders a statement that sets an environment variable in the platform's default shell.
    pub(crate) fn export(&self, key: &str, val: &str) -> String {
        match self {
            Self::Unix => {
                let val = val.replace('\'', r"'\''");
                format!("export {key}='{val}'")
            }
            Self::Windows => {
                let val = val.replace('\'', "''");
                format!("$env:{key} = '{val}'")
            }
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix => f.write_str("unix"),
            Self::Windows => f.write_str("windows"),
        }
    }
}
