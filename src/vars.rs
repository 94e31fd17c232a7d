//! Variable resolvers.
//!
//! This module contains basic support for variable resolvers and an expander built on top of them.
//! Paths and download templates may reference `${env.NAME}` (environment), `${SS_ARCH}`, `${SS_FAMILY}`,
//! `${SS_OS}` (build target) and per-call variables such as `${version}` and `${profile}`.

use std::borrow::Cow;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::rc::Rc;

/// The prefix for environment variables.
pub(crate) const ENV_PREFIX: &str = "env.";

// Maximum number of expansion passes.
#[doc(hidden)]
const MAX_PASSES: usize = 32;

/// The error type for operations interacting with variables.
#[cfg_attr(test, derive(PartialEq))]
#[derive(Debug, thiserror::Error)]
pub(crate) enum VarError {
    /// The specified variable is not present.
    #[error("variable '{0}' not found")]
    NotPresent(String),
    /// The expansion keeps producing new variable references.
    #[error("expansion of '{0}' does not terminate")]
    Unbounded(String),
}

/// Trait for variable resolvers.
pub(crate) trait VarResolver: fmt::Debug {
    /// Resolves the variable with the given name.
    fn resolve_var(&self, var_name: &str) -> Result<String, VarError>;
}

/// [`VarResolver`] implementation that combines other variable resolvers.
#[derive(Debug)]
pub(crate) struct CombinedVarResolver {
    resolvers: Vec<Rc<dyn VarResolver>>,
}

impl CombinedVarResolver {
    /// Constructs a new `CombinedVarResolver` with the given variable resolvers.
    pub(crate) fn new<I>(resolvers: I) -> Self
    where
        I: IntoIterator<Item = Rc<dyn VarResolver>>,
    {
        Self {
            resolvers: Vec::from_iter(resolvers),
        }
    }
}

impl VarResolver for CombinedVarResolver {
    #[tracing::instrument(level = "trace", ret)]
    fn resolve_var(&self, v: &str) -> Result<String, VarError> {
        for resolver in &self.resolvers {
            if let Ok(value) = resolver.resolve_var(v) {
                return Ok(value);
            }
        }

        Err(VarError::NotPresent(v.to_owned()))
    }
}

/// [`VarResolver`] implementation for environment variables from the operating system.
#[derive(Debug)]
pub(crate) struct OsEnvVarResolver;

impl VarResolver for OsEnvVarResolver {
    #[tracing::instrument(level = "trace", ret)]
    fn resolve_var(&self, v: &str) -> Result<String, VarError> {
        env::var(v).map_err(|_| VarError::NotPresent(v.to_owned()))
    }
}

/// [`VarResolver`] that first removes the given prefix from the variable and then delegates to the given resolver.
#[derive(Debug)]
pub(crate) struct PrefixedVarResolver {
    resolver: Rc<dyn VarResolver>,
    prefix: String,
}

impl PrefixedVarResolver {
    /// Constructs a new `PrefixedVarResolver` for the given variable resolver.
    pub(crate) fn new(prefix: impl Into<String>, resolver: Rc<dyn VarResolver>) -> Self {
        Self {
            prefix: prefix.into(),
            resolver,
        }
    }
}

impl VarResolver for PrefixedVarResolver {
    #[tracing::instrument(level = "trace", ret)]
    fn resolve_var(&self, v: &str) -> Result<String, VarError> {
        if let Some(v) = v.strip_prefix(&self.prefix) {
            return self.resolver.resolve_var(v);
        };

        Err(VarError::NotPresent(v.to_owned()))
    }
}

/// [`VarResolver`] implementation for Rust environment constants.
#[derive(Debug)]
pub(crate) struct RustEnvVarResolver;

impl VarResolver for RustEnvVarResolver {
    #[tracing::instrument(level = "trace", ret)]
    fn resolve_var(&self, v: &str) -> Result<String, VarError> {
        match v {
            "SS_ARCH" => Ok(env::consts::ARCH.to_string()),
            "SS_FAMILY" => Ok(env::consts::FAMILY.to_string()),
            "SS_OS" => Ok(env::consts::OS.to_string()),
            _ => Err(VarError::NotPresent(v.to_owned())),
        }
    }
}

/// [`VarResolver`] implementation for simple variables.
#[derive(Debug, Default)]
pub(crate) struct SimpleVarResolver {
    vars: HashMap<String, String>,
}

impl SimpleVarResolver {
    /// Constructs a new `SimpleVarResolver`.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers the value for the given variable name.
    pub(crate) fn insert<V: Into<String>>(&mut self, name: impl Into<String>, val: V) {
        self.vars.insert(name.into(), val.into());
    }
}

impl VarResolver for SimpleVarResolver {
    #[tracing::instrument(level = "trace", ret)]
    fn resolve_var(&self, v: &str) -> Result<String, VarError> {
        match self.vars.get(v) {
            Some(value) => Ok(value.clone()),
            _ => Err(VarError::NotPresent(v.to_owned())),
        }
    }
}

/// Expands variables in strings with the help of variable resolvers.
#[derive(Debug)]
pub(crate) struct VarExpander {
    // The combined variable resolvers.
    #[doc(hidden)]
    resolver: CombinedVarResolver,
}

impl VarExpander {
    /// Constructs a new `VarExpander` with the given variable resolvers.
    pub(crate) fn new<I>(resolvers: I) -> Self
    where
        I: IntoIterator<Item = Rc<dyn VarResolver>>,
    {
        Self {
            resolver: CombinedVarResolver::new(resolvers),
        }
    }

    /// Constructs a `VarExpander` that knows the given variables, `env.*` and the `SS_*` constants.
    pub(crate) fn with_vars(vars: SimpleVarResolver) -> Self {
        let env_var_resolver = PrefixedVarResolver::new(ENV_PREFIX, Rc::new(OsEnvVarResolver));
        let var_resolvers: [Rc<dyn VarResolver>; 3] = [Rc::new(vars), Rc::new(env_var_resolver), Rc::new(RustEnvVarResolver)];
        Self::new(var_resolvers)
    }

    /// Expands all known variables in the given string.
    #[tracing::instrument(level = "trace", ret)]
    pub(crate) fn expand<'a, S>(&self, s: &'a S) -> Result<Cow<'a, str>, VarError>
    where
        S: ?Sized + AsRef<str> + fmt::Debug,
    {
        let s = s.as_ref();
        let expanded = self.expand_inner(s)?;
        if expanded == s {
            return Ok(Cow::Borrowed(s));
        }

        Ok(Cow::Owned(expanded))
    }

    // Expands all known variables in the given string until nothing changes anymore.
    fn expand_inner(&self, s: &str) -> Result<String, VarError> {
        let mut current = s.to_string();
        for _ in 0..MAX_PASSES {
            let expanded = shellexpand::env_with_context(&current, |v| self.resolve(v)) //
                .map_err(|err| err.cause)? //
                .into_owned();
            if expanded == current {
                return Ok(expanded);
            }
            current = expanded;
        }

        Err(VarError::Unbounded(s.to_owned()))
    }

    // Provides the context for `expand`.
    #[doc(hidden)]
    fn resolve(&self, v: &str) -> Result<Option<String>, VarError> {
        self.resolver.resolve_var(v).map(Option::Some)
    }
}

impl Default for VarExpander {
    fn default() -> Self {
        Self::with_vars(SimpleVarResolver::new())
    }
}
