//! Runtime options
//!
//! Conventions chosen by the translator for a generated codebase. Options are
//! plain data; they can be built in code or read from a TOML file:
//!
//! ```toml
//! default_constructors = "null-filled"
//! release_leftover_state = false
//! ```

use crate::error::{RuntimeError, RuntimeResult};
use serde::Deserialize;
use std::path::Path;

/// Which classes support zero-argument construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DefaultConstructors {
    /// No class can be default-constructed
    Disabled,
    /// Only classes that declare a default constructor
    #[default]
    Declared,
    /// Declared constructors, otherwise every field starts as null
    NullFilled,
}

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeOptions {
    /// Default-constructor convention
    pub default_constructors: DefaultConstructors,
    /// Release class state still held after a shutdown phase
    ///
    /// When off, leftovers are only reported and stay readable through
    /// the class state.
    pub release_leftover_state: bool,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            default_constructors: DefaultConstructors::default(),
            release_leftover_state: true,
        }
    }
}

impl RuntimeOptions {
    /// Parse options from TOML text
    pub fn from_toml_str(text: &str) -> RuntimeResult<Self> {
        toml::from_str(text).map_err(|e| RuntimeError::Config(e.to_string()))
    }

    /// Read options from a TOML file
    pub fn from_file(path: &Path) -> RuntimeResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| RuntimeError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }
}
