//! Boundary configuration - TOML file with environment overrides
//!
//! ```toml
//! [stubs]
//! trace = "dynamic"
//!
//! [convention]
//! abi = "aarch64"
//!
//! [handles]
//! capacity = 128
//! limit = 65536
//! ```

use crate::convention::Abi;
use crate::error::ConfigError;
use crate::runtime::HandleStack;
use crate::stub::TraceMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File name searched for by `discover`
pub const CONFIG_FILE: &str = "callbridge.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundaryConfig {
    #[serde(default)]
    pub stubs: StubConfig,

    #[serde(default)]
    pub convention: ConventionConfig,

    #[serde(default)]
    pub handles: HandleConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StubConfig {
    #[serde(default)]
    pub trace: TraceMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConventionConfig {
    #[serde(default = "Abi::host")]
    pub abi: Abi,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandleConfig {
    /// Initial handle stack capacity per thread
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Maximum handle stack depth per thread
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl Default for ConventionConfig {
    fn default() -> Self {
        Self { abi: Abi::host() }
    }
}

impl Default for HandleConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            limit: default_limit(),
        }
    }
}

fn default_capacity() -> usize {
    HandleStack::DEFAULT_CAPACITY
}

fn default_limit() -> usize {
    HandleStack::DEFAULT_LIMIT
}

impl BoundaryConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Find `callbridge.toml` in the current directory or its parents,
    /// falling back to defaults
    pub fn discover() -> Self {
        std::env::current_dir()
            .ok()
            .and_then(|dir| Self::find_in(&dir))
            .and_then(|path| Self::load(&path).ok())
            .unwrap_or_default()
    }

    fn find_in(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE))
            .find(|path| path.exists())
    }

    /// Defaults overridden by `CALLBRIDGE_TRACE` and `CALLBRIDGE_ABI`
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Apply `CALLBRIDGE_TRACE` and `CALLBRIDGE_ABI` on top of this config
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(
            std::env::var("CALLBRIDGE_TRACE").ok().as_deref(),
            std::env::var("CALLBRIDGE_ABI").ok().as_deref(),
        )
    }

    fn apply_overrides(&mut self, trace: Option<&str>, abi: Option<&str>) -> Result<(), ConfigError> {
        if let Some(value) = trace {
            self.stubs.trace = TraceMode::from_name(value).ok_or_else(|| ConfigError::InvalidValue {
                key: "stubs.trace",
                value: value.to_string(),
            })?;
        }
        if let Some(value) = abi {
            self.convention.abi = Abi::from_name(value).ok_or_else(|| ConfigError::InvalidValue {
                key: "convention.abi",
                value: value.to_string(),
            })?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.handles.limit == 0 {
            return Err(ConfigError::InvalidValue {
                key: "handles.limit",
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
