//! Error taxonomy for the call boundary
//!
//! - `PreconditionError` - malformed signatures, fatal at stub generation time
//! - `LinkError` - native symbol resolution, surfaced on first invocation
//! - `InvokeError` - everything an executing stub can report to its caller
//! - `ConfigError` - configuration loading

use crate::runtime::ManagedException;
use crate::signature::{NativeKind, ParameterKind};
use std::fmt;

/// A signature the synthesizer refuses to build a stub for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreconditionError {
    /// `void` used as a parameter kind
    VoidParameter { index: usize },
    /// Lightweight linkage cannot pass references; nothing would handleize them
    ReferenceInLightweight { index: usize },
    /// Lightweight linkage only applies to static methods
    LightweightInstance,
    /// Lightweight linkage cannot return references
    LightweightReferenceResult,
    MalformedDescriptor { descriptor: String, position: usize },
}

impl fmt::Display for PreconditionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VoidParameter { index } => {
                write!(f, "parameter {} has kind void", index)
            }
            Self::ReferenceInLightweight { index } => {
                write!(f, "parameter {} is a reference, which lightweight linkage cannot pass", index)
            }
            Self::LightweightInstance => {
                write!(f, "lightweight linkage requires a static method")
            }
            Self::LightweightReferenceResult => {
                write!(f, "lightweight linkage cannot return a reference")
            }
            Self::MalformedDescriptor { descriptor, position } => {
                write!(f, "malformed descriptor '{}' at position {}", descriptor, position)
            }
        }
    }
}

impl std::error::Error for PreconditionError {}

/// Native symbol resolution failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    SymbolNotFound { short: String, long: String },
    InvalidName(String),
    LibraryLoad(String),
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SymbolNotFound { short, long } => {
                write!(f, "no native symbol found for {} or {}", short, long)
            }
            Self::InvalidName(name) => write!(f, "invalid symbol name: {}", name),
            Self::LibraryLoad(msg) => write!(f, "failed to load library: {}", msg),
        }
    }
}

impl std::error::Error for LinkError {}

/// Failures reported by an executing stub
///
/// Every variant is produced after the handle stack and frame record have
/// been returned to their pre-call state.
#[derive(Debug, Clone, PartialEq)]
pub enum InvokeError {
    Link(LinkError),
    /// Exception raised by native code, rethrown in managed code
    PendingException(ManagedException),
    ArgumentCount { expected: usize, found: usize },
    ArgumentMismatch { index: usize, expected: ParameterKind, found: ParameterKind },
    HandleStackOverflow { limit: usize },
    InvalidHandle(usize),
    /// Declared result class did not match the returned object
    ClassCast { expected: String, found: String },
    /// Linked address has no in-process implementation to execute
    NotCallable(usize),
    /// Native function returned a value of the wrong kind
    ResultMismatch { expected: NativeKind, found: NativeKind },
}

impl fmt::Display for InvokeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Link(err) => write!(f, "linkage failed: {}", err),
            Self::PendingException(exc) => write!(f, "native method threw {}", exc),
            Self::ArgumentCount { expected, found } => {
                write!(f, "expected {} arguments, got {}", expected, found)
            }
            Self::ArgumentMismatch { index, expected, found } => {
                write!(f, "argument {}: expected {}, found {}", index, expected, found)
            }
            Self::HandleStackOverflow { limit } => {
                write!(f, "handle stack exceeded its limit of {} entries", limit)
            }
            Self::InvalidHandle(raw) => write!(f, "invalid handle {:#x}", raw),
            Self::ClassCast { expected, found } => {
                write!(f, "{} cannot be cast to {}", found, expected)
            }
            Self::NotCallable(address) => {
                write!(f, "native address {:#x} cannot be executed in process", address)
            }
            Self::ResultMismatch { expected, found } => {
                write!(f, "native result: expected {}, found {}", expected, found)
            }
        }
    }
}

impl std::error::Error for InvokeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Link(err) => Some(err),
            _ => None,
        }
    }
}

impl From<LinkError> for InvokeError {
    fn from(err: LinkError) -> Self {
        Self::Link(err)
    }
}

/// Configuration loading failures
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    InvalidValue { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config: {}", err),
            Self::Parse(err) => write!(f, "failed to parse config: {}", err),
            Self::InvalidValue { key, value } => {
                write!(f, "invalid value '{}' for {}", value, key)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::InvalidValue { .. } => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        Self::Parse(err)
    }
}
