//! Signatures - kinds, method descriptors and native symbol names
//!
//! Architecture:
//! - `kind.rs` - managed and native value kinds
//! - `descriptor.rs` - descriptor parsing, holder types, native methods
//! - `mangle.rs` - deterministic native symbol names

mod kind;
mod descriptor;
mod mangle;

pub use kind::{NativeKind, ParameterKind};
pub use descriptor::{HolderType, NativeMethod, SignatureDescriptor, TypeDescriptor, OBJECT_CLASS};
pub use mangle::{long_name, mangle, short_name, SymbolNames, SYMBOL_PREFIX};
