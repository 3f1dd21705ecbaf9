//! Native linkage - from mangled symbol names to callable addresses
//!
//! Design: symbol lookup goes through the `Linker` trait so in-process
//! registrations and dynamic libraries are searched the same way. The
//! `LinkageCache` is the one structure shared between threads calling the
//! same native method.
//!
//! Architecture:
//! - `native.rs` - `NativeFunction` and the `NativeRegistry`
//! - `library.rs` - dlopen/dlsym symbol lookup
//! - `cache.rs` - `LinkageCache`, concurrent lazy binding

mod native;
mod library;
mod cache;

pub use native::{NativeFunction, NativeRegistry};
pub use library::Library;
pub use cache::LinkageCache;

use core::num::NonZeroUsize;
use std::fmt;

/// Entry point of a linked native function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NativeAddress(NonZeroUsize);

impl NativeAddress {
    #[inline]
    pub fn from_usize(address: usize) -> Option<Self> {
        NonZeroUsize::new(address).map(Self)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0.get()
    }
}

impl fmt::Display for NativeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.get())
    }
}

/// Resolves mangled native symbol names
pub trait Linker: Send + Sync {
    fn resolve_native_symbol(&self, name: &str) -> Option<NativeAddress>;
}
