//! Dynamic library symbol lookup
//!
//! Thin wrapper around dlopen/dlsym. Addresses found here are valid link
//! targets for emitted code; the stub interpreter cannot execute them.

use super::{Linker, NativeAddress};
use crate::error::LinkError;
use core::ffi::c_void;
use core::ptr::NonNull;
#[cfg(unix)]
use std::ffi::CString;
#[cfg(unix)]
use std::ffi::CStr;

/// Handle to a dynamically loaded library
pub struct Library {
    name: String,
    handle: NonNull<c_void>,
}

impl Library {
    /// Load a library by name, searching the standard library paths
    #[cfg(unix)]
    pub fn load(name: &str) -> Result<Self, LinkError> {
        let cname = CString::new(name).map_err(|_| LinkError::InvalidName(name.to_string()))?;
        // SAFETY: cname is a valid NUL-terminated string for the duration of the call
        let handle = unsafe { libc::dlopen(cname.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };
        NonNull::new(handle)
            .map(|handle| Self { name: name.to_string(), handle })
            .ok_or_else(|| LinkError::LibraryLoad(last_error().unwrap_or_else(|| name.to_string())))
    }

    /// Symbols visible in the running process image
    #[cfg(unix)]
    pub fn this_process() -> Result<Self, LinkError> {
        // SAFETY: a null filename asks for the main program handle
        let handle = unsafe { libc::dlopen(core::ptr::null(), libc::RTLD_NOW) };
        NonNull::new(handle)
            .map(|handle| Self { name: "<self>".to_string(), handle })
            .ok_or_else(|| LinkError::LibraryLoad(last_error().unwrap_or_else(|| "<self>".to_string())))
    }

    #[cfg(not(unix))]
    pub fn load(name: &str) -> Result<Self, LinkError> {
        Err(LinkError::LibraryLoad(format!("{}: dynamic loading unsupported on this platform", name)))
    }

    #[cfg(not(unix))]
    pub fn this_process() -> Result<Self, LinkError> {
        Self::load("<self>")
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Address of `symbol`
    #[cfg(unix)]
    pub fn symbol(&self, symbol: &str) -> Result<NativeAddress, LinkError> {
        let cname = CString::new(symbol).map_err(|_| LinkError::InvalidName(symbol.to_string()))?;
        // SAFETY: handle came from dlopen and stays open until drop
        let ptr = unsafe { libc::dlsym(self.handle.as_ptr(), cname.as_ptr()) };
        NativeAddress::from_usize(ptr as usize).ok_or_else(|| LinkError::SymbolNotFound {
            short: symbol.to_string(),
            long: symbol.to_string(),
        })
    }

    #[cfg(not(unix))]
    pub fn symbol(&self, symbol: &str) -> Result<NativeAddress, LinkError> {
        Err(LinkError::InvalidName(symbol.to_string()))
    }
}

#[cfg(unix)]
fn last_error() -> Option<String> {
    // SAFETY: dlerror returns null or a thread-local NUL-terminated string
    unsafe {
        let err = libc::dlerror();
        if err.is_null() {
            None
        } else {
            Some(CStr::from_ptr(err).to_string_lossy().into_owned())
        }
    }
}

impl Linker for Library {
    fn resolve_native_symbol(&self, name: &str) -> Option<NativeAddress> {
        self.symbol(name).ok()
    }
}

impl Drop for Library {
    fn drop(&mut self) {
        close(self.handle);
    }
}

#[cfg(unix)]
fn close(handle: NonNull<c_void>) {
    // SAFETY: handle came from a successful dlopen and is closed once
    unsafe {
        libc::dlclose(handle.as_ptr());
    }
}

#[cfg(not(unix))]
fn close(_handle: NonNull<c_void>) {}

// Safety: the dl* family is thread-safe; the handle is never mutated
unsafe impl Send for Library {}
unsafe impl Sync for Library {}

impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library").field("name", &self.name).finish()
    }
}
