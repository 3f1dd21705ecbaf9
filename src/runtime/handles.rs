//! Handle stack - opaque, relocatable stand-ins for managed references
//!
//! Native code never sees an object address. It sees a handle: an index into
//! the owning thread's handle stack, which the collector treats as a root
//! set and rewrites when objects move.

use super::context::ReferenceService;
use super::value::{ObjectRef, Reference};
use crate::error::InvokeError;
use core::ops::{Deref, DerefMut};
use std::fmt;

/// Token standing in for a managed reference during a native call
///
/// The zero handle represents `null`; every other handle is one past the
/// index of its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Handle(usize);

impl Handle {
    pub const NULL: Handle = Handle(0);

    #[inline]
    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> usize {
        self.0
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle#{}", self.0)
    }
}

/// Depth of a handle stack at some point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Mark(pub usize);

/// Per-thread stack of handleized references
#[derive(Debug)]
pub struct HandleStack {
    slots: Vec<Reference>,
    limit: usize,
}

impl HandleStack {
    pub const DEFAULT_CAPACITY: usize = 64;
    pub const DEFAULT_LIMIT: usize = 64 * 1024;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY, Self::DEFAULT_LIMIT)
    }

    pub fn with_capacity(capacity: usize, limit: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity.min(limit)),
            limit,
        }
    }

    /// Wrap `reference` in a handle. Null references map to the null
    /// handle and consume no slot.
    pub fn push(&mut self, reference: Reference) -> Result<Handle, InvokeError> {
        if reference.is_none() {
            return Ok(Handle::NULL);
        }
        if self.slots.len() >= self.limit {
            return Err(InvokeError::HandleStackOverflow { limit: self.limit });
        }
        self.slots.push(reference);
        Ok(Handle(self.slots.len()))
    }

    /// Current referent of a live handle
    pub fn get(&self, handle: Handle) -> Result<Reference, InvokeError> {
        if handle.is_null() {
            return Ok(None);
        }
        self.slots
            .get(handle.0 - 1)
            .copied()
            .ok_or(InvokeError::InvalidHandle(handle.0))
    }

    #[inline]
    pub fn top(&self) -> Mark {
        Mark(self.slots.len())
    }

    /// Discard every handle created after `mark`
    pub fn reset(&mut self, mark: Mark) {
        debug_assert!(mark.0 <= self.slots.len(), "handle mark {} beyond top {}", mark.0, self.slots.len());
        self.slots.truncate(mark.0);
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Collector hook: rewrite every slot referring to `from`
    pub fn relocate(&mut self, from: ObjectRef, to: ObjectRef) -> usize {
        let mut updated = 0;
        for slot in self.slots.iter_mut().filter(|s| **s == Some(from)) {
            *slot = Some(to);
            updated += 1;
        }
        updated
    }
}

impl Default for HandleStack {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard that frees every handle created while it is alive
///
/// Usage:
/// ```ignore
/// let mut scope = HandleScope::enter(&mut thread);
/// let handle = scope.make_handle(Some(object))?;
/// // handle is released when scope drops, on every exit path
/// ```
pub struct HandleScope<'a, R: ReferenceService + ?Sized> {
    refs: &'a mut R,
    mark: Mark,
}

impl<'a, R: ReferenceService + ?Sized> HandleScope<'a, R> {
    #[inline]
    pub fn enter(refs: &'a mut R) -> Self {
        let mark = refs.handle_stack_top();
        Self { refs, mark }
    }

    #[inline]
    pub fn mark(&self) -> Mark {
        self.mark
    }
}

impl<R: ReferenceService + ?Sized> Deref for HandleScope<'_, R> {
    type Target = R;

    fn deref(&self) -> &R {
        self.refs
    }
}

impl<R: ReferenceService + ?Sized> DerefMut for HandleScope<'_, R> {
    fn deref_mut(&mut self) -> &mut R {
        self.refs
    }
}

impl<R: ReferenceService + ?Sized> Drop for HandleScope<'_, R> {
    #[inline]
    fn drop(&mut self) {
        self.refs.reset_handle_stack(self.mark);
    }
}
