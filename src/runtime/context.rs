//! Services a stub consumes from the surrounding runtime

use super::frame::FrameRecord;
use super::handles::{Handle, Mark};
use super::value::{EnvPtr, ObjectRef, Reference};
use crate::error::InvokeError;
use crate::signature::HolderType;
use std::fmt;

/// An exception object as recorded in a thread's pending-exception slot
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ManagedException {
    /// Binary class name, e.g. `java/lang/IllegalStateException`
    pub class: String,
    pub message: Option<String>,
}

impl ManagedException {
    pub fn new(class: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class: class.into().replace('.', "/"),
            message: Some(message.into()),
        }
    }

    pub fn without_message(class: impl Into<String>) -> Self {
        Self {
            class: class.into().replace('.', "/"),
            message: None,
        }
    }
}

impl fmt::Display for ManagedException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let class = self.class.replace('/', ".");
        match &self.message {
            Some(message) => write!(f, "{}: {}", class, message),
            None => f.write_str(&class),
        }
    }
}

/// Object-layout and reference service
pub trait ReferenceService {
    /// Wrap `reference` in a handle on the current thread's handle stack
    fn make_handle(&mut self, reference: Reference) -> Result<Handle, InvokeError>;

    /// Current (possibly relocated) referent of `handle`
    fn unhand(&self, handle: Handle) -> Result<Reference, InvokeError>;

    fn handle_stack_top(&self) -> Mark;

    fn reset_handle_stack(&mut self, mark: Mark);

    /// Constant object representing `holder`, handed to static natives
    fn class_reference(&self, holder: &HolderType) -> ObjectRef;

    /// Whether `object` is an instance of the class with binary name `class`
    fn is_instance(&self, object: ObjectRef, class: &str) -> bool;

    /// Binary class name of `object`, if it is known
    fn class_name_of(&self, object: ObjectRef) -> Option<String>;

    /// Collector hook: `from` now lives at `to`. Returns the number of
    /// handles rewritten.
    fn relocate_references(&mut self, from: ObjectRef, to: ObjectRef) -> usize;
}

/// Per-thread execution state
pub trait ExecutionContext {
    fn thread_name(&self) -> &str;

    /// Opaque pointer passed to standard-linkage natives as their first argument
    fn env_ptr(&self) -> EnvPtr;

    fn current_frame_record(&self) -> FrameRecord;

    fn set_frame_record(&mut self, record: FrameRecord);

    fn has_pending_exception(&self) -> bool;

    fn set_pending_exception(&mut self, exception: ManagedException);

    /// Take and clear the pending exception
    fn take_pending_exception(&mut self) -> Option<ManagedException>;
}

/// Everything a stub needs from the calling thread
pub trait ThreadContext: ReferenceService + ExecutionContext {}

impl<T: ReferenceService + ExecutionContext + ?Sized> ThreadContext for T {}
