//! In-process managed thread

use super::context::{ExecutionContext, ManagedException, ReferenceService};
use super::frame::FrameRecord;
use super::handles::{Handle, HandleStack, Mark};
use super::objects::ObjectSpace;
use super::value::{EnvPtr, ObjectRef, Reference};
use crate::config::HandleConfig;
use crate::error::InvokeError;
use crate::logging;
use crate::signature::HolderType;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

/// Native environment blocks are spaced this far apart
const ENV_STRIDE: usize = 0x100;

/// A managed thread: its handle stack, last-managed-frame record and
/// pending-exception slot
///
/// None of this state is shared, so no locking is involved. The object
/// space is shared with other threads.
pub struct VmThread {
    id: u64,
    name: String,
    handles: HandleStack,
    frame: FrameRecord,
    pending: Option<ManagedException>,
    frame_writes: u64,
    space: Arc<ObjectSpace>,
}

impl VmThread {
    pub fn new(name: impl Into<String>, space: Arc<ObjectSpace>) -> Self {
        Self::with_config(name, space, &HandleConfig::default())
    }

    pub fn with_config(name: impl Into<String>, space: Arc<ObjectSpace>, config: &HandleConfig) -> Self {
        Self {
            id: NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            handles: HandleStack::with_capacity(config.capacity, config.limit),
            frame: FrameRecord::EMPTY,
            pending: None,
            frame_writes: 0,
            space,
        }
    }

    /// Pretend the thread is executing the managed frame `record`
    /// (not counted as a frame-record write)
    pub fn enter_managed_frame(&mut self, record: FrameRecord) {
        self.frame = record;
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn space(&self) -> &Arc<ObjectSpace> {
        &self.space
    }

    #[inline]
    pub fn handles(&self) -> &HandleStack {
        &self.handles
    }

    /// Frame-record writes performed through `set_frame_record`
    #[inline]
    pub fn frame_record_writes(&self) -> u64 {
        self.frame_writes
    }

    /// Peek at the pending exception without clearing it
    pub fn pending_exception(&self) -> Option<&ManagedException> {
        self.pending.as_ref()
    }
}

impl ReferenceService for VmThread {
    fn make_handle(&mut self, reference: Reference) -> Result<Handle, InvokeError> {
        self.handles.push(reference).map_err(|err| {
            if let InvokeError::HandleStackOverflow { limit } = err {
                logging::log_handle_overflow(&self.name, limit);
            }
            err
        })
    }

    fn unhand(&self, handle: Handle) -> Result<Reference, InvokeError> {
        self.handles.get(handle)
    }

    fn handle_stack_top(&self) -> Mark {
        self.handles.top()
    }

    fn reset_handle_stack(&mut self, mark: Mark) {
        self.handles.reset(mark);
    }

    fn class_reference(&self, holder: &HolderType) -> ObjectRef {
        self.space.class_mirror(holder)
    }

    fn is_instance(&self, object: ObjectRef, class: &str) -> bool {
        self.space.is_instance(object, class)
    }

    fn class_name_of(&self, object: ObjectRef) -> Option<String> {
        self.space.class_of(object)
    }

    fn relocate_references(&mut self, from: ObjectRef, to: ObjectRef) -> usize {
        self.handles.relocate(from, to)
    }
}

impl ExecutionContext for VmThread {
    fn thread_name(&self) -> &str {
        &self.name
    }

    fn env_ptr(&self) -> EnvPtr {
        EnvPtr(self.id as usize * ENV_STRIDE)
    }

    fn current_frame_record(&self) -> FrameRecord {
        self.frame
    }

    fn set_frame_record(&mut self, record: FrameRecord) {
        self.frame_writes += 1;
        self.frame = record;
    }

    fn has_pending_exception(&self) -> bool {
        self.pending.is_some()
    }

    fn set_pending_exception(&mut self, exception: ManagedException) {
        self.pending = Some(exception);
    }

    fn take_pending_exception(&mut self) -> Option<ManagedException> {
        self.pending.take()
    }
}
