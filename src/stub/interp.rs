//! Reference execution of stub operations
//!
//! Runs a stub against a `ThreadContext` exactly as emitted code would,
//! including the failure paths: a `CallScope` guard returns the frame record
//! and handle stack to their saved state if execution stops early.

use super::code::Stub;
use super::generator::dynamic_tracing_enabled;
use super::op::{Op, TraceCheck};
use crate::error::InvokeError;
use crate::linker::{LinkageCache, NativeAddress};
use crate::logging;
use crate::runtime::{
    EnvPtr, FrameRecord, Handle, HandleScope, ManagedException, Mark, NativeValue, ObjectRef, Reference,
    ThreadContext, Value,
};
use crate::signature::{NativeKind, ParameterKind};
use smallvec::{smallvec, SmallVec};

/// Contents of a stub local
#[derive(Debug, Clone, Copy)]
enum Slot {
    Empty,
    Thread,
    Mark(Mark),
    Frame(FrameRecord),
}

/// Undo state for a call that stops between its save and restore operations
struct CallScope<'t> {
    thread: &'t mut dyn ThreadContext,
    /// Saved handle mark, until `RestoreHandleMark` runs
    mark: Option<Mark>,
    /// Saved frame record, while the thread is marked as in native code
    native_frame: Option<FrameRecord>,
}

impl<'t> CallScope<'t> {
    fn new(thread: &'t mut dyn ThreadContext) -> Self {
        Self {
            thread,
            mark: None,
            native_frame: None,
        }
    }
}

impl Drop for CallScope<'_> {
    fn drop(&mut self) {
        if let Some(saved) = self.native_frame.take() {
            self.thread.set_frame_record(saved);
        }
        if let Some(mark) = self.mark.take() {
            self.thread.reset_handle_stack(mark);
        }
    }
}

fn check_arguments(stub: &Stub, args: &[Value]) -> Result<(), InvokeError> {
    let expected = stub.managed_parameter_kinds();
    if expected.len() != args.len() {
        return Err(InvokeError::ArgumentCount {
            expected: expected.len(),
            found: args.len(),
        });
    }
    for (index, (kind, value)) in expected.iter().zip(args).enumerate() {
        if value.kind() != *kind {
            return Err(InvokeError::ArgumentMismatch {
                index,
                expected: *kind,
                found: value.kind(),
            });
        }
    }
    Ok(())
}

fn reference_arg(args: &[Value], index: usize) -> Result<Reference, InvokeError> {
    args[index].as_reference().ok_or(InvokeError::ArgumentMismatch {
        index,
        expected: ParameterKind::Reference,
        found: args[index].kind(),
    })
}

fn trace_enabled(check: TraceCheck) -> bool {
    match check {
        TraceCheck::Always => true,
        TraceCheck::Dynamic => dynamic_tracing_enabled(),
    }
}

/// Check the native result against the declared kind
fn accept_result(expected: NativeKind, value: NativeValue) -> Result<NativeValue, InvokeError> {
    if expected == NativeKind::Void {
        return Ok(NativeValue::Void);
    }
    if value.kind() == expected {
        Ok(value)
    } else {
        Err(InvokeError::ResultMismatch {
            expected,
            found: value.kind(),
        })
    }
}

pub(super) fn execute(
    stub: &Stub,
    thread: &mut dyn ThreadContext,
    linkage: &LinkageCache,
    args: &[Value],
) -> Result<Value, InvokeError> {
    check_arguments(stub, args)?;

    let mut scope = CallScope::new(thread);
    let mut locals: SmallVec<[Slot; 4]> = smallvec![Slot::Empty; stub.max_locals()];
    let mut outgoing: SmallVec<[NativeValue; 8]> = SmallVec::with_capacity(stub.native_signature().parameters().len());
    let mut address: Option<NativeAddress> = None;
    let mut native_result = NativeValue::Void;
    let mut managed_result: Option<Value> = None;

    for op in stub.ops() {
        match op {
            Op::CurrentThread { dst } => {
                locals[usize::from(dst.0)] = Slot::Thread;
            }
            Op::TraceEntry { check, method } => {
                if trace_enabled(*check) {
                    logging::log_native_entry(scope.thread.thread_name(), method);
                }
            }
            Op::SaveHandleMark { dst } => {
                let mark = scope.thread.handle_stack_top();
                locals[usize::from(dst.0)] = Slot::Mark(mark);
                scope.mark = Some(mark);
            }
            Op::SaveFrameRecord { dst } => {
                locals[usize::from(dst.0)] = Slot::Frame(scope.thread.current_frame_record());
            }
            Op::PushEnv => {
                outgoing.push(NativeValue::Env(scope.thread.env_ptr()));
            }
            Op::HandleizeClass { holder } => {
                let mirror = scope.thread.class_reference(holder);
                let handle = scope.thread.make_handle(Some(mirror))?;
                outgoing.push(NativeValue::Handle(handle));
            }
            Op::HandleizeReceiver => {
                let receiver = reference_arg(args, 0)?;
                let handle = scope.thread.make_handle(receiver)?;
                outgoing.push(NativeValue::Handle(handle));
            }
            Op::Load { arg, kind } => {
                let value = args[*arg].to_native().ok_or(InvokeError::ArgumentMismatch {
                    index: *arg,
                    expected: *kind,
                    found: args[*arg].kind(),
                })?;
                outgoing.push(value);
            }
            Op::Handleize { arg } => {
                let reference = reference_arg(args, *arg)?;
                let handle = scope.thread.make_handle(reference)?;
                outgoing.push(NativeValue::Handle(handle));
            }
            Op::Link { symbols } => match linkage.link(symbols) {
                Ok(linked) => address = Some(linked),
                Err(err) => {
                    logging::log_link_failure(&stub.method().qualified_name(), &err);
                    return Err(err.into());
                }
            },
            Op::TransitionToNative { frame } => {
                if let Slot::Frame(saved) = locals[usize::from(frame.0)] {
                    scope.native_frame = Some(saved);
                    scope.thread.set_frame_record(saved.in_native());
                }
            }
            Op::CallNative { result, .. } => {
                let target = address.ok_or(InvokeError::NotCallable(0))?;
                let function = linkage
                    .function(target)
                    .ok_or(InvokeError::NotCallable(target.get()))?;
                let returned = {
                    let mut env = NativeEnv::new(&mut *scope.thread, linkage);
                    function.call(&mut env, &outgoing)
                };
                // a pending exception decides the outcome; the return value is ignored
                native_result = if !stub.is_lightweight() && scope.thread.has_pending_exception() {
                    NativeValue::Void
                } else {
                    accept_result(*result, returned)?
                };
            }
            Op::TransitionFromNative { frame } => {
                if let Slot::Frame(saved) = locals[usize::from(frame.0)] {
                    scope.thread.set_frame_record(saved);
                    scope.native_frame = None;
                }
            }
            Op::Unhand => {
                // Void here means the native threw
                let handle = native_result.as_handle().unwrap_or(Handle::NULL);
                managed_result = Some(Value::Reference(scope.thread.unhand(handle)?));
            }
            Op::RestoreHandleMark { mark } => {
                if let Slot::Mark(mark) = locals[usize::from(mark.0)] {
                    scope.thread.reset_handle_stack(mark);
                    scope.mark = None;
                }
            }
            Op::TraceExit { check, method } => {
                if trace_enabled(*check) {
                    logging::log_native_exit(scope.thread.thread_name(), method);
                }
            }
            Op::ThrowPendingException => {
                if let Some(exception) = scope.thread.take_pending_exception() {
                    logging::log_pending_exception(scope.thread.thread_name(), &exception);
                    return Err(InvokeError::PendingException(exception));
                }
            }
            Op::CheckCast { class } => {
                if let Some(Value::Reference(Some(object))) = managed_result {
                    check_cast(&*scope.thread, object, class)?;
                }
            }
            Op::Return { kind } => {
                return Ok(match (kind, managed_result) {
                    (ParameterKind::Void, _) => Value::Void,
                    (_, Some(value)) => value,
                    (_, None) => native_result.to_managed().unwrap_or(Value::Void),
                });
            }
        }
    }

    Ok(managed_result.unwrap_or(Value::Void))
}

fn check_cast(thread: &dyn ThreadContext, object: ObjectRef, class: &str) -> Result<(), InvokeError> {
    if thread.is_instance(object, class) {
        return Ok(());
    }
    let found = thread
        .class_name_of(object)
        .unwrap_or_else(|| "<unknown>".to_string());
    Err(InvokeError::ClassCast {
        expected: class.replace('/', "."),
        found: found.replace('/', "."),
    })
}

/// What a native function sees of the calling thread
pub struct NativeEnv<'a> {
    thread: &'a mut dyn ThreadContext,
    linkage: &'a LinkageCache,
}

impl<'a> NativeEnv<'a> {
    pub fn new(thread: &'a mut dyn ThreadContext, linkage: &'a LinkageCache) -> Self {
        Self { thread, linkage }
    }

    #[inline]
    pub fn env_ptr(&self) -> EnvPtr {
        self.thread.env_ptr()
    }

    #[inline]
    pub fn thread_name(&self) -> &str {
        self.thread.thread_name()
    }

    /// Frame record as a stack walker would see it right now
    #[inline]
    pub fn frame_record(&self) -> FrameRecord {
        self.thread.current_frame_record()
    }

    #[inline]
    pub fn handle_stack_top(&self) -> Mark {
        self.thread.handle_stack_top()
    }

    /// Create a handle valid until the enclosing stub returns
    pub fn new_handle(&mut self, reference: Reference) -> Result<Handle, InvokeError> {
        self.thread.make_handle(reference)
    }

    pub fn unhand(&self, handle: Handle) -> Result<Reference, InvokeError> {
        self.thread.unhand(handle)
    }

    pub fn class_name_of(&self, handle: Handle) -> Result<Option<String>, InvokeError> {
        Ok(self.unhand(handle)?.and_then(|object| self.thread.class_name_of(object)))
    }

    /// Record `exception` as pending; the stub rethrows it after cleanup
    pub fn throw(&mut self, exception: ManagedException) {
        self.thread.set_pending_exception(exception);
    }

    #[inline]
    pub fn exception_check(&self) -> bool {
        self.thread.has_pending_exception()
    }

    /// Collector hook for natives that simulate a moving collection
    pub fn relocate(&mut self, from: ObjectRef, to: ObjectRef) -> usize {
        self.thread.relocate_references(from, to)
    }

    /// Run `f` with its own handle frame; handles it creates are freed on return
    pub fn with_local_frame<R>(&mut self, f: impl FnOnce(&mut NativeEnv<'_>) -> R) -> R {
        let linkage = self.linkage;
        let mut scope = HandleScope::enter(&mut *self.thread);
        let mut env = NativeEnv::new(&mut *scope, linkage);
        f(&mut env)
    }

    /// Call another native method through its stub from inside this one
    pub fn invoke(&mut self, stub: &Stub, args: &[Value]) -> Result<Value, InvokeError> {
        stub.invoke(&mut *self.thread, self.linkage, args)
    }
}
