//! Stub synthesis
//!
//! Standard linkage, in order:
//! 1. cache the current thread, trace entry, save handle mark and frame record
//! 2. pass the environment pointer, then a handle to the receiver or class
//! 3. pass parameters, handleizing references
//! 4. link, mark in-native, call, mark managed
//! 5. unhand a reference result, restore the handle mark, trace exit
//! 6. rethrow any pending exception, cast the result, return
//!
//! Lightweight linkage keeps only parameter passing, link, call and return.

use super::op::{Local, Op, TraceCheck};
use super::signature::NativeSignature;
use super::code::Stub;
use crate::config::StubConfig;
use crate::error::PreconditionError;
use crate::logging::{self, perf};
use crate::signature::{NativeKind, NativeMethod, ParameterKind, SymbolNames};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Process-wide switch consulted by `TraceCheck::Dynamic` operations
static DYNAMIC_TRACING: AtomicBool = AtomicBool::new(false);

/// Turn tracing on or off for stubs generated with `TraceMode::Dynamic`
pub fn set_dynamic_tracing(enabled: bool) {
    DYNAMIC_TRACING.store(enabled, Ordering::Relaxed);
}

#[inline]
pub fn dynamic_tracing_enabled() -> bool {
    DYNAMIC_TRACING.load(Ordering::Relaxed)
}

/// Whether generated stubs carry trace operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceMode {
    #[default]
    Off,
    /// Trace on every call
    Always,
    /// Trace while `set_dynamic_tracing(true)` is in effect
    Dynamic,
}

impl TraceMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "off" | "false" | "0" => Some(Self::Off),
            "always" | "on" | "true" | "1" => Some(Self::Always),
            "dynamic" => Some(Self::Dynamic),
            _ => None,
        }
    }

    fn check(self) -> Option<TraceCheck> {
        match self {
            Self::Off => None,
            Self::Always => Some(TraceCheck::Always),
            Self::Dynamic => Some(TraceCheck::Dynamic),
        }
    }
}

/// Permission to call a native function without GC bookkeeping
///
/// Only obtainable through `assume_gc_safe`, so every lightweight call site
/// names the `unsafe` promise it relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Lightweight {
    _private: (),
}

impl Lightweight {
    /// # Safety
    ///
    /// The callee must not block, must not allocate managed objects or call
    /// back into managed code, and must never let a collection start while
    /// it runs. The thread stays in the managed state for the whole call, so
    /// a stack walk during the call would misread its frames.
    pub const unsafe fn assume_gc_safe() -> Self {
        Self { _private: () }
    }
}

/// How a stub reaches its native function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Linkage {
    Standard,
    Lightweight(Lightweight),
}

impl Linkage {
    #[inline]
    pub fn kind(self) -> LinkageKind {
        match self {
            Self::Standard => LinkageKind::Standard,
            Self::Lightweight(_) => LinkageKind::Lightweight,
        }
    }
}

/// `Linkage` without the capability, for reporting and cache keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkageKind {
    Standard,
    Lightweight,
}

/// Synthesize a stub without tracing
pub fn synthesize(method: &NativeMethod, linkage: Linkage) -> Result<Stub, PreconditionError> {
    StubGenerator::new(TraceMode::Off).synthesize(method, linkage)
}

/// Builds native stubs and memoises them per (method, linkage)
pub struct StubGenerator {
    trace: TraceMode,
    stubs: DashMap<(NativeMethod, LinkageKind), Arc<Stub>>,
}

impl StubGenerator {
    pub fn new(trace: TraceMode) -> Self {
        Self {
            trace,
            stubs: DashMap::new(),
        }
    }

    pub fn from_config(config: &StubConfig) -> Self {
        Self::new(config.trace)
    }

    #[inline]
    pub fn trace_mode(&self) -> TraceMode {
        self.trace
    }

    /// Cached stub for `method`, synthesized on first request
    pub fn stub_for(&self, method: &NativeMethod, linkage: Linkage) -> Result<Arc<Stub>, PreconditionError> {
        let key = (method.clone(), linkage.kind());
        if let Some(stub) = self.stubs.get(&key) {
            return Ok(Arc::clone(stub.value()));
        }
        let stub = Arc::new(self.synthesize(method, linkage)?);
        Ok(Arc::clone(self.stubs.entry(key).or_insert(stub).value()))
    }

    pub fn cached(&self) -> usize {
        self.stubs.len()
    }

    /// Build a fresh stub. Every precondition is checked before the first
    /// operation is emitted.
    pub fn synthesize(&self, method: &NativeMethod, linkage: Linkage) -> Result<Stub, PreconditionError> {
        let _perf = perf::track("stub_synthesis");
        validate(method, linkage)?;

        let stub = match linkage {
            Linkage::Standard => Assembler::new(method, self.trace).standard(),
            Linkage::Lightweight(_) => Assembler::new(method, TraceMode::Off).lightweight(),
        };

        logging::log_stub_generated(
            &method.qualified_name(),
            stub.is_lightweight(),
            stub.ops().len(),
            stub.arg_slots(),
        );
        Ok(stub)
    }
}

impl Default for StubGenerator {
    fn default() -> Self {
        Self::new(TraceMode::Off)
    }
}

fn validate(method: &NativeMethod, linkage: Linkage) -> Result<(), PreconditionError> {
    let kinds: Vec<ParameterKind> = method.signature.parameter_kinds().collect();

    if let Some(index) = kinds.iter().position(|&k| k == ParameterKind::Void) {
        return Err(PreconditionError::VoidParameter { index });
    }

    if let Linkage::Lightweight(_) = linkage {
        if !method.is_static {
            return Err(PreconditionError::LightweightInstance);
        }
        if let Some(index) = kinds.iter().position(|k| k.is_reference()) {
            return Err(PreconditionError::ReferenceInLightweight { index });
        }
        if method.signature.result_kind().is_reference() {
            return Err(PreconditionError::LightweightReferenceResult);
        }
    }
    Ok(())
}

/// Accumulates operations and the native signature for one stub
struct Assembler<'m> {
    method: &'m NativeMethod,
    trace: Option<TraceCheck>,
    ops: Vec<Op>,
    native: NativeSignature,
    arg_slots: usize,
    locals: u16,
}

impl<'m> Assembler<'m> {
    fn new(method: &'m NativeMethod, trace: TraceMode) -> Self {
        Self {
            method,
            trace: trace.check(),
            ops: Vec::with_capacity(16 + method.signature.number_of_parameters()),
            native: NativeSignature::new(method.signature.result_kind().to_native()),
            arg_slots: 0,
            locals: 0,
        }
    }

    fn allocate_local(&mut self) -> Local {
        let local = Local(self.locals);
        self.locals += 1;
        local
    }

    fn emit(&mut self, op: Op) {
        self.ops.push(op);
    }

    fn pass(&mut self, kind: NativeKind) {
        self.native.push(kind);
        self.arg_slots += kind.slots();
    }

    fn trace_entry(&mut self) {
        if let Some(check) = self.trace {
            let method = self.method.qualified_name();
            self.emit(Op::TraceEntry { check, method });
        }
    }

    fn trace_exit(&mut self) {
        if let Some(check) = self.trace {
            let method = self.method.qualified_name();
            self.emit(Op::TraceExit { check, method });
        }
    }

    /// Parameters in declaration order; managed argument indices start
    /// after the receiver of an instance method
    fn parameters(&mut self) {
        let first = usize::from(!self.method.is_static);
        let kinds: Vec<ParameterKind> = self.method.signature.parameter_kinds().collect();
        for (i, kind) in kinds.into_iter().enumerate() {
            let arg = first + i;
            if kind.is_reference() {
                self.emit(Op::Handleize { arg });
            } else {
                self.emit(Op::Load { arg, kind });
            }
            self.pass(kind.to_native());
        }
    }

    fn link_and_call(&mut self, frame: Option<Local>) {
        self.emit(Op::Link {
            symbols: SymbolNames::for_method(self.method),
        });
        if let Some(frame) = frame {
            self.emit(Op::TransitionToNative { frame });
        }
        self.emit(Op::CallNative {
            arg_slots: self.arg_slots,
            result: self.native.result(),
        });
        if let Some(frame) = frame {
            self.emit(Op::TransitionFromNative { frame });
        }
    }

    fn standard(mut self) -> Stub {
        let result = self.method.signature.result().clone();

        let thread = self.allocate_local();
        self.emit(Op::CurrentThread { dst: thread });
        self.trace_entry();

        let mark = self.allocate_local();
        self.emit(Op::SaveHandleMark { dst: mark });
        let frame = self.allocate_local();
        self.emit(Op::SaveFrameRecord { dst: frame });

        self.emit(Op::PushEnv);
        self.pass(NativeKind::Env);

        if self.method.is_static {
            self.emit(Op::HandleizeClass {
                holder: self.method.holder.clone(),
            });
        } else {
            self.emit(Op::HandleizeReceiver);
        }
        self.pass(NativeKind::Handle);

        self.parameters();
        self.link_and_call(Some(frame));

        // must precede the mark restore, which frees the result handle
        if result.kind().is_reference() {
            self.emit(Op::Unhand);
        }
        self.emit(Op::RestoreHandleMark { mark });
        self.trace_exit();
        self.emit(Op::ThrowPendingException);

        if result.kind().is_reference() && !result.is_object() {
            let class = result.class_name().unwrap_or(result.as_str()).to_string();
            self.emit(Op::CheckCast { class });
        }
        self.emit(Op::Return { kind: result.kind() });

        self.finish(LinkageKind::Standard)
    }

    fn lightweight(mut self) -> Stub {
        self.parameters();
        self.link_and_call(None);
        let kind = self.method.signature.result_kind();
        self.emit(Op::Return { kind });
        self.finish(LinkageKind::Lightweight)
    }

    fn finish(self, linkage: LinkageKind) -> Stub {
        debug_assert_eq!(self.arg_slots, self.native.arg_slots());
        Stub::new(
            self.method.clone(),
            linkage,
            self.ops,
            self.native,
            self.arg_slots,
            self.locals,
        )
    }
}
