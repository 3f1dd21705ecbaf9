//! The finished stub

use super::generator::LinkageKind;
use super::interp;
use super::op::Op;
use super::signature::NativeSignature;
use crate::convention::{resolve, Abi, CallLayout, CallingConvention, FrameSide};
use crate::error::InvokeError;
use crate::linker::LinkageCache;
use crate::runtime::{ThreadContext, Value};
use crate::signature::{NativeMethod, ParameterKind, SymbolNames};
use serde::Serialize;
use std::fmt;

/// Transition code for one native method; immutable and shared by every
/// invocation of that method
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stub {
    method: NativeMethod,
    linkage: LinkageKind,
    ops: Vec<Op>,
    native_signature: NativeSignature,
    arg_slots: usize,
    max_locals: u16,
}

impl Stub {
    pub(super) fn new(
        method: NativeMethod,
        linkage: LinkageKind,
        ops: Vec<Op>,
        native_signature: NativeSignature,
        arg_slots: usize,
        max_locals: u16,
    ) -> Self {
        Self {
            method,
            linkage,
            ops,
            native_signature,
            arg_slots,
            max_locals,
        }
    }

    #[inline]
    pub fn method(&self) -> &NativeMethod {
        &self.method
    }

    #[inline]
    pub fn linkage(&self) -> LinkageKind {
        self.linkage
    }

    #[inline]
    pub fn is_lightweight(&self) -> bool {
        self.linkage == LinkageKind::Lightweight
    }

    #[inline]
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    #[inline]
    pub fn native_signature(&self) -> &NativeSignature {
        &self.native_signature
    }

    /// Machine slots of the native argument list
    #[inline]
    pub fn arg_slots(&self) -> usize {
        self.arg_slots
    }

    #[inline]
    pub fn max_locals(&self) -> usize {
        usize::from(self.max_locals)
    }

    /// Symbols the `Link` operation searches for
    pub fn symbols(&self) -> Option<&SymbolNames> {
        self.ops.iter().find_map(|op| match op {
            Op::Link { symbols } => Some(symbols),
            _ => None,
        })
    }

    /// Kinds of the managed arguments, receiver first for instance methods
    pub fn managed_parameter_kinds(&self) -> Vec<ParameterKind> {
        let receiver = (!self.method.is_static).then_some(ParameterKind::Reference);
        receiver
            .into_iter()
            .chain(self.method.signature.parameter_kinds())
            .collect()
    }

    /// Handles the stub itself creates per call (result handle not included)
    pub fn handle_count(&self) -> usize {
        self.ops.iter().filter(|op| op.creates_handle()).count()
    }

    /// Where the native arguments go under the platform convention of `abi`
    pub fn native_layout(&self, abi: Abi) -> CallLayout {
        let kinds: Vec<ParameterKind> = self
            .native_signature
            .parameters()
            .iter()
            .map(|k| k.machine_kind())
            .collect();
        resolve(&kinds, CallingConvention::native(abi), FrameSide::Current)
    }

    /// Machine-readable listing for a code-emission back-end
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Run the stub on `thread`
    ///
    /// The thread's handle stack depth and frame record are back to their
    /// pre-call values when this returns, whatever the outcome.
    pub fn invoke(
        &self,
        thread: &mut dyn ThreadContext,
        linkage: &LinkageCache,
        args: &[Value],
    ) -> Result<Value, InvokeError> {
        interp::execute(self, thread, linkage, args)
    }
}

impl fmt::Display for Stub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "stub {} {:?} native {}", self.method, self.linkage, self.native_signature)?;
        for (i, op) in self.ops.iter().enumerate() {
            writeln!(f, "  {:>2}: {}", i, op)?;
        }
        Ok(())
    }
}
