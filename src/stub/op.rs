//! Stub operation vocabulary
//!
//! A stub is a straight-line sequence of these operations. A code-emission
//! back-end lowers each one to instructions; `Stub::invoke` executes them
//! directly.

use crate::signature::{HolderType, NativeKind, ParameterKind, SymbolNames};
use serde::Serialize;
use std::fmt;

/// Stub-local temporary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Local(pub u16);

impl fmt::Display for Local {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "l{}", self.0)
    }
}

/// When a trace operation fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceCheck {
    /// Unconditionally
    Always,
    /// Only while `dynamic_tracing_enabled()` holds at call time
    Dynamic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    /// Cache the current thread in `dst`
    CurrentThread { dst: Local },
    /// Write the `-->` trace record for `method`
    TraceEntry { check: TraceCheck, method: String },
    /// Save the handle stack top in `dst`
    SaveHandleMark { dst: Local },
    /// Snapshot the last-managed-frame record in `dst`
    SaveFrameRecord { dst: Local },
    /// Pass the thread's native environment pointer
    PushEnv,
    /// Pass a handle to the class mirror of `holder`
    HandleizeClass { holder: HolderType },
    /// Pass a handle to the receiver (managed argument 0)
    HandleizeReceiver,
    /// Pass managed argument `arg` through unchanged
    Load { arg: usize, kind: ParameterKind },
    /// Pass a handle to managed argument `arg`
    Handleize { arg: usize },
    /// Resolve the native entry point, binding it on first use
    Link { symbols: SymbolNames },
    /// Mark the saved frame as "in native code"; last write before the call
    TransitionToNative { frame: Local },
    /// Call the linked function with the marshaled arguments
    CallNative { arg_slots: usize, result: NativeKind },
    /// Restore the saved frame; first action after the call
    TransitionFromNative { frame: Local },
    /// Replace the handle result with its referent
    Unhand,
    /// Free every handle created since `mark` was saved
    RestoreHandleMark { mark: Local },
    /// Write the `<--` trace record for `method`
    TraceExit { check: TraceCheck, method: String },
    /// Rethrow (and clear) any exception native code left pending
    ThrowPendingException,
    /// Check the reference result against its declared class
    CheckCast { class: String },
    Return { kind: ParameterKind },
}

impl Op {
    /// Operations that add an entry to the handle stack
    #[inline]
    pub fn creates_handle(&self) -> bool {
        matches!(self, Self::HandleizeClass { .. } | Self::HandleizeReceiver | Self::Handleize { .. })
    }

    /// Operations that read or write the frame record
    #[inline]
    pub fn touches_frame_record(&self) -> bool {
        matches!(
            self,
            Self::SaveFrameRecord { .. } | Self::TransitionToNative { .. } | Self::TransitionFromNative { .. }
        )
    }

    /// Operations that read or write the handle stack
    #[inline]
    pub fn touches_handle_stack(&self) -> bool {
        self.creates_handle()
            || matches!(self, Self::SaveHandleMark { .. } | Self::RestoreHandleMark { .. } | Self::Unhand)
    }

    #[inline]
    pub fn is_trace(&self) -> bool {
        matches!(self, Self::TraceEntry { .. } | Self::TraceExit { .. })
    }

    /// Short mnemonic, as used in listings
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Self::CurrentThread { .. } => "current_thread",
            Self::TraceEntry { .. } => "trace_entry",
            Self::SaveHandleMark { .. } => "save_handle_mark",
            Self::SaveFrameRecord { .. } => "save_frame_record",
            Self::PushEnv => "push_env",
            Self::HandleizeClass { .. } => "handleize_class",
            Self::HandleizeReceiver => "handleize_receiver",
            Self::Load { .. } => "load",
            Self::Handleize { .. } => "handleize",
            Self::Link { .. } => "link",
            Self::TransitionToNative { .. } => "transition_to_native",
            Self::CallNative { .. } => "call_native",
            Self::TransitionFromNative { .. } => "transition_from_native",
            Self::Unhand => "unhand",
            Self::RestoreHandleMark { .. } => "restore_handle_mark",
            Self::TraceExit { .. } => "trace_exit",
            Self::ThrowPendingException => "throw_pending_exception",
            Self::CheckCast { .. } => "check_cast",
            Self::Return { .. } => "return",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())?;
        match self {
            Self::CurrentThread { dst } | Self::SaveHandleMark { dst } | Self::SaveFrameRecord { dst } => {
                write!(f, " {}", dst)
            }
            Self::TransitionToNative { frame } | Self::TransitionFromNative { frame } => {
                write!(f, " {}", frame)
            }
            Self::RestoreHandleMark { mark } => write!(f, " {}", mark),
            Self::TraceEntry { method, .. } | Self::TraceExit { method, .. } => write!(f, " {}", method),
            Self::HandleizeClass { holder } => write!(f, " {}", holder.binary_name()),
            Self::Load { arg, kind } => write!(f, " arg{}:{}", arg, kind),
            Self::Handleize { arg } => write!(f, " arg{}", arg),
            Self::Link { symbols } => write!(f, " {}", symbols.short),
            Self::CallNative { arg_slots, result } => write!(f, " slots={} result={}", arg_slots, result),
            Self::CheckCast { class } => write!(f, " {}", class),
            Self::Return { kind } => write!(f, " {}", kind),
            Self::PushEnv | Self::HandleizeReceiver | Self::Unhand | Self::ThrowPendingException => Ok(()),
        }
    }
}
