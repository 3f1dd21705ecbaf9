//! Last-managed-frame record read by the stack walker

use std::fmt;

/// Stack pointer, frame pointer and instruction pointer of the most recent
/// managed frame on a thread
///
/// A zero instruction pointer over a non-zero stack pointer means the
/// thread is executing native code above that frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FrameRecord {
    pub sp: usize,
    pub fp: usize,
    pub pc: usize,
}

impl FrameRecord {
    /// No managed frame recorded
    pub const EMPTY: FrameRecord = FrameRecord { sp: 0, fp: 0, pc: 0 };

    #[inline]
    pub const fn new(sp: usize, fp: usize, pc: usize) -> Self {
        Self { sp, fp, pc }
    }

    /// Same frame, marked as having transferred control to native code
    #[inline]
    pub const fn in_native(self) -> Self {
        Self { pc: 0, ..self }
    }

    #[inline]
    pub const fn is_in_native(&self) -> bool {
        self.pc == 0 && self.sp != 0
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.sp == 0 && self.fp == 0 && self.pc == 0
    }
}

impl fmt::Display for FrameRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[sp={:#x} fp={:#x} pc={:#x}]", self.sp, self.fp, self.pc)
    }
}

/// Thread state as a stack walker would classify it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Managed,
    Native,
}

impl ExecutionState {
    pub fn of(record: &FrameRecord) -> Self {
        if record.is_in_native() {
            Self::Native
        } else {
            Self::Managed
        }
    }
}
