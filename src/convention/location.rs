//! Argument locations and finished call layouts

use super::abi::{CallingConvention, FrameSide, Register};
use crate::signature::ParameterKind;
use serde::Serialize;
use smallvec::SmallVec;
use std::fmt;

/// Where one argument lives during a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Location {
    Register {
        reg: Register,
        kind: ParameterKind,
    },
    /// Two-slot value on a 32-bit target, held in two consecutive registers
    RegisterPair {
        low: Register,
        high: Register,
        kind: ParameterKind,
    },
    StackSlot {
        offset: usize,
        size: usize,
        frame: FrameSide,
        kind: ParameterKind,
    },
}

impl Location {
    #[inline]
    pub fn kind(&self) -> ParameterKind {
        match *self {
            Self::Register { kind, .. }
            | Self::RegisterPair { kind, .. }
            | Self::StackSlot { kind, .. } => kind,
        }
    }

    #[inline]
    pub fn is_stack(&self) -> bool {
        matches!(self, Self::StackSlot { .. })
    }

    #[inline]
    pub fn is_register(&self) -> bool {
        !self.is_stack()
    }

    /// Byte extent `(offset, offset + size)` for stack slots
    pub fn stack_extent(&self) -> Option<(usize, usize)> {
        match *self {
            Self::StackSlot { offset, size, .. } => Some((offset, offset + size)),
            _ => None,
        }
    }

    pub fn is_caller_frame(&self) -> bool {
        matches!(self, Self::StackSlot { frame: FrameSide::Caller, .. })
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Register { reg, kind } => write!(f, "{}:{}", reg, kind),
            Self::RegisterPair { low, high, kind } => write!(f, "{}+{}:{}", low, high, kind),
            Self::StackSlot { offset, frame, kind, .. } => {
                let base = match frame {
                    FrameSide::Current => "stack",
                    FrameSide::Caller => "caller-stack",
                };
                write!(f, "{}+{}:{}", base, offset, kind)
            }
        }
    }
}

/// Location assignment for one signature under one convention
///
/// Immutable once built and carries no per-call state, so it can be shared
/// freely between threads and call sites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallLayout {
    convention: CallingConvention,
    side: FrameSide,
    locations: SmallVec<[Location; 8]>,
    overflow_size: usize,
}

impl CallLayout {
    pub(super) fn new(
        convention: CallingConvention,
        side: FrameSide,
        locations: SmallVec<[Location; 8]>,
    ) -> Self {
        let overflow_size = locations
            .iter()
            .filter_map(Location::stack_extent)
            .map(|(_, end)| end)
            .max()
            .unwrap_or(0);

        Self {
            convention,
            side,
            locations,
            overflow_size,
        }
    }

    #[inline]
    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    #[inline]
    pub fn location(&self, index: usize) -> Option<&Location> {
        self.locations.get(index)
    }

    /// Bytes of stack needed for arguments that did not fit in registers
    #[inline]
    pub fn overflow_size(&self) -> usize {
        self.overflow_size
    }

    #[inline]
    pub fn convention(&self) -> CallingConvention {
        self.convention
    }

    #[inline]
    pub fn side(&self) -> FrameSide {
        self.side
    }

    pub fn register_count(&self) -> usize {
        self.locations.iter().filter(|l| l.is_register()).count()
    }

    pub fn stack_count(&self) -> usize {
        self.locations.iter().filter(|l| l.is_stack()).count()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

impl fmt::Display for CallLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CallingConvention[")?;
        for location in &self.locations {
            write!(f, "{} ", location)?;
        }
        f.write_str("]")
    }
}
