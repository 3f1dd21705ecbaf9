//! Native-side signature of a stub's callee

use crate::signature::NativeKind;
use serde::Serialize;
use smallvec::SmallVec;
use std::fmt;

/// What the native function actually receives, e.g. `(EHIH)J`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct NativeSignature {
    parameters: SmallVec<[NativeKind; 8]>,
    result: NativeKind,
}

impl NativeSignature {
    pub(super) fn new(result: NativeKind) -> Self {
        Self {
            parameters: SmallVec::new(),
            result,
        }
    }

    pub(super) fn push(&mut self, kind: NativeKind) {
        self.parameters.push(kind);
    }

    #[inline]
    pub fn parameters(&self) -> &[NativeKind] {
        &self.parameters
    }

    #[inline]
    pub fn result(&self) -> NativeKind {
        self.result
    }

    /// Machine slots occupied by the parameters
    pub fn arg_slots(&self) -> usize {
        self.parameters.iter().map(|k| k.slots()).sum()
    }

    /// Descriptor text, also available through `Display`
    pub fn descriptor(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for NativeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for kind in &self.parameters {
            write!(f, "{}", kind)?;
        }
        write!(f, "){}", self.result)
    }
}
