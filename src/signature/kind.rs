//! Value kinds seen at the call boundary
//!
//! `ParameterKind` is the managed view of a value, `NativeKind` is what the
//! native callee actually receives once references have been handleized.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a managed parameter or result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ParameterKind {
    Byte,
    Boolean,
    Short,
    Char,
    Int,
    Float,
    Long,
    Double,
    Word,
    Reference,
    Void,
}

impl ParameterKind {
    /// Every kind, in declaration order
    pub const ALL: [ParameterKind; 11] = [
        Self::Byte,
        Self::Boolean,
        Self::Short,
        Self::Char,
        Self::Int,
        Self::Float,
        Self::Long,
        Self::Double,
        Self::Word,
        Self::Reference,
        Self::Void,
    ];

    /// Number of machine slots the value occupies
    #[inline]
    pub const fn slots(self) -> usize {
        match self {
            Self::Void => 0,
            Self::Long | Self::Double => 2,
            _ => 1,
        }
    }

    /// Only references are visible to the collector
    #[inline]
    pub const fn is_reference(self) -> bool {
        matches!(self, Self::Reference)
    }

    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float | Self::Double)
    }

    #[inline]
    pub const fn is_two_slot(self) -> bool {
        self.slots() == 2
    }

    /// Descriptor character (`L` stands in for every reference type)
    pub const fn descriptor_char(self) -> char {
        match self {
            Self::Byte => 'B',
            Self::Boolean => 'Z',
            Self::Short => 'S',
            Self::Char => 'C',
            Self::Int => 'I',
            Self::Float => 'F',
            Self::Long => 'J',
            Self::Double => 'D',
            Self::Word => 'W',
            Self::Reference => 'L',
            Self::Void => 'V',
        }
    }

    /// Primitive kind for a single descriptor character
    pub const fn from_primitive_char(c: char) -> Option<Self> {
        match c {
            'B' => Some(Self::Byte),
            'Z' => Some(Self::Boolean),
            'S' => Some(Self::Short),
            'C' => Some(Self::Char),
            'I' => Some(Self::Int),
            'F' => Some(Self::Float),
            'J' => Some(Self::Long),
            'D' => Some(Self::Double),
            'W' => Some(Self::Word),
            'V' => Some(Self::Void),
            _ => None,
        }
    }

    /// Kind passed to native code for a value of this kind
    #[inline]
    pub const fn to_native(self) -> NativeKind {
        match self {
            Self::Byte => NativeKind::Byte,
            Self::Boolean => NativeKind::Boolean,
            Self::Short => NativeKind::Short,
            Self::Char => NativeKind::Char,
            Self::Int => NativeKind::Int,
            Self::Float => NativeKind::Float,
            Self::Long => NativeKind::Long,
            Self::Double => NativeKind::Double,
            Self::Word => NativeKind::Word,
            Self::Reference => NativeKind::Handle,
            Self::Void => NativeKind::Void,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Byte => "byte",
            Self::Boolean => "boolean",
            Self::Short => "short",
            Self::Char => "char",
            Self::Int => "int",
            Self::Float => "float",
            Self::Long => "long",
            Self::Double => "double",
            Self::Word => "word",
            Self::Reference => "reference",
            Self::Void => "void",
        }
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Kind of a value as received by native code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum NativeKind {
    Byte,
    Boolean,
    Short,
    Char,
    Int,
    Float,
    Long,
    Double,
    Word,
    /// Pointer to the calling thread's native environment
    Env,
    /// Opaque handle standing in for a managed reference
    Handle,
    Void,
}

impl NativeKind {
    #[inline]
    pub const fn slots(self) -> usize {
        match self {
            Self::Void => 0,
            Self::Long | Self::Double => 2,
            _ => 1,
        }
    }

    pub const fn descriptor_char(self) -> char {
        match self {
            Self::Byte => 'B',
            Self::Boolean => 'Z',
            Self::Short => 'S',
            Self::Char => 'C',
            Self::Int => 'I',
            Self::Float => 'F',
            Self::Long => 'J',
            Self::Double => 'D',
            Self::Word => 'W',
            Self::Env => 'E',
            Self::Handle => 'H',
            Self::Void => 'V',
        }
    }

    /// Machine-level kind used when assigning locations; environment
    /// pointers and handles are plain words to the native ABI.
    #[inline]
    pub const fn machine_kind(self) -> ParameterKind {
        match self {
            Self::Byte => ParameterKind::Byte,
            Self::Boolean => ParameterKind::Boolean,
            Self::Short => ParameterKind::Short,
            Self::Char => ParameterKind::Char,
            Self::Int => ParameterKind::Int,
            Self::Float => ParameterKind::Float,
            Self::Long => ParameterKind::Long,
            Self::Double => ParameterKind::Double,
            Self::Word | Self::Env | Self::Handle => ParameterKind::Word,
            Self::Void => ParameterKind::Void,
        }
    }
}

impl fmt::Display for NativeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.descriptor_char())
    }
}
