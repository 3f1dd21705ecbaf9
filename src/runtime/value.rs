//! Managed and native values crossing the boundary

use super::handles::Handle;
use crate::signature::{NativeKind, ParameterKind};
use core::num::NonZeroUsize;
use std::fmt;

/// Address of a managed object; may change whenever the collector runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ObjectRef(NonZeroUsize);

impl ObjectRef {
    #[inline]
    pub fn from_address(address: usize) -> Option<Self> {
        NonZeroUsize::new(address).map(Self)
    }

    #[inline]
    pub fn address(self) -> usize {
        self.0.get()
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.address())
    }
}

/// A possibly-null managed reference
pub type Reference = Option<ObjectRef>;

/// A value as seen by managed code
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Byte(i8),
    Boolean(bool),
    Short(i16),
    Char(u16),
    Int(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Word(usize),
    Reference(Reference),
    Void,
}

impl Value {
    pub fn kind(&self) -> ParameterKind {
        match self {
            Self::Byte(_) => ParameterKind::Byte,
            Self::Boolean(_) => ParameterKind::Boolean,
            Self::Short(_) => ParameterKind::Short,
            Self::Char(_) => ParameterKind::Char,
            Self::Int(_) => ParameterKind::Int,
            Self::Float(_) => ParameterKind::Float,
            Self::Long(_) => ParameterKind::Long,
            Self::Double(_) => ParameterKind::Double,
            Self::Word(_) => ParameterKind::Word,
            Self::Reference(_) => ParameterKind::Reference,
            Self::Void => ParameterKind::Void,
        }
    }

    #[inline]
    pub fn null() -> Self {
        Self::Reference(None)
    }

    #[inline]
    pub fn object(object: ObjectRef) -> Self {
        Self::Reference(Some(object))
    }

    pub fn as_reference(&self) -> Option<Reference> {
        match *self {
            Self::Reference(r) => Some(r),
            _ => None,
        }
    }

    /// Native counterpart of a non-reference value; references must be
    /// handleized instead and yield `None`
    pub fn to_native(self) -> Option<NativeValue> {
        Some(match self {
            Self::Byte(v) => NativeValue::Byte(v),
            Self::Boolean(v) => NativeValue::Boolean(v),
            Self::Short(v) => NativeValue::Short(v),
            Self::Char(v) => NativeValue::Char(v),
            Self::Int(v) => NativeValue::Int(v),
            Self::Float(v) => NativeValue::Float(v),
            Self::Long(v) => NativeValue::Long(v),
            Self::Double(v) => NativeValue::Double(v),
            Self::Word(v) => NativeValue::Word(v),
            Self::Void => NativeValue::Void,
            Self::Reference(_) => return None,
        })
    }
}

/// Opaque pointer to a thread's native environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnvPtr(pub usize);

/// A value as seen by native code
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NativeValue {
    Byte(i8),
    Boolean(bool),
    Short(i16),
    Char(u16),
    Int(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Word(usize),
    Env(EnvPtr),
    Handle(Handle),
    Void,
}

impl NativeValue {
    pub fn kind(&self) -> NativeKind {
        match self {
            Self::Byte(_) => NativeKind::Byte,
            Self::Boolean(_) => NativeKind::Boolean,
            Self::Short(_) => NativeKind::Short,
            Self::Char(_) => NativeKind::Char,
            Self::Int(_) => NativeKind::Int,
            Self::Float(_) => NativeKind::Float,
            Self::Long(_) => NativeKind::Long,
            Self::Double(_) => NativeKind::Double,
            Self::Word(_) => NativeKind::Word,
            Self::Env(_) => NativeKind::Env,
            Self::Handle(_) => NativeKind::Handle,
            Self::Void => NativeKind::Void,
        }
    }

    pub fn as_handle(&self) -> Option<Handle> {
        match *self {
            Self::Handle(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match *self {
            Self::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match *self {
            Self::Long(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match *self {
            Self::Double(v) => Some(v),
            _ => None,
        }
    }

    /// Managed counterpart of a non-handle value; handles must be unhanded
    /// and environment pointers never flow back to managed code
    pub fn to_managed(self) -> Option<Value> {
        Some(match self {
            Self::Byte(v) => Value::Byte(v),
            Self::Boolean(v) => Value::Boolean(v),
            Self::Short(v) => Value::Short(v),
            Self::Char(v) => Value::Char(v),
            Self::Int(v) => Value::Int(v),
            Self::Float(v) => Value::Float(v),
            Self::Long(v) => Value::Long(v),
            Self::Double(v) => Value::Double(v),
            Self::Word(v) => Value::Word(v),
            Self::Void => Value::Void,
            Self::Env(_) | Self::Handle(_) => return None,
        })
    }
}
