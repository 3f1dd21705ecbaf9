//! Method signature descriptors
//!
//! Parses JVM-style descriptors such as `(IJLjava/lang/String;[B)V` into
//! kinds while keeping the original text around for symbol mangling and
//! result casts.

use super::kind::ParameterKind;
use crate::error::PreconditionError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary name of the class whose reference every untyped reference uses
pub const OBJECT_CLASS: &str = "java/lang/Object";

/// A single parameter or result type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeDescriptor {
    kind: ParameterKind,
    text: String,
}

impl TypeDescriptor {
    /// Descriptor for a primitive or word kind, or `java/lang/Object` for references
    pub fn of_kind(kind: ParameterKind) -> Self {
        let text = match kind {
            ParameterKind::Reference => format!("L{};", OBJECT_CLASS),
            other => other.descriptor_char().to_string(),
        };
        Self { kind, text }
    }

    /// Descriptor for a class reference given its binary name
    pub fn class(binary_name: &str) -> Self {
        Self {
            kind: ParameterKind::Reference,
            text: format!("L{};", binary_name.replace('.', "/")),
        }
    }

    #[inline]
    pub fn kind(&self) -> ParameterKind {
        self.kind
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Binary class name for plain class references, `None` for primitives and arrays
    pub fn class_name(&self) -> Option<&str> {
        self.text
            .strip_prefix('L')
            .and_then(|rest| rest.strip_suffix(';'))
    }

    /// True for `Ljava/lang/Object;`
    pub fn is_object(&self) -> bool {
        self.class_name() == Some(OBJECT_CLASS)
    }

    /// Source-level spelling: `int`, `java.lang.String`, `byte[]`
    pub fn java_name(&self) -> String {
        let dims = self.text.chars().take_while(|&c| c == '[').count();
        let element = &self.text[dims..];
        let base = match element.strip_prefix('L').and_then(|s| s.strip_suffix(';')) {
            Some(class) => class.replace('/', "."),
            None => element
                .chars()
                .next()
                .and_then(ParameterKind::from_primitive_char)
                .map(|k| k.name().to_string())
                .unwrap_or_else(|| element.to_string()),
        };
        let mut name = base;
        for _ in 0..dims {
            name.push_str("[]");
        }
        name
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Parameter and result types of a method
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignatureDescriptor {
    parameters: Vec<TypeDescriptor>,
    result: TypeDescriptor,
}

impl SignatureDescriptor {
    /// Parse a descriptor of the form `(<params>)<result>`
    pub fn parse(text: &str) -> Result<Self, PreconditionError> {
        let malformed = |position: usize| PreconditionError::MalformedDescriptor {
            descriptor: text.to_string(),
            position,
        };

        let bytes = text.as_bytes();
        if bytes.first() != Some(&b'(') {
            return Err(malformed(0));
        }

        let mut pos = 1;
        let mut parameters = Vec::new();
        while pos < bytes.len() && bytes[pos] != b')' {
            let (ty, next) = parse_type(text, pos).ok_or_else(|| malformed(pos))?;
            parameters.push(ty);
            pos = next;
        }
        if pos >= bytes.len() {
            return Err(malformed(pos));
        }
        pos += 1;

        let (result, end) = parse_type(text, pos).ok_or_else(|| malformed(pos))?;
        if end != bytes.len() {
            return Err(malformed(end));
        }

        Ok(Self { parameters, result })
    }

    /// Build a descriptor from bare kinds; references become `java/lang/Object`
    pub fn from_kinds(parameters: &[ParameterKind], result: ParameterKind) -> Self {
        Self {
            parameters: parameters.iter().copied().map(TypeDescriptor::of_kind).collect(),
            result: TypeDescriptor::of_kind(result),
        }
    }

    pub fn new(parameters: Vec<TypeDescriptor>, result: TypeDescriptor) -> Self {
        Self { parameters, result }
    }

    #[inline]
    pub fn parameters(&self) -> &[TypeDescriptor] {
        &self.parameters
    }

    #[inline]
    pub fn number_of_parameters(&self) -> usize {
        self.parameters.len()
    }

    #[inline]
    pub fn result(&self) -> &TypeDescriptor {
        &self.result
    }

    pub fn parameter_kinds(&self) -> impl Iterator<Item = ParameterKind> + '_ {
        self.parameters.iter().map(TypeDescriptor::kind)
    }

    #[inline]
    pub fn result_kind(&self) -> ParameterKind {
        self.result.kind
    }

    /// Text between the parentheses, used by the long mangled symbol form
    pub fn parameters_text(&self) -> String {
        self.parameters.iter().map(TypeDescriptor::as_str).collect()
    }
}

impl fmt::Display for SignatureDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}){}", self.parameters_text(), self.result)
    }
}

/// Parse one type starting at `pos`, returning it and the index just past it
fn parse_type(text: &str, pos: usize) -> Option<(TypeDescriptor, usize)> {
    let bytes = text.as_bytes();
    let mut end = pos;
    while end < bytes.len() && bytes[end] == b'[' {
        end += 1;
    }
    let is_array = end > pos;

    match *bytes.get(end)? {
        b'L' => {
            let close = text[end..].find(';')? + end;
            if close == end + 1 {
                return None;
            }
            let ty = TypeDescriptor {
                kind: ParameterKind::Reference,
                text: text[pos..=close].to_string(),
            };
            Some((ty, close + 1))
        }
        c => {
            let primitive = ParameterKind::from_primitive_char(c as char)?;
            if is_array && matches!(primitive, ParameterKind::Void | ParameterKind::Word) {
                return None;
            }
            let kind = if is_array { ParameterKind::Reference } else { primitive };
            let ty = TypeDescriptor {
                kind,
                text: text[pos..=end].to_string(),
            };
            Some((ty, end + 1))
        }
    }
}

/// The class declaring a native method
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HolderType {
    binary_name: String,
}

impl HolderType {
    /// Accepts either `java/lang/Thread` or `java.lang.Thread`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            binary_name: name.into().replace('.', "/"),
        }
    }

    #[inline]
    pub fn binary_name(&self) -> &str {
        &self.binary_name
    }

    pub fn java_name(&self) -> String {
        self.binary_name.replace('/', ".")
    }
}

impl fmt::Display for HolderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.java_name())
    }
}

/// A method whose body is implemented in native code
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NativeMethod {
    pub holder: HolderType,
    pub name: String,
    pub signature: SignatureDescriptor,
    pub is_static: bool,
}

impl NativeMethod {
    pub fn new(
        holder: HolderType,
        name: impl Into<String>,
        signature: SignatureDescriptor,
        is_static: bool,
    ) -> Self {
        Self {
            holder,
            name: name.into(),
            signature,
            is_static,
        }
    }

    /// Parses `descriptor`; fails on malformed text
    pub fn parse(
        holder: &str,
        name: &str,
        descriptor: &str,
        is_static: bool,
    ) -> Result<Self, PreconditionError> {
        let signature = SignatureDescriptor::parse(descriptor)?;
        Ok(Self::new(HolderType::new(holder), name, signature, is_static))
    }

    /// `java.lang.Thread.sleep(long)` style rendering used in trace records
    pub fn qualified_name(&self) -> String {
        let params: Vec<String> = self
            .signature
            .parameters()
            .iter()
            .map(TypeDescriptor::java_name)
            .collect();
        format!("{}.{}({})", self.holder.java_name(), self.name, params.join(", "))
    }
}

impl fmt::Display for NativeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified_name())
    }
}
