//! ABI register files
//!
//! Supports the argument-passing registers of several targets and the
//! convention variants built on top of them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Register bank an argument is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegisterClass {
    Integer,
    Float,
}

/// A physical argument register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Register {
    pub name: &'static str,
    pub number: u8,
    pub class: RegisterClass,
}

impl Register {
    const fn int(name: &'static str, number: u8) -> Self {
        Self { name, number, class: RegisterClass::Integer }
    }

    const fn float(name: &'static str, number: u8) -> Self {
        Self { name, number, class: RegisterClass::Float }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

const SYSV_INT: [Register; 6] = [
    Register::int("rdi", 7),
    Register::int("rsi", 6),
    Register::int("rdx", 2),
    Register::int("rcx", 1),
    Register::int("r8", 8),
    Register::int("r9", 9),
];

const SYSV_FLOAT: [Register; 8] = [
    Register::float("xmm0", 0),
    Register::float("xmm1", 1),
    Register::float("xmm2", 2),
    Register::float("xmm3", 3),
    Register::float("xmm4", 4),
    Register::float("xmm5", 5),
    Register::float("xmm6", 6),
    Register::float("xmm7", 7),
];

const WIN64_INT: [Register; 4] = [
    Register::int("rcx", 1),
    Register::int("rdx", 2),
    Register::int("r8", 8),
    Register::int("r9", 9),
];

const WIN64_FLOAT: [Register; 4] = [
    Register::float("xmm0", 0),
    Register::float("xmm1", 1),
    Register::float("xmm2", 2),
    Register::float("xmm3", 3),
];

const AARCH64_INT: [Register; 8] = [
    Register::int("x0", 0),
    Register::int("x1", 1),
    Register::int("x2", 2),
    Register::int("x3", 3),
    Register::int("x4", 4),
    Register::int("x5", 5),
    Register::int("x6", 6),
    Register::int("x7", 7),
];

const AARCH64_FLOAT: [Register; 8] = [
    Register::float("v0", 0),
    Register::float("v1", 1),
    Register::float("v2", 2),
    Register::float("v3", 3),
    Register::float("v4", 4),
    Register::float("v5", 5),
    Register::float("v6", 6),
    Register::float("v7", 7),
];

const AAPCS_INT: [Register; 4] = [
    Register::int("r0", 0),
    Register::int("r1", 1),
    Register::int("r2", 2),
    Register::int("r3", 3),
];

/// Target ABI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Abi {
    /// System V AMD64 ABI (Unix x86-64)
    SysV,
    /// Microsoft x64 calling convention (Windows)
    Win64,
    /// ARM64 procedure call standard
    Aarch64,
    /// ARM AAPCS, 32-bit soft-float
    Aapcs,
}

impl Abi {
    /// ABI of the machine this crate was compiled for
    #[inline]
    pub const fn host() -> Self {
        #[cfg(all(target_arch = "x86_64", target_os = "windows"))]
        return Self::Win64;

        #[cfg(all(target_arch = "x86_64", not(target_os = "windows")))]
        return Self::SysV;

        #[cfg(target_arch = "aarch64")]
        return Self::Aarch64;

        #[cfg(target_arch = "arm")]
        return Self::Aapcs;

        #[cfg(not(any(
            target_arch = "x86_64",
            target_arch = "aarch64",
            target_arch = "arm"
        )))]
        return Self::SysV;
    }

    /// Bytes per machine slot
    #[inline]
    pub const fn word_size(self) -> usize {
        match self {
            Self::Aapcs => 4,
            _ => 8,
        }
    }

    #[inline]
    pub const fn integer_registers(self) -> &'static [Register] {
        match self {
            Self::SysV => &SYSV_INT,
            Self::Win64 => &WIN64_INT,
            Self::Aarch64 => &AARCH64_INT,
            Self::Aapcs => &AAPCS_INT,
        }
    }

    #[inline]
    pub const fn float_registers(self) -> &'static [Register] {
        match self {
            Self::SysV => &SYSV_FLOAT,
            Self::Win64 => &WIN64_FLOAT,
            Self::Aarch64 => &AARCH64_FLOAT,
            Self::Aapcs => &[],
        }
    }

    /// Win64 assigns registers by argument position: the n-th argument
    /// uses the n-th register of its class or goes to the stack.
    #[inline]
    pub const fn is_positional(self) -> bool {
        matches!(self, Self::Win64)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::SysV => "sysv",
            Self::Win64 => "win64",
            Self::Aarch64 => "aarch64",
            Self::Aapcs => "aapcs",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "sysv" | "system-v" => Some(Self::SysV),
            "win64" | "windows" => Some(Self::Win64),
            "aarch64" | "arm64" => Some(Self::Aarch64),
            "aapcs" | "arm" => Some(Self::Aapcs),
            _ => None,
        }
    }
}

impl Default for Abi {
    #[inline]
    fn default() -> Self {
        Self::host()
    }
}

impl fmt::Display for Abi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which kind of call the convention describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConventionKind {
    /// Compiled managed code calling compiled managed code
    Managed,
    /// Compiled code calling into the runtime; the first integer argument
    /// register carries the current thread and is not available to arguments
    Runtime,
    /// Stub calling a native function under the platform C ABI
    Native,
}

/// Whether stack locations live in the frame being built or in the caller's
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameSide {
    /// Outgoing arguments, addressed from the current stack pointer
    Current,
    /// Incoming arguments, addressed from the caller's stack pointer
    Caller,
}

/// A convention variant on a concrete ABI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallingConvention {
    pub abi: Abi,
    pub kind: ConventionKind,
}

impl CallingConvention {
    #[inline]
    pub const fn new(abi: Abi, kind: ConventionKind) -> Self {
        Self { abi, kind }
    }

    #[inline]
    pub const fn managed(abi: Abi) -> Self {
        Self::new(abi, ConventionKind::Managed)
    }

    #[inline]
    pub const fn runtime(abi: Abi) -> Self {
        Self::new(abi, ConventionKind::Runtime)
    }

    #[inline]
    pub const fn native(abi: Abi) -> Self {
        Self::new(abi, ConventionKind::Native)
    }

    /// Registers available to arguments under this convention
    pub fn register_file(&self) -> RegisterFile {
        let integer = self.abi.integer_registers();
        let float = self.abi.float_registers();
        let positional = self.abi.is_positional();
        let (integer, float) = match self.kind {
            ConventionKind::Managed | ConventionKind::Native => (integer, float),
            // the thread pointer takes position 0 of both classes on positional ABIs
            ConventionKind::Runtime if positional => (&integer[1..], &float[1..]),
            ConventionKind::Runtime => (&integer[1..], float),
        };
        RegisterFile {
            integer,
            float,
            positional,
            word_size: self.abi.word_size(),
        }
    }
}

impl Default for CallingConvention {
    #[inline]
    fn default() -> Self {
        Self::managed(Abi::host())
    }
}

impl fmt::Display for CallingConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ConventionKind::Managed => "managed",
            ConventionKind::Runtime => "runtime",
            ConventionKind::Native => "native",
        };
        write!(f, "{}/{}", self.abi, kind)
    }
}

/// Argument registers of one convention
#[derive(Debug, Clone, Copy)]
pub struct RegisterFile {
    pub integer: &'static [Register],
    pub float: &'static [Register],
    pub positional: bool,
    pub word_size: usize,
}

impl RegisterFile {
    #[inline]
    pub fn registers(&self, class: RegisterClass) -> &'static [Register] {
        match class {
            RegisterClass::Integer => self.integer,
            RegisterClass::Float => self.float,
        }
    }
}
