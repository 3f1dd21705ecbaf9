//! Native-call stubs - the managed-to-native transition for one method
//!
//! Design: synthesis produces an immutable `Stub` (an operation list plus
//! the native signature it calls with). Emitting machine code from it is a
//! back-end concern; `Stub::invoke` executes the operations directly against
//! runtime collaborators.
//!
//! Architecture:
//! - `op.rs` - operation vocabulary
//! - `signature.rs` - native-side signature descriptor
//! - `generator.rs` - linkage kinds, tracing modes, `synthesize`
//! - `code.rs` - `Stub`
//! - `interp.rs` - operation execution and `NativeEnv`

mod op;
mod signature;
mod generator;
mod code;
mod interp;

pub use op::{Local, Op, TraceCheck};
pub use signature::NativeSignature;
pub use generator::{
    dynamic_tracing_enabled, set_dynamic_tracing, synthesize, Lightweight, Linkage, LinkageKind, StubGenerator,
    TraceMode,
};
pub use code::Stub;
pub use interp::NativeEnv;

#[cfg(test)]
mod tests;
