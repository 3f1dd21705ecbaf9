//! Runtime collaborators - what a stub needs from the managed runtime
//!
//! Design: the reference service and execution context are traits so that
//! a real VM can plug in its own heap and thread structures. `VmThread` and
//! `ObjectSpace` are in-process implementations used by the stub
//! interpreter and the tests.
//!
//! Architecture:
//! - `context.rs` - collaborator traits and `ManagedException`
//! - `handles.rs` - handle stack, marks, `HandleScope` guard
//! - `frame.rs` - last-managed-frame record
//! - `value.rs` - managed and native values
//! - `objects.rs` - object identity, classes, relocation
//! - `thread.rs` - `VmThread`

mod context;
mod frame;
mod handles;
mod objects;
mod thread;
mod value;

pub use context::{ExecutionContext, ManagedException, ReferenceService, ThreadContext};
pub use frame::{ExecutionState, FrameRecord};
pub use handles::{Handle, HandleScope, HandleStack, Mark};
pub use objects::{ObjectSpace, CLASS_CLASS};
pub use thread::VmThread;
pub use value::{EnvPtr, NativeValue, ObjectRef, Reference, Value};
