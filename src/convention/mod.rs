//! Calling conventions - where arguments live during a call
//!
//! Design: pure resolution from a kind sequence to register and stack
//! locations, memoised per (kinds, convention, frame side).
//!
//! Architecture:
//! - `abi.rs` - register files per ABI and convention variant
//! - `allocator.rs` - left-to-right register consumption
//! - `location.rs` - `Location` and `CallLayout`
//! - `resolver.rs` - `resolve`
//! - `cache.rs` - concurrent layout memoisation

mod abi;
mod allocator;
mod location;
mod resolver;
mod cache;

pub use abi::{Abi, CallingConvention, ConventionKind, FrameSide, Register, RegisterClass, RegisterFile};
pub use allocator::{Assignment, RegisterAllocator};
pub use location::{CallLayout, Location};
pub use resolver::resolve;
pub use cache::{LayoutCache, LayoutCacheStats};
