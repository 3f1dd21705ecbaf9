//! Location assignment for a sequence of parameter kinds

use super::abi::{CallingConvention, FrameSide};
use super::allocator::{Assignment, RegisterAllocator};
use super::location::{CallLayout, Location};
use crate::signature::ParameterKind;
use smallvec::SmallVec;

/// Assign a location to every argument of `kinds`
///
/// Arguments are visited in declaration order. Register-eligible arguments
/// take registers first come first served; the rest are packed onto the stack
/// at increasing offsets, each sized to its kind's width in words.
///
/// # Panics
/// If `kinds` contains `void`. Callers are expected to have validated the
/// signature already.
pub fn resolve(kinds: &[ParameterKind], convention: CallingConvention, side: FrameSide) -> CallLayout {
    let file = convention.register_file();
    let mut allocator = RegisterAllocator::new(file);
    let mut locations: SmallVec<[Location; 8]> = SmallVec::with_capacity(kinds.len());
    let mut stack_offset = 0;

    for (index, &kind) in kinds.iter().enumerate() {
        assert!(
            kind != ParameterKind::Void,
            "argument {} has kind void and cannot be assigned a location",
            index
        );

        let location = match allocator.assign(kind) {
            Assignment::Single(reg) => Location::Register { reg, kind },
            Assignment::Pair(low, high) => Location::RegisterPair { low, high, kind },
            Assignment::Stack => {
                let size = allocator.words_for(kind) * file.word_size;
                let offset = stack_offset;
                stack_offset += size;
                Location::StackSlot {
                    offset,
                    size,
                    frame: side,
                    kind,
                }
            }
        };
        locations.push(location);
    }

    CallLayout::new(convention, side, locations)
}
