//! Register allocation strategy for argument passing

use super::abi::{Register, RegisterClass, RegisterFile};
use crate::signature::ParameterKind;

/// Registers handed to one argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    Single(Register),
    Pair(Register, Register),
    Stack,
}

/// Tracks register consumption while walking a signature left to right
pub struct RegisterAllocator {
    file: RegisterFile,
    int_regs_used: usize,
    fp_regs_used: usize,
    /// Next argument position, for positional ABIs
    position: usize,
    int_spilled: bool,
    fp_spilled: bool,
}

impl RegisterAllocator {
    /// Create allocator for a register file
    #[inline]
    pub const fn new(file: RegisterFile) -> Self {
        Self {
            file,
            int_regs_used: 0,
            fp_regs_used: 0,
            position: 0,
            int_spilled: false,
            fp_spilled: false,
        }
    }

    /// Register class an argument of `kind` draws from
    #[inline]
    pub fn class_of(&self, kind: ParameterKind) -> RegisterClass {
        if kind.is_float() && !self.file.float.is_empty() {
            RegisterClass::Float
        } else {
            RegisterClass::Integer
        }
    }

    /// Number of registers (and stack words) the kind needs
    #[inline]
    pub fn words_for(&self, kind: ParameterKind) -> usize {
        if self.file.word_size >= 8 {
            1
        } else {
            kind.slots()
        }
    }

    /// Assign the next argument. The value either gets every register it
    /// needs or goes to the stack whole; once a class has spilled, later
    /// arguments of that class spill too.
    pub fn assign(&mut self, kind: ParameterKind) -> Assignment {
        let class = self.class_of(kind);
        let words = self.words_for(kind);

        if self.file.positional {
            let position = self.position;
            self.position += 1;
            return match self.file.registers(class).get(position) {
                Some(&reg) if words == 1 => Assignment::Single(reg),
                _ => Assignment::Stack,
            };
        }

        let regs = self.file.registers(class);
        let (used, spilled) = match class {
            RegisterClass::Integer => (&mut self.int_regs_used, &mut self.int_spilled),
            RegisterClass::Float => (&mut self.fp_regs_used, &mut self.fp_spilled),
        };

        if *spilled || *used + words > regs.len() {
            *spilled = true;
            return Assignment::Stack;
        }

        let first = regs[*used];
        let assignment = if words == 2 {
            Assignment::Pair(first, regs[*used + 1])
        } else {
            Assignment::Single(first)
        };
        *used += words;
        assignment
    }

    /// Reset for new call
    #[inline]
    pub fn reset(&mut self) {
        self.int_regs_used = 0;
        self.fp_regs_used = 0;
        self.position = 0;
        self.int_spilled = false;
        self.fp_spilled = false;
    }
}
