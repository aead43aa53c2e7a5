//! Instruction decoder for the R5900 integer subset.
//!
//! Splits a raw 32-bit word into its fields once so the execute stage and the
//! disassembler never re-derive them.

#![allow(missing_docs)]

use crate::encoding::{classify_opcode, OpcodeEncoding};
use crate::fault::FaultCode;
use crate::state::Gpr;

/// Decoded instruction with all fields extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedInstruction {
    /// Implemented encoding.
    pub encoding: OpcodeEncoding,
    /// Raw instruction word.
    pub word: u32,
    pub rs: Gpr,
    pub rt: Gpr,
    pub rd: Gpr,
    /// Shift amount field (bits 10..6).
    pub sa: u32,
    /// Raw 16-bit immediate.
    pub imm: u16,
    /// 26-bit jump target field.
    pub target: u32,
}

impl DecodedInstruction {
    /// Immediate sign-extended to 64 bits.
    #[must_use]
    pub const fn simm(self) -> u64 {
        self.imm as i16 as i64 as u64
    }

    /// Immediate zero-extended to 64 bits.
    #[must_use]
    pub const fn zimm(self) -> u64 {
        self.imm as u64
    }

    /// Branch target for a branch at `pc`: `pc + 4 + (simm << 2)`.
    #[must_use]
    pub const fn branch_target(self, pc: u32) -> u32 {
        let offset = ((self.imm as i16 as i32) << 2) as u32;
        pc.wrapping_add(4).wrapping_add(offset)
    }

    /// Jump target for `J`/`JAL` at `pc`, within the delay slot's 256 MiB segment.
    #[must_use]
    pub const fn jump_target(self, pc: u32) -> u32 {
        (pc.wrapping_add(4) & 0xF000_0000) | (self.target << 2)
    }

    /// COP0 register number held in the `rd` field.
    #[must_use]
    pub const fn cop0_reg(self) -> usize {
        self.rd.index()
    }

    /// `SYSCALL`/`BREAK` code field (bits 25..6).
    #[must_use]
    pub const fn trap_code(self) -> u32 {
        (self.word >> 6) & 0x000F_FFFF
    }
}

/// Result of decoding an instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodedOrFault {
    /// Successfully decoded instruction.
    Instruction(DecodedInstruction),
    /// Decoding failed with a fault.
    Fault(FaultCode),
}

impl DecodedOrFault {
    /// Returns the decoded instruction if present.
    #[must_use]
    pub const fn instruction(self) -> Option<DecodedInstruction> {
        match self {
            Self::Instruction(i) => Some(i),
            Self::Fault(_) => None,
        }
    }

    /// Returns the fault if decoding failed.
    #[must_use]
    pub const fn fault(self) -> Option<FaultCode> {
        match self {
            Self::Instruction(_) => None,
            Self::Fault(f) => Some(f),
        }
    }
}

impl From<DecodedOrFault> for Result<DecodedInstruction, FaultCode> {
    fn from(value: DecodedOrFault) -> Self {
        match value {
            DecodedOrFault::Instruction(i) => Ok(i),
            DecodedOrFault::Fault(code) => Err(code),
        }
    }
}

/// Instruction decoder.
pub struct Decoder;

impl Decoder {
    /// Decodes a 32-bit instruction word.
    ///
    /// Words outside the implemented subset decode to
    /// [`FaultCode::IllegalInstruction`].
    #[must_use]
    pub fn decode(word: u32) -> DecodedOrFault {
        let Some(encoding) = classify_opcode(word) else {
            return DecodedOrFault::Fault(FaultCode::IllegalInstruction);
        };

        DecodedOrFault::Instruction(DecodedInstruction {
            encoding,
            word,
            rs: Gpr::from_u5(word >> 21),
            rt: Gpr::from_u5(word >> 16),
            rd: Gpr::from_u5(word >> 11),
            sa: (word >> 6) & 0x1F,
            imm: (word & 0xFFFF) as u16,
            target: word & 0x03FF_FFFF,
        })
    }
}
