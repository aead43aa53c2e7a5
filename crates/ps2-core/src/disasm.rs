//! Instruction disassembly for the R5900 integer subset.
//!
//! Converts raw instruction words into MIPS assembly text for the debug
//! rendering and host tooling.

use crate::decoder::{DecodedInstruction, DecodedOrFault, Decoder};
use crate::encoding::OpcodeEncoding;
use crate::memory::{AccessWidth, MemoryBus};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Width of every instruction in bytes.
pub const INSTRUCTION_BYTES: u32 = 4;

/// A single disassembled instruction row.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DisassemblyRow {
    /// Address of this instruction.
    pub addr: u32,
    /// Raw instruction word.
    pub word: u32,
    /// Lower-case mnemonic (e.g. `addiu`), or `.word` for illegal words.
    pub mnemonic: String,
    /// Formatted operands (e.g. `sp, sp, -16`).
    pub operands: String,
    /// Whether this word is outside the implemented subset.
    pub is_illegal: bool,
}

impl DisassemblyRow {
    /// Mnemonic and operands joined into one line.
    #[must_use]
    pub fn text(&self) -> String {
        if self.operands.is_empty() {
            self.mnemonic.clone()
        } else {
            format!("{} {}", self.mnemonic, self.operands)
        }
    }
}

/// Disassembles `word` as if it were fetched from `pc`.
///
/// Branch and jump operands are rendered as absolute targets.
#[must_use]
pub fn disassemble(word: u32, pc: u32) -> DisassemblyRow {
    match Decoder::decode(word) {
        DecodedOrFault::Fault(_) => DisassemblyRow {
            addr: pc,
            word,
            mnemonic: ".word".to_string(),
            operands: format!("0x{word:08x} ; ILLEGAL"),
            is_illegal: true,
        },
        DecodedOrFault::Instruction(instr) => {
            let (mnemonic, operands) = if word == 0 {
                ("nop".to_string(), String::new())
            } else {
                (instr.encoding.mnemonic().to_string(), format_operands(&instr, pc))
            };
            DisassemblyRow {
                addr: pc,
                word,
                mnemonic,
                operands,
                is_illegal: false,
            }
        }
    }
}

/// Disassembles `before` instructions ahead of `center_pc`, the center, and
/// `after` instructions following it.
///
/// Words are read with [`MemoryBus::peek`], so IO state is never disturbed.
/// Addresses that do not resolve are omitted.
#[must_use]
pub fn disassemble_window(
    bus: &MemoryBus,
    center_pc: u32,
    before: u32,
    after: u32,
) -> Vec<DisassemblyRow> {
    let start = center_pc.wrapping_sub(before.saturating_mul(INSTRUCTION_BYTES));
    (0..=before.saturating_add(after))
        .map(|i| start.wrapping_add(i.wrapping_mul(INSTRUCTION_BYTES)))
        .filter_map(|pc| {
            let word = u32::try_from(bus.peek(pc, AccessWidth::Word)?).ok()?;
            Some(disassemble(word, pc))
        })
        .collect()
}

fn reg(r: crate::state::Gpr) -> &'static str {
    r.name()
}

#[allow(clippy::too_many_lines)]
fn format_operands(instr: &DecodedInstruction, pc: u32) -> String {
    use OpcodeEncoding as E;

    let (rs, rt, rd) = (reg(instr.rs), reg(instr.rt), reg(instr.rd));
    let simm = i16::from_ne_bytes(instr.imm.to_ne_bytes());

    match instr.encoding {
        E::Sll
        | E::Srl
        | E::Sra
        | E::Dsll
        | E::Dsrl
        | E::Dsra
        | E::Dsll32
        | E::Dsrl32
        | E::Dsra32 => format!("{rd}, {rt}, {}", instr.sa),
        E::Sllv | E::Srlv | E::Srav | E::Dsllv | E::Dsrlv | E::Dsrav => {
            format!("{rd}, {rt}, {rs}")
        }
        E::Jr | E::Mthi | E::Mtlo => rs.to_string(),
        E::Jalr => {
            if instr.rd == crate::state::Gpr::Ra {
                rs.to_string()
            } else {
                format!("{rd}, {rs}")
            }
        }
        E::Mfhi | E::Mflo => rd.to_string(),
        E::Syscall | E::Break => {
            let code = instr.trap_code();
            if code == 0 {
                String::new()
            } else {
                format!("0x{code:x}")
            }
        }
        E::Sync | E::Tlbr | E::Tlbwi | E::Tlbwr | E::Tlbp | E::Eret | E::Ei | E::Di => {
            String::new()
        }
        E::Mult | E::Multu => {
            if instr.rd == crate::state::Gpr::Zero {
                format!("{rs}, {rt}")
            } else {
                format!("{rd}, {rs}, {rt}")
            }
        }
        E::Div | E::Divu => format!("{rs}, {rt}"),
        E::Movz
        | E::Movn
        | E::Add
        | E::Addu
        | E::Sub
        | E::Subu
        | E::And
        | E::Or
        | E::Xor
        | E::Nor
        | E::Slt
        | E::Sltu
        | E::Dadd
        | E::Daddu
        | E::Dsub
        | E::Dsubu => format!("{rd}, {rs}, {rt}"),
        E::Bltz
        | E::Bgez
        | E::Bltzl
        | E::Bgezl
        | E::Bltzal
        | E::Bgezal
        | E::Bltzall
        | E::Bgezall
        | E::Blez
        | E::Bgtz
        | E::Blezl
        | E::Bgtzl => format!("{rs}, 0x{:08x}", instr.branch_target(pc)),
        E::Beq | E::Bne | E::Beql | E::Bnel => {
            format!("{rs}, {rt}, 0x{:08x}", instr.branch_target(pc))
        }
        E::J | E::Jal => format!("0x{:08x}", instr.jump_target(pc)),
        E::Addi | E::Addiu | E::Slti | E::Sltiu | E::Daddi | E::Daddiu => {
            format!("{rt}, {rs}, {simm}")
        }
        E::Andi | E::Ori | E::Xori => format!("{rt}, {rs}, 0x{:x}", instr.imm),
        E::Lui => format!("{rt}, 0x{:x}", instr.imm),
        E::Lb
        | E::Lh
        | E::Lw
        | E::Lbu
        | E::Lhu
        | E::Lwu
        | E::Ld
        | E::Sb
        | E::Sh
        | E::Sw
        | E::Sd => format!("{rt}, {simm}({rs})"),
        E::Cache => format!("0x{:x}, {simm}({rs})", instr.rt.index()),
        E::Pref => format!("{}, {simm}({rs})", instr.rt.index()),
        E::Mfc0 | E::Mtc0 => format!("{rt}, ${}", instr.cop0_reg()),
    }
}
