//! Instruction execution pipeline for the R5900 integer subset.
//!
//! Every instruction runs in two phases:
//! 1. Execute: read operands, compute results, perform loads, and validate
//!    any store, accumulating every side effect in an [`ExecuteState`]
//! 2. Commit: perform the store, write registers, then advance the PC pair
//!
//! A fault in phase 1 discards the [`ExecuteState`], so a faulting
//! instruction leaves no partial side effects behind.

#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::too_many_lines,
    missing_docs
)]

mod helpers;

pub use helpers::{
    checked_add32, checked_add64, checked_sub32, checked_sub64, effective_address, sext16, sext32,
    sext8, signed_divide, split_product, unsigned_divide,
};

use crate::api::StepOutcome;
use crate::decoder::{DecodedInstruction, Decoder};
use crate::encoding::OpcodeEncoding;
use crate::fault::FaultCode;
use crate::memory::{AccessWidth, MemoryBus};
use crate::state::{cop0, ArchitecturalState, Gpr};
use crate::timing::instruction_cycles;

/// Outcome of executing a single instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteOutcome {
    /// Instruction may retire with this cycle cost.
    Retired {
        /// Fixed cycle cost consumed.
        cycles: u64,
    },
    /// Fault was raised during execution.
    Fault {
        /// Fault code.
        cause: FaultCode,
    },
}

/// How the PC pair advances once the instruction commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlFlow {
    /// Fall through to `next_pc`.
    #[default]
    Sequential,
    /// Delay-slot owner; the slot runs next, then `target` if taken.
    Branch { target: u32, taken: bool },
    /// Branch-likely not taken: the delay slot is skipped.
    Nullify,
    /// Immediate transfer with no delay slot (`ERET`).
    Return { target: u32 },
}

/// Store validated during execute and performed at commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingStore {
    pub addr: u32,
    pub width: AccessWidth,
    pub value: u64,
}

/// Side effects accumulated while executing one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecuteState {
    /// General-purpose register write.
    pub dest: Option<(Gpr, u64)>,
    /// `HI` write.
    pub hi: Option<u64>,
    /// `LO` write.
    pub lo: Option<u64>,
    /// COP0 register write.
    pub cop0_write: Option<(usize, u32)>,
    /// Store to perform at commit.
    pub store: Option<PendingStore>,
    /// Data address touched, kept for fault records.
    pub memory_addr: Option<u32>,
    /// PC advance rule.
    pub control: ControlFlow,
    /// Cycle cost for this instruction.
    pub cycles: u64,
}

impl ExecuteState {
    /// Creates an execute state with the given cycle cost.
    #[must_use]
    pub fn new(cycles: u64) -> Self {
        Self {
            cycles,
            ..Self::default()
        }
    }

    fn write(&mut self, reg: Gpr, value: u64) {
        self.dest = Some((reg, value));
    }

    fn branch(&mut self, instr: &DecodedInstruction, pc: u32, taken: bool) {
        self.control = if !taken && instr.encoding.is_likely() {
            ControlFlow::Nullify
        } else {
            ControlFlow::Branch {
                target: instr.branch_target(pc),
                taken,
            }
        };
    }
}

/// Executes a single instruction without committing anything.
///
/// Loads are performed here. Stores are only validated, so the caller can
/// discard the returned state on fault with memory untouched.
pub fn execute_instruction(
    instr: &DecodedInstruction,
    arch: &ArchitecturalState,
    bus: &mut MemoryBus,
) -> (ExecuteOutcome, ExecuteState) {
    let mut exec = ExecuteState::new(instruction_cycles(instr.encoding));
    match dispatch(instr, arch, bus, &mut exec) {
        Ok(()) => (
            ExecuteOutcome::Retired {
                cycles: exec.cycles,
            },
            exec,
        ),
        Err(cause) => (ExecuteOutcome::Fault { cause }, exec),
    }
}

fn dispatch(
    instr: &DecodedInstruction,
    arch: &ArchitecturalState,
    bus: &mut MemoryBus,
    exec: &mut ExecuteState,
) -> Result<(), FaultCode> {
    use OpcodeEncoding as E;

    let pc = arch.pc();
    let rs = arch.gpr(instr.rs);
    let rt = arch.gpr(instr.rt);
    let sa = instr.sa;

    match instr.encoding {
        // Shifts
        E::Sll => exec.write(instr.rd, sext32(u64::from((rt as u32) << sa))),
        E::Srl => exec.write(instr.rd, sext32(u64::from((rt as u32) >> sa))),
        E::Sra => exec.write(instr.rd, ((rt as i32) >> sa) as i64 as u64),
        E::Sllv => exec.write(instr.rd, sext32(u64::from((rt as u32) << (rs & 0x1F)))),
        E::Srlv => exec.write(instr.rd, sext32(u64::from((rt as u32) >> (rs & 0x1F)))),
        E::Srav => exec.write(instr.rd, ((rt as i32) >> (rs & 0x1F)) as i64 as u64),
        E::Dsllv => exec.write(instr.rd, rt << (rs & 0x3F)),
        E::Dsrlv => exec.write(instr.rd, rt >> (rs & 0x3F)),
        E::Dsrav => exec.write(instr.rd, ((rt as i64) >> (rs & 0x3F)) as u64),
        E::Dsll => exec.write(instr.rd, rt << sa),
        E::Dsrl => exec.write(instr.rd, rt >> sa),
        E::Dsra => exec.write(instr.rd, ((rt as i64) >> sa) as u64),
        E::Dsll32 => exec.write(instr.rd, rt << (sa + 32)),
        E::Dsrl32 => exec.write(instr.rd, rt >> (sa + 32)),
        E::Dsra32 => exec.write(instr.rd, ((rt as i64) >> (sa + 32)) as u64),

        // Register jumps
        E::Jr => {
            exec.control = ControlFlow::Branch {
                target: rs as u32,
                taken: true,
            };
        }
        E::Jalr => {
            exec.write(instr.rd, sext32(u64::from(pc.wrapping_add(8))));
            exec.control = ControlFlow::Branch {
                target: rs as u32,
                taken: true,
            };
        }

        // Conditional moves
        E::Movz => {
            if rt == 0 {
                exec.write(instr.rd, rs);
            }
        }
        E::Movn => {
            if rt != 0 {
                exec.write(instr.rd, rs);
            }
        }

        E::Syscall => return Err(FaultCode::SystemCall),
        E::Break => return Err(FaultCode::Breakpoint),
        E::Sync | E::Cache | E::Pref | E::Tlbr | E::Tlbwi | E::Tlbwr | E::Tlbp => {}

        // HI/LO
        E::Mfhi => exec.write(instr.rd, arch.hi()),
        E::Mthi => exec.hi = Some(rs),
        E::Mflo => exec.write(instr.rd, arch.lo()),
        E::Mtlo => exec.lo = Some(rs),
        E::Mult => {
            let product = (i64::from(rs as i32) * i64::from(rt as i32)) as u64;
            let (lo, hi) = split_product(product);
            exec.lo = Some(lo);
            exec.hi = Some(hi);
            exec.write(instr.rd, lo);
        }
        E::Multu => {
            let product = u64::from(rs as u32) * u64::from(rt as u32);
            let (lo, hi) = split_product(product);
            exec.lo = Some(lo);
            exec.hi = Some(hi);
            exec.write(instr.rd, lo);
        }
        E::Div => {
            let (lo, hi) = signed_divide(rs, rt);
            exec.lo = Some(lo);
            exec.hi = Some(hi);
        }
        E::Divu => {
            let (lo, hi) = unsigned_divide(rs, rt);
            exec.lo = Some(lo);
            exec.hi = Some(hi);
        }

        // Three-register ALU
        E::Add => exec.write(instr.rd, checked_add32(rs, rt).ok_or(FaultCode::IntegerOverflow)?),
        E::Addu => exec.write(instr.rd, sext32(rs.wrapping_add(rt))),
        E::Sub => exec.write(instr.rd, checked_sub32(rs, rt).ok_or(FaultCode::IntegerOverflow)?),
        E::Subu => exec.write(instr.rd, sext32(rs.wrapping_sub(rt))),
        E::And => exec.write(instr.rd, rs & rt),
        E::Or => exec.write(instr.rd, rs | rt),
        E::Xor => exec.write(instr.rd, rs ^ rt),
        E::Nor => exec.write(instr.rd, !(rs | rt)),
        E::Slt => exec.write(instr.rd, u64::from((rs as i64) < (rt as i64))),
        E::Sltu => exec.write(instr.rd, u64::from(rs < rt)),
        E::Dadd => exec.write(instr.rd, checked_add64(rs, rt).ok_or(FaultCode::IntegerOverflow)?),
        E::Daddu => exec.write(instr.rd, rs.wrapping_add(rt)),
        E::Dsub => exec.write(instr.rd, checked_sub64(rs, rt).ok_or(FaultCode::IntegerOverflow)?),
        E::Dsubu => exec.write(instr.rd, rs.wrapping_sub(rt)),

        // REGIMM branches
        E::Bltz | E::Bltzl => exec.branch(instr, pc, (rs as i64) < 0),
        E::Bgez | E::Bgezl => exec.branch(instr, pc, (rs as i64) >= 0),
        E::Bltzal | E::Bltzall => {
            exec.write(Gpr::Ra, sext32(u64::from(pc.wrapping_add(8))));
            exec.branch(instr, pc, (rs as i64) < 0);
        }
        E::Bgezal | E::Bgezall => {
            exec.write(Gpr::Ra, sext32(u64::from(pc.wrapping_add(8))));
            exec.branch(instr, pc, (rs as i64) >= 0);
        }

        // Jumps and two-register branches
        E::J => {
            exec.control = ControlFlow::Branch {
                target: instr.jump_target(pc),
                taken: true,
            };
        }
        E::Jal => {
            exec.write(Gpr::Ra, sext32(u64::from(pc.wrapping_add(8))));
            exec.control = ControlFlow::Branch {
                target: instr.jump_target(pc),
                taken: true,
            };
        }
        E::Beq | E::Beql => exec.branch(instr, pc, rs == rt),
        E::Bne | E::Bnel => exec.branch(instr, pc, rs != rt),
        E::Blez | E::Blezl => exec.branch(instr, pc, (rs as i64) <= 0),
        E::Bgtz | E::Bgtzl => exec.branch(instr, pc, (rs as i64) > 0),

        // Immediate ALU
        E::Addi => exec.write(
            instr.rt,
            checked_add32(rs, instr.simm()).ok_or(FaultCode::IntegerOverflow)?,
        ),
        E::Addiu => exec.write(instr.rt, sext32(rs.wrapping_add(instr.simm()))),
        E::Slti => exec.write(instr.rt, u64::from((rs as i64) < (instr.simm() as i64))),
        E::Sltiu => exec.write(instr.rt, u64::from(rs < instr.simm())),
        E::Andi => exec.write(instr.rt, rs & instr.zimm()),
        E::Ori => exec.write(instr.rt, rs | instr.zimm()),
        E::Xori => exec.write(instr.rt, rs ^ instr.zimm()),
        E::Lui => exec.write(instr.rt, sext32(instr.zimm() << 16)),
        E::Daddi => exec.write(
            instr.rt,
            checked_add64(rs, instr.simm()).ok_or(FaultCode::IntegerOverflow)?,
        ),
        E::Daddiu => exec.write(instr.rt, rs.wrapping_add(instr.simm())),

        // Loads
        E::Lb => load(instr, arch, bus, exec, AccessWidth::Byte, sext8)?,
        E::Lbu => load(instr, arch, bus, exec, AccessWidth::Byte, identity)?,
        E::Lh => load(instr, arch, bus, exec, AccessWidth::Halfword, sext16)?,
        E::Lhu => load(instr, arch, bus, exec, AccessWidth::Halfword, identity)?,
        E::Lw => load(instr, arch, bus, exec, AccessWidth::Word, sext32)?,
        E::Lwu => load(instr, arch, bus, exec, AccessWidth::Word, identity)?,
        E::Ld => load(instr, arch, bus, exec, AccessWidth::Doubleword, identity)?,

        // Stores
        E::Sb => store(instr, arch, bus, exec, AccessWidth::Byte)?,
        E::Sh => store(instr, arch, bus, exec, AccessWidth::Halfword)?,
        E::Sw => store(instr, arch, bus, exec, AccessWidth::Word)?,
        E::Sd => store(instr, arch, bus, exec, AccessWidth::Doubleword)?,

        // COP0
        E::Mfc0 => exec.write(instr.rt, sext32(u64::from(arch.cop0(instr.cop0_reg())))),
        E::Mtc0 => exec.cop0_write = Some((instr.cop0_reg(), rt as u32)),
        E::Eret => {
            let status = arch.cop0(cop0::STATUS);
            if status & cop0::STATUS_ERL != 0 {
                exec.cop0_write = Some((cop0::STATUS, status & !cop0::STATUS_ERL));
                exec.control = ControlFlow::Return {
                    target: arch.cop0(cop0::ERROR_EPC),
                };
            } else {
                exec.cop0_write = Some((cop0::STATUS, status & !cop0::STATUS_EXL));
                exec.control = ControlFlow::Return {
                    target: arch.cop0(cop0::EPC),
                };
            }
        }
        E::Ei => {
            exec.cop0_write = Some((cop0::STATUS, arch.cop0(cop0::STATUS) | cop0::STATUS_EIE));
        }
        E::Di => {
            exec.cop0_write = Some((cop0::STATUS, arch.cop0(cop0::STATUS) & !cop0::STATUS_EIE));
        }
    }

    Ok(())
}

const fn identity(value: u64) -> u64 {
    value
}

fn load(
    instr: &DecodedInstruction,
    arch: &ArchitecturalState,
    bus: &mut MemoryBus,
    exec: &mut ExecuteState,
    width: AccessWidth,
    extend: fn(u64) -> u64,
) -> Result<(), FaultCode> {
    let addr = effective_address(instr, arch);
    exec.memory_addr = Some(addr);
    let raw = bus.read(addr, width)?;
    exec.write(instr.rt, extend(raw));
    Ok(())
}

fn store(
    instr: &DecodedInstruction,
    arch: &ArchitecturalState,
    bus: &MemoryBus,
    exec: &mut ExecuteState,
    width: AccessWidth,
) -> Result<(), FaultCode> {
    let addr = effective_address(instr, arch);
    exec.memory_addr = Some(addr);
    bus.check_write(addr, width)?;
    exec.store = Some(PendingStore {
        addr,
        width,
        value: arch.gpr(instr.rt) & width.value_mask(),
    });
    Ok(())
}

/// Applies the side effects accumulated by [`execute_instruction`].
///
/// The store runs first so a rejected store leaves registers untouched.
///
/// # Errors
///
/// Propagates a store rejected by the bus.
pub fn commit_execution(
    arch: &mut ArchitecturalState,
    bus: &mut MemoryBus,
    exec: &ExecuteState,
) -> Result<(), FaultCode> {
    if let Some(store) = exec.store {
        bus.write(store.addr, store.width, store.value)?;
    }

    if let Some((reg, value)) = exec.dest {
        arch.set_gpr(reg, value);
    }
    if let Some(hi) = exec.hi {
        arch.set_hi(hi);
    }
    if let Some(lo) = exec.lo {
        arch.set_lo(lo);
    }
    if let Some((reg, value)) = exec.cop0_write {
        arch.set_cop0(reg, value);
    }

    let next_pc = arch.next_pc();
    match exec.control {
        ControlFlow::Sequential => arch.set_pc_pair(next_pc, next_pc.wrapping_add(4), false),
        ControlFlow::Branch { target, taken } => {
            let after = if taken {
                target
            } else {
                next_pc.wrapping_add(4)
            };
            arch.set_pc_pair(next_pc, after, true);
        }
        ControlFlow::Nullify => {
            let resume = next_pc.wrapping_add(4);
            arch.set_pc_pair(resume, resume.wrapping_add(4), false);
        }
        ControlFlow::Return { target } => arch.jump_to(target),
    }

    arch.retire(exec.cycles);
    Ok(())
}

/// Fetches, decodes, executes, and commits one instruction, then advances IO.
///
/// On fault nothing is committed and the PC pair still names the faulting
/// instruction.
pub fn step_one(arch: &mut ArchitecturalState, bus: &mut MemoryBus) -> StepOutcome {
    let pc = arch.pc();
    let word = match bus.fetch(pc) {
        Ok(word) => word,
        Err(cause) => {
            return StepOutcome::Fault {
                cause,
                address: Some(pc),
            };
        }
    };

    let instruction = match Result::<DecodedInstruction, FaultCode>::from(Decoder::decode(word)) {
        Ok(instruction) => instruction,
        Err(cause) => {
            return StepOutcome::Fault {
                cause,
                address: None,
            };
        }
    };

    let (outcome, exec) = execute_instruction(&instruction, arch, bus);
    match outcome {
        ExecuteOutcome::Retired { cycles } => {
            if let Err(cause) = commit_execution(arch, bus, &exec) {
                return StepOutcome::Fault {
                    cause,
                    address: exec.memory_addr,
                };
            }
            bus.tick_io(cycles);
            tracing::trace!(
                pc = format_args!("{pc:#010x}"),
                word = format_args!("{word:#010x}"),
                op = instruction.encoding.mnemonic(),
                "retired"
            );
            StepOutcome::Retired { cycles }
        }
        ExecuteOutcome::Fault { cause } => StepOutcome::Fault {
            cause,
            address: exec.memory_addr,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firmware::{FirmwareKind, FirmwareStore};
    use crate::memory::RegionTable;
    use rstest::rstest;

    const RESET: u32 = 0xBFC0_0000;

    fn decode_instr(word: u32) -> DecodedInstruction {
        Decoder::decode(word).instruction().expect("should decode")
    }

    fn machine(program: &[u32]) -> (ArchitecturalState, MemoryBus) {
        let bytes: Vec<u8> = program.iter().flat_map(|w| w.to_le_bytes()).collect();
        let mut store = FirmwareStore::new();
        store.load(FirmwareKind::Rom, &bytes).expect("rom");
        let mut bus = MemoryBus::new();
        bus.install_table(RegionTable::build(&store).expect("table"));
        (ArchitecturalState::reset(RESET), bus)
    }

    fn run(arch: &mut ArchitecturalState, bus: &mut MemoryBus, steps: usize) {
        for _ in 0..steps {
            assert!(matches!(step_one(arch, bus), StepOutcome::Retired { .. }));
        }
    }

    fn exec_alone(word: u32, arch: &ArchitecturalState) -> (ExecuteOutcome, ExecuteState) {
        let mut bus = MemoryBus::new();
        execute_instruction(&decode_instr(word), arch, &mut bus)
    }

    #[test]
    fn nop_advances_pc_and_costs_one_cycle() {
        let (mut arch, mut bus) = machine(&[0]);
        let outcome = step_one(&mut arch, &mut bus);
        assert_eq!(outcome, StepOutcome::Retired { cycles: 1 });
        assert_eq!(arch.pc(), RESET + 4);
        assert_eq!(arch.cycles(), 1);
    }

    #[test]
    fn lui_ori_builds_a_constant() {
        // lui t0, 0x8000 ; ori t0, t0, 0x1234
        let (mut arch, mut bus) = machine(&[0x3C08_8000, 0x3508_1234]);
        run(&mut arch, &mut bus, 2);
        assert_eq!(arch.gpr(Gpr::T0), 0xFFFF_FFFF_8000_1234);
    }

    #[rstest]
    #[case(0x0109_5020, 5, 7, 12)] // add t2, t0, t1
    #[case(0x0109_5023, 5, 7, (-2_i64) as u64)] // subu t2, t0, t1
    #[case(0x0109_5024, 0b1100, 0b1010, 0b1000)] // and
    #[case(0x0109_5025, 0b1100, 0b1010, 0b1110)] // or
    #[case(0x0109_5026, 0b1100, 0b1010, 0b0110)] // xor
    #[case(0x0109_5027, 0, 0, u64::MAX)] // nor
    #[case(0x0109_502A, (-1_i64) as u64, 1, 1)] // slt
    #[case(0x0109_502B, (-1_i64) as u64, 1, 0)] // sltu
    #[case(0x0109_502D, u64::MAX, 2, 1)] // daddu
    fn register_alu_forms(#[case] word: u32, #[case] a: u64, #[case] b: u64, #[case] want: u64) {
        let mut arch = ArchitecturalState::default();
        arch.set_gpr(Gpr::T0, a);
        arch.set_gpr(Gpr::T1, b);
        let (outcome, exec) = exec_alone(word, &arch);
        assert!(matches!(outcome, ExecuteOutcome::Retired { cycles: 1 }));
        assert_eq!(exec.dest, Some((Gpr::T2, want)));
    }

    #[rstest]
    #[case(0x0008_5100, 0x8000_0001, 0x10)] // sll t2, t0, 4
    #[case(0x0008_5102, 0x8000_0000, 0x0800_0000)] // srl t2, t0, 4
    #[case(0x0008_5103, 0x8000_0000, 0xFFFF_FFFF_F800_0000)] // sra t2, t0, 4
    #[case(0x0008_513C, 1, 1 << 36)] // dsll32 t2, t0, 4
    fn shift_forms(#[case] word: u32, #[case] rt: u64, #[case] want: u64) {
        let mut arch = ArchitecturalState::default();
        arch.set_gpr(Gpr::T0, rt);
        let (_, exec) = exec_alone(word, &arch);
        assert_eq!(exec.dest, Some((Gpr::T2, want)));
    }

    #[test]
    fn trapping_add_faults_without_destination_write() {
        let mut arch = ArchitecturalState::default();
        arch.set_gpr(Gpr::T0, 0x7FFF_FFFF);
        arch.set_gpr(Gpr::T1, 1);
        let (outcome, exec) = exec_alone(0x0109_5020, &arch);
        assert_eq!(
            outcome,
            ExecuteOutcome::Fault {
                cause: FaultCode::IntegerOverflow
            }
        );
        assert_eq!(exec.dest, None);
    }

    #[test]
    fn mult_writes_hi_lo_and_rd() {
        let mut arch = ArchitecturalState::default();
        arch.set_gpr(Gpr::T0, (-3_i64) as u64);
        arch.set_gpr(Gpr::T1, 4);
        // mult t2, t0, t1
        let (_, exec) = exec_alone(0x0109_5018, &arch);
        assert_eq!(exec.lo, Some((-12_i64) as u64));
        assert_eq!(exec.hi, Some(u64::MAX));
        assert_eq!(exec.dest, Some((Gpr::T2, (-12_i64) as u64)));
    }

    #[test]
    fn divide_by_zero_does_not_fault() {
        let mut arch = ArchitecturalState::default();
        arch.set_gpr(Gpr::T0, 9);
        // div t0, zero
        let (outcome, exec) = exec_alone(0x0100_001A, &arch);
        assert!(matches!(outcome, ExecuteOutcome::Retired { .. }));
        assert_eq!(exec.lo, Some(u64::MAX));
        assert_eq!(exec.hi, Some(9));
    }

    #[test]
    fn branch_runs_delay_slot_before_target() {
        // beq zero, zero, +2 ; addiu t0, zero, 1 ; addiu t1, zero, 1 ; addiu t2, zero, 1
        let (mut arch, mut bus) = machine(&[0x1000_0002, 0x2408_0001, 0x2409_0001, 0x240A_0001]);
        run(&mut arch, &mut bus, 1);
        assert_eq!(arch.pc(), RESET + 4);
        assert_eq!(arch.next_pc(), RESET + 12);
        assert!(arch.in_delay_slot());

        run(&mut arch, &mut bus, 2);
        assert_eq!(arch.gpr(Gpr::T0), 1);
        assert_eq!(arch.gpr(Gpr::T1), 0);
        assert_eq!(arch.gpr(Gpr::T2), 1);
    }

    #[test]
    fn not_taken_likely_branch_nullifies_delay_slot() {
        // bnel zero, zero, +2 ; addiu t0, zero, 1 ; addiu t1, zero, 1
        let (mut arch, mut bus) = machine(&[0x5400_0002, 0x2408_0001, 0x2409_0001]);
        run(&mut arch, &mut bus, 1);
        assert_eq!(arch.pc(), RESET + 8);
        run(&mut arch, &mut bus, 1);
        assert_eq!(arch.gpr(Gpr::T0), 0);
        assert_eq!(arch.gpr(Gpr::T1), 1);
    }

    #[test]
    fn jal_links_past_delay_slot() {
        // jal 0xBFC00010
        let (mut arch, mut bus) = machine(&[0x0FF0_0004, 0, 0, 0, 0]);
        run(&mut arch, &mut bus, 2);
        assert_eq!(arch.gpr(Gpr::Ra), sext32(u64::from(RESET + 8)));
        assert_eq!(arch.pc(), RESET + 0x10);
    }

    #[test]
    fn store_then_load_through_ram() {
        // lui t0, 0x8000 ; addiu t1, zero, -2 ; sw t1, 16(t0) ; lhu t2, 16(t0) ; lb t3, 16(t0)
        let (mut arch, mut bus) = machine(&[
            0x3C08_8000,
            0x2409_FFFE,
            0xAD09_0010,
            0x950A_0010,
            0x810B_0010,
        ]);
        run(&mut arch, &mut bus, 5);
        assert_eq!(bus.read(0x10, AccessWidth::Word), Ok(0xFFFF_FFFE));
        assert_eq!(arch.gpr(Gpr::T2), 0xFFFE);
        assert_eq!(arch.gpr(Gpr::T3), (-2_i64) as u64);
    }

    #[test]
    fn store_into_rom_faults_precisely() {
        // lui t0, 0xbfc0 ; sw t0, 0(t0)
        let (mut arch, mut bus) = machine(&[0x3C08_BFC0, 0xAD08_0000]);
        run(&mut arch, &mut bus, 1);
        let before = arch.clone();
        let outcome = step_one(&mut arch, &mut bus);
        assert_eq!(
            outcome,
            StepOutcome::Fault {
                cause: FaultCode::ReadOnlyWrite,
                address: Some(RESET),
            }
        );
        assert_eq!(arch, before);
        assert_eq!(bus.fetch(RESET), Ok(0x3C08_BFC0));
    }

    #[test]
    fn unaligned_load_faults() {
        // lw t1, 2(zero)
        let (mut arch, mut bus) = machine(&[0x8C09_0002]);
        assert_eq!(
            step_one(&mut arch, &mut bus),
            StepOutcome::Fault {
                cause: FaultCode::UnalignedLoad,
                address: Some(2),
            }
        );
        assert_eq!(arch.pc(), RESET);
    }

    #[test]
    fn illegal_word_and_missing_code_fault() {
        let (mut arch, mut bus) = machine(&[0x7000_0000]);
        assert_eq!(
            step_one(&mut arch, &mut bus),
            StepOutcome::Fault {
                cause: FaultCode::IllegalInstruction,
                address: None,
            }
        );

        let (mut arch, mut bus) = machine(&[0]);
        run(&mut arch, &mut bus, 1);
        assert_eq!(
            step_one(&mut arch, &mut bus),
            StepOutcome::Fault {
                cause: FaultCode::UnmappedFetch,
                address: Some(RESET + 4),
            }
        );
    }

    #[test]
    fn syscall_and_break_trap() {
        let arch = ArchitecturalState::default();
        assert_eq!(
            exec_alone(0x0000_000C, &arch).0,
            ExecuteOutcome::Fault {
                cause: FaultCode::SystemCall
            }
        );
        assert_eq!(
            exec_alone(0x0000_000D, &arch).0,
            ExecuteOutcome::Fault {
                cause: FaultCode::Breakpoint
            }
        );
    }

    #[test]
    fn cop0_moves_and_eret() {
        // mfc0 t0, PRId ; mtc0 t1, ErrorEPC ; eret
        let (mut arch, mut bus) = machine(&[0x4008_7800, 0x4089_F000, 0x4200_0018]);
        arch.set_gpr(Gpr::T1, 0x8000_0100);
        run(&mut arch, &mut bus, 3);
        assert_eq!(arch.gpr(Gpr::T0), 0x2E20);
        assert_eq!(arch.pc(), 0x8000_0100);
        assert_eq!(arch.cop0(cop0::STATUS) & cop0::STATUS_ERL, 0);
    }

    #[test]
    fn ei_and_di_toggle_master_enable() {
        let (mut arch, mut bus) = machine(&[0x4200_0038, 0x4200_0039]);
        run(&mut arch, &mut bus, 1);
        assert_ne!(arch.cop0(cop0::STATUS) & cop0::STATUS_EIE, 0);
        run(&mut arch, &mut bus, 1);
        assert_eq!(arch.cop0(cop0::STATUS) & cop0::STATUS_EIE, 0);
    }
}
