use crate::encoding::OpcodeEncoding;

/// Nominal Emotion Engine core clock.
pub const EE_CLOCK_HZ: u64 = 294_912_000;
/// EE cycles per bus (BUSCLK) cycle.
pub const BUS_CLOCK_DIVIDER: u64 = 2;
/// Bus clock driving the EE timers.
pub const BUS_CLOCK_HZ: u64 = EE_CLOCK_HZ / BUS_CLOCK_DIVIDER;
/// Nominal host polling rate.
pub const HOST_FRAME_HZ: u64 = 60;
/// EE cycles in one nominal host frame.
pub const CYCLES_PER_FRAME: u64 = EE_CLOCK_HZ / HOST_FRAME_HZ;

/// Instruction classes with fixed cycle costs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CycleCostKind {
    /// Integer arithmetic, logic, compare, and moves.
    Alu,
    /// Constant and variable shifts.
    Shift,
    /// `MULT`/`DIV` family.
    MulDiv,
    /// Memory read.
    Load,
    /// Memory write.
    Store,
    /// Conditional branch.
    Branch,
    /// Unconditional jump.
    Jump,
    /// COP0 transfer or control.
    Cop0,
    /// Barrier, cache, and prefetch hints.
    Hint,
    /// `SYSCALL`/`BREAK` issue.
    Trap,
}

/// Single source-of-truth cycle-cost table.
///
/// The core models a single-issue pipeline without stalls, so every class
/// retires in one cycle.
pub const CYCLE_COST_TABLE: &[(CycleCostKind, u64)] = &[
    (CycleCostKind::Alu, 1),
    (CycleCostKind::Shift, 1),
    (CycleCostKind::MulDiv, 1),
    (CycleCostKind::Load, 1),
    (CycleCostKind::Store, 1),
    (CycleCostKind::Branch, 1),
    (CycleCostKind::Jump, 1),
    (CycleCostKind::Cop0, 1),
    (CycleCostKind::Hint, 1),
    (CycleCostKind::Trap, 1),
];

/// Cost charged when a class is missing from the table.
pub const INSTRUCTION_CYCLES: u64 = 1;

/// Looks up the cycle cost for a cost class.
#[must_use]
pub fn cycle_cost(kind: CycleCostKind) -> Option<u64> {
    CYCLE_COST_TABLE
        .iter()
        .find_map(|(entry_kind, cycles)| (*entry_kind == kind).then_some(*cycles))
}

/// Cost class of an implemented encoding.
#[must_use]
pub const fn cost_kind(encoding: OpcodeEncoding) -> CycleCostKind {
    use OpcodeEncoding as E;
    match encoding {
        E::Sll | E::Srl | E::Sra | E::Sllv | E::Srlv | E::Srav | E::Dsllv | E::Dsrlv
        | E::Dsrav | E::Dsll | E::Dsrl | E::Dsra | E::Dsll32 | E::Dsrl32 | E::Dsra32 => {
            CycleCostKind::Shift
        }
        E::Mult | E::Multu | E::Div | E::Divu => CycleCostKind::MulDiv,
        E::Lb | E::Lh | E::Lw | E::Lbu | E::Lhu | E::Lwu | E::Ld => CycleCostKind::Load,
        E::Sb | E::Sh | E::Sw | E::Sd => CycleCostKind::Store,
        E::J | E::Jal | E::Jr | E::Jalr => CycleCostKind::Jump,
        E::Syscall | E::Break => CycleCostKind::Trap,
        E::Sync | E::Cache | E::Pref => CycleCostKind::Hint,
        E::Mfc0 | E::Mtc0 | E::Tlbr | E::Tlbwi | E::Tlbwr | E::Tlbp | E::Eret | E::Ei | E::Di => {
            CycleCostKind::Cop0
        }
        _ if encoding.has_delay_slot() => CycleCostKind::Branch,
        _ => CycleCostKind::Alu,
    }
}

/// Cycles charged for retiring `encoding`.
#[must_use]
pub fn instruction_cycles(encoding: OpcodeEncoding) -> u64 {
    cycle_cost(cost_kind(encoding)).unwrap_or(INSTRUCTION_CYCLES)
}
