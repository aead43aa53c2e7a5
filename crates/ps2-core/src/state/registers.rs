/// Number of general-purpose registers.
pub const GPR_COUNT: usize = 32;
/// Number of COP0 register slots.
pub const COP0_REGISTER_COUNT: usize = 32;
/// `PRId` value reported by the R5900.
pub const COP0_PRID_RESET: u32 = 0x0000_2E20;
/// `Status` after reset: `BEV` and `ERL` set.
pub const COP0_STATUS_RESET: u32 = 0x0040_0004;

/// COP0 register numbers used by the core.
pub mod cop0 {
    /// TLB index.
    pub const INDEX: usize = 0;
    /// Bad virtual address.
    pub const BAD_VADDR: usize = 8;
    /// Free-running cycle counter.
    pub const COUNT: usize = 9;
    /// Timer compare.
    pub const COMPARE: usize = 11;
    /// Processor status.
    pub const STATUS: usize = 12;
    /// Exception cause.
    pub const CAUSE: usize = 13;
    /// Exception program counter.
    pub const EPC: usize = 14;
    /// Processor revision identifier.
    pub const PRID: usize = 15;
    /// Configuration.
    pub const CONFIG: usize = 16;
    /// Error exception program counter.
    pub const ERROR_EPC: usize = 30;

    /// `Status.EIE`, the R5900 master interrupt enable.
    pub const STATUS_EIE: u32 = 1 << 16;
    /// `Status.ERL`.
    pub const STATUS_ERL: u32 = 1 << 2;
    /// `Status.EXL`.
    pub const STATUS_EXL: u32 = 1 << 1;
}

/// General-purpose register identifier by ABI name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Gpr {
    Zero = 0,
    At,
    V0,
    V1,
    A0,
    A1,
    A2,
    A3,
    T0,
    T1,
    T2,
    T3,
    T4,
    T5,
    T6,
    T7,
    S0,
    S1,
    S2,
    S3,
    S4,
    S5,
    S6,
    S7,
    T8,
    T9,
    K0,
    K1,
    Gp,
    Sp,
    Fp,
    Ra,
}

impl Gpr {
    /// Every register in encoding order.
    pub const ALL: [Self; GPR_COUNT] = [
        Self::Zero,
        Self::At,
        Self::V0,
        Self::V1,
        Self::A0,
        Self::A1,
        Self::A2,
        Self::A3,
        Self::T0,
        Self::T1,
        Self::T2,
        Self::T3,
        Self::T4,
        Self::T5,
        Self::T6,
        Self::T7,
        Self::S0,
        Self::S1,
        Self::S2,
        Self::S3,
        Self::S4,
        Self::S5,
        Self::S6,
        Self::S7,
        Self::T8,
        Self::T9,
        Self::K0,
        Self::K1,
        Self::Gp,
        Self::Sp,
        Self::Fp,
        Self::Ra,
    ];

    /// Array index for this register (`0..=31`).
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Decodes a 5-bit register field. Upper bits are ignored.
    #[must_use]
    pub const fn from_u5(bits: u32) -> Self {
        Self::ALL[(bits & 0x1F) as usize]
    }

    /// Conventional ABI name without the `$` sigil.
    #[must_use]
    pub const fn name(self) -> &'static str {
        const NAMES: [&str; GPR_COUNT] = [
            "zero", "at", "v0", "v1", "a0", "a1", "a2", "a3", "t0", "t1", "t2", "t3", "t4", "t5",
            "t6", "t7", "s0", "s1", "s2", "s3", "s4", "s5", "s6", "s7", "t8", "t9", "k0", "k1",
            "gp", "sp", "fp", "ra",
        ];
        NAMES[self.index()]
    }
}

/// Architectural register state of the EE core.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ArchitecturalState {
    gpr: [u64; GPR_COUNT],
    hi: u64,
    lo: u64,
    pc: u32,
    next_pc: u32,
    in_delay_slot: bool,
    cycles: u64,
    retired: u64,
    cop0: [u32; COP0_REGISTER_COUNT],
}

impl Default for ArchitecturalState {
    fn default() -> Self {
        Self::reset(0)
    }
}

impl ArchitecturalState {
    /// Power-on state with execution starting at `reset_vector`.
    #[must_use]
    pub fn reset(reset_vector: u32) -> Self {
        let mut cop0 = [0; COP0_REGISTER_COUNT];
        cop0[cop0::STATUS] = COP0_STATUS_RESET;
        cop0[cop0::PRID] = COP0_PRID_RESET;
        Self {
            gpr: [0; GPR_COUNT],
            hi: 0,
            lo: 0,
            pc: reset_vector,
            next_pc: reset_vector.wrapping_add(4),
            in_delay_slot: false,
            cycles: 0,
            retired: 0,
            cop0,
        }
    }

    /// Reads a general-purpose register.
    #[must_use]
    pub const fn gpr(&self, reg: Gpr) -> u64 {
        self.gpr[reg.index()]
    }

    /// Writes a general-purpose register. Writes to `$zero` are discarded.
    pub const fn set_gpr(&mut self, reg: Gpr, value: u64) {
        if !matches!(reg, Gpr::Zero) {
            self.gpr[reg.index()] = value;
        }
    }

    /// All general-purpose registers in encoding order.
    #[must_use]
    pub const fn gprs(&self) -> &[u64; GPR_COUNT] {
        &self.gpr
    }

    /// Reads `HI`.
    #[must_use]
    pub const fn hi(&self) -> u64 {
        self.hi
    }

    /// Writes `HI`.
    pub const fn set_hi(&mut self, value: u64) {
        self.hi = value;
    }

    /// Reads `LO`.
    #[must_use]
    pub const fn lo(&self) -> u64 {
        self.lo
    }

    /// Writes `LO`.
    pub const fn set_lo(&mut self, value: u64) {
        self.lo = value;
    }

    /// Address of the next instruction to execute.
    #[must_use]
    pub const fn pc(&self) -> u32 {
        self.pc
    }

    /// Address that becomes `pc` after the current instruction retires.
    #[must_use]
    pub const fn next_pc(&self) -> u32 {
        self.next_pc
    }

    /// Redirects execution to `pc`, discarding any pending branch.
    pub const fn jump_to(&mut self, pc: u32) {
        self.pc = pc;
        self.next_pc = pc.wrapping_add(4);
        self.in_delay_slot = false;
    }

    /// Installs the program counter pair produced by a retired instruction.
    pub const fn set_pc_pair(&mut self, pc: u32, next_pc: u32, in_delay_slot: bool) {
        self.pc = pc;
        self.next_pc = next_pc;
        self.in_delay_slot = in_delay_slot;
    }

    /// `true` when the instruction at `pc` sits in a branch delay slot.
    #[must_use]
    pub const fn in_delay_slot(&self) -> bool {
        self.in_delay_slot
    }

    /// Elapsed EE cycles.
    #[must_use]
    pub const fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Retired instruction count.
    #[must_use]
    pub const fn retired(&self) -> u64 {
        self.retired
    }

    /// Accounts for one retired instruction costing `cycles`.
    ///
    /// `Count` advances alongside the cycle counter.
    pub fn retire(&mut self, cycles: u64) {
        self.cycles = self.cycles.wrapping_add(cycles);
        self.retired = self.retired.wrapping_add(1);
        let count = &mut self.cop0[cop0::COUNT];
        *count = count.wrapping_add((cycles & 0xFFFF_FFFF) as u32);
    }

    /// Reads a COP0 register; out-of-range numbers read as zero.
    #[must_use]
    pub fn cop0(&self, reg: usize) -> u32 {
        self.cop0.get(reg).copied().unwrap_or(0)
    }

    /// Writes a COP0 register. `PRId` is read-only.
    pub fn set_cop0(&mut self, reg: usize, value: u32) {
        if reg == cop0::PRID {
            return;
        }
        if let Some(slot) = self.cop0.get_mut(reg) {
            *slot = value;
        }
    }
}
