use thiserror::Error;

/// Fault classes used for diagnostics aggregation and policy decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum FaultClass {
    /// Decoder rejected an instruction encoding.
    Decode,
    /// Fetch, load, or store violated the bus policy.
    Memory,
    /// Trapping arithmetic overflowed.
    Arithmetic,
    /// Software trap instruction with no modelled exception vector.
    Trap,
}

/// Machine faults latched into CPU state instead of propagating to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum FaultCode {
    /// Reserved or unimplemented opcode.
    #[error("illegal or unimplemented instruction")]
    IllegalInstruction = 0x01,
    /// Program counter was not word aligned at fetch time.
    #[error("unaligned instruction fetch")]
    UnalignedFetch = 0x02,
    /// Program counter resolved to no mapped region.
    #[error("instruction fetch from unmapped address")]
    UnmappedFetch = 0x03,
    /// Load address was not naturally aligned for its width.
    #[error("unaligned data load")]
    UnalignedLoad = 0x04,
    /// Store address was not naturally aligned for its width.
    #[error("unaligned data store")]
    UnalignedStore = 0x05,
    /// Store targeted a firmware region.
    #[error("write to read-only region")]
    ReadOnlyWrite = 0x06,
    /// Store targeted an address with no backing region.
    #[error("write to unmapped address")]
    UnmappedWrite = 0x07,
    /// `ADD`/`ADDI`/`SUB` or a doubleword variant overflowed.
    #[error("integer overflow in trapping arithmetic")]
    IntegerOverflow = 0x08,
    /// `SYSCALL` executed.
    #[error("system call trap")]
    SystemCall = 0x09,
    /// `BREAK` executed.
    #[error("breakpoint trap")]
    Breakpoint = 0x0A,
}

impl FaultCode {
    /// Every defined fault code in stable numeric order.
    pub const ALL: [Self; 10] = [
        Self::IllegalInstruction,
        Self::UnalignedFetch,
        Self::UnmappedFetch,
        Self::UnalignedLoad,
        Self::UnalignedStore,
        Self::ReadOnlyWrite,
        Self::UnmappedWrite,
        Self::IntegerOverflow,
        Self::SystemCall,
        Self::Breakpoint,
    ];

    /// Converts a fault code to its stable numeric value.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Converts a stable numeric value back into a fault code.
    #[must_use]
    pub const fn from_u8(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::IllegalInstruction),
            0x02 => Some(Self::UnalignedFetch),
            0x03 => Some(Self::UnmappedFetch),
            0x04 => Some(Self::UnalignedLoad),
            0x05 => Some(Self::UnalignedStore),
            0x06 => Some(Self::ReadOnlyWrite),
            0x07 => Some(Self::UnmappedWrite),
            0x08 => Some(Self::IntegerOverflow),
            0x09 => Some(Self::SystemCall),
            0x0A => Some(Self::Breakpoint),
            _ => None,
        }
    }

    /// Returns the diagnostics fault class for this fault code.
    #[must_use]
    pub const fn class(self) -> FaultClass {
        match self {
            Self::IllegalInstruction => FaultClass::Decode,
            Self::UnalignedFetch
            | Self::UnmappedFetch
            | Self::UnalignedLoad
            | Self::UnalignedStore
            | Self::ReadOnlyWrite
            | Self::UnmappedWrite => FaultClass::Memory,
            Self::IntegerOverflow => FaultClass::Arithmetic,
            Self::SystemCall | Self::Breakpoint => FaultClass::Trap,
        }
    }

    /// Short upper-case tag used by the text debug rendering.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::IllegalInstruction => "ILLEGAL_INSTRUCTION",
            Self::UnalignedFetch => "UNALIGNED_FETCH",
            Self::UnmappedFetch => "UNMAPPED_FETCH",
            Self::UnalignedLoad => "UNALIGNED_LOAD",
            Self::UnalignedStore => "UNALIGNED_STORE",
            Self::ReadOnlyWrite => "READ_ONLY_WRITE",
            Self::UnmappedWrite => "UNMAPPED_WRITE",
            Self::IntegerOverflow => "INTEGER_OVERFLOW",
            Self::SystemCall => "SYSCALL",
            Self::Breakpoint => "BREAK",
        }
    }
}

/// Where and when a latched fault was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct FaultRecord {
    /// Canonical fault code.
    pub code: FaultCode,
    /// Program counter of the faulting instruction (or the host access).
    pub pc: u32,
    /// Cycle counter at the time of the fault.
    pub cycle: u64,
    /// Data address involved in the fault, when there is one.
    pub address: Option<u32>,
    /// `true` when the faulting instruction sat in a branch delay slot.
    pub in_delay_slot: bool,
}
