//! Deterministic alignment and write-policy checks for EE bus accesses.

use super::map::{AccessPolicy, RegionKind};
use crate::FaultCode;

/// Width of a single bus access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum AccessWidth {
    /// 8-bit access.
    Byte,
    /// 16-bit access.
    Halfword,
    /// 32-bit access.
    Word,
    /// 64-bit access.
    Doubleword,
}

impl AccessWidth {
    /// Every width from narrowest to widest.
    pub const ALL: [Self; 4] = [Self::Byte, Self::Halfword, Self::Word, Self::Doubleword];

    /// Access size in bytes.
    #[must_use]
    pub const fn bytes(self) -> u32 {
        match self {
            Self::Byte => 1,
            Self::Halfword => 2,
            Self::Word => 4,
            Self::Doubleword => 8,
        }
    }

    /// Mask selecting the value bits an access of this width carries.
    #[must_use]
    pub const fn value_mask(self) -> u64 {
        match self {
            Self::Byte => 0xFF,
            Self::Halfword => 0xFFFF,
            Self::Word => 0xFFFF_FFFF,
            Self::Doubleword => u64::MAX,
        }
    }

    /// `true` when `addr` is naturally aligned for this width.
    #[must_use]
    pub const fn is_aligned(self, addr: u32) -> bool {
        addr & (self.bytes() - 1) == 0
    }
}

/// Validates program-counter alignment for an instruction fetch.
///
/// # Errors
///
/// Returns [`FaultCode::UnalignedFetch`] unless `pc` is word aligned.
pub const fn validate_fetch_alignment(pc: u32) -> Result<(), FaultCode> {
    if AccessWidth::Word.is_aligned(pc) {
        Ok(())
    } else {
        Err(FaultCode::UnalignedFetch)
    }
}

/// Validates natural alignment of a data load.
///
/// # Errors
///
/// Returns [`FaultCode::UnalignedLoad`] for a misaligned address.
pub const fn validate_load_alignment(addr: u32, width: AccessWidth) -> Result<(), FaultCode> {
    if width.is_aligned(addr) {
        Ok(())
    } else {
        Err(FaultCode::UnalignedLoad)
    }
}

/// Validates natural alignment of a data store.
///
/// # Errors
///
/// Returns [`FaultCode::UnalignedStore`] for a misaligned address.
pub const fn validate_store_alignment(addr: u32, width: AccessWidth) -> Result<(), FaultCode> {
    if width.is_aligned(addr) {
        Ok(())
    } else {
        Err(FaultCode::UnalignedStore)
    }
}

/// Validates that a store may land in a region of `kind`.
///
/// `None` stands for an unmapped address.
///
/// # Errors
///
/// Returns [`FaultCode::ReadOnlyWrite`] for firmware and
/// [`FaultCode::UnmappedWrite`] when nothing backs the address.
pub const fn validate_write_policy(kind: Option<RegionKind>) -> Result<(), FaultCode> {
    match kind {
        None => Err(FaultCode::UnmappedWrite),
        Some(kind) => match kind.policy() {
            AccessPolicy::ReadOnly => Err(FaultCode::ReadOnlyWrite),
            AccessPolicy::ReadWrite | AccessPolicy::SideEffecting => Ok(()),
        },
    }
}

/// Validates that an instruction may be fetched from a region of `kind`.
///
/// # Errors
///
/// Returns [`FaultCode::UnmappedFetch`] for unmapped addresses and for
/// register banks that hold no code.
pub const fn validate_fetch_region(kind: Option<RegionKind>) -> Result<(), FaultCode> {
    match kind {
        Some(kind) if kind.is_executable() => Ok(()),
        _ => Err(FaultCode::UnmappedFetch),
    }
}
