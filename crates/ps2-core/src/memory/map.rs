//! EE address map: fixed regions, firmware windows, and the rebuilt region table.

use std::sync::Arc;

use thiserror::Error;

use crate::firmware::{FirmwareKind, FirmwareStore, FIRMWARE_KIND_COUNT};

/// Inclusive start of main RAM (physical).
pub const RAM_START: u32 = 0x0000_0000;
/// Inclusive end of main RAM (physical, 32 MiB).
pub const RAM_END: u32 = 0x01FF_FFFF;
/// Inclusive start of the EE IO register block (physical).
pub const IO_START: u32 = 0x1000_0000;
/// Inclusive end of the EE IO register block (physical).
pub const IO_END: u32 = 0x1000_FFFF;
/// Inclusive start of the GS privileged register bank (physical).
pub const GS_PRIV_START: u32 = 0x1200_0000;
/// Inclusive end of the GS privileged register bank (physical).
pub const GS_PRIV_END: u32 = 0x1200_1FFF;
/// Physical base of the `ROM1` window.
pub const ROM1_BASE: u32 = 0x1E00_0000;
/// Physical base of the `EROM` window.
pub const EROM_BASE: u32 = 0x1E04_0000;
/// Physical base of the `ROM2` window.
pub const ROM2_BASE: u32 = 0x1E40_0000;
/// Physical base of the main boot ROM window.
pub const ROM_BASE: u32 = 0x1FC0_0000;
/// Inclusive start of the scratchpad (virtual, never translated).
pub const SCRATCHPAD_START: u32 = 0x7000_0000;
/// Inclusive end of the scratchpad (16 KiB).
pub const SCRATCHPAD_END: u32 = 0x7000_3FFF;
/// kseg1 address the EE starts fetching from after reset.
pub const RESET_VECTOR: u32 = 0xBFC0_0000;
/// Mask folding kuseg/kseg0/kseg1 addresses onto the 512 MiB physical bus.
pub const PHYSICAL_ADDRESS_MASK: u32 = 0x1FFF_FFFF;
/// First address of kseg2; everything from here up is unmapped.
pub const KSEG2_START: u32 = 0xC000_0000;

/// What the CPU may do with a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum AccessPolicy {
    /// Reads only; writes fault.
    ReadOnly,
    /// Plain storage.
    ReadWrite,
    /// Register file whose accesses can have side effects.
    SideEffecting,
}

/// Backing store classification for a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum RegionKind {
    /// Main RAM.
    Ram,
    /// Scratchpad SRAM.
    Scratchpad,
    /// EE IO registers (timers, INTC, DMAC, SIF).
    Io,
    /// GS privileged registers.
    GsPrivileged,
    /// A CPU-visible firmware part.
    Firmware(FirmwareKind),
}

impl RegionKind {
    /// Access policy for this kind of backing.
    #[must_use]
    pub const fn policy(self) -> AccessPolicy {
        match self {
            Self::Ram | Self::Scratchpad | Self::GsPrivileged => AccessPolicy::ReadWrite,
            Self::Io => AccessPolicy::SideEffecting,
            Self::Firmware(_) => AccessPolicy::ReadOnly,
        }
    }

    /// `true` for regions instructions may be fetched from.
    #[must_use]
    pub const fn is_executable(self) -> bool {
        matches!(self, Self::Ram | Self::Scratchpad | Self::Firmware(_))
    }

    /// `true` when the region is matched against untranslated addresses.
    #[must_use]
    pub const fn is_virtual(self) -> bool {
        matches!(self, Self::Scratchpad)
    }
}

/// Contiguous address range and its backing classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RegionDescriptor {
    /// Backing classification.
    pub kind: RegionKind,
    /// Inclusive start address.
    pub start: u32,
    /// Inclusive end address.
    pub end: u32,
}

impl RegionDescriptor {
    /// Returns `true` when `addr` belongs to this region.
    #[must_use]
    pub const fn contains(&self, addr: u32) -> bool {
        addr >= self.start && addr <= self.end
    }

    /// Region length in bytes.
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.end - self.start + 1
    }

    /// Regions always span at least one byte.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// `true` when the two ranges share any address in the same space.
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.kind.is_virtual() == other.kind.is_virtual()
            && self.start <= other.end
            && other.start <= self.end
    }
}

/// Regions that exist regardless of which firmware parts are loaded.
pub const FIXED_REGIONS: [RegionDescriptor; 4] = [
    RegionDescriptor {
        kind: RegionKind::Ram,
        start: RAM_START,
        end: RAM_END,
    },
    RegionDescriptor {
        kind: RegionKind::Io,
        start: IO_START,
        end: IO_END,
    },
    RegionDescriptor {
        kind: RegionKind::GsPrivileged,
        start: GS_PRIV_START,
        end: GS_PRIV_END,
    },
    RegionDescriptor {
        kind: RegionKind::Scratchpad,
        start: SCRATCHPAD_START,
        end: SCRATCHPAD_END,
    },
];

const _: () = assert_fixed_region_layout();

const fn assert_fixed_region_layout() {
    let mut index = 0;
    while index < FIXED_REGIONS.len() {
        let descriptor = FIXED_REGIONS[index];
        assert!(
            descriptor.start <= descriptor.end,
            "region start cannot be greater than end"
        );
        let mut other = index + 1;
        while other < FIXED_REGIONS.len() {
            assert!(
                !descriptor.overlaps(&FIXED_REGIONS[other]),
                "fixed regions must not overlap"
            );
            other += 1;
        }
        index += 1;
    }
    assert!(
        RAM_END < IO_START && IO_END < GS_PRIV_START && GS_PRIV_END < ROM1_BASE,
        "firmware windows must sit above the fixed physical regions"
    );
    assert!(
        ROM1_BASE + 0x0004_0000 <= EROM_BASE
            && EROM_BASE + 0x001C_0000 <= ROM2_BASE
            && ROM2_BASE + 0x0008_0000 <= ROM_BASE,
        "firmware windows must not overlap"
    );
}

/// Physical base of a CPU-visible firmware part.
#[must_use]
pub const fn firmware_base(kind: FirmwareKind) -> Option<u32> {
    match kind {
        FirmwareKind::Rom => Some(ROM_BASE),
        FirmwareKind::Rom1 => Some(ROM1_BASE),
        FirmwareKind::Rom2 => Some(ROM2_BASE),
        FirmwareKind::Erom => Some(EROM_BASE),
        FirmwareKind::Nvm | FirmwareKind::Mec => None,
    }
}

/// Result of EE virtual-to-bus address translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusAddress {
    /// Untranslated scratchpad address.
    Virtual(u32),
    /// Physical bus address.
    Physical(u32),
    /// kseg2/kseg3 and other addresses with no mapping.
    Unmapped,
}

/// Translates an EE virtual address.
///
/// The TLB is not modelled: kuseg, kseg0, and kseg1 all fold onto the
/// physical bus through [`PHYSICAL_ADDRESS_MASK`].
#[must_use]
pub const fn translate(vaddr: u32) -> BusAddress {
    if vaddr >= SCRATCHPAD_START && vaddr <= SCRATCHPAD_END {
        BusAddress::Virtual(vaddr)
    } else if vaddr >= KSEG2_START {
        BusAddress::Unmapped
    } else {
        BusAddress::Physical(vaddr & PHYSICAL_ADDRESS_MASK)
    }
}

/// Table construction found two regions claiming the same address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[error("region {first:?} overlaps region {second:?}")]
pub struct RegionOverlapError {
    /// Region already in the table.
    pub first: RegionDescriptor,
    /// Region that collided with it.
    pub second: RegionDescriptor,
}

/// A resolved access: the region it hit and the offset within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolvedAddress {
    /// Region containing the address.
    pub region: RegionDescriptor,
    /// Byte offset from the region start.
    pub offset: u32,
}

/// Current mapping from address ranges to backing stores.
///
/// Built as a whole from a [`FirmwareStore`] and swapped in atomically; it is
/// never patched in place.
#[derive(Debug, Clone)]
pub struct RegionTable {
    regions: Vec<RegionDescriptor>,
    firmware: [Option<Arc<[u8]>>; FIRMWARE_KIND_COUNT],
    generation: u64,
}

impl Default for RegionTable {
    fn default() -> Self {
        Self::fixed()
    }
}

impl RegionTable {
    /// Table with only the fixed regions mapped.
    #[must_use]
    pub fn fixed() -> Self {
        let mut regions = FIXED_REGIONS.to_vec();
        regions.sort_by_key(|r| (r.kind.is_virtual(), r.start));
        Self {
            regions,
            firmware: Default::default(),
            generation: 0,
        }
    }

    /// Derives a table from the fixed regions plus every CPU-visible part.
    ///
    /// # Errors
    ///
    /// Returns [`RegionOverlapError`] if any two regions intersect.
    pub fn build(store: &FirmwareStore) -> Result<Self, RegionOverlapError> {
        let mut table = Self::fixed();
        for part in store.parts() {
            let Some(base) = firmware_base(part.kind()) else {
                continue;
            };
            let len = u32::try_from(part.len()).unwrap_or(u32::MAX);
            let descriptor = RegionDescriptor {
                kind: RegionKind::Firmware(part.kind()),
                start: base,
                end: base.saturating_add(len - 1),
            };
            if let Some(existing) = table.regions.iter().find(|r| r.overlaps(&descriptor)) {
                return Err(RegionOverlapError {
                    first: *existing,
                    second: descriptor,
                });
            }
            table.regions.push(descriptor);
            table.firmware[part.kind().index()] = Some(part.shared_bytes());
        }
        table.regions.sort_by_key(|r| (r.kind.is_virtual(), r.start));
        table.generation = store.generation();
        tracing::debug!(
            regions = table.regions.len(),
            generation = table.generation,
            "region table rebuilt"
        );
        Ok(table)
    }

    /// Regions in ascending order, physical first.
    #[must_use]
    pub fn regions(&self) -> &[RegionDescriptor] {
        &self.regions
    }

    /// Firmware store generation the table was derived from.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Backing bytes of a mapped firmware part.
    #[must_use]
    pub fn firmware_bytes(&self, kind: FirmwareKind) -> Option<&[u8]> {
        self.firmware[kind.index()].as_deref()
    }

    /// Resolves a virtual address to its region, or `None` when unmapped.
    #[must_use]
    pub fn resolve(&self, vaddr: u32) -> Option<ResolvedAddress> {
        let (addr, want_virtual) = match translate(vaddr) {
            BusAddress::Virtual(addr) => (addr, true),
            BusAddress::Physical(addr) => (addr, false),
            BusAddress::Unmapped => return None,
        };
        self.regions
            .iter()
            .find(|r| r.kind.is_virtual() == want_virtual && r.contains(addr))
            .map(|region| ResolvedAddress {
                region: *region,
                offset: addr - region.start,
            })
    }
}
