//! EE memory subsystem: RAM, scratchpad, register banks, and mapped firmware.

/// Alignment and write-policy validators.
pub mod access;
/// IO register block.
pub mod io;
/// Address map and region table.
pub mod map;

pub use access::{
    validate_fetch_alignment, validate_fetch_region, validate_load_alignment,
    validate_store_alignment, validate_write_policy, AccessWidth,
};
pub use io::{IoRegisters, Timer};
pub use map::{
    firmware_base, translate, AccessPolicy, BusAddress, RegionDescriptor, RegionKind,
    RegionOverlapError, RegionTable, ResolvedAddress, EROM_BASE, GS_PRIV_END, GS_PRIV_START,
    IO_END, IO_START, PHYSICAL_ADDRESS_MASK, RAM_END, RAM_START, RESET_VECTOR, ROM1_BASE,
    ROM2_BASE, ROM_BASE, SCRATCHPAD_END, SCRATCHPAD_START,
};

use crate::FaultCode;

/// Main RAM size in bytes.
pub const RAM_BYTES: usize = 0x0200_0000;
/// Scratchpad size in bytes.
pub const SCRATCHPAD_BYTES: usize = 0x4000;
/// GS privileged register bank size in bytes.
pub const GS_PRIV_BYTES: usize = 0x2000;
/// Value returned by reads that hit no region.
pub const OPEN_BUS_VALUE: u64 = 0;

/// Reads a little-endian value of `width` from `bytes` at `offset`.
///
/// Returns `None` when the access would run past the end of the slice.
#[must_use]
pub fn read_le(bytes: &[u8], offset: usize, width: AccessWidth) -> Option<u64> {
    let len = width.bytes() as usize;
    let chunk = bytes.get(offset..offset.checked_add(len)?)?;
    let mut raw = [0_u8; 8];
    raw[..len].copy_from_slice(chunk);
    Some(u64::from_le_bytes(raw))
}

/// Writes the low `width` bytes of `value` little-endian into `bytes` at `offset`.
///
/// Returns `false` without touching `bytes` when the access would run past the end.
pub fn write_le(bytes: &mut [u8], offset: usize, width: AccessWidth, value: u64) -> bool {
    let len = width.bytes() as usize;
    let Some(end) = offset.checked_add(len) else {
        return false;
    };
    let Some(chunk) = bytes.get_mut(offset..end) else {
        return false;
    };
    chunk.copy_from_slice(&value.to_le_bytes()[..len]);
    true
}

/// Owns every CPU-visible store and routes accesses through the region table.
#[derive(Debug, Clone)]
pub struct MemoryBus {
    ram: Box<[u8]>,
    scratchpad: Box<[u8]>,
    gs_privileged: Box<[u8]>,
    io: IoRegisters,
    table: RegionTable,
    open_bus_reads: u64,
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBus {
    /// Creates a zeroed bus with only the fixed regions mapped.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ram: vec![0; RAM_BYTES].into_boxed_slice(),
            scratchpad: vec![0; SCRATCHPAD_BYTES].into_boxed_slice(),
            gs_privileged: vec![0; GS_PRIV_BYTES].into_boxed_slice(),
            io: IoRegisters::new(),
            table: RegionTable::fixed(),
            open_bus_reads: 0,
        }
    }

    /// Zeroes volatile stores and register banks. The region table is kept.
    pub fn reset_volatile(&mut self) {
        self.ram.fill(0);
        self.scratchpad.fill(0);
        self.gs_privileged.fill(0);
        self.io = IoRegisters::new();
        self.open_bus_reads = 0;
    }

    /// Swaps in a rebuilt region table.
    pub fn install_table(&mut self, table: RegionTable) {
        self.table = table;
    }

    /// IO register block.
    #[must_use]
    pub const fn io(&self) -> &IoRegisters {
        &self.io
    }

    /// Number of reads that hit no region since the last reset.
    #[must_use]
    pub const fn open_bus_reads(&self) -> u64 {
        self.open_bus_reads
    }

    /// Resolves a virtual address against the current table.
    #[must_use]
    pub fn resolve(&self, vaddr: u32) -> Option<ResolvedAddress> {
        self.table.resolve(vaddr)
    }

    /// Fetches the instruction word at `pc`.
    ///
    /// # Errors
    ///
    /// Returns [`FaultCode::UnalignedFetch`] or [`FaultCode::UnmappedFetch`].
    pub fn fetch(&self, pc: u32) -> Result<u32, FaultCode> {
        validate_fetch_alignment(pc)?;
        let hit = self.resolve(pc);
        validate_fetch_region(hit.map(|h| h.region.kind))?;
        hit.and_then(|h| self.read_backing(h, AccessWidth::Word))
            .map(|word| (word & 0xFFFF_FFFF) as u32)
            .ok_or(FaultCode::UnmappedFetch)
    }

    /// Performs a CPU data load, zero-extended into a `u64`.
    ///
    /// Unmapped reads return [`OPEN_BUS_VALUE`] and bump the open-bus counter.
    ///
    /// # Errors
    ///
    /// Returns [`FaultCode::UnalignedLoad`] for a misaligned address.
    pub fn read(&mut self, vaddr: u32, width: AccessWidth) -> Result<u64, FaultCode> {
        validate_load_alignment(vaddr, width)?;
        let value = self
            .resolve(vaddr)
            .and_then(|hit| self.read_backing(hit, width));
        Ok(value.unwrap_or_else(|| {
            self.open_bus_reads += 1;
            tracing::trace!(addr = format_args!("{vaddr:#010x}"), "open bus read");
            OPEN_BUS_VALUE
        }))
    }

    /// Side-effect-free read for debug views; `None` when unmapped or misaligned.
    #[must_use]
    pub fn peek(&self, vaddr: u32, width: AccessWidth) -> Option<u64> {
        if !width.is_aligned(vaddr) {
            return None;
        }
        self.resolve(vaddr)
            .and_then(|hit| self.read_backing(hit, width))
    }

    /// Checks that a store would be accepted without performing it.
    ///
    /// # Errors
    ///
    /// Returns [`FaultCode::UnalignedStore`], [`FaultCode::ReadOnlyWrite`], or
    /// [`FaultCode::UnmappedWrite`].
    pub fn check_write(&self, vaddr: u32, width: AccessWidth) -> Result<ResolvedAddress, FaultCode> {
        validate_store_alignment(vaddr, width)?;
        let hit = self.resolve(vaddr);
        validate_write_policy(hit.map(|h| h.region.kind))?;
        let hit = hit.ok_or(FaultCode::UnmappedWrite)?;
        // A wide store straddling the region end has nowhere to put its tail.
        if hit.offset + (width.bytes() - 1) > hit.region.end - hit.region.start {
            return Err(FaultCode::UnmappedWrite);
        }
        Ok(hit)
    }

    /// Performs a CPU data store of the low `width` bytes of `value`.
    ///
    /// Nothing is modified when the store is rejected.
    ///
    /// # Errors
    ///
    /// Propagates [`MemoryBus::check_write`] failures.
    pub fn write(&mut self, vaddr: u32, width: AccessWidth, value: u64) -> Result<(), FaultCode> {
        let hit = self.check_write(vaddr, width)?;
        let offset = hit.offset as usize;
        let stored = match hit.region.kind {
            RegionKind::Ram => write_le(&mut self.ram, offset, width, value),
            RegionKind::Scratchpad => write_le(&mut self.scratchpad, offset, width, value),
            RegionKind::GsPrivileged => write_le(&mut self.gs_privileged, offset, width, value),
            RegionKind::Io => {
                self.write_io(hit.region.start + hit.offset, width, value);
                true
            }
            RegionKind::Firmware(_) => false,
        };
        if stored {
            Ok(())
        } else {
            Err(FaultCode::UnmappedWrite)
        }
    }

    /// Advances IO-side timers by `cycles` EE cycles.
    pub fn tick_io(&mut self, cycles: u64) {
        self.io.tick(cycles);
    }

    fn read_backing(&self, hit: ResolvedAddress, width: AccessWidth) -> Option<u64> {
        let offset = hit.offset as usize;
        match hit.region.kind {
            RegionKind::Ram => read_le(&self.ram, offset, width),
            RegionKind::Scratchpad => read_le(&self.scratchpad, offset, width),
            RegionKind::GsPrivileged => read_le(&self.gs_privileged, offset, width),
            RegionKind::Io => Some(self.read_io(hit.region.start + hit.offset, width)),
            RegionKind::Firmware(kind) => {
                read_le(self.table.firmware_bytes(kind)?, offset, width)
            }
        }
    }

    fn read_io(&self, addr: u32, width: AccessWidth) -> u64 {
        if width == AccessWidth::Doubleword {
            let low = u64::from(self.io.read32(addr));
            let high = u64::from(self.io.read32(addr + 4));
            return low | (high << 32);
        }
        let shift = (addr & 3) * 8;
        let lane = u64::from(self.io.read32(addr & !3));
        (lane >> shift) & width.value_mask()
    }

    fn write_io(&mut self, addr: u32, width: AccessWidth, value: u64) {
        if width == AccessWidth::Doubleword {
            self.io.write32(addr, (value & 0xFFFF_FFFF) as u32);
            self.io.write32(addr + 4, (value >> 32) as u32);
            return;
        }
        let shift = (addr & 3) * 8;
        let mask = ((width.value_mask() << shift) & 0xFFFF_FFFF) as u32;
        let lane_value = ((value << shift) & 0xFFFF_FFFF) as u32;
        self.io.write32_masked(addr & !3, lane_value, mask);
    }
}
