//! EE IO register block: timers, interrupt controller, DMAC globals, and SIF mailboxes.
//!
//! Registers are modelled as 32-bit lanes. Narrower and wider bus accesses
//! are split or merged by [`super::MemoryBus`] before they reach this file,
//! which only sees `(lane address, value, byte-enable mask)` triples.

use std::collections::BTreeMap;

use crate::timing::BUS_CLOCK_DIVIDER;

/// Number of EE timers.
pub const TIMER_COUNT: usize = 4;
/// Address of timer 0's `COUNT` register.
pub const TIMER_BASE: u32 = 0x1000_0000;
/// Distance between consecutive timer register blocks.
pub const TIMER_STRIDE: u32 = 0x800;
/// Offset of `COUNT` within a timer block.
pub const TIMER_COUNT_OFFSET: u32 = 0x00;
/// Offset of `MODE` within a timer block.
pub const TIMER_MODE_OFFSET: u32 = 0x10;
/// Offset of `COMP` within a timer block.
pub const TIMER_COMP_OFFSET: u32 = 0x20;
/// Offset of `HOLD` within a timer block.
pub const TIMER_HOLD_OFFSET: u32 = 0x30;
/// Only T0 and T1 carry a `HOLD` register.
pub const TIMERS_WITH_HOLD: usize = 2;

/// DMAC control register.
pub const D_CTRL: u32 = 0x1000_E000;
/// DMAC interrupt status (low half) and mask (high half).
pub const D_STAT: u32 = 0x1000_E010;
/// DMAC priority control.
pub const D_PCR: u32 = 0x1000_E020;
/// DMAC skip quadword counts.
pub const D_SQWC: u32 = 0x1000_E030;
/// DMAC ring buffer size.
pub const D_RBSR: u32 = 0x1000_E040;
/// DMAC ring buffer offset.
pub const D_RBOR: u32 = 0x1000_E050;
/// DMAC stall address.
pub const D_STADR: u32 = 0x1000_E060;

/// INTC status register.
pub const I_STAT: u32 = 0x1000_F000;
/// INTC mask register.
pub const I_MASK: u32 = 0x1000_F010;
/// Valid INTC line bits.
pub const INTC_LINE_MASK: u32 = 0x7FFF;
/// First INTC line used by timer interrupts.
pub const INTC_TIMER_LINE_BASE: u32 = 9;

/// EE to IOP command mailbox.
pub const SIF_MSCOM: u32 = 0x1000_F200;
/// IOP to EE command mailbox.
pub const SIF_SMCOM: u32 = 0x1000_F210;
/// EE to IOP flag register.
pub const SIF_MSFLG: u32 = 0x1000_F220;
/// IOP to EE flag register.
pub const SIF_SMFLG: u32 = 0x1000_F230;
/// Bit the IOP sets in `SMFLG` once its side of SIF is up.
pub const SIF_SMFLG_IOP_READY: u32 = 0x0001_0000;

/// Bits of a timer `MODE` register.
pub mod timer_mode {
    /// Clock select field.
    pub const CLKS: u32 = 0b11;
    /// Reset the counter when it reaches `COMP`.
    pub const ZRET: u32 = 1 << 6;
    /// Counter enable.
    pub const CUE: u32 = 1 << 7;
    /// Interrupt on compare.
    pub const CMPE: u32 = 1 << 8;
    /// Interrupt on overflow.
    pub const OVFE: u32 = 1 << 9;
    /// Compare event flag, write 1 to clear.
    pub const EQUF: u32 = 1 << 10;
    /// Overflow event flag, write 1 to clear.
    pub const OVFF: u32 = 1 << 11;
    /// Bits software can set directly.
    pub const WRITABLE: u32 = 0x3FF;
}

const TIMER_COUNTER_PERIOD: u64 = 0x1_0000;

/// One EE timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Timer {
    /// Current 16-bit counter value.
    pub count: u32,
    /// `MODE` register.
    pub mode: u32,
    /// Compare target.
    pub comp: u32,
    /// Hold latch.
    pub hold: u32,
    prescale: u64,
}

/// What a timer reported while advancing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimerEvents {
    /// Counter passed `COMP`.
    pub compare: bool,
    /// Counter wrapped past `0xFFFF`.
    pub overflow: bool,
}

impl Timer {
    /// Prescaler divider in bus cycles, or `None` for the hblank source.
    #[must_use]
    pub const fn divider(&self) -> Option<u64> {
        match self.mode & timer_mode::CLKS {
            0 => Some(1),
            1 => Some(16),
            2 => Some(256),
            _ => None,
        }
    }

    /// `true` when the counter is enabled and driven by the bus clock.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.mode & timer_mode::CUE != 0 && self.divider().is_some()
    }

    fn write_mode(&mut self, value: u32, mask: u32) {
        let flags = self.mode & (timer_mode::EQUF | timer_mode::OVFF) & !(value & mask);
        let writable = merge(self.mode, value, mask & timer_mode::WRITABLE);
        self.mode = (writable & timer_mode::WRITABLE) | flags;
        if self.mode & timer_mode::CUE == 0 {
            self.count = 0;
            self.prescale = 0;
        }
    }

    /// Advances the timer by `bus_cycles` and reports events crossed on the way.
    pub fn advance(&mut self, bus_cycles: u64) -> TimerEvents {
        let mut events = TimerEvents::default();
        let Some(divider) = self.divider() else {
            return events;
        };
        if self.mode & timer_mode::CUE == 0 {
            return events;
        }

        self.prescale += bus_cycles;
        let mut ticks = self.prescale / divider;
        self.prescale %= divider;
        if ticks == 0 {
            return events;
        }

        let target = u64::from(self.comp & 0xFFFF);
        let mut count = u64::from(self.count & 0xFFFF);
        let zret = self.mode & timer_mode::ZRET != 0 && target != 0;

        if zret && count >= target {
            // Already past the target; it only comes round again after a wrap.
            let to_wrap = TIMER_COUNTER_PERIOD - count;
            if ticks < to_wrap {
                self.count = u32::try_from(count + ticks).unwrap_or(0);
                return self.latch(events);
            }
            events.overflow = true;
            ticks -= to_wrap;
            count = 0;
        }

        if zret {
            let to_target = target - count;
            if ticks >= to_target {
                events.compare = true;
                count = (ticks - to_target) % target;
            } else {
                count += ticks;
            }
        } else {
            let end = count + ticks;
            events.compare = ticks >= TIMER_COUNTER_PERIOD
                || (count < target && target <= end)
                || (end >= TIMER_COUNTER_PERIOD && target <= end - TIMER_COUNTER_PERIOD);
            events.overflow = events.overflow || end >= TIMER_COUNTER_PERIOD;
            count = end % TIMER_COUNTER_PERIOD;
        }

        self.count = u32::try_from(count).unwrap_or(0);
        self.latch(events)
    }

    fn latch(&mut self, events: TimerEvents) -> TimerEvents {
        if events.compare {
            self.mode |= timer_mode::EQUF;
        }
        if events.overflow {
            self.mode |= timer_mode::OVFF;
        }
        events
    }

    /// `true` when the reported events should raise this timer's INTC line.
    #[must_use]
    pub const fn wants_interrupt(&self, events: TimerEvents) -> bool {
        (events.compare && self.mode & timer_mode::CMPE != 0)
            || (events.overflow && self.mode & timer_mode::OVFE != 0)
    }
}

/// DMAC global registers; per-channel registers live in the plain latch map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DmacRegisters {
    /// `D_CTRL`.
    pub ctrl: u32,
    /// `D_STAT`.
    pub stat: u32,
    /// `D_PCR`.
    pub pcr: u32,
    /// `D_SQWC`.
    pub sqwc: u32,
    /// `D_RBSR`.
    pub rbsr: u32,
    /// `D_RBOR`.
    pub rbor: u32,
    /// `D_STADR`.
    pub stadr: u32,
}

/// SIF mailbox registers as seen from the EE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SifMailbox {
    /// `MSCOM`.
    pub mscom: u32,
    /// `SMCOM`.
    pub smcom: u32,
    /// `MSFLG`.
    pub msflg: u32,
    /// `SMFLG`, without the IOP-ready bit.
    pub smflg: u32,
}

/// Complete EE IO register state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IoRegisters {
    timers: [Timer; TIMER_COUNT],
    intc_stat: u32,
    intc_mask: u32,
    dmac: DmacRegisters,
    sif: SifMailbox,
    latches: BTreeMap<u32, u32>,
    bus_remainder: u64,
}

fn merge(old: u32, value: u32, mask: u32) -> u32 {
    (old & !mask) | (value & mask)
}

fn timer_slot(addr: u32) -> Option<(usize, u32)> {
    let rel = addr.checked_sub(TIMER_BASE)?;
    let index = usize::try_from(rel / TIMER_STRIDE).ok()?;
    if index >= TIMER_COUNT {
        return None;
    }
    let offset = rel % TIMER_STRIDE;
    let decoded = match offset {
        TIMER_COUNT_OFFSET | TIMER_MODE_OFFSET | TIMER_COMP_OFFSET => true,
        TIMER_HOLD_OFFSET => index < TIMERS_WITH_HOLD,
        _ => false,
    };
    decoded.then_some((index, offset))
}

impl IoRegisters {
    /// Creates the power-on register state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the 32-bit lane at `addr` (word aligned, physical).
    ///
    /// Reads have no side effects, so this doubles as the debug peek path.
    #[must_use]
    pub fn read32(&self, addr: u32) -> u32 {
        if let Some((index, offset)) = timer_slot(addr) {
            let timer = &self.timers[index];
            return match offset {
                TIMER_COUNT_OFFSET => timer.count & 0xFFFF,
                TIMER_MODE_OFFSET => timer.mode,
                TIMER_COMP_OFFSET => timer.comp,
                _ => timer.hold,
            };
        }
        match addr {
            I_STAT => self.intc_stat,
            I_MASK => self.intc_mask,
            D_CTRL => self.dmac.ctrl,
            D_STAT => self.dmac.stat,
            D_PCR => self.dmac.pcr,
            D_SQWC => self.dmac.sqwc,
            D_RBSR => self.dmac.rbsr,
            D_RBOR => self.dmac.rbor,
            D_STADR => self.dmac.stadr,
            SIF_MSCOM => self.sif.mscom,
            SIF_SMCOM => self.sif.smcom,
            SIF_MSFLG => self.sif.msflg,
            SIF_SMFLG => self.sif.smflg | SIF_SMFLG_IOP_READY,
            _ => self.latches.get(&addr).copied().unwrap_or(0),
        }
    }

    /// Writes a full 32-bit lane.
    pub fn write32(&mut self, addr: u32, value: u32) {
        self.write32_masked(addr, value, u32::MAX);
    }

    /// Writes the bytes of `value` selected by `mask` into the lane at `addr`.
    pub fn write32_masked(&mut self, addr: u32, value: u32, mask: u32) {
        let value = value & mask;
        if let Some((index, offset)) = timer_slot(addr) {
            let timer = &mut self.timers[index];
            match offset {
                TIMER_COUNT_OFFSET => timer.count = merge(timer.count, value, mask) & 0xFFFF,
                TIMER_MODE_OFFSET => timer.write_mode(value, mask),
                TIMER_COMP_OFFSET => timer.comp = merge(timer.comp, value, mask) & 0xFFFF,
                _ => timer.hold = merge(timer.hold, value, mask),
            }
            return;
        }
        match addr {
            I_STAT => self.intc_stat &= !value,
            I_MASK => self.intc_mask = (self.intc_mask ^ value) & INTC_LINE_MASK,
            D_CTRL => self.dmac.ctrl = merge(self.dmac.ctrl, value, mask),
            D_STAT => {
                let cleared = self.dmac.stat & !(value & 0xFFFF);
                self.dmac.stat = cleared ^ (value & 0xFFFF_0000);
            }
            D_PCR => self.dmac.pcr = merge(self.dmac.pcr, value, mask),
            D_SQWC => self.dmac.sqwc = merge(self.dmac.sqwc, value, mask),
            D_RBSR => self.dmac.rbsr = merge(self.dmac.rbsr, value, mask),
            D_RBOR => self.dmac.rbor = merge(self.dmac.rbor, value, mask),
            D_STADR => self.dmac.stadr = merge(self.dmac.stadr, value, mask),
            SIF_MSCOM => self.sif.mscom = merge(self.sif.mscom, value, mask),
            SIF_SMCOM => self.sif.smcom = merge(self.sif.smcom, value, mask),
            SIF_MSFLG => self.sif.msflg = merge(self.sif.msflg, value, mask),
            SIF_SMFLG => self.sif.smflg &= !value,
            _ => {
                let old = self.latches.get(&addr).copied().unwrap_or(0);
                let merged = merge(old, value, mask);
                if merged == 0 {
                    self.latches.remove(&addr);
                } else {
                    self.latches.insert(addr, merged);
                }
            }
        }
    }

    /// Advances every timer by `ee_cycles` EE clock cycles.
    ///
    /// Timers run from the bus clock, so odd cycles carry over to the next call.
    pub fn tick(&mut self, ee_cycles: u64) {
        let total = self.bus_remainder + ee_cycles;
        let bus_cycles = total / BUS_CLOCK_DIVIDER;
        self.bus_remainder = total % BUS_CLOCK_DIVIDER;
        if bus_cycles == 0 {
            return;
        }
        for (index, timer) in self.timers.iter_mut().enumerate() {
            if !timer.is_running() {
                continue;
            }
            let events = timer.advance(bus_cycles);
            if timer.wants_interrupt(events) {
                let line = INTC_TIMER_LINE_BASE + u32::try_from(index).unwrap_or(0);
                self.intc_stat |= 1 << line;
                tracing::trace!(timer = index, line, "timer interrupt raised");
            }
        }
    }

    /// Raises an INTC line directly.
    pub fn raise_interrupt(&mut self, line: u32) {
        self.intc_stat |= (1 << (line & 0x1F)) & INTC_LINE_MASK;
    }

    /// `true` when any unmasked INTC line is pending.
    #[must_use]
    pub const fn interrupt_pending(&self) -> bool {
        self.intc_stat & self.intc_mask != 0
    }

    /// Timer state by index.
    #[must_use]
    pub fn timer(&self, index: usize) -> Option<&Timer> {
        self.timers.get(index)
    }

    /// `I_STAT`.
    #[must_use]
    pub const fn intc_stat(&self) -> u32 {
        self.intc_stat
    }

    /// `I_MASK`.
    #[must_use]
    pub const fn intc_mask(&self) -> u32 {
        self.intc_mask
    }

    /// DMAC global registers.
    #[must_use]
    pub const fn dmac(&self) -> &DmacRegisters {
        &self.dmac
    }

    /// SIF mailbox registers.
    #[must_use]
    pub const fn sif(&self) -> &SifMailbox {
        &self.sif
    }

    /// Number of plain latch registers holding a non-zero value.
    #[must_use]
    pub fn latched_count(&self) -> usize {
        self.latches.len()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        timer_mode, IoRegisters, Timer, D_STAT, I_MASK, I_STAT, SIF_SMFLG, SIF_SMFLG_IOP_READY,
        TIMER_BASE, TIMER_COMP_OFFSET, TIMER_HOLD_OFFSET, TIMER_MODE_OFFSET, TIMER_STRIDE,
    };
    use rstest::rstest;

    #[test]
    fn intc_status_is_write_one_to_clear() {
        let mut io = IoRegisters::new();
        io.raise_interrupt(2);
        io.raise_interrupt(9);
        io.write32(I_STAT, 1 << 2);
        assert_eq!(io.read32(I_STAT), 1 << 9);
    }

    #[test]
    fn intc_mask_is_write_one_to_toggle() {
        let mut io = IoRegisters::new();
        io.write32(I_MASK, 0b101);
        io.write32(I_MASK, 0b110);
        assert_eq!(io.read32(I_MASK), 0b011);

        io.raise_interrupt(2);
        assert!(!io.interrupt_pending());
        io.raise_interrupt(1);
        assert!(io.interrupt_pending());
    }

    #[test]
    fn dmac_stat_clears_low_half_and_toggles_high_half() {
        let mut io = IoRegisters::new();
        io.write32(D_STAT, 0x0003_0000);
        assert_eq!(io.read32(D_STAT), 0x0003_0000);
        io.write32(D_STAT, 0x0001_0000);
        assert_eq!(io.read32(D_STAT), 0x0002_0000);
    }

    #[test]
    fn smflg_always_reports_iop_ready() {
        let io = IoRegisters::new();
        assert_eq!(io.read32(SIF_SMFLG) & SIF_SMFLG_IOP_READY, SIF_SMFLG_IOP_READY);
    }

    #[test]
    fn unknown_registers_latch_with_byte_masks() {
        let mut io = IoRegisters::new();
        io.write32(0x1000_8000, 0x1122_3344);
        io.write32_masked(0x1000_8000, 0x0000_AA00, 0x0000_FF00);
        assert_eq!(io.read32(0x1000_8000), 0x1122_AA44);
        assert_eq!(io.latched_count(), 1);
    }

    #[rstest]
    #[case::t0(0, true)]
    #[case::t1(1, true)]
    #[case::t2(2, false)]
    #[case::t3(3, false)]
    fn hold_register_exists_only_on_first_two_timers(#[case] index: u32, #[case] has_hold: bool) {
        let mut io = IoRegisters::new();
        let addr = TIMER_BASE + index * TIMER_STRIDE + TIMER_HOLD_OFFSET;
        io.write32(addr, 0xBEEF);

        assert_eq!(io.read32(addr), 0xBEEF);
        let hold = io.timer(index as usize).map(|t| t.hold);
        if has_hold {
            assert_eq!(hold, Some(0xBEEF));
            assert_eq!(io.latched_count(), 0);
        } else {
            assert_eq!(hold, Some(0));
            assert_eq!(io.latched_count(), 1);
        }
    }

    #[rstest]
    #[case(0, 1)]
    #[case(1, 16)]
    #[case(2, 256)]
    fn prescaler_selects_divider(#[case] clks: u32, #[case] divider: u64) {
        let mut timer = Timer {
            mode: timer_mode::CUE | clks,
            ..Timer::default()
        };
        timer.advance(divider * 10);
        assert_eq!(timer.count, 10);
    }

    #[test]
    fn compare_with_zret_wraps_counter_and_raises_interrupt() {
        let mut io = IoRegisters::new();
        io.write32(TIMER_BASE + TIMER_COMP_OFFSET, 100);
        io.write32(
            TIMER_BASE + TIMER_MODE_OFFSET,
            timer_mode::CUE | timer_mode::ZRET | timer_mode::CMPE,
        );
        // 2 EE cycles per bus cycle.
        io.tick(2 * 150);
        let timer = io.timer(0).expect("timer 0");
        assert_eq!(timer.count, 50);
        assert_ne!(timer.mode & timer_mode::EQUF, 0);
        assert_eq!(io.intc_stat(), 1 << 9);
    }

    #[test]
    fn overflow_sets_flag_and_flag_clears_on_write_one() {
        let mut io = IoRegisters::new();
        let mode_addr = TIMER_BASE + TIMER_STRIDE + TIMER_MODE_OFFSET;
        io.write32(mode_addr, timer_mode::CUE | timer_mode::OVFE);
        io.tick(2 * 0x1_0005);
        assert_eq!(io.timer(1).map(|t| t.count), Some(5));
        assert_ne!(io.read32(mode_addr) & timer_mode::OVFF, 0);
        assert_eq!(io.intc_stat(), 1 << 10);

        io.write32(mode_addr, timer_mode::CUE | timer_mode::OVFE | timer_mode::OVFF);
        assert_eq!(io.read32(mode_addr) & timer_mode::OVFF, 0);
        assert_eq!(io.timer(1).map(|t| t.count), Some(5));
    }

    #[test]
    fn stopped_timer_does_not_count_and_odd_cycles_carry() {
        let mut io = IoRegisters::new();
        io.tick(1_000);
        assert_eq!(io.timer(0).map(|t| t.count), Some(0));

        io.write32(TIMER_BASE + TIMER_MODE_OFFSET, timer_mode::CUE);
        io.tick(3);
        io.tick(1);
        assert_eq!(io.timer(0).map(|t| t.count), Some(2));
    }
}
