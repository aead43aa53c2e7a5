//! Point-in-time machine snapshot for host debugging views.

use std::fmt;

use crate::diag::DiagCounters;
use crate::fault::FaultRecord;
use crate::firmware::FirmwareKind;
use crate::state::{Gpr, RunState, GPR_COUNT};

/// Number of log lines carried by a snapshot.
pub const SNAPSHOT_LOG_LINES: usize = 8;

/// Summary of one installed firmware part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct FirmwareSummary {
    /// Part kind.
    pub kind: FirmwareKind,
    /// Buffer length in bytes.
    pub len: usize,
    /// Store generation at which the part was installed.
    pub generation: u64,
    /// `false` when the size is not a typical dump size for the kind.
    pub plausible: bool,
}

/// Read-only view of CPU and machine state.
///
/// Computing a snapshot never mutates the core, and a snapshot taken before
/// initialisation renders as `UNINITIALIZED` rather than failing.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DebugSnapshot {
    /// Current run state.
    pub run_state: RunState,
    /// ROM loaded and the core initialised.
    pub ready: bool,
    /// Program counter.
    pub pc: u32,
    /// Address executed after `pc`.
    pub next_pc: u32,
    /// `pc` names a branch delay slot.
    pub in_delay_slot: bool,
    /// EE cycle counter.
    pub cycles: u64,
    /// Retired instruction count.
    pub retired: u64,
    /// Word at `pc`, when it can be read without side effects.
    pub instruction: Option<u32>,
    /// Disassembly of `instruction`.
    pub disassembly: Option<String>,
    /// General-purpose registers in index order.
    pub gprs: [u64; GPR_COUNT],
    /// `HI` register.
    pub hi: u64,
    /// `LO` register.
    pub lo: u64,
    /// COP0 Status.
    pub cop0_status: u32,
    /// COP0 Cause.
    pub cop0_cause: u32,
    /// COP0 EPC.
    pub cop0_epc: u32,
    /// INTC `I_STAT`.
    pub intc_stat: u32,
    /// INTC `I_MASK`.
    pub intc_mask: u32,
    /// Installed firmware parts.
    pub firmware: Vec<FirmwareSummary>,
    /// Latched fault, if any.
    pub fault: Option<FaultRecord>,
    /// Diagnostics counters.
    pub counters: DiagCounters,
    /// Most recent diagnostic log lines, oldest first.
    pub recent_log: Vec<String>,
}

impl DebugSnapshot {
    /// Snapshot of a core that has never been initialised.
    #[must_use]
    pub fn uninitialized() -> Self {
        Self {
            run_state: RunState::Uninitialized,
            ready: false,
            pc: 0,
            next_pc: 0,
            in_delay_slot: false,
            cycles: 0,
            retired: 0,
            instruction: None,
            disassembly: None,
            gprs: [0; GPR_COUNT],
            hi: 0,
            lo: 0,
            cop0_status: 0,
            cop0_cause: 0,
            cop0_epc: 0,
            intc_stat: 0,
            intc_mask: 0,
            firmware: Vec::new(),
            fault: None,
            counters: DiagCounters::default(),
            recent_log: Vec::new(),
        }
    }

    /// Value of `reg`.
    #[must_use]
    pub const fn gpr(&self, reg: Gpr) -> u64 {
        self.gprs[reg.index()]
    }
}

impl fmt::Display for DebugSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "status: {}", self.run_state.label())?;
        if self.run_state == RunState::Uninitialized {
            writeln!(f, "core not initialised; load a ROM and call initCore")?;
            return write_firmware(f, &self.firmware);
        }

        writeln!(
            f,
            "pc: 0x{:08x}  next: 0x{:08x}  delay-slot: {}",
            self.pc,
            self.next_pc,
            if self.in_delay_slot { "yes" } else { "no" }
        )?;
        writeln!(f, "cycles: {}  retired: {}", self.cycles, self.retired)?;
        match (self.instruction, &self.disassembly) {
            (Some(word), Some(text)) => writeln!(f, "insn: 0x{word:08x}  {text}")?,
            _ => writeln!(f, "insn: <unreadable>")?,
        }

        for row in Gpr::ALL.chunks(4) {
            let line = row
                .iter()
                .map(|reg| format!("{:>4}={:016x}", reg.name(), self.gpr(*reg)))
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(f, "{line}")?;
        }
        writeln!(f, "  hi={:016x}   lo={:016x}", self.hi, self.lo)?;
        writeln!(
            f,
            "cop0: status=0x{:08x} cause=0x{:08x} epc=0x{:08x}",
            self.cop0_status, self.cop0_cause, self.cop0_epc
        )?;
        writeln!(
            f,
            "intc: stat=0x{:08x} mask=0x{:08x}",
            self.intc_stat, self.intc_mask
        )?;
        write_firmware(f, &self.firmware)?;

        match &self.fault {
            Some(fault) => {
                write!(
                    f,
                    "fault: {} ({}) at pc 0x{:08x} cycle {}",
                    fault.code.tag(),
                    fault.code,
                    fault.pc,
                    fault.cycle
                )?;
                if let Some(addr) = fault.address {
                    write!(f, " addr 0x{addr:08x}")?;
                }
                if fault.in_delay_slot {
                    write!(f, " [delay slot]")?;
                }
                writeln!(f)?;
            }
            None => writeln!(f, "fault: none")?,
        }

        let c = &self.counters;
        writeln!(
            f,
            "diag: faults decode={} memory={} arith={} trap={} rejected-writes={} open-bus={}",
            c.fault_count_decode,
            c.fault_count_memory,
            c.fault_count_arithmetic,
            c.fault_count_trap,
            c.rejected_write_count,
            c.open_bus_read_count
        )?;
        for line in &self.recent_log {
            writeln!(f, "log: {line}")?;
        }
        Ok(())
    }
}

fn write_firmware(f: &mut fmt::Formatter<'_>, parts: &[FirmwareSummary]) -> fmt::Result {
    if parts.is_empty() {
        return writeln!(f, "firmware: none");
    }
    for part in parts {
        writeln!(
            f,
            "firmware {}: {} bytes gen {}{}",
            part.kind.label(),
            part.len,
            part.generation,
            if part.plausible { "" } else { " (unusual size)" }
        )?;
    }
    Ok(())
}
