//! Diagnostics counters and the bounded message log.

use std::collections::VecDeque;

use crate::{FaultClass, FaultCode};

/// Maximum number of entries retained by [`DiagLog`].
pub const DIAG_LOG_CAPACITY: usize = 100;

/// Saturating counters describing the core's run so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DiagCounters {
    /// Decode-class faults.
    pub fault_count_decode: u32,
    /// Memory-class faults.
    pub fault_count_memory: u32,
    /// Arithmetic-class faults.
    pub fault_count_arithmetic: u32,
    /// Trap-class faults.
    pub fault_count_trap: u32,
    /// Retired instructions.
    pub instruction_count: u64,
    /// Writes rejected by the bus policy.
    pub rejected_write_count: u32,
    /// Reads from unmapped addresses that returned open-bus data.
    pub open_bus_read_count: u64,
}

impl DiagCounters {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the counter for the class of `code`.
    #[allow(clippy::missing_const_for_fn)]
    pub fn record_fault(&mut self, code: FaultCode) {
        let counter = match code.class() {
            FaultClass::Decode => &mut self.fault_count_decode,
            FaultClass::Memory => &mut self.fault_count_memory,
            FaultClass::Arithmetic => &mut self.fault_count_arithmetic,
            FaultClass::Trap => &mut self.fault_count_trap,
        };
        *counter = counter.saturating_add(1);
        if matches!(code, FaultCode::ReadOnlyWrite | FaultCode::UnmappedWrite) {
            self.rejected_write_count = self.rejected_write_count.saturating_add(1);
        }
    }

    /// Records a retired instruction.
    #[allow(clippy::missing_const_for_fn)]
    pub fn record_retired(&mut self) {
        self.instruction_count = self.instruction_count.saturating_add(1);
    }

    /// Total faults across every class.
    #[must_use]
    pub const fn total_faults(&self) -> u64 {
        self.fault_count_decode as u64
            + self.fault_count_memory as u64
            + self.fault_count_arithmetic as u64
            + self.fault_count_trap as u64
    }

    /// Resets all counters.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Bounded FIFO of human-readable diagnostic messages.
///
/// Once full, pushing drops the oldest entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagLog {
    entries: VecDeque<String>,
}

impl DiagLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message.
    pub fn push(&mut self, message: impl Into<String>) {
        if self.entries.len() == DIAG_LOG_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(message.into());
    }

    /// Most recent `count` messages, oldest first.
    #[must_use]
    pub fn last(&self, count: usize) -> Vec<&str> {
        let skip = self.entries.len().saturating_sub(count);
        self.entries.iter().skip(skip).map(String::as_str).collect()
    }

    /// Drops every message.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Every message joined by newlines.
    #[must_use]
    pub fn dump(&self) -> String {
        self.entries
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Number of retained messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when no messages are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(FaultCode::IllegalInstruction, FaultClass::Decode)]
    #[case(FaultCode::UnalignedLoad, FaultClass::Memory)]
    #[case(FaultCode::IntegerOverflow, FaultClass::Arithmetic)]
    #[case(FaultCode::Breakpoint, FaultClass::Trap)]
    fn record_fault_bumps_matching_class(#[case] code: FaultCode, #[case] class: FaultClass) {
        let mut counters = DiagCounters::new();
        counters.record_fault(code);
        let count = match class {
            FaultClass::Decode => counters.fault_count_decode,
            FaultClass::Memory => counters.fault_count_memory,
            FaultClass::Arithmetic => counters.fault_count_arithmetic,
            FaultClass::Trap => counters.fault_count_trap,
        };
        assert_eq!(count, 1);
        assert_eq!(counters.total_faults(), 1);
    }

    #[test]
    fn rejected_store_counts_as_rejected_write() {
        let mut counters = DiagCounters::new();
        counters.record_fault(FaultCode::ReadOnlyWrite);
        counters.record_fault(FaultCode::UnmappedWrite);
        counters.record_fault(FaultCode::UnalignedStore);
        assert_eq!(counters.rejected_write_count, 2);
        assert_eq!(counters.fault_count_memory, 3);
    }

    #[test]
    fn counters_saturate() {
        let mut counters = DiagCounters {
            fault_count_trap: u32::MAX,
            instruction_count: u64::MAX,
            ..DiagCounters::default()
        };
        counters.record_fault(FaultCode::SystemCall);
        counters.record_retired();
        assert_eq!(counters.fault_count_trap, u32::MAX);
        assert_eq!(counters.instruction_count, u64::MAX);
    }

    #[test]
    fn log_keeps_the_newest_entries() {
        let mut log = DiagLog::new();
        for i in 0..DIAG_LOG_CAPACITY + 5 {
            log.push(format!("msg {i}"));
        }
        assert_eq!(log.len(), DIAG_LOG_CAPACITY);
        assert_eq!(log.last(2), vec!["msg 103", "msg 104"]);
        assert!(log.dump().starts_with("msg 5\n"));

        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.dump(), "");
    }

    #[test]
    fn last_clamps_to_available_entries() {
        let mut log = DiagLog::new();
        log.push("only");
        assert_eq!(log.last(10), vec!["only"]);
    }
}
