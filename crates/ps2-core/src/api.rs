//! Public host-facing API contracts for embedding the emulator core.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::memory::RESET_VECTOR;
use crate::FaultCode;

/// Default number of instructions executed by one `tick()`.
pub const DEFAULT_TICK_BUDGET_STEPS: u32 = 100_000;

/// Top-level configuration for a core instance.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CoreConfig {
    /// Address loaded into the program counter by `init_core`.
    pub reset_vector: u32,
    /// Maximum instructions per tick.
    pub tick_budget_steps: u32,
    /// Optional cycle ceiling per tick, checked at instruction boundaries.
    pub tick_budget_cycles: Option<u64>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            reset_vector: RESET_VECTOR,
            tick_budget_steps: DEFAULT_TICK_BUDGET_STEPS,
            tick_budget_cycles: None,
        }
    }
}

/// Output status from one instruction retirement attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepOutcome {
    /// Instruction retired and consumed a fixed cycle cost.
    Retired {
        /// Cycle cost consumed by the retired instruction.
        cycles: u64,
    },
    /// Fault was raised during fetch, decode, execute, or commit.
    Fault {
        /// Canonical fault code.
        cause: FaultCode,
        /// Address involved in the fault, when there is one.
        address: Option<u32>,
    },
}

/// Why a tick stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum TickBoundary {
    /// Step budget exhausted.
    StepBudget,
    /// Cycle budget reached or crossed.
    CycleBudget,
    /// A machine fault was raised and latched.
    Fault(FaultCode),
    /// A [`StopHandle`] requested an early stop.
    StopRequested,
}

/// Aggregated result of one `tick()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct TickOutcome {
    /// Instructions retired during this tick.
    pub steps: u32,
    /// Cycle counter after the tick.
    pub cycles: u64,
    /// Program counter after the tick.
    pub pc: u32,
    /// Stop condition that ended the tick.
    pub boundary: TickBoundary,
}

/// Precondition failures for control operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum CoreError {
    /// `init_core` has never run.
    #[error("core is not initialised")]
    NotInitialized,
    /// No ROM is mapped at the reset vector.
    #[error("no ROM loaded")]
    AwaitingRom,
    /// A machine fault is latched.
    #[error("core is faulted: {0}")]
    Faulted(FaultCode),
    /// The core was halted.
    #[error("core is halted")]
    Halted,
}

/// Cloneable flag used to interrupt a running tick from another thread.
///
/// The request is consumed by the next instruction boundary check, so a
/// stop that arrives between ticks ends the following tick before it
/// executes anything.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    /// Creates a handle with no pending request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests that the current or next tick stop at the next boundary.
    pub fn request(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// `true` while a request is pending.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Consumes a pending request.
    pub(crate) fn take(&self) -> bool {
        self.flag.swap(false, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::{CoreConfig, CoreError, StopHandle, DEFAULT_TICK_BUDGET_STEPS};
    use crate::FaultCode;

    #[test]
    fn default_config_boots_from_bios_vector() {
        let config = CoreConfig::default();
        assert_eq!(config.reset_vector, 0xBFC0_0000);
        assert_eq!(config.tick_budget_steps, DEFAULT_TICK_BUDGET_STEPS);
        assert!(config.tick_budget_cycles.is_none());
    }

    #[test]
    fn stop_handle_is_shared_and_consumed_once() {
        let handle = StopHandle::new();
        let clone = handle.clone();
        clone.request();
        assert!(handle.is_requested());
        assert!(handle.take());
        assert!(!handle.take());
        assert!(!clone.is_requested());
    }

    #[test]
    fn core_error_messages_name_the_fault() {
        let message = CoreError::Faulted(FaultCode::ReadOnlyWrite).to_string();
        assert!(message.starts_with("core is faulted"));
        assert_eq!(CoreError::AwaitingRom.to_string(), "no ROM loaded");
    }
}
