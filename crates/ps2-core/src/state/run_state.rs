use crate::FaultCode;

/// Execution-state machine for host-observable core control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum RunState {
    /// Core has never been initialised.
    #[default]
    Uninitialized,
    /// Initialised, but no ROM is mapped at the reset vector.
    AwaitingRom,
    /// Idle between ticks and able to step.
    Ready,
    /// Inside a multi-step tick.
    Running,
    /// Explicitly stopped; only re-initialisation leaves this state.
    Halted,
    /// A machine fault is latched; only re-initialisation leaves this state.
    Faulted(FaultCode),
}

impl RunState {
    /// Returns the latched fault, if any.
    #[must_use]
    pub const fn latched_fault(self) -> Option<FaultCode> {
        match self {
            Self::Faulted(code) => Some(code),
            Self::Uninitialized | Self::AwaitingRom | Self::Ready | Self::Running | Self::Halted => {
                None
            }
        }
    }

    /// Upper-case label used by the text debug rendering.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Uninitialized => "UNINITIALIZED",
            Self::AwaitingRom => "AWAITING_ROM",
            Self::Ready => "READY",
            Self::Running => "RUNNING",
            Self::Halted => "HALTED",
            Self::Faulted(_) => "FAULTED",
        }
    }
}
