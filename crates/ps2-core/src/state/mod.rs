//! Architectural CPU state model primitives.

/// Register file types and storage model.
pub mod registers;
/// Host-observable execution state machine.
pub mod run_state;

pub use registers::{
    cop0, ArchitecturalState, Gpr, COP0_PRID_RESET, COP0_STATUS_RESET, COP0_REGISTER_COUNT,
    GPR_COUNT,
};
pub use run_state::RunState;
