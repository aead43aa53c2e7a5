//! Emotion Engine emulation core.
//!
//! A host supplies firmware buffers tagged with their part kind, then drives
//! the machine with `init_core`, `step`, and `tick`, and inspects it through
//! the debug snapshot. [`HostBridge`] is the thread-safe host surface;
//! [`Ps2Core`] is the single owned machine behind it.

/// Firmware part kinds and the store that retains loaded buffers.
pub mod firmware;
pub use firmware::{
    FirmwareKind, FirmwarePart, FirmwareStore, LoadError, ParseFirmwareKindError,
    FIRMWARE_KIND_COUNT,
};

/// Memory model primitives, region table, and IO registers.
pub mod memory;
pub use memory::{
    translate, AccessPolicy, AccessWidth, BusAddress, MemoryBus, RegionDescriptor, RegionKind,
    RegionTable, RESET_VECTOR,
};

/// Diagnostics counters and message log.
pub mod diag;
pub use diag::{DiagCounters, DiagLog, DIAG_LOG_CAPACITY};

/// Public host-facing API contract and integration types.
pub mod api;
pub use api::{
    CoreConfig, CoreError, StepOutcome, StopHandle, TickBoundary, TickOutcome,
    DEFAULT_TICK_BUDGET_STEPS,
};

/// Architectural CPU state model primitives.
pub mod state;
pub use state::{ArchitecturalState, Gpr, RunState, GPR_COUNT};

/// Opcode classification tables.
pub mod encoding;
pub use encoding::{classify_opcode, OpcodeEncoding, OpcodeGroup};

/// Instruction decode pipeline with field extraction.
pub mod decoder;
pub use decoder::{DecodedInstruction, DecodedOrFault, Decoder};

/// Fault taxonomy for machine faults.
pub mod fault;
pub use fault::{FaultClass, FaultCode, FaultRecord};

/// Clock constants and the instruction cycle-cost table.
pub mod timing;
pub use timing::{cycle_cost, instruction_cycles, CycleCostKind, CYCLE_COST_TABLE, EE_CLOCK_HZ};

/// Instruction execution pipeline.
pub mod execute;
pub use execute::{commit_execution, execute_instruction, step_one, ExecuteOutcome, ExecuteState};

/// Instruction disassembly.
pub mod disasm;
pub use disasm::{disassemble, disassemble_window, DisassemblyRow};

/// Point-in-time debug snapshot and its text rendering.
pub mod debug;
pub use debug::{DebugSnapshot, FirmwareSummary};

/// The owned machine.
pub mod machine;
pub use machine::Ps2Core;

/// Thread-safe host control surface.
pub mod bridge;
pub use bridge::{HostBridge, TickReport};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
