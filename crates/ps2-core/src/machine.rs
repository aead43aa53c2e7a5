//! The emulation core: one owned machine driven by host control calls.

use crate::api::{CoreConfig, CoreError, StepOutcome, StopHandle, TickBoundary, TickOutcome};
use crate::debug::{DebugSnapshot, FirmwareSummary, SNAPSHOT_LOG_LINES};
use crate::diag::{DiagCounters, DiagLog};
use crate::disasm::disassemble;
use crate::execute::step_one;
use crate::fault::{FaultCode, FaultRecord};
use crate::firmware::{FirmwareKind, FirmwarePart, FirmwareStore, LoadError};
use crate::memory::{AccessWidth, MemoryBus, RegionTable};
use crate::state::{cop0, ArchitecturalState, RunState};

/// A single Emotion Engine machine.
///
/// All state is owned here and mutated only through `&mut self`, so a host
/// that needs cross-thread access wraps the core in a lock (see
/// [`HostBridge`](crate::bridge::HostBridge)).
#[derive(Debug)]
pub struct Ps2Core {
    config: CoreConfig,
    arch: ArchitecturalState,
    bus: MemoryBus,
    firmware: FirmwareStore,
    run_state: RunState,
    fault: Option<FaultRecord>,
    counters: DiagCounters,
    log: DiagLog,
    stop: StopHandle,
}

impl Default for Ps2Core {
    fn default() -> Self {
        Self::new()
    }
}

impl Ps2Core {
    /// Creates an uninitialised core with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(CoreConfig::default())
    }

    /// Creates an uninitialised core.
    #[must_use]
    pub fn with_config(config: CoreConfig) -> Self {
        let arch = ArchitecturalState::reset(config.reset_vector);
        Self {
            config,
            arch,
            bus: MemoryBus::new(),
            firmware: FirmwareStore::new(),
            run_state: RunState::Uninitialized,
            fault: None,
            counters: DiagCounters::new(),
            log: DiagLog::new(),
            stop: StopHandle::new(),
        }
    }

    /// Resets CPU state and volatile memory, keeping loaded firmware.
    ///
    /// Safe to call any number of times. Clears a latched fault or halt.
    pub fn init_core(&mut self) -> RunState {
        self.arch = ArchitecturalState::reset(self.config.reset_vector);
        self.bus.reset_volatile();
        self.fault = None;
        self.counters.reset();
        self.stop.take();

        let next = if self.firmware.has_rom() {
            RunState::Ready
        } else {
            RunState::AwaitingRom
        };
        self.transition(next);
        tracing::info!(
            state = next.label(),
            reset_vector = format_args!("{:#010x}", self.config.reset_vector),
            "core initialised"
        );
        self.log.push(format!("init: {}", next.label()));
        next
    }

    /// Installs a firmware part and remaps the region table.
    ///
    /// The store and the table are replaced together, so a rejected load
    /// leaves both exactly as they were. Returns the installed part.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] when the buffer is rejected for its kind.
    pub fn load_part(&mut self, kind: FirmwareKind, bytes: &[u8]) -> Result<FirmwarePart, LoadError> {
        let mut store = self.firmware.clone();
        let loaded = store.load(kind, bytes).cloned();
        let staged = match loaded {
            Ok(part) => RegionTable::build(&store)
                .map(|table| (part, table))
                .map_err(LoadError::from),
            Err(err) => Err(err),
        };
        let (part, table) = match staged {
            Ok(staged) => staged,
            Err(err) => {
                tracing::warn!(%kind, len = bytes.len(), error = %err, "firmware load rejected");
                self.log.push(format!("load {kind} rejected: {err}"));
                return Err(err);
            }
        };

        self.firmware = store;
        self.bus.install_table(table);
        self.log.push(format!("load {kind}: {} bytes", bytes.len()));
        if kind == FirmwareKind::Rom && self.run_state == RunState::AwaitingRom {
            self.transition(RunState::Ready);
        }
        Ok(part)
    }

    /// Drops every firmware part. An initialised core waits for a new ROM.
    pub fn clear_firmware(&mut self) {
        self.firmware.clear();
        self.bus.install_table(RegionTable::fixed());
        self.log.push("firmware cleared");
        if matches!(self.run_state, RunState::Ready | RunState::Running) {
            self.transition(RunState::AwaitingRom);
        }
    }

    /// Executes exactly one instruction.
    ///
    /// A machine fault is not an error here: it is latched into the run
    /// state and returned as [`StepOutcome::Fault`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError`] when the core cannot step in its current state.
    pub fn step(&mut self) -> Result<StepOutcome, CoreError> {
        self.ensure_steppable()?;
        let outcome = step_one(&mut self.arch, &mut self.bus);
        self.absorb(outcome);
        Ok(outcome)
    }

    /// Executes instructions until a budget, a fault, or a stop request.
    ///
    /// The stop request is checked before every instruction, so the state
    /// reported is always that of the last completed instruction.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError`] when the core cannot step in its current state.
    pub fn tick(&mut self) -> Result<TickOutcome, CoreError> {
        self.ensure_steppable()?;
        self.transition(RunState::Running);

        let start_cycles = self.arch.cycles();
        let mut steps = 0_u32;
        let boundary = loop {
            if self.stop.take() {
                break TickBoundary::StopRequested;
            }
            if steps >= self.config.tick_budget_steps {
                break TickBoundary::StepBudget;
            }
            if let Some(budget) = self.config.tick_budget_cycles {
                if self.arch.cycles().saturating_sub(start_cycles) >= budget {
                    break TickBoundary::CycleBudget;
                }
            }

            let outcome = step_one(&mut self.arch, &mut self.bus);
            self.absorb(outcome);
            match outcome {
                StepOutcome::Retired { .. } => steps += 1,
                StepOutcome::Fault { cause, .. } => break TickBoundary::Fault(cause),
            }
        };

        if self.run_state == RunState::Running {
            self.transition(RunState::Ready);
        }
        tracing::debug!(steps, cycles = self.arch.cycles(), ?boundary, "tick finished");
        Ok(TickOutcome {
            steps,
            cycles: self.arch.cycles(),
            pc: self.arch.pc(),
            boundary,
        })
    }

    /// Stops the core until the next `init_core`.
    pub fn halt(&mut self) {
        if self.run_state != RunState::Uninitialized {
            self.transition(RunState::Halted);
            self.log.push("halted");
        }
    }

    /// Structured snapshot of the machine.
    #[must_use]
    pub fn debug_snapshot(&self) -> DebugSnapshot {
        let firmware = self
            .firmware
            .parts()
            .map(|part| FirmwareSummary {
                kind: part.kind(),
                len: part.len(),
                generation: part.generation(),
                plausible: part.is_plausible(),
            })
            .collect();
        if self.run_state == RunState::Uninitialized {
            return DebugSnapshot {
                pc: self.arch.pc(),
                next_pc: self.arch.next_pc(),
                firmware,
                ..DebugSnapshot::uninitialized()
            };
        }

        let pc = self.arch.pc();
        let instruction = self
            .bus
            .peek(pc, AccessWidth::Word)
            .and_then(|word| u32::try_from(word).ok());
        let mut counters = self.counters;
        counters.open_bus_read_count = self.bus.open_bus_reads();
        let io = self.bus.io();

        DebugSnapshot {
            run_state: self.run_state,
            ready: self.is_debug_ready(),
            pc,
            next_pc: self.arch.next_pc(),
            in_delay_slot: self.arch.in_delay_slot(),
            cycles: self.arch.cycles(),
            retired: self.arch.retired(),
            instruction,
            disassembly: instruction.map(|word| disassemble(word, pc).text()),
            gprs: *self.arch.gprs(),
            hi: self.arch.hi(),
            lo: self.arch.lo(),
            cop0_status: self.arch.cop0(cop0::STATUS),
            cop0_cause: self.arch.cop0(cop0::CAUSE),
            cop0_epc: self.arch.cop0(cop0::EPC),
            intc_stat: io.intc_stat(),
            intc_mask: io.intc_mask(),
            firmware,
            fault: self.fault,
            counters,
            recent_log: self
                .log
                .last(SNAPSHOT_LOG_LINES)
                .into_iter()
                .map(str::to_owned)
                .collect(),
        }
    }

    /// Deterministic text rendering of [`Ps2Core::debug_snapshot`].
    #[must_use]
    pub fn debug_state(&self) -> String {
        self.debug_snapshot().to_string()
    }

    /// `true` once ROM is loaded and the core has been initialised.
    #[must_use]
    pub fn is_debug_ready(&self) -> bool {
        self.firmware.has_rom() && self.run_state != RunState::Uninitialized
    }

    /// Side-effect-free read for host tooling; `None` when unmapped.
    #[must_use]
    pub fn read_memory(&self, addr: u32, width: AccessWidth) -> Option<u64> {
        self.bus.peek(addr, width)
    }

    /// Host poke through the CPU's view of memory.
    ///
    /// On an initialised core a rejected write latches the fault exactly as
    /// a faulting store would. Before `init_core`, or while waiting for a
    /// ROM, the fault code is only returned. An already latched fault is
    /// never replaced.
    ///
    /// # Errors
    ///
    /// Returns the [`FaultCode`] the bus raised.
    pub fn write_memory(&mut self, addr: u32, width: AccessWidth, value: u64) -> Result<(), FaultCode> {
        self.bus.write(addr, width, value).inspect_err(|&code| {
            match self.run_state {
                RunState::Uninitialized | RunState::AwaitingRom | RunState::Faulted(_) => {
                    tracing::debug!(
                        fault = code.tag(),
                        address = format_args!("{addr:#010x}"),
                        state = self.run_state.label(),
                        "host write rejected without latching"
                    );
                    self.log
                        .push(format!("poke 0x{addr:08x} rejected: {}", code.tag()));
                }
                RunState::Ready | RunState::Running | RunState::Halted => {
                    self.latch_fault(code, Some(addr));
                }
            }
        })
    }

    /// Current run state.
    #[must_use]
    pub const fn run_state(&self) -> RunState {
        self.run_state
    }

    /// Latched fault record, if any.
    #[must_use]
    pub const fn fault(&self) -> Option<FaultRecord> {
        self.fault
    }

    /// Program counter.
    #[must_use]
    pub const fn pc(&self) -> u32 {
        self.arch.pc()
    }

    /// EE cycle counter.
    #[must_use]
    pub const fn cycle_count(&self) -> u64 {
        self.arch.cycles()
    }

    /// Register file.
    #[must_use]
    pub const fn arch(&self) -> &ArchitecturalState {
        &self.arch
    }

    /// Memory bus.
    #[must_use]
    pub const fn bus(&self) -> &MemoryBus {
        &self.bus
    }

    /// Loaded firmware.
    #[must_use]
    pub const fn firmware(&self) -> &FirmwareStore {
        &self.firmware
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Diagnostics counters.
    #[must_use]
    pub const fn counters(&self) -> &DiagCounters {
        &self.counters
    }

    /// Diagnostics message log.
    #[must_use]
    pub const fn log(&self) -> &DiagLog {
        &self.log
    }

    /// Mutable diagnostics message log, for hosts that annotate it.
    pub fn log_mut(&mut self) -> &mut DiagLog {
        &mut self.log
    }

    /// Handle that interrupts a running tick from another thread.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    const fn ensure_steppable(&self) -> Result<(), CoreError> {
        match self.run_state {
            RunState::Ready | RunState::Running => Ok(()),
            RunState::Uninitialized => Err(CoreError::NotInitialized),
            RunState::AwaitingRom => Err(CoreError::AwaitingRom),
            RunState::Halted => Err(CoreError::Halted),
            RunState::Faulted(code) => Err(CoreError::Faulted(code)),
        }
    }

    fn absorb(&mut self, outcome: StepOutcome) {
        match outcome {
            StepOutcome::Retired { .. } => self.counters.record_retired(),
            StepOutcome::Fault { cause, address } => self.latch_fault(cause, address),
        }
        self.counters.open_bus_read_count = self.bus.open_bus_reads();
    }

    fn latch_fault(&mut self, code: FaultCode, address: Option<u32>) {
        let record = FaultRecord {
            code,
            pc: self.arch.pc(),
            cycle: self.arch.cycles(),
            address,
            in_delay_slot: self.arch.in_delay_slot(),
        };
        tracing::warn!(
            fault = code.tag(),
            pc = format_args!("{:#010x}", record.pc),
            address = ?address,
            "machine fault latched"
        );
        self.log
            .push(format!("fault {} at 0x{:08x}", code.tag(), record.pc));
        self.counters.record_fault(code);
        self.fault = Some(record);
        self.transition(RunState::Faulted(code));
    }

    fn transition(&mut self, next: RunState) {
        if self.run_state != next {
            tracing::debug!(from = self.run_state.label(), to = next.label(), "run state");
            self.run_state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOP: [u8; 4] = [0; 4];

    fn ready_core(program: &[u32]) -> Ps2Core {
        let bytes: Vec<u8> = program.iter().flat_map(|w| w.to_le_bytes()).collect();
        let mut core = Ps2Core::new();
        core.load_part(FirmwareKind::Rom, &bytes).expect("rom");
        core.init_core();
        core
    }

    #[test]
    fn init_without_rom_awaits_rom() {
        let mut core = Ps2Core::new();
        assert_eq!(core.init_core(), RunState::AwaitingRom);
        assert_eq!(core.step(), Err(CoreError::AwaitingRom));
        assert!(!core.is_debug_ready());

        core.load_part(FirmwareKind::Rom, &NOP).expect("rom");
        assert_eq!(core.run_state(), RunState::Ready);
        assert!(core.is_debug_ready());
    }

    #[test]
    fn step_before_init_is_a_precondition_error() {
        let mut core = Ps2Core::new();
        core.load_part(FirmwareKind::Rom, &NOP).expect("rom");
        assert_eq!(core.step(), Err(CoreError::NotInitialized));
        assert_eq!(core.pc(), 0xBFC0_0000);
        assert_eq!(core.cycle_count(), 0);
    }

    #[test]
    fn rejected_load_leaves_prior_part_mapped() {
        let mut core = ready_core(&[0x2408_0001]);
        assert_eq!(
            core.load_part(FirmwareKind::Rom, &[]).unwrap_err(),
            LoadError::Empty {
                kind: FirmwareKind::Rom
            }
        );
        assert_eq!(core.read_memory(0xBFC0_0000, AccessWidth::Word), Some(0x2408_0001));
    }

    #[test]
    fn fault_latches_until_reinit() {
        let mut core = ready_core(&[0x0000_000D]);
        assert_eq!(
            core.step(),
            Ok(StepOutcome::Fault {
                cause: FaultCode::Breakpoint,
                address: None,
            })
        );
        assert_eq!(core.run_state(), RunState::Faulted(FaultCode::Breakpoint));
        assert_eq!(core.step(), Err(CoreError::Faulted(FaultCode::Breakpoint)));
        assert_eq!(core.counters().fault_count_trap, 1);
        assert!(core.is_debug_ready());

        core.init_core();
        assert_eq!(core.run_state(), RunState::Ready);
        assert!(core.fault().is_none());
    }

    #[test]
    fn tick_honours_step_budget() {
        let mut core = Ps2Core::with_config(CoreConfig {
            tick_budget_steps: 3,
            ..CoreConfig::default()
        });
        core.load_part(FirmwareKind::Rom, &[0; 64]).expect("rom");
        core.init_core();

        let outcome = core.tick().expect("tick");
        assert_eq!(outcome.steps, 3);
        assert_eq!(outcome.cycles, 3);
        assert_eq!(outcome.pc, 0xBFC0_000C);
        assert_eq!(outcome.boundary, TickBoundary::StepBudget);
        assert_eq!(core.run_state(), RunState::Ready);
    }

    #[test]
    fn tick_honours_cycle_budget() {
        let mut core = Ps2Core::with_config(CoreConfig {
            tick_budget_cycles: Some(2),
            ..CoreConfig::default()
        });
        core.load_part(FirmwareKind::Rom, &[0; 64]).expect("rom");
        core.init_core();

        let outcome = core.tick().expect("tick");
        assert_eq!(outcome.steps, 2);
        assert_eq!(outcome.boundary, TickBoundary::CycleBudget);
    }

    #[test]
    fn tick_stops_at_fault_past_end_of_rom() {
        let mut core = ready_core(&[0, 0]);
        let outcome = core.tick().expect("tick");
        assert_eq!(outcome.steps, 2);
        assert_eq!(outcome.boundary, TickBoundary::Fault(FaultCode::UnmappedFetch));
        assert_eq!(outcome.pc, 0xBFC0_0008);
    }

    #[test]
    fn pending_stop_ends_the_next_tick_immediately() {
        let mut core = ready_core(&[0; 4]);
        core.stop_handle().request();
        let outcome = core.tick().expect("tick");
        assert_eq!(outcome.steps, 0);
        assert_eq!(outcome.boundary, TickBoundary::StopRequested);
        assert_eq!(core.cycle_count(), 0);
    }

    #[test]
    fn host_write_into_rom_faults_and_keeps_contents() {
        let mut core = ready_core(&[0x1234_5678]);
        assert_eq!(
            core.write_memory(0xBFC0_0000, AccessWidth::Word, 0),
            Err(FaultCode::ReadOnlyWrite)
        );
        assert_eq!(core.run_state(), RunState::Faulted(FaultCode::ReadOnlyWrite));
        assert_eq!(core.read_memory(0xBFC0_0000, AccessWidth::Word), Some(0x1234_5678));
        assert_eq!(core.counters().rejected_write_count, 1);
    }

    #[test]
    fn halt_is_terminal_until_init() {
        let mut core = ready_core(&[0]);
        core.halt();
        assert_eq!(core.tick(), Err(CoreError::Halted));
        core.init_core();
        assert!(core.step().is_ok());
    }

    #[test]
    fn clearing_firmware_waits_for_new_rom() {
        let mut core = ready_core(&[0]);
        core.clear_firmware();
        assert_eq!(core.run_state(), RunState::AwaitingRom);
        assert_eq!(core.read_memory(0xBFC0_0000, AccessWidth::Word), None);
    }

    #[test]
    fn snapshot_reflects_machine_state() {
        let mut core = ready_core(&[0x2408_0005, 0]);
        core.step().expect("step");
        let snapshot = core.debug_snapshot();
        assert!(snapshot.ready);
        assert_eq!(snapshot.pc, 0xBFC0_0004);
        assert_eq!(snapshot.gpr(crate::state::Gpr::T0), 5);
        assert_eq!(snapshot.disassembly.as_deref(), Some("nop"));
        assert_eq!(snapshot.counters.instruction_count, 1);
        assert!(core.debug_state().contains("status: READY"));
    }
}
