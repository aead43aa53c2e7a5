//! Narrow host-facing control surface over a single shared core.
//!
//! Every operation takes the one coarse lock around the [`Ps2Core`], so a
//! firmware reload racing a tick on another thread observes either the
//! whole reload or none of it. Failures collapse to booleans; the reason is
//! recorded in the diagnostics log and surfaced by the debug rendering.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::api::{CoreConfig, StepOutcome, StopHandle};
use crate::debug::DebugSnapshot;
use crate::fault::FaultRecord;
use crate::firmware::FirmwareKind;
use crate::machine::Ps2Core;
use crate::memory::AccessWidth;

/// Counters returned by [`HostBridge::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct TickReport {
    /// Cycle counter after the tick.
    pub cycles: u64,
    /// Program counter after the tick.
    pub pc: u32,
}

/// Owns exactly one core and serialises every host call against it.
#[derive(Debug)]
pub struct HostBridge {
    core: Mutex<Ps2Core>,
    stop: StopHandle,
    ticks: AtomicU64,
}

impl Default for HostBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl HostBridge {
    /// Creates a bridge around an uninitialised core.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(CoreConfig::default())
    }

    /// Creates a bridge around an uninitialised core with `config`.
    #[must_use]
    pub fn with_config(config: CoreConfig) -> Self {
        let core = Ps2Core::with_config(config);
        let stop = core.stop_handle();
        Self {
            core: Mutex::new(core),
            stop,
            ticks: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Ps2Core> {
        match self.core.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// `initCore`: resets the machine, keeping firmware. Always succeeds.
    pub fn init_core(&self) -> bool {
        self.lock().init_core();
        true
    }

    /// `loadBiosPart`: installs `bytes` for the part named by `kind`.
    ///
    /// Labels are matched case-insensitively; unknown labels are rejected
    /// before anything reaches the firmware store.
    pub fn load_bios_part(&self, kind: &str, bytes: &[u8]) -> bool {
        let mut core = self.lock();
        let kind = match kind.parse::<FirmwareKind>() {
            Ok(kind) => kind,
            Err(err) => {
                tracing::warn!(error = %err, "firmware kind rejected");
                core.log_mut().push(format!("load rejected: {err}"));
                return false;
            }
        };
        core.load_part(kind, bytes).is_ok()
    }

    /// `step`: executes one instruction; `true` when it retired.
    pub fn step(&self) -> bool {
        match self.lock().step() {
            Ok(StepOutcome::Retired { .. }) => true,
            Ok(StepOutcome::Fault { .. }) => false,
            Err(err) => {
                tracing::debug!(error = %err, "step refused");
                false
            }
        }
    }

    /// `tick`: runs one batch and reports the resulting counters.
    ///
    /// A refused tick leaves the machine untouched and reports its current
    /// counters.
    pub fn tick(&self) -> TickReport {
        let mut core = self.lock();
        if let Err(err) = core.tick() {
            tracing::debug!(error = %err, "tick refused");
        }
        self.ticks.fetch_add(1, Ordering::Relaxed);
        TickReport {
            cycles: core.cycle_count(),
            pc: core.pc(),
        }
    }

    /// `getDebugState`: text rendering, safe in every state.
    #[must_use]
    pub fn get_debug_state(&self) -> String {
        self.lock().debug_state()
    }

    /// Structured snapshot, safe in every state.
    #[must_use]
    pub fn debug_snapshot(&self) -> DebugSnapshot {
        self.lock().debug_snapshot()
    }

    /// `isDebugReady`: ROM loaded and the core initialised.
    #[must_use]
    pub fn is_debug_ready(&self) -> bool {
        self.lock().is_debug_ready()
    }

    /// Program counter.
    #[must_use]
    pub fn pc(&self) -> u32 {
        self.lock().pc()
    }

    /// EE cycle counter.
    #[must_use]
    pub fn cycle_count(&self) -> u64 {
        self.lock().cycle_count()
    }

    /// Number of `tick` calls served, including refused ones.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Latched fault record, if any.
    #[must_use]
    pub fn fault(&self) -> Option<FaultRecord> {
        self.lock().fault()
    }

    /// Side-effect-free read; `None` when unmapped or misaligned.
    #[must_use]
    pub fn read_memory(&self, addr: u32, width: AccessWidth) -> Option<u64> {
        self.lock().read_memory(addr, width)
    }

    /// Host poke; a rejected write latches a fault and returns `false`.
    pub fn write_memory(&self, addr: u32, width: AccessWidth, value: u64) -> bool {
        self.lock().write_memory(addr, width, value).is_ok()
    }

    /// Halts the core until the next `init_core`.
    pub fn halt(&self) {
        self.lock().halt();
    }

    /// Lock-free handle that interrupts a running tick.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Runs `f` with exclusive access to the core.
    pub fn with_core<R>(&self, f: impl FnOnce(&mut Ps2Core) -> R) -> R {
        f(&mut *self.lock())
    }
}
