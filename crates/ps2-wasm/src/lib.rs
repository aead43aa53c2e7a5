//! Browser bindings for a single Emotion Engine core.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

use ps2_core::{AccessWidth, CoreConfig, HostBridge, TickReport};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

macro_rules! console_log {
    ($($t:tt)*) => {
        #[cfg(target_arch = "wasm32")]
        web_sys::console::log_1(&format!($($t)*).into());
    };
}

/// JS-compatible tick report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WasmTickReport {
    pub cycles: u64,
    pub pc: u32,
    pub tick_count: u64,
}

/// Optional settings accepted by the constructor.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WasmCoreOptions {
    pub tick_budget_steps: Option<u32>,
    pub tick_budget_cycles: Option<u64>,
}

impl WasmCoreOptions {
    fn into_config(self) -> CoreConfig {
        let defaults = CoreConfig::default();
        CoreConfig {
            tick_budget_steps: self
                .tick_budget_steps
                .unwrap_or(defaults.tick_budget_steps),
            tick_budget_cycles: self.tick_budget_cycles.or(defaults.tick_budget_cycles),
            ..defaults
        }
    }
}

/// One emulation core exposed to a browser host.
#[wasm_bindgen]
pub struct WasmCore {
    bridge: HostBridge,
}

#[wasm_bindgen]
impl WasmCore {
    #[wasm_bindgen(constructor)]
    pub fn new(options: JsValue) -> Result<Self, JsValue> {
        console_error_panic_hook::set_once();
        let options: WasmCoreOptions = if options.is_undefined() || options.is_null() {
            WasmCoreOptions::default()
        } else {
            serde_wasm_bindgen::from_value(options)?
        };
        Ok(Self::with_options(options))
    }

    #[wasm_bindgen(js_name = initCore)]
    pub fn init_core(&self) -> bool {
        self.bridge.init_core()
    }

    /// Installs one firmware part; `kind` is one of ROM, ROM1, ROM2, EROM, NVM, MEC.
    #[wasm_bindgen(js_name = loadBiosPart)]
    pub fn load_bios_part(&self, kind: &str, bytes: &[u8]) -> bool {
        let accepted = self.bridge.load_bios_part(kind, bytes);
        if accepted {
            console_log!("loaded {} ({} bytes)", kind, bytes.len());
        } else {
            console_log!("rejected {} ({} bytes)", kind, bytes.len());
        }
        accepted
    }

    pub fn step(&self) -> bool {
        self.bridge.step()
    }

    /// Runs one tick and returns `{ cycles, pc, tickCount }`.
    pub fn tick(&self) -> Result<JsValue, JsValue> {
        let report = self.tick_report();
        Ok(serde_wasm_bindgen::to_value(&report)?)
    }

    #[wasm_bindgen(js_name = getDebugState)]
    pub fn get_debug_state(&self) -> String {
        self.bridge.get_debug_state()
    }

    /// Structured snapshot as a plain JS object.
    #[wasm_bindgen(js_name = getDebugSnapshot)]
    pub fn get_debug_snapshot(&self) -> Result<JsValue, JsValue> {
        Ok(serde_wasm_bindgen::to_value(&self.bridge.debug_snapshot())?)
    }

    #[wasm_bindgen(js_name = isDebugReady)]
    pub fn is_debug_ready(&self) -> bool {
        self.bridge.is_debug_ready()
    }

    #[wasm_bindgen(js_name = getPc)]
    pub fn get_pc(&self) -> u32 {
        self.bridge.pc()
    }

    #[wasm_bindgen(js_name = getCycleCount)]
    pub fn get_cycle_count(&self) -> u64 {
        self.bridge.cycle_count()
    }

    #[wasm_bindgen(js_name = getTickCount)]
    pub fn get_tick_count(&self) -> u64 {
        self.bridge.tick_count()
    }

    /// Copies `len` bytes starting at `addr`; unreadable bytes read as zero.
    #[wasm_bindgen(js_name = readMemory)]
    pub fn read_memory(&self, addr: u32, len: u32) -> js_sys::Uint8Array {
        js_sys::Uint8Array::from(self.memory_window(addr, len).as_slice())
    }

    pub fn halt(&self) {
        self.bridge.halt();
    }

    /// Interrupts a tick running in another worker sharing this core.
    #[wasm_bindgen(js_name = requestStop)]
    pub fn request_stop(&self) {
        self.bridge.stop_handle().request();
    }
}

impl WasmCore {
    fn with_options(options: WasmCoreOptions) -> Self {
        Self {
            bridge: HostBridge::with_config(options.into_config()),
        }
    }

    fn tick_report(&self) -> WasmTickReport {
        let TickReport { cycles, pc } = self.bridge.tick();
        WasmTickReport {
            cycles,
            pc,
            tick_count: self.bridge.tick_count(),
        }
    }

    fn memory_window(&self, addr: u32, len: u32) -> Vec<u8> {
        (0..len)
            .map(|offset| {
                self.bridge
                    .read_memory(addr.wrapping_add(offset), AccessWidth::Byte)
                    .and_then(|byte| u8::try_from(byte).ok())
                    .unwrap_or(0)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{WasmCore, WasmCoreOptions};

    fn ready_core() -> WasmCore {
        let core = WasmCore::with_options(WasmCoreOptions {
            tick_budget_steps: Some(6),
            ..WasmCoreOptions::default()
        });
        // b . ; nop
        let rom = [0xFF, 0xFF, 0x00, 0x10, 0, 0, 0, 0];
        assert!(core.load_bios_part("ROM", &rom));
        assert!(core.init_core());
        core
    }

    #[test]
    fn tick_report_counts_ticks_and_cycles() {
        let core = ready_core();
        let first = core.tick_report();
        let second = core.tick_report();
        assert_eq!(first.cycles, 6);
        assert_eq!(second.cycles, 12);
        assert_eq!(second.tick_count, 2);
        assert_eq!(core.get_pc(), 0xBFC0_0000);
    }

    #[test]
    fn memory_window_reads_rom_bytes_and_zero_fills() {
        let core = ready_core();
        let window = core.memory_window(0xBFC0_0000, 12);
        assert_eq!(&window[..4], &[0xFF, 0xFF, 0x00, 0x10]);
        assert_eq!(&window[8..], &[0; 4]);
    }

    #[test]
    fn options_deserialize_from_camel_case() {
        let options: WasmCoreOptions =
            serde_json::from_str(r#"{"tickBudgetSteps": 42}"#).expect("options");
        assert_eq!(options.into_config().tick_budget_steps, 42);
        assert!(options.into_config().tick_budget_cycles.is_none());
    }

    #[test]
    fn snapshot_serializes_for_js_hosts() {
        let core = ready_core();
        core.step();
        let json = serde_json::to_value(core.bridge.debug_snapshot()).expect("json");
        assert_eq!(json["pc"], 0xBFC0_0004_u32);
        assert_eq!(json["ready"], true);
    }
}
