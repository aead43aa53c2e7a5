#![no_main]

use libfuzzer_sys::fuzz_target;
use ps2_core::{
    disassemble, AccessWidth, CoreConfig, Decoder, FirmwareKind, HostBridge, MemoryBus,
};

fuzz_target!(|data: &[u8]| {
    if data.len() < 8 {
        return;
    }

    let word = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    let addr = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    let _ = Decoder::decode(word);
    let _ = disassemble(word, addr);

    let bus = MemoryBus::new();
    for width in AccessWidth::ALL {
        let _ = bus.peek(addr, width);
    }

    let bridge = HostBridge::with_config(CoreConfig {
        tick_budget_steps: 4_096,
        ..CoreConfig::default()
    });
    let kind = FirmwareKind::ALL[usize::from(data[0]) % FirmwareKind::ALL.len()];
    bridge.load_bios_part(kind.label(), &data[8..]);
    bridge.load_bios_part("ROM", data);
    bridge.init_core();
    bridge.tick();
    let _ = bridge.get_debug_state();
    let _ = bridge.read_memory(addr, AccessWidth::Word);
    let _ = bridge.write_memory(addr, AccessWidth::Word, u64::from(word));
    bridge.step();
});
