//! Deterministic run fingerprint used for cross-host comparison.
//!
//! Boots a small ROM that exercises ALU, multiply, scratchpad, and timer
//! paths, runs it to its breakpoint, and prints a hash of the final
//! architectural state and debug rendering.

use ps2_core::{CoreConfig, FirmwareKind, Gpr, Ps2Core, TickBoundary};
use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;
use tracing as _;

const PROGRAM: [u32; 16] = [
    0x3C08_1000, // lui t0, 0x1000
    0x2409_0080, // addiu t1, zero, 0x80
    0xAD09_0010, // sw t1, 0x10(t0)       timer 0 enable
    0x3C0A_7000, // lui t2, 0x7000
    0x240B_0040, // addiu t3, zero, 64
    0x240C_0001, // addiu t4, zero, 1
    0x018C_0018, // loop: mult t4, t4
    0x0000_6012, // mflo t4
    0x258C_0003, // addiu t4, t4, 3
    0xFD4C_0000, // sd t4, 0(t2)
    0x256B_FFFF, // addiu t3, t3, -1
    0x1560_FFFA, // bnez t3, loop
    0x254A_0008, // addiu t2, t2, 8       (delay slot)
    0x8D0D_0000, // lw t5, 0(t0)          timer 0 count
    0x0000_0000, // nop
    0x0000_000D, // break
];

fn hash_bytes(hash: &mut u64, bytes: &[u8]) {
    for byte in bytes {
        *hash ^= u64::from(*byte);
        *hash = hash.wrapping_mul(0x1000_0000_01B3);
    }
}

fn fingerprint() -> String {
    let rom: Vec<u8> = PROGRAM.iter().flat_map(|w| w.to_le_bytes()).collect();
    let mut core = Ps2Core::with_config(CoreConfig {
        tick_budget_steps: 10_000,
        ..CoreConfig::default()
    });
    core.load_part(FirmwareKind::Rom, &rom)
        .expect("fingerprint ROM should load");
    core.init_core();
    let outcome = core.tick().expect("core should be ready");

    let mut hash = 0xcbf2_9ce4_8422_2325_u64;
    hash_bytes(&mut hash, &outcome.steps.to_le_bytes());
    hash_bytes(&mut hash, &outcome.cycles.to_le_bytes());
    hash_bytes(&mut hash, &outcome.pc.to_le_bytes());
    match outcome.boundary {
        TickBoundary::Fault(code) => hash_bytes(&mut hash, code.tag().as_bytes()),
        other => hash_bytes(&mut hash, format!("{other:?}").as_bytes()),
    }
    for reg in Gpr::ALL {
        hash_bytes(&mut hash, &core.arch().gpr(reg).to_le_bytes());
    }
    hash_bytes(&mut hash, &core.arch().hi().to_le_bytes());
    hash_bytes(&mut hash, &core.arch().lo().to_le_bytes());
    hash_bytes(&mut hash, core.debug_state().as_bytes());

    format!("{hash:016x}")
}

fn main() {
    println!("{}", fingerprint());
}
