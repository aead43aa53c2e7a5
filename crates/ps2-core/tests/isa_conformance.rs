//! ISA conformance: small hand-assembled programs run from the boot ROM.

#![allow(clippy::pedantic, clippy::nursery)]

use ps2_core::{
    AccessWidth, CoreConfig, FaultCode, FirmwareKind, Gpr, Ps2Core, RunState, TickBoundary,
    TickOutcome,
};
use proptest as _;
use rstest::rstest;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;
use tracing as _;

const RESET: u32 = 0xBFC0_0000;
const BREAK: u32 = 0x0000_000D;
const NOP: u32 = 0;

fn boot(program: &[u32]) -> Ps2Core {
    let bytes: Vec<u8> = program.iter().flat_map(|w| w.to_le_bytes()).collect();
    let mut core = Ps2Core::with_config(CoreConfig {
        tick_budget_steps: 10_000,
        ..CoreConfig::default()
    });
    core.load_part(FirmwareKind::Rom, &bytes).expect("rom accepted");
    core.init_core();
    core
}

fn run_to_break(core: &mut Ps2Core) -> TickOutcome {
    let outcome = core.tick().expect("core ready");
    assert_eq!(
        outcome.boundary,
        TickBoundary::Fault(FaultCode::Breakpoint),
        "{}",
        core.debug_state()
    );
    outcome
}

#[test]
fn counted_loop_runs_to_completion() {
    let mut core = boot(&[
        0x2409_000A, // addiu t1, zero, 10
        0x2508_0001, // loop: addiu t0, t0, 1
        0x1509_FFFE, // bne t0, t1, loop
        NOP,
        BREAK,
    ]);
    let outcome = run_to_break(&mut core);

    assert_eq!(core.arch().gpr(Gpr::T0), 10);
    assert_eq!(outcome.steps, 31);
    assert_eq!(outcome.cycles, 31);
    assert_eq!(outcome.pc, RESET + 16);
}

#[test]
fn register_jump_delay_slot_executes_before_transfer() {
    let mut core = boot(&[
        0x3C08_BFC0, // lui t0, 0xbfc0
        0x3508_0014, // ori t0, t0, 0x14
        0x0100_0008, // jr t0
        0x2402_0007, // addiu v0, zero, 7 (delay slot)
        0x2402_0009, // addiu v0, zero, 9 (skipped)
        BREAK,
    ]);
    run_to_break(&mut core);
    assert_eq!(core.arch().gpr(Gpr::V0), 7);
    assert_eq!(core.pc(), RESET + 0x14);
}

#[rstest]
#[case::taken(0x5000_0002, 1)] // beql zero, zero, +2
#[case::not_taken(0x5400_0002, 2)] // bnel zero, zero, +2
fn branch_likely_delay_slot(#[case] branch: u32, #[case] want_v0: u64) {
    let mut core = boot(&[
        branch,
        0x2442_0001, // addiu v0, v0, 1 (delay slot)
        0x2442_0002, // addiu v0, v0, 2
        BREAK,
    ]);
    run_to_break(&mut core);
    assert_eq!(core.arch().gpr(Gpr::V0), want_v0);
}

#[test]
fn scratchpad_doubleword_round_trip_through_cpu() {
    let mut core = boot(&[
        0x3C08_7000, // lui t0, 0x7000
        0x2409_FFFF, // addiu t1, zero, -1
        0xFD09_0008, // sd t1, 8(t0)
        0xDD0A_0008, // ld t2, 8(t0)
        0x910B_000F, // lbu t3, 15(t0)
        BREAK,
    ]);
    run_to_break(&mut core);
    assert_eq!(core.arch().gpr(Gpr::T2), u64::MAX);
    assert_eq!(core.arch().gpr(Gpr::T3), 0xFF);
    assert_eq!(
        core.read_memory(0x7000_0008, AccessWidth::Doubleword),
        Some(u64::MAX)
    );
}

#[test]
fn timer_counts_bus_cycles_once_enabled() {
    let mut program = vec![
        0x3C08_1000, // lui t0, 0x1000
        0x2409_0080, // addiu t1, zero, CUE
        0xAD09_0010, // sw t1, T0_MODE(t0)
    ];
    program.extend([NOP; 8]);
    program.extend([
        0x8D0A_0000, // lw t2, T0_COUNT(t0)
        0x3C0C_1001, // lui t4, 0x1001
        0x8D8B_F230, // lw t3, SIF_SMFLG(t4)
        BREAK,
    ]);
    let mut core = boot(&program);
    run_to_break(&mut core);

    // Eight EE cycles after the enable are four bus cycles.
    assert_eq!(core.arch().gpr(Gpr::T2), 4);
    assert_eq!(core.arch().gpr(Gpr::T3), 0x0001_0000);
}

#[test]
fn trapping_add_overflow_faults_precisely() {
    let mut core = boot(&[
        0x3C08_7FFF, // lui t0, 0x7fff
        0x3508_FFFF, // ori t0, t0, 0xffff
        0x2109_0001, // addi t1, t0, 1
        BREAK,
    ]);
    let outcome = core.tick().expect("core ready");

    assert_eq!(
        outcome.boundary,
        TickBoundary::Fault(FaultCode::IntegerOverflow)
    );
    assert_eq!(outcome.pc, RESET + 8);
    assert_eq!(core.arch().gpr(Gpr::T1), 0);
    assert_eq!(core.run_state(), RunState::Faulted(FaultCode::IntegerOverflow));
    let fault = core.fault().expect("fault recorded");
    assert_eq!(fault.pc, RESET + 8);
    assert_eq!(fault.cycle, 2);
}

#[test]
fn store_in_delay_slot_records_delay_slot_fault() {
    let mut core = boot(&[
        0x3C08_BFC0, // lui t0, 0xbfc0
        0x1000_0002, // beq zero, zero, +2
        0xAD08_0000, // sw t0, 0(t0) (delay slot, ROM target)
        NOP,
        BREAK,
    ]);
    let outcome = core.tick().expect("core ready");

    assert_eq!(outcome.boundary, TickBoundary::Fault(FaultCode::ReadOnlyWrite));
    let fault = core.fault().expect("fault recorded");
    assert!(fault.in_delay_slot);
    assert_eq!(fault.address, Some(RESET));
    assert_eq!(core.read_memory(RESET, AccessWidth::Word), Some(0x3C08_BFC0));
}

#[rstest]
#[case::illegal(0x7000_0000, FaultCode::IllegalInstruction)]
#[case::syscall(0x0000_000C, FaultCode::SystemCall)]
#[case::unaligned_load(0x8C09_0001, FaultCode::UnalignedLoad)] // lw t1, 1(zero)
#[case::unaligned_store(0xA409_0001, FaultCode::UnalignedStore)] // sh t1, 1(zero)
#[case::unmapped_store(0xAC09_FFF0, FaultCode::UnmappedWrite)] // sw t1, -16(zero)
fn first_instruction_faults(#[case] word: u32, #[case] fault: FaultCode) {
    let mut core = boot(&[word]);
    let outcome = core.tick().expect("core ready");
    assert_eq!(outcome.boundary, TickBoundary::Fault(fault));
    assert_eq!(outcome.steps, 0);
    assert_eq!(core.pc(), RESET);
    assert_eq!(core.cycle_count(), 0);
}

#[test]
fn unmapped_load_reads_open_bus_zero() {
    let mut core = boot(&[
        0x2409_0005, // addiu t1, zero, 5
        0x3C08_0400, // lui t0, 0x0400
        0x8D09_0000, // lw t1, 0(t0)
        BREAK,
    ]);
    run_to_break(&mut core);
    assert_eq!(core.arch().gpr(Gpr::T1), 0);
    assert_eq!(core.debug_snapshot().counters.open_bus_read_count, 1);
}
