//! Performance harness for ps2-core benchmarking.
//!
//! Measures instruction throughput of `tick()` over a few tight ROM loops.
//!
//! ## Usage
//!
//! ```sh
//! cargo run --release -p ps2-core --example performance_harness
//! ```
//!
//! ## Metrics
//!
//! - Instructions per second
//! - Fraction of real EE speed (294.912 MHz at one cycle per instruction)
//! - Frames per second with one tick budget sized to a 60 Hz frame
//!
//! Each workload runs on its own core per thread to reflect hosts that drive
//! several independent machines.

#![allow(clippy::pedantic)]

use ps2_core::timing::CYCLES_PER_FRAME;
use ps2_core::{CoreConfig, FirmwareKind, Ps2Core, TickBoundary, EE_CLOCK_HZ};
use proptest as _;
use rstest as _;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;
use tracing as _;

use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

const TICK_BUDGET_STEPS: u32 = 100_000;
const NUM_THREADS: usize = 4;

const NOP_LOOP: &[u32] = &[
    0x0000_0000, // nop
    0x0000_0000, // nop
    0x1000_FFFD, // b 0
    0x0000_0000, // nop
];

const ALU_LOOP: &[u32] = &[
    0x2508_0001, // addiu t0, t0, 1
    0x0109_5021, // addu t2, t0, t1
    0x014B_6025, // or t4, t2, t3
    0x000C_6880, // sll t5, t4, 2
    0x1000_FFFB, // b 0
    0x01A8_7026, // xor t6, t5, t0
];

const MEMORY_LOOP: &[u32] = &[
    0x3C08_7000, // lui t0, 0x7000
    0x2529_0001, // loop: addiu t1, t1, 1
    0xAD09_0000, // sw t1, 0(t0)
    0x8D0A_0000, // lw t2, 0(t0)
    0xFD0A_0008, // sd t2, 8(t0)
    0x1000_FFFB, // b loop
    0xDD0B_0008, // ld t3, 8(t0)
];

const MIXED_LOOP: &[u32] = &[
    0x3C08_7000, // lui t0, 0x7000
    0x2529_0003, // loop: addiu t1, t1, 3
    0x0129_0018, // mult t1, t1
    0x0000_5012, // mflo t2
    0xAD0A_0010, // sw t2, 16(t0)
    0x1000_FFFB, // b loop
    0x8D0B_0010, // lw t3, 16(t0)
];

#[derive(Debug, Clone, Copy)]
struct BenchmarkResult {
    name: &'static str,
    instructions_per_second: f64,
    realtime_fraction: f64,
    frames_per_second: f64,
}

fn boot(program: &[u32]) -> Ps2Core {
    let rom: Vec<u8> = program.iter().flat_map(|w| w.to_le_bytes()).collect();
    let mut core = Ps2Core::with_config(CoreConfig {
        tick_budget_steps: TICK_BUDGET_STEPS,
        ..CoreConfig::default()
    });
    core.load_part(FirmwareKind::Rom, &rom)
        .expect("benchmark ROM should load");
    core.init_core();
    core
}

fn benchmark(name: &'static str, program: &'static [u32], duration: Duration) -> BenchmarkResult {
    let (tx, rx) = mpsc::channel();

    let handles: Vec<_> = (0..NUM_THREADS)
        .map(|_| {
            let tx = tx.clone();
            thread::spawn(move || {
                let mut core = boot(program);
                let mut total_instructions = 0u64;
                let start = Instant::now();

                while start.elapsed() < duration {
                    let outcome = core.tick().expect("benchmark core should stay ready");
                    assert_eq!(outcome.boundary, TickBoundary::StepBudget);
                    total_instructions += u64::from(outcome.steps);
                }

                tx.send(total_instructions).ok();
            })
        })
        .collect();

    for h in handles {
        h.join().ok();
    }
    drop(tx);

    let total_instructions: u64 = rx.iter().sum();
    let per_thread = total_instructions as f64 / NUM_THREADS as f64;
    let instructions_per_second = total_instructions as f64 / duration.as_secs_f64();
    let per_thread_ips = per_thread / duration.as_secs_f64();

    BenchmarkResult {
        name,
        instructions_per_second,
        realtime_fraction: per_thread_ips / EE_CLOCK_HZ as f64,
        frames_per_second: per_thread_ips / CYCLES_PER_FRAME as f64,
    }
}

fn format_number(n: f64) -> String {
    if n >= 1_000_000.0 {
        format!("{:.2}M", n / 1_000_000.0)
    } else if n >= 1_000.0 {
        format!("{:.2}K", n / 1_000.0)
    } else {
        format!("{:.2}", n)
    }
}

fn print_results(results: &[BenchmarkResult]) {
    println!("\nps2-core performance harness");
    println!(
        "threads: {NUM_THREADS}  tick budget: {TICK_BUDGET_STEPS} steps  frame: {CYCLES_PER_FRAME} cycles\n"
    );
    println!(
        "{:12} | {:>12} | {:>10} | {:>10}",
        "benchmark", "instr/sec", "realtime", "frames/s"
    );
    for result in results {
        println!(
            "{:12} | {:>12} | {:>9.2}% | {:>10}",
            result.name,
            format_number(result.instructions_per_second),
            result.realtime_fraction * 100.0,
            format_number(result.frames_per_second)
        );
    }
}

fn main() {
    let warmup = Duration::from_millis(500);
    let benchmark_duration = Duration::from_secs(3);

    println!("Running warmup for {:?}...", warmup);
    let _ = benchmark("nop_loop", NOP_LOOP, warmup);

    println!("Running benchmarks for {:?} each...", benchmark_duration);
    let results = [
        benchmark("nop_loop", NOP_LOOP, benchmark_duration),
        benchmark("alu_loop", ALU_LOOP, benchmark_duration),
        benchmark("memory_loop", MEMORY_LOOP, benchmark_duration),
        benchmark("mixed_loop", MIXED_LOOP, benchmark_duration),
    ];
    print_results(&results);
}
