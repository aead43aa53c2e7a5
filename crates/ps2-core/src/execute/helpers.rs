//! Helper functions for instruction execution.

#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    missing_docs
)]

use crate::decoder::DecodedInstruction;
use crate::state::ArchitecturalState;

/// Sign-extends the low 32 bits of `value` to 64 bits.
#[must_use]
pub const fn sext32(value: u64) -> u64 {
    value as u32 as i32 as i64 as u64
}

/// Sign-extends the low 16 bits of `value` to 64 bits.
#[must_use]
pub const fn sext16(value: u64) -> u64 {
    value as u16 as i16 as i64 as u64
}

/// Sign-extends the low 8 bits of `value` to 64 bits.
#[must_use]
pub const fn sext8(value: u64) -> u64 {
    value as u8 as i8 as i64 as u64
}

/// Effective address of a load/store: `rs + sext(imm)`, truncated to 32 bits.
#[must_use]
pub const fn effective_address(instr: &DecodedInstruction, arch: &ArchitecturalState) -> u32 {
    arch.gpr(instr.rs).wrapping_add(instr.simm()) as u32
}

/// `(lo, hi)` of a 32-bit multiply, each sign-extended.
#[must_use]
pub const fn split_product(product: u64) -> (u64, u64) {
    (sext32(product), sext32(product >> 32))
}

/// `(lo, hi)` of `DIV`, including the divide-by-zero and overflow results the
/// hardware produces instead of trapping.
#[must_use]
pub const fn signed_divide(rs: u64, rt: u64) -> (u64, u64) {
    let n = rs as i32;
    let d = rt as i32;
    if d == 0 {
        let lo: i32 = if n >= 0 { -1 } else { 1 };
        (lo as i64 as u64, n as i64 as u64)
    } else if n == i32::MIN && d == -1 {
        (i32::MIN as i64 as u64, 0)
    } else {
        ((n / d) as i64 as u64, (n % d) as i64 as u64)
    }
}

/// `(lo, hi)` of `DIVU`; dividing by zero yields an all-ones quotient.
#[must_use]
pub const fn unsigned_divide(rs: u64, rt: u64) -> (u64, u64) {
    let n = rs as u32;
    let d = rt as u32;
    if d == 0 {
        (u64::MAX, sext32(n as u64))
    } else {
        (sext32((n / d) as u64), sext32((n % d) as u64))
    }
}

/// 32-bit signed add that reports overflow as `None`.
#[must_use]
pub const fn checked_add32(a: u64, b: u64) -> Option<u64> {
    match (a as i32).checked_add(b as i32) {
        Some(sum) => Some(sum as i64 as u64),
        None => None,
    }
}

/// 32-bit signed subtract that reports overflow as `None`.
#[must_use]
pub const fn checked_sub32(a: u64, b: u64) -> Option<u64> {
    match (a as i32).checked_sub(b as i32) {
        Some(diff) => Some(diff as i64 as u64),
        None => None,
    }
}

/// 64-bit signed add that reports overflow as `None`.
#[must_use]
pub const fn checked_add64(a: u64, b: u64) -> Option<u64> {
    match (a as i64).checked_add(b as i64) {
        Some(sum) => Some(sum as u64),
        None => None,
    }
}

/// 64-bit signed subtract that reports overflow as `None`.
#[must_use]
pub const fn checked_sub64(a: u64, b: u64) -> Option<u64> {
    match (a as i64).checked_sub(b as i64) {
        Some(diff) => Some(diff as u64),
        None => None,
    }
}
