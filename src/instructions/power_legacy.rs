//! A representative slice of POWER-architecture legacy instructions the
//! MPC601 retains for backward compatibility (spec §3 "601 compatibility
//! mode", §4.4 "POWER-legacy"). Only installed when `CpuModel::is_601` or
//! `include_601` is set (`instructions::populate`).
//!
//! Grounded on the 601-specific opcode table entries noted in
//! `original_source/cpu/ppc/ppcemu.h` (`SUPPORTS_601`) and the PowerPC/POWER
//! compatibility appendix these mnemonics come from (`dozi`, `maskg`,
//! `rlmi`, `abs`, `doz`). Breadth here favors the handful of mnemonics the
//! PEM documents as distinct from their PowerPC equivalents, not full
//! coverage of every retired POWER opcode.

use crate::decode::*;
use crate::emulator::Emulator;
use crate::exception::StepResult;
use crate::opcode_table::{op, op31_dot, OpcodeHandler, TABLE_SIZE};

pub fn populate(table: &mut [OpcodeHandler; TABLE_SIZE]) {
    op(table, 9, dozi);
    op31_dot(table, 264, doz::<false>, doz::<true>);
    op31_dot(table, 360, abs_::<false>, abs_::<true>);
    op31_dot(table, 488, nabs::<false>, nabs::<true>);
    op31_dot(table, 29, maskg::<false>, maskg::<true>);
    op31_dot(table, 22, rlmi::<false>, rlmi::<true>);
}

fn maybe_rc<const RC: bool>(emulator: &mut Emulator, rd: usize) {
    if RC {
        let v = emulator.state.gpr[rd] as i32;
        let field = if v < 0 {
            0b100
        } else if v > 0 {
            0b010
        } else {
            0b001
        };
        emulator.state.set_cr_field(0, field);
    }
}

/// `dozi`: difference-or-zero, immediate. `rt <- (ra > simm) ? 0 : simm - ra`.
fn dozi(emulator: &mut Emulator, opcode: u32) -> StepResult {
    let a = emulator.state.gpr[ra(opcode)] as i32;
    let imm = simm(opcode);
    emulator.state.gpr[rt(opcode)] = if a > imm { 0 } else { (imm - a) as u32 };
    StepResult::Continue
}

/// `doz`: difference-or-zero, register form.
fn doz<const RC: bool>(emulator: &mut Emulator, opcode: u32) -> StepResult {
    let a = emulator.state.gpr[ra(opcode)] as i32;
    let b = emulator.state.gpr[rb(opcode)] as i32;
    emulator.state.gpr[rt(opcode)] = if a > b { 0 } else { (b - a) as u32 };
    maybe_rc::<RC>(emulator, rt(opcode));
    StepResult::Continue
}

/// `abs`: absolute value, with the `i32::MIN` edge case left unchanged
/// (matches POWER's documented behavior: no overflow is signaled).
fn abs_<const RC: bool>(emulator: &mut Emulator, opcode: u32) -> StepResult {
    let a = emulator.state.gpr[ra(opcode)] as i32;
    emulator.state.gpr[rt(opcode)] = a.wrapping_abs() as u32;
    maybe_rc::<RC>(emulator, rt(opcode));
    StepResult::Continue
}

fn nabs<const RC: bool>(emulator: &mut Emulator, opcode: u32) -> StepResult {
    let a = emulator.state.gpr[ra(opcode)] as i32;
    emulator.state.gpr[rt(opcode)] = (-a.wrapping_abs()) as u32;
    maybe_rc::<RC>(emulator, rt(opcode));
    StepResult::Continue
}

/// `maskg`: mask-generate, a run of 1 bits from bit `ra` to bit `rb`
/// inclusive (same wraparound rule as `rotate_mask`, reused directly).
fn maskg<const RC: bool>(emulator: &mut Emulator, opcode: u32) -> StepResult {
    let mb = emulator.state.gpr[rs(opcode)] & 0x1F;
    let me = emulator.state.gpr[rb(opcode)] & 0x1F;
    emulator.state.gpr[ra(opcode)] = rotate_mask(mb, me);
    maybe_rc::<RC>(emulator, ra(opcode));
    StepResult::Continue
}

/// `rlmi`: rotate-left-then-mask-insert, the register-shift sibling of
/// `rlwimi` using `mb`/`me` from the instruction word and the shift amount
/// from `rb` rather than an immediate.
fn rlmi<const RC: bool>(emulator: &mut Emulator, opcode: u32) -> StepResult {
    let mask = rotate_mask(mb(opcode), me(opcode));
    let shift = emulator.state.gpr[rb(opcode)] & 0x1F;
    let rotated = rotl32(emulator.state.gpr[rs(opcode)], shift);
    let old = emulator.state.gpr[ra(opcode)];
    emulator.state.gpr[ra(opcode)] = (rotated & mask) | (old & !mask);
    maybe_rc::<RC>(emulator, ra(opcode));
    StepResult::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::Bus;
    use crate::emulator::Configuration;
    use crate::processor::CpuModel;

    #[test]
    fn doz_clamps_to_zero_when_a_greater() {
        let model = CpuModel { pvr: 0x0001_0001, is_601: true, include_601: true };
        let mut e = Emulator::new(Configuration { model, tb_freq_hz: 25_000_000, bus: Bus::new() });
        e.state.gpr[4] = 10;
        e.state.gpr[5] = 3;
        let opcode = (31u32 << 26) | (3 << 21) | (4 << 16) | (5 << 11) | (264 << 1);
        doz::<false>(&mut e, opcode);
        assert_eq!(e.state.gpr[3], 0);
    }
}
