//! Floating-point load/store and arithmetic (spec §4.4 "FPU"), plus the
//! `fpu_on`/`fpu_off` table split (spec §4.2).
//!
//! Grounded on the teacher's own split-table idea being absent (68k has no
//! FP-unavailable trap to model) and instead on spec.md's own description
//! of the FP-disabled sibling table; arithmetic semantics follow the PEM's
//! single-precision/double-precision FPR contract, simplified to IEEE `f64`
//! arithmetic via Rust's native float ops rather than a software softfloat
//! implementation (no pack example ships one).

use crate::decode::*;
use crate::emulator::Emulator;
use crate::exception::{ExceptionInfo, ExceptionKind, StepResult};
use crate::opcode_table::{op31_dot, opx, opx_dot, OpcodeHandler, TABLE_SIZE};
use crate::processor::FprValue;

/// Primary opcodes and extended opcodes this module installs into
/// `fpu_on`; recorded so [`replace_with_unavailable`] can zero exactly
/// these slots out in the `fpu_off` sibling rather than re-deriving them.
const FP_PRIMARY_OPCODES: &[u32] = &[48, 49, 50, 51, 52, 53, 54, 55];
const FP_EXT_OPCODES: &[u32] = &[72, 40, 264, 136, 21, 20, 25, 18];

pub fn populate(table: &mut [OpcodeHandler; TABLE_SIZE]) {
    use crate::opcode_table::op;

    op(table, 48, lfs);
    op(table, 49, lfsu);
    op(table, 50, lfd);
    op(table, 51, lfdu);
    op(table, 52, stfs);
    op(table, 53, stfsu);
    op(table, 54, stfd);
    op(table, 55, stfdu);

    opx_dot(table, 63, 72, fmr::<false>, fmr::<true>);
    opx_dot(table, 63, 40, fneg::<false>, fneg::<true>);
    opx_dot(table, 63, 264, fabs::<false>, fabs::<true>);
    opx_dot(table, 63, 136, fnabs::<false>, fnabs::<true>);
    op31_dot(table, 0, fcmpu, fcmpu); // Rc field is actually crfd/unused here

    // Arithmetic, A-form (opcode 63 for double, 59 for single precision).
    opx(table, 63, 21, fadd);
    opx(table, 63, 20, fsub);
    opx(table, 63, 25, fmul);
    opx(table, 63, 18, fdiv);
    opx(table, 59, 21, fadds);
    opx(table, 59, 20, fsubs);
    opx(table, 59, 25, fmuls);
    opx(table, 59, 18, fdivs);
}

/// Zeroes every slot this module populated, leaving `fp_unavailable` in
/// their place (spec §4.2's FP-disabled sibling table).
pub fn replace_with_unavailable(table: &mut [OpcodeHandler; TABLE_SIZE]) {
    use crate::opcode_table::op;
    for &primary in FP_PRIMARY_OPCODES {
        op(table, primary, super::system::fp_unavailable);
    }
    for &ext in FP_EXT_OPCODES {
        opx(table, 63, ext, super::system::fp_unavailable);
        opx(table, 59, ext, super::system::fp_unavailable);
    }
    opx(table, 31, 0, super::system::fp_unavailable);
}

fn check_fp_available(emulator: &Emulator) -> Result<(), StepResult> {
    if !emulator.state.fp_available() {
        return Err(StepResult::Exception(ExceptionInfo::new(ExceptionKind::FpUnavailable, 0)));
    }
    Ok(())
}

macro_rules! fp_guard {
    ($emulator:expr) => {
        if let Err(step) = check_fp_available($emulator) {
            return step;
        }
    };
}

fn ea_d(emulator: &Emulator, opcode: u32) -> u32 {
    let base = if ra(opcode) == 0 { 0 } else { emulator.state.gpr[ra(opcode)] };
    base.wrapping_add(d_field(opcode) as u32)
}

/// Loads a 32-bit IEEE single, widens to double as every PPC FPR stores
/// double-precision internally (PEM 4-67).
fn lfs(emulator: &mut Emulator, opcode: u32) -> StepResult {
    fp_guard!(emulator);
    let addr = ea_d(emulator, opcode);
    match emulator.read_vmem(addr, 4) {
        Ok(v) => {
            let single = f32::from_bits(v as u32);
            emulator.state.fpr[rt(opcode)] = FprValue::from_f64(single as f64);
            StepResult::Continue
        }
        Err(info) => emulator.raise(info),
    }
}
fn lfsu(emulator: &mut Emulator, opcode: u32) -> StepResult {
    let r = lfs(emulator, opcode);
    if matches!(r, StepResult::Continue) {
        let addr = ea_d(emulator, opcode);
        emulator.state.gpr[ra(opcode)] = addr;
    }
    r
}
fn lfd(emulator: &mut Emulator, opcode: u32) -> StepResult {
    fp_guard!(emulator);
    let addr = ea_d(emulator, opcode);
    match emulator.read_vmem(addr, 8) {
        Ok(v) => {
            emulator.state.fpr[rt(opcode)] = FprValue::from_bits(v);
            StepResult::Continue
        }
        Err(info) => emulator.raise(info),
    }
}
fn lfdu(emulator: &mut Emulator, opcode: u32) -> StepResult {
    let r = lfd(emulator, opcode);
    if matches!(r, StepResult::Continue) {
        let addr = ea_d(emulator, opcode);
        emulator.state.gpr[ra(opcode)] = addr;
    }
    r
}
fn stfs(emulator: &mut Emulator, opcode: u32) -> StepResult {
    fp_guard!(emulator);
    let addr = ea_d(emulator, opcode);
    let single = emulator.state.fpr[rt(opcode)].as_f64() as f32;
    match emulator.write_vmem(addr, 4, single.to_bits() as u64) {
        Ok(()) => StepResult::Continue,
        Err(info) => emulator.raise(info),
    }
}
fn stfsu(emulator: &mut Emulator, opcode: u32) -> StepResult {
    let r = stfs(emulator, opcode);
    if matches!(r, StepResult::Continue) {
        let addr = ea_d(emulator, opcode);
        emulator.state.gpr[ra(opcode)] = addr;
    }
    r
}
fn stfd(emulator: &mut Emulator, opcode: u32) -> StepResult {
    fp_guard!(emulator);
    let addr = ea_d(emulator, opcode);
    let bits = emulator.state.fpr[rt(opcode)].bits();
    match emulator.write_vmem(addr, 8, bits) {
        Ok(()) => StepResult::Continue,
        Err(info) => emulator.raise(info),
    }
}
fn stfdu(emulator: &mut Emulator, opcode: u32) -> StepResult {
    let r = stfd(emulator, opcode);
    if matches!(r, StepResult::Continue) {
        let addr = ea_d(emulator, opcode);
        emulator.state.gpr[ra(opcode)] = addr;
    }
    r
}

fn maybe_rc1<const RC: bool>(emulator: &mut Emulator) {
    if RC {
        let cr1 = ((emulator.state.fpscr >> 28) & 0xF) as u32;
        emulator.state.set_cr_field(1, cr1);
    }
}

fn fmr<const RC: bool>(emulator: &mut Emulator, opcode: u32) -> StepResult {
    fp_guard!(emulator);
    emulator.state.fpr[rt(opcode)] = emulator.state.fpr[rb(opcode)];
    maybe_rc1::<RC>(emulator);
    StepResult::Continue
}
fn fneg<const RC: bool>(emulator: &mut Emulator, opcode: u32) -> StepResult {
    fp_guard!(emulator);
    let v = -emulator.state.fpr[rb(opcode)].as_f64();
    emulator.state.fpr[rt(opcode)] = FprValue::from_f64(v);
    maybe_rc1::<RC>(emulator);
    StepResult::Continue
}
fn fabs<const RC: bool>(emulator: &mut Emulator, opcode: u32) -> StepResult {
    fp_guard!(emulator);
    let v = emulator.state.fpr[rb(opcode)].as_f64().abs();
    emulator.state.fpr[rt(opcode)] = FprValue::from_f64(v);
    maybe_rc1::<RC>(emulator);
    StepResult::Continue
}
fn fnabs<const RC: bool>(emulator: &mut Emulator, opcode: u32) -> StepResult {
    fp_guard!(emulator);
    let v = -emulator.state.fpr[rb(opcode)].as_f64().abs();
    emulator.state.fpr[rt(opcode)] = FprValue::from_f64(v);
    maybe_rc1::<RC>(emulator);
    StepResult::Continue
}

fn fcmpu(emulator: &mut Emulator, opcode: u32) -> StepResult {
    fp_guard!(emulator);
    let a = emulator.state.fpr[ra(opcode)].as_f64();
    let b = emulator.state.fpr[rb(opcode)].as_f64();
    let bits = if a.is_nan() || b.is_nan() {
        0b0001
    } else if a < b {
        0b1000
    } else if a > b {
        0b0100
    } else {
        0b0010
    };
    emulator.state.set_cr_field(crfd(opcode), bits);
    emulator.state.fpscr = (emulator.state.fpscr & !0xF) | bits;
    StepResult::Continue
}

macro_rules! fp_arith {
    ($name:ident, $op:tt) => {
        fn $name(emulator: &mut Emulator, opcode: u32) -> StepResult {
            fp_guard!(emulator);
            let a = emulator.state.fpr[ra(opcode)].as_f64();
            let b = emulator.state.fpr[rb(opcode)].as_f64();
            emulator.state.fpr[rt(opcode)] = FprValue::from_f64(a $op b);
            if rc(opcode) {
                maybe_rc1::<true>(emulator);
            }
            StepResult::Continue
        }
    };
}
macro_rules! fp_arith_single {
    ($name:ident, $op:tt) => {
        fn $name(emulator: &mut Emulator, opcode: u32) -> StepResult {
            fp_guard!(emulator);
            let a = emulator.state.fpr[ra(opcode)].as_f64() as f32;
            let b = emulator.state.fpr[rb(opcode)].as_f64() as f32;
            emulator.state.fpr[rt(opcode)] = FprValue::from_f64((a $op b) as f64);
            if rc(opcode) {
                maybe_rc1::<true>(emulator);
            }
            StepResult::Continue
        }
    };
}

fp_arith!(fadd, +);
fp_arith!(fsub, -);
fp_arith!(fmul, *);
fp_arith!(fdiv, /);
fp_arith_single!(fadds, +);
fp_arith_single!(fsubs, -);
fp_arith_single!(fmuls, *);
fp_arith_single!(fdivs, /);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::Bus;
    use crate::emulator::Configuration;
    use crate::processor::{msr, CpuModel};

    fn fp_emulator() -> Emulator {
        let model = CpuModel { pvr: 0x0008_0201, is_601: false, include_601: false };
        let mut e = Emulator::new(Configuration { model, tb_freq_hz: 25_000_000, bus: Bus::new() });
        e.write_msr(e.state.msr | msr::FP);
        e
    }

    #[test]
    fn fadd_adds_doubles() {
        let mut e = fp_emulator();
        e.state.fpr[1] = FprValue::from_f64(1.5);
        e.state.fpr[2] = FprValue::from_f64(2.25);
        let opcode = (63u32 << 26) | (3 << 21) | (1 << 16) | (2 << 11) | (21 << 1);
        fadd(&mut e, opcode);
        assert_eq!(e.state.fpr[3].as_f64(), 3.75);
    }

    #[test]
    fn fp_unavailable_without_msr_fp() {
        let model = CpuModel { pvr: 0x0008_0201, is_601: false, include_601: false };
        let mut e = Emulator::new(Configuration { model, tb_freq_hz: 25_000_000, bus: Bus::new() });
        let opcode = (63u32 << 26) | (3 << 21) | (1 << 16) | (2 << 11) | (21 << 1);
        let r = fadd(&mut e, opcode);
        assert!(matches!(r, StepResult::Exception(_)));
    }
}
