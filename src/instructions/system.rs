//! Privileged/system-class handlers: SPR access, `MSR` writes, `rfi`,
//! `sc`, memory barriers, TLB invalidation, traps, and the illegal-opcode
//! / FP-unavailable traps every other handler falls back to.
//!
//! Grounded on the `mtspr`/`mfspr`/`rfi`/`sc` handling described in spec
//! §4.4 and the BAT-updater dispatch described in spec §4.3 "TLB
//! flushing"; the illegal-opcode/fp-unavailable trap pair is described in
//! spec §4.2 and §8's universal-invariant property.

use crate::decode::*;
use crate::emulator::Emulator;
use crate::exception::{ExceptionInfo, ExceptionKind, StepResult};
use crate::opcode_table::{op, op31, OpcodeHandler, TABLE_SIZE};
use crate::processor::{exec_flags, msr, spr};

pub fn populate(table: &mut [OpcodeHandler; TABLE_SIZE]) {
    op(table, 0, illegal_op); // opcode 0 is architecturally reserved/illegal
    op(table, 17, sc_form);
    op31(table, 146, mtmsr);
    op31(table, 83, mfmsr);
    op31(table, 467, mtspr);
    op31(table, 339, mfspr);
    op31(table, 306, tlbie);
    op31(table, 370, tlbia);
    op(table, 19, cr_logical_and_rfi_and_isync);
    op31(table, 598, sync);
    op31(table, 854, eieio);
    op31(table, 4, tw);
    op(table, 3, twi);
}

/// Primary opcode 19 covers several unrelated, rarely-colliding forms
/// (branch-conditional-to-LR/CTR live in `branch.rs`'s own table writes,
/// which run after this and win the slot; `mcrf`, `rfi`, `isync`,
/// condition-register logical ops share this primary and are routed here
/// by their extended opcode field).
fn cr_logical_and_rfi_and_isync(emulator: &mut Emulator, opcode: u32) -> StepResult {
    let ext = (opcode >> 1) & 0x3FF;
    match ext {
        0 => mcrf(emulator, opcode),
        50 => rfi(emulator, opcode),
        150 => isync(emulator, opcode),
        257 => crand(emulator, opcode),
        129 => crandc(emulator, opcode),
        289 => creqv(emulator, opcode),
        225 => crnand(emulator, opcode),
        33 => crnor(emulator, opcode),
        449 => cror(emulator, opcode),
        417 => crorc(emulator, opcode),
        193 => crxor(emulator, opcode),
        _ => illegal_op(emulator, opcode),
    }
}

pub fn illegal_op(emulator: &mut Emulator, _opcode: u32) -> StepResult {
    log::debug!("illegal opcode at pc={:#010x}", emulator.state.pc);
    let info = ExceptionInfo::new(ExceptionKind::Program, 1 << 12);
    emulator.raise(info)
}

pub fn fp_unavailable(emulator: &mut Emulator, _opcode: u32) -> StepResult {
    emulator.raise(ExceptionInfo::new(ExceptionKind::FpUnavailable, 0))
}

fn sc_form(emulator: &mut Emulator, _opcode: u32) -> StepResult {
    crate::ctx_sync::do_ctx_sync(emulator);
    emulator.raise(ExceptionInfo::new(ExceptionKind::Syscall, 1 << 1))
}

fn tw(emulator: &mut Emulator, opcode: u32) -> StepResult {
    let to = rt(opcode) as u32;
    let a = emulator.state.gpr[ra(opcode)] as i32;
    let b = emulator.state.gpr[rb(opcode)] as i32;
    trap_if(emulator, to, a, b)
}

fn twi(emulator: &mut Emulator, opcode: u32) -> StepResult {
    let to = rt(opcode) as u32;
    let a = emulator.state.gpr[ra(opcode)] as i32;
    let b = simm(opcode);
    trap_if(emulator, to, a, b)
}

fn trap_if(emulator: &mut Emulator, to: u32, a: i32, b: i32) -> StepResult {
    let fire = (to & 0x10 != 0 && a < b)
        || (to & 0x08 != 0 && a > b)
        || (to & 0x04 != 0 && a == b)
        || (to & 0x02 != 0 && (a as u32) < (b as u32))
        || (to & 0x01 != 0 && (a as u32) > (b as u32));
    if fire {
        emulator.raise(ExceptionInfo::new(ExceptionKind::Program, 1 << 13))
    } else {
        StepResult::Continue
    }
}

fn mcrf(emulator: &mut Emulator, opcode: u32) -> StepResult {
    let value = emulator.state.cr_field(crfs(opcode));
    emulator.state.set_cr_field(crfd(opcode), value);
    StepResult::Continue
}

fn cr_bit(state: &crate::processor::ProcessorState, bit: u32) -> bool {
    (state.cr >> (31 - bit)) & 1 != 0
}
fn set_cr_bit(state: &mut crate::processor::ProcessorState, bit: u32, value: bool) {
    let shift = 31 - bit;
    if value {
        state.cr |= 1 << shift;
    } else {
        state.cr &= !(1 << shift);
    }
}

macro_rules! cr_logical_op {
    ($name:ident, $op:expr) => {
        fn $name(emulator: &mut Emulator, opcode: u32) -> StepResult {
            let bt = bo(opcode); // crbD field reuses the BO bit position
            let ba = bi(opcode); // crbA field reuses the BI bit position
            let bb = rb(opcode) as u32; // crbB field reuses the rB bit position
            let a = cr_bit(&emulator.state, ba);
            let b = cr_bit(&emulator.state, bb);
            let f: fn(bool, bool) -> bool = $op;
            set_cr_bit(&mut emulator.state, bt, f(a, b));
            StepResult::Continue
        }
    };
}

cr_logical_op!(crand, |a, b| a && b);
cr_logical_op!(crandc, |a, b| a && !b);
cr_logical_op!(creqv, |a, b| a == b);
cr_logical_op!(crnand, |a, b| !(a && b));
cr_logical_op!(crnor, |a, b| !(a || b));
cr_logical_op!(cror, |a, b| a || b);
cr_logical_op!(crorc, |a, b| a || !b);
cr_logical_op!(crxor, |a, b| a != b);

fn mtmsr(emulator: &mut Emulator, opcode: u32) -> StepResult {
    if !emulator.state.in_supervisor_mode() {
        return emulator.raise(ExceptionInfo::new(ExceptionKind::Program, 1 << 14));
    }
    let value = emulator.state.gpr[rs(opcode)];
    emulator.write_msr(value);
    StepResult::Continue
}

fn mfmsr(emulator: &mut Emulator, opcode: u32) -> StepResult {
    if !emulator.state.in_supervisor_mode() {
        return emulator.raise(ExceptionInfo::new(ExceptionKind::Program, 1 << 14));
    }
    emulator.state.gpr[rt(opcode)] = emulator.state.msr;
    StepResult::Continue
}

/// `rfi`: restores `MSR` from `SRR1` and `PC` from `SRR0`, and forces a
/// full page reload rather than a fast in-page increment (spec §4.4,
/// `EXEF_RFI`). Also a context-sync point (spec §4.7).
fn rfi(emulator: &mut Emulator, _opcode: u32) -> StepResult {
    if !emulator.state.in_supervisor_mode() {
        return emulator.raise(ExceptionInfo::new(ExceptionKind::Program, 1 << 14));
    }
    let srr1 = emulator.state.spr[spr::SRR1];
    let new_msr = (emulator.state.msr & 0xFFFF_0000) | (srr1 & 0x0000_FFFF);
    emulator.write_msr(new_msr);
    emulator.state.next_instruction_address = emulator.state.spr[spr::SRR0];
    emulator.state.exec_flags |= exec_flags::EXEF_RFI;
    crate::ctx_sync::do_ctx_sync(emulator);
    StepResult::Continue
}

fn isync(emulator: &mut Emulator, _opcode: u32) -> StepResult {
    crate::ctx_sync::do_ctx_sync(emulator);
    StepResult::Continue
}
fn sync(emulator: &mut Emulator, _opcode: u32) -> StepResult {
    crate::ctx_sync::do_ctx_sync(emulator);
    StepResult::Continue
}
fn eieio(_emulator: &mut Emulator, _opcode: u32) -> StepResult {
    StepResult::Continue
}

fn tlbie(emulator: &mut Emulator, opcode: u32) -> StepResult {
    if !emulator.state.in_supervisor_mode() {
        return emulator.raise(ExceptionInfo::new(ExceptionKind::Program, 1 << 14));
    }
    let ea = emulator.state.gpr[rb(opcode)];
    emulator.mmu.tlbie(ea);
    StepResult::Continue
}

fn tlbia(emulator: &mut Emulator, _opcode: u32) -> StepResult {
    if !emulator.state.in_supervisor_mode() {
        return emulator.raise(ExceptionInfo::new(ExceptionKind::Program, 1 << 14));
    }
    emulator.mmu.tlbia();
    StepResult::Continue
}

/// `mtspr`: writes to IBAT/DBAT/SDR1 don't take effect synchronously —
/// they update the register and queue the matching TLB flush for the next
/// context-sync point (spec §4.3 "TLB flushing", §4.4 "mtspr").
fn mtspr(emulator: &mut Emulator, opcode: u32) -> StepResult {
    if !emulator.state.in_supervisor_mode() {
        return emulator.raise(ExceptionInfo::new(ExceptionKind::Program, 1 << 14));
    }
    let n = spr_field(opcode);
    let value = emulator.state.gpr[rs(opcode)];
    emulator.state.spr[n] = value;

    match n {
        spr::IBAT0U..=spr::IBAT3L if (n - spr::IBAT0U) % 2 == 0 => queue_ibat_update(emulator, n),
        spr::IBAT0L..=spr::IBAT3L if (n - spr::IBAT0U) % 2 == 1 => queue_ibat_update(emulator, n - 1),
        spr::DBAT0U..=spr::DBAT3L if (n - spr::DBAT0U) % 2 == 0 => queue_dbat_update(emulator, n),
        spr::DBAT0L..=spr::DBAT3L if (n - spr::DBAT0U) % 2 == 1 => queue_dbat_update(emulator, n - 1),
        spr::SDR1 => {
            emulator.mmu.ptab.sdr1 = value;
            emulator.mmu.ptab.last_ptab_area = None;
            emulator.ctx_sync.add(|e| e.mmu.tlb_flush_pat_entries());
        }
        spr::TBL_W => emulator.state.tb.set_timebase(emulator.timers.now_ns(), value as u64),
        spr::TBU_W => {
            let lo = emulator.state.tb.timebase_at(emulator.timers.now_ns()) & 0xFFFF_FFFF;
            emulator.state.tb.set_timebase(emulator.timers.now_ns(), ((value as u64) << 32) | lo);
        }
        spr::DEC => emulator.state.tb.set_decrementer(emulator.timers.now_ns(), value),
        _ => {}
    }
    StepResult::Continue
}

fn queue_ibat_update(emulator: &mut Emulator, upper_spr: usize) {
    let index = (upper_spr - spr::IBAT0U) / 2;
    let upper = emulator.state.spr[upper_spr];
    let lower = emulator.state.spr[upper_spr + 1];
    emulator.ctx_sync.add(move |e| {
        e.mmu.update_ibat(index, upper, lower);
        e.mmu.tlb_flush_bat_entries();
    });
}

fn queue_dbat_update(emulator: &mut Emulator, upper_spr: usize) {
    let index = (upper_spr - spr::DBAT0U) / 2;
    let upper = emulator.state.spr[upper_spr];
    let lower = emulator.state.spr[upper_spr + 1];
    emulator.ctx_sync.add(move |e| {
        e.mmu.update_dbat(index, upper, lower);
        e.mmu.tlb_flush_bat_entries();
    });
}

/// `mfspr`: `DEC`/`TBL`/`TBU` are computed on demand rather than ticked
/// continuously (spec §4.4 "mftb / mfspr").
fn mfspr(emulator: &mut Emulator, opcode: u32) -> StepResult {
    let n = spr_field(opcode);
    let now = emulator.timers.now_ns();
    let value = match n {
        spr::DEC => emulator.state.tb.decrementer_at(now),
        spr::TBL_W => emulator.state.tb.timebase_at(now) as u32,
        spr::TBU_W => (emulator.state.tb.timebase_at(now) >> 32) as u32,
        _ => emulator.state.spr[n],
    };
    emulator.state.gpr[rt(opcode)] = value;
    StepResult::Continue
}
