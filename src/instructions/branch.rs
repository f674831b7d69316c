//! Branch instructions: `b`/`bc`/`bclr`/`bcctr` and their absolute/link
//! variants (spec §4.4 "Branch").
//!
//! Grounded on the BO/BI condition-evaluation table in the PowerPC
//! Programming Environments Manual and on the teacher's own branch
//! handling in `instructions.rs` (`Bcc`/`Dbcc` address-computation shape:
//! compute a target, stash it, let the fetch loop pick it up next cycle).

use crate::decode::*;
use crate::emulator::Emulator;
use crate::exception::StepResult;
use crate::opcode_table::{op, op31_dot, OpcodeHandler, TABLE_SIZE};
use crate::processor::{exec_flags, spr};

pub fn populate(table: &mut [OpcodeHandler; TABLE_SIZE]) {
    // `b`/`ba`/`bl`/`bla`: AA/LK are encoded in the low two bits of the
    // primary-opcode word itself, so every modifier slot under opcode 18
    // dispatches through one handler that re-reads `aa`/`lk` from the raw
    // opcode.
    op(table, 18, b_dispatch);
    op(table, 16, bc_dispatch);

    // `bclrx`/`bcctrx`: LK occupies the modifier field's low bit alongside
    // the fixed extended opcode, so both LK=0/1 slots route to the same
    // handler (it reads `lk(opcode)` itself rather than being monomorphized).
    op31_dot(table, 16, bclr_dispatch, bclr_dispatch);
    op31_dot(table, 528, bcctr_dispatch, bcctr_dispatch);
}

fn branch_taken(emulator: &Emulator, opcode: u32) -> bool {
    let bo_val = bo(opcode);
    let bi_val = bi(opcode);
    let ctr_ok = if bo_val & 0b00100 != 0 {
        true
    } else {
        let ctr = emulator.state.spr[spr::CTR].wrapping_sub(1);
        let nonzero = ctr != 0;
        if bo_val & 0b00010 != 0 {
            nonzero
        } else {
            !nonzero
        }
    };
    let cond_ok = if bo_val & 0b10000 != 0 {
        true
    } else {
        let bit = (emulator.state.cr >> (31 - bi_val)) & 1;
        if bo_val & 0b01000 != 0 {
            bit == 1
        } else {
            bit == 0
        }
    };
    ctr_ok && cond_ok
}

fn decrement_ctr_if_needed(emulator: &mut Emulator, opcode: u32) {
    if bo(opcode) & 0b00100 == 0 {
        emulator.state.spr[spr::CTR] = emulator.state.spr[spr::CTR].wrapping_sub(1);
    }
}

fn maybe_link(emulator: &mut Emulator, opcode: u32) {
    if lk(opcode) {
        emulator.state.spr[spr::LR] = emulator.state.next_instruction_address;
    }
}

fn take_branch(emulator: &mut Emulator, target: u32) {
    emulator.state.next_instruction_address = target;
    emulator.state.exec_flags |= exec_flags::EXEF_BRANCH;
}

fn b_dispatch(emulator: &mut Emulator, opcode: u32) -> StepResult {
    let here = emulator.state.pc;
    let target = if aa(opcode) { li(opcode) as u32 } else { here.wrapping_add(li(opcode) as u32) };
    maybe_link(emulator, opcode);
    take_branch(emulator, target);
    StepResult::Continue
}

fn bc_dispatch(emulator: &mut Emulator, opcode: u32) -> StepResult {
    decrement_ctr_if_needed(emulator, opcode);
    if branch_taken(emulator, opcode) {
        let here = emulator.state.pc;
        let target = if aa(opcode) { bd(opcode) as u32 } else { here.wrapping_add(bd(opcode) as u32) };
        maybe_link(emulator, opcode);
        take_branch(emulator, target);
    } else {
        maybe_link(emulator, opcode);
    }
    StepResult::Continue
}

fn bclr_dispatch(emulator: &mut Emulator, opcode: u32) -> StepResult {
    decrement_ctr_if_needed(emulator, opcode);
    if branch_taken(emulator, opcode) {
        let target = emulator.state.spr[spr::LR] & !0x3;
        maybe_link(emulator, opcode);
        take_branch(emulator, target);
    } else {
        maybe_link(emulator, opcode);
    }
    StepResult::Continue
}

fn bcctr_dispatch(emulator: &mut Emulator, opcode: u32) -> StepResult {
    // `bcctrx` never decrements CTR (PEM 4-50): the BO "ignore CTR" bit is
    // architecturally forced for this form.
    if branch_taken(emulator, opcode) {
        let target = emulator.state.spr[spr::CTR] & !0x3;
        maybe_link(emulator, opcode);
        take_branch(emulator, target);
    } else {
        maybe_link(emulator, opcode);
    }
    StepResult::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::Bus;
    use crate::emulator::Configuration;
    use crate::processor::CpuModel;

    fn test_emulator() -> Emulator {
        let model = CpuModel { pvr: 0x0008_0201, is_601: false, include_601: false };
        Emulator::new(Configuration { model, tb_freq_hz: 25_000_000, bus: Bus::new() })
    }

    #[test]
    fn unconditional_branch_sets_target_and_link() {
        let mut emulator = test_emulator();
        emulator.state.pc = 0x1000;
        emulator.state.next_instruction_address = 0x1004;
        // b +0x20, AA=0, LK=1
        let opcode = (18u32 << 26) | 0x20 | 0b01;
        b_dispatch(&mut emulator, opcode);
        assert_eq!(emulator.state.next_instruction_address, 0x1020);
        assert_eq!(emulator.state.spr[spr::LR], 0x1004);
        assert_ne!(emulator.state.exec_flags & exec_flags::EXEF_BRANCH, 0);
    }

    #[test]
    fn bc_with_ctr_ignore_and_cond_true_always_taken() {
        let mut emulator = test_emulator();
        emulator.state.pc = 0x2000;
        // BO = 0b10100 (ignore CTR, ignore condition) -> always taken
        let bo_val = 0b10100u32;
        let bd_val = 0x40u32;
        let opcode = (16u32 << 26) | (bo_val << 21) | bd_val;
        bc_dispatch(&mut emulator, opcode);
        assert_eq!(emulator.state.next_instruction_address, 0x2040);
    }
}
