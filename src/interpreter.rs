//! The fetch/dispatch loop and its `exec`/`exec_single`/`exec_until`/
//! `exec_dbg` entry points (spec §4.6).
//!
//! Grounded on spec.md's own four-step description of the inner loop (page
//! tracking via `translate_imem`, dispatch, `g_icycles`/timer-budget
//! accounting, `exec_flags` consultation) and on the teacher's
//! `Emulator::exec`/`step` shape in `fields.rs` (one function owning the
//! "keep going until a stop condition" decision, instruction handlers never
//! looping themselves). The page-boundary "cached host pointer" optimization
//! spec.md describes is not reproduced literally — there is no raw pointer
//! here — but every instruction still re-translates through the MMU's own
//! TLB cache, which gives the same amortized cost without unsafe code.

use crate::emulator::Emulator;
use crate::exception::StepResult;
use crate::processor::{exec_flags, PowerOffReason};

/// Why `exec`/`exec_until` stopped driving the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The requested instruction/cycle budget was exhausted.
    BudgetExhausted,
    /// `next_instruction_address` reached the `exec_until` target.
    ReachedTarget,
    /// `power_on` went false (debugger quit, `UserRequested`, etc).
    PoweredOff,
}

/// Fetches, dispatches, and retires exactly one instruction. Exposed for
/// the debugger's `step`/`next` commands as well as being the inner body of
/// [`exec`]/[`exec_until`].
pub fn exec_single(emulator: &mut Emulator) -> StepResult {
    if let Some(result) = emulator.check_pending_interrupts() {
        return result;
    }

    let pc = emulator.state.next_instruction_address;
    emulator.state.pc = pc;
    emulator.state.exec_flags &= !(exec_flags::EXEF_BRANCH | exec_flags::EXEF_EXCEPTION | exec_flags::EXEF_RFI);

    let opcode = match emulator.translate_imem(pc) {
        Ok(opcode) => opcode,
        Err(info) => return emulator.raise(info),
    };

    // Default fallthrough; a taken branch, exception, or rfi overwrites
    // this before the handler returns (spec §4.6 step 4).
    emulator.state.next_instruction_address = pc.wrapping_add(4);

    let handler = emulator.opcode_table.dispatch(emulator.state.fp_available(), opcode);
    handler(emulator, opcode)
}

/// Runs up to `max_instructions`, consulting the timer queue's event budget
/// the way `TimerManager::process_timers` does (spec §4.6 step 3), and
/// returns the count actually executed plus why it stopped.
pub fn exec(emulator: &mut Emulator, max_instructions: u64) -> (u64, StopReason) {
    let mut executed = 0u64;
    while executed < max_instructions {
        if !emulator.state.power_on {
            return (executed, StopReason::PoweredOff);
        }
        exec_single(emulator);
        executed += 1;

        if executed % emulator.timers.process_events() == 0 {
            emulator.timers.advance(executed);
        }
    }
    (executed, StopReason::BudgetExhausted)
}

/// Runs until `next_instruction_address == target_pc`, `power_on` goes
/// false, or `max_instructions` is exhausted (the debugger's `go`/`until`).
pub fn exec_until(emulator: &mut Emulator, target_pc: u32, max_instructions: u64) -> (u64, StopReason) {
    let mut executed = 0u64;
    while executed < max_instructions {
        if !emulator.state.power_on {
            return (executed, StopReason::PoweredOff);
        }
        if emulator.state.next_instruction_address == target_pc {
            return (executed, StopReason::ReachedTarget);
        }
        exec_single(emulator);
        executed += 1;
    }
    (executed, StopReason::BudgetExhausted)
}

/// The debugger's single-step command: runs exactly one instruction and
/// reports whether it raised a guest-visible exception, without installing
/// the alternate probe handler (that substitution only applies to the
/// debugger's direct memory reads/writes, not to stepping guest code —
/// spec §4.5 "Debugger mode installs an alternate handler").
pub fn exec_dbg_step(emulator: &mut Emulator) -> StepResult {
    if let Some(trace) = emulator.instruction_trace.as_mut() {
        trace.record(emulator.state.next_instruction_address);
    }
    exec_single(emulator)
}

/// The outer loop's cooperative re-entry for an endian switch (spec §4.6
/// "The outer loop also handles `power_off_reason == endian_switch`"):
/// the interpreter has no separate big/little-endian code path to swap in
/// since every memory access already branches on `MSR[LE]` at the point of
/// use, so resuming is just clearing the flag and continuing.
pub fn resume_after_endian_switch(emulator: &mut Emulator) {
    if emulator.state.power_off_reason == PowerOffReason::EndianSwitch {
        emulator.state.power_on = true;
        emulator.state.power_off_reason = PowerOffReason::None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::{Bus, Rom};
    use crate::emulator::Configuration;
    use crate::processor::CpuModel;

    fn boot_emulator(program: Vec<u8>) -> Emulator {
        let model = CpuModel { pvr: 0x0008_0201, is_601: false, include_601: false };
        let mut bus = Bus::new();
        bus.attach(Box::new(Rom::new(0xFFF0_0000, program).unwrap()));
        Emulator::new(Configuration { model, tb_freq_hz: 25_000_000, bus })
    }

    #[test]
    fn exec_single_advances_pc_for_a_nop_like_instruction() {
        // ori r0, r0, 0 at the reset vector: four bytes of opcode 24 (ori).
        let mut program = vec![0u8; 0x200];
        let opcode: u32 = 24 << 26;
        program[0x100..0x104].copy_from_slice(&opcode.to_be_bytes());
        let mut emulator = boot_emulator(program);
        exec_single(&mut emulator);
        assert_eq!(emulator.state.next_instruction_address, 0xFFF0_0104);
    }

    #[test]
    fn exec_stops_after_budget() {
        let program = vec![0u8; 0x200];
        let mut emulator = boot_emulator(program);
        let (executed, reason) = exec(&mut emulator, 3);
        assert_eq!(executed, 3);
        assert_eq!(reason, StopReason::BudgetExhausted);
    }
}
