//! Exception engine: the tagged-result substitute for the original's
//! `setjmp`/`longjmp` non-local exit (spec §4.5, and spec §9's own design
//! note prescribing exactly this substitution).
//!
//! Grounded on `Except_Type`/`Exc_Cause` in `original_source/cpu/ppc/ppcemu.h`
//! and the exception-vector/SRR0-SRR1 protocol described in spec §4.5
//! (the C++ body of `ppc_exception_handler` itself is not present in the
//! retrieved source; its behavior here follows spec.md's own four-step
//! description).

use crate::processor::{msr, spr, ProcessorState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionKind {
    Reset,
    MachineCheck,
    Dsi,
    Isi,
    ExternalInterrupt,
    Alignment,
    Program,
    FpUnavailable,
    Decrementer,
    Syscall,
    Trace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramCause {
    IllegalOp,
    Privileged,
    Trap,
    FloatingPoint,
}

/// What an instruction handler hands back instead of returning a value
/// directly (spec §4.2 "Handlers are small; they never return errors" plus
/// §9's tagged-result design note: `Step = Ok | Exception(kind, srr1_bits)`).
pub enum StepResult {
    Continue,
    Exception(ExceptionInfo),
}

#[derive(Debug, Clone, Copy)]
pub struct ExceptionInfo {
    pub kind: ExceptionKind,
    pub srr1_bits: u32,
    pub dsisr_bits: Option<u32>,
    pub dar: Option<u32>,
}

impl ExceptionInfo {
    pub fn new(kind: ExceptionKind, srr1_bits: u32) -> Self {
        ExceptionInfo { kind, srr1_bits, dsisr_bits: None, dar: None }
    }
    pub fn with_dsisr(mut self, dsisr_bits: u32, dar: u32) -> Self {
        self.dsisr_bits = Some(dsisr_bits);
        self.dar = Some(dar);
        self
    }
}

fn vector_offset(kind: ExceptionKind) -> u32 {
    match kind {
        ExceptionKind::Reset => 0x0100,
        ExceptionKind::MachineCheck => 0x0200,
        ExceptionKind::Dsi => 0x0300,
        ExceptionKind::Isi => 0x0400,
        ExceptionKind::ExternalInterrupt => 0x0500,
        ExceptionKind::Alignment => 0x0600,
        ExceptionKind::Program => 0x0700,
        ExceptionKind::FpUnavailable => 0x0800,
        ExceptionKind::Decrementer => 0x0900,
        ExceptionKind::Syscall => 0x0C00,
        ExceptionKind::Trace => 0x0D00,
    }
}

/// MSR bits cleared on exception entry, per-type (spec §4.5 step 2). All
/// types clear IR/DR/EE/PR; machine check also clears ME while it is being
/// serviced is architecturally more nuanced, but out of scope here (no
/// nested machine-check recovery is modeled).
fn msr_clear_mask(_kind: ExceptionKind) -> u32 {
    msr::IR | msr::DR | msr::EE | msr::PR | msr::FE0 | msr::FE1
}

/// Applies the guest-visible exception protocol: save PC into SRR0,
/// construct SRR1, clear MSR bits, compute the vector, and arrange for the
/// interpreter to resume there (spec §4.5 steps 1-4). Returns the new PC;
/// the caller (the interpreter loop) is the "non-local exit" target — no
/// actual unwinding happens since `StepResult` already carried control back
/// up to it.
pub fn exception_handler(state: &mut ProcessorState, info: &ExceptionInfo) -> u32 {
    state.spr[spr::SRR0] = state.pc;
    state.spr[spr::SRR1] = (state.msr & 0x0000_FFFF) | info.srr1_bits;
    if let Some(dsisr) = info.dsisr_bits {
        state.spr[spr::DSISR] = dsisr;
    }
    if let Some(dar) = info.dar {
        state.spr[spr::DAR] = dar;
    }

    let ip_set = state.msr & msr::IP != 0;
    state.msr &= !msr_clear_mask(info.kind);

    let base = if ip_set { 0xFFF0_0000 } else { 0 };
    let vector = base + vector_offset(info.kind);

    state.next_instruction_address = vector;
    state.exec_flags |= crate::processor::exec_flags::EXEF_EXCEPTION;
    vector
}

/// Installed by the debugger in place of `exception_handler` for
/// introspection primitives: instead of mutating guest-visible state, it
/// returns a recoverable `DebuggerError` so memory-inspection reads/writes
/// never perturb the CPU they are inspecting (spec §4.5 "Debugger mode
/// installs an alternate handler").
pub fn dbg_exception_handler(info: &ExceptionInfo) -> crate::error::DebuggerError {
    crate::error::DebuggerError::ProbeException(format!("{:?}", info.kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::{CpuModel, ProcessorState};

    #[test]
    fn illegal_opcode_sets_vector_and_srr1() {
        let model = CpuModel { pvr: 0x0008_0201, is_601: false, include_601: false };
        let mut state = ProcessorState::new(model, 25_000_000);
        state.reset();
        state.pc = 0x1000;
        let info = ExceptionInfo::new(ExceptionKind::Program, 1 << 12);
        let vector = exception_handler(&mut state, &info);
        assert_eq!(state.spr[spr::SRR0], 0x1000);
        assert_eq!(vector, 0xFFF0_0700);
        assert_ne!(state.spr[spr::SRR1] & (1 << 12), 0);
    }

    #[test]
    fn dsi_carries_dsisr_and_dar() {
        let model = CpuModel { pvr: 0x0008_0201, is_601: false, include_601: false };
        let mut state = ProcessorState::new(model, 25_000_000);
        state.reset();
        let info = ExceptionInfo::new(ExceptionKind::Dsi, 0).with_dsisr(1 << 1, 0xDEAD_BEEF);
        exception_handler(&mut state, &info);
        assert_eq!(state.spr[spr::DSISR], 1 << 1);
        assert_eq!(state.spr[spr::DAR], 0xDEAD_BEEF);
    }
}
