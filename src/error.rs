//! Error types for the emulator core and its debugger facade.
//!
//! Guest-visible exceptions (DSI, ISI, program, ...) are *not* represented
//! here: those flow through [`crate::exception::StepResult`] and the
//! context-sync/exception engine, since they are part of normal guest
//! execution rather than a host-side failure. The types in this module
//! cover conditions the host itself cannot recover from transparently.

use thiserror::Error;

/// Conditions that stop the interpreter outright and drop it into the
/// debugger rather than propagating further up the call stack (the core
/// never terminates the process by itself; see `spec` §7.3).
#[derive(Debug, Error)]
pub enum EmulatorError {
    #[error("opcode table failed to populate: slot {0:#x} left unset")]
    OpcodeTableCorrupt(usize),

    #[error("RAM region has size zero")]
    EmptyRamRegion,

    #[error("DMA access at {phys_addr:#010x} (len {len}) crosses into an incompatible region")]
    DmaRegionMismatch { phys_addr: u32, len: u32 },

    #[error("no address-map entry covers physical address {0:#010x}")]
    UnmappedPhysicalAddress(u32),
}

/// Errors surfaced by the line-oriented debugger. These never mutate
/// processor state; they are reported on the debugger's own console.
#[derive(Debug, Error)]
pub enum DebuggerError {
    #[error("unknown register `{0}`")]
    UnknownRegister(String),

    #[error("could not parse `{0}` as a number")]
    UnparseableNumber(String),

    #[error("unknown command `{0}`")]
    UnknownCommand(String),

    #[error("wrong number of arguments for `{command}` (expected {expected}, got {got})")]
    ArityMismatch {
        command: String,
        expected: usize,
        got: usize,
    },

    #[error("introspection probe failed: {0}")]
    ProbeException(String),
}
