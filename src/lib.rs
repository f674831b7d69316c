//! A cycle-approximate PowerPC (MPC601/603/604/750) CPU execution core and
//! MMU: register file, dispatch-table interpreter, software two-level TLB,
//! exception engine, and a line-oriented debugger facade.
//!
//! Grounded on the teacher (`christiankuhl-em68k`)'s own crate-root shape:
//! a small `lib.rs` that declares modules and re-exports the two names a
//! caller actually needs (`Configuration`, `Emulator`), leaving everything
//! else `pub` at the module level for the binary and tests to reach.

pub mod ctx_sync;
pub mod debugger;
pub mod decode;
pub mod devices;
pub mod emulator;
pub mod endian;
pub mod error;
pub mod exception;
pub mod instructions;
pub mod interpreter;
pub mod mmu;
pub mod opcode_table;
pub mod processor;

pub use emulator::{Configuration, Emulator};
