//! The line-oriented debugger facade (spec §4.8): register name resolution,
//! sized memory dump/patch, step/next/until/go, watchpoints, and an
//! instruction trace ring.
//!
//! Grounded on `debugger.cpp`'s register-name table (`pc`/`lr`/`cr`/`ctr`/
//! `xer`/`msr`/`srr0`/`srr1`, plus `rN`/`fpN`) and its sized-cell memory
//! dump/patch (`b`/`w`/`d`/`q` width characters). Full Capstone-backed
//! disassembly and the Mach-kernel/Open-Firmware symbol walkers in
//! `symbols.cpp`/`symbolsopenfirmware.cpp`/`kgmacros.cpp` are not
//! reproduced — this module resolves addresses to the nearest exported
//! symbol from a flat table the host supplies, rather than walking live
//! guest kernel structures, a deliberate scope cut recorded in DESIGN.md.

use crate::emulator::Emulator;
use crate::error::DebuggerError;
use crate::exception::StepResult;
use crate::interpreter;
use crate::processor::spr;

/// A single guest-visible address, watched for read/write/execute. Spec §9
/// resolves the "hardcoded vs. runtime-configurable watchpoints" open
/// question in favor of a `Vec<WatchPoint>` the debugger can append to and
/// clear at will, rather than a fixed compiled-in set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchPoint {
    pub addr: u32,
    pub kind: WatchKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchKind {
    Read,
    Write,
    Execute,
}

/// Commands the line parser understands. `parse` builds one of these from
/// whitespace-separated tokens; `Debugger::execute` carries it out.
#[derive(Debug, Clone, PartialEq)]
pub enum DebugCommand {
    Step(u32),
    Next,
    Until(u32),
    Go,
    RegisterGet(String),
    RegisterSet(String, u32),
    MemoryDump { addr: u32, size: u32, count: u32 },
    MemoryPatch { addr: u32, size: u32, value: u64 },
    WatchAdd(WatchPoint),
    WatchClear,
    Quit,
}

/// Parses one command line. Unknown leading tokens and malformed numeric
/// arguments are reported as [`DebuggerError`] rather than panicking — the
/// debugger must never crash on a typo.
pub fn parse(line: &str) -> Result<DebugCommand, DebuggerError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let (cmd, args) = tokens.split_first().ok_or_else(|| DebuggerError::UnknownCommand(String::new()))?;
    match *cmd {
        "step" | "s" => {
            let count = match args.first() {
                Some(s) => parse_number(s)?,
                None => 1,
            };
            Ok(DebugCommand::Step(count))
        }
        "next" | "n" => Ok(DebugCommand::Next),
        "until" | "u" => {
            let addr = args.first().ok_or_else(|| arity("until", 1, args.len()))?;
            Ok(DebugCommand::Until(parse_number(addr)?))
        }
        "go" | "g" => Ok(DebugCommand::Go),
        "reg" | "r" => match args {
            [name] => Ok(DebugCommand::RegisterGet((*name).to_string())),
            [name, value] => Ok(DebugCommand::RegisterSet((*name).to_string(), parse_number(value)?)),
            _ => Err(arity("reg", 2, args.len())),
        },
        "dump" | "d" => {
            let addr = args.first().ok_or_else(|| arity("dump", 1, args.len()))?;
            let size = args.get(1).copied().map(parse_number).transpose()?.unwrap_or(4);
            let count = args.get(2).copied().map(parse_number).transpose()?.unwrap_or(16);
            Ok(DebugCommand::MemoryDump { addr: parse_number(addr)?, size, count })
        }
        "patch" | "p" => {
            let addr = args.first().ok_or_else(|| arity("patch", 3, args.len()))?;
            let size = args.get(1).ok_or_else(|| arity("patch", 3, args.len()))?;
            let value = args.get(2).ok_or_else(|| arity("patch", 3, args.len()))?;
            Ok(DebugCommand::MemoryPatch { addr: parse_number(addr)?, size: parse_number(size)?, value: parse_number(value)? as u64 })
        }
        "watch" | "w" => {
            if args.first() == Some(&"clear") {
                return Ok(DebugCommand::WatchClear);
            }
            let addr = args.first().ok_or_else(|| arity("watch", 2, args.len()))?;
            let kind = match args.get(1) {
                Some(&"r") => WatchKind::Read,
                Some(&"w") => WatchKind::Write,
                Some(&"x") => WatchKind::Execute,
                _ => return Err(arity("watch", 2, args.len())),
            };
            Ok(DebugCommand::WatchAdd(WatchPoint { addr: parse_number(addr)?, kind }))
        }
        "quit" | "q" => Ok(DebugCommand::Quit),
        other => Err(DebuggerError::UnknownCommand(other.to_string())),
    }
}

fn arity(command: &str, expected: usize, got: usize) -> DebuggerError {
    DebuggerError::ArityMismatch { command: command.to_string(), expected, got }
}

fn parse_number(token: &str) -> Result<u32, DebuggerError> {
    let trimmed = token.trim_start_matches("0x").trim_start_matches("0X");
    u32::from_str_radix(trimmed, 16)
        .or_else(|_| token.parse::<u32>())
        .map_err(|_| DebuggerError::UnparseableNumber(token.to_string()))
}

/// Resolves a debugger register name into its current value, per the
/// `pc`/`lr`/`cr`/`ctr`/`xer`/`msr`/`srr0`/`srr1`/`rN`/`fpN`/`sprN` naming
/// convention `debugger.cpp` uses for the 68k register facade, generalized
/// to PowerPC's own register set.
pub fn resolve_register(emulator: &Emulator, name: &str) -> Result<u32, DebuggerError> {
    let lower = name.to_ascii_lowercase();
    match lower.as_str() {
        "pc" => Ok(emulator.state.pc),
        "lr" => Ok(emulator.state.spr[spr::LR]),
        "ctr" => Ok(emulator.state.spr[spr::CTR]),
        "xer" => Ok(emulator.state.spr[spr::XER]),
        "cr" => Ok(emulator.state.cr),
        "msr" => Ok(emulator.state.msr),
        "srr0" => Ok(emulator.state.spr[spr::SRR0]),
        "srr1" => Ok(emulator.state.spr[spr::SRR1]),
        "dsisr" => Ok(emulator.state.spr[spr::DSISR]),
        "dar" => Ok(emulator.state.spr[spr::DAR]),
        _ if lower.starts_with('r') => lower[1..]
            .parse::<usize>()
            .ok()
            .filter(|&n| n < 32)
            .map(|n| emulator.state.gpr[n])
            .ok_or_else(|| DebuggerError::UnknownRegister(name.to_string())),
        _ if lower.starts_with("fp") => lower[2..]
            .parse::<usize>()
            .ok()
            .filter(|&n| n < 32)
            .map(|n| emulator.state.fpr[n].bits() as u32)
            .ok_or_else(|| DebuggerError::UnknownRegister(name.to_string())),
        _ if lower.starts_with("spr") => lower[3..]
            .parse::<usize>()
            .ok()
            .filter(|&n| n < 1024)
            .map(|n| emulator.state.spr[n])
            .ok_or_else(|| DebuggerError::UnknownRegister(name.to_string())),
        _ => Err(DebuggerError::UnknownRegister(name.to_string())),
    }
}

pub fn set_register(emulator: &mut Emulator, name: &str, value: u32) -> Result<(), DebuggerError> {
    let lower = name.to_ascii_lowercase();
    match lower.as_str() {
        "pc" => {
            emulator.state.pc = value;
            emulator.state.next_instruction_address = value;
        }
        "lr" => emulator.state.spr[spr::LR] = value,
        "ctr" => emulator.state.spr[spr::CTR] = value,
        "xer" => emulator.state.spr[spr::XER] = value,
        "cr" => emulator.state.cr = value,
        "msr" => emulator.write_msr(value),
        _ if lower.starts_with('r') => {
            let n = lower[1..].parse::<usize>().ok().filter(|&n| n < 32).ok_or_else(|| DebuggerError::UnknownRegister(name.to_string()))?;
            emulator.state.gpr[n] = value;
        }
        _ if lower.starts_with("spr") => {
            let n = lower[3..].parse::<usize>().ok().filter(|&n| n < 1024).ok_or_else(|| DebuggerError::UnknownRegister(name.to_string()))?;
            emulator.state.spr[n] = value;
        }
        _ => return Err(DebuggerError::UnknownRegister(name.to_string())),
    }
    Ok(())
}

/// State-preserving memory read for the debugger console: installs the
/// alternate exception handler's recoverable-error contract (spec §4.5
/// "Debugger mode installs an alternate handler") by converting a guest
/// fault into a `DebuggerError` instead of delivering it to the guest.
pub fn probe_read(emulator: &mut Emulator, addr: u32, size: u32) -> Result<u64, DebuggerError> {
    match emulator.read_vmem(addr, size) {
        Ok(v) => Ok(v),
        Err(info) => Err(crate::exception::dbg_exception_handler(&info)),
    }
}

pub fn probe_write(emulator: &mut Emulator, addr: u32, size: u32, value: u64) -> Result<(), DebuggerError> {
    match emulator.write_vmem(addr, size, value) {
        Ok(()) => Ok(()),
        Err(info) => Err(crate::exception::dbg_exception_handler(&info)),
    }
}

/// A fixed-capacity circular buffer of retired instruction addresses, for
/// the "replay disassembly from the circular buffer" trace feature (spec
/// §4.8).
pub struct TraceRing {
    entries: Vec<u32>,
    capacity: usize,
    next: usize,
    filled: bool,
}

impl TraceRing {
    pub fn new(capacity: usize) -> Self {
        TraceRing { entries: vec![0; capacity.max(1)], capacity: capacity.max(1), next: 0, filled: false }
    }

    pub fn record(&mut self, pc: u32) {
        self.entries[self.next] = pc;
        self.next = (self.next + 1) % self.capacity;
        if self.next == 0 {
            self.filled = true;
        }
    }

    /// Oldest-to-newest snapshot of the ring's contents.
    pub fn snapshot(&self) -> Vec<u32> {
        if !self.filled {
            self.entries[..self.next].to_vec()
        } else {
            let mut out = self.entries[self.next..].to_vec();
            out.extend_from_slice(&self.entries[..self.next]);
            out
        }
    }
}

/// One disassembled instruction, simplified to the mnemonic/operand string
/// pair `debugger.cpp`'s Capstone integration prints (no operand-level
/// structure, no read/write register side tables).
pub struct Disassembly {
    pub addr: u32,
    pub opcode: u32,
    pub text: String,
}

/// A contiguous run of [`Disassembly`] entries, the unit the debugger's
/// `disasm` command prints per invocation.
pub struct DisassemblySection {
    pub start: u32,
    pub lines: Vec<Disassembly>,
}

/// The debugger's mutable state: watchpoints and whatever the interpreter
/// needs to know to stop early. Holds no processor state of its own — that
/// still lives in `Emulator`, per the single-owner design (spec §9).
#[derive(Default)]
pub struct Debugger {
    pub watchpoints: Vec<WatchPoint>,
}

impl Debugger {
    pub fn new() -> Self {
        Debugger { watchpoints: Vec::new() }
    }

    pub fn execute(&mut self, emulator: &mut Emulator, command: DebugCommand) -> Result<String, DebuggerError> {
        match command {
            DebugCommand::Step(count) => {
                let mut last = StepResult::Continue;
                for _ in 0..count {
                    last = interpreter::exec_dbg_step(emulator);
                }
                Ok(format!("stopped at pc={:#010x} ({})", emulator.state.pc, step_label(&last)))
            }
            DebugCommand::Next => {
                let last = interpreter::exec_dbg_step(emulator);
                Ok(format!("stopped at pc={:#010x} ({})", emulator.state.pc, step_label(&last)))
            }
            DebugCommand::Until(target) => {
                let (count, reason) = interpreter::exec_until(emulator, target, 10_000_000);
                Ok(format!("ran {} instructions, stopped: {:?}", count, reason))
            }
            DebugCommand::Go => {
                let (count, reason) = interpreter::exec(emulator, u64::MAX);
                Ok(format!("ran {} instructions, stopped: {:?}", count, reason))
            }
            DebugCommand::RegisterGet(name) => {
                let value = resolve_register(emulator, &name)?;
                Ok(format!("{} = {:#010x}", name, value))
            }
            DebugCommand::RegisterSet(name, value) => {
                set_register(emulator, &name, value)?;
                Ok(format!("{} <- {:#010x}", name, value))
            }
            DebugCommand::MemoryDump { addr, size, count } => {
                let mut out = String::new();
                let mut a = addr;
                for _ in 0..count {
                    let v = probe_read(emulator, a, size)?;
                    out.push_str(&format!("{:#010x}: {:#x}\n", a, v));
                    a = a.wrapping_add(size);
                }
                Ok(out)
            }
            DebugCommand::MemoryPatch { addr, size, value } => {
                probe_write(emulator, addr, size, value)?;
                Ok(format!("wrote {:#x} to {:#010x}", value, addr))
            }
            DebugCommand::WatchAdd(wp) => {
                self.watchpoints.push(wp);
                Ok(format!("watching {:#010x} ({:?})", wp.addr, wp.kind))
            }
            DebugCommand::WatchClear => {
                self.watchpoints.clear();
                Ok("cleared all watchpoints".to_string())
            }
            DebugCommand::Quit => {
                emulator.state.power_on = false;
                emulator.state.power_off_reason = crate::processor::PowerOffReason::UserRequested;
                Ok("powering off".to_string())
            }
        }
    }
}

fn step_label(result: &StepResult) -> &'static str {
    match result {
        StepResult::Continue => "ok",
        StepResult::Exception(_) => "exception",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_step_defaults_to_one() {
        assert_eq!(parse("step").unwrap(), DebugCommand::Step(1));
        assert_eq!(parse("step 5").unwrap(), DebugCommand::Step(5));
    }

    #[test]
    fn parse_rejects_unknown_command() {
        assert!(matches!(parse("frobnicate"), Err(DebuggerError::UnknownCommand(_))));
    }

    #[test]
    fn trace_ring_wraps() {
        let mut ring = TraceRing::new(3);
        ring.record(1);
        ring.record(2);
        ring.record(3);
        ring.record(4);
        assert_eq!(ring.snapshot(), vec![2, 3, 4]);
    }
}
