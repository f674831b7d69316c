//! `myppc`: a thin CLI that builds a [`ppc750::Configuration`] from parsed
//! arguments and hands it to the interpreter loop, optionally dropping into
//! the debugger instead of running to completion.
//!
//! Grounded on the teacher's `main.rs` (`Emulator::new(config).run(program,
//! debug)`), with `clap` replacing the teacher's hardcoded `fs::read`
//! call (spec §12 "Configuration").

use std::io::{self, BufRead, Write as _};

use clap::Parser;
use ppc750::debugger::{self, Debugger};
use ppc750::devices::{Bus, Ram, Rom};
use ppc750::emulator::Configuration;
use ppc750::interpreter;
use ppc750::processor::CpuModel;
use ppc750::Emulator;

/// PVR values for the four models this crate names explicitly (spec §1).
fn pvr_for(model: &str) -> anyhow::Result<(u32, bool)> {
    match model {
        "601" => Ok((0x0001_0001, true)),
        "603" => Ok((0x0003_0001, false)),
        "604" => Ok((0x0004_0001, false)),
        "750" => Ok((0x0008_0201, false)),
        other => anyhow::bail!("unknown --pvr model `{other}` (expected one of 601, 603, 604, 750)"),
    }
}

#[derive(Parser, Debug)]
#[command(name = "myppc", about = "A cycle-approximate PowerPC CPU/MMU core")]
struct Args {
    /// Path to the boot ROM image, mapped at the reset vector's physical base.
    #[arg(long)]
    rom: std::path::PathBuf,

    /// Which PVR family to emulate.
    #[arg(long, default_value = "750")]
    pvr: String,

    /// Force 601 POWER-legacy instruction support even on a non-601 PVR.
    #[arg(long)]
    include_601: bool,

    /// Time-base tick frequency in Hz.
    #[arg(long, default_value_t = 25_000_000)]
    tb_freq: u64,

    /// Optional NVRAM image, mapped just below the ROM.
    #[arg(long)]
    nvram: Option<std::path::PathBuf>,

    /// Drop into the line-oriented debugger instead of running to halt.
    #[arg(long)]
    debug: bool,

    /// RAM size in bytes, mapped at physical address 0.
    #[arg(long, default_value_t = 64 * 1024 * 1024)]
    ram_size: usize,
}

const ROM_BASE: u32 = 0xFFF0_0000;
const NVRAM_BASE: u32 = 0xFFE0_0000;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let (pvr, is_601) = pvr_for(&args.pvr)?;
    let rom_image = std::fs::read(&args.rom)?;

    let mut bus = Bus::new();
    bus.attach(Box::new(Ram::new(0, args.ram_size)?));
    bus.attach(Box::new(Rom::new(ROM_BASE, rom_image)?));
    if let Some(nvram_path) = &args.nvram {
        let nvram_image = std::fs::read(nvram_path)?;
        bus.attach(Box::new(Ram::from_image(NVRAM_BASE, nvram_image)?));
        log::info!("loaded nvram image from {}", nvram_path.display());
    }

    let model = CpuModel { pvr, is_601, include_601: args.include_601 };
    let config = Configuration { model, tb_freq_hz: args.tb_freq, bus };
    let mut emulator = Emulator::new(config);

    if args.debug {
        run_debugger(&mut emulator)
    } else {
        let (executed, reason) = interpreter::exec(&mut emulator, u64::MAX);
        log::info!("ran {executed} instructions, stopped: {reason:?}");
        Ok(())
    }
}

fn run_debugger(emulator: &mut Emulator) -> anyhow::Result<()> {
    let mut debugger = Debugger::new();
    let stdin = io::stdin();
    print!("myppc> ");
    io::stdout().flush()?;
    for line in stdin.lock().lines() {
        let line = line?;
        match debugger::parse(&line) {
            Ok(command) => {
                let quit = matches!(command, debugger::DebugCommand::Quit);
                match debugger.execute(emulator, command) {
                    Ok(output) => println!("{output}"),
                    Err(e) => println!("error: {e}"),
                }
                if quit {
                    break;
                }
            }
            Err(e) => println!("error: {e}"),
        }
        print!("myppc> ");
        io::stdout().flush()?;
    }
    Ok(())
}
