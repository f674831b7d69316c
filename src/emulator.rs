//! The `Emulator` value: one owned struct holding every piece of mutable
//! state, passed as `&mut self` into dispatch instead of the teacher's
//! `Rc<RefCell<_>>` per-register handles (spec §9 "Global mutable state"
//! design note — "encapsulate in a single `Emulator` value owned by the
//! outer loop").

use crate::ctx_sync::CtxSyncQueue;
use crate::devices::{Bus, TimerQueue};
use crate::exception::{exception_handler, ExceptionInfo, StepResult};
use crate::mmu::{Mmu, MmuFault, TranslatedAccess};
use crate::opcode_table::OpcodeTable;
use crate::processor::{msr_did_change, CpuModel, ProcessorState};

/// Everything `Configuration::build` needs to stand up an `Emulator`
/// (spec §3 "Lifecycle": `cpu_init(mem_ctrl, pvr, include_601, tb_freq)`).
pub struct Configuration {
    pub model: CpuModel,
    pub tb_freq_hz: u64,
    pub bus: Bus,
}

pub struct Emulator {
    pub state: ProcessorState,
    pub mmu: Mmu,
    pub bus: Bus,
    pub opcode_table: OpcodeTable,
    pub ctx_sync: CtxSyncQueue,
    pub timers: TimerQueue,
    pub instruction_trace: Option<crate::debugger::TraceRing>,
    /// Latched by `assert_int()`; consulted by the interpreter loop once
    /// per instruction rather than re-checked only on `mtmsr` (spec §4.5
    /// "External interrupts" — a simplification of the line-level latch
    /// noted in DESIGN.md).
    pending_interrupt: bool,
    /// Tracks the decrementer's sign so the interpreter raises exactly once
    /// per 0-to-negative transition instead of every poll while negative.
    dec_was_positive: bool,
}

impl Emulator {
    /// `cpu_init` + power-on (spec §3 "Lifecycle").
    pub fn new(config: Configuration) -> Self {
        let opcode_table = OpcodeTable::new(&config.model);
        let mut state = ProcessorState::new(config.model, config.tb_freq_hz);
        state.reset();
        let mut emulator = Emulator {
            state,
            mmu: Mmu::new(),
            bus: config.bus,
            opcode_table,
            ctx_sync: CtxSyncQueue::new(),
            timers: TimerQueue::new(),
            instruction_trace: None,
            pending_interrupt: false,
            dec_was_positive: true,
        };
        emulator.mmu.mmu_change_mode(emulator.state.msr);
        emulator
    }

    pub fn enable_trace(&mut self, capacity: usize) {
        self.instruction_trace = Some(crate::debugger::TraceRing::new(capacity));
    }

    /// Single choke point for MSR writes (spec §4.1).
    pub fn write_msr(&mut self, new_msr: u32) {
        let old = self.state.msr;
        self.state.msr = new_msr;
        msr_did_change(&mut self.state, old, &self.opcode_table);
        self.mmu.mmu_change_mode(new_msr);
    }

    /// Instruction-fetch translation (spec §6 `translate_imem`). Returns
    /// the opcode word at `vaddr`, or raises ISI via `StepResult`.
    pub fn translate_imem(&mut self, vaddr: u32) -> Result<u32, ExceptionInfo> {
        match self.mmu.translate(&mut self.state, &mut self.bus, vaddr, true, false) {
            Ok(TranslatedAccess::Host { phys_addr, region, .. }) => {
                let entry = self.bus.find_range(phys_addr).expect("resolved host region must exist");
                let swap = self.bus.byte_swap_at(&entry);
                let _ = region;
                let word = self.bus.read(&entry, phys_addr, 4) as u32;
                Ok(if swap { word.swap_bytes() } else { word })
            }
            Ok(TranslatedAccess::Mmio { .. }) => {
                Err(ExceptionInfo::new(crate::exception::ExceptionKind::MachineCheck, 0))
            }
            Err(fault) => Err(self.fault_to_exception(fault)),
        }
    }

    fn fault_to_exception(&self, fault: MmuFault) -> ExceptionInfo {
        match fault {
            MmuFault::Isi { srr1_bit, .. } => {
                ExceptionInfo::new(crate::exception::ExceptionKind::Isi, srr1_bit)
            }
            MmuFault::Dsi { dsisr_bit, ea, .. } => {
                ExceptionInfo::new(crate::exception::ExceptionKind::Dsi, 0).with_dsisr(dsisr_bit, ea)
            }
            MmuFault::NoPhysicalBacking(addr) => {
                ExceptionInfo::new(crate::exception::ExceptionKind::MachineCheck, 0).with_dsisr(0, addr)
            }
        }
    }

    /// Sized, possibly-crosspage guest memory read (spec §4.3 "Aligned vs.
    /// unaligned vs. crosspage", §6 `read_vmem<T>`).
    pub fn read_vmem(&mut self, vaddr: u32, size: u32) -> Result<u64, ExceptionInfo> {
        if size == 8 && vaddr & 0x3 != 0 {
            return Err(ExceptionInfo::new(crate::exception::ExceptionKind::Alignment, 0));
        }
        let munged = if self.state.little_endian() {
            crate::endian::munge_address(vaddr, size)
        } else {
            vaddr
        };
        if crosses_page(munged, size) {
            let mut bytes = 0u64;
            for i in 0..size {
                let byte = self.read_vmem_byte(munged.wrapping_add(i))?;
                bytes = (bytes << 8) | byte as u64;
            }
            return Ok(bytes);
        }
        self.read_vmem_aligned(munged, size)
    }

    fn read_vmem_byte(&mut self, vaddr: u32) -> Result<u8, ExceptionInfo> {
        self.read_vmem_aligned(vaddr, 1).map(|v| v as u8)
    }

    fn read_vmem_aligned(&mut self, vaddr: u32, size: u32) -> Result<u64, ExceptionInfo> {
        match self.mmu.translate(&mut self.state, &mut self.bus, vaddr, false, false) {
            Ok(TranslatedAccess::Host { phys_addr, .. }) => {
                let entry = self.bus.find_range(phys_addr).expect("resolved host region must exist");
                let swap = self.bus.byte_swap_at(&entry);
                let raw = self.bus.read(&entry, phys_addr, size);
                Ok(swap_if(swap, size, raw))
            }
            Ok(TranslatedAccess::Mmio { device_index, phys_addr }) => {
                let entry = self.bus.find_range(phys_addr).expect("mmio region must exist");
                let _ = device_index;
                Ok(self.bus.read(&entry, phys_addr, size))
            }
            Err(fault) => Err(self.fault_to_exception(fault)),
        }
    }

    /// Sized, possibly-crosspage guest memory write (spec §4.3, §6
    /// `write_vmem<T>`).
    pub fn write_vmem(&mut self, vaddr: u32, size: u32, value: u64) -> Result<(), ExceptionInfo> {
        if size == 8 && vaddr & 0x3 != 0 {
            return Err(ExceptionInfo::new(crate::exception::ExceptionKind::Alignment, 0));
        }
        let munged = if self.state.little_endian() {
            crate::endian::munge_address(vaddr, size)
        } else {
            vaddr
        };
        if crosses_page(munged, size) {
            for i in 0..size {
                let shift = 8 * (size - 1 - i);
                let byte = ((value >> shift) & 0xFF) as u64;
                self.write_vmem_aligned(munged.wrapping_add(i), 1, byte)?;
            }
            return Ok(());
        }
        self.write_vmem_aligned(munged, size, value)
    }

    fn write_vmem_aligned(&mut self, vaddr: u32, size: u32, value: u64) -> Result<(), ExceptionInfo> {
        match self.mmu.translate(&mut self.state, &mut self.bus, vaddr, false, true) {
            Ok(TranslatedAccess::Host { phys_addr, .. }) => {
                let entry = self.bus.find_range(phys_addr).expect("resolved host region must exist");
                let swap = self.bus.byte_swap_at(&entry);
                self.bus.write(&entry, phys_addr, size, swap_if(swap, size, value));
                Ok(())
            }
            Ok(TranslatedAccess::Mmio { phys_addr, .. }) => {
                let entry = self.bus.find_range(phys_addr).expect("mmio region must exist");
                self.bus.write(&entry, phys_addr, size, value);
                Ok(())
            }
            Err(fault) => Err(self.fault_to_exception(fault)),
        }
    }

    pub fn raise(&mut self, info: ExceptionInfo) -> StepResult {
        exception_handler(&mut self.state, &info);
        StepResult::Exception(info)
    }

    /// A device's `int_pin` assertion (spec §4.5 "External interrupts").
    pub fn assert_int(&mut self) {
        self.pending_interrupt = true;
    }

    /// Polls the latched interrupt pin and the decrementer's 0-to-negative
    /// transition, raising the matching exception if `MSR[EE]` is set
    /// (spec §4.5). Called once per instruction by the interpreter loop.
    pub fn check_pending_interrupts(&mut self) -> Option<StepResult> {
        use crate::processor::msr;
        let ee = self.state.msr & msr::EE != 0;

        let dec = self.state.tb.decrementer_at(self.timers.now_ns());
        let negative = (dec as i32) < 0;
        if negative && self.dec_was_positive {
            // Only clear the latch once the interrupt is actually delivered;
            // with EE clear it must stay pending and re-fire on a later poll
            // instead of being dropped by this transition.
            if ee {
                self.dec_was_positive = false;
                return Some(self.raise(ExceptionInfo::new(crate::exception::ExceptionKind::Decrementer, 0)));
            }
        } else if !negative {
            self.dec_was_positive = true;
        }

        if self.pending_interrupt && ee {
            self.pending_interrupt = false;
            return Some(self.raise(ExceptionInfo::new(crate::exception::ExceptionKind::ExternalInterrupt, 0)));
        }
        None
    }
}

fn crosses_page(vaddr: u32, size: u32) -> bool {
    let end = vaddr.wrapping_add(size - 1);
    (vaddr & !crate::mmu::PPC_PAGE_MASK) != (end & !crate::mmu::PPC_PAGE_MASK)
}

fn swap_if(swap: bool, size: u32, value: u64) -> u64 {
    if !swap || size == 1 {
        value
    } else {
        match size {
            2 => (value as u16).swap_bytes() as u64,
            4 => (value as u32).swap_bytes() as u64,
            8 => value.swap_bytes(),
            _ => value,
        }
    }
}
