//! The memory-mapped device registry and the address map it exposes to the
//! MMU, plus the `Device` trait and `Bus` that stand in for the "device
//! emulation" subsystem spec.md treats as an external collaborator (spec
//! §1). Only the read/write/DMA contracts matter here; this crate does not
//! implement real USB/framebuffer/DBDMA devices, only the trait and a
//! couple of small test doubles used by the integration tests.
//!
//! Grounded on the teacher's `Device`/`Signal`/`Bus` trio in `devices.rs`
//! and `memory.rs`: a linear-scan `DeviceList` of `(range, device)` pairs,
//! a `Signal` enum describing what a write should do to the bus itself
//! (teacher's `Signal::Attach`/`Detach`/`Quit` are kept, since floppy swaps
//! and power-off are still meaningful requests a device can make of the
//! outer emulator).

use crate::error::EmulatorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    Ram,
    Rom,
    Mmio,
}

/// One physical address-space region, as the device subsystem would report
/// it via `find_range` (spec §6). `[start, end]` inclusive.
#[derive(Debug, Clone, Copy)]
pub struct AddressMapEntry {
    pub start: u32,
    pub end: u32,
    pub kind: RegionKind,
    pub writable: bool,
    pub device_index: usize,
}

impl AddressMapEntry {
    pub fn contains(&self, addr: u32) -> bool {
        addr >= self.start && addr <= self.end
    }
    pub fn len(&self) -> u32 {
        self.end - self.start + 1
    }
}

/// What a device's `write` can ask the bus to do in response, beyond
/// mutating its own state. Most devices return `Ok`.
pub enum Signal {
    Ok,
    Quit,
    Attach(Box<dyn Device>),
    Detach,
    NoOp,
}

/// Result of a DMA-mapping request (spec §4.3 "DMA mapping", §6
/// `mem_map_dma`).
pub enum DmaMapping<'a> {
    Host { bytes: &'a mut [u8], writable: bool },
    Device { device_index: usize, base: u32, offset: u32 },
}

pub trait Device {
    /// Physical `[start, end]` ranges this device occupies.
    fn ranges(&self) -> Vec<(u32, u32)>;
    fn read(&mut self, offset: u32, size: u32) -> u64;
    fn write(&mut self, offset: u32, size: u32, value: u64) -> Signal;
    /// Whether accesses to this device must be byte-swapped by the MMU
    /// (spec §4.1 "Memory-controller byte-swap").
    fn byte_swap(&self) -> bool {
        false
    }
    /// What kind of region this device occupies in the address map (spec §4.1
    /// "real-mode direct physical-equals-effective" requires telling RAM/ROM
    /// apart from true MMIO). Defaults to `Mmio`; `Ram`/`Rom` override it.
    fn region_kind(&self) -> RegionKind {
        RegionKind::Mmio
    }
}

/// Plain host-backed RAM, grounded on the teacher's `RAM` device in
/// `memory.rs`.
pub struct Ram {
    base: u32,
    mem: Vec<u8>,
}

impl Ram {
    pub fn new(base: u32, size: usize) -> Result<Self, EmulatorError> {
        if size == 0 {
            return Err(EmulatorError::EmptyRamRegion);
        }
        Ok(Ram { base, mem: vec![0; size] })
    }

    /// Seeds the region with existing contents instead of zero-filling, for
    /// images like NVRAM that must retain their on-disk state across a boot.
    pub fn from_image(base: u32, image: Vec<u8>) -> Result<Self, EmulatorError> {
        if image.is_empty() {
            return Err(EmulatorError::EmptyRamRegion);
        }
        Ok(Ram { base, mem: image })
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.mem
    }
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.mem
    }
    pub fn base(&self) -> u32 {
        self.base
    }
}

impl Device for Ram {
    fn ranges(&self) -> Vec<(u32, u32)> {
        vec![(self.base, self.base + self.mem.len() as u32 - 1)]
    }
    fn read(&mut self, offset: u32, size: u32) -> u64 {
        crate::endian::read_sized(&self.mem[offset as usize..], size, false)
    }
    fn write(&mut self, offset: u32, size: u32, value: u64) -> Signal {
        crate::endian::write_sized(&mut self.mem[offset as usize..], size, value, false);
        Signal::Ok
    }
    fn region_kind(&self) -> RegionKind {
        RegionKind::Ram
    }
}

/// Host-backed ROM. Writes are silently absorbed into a private scratch
/// page rather than mutating the image, the device-level analogue of the
/// TLB's "dummy page" behavior described in spec §4.3.
pub struct Rom {
    base: u32,
    mem: Vec<u8>,
    scratch: Vec<u8>,
}

impl Rom {
    pub fn new(base: u32, image: Vec<u8>) -> Result<Self, EmulatorError> {
        if image.is_empty() {
            return Err(EmulatorError::EmptyRamRegion);
        }
        let scratch = vec![0u8; image.len()];
        Ok(Rom { base, mem: image, scratch })
    }
    pub fn as_slice(&self) -> &[u8] {
        &self.mem
    }
    pub fn base(&self) -> u32 {
        self.base
    }
}

impl Device for Rom {
    fn ranges(&self) -> Vec<(u32, u32)> {
        vec![(self.base, self.base + self.mem.len() as u32 - 1)]
    }
    fn read(&mut self, offset: u32, size: u32) -> u64 {
        crate::endian::read_sized(&self.mem[offset as usize..], size, false)
    }
    fn write(&mut self, offset: u32, size: u32, value: u64) -> Signal {
        crate::endian::write_sized(&mut self.scratch[offset as usize..], size, value, false);
        Signal::Ok
    }
    fn region_kind(&self) -> RegionKind {
        RegionKind::Rom
    }
}

/// A linear-scan device registry, the same shape as the teacher's
/// `Bus { devices: DeviceList }`. Physical-memory space on a 601/603/604/750
/// class machine has only a handful of regions, so a `Vec` scan is the
/// right tool, not a premature interval tree.
pub struct Bus {
    devices: Vec<Box<dyn Device>>,
}

impl Bus {
    pub fn new() -> Self {
        Bus { devices: Vec::new() }
    }

    pub fn attach(&mut self, device: Box<dyn Device>) -> usize {
        self.devices.push(device);
        self.devices.len() - 1
    }

    pub fn device_mut(&mut self, index: usize) -> &mut Box<dyn Device> {
        &mut self.devices[index]
    }

    /// Builds the flattened address map the MMU walks on every miss.
    /// Rebuilt lazily; callers cache it (spec §3 "Address map entry").
    pub fn address_map(&self) -> Vec<AddressMapEntry> {
        let mut map = Vec::new();
        for (index, device) in self.devices.iter().enumerate() {
            for (start, end) in device.ranges() {
                map.push(AddressMapEntry {
                    start,
                    end,
                    kind: device.region_kind(),
                    writable: true,
                    device_index: index,
                });
            }
        }
        map
    }

    pub fn find_range(&self, phys_addr: u32) -> Option<AddressMapEntry> {
        self.address_map().into_iter().find(|e| e.contains(phys_addr))
    }

    pub fn read(&mut self, entry: &AddressMapEntry, phys_addr: u32, size: u32) -> u64 {
        let offset = phys_addr - entry.start;
        self.devices[entry.device_index].read(offset, size)
    }

    pub fn write(&mut self, entry: &AddressMapEntry, phys_addr: u32, size: u32, value: u64) -> Signal {
        let offset = phys_addr - entry.start;
        self.devices[entry.device_index].write(offset, size, value)
    }

    pub fn byte_swap_at(&self, entry: &AddressMapEntry) -> bool {
        self.devices[entry.device_index].byte_swap()
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

/// Stands in for the "Timer manager" external collaborator (spec §1, §6):
/// advances virtual time and answers `get_virt_time_ns`/
/// `force_cycle_counter_reload`. The real timer manager (scheduling
/// one-shot device callbacks) lives outside the core's scope; this is the
/// minimal surface the interpreter loop needs to drive it.
pub struct TimerQueue {
    virt_time_ns: u64,
    next_deadline_ns: Option<u64>,
}

impl TimerQueue {
    pub fn new() -> Self {
        TimerQueue { virt_time_ns: 0, next_deadline_ns: None }
    }

    pub fn now_ns(&self) -> u64 {
        self.virt_time_ns
    }

    pub fn advance(&mut self, delta_ns: u64) {
        self.virt_time_ns += delta_ns;
    }

    pub fn schedule(&mut self, deadline_ns: u64) {
        self.next_deadline_ns = Some(match self.next_deadline_ns {
            Some(d) => d.min(deadline_ns),
            None => deadline_ns,
        });
    }

    /// Returns a cycle budget (arbitrary units the interpreter treats as
    /// an instruction count) until the next scheduled event, matching
    /// `process_events`'s role of handing back `max_cycles`.
    pub fn process_events(&mut self) -> u64 {
        match self.next_deadline_ns.take() {
            Some(deadline) if deadline > self.virt_time_ns => {
                (deadline - self.virt_time_ns).max(1)
            }
            _ => 4096,
        }
    }
}

impl Default for TimerQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ram_round_trips() {
        let mut ram = Ram::new(0x1000, 16).unwrap();
        ram.write(4, 4, 0xCAFEBABE);
        assert_eq!(ram.read(4, 4), 0xCAFEBABE);
    }

    #[test]
    fn rom_writes_are_absorbed() {
        let mut rom = Rom::new(0, vec![0xAA; 16]).unwrap();
        assert_eq!(rom.read(0, 1), 0xAA);
        rom.write(0, 1, 0x55);
        assert_eq!(rom.read(0, 1), 0xAA);
    }

    #[test]
    fn bus_finds_range() {
        let mut bus = Bus::new();
        bus.attach(Box::new(Ram::new(0x1000, 0x100).unwrap()));
        let entry = bus.find_range(0x1050).unwrap();
        assert_eq!(entry.start, 0x1000);
    }
}
