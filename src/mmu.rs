//! BAT + PAT translation, the software two-level TLB, and DMA mapping.
//!
//! Grounded on `original_source/cpu/ppc/ppcmmu.h` (struct shapes:
//! `PPC_BAT_entry`, `TLBEntry`, `BATResult`, `PATResult`) and
//! `ppcmmu.cpp` (`ppc_block_address_translation`, `mpc601_block_address_translation`,
//! `calc_pteg_addr`, `search_pteg`, `page_address_translation`,
//! `tlb2_target_entry`, `dtlb2_refill`/`itlb2_refill`, `mmu_map_dma_mem`).

use crate::devices::{Bus, RegionKind};
use crate::error::EmulatorError;
use crate::processor::{spr, ProcessorState};

pub const PPC_PAGE_SIZE_BITS: u32 = 12;
pub const PPC_PAGE_SIZE: u32 = 1 << PPC_PAGE_SIZE_BITS;
pub const PPC_PAGE_MASK: u32 = PPC_PAGE_SIZE - 1;

pub const TLB_SIZE: usize = 4096;
pub const TLB2_WAYS: usize = 4;
pub const TLB_INVALID_TAG: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmuMode {
    RealAddressing = 0,
    SupervisorTranslated = 1,
    UserTranslated = 2,
}

impl MmuMode {
    pub fn select(ir_or_dr: bool, pr: bool) -> Self {
        if !ir_or_dr {
            MmuMode::RealAddressing
        } else if pr {
            MmuMode::UserTranslated
        } else {
            MmuMode::SupervisorTranslated
        }
    }
}

/// A tiny hand-rolled bitflags macro: the crate does not depend on the
/// `bitflags` crate (not present in any pack Cargo.toml), so flag sets are
/// expressed as plain associated `const`s on a newtype `u16`, the same
/// spirit as the teacher's own hand-written bit helpers (`set_bit`/`get_bit`
/// in `processor.rs`).
macro_rules! bitflags_like {
    (
        $(#[$meta:meta])*
        pub struct $name:ident: $ty:ty {
            $(const $variant:ident = $value:expr;)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct $name(pub $ty);
        impl $name {
            $(pub const $variant: $name = $name($value);)*
            pub fn contains(self, other: $name) -> bool {
                self.0 & other.0 == other.0
            }
        }
        impl std::ops::BitOr for $name {
            type Output = $name;
            fn bitor(self, rhs: $name) -> $name {
                $name(self.0 | rhs.0)
            }
        }
        impl std::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: $name) {
                self.0 |= rhs.0;
            }
        }
    };
}

bitflags_like! {
    /// TLB entry flag bits (spec §3 "TLB entry").
    pub struct TlbFlags: u16 {
        const PAGE_MEM = 1 << 0;
        const PAGE_IO = 1 << 1;
        const PAGE_NOPHYS = 1 << 2;
        const FROM_BAT = 1 << 3;
        const FROM_PAT = 1 << 4;
        const WRITABLE = 1 << 5;
        const PTE_C_SET = 1 << 6;
    }
}

/// Host- or device-backed payload a TLB entry resolves to.
#[derive(Debug, Clone, Copy)]
pub enum TlbBacking {
    /// Offsets such that `host_index + (guest_va & PAGE_MASK)` addresses
    /// the backing `Vec<u8>` the MMU keeps per RAM/ROM region. Two offsets
    /// so ROM writes redirect into a shared dummy page (spec §4.3).
    Host { region: usize, write_region: usize },
    Mmio { device_index: usize, device_base: u32 },
}

#[derive(Debug, Clone, Copy)]
pub struct TlbEntry {
    pub tag: u32,
    pub flags: TlbFlags,
    pub lru_bits: u8,
    pub backing: TlbBacking,
    pub phys_tag: u32,
}

impl TlbEntry {
    pub fn invalid() -> Self {
        TlbEntry {
            tag: TLB_INVALID_TAG,
            flags: TlbFlags::default(),
            lru_bits: 0,
            backing: TlbBacking::Mmio { device_index: 0, device_base: 0 },
            phys_tag: 0,
        }
    }
}

/// One primary (direct-mapped) + secondary (4-way) TLB pair, for either the
/// instruction or data side of a single MMU mode.
pub struct TlbPair {
    pub primary: Vec<TlbEntry>,
    pub secondary: Vec<[TlbEntry; TLB2_WAYS]>,
}

impl TlbPair {
    fn new() -> Self {
        TlbPair {
            primary: vec![TlbEntry::invalid(); TLB_SIZE],
            secondary: vec![[TlbEntry::invalid(); TLB2_WAYS]; TLB_SIZE],
        }
    }

    fn flush_all(&mut self) {
        for e in self.primary.iter_mut() {
            *e = TlbEntry::invalid();
        }
        for set in self.secondary.iter_mut() {
            for e in set.iter_mut() {
                *e = TlbEntry::invalid();
            }
        }
    }

    /// Flushes only entries tagged as BAT- or PAT-origin, per spec §4.3
    /// "BAT-origin and PAT-origin entries are tagged separately".
    fn flush_origin(&mut self, origin: TlbFlags) {
        for e in self.primary.iter_mut() {
            if e.flags.contains(origin) {
                *e = TlbEntry::invalid();
            }
        }
        for set in self.secondary.iter_mut() {
            for e in set.iter_mut() {
                if e.flags.contains(origin) {
                    *e = TlbEntry::invalid();
                }
            }
        }
    }
}

/// Tree-hLRU state lives in `lru_bits` of each way's entry; see
/// `secondary_target_way`.
fn secondary_target_way(set: &[TlbEntry; TLB2_WAYS]) -> usize {
    if let Some(i) = set.iter().position(|e| e.tag == TLB_INVALID_TAG) {
        return i;
    }
    // 2 bits per way; MRU way writes 0b11/0b10, LRU pair's low bit cleared.
    // Replacement target is the way whose MRU bit (bit 1) is 0.
    set.iter()
        .position(|e| e.lru_bits & 0b10 == 0)
        .unwrap_or(0)
}

fn touch_lru(set: &mut [TlbEntry; TLB2_WAYS], way: usize) {
    set[way].lru_bits |= 0b10;
    for (i, e) in set.iter_mut().enumerate() {
        if i != way {
            e.lru_bits &= !0b10;
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BatEntry {
    pub valid: bool,
    pub bepi: u32,
    pub block_mask: u32,
    pub pp: u8,
    pub brpn: u32,
    pub vs: bool,
    pub vp: bool,
}

impl BatEntry {
    /// Decodes a BATxU/BATxL register pair (non-601 encoding).
    pub fn from_regs(upper: u32, lower: u32) -> Self {
        let bepi = upper & 0xFFFE_0000;
        let bl = (upper >> 2) & 0x7FF;
        let block_mask = bl << 17 | 0x1_FFFF; // low bits of the block are "don't care"
        let vs = upper & 0b10 != 0;
        let vp = upper & 0b01 != 0;
        let brpn = lower & 0xFFFE_0000;
        let pp = (lower & 0b11) as u8;
        BatEntry { valid: vs || vp, bepi, block_mask, pp, brpn, vs, vp }
    }

    fn matches(&self, ea: u32, is_user: bool) -> bool {
        if !self.valid {
            return false;
        }
        if is_user && !self.vp {
            return false;
        }
        if !is_user && !self.vs {
            return false;
        }
        (ea & !self.block_mask) == self.bepi
    }

    fn translate(&self, ea: u32) -> u32 {
        self.brpn | (ea & self.block_mask)
    }
}

pub struct BatResult {
    pub phys_addr: u32,
    pub pp: u8,
}

impl BatResult {
    /// PP=10 is the only read/write encoding; PP=01/11 are read-only and
    /// PP=00 is no access at all (checked separately in `refill`).
    fn writable(&self) -> bool {
        self.pp == 0b10
    }
}

pub struct PageTableContext {
    pub sdr1: u32,
    pub last_ptab_area: Option<(u32, u32)>,
}

pub struct Mmu {
    pub ibat: [BatEntry; 4],
    pub dbat: [BatEntry; 4],
    pub itlb: [TlbPair; 3],
    pub dtlb: [TlbPair; 3],
    pub current_mode_i: MmuMode,
    pub current_mode_d: MmuMode,
    pub ptab: PageTableContext,
}

impl Mmu {
    pub fn new() -> Self {
        Mmu {
            ibat: [BatEntry::default(); 4],
            dbat: [BatEntry::default(); 4],
            itlb: [TlbPair::new(), TlbPair::new(), TlbPair::new()],
            dtlb: [TlbPair::new(), TlbPair::new(), TlbPair::new()],
            current_mode_i: MmuMode::RealAddressing,
            current_mode_d: MmuMode::RealAddressing,
            ptab: PageTableContext { sdr1: 0, last_ptab_area: None },
        }
    }

    /// Re-seats `current_mode_{i,d}` on an MSR[IR]/MSR[DR]/MSR[PR] change.
    /// Mode switches never flush (spec §3 invariant): the table pointer is
    /// simply re-pointed to the per-mode array.
    pub fn mmu_change_mode(&mut self, msr: u32) {
        use crate::processor::msr;
        let pr = msr & msr::PR != 0;
        self.current_mode_i = MmuMode::select(msr & msr::IR != 0, pr);
        self.current_mode_d = MmuMode::select(msr & msr::DR != 0, pr);
    }

    pub fn update_ibat(&mut self, index: usize, upper: u32, lower: u32) {
        self.ibat[index] = BatEntry::from_regs(upper, lower);
    }
    pub fn update_dbat(&mut self, index: usize, upper: u32, lower: u32) {
        self.dbat[index] = BatEntry::from_regs(upper, lower);
    }

    pub fn tlb_flush_bat_entries(&mut self) {
        for t in self.itlb.iter_mut().chain(self.dtlb.iter_mut()) {
            t.flush_origin(TlbFlags::FROM_BAT);
        }
    }
    pub fn tlb_flush_pat_entries(&mut self) {
        for t in self.itlb.iter_mut().chain(self.dtlb.iter_mut()) {
            t.flush_origin(TlbFlags::FROM_PAT);
        }
    }
    pub fn tlbia(&mut self) {
        for t in self.itlb.iter_mut().chain(self.dtlb.iter_mut()) {
            t.flush_all();
        }
    }
    /// `tlbie`: the simple implementation flushes everything, per spec §4.3
    /// ("the correct granular path is available but conservatively
    /// disabled") and spec §9's explicit "do not guess" about the granular
    /// path — this crate does not attempt it.
    pub fn tlbie(&mut self, _ea: u32) {
        self.tlbia();
    }

    /// BAT translation for either side. 601 unifies IBAT/DBAT and ignores
    /// the side distinction (spec §3 "601 interprets BAT encoding
    /// differently"); non-601 models use the side-specific array.
    fn bat_lookup(&self, is_601: bool, is_instr: bool, ea: u32, is_user: bool) -> Option<BatResult> {
        let table: &[BatEntry; 4] = if is_601 || is_instr { &self.ibat } else { &self.dbat };
        for bat in table {
            if bat.matches(ea, is_user) {
                return Some(BatResult { phys_addr: bat.translate(ea), pp: bat.pp });
            }
        }
        None
    }

    /// Hashed page-table walk (spec §4.3 "Page address translation").
    /// Simplified relative to the original's exact PTEG scan but preserves
    /// the documented contract: VSID from the segment register, a
    /// primary/secondary hash, 8 PTEs per PTEG, R/C bit maintenance.
    fn page_table_lookup(
        &mut self,
        state: &mut ProcessorState,
        bus: &mut Bus,
        ea: u32,
        is_instr: bool,
        is_write: bool,
        is_user: bool,
    ) -> Result<Option<PatResult>, MmuFault> {
        let sr = state.sr[(ea >> 28) as usize & 0xF];
        if sr & 0x8000_0000 != 0 {
            return Ok(None); // direct-store segment: not modeled, treated as a miss
        }
        if is_instr && sr & 0x1000_0000 != 0 {
            return Err(MmuFault::protection(is_instr, ea)); // no-execute segment
        }
        let vsid = sr & 0x00FF_FFFF;
        let page_index = (ea >> 12) & 0xFFFF;
        let api = (page_index >> 10) & 0x3F;

        let sdr1 = state.spr[spr::SDR1];
        let htaborg = sdr1 & 0xFFFF_0000;
        let htabmask = sdr1 & 0x1FF;

        let hash1 = (vsid ^ page_index) & (htabmask << 10 | 0x3FF);
        let pteg1 = htaborg | (hash1 << 6);
        let hash2 = (!hash1) & (htabmask << 10 | 0x3FF);
        let pteg2 = htaborg | (hash2 << 6);

        for (pteg_addr, hash_bit) in [(pteg1, 0u32), (pteg2, 1u32)] {
            if let Some((pte_addr, pte1, pte2)) =
                self.search_pteg(bus, pteg_addr, vsid, api, hash_bit)
            {
                let pp = pte2 & 0b11;
                let key = Self::access_key(sr, is_user);
                if key == 1 && pp == 0b00 {
                    return Err(MmuFault::protection(is_instr, ea));
                }
                let writable = pp != 0b11 && !(key == 1 && pp == 0b01);
                if is_write && !writable {
                    return Err(MmuFault::protection(is_instr, ea));
                }
                let phys = (pte2 & 0xFFFF_F000) | (ea & 0xFFF);
                self.set_pte_rc(bus, pte_addr, is_write);
                return Ok(Some(PatResult { phys_addr: phys, writable }));
            }
        }
        Ok(None)
    }

    fn access_key(sr: u32, is_user: bool) -> u32 {
        let ks = (sr >> 30) & 1;
        let kp = (sr >> 29) & 1;
        if is_user {
            kp
        } else {
            ks
        }
    }

    /// Scans one 8-PTE PTEG for a match. Returns the matching PTE's
    /// physical address (for R/C writeback) and its two 32-bit words.
    fn search_pteg(
        &self,
        bus: &mut Bus,
        pteg_addr: u32,
        vsid: u32,
        api: u32,
        hash_bit: u32,
    ) -> Option<(u32, u32, u32)> {
        for slot in 0..8 {
            let addr = pteg_addr + slot * 8;
            let entry = self.find_region(bus, addr)?;
            let word0 = bus.read(&entry, addr, 4) as u32;
            if word0 & 0x8000_0000 == 0 {
                continue; // not valid
            }
            let pte_vsid = (word0 >> 7) & 0x00FF_FFFF;
            let pte_h = (word0 >> 6) & 1;
            let pte_api = word0 & 0x3F;
            if pte_vsid == vsid && pte_h == hash_bit && pte_api == api {
                let entry2 = self.find_region(bus, addr + 4)?;
                let word1 = bus.read(&entry2, addr + 4, 4) as u32;
                return Some((addr, word0, word1));
            }
        }
        None
    }

    fn set_pte_rc(&self, bus: &mut Bus, pte_addr: u32, is_write: bool) {
        if let Some(entry) = self.find_region(bus, pte_addr + 4) {
            let mut word1 = bus.read(&entry, pte_addr + 4, 4) as u32;
            word1 |= 1 << 8; // R bit
            if is_write {
                word1 |= 1 << 7; // C bit
            }
            bus.write(&entry, pte_addr + 4, 4, word1 as u64);
        }
    }

    fn find_region(&self, bus: &Bus, phys_addr: u32) -> Option<crate::devices::AddressMapEntry> {
        bus.find_range(phys_addr)
    }

    /// Full translate-with-caching path for one access. Mirrors
    /// `mmu_translate_imem`/the `dtlb2_refill` family: primary miss
    /// consults secondary; secondary miss walks BAT then PAT and refills
    /// both levels.
    #[allow(clippy::too_many_arguments)]
    pub fn translate(
        &mut self,
        state: &mut ProcessorState,
        bus: &mut Bus,
        ea: u32,
        is_instr: bool,
        is_write: bool,
    ) -> Result<TranslatedAccess, MmuFault> {
        use crate::processor::msr;
        let translation_on = if is_instr {
            state.msr & msr::IR != 0
        } else {
            state.msr & msr::DR != 0
        };
        let is_user = state.msr & msr::PR != 0;

        if !translation_on {
            return self.resolve_physical(bus, ea, ea, true, TlbFlags::default());
        }

        let tag = ea >> PPC_PAGE_SIZE_BITS;
        let mode = if is_instr { self.current_mode_i } else { self.current_mode_d };
        let mode_idx = mode as usize;

        // Primary (direct-mapped) lookup.
        {
            let tlb = if is_instr { &self.itlb[mode_idx] } else { &self.dtlb[mode_idx] };
            let primary_index = (tag as usize) % TLB_SIZE;
            let e = tlb.primary[primary_index];
            if e.tag == tag {
                return self.resolve_from_entry(bus, ea, &e, is_instr, is_write);
            }
        }

        // Secondary (4-way) lookup.
        let set_index = (tag as usize) % TLB_SIZE;
        {
            let tlb = if is_instr { &self.itlb[mode_idx] } else { &self.dtlb[mode_idx] };
            let set = tlb.secondary[set_index];
            if let Some(way) = set.iter().position(|e| e.tag == tag) {
                let entry = set[way];
                let result = self.resolve_from_entry(bus, ea, &entry, is_instr, is_write);
                let tlb_mut = if is_instr { &mut self.itlb[mode_idx] } else { &mut self.dtlb[mode_idx] };
                touch_lru(&mut tlb_mut.secondary[set_index], way);
                tlb_mut.primary[(tag as usize) % TLB_SIZE] = entry;
                return result;
            }
        }

        // Full miss: BAT then PAT walk, refill both levels.
        let refilled = self.refill(state, bus, ea, tag, is_instr, is_write, is_user)?;
        let tlb_mut = if is_instr { &mut self.itlb[mode_idx] } else { &mut self.dtlb[mode_idx] };
        let way = secondary_target_way(&tlb_mut.secondary[set_index]);
        tlb_mut.secondary[set_index][way] = refilled;
        touch_lru(&mut tlb_mut.secondary[set_index], way);
        tlb_mut.primary[(tag as usize) % TLB_SIZE] = refilled;
        self.resolve_from_entry(bus, ea, &refilled, is_instr, is_write)
    }

    fn refill(
        &mut self,
        state: &mut ProcessorState,
        bus: &mut Bus,
        ea: u32,
        tag: u32,
        is_instr: bool,
        is_write: bool,
        is_user: bool,
    ) -> Result<TlbEntry, MmuFault> {
        if let Some(bat) = self.bat_lookup(state.model.is_601, is_instr, ea, is_user) {
            if bat.pp == 0b00 {
                return Err(MmuFault::protection(is_instr, ea));
            }
            let writable = bat.writable();
            if is_write && !writable {
                return Err(MmuFault::protection(is_instr, ea));
            }
            let entry = self.build_entry(bus, tag, bat.phys_addr, writable, TlbFlags::FROM_BAT)?;
            return Ok(entry);
        }
        match self.page_table_lookup(state, bus, ea, is_instr, is_write, is_user)? {
            Some(pat) => {
                if is_write && !pat.writable {
                    return Err(MmuFault::protection(is_instr, ea));
                }
                self.build_entry(bus, tag, pat.phys_addr, pat.writable, TlbFlags::FROM_PAT)
            }
            None => Err(MmuFault::miss(is_instr, is_write, ea)),
        }
    }

    fn build_entry(
        &self,
        bus: &Bus,
        tag: u32,
        phys_base: u32,
        writable: bool,
        origin: TlbFlags,
    ) -> Result<TlbEntry, MmuFault> {
        let phys_page = phys_base & !PPC_PAGE_MASK;
        let entry = bus
            .find_range(phys_page)
            .ok_or(MmuFault::NoPhysicalBacking(phys_page))?;
        let mut flags = origin;
        if writable {
            flags |= TlbFlags::WRITABLE;
        }
        let backing = match entry.kind {
            RegionKind::Rom => {
                flags |= TlbFlags::PAGE_MEM;
                TlbBacking::Host { region: entry.device_index, write_region: entry.device_index }
            }
            RegionKind::Ram => {
                flags |= TlbFlags::PAGE_MEM;
                TlbBacking::Host { region: entry.device_index, write_region: entry.device_index }
            }
            RegionKind::Mmio => {
                flags |= TlbFlags::PAGE_IO;
                TlbBacking::Mmio { device_index: entry.device_index, device_base: entry.start }
            }
        };
        Ok(TlbEntry { tag, flags, lru_bits: 0, backing, phys_tag: phys_page >> PPC_PAGE_SIZE_BITS })
    }

    /// Re-checks `TlbFlags::WRITABLE` on every cached hit, not just the
    /// initial `refill()` (spec §4.3: a TLB entry's protection is rechecked
    /// on each use, since a single entry serves every subsequent access
    /// until explicitly flushed).
    fn resolve_from_entry(
        &self,
        bus: &mut Bus,
        ea: u32,
        entry: &TlbEntry,
        is_instr: bool,
        is_write: bool,
    ) -> Result<TranslatedAccess, MmuFault> {
        if is_write && !entry.flags.contains(TlbFlags::WRITABLE) {
            return Err(MmuFault::protection(is_instr, ea));
        }
        match entry.backing {
            TlbBacking::Host { region, .. } => {
                let base = entry.phys_tag << PPC_PAGE_SIZE_BITS;
                let phys_addr = base | (ea & PPC_PAGE_MASK);
                let _ = bus;
                Ok(TranslatedAccess::Host { phys_addr, region, writable: entry.flags.contains(TlbFlags::WRITABLE) })
            }
            TlbBacking::Mmio { device_index, device_base } => Ok(TranslatedAccess::Mmio {
                device_index,
                phys_addr: device_base + (ea & PPC_PAGE_MASK),
            }),
        }
    }

    fn resolve_physical(
        &self,
        bus: &Bus,
        _ea: u32,
        phys_addr: u32,
        writable: bool,
        _flags: TlbFlags,
    ) -> Result<TranslatedAccess, MmuFault> {
        let entry = bus
            .find_range(phys_addr & !PPC_PAGE_MASK)
            .ok_or(MmuFault::NoPhysicalBacking(phys_addr))?;
        match entry.kind {
            RegionKind::Mmio => Ok(TranslatedAccess::Mmio { device_index: entry.device_index, phys_addr }),
            _ => Ok(TranslatedAccess::Host { phys_addr, region: entry.device_index, writable }),
        }
    }

    /// DMA mapping for device-initiated accesses (spec §4.3 "DMA
    /// mapping", §6 `mem_map_dma`). Crossing into an incompatible region
    /// is fatal, per spec.
    pub fn map_dma(
        &self,
        bus: &Bus,
        phys_addr: u32,
        len: u32,
        allow_mmio: bool,
    ) -> Result<TranslatedAccess, EmulatorError> {
        let entry = bus
            .find_range(phys_addr)
            .ok_or(EmulatorError::UnmappedPhysicalAddress(phys_addr))?;
        if entry.kind == RegionKind::Mmio && !allow_mmio {
            return Err(EmulatorError::DmaRegionMismatch { phys_addr, len });
        }
        if phys_addr + len.saturating_sub(1) > entry.end {
            let next = bus.find_range(entry.end + 1);
            match next {
                Some(n) if n.kind == entry.kind => {}
                _ => return Err(EmulatorError::DmaRegionMismatch { phys_addr, len }),
            }
        }
        match entry.kind {
            RegionKind::Mmio => Ok(TranslatedAccess::Mmio { device_index: entry.device_index, phys_addr }),
            _ => Ok(TranslatedAccess::Host { phys_addr, region: entry.device_index, writable: entry.writable }),
        }
    }
}

impl Default for Mmu {
    fn default() -> Self {
        Self::new()
    }
}

pub struct PatResult {
    pub phys_addr: u32,
    pub writable: bool,
}

pub enum TranslatedAccess {
    Host { phys_addr: u32, region: usize, writable: bool },
    Mmio { device_index: usize, phys_addr: u32 },
}

#[derive(Debug, Clone, Copy)]
pub enum MmuFault {
    /// Instruction-side miss/protection violation -> ISI.
    Isi { srr1_bit: u32, ea: u32 },
    /// Data-side miss/protection violation -> DSI.
    Dsi { dsisr_bit: u32, ea: u32, is_write: bool },
    NoPhysicalBacking(u32),
}

impl MmuFault {
    fn protection(is_instr: bool, ea: u32) -> Self {
        if is_instr {
            MmuFault::Isi { srr1_bit: 1 << 3, ea }
        } else {
            MmuFault::Dsi { dsisr_bit: 1 << 3, ea, is_write: false }
        }
    }
    fn miss(is_instr: bool, is_write: bool, ea: u32) -> Self {
        if is_instr {
            MmuFault::Isi { srr1_bit: 1 << 1, ea }
        } else {
            MmuFault::Dsi { dsisr_bit: 1 << 1, ea, is_write }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bat_block_compare() {
        // Map [0x8000_0000, 0x8000_FFFF] -> [0x0010_0000, 0x0010_FFFF], PP=10.
        let upper = 0x8000_0000 | (0x7 << 2) | 0b10;
        let lower = 0x0010_0000 | 0b10;
        let bat = BatEntry::from_regs(upper, lower);
        assert!(bat.matches(0x8000_0100, false));
        assert_eq!(bat.translate(0x8000_0100), 0x0010_0100);
    }

    #[test]
    fn secondary_lru_picks_invalid_first() {
        let set = [TlbEntry::invalid(); TLB2_WAYS];
        assert_eq!(secondary_target_way(&set), 0);
    }
}
