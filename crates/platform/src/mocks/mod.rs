//! Mock implementations for testing
//!
//! [`MockBus`] stands in for both the register bus and the CPU: register
//! writes and sleep instructions land in one journal, so tests can assert
//! that clocks were reprogrammed *before* `WFI` and restored *after* it.
//! [`MockMemory`] stands in for the DDR window.

#![cfg(any(test, feature = "std"))]

use core::cell::RefCell;

use crate::bus::RegisterBus;
use crate::cpu::Cpu;
use crate::ddr::WordMemory;

/// Journal capacity. Large enough for a complete ULP round trip including
/// the per-peripheral clock gating of the misc-power save.
pub const JOURNAL_DEPTH: usize = 2048;

const MAX_REGISTERS: usize = 256;
const MAX_SCRIPTED: usize = 16;
const SCRIPT_DEPTH: usize = 64;
const MAX_LINKS: usize = 16;

#[derive(Debug, Clone, Copy)]
enum Effect {
    Follow,
    Set,
    Clear,
}

/// Status bits driven by writes to another register.
#[derive(Debug, Clone, Copy)]
struct Link {
    trigger: u32,
    field: u32,
    target: u32,
    mask: u32,
    effect: Effect,
}

/// One observable side effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Register write.
    Write {
        /// Absolute register address
        addr: u32,
        /// Value written
        value: u32,
    },
    /// `DSB`
    Dsb,
    /// `WFI`
    Wfi,
    /// `WFE`
    Wfe,
}

/// Mock register bus + CPU.
pub struct MockBus {
    registers: heapless::LinearMap<u32, u32, MAX_REGISTERS>,
    scripted: RefCell<heapless::LinearMap<u32, heapless::Deque<u32, SCRIPT_DEPTH>, MAX_SCRIPTED>>,
    journal: heapless::Vec<Access, JOURNAL_DEPTH>,
    links: heapless::Vec<Link, MAX_LINKS>,
    overflowed: bool,
}

impl MockBus {
    /// Create an empty bus: every register reads as zero.
    pub fn new() -> Self {
        Self {
            registers: heapless::LinearMap::new(),
            scripted: RefCell::new(heapless::LinearMap::new()),
            journal: heapless::Vec::new(),
            links: heapless::Vec::new(),
            overflowed: false,
        }
    }

    /// Set the value a register reads back, without journaling a write.
    pub fn preset(&mut self, addr: u32, value: u32) {
        if self.registers.insert(addr, value).is_err() {
            self.overflowed = true;
        }
    }

    /// Queue values returned by successive reads of `addr`. Once the queue is
    /// drained, reads fall back to the preset / last written value.
    pub fn script_reads(&self, addr: u32, values: &[u32]) {
        let mut scripted = self.scripted.borrow_mut();
        if scripted.get(&addr).is_none() && scripted.insert(addr, heapless::Deque::new()).is_err() {
            return;
        }
        if let Some(queue) = scripted.get_mut(&addr) {
            for &v in values {
                let _ = queue.push_back(v);
            }
        }
    }

    fn add_link(&mut self, trigger: u32, field: u32, target: u32, mask: u32, effect: Effect) {
        let link = Link { trigger, field, target, mask, effect };
        if self.links.push(link).is_err() {
            self.overflowed = true;
        }
    }

    /// After every write to `trigger`, `mask` in `target` is set if the
    /// written value has any bit of `field` set and cleared otherwise.
    /// Models lock flags such as `LOCKA` following `PLLAR.MULA`.
    pub fn follow(&mut self, trigger: u32, field: u32, target: u32, mask: u32) {
        self.add_link(trigger, field, target, mask, Effect::Follow);
    }

    /// Bits written to `trigger` are set in `target` (enable/status
    /// register pairs such as `PCER0`/`PCSR0`).
    pub fn set_on_write(&mut self, trigger: u32, target: u32) {
        self.add_link(trigger, u32::MAX, target, u32::MAX, Effect::Set);
    }

    /// Bits written to `trigger` are cleared in `target`.
    pub fn clear_on_write(&mut self, trigger: u32, target: u32) {
        self.add_link(trigger, u32::MAX, target, u32::MAX, Effect::Clear);
    }

    /// A bus that behaves like an idle SAMA5D2 PMC: oscillators and MCK
    /// report ready, PLL lock flags follow their enable fields, and the
    /// peripheral/system clock status registers track enable and disable
    /// writes.
    pub fn with_pmc_model() -> Self {
        use crate::pmc::{
            CKGR_PLLAR, CKGR_UCKR, PMC_PCDR0, PMC_PCDR1, PMC_PCER0, PMC_PCER1, PMC_PCSR0,
            PMC_PCSR1, PMC_SCDR, PMC_SCER, PMC_SCSR, PMC_SR, SCKC_CR, SCKC_CR_OSCSEL, SR_LOCKA,
            SR_LOCKU, SR_MCKRDY, SR_MOSCRCS, SR_MOSCSELS, SR_MOSCXTS, SR_OSCSELS, UCKR_UPLLEN,
        };

        let mut bus = Self::new();
        bus.preset(PMC_SR, SR_MCKRDY | SR_MOSCXTS | SR_MOSCRCS | SR_MOSCSELS);
        bus.follow(CKGR_PLLAR, 0x7F << 18, PMC_SR, SR_LOCKA);
        bus.follow(CKGR_UCKR, UCKR_UPLLEN, PMC_SR, SR_LOCKU);
        bus.follow(SCKC_CR, SCKC_CR_OSCSEL, PMC_SR, SR_OSCSELS);
        bus.set_on_write(PMC_PCER0, PMC_PCSR0);
        bus.clear_on_write(PMC_PCDR0, PMC_PCSR0);
        bus.set_on_write(PMC_PCER1, PMC_PCSR1);
        bus.clear_on_write(PMC_PCDR1, PMC_PCSR1);
        bus.set_on_write(PMC_SCER, PMC_SCSR);
        bus.clear_on_write(PMC_SCDR, PMC_SCSR);
        bus
    }

    /// Current stored value of a register.
    pub fn value(&self, addr: u32) -> u32 {
        self.registers.get(&addr).copied().unwrap_or(0)
    }

    /// Full journal in program order.
    pub fn journal(&self) -> &[Access] {
        &self.journal
    }

    /// Forget all journaled accesses (register values are kept).
    pub fn clear_journal(&mut self) {
        self.journal.clear();
    }

    /// `true` if the journal or register table ran out of space.
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// Every value written to `addr`, oldest first.
    pub fn writes_to(&self, addr: u32) -> impl Iterator<Item = u32> + '_ {
        self.journal.iter().filter_map(move |a| match *a {
            Access::Write { addr: a, value } if a == addr => Some(value),
            _ => None,
        })
    }

    /// Most recent value written to `addr`.
    pub fn last_write(&self, addr: u32) -> Option<u32> {
        self.writes_to(addr).last()
    }

    /// `true` if `value` was ever written to `addr`.
    pub fn wrote(&self, addr: u32, value: u32) -> bool {
        self.writes_to(addr).any(|v| v == value)
    }

    /// Journal index of the first access matching `pred`.
    pub fn position<F>(&self, pred: F) -> Option<usize>
    where
        F: Fn(&Access) -> bool,
    {
        self.journal.iter().position(pred)
    }

    /// Journal index of the last access matching `pred`.
    pub fn rposition<F>(&self, pred: F) -> Option<usize>
    where
        F: Fn(&Access) -> bool,
    {
        self.journal.iter().rposition(pred)
    }

    /// Journal index of the first write to `addr`.
    pub fn first_write(&self, addr: u32) -> Option<usize> {
        self.position(|a| matches!(a, Access::Write { addr: w, .. } if *w == addr))
    }

    /// Journal index of the last write to `addr`.
    pub fn last_write_index(&self, addr: u32) -> Option<usize> {
        self.rposition(|a| matches!(a, Access::Write { addr: w, .. } if *w == addr))
    }

    fn record(&mut self, access: Access) {
        if self.journal.push(access).is_err() {
            self.overflowed = true;
        }
    }
}

impl Default for MockBus {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterBus for MockBus {
    fn read(&self, addr: u32) -> u32 {
        if let Some(queue) = self.scripted.borrow_mut().get_mut(&addr) {
            if let Some(v) = queue.pop_front() {
                return v;
            }
        }
        self.value(addr)
    }

    fn write(&mut self, addr: u32, value: u32) {
        self.preset(addr, value);
        self.record(Access::Write { addr, value });
        let links = self.links.clone();
        for link in links.iter().filter(|l| l.trigger == addr) {
            let current = self.value(link.target);
            let next = match link.effect {
                Effect::Follow if value & link.field != 0 => current | link.mask,
                Effect::Follow => current & !link.mask,
                Effect::Set => current | (value & link.mask),
                Effect::Clear => current & !(value & link.mask),
            };
            self.preset(link.target, next);
        }
    }
}

impl Cpu for MockBus {
    fn data_sync_barrier(&mut self) {
        self.record(Access::Dsb);
    }

    fn wait_for_interrupt(&mut self) {
        self.record(Access::Wfi);
    }

    fn wait_for_event(&mut self) {
        self.record(Access::Wfe);
    }
}

/// Word-addressed memory backed by a fixed array.
pub struct MockMemory<const N: usize> {
    words: [u32; N],
    /// Word index whose reads are corrupted by XOR-ing `corrupt_mask`.
    pub corrupt_index: Option<usize>,
    /// Bits flipped on reads of `corrupt_index`.
    pub corrupt_mask: u32,
}

impl<const N: usize> MockMemory<N> {
    /// Zero-filled memory.
    pub fn new() -> Self {
        Self {
            words: [0; N],
            corrupt_index: None,
            corrupt_mask: 0,
        }
    }
}

impl<const N: usize> Default for MockMemory<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> WordMemory for MockMemory<N> {
    fn base_address(&self) -> u32 {
        crate::config::DDR_CS_ADDR
    }

    fn len_words(&self) -> usize {
        N
    }

    fn write_word(&mut self, index: usize, value: u32) {
        if let Some(w) = self.words.get_mut(index) {
            *w = value;
        }
    }

    fn read_word(&self, index: usize) -> u32 {
        let raw = self.words.get(index).copied().unwrap_or(0);
        if self.corrupt_index == Some(index) {
            raw ^ self.corrupt_mask
        } else {
            raw
        }
    }
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_bus_journals_writes_and_sleeps() {
        let mut bus = MockBus::new();
        bus.write(0x10, 1);
        bus.wait_for_interrupt();
        bus.write(0x10, 2);

        assert_eq!(bus.journal().len(), 3);
        assert_eq!(bus.journal()[1], Access::Wfi);
        assert_eq!(bus.last_write(0x10), Some(2));
        assert_eq!(bus.value(0x10), 2);
        assert!(!bus.overflowed());
    }

    #[test]
    fn test_scripted_reads_fall_back_to_value() {
        let mut bus = MockBus::new();
        bus.preset(0x20, 7);
        bus.script_reads(0x20, &[1, 2]);
        assert_eq!(bus.read(0x20), 1);
        assert_eq!(bus.read(0x20), 2);
        assert_eq!(bus.read(0x20), 7);
    }

    #[test]
    fn test_link_drives_status_bit() {
        let mut bus = MockBus::new();
        bus.preset(0x68, 0x8);
        bus.follow(0x28, 0x7F << 18, 0x68, 0x2);
        bus.write(0x28, 82 << 18);
        assert_eq!(bus.value(0x68), 0xA);
        bus.write(0x28, 1 << 29);
        assert_eq!(bus.value(0x68), 0x8);
        assert_eq!(bus.journal().len(), 2);
    }

    #[test]
    fn test_enable_disable_pair() {
        let mut bus = MockBus::new();
        bus.set_on_write(0x10, 0x18);
        bus.clear_on_write(0x14, 0x18);
        bus.write(0x10, (1 << 13) | 1);
        assert_eq!(bus.value(0x18), (1 << 13) | 1);
        bus.write(0x14, 1);
        assert_eq!(bus.value(0x18), 1 << 13);
    }

    #[test]
    fn test_mock_memory_corruption() {
        let mut mem: MockMemory<4> = MockMemory::new();
        mem.write_word(2, 0xAA);
        mem.corrupt_index = Some(2);
        mem.corrupt_mask = 0x01;
        assert_eq!(mem.read_word(2), 0xAB);
        assert_eq!(mem.read_word(9), 0);
    }
}
