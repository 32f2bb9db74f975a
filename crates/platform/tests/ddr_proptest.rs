//! Property-based tests for DDR timing conversion and the pattern check.

// Integration test file -- intentional test patterns permitted.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
)]

use platform::ddr::{
    check_pattern, pattern_word, write_pattern, DdrConfig, DdrTiming, WordMemory,
};
use proptest::prelude::*;

/// Plain vector-backed memory.
struct VecMemory {
    words: Vec<u32>,
}

impl WordMemory for VecMemory {
    fn base_address(&self) -> u32 {
        0x2000_0000
    }

    fn len_words(&self) -> usize {
        self.words.len()
    }

    fn write_word(&mut self, index: usize, value: u32) {
        if let Some(w) = self.words.get_mut(index) {
            *w = value;
        }
    }

    fn read_word(&self, index: usize) -> u32 {
        self.words.get(index).copied().unwrap_or(0)
    }
}

proptest! {
    /// Converted cycles always cover at least the requested time.
    #[test]
    fn cycles_never_shorter_than_ns(ns in 0u32..100_000, mck in 1_000_000u32..=166_000_000) {
        let cycles = DdrTiming::ns_to_cycles(ns, mck);
        let covered = u64::from(cycles) * 1_000_000_000;
        prop_assert!(covered >= u64::from(ns) * u64::from(mck));
        // ... and by less than one extra cycle.
        prop_assert!(covered < u64::from(ns) * u64::from(mck) + 1_000_000_000);
    }

    /// A longer interval never needs fewer cycles.
    #[test]
    fn cycles_monotone_in_ns(a in 0u32..100_000, b in 0u32..100_000, mck in 1_000_000u32..=166_000_000) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(DdrTiming::ns_to_cycles(lo, mck) <= DdrTiming::ns_to_cycles(hi, mck));
    }

    /// The refresh count fits the 12-bit `RTR.COUNT` field.
    #[test]
    fn refresh_count_fits_field(mck in 0u32..=u32::MAX, rows in 0u32..=65_536) {
        prop_assert!(DdrConfig::refresh_count_for(mck, 64, rows) <= 0xFFF);
    }

    /// A single flipped word is always found and reported at its byte
    /// address.
    #[test]
    fn pattern_check_finds_single_corruption(len in 1usize..512, pick in any::<usize>(), flip in 1u32..) {
        let mut mem = VecMemory { words: vec![0; len] };
        write_pattern(&mut mem);
        let index = pick % len;
        mem.words[index] ^= flip;

        let report = check_pattern(&mem);
        prop_assert_eq!(report.checked, len);
        prop_assert_eq!(report.mismatches, 1);
        let m = report.first[0];
        prop_assert_eq!(m.expected, pattern_word(index));
        prop_assert_eq!(m.read, pattern_word(index) ^ flip);
        prop_assert_eq!(m.address, 0x2000_0000 + 4 * u32::try_from(index).unwrap());
    }
}

#[test]
fn report_keeps_only_the_first_mismatches() {
    let mut mem = VecMemory { words: vec![0xFFFF_FFFF; 64] };
    let report = check_pattern(&mem);
    assert_eq!(report.mismatches, 64);
    assert_eq!(report.first.len(), report.first.capacity());
    assert_eq!(report.first[0].address, 0x2000_0000);

    write_pattern(&mut mem);
    assert!(check_pattern(&mem).is_ok());
}

#[test]
fn board_preset_converts_at_run_clock() {
    let cfg = DdrConfig::mt41k128m16_x2(166_000_000).unwrap();
    assert_eq!(cfg.refresh_count, 1296);
    assert_eq!(cfg.geometry.size_bytes(), 512 * 1024 * 1024);
}
