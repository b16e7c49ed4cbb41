// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Lock-free per-voxel "requested" flags.
//!
//! One bit per voxel packed into `AtomicU64` words. Claiming is an atomic
//! test-and-set, so two sessions racing for the same voxel cannot both win.

use std::sync::atomic::{AtomicU64, Ordering};

pub struct ClaimTable {
    words: Vec<AtomicU64>,
    len: usize,
}

impl ClaimTable {
    pub fn new(len: usize) -> Self {
        let words = (0..len.div_ceil(64)).map(|_| AtomicU64::new(0)).collect();
        Self { words, len }
    }

    #[inline]
    fn locate(&self, index: usize) -> Option<(&AtomicU64, u64)> {
        if index >= self.len {
            return None;
        }
        Some((&self.words[index / 64], 1u64 << (index % 64)))
    }

    /// Set the flag. Returns `true` only for the caller that flipped it from clear.
    #[inline]
    pub fn try_claim(&self, index: usize) -> bool {
        match self.locate(index) {
            Some((word, mask)) => word.fetch_or(mask, Ordering::AcqRel) & mask == 0,
            None => false,
        }
    }

    #[inline]
    pub fn release(&self, index: usize) {
        if let Some((word, mask)) = self.locate(index) {
            word.fetch_and(!mask, Ordering::AcqRel);
        }
    }

    #[inline]
    pub fn is_claimed(&self, index: usize) -> bool {
        self.locate(index)
            .map_or(false, |(word, mask)| word.load(Ordering::Acquire) & mask != 0)
    }

    /// Number of flags currently set.
    pub fn claimed_count(&self) -> usize {
        self.words
            .iter()
            .map(|w| w.load(Ordering::Relaxed).count_ones() as usize)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_claim_release_cycle() {
        let table = ClaimTable::new(130);
        assert!(table.try_claim(129));
        assert!(!table.try_claim(129));
        assert!(table.is_claimed(129));
        assert_eq!(table.claimed_count(), 1);
        table.release(129);
        assert!(!table.is_claimed(129));
        assert!(table.try_claim(129));
        assert!(!table.try_claim(130), "out of range never claims");
    }

    #[test]
    fn test_concurrent_claims_have_single_winner() {
        let table = Arc::new(ClaimTable::new(1024));
        let wins = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let table = Arc::clone(&table);
                let wins = Arc::clone(&wins);
                thread::spawn(move || {
                    for i in 0..1024 {
                        if table.try_claim(i) {
                            wins.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(wins.load(Ordering::Relaxed), 1024);
        assert_eq!(table.claimed_count(), 1024);
    }
}
