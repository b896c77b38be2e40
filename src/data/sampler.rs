// ============================================================
// Layer 4: Seeded Mini-batch Sampler
// ============================================================
// Walks a shuffled permutation of 0..n in chunks of `batch_size`,
// reshuffling whenever a pass is exhausted, so every sample is
// seen once per pass regardless of how many iterations a stage
// runs. The permutation comes from a seeded ChaCha RNG so runs
// are reproducible.
//
// Uses Fisher-Yates shuffle via rand::seq::SliceRandom.

use rand::{seq::SliceRandom, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub struct MinibatchSampler {
    order:      Vec<usize>,
    cursor:     usize,
    batch_size: usize,
    rng:        ChaCha8Rng,
}

impl MinibatchSampler {
    pub fn new(n: usize, batch_size: usize, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut rng);
        Self { order, cursor: 0, batch_size: batch_size.max(1), rng }
    }

    /// Next batch of indices; never empty unless `n == 0`.
    pub fn next_batch(&mut self) -> Vec<usize> {
        if self.order.is_empty() {
            return Vec::new();
        }
        if self.cursor >= self.order.len() {
            self.order.shuffle(&mut self.rng);
            self.cursor = 0;
        }
        let end = (self.cursor + self.batch_size).min(self.order.len());
        let batch = self.order[self.cursor..end].to_vec();
        self.cursor = end;
        batch
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_one_pass_covers_every_index_once() {
        let mut s = MinibatchSampler::new(10, 4, 1);
        let mut seen = Vec::new();
        seen.extend(s.next_batch());
        seen.extend(s.next_batch());
        seen.extend(s.next_batch());
        assert_eq!(seen.len(), 10);
        assert_eq!(seen.iter().collect::<HashSet<_>>().len(), 10);
    }

    #[test]
    fn test_batches_continue_after_a_pass() {
        let mut s = MinibatchSampler::new(3, 2, 9);
        let sizes: Vec<usize> = (0..5).map(|_| s.next_batch().len()).collect();
        assert_eq!(sizes, vec![2, 1, 2, 1, 2]);
    }

    #[test]
    fn test_same_seed_same_order() {
        let mut a = MinibatchSampler::new(50, 7, 42);
        let mut b = MinibatchSampler::new(50, 7, 42);
        for _ in 0..20 {
            assert_eq!(a.next_batch(), b.next_batch());
        }
    }

    #[test]
    fn test_empty_sampler_yields_nothing() {
        let mut s = MinibatchSampler::new(0, 4, 0);
        assert!(s.next_batch().is_empty());
    }
}
