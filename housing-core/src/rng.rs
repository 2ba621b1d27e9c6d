//! Deterministic seed hierarchy for ensemble members.
//!
//! A master seed is expanded into one sub-seed per tree via BLAKE3. Derivation
//! depends only on `(master_seed, tree_index)`, so an ensemble fit in parallel
//! is identical regardless of thread count or scheduling order.

use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedHierarchy {
    master_seed: u64,
}

impl SeedHierarchy {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Derive the sub-seed for one tree.
    pub fn tree_seed(&self, tree_index: usize) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(b"tree");
        hasher.update(&(tree_index as u64).to_le_bytes());
        let hash = hasher.finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(head)
    }

    /// Seeded `StdRng` for one tree.
    pub fn rng_for_tree(&self, tree_index: usize) -> StdRng {
        StdRng::seed_from_u64(self.tree_seed(tree_index))
    }
}
