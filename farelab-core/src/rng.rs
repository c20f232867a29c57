//! Deterministic seed derivation.
//!
//! A master seed is expanded into per-`(scope, index)` sub-seeds with BLAKE3.
//! Derivation does not depend on call order, so splits and folds drawn
//! from different scopes stay independent of each other.

use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedTree {
    master_seed: u64,
}

impl SeedTree {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Sub-seed for `(scope, index)`, e.g. `("forest.tree", 17)`.
    pub fn sub_seed(&self, scope: &str, index: u64) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(scope.as_bytes());
        hasher.update(&index.to_le_bytes());
        let hash = hasher.finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(head)
    }

    pub fn rng_for(&self, scope: &str, index: u64) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(scope, index))
    }

    /// A child tree rooted at `sub_seed(scope, index)`.
    pub fn child(&self, scope: &str, index: u64) -> SeedTree {
        SeedTree::new(self.sub_seed(scope, index))
    }
}
