//! Seeded pseudorandom generator used for both the additive-sharing masks
//! and the shuffler's per-batch permutation draws.
//!
//! Every shard of a party must derive the *same* sequence of draws for the
//! shuffle to agree across shards without exchanging the permutation, so the
//! seed is a pure deterministic function of `(party_id, batch_nonce)` — never
//! per-shard entropy. See `SPEC_FULL.md` Design Notes, "Open question — PRG
//! seeding": the original source seeded from `party_id` alone, which repeats
//! the same permutation every batch; this crate mixes in a per-batch nonce.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::field::FieldElement;

/// A seeded PRG stream. Two `Prg`s constructed with the same `(party_id,
/// batch_nonce)` pair produce identical draw sequences.
pub struct Prg {
    rng: StdRng,
}

impl Prg {
    /// Derives a shard-agreed seed from `party_id` and `batch_nonce` and
    /// constructs the underlying RNG from it.
    pub fn for_batch(party_id: u32, batch_nonce: u64) -> Self {
        let seed = mix_seed(party_id, batch_nonce);
        Self { rng: StdRng::seed_from_u64(seed) }
    }

    /// Uniform draw in `[lo, hi)`. Mirrors the original's `Rand32`.
    pub fn uniform_range(&mut self, lo: u64, hi: u64) -> u64 {
        assert!(lo < hi, "uniform_range requires lo < hi");
        self.rng.gen_range(lo..hi)
    }

    /// Uniform field element in `[0, modulus)`.
    pub fn field_element(&mut self, modulus: u64) -> FieldElement {
        FieldElement::new(self.rng.gen_range(0..modulus), modulus)
    }
}

/// Client-side randomness, independent of the shuffler's shard-agreed stream:
/// the client has no siblings to agree with, so any unseeded source works.
/// Exposed as a thin wrapper so callers never reach for `rand::thread_rng()`
/// directly and so tests can substitute a fixed seed for determinism.
pub struct ClientRng {
    rng: StdRng,
}

impl ClientRng {
    pub fn from_entropy() -> Self {
        Self { rng: StdRng::from_entropy() }
    }

    /// Deterministic construction, used by tests that assert `create_query`
    /// is a pure function of its RNG state.
    pub fn from_seed(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }

    pub fn field_element(&mut self, modulus: u64) -> FieldElement {
        FieldElement::new(self.rng.gen_range(0..modulus), modulus)
    }
}

fn mix_seed(party_id: u32, batch_nonce: u64) -> u64 {
    const MULTIPLIER: u64 = 0x9E37_79B9_7F4A_7C15; // golden-ratio constant, standard splitmix64 multiplier
    (batch_nonce ^ (party_id as u64).wrapping_mul(MULTIPLIER)).wrapping_mul(MULTIPLIER)
}
