//! Seeded random sources.
//!
//! A run owns exactly one master seed. The initial population is sampled
//! from [`create_rng`]`(seed)`; every offspring pairing afterwards gets its
//! own stream from [`stream_rng`], keyed by generation and pairing index, so
//! the outcome never depends on which worker thread handled the pairing.

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Creates the deterministic RNG used throughout the crate.
pub fn create_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Derives an independent stream for `(generation, index)` of a run seeded
/// with `master`.
pub fn stream_rng(master: u64, generation: usize, index: usize) -> StdRng {
    create_rng(derive_seed(master, generation as u64, index as u64))
}

/// Mixes the master seed with two stream coordinates.
///
/// Each coordinate is folded in through a full SplitMix64 round, so
/// neighbouring coordinates yield uncorrelated seeds.
pub fn derive_seed(master: u64, a: u64, b: u64) -> u64 {
    let h = splitmix64(master ^ 0x243f_6a88_85a3_08d3);
    let h = splitmix64(h ^ a);
    splitmix64(h ^ b.rotate_left(32))
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
