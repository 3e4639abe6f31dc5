use rand::{rngs::StdRng, SeedableRng};

/// Construct a deterministic RNG from a fixed seed.
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Construct an independent RNG stream from a base seed.
///
/// Separate concerns (dataset splitting, per-epoch shuffling) draw from
/// separate streams so adding draws to one never perturbs the others.
pub fn derive_rng(seed: u64, stream: u64) -> StdRng {
    StdRng::seed_from_u64(seed ^ stream.wrapping_mul(0x9E37_79B9_7F4A_7C15))
}
