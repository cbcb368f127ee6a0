//! Deterministic random sources derived from a seed phrase.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

/// Builds a ChaCha8 generator whose seed is the SHA-256 digest of `phrase`.
///
/// The same phrase always yields the same stream, which makes reference
/// generation and DCT sparsification reproducible across runs.
pub fn rng_from_phrase(phrase: &[u8]) -> ChaCha8Rng {
    let seed: [u8; 32] = {
        let mut hasher = Sha256::new();
        hasher.update(phrase);
        hasher.finalize().into()
    };
    ChaCha8Rng::from_seed(seed)
}
