//! Single seeded RNG shared by every stochastic decision a manager makes
//! (diffusion-accept draws, prune-sample shuffles), so a fixed seed and call
//! sequence reproduce byte-identical snapshots (`spec.md` §9).

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

pub(crate) fn build(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}
