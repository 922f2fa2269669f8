use super::config::Seed;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// The single random stream of a simulation. Its full state is serializable, which is what
/// makes a resumed run reproduce an uninterrupted one.
pub type McRng = ChaCha8Rng;

pub fn seeded(seed: Seed) -> McRng {
    match seed {
        Seed::Fixed(value) => ChaCha8Rng::seed_from_u64(value),
        Seed::Hardware => ChaCha8Rng::from_entropy(),
    }
}
