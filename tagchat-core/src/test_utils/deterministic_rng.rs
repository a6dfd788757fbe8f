/*!
    Deterministic RNG helpers for reproducible tests

    Discovery delivers objects in no particular order. Tests that check
    order independence replay the same objects in seeded shuffles so a
    failure can be reproduced from its seed.
*/

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Default seed for deterministic tests
pub const DEFAULT_TEST_SEED: u64 = 42;

/// Create a deterministic RNG with the default seed
pub fn test_rng() -> StdRng {
    test_rng_with_seed(DEFAULT_TEST_SEED)
}

/// Create a deterministic RNG with a custom seed
pub fn test_rng_with_seed(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Copy of `items` in a seeded random order
pub fn shuffled<T: Clone>(items: &[T], seed: u64) -> Vec<T> {
    let mut copy = items.to_vec();
    copy.shuffle(&mut test_rng_with_seed(seed));
    copy
}

/// `rounds` seeded arrival orders of `items`, starting with the input order
pub fn arrival_orders<T: Clone>(items: &[T], rounds: u64) -> Vec<Vec<T>> {
    let mut orders = vec![items.to_vec()];
    orders.extend((0..rounds).map(|round| shuffled(items, DEFAULT_TEST_SEED + round)));
    orders
}
