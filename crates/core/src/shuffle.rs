//! Shuffle strategies used by question selection.
//!
//! The selector never touches an RNG directly: it goes through a `Shuffler`,
//! so tests can swap in a seeded or identity strategy and assert exact output.

use rand::rngs::{StdRng, ThreadRng};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Reorders a slice in place.
pub trait Shuffler {
    fn shuffle<T>(&mut self, items: &mut [T]);

    /// Returns a shuffled copy, leaving `items` untouched.
    fn shuffled<T: Clone>(&mut self, items: &[T]) -> Vec<T> {
        let mut copy = items.to_vec();
        self.shuffle(&mut copy);
        copy
    }
}

/// Unbiased Fisher–Yates shuffle driven by any `rand` RNG.
#[derive(Debug, Clone)]
pub struct RngShuffler<R> {
    rng: R,
}

impl<R: Rng> RngShuffler<R> {
    #[must_use]
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RngShuffler<ThreadRng> {
    /// Shuffler backed by the thread-local RNG.
    #[must_use]
    pub fn thread() -> Self {
        Self::new(rand::rng())
    }
}

impl RngShuffler<StdRng> {
    /// Deterministic shuffler: the same seed yields the same permutations.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> Shuffler for RngShuffler<R> {
    fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.rng);
    }
}

/// Leaves every slice in its original order.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityShuffler;

impl Shuffler for IdentityShuffler {
    fn shuffle<T>(&mut self, _items: &mut [T]) {}
}

/// Reverses every slice; handy for asserting that a shuffle step actually ran.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReverseShuffler;

impl Shuffler for ReverseShuffler {
    fn shuffle<T>(&mut self, items: &mut [T]) {
        items.reverse();
    }
}
