//! Spawn source for pickups and obstacles.
//!
//! Every variant asks the spawner for "draws": one draw is one spawn
//! opportunity, a Bernoulli trial followed (on success) by a position index.
//! Production sessions use a seeded ChaCha8 stream so a session can be
//! replayed from its seed; tests feed a scripted plan instead.

use std::collections::VecDeque;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// RNG algorithm identifier recorded in transcripts.
pub const RNG_ALGORITHM: &str = "ChaCha8Rng";

/// Source of spawn decisions.
#[derive(Debug, Clone)]
pub enum Spawner {
    /// Seeded pseudo-random draws.
    Seeded { seed: u64, rng: ChaCha8Rng },
    /// Pre-planned draws, consumed front to back. `None` means "no spawn".
    Scripted(VecDeque<Option<u32>>),
}

impl Spawner {
    /// Create a seeded spawner.
    pub fn seeded(seed: u64) -> Self {
        Self::Seeded {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Create a spawner that replays a fixed plan of draws.
    ///
    /// Each entry answers one draw; `Some(i)` spawns at index `i % upper`.
    /// Once the plan is exhausted every draw answers "no spawn".
    pub fn scripted<I>(plan: I) -> Self
    where
        I: IntoIterator<Item = Option<u32>>,
    {
        Self::Scripted(plan.into_iter().collect())
    }

    /// Seed of a seeded spawner; `None` for scripted plans.
    pub fn seed(&self) -> Option<u64> {
        match self {
            Self::Seeded { seed, .. } => Some(*seed),
            Self::Scripted(_) => None,
        }
    }

    /// Perform one draw: with probability `chance`, pick an index in `0..upper`.
    ///
    /// An empty range (`upper == 0`) is not a spawn opportunity and consumes
    /// nothing.
    pub fn draw(&mut self, chance: f64, upper: u32) -> Option<u32> {
        if upper == 0 {
            return None;
        }
        match self {
            Self::Seeded { rng, .. } => {
                let chance = if chance.is_finite() {
                    chance.clamp(0.0, 1.0)
                } else {
                    0.0
                };
                if rng.gen_bool(chance) {
                    Some(rng.gen_range(0..upper))
                } else {
                    None
                }
            }
            Self::Scripted(plan) => plan.pop_front().flatten().map(|index| index % upper),
        }
    }
}
