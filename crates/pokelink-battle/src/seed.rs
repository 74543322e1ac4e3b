//! Turn seeds and the battle RNG.
//!
//! Both clients reseed before resolving each turn with
//! [`turn_seed`]`(battle_id, turn)`, so they roll the same numbers without
//! ever sending the seed.
//!
//! The seed goes through two SplitMix64 rounds: one over the battle id and
//! one over that result mixed with the turn. Battle 7 turn 1000 and battle
//! 1007 turn 0 therefore get unrelated seeds.

use pokelink_protocol::BattleId;
use serde::{Deserialize, Serialize};

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(GOLDEN_GAMMA);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// The seed for one turn of one battle. A pure function of its inputs.
pub fn turn_seed(battle_id: BattleId, turn: u32) -> u64 {
    splitmix64(splitmix64(battle_id.0) ^ u64::from(turn))
}

/// Deterministic xorshift64 generator.
///
/// Same seed, same sequence, on every platform. Never mixed with an
/// OS-seeded source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleRng {
    state: u64,
}

impl BattleRng {
    pub fn new(seed: u64) -> Self {
        // xorshift gets stuck on zero.
        let state = if seed == 0 { GOLDEN_GAMMA } else { seed };
        Self { state }
    }

    /// Shorthand for `BattleRng::new(turn_seed(battle_id, turn))`.
    pub fn for_turn(battle_id: BattleId, turn: u32) -> Self {
        Self::new(turn_seed(battle_id, turn))
    }

    pub fn state(&self) -> u64 {
        self.state
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    pub fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    /// Uniform in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform in `[min, max]`. Returns `min` if the range is empty.
    pub fn range(&mut self, min: u32, max: u32) -> u32 {
        if max <= min {
            return min;
        }
        let span = u64::from(max - min) + 1;
        min + (self.next_u64() % span) as u32
    }

    /// `true` with probability `percent / 100`, as move accuracy rolls use.
    pub fn percent(&mut self, percent: u8) -> bool {
        self.range(1, 100) <= u32::from(percent)
    }
}
