//! Battle state machine for duelhall.
//!
//! A [`Battle`] is pure state: it never touches the network and draws all
//! randomness from the `rand::Rng` it is handed, so a seeded
//! `rand::rngs::StdRng` makes every fight reproducible.
//!
//! ```text
//! NoBattle ──(second pick)──→ Active ──(health ≤ 0)──→ Concluded
//!                               │ ↺ attack (turn flips)
//! ```
//!
//! # Key types
//!
//! - [`Battle`]: the active fight between a fixed pair
//! - [`BattleRules`]: starting health, damage multipliers and power-up odds
//! - [`AttackOutcome`] / [`Verdict`]: what one accepted attack did

mod battle;
mod error;
mod rules;

pub use battle::{
    AttackOutcome, Battle, BattlePhase, Contender, Verdict, base_damage, pick_animation,
};
pub use error::BattleError;
pub use rules::BattleRules;
