//! The battle itself: a fixed pair, a turn owner, health pools and a log.

use std::collections::BTreeMap;

use duelhall_protocol::{
    AnimationCategory, AttackKind, BattleSnapshot, Combatant, CombatantStats, ConnectionId,
    LogEntry,
};
use rand::Rng;

use crate::{BattleError, BattleRules};

/// One side of a battle: who is fighting and with what.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contender {
    pub connection_id: ConnectionId,
    pub combatant: Combatant,
}

impl Contender {
    pub fn new(connection_id: ConnectionId, combatant: Combatant) -> Self {
        Self {
            connection_id,
            combatant,
        }
    }
}

/// Lifecycle of a battle once it exists.
///
/// `NoBattle` is modelled by the session holding no `Battle` at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattlePhase {
    /// Attacks are accepted from the turn owner.
    Active,
    /// A defender dropped to zero or below. No further transitions.
    Concluded { winner: ConnectionId },
}

/// What the battle looks like after an accepted attack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The fight goes on; `next_turn` is the defender of this attack.
    Continue { next_turn: ConnectionId },
    /// The defender is down.
    Victory {
        winner: ConnectionId,
        winner_name: String,
    },
}

/// Result of one accepted attack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackOutcome {
    pub attacker: ConnectionId,
    pub defender: ConnectionId,
    pub damage: i64,
    pub powered_up: bool,
    pub verdict: Verdict,
}

/// An active fight between exactly two participants.
///
/// Invariants, upheld by construction:
/// - `health` has exactly the two fighters as keys;
/// - `turn_owner` is always one of the two fighters;
/// - `log` is append-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Battle {
    fighters: [Contender; 2],
    turn_owner: ConnectionId,
    health: BTreeMap<ConnectionId, i64>,
    log: Vec<LogEntry>,
    phase: BattlePhase,
}

impl Battle {
    /// Starts a battle. `first` (the earlier joiner) owns the first turn.
    ///
    /// # Errors
    /// [`BattleError::InvariantViolation`] if both sides are the same
    /// connection.
    pub fn start(
        first: Contender,
        second: Contender,
        rules: &BattleRules,
    ) -> Result<Self, BattleError> {
        if first.connection_id == second.connection_id {
            return Err(BattleError::InvariantViolation(format!(
                "{} cannot fight itself",
                first.connection_id
            )));
        }

        let mut health = BTreeMap::new();
        health.insert(first.connection_id, rules.starting_health);
        health.insert(second.connection_id, rules.starting_health);

        Ok(Self {
            turn_owner: first.connection_id,
            fighters: [first, second],
            health,
            log: Vec::new(),
            phase: BattlePhase::Active,
        })
    }

    /// The pair, in join order.
    pub fn fighters(&self) -> &[Contender; 2] {
        &self.fighters
    }

    pub fn turn_owner(&self) -> ConnectionId {
        self.turn_owner
    }

    /// Current health of a fighter. `None` for anyone else.
    pub fn health(&self, id: ConnectionId) -> Option<i64> {
        self.health.get(&id).copied()
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    pub fn phase(&self) -> BattlePhase {
        self.phase
    }

    /// `true` if `id` is one of the two fighters.
    pub fn is_fighter(&self, id: ConnectionId) -> bool {
        self.fighters.iter().any(|f| f.connection_id == id)
    }

    /// Checks that `actor` may attack right now, without changing anything.
    ///
    /// # Errors
    /// [`BattleError::Concluded`], [`BattleError::NotAFighter`] or
    /// [`BattleError::OutOfTurn`].
    pub fn check_turn(&self, actor: ConnectionId) -> Result<(), BattleError> {
        if let BattlePhase::Concluded { .. } = self.phase {
            return Err(BattleError::Concluded);
        }
        if !self.is_fighter(actor) {
            return Err(BattleError::NotAFighter(actor));
        }
        if actor != self.turn_owner {
            return Err(BattleError::OutOfTurn(actor));
        }
        Ok(())
    }

    /// Applies one attack from the turn owner.
    ///
    /// `animation` is the already-fetched animation reference; `None`
    /// means the provider failed and the entry is left out of the log.
    /// The whole transition happens here, synchronously, so it is atomic
    /// with respect to anything else touching the session.
    ///
    /// Randomness is drawn in a fixed order: damage variance, then the
    /// power-up roll.
    ///
    /// # Errors
    /// Same as [`check_turn`](Self::check_turn). On error nothing changes.
    pub fn resolve_attack<R: Rng>(
        &mut self,
        actor: ConnectionId,
        kind: AttackKind,
        animation: Option<String>,
        rules: &BattleRules,
        rng: &mut R,
    ) -> Result<AttackOutcome, BattleError> {
        self.check_turn(actor)?;

        let (attacker, defender) = if self.fighters[0].connection_id == actor {
            (&self.fighters[0], &self.fighters[1])
        } else {
            (&self.fighters[1], &self.fighters[0])
        };
        let attacker_id = attacker.connection_id;
        let defender_id = defender.connection_id;
        let attacker_name = attacker.combatant.name.clone();
        let defender_name = defender.combatant.name.clone();

        let base = base_damage(&attacker.combatant.stats, &defender.combatant.stats);
        let multiplier = match kind {
            AttackKind::Basic => 1.0,
            AttackKind::Special => rules.special_multiplier,
        };
        let variance = if rules.has_usable_variance() {
            rng.random_range(rules.variance.clone())
        } else {
            1.0
        };
        let damage = (base * multiplier * variance).floor() as i64;

        *self.health.entry(defender_id).or_insert(0) -= damage;
        self.log.push(LogEntry::Text {
            message: format!(
                "{attacker_name} used {kind} attack on {defender_name} for {damage} damage!"
            ),
        });

        if let Some(reference) = animation {
            self.log.push(LogEntry::Animation { reference });
        }

        let powered_up = rng.random_bool(rules.power_up_odds());
        if powered_up {
            *self.health.entry(attacker_id).or_insert(0) += rules.power_up_heal;
            self.log.push(LogEntry::Text {
                message: format!(
                    "Lucky! {attacker_name} got a power-up (+{} HP)!",
                    rules.power_up_heal
                ),
            });
        }

        let verdict = if self.health(defender_id).unwrap_or(0) <= 0 {
            self.phase = BattlePhase::Concluded {
                winner: attacker_id,
            };
            Verdict::Victory {
                winner: attacker_id,
                winner_name: attacker_name,
            }
        } else {
            self.turn_owner = defender_id;
            Verdict::Continue {
                next_turn: defender_id,
            }
        };

        Ok(AttackOutcome {
            attacker: attacker_id,
            defender: defender_id,
            damage,
            powered_up,
            verdict,
        })
    }

    /// Wire view of the battle.
    pub fn snapshot(&self) -> BattleSnapshot {
        BattleSnapshot {
            turn_owner: self.turn_owner,
            health: self.health.clone(),
            log: self.log.clone(),
        }
    }
}

/// `max(0, strength − durability / 2)`, with the halving done in floating
/// point so odd durabilities keep their half point.
pub fn base_damage(attacker: &CombatantStats, defender: &CombatantStats) -> f64 {
    (f64::from(attacker.strength) - f64::from(defender.durability) / 2.0).max(0.0)
}

/// Picks the animation category for the next hit, uniformly.
pub fn pick_animation<R: Rng>(rng: &mut R) -> AnimationCategory {
    AnimationCategory::ALL[rng.random_range(0..AnimationCategory::ALL.len())]
}

// =========================================================================
// Tests
// =========================================================================
