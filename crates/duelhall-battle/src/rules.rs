//! Combat tuning.

use std::ops::Range;

use serde::{Deserialize, Serialize};

/// The numbers behind attack resolution.
///
/// Defaults reproduce the classic rules: 200 health, special attacks at
/// 1.5×, a ±25% swing on every hit and a 10% chance of a 20-point heal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleRules {
    /// Health each fighter starts with.
    pub starting_health: i64,

    /// Damage multiplier for `AttackKind::Special`.
    pub special_multiplier: f64,

    /// Half-open range the per-hit variance is drawn from.
    pub variance: Range<f64>,

    /// Probability (0.0–1.0) that the attacker powers up after a hit.
    pub power_up_chance: f64,

    /// Health restored by a power-up. Not capped at `starting_health`.
    pub power_up_heal: i64,
}

impl Default for BattleRules {
    fn default() -> Self {
        Self {
            starting_health: 200,
            special_multiplier: 1.5,
            variance: 0.75..1.25,
            power_up_chance: 0.10,
            power_up_heal: 20,
        }
    }
}

impl BattleRules {
    /// Clamps out-of-range values so the rules are safe to feed to `rand`.
    ///
    /// - `power_up_chance` clamped to `0.0..=1.0`; NaN becomes `0.0`.
    /// - A negative or non-finite `special_multiplier` becomes `0.0`.
    /// - A `variance` that is empty, inverted, negative or non-finite
    ///   collapses to `1.0..1.0 + ε`.
    pub fn validated(mut self) -> Self {
        self.power_up_chance = self.power_up_odds();
        if !(self.special_multiplier.is_finite() && self.special_multiplier >= 0.0) {
            self.special_multiplier = 0.0;
        }
        if !self.has_usable_variance() {
            tracing::warn!(
                start = self.variance.start,
                end = self.variance.end,
                "unusable damage variance, falling back to no variance"
            );
            self.variance = 1.0..1.0 + f64::EPSILON;
        }
        self
    }

    /// `true` when `variance` can be sampled.
    pub(crate) fn has_usable_variance(&self) -> bool {
        let Range { start, end } = self.variance;
        start.is_finite() && end.is_finite() && start >= 0.0 && start < end
    }

    /// `power_up_chance` as a probability `random_bool` accepts.
    pub(crate) fn power_up_odds(&self) -> f64 {
        if self.power_up_chance.is_nan() {
            0.0
        } else {
            self.power_up_chance.clamp(0.0, 1.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_match_classic_numbers() {
        let rules = BattleRules::default();
        assert_eq!(rules.starting_health, 200);
        assert_eq!(rules.special_multiplier, 1.5);
        assert_eq!(rules.variance, 0.75..1.25);
        assert_eq!(rules.power_up_chance, 0.10);
        assert_eq!(rules.power_up_heal, 20);
    }

    #[test]
    fn test_validated_clamps_chance() {
        let rules = BattleRules {
            power_up_chance: 3.0,
            ..BattleRules::default()
        }
        .validated();
        assert_eq!(rules.power_up_chance, 1.0);
    }

    #[test]
    fn test_validated_repairs_inverted_variance() {
        let rules = BattleRules {
            variance: 1.25..0.75,
            ..BattleRules::default()
        }
        .validated();
        assert!(rules.variance.start < rules.variance.end);
        assert_eq!(rules.variance.start, 1.0);
    }

    #[test]
    fn test_validated_keeps_defaults_untouched() {
        assert_eq!(BattleRules::default().validated(), BattleRules::default());
    }

    #[test]
    fn test_validated_repairs_non_finite_values() {
        let rules = BattleRules {
            special_multiplier: f64::INFINITY,
            variance: 0.5..f64::INFINITY,
            power_up_chance: f64::NAN,
            ..BattleRules::default()
        }
        .validated();
        assert_eq!(rules.special_multiplier, 0.0);
        assert_eq!(rules.variance.start, 1.0);
        assert_eq!(rules.power_up_chance, 0.0);

        let rules = BattleRules {
            variance: f64::NAN..1.0,
            ..BattleRules::default()
        }
        .validated();
        assert_eq!(rules.variance.start, 1.0);
    }

    #[test]
    fn test_validated_repairs_negative_variance() {
        let rules = BattleRules {
            variance: -1.0..0.5,
            special_multiplier: -2.0,
            ..BattleRules::default()
        }
        .validated();
        assert_eq!(rules.variance.start, 1.0);
        assert_eq!(rules.special_multiplier, 0.0);
    }
}
