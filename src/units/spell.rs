//! Queued spell effects
//!
//! Spellcasters queue effects on an army or castle; they apply to the
//! target's modified power in its next combat and are then discarded.

use serde::{Deserialize, Serialize};

/// A single queued effect
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SpellEffect {
    /// Flat power reduction
    Damage(f64),
    /// Flat power increase
    Heal(f64),
    /// Multiplies power by `1 + fraction`
    Buff(f64),
    /// Multiplies power by `1 - fraction`, never below zero
    Debuff(f64),
}

impl SpellEffect {
    pub fn is_valid(&self) -> bool {
        match *self {
            SpellEffect::Damage(v) | SpellEffect::Heal(v) | SpellEffect::Buff(v) => {
                v.is_finite() && v >= 0.0
            }
            SpellEffect::Debuff(v) => v.is_finite() && (0.0..=1.0).contains(&v),
        }
    }
}

/// Apply effects to a power value: multiplicative effects first, then flat
/// deltas. The result is floored at zero.
pub fn apply_effects(power: f64, effects: &[SpellEffect]) -> f64 {
    let mut multiplier = 1.0;
    let mut delta = 0.0;
    for effect in effects {
        match *effect {
            SpellEffect::Buff(f) => multiplier *= 1.0 + f,
            SpellEffect::Debuff(f) => multiplier *= (1.0 - f).max(0.0),
            SpellEffect::Heal(v) => delta += v,
            SpellEffect::Damage(v) => delta -= v,
        }
    }
    (power * multiplier + delta).max(0.0)
}
