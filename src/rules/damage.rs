//! Attack damage pipeline.
//!
//! Damage to the Defending Pokémon is computed in a fixed order:
//!
//! 1. base damage (printed, or replaced/raised by the attack's own text)
//! 2. attacker-side modifiers (Tools and Abilities of the attacker)
//! 3. Weakness (multiplied)
//! 4. Resistance (subtracted)
//! 5. defender-side modifiers (Tools and Abilities of the defender)
//!
//! Once the running total reaches zero or less the remaining steps are
//! skipped, so a 10-damage attack reduced by 20 never has Weakness applied.
//! The applied damage floors at zero.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::cards::{CardCatalog, CardId};
use crate::core::{GameState, InstanceId, RefereeConfig, StructuralError};
use crate::effects::{CardEffects, ModifierSide};

/// One step of the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DamageStep {
    Base,
    AttackerModifiers,
    Weakness,
    Resistance,
    DefenderModifiers,
}

impl DamageStep {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            DamageStep::Base => "base",
            DamageStep::AttackerModifiers => "attacker_modifiers",
            DamageStep::Weakness => "weakness",
            DamageStep::Resistance => "resistance",
            DamageStep::DefenderModifiers => "defender_modifiers",
        }
    }
}

impl std::fmt::Display for DamageStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything the pipeline reads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DamageInput {
    pub base: u32,
    pub attacker_modifier: i32,
    /// Weakness multiplier, when the defender is weak to the attacker.
    pub weakness: Option<u32>,
    /// Resistance amount, when the defender resists the attacker.
    pub resistance: Option<u32>,
    pub defender_modifier: i32,
}

impl DamageInput {
    /// Gather Weakness, Resistance and passive modifiers for an attack.
    pub fn for_attack(
        state: &GameState,
        catalog: &dyn CardCatalog,
        effects: &FxHashMap<CardId, CardEffects>,
        config: &RefereeConfig,
        attacker: InstanceId,
        defender: InstanceId,
        base: u32,
    ) -> Result<Self, StructuralError> {
        let attacking = state.definition(catalog, attacker)?;
        let defending = state.definition(catalog, defender)?;
        let attack_type = attacking.pokemon_type;

        let weak = attack_type.is_some() && defending.weakness == attack_type;
        let resistance = match defending.resistance {
            Some((energy, amount)) if Some(energy) == attack_type => Some(amount),
            _ => None,
        };

        Ok(Self {
            base,
            attacker_modifier: passive_modifier(state, catalog, effects, attacker, ModifierSide::Attacker),
            weakness: weak.then_some(config.weakness_multiplier),
            resistance,
            defender_modifier: passive_modifier(state, catalog, effects, defender, ModifierSide::Defender),
        })
    }
}

/// Sum of the passive modifiers a Pokémon carries on one side, from its
/// own Abilities and from its attached Tools.
#[must_use]
pub fn passive_modifier(
    state: &GameState,
    catalog: &dyn CardCatalog,
    effects: &FxHashMap<CardId, CardEffects>,
    pokemon: InstanceId,
    side: ModifierSide,
) -> i32 {
    let Some(instance) = state.get(pokemon) else {
        return 0;
    };
    let abilities: i32 = effects
        .get(&instance.card)
        .map(|e| {
            e.abilities
                .iter()
                .filter(|d| d.trigger.is_none())
                .flat_map(|d| d.damage_modifiers(side))
                .sum()
        })
        .unwrap_or(0);
    let tools: i32 = state
        .attached_tools(catalog, pokemon)
        .into_iter()
        .filter_map(|tool| state.get(tool))
        .filter_map(|tool| effects.get(&tool.card))
        .filter_map(|e| e.text.as_ref())
        .flat_map(|d| d.damage_modifiers(side))
        .sum();
    abilities + tools
}

#[derive(Clone, Copy)]
enum Adjustment {
    Add(i64),
    Multiply(i64),
}

/// The pipeline's trace and result.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageCalculation {
    /// Running total after each applied step.
    pub steps: Vec<(DamageStep, i64)>,
    /// Step after which the total reached zero and the rest was skipped.
    pub stopped_at: Option<DamageStep>,
    /// Damage to place on the defender.
    pub total: u32,
}

/// Run the pipeline.
///
/// ```
/// use ptcg_referee::rules::{calculate, DamageInput, DamageStep};
///
/// let input = DamageInput { base: 10, attacker_modifier: -20, weakness: Some(2), ..Default::default() };
/// let calc = calculate(&input);
/// assert_eq!(calc.total, 0);
/// assert_eq!(calc.stopped_at, Some(DamageStep::AttackerModifiers));
/// ```
#[must_use]
pub fn calculate(input: &DamageInput) -> DamageCalculation {
    let modifier = |amount: i32| (amount != 0).then_some(Adjustment::Add(i64::from(amount)));
    let plan = [
        (DamageStep::Base, Some(Adjustment::Add(0))),
        (DamageStep::AttackerModifiers, modifier(input.attacker_modifier)),
        (DamageStep::Weakness, input.weakness.map(|m| Adjustment::Multiply(i64::from(m)))),
        (DamageStep::Resistance, input.resistance.map(|r| Adjustment::Add(-i64::from(r)))),
        (DamageStep::DefenderModifiers, modifier(input.defender_modifier)),
    ];

    let mut calc = DamageCalculation::default();
    let mut running = i64::from(input.base);
    for (step, adjustment) in plan {
        running = match adjustment {
            None => continue,
            Some(Adjustment::Add(amount)) => running + amount,
            Some(Adjustment::Multiply(factor)) => running * factor,
        };
        calc.steps.push((step, running));
        if running <= 0 {
            calc.stopped_at = Some(step);
            running = 0;
            break;
        }
    }

    calc.total = u32::try_from(running).unwrap_or(u32::MAX);
    calc
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_order_weakness_then_resistance() {
        let input = DamageInput {
            base: 60,
            attacker_modifier: 30,
            weakness: Some(2),
            resistance: Some(30),
            defender_modifier: -20,
        };
        let calc = calculate(&input);
        // (60 + 30) * 2 - 30 - 20
        assert_eq!(calc.total, 130);
        assert_eq!(calc.stopped_at, None);
        let names: Vec<DamageStep> = calc.steps.iter().map(|(s, _)| *s).collect();
        assert_eq!(
            names,
            vec![
                DamageStep::Base,
                DamageStep::AttackerModifiers,
                DamageStep::Weakness,
                DamageStep::Resistance,
                DamageStep::DefenderModifiers
            ]
        );
    }

    #[test]
    fn test_negative_modifier_skips_weakness() {
        let input = DamageInput {
            base: 10,
            attacker_modifier: -20,
            weakness: Some(2),
            ..Default::default()
        };
        let calc = calculate(&input);
        assert_eq!(calc.total, 0);
        assert_eq!(calc.steps.len(), 2);
        assert_eq!(calc.stopped_at, Some(DamageStep::AttackerModifiers));
    }

    #[test]
    fn test_zero_base_does_nothing() {
        let calc = calculate(&DamageInput {
            base: 0,
            weakness: Some(2),
            defender_modifier: 30,
            ..Default::default()
        });
        assert_eq!(calc.total, 0);
        assert_eq!(calc.stopped_at, Some(DamageStep::Base));
    }

    #[test]
    fn test_resistance_floors_at_zero() {
        let calc = calculate(&DamageInput {
            base: 20,
            resistance: Some(30),
            ..Default::default()
        });
        assert_eq!(calc.total, 0);
        assert_eq!(calc.stopped_at, Some(DamageStep::Resistance));
    }

    proptest! {
        #[test]
        fn test_plain_attack_deals_base(base in 0u32..500) {
            let calc = calculate(&DamageInput { base, ..Default::default() });
            prop_assert_eq!(calc.total, base);
        }

        #[test]
        fn test_nonpositive_after_modifier_ignores_later_steps(
            base in 0u32..200,
            cut in 0i32..400,
            multiplier in 1u32..4,
            boost in 0i32..200,
        ) {
            let modifier = -cut;
            prop_assume!(i64::from(base) + i64::from(modifier) <= 0);
            let calc = calculate(&DamageInput {
                base,
                attacker_modifier: modifier,
                weakness: Some(multiplier),
                resistance: None,
                defender_modifier: boost,
            });
            prop_assert_eq!(calc.total, 0);
        }
    }
}
