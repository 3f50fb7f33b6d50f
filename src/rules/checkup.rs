//! Pokémon Checkup.
//!
//! Runs between turns on both Active Pokémon, starting with the player whose
//! turn just ended. For each Active Pokémon, in order:
//!
//! 1. Poisoned: place `poison_damage`.
//! 2. Burned: place `burn_damage`, then flip a coin; heads removes Burned.
//! 3. Asleep: flip a coin; heads wakes it up.
//! 4. Paralyzed: removed if its owner's turn just ended.
//!
//! Reactive "during Pokémon Checkup" abilities and Knock Outs are handled by
//! the Referee after this returns.

use tracing::debug;

use crate::cards::SpecialCondition;
use crate::core::{InstanceId, Payload, PlayerId, RefereeConfig, StructuralError};
use crate::ops::AtomicOps;

/// What checkup changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CheckupReport {
    /// Pokémon that took Poison or Burn damage.
    pub damaged: Vec<InstanceId>,
    /// Conditions removed, by Pokémon.
    pub recovered: Vec<(InstanceId, SpecialCondition)>,
}

/// Run checkup for both Active Pokémon.
pub fn run(ops: &mut AtomicOps<'_>, config: &RefereeConfig, ended: PlayerId) -> Result<CheckupReport, StructuralError> {
    let mut report = CheckupReport::default();

    for player in PlayerId::starting_with(ended) {
        let Some(active) = ops.state().active(player) else {
            continue;
        };
        let conditions = ops.state().instance(active)?.conditions;
        if conditions.is_empty() {
            continue;
        }
        ops.note("checkup", Payload::new().with("player", player.0).with("card", active));

        if conditions.contains(SpecialCondition::Poisoned) {
            ops.update_damage(active, damage_delta(config.poison_damage))?;
            report.damaged.push(active);
        }

        if conditions.contains(SpecialCondition::Burned) {
            ops.update_damage(active, damage_delta(config.burn_damage))?;
            if !report.damaged.contains(&active) {
                report.damaged.push(active);
            }
            if ops.flip_coin().heads {
                ops.clear_condition(active, SpecialCondition::Burned)?;
                report.recovered.push((active, SpecialCondition::Burned));
            }
        }

        if conditions.contains(SpecialCondition::Asleep) && ops.flip_coin().heads {
            ops.clear_condition(active, SpecialCondition::Asleep)?;
            report.recovered.push((active, SpecialCondition::Asleep));
        }

        if conditions.contains(SpecialCondition::Paralyzed) && player == ended {
            ops.clear_condition(active, SpecialCondition::Paralyzed)?;
            report.recovered.push((active, SpecialCondition::Paralyzed));
        }
    }

    debug!(damaged = report.damaged.len(), recovered = report.recovered.len(), "checkup done");
    Ok(report)
}

fn damage_delta(amount: u32) -> i32 {
    i32::try_from(amount).unwrap_or(i32::MAX)
}
