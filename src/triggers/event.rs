//! Trigger events.
//!
//! A [`GameEvent`] is raised by the Referee at the moments reactive
//! abilities can respond to: after an attack damages a Pokémon, when a
//! Pokémon is Knocked Out, and during Pokémon Checkup.

use serde::{Deserialize, Serialize};

use crate::core::InstanceId;

/// The moments a reactive ability can fire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerKind {
    /// "If this Pokémon is damaged by an attack ..."
    DamagedByAttack,
    /// "If this Pokémon is Knocked Out by damage from an attack ..."
    KnockedOut,
    /// "During Pokémon Checkup ..."
    BetweenTurns,
}

impl TriggerKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            TriggerKind::DamagedByAttack => "damaged_by_attack",
            TriggerKind::KnockedOut => "knocked_out",
            TriggerKind::BetweenTurns => "between_turns",
        }
    }
}

/// An event that reactive abilities may respond to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    pub kind: TriggerKind,
    /// The Pokémon the event happened to. `None` for board-wide events.
    pub subject: Option<InstanceId>,
    /// The attacking Pokémon, for attack-driven events.
    pub attacker: Option<InstanceId>,
}

impl GameEvent {
    /// An attack put damage on `subject`.
    #[must_use]
    pub fn damaged_by_attack(subject: InstanceId, attacker: InstanceId) -> Self {
        Self {
            kind: TriggerKind::DamagedByAttack,
            subject: Some(subject),
            attacker: Some(attacker),
        }
    }

    /// `subject` was Knocked Out, by `attacker` if damage from an attack did it.
    #[must_use]
    pub fn knocked_out(subject: InstanceId, attacker: Option<InstanceId>) -> Self {
        Self {
            kind: TriggerKind::KnockedOut,
            subject: Some(subject),
            attacker,
        }
    }

    /// Pokémon Checkup.
    #[must_use]
    pub fn between_turns() -> Self {
        Self {
            kind: TriggerKind::BetweenTurns,
            subject: None,
            attacker: None,
        }
    }
}
