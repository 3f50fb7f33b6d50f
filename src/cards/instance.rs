//! Card instances - runtime card state.
//!
//! `CardInstance` is one physical copy bound to a match. It is created at
//! setup, mutated only through [`crate::ops::AtomicOps`], and never deleted.
//!
//! ## Evolution layers
//!
//! A Pokémon in play keeps the `InstanceId` of its Basic card for its whole
//! time in play. Evolving pushes an [`EvolutionLayer`] recording the
//! definition being covered and the evolution card placed on top, then
//! switches `card` to the evolution's definition. Devolving pops the top
//! layer and restores the previous definition. When the Pokémon leaves play
//! the stack is unwound and `card` returns to `printed`.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::definition::CardId;
use crate::core::entity::InstanceId;
use crate::core::player::PlayerId;
use crate::zones::Location;

/// Special Conditions that can affect an Active Pokémon.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecialCondition {
    Asleep,
    Burned,
    Confused,
    Paralyzed,
    Poisoned,
}

impl SpecialCondition {
    pub const ALL: [SpecialCondition; 5] = [
        SpecialCondition::Asleep,
        SpecialCondition::Burned,
        SpecialCondition::Confused,
        SpecialCondition::Paralyzed,
        SpecialCondition::Poisoned,
    ];

    /// Lowercase name, as written in card text.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            SpecialCondition::Asleep => "asleep",
            SpecialCondition::Burned => "burned",
            SpecialCondition::Confused => "confused",
            SpecialCondition::Paralyzed => "paralyzed",
            SpecialCondition::Poisoned => "poisoned",
        }
    }

    /// Parse a lowercase or capitalized name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(name.trim()))
    }

    /// Asleep, Confused and Paralyzed replace each other.
    #[must_use]
    pub const fn is_rotation(self) -> bool {
        matches!(
            self,
            SpecialCondition::Asleep | SpecialCondition::Confused | SpecialCondition::Paralyzed
        )
    }

    const fn bit(self) -> u8 {
        match self {
            SpecialCondition::Asleep => 1,
            SpecialCondition::Burned => 1 << 1,
            SpecialCondition::Confused => 1 << 2,
            SpecialCondition::Paralyzed => 1 << 3,
            SpecialCondition::Poisoned => 1 << 4,
        }
    }
}

impl std::fmt::Display for SpecialCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = self.name();
        let mut chars = name.chars();
        if let Some(first) = chars.next() {
            write!(f, "{}{}", first.to_ascii_uppercase(), chars.as_str())?;
        }
        Ok(())
    }
}

/// Set of Special Conditions on one Pokémon.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Conditions(u8);

impl Conditions {
    #[must_use]
    pub fn contains(self, condition: SpecialCondition) -> bool {
        self.0 & condition.bit() != 0
    }

    /// Add a condition. A rotation condition replaces any other rotation.
    ///
    /// Returns `true` if the set changed.
    pub fn insert(&mut self, condition: SpecialCondition) -> bool {
        let before = self.0;
        if condition.is_rotation() {
            for other in SpecialCondition::ALL {
                if other.is_rotation() {
                    self.0 &= !other.bit();
                }
            }
        }
        self.0 |= condition.bit();
        self.0 != before
    }

    /// Remove a condition. Returns `true` if it was present.
    pub fn remove(&mut self, condition: SpecialCondition) -> bool {
        let present = self.contains(condition);
        self.0 &= !condition.bit();
        present
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = SpecialCondition> {
        SpecialCondition::ALL.into_iter().filter(move |c| self.contains(*c))
    }
}

/// One evolution placed on a Pokémon in play.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EvolutionLayer {
    /// Definition that was current before this evolution.
    pub previous: CardId,
    /// The evolution card now stacked on the Pokémon.
    pub evolution: InstanceId,
}

/// An attack that cannot be used until a turn has passed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DisabledAttack {
    /// Attack name, or `None` for every attack.
    pub attack: Option<String>,
    /// Last turn number on which the restriction applies.
    pub through_turn: u32,
}

impl DisabledAttack {
    /// Whether `attack` is blocked on `turn`.
    #[must_use]
    pub fn blocks(&self, attack: &str, turn: u32) -> bool {
        turn <= self.through_turn
            && self
                .attack
                .as_deref()
                .map_or(true, |name| name.eq_ignore_ascii_case(attack))
    }
}

/// A card instance in a match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardInstance {
    /// Unique ID for this copy.
    pub id: InstanceId,

    /// Printed definition of this physical card.
    pub printed: CardId,

    /// Current definition (top evolution layer while in play).
    pub card: CardId,

    /// Owner (whose deck it started in).
    pub owner: PlayerId,

    /// Current location. Mirrors the zone manager.
    pub location: Location,

    /// Damage taken, in HP. One damage counter is 10.
    pub damage: u32,

    /// Energy and Tool cards attached, in attachment order.
    pub attached: SmallVec<[InstanceId; 4]>,

    pub conditions: Conditions,

    /// Evolution stack, bottom first.
    pub layers: SmallVec<[EvolutionLayer; 2]>,

    /// Per-instance usage counters, cleared when the card leaves play.
    #[serde(default)]
    pub usage: FxHashMap<String, u32>,

    /// Turn this Pokémon was put into play.
    pub entered_turn: Option<u32>,

    /// Turn this Pokémon last evolved.
    pub evolved_turn: Option<u32>,

    pub disabled_attack: Option<DisabledAttack>,
}

impl CardInstance {
    /// Create a card instance in its owner's deck.
    #[must_use]
    pub fn new(id: InstanceId, card: CardId, owner: PlayerId) -> Self {
        Self {
            id,
            printed: card,
            card,
            owner,
            location: Location::Zone(owner, crate::zones::Zone::Deck),
            damage: 0,
            attached: SmallVec::new(),
            conditions: Conditions::default(),
            layers: SmallVec::new(),
            usage: FxHashMap::default(),
            entered_turn: None,
            evolved_turn: None,
            disabled_attack: None,
        }
    }

    /// Number of damage counters.
    #[must_use]
    pub fn damage_counters(&self) -> u32 {
        self.damage / 10
    }

    /// Remaining HP given the current definition's HP.
    #[must_use]
    pub fn remaining_hp(&self, max_hp: u32) -> u32 {
        max_hp.saturating_sub(self.damage)
    }

    /// Whether this Pokémon has evolved.
    #[must_use]
    pub fn is_evolved(&self) -> bool {
        !self.layers.is_empty()
    }

    /// Read a usage counter.
    #[must_use]
    pub fn usage_count(&self, key: &str) -> u32 {
        self.usage.get(key).copied().unwrap_or(0)
    }

    /// Forget everything that only exists while in play.
    ///
    /// Unwinds evolution layers and returns the evolution cards that were
    /// stacked on this one, top first.
    pub fn reset_in_play_state(&mut self) -> SmallVec<[InstanceId; 2]> {
        let stacked = self.layers.iter().rev().map(|l| l.evolution).collect();
        self.layers.clear();
        self.card = self.printed;
        self.damage = 0;
        self.conditions.clear();
        self.usage.clear();
        self.entered_turn = None;
        self.evolved_turn = None;
        self.disabled_attack = None;
        stacked
    }
}
