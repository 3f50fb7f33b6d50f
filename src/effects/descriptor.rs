//! Effect descriptors - parsed, executable card text.
//!
//! An [`EffectDescriptor`] is the immutable result of parsing one card's
//! effect text. It is a list of [`EffectNode`]s, each wrapping one
//! [`Action`] with the modifiers that surround it in the text:
//!
//! - a [`Timing`] tag (`BeforeDamage` nodes run ahead of damage calculation),
//! - a [`Gate`] (coin result or board condition that must hold),
//! - an `optional` flag ("you may"),
//! - an explicit [`TimeoutPolicy`],
//! - consequent nodes that run only if this node had an observable effect
//!   ("If you do, ...").
//!
//! Descriptors are data. One generic interpreter executes all of them.

use serde::{Deserialize, Serialize};

use super::targeting::{CardFilter, PokemonTarget, Quantity};
use crate::cards::SpecialCondition;
use crate::triggers::TriggerKind;

/// What kind of card text a descriptor came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectOrigin {
    Attack,
    Ability,
    Trainer,
    Tool,
    Stadium,
    SpecialEnergy,
}

impl EffectOrigin {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            EffectOrigin::Attack => "attack",
            EffectOrigin::Ability => "ability",
            EffectOrigin::Trainer => "trainer",
            EffectOrigin::Tool => "tool",
            EffectOrigin::Stadium => "stadium",
            EffectOrigin::SpecialEnergy => "special energy",
        }
    }
}

impl std::fmt::Display for EffectOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How often an ability may be used.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UsageLimit {
    #[default]
    Unlimited,
    OncePerTurn,
    OncePerGame,
}

/// When a node runs relative to damage calculation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timing {
    /// In textual order, after damage for attacks.
    #[default]
    Textual,
    /// Ahead of damage calculation regardless of textual position.
    BeforeDamage,
}

/// Board condition checked when a node is reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    SourceInActiveSpot,
    SourceUndamaged,
    SourceDamaged,
    OpponentActiveHas(SpecialCondition),
}

/// What must hold for a node to run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gate {
    #[default]
    Always,
    /// The most recent coin flip was heads.
    CoinHeads,
    /// The most recent coin flip was tails.
    CoinTails,
    If(Condition),
}

/// How an expired choice checkpoint resolves.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeoutPolicy {
    /// Treat the timeout as choosing nothing.
    #[default]
    SelectNone,
    /// Fail the action and roll it back.
    Abort,
}

/// Whose cards a clause refers to, relative to the acting player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Yours,
    Opponents,
}

/// Where searched or attached cards come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardSource {
    Deck,
    Discard,
    Hand,
}

impl CardSource {
    #[must_use]
    pub const fn zone(self) -> crate::zones::Zone {
        match self {
            CardSource::Deck => crate::zones::Zone::Deck,
            CardSource::Discard => crate::zones::Zone::Discard,
            CardSource::Hand => crate::zones::Zone::Hand,
        }
    }
}

/// Where found cards go.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Destination {
    Hand,
    Bench,
    /// Attached to Pokémon in play.
    Attach(PokemonTarget),
}

/// Switch variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwitchKind {
    /// Switch your Active Pokémon with 1 of your Benched Pokémon.
    Yours,
    /// Switch 1 of your opponent's Benched Pokémon with their Active Pokémon.
    Gust,
    /// Your opponent switches their Active Pokémon with 1 of their Benched Pokémon.
    OpponentSwitches,
}

/// Amount of damage healed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HealAmount {
    Amount(u32),
    All,
}

/// Damage counters moved between Pokémon.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CounterAmount {
    Exactly(u32),
    All,
}

/// What a "for each ..." damage bonus counts.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BonusBasis {
    /// A flat bonus, applied once.
    Flat,
    /// Cards discarded by an earlier node of the same effect.
    DiscardedInThisWay,
    /// Heads among the coins flipped by this effect.
    Heads,
    /// Damage counters on the given Pokémon.
    DamageCountersOn(PokemonTarget),
    /// Energy attached to the given Pokémon.
    EnergyAttached(PokemonTarget),
}

/// Which side of the damage pipeline a passive modifier sits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModifierSide {
    /// Attacks used by the holder do more (or less) damage.
    Attacker,
    /// The holder takes more (or less) damage from attacks.
    Defender,
}

/// One executable action.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Heal {
        target: PokemonTarget,
        amount: HealAmount,
    },
    MoveDamageCounters {
        from: PokemonTarget,
        to: PokemonTarget,
        amount: CounterAmount,
    },
    MoveEnergy {
        filter: CardFilter,
        quantity: Quantity,
        from: PokemonTarget,
        to: PokemonTarget,
    },
    AttachEnergy {
        source: CardSource,
        filter: CardFilter,
        quantity: Quantity,
        target: PokemonTarget,
    },
    DiscardAttachedEnergy {
        target: PokemonTarget,
        filter: CardFilter,
        quantity: Quantity,
    },
    DiscardFromHand {
        filter: CardFilter,
        quantity: Quantity,
    },
    DiscardHand,
    DiscardStadium,
    Devolve {
        target: PokemonTarget,
    },
    DamageToTargets {
        amount: u32,
        target: PokemonTarget,
    },
    DamageToSelf {
        amount: u32,
    },
    PutDamageCounters {
        counters: u32,
        target: PokemonTarget,
    },
    /// "This attack does nothing."
    AttackFails,
    Search {
        source: CardSource,
        filter: CardFilter,
        quantity: Quantity,
        destination: Destination,
    },
    Switch(SwitchKind),
    Draw {
        count: u32,
    },
    DrawUntil {
        hand_size: u32,
    },
    ShuffleHandIntoDeck {
        side: Side,
    },
    ShuffleDeck {
        side: Side,
    },
    ApplyCondition {
        condition: SpecialCondition,
        target: PokemonTarget,
    },
    /// The target cannot use `attack` (or any attack) during the next turn
    /// of the `during` side.
    DisableAttack {
        target: PokemonTarget,
        attack: Option<String>,
        during: Side,
    },
    /// `amount` more damage per counted unit. With `replace`, the total
    /// replaces the printed damage ("does 50 damage for each ...").
    DamageBonus {
        amount: u32,
        basis: BonusBasis,
        replace: bool,
    },
    /// Passive damage modifier, read by the damage pipeline.
    DamageModifier {
        side: ModifierSide,
        amount: i32,
    },
    FlipCoins {
        count: u32,
    },
}

impl Action {
    /// Stable name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Heal { .. } => "heal",
            Action::MoveDamageCounters { .. } => "move_damage_counters",
            Action::MoveEnergy { .. } => "move_energy",
            Action::AttachEnergy { .. } => "attach_energy",
            Action::DiscardAttachedEnergy { .. } => "discard_energy",
            Action::DiscardFromHand { .. } => "discard_from_hand",
            Action::DiscardHand => "discard_hand",
            Action::DiscardStadium => "discard_stadium",
            Action::Devolve { .. } => "devolve",
            Action::DamageToTargets { .. } => "damage_to_targets",
            Action::DamageToSelf { .. } => "damage_to_self",
            Action::PutDamageCounters { .. } => "put_damage_counters",
            Action::AttackFails => "attack_fails",
            Action::Search { .. } => "search",
            Action::Switch(_) => "switch",
            Action::Draw { .. } => "draw",
            Action::DrawUntil { .. } => "draw_until",
            Action::ShuffleHandIntoDeck { .. } => "shuffle_hand_into_deck",
            Action::ShuffleDeck { .. } => "shuffle_deck",
            Action::ApplyCondition { .. } => "apply_condition",
            Action::DisableAttack { .. } => "disable_attack",
            Action::DamageBonus { .. } => "damage_bonus",
            Action::DamageModifier { .. } => "damage_modifier",
            Action::FlipCoins { .. } => "flip_coins",
        }
    }

    /// Whether the action feeds damage calculation and must run before it.
    #[must_use]
    pub fn feeds_damage(&self) -> bool {
        matches!(
            self,
            Action::AttackFails | Action::DamageBonus { .. } | Action::FlipCoins { .. }
        )
    }

    /// Whether the action asks for a selection with a nonzero minimum.
    #[must_use]
    pub fn requires_selection(&self) -> bool {
        let quantity = match self {
            Action::MoveEnergy { quantity, .. }
            | Action::AttachEnergy { quantity, .. }
            | Action::DiscardAttachedEnergy { quantity, .. }
            | Action::DiscardFromHand { quantity, .. }
            | Action::Search { quantity, .. } => Some(*quantity),
            Action::Heal { target, .. }
            | Action::Devolve { target }
            | Action::DamageToTargets { target, .. }
            | Action::PutDamageCounters { target, .. }
            | Action::ApplyCondition { target, .. } => Some(target.quantity),
            Action::Switch(_) => Some(Quantity::Exactly(1)),
            _ => None,
        };
        quantity.is_some_and(Quantity::is_mandatory)
    }
}

/// One step of an effect.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EffectNode {
    pub action: Action,
    pub timing: Timing,
    pub gate: Gate,
    /// "You may": the acting player can decline the whole node.
    pub optional: bool,
    pub on_timeout: TimeoutPolicy,
    /// Run only if this node had an observable effect.
    pub consequent: Vec<EffectNode>,
    /// The clause this node was parsed from.
    pub text: String,
}

impl EffectNode {
    /// A plain, mandatory, textual-order node.
    #[must_use]
    pub fn new(action: Action) -> Self {
        Self {
            action,
            timing: Timing::Textual,
            gate: Gate::Always,
            optional: false,
            on_timeout: TimeoutPolicy::SelectNone,
            consequent: Vec::new(),
            text: String::new(),
        }
    }

    #[must_use]
    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    #[must_use]
    pub fn with_gate(mut self, gate: Gate) -> Self {
        self.gate = gate;
        self
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    #[must_use]
    pub fn with_consequent(mut self, node: EffectNode) -> Self {
        self.consequent.push(node);
        self
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Derive the timeout policy from the node's wording.
    ///
    /// Optional nodes and nodes whose quantifier allows zero resolve to
    /// "chose nothing"; mandatory selections abort.
    pub(crate) fn settle_timeout_policy(&mut self) {
        self.on_timeout = if !self.optional && self.action.requires_selection() {
            TimeoutPolicy::Abort
        } else {
            TimeoutPolicy::SelectNone
        };
        for node in &mut self.consequent {
            node.settle_timeout_policy();
        }
    }
}

/// Parsed card text.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EffectDescriptor {
    pub origin: EffectOrigin,
    pub limit: UsageLimit,
    /// Set for abilities that fire on their own.
    pub trigger: Option<TriggerKind>,
    pub nodes: Vec<EffectNode>,
    /// Normalized source text.
    pub text: String,
}

impl EffectDescriptor {
    #[must_use]
    pub fn new(origin: EffectOrigin) -> Self {
        Self {
            origin,
            limit: UsageLimit::Unlimited,
            trigger: None,
            nodes: Vec::new(),
            text: String::new(),
        }
    }

    #[must_use]
    pub fn with_node(mut self, node: EffectNode) -> Self {
        self.nodes.push(node);
        self
    }

    /// Whether there is nothing to execute.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether the effect only modifies damage and is never activated.
    #[must_use]
    pub fn is_passive(&self) -> bool {
        self.trigger.is_some()
            || (!self.nodes.is_empty()
                && self
                    .nodes
                    .iter()
                    .all(|n| matches!(n.action, Action::DamageModifier { .. })))
    }

    /// Passive damage modifiers on the given side.
    pub fn damage_modifiers(&self, side: ModifierSide) -> impl Iterator<Item = i32> + '_ {
        self.nodes.iter().filter_map(move |node| match node.action {
            Action::DamageModifier { side: s, amount } if s == side => Some(amount),
            _ => None,
        })
    }

    /// Whether any node runs before damage calculation.
    #[must_use]
    pub fn has_pre_damage_nodes(&self) -> bool {
        self.nodes.iter().any(|n| n.timing == Timing::BeforeDamage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::targeting::PokemonTarget;

    #[test]
    fn test_timeout_policy_follows_wording() {
        let mut search = EffectNode::new(Action::Search {
            source: CardSource::Deck,
            filter: CardFilter::any(),
            quantity: Quantity::UpTo(2),
            destination: Destination::Hand,
        });
        search.settle_timeout_policy();
        assert_eq!(search.on_timeout, TimeoutPolicy::SelectNone);

        let mut discard = EffectNode::new(Action::DiscardFromHand {
            filter: CardFilter::any(),
            quantity: Quantity::Exactly(2),
        });
        discard.settle_timeout_policy();
        assert_eq!(discard.on_timeout, TimeoutPolicy::Abort);

        let mut optional = discard.clone().optional();
        optional.settle_timeout_policy();
        assert_eq!(optional.on_timeout, TimeoutPolicy::SelectNone);
    }

    #[test]
    fn test_passive_modifiers() {
        let tool = EffectDescriptor::new(EffectOrigin::Tool)
            .with_node(EffectNode::new(Action::DamageModifier { side: ModifierSide::Defender, amount: -30 }));
        assert!(tool.is_passive());
        assert_eq!(tool.damage_modifiers(ModifierSide::Defender).sum::<i32>(), -30);
        assert_eq!(tool.damage_modifiers(ModifierSide::Attacker).count(), 0);

        let heal = EffectDescriptor::new(EffectOrigin::Trainer).with_node(EffectNode::new(Action::Heal {
            target: PokemonTarget::this(),
            amount: HealAmount::Amount(30),
        }));
        assert!(!heal.is_passive());
    }

    #[test]
    fn test_origin_display() {
        assert_eq!(EffectOrigin::SpecialEnergy.to_string(), "special energy");
    }
}
