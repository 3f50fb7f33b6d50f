//! Reactive trigger registry.
//!
//! The registry indexes which card definitions carry reactive abilities and
//! finds the ones an event fires. It is built once per match from the parsed
//! ability descriptors; it never orders what it finds. When several triggers
//! fire together the affected player chooses the order.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::event::{GameEvent, TriggerKind};
use crate::cards::CardId;
use crate::core::{GameState, InstanceId, PlayerId};

/// One reactive ability printed on a card.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEntry {
    /// Index into the card's abilities.
    pub ability: usize,
    pub name: String,
    pub kind: TriggerKind,
}

/// A reactive ability fired by an event, ready to resolve.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactiveTrigger {
    /// The Pokémon whose ability fired.
    pub source: InstanceId,
    /// Definition the ability was printed on.
    pub card: CardId,
    /// Who controls the ability and makes its choices.
    pub owner: PlayerId,
    pub ability: usize,
    pub name: String,
    pub kind: TriggerKind,
    /// The attacking Pokémon, for attack-driven events.
    pub attacker: Option<InstanceId>,
}

/// Index of reactive abilities by card definition.
#[derive(Clone, Debug, Default)]
pub struct TriggerRegistry {
    by_card: FxHashMap<CardId, Vec<TriggerEntry>>,
}

impl TriggerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a reactive ability of `card`.
    pub fn register(&mut self, card: CardId, entry: TriggerEntry) {
        self.by_card.entry(card).or_default().push(entry);
    }

    /// Reactive abilities of one definition.
    #[must_use]
    pub fn entries(&self, card: CardId) -> &[TriggerEntry] {
        self.by_card.get(&card).map(Vec::as_slice).unwrap_or(&[])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_card.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_card.is_empty()
    }

    /// Triggers `event` fires, in board order (Active before Bench).
    ///
    /// For `KnockedOut` events the subject is read before it leaves play, so
    /// call this before discarding it.
    #[must_use]
    pub fn fired(&self, state: &GameState, event: &GameEvent) -> Vec<ReactiveTrigger> {
        let subjects: Vec<InstanceId> = match event.subject {
            Some(subject) => vec![subject],
            None => PlayerId::both().flat_map(|p| state.in_play(p)).collect(),
        };

        let mut fired = Vec::new();
        for subject in subjects {
            let Some(instance) = state.get(subject) else {
                continue;
            };
            if !instance.location.is_in_play() {
                continue;
            }
            for entry in self.entries(instance.card) {
                if entry.kind != event.kind {
                    continue;
                }
                if entry.kind == TriggerKind::KnockedOut && event.attacker.is_none() {
                    continue;
                }
                fired.push(ReactiveTrigger {
                    source: subject,
                    card: instance.card,
                    owner: instance.owner,
                    ability: entry.ability,
                    name: entry.name.clone(),
                    kind: entry.kind,
                    attacker: event.attacker,
                });
            }
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::{CardCatalog, CardDefinition, CardRegistry, EnergyType};
    use crate::core::{DeterministicEntropy, PlayerMap, RefereeConfig};
    use crate::core::Actor;
    use crate::ops::AtomicOps;
    use crate::zones::{Location, Zone, ZonePosition};

    fn setup() -> (CardRegistry, GameState) {
        let catalog = CardRegistry::new().with_cards([
            CardDefinition::pokemon(CardId(1), "Spiky", 90),
            CardDefinition::pokemon(CardId(2), "Plain", 60),
            CardDefinition::basic_energy(CardId(3), EnergyType::Grass),
        ]).unwrap();
        let mut deck = vec![CardId(1); 2];
        deck.extend([CardId(2); 2]);
        deck.extend(std::iter::repeat(CardId(3)).take(56));
        let state = GameState::new_match("t", &RefereeConfig::default(), &PlayerMap::with_value(deck), &catalog)
            .unwrap();
        (catalog, state)
    }

    fn registry() -> TriggerRegistry {
        let mut registry = TriggerRegistry::new();
        registry.register(
            CardId(1),
            TriggerEntry {
                ability: 0,
                name: "Rough Skin".into(),
                kind: TriggerKind::DamagedByAttack,
            },
        );
        registry.register(
            CardId(1),
            TriggerEntry {
                ability: 1,
                name: "Regrowth".into(),
                kind: TriggerKind::BetweenTurns,
            },
        );
        registry
    }

    fn put_in_play(state: &mut GameState, catalog: &dyn CardCatalog, player: PlayerId, card: CardId, zone: Zone) -> InstanceId {
        let id = state.find_in_zone(player, Zone::Deck, card).unwrap();
        let mut entropy = DeterministicEntropy::new(0);
        AtomicOps::new(state, &mut entropy, catalog, Actor::Referee)
            .move_card(id, Location::Zone(player, zone), ZonePosition::Top)
            .unwrap();
        id
    }

    #[test]
    fn test_damaged_trigger_fires_for_subject_only() {
        let (catalog, mut state) = setup();
        let spiky = put_in_play(&mut state, &catalog, PlayerId::FIRST, CardId(1), Zone::Active);
        let plain = put_in_play(&mut state, &catalog, PlayerId::SECOND, CardId(2), Zone::Active);

        let registry = registry();
        let fired = registry.fired(&state, &GameEvent::damaged_by_attack(spiky, plain));
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].name, "Rough Skin");
        assert_eq!(fired[0].attacker, Some(plain));

        assert!(registry.fired(&state, &GameEvent::damaged_by_attack(plain, spiky)).is_empty());
    }

    #[test]
    fn test_between_turns_scans_both_boards() {
        let (catalog, mut state) = setup();
        put_in_play(&mut state, &catalog, PlayerId::FIRST, CardId(1), Zone::Active);
        put_in_play(&mut state, &catalog, PlayerId::SECOND, CardId(1), Zone::Bench);
        put_in_play(&mut state, &catalog, PlayerId::SECOND, CardId(2), Zone::Active);

        let fired = registry().fired(&state, &GameEvent::between_turns());
        let owners: Vec<PlayerId> = fired.iter().map(|t| t.owner).collect();
        assert_eq!(owners, vec![PlayerId::FIRST, PlayerId::SECOND]);
    }

    #[test]
    fn test_not_in_play_does_not_fire() {
        let (_, state) = setup();
        let in_deck = state.find_in_zone(PlayerId::FIRST, Zone::Deck, CardId(1)).unwrap();
        assert!(registry()
            .fired(&state, &GameEvent::damaged_by_attack(in_deck, InstanceId(0)))
            .is_empty());
    }
}
