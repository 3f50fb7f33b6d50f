//! Game state: the canonical in-memory match record.
//!
//! ## GameState
//!
//! - Phase, turn number, active player
//! - Zone manager (ordering of every zone, Stadium slot)
//! - Card instance arena, keyed by `InstanceId`
//! - Per-player usage counters (turn and game scope)
//! - Append-only game log and the seed trail
//!
//! Owned exclusively by the Referee and mutated only through
//! [`crate::ops::AtomicOps`]. Every collection is an `im` persistent
//! structure, so `snapshot()` is O(1) and an in-flight action can be rolled
//! back by restoring the snapshot taken before it started.

use im::{OrdMap, Vector};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::config::{Phase, RefereeConfig};
use super::entity::InstanceId;
use super::error::{SnapshotError, StructuralError};
use super::log::GameLogEntry;
use super::player::{PlayerId, PlayerMap};
use super::rng::Seed;
use crate::cards::{CardCatalog, CardDefinition, CardId, CardInstance, EnergyType};
use crate::rules::GameOutcome;
use crate::zones::{Location, Zone, ZoneManager, ZonePosition};

/// Reset boundary of a usage counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UsageScope {
    /// Cleared when the player's turn ends.
    Turn,
    /// Never cleared.
    Game,
    /// Stored on the instance, cleared when it leaves play.
    Instance(InstanceId),
}

/// Per-player counters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerBoard {
    pub turn_usage: FxHashMap<String, u32>,
    pub game_usage: FxHashMap<String, u32>,
    /// Extra Prizes taken per Knock Out by this player (may be negative).
    pub prize_delta: i32,
    /// Set when this player had to draw from an empty deck at their draw step.
    pub decked_out: bool,
}

/// Read-only view of one zone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneSnapshot {
    pub player: PlayerId,
    pub zone: Zone,
    /// Instances, bottom first.
    pub instances: Vec<InstanceId>,
    /// Current definitions, parallel to `instances`.
    pub cards: Vec<CardId>,
}

/// Complete match state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub match_id: String,

    pub phase: Phase,

    /// Turn number, 0 during setup, 1 for the first player's first turn.
    pub turn_number: u32,

    /// Whose turn it is.
    pub active_player: PlayerId,

    /// Who took the first turn, decided at setup.
    pub first_player: Option<PlayerId>,

    pub zones: ZoneManager,

    instances: OrdMap<InstanceId, CardInstance>,

    pub players: PlayerMap<PlayerBoard>,

    /// Append-only game log.
    pub log: Vector<GameLogEntry>,

    /// Every consumed seed, in order.
    pub seed_trail: Vector<Seed>,

    /// Set once the match has been decided.
    pub outcome: Option<GameOutcome>,
}

impl GameState {
    /// Create the state for a new match.
    ///
    /// Creates one `CardInstance` per deck card, all in their owner's deck in
    /// list order (last card on top). Decks must have exactly
    /// `config.deck_size` known cards, at least one Basic Pokémon, and at
    /// most `config.max_copies` of any card name other than basic Energy.
    pub fn new_match(
        match_id: impl Into<String>,
        config: &RefereeConfig,
        decks: &PlayerMap<Vec<CardId>>,
        catalog: &dyn CardCatalog,
    ) -> Result<Self, StructuralError> {
        let mut state = Self {
            match_id: match_id.into(),
            phase: Phase::Setup,
            turn_number: 0,
            active_player: PlayerId::FIRST,
            first_player: None,
            zones: ZoneManager::new(config.bench_size),
            instances: OrdMap::new(),
            players: PlayerMap::with_default(),
            log: Vector::new(),
            seed_trail: Vector::new(),
            outcome: None,
        };

        let mut next_id = 0u32;
        for (player, deck) in decks.iter() {
            validate_deck(player, deck, config, catalog)?;
            for &card in deck {
                let id = InstanceId(next_id);
                next_id += 1;
                state.instances.insert(id, CardInstance::new(id, card, player));
                state.zones.insert(player, Zone::Deck, id, ZonePosition::Top)?;
            }
        }

        Ok(state)
    }

    // === Instances ===

    /// Get a card instance.
    #[must_use]
    pub fn get(&self, id: InstanceId) -> Option<&CardInstance> {
        self.instances.get(&id)
    }

    /// Get a card instance or a structural error.
    pub fn instance(&self, id: InstanceId) -> Result<&CardInstance, StructuralError> {
        self.instances.get(&id).ok_or(StructuralError::UnknownInstance(id))
    }

    pub(crate) fn instance_mut(&mut self, id: InstanceId) -> Result<&mut CardInstance, StructuralError> {
        self.instances.get_mut(&id).ok_or(StructuralError::UnknownInstance(id))
    }

    /// Iterate over every instance, in id order.
    pub fn instances(&self) -> impl Iterator<Item = &CardInstance> {
        self.instances.values()
    }

    /// Number of instances in the match.
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Current definition of an instance.
    pub fn definition<'c>(
        &self,
        catalog: &'c dyn CardCatalog,
        id: InstanceId,
    ) -> Result<&'c CardDefinition, StructuralError> {
        let card = self.instance(id)?.card;
        catalog.card(card).ok_or(StructuralError::UnknownCard(card))
    }

    // === Board queries ===

    /// A player's Active Pokémon.
    #[must_use]
    pub fn active(&self, player: PlayerId) -> Option<InstanceId> {
        self.zones.active(player)
    }

    /// A player's Benched Pokémon, in placement order.
    #[must_use]
    pub fn bench(&self, player: PlayerId) -> Vec<InstanceId> {
        self.zones.cards(player, Zone::Bench)
    }

    /// A player's Pokémon in play, Active first.
    #[must_use]
    pub fn in_play(&self, player: PlayerId) -> Vec<InstanceId> {
        self.zones.in_play(player)
    }

    /// A player's hand.
    #[must_use]
    pub fn hand(&self, player: PlayerId) -> Vec<InstanceId> {
        self.zones.cards(player, Zone::Hand)
    }

    #[must_use]
    pub fn deck_size(&self, player: PlayerId) -> usize {
        self.zones.len(player, Zone::Deck)
    }

    #[must_use]
    pub fn prizes_remaining(&self, player: PlayerId) -> usize {
        self.zones.len(player, Zone::Prize)
    }

    /// First instance of `card` in a zone, from the top.
    #[must_use]
    pub fn find_in_zone(&self, player: PlayerId, zone: Zone, card: CardId) -> Option<InstanceId> {
        self.zones
            .pile(player, zone)
            .iter()
            .rev()
            .copied()
            .find(|id| self.get(*id).is_some_and(|c| c.card == card))
    }

    /// Read-only copy of one zone.
    #[must_use]
    pub fn zone_snapshot(&self, player: PlayerId, zone: Zone) -> ZoneSnapshot {
        let instances = self.zones.cards(player, zone);
        let cards = instances
            .iter()
            .filter_map(|id| self.get(*id).map(|c| c.card))
            .collect();
        ZoneSnapshot {
            player,
            zone,
            instances,
            cards,
        }
    }

    /// Energy units provided by everything attached to a Pokémon.
    #[must_use]
    pub fn energy_provided(&self, catalog: &dyn CardCatalog, pokemon: InstanceId) -> Vec<EnergyType> {
        let Some(host) = self.get(pokemon) else {
            return Vec::new();
        };
        host.attached
            .iter()
            .filter_map(|id| self.get(*id))
            .filter_map(|card| catalog.card(card.card))
            .filter(|def| def.is_energy())
            .flat_map(|def| def.provides.iter().copied())
            .collect()
    }

    /// Energy cards attached to a Pokémon.
    #[must_use]
    pub fn attached_energy(&self, catalog: &dyn CardCatalog, pokemon: InstanceId) -> Vec<InstanceId> {
        self.attached_where(catalog, pokemon, CardDefinition::is_energy)
    }

    /// Pokémon Tools attached to a Pokémon.
    #[must_use]
    pub fn attached_tools(&self, catalog: &dyn CardCatalog, pokemon: InstanceId) -> Vec<InstanceId> {
        self.attached_where(catalog, pokemon, |def| {
            def.trainer_kind() == Some(crate::cards::TrainerKind::Tool)
        })
    }

    fn attached_where(
        &self,
        catalog: &dyn CardCatalog,
        pokemon: InstanceId,
        predicate: impl Fn(&CardDefinition) -> bool,
    ) -> Vec<InstanceId> {
        let Some(host) = self.get(pokemon) else {
            return Vec::new();
        };
        host.attached
            .iter()
            .copied()
            .filter(|id| {
                self.get(*id)
                    .and_then(|c| catalog.card(c.card))
                    .is_some_and(&predicate)
            })
            .collect()
    }

    // === Usage counters ===

    /// Read a usage counter.
    #[must_use]
    pub fn usage_count(&self, player: PlayerId, scope: UsageScope, key: &str) -> u32 {
        match scope {
            UsageScope::Turn => self.players[player].turn_usage.get(key).copied().unwrap_or(0),
            UsageScope::Game => self.players[player].game_usage.get(key).copied().unwrap_or(0),
            UsageScope::Instance(id) => self.get(id).map_or(0, |c| c.usage_count(key)),
        }
    }

    // === Consistency ===

    /// Check that every instance is listed exactly where its `location` says.
    pub fn verify_locations(&self) -> Result<(), StructuralError> {
        for card in self.instances.values() {
            let listed = match card.location {
                Location::Zone(player, zone) => self.zones.contains(player, zone, card.id),
                Location::Stadium => self.zones.stadium() == Some(card.id),
                Location::Attached(host) => self.get(host).is_some_and(|h| h.attached.contains(&card.id)),
                Location::Stacked(host) => self
                    .get(host)
                    .is_some_and(|h| h.layers.iter().any(|l| l.evolution == card.id)),
            };
            if !listed {
                return Err(StructuralError::NotAt {
                    instance: card.id,
                    expected: card.location,
                });
            }
        }
        Ok(())
    }

    // === Snapshots ===

    /// O(1) copy of the whole state.
    #[must_use]
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    /// Encode the state for persistence.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        Ok(bincode::serialize(self)?)
    }

    /// Reconstruct a state from `to_bytes` output.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

fn validate_deck(
    player: PlayerId,
    deck: &[CardId],
    config: &RefereeConfig,
    catalog: &dyn CardCatalog,
) -> Result<(), StructuralError> {
    let invalid = |reason: String| StructuralError::InvalidDeck { player, reason };

    if deck.len() != config.deck_size {
        return Err(invalid(format!(
            "deck has {} cards, expected {}",
            deck.len(),
            config.deck_size
        )));
    }

    let mut copies: FxHashMap<&str, usize> = FxHashMap::default();
    let mut has_basic = false;
    for &card in deck {
        let def = catalog.card(card).ok_or(StructuralError::UnknownCard(card))?;
        has_basic |= def.is_basic_pokemon();
        if def.copy_limited() {
            let count = copies.entry(def.name.as_str()).or_default();
            *count += 1;
            if *count > config.max_copies {
                return Err(invalid(format!(
                    "more than {} copies of {}",
                    config.max_copies, def.name
                )));
            }
        }
    }

    if !has_basic {
        return Err(invalid("deck has no Basic Pokémon".into()));
    }
    Ok(())
}
