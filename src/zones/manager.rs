//! Zone manager for card locations and ordering.
//!
//! Every card instance is in exactly one [`Location`]:
//! - a player's [`Zone`] (deck, hand, Active Spot, Bench, discard pile,
//!   Prizes, Lost Zone),
//! - the shared single-slot Stadium,
//! - attached to a Pokémon in play (Energy, Tools), or
//! - stacked on a Pokémon in play as one of its evolutions.
//!
//! The `ZoneManager` owns the ordering of each player's zones and the
//! Stadium slot. Attachments and evolution stacks are ordered on the host
//! `CardInstance`. Zones are persistent vectors so cloning the whole manager
//! for a snapshot is O(1).
//!
//! Index 0 of a pile is the bottom; the last element is the top.

use im::Vector;
use serde::{Deserialize, Serialize};

use crate::core::entity::InstanceId;
use crate::core::error::StructuralError;
use crate::core::player::{PlayerId, PlayerMap};
use crate::core::rng::SeededRng;

/// A player's zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Zone {
    Deck,
    Hand,
    Active,
    Bench,
    Discard,
    Prize,
    LostZone,
}

impl Zone {
    pub const ALL: [Zone; 7] = [
        Zone::Deck,
        Zone::Hand,
        Zone::Active,
        Zone::Bench,
        Zone::Discard,
        Zone::Prize,
        Zone::LostZone,
    ];

    const fn index(self) -> usize {
        match self {
            Zone::Deck => 0,
            Zone::Hand => 1,
            Zone::Active => 2,
            Zone::Bench => 3,
            Zone::Discard => 4,
            Zone::Prize => 5,
            Zone::LostZone => 6,
        }
    }

    /// Stable name for logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Zone::Deck => "deck",
            Zone::Hand => "hand",
            Zone::Active => "active",
            Zone::Bench => "bench",
            Zone::Discard => "discard",
            Zone::Prize => "prize",
            Zone::LostZone => "lost_zone",
        }
    }

    /// Whether Pokémon in this zone are in play.
    #[must_use]
    pub const fn is_in_play(self) -> bool {
        matches!(self, Zone::Active | Zone::Bench)
    }
}

/// Where a card instance is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Location {
    Zone(PlayerId, Zone),
    Stadium,
    Attached(InstanceId),
    Stacked(InstanceId),
}

impl Location {
    /// Whether this is the Active Spot or Bench of some player.
    #[must_use]
    pub fn is_in_play(self) -> bool {
        matches!(self, Location::Zone(_, zone) if zone.is_in_play())
    }

    /// The zone, if this is a player zone.
    #[must_use]
    pub fn zone(self) -> Option<(PlayerId, Zone)> {
        match self {
            Location::Zone(player, zone) => Some((player, zone)),
            _ => None,
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Location::Zone(player, zone) => write!(f, "{}:{}", player.0, zone.name()),
            Location::Stadium => f.write_str("stadium"),
            Location::Attached(host) => write!(f, "attached:{}", host.0),
            Location::Stacked(host) => write!(f, "stacked:{}", host.0),
        }
    }
}

/// Position for inserting a card into a zone.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZonePosition {
    /// Add to top of zone (e.g., top of deck).
    #[default]
    Top,
    /// Add to bottom of zone.
    Bottom,
    /// Insert at specific index (0 = bottom).
    Index(usize),
}

/// Manages zone ordering for both players and the Stadium slot.
///
/// ## Usage
///
/// ```
/// use ptcg_referee::core::{InstanceId, PlayerId};
/// use ptcg_referee::zones::{Zone, ZoneManager, ZonePosition};
///
/// let mut manager = ZoneManager::new(5);
/// let p0 = PlayerId::FIRST;
///
/// manager.insert(p0, Zone::Deck, InstanceId(10), ZonePosition::Top).unwrap();
/// manager.insert(p0, Zone::Deck, InstanceId(11), ZonePosition::Bottom).unwrap();
///
/// assert_eq!(manager.top(p0, Zone::Deck), Some(InstanceId(10)));
/// assert_eq!(manager.len(p0, Zone::Deck), 2);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneManager {
    piles: PlayerMap<[Vector<InstanceId>; 7]>,
    stadium: Option<InstanceId>,
    bench_capacity: usize,
}

impl ZoneManager {
    /// Create an empty manager with the given Bench size.
    #[must_use]
    pub fn new(bench_capacity: usize) -> Self {
        Self {
            piles: PlayerMap::with_default(),
            stadium: None,
            bench_capacity,
        }
    }

    /// Capacity of a zone, `None` for unbounded.
    #[must_use]
    pub fn capacity(&self, zone: Zone) -> Option<usize> {
        match zone {
            Zone::Active => Some(1),
            Zone::Bench => Some(self.bench_capacity),
            _ => None,
        }
    }

    /// Whether a zone has reached capacity.
    #[must_use]
    pub fn is_full(&self, player: PlayerId, zone: Zone) -> bool {
        self.capacity(zone)
            .is_some_and(|cap| self.len(player, zone) >= cap)
    }

    /// Add a card to a zone.
    pub fn insert(
        &mut self,
        player: PlayerId,
        zone: Zone,
        id: InstanceId,
        position: ZonePosition,
    ) -> Result<(), StructuralError> {
        if let Some(capacity) = self.capacity(zone) {
            if self.len(player, zone) >= capacity {
                return Err(StructuralError::LocationFull {
                    location: Location::Zone(player, zone),
                    capacity,
                });
            }
        }
        let pile = &mut self.piles[player][zone.index()];
        match position {
            ZonePosition::Top => pile.push_back(id),
            ZonePosition::Bottom => pile.push_front(id),
            ZonePosition::Index(i) => {
                let idx = i.min(pile.len());
                pile.insert(idx, id);
            }
        }
        Ok(())
    }

    /// Remove a card from a zone. Returns `false` if it was not there.
    pub fn remove(&mut self, player: PlayerId, zone: Zone, id: InstanceId) -> bool {
        let pile = &mut self.piles[player][zone.index()];
        match pile.index_of(&id) {
            Some(idx) => {
                pile.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Cards in a zone, bottom first.
    #[must_use]
    pub fn pile(&self, player: PlayerId, zone: Zone) -> &Vector<InstanceId> {
        &self.piles[player][zone.index()]
    }

    /// Cards in a zone as an owned list, bottom first.
    #[must_use]
    pub fn cards(&self, player: PlayerId, zone: Zone) -> Vec<InstanceId> {
        self.pile(player, zone).iter().copied().collect()
    }

    /// Top `n` cards of a zone, topmost first.
    #[must_use]
    pub fn top_n(&self, player: PlayerId, zone: Zone, n: usize) -> Vec<InstanceId> {
        self.pile(player, zone).iter().rev().take(n).copied().collect()
    }

    /// The top card of a zone.
    #[must_use]
    pub fn top(&self, player: PlayerId, zone: Zone) -> Option<InstanceId> {
        self.pile(player, zone).last().copied()
    }

    #[must_use]
    pub fn len(&self, player: PlayerId, zone: Zone) -> usize {
        self.pile(player, zone).len()
    }

    #[must_use]
    pub fn is_empty(&self, player: PlayerId, zone: Zone) -> bool {
        self.pile(player, zone).is_empty()
    }

    #[must_use]
    pub fn contains(&self, player: PlayerId, zone: Zone, id: InstanceId) -> bool {
        self.pile(player, zone).contains(&id)
    }

    /// Shuffle a zone with a generator built for this one shuffle.
    pub fn shuffle(&mut self, player: PlayerId, zone: Zone, rng: &mut SeededRng) {
        let pile = &mut self.piles[player][zone.index()];
        let mut cards: Vec<InstanceId> = pile.iter().copied().collect();
        rng.shuffle(&mut cards);
        *pile = cards.into_iter().collect();
    }

    /// Pokémon in play for a player, Active first.
    #[must_use]
    pub fn in_play(&self, player: PlayerId) -> Vec<InstanceId> {
        self.pile(player, Zone::Active)
            .iter()
            .chain(self.pile(player, Zone::Bench).iter())
            .copied()
            .collect()
    }

    /// The Active Pokémon.
    #[must_use]
    pub fn active(&self, player: PlayerId) -> Option<InstanceId> {
        self.top(player, Zone::Active)
    }

    /// The Stadium in play.
    #[must_use]
    pub fn stadium(&self) -> Option<InstanceId> {
        self.stadium
    }

    /// Put a card in the Stadium slot.
    pub fn set_stadium(&mut self, id: InstanceId) -> Result<(), StructuralError> {
        if self.stadium.is_some() {
            return Err(StructuralError::LocationFull {
                location: Location::Stadium,
                capacity: 1,
            });
        }
        self.stadium = Some(id);
        Ok(())
    }

    /// Empty the Stadium slot, returning what was there.
    pub fn take_stadium(&mut self) -> Option<InstanceId> {
        self.stadium.take()
    }

    /// Total cards tracked in player zones and the Stadium slot.
    #[must_use]
    pub fn total_cards(&self) -> usize {
        let zoned: usize = self
            .piles
            .iter()
            .map(|(_, piles)| piles.iter().map(Vector::len).sum::<usize>())
            .sum();
        zoned + usize::from(self.stadium.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::{DeterministicEntropy, EntropySource};

    const P0: PlayerId = PlayerId::FIRST;
    const P1: PlayerId = PlayerId::SECOND;

    #[test]
    fn test_positions() {
        let mut manager = ZoneManager::new(5);

        manager.insert(P0, Zone::Deck, InstanceId(10), ZonePosition::Top).unwrap();
        manager.insert(P0, Zone::Deck, InstanceId(11), ZonePosition::Bottom).unwrap();
        manager.insert(P0, Zone::Deck, InstanceId(12), ZonePosition::Top).unwrap();
        manager.insert(P0, Zone::Deck, InstanceId(13), ZonePosition::Index(1)).unwrap();

        assert_eq!(
            manager.cards(P0, Zone::Deck),
            vec![InstanceId(11), InstanceId(13), InstanceId(10), InstanceId(12)]
        );
        assert_eq!(manager.top_n(P0, Zone::Deck, 2), vec![InstanceId(12), InstanceId(10)]);
    }

    #[test]
    fn test_capacity() {
        let mut manager = ZoneManager::new(2);

        manager.insert(P0, Zone::Active, InstanceId(1), ZonePosition::Top).unwrap();
        let err = manager.insert(P0, Zone::Active, InstanceId(2), ZonePosition::Top).unwrap_err();
        assert!(matches!(err, StructuralError::LocationFull { capacity: 1, .. }));

        manager.insert(P0, Zone::Bench, InstanceId(3), ZonePosition::Top).unwrap();
        manager.insert(P0, Zone::Bench, InstanceId(4), ZonePosition::Top).unwrap();
        assert!(manager.is_full(P0, Zone::Bench));
        assert!(!manager.is_full(P1, Zone::Bench));
        assert!(manager.insert(P0, Zone::Bench, InstanceId(5), ZonePosition::Top).is_err());
    }

    #[test]
    fn test_remove() {
        let mut manager = ZoneManager::new(5);
        manager.insert(P1, Zone::Hand, InstanceId(7), ZonePosition::Top).unwrap();

        assert!(manager.remove(P1, Zone::Hand, InstanceId(7)));
        assert!(!manager.remove(P1, Zone::Hand, InstanceId(7)));
        assert!(manager.is_empty(P1, Zone::Hand));
    }

    #[test]
    fn test_stadium_single_slot() {
        let mut manager = ZoneManager::new(5);
        manager.set_stadium(InstanceId(1)).unwrap();
        assert!(manager.set_stadium(InstanceId(2)).is_err());
        assert_eq!(manager.take_stadium(), Some(InstanceId(1)));
        assert_eq!(manager.stadium(), None);
    }

    #[test]
    fn test_shuffle_preserves_membership() {
        let mut manager = ZoneManager::new(5);
        for i in 0..20 {
            manager.insert(P0, Zone::Deck, InstanceId(i), ZonePosition::Top).unwrap();
        }
        let seed = DeterministicEntropy::new(11).next_seed();
        manager.shuffle(P0, Zone::Deck, &mut SeededRng::from_seed(&seed));

        let mut cards = manager.cards(P0, Zone::Deck);
        assert_ne!(cards, (0..20).map(InstanceId).collect::<Vec<_>>());
        cards.sort();
        assert_eq!(cards, (0..20).map(InstanceId).collect::<Vec<_>>());
    }

    #[test]
    fn test_in_play_active_first() {
        let mut manager = ZoneManager::new(5);
        manager.insert(P0, Zone::Bench, InstanceId(2), ZonePosition::Top).unwrap();
        manager.insert(P0, Zone::Active, InstanceId(1), ZonePosition::Top).unwrap();

        assert_eq!(manager.in_play(P0), vec![InstanceId(1), InstanceId(2)]);
        assert_eq!(manager.active(P0), Some(InstanceId(1)));
        assert_eq!(manager.total_cards(), 2);
    }

    #[test]
    fn test_location_display() {
        assert_eq!(Location::Zone(P1, Zone::LostZone).to_string(), "1:lost_zone");
        assert_eq!(Location::Attached(InstanceId(4)).to_string(), "attached:4");
        assert!(Location::Zone(P0, Zone::Bench).is_in_play());
        assert!(!Location::Stacked(InstanceId(4)).is_in_play());
    }
}
