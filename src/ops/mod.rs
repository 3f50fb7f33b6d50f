//! Atomic Operation Layer.
//!
//! `AtomicOps` is the only code that mutates [`GameState`]. Each primitive:
//!
//! 1. validates structural preconditions only (the ids exist, the
//!    destination has room),
//! 2. performs the mutation,
//! 3. appends one [`GameLogEntry`] per logical sub-unit (per card moved,
//!    per coin flipped),
//! 4. returns the concrete outcome so the caller can react deterministically.
//!
//! Primitives know nothing about card text and never check game rules: a
//! primitive fails only when the request is physically impossible. Rule
//! legality is the Referee's job, checked before any primitive runs.
//!
//! ## Randomness
//!
//! Every random primitive draws a fresh seed from the [`EntropySource`],
//! appends it to the seed trail and logs a `seed` entry *before* deriving
//! the outcome from it.

use smallvec::SmallVec;

use crate::cards::{CardCatalog, CardDefinition, CardId, DisabledAttack, EvolutionLayer, SpecialCondition};
use crate::core::{
    Actor, EntropySource, GameLogEntry, GameState, InstanceId, Payload, Phase, PlayerId, Seed, SeededRng,
    StructuralError, UsageScope, ZoneSnapshot,
};
use crate::rules::GameOutcome;
use crate::zones::{Location, Zone, ZonePosition};

type OpResult<T> = Result<T, StructuralError>;

/// A single card relocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MoveOutcome {
    pub card: InstanceId,
    pub from: Location,
    pub to: Location,
}

/// Damage before and after an update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DamageChange {
    pub target: InstanceId,
    pub before: u32,
    pub after: u32,
}

impl DamageChange {
    /// Whether the damage value actually moved.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.before != self.after
    }
}

/// Cards drawn, and how many could not be drawn from an empty deck.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DrawOutcome {
    pub drawn: Vec<InstanceId>,
    pub missing: usize,
}

/// Result of one coin flip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CoinFlip {
    pub heads: bool,
    pub seed: Seed,
}

/// Logged, structural-only mutations of one match.
pub struct AtomicOps<'a> {
    state: &'a mut GameState,
    entropy: &'a mut dyn EntropySource,
    catalog: &'a dyn CardCatalog,
    actor: Actor,
}

impl<'a> AtomicOps<'a> {
    pub fn new(
        state: &'a mut GameState,
        entropy: &'a mut dyn EntropySource,
        catalog: &'a dyn CardCatalog,
        actor: Actor,
    ) -> Self {
        Self {
            state,
            entropy,
            catalog,
            actor,
        }
    }

    /// Read-only view of the state.
    #[must_use]
    pub fn state(&self) -> &GameState {
        self.state
    }

    #[must_use]
    pub fn catalog(&self) -> &'a dyn CardCatalog {
        self.catalog
    }

    #[must_use]
    pub fn actor(&self) -> Actor {
        self.actor
    }

    /// Attribute subsequent log entries to `actor`.
    pub fn set_actor(&mut self, actor: Actor) {
        self.actor = actor;
    }

    /// Current definition of an instance.
    pub fn definition(&self, id: InstanceId) -> OpResult<&'a CardDefinition> {
        self.state.definition(self.catalog, id)
    }

    /// Definition by card id.
    pub fn card(&self, card: CardId) -> OpResult<&'a CardDefinition> {
        self.catalog.card(card).ok_or(StructuralError::UnknownCard(card))
    }

    // === Logging ===

    fn append(&mut self, action: &str, payload: Payload, random_seed: Option<Seed>) {
        let entry = GameLogEntry {
            sequence: self.state.log.len() as u64,
            match_id: self.state.match_id.clone(),
            actor: self.actor,
            action: action.to_string(),
            payload,
            random_seed,
            timestamp: GameLogEntry::now_millis(),
        };
        tracing::trace!(sequence = entry.sequence, action, "log entry");
        self.state.log.push_back(entry);
    }

    fn log(&mut self, action: &str, payload: Payload) {
        self.append(action, payload, None);
    }

    /// Draw a fresh seed and persist it before anything consumes it.
    fn fresh_seed(&mut self, purpose: &str) -> Seed {
        let seed = self.entropy.next_seed();
        self.state.seed_trail.push_back(seed);
        self.append("seed", Payload::new().with("purpose", purpose), Some(seed));
        seed
    }

    /// Record a referee annotation (phase notes, rejected choices).
    pub fn note(&mut self, action: &str, payload: Payload) {
        self.log(action, payload);
    }

    // === Queries ===

    /// Deck cards whose definition matches `filter`, topmost first.
    pub fn deck_query(&mut self, player: PlayerId, filter: &dyn Fn(&CardDefinition) -> bool) -> Vec<InstanceId> {
        let matches: Vec<InstanceId> = self
            .state
            .zones
            .pile(player, Zone::Deck)
            .iter()
            .rev()
            .copied()
            .filter(|id| self.definition(*id).is_ok_and(|def| filter(def)))
            .collect();
        self.log(
            "deck_query",
            Payload::new().with("player", player.0).with("matches", matches.len()),
        );
        matches
    }

    /// Cards in `zone` whose definition matches `filter`, in pile order.
    #[must_use]
    pub fn zone_query(&self, player: PlayerId, zone: Zone, filter: &dyn Fn(&CardDefinition) -> bool) -> Vec<InstanceId> {
        self.state
            .zones
            .pile(player, zone)
            .iter()
            .copied()
            .filter(|id| self.definition(*id).is_ok_and(|def| filter(def)))
            .collect()
    }

    /// Reveal the top `n` cards of a deck without moving them, topmost first.
    pub fn reveal_top(&mut self, player: PlayerId, n: usize) -> Vec<InstanceId> {
        let revealed = self.state.zones.top_n(player, Zone::Deck, n);
        for id in &revealed {
            let card = self.state.get(*id).map(|c| c.card);
            self.log(
                "reveal",
                Payload::new()
                    .with("player", player.0)
                    .with("card", id)
                    .with("definition", card.map_or(String::new(), |c| c.to_string())),
            );
        }
        revealed
    }

    /// Read-only snapshot of a zone.
    #[must_use]
    pub fn zone_snapshot(&self, player: PlayerId, zone: Zone) -> ZoneSnapshot {
        self.state.zone_snapshot(player, zone)
    }

    /// Whether a Pokémon in play has damage at or above its HP.
    pub fn check_knockout(&mut self, id: InstanceId) -> OpResult<bool> {
        let instance = self.state.instance(id)?;
        if !instance.location.is_in_play() {
            return Err(StructuralError::NotInPlay(id));
        }
        let damage = instance.damage;
        let hp = self.definition(id)?.hp;
        let knocked_out = damage >= hp;
        self.log(
            "check_knockout",
            Payload::new()
                .with("card", id)
                .with("damage", damage)
                .with("hp", hp)
                .with("knocked_out", knocked_out),
        );
        Ok(knocked_out)
    }

    // === Movement ===

    /// Move one card to a new location.
    ///
    /// A Pokémon leaving play takes its attachments and evolution cards to
    /// its owner's discard pile and forgets its in-play state. A Pokémon
    /// moving from the Active Spot to the Bench loses its Special Conditions.
    pub fn move_card(&mut self, id: InstanceId, to: Location, position: ZonePosition) -> OpResult<MoveOutcome> {
        let from = self.state.instance(id)?.location;
        self.check_destination(id, from, to)?;

        self.detach_from(id, from)?;
        let leaving_play = from.is_in_play() && !to.is_in_play();
        if leaving_play {
            self.clear_in_play(id)?;
        } else if matches!(from, Location::Zone(_, Zone::Active)) && to != from {
            self.state.instance_mut(id)?.conditions.clear();
        }
        self.insert_at(id, to, position)?;

        let turn = self.state.turn_number;
        let instance = self.state.instance_mut(id)?;
        instance.location = to;
        if to.is_in_play() && !from.is_in_play() {
            instance.entered_turn = Some(turn);
        }

        self.log(
            "move",
            Payload::new().with("card", id).with("from", from).with("to", to),
        );
        Ok(MoveOutcome { card: id, from, to })
    }

    /// Move several cards, one log entry each.
    pub fn move_cards(&mut self, ids: &[InstanceId], to: Location, position: ZonePosition) -> OpResult<Vec<MoveOutcome>> {
        ids.iter().map(|id| self.move_card(*id, to, position)).collect()
    }

    fn check_destination(&self, id: InstanceId, from: Location, to: Location) -> OpResult<()> {
        match to {
            Location::Zone(player, zone) => {
                if from != to && self.state.zones.is_full(player, zone) {
                    return Err(StructuralError::LocationFull {
                        location: to,
                        capacity: self.state.zones.capacity(zone).unwrap_or(0),
                    });
                }
            }
            Location::Stadium => {
                if self.state.zones.stadium().is_some_and(|s| s != id) {
                    return Err(StructuralError::LocationFull { location: to, capacity: 1 });
                }
            }
            Location::Attached(host) => {
                if host == id {
                    return Err(StructuralError::InvalidDestination(to));
                }
                if !self.state.instance(host)?.location.is_in_play() {
                    return Err(StructuralError::NotInPlay(host));
                }
            }
            Location::Stacked(_) => return Err(StructuralError::InvalidDestination(to)),
        }
        if let Location::Stacked(_) = from {
            return Err(StructuralError::InvalidDestination(from));
        }
        Ok(())
    }

    fn detach_from(&mut self, id: InstanceId, from: Location) -> OpResult<()> {
        match from {
            Location::Zone(player, zone) => {
                if !self.state.zones.remove(player, zone, id) {
                    return Err(StructuralError::NotAt { instance: id, expected: from });
                }
            }
            Location::Stadium => {
                self.state.zones.take_stadium();
            }
            Location::Attached(host) => {
                let host = self.state.instance_mut(host)?;
                host.attached.retain(|a| *a != id);
            }
            Location::Stacked(_) => return Err(StructuralError::InvalidDestination(from)),
        }
        Ok(())
    }

    fn insert_at(&mut self, id: InstanceId, to: Location, position: ZonePosition) -> OpResult<()> {
        match to {
            Location::Zone(player, zone) => self.state.zones.insert(player, zone, id, position),
            Location::Stadium => self.state.zones.set_stadium(id),
            Location::Attached(host) => {
                self.state.instance_mut(host)?.attached.push(id);
                Ok(())
            }
            Location::Stacked(_) => Err(StructuralError::InvalidDestination(to)),
        }
    }

    /// Send attachments and evolution cards to the discard pile and reset.
    fn clear_in_play(&mut self, id: InstanceId) -> OpResult<()> {
        let instance = self.state.instance_mut(id)?;
        let attached: SmallVec<[InstanceId; 4]> = std::mem::take(&mut instance.attached);
        let stacked = instance.reset_in_play_state();

        for card in attached.into_iter().chain(stacked) {
            let owner = self.state.instance(card)?.owner;
            let to = Location::Zone(owner, Zone::Discard);
            let from = self.state.instance(card)?.location;
            self.state.zones.insert(owner, Zone::Discard, card, ZonePosition::Top)?;
            self.state.instance_mut(card)?.location = to;
            self.log(
                "move",
                Payload::new().with("card", card).with("from", from).with("to", to),
            );
        }
        Ok(())
    }

    /// Attach an Energy or Tool to a Pokémon in play.
    pub fn attach(&mut self, card: InstanceId, host: InstanceId) -> OpResult<MoveOutcome> {
        self.move_card(card, Location::Attached(host), ZonePosition::Top)
    }

    /// Detach a card from `host` and move it to `to`.
    pub fn detach(&mut self, card: InstanceId, host: InstanceId, to: Location) -> OpResult<MoveOutcome> {
        if self.state.instance(card)?.location != Location::Attached(host) {
            return Err(StructuralError::NotAttached { card, host });
        }
        self.move_card(card, to, ZonePosition::Top)
    }

    /// Put a card in its owner's discard pile.
    pub fn discard(&mut self, id: InstanceId) -> OpResult<MoveOutcome> {
        let owner = self.state.instance(id)?.owner;
        self.move_card(id, Location::Zone(owner, Zone::Discard), ZonePosition::Top)
    }

    /// Put a card in its owner's Lost Zone.
    pub fn send_to_lost_zone(&mut self, id: InstanceId) -> OpResult<MoveOutcome> {
        let owner = self.state.instance(id)?.owner;
        self.move_card(id, Location::Zone(owner, Zone::LostZone), ZonePosition::Top)
    }

    /// Exchange the Active Pokémon with a Benched one.
    ///
    /// With an empty Active Spot the Benched Pokémon is simply promoted.
    pub fn swap_active_with_bench(&mut self, player: PlayerId, bench: InstanceId) -> OpResult<()> {
        let bench_location = Location::Zone(player, Zone::Bench);
        if self.state.instance(bench)?.location != bench_location {
            return Err(StructuralError::NotAt { instance: bench, expected: bench_location });
        }
        let slot = self
            .state
            .zones
            .pile(player, Zone::Bench)
            .index_of(&bench)
            .unwrap_or(0);

        let previous = self.state.active(player);
        self.state.zones.remove(player, Zone::Bench, bench);
        if let Some(active) = previous {
            self.state.zones.remove(player, Zone::Active, active);
            self.state.zones.insert(player, Zone::Bench, active, ZonePosition::Index(slot))?;
            let outgoing = self.state.instance_mut(active)?;
            outgoing.location = bench_location;
            outgoing.conditions.clear();
        }
        self.state.zones.insert(player, Zone::Active, bench, ZonePosition::Top)?;
        self.state.instance_mut(bench)?.location = Location::Zone(player, Zone::Active);

        let mut payload = Payload::new().with("player", player.0).with("promoted", bench);
        if let Some(active) = previous {
            payload = payload.with("benched", active);
        }
        self.log("switch", payload);
        Ok(())
    }

    // === Damage and conditions ===

    /// Add (positive) or remove (negative) damage, clamped to `[0, HP]`.
    pub fn update_damage(&mut self, target: InstanceId, delta: i32) -> OpResult<DamageChange> {
        let hp = self.definition(target)?.hp;
        let instance = self.state.instance_mut(target)?;
        if !instance.location.is_in_play() {
            return Err(StructuralError::NotInPlay(target));
        }
        let before = instance.damage;
        let after = (i64::from(before) + i64::from(delta)).clamp(0, i64::from(hp)) as u32;
        instance.damage = after;
        self.log(
            "update_damage",
            Payload::new()
                .with("card", target)
                .with("delta", delta)
                .with("before", before)
                .with("after", after),
        );
        Ok(DamageChange { target, before, after })
    }

    /// Apply a Special Condition. Returns `true` if it was newly applied.
    pub fn set_condition(&mut self, target: InstanceId, condition: SpecialCondition) -> OpResult<bool> {
        let instance = self.state.instance_mut(target)?;
        if !instance.location.is_in_play() {
            return Err(StructuralError::NotInPlay(target));
        }
        let changed = instance.conditions.insert(condition);
        self.log(
            "set_condition",
            Payload::new()
                .with("card", target)
                .with("condition", condition)
                .with("changed", changed),
        );
        Ok(changed)
    }

    /// Remove a Special Condition. Returns `true` if it was present.
    pub fn clear_condition(&mut self, target: InstanceId, condition: SpecialCondition) -> OpResult<bool> {
        let removed = self.state.instance_mut(target)?.conditions.remove(condition);
        self.log(
            "clear_condition",
            Payload::new()
                .with("card", target)
                .with("condition", condition)
                .with("removed", removed),
        );
        Ok(removed)
    }

    /// Block an attack of a Pokémon until a turn has passed.
    pub fn set_disabled_attack(&mut self, target: InstanceId, disabled: DisabledAttack) -> OpResult<()> {
        let payload = Payload::new()
            .with("card", target)
            .with("attack", disabled.attack.as_deref().unwrap_or("*"))
            .with("through_turn", disabled.through_turn);
        self.state.instance_mut(target)?.disabled_attack = Some(disabled);
        self.log("disable_attack", payload);
        Ok(())
    }

    // === Randomness ===

    /// Shuffle a zone with a fresh, logged seed.
    pub fn shuffle(&mut self, player: PlayerId, zone: Zone) -> Seed {
        let seed = self.fresh_seed("shuffle");
        self.state.zones.shuffle(player, zone, &mut SeededRng::from_seed(&seed));
        self.log(
            "shuffle",
            Payload::new()
                .with("player", player.0)
                .with("zone", zone.name())
                .with("cards", self.state.zones.len(player, zone)),
        );
        seed
    }

    /// Flip one coin with a fresh, logged seed.
    pub fn flip_coin(&mut self) -> CoinFlip {
        let seed = self.fresh_seed("coin_flip");
        let heads = SeededRng::from_seed(&seed).flip_coin();
        self.log(
            "coin_flip",
            Payload::new().with("result", if heads { "heads" } else { "tails" }),
        );
        CoinFlip { heads, seed }
    }

    /// Flip `count` coins, one seed each.
    pub fn flip_coins(&mut self, count: usize) -> Vec<CoinFlip> {
        (0..count).map(|_| self.flip_coin()).collect()
    }

    /// Discard a random card from a player's hand.
    pub fn random_discard(&mut self, player: PlayerId) -> OpResult<Option<InstanceId>> {
        let hand = self.state.hand(player);
        if hand.is_empty() {
            return Ok(None);
        }
        let seed = self.fresh_seed("random_discard");
        let Some(index) = SeededRng::from_seed(&seed).index(hand.len()) else {
            return Ok(None);
        };
        let card = hand[index];
        self.discard(card)?;
        Ok(Some(card))
    }

    // === Deck and hand ===

    /// Draw up to `count` cards. Drawing from an empty deck is reported, not an error.
    pub fn draw(&mut self, player: PlayerId, count: usize) -> OpResult<DrawOutcome> {
        let mut outcome = DrawOutcome::default();
        for _ in 0..count {
            match self.state.zones.top(player, Zone::Deck) {
                Some(card) => {
                    self.move_card(card, Location::Zone(player, Zone::Hand), ZonePosition::Top)?;
                    outcome.drawn.push(card);
                }
                None => outcome.missing += 1,
            }
        }
        if outcome.missing > 0 {
            self.log(
                "draw_short",
                Payload::new().with("player", player.0).with("missing", outcome.missing),
            );
        }
        Ok(outcome)
    }

    /// Discard a player's whole hand.
    pub fn discard_hand(&mut self, player: PlayerId) -> OpResult<Vec<InstanceId>> {
        let hand = self.state.hand(player);
        for card in &hand {
            self.discard(*card)?;
        }
        Ok(hand)
    }

    /// Shuffle a player's hand into their deck.
    pub fn shuffle_hand_into_deck(&mut self, player: PlayerId) -> OpResult<(Vec<InstanceId>, Seed)> {
        let hand = self.state.hand(player);
        self.move_cards(&hand, Location::Zone(player, Zone::Deck), ZonePosition::Top)?;
        let seed = self.shuffle(player, Zone::Deck);
        Ok((hand, seed))
    }

    // === Prizes ===

    /// Set aside the top `count` cards of a deck as Prizes.
    pub fn set_prizes(&mut self, player: PlayerId, count: usize) -> OpResult<Vec<InstanceId>> {
        let cards = self.state.zones.top_n(player, Zone::Deck, count);
        self.move_cards(&cards, Location::Zone(player, Zone::Prize), ZonePosition::Top)?;
        Ok(cards)
    }

    /// Put one Prize card into its owner's hand.
    pub fn take_prize(&mut self, player: PlayerId, prize: InstanceId) -> OpResult<MoveOutcome> {
        let expected = Location::Zone(player, Zone::Prize);
        if self.state.instance(prize)?.location != expected {
            return Err(StructuralError::NotAt { instance: prize, expected });
        }
        let outcome = self.move_card(prize, Location::Zone(player, Zone::Hand), ZonePosition::Top)?;
        self.log("take_prize", Payload::new().with("player", player.0).with("card", prize));
        Ok(outcome)
    }

    /// Reveal a Prize card face up without moving it.
    pub fn reveal_prize(&mut self, player: PlayerId, prize: InstanceId) -> OpResult<CardId> {
        let expected = Location::Zone(player, Zone::Prize);
        let instance = self.state.instance(prize)?;
        if instance.location != expected {
            return Err(StructuralError::NotAt { instance: prize, expected });
        }
        let card = instance.card;
        self.log(
            "reveal_prize",
            Payload::new().with("player", player.0).with("card", prize).with("definition", card),
        );
        Ok(card)
    }

    /// Adjust how many Prizes a player takes per Knock Out.
    pub fn modify_prize_delta(&mut self, player: PlayerId, delta: i32) {
        self.state.players[player].prize_delta += delta;
        self.log(
            "modify_prize_delta",
            Payload::new().with("player", player.0).with("delta", delta),
        );
    }

    // === Evolution ===

    /// Place `evolution` on top of `target`, pushing a layer.
    ///
    /// The Pokémon keeps its damage and attachments; Special Conditions are
    /// removed.
    pub fn evolve(&mut self, target: InstanceId, evolution: InstanceId) -> OpResult<()> {
        let host = self.state.instance(target)?;
        if !host.location.is_in_play() {
            return Err(StructuralError::NotInPlay(target));
        }
        let previous = host.card;
        let from = self.state.instance(evolution)?.location;
        if from.is_in_play() || matches!(from, Location::Stacked(_)) {
            return Err(StructuralError::InvalidDestination(Location::Stacked(target)));
        }
        self.detach_from(evolution, from)?;

        let evolved_card = self.state.instance(evolution)?.card;
        let turn = self.state.turn_number;
        let host = self.state.instance_mut(target)?;
        host.layers.push(EvolutionLayer { previous, evolution });
        host.card = evolved_card;
        host.evolved_turn = Some(turn);
        host.conditions.clear();
        self.state.instance_mut(evolution)?.location = Location::Stacked(target);

        self.log(
            "evolve",
            Payload::new()
                .with("card", target)
                .with("evolution", evolution)
                .with("from", previous)
                .with("to", evolved_card),
        );
        Ok(())
    }

    /// Remove the top evolution of `target` and put that card in `to`.
    ///
    /// Damage is capped at the restored form's HP. Returns the removed
    /// evolution card.
    pub fn devolve(&mut self, target: InstanceId, to: Location) -> OpResult<InstanceId> {
        let Some(layer) = self.state.instance(target)?.layers.last().copied() else {
            return Err(StructuralError::NoPriorLayer(target));
        };
        let hp = self.card(layer.previous)?.hp;
        let host = self.state.instance_mut(target)?;
        host.layers.pop();
        let evolved_card = host.card;
        host.card = layer.previous;
        host.damage = host.damage.min(hp);
        host.conditions.clear();

        self.insert_at(layer.evolution, to, ZonePosition::Top)?;
        self.state.instance_mut(layer.evolution)?.location = to;

        self.log(
            "devolve",
            Payload::new()
                .with("card", target)
                .with("evolution", layer.evolution)
                .with("from", evolved_card)
                .with("to", layer.previous),
        );
        Ok(layer.evolution)
    }

    // === Stadium ===

    /// Put a Stadium into play, discarding the one already there.
    pub fn put_stadium(&mut self, card: InstanceId) -> OpResult<Option<InstanceId>> {
        let replaced = self.discard_stadium()?;
        self.move_card(card, Location::Stadium, ZonePosition::Top)?;
        Ok(replaced)
    }

    /// Discard the Stadium in play, if any.
    pub fn discard_stadium(&mut self) -> OpResult<Option<InstanceId>> {
        match self.state.zones.stadium() {
            Some(stadium) => {
                self.discard(stadium)?;
                Ok(Some(stadium))
            }
            None => Ok(None),
        }
    }

    /// Whether a Stadium is in play.
    #[must_use]
    pub fn stadium_in_play(&self) -> Option<InstanceId> {
        self.state.zones.stadium()
    }

    /// Whether a player's Bench is full.
    #[must_use]
    pub fn bench_full(&self, player: PlayerId) -> bool {
        self.state.zones.is_full(player, Zone::Bench)
    }

    // === Counters and turn bookkeeping ===

    /// Increment a usage counter, returning the new count.
    pub fn track_usage(&mut self, player: PlayerId, scope: UsageScope, key: &str) -> OpResult<u32> {
        let counter = match scope {
            UsageScope::Turn => self.state.players[player].turn_usage.entry(key.to_string()).or_default(),
            UsageScope::Game => self.state.players[player].game_usage.entry(key.to_string()).or_default(),
            UsageScope::Instance(id) => self.state.instance_mut(id)?.usage.entry(key.to_string()).or_default(),
        };
        *counter += 1;
        let count = *counter;
        self.log(
            "track_usage",
            Payload::new()
                .with("player", player.0)
                .with("scope", format!("{scope:?}"))
                .with("key", key)
                .with("count", count),
        );
        Ok(count)
    }

    #[must_use]
    pub fn usage_count(&self, player: PlayerId, scope: UsageScope, key: &str) -> u32 {
        self.state.usage_count(player, scope, key)
    }

    /// Begin a turn for `player`: bump the turn number and clear their turn counters.
    pub fn start_turn(&mut self, player: PlayerId) {
        self.state.turn_number += 1;
        self.state.active_player = player;
        self.state.players[player].turn_usage.clear();
        self.log(
            "start_turn",
            Payload::new().with("player", player.0).with("turn", self.state.turn_number),
        );
    }

    /// Clear a player's turn-scoped counters.
    pub fn end_turn(&mut self, player: PlayerId) {
        self.state.players[player].turn_usage.clear();
        self.log(
            "end_turn",
            Payload::new().with("player", player.0).with("turn", self.state.turn_number),
        );
    }

    pub fn set_phase(&mut self, phase: Phase) {
        if self.state.phase == phase {
            return;
        }
        tracing::debug!(from = %self.state.phase, to = %phase, "phase transition");
        let from = self.state.phase;
        self.state.phase = phase;
        self.log("phase", Payload::new().with("from", from).with("to", phase));
    }

    pub fn set_first_player(&mut self, player: PlayerId) {
        self.state.first_player = Some(player);
        self.state.active_player = player;
        self.log("first_player", Payload::new().with("player", player.0));
    }

    pub fn set_decked_out(&mut self, player: PlayerId) {
        self.state.players[player].decked_out = true;
        self.log("decked_out", Payload::new().with("player", player.0));
    }

    pub fn set_outcome(&mut self, outcome: GameOutcome) {
        self.state.outcome = Some(outcome);
        self.log("game_over", Payload::new().with("outcome", outcome));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::{CardRegistry, EnergyType, Stage};
    use crate::core::{DeterministicEntropy, PlayerMap, RefereeConfig};

    const P0: PlayerId = PlayerId::FIRST;
    const P1: PlayerId = PlayerId::SECOND;

    fn catalog() -> CardRegistry {
        CardRegistry::new().with_cards([
            CardDefinition::pokemon(CardId(1), "Charmander", 70),
            CardDefinition::pokemon(CardId(2), "Charmeleon", 100).evolves_from(Stage::Stage1, "Charmander"),
            CardDefinition::basic_energy(CardId(3), EnergyType::Fire),
        ]).unwrap()
    }

    fn state(catalog: &CardRegistry) -> GameState {
        let mut deck = vec![CardId(1); 4];
        deck.extend([CardId(2); 4]);
        deck.extend(std::iter::repeat(CardId(3)).take(52));
        GameState::new_match("ops", &RefereeConfig::default(), &PlayerMap::with_value(deck), catalog).unwrap()
    }

    fn place(ops: &mut AtomicOps<'_>, player: PlayerId, card: CardId, zone: Zone) -> InstanceId {
        let id = ops.state().find_in_zone(player, Zone::Deck, card).unwrap();
        ops.move_card(id, Location::Zone(player, zone), ZonePosition::Top).unwrap();
        id
    }

    #[test]
    fn test_move_logs_one_entry_per_card() {
        let catalog = catalog();
        let mut state = state(&catalog);
        let mut entropy = DeterministicEntropy::new(1);
        let mut ops = AtomicOps::new(&mut state, &mut entropy, &catalog, Actor::Referee);

        let outcome = ops.draw(P0, 3).unwrap();
        assert_eq!(outcome.drawn.len(), 3);
        assert_eq!(ops.state().hand(P0).len(), 3);
        assert_eq!(ops.state().log.iter().filter(|e| e.action == "move").count(), 3);
    }

    #[test]
    fn test_draw_from_empty_deck_reports_missing() {
        let catalog = catalog();
        let mut state = state(&catalog);
        let mut entropy = DeterministicEntropy::new(1);
        let mut ops = AtomicOps::new(&mut state, &mut entropy, &catalog, Actor::Referee);

        let outcome = ops.draw(P1, 65).unwrap();
        assert_eq!(outcome.drawn.len(), 60);
        assert_eq!(outcome.missing, 5);
    }

    #[test]
    fn test_bench_capacity_is_structural() {
        let catalog = catalog();
        let mut state = state(&catalog);
        let mut entropy = DeterministicEntropy::new(1);
        let mut ops = AtomicOps::new(&mut state, &mut entropy, &catalog, Actor::Referee);

        let deck = ops.state().zones.cards(P0, Zone::Deck);
        for id in &deck[..5] {
            ops.move_card(*id, Location::Zone(P0, Zone::Bench), ZonePosition::Top).unwrap();
        }
        let err = ops
            .move_card(deck[5], Location::Zone(P0, Zone::Bench), ZonePosition::Top)
            .unwrap_err();
        assert!(matches!(err, StructuralError::LocationFull { capacity: 5, .. }));
        assert_eq!(ops.state().zones.len(P0, Zone::Deck), 55);
    }

    #[test]
    fn test_update_damage_clamps() {
        let catalog = catalog();
        let mut state = state(&catalog);
        let mut entropy = DeterministicEntropy::new(1);
        let mut ops = AtomicOps::new(&mut state, &mut entropy, &catalog, Actor::Referee);
        let mon = place(&mut ops, P0, CardId(1), Zone::Active);

        let change = ops.update_damage(mon, 500).unwrap();
        assert_eq!(change.after, 70);
        let change = ops.update_damage(mon, -1000).unwrap();
        assert_eq!(change.after, 0);
        assert!(change.changed());
        assert!(!ops.update_damage(mon, -10).unwrap().changed());
    }

    #[test]
    fn test_damage_outside_play_is_structural() {
        let catalog = catalog();
        let mut state = state(&catalog);
        let mut entropy = DeterministicEntropy::new(1);
        let mut ops = AtomicOps::new(&mut state, &mut entropy, &catalog, Actor::Referee);

        let in_deck = ops.state().zones.top(P0, Zone::Deck).unwrap();
        assert_eq!(ops.update_damage(in_deck, 10).unwrap_err(), StructuralError::NotInPlay(in_deck));
    }

    #[test]
    fn test_shuffle_logs_seed_before_shuffle() {
        let catalog = catalog();
        let mut state = state(&catalog);
        let mut entropy = DeterministicEntropy::new(1);
        let mut ops = AtomicOps::new(&mut state, &mut entropy, &catalog, Actor::Referee);

        let seed = ops.shuffle(P0, Zone::Deck);
        let log: Vec<_> = ops.state().log.iter().cloned().collect();
        assert_eq!(log[0].action, "seed");
        assert_eq!(log[0].random_seed, Some(seed));
        assert_eq!(log[1].action, "shuffle");
        assert_eq!(ops.state().seed_trail.back(), Some(&seed));
    }

    #[test]
    fn test_shuffle_replays_from_seed() {
        let catalog = catalog();
        let mut first = state(&catalog);
        let mut second = first.clone();

        let mut entropy = DeterministicEntropy::new(99);
        let seed = AtomicOps::new(&mut first, &mut entropy, &catalog, Actor::Referee).shuffle(P0, Zone::Deck);

        let mut replay = crate::core::ReplayEntropy::new([seed]);
        AtomicOps::new(&mut second, &mut replay, &catalog, Actor::Referee).shuffle(P0, Zone::Deck);

        assert_eq!(first.zones.cards(P0, Zone::Deck), second.zones.cards(P0, Zone::Deck));
    }

    #[test]
    fn test_evolve_and_devolve_layers() {
        let catalog = catalog();
        let mut state = state(&catalog);
        let mut entropy = DeterministicEntropy::new(1);
        let mut ops = AtomicOps::new(&mut state, &mut entropy, &catalog, Actor::Referee);

        let basic = place(&mut ops, P0, CardId(1), Zone::Active);
        let evolution = place(&mut ops, P0, CardId(2), Zone::Hand);
        ops.update_damage(basic, 30).unwrap();
        ops.set_condition(basic, SpecialCondition::Poisoned).unwrap();

        ops.evolve(basic, evolution).unwrap();
        let host = ops.state().get(basic).unwrap();
        assert_eq!(host.card, CardId(2));
        assert_eq!(host.damage, 30);
        assert!(host.conditions.is_empty());
        assert_eq!(ops.state().get(evolution).unwrap().location, Location::Stacked(basic));
        assert!(ops.state().verify_locations().is_ok());

        let returned = ops.devolve(basic, Location::Zone(P0, Zone::Hand)).unwrap();
        assert_eq!(returned, evolution);
        assert_eq!(ops.state().get(basic).unwrap().card, CardId(1));
        assert!(ops.state().hand(P0).contains(&evolution));
        assert_eq!(ops.devolve(basic, Location::Zone(P0, Zone::Hand)).unwrap_err(), StructuralError::NoPriorLayer(basic));
    }

    #[test]
    fn test_devolve_caps_damage_at_restored_hp() {
        let catalog = catalog();
        let mut state = state(&catalog);
        let mut entropy = DeterministicEntropy::new(1);
        let mut ops = AtomicOps::new(&mut state, &mut entropy, &catalog, Actor::Referee);

        let basic = place(&mut ops, P0, CardId(1), Zone::Active);
        let evolution = place(&mut ops, P0, CardId(2), Zone::Hand);
        ops.evolve(basic, evolution).unwrap();
        ops.update_damage(basic, 90).unwrap();

        ops.devolve(basic, Location::Zone(P0, Zone::Hand)).unwrap();
        let host = ops.state().get(basic).unwrap();
        assert_eq!(host.card, CardId(1));
        assert_eq!(host.damage, 70);
        assert!(ops.check_knockout(basic).unwrap());
    }

    #[test]
    fn test_discard_pokemon_takes_attachments_and_layers() {
        let catalog = catalog();
        let mut state = state(&catalog);
        let mut entropy = DeterministicEntropy::new(1);
        let mut ops = AtomicOps::new(&mut state, &mut entropy, &catalog, Actor::Referee);

        let basic = place(&mut ops, P0, CardId(1), Zone::Active);
        let evolution = place(&mut ops, P0, CardId(2), Zone::Hand);
        let energy = place(&mut ops, P0, CardId(3), Zone::Hand);
        ops.evolve(basic, evolution).unwrap();
        ops.attach(energy, basic).unwrap();
        ops.update_damage(basic, 100).unwrap();

        ops.discard(basic).unwrap();

        let discard = ops.state().zones.cards(P0, Zone::Discard);
        assert_eq!(discard.len(), 3);
        let card = ops.state().get(basic).unwrap();
        assert_eq!(card.damage, 0);
        assert_eq!(card.card, CardId(1));
        assert!(card.attached.is_empty());
        assert!(ops.state().verify_locations().is_ok());
    }

    #[test]
    fn test_swap_clears_outgoing_conditions() {
        let catalog = catalog();
        let mut state = state(&catalog);
        let mut entropy = DeterministicEntropy::new(1);
        let mut ops = AtomicOps::new(&mut state, &mut entropy, &catalog, Actor::Referee);

        let active = place(&mut ops, P0, CardId(1), Zone::Active);
        let benched = place(&mut ops, P0, CardId(1), Zone::Bench);
        ops.set_condition(active, SpecialCondition::Confused).unwrap();

        ops.swap_active_with_bench(P0, benched).unwrap();

        assert_eq!(ops.state().active(P0), Some(benched));
        assert_eq!(ops.state().bench(P0), vec![active]);
        assert!(ops.state().get(active).unwrap().conditions.is_empty());
    }

    #[test]
    fn test_prizes() {
        let catalog = catalog();
        let mut state = state(&catalog);
        let mut entropy = DeterministicEntropy::new(1);
        let mut ops = AtomicOps::new(&mut state, &mut entropy, &catalog, Actor::Referee);

        let prizes = ops.set_prizes(P1, 6).unwrap();
        assert_eq!(ops.state().prizes_remaining(P1), 6);

        ops.reveal_prize(P1, prizes[0]).unwrap();
        ops.take_prize(P1, prizes[0]).unwrap();
        assert_eq!(ops.state().prizes_remaining(P1), 5);
        assert!(ops.take_prize(P1, prizes[0]).is_err());
    }

    #[test]
    fn test_usage_scopes() {
        let catalog = catalog();
        let mut state = state(&catalog);
        let mut entropy = DeterministicEntropy::new(1);
        let mut ops = AtomicOps::new(&mut state, &mut entropy, &catalog, Actor::Referee);
        let mon = place(&mut ops, P0, CardId(1), Zone::Active);

        ops.track_usage(P0, UsageScope::Turn, "supporter").unwrap();
        ops.track_usage(P0, UsageScope::Game, "vstar").unwrap();
        ops.track_usage(P0, UsageScope::Instance(mon), "attack").unwrap();

        ops.end_turn(P0);
        let state = ops.state();
        assert_eq!(state.usage_count(P0, UsageScope::Turn, "supporter"), 0);
        assert_eq!(state.usage_count(P0, UsageScope::Game, "vstar"), 1);
        assert_eq!(state.usage_count(P0, UsageScope::Instance(mon), "attack"), 1);
    }

    #[test]
    fn test_stadium_replacement() {
        let catalog = catalog();
        let mut state = state(&catalog);
        let mut entropy = DeterministicEntropy::new(1);
        let mut ops = AtomicOps::new(&mut state, &mut entropy, &catalog, Actor::Referee);

        let first = ops.state().zones.top(P0, Zone::Deck).unwrap();
        let second = ops.state().zones.top(P1, Zone::Deck).unwrap();
        assert_eq!(ops.put_stadium(first).unwrap(), None);
        assert_eq!(ops.put_stadium(second).unwrap(), Some(first));
        assert_eq!(ops.stadium_in_play(), Some(second));
        assert!(ops.state().zones.contains(P0, Zone::Discard, first));
    }
}
