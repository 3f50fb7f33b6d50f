//! Effect Interpreter.
//!
//! Executes one [`EffectDescriptor`] against live state through
//! [`AtomicOps`], asking the [`Chooser`] whenever a real choice exists.
//!
//! For every node the interpreter:
//!
//! 1. checks the node's gate (coin result, board condition),
//! 2. recomputes the legal candidates from the current state,
//! 3. requests a choice bounded by the quantifier, when one is needed,
//! 4. applies the selection through Atomic Operations,
//! 5. records whether anything observable happened.
//!
//! Consequents ("if you do") run only when their parent had an observable
//! effect. An `AttackFails` node halts the remaining chain.
//!
//! ## Phases
//!
//! Attacks run in two passes around damage calculation:
//! [`RunPhase::BeforeDamage`] executes nodes tagged to run ahead of damage
//! (coin flips, bonuses, "before doing damage" clauses) and
//! [`RunPhase::AfterDamage`] the rest. Every other origin uses
//! [`RunPhase::All`]. One [`EffectReport`] is threaded through both passes.

use std::time::Duration;

use tracing::debug;

use super::choice::{ChoiceKind, ChoiceRequest, ChoiceResponse, Chooser};
use super::descriptor::{
    Action, BonusBasis, CardSource, Condition, CounterAmount, Destination, EffectDescriptor, EffectNode, Gate,
    HealAmount, Side, SwitchKind, TimeoutPolicy, Timing,
};
use super::targeting::{CardFilter, PokemonTarget, Quantity, TargetContext};
use crate::cards::DisabledAttack;
use crate::core::{InstanceId, Payload, PlayerId, RefereeError, Result};
use crate::ops::AtomicOps;
use crate::zones::{Location, Zone, ZonePosition};

/// Which nodes of a descriptor to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunPhase {
    BeforeDamage,
    AfterDamage,
    All,
}

impl RunPhase {
    fn includes(self, timing: Timing) -> bool {
        match self {
            RunPhase::All => true,
            RunPhase::BeforeDamage => timing == Timing::BeforeDamage,
            RunPhase::AfterDamage => timing == Timing::Textual,
        }
    }
}

/// Who and what an effect is resolved for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EffectContext {
    /// "You".
    pub actor: PlayerId,
    /// The card whose text is resolving. Excluded from its own hand and
    /// discard searches.
    pub card: Option<InstanceId>,
    /// "This Pokémon": the attacker, the ability holder or the tool's host.
    pub source: Option<InstanceId>,
    /// The attacking Pokémon, for reactive abilities.
    pub attacker: Option<InstanceId>,
}

impl EffectContext {
    /// Context of an attack by `attacker`.
    #[must_use]
    pub fn attack(actor: PlayerId, attacker: InstanceId) -> Self {
        Self {
            actor,
            card: Some(attacker),
            source: Some(attacker),
            attacker: Some(attacker),
        }
    }

    /// Context of an ability of `pokemon`.
    #[must_use]
    pub fn ability(actor: PlayerId, pokemon: InstanceId) -> Self {
        Self {
            actor,
            card: Some(pokemon),
            source: Some(pokemon),
            attacker: None,
        }
    }

    /// Context of a Trainer card. `host` is the Pokémon a Tool goes on.
    #[must_use]
    pub fn trainer(actor: PlayerId, card: InstanceId, host: Option<InstanceId>) -> Self {
        Self {
            actor,
            card: Some(card),
            source: host,
            attacker: None,
        }
    }

    /// Context of a reactive ability of `source`, fired by `attacker`.
    #[must_use]
    pub fn reactive(owner: PlayerId, source: InstanceId, attacker: Option<InstanceId>) -> Self {
        Self {
            actor: owner,
            card: Some(source),
            source: Some(source),
            attacker,
        }
    }
}

/// What an effect did, as far as the caller needs to react.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EffectReport {
    /// Damage added to the attack's base damage.
    pub damage_bonus: u32,
    /// Damage replacing the printed base ("does 50 damage for each ...").
    pub replace_base: Option<u32>,
    /// The attack does nothing.
    pub attack_fails: bool,
    /// Results of the latest coin flip action, `true` for heads.
    pub flips: Vec<bool>,
    /// Cards discarded by the latest discard action.
    pub last_discarded: usize,
    /// Targets of the latest targeting node ("that Pokémon").
    pub previous: Vec<InstanceId>,
    /// Pokémon that took effect damage during an attack.
    pub damaged: Vec<InstanceId>,
    /// Nodes that executed with an observable effect.
    pub observed: usize,
}

impl EffectReport {
    /// Base damage after replacement and bonus.
    #[must_use]
    pub fn attack_damage(&self, printed: u32) -> u32 {
        self.replace_base.unwrap_or(printed) + self.damage_bonus
    }
}

/// Drives Atomic Operations for one descriptor at a time.
pub struct Interpreter<'o, 'a> {
    ops: &'o mut AtomicOps<'a>,
    chooser: &'o mut dyn Chooser,
    timeout: Duration,
}

impl<'o, 'a> Interpreter<'o, 'a> {
    pub fn new(ops: &'o mut AtomicOps<'a>, chooser: &'o mut dyn Chooser, timeout: Duration) -> Self {
        Self { ops, chooser, timeout }
    }

    /// Run the nodes of `descriptor` selected by `phase`.
    pub fn run(
        &mut self,
        descriptor: &EffectDescriptor,
        ctx: &EffectContext,
        phase: RunPhase,
        report: &mut EffectReport,
    ) -> Result<()> {
        for node in &descriptor.nodes {
            if report.attack_fails {
                break;
            }
            if !phase.includes(node.timing) {
                continue;
            }
            self.run_node(node, ctx, report)?;
        }
        Ok(())
    }

    /// Run every node in textual order.
    pub fn execute(&mut self, descriptor: &EffectDescriptor, ctx: &EffectContext) -> Result<EffectReport> {
        let mut report = EffectReport::default();
        self.run(descriptor, ctx, RunPhase::All, &mut report)?;
        Ok(report)
    }

    fn run_node(&mut self, node: &EffectNode, ctx: &EffectContext, report: &mut EffectReport) -> Result<bool> {
        if !self.gate_open(node.gate, ctx, report)? {
            debug!(action = node.action.kind(), gate = ?node.gate, "gate closed");
            return Ok(false);
        }
        if node.optional && !self.confirm(node, ctx)? {
            debug!(action = node.action.kind(), "declined");
            return Ok(false);
        }

        let observable = self.apply(node, ctx, report)?;
        debug!(action = node.action.kind(), observable, "node resolved");
        if !observable {
            return Ok(false);
        }
        report.observed += 1;

        for consequent in &node.consequent {
            if report.attack_fails {
                break;
            }
            self.run_node(consequent, ctx, report)?;
        }
        Ok(true)
    }

    fn gate_open(&self, gate: Gate, ctx: &EffectContext, report: &EffectReport) -> Result<bool> {
        let state = self.ops.state();
        Ok(match gate {
            Gate::Always => true,
            Gate::CoinHeads => report.flips.last() == Some(&true),
            Gate::CoinTails => report.flips.last() == Some(&false),
            Gate::If(condition) => {
                let source = ctx.source.map(|id| state.instance(id)).transpose()?;
                match condition {
                    Condition::SourceInActiveSpot => {
                        source.is_some_and(|s| s.location == Location::Zone(s.owner, Zone::Active))
                    }
                    Condition::SourceUndamaged => source.is_some_and(|s| s.damage == 0),
                    Condition::SourceDamaged => source.is_some_and(|s| s.damage > 0),
                    Condition::OpponentActiveHas(special) => state
                        .active(ctx.actor.opponent())
                        .and_then(|id| state.get(id))
                        .is_some_and(|p| p.conditions.contains(special)),
                }
            }
        })
    }

    // === Choices ===

    fn confirm(&mut self, node: &EffectNode, ctx: &EffectContext) -> Result<bool> {
        let Some(card) = ctx.card.or(ctx.source) else {
            return Ok(true);
        };
        let request = ChoiceRequest::new(ctx.actor, ChoiceKind::Confirm, node.text.clone(), vec![card])
            .with_bounds(0, 1)
            .with_timeout(self.timeout);
        Ok(!self.ask(&request, TimeoutPolicy::SelectNone)?.is_empty())
    }

    /// Ask `player` to pick between `min` and `max` of `candidates`.
    ///
    /// No request is made when the answer is forced.
    fn choose(
        &mut self,
        player: PlayerId,
        prompt: &str,
        candidates: Vec<InstanceId>,
        (min, max): (usize, usize),
        policy: TimeoutPolicy,
    ) -> Result<Vec<InstanceId>> {
        if candidates.is_empty() || max == 0 {
            return Ok(Vec::new());
        }
        if min == candidates.len() {
            return Ok(candidates);
        }
        let request = ChoiceRequest::new(player, ChoiceKind::Targets, prompt, candidates)
            .with_bounds(min, max)
            .with_timeout(self.timeout);
        self.ask(&request, policy)
    }

    fn ask(&mut self, request: &ChoiceRequest, policy: TimeoutPolicy) -> Result<Vec<InstanceId>> {
        let selected = match self.chooser.request_choice(request) {
            ChoiceResponse::Selected(ids) => {
                request.check(&ids).map_err(|reason| RefereeError::InvalidChoice {
                    player: request.player,
                    reason,
                })?;
                ids
            }
            ChoiceResponse::TimedOut => match policy {
                TimeoutPolicy::SelectNone => {
                    tracing::info!(player = %request.player, prompt = %request.prompt, "choice timed out, selecting nothing");
                    Vec::new()
                }
                TimeoutPolicy::Abort => {
                    return Err(RefereeError::ChoiceTimeout {
                        player: request.player,
                        prompt: request.prompt.clone(),
                    })
                }
            },
            ChoiceResponse::Cancelled => {
                return Err(RefereeError::ChoiceCancelled {
                    player: request.player,
                    prompt: request.prompt.clone(),
                })
            }
        };
        self.ops.note(
            "choice",
            Payload::new()
                .with("player", request.player.0)
                .with("kind", format!("{:?}", request.kind))
                .with("candidates", request.candidates.len())
                .with("selected", selected.len()),
        );
        Ok(selected)
    }

    fn pick_pokemon(
        &mut self,
        target: &PokemonTarget,
        ctx: &EffectContext,
        report: &EffectReport,
        node: &EffectNode,
        exclude: &[InstanceId],
    ) -> Result<Vec<InstanceId>> {
        let mut candidates = target.candidates(
            self.ops.state(),
            &TargetContext {
                actor: ctx.actor,
                source: ctx.source,
                attacker: ctx.attacker,
                previous: &report.previous,
            },
        );
        candidates.retain(|id| !exclude.contains(id));
        let bounds = target.quantity.bounds(candidates.len());
        self.choose(ctx.actor, &node.text, candidates, bounds, node.on_timeout)
    }

    fn pick_cards(
        &mut self,
        player: PlayerId,
        node: &EffectNode,
        candidates: Vec<InstanceId>,
        quantity: Quantity,
        max_cap: Option<usize>,
    ) -> Result<Vec<InstanceId>> {
        let (min, max) = quantity.bounds(candidates.len());
        let max = max_cap.map_or(max, |cap| max.min(cap));
        self.choose(player, &node.text, candidates, (min.min(max), max), node.on_timeout)
    }

    fn energy_on(&self, hosts: &[InstanceId], filter: &CardFilter) -> Vec<InstanceId> {
        let state = self.ops.state();
        let catalog = self.ops.catalog();
        hosts
            .iter()
            .flat_map(|host| state.attached_energy(catalog, *host))
            .filter(|id| state.definition(catalog, *id).is_ok_and(|def| filter.matches(def)))
            .collect()
    }

    fn player_for(ctx: &EffectContext, side: Side) -> PlayerId {
        match side {
            Side::Yours => ctx.actor,
            Side::Opponents => ctx.actor.opponent(),
        }
    }

    // === Actions ===

    /// Apply one node's action. Returns whether it had an observable effect.
    #[allow(clippy::too_many_lines)]
    fn apply(&mut self, node: &EffectNode, ctx: &EffectContext, report: &mut EffectReport) -> Result<bool> {
        match &node.action {
            Action::Heal { target, amount } => {
                let targets = self.pick_pokemon(target, ctx, report, node, &[])?;
                let mut healed = false;
                for id in &targets {
                    let delta = match amount {
                        HealAmount::Amount(n) => -i32::try_from(*n).unwrap_or(i32::MAX),
                        HealAmount::All => -i32::try_from(self.ops.state().instance(*id)?.damage).unwrap_or(i32::MAX),
                    };
                    healed |= self.ops.update_damage(*id, delta)?.changed();
                }
                report.previous = targets;
                Ok(healed)
            }

            Action::MoveDamageCounters { from, to, amount } => {
                let sources = self.pick_pokemon(from, ctx, report, node, &[])?;
                let Some(&destination) = self.pick_pokemon(to, ctx, report, node, &sources)?.first() else {
                    return Ok(false);
                };
                let mut moved_any = false;
                for source in &sources {
                    let available = self.ops.state().instance(*source)?.damage;
                    let wanted = match amount {
                        CounterAmount::Exactly(n) => (n * 10).min(available),
                        CounterAmount::All => available,
                    };
                    let removed = self.ops.update_damage(*source, -i32::try_from(wanted).unwrap_or(i32::MAX))?;
                    let moved = removed.before - removed.after;
                    if moved > 0 {
                        self.ops.update_damage(destination, i32::try_from(moved).unwrap_or(i32::MAX))?;
                        moved_any = true;
                    }
                }
                report.previous = vec![destination];
                Ok(moved_any)
            }

            Action::MoveEnergy { filter, quantity, from, to } => {
                let sources = self.pick_pokemon(from, ctx, report, node, &[])?;
                let energy = self.energy_on(&sources, filter);
                let chosen = self.pick_cards(ctx.actor, node, energy, *quantity, None)?;
                if chosen.is_empty() {
                    return Ok(false);
                }
                let Some(&destination) = self.pick_pokemon(to, ctx, report, node, &sources)?.first() else {
                    return Ok(false);
                };
                for card in &chosen {
                    self.ops.attach(*card, destination)?;
                }
                report.previous = vec![destination];
                Ok(true)
            }

            Action::AttachEnergy { source, filter, quantity, target } => {
                let candidates = self.cards_in(ctx, ctx.actor, *source, filter);
                let chosen = self.pick_cards(ctx.actor, node, candidates, *quantity, None)?;
                if chosen.is_empty() {
                    return Ok(false);
                }
                let Some(&host) = self.pick_pokemon(target, ctx, report, node, &[])?.first() else {
                    return Ok(false);
                };
                for card in &chosen {
                    self.ops.attach(*card, host)?;
                }
                report.previous = vec![host];
                Ok(true)
            }

            Action::DiscardAttachedEnergy { target, filter, quantity } => {
                let hosts = self.pick_pokemon(target, ctx, report, node, &[])?;
                let energy = self.energy_on(&hosts, filter);
                let chosen = self.pick_cards(ctx.actor, node, energy, *quantity, None)?;
                for card in &chosen {
                    self.ops.discard(*card)?;
                }
                report.last_discarded = chosen.len();
                report.previous = hosts;
                Ok(!chosen.is_empty())
            }

            Action::DiscardFromHand { filter, quantity } => {
                let candidates = self.cards_in(ctx, ctx.actor, CardSource::Hand, filter);
                let chosen = self.pick_cards(ctx.actor, node, candidates, *quantity, None)?;
                for card in &chosen {
                    self.ops.discard(*card)?;
                }
                report.last_discarded = chosen.len();
                Ok(!chosen.is_empty())
            }

            Action::DiscardHand => {
                let discarded = self.ops.discard_hand(ctx.actor)?;
                report.last_discarded = discarded.len();
                Ok(!discarded.is_empty())
            }

            Action::DiscardStadium => Ok(self.ops.discard_stadium()?.is_some()),

            Action::Devolve { target } => {
                let mut targets = self.pick_pokemon(target, ctx, report, node, &[])?;
                targets.retain(|id| self.ops.state().get(*id).is_some_and(|c| c.is_evolved()));
                for id in &targets {
                    let owner = self.ops.state().instance(*id)?.owner;
                    self.ops.devolve(*id, Location::Zone(owner, Zone::Hand))?;
                }
                let devolved = !targets.is_empty();
                report.previous = targets;
                Ok(devolved)
            }

            Action::DamageToTargets { amount, target } => {
                let targets = self.pick_pokemon(target, ctx, report, node, &[])?;
                let mut damaged = false;
                for id in &targets {
                    if self.ops.update_damage(*id, i32::try_from(*amount).unwrap_or(i32::MAX))?.changed() {
                        damaged = true;
                        report.damaged.push(*id);
                    }
                }
                report.previous = targets;
                Ok(damaged)
            }

            Action::DamageToSelf { amount } => match ctx.source {
                Some(source) if self.ops.state().instance(source)?.location.is_in_play() => Ok(self
                    .ops
                    .update_damage(source, i32::try_from(*amount).unwrap_or(i32::MAX))?
                    .changed()),
                _ => Ok(false),
            },

            Action::PutDamageCounters { counters, target } => {
                let targets = self.pick_pokemon(target, ctx, report, node, &[])?;
                let mut placed = false;
                for id in &targets {
                    placed |= self
                        .ops
                        .update_damage(*id, i32::try_from(counters * 10).unwrap_or(i32::MAX))?
                        .changed();
                }
                report.previous = targets;
                Ok(placed)
            }

            Action::AttackFails => {
                report.attack_fails = true;
                self.ops.note("attack_fails", Payload::new().with("player", ctx.actor.0));
                Ok(true)
            }

            Action::Search { source, filter, quantity, destination } => {
                self.search(node, ctx, report, *source, filter, *quantity, destination)
            }

            Action::Switch(kind) => {
                let (owner, chooser) = match kind {
                    SwitchKind::Yours => (ctx.actor, ctx.actor),
                    SwitchKind::Gust => (ctx.actor.opponent(), ctx.actor),
                    SwitchKind::OpponentSwitches => (ctx.actor.opponent(), ctx.actor.opponent()),
                };
                let bench = self.ops.state().bench(owner);
                let chosen = self.choose(chooser, &node.text, bench, (1, 1), node.on_timeout)?;
                let Some(&promoted) = chosen.first() else {
                    return Ok(false);
                };
                self.ops.swap_active_with_bench(owner, promoted)?;
                report.previous = vec![promoted];
                Ok(true)
            }

            Action::Draw { count } => {
                let drawn = self.ops.draw(ctx.actor, *count as usize)?;
                Ok(!drawn.drawn.is_empty())
            }

            Action::DrawUntil { hand_size } => {
                let missing = (*hand_size as usize).saturating_sub(self.ops.state().hand(ctx.actor).len());
                let drawn = self.ops.draw(ctx.actor, missing)?;
                Ok(!drawn.drawn.is_empty())
            }

            Action::ShuffleHandIntoDeck { side } => {
                let (hand, _) = self.ops.shuffle_hand_into_deck(Self::player_for(ctx, *side))?;
                Ok(!hand.is_empty())
            }

            Action::ShuffleDeck { side } => {
                self.ops.shuffle(Self::player_for(ctx, *side), Zone::Deck);
                Ok(true)
            }

            Action::ApplyCondition { condition, target } => {
                let mut targets = self.pick_pokemon(target, ctx, report, node, &[])?;
                targets.retain(|id| {
                    self.ops
                        .state()
                        .get(*id)
                        .is_some_and(|c| c.location == Location::Zone(c.owner, Zone::Active))
                });
                let mut applied = false;
                for id in &targets {
                    applied |= self.ops.set_condition(*id, *condition)?;
                }
                report.previous = targets;
                Ok(applied)
            }

            Action::DisableAttack { target, attack, during } => {
                let targets = self.pick_pokemon(target, ctx, report, node, &[])?;
                let turn = self.ops.state().turn_number;
                let through_turn = match during {
                    Side::Yours => turn + 2,
                    Side::Opponents => turn + 1,
                };
                for id in &targets {
                    self.ops.set_disabled_attack(
                        *id,
                        DisabledAttack {
                            attack: attack.clone(),
                            through_turn,
                        },
                    )?;
                }
                let disabled = !targets.is_empty();
                report.previous = targets;
                Ok(disabled)
            }

            Action::DamageBonus { amount, basis, replace } => {
                let count = self.bonus_count(basis, ctx, report)?;
                let value = amount * count;
                if *replace {
                    *report.replace_base.get_or_insert(0) += value;
                } else {
                    report.damage_bonus += value;
                }
                Ok(value > 0)
            }

            // Read by the damage pipeline, never executed.
            Action::DamageModifier { .. } => Ok(false),

            Action::FlipCoins { count } => {
                report.flips = self
                    .ops
                    .flip_coins(*count as usize)
                    .into_iter()
                    .map(|flip| flip.heads)
                    .collect();
                Ok(true)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn search(
        &mut self,
        node: &EffectNode,
        ctx: &EffectContext,
        report: &mut EffectReport,
        source: CardSource,
        filter: &CardFilter,
        quantity: Quantity,
        destination: &Destination,
    ) -> Result<bool> {
        let candidates = match source {
            CardSource::Deck => self.ops.deck_query(ctx.actor, &|def| filter.matches(def)),
            _ => self.cards_in(ctx, ctx.actor, source, filter),
        };

        match destination {
            Destination::Hand => {
                let chosen = self.pick_cards(ctx.actor, node, candidates, quantity, None)?;
                self.ops
                    .move_cards(&chosen, Location::Zone(ctx.actor, Zone::Hand), ZonePosition::Top)?;
                Ok(!chosen.is_empty())
            }
            Destination::Bench => {
                let state = self.ops.state();
                let room = state
                    .zones
                    .capacity(Zone::Bench)
                    .map(|cap| cap.saturating_sub(state.zones.len(ctx.actor, Zone::Bench)));
                let basics: Vec<InstanceId> = candidates
                    .into_iter()
                    .filter(|id| self.ops.definition(*id).is_ok_and(|def| def.is_basic_pokemon()))
                    .collect();
                let chosen = self.pick_cards(ctx.actor, node, basics, quantity, room)?;
                self.ops
                    .move_cards(&chosen, Location::Zone(ctx.actor, Zone::Bench), ZonePosition::Top)?;
                let benched = !chosen.is_empty();
                report.previous = chosen;
                Ok(benched)
            }
            Destination::Attach(target) => {
                let chosen = self.pick_cards(ctx.actor, node, candidates, quantity, None)?;
                if chosen.is_empty() {
                    return Ok(false);
                }
                let Some(&host) = self.pick_pokemon(target, ctx, report, node, &[])?.first() else {
                    return Ok(false);
                };
                for card in &chosen {
                    self.ops.attach(*card, host)?;
                }
                report.previous = vec![host];
                Ok(true)
            }
        }
    }

    /// Cards in `player`'s hand or discard pile passing `filter`.
    fn cards_in(&self, ctx: &EffectContext, player: PlayerId, source: CardSource, filter: &CardFilter) -> Vec<InstanceId> {
        let mut cards = self.ops.zone_query(player, source.zone(), &|def| filter.matches(def));
        cards.retain(|id| Some(*id) != ctx.card);
        cards
    }

    fn bonus_count(&self, basis: &BonusBasis, ctx: &EffectContext, report: &EffectReport) -> Result<u32> {
        let count = match basis {
            BonusBasis::Flat => 1,
            BonusBasis::DiscardedInThisWay => report.last_discarded,
            BonusBasis::Heads => report.flips.iter().filter(|heads| **heads).count(),
            BonusBasis::DamageCountersOn(target) | BonusBasis::EnergyAttached(target) => {
                let state = self.ops.state();
                let candidates = target.candidates(
                    state,
                    &TargetContext {
                        actor: ctx.actor,
                        source: ctx.source,
                        attacker: ctx.attacker,
                        previous: &report.previous,
                    },
                );
                let mut total = 0;
                for id in candidates {
                    total += match basis {
                        BonusBasis::EnergyAttached(_) => state.energy_provided(self.ops.catalog(), id).len(),
                        _ => state.instance(id)?.damage_counters() as usize,
                    };
                }
                total
            }
        };
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::{CardDefinition, CardId, CardRegistry, EnergyType, SpecialCondition, Stage};
    use crate::core::{Actor, DeterministicEntropy, GameState, PlayerMap, RefereeConfig};
    use crate::effects::choice::{AutoChooser, FallbackStrategy, ScriptedChooser};
    use crate::effects::{EffectOrigin, EffectParser};

    const P0: PlayerId = PlayerId::FIRST;
    const P1: PlayerId = PlayerId::SECOND;

    fn catalog() -> CardRegistry {
        CardRegistry::new().with_cards([
            CardDefinition::pokemon(CardId(1), "Vulpix", 70),
            CardDefinition::pokemon(CardId(2), "Ninetales", 120).evolves_from(Stage::Stage1, "Vulpix"),
            CardDefinition::basic_energy(CardId(3), EnergyType::Fire),
        ]).unwrap()
    }

    fn state(catalog: &CardRegistry) -> GameState {
        let mut deck = vec![CardId(1); 4];
        deck.extend([CardId(2); 4]);
        deck.extend(std::iter::repeat(CardId(3)).take(52));
        GameState::new_match("interp", &RefereeConfig::default(), &PlayerMap::with_value(deck), catalog).unwrap()
    }

    fn place(ops: &mut AtomicOps<'_>, player: PlayerId, card: CardId, zone: Zone) -> InstanceId {
        let id = ops.state().find_in_zone(player, Zone::Deck, card).unwrap();
        ops.move_card(id, Location::Zone(player, zone), ZonePosition::Top).unwrap();
        id
    }

    fn parse(text: &str) -> EffectDescriptor {
        EffectParser::new().parse(text, EffectOrigin::Attack).unwrap()
    }

    #[test]
    fn test_heal_then_discard_gated_on_effect() {
        let catalog = catalog();
        let mut state = state(&catalog);
        let mut entropy = DeterministicEntropy::new(1);
        let mut ops = AtomicOps::new(&mut state, &mut entropy, &catalog, Actor::Player(P0));
        let mon = place(&mut ops, P0, CardId(1), Zone::Active);
        let energy = ops.state().find_in_zone(P0, Zone::Deck, CardId(3)).unwrap();
        ops.attach(energy, mon).unwrap();

        let descriptor = parse("Heal all damage from this Pokémon. If you do, discard all Energy from this Pokémon.");
        let mut chooser = AutoChooser::default();
        let mut interpreter = Interpreter::new(&mut ops, &mut chooser, Duration::from_secs(1));
        interpreter.execute(&descriptor, &EffectContext::attack(P0, mon)).unwrap();
        assert_eq!(ops.state().instance(mon).unwrap().attached.len(), 1);

        ops.update_damage(mon, 30).unwrap();
        let mut interpreter = Interpreter::new(&mut ops, &mut chooser, Duration::from_secs(1));
        interpreter.execute(&descriptor, &EffectContext::attack(P0, mon)).unwrap();
        let instance = ops.state().instance(mon).unwrap();
        assert_eq!(instance.damage, 0);
        assert!(instance.attached.is_empty());
    }

    #[test]
    fn test_coin_gate_reads_last_flip() {
        let catalog = catalog();
        let mut state = state(&catalog);
        let mut entropy = DeterministicEntropy::new(9);
        let mut ops = AtomicOps::new(&mut state, &mut entropy, &catalog, Actor::Player(P0));
        let attacker = place(&mut ops, P0, CardId(1), Zone::Active);
        let defender = place(&mut ops, P1, CardId(1), Zone::Active);

        let descriptor = parse("Flip a coin. If heads, your opponent's Active Pokémon is now Paralyzed.");
        let mut chooser = AutoChooser::default();
        let mut report = EffectReport::default();
        Interpreter::new(&mut ops, &mut chooser, Duration::from_secs(1))
            .run(&descriptor, &EffectContext::attack(P0, attacker), RunPhase::BeforeDamage, &mut report)
            .unwrap();
        assert_eq!(report.flips.len(), 1);
        assert!(!ops.state().instance(defender).unwrap().conditions.contains(SpecialCondition::Paralyzed));

        Interpreter::new(&mut ops, &mut chooser, Duration::from_secs(1))
            .run(&descriptor, &EffectContext::attack(P0, attacker), RunPhase::AfterDamage, &mut report)
            .unwrap();
        let paralyzed = ops.state().instance(defender).unwrap().conditions.contains(SpecialCondition::Paralyzed);
        assert_eq!(paralyzed, report.flips[0]);
    }

    #[test]
    fn test_attack_fails_halts_chain() {
        let catalog = catalog();
        let mut state = state(&catalog);
        let mut entropy = DeterministicEntropy::new(3);
        let mut ops = AtomicOps::new(&mut state, &mut entropy, &catalog, Actor::Player(P0));
        let attacker = place(&mut ops, P0, CardId(1), Zone::Active);

        let descriptor = parse("This attack does nothing. This Pokémon does 10 damage to itself.");
        let mut chooser = AutoChooser::default();
        let report = Interpreter::new(&mut ops, &mut chooser, Duration::from_secs(1))
            .execute(&descriptor, &EffectContext::attack(P0, attacker))
            .unwrap();
        assert!(report.attack_fails);
        assert_eq!(ops.state().instance(attacker).unwrap().damage, 0);
    }

    #[test]
    fn test_mandatory_timeout_aborts() {
        let catalog = catalog();
        let mut state = state(&catalog);
        let mut entropy = DeterministicEntropy::new(3);
        let mut ops = AtomicOps::new(&mut state, &mut entropy, &catalog, Actor::Player(P0));
        let attacker = place(&mut ops, P0, CardId(1), Zone::Active);
        place(&mut ops, P1, CardId(1), Zone::Active);
        place(&mut ops, P1, CardId(1), Zone::Bench);
        place(&mut ops, P1, CardId(1), Zone::Bench);

        let descriptor = parse("This attack does 20 damage to 1 of your opponent's Benched Pokémon.");
        let mut chooser = AutoChooser(FallbackStrategy::TimeOut);
        let err = Interpreter::new(&mut ops, &mut chooser, Duration::from_secs(1))
            .execute(&descriptor, &EffectContext::attack(P0, attacker))
            .unwrap_err();
        assert!(matches!(err, RefereeError::ChoiceTimeout { player, .. } if player == P0));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_up_to_timeout_selects_nothing() {
        let catalog = catalog();
        let mut state = state(&catalog);
        let mut entropy = DeterministicEntropy::new(3);
        let mut ops = AtomicOps::new(&mut state, &mut entropy, &catalog, Actor::Player(P0));
        let descriptor = EffectParser::new()
            .parse("Search your deck for up to 2 Basic Pokémon and put them onto your Bench.", EffectOrigin::Trainer)
            .unwrap();
        let mut chooser = AutoChooser(FallbackStrategy::TimeOut);
        let report = Interpreter::new(&mut ops, &mut chooser, Duration::from_secs(1))
            .execute(&descriptor, &EffectContext::trainer(P0, InstanceId(999), None))
            .unwrap();
        assert_eq!(report.observed, 0);
        assert!(ops.state().bench(P0).is_empty());
    }

    #[test]
    fn test_invalid_selection_rejected() {
        let catalog = catalog();
        let mut state = state(&catalog);
        let mut entropy = DeterministicEntropy::new(3);
        let mut ops = AtomicOps::new(&mut state, &mut entropy, &catalog, Actor::Player(P0));
        let attacker = place(&mut ops, P0, CardId(1), Zone::Active);
        place(&mut ops, P1, CardId(1), Zone::Bench);
        place(&mut ops, P1, CardId(1), Zone::Bench);

        let descriptor = parse("This attack does 20 damage to 1 of your opponent's Benched Pokémon.");
        let mut chooser = ScriptedChooser::new().then_select([attacker]);
        let err = Interpreter::new(&mut ops, &mut chooser, Duration::from_secs(1))
            .execute(&descriptor, &EffectContext::attack(P0, attacker))
            .unwrap_err();
        assert!(matches!(err, RefereeError::InvalidChoice { .. }));
    }

    #[test]
    fn test_devolve_returns_card_to_hand() {
        let catalog = catalog();
        let mut state = state(&catalog);
        let mut entropy = DeterministicEntropy::new(3);
        let mut ops = AtomicOps::new(&mut state, &mut entropy, &catalog, Actor::Player(P0));
        let attacker = place(&mut ops, P0, CardId(1), Zone::Active);
        let defender = place(&mut ops, P1, CardId(1), Zone::Active);
        let evolution = ops.state().find_in_zone(P1, Zone::Deck, CardId(2)).unwrap();
        ops.evolve(defender, evolution).unwrap();

        let descriptor = parse("Devolve your opponent's Active Pokémon.");
        let mut chooser = AutoChooser::default();
        Interpreter::new(&mut ops, &mut chooser, Duration::from_secs(1))
            .execute(&descriptor, &EffectContext::attack(P0, attacker))
            .unwrap();
        assert_eq!(ops.state().instance(defender).unwrap().card, CardId(1));
        assert!(ops.state().hand(P1).contains(&evolution));
    }
}
