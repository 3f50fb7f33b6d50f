//! The Referee state machine.
//!
//! The Referee owns one match. It parses every card in both decks when the
//! match is created, then processes one request at a time:
//!
//! 1. check legality against a read-only view (no mutation on rejection)
//! 2. snapshot the state
//! 3. run the action, and everything it sets off (damage, reactive
//!    abilities, Knock Outs, Checkup, the next turn's draw), through
//!    [`AtomicOps`]
//! 4. on success forward the new log entries to the audit sink; on any
//!    error restore the snapshot
//!
//! Phases follow [`Phase`]: `TurnStart → DrawStep → MainStep →
//! AttackDeclared → DamageCalc → EffectResolution → Checkup → ... →
//! WinCheck`, with `KnockoutProcessing` entered whenever a Pokémon's damage
//! reaches its HP.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info, warn};

use super::checkup;
use super::damage::{self, DamageInput};
use super::knockout;
use super::legality::{self, RuleView, ENERGY_ATTACHED, RETREATED, STADIUM_PLAYED, SUPPORTER_PLAYED};
use super::outcome::{self, GameOutcome};
use super::rulebook::RulingLookup;
use crate::cards::{CardCatalog, CardId, SpecialCondition, TrainerKind};
use crate::core::{
    ActionOutcome, ActionRequest, Actor, AuditSink, EntropySource, GameState, IllegalAction, IllegalReason,
    InstanceId, NullAuditSink, OsEntropy, Payload, Phase, PlayerId, PlayerMap, RefereeConfig, RefereeError, Result,
    StructuralError, UsageScope,
};
use crate::effects::{
    CardEffects, ChoiceKind, ChoiceRequest, ChoiceResponse, Chooser, EffectContext, EffectParser, EffectReport,
    Interpreter, RunPhase,
};
use crate::ops::AtomicOps;
use crate::triggers::{GameEvent, ReactiveTrigger, TriggerEntry, TriggerRegistry};
use crate::zones::{Location, Zone, ZonePosition};

/// Adjudicates one match.
pub struct Referee {
    config: RefereeConfig,
    catalog: Arc<dyn CardCatalog>,
    state: GameState,
    entropy: Box<dyn EntropySource>,
    chooser: Box<dyn Chooser + Send>,
    audit: Arc<dyn AuditSink>,
    rulings: Option<Box<dyn RulingLookup>>,
    effects: FxHashMap<CardId, CardEffects>,
    triggers: TriggerRegistry,
    /// Log entries already forwarded to the audit sink.
    committed: usize,
}

impl Referee {
    /// Create a match from two decks.
    ///
    /// Fails if the config is invalid, a deck breaks the construction rules,
    /// or any card text cannot be parsed.
    pub fn new(
        config: RefereeConfig,
        catalog: Arc<dyn CardCatalog>,
        decks: &PlayerMap<Vec<CardId>>,
        entropy: Box<dyn EntropySource>,
        chooser: Box<dyn Chooser + Send>,
    ) -> Result<Self> {
        validate(&config)?;
        let match_id = config
            .match_id
            .clone()
            .unwrap_or_else(|| OsEntropy.next_seed().to_hex()[..16].to_string());
        let state = GameState::new_match(match_id, &config, decks, catalog.as_ref())?;
        Self::resume(config, catalog, state, entropy, chooser)
    }

    /// Continue a match from a snapshot.
    ///
    /// Entries already in the snapshot's log are treated as committed.
    pub fn resume(
        config: RefereeConfig,
        catalog: Arc<dyn CardCatalog>,
        state: GameState,
        entropy: Box<dyn EntropySource>,
        chooser: Box<dyn Chooser + Send>,
    ) -> Result<Self> {
        validate(&config)?;
        state.verify_locations()?;
        let (effects, triggers) = parse_cards(&state, catalog.as_ref())?;
        info!(
            match_id = %state.match_id,
            cards = effects.len(),
            reactive = triggers.len(),
            phase = %state.phase,
            "referee ready"
        );
        Ok(Self {
            config,
            catalog,
            committed: state.log.len(),
            state,
            entropy,
            chooser,
            audit: Arc::new(NullAuditSink),
            rulings: None,
            effects,
            triggers,
        })
    }

    /// Forward committed log entries to `sink` (builder pattern).
    #[must_use]
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = sink;
        self
    }

    /// Annotate rejections with citations from `rulings` (builder pattern).
    #[must_use]
    pub fn with_rulings(mut self, rulings: impl RulingLookup + 'static) -> Self {
        self.rulings = Some(Box::new(rulings));
        self
    }

    // === Accessors ===

    #[must_use]
    pub fn state(&self) -> &GameState {
        &self.state
    }

    #[must_use]
    pub fn config(&self) -> &RefereeConfig {
        &self.config
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    /// The result, once the match is over.
    #[must_use]
    pub fn outcome(&self) -> Option<GameOutcome> {
        self.state.outcome
    }

    /// Parsed effects of a card definition in this match.
    #[must_use]
    pub fn effects(&self, card: CardId) -> Option<&CardEffects> {
        self.effects.get(&card)
    }

    /// O(1) copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> GameState {
        self.state.snapshot()
    }

    // === Requests ===

    /// Check an action without performing it.
    pub fn check(&self, player: PlayerId, request: &ActionRequest) -> std::result::Result<(), IllegalAction> {
        let view = RuleView {
            state: &self.state,
            catalog: self.catalog.as_ref(),
            config: &self.config,
            effects: &self.effects,
        };
        legality::check(&view, player, request).map_err(|reason| self.reject(reason))
    }

    /// Shuffle, deal opening hands, place Pokémon, set Prizes, flip for the
    /// first turn and start it.
    pub fn setup(&mut self) -> Result<()> {
        if self.state.phase != Phase::Setup || self.state.first_player.is_some() {
            return Err(self.reject(IllegalReason::WrongPhase(self.state.phase)).into());
        }
        self.transaction(Actor::Referee, |table| table.setup())
    }

    /// Perform one action for `player`.
    ///
    /// The action runs to completion, including the rest of the turn when
    /// it ends the turn. On any error the state is exactly as before.
    pub fn submit(&mut self, player: PlayerId, request: ActionRequest) -> Result<ActionOutcome> {
        if self.state.phase == Phase::GameOver {
            return Err(RefereeError::GameOver);
        }
        self.check(player, &request)?;
        debug!(player = %player, action = request.kind(), "action accepted");

        let before = self.state.log.len();
        let mut outcome = self.transaction(Actor::Player(player), |table| table.perform(player, &request))?;
        outcome.log_entries = self.state.log.len() - before;
        info!(
            player = %player,
            action = request.kind(),
            entries = outcome.log_entries,
            knocked_out = outcome.knocked_out.len(),
            "action resolved"
        );
        Ok(outcome)
    }

    fn reject(&self, reason: IllegalReason) -> IllegalAction {
        let ruling = self.rulings.as_ref().and_then(|r| r.lookup_ruling(reason.topic()));
        info!(%reason, ruling = ?ruling, "action rejected");
        IllegalAction { reason, ruling }
    }

    /// Run `body` against the live state, restoring the snapshot on error.
    fn transaction<T>(&mut self, actor: Actor, body: impl FnOnce(&mut Table<'_>) -> Result<T>) -> Result<T> {
        let snapshot = self.state.snapshot();
        let result = {
            let mut table = Table {
                ops: AtomicOps::new(&mut self.state, self.entropy.as_mut(), self.catalog.as_ref(), actor),
                chooser: self.chooser.as_mut(),
                config: &self.config,
                effects: &self.effects,
                triggers: &self.triggers,
                knocked_out: Vec::new(),
            };
            body(&mut table)
        };

        match result {
            Ok(value) => {
                self.commit();
                Ok(value)
            }
            Err(err) => {
                warn!(error = %err, discarded = self.state.log.len() - snapshot.log.len(), "rolling back");
                self.state = snapshot;
                Err(err)
            }
        }
    }

    fn commit(&mut self) {
        for entry in self.state.log.iter().skip(self.committed) {
            self.audit.append(entry);
        }
        self.committed = self.state.log.len();
    }
}

fn validate(config: &RefereeConfig) -> Result<()> {
    config
        .validate()
        .map_err(|e| StructuralError::InvalidConfig(e.to_string()).into())
}

/// Parse every distinct card in the match and index its reactive abilities.
fn parse_cards(
    state: &GameState,
    catalog: &dyn CardCatalog,
) -> Result<(FxHashMap<CardId, CardEffects>, TriggerRegistry)> {
    let parser = EffectParser::new();
    let mut effects = FxHashMap::default();
    let mut triggers = TriggerRegistry::new();
    let cards: FxHashSet<CardId> = state.instances().map(|i| i.printed).collect();

    for card in cards {
        let def = catalog.card(card).ok_or(StructuralError::UnknownCard(card))?;
        let parsed = parser.parse_card(def)?;
        for (ability, descriptor) in parsed.abilities.iter().enumerate() {
            if let Some(kind) = descriptor.trigger {
                triggers.register(
                    card,
                    TriggerEntry {
                        ability,
                        name: def.abilities[ability].name.clone(),
                        kind,
                    },
                );
            }
        }
        effects.insert(card, parsed);
    }
    Ok((effects, triggers))
}

/// Everything one transaction works with.
struct Table<'a> {
    ops: AtomicOps<'a>,
    chooser: &'a mut dyn Chooser,
    config: &'a RefereeConfig,
    effects: &'a FxHashMap<CardId, CardEffects>,
    triggers: &'a TriggerRegistry,
    knocked_out: Vec<InstanceId>,
}

impl<'a> Table<'a> {
    fn interpreter(&mut self) -> Interpreter<'_, 'a> {
        Interpreter::new(&mut self.ops, &mut *self.chooser, self.config.choice_timeout())
    }

    // === Setup ===

    fn setup(&mut self) -> Result<()> {
        for player in PlayerId::both() {
            self.ops.shuffle(player, Zone::Deck);
            self.draw_opening_hand(player)?;
        }
        for player in PlayerId::both() {
            self.place_opening_pokemon(player)?;
            self.ops.set_prizes(player, self.config.prize_count)?;
        }

        let first = if self.ops.flip_coin().heads {
            PlayerId::FIRST
        } else {
            PlayerId::SECOND
        };
        self.ops.set_first_player(first);
        info!(first = %first, "setup complete");
        self.begin_turn(first)
    }

    /// Draw until the hand holds a Basic Pokémon.
    fn draw_opening_hand(&mut self, player: PlayerId) -> Result<()> {
        let mut mulligans = 0u32;
        loop {
            self.ops.draw(player, self.config.opening_hand)?;
            if !self.ops.zone_query(player, Zone::Hand, &|d| d.is_basic_pokemon()).is_empty() {
                return Ok(());
            }
            mulligans += 1;
            debug!(player = %player, mulligans, "mulligan");
            self.ops
                .note("mulligan", Payload::new().with("player", player.0).with("count", mulligans));
            self.ops.shuffle_hand_into_deck(player)?;
        }
    }

    fn place_opening_pokemon(&mut self, player: PlayerId) -> Result<()> {
        let basics = self.ops.zone_query(player, Zone::Hand, &|d| d.is_basic_pokemon());
        let active = self.choose(player, ChoiceKind::Setup, "choose your Active Pokémon", basics.clone(), 1, 1)?;
        for id in &active {
            self.ops.move_card(*id, Location::Zone(player, Zone::Active), ZonePosition::Top)?;
        }

        let rest: Vec<InstanceId> = basics.into_iter().filter(|id| !active.contains(id)).collect();
        let room = rest.len().min(self.config.bench_size);
        let benched = self.choose(player, ChoiceKind::Setup, "choose Pokémon for your Bench", rest, 0, room)?;
        self.ops
            .move_cards(&benched, Location::Zone(player, Zone::Bench), ZonePosition::Top)?;
        Ok(())
    }

    // === Turn structure ===

    fn begin_turn(&mut self, player: PlayerId) -> Result<()> {
        self.ops.set_actor(Actor::Referee);
        self.ops.set_phase(Phase::TurnStart);
        self.ops.start_turn(player);

        self.ops.set_phase(Phase::DrawStep);
        if self.ops.draw(player, 1)?.missing > 0 {
            self.ops.set_decked_out(player);
        }
        if self.win_check() {
            return Ok(());
        }
        self.ops.set_phase(Phase::MainStep);
        self.ops.set_actor(Actor::Player(player));
        Ok(())
    }

    /// Checkup, then the opponent's turn.
    fn finish_turn(&mut self, player: PlayerId) -> Result<()> {
        self.ops.set_actor(Actor::Referee);
        self.ops.end_turn(player);

        self.ops.set_phase(Phase::Checkup);
        checkup::run(&mut self.ops, self.config, player)?;
        let fired = self.triggers.fired(self.ops.state(), &GameEvent::between_turns());
        self.resolve_triggers(fired, player)?;

        let next = player.opponent();
        self.process_knockouts(None, next)?;
        if self.win_check() {
            return Ok(());
        }
        self.begin_turn(next)
    }

    /// Set the outcome and end the game if it has been decided.
    fn win_check(&mut self) -> bool {
        self.ops.set_phase(Phase::WinCheck);
        match outcome::evaluate(self.ops.state()) {
            Some(result) => {
                info!(outcome = %result, turn = self.ops.state().turn_number, "game over");
                self.ops.set_outcome(result);
                self.ops.set_phase(Phase::GameOver);
                true
            }
            None => false,
        }
    }

    // === Actions ===

    fn perform(&mut self, player: PlayerId, request: &ActionRequest) -> Result<ActionOutcome> {
        let mut result = ActionOutcome {
            log_entries: 0,
            damage_dealt: None,
            knocked_out: Vec::new(),
            turn_ended: false,
        };

        match request {
            ActionRequest::PlayBasic { card } => {
                let zone = if self.ops.state().active(player).is_none() {
                    Zone::Active
                } else {
                    Zone::Bench
                };
                self.ops.move_card(*card, Location::Zone(player, zone), ZonePosition::Top)?;
            }
            ActionRequest::Evolve { card, target, .. } => self.ops.evolve(*target, *card)?,
            ActionRequest::AttachEnergy { card, target } => {
                self.ops.attach(*card, *target)?;
                self.ops.track_usage(player, UsageScope::Turn, ENERGY_ATTACHED)?;
            }
            ActionRequest::PlayTrainer { card, target } => self.play_trainer(player, *card, *target)?,
            ActionRequest::UseAbility { pokemon, ability } => self.use_ability(player, *pokemon, *ability)?,
            ActionRequest::Retreat { bench, energy } => {
                for id in energy {
                    self.ops.discard(*id)?;
                }
                self.ops.swap_active_with_bench(player, *bench)?;
                self.ops.track_usage(player, UsageScope::Turn, RETREATED)?;
            }
            ActionRequest::Attack { attack } => result.damage_dealt = self.attack(player, *attack)?,
            ActionRequest::EndTurn => {}
        }

        if request.ends_turn() {
            if self.ops.state().phase != Phase::GameOver {
                self.finish_turn(player)?;
            }
        } else {
            self.process_knockouts(None, player)?;
            if !self.win_check() {
                self.ops.set_phase(Phase::MainStep);
            }
        }

        result.turn_ended = self.ops.state().active_player != player;
        result.knocked_out = std::mem::take(&mut self.knocked_out);
        Ok(result)
    }

    /// Items and Supporters go to the discard pile before their text
    /// resolves; Stadiums and Tools stay in play.
    fn play_trainer(&mut self, player: PlayerId, card: InstanceId, target: Option<InstanceId>) -> Result<()> {
        let def = self.ops.definition(card)?;
        let kind = def.trainer_kind().ok_or(IllegalReason::WrongCardKind {
            card,
            expected: "Trainer",
        })?;
        self.ops
            .note("play_trainer", Payload::new().with("card", card).with("name", &def.name));

        match kind {
            TrainerKind::Item | TrainerKind::Supporter => {
                self.ops.discard(card)?;
                if kind == TrainerKind::Supporter {
                    self.ops.track_usage(player, UsageScope::Turn, SUPPORTER_PLAYED)?;
                }
                let effects = self.effects;
                if let Some(descriptor) = effects.get(&def.id).and_then(|e| e.text.as_ref()) {
                    self.interpreter()
                        .execute(descriptor, &EffectContext::trainer(player, card, None))?;
                }
            }
            TrainerKind::Stadium => {
                if let Some(replaced) = self.ops.put_stadium(card)? {
                    debug!(%replaced, "stadium replaced");
                }
                self.ops.track_usage(player, UsageScope::Turn, STADIUM_PLAYED)?;
            }
            TrainerKind::Tool => {
                let host = target.ok_or(IllegalReason::MissingTarget)?;
                self.ops.attach(card, host)?;
            }
        }
        Ok(())
    }

    fn use_ability(&mut self, player: PlayerId, pokemon: InstanceId, index: usize) -> Result<()> {
        let def = self.ops.definition(pokemon)?;
        let printed = def.abilities.get(index).ok_or(IllegalReason::NoSuchAbility(index))?;
        let effects = self.effects;
        let descriptor = effects
            .get(&def.id)
            .and_then(|e| e.abilities.get(index))
            .ok_or(IllegalReason::NoSuchAbility(index))?;

        if let Some((scope, key)) = legality::ability_usage(pokemon, index, &printed.name, descriptor.limit) {
            self.ops.track_usage(player, scope, &key)?;
        }
        self.ops.note(
            "use_ability",
            Payload::new().with("card", pokemon).with("ability", &printed.name),
        );
        self.interpreter()
            .execute(descriptor, &EffectContext::ability(player, pokemon))?;
        Ok(())
    }

    /// Resolve an attack. Returns the damage placed on the Defending
    /// Pokémon, or `None` when the attack failed before damage.
    fn attack(&mut self, player: PlayerId, index: usize) -> Result<Option<u32>> {
        self.ops.set_phase(Phase::AttackDeclared);
        let attacker = self
            .ops
            .state()
            .active(player)
            .ok_or(IllegalReason::NoActivePokemon)?;
        let def = self.ops.definition(attacker)?;
        let printed = def.attacks.get(index).ok_or(IllegalReason::NoSuchAttack(index))?;
        self.ops.note(
            "attack",
            Payload::new().with("card", attacker).with("attack", &printed.name),
        );

        if self.ops.state().instance(attacker)?.conditions.contains(SpecialCondition::Confused)
            && !self.ops.flip_coin().heads
        {
            let amount = i32::try_from(self.config.confusion_self_damage).unwrap_or(i32::MAX);
            self.ops.update_damage(attacker, amount)?;
            self.ops.note(
                "attack_failed",
                Payload::new().with("card", attacker).with("reason", "confused"),
            );
            self.process_knockouts(None, player.opponent())?;
            self.win_check();
            return Ok(None);
        }

        let effects = self.effects;
        let descriptor = effects.get(&def.id).and_then(|e| e.attacks.get(index));
        let ctx = EffectContext::attack(player, attacker);
        let mut report = EffectReport::default();
        if let Some(descriptor) = descriptor {
            self.interpreter()
                .run(descriptor, &ctx, RunPhase::BeforeDamage, &mut report)?;
        }
        if report.attack_fails {
            self.ops.note(
                "attack_failed",
                Payload::new().with("card", attacker).with("reason", "effect"),
            );
            self.process_knockouts(None, player.opponent())?;
            self.win_check();
            return Ok(None);
        }

        let defender = self.ops.state().active(player.opponent());
        let mut dealt = None;
        if let Some(defender) = defender {
            self.ops.set_phase(Phase::DamageCalc);
            let input = DamageInput::for_attack(
                self.ops.state(),
                self.ops.catalog(),
                self.effects,
                self.config,
                attacker,
                defender,
                report.attack_damage(printed.damage),
            )?;
            let calc = damage::calculate(&input);
            debug!(steps = ?calc.steps, stopped_at = ?calc.stopped_at, total = calc.total, "damage calculated");
            if calc.total > 0 {
                self.ops
                    .update_damage(defender, i32::try_from(calc.total).unwrap_or(i32::MAX))?;
            }
            self.ops.note(
                "damage",
                Payload::new().with("target", defender).with("amount", calc.total),
            );
            dealt = Some(calc.total);
        }

        self.ops.set_phase(Phase::EffectResolution);
        if let Some(descriptor) = descriptor {
            self.interpreter()
                .run(descriptor, &ctx, RunPhase::AfterDamage, &mut report)?;
        }

        let mut damaged: Vec<InstanceId> = defender.filter(|_| dealt.is_some_and(|d| d > 0)).into_iter().collect();
        for id in report.damaged {
            let theirs = self.ops.state().get(id).is_some_and(|c| c.owner != player);
            if theirs && !damaged.contains(&id) {
                damaged.push(id);
            }
        }
        let fired: Vec<ReactiveTrigger> = damaged
            .iter()
            .flat_map(|id| {
                self.triggers
                    .fired(self.ops.state(), &GameEvent::damaged_by_attack(*id, attacker))
            })
            .collect();
        self.resolve_triggers(fired, player.opponent())?;

        self.process_knockouts(Some(attacker), player.opponent())?;
        self.win_check();
        Ok(dealt)
    }

    // === Knock Outs ===

    /// Handle every Knock Out until none remain. `attacker` is the Pokémon
    /// whose attack caused the first batch, if any.
    fn process_knockouts(&mut self, attacker: Option<InstanceId>, next: PlayerId) -> Result<()> {
        let mut attacker = attacker;
        loop {
            let knocked = knockout::detect(&mut self.ops)?;
            if knocked.is_empty() {
                return Ok(());
            }
            self.ops.set_phase(Phase::KnockoutProcessing);
            info!(count = knocked.len(), "knock out");

            let attacking_side = match attacker {
                Some(a) => Some(self.ops.state().instance(a)?.owner),
                None => None,
            };
            let mut fired = Vec::new();
            for id in &knocked {
                let owner = self.ops.state().instance(*id)?.owner;
                let by = attacker.filter(|_| attacking_side.is_some_and(|side| side != owner));
                fired.extend(self.triggers.fired(self.ops.state(), &GameEvent::knocked_out(*id, by)));
            }
            self.resolve_triggers(fired, next)?;

            let owed = knockout::prizes_owed(self.ops.state(), self.ops.catalog(), &knocked)?;
            for id in &knocked {
                self.ops.note("knocked_out", Payload::new().with("card", *id));
                self.ops.discard(*id)?;
            }
            self.knocked_out.extend(&knocked);

            for player in knockout::acting_order(next) {
                let count = owed[player].min(self.ops.state().prizes_remaining(player));
                self.take_prizes(player, count)?;
            }
            if outcome::evaluate(self.ops.state()).is_some() {
                return Ok(());
            }
            self.promote_replacements(next)?;
            attacker = None;
        }
    }

    fn take_prizes(&mut self, player: PlayerId, count: usize) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        let prizes: Vec<InstanceId> = self.ops.state().zones.pile(player, Zone::Prize).iter().copied().collect();
        let taken = self.choose(player, ChoiceKind::Prize, "take your Prize cards", prizes, count, count)?;
        for prize in taken {
            self.ops.take_prize(player, prize)?;
        }
        Ok(())
    }

    /// Players without an Active Pokémon promote one from their Bench, the
    /// player who acts next first.
    fn promote_replacements(&mut self, next: PlayerId) -> Result<()> {
        for player in knockout::acting_order(next) {
            if self.ops.state().active(player).is_some() {
                continue;
            }
            let bench = self.ops.state().bench(player);
            let chosen = self.choose(player, ChoiceKind::Replacement, "choose a new Active Pokémon", bench, 1, 1)?;
            if let Some(&promoted) = chosen.first() {
                self.ops.swap_active_with_bench(player, promoted)?;
            }
        }
        Ok(())
    }

    // === Reactive abilities ===

    /// Resolve fired triggers, grouped by controller starting with `first`.
    /// Each controller orders their own group.
    fn resolve_triggers(&mut self, fired: Vec<ReactiveTrigger>, first: PlayerId) -> Result<()> {
        if fired.is_empty() {
            return Ok(());
        }
        for player in PlayerId::starting_with(first) {
            let mine: Vec<ReactiveTrigger> = fired.iter().filter(|t| t.owner == player).cloned().collect();
            for trigger in self.order_triggers(player, mine)? {
                self.resolve_trigger(&trigger)?;
            }
        }
        Ok(())
    }

    fn resolve_trigger(&mut self, trigger: &ReactiveTrigger) -> Result<()> {
        let effects = self.effects;
        let Some(descriptor) = effects
            .get(&trigger.card)
            .and_then(|e| e.abilities.get(trigger.ability))
        else {
            return Ok(());
        };
        self.ops.note(
            "trigger",
            Payload::new()
                .with("card", trigger.source)
                .with("ability", &trigger.name)
                .with("kind", trigger.kind.name()),
        );
        debug!(source = %trigger.source, ability = %trigger.name, kind = trigger.kind.name(), "reactive ability");
        let ctx = EffectContext::reactive(trigger.owner, trigger.source, trigger.attacker);
        self.interpreter().execute(descriptor, &ctx)?;
        Ok(())
    }

    /// Ask `player` to order their simultaneous triggers by source Pokémon.
    /// A timeout keeps board order.
    fn order_triggers(&mut self, player: PlayerId, triggers: Vec<ReactiveTrigger>) -> Result<Vec<ReactiveTrigger>> {
        let mut sources: Vec<InstanceId> = Vec::new();
        for t in &triggers {
            if !sources.contains(&t.source) {
                sources.push(t.source);
            }
        }
        if sources.len() < 2 {
            return Ok(triggers);
        }

        let request = ChoiceRequest::new(player, ChoiceKind::Order, "order your abilities", sources.clone())
            .with_bounds(sources.len(), sources.len())
            .with_timeout(self.config.choice_timeout());
        let order = match self.chooser.request_choice(&request) {
            ChoiceResponse::Selected(ids) => {
                request
                    .check(&ids)
                    .map_err(|reason| RefereeError::InvalidChoice { player, reason })?;
                ids
            }
            ChoiceResponse::TimedOut => {
                info!(player = %player, "trigger order timed out, keeping board order");
                sources
            }
            ChoiceResponse::Cancelled => {
                return Err(RefereeError::ChoiceCancelled {
                    player,
                    prompt: request.prompt,
                })
            }
        };
        self.ops.note(
            "choice",
            Payload::new()
                .with("player", player.0)
                .with("kind", "Order")
                .with("candidates", order.len()),
        );

        let mut ordered = Vec::with_capacity(triggers.len());
        for source in order {
            ordered.extend(triggers.iter().filter(|t| t.source == source).cloned());
        }
        Ok(ordered)
    }

    // === Choices ===

    /// Ask `player` for between `min` and `max` of `candidates`.
    ///
    /// No request is made when the answer is forced. A timeout selects
    /// nothing when nothing is allowed, and aborts the request otherwise.
    fn choose(
        &mut self,
        player: PlayerId,
        kind: ChoiceKind,
        prompt: &str,
        candidates: Vec<InstanceId>,
        min: usize,
        max: usize,
    ) -> Result<Vec<InstanceId>> {
        let max = max.min(candidates.len());
        let min = min.min(max);
        if max == 0 {
            return Ok(Vec::new());
        }
        if min == candidates.len() {
            return Ok(candidates);
        }

        let request = ChoiceRequest::new(player, kind, prompt, candidates)
            .with_bounds(min, max)
            .with_timeout(self.config.choice_timeout());
        let selected = match self.chooser.request_choice(&request) {
            ChoiceResponse::Selected(ids) => {
                request
                    .check(&ids)
                    .map_err(|reason| RefereeError::InvalidChoice { player, reason })?;
                ids
            }
            ChoiceResponse::TimedOut if min == 0 => {
                info!(player = %player, prompt, "choice timed out, selecting nothing");
                Vec::new()
            }
            ChoiceResponse::TimedOut => {
                return Err(RefereeError::ChoiceTimeout {
                    player,
                    prompt: request.prompt,
                })
            }
            ChoiceResponse::Cancelled => {
                return Err(RefereeError::ChoiceCancelled {
                    player,
                    prompt: request.prompt,
                })
            }
        };
        self.ops.note(
            "choice",
            Payload::new()
                .with("player", player.0)
                .with("kind", format!("{kind:?}"))
                .with("candidates", request.candidates.len())
                .with("selected", selected.len()),
        );
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::{Attack, CardDefinition, CardRegistry, EnergyType};
    use crate::core::{DeterministicEntropy, MemoryAuditSink};
    use crate::effects::{AutoChooser, FallbackStrategy};
    use crate::rules::RuleBook;

    fn catalog() -> Arc<CardRegistry> {
        Arc::new(CardRegistry::new().with_cards([
            CardDefinition::pokemon(CardId(1), "Pikachu", 60)
                .with_type(EnergyType::Lightning)
                .with_attack(Attack::new("Gnaw", &[EnergyType::Colorless], 10)),
            CardDefinition::basic_energy(CardId(2), EnergyType::Lightning),
        ]).unwrap())
    }

    fn decks() -> PlayerMap<Vec<CardId>> {
        let mut deck = vec![CardId(1); 4];
        deck.extend(std::iter::repeat(CardId(2)).take(56));
        PlayerMap::with_value(deck)
    }

    fn referee(seed: u64) -> Referee {
        let config = RefereeConfig {
            match_id: Some("unit".into()),
            ..RefereeConfig::default()
        };
        Referee::new(
            config,
            catalog(),
            &decks(),
            Box::new(DeterministicEntropy::new(seed)),
            Box::new(AutoChooser(FallbackStrategy::Maximum)),
        )
        .unwrap()
    }

    #[test]
    fn test_referee_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Referee>();
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = RefereeConfig {
            bench_size: 0,
            ..RefereeConfig::default()
        };
        let err = Referee::new(
            config,
            catalog(),
            &decks(),
            Box::new(DeterministicEntropy::new(0)),
            Box::new(AutoChooser::default()),
        )
        .err()
        .unwrap();
        assert!(matches!(err, RefereeError::Structural(StructuralError::InvalidConfig(_))));
    }

    #[test]
    fn test_setup_starts_first_turn() {
        let mut referee = referee(3);
        referee.setup().unwrap();

        let state = referee.state();
        let first = state.first_player.unwrap();
        assert_eq!(state.phase, Phase::MainStep);
        assert_eq!(state.turn_number, 1);
        assert_eq!(state.active_player, first);
        for player in PlayerId::both() {
            assert!(state.active(player).is_some());
            assert_eq!(state.prizes_remaining(player), 6);
        }
        assert_eq!(state.hand(first).len() + state.in_play(first).len(), 8);
        state.verify_locations().unwrap();

        assert!(matches!(
            referee.setup(),
            Err(RefereeError::Illegal(IllegalAction {
                reason: IllegalReason::WrongPhase(Phase::MainStep),
                ..
            }))
        ));
    }

    #[test]
    fn test_rejection_carries_ruling_and_changes_nothing() {
        let mut referee = referee(3).with_rulings(RuleBook::from_text(
            "5.1 A player may not take actions during the other player's turn.",
        ));
        referee.setup().unwrap();
        let idle = referee.state().active_player.opponent();
        let before = referee.snapshot();

        let err = referee.submit(idle, ActionRequest::EndTurn).unwrap_err();
        let RefereeError::Illegal(action) = err else {
            panic!("expected an illegal action");
        };
        assert_eq!(action.reason, IllegalReason::NotYourTurn(idle));
        assert!(action.ruling.is_some_and(|r| r.starts_with("§5.1")));
        assert_eq!(referee.state(), &before);
    }

    #[test]
    fn test_end_turn_passes_and_commits_to_sink() {
        let sink = Arc::new(MemoryAuditSink::new());
        let mut referee = referee(9).with_audit_sink(sink.clone());
        referee.setup().unwrap();
        let committed = sink.len();
        assert_eq!(committed, referee.state().log.len());

        let first = referee.state().active_player;
        let outcome = referee.submit(first, ActionRequest::EndTurn).unwrap();
        assert!(outcome.turn_ended);
        assert_eq!(referee.state().active_player, first.opponent());
        assert_eq!(referee.state().turn_number, 2);
        assert_eq!(sink.len(), committed + outcome.log_entries);
    }
}
