//! Shared fixtures for the integration tests.
//!
//! One card pool, one legal 60-card deck, and a `Board` for arranging a
//! mid-game position directly through the Atomic Operation Layer before
//! handing it to a `Referee`.

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use ptcg_referee::cards::{Attack, CardDefinition, CardId, CardRegistry, EnergyType, SpecialCondition, Stage, TrainerKind};
use ptcg_referee::core::{Actor, DeterministicEntropy, GameState, Phase, PlayerId, PlayerMap, RefereeConfig};
use ptcg_referee::effects::{
    ChoiceRequest, ChoiceResponse, Chooser, EffectContext, EffectDescriptor, EffectOrigin, EffectParser, EffectReport,
    Interpreter,
};
use ptcg_referee::ops::AtomicOps;
use ptcg_referee::rules::Referee;
use ptcg_referee::zones::{Location, Zone, ZonePosition};
use ptcg_referee::{InstanceId, Result};

pub const P0: PlayerId = PlayerId::FIRST;
pub const P1: PlayerId = PlayerId::SECOND;

pub const PIKACHU: CardId = CardId(1);
pub const RAICHU: CardId = CardId(2);
pub const MAGIKARP: CardId = CardId(3);
pub const LAPRAS_EX: CardId = CardId(4);
pub const CHARMANDER: CardId = CardId(5);
pub const FERROSEED: CardId = CardId(6);
pub const KOFFING: CardId = CardId(7);
pub const BLITZLE: CardId = CardId(8);
pub const CHARMELEON: CardId = CardId(30);
pub const CHARIZARD: CardId = CardId(31);
pub const NEST_BALL: CardId = CardId(10);
pub const RESEARCH: CardId = CardId(11);
pub const ENERGY_SEARCH: CardId = CardId(12);
pub const PADDING: CardId = CardId(13);
pub const LIGHTNING: CardId = CardId(20);
pub const FIRE: CardId = CardId(21);
pub const WATER: CardId = CardId(22);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Every card the fixtures use. All texts parse.
pub fn catalog() -> Arc<CardRegistry> {
    use EnergyType::{Colorless, Fighting, Fire, Grass, Lightning, Psychic, Water};

    Arc::new(CardRegistry::new().with_cards([
        CardDefinition::pokemon(PIKACHU, "Pikachu", 60)
            .with_type(Lightning)
            .with_weakness(Fighting)
            .with_retreat_cost(1)
            .with_attack(Attack::new("Gnaw", &[Colorless], 10)),
        CardDefinition::pokemon(RAICHU, "Raichu", 120)
            .with_type(Lightning)
            .with_weakness(Fighting)
            .evolves_from(Stage::Stage1, "Pikachu")
            .with_attack(Attack::new("Thunderbolt", &[Lightning, Colorless], 90)),
        CardDefinition::pokemon(MAGIKARP, "Magikarp", 30)
            .with_type(Water)
            .with_weakness(Lightning)
            .with_retreat_cost(1)
            .with_attack(Attack::new("Splash", &[Colorless], 10)),
        CardDefinition::pokemon(LAPRAS_EX, "Lapras ex", 220)
            .with_type(Water)
            .with_weakness(Lightning)
            .with_prize_value(2)
            .with_attack(Attack::new("Surf", &[Water, Colorless], 60)),
        CardDefinition::pokemon(CHARMANDER, "Charmander", 70)
            .with_type(Fire)
            .with_weakness(Water)
            .with_attack(Attack::new("Magma Burst", &[Fire], 0).with_text(
                "Discard any amount of [R] Energy from this Pokémon. \
                 This attack does 50 damage for each card you discarded in this way.",
            )),
        CardDefinition::pokemon(CHARMELEON, "Charmeleon", 90)
            .with_type(Fire)
            .with_weakness(Water)
            .evolves_from(Stage::Stage1, "Charmander")
            .with_attack(Attack::new("Flare", &[Fire], 30)),
        CardDefinition::pokemon(CHARIZARD, "Charizard", 170)
            .with_type(Fire)
            .with_weakness(Water)
            .evolves_from(Stage::Stage2, "Charmeleon")
            .with_attack(Attack::new("Fire Spin", &[Fire, Fire, Colorless], 150)),
        CardDefinition::pokemon(FERROSEED, "Ferroseed", 60)
            .with_type(Grass)
            .with_weakness(Fire)
            .with_ability(
                "Iron Barbs",
                "If this Pokémon is damaged by an attack from your opponent's Pokémon \
                 (even if this Pokémon is Knocked Out), put 3 damage counters on the Attacking Pokémon.",
            )
            .with_attack(Attack::new("Tackle", &[Colorless], 10)),
        CardDefinition::pokemon(KOFFING, "Koffing", 50)
            .with_type(Psychic)
            .with_attack(
                Attack::new("Smog", &[Colorless], 10).with_text("Your opponent's Active Pokémon is now Poisoned."),
            ),
        CardDefinition::pokemon(BLITZLE, "Blitzle", 70)
            .with_type(Lightning)
            .with_weakness(Fighting)
            .with_attack(Attack::new("Flash Charge", &[Colorless], 30).with_text(
                "You may discard an Energy from this Pokémon. If you do, this attack does 60 more damage.",
            )),
        CardDefinition::trainer(
            NEST_BALL,
            "Nest Ball",
            TrainerKind::Item,
            "Search your deck for up to 2 Basic Pokémon and put them onto your Bench. Then, shuffle your deck.",
        ),
        CardDefinition::trainer(
            RESEARCH,
            "Professor's Research",
            TrainerKind::Supporter,
            "Discard your hand and draw 7 cards.",
        ),
        CardDefinition::trainer(
            ENERGY_SEARCH,
            "Lightning Call",
            TrainerKind::Item,
            "Search your deck for a Basic [L] Energy card and attach it to 1 of your Benched Pokémon. \
             Then, shuffle your deck.",
        ),
        CardDefinition::trainer(
            PADDING,
            "Protective Padding",
            TrainerKind::Tool,
            "The Pokémon this card is attached to takes 30 less damage from your opponent's attacks \
             (after applying Weakness and Resistance).",
        ),
        CardDefinition::basic_energy(LIGHTNING, Lightning),
        CardDefinition::basic_energy(FIRE, Fire),
        CardDefinition::basic_energy(WATER, Water),
    ]).unwrap())
}

/// A legal deck holding every fixture card, filled with Water Energy.
pub fn deck() -> Vec<CardId> {
    let mut deck = Vec::with_capacity(60);
    for (card, copies) in [
        (PIKACHU, 4),
        (RAICHU, 2),
        (MAGIKARP, 4),
        (LAPRAS_EX, 2),
        (CHARMANDER, 2),
        (FERROSEED, 2),
        (KOFFING, 2),
        (BLITZLE, 2),
        (CHARMELEON, 1),
        (CHARIZARD, 1),
        (NEST_BALL, 2),
        (RESEARCH, 2),
        (ENERGY_SEARCH, 2),
        (PADDING, 2),
        (LIGHTNING, 10),
        (FIRE, 10),
    ] {
        deck.extend(std::iter::repeat(card).take(copies));
    }
    deck.resize(60, WATER);
    deck
}

pub fn config() -> RefereeConfig {
    RefereeConfig {
        match_id: Some("fixture".into()),
        ..RefereeConfig::default()
    }
}

/// A fresh match, not yet set up.
pub fn referee(seed: u64, chooser: impl Chooser + Send + 'static) -> Referee {
    Referee::new(
        config(),
        catalog(),
        &PlayerMap::with_value(deck()),
        Box::new(DeterministicEntropy::new(seed)),
        Box::new(chooser),
    )
    .unwrap()
}

pub fn parse(text: &str, origin: EffectOrigin) -> EffectDescriptor {
    EffectParser::new().parse(text, origin).unwrap()
}

/// A match position arranged by hand.
pub struct Board {
    pub catalog: Arc<CardRegistry>,
    pub state: GameState,
    entropy: DeterministicEntropy,
}

impl Board {
    pub fn new() -> Self {
        let catalog = catalog();
        let state = GameState::new_match("board", &config(), &PlayerMap::with_value(deck()), catalog.as_ref()).unwrap();
        Self {
            catalog,
            state,
            entropy: DeterministicEntropy::new(7),
        }
    }

    pub fn ops(&mut self) -> AtomicOps<'_> {
        AtomicOps::new(&mut self.state, &mut self.entropy, self.catalog.as_ref(), Actor::Referee)
    }

    /// Move the topmost copy of `card` from `player`'s deck into `zone`.
    pub fn place(&mut self, player: PlayerId, card: CardId, zone: Zone) -> InstanceId {
        let id = self.state.find_in_zone(player, Zone::Deck, card).unwrap();
        self.ops()
            .move_card(id, Location::Zone(player, zone), ZonePosition::Top)
            .unwrap();
        id
    }

    /// Attach a copy of `card` from `player`'s deck to `host`.
    pub fn attach(&mut self, player: PlayerId, card: CardId, host: InstanceId) -> InstanceId {
        let id = self.state.find_in_zone(player, Zone::Deck, card).unwrap();
        self.ops().attach(id, host).unwrap();
        id
    }

    pub fn damage(&mut self, id: InstanceId, amount: i32) {
        self.ops().update_damage(id, amount).unwrap();
    }

    pub fn condition(&mut self, id: InstanceId, condition: SpecialCondition) {
        self.ops().set_condition(id, condition).unwrap();
    }

    /// Set `count` Prize cards for both players.
    pub fn prizes(&mut self, count: usize) {
        for player in PlayerId::both() {
            self.ops().set_prizes(player, count).unwrap();
        }
    }

    /// Put the match in `player`'s main step on `turn`.
    pub fn main_step(&mut self, player: PlayerId, turn: u32) {
        self.ops().set_first_player(P0);
        self.state.turn_number = turn;
        self.state.active_player = player;
        self.state.phase = Phase::MainStep;
    }

    /// Run card text directly against this board.
    pub fn run(
        &mut self,
        text: &str,
        origin: EffectOrigin,
        ctx: &EffectContext,
        chooser: &mut dyn Chooser,
    ) -> Result<EffectReport> {
        let descriptor = parse(text, origin);
        let mut ops = self.ops();
        Interpreter::new(&mut ops, chooser, config().choice_timeout()).execute(&descriptor, ctx)
    }

    pub fn referee(self, chooser: impl Chooser + Send + 'static) -> Referee {
        Referee::resume(
            config(),
            self.catalog,
            self.state,
            Box::new(DeterministicEntropy::new(99)),
            Box::new(chooser),
        )
        .unwrap()
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

/// Wraps a chooser and records every request it sees.
pub struct Recording<C> {
    inner: C,
    seen: Arc<Mutex<Vec<ChoiceRequest>>>,
}

impl<C: Chooser> Recording<C> {
    pub fn new(inner: C) -> (Self, Arc<Mutex<Vec<ChoiceRequest>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                inner,
                seen: seen.clone(),
            },
            seen,
        )
    }
}

impl<C: Chooser> Chooser for Recording<C> {
    fn request_choice(&mut self, request: &ChoiceRequest) -> ChoiceResponse {
        self.seen.lock().push(request.clone());
        self.inner.request_choice(request)
    }
}
