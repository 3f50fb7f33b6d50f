//! Effect targeting.
//!
//! - [`Quantity`]: how many targets a clause asks for, with exact bounds
//! - [`PokemonTarget`]: which Pokémon in play a clause refers to
//! - [`CardFilter`]: which cards a search, discard or attach may pick
//!
//! Candidates are always recomputed from live state through
//! [`PokemonTarget::candidates`]; nothing here caches board contents.
//!
//! The `parse_*` helpers turn a noun phrase of card text into one of these
//! types, or decline with `None`.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::descriptor::Side;
use crate::cards::{CardCatalog, CardDefinition, EnergyType, Stage, TrainerKind};
use crate::core::{GameState, InstanceId, PlayerId};

/// Number of targets a clause asks for.
///
/// ```
/// use ptcg_referee::effects::Quantity;
///
/// assert_eq!(Quantity::Exactly(2).bounds(5), (2, 2));
/// assert_eq!(Quantity::Exactly(2).bounds(1), (1, 1));
/// assert_eq!(Quantity::UpTo(2).bounds(5), (0, 2));
/// assert_eq!(Quantity::AnyAmount.bounds(3), (0, 3));
/// assert_eq!(Quantity::All.bounds(0), (0, 0));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quantity {
    /// Exactly N, or every available one if fewer exist.
    Exactly(u32),
    /// 0..=N, never forced.
    UpTo(u32),
    /// 0..=all available.
    AnyAmount,
    /// Every legal target, no choice.
    All,
}

impl Quantity {
    /// `(min, max)` selections given `available` legal targets.
    #[must_use]
    pub fn bounds(self, available: usize) -> (usize, usize) {
        match self {
            Quantity::Exactly(n) => {
                let k = (n as usize).min(available);
                (k, k)
            }
            Quantity::UpTo(n) => (0, (n as usize).min(available)),
            Quantity::AnyAmount => (0, available),
            Quantity::All => (available, available),
        }
    }

    /// Whether the player must pick at least one when targets exist.
    #[must_use]
    pub fn is_mandatory(self) -> bool {
        matches!(self, Quantity::Exactly(n) if n > 0)
    }
}

/// Which part of a player's board a clause refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Spot {
    Active,
    Bench,
    Any,
}

/// How a Pokémon reference resolves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PokemonSelector {
    /// The Pokémon the effect belongs to (attacker, ability holder, tool host).
    This,
    /// The targets chosen by the preceding node ("that Pokémon", "it").
    Previous,
    /// The Pokémon that attacked, for reactive abilities.
    Attacker,
    Side {
        side: Side,
        spot: Spot,
        evolved_only: bool,
    },
}

/// A Pokémon reference with its quantifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PokemonTarget {
    pub selector: PokemonSelector,
    pub quantity: Quantity,
}

/// What a target reference is resolved against.
#[derive(Clone, Copy, Debug)]
pub struct TargetContext<'a> {
    /// Player "you" refers to.
    pub actor: PlayerId,
    pub source: Option<InstanceId>,
    pub attacker: Option<InstanceId>,
    pub previous: &'a [InstanceId],
}

impl PokemonTarget {
    #[must_use]
    pub const fn this() -> Self {
        Self {
            selector: PokemonSelector::This,
            quantity: Quantity::Exactly(1),
        }
    }

    #[must_use]
    pub const fn previous() -> Self {
        Self {
            selector: PokemonSelector::Previous,
            quantity: Quantity::All,
        }
    }

    #[must_use]
    pub const fn attacker() -> Self {
        Self {
            selector: PokemonSelector::Attacker,
            quantity: Quantity::Exactly(1),
        }
    }

    #[must_use]
    pub const fn side(side: Side, spot: Spot, quantity: Quantity) -> Self {
        Self {
            selector: PokemonSelector::Side {
                side,
                spot,
                evolved_only: false,
            },
            quantity,
        }
    }

    /// The opponent's Active Pokémon ("the Defending Pokémon").
    #[must_use]
    pub const fn opponent_active() -> Self {
        Self::side(Side::Opponents, Spot::Active, Quantity::Exactly(1))
    }

    /// Pokémon in play this reference can currently pick.
    #[must_use]
    pub fn candidates(&self, state: &GameState, ctx: &TargetContext<'_>) -> Vec<InstanceId> {
        let in_play = |id: &InstanceId| state.get(*id).is_some_and(|c| c.location.is_in_play());
        match self.selector {
            PokemonSelector::This => ctx.source.into_iter().filter(in_play).collect(),
            PokemonSelector::Attacker => ctx.attacker.into_iter().filter(in_play).collect(),
            PokemonSelector::Previous => ctx.previous.iter().copied().filter(in_play).collect(),
            PokemonSelector::Side { side, spot, evolved_only } => {
                let player = match side {
                    Side::Yours => ctx.actor,
                    Side::Opponents => ctx.actor.opponent(),
                };
                let mut ids = match spot {
                    Spot::Active => state.active(player).into_iter().collect(),
                    Spot::Bench => state.bench(player),
                    Spot::Any => state.in_play(player),
                };
                if evolved_only {
                    ids.retain(|id| state.get(*id).is_some_and(|c| c.is_evolved()));
                }
                ids
            }
        }
    }
}

/// Broad card categories used by filters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardKind {
    Any,
    Pokemon,
    BasicPokemon,
    EvolutionPokemon,
    Energy,
    BasicEnergy,
    Trainer,
    Item,
    Supporter,
    Tool,
    Stadium,
}

/// Predicate over card definitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CardFilter {
    pub kind: CardKind,
    /// Energy provided (for Energy) or Pokémon type (for Pokémon).
    pub energy_type: Option<EnergyType>,
    pub max_hp: Option<u32>,
}

impl CardFilter {
    #[must_use]
    pub const fn any() -> Self {
        Self::of_kind(CardKind::Any)
    }

    #[must_use]
    pub const fn of_kind(kind: CardKind) -> Self {
        Self {
            kind,
            energy_type: None,
            max_hp: None,
        }
    }

    #[must_use]
    pub const fn with_energy_type(mut self, energy: EnergyType) -> Self {
        self.energy_type = Some(energy);
        self
    }

    #[must_use]
    pub const fn with_max_hp(mut self, hp: u32) -> Self {
        self.max_hp = Some(hp);
        self
    }

    /// Whether a definition passes the filter.
    #[must_use]
    pub fn matches(&self, card: &CardDefinition) -> bool {
        let kind_ok = match self.kind {
            CardKind::Any => true,
            CardKind::Pokemon => card.is_pokemon(),
            CardKind::BasicPokemon => card.is_basic_pokemon(),
            CardKind::EvolutionPokemon => card.is_pokemon() && card.stage.is_some_and(|s| s != Stage::Basic),
            CardKind::Energy => card.is_energy(),
            CardKind::BasicEnergy => card.is_basic_energy(),
            CardKind::Trainer => card.trainer_kind().is_some(),
            CardKind::Item => card.trainer_kind() == Some(TrainerKind::Item),
            CardKind::Supporter => card.trainer_kind() == Some(TrainerKind::Supporter),
            CardKind::Tool => card.trainer_kind() == Some(TrainerKind::Tool),
            CardKind::Stadium => card.trainer_kind() == Some(TrainerKind::Stadium),
        };
        if !kind_ok {
            return false;
        }
        if let Some(energy) = self.energy_type {
            let typed = if card.is_energy() {
                card.provides.contains(&energy)
            } else {
                card.pokemon_type == Some(energy)
            };
            if !typed {
                return false;
            }
        }
        self.max_hp.map_or(true, |hp| card.is_pokemon() && card.hp <= hp)
    }

    /// Instances whose current definition passes the filter.
    #[must_use]
    pub fn select(
        &self,
        state: &GameState,
        catalog: &dyn CardCatalog,
        ids: impl IntoIterator<Item = InstanceId>,
    ) -> Vec<InstanceId> {
        ids.into_iter()
            .filter(|id| state.definition(catalog, *id).is_ok_and(|def| self.matches(def)))
            .collect()
    }
}

impl Default for CardFilter {
    fn default() -> Self {
        Self::any()
    }
}

// === Phrase parsing ===

static QUANTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:up to (?P<upto>\d+)|(?P<any>any amount of|any number of)|(?P<all>all(?: of)?|each(?: of)?)|(?P<n>\d+|an|a))\s+(?P<rest>.+)$")
        .expect("Invalid regex")
});

static AS_MANY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^as many (?P<rest>.+?) as you like$").expect("Invalid regex"));

static CARD_FILTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?P<basic>basic) )?(?:\[(?P<symbol>[a-z])\] )?(?:(?P<basic2>basic) )?(?P<noun>evolution pok[eé]mon|pok[eé]mon tools?|pok[eé]mon|energy|trainers?|items?|supporters?|stadiums?|cards?)(?: cards?)?(?: with (?P<hp>\d+) hp or less)?$",
    )
    .expect("Invalid regex")
});

static POKEMON_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?P<q>up to \d+|\d+|each|all|any number) of )?(?P<side>your opponent's|your|their) (?P<evolved>evolved )?(?P<spot>active |benched )?pok[eé]mon$",
    )
    .expect("Invalid regex")
});

/// Split a leading quantifier off a noun phrase.
///
/// ```
/// use ptcg_referee::effects::{parse_quantity, Quantity};
///
/// assert_eq!(parse_quantity("up to 2 basic pokémon"), Some((Quantity::UpTo(2), "basic pokémon")));
/// assert_eq!(parse_quantity("a card"), Some((Quantity::Exactly(1), "card")));
/// assert_eq!(parse_quantity("basic pokémon"), None);
/// ```
#[must_use]
pub fn parse_quantity(text: &str) -> Option<(Quantity, &str)> {
    let text = text.trim();
    if let Some(caps) = AS_MANY.captures(text) {
        let rest = caps.name("rest")?;
        return Some((Quantity::AnyAmount, &text[rest.start()..rest.end()]));
    }
    let caps = QUANTITY.captures(text)?;
    let rest = caps.name("rest")?;
    let quantity = if let Some(n) = caps.name("upto") {
        Quantity::UpTo(n.as_str().parse().ok()?)
    } else if caps.name("any").is_some() {
        Quantity::AnyAmount
    } else if caps.name("all").is_some() {
        Quantity::All
    } else {
        match caps.name("n")?.as_str() {
            "a" | "an" => Quantity::Exactly(1),
            n => Quantity::Exactly(n.parse().ok()?),
        }
    };
    Some((quantity, &text[rest.start()..rest.end()]))
}

/// Parse a card noun phrase such as `basic [r] energy cards`.
#[must_use]
pub fn parse_card_filter(text: &str) -> Option<CardFilter> {
    let caps = CARD_FILTER.captures(text.trim())?;
    let basic = caps.name("basic").is_some() || caps.name("basic2").is_some();
    let noun = caps.name("noun")?.as_str();

    let kind = if noun.starts_with("evolution") {
        CardKind::EvolutionPokemon
    } else if noun.contains("tool") {
        CardKind::Tool
    } else if noun.starts_with("pok") {
        if basic {
            CardKind::BasicPokemon
        } else {
            CardKind::Pokemon
        }
    } else if noun == "energy" {
        if basic {
            CardKind::BasicEnergy
        } else {
            CardKind::Energy
        }
    } else if noun.starts_with("trainer") {
        CardKind::Trainer
    } else if noun.starts_with("item") {
        CardKind::Item
    } else if noun.starts_with("supporter") {
        CardKind::Supporter
    } else if noun.starts_with("stadium") {
        CardKind::Stadium
    } else {
        CardKind::Any
    };

    let mut filter = CardFilter::of_kind(kind);
    if let Some(symbol) = caps.name("symbol") {
        let letter = symbol.as_str().chars().next()?;
        filter = filter.with_energy_type(EnergyType::from_symbol(letter)?);
    }
    if let Some(hp) = caps.name("hp") {
        filter = filter.with_max_hp(hp.as_str().parse().ok()?);
    }
    Some(filter)
}

/// Parse a reference to Pokémon in play.
///
/// ```
/// use ptcg_referee::effects::{parse_pokemon_phrase, PokemonTarget, Quantity};
///
/// assert_eq!(parse_pokemon_phrase("this pokémon"), Some(PokemonTarget::this()));
/// let bench = parse_pokemon_phrase("2 of your opponent's benched pokémon").unwrap();
/// assert_eq!(bench.quantity, Quantity::Exactly(2));
/// ```
#[must_use]
pub fn parse_pokemon_phrase(text: &str) -> Option<PokemonTarget> {
    let text = text.trim();
    match text {
        "this pokémon" | "this pokemon" | "the pokémon this card is attached to" | "the pokemon this card is attached to" => {
            return Some(PokemonTarget::this())
        }
        "the defending pokémon" | "the defending pokemon" => return Some(PokemonTarget::opponent_active()),
        "the attacking pokémon" | "the attacking pokemon" => return Some(PokemonTarget::attacker()),
        "that pokémon" | "that pokemon" | "it" | "them" | "those pokémon" => return Some(PokemonTarget::previous()),
        _ => {}
    }

    let caps = POKEMON_PHRASE.captures(text)?;
    let side = match caps.name("side")?.as_str() {
        "your" => Side::Yours,
        _ => Side::Opponents,
    };
    let spot = match caps.name("spot").map(|m| m.as_str().trim()) {
        Some("active") => Spot::Active,
        Some("benched") => Spot::Bench,
        _ => Spot::Any,
    };
    let quantity = match caps.name("q").map(|m| m.as_str()) {
        None if spot == Spot::Active => Quantity::Exactly(1),
        None | Some("each" | "all") => Quantity::All,
        Some("any number") => Quantity::AnyAmount,
        Some(q) => match q.strip_prefix("up to ") {
            Some(n) => Quantity::UpTo(n.parse().ok()?),
            None => Quantity::Exactly(q.parse().ok()?),
        },
    };
    Some(PokemonTarget {
        selector: PokemonSelector::Side {
            side,
            spot,
            evolved_only: caps.name("evolved").is_some(),
        },
        quantity,
    })
}
