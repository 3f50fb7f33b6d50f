//! Card definitions - static card data.
//!
//! `CardDefinition` holds the printed, immutable properties of a card:
//! name, category, HP, attacks, abilities, Weakness/Resistance, costs. One
//! definition is shared by every copy of the card in every match.
//!
//! Effect text is kept verbatim. It is translated into executable
//! descriptors by [`crate::effects::EffectParser`], never interpreted here.
//!
//! Instance-specific data (damage, attachments, location) is stored
//! separately in `CardInstance`.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Unique identifier for a card definition.
///
/// This identifies the printed card (e.g., "Pikachu"), not a specific copy
/// in a match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CardId(pub u32);

impl CardId {
    /// Create a new card ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for CardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Card({})", self.0)
    }
}

/// Energy (and Pokémon) types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnergyType {
    Grass,
    Fire,
    Water,
    Lightning,
    Psychic,
    Fighting,
    Darkness,
    Metal,
    Fairy,
    Dragon,
    Colorless,
}

impl EnergyType {
    /// Parse a bracketed symbol letter, e.g. `R` in `[R]`.
    ///
    /// ```
    /// use ptcg_referee::cards::EnergyType;
    ///
    /// assert_eq!(EnergyType::from_symbol('R'), Some(EnergyType::Fire));
    /// assert_eq!(EnergyType::from_symbol('x'), None);
    /// ```
    #[must_use]
    pub fn from_symbol(symbol: char) -> Option<Self> {
        Some(match symbol.to_ascii_uppercase() {
            'G' => EnergyType::Grass,
            'R' => EnergyType::Fire,
            'W' => EnergyType::Water,
            'L' => EnergyType::Lightning,
            'P' => EnergyType::Psychic,
            'F' => EnergyType::Fighting,
            'D' => EnergyType::Darkness,
            'M' => EnergyType::Metal,
            'Y' => EnergyType::Fairy,
            'N' => EnergyType::Dragon,
            'C' => EnergyType::Colorless,
            _ => return None,
        })
    }

    /// The symbol letter.
    #[must_use]
    pub const fn symbol(self) -> char {
        match self {
            EnergyType::Grass => 'G',
            EnergyType::Fire => 'R',
            EnergyType::Water => 'W',
            EnergyType::Lightning => 'L',
            EnergyType::Psychic => 'P',
            EnergyType::Fighting => 'F',
            EnergyType::Darkness => 'D',
            EnergyType::Metal => 'M',
            EnergyType::Fairy => 'Y',
            EnergyType::Dragon => 'N',
            EnergyType::Colorless => 'C',
        }
    }
}

impl std::fmt::Display for EnergyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.symbol())
    }
}

/// Evolution stage of a Pokémon.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    Basic,
    Stage1,
    Stage2,
}

/// Trainer sub-kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrainerKind {
    Item,
    Supporter,
    Tool,
    Stadium,
}

/// Top-level card category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardCategory {
    Pokemon,
    Trainer(TrainerKind),
    /// `basic` is false for Special Energy.
    Energy { basic: bool },
}

/// A printed attack.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attack {
    pub name: String,
    pub cost: SmallVec<[EnergyType; 4]>,
    /// Printed base damage. Zero for attacks whose damage comes from text.
    pub damage: u32,
    pub text: String,
}

impl Attack {
    #[must_use]
    pub fn new(name: impl Into<String>, cost: &[EnergyType], damage: u32) -> Self {
        Self {
            name: name.into(),
            cost: cost.iter().copied().collect(),
            damage,
            text: String::new(),
        }
    }

    /// Set the effect text (builder pattern).
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }
}

/// A printed Ability.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ability {
    pub name: String,
    pub text: String,
}

/// Static card definition.
///
/// ## Example
///
/// ```
/// use ptcg_referee::cards::{Attack, CardDefinition, CardId, EnergyType};
///
/// let pikachu = CardDefinition::pokemon(CardId::new(1), "Pikachu", 60)
///     .with_type(EnergyType::Lightning)
///     .with_weakness(EnergyType::Fighting)
///     .with_retreat_cost(1)
///     .with_attack(Attack::new("Gnaw", &[EnergyType::Colorless], 10));
///
/// assert!(pikachu.is_basic_pokemon());
/// assert_eq!(pikachu.attacks[0].damage, 10);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDefinition {
    pub id: CardId,
    pub name: String,
    pub category: CardCategory,

    // === Pokémon ===
    pub stage: Option<Stage>,
    /// Name of the Pokémon this one evolves from.
    pub evolves_from: Option<String>,
    pub hp: u32,
    pub pokemon_type: Option<EnergyType>,
    pub weakness: Option<EnergyType>,
    /// Resistance type and amount subtracted.
    pub resistance: Option<(EnergyType, u32)>,
    pub retreat_cost: u32,
    pub attacks: Vec<Attack>,
    pub abilities: Vec<Ability>,
    /// Prizes the opponent takes when this Pokémon is Knocked Out.
    pub prize_value: u32,

    // === Trainer / Energy ===
    /// Trainer, Tool, Stadium or Special Energy effect text.
    pub text: String,
    /// Energy units provided when attached.
    pub provides: SmallVec<[EnergyType; 2]>,
}

impl CardDefinition {
    fn blank(id: CardId, name: impl Into<String>, category: CardCategory) -> Self {
        Self {
            id,
            name: name.into(),
            category,
            stage: None,
            evolves_from: None,
            hp: 0,
            pokemon_type: None,
            weakness: None,
            resistance: None,
            retreat_cost: 0,
            attacks: Vec::new(),
            abilities: Vec::new(),
            prize_value: 0,
            text: String::new(),
            provides: SmallVec::new(),
        }
    }

    /// A Basic Pokémon worth one Prize.
    #[must_use]
    pub fn pokemon(id: CardId, name: impl Into<String>, hp: u32) -> Self {
        Self {
            stage: Some(Stage::Basic),
            hp,
            prize_value: 1,
            ..Self::blank(id, name, CardCategory::Pokemon)
        }
    }

    /// A Trainer card with effect text.
    #[must_use]
    pub fn trainer(id: CardId, name: impl Into<String>, kind: TrainerKind, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::blank(id, name, CardCategory::Trainer(kind))
        }
    }

    /// A basic Energy card providing one unit of `energy`.
    #[must_use]
    pub fn basic_energy(id: CardId, energy: EnergyType) -> Self {
        let name = match energy {
            EnergyType::Grass => "Grass Energy",
            EnergyType::Fire => "Fire Energy",
            EnergyType::Water => "Water Energy",
            EnergyType::Lightning => "Lightning Energy",
            EnergyType::Psychic => "Psychic Energy",
            EnergyType::Fighting => "Fighting Energy",
            EnergyType::Darkness => "Darkness Energy",
            EnergyType::Metal => "Metal Energy",
            EnergyType::Fairy => "Fairy Energy",
            EnergyType::Dragon => "Dragon Energy",
            EnergyType::Colorless => "Colorless Energy",
        };
        Self {
            provides: SmallVec::from_slice(&[energy]),
            ..Self::blank(id, name, CardCategory::Energy { basic: true })
        }
    }

    /// A Special Energy card.
    #[must_use]
    pub fn special_energy(id: CardId, name: impl Into<String>, provides: &[EnergyType], text: impl Into<String>) -> Self {
        Self {
            provides: provides.iter().copied().collect(),
            text: text.into(),
            ..Self::blank(id, name, CardCategory::Energy { basic: false })
        }
    }

    /// Set the evolution stage and pre-evolution (builder pattern).
    #[must_use]
    pub fn evolves_from(mut self, stage: Stage, from: impl Into<String>) -> Self {
        self.stage = Some(stage);
        self.evolves_from = Some(from.into());
        self
    }

    /// Set the Pokémon type (builder pattern).
    #[must_use]
    pub fn with_type(mut self, energy: EnergyType) -> Self {
        self.pokemon_type = Some(energy);
        self
    }

    /// Set Weakness (builder pattern).
    #[must_use]
    pub fn with_weakness(mut self, energy: EnergyType) -> Self {
        self.weakness = Some(energy);
        self
    }

    /// Set Resistance (builder pattern).
    #[must_use]
    pub fn with_resistance(mut self, energy: EnergyType, amount: u32) -> Self {
        self.resistance = Some((energy, amount));
        self
    }

    /// Set the Retreat Cost (builder pattern).
    #[must_use]
    pub fn with_retreat_cost(mut self, cost: u32) -> Self {
        self.retreat_cost = cost;
        self
    }

    /// Add an attack (builder pattern).
    #[must_use]
    pub fn with_attack(mut self, attack: Attack) -> Self {
        self.attacks.push(attack);
        self
    }

    /// Add an Ability (builder pattern).
    #[must_use]
    pub fn with_ability(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.abilities.push(Ability {
            name: name.into(),
            text: text.into(),
        });
        self
    }

    /// Set the Prize value, e.g. 2 for Pokémon ex (builder pattern).
    #[must_use]
    pub fn with_prize_value(mut self, prizes: u32) -> Self {
        self.prize_value = prizes;
        self
    }

    // === Queries ===

    #[must_use]
    pub fn is_pokemon(&self) -> bool {
        self.category == CardCategory::Pokemon
    }

    #[must_use]
    pub fn is_basic_pokemon(&self) -> bool {
        self.is_pokemon() && self.stage == Some(Stage::Basic)
    }

    #[must_use]
    pub fn is_energy(&self) -> bool {
        matches!(self.category, CardCategory::Energy { .. })
    }

    #[must_use]
    pub fn is_basic_energy(&self) -> bool {
        self.category == CardCategory::Energy { basic: true }
    }

    /// Trainer sub-kind, if this is a Trainer.
    #[must_use]
    pub fn trainer_kind(&self) -> Option<TrainerKind> {
        match self.category {
            CardCategory::Trainer(kind) => Some(kind),
            _ => None,
        }
    }

    /// Whether the copy limit applies to this card.
    #[must_use]
    pub fn copy_limited(&self) -> bool {
        !self.is_basic_energy()
    }
}
