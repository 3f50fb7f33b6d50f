//! Card catalog for definition lookup.
//!
//! The referee reads definitions through the [`CardCatalog`] trait, so the
//! catalog can be populated from any external source. [`CardRegistry`] is
//! the in-memory implementation.

use rustc_hash::FxHashMap;

use super::definition::{CardDefinition, CardId};
use crate::core::StructuralError;

/// Read-only card definition lookup.
pub trait CardCatalog: Send + Sync {
    /// Get a card definition by ID.
    fn card(&self, id: CardId) -> Option<&CardDefinition>;

    /// Find a definition by name, ignoring case.
    ///
    /// Used to walk evolution lines, which cards name by Pokémon name.
    fn find_by_name(&self, name: &str) -> Option<&CardDefinition>;
}

/// In-memory registry of card definitions.
///
/// ## Example
///
/// ```
/// use ptcg_referee::cards::{CardCatalog, CardDefinition, CardId, CardRegistry};
///
/// let mut registry = CardRegistry::new();
/// registry.register(CardDefinition::pokemon(CardId::new(1), "Pikachu", 60))?;
///
/// assert_eq!(registry.card(CardId::new(1)).unwrap().name, "Pikachu");
/// assert_eq!(registry.find_by_name("pikachu").map(|c| c.id), Some(CardId::new(1)));
/// assert!(registry.register(CardDefinition::pokemon(CardId::new(1), "Raichu", 120)).is_err());
/// # Ok::<(), ptcg_referee::core::StructuralError>(())
/// ```
#[derive(Clone, Debug, Default)]
pub struct CardRegistry {
    cards: FxHashMap<CardId, CardDefinition>,
}

impl CardRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a card definition. Ids are unique within a catalog.
    pub fn register(&mut self, card: CardDefinition) -> Result<(), StructuralError> {
        if self.cards.contains_key(&card.id) {
            return Err(StructuralError::DuplicateCard(card.id));
        }
        self.cards.insert(card.id, card);
        Ok(())
    }

    /// Register several definitions (builder pattern).
    pub fn with_cards(mut self, cards: impl IntoIterator<Item = CardDefinition>) -> Result<Self, StructuralError> {
        for card in cards {
            self.register(card)?;
        }
        Ok(self)
    }

    /// Get a card definition by ID.
    #[must_use]
    pub fn get(&self, id: CardId) -> Option<&CardDefinition> {
        self.cards.get(&id)
    }

    /// Check if a card ID is registered.
    #[must_use]
    pub fn contains(&self, id: CardId) -> bool {
        self.cards.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Iterate over all card definitions.
    pub fn iter(&self) -> impl Iterator<Item = &CardDefinition> {
        self.cards.values()
    }
}

impl CardCatalog for CardRegistry {
    fn card(&self, id: CardId) -> Option<&CardDefinition> {
        self.get(id)
    }

    fn find_by_name(&self, name: &str) -> Option<&CardDefinition> {
        self.cards.values().find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::{EnergyType, Stage, TrainerKind};

    #[test]
    fn test_register_and_get() {
        let mut registry = CardRegistry::new();
        registry
            .register(CardDefinition::pokemon(CardId::new(1), "Bulbasaur", 70))
            .unwrap();

        assert_eq!(registry.card(CardId::new(1)).map(|c| c.hp), Some(70));
        assert!(registry.card(CardId::new(99)).is_none());
        assert!(registry.contains(CardId::new(1)));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut registry = CardRegistry::new();
        registry.register(CardDefinition::pokemon(CardId::new(1), "A", 60)).unwrap();

        assert_eq!(
            registry.register(CardDefinition::pokemon(CardId::new(1), "B", 60)),
            Err(StructuralError::DuplicateCard(CardId::new(1)))
        );
        assert_eq!(registry.get(CardId::new(1)).map(|c| c.name.as_str()), Some("A"));

        let err = CardRegistry::new()
            .with_cards([
                CardDefinition::basic_energy(CardId::new(2), EnergyType::Fire),
                CardDefinition::basic_energy(CardId::new(2), EnergyType::Water),
            ])
            .unwrap_err();
        assert_eq!(err, StructuralError::DuplicateCard(CardId::new(2)));
    }

    #[test]
    fn test_with_cards_and_iteration() {
        let registry = CardRegistry::new()
            .with_cards([
                CardDefinition::basic_energy(CardId::new(1), EnergyType::Water),
                CardDefinition::trainer(CardId::new(2), "Potion", TrainerKind::Item, "Heal 30 damage from 1 of your Pokémon."),
            ])
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.iter().filter(|c| c.is_energy()).count(), 1);
    }

    #[test]
    fn test_catalog_trait_object() {
        let registry = CardRegistry::new()
            .with_cards([
                CardDefinition::pokemon(CardId::new(5), "Eevee", 60),
                CardDefinition::pokemon(CardId::new(6), "Vaporeon", 130).evolves_from(Stage::Stage1, "Eevee"),
            ])
            .unwrap();
        let catalog: &dyn CardCatalog = &registry;

        assert_eq!(catalog.card(CardId::new(5)).map(|c| c.name.as_str()), Some("Eevee"));
        assert_eq!(catalog.find_by_name("VAPOREON").map(|c| c.id), Some(CardId::new(6)));
        assert!(catalog.find_by_name("Jolteon").is_none());
    }
}
