//! Card system: definitions, instances, and catalog.
//!
//! ## Key Types
//!
//! - `CardId`: Identifier for printed card definitions
//! - `CardDefinition`: Static card data (HP, attacks, costs, effect text)
//! - `CardInstance`: One physical copy in a match (damage, attachments, layers)
//! - `CardCatalog`: Read-only definition lookup, `CardRegistry` in memory

pub mod definition;
pub mod instance;
pub mod registry;

pub use definition::{Ability, Attack, CardCategory, CardDefinition, CardId, EnergyType, Stage, TrainerKind};
pub use instance::{CardInstance, Conditions, DisabledAttack, EvolutionLayer, SpecialCondition};
pub use registry::{CardCatalog, CardRegistry};
