//! Reactive triggers.
//!
//! Some abilities are never activated by their owner. They fire on their
//! own when something happens to the Pokémon that has them:
//!
//! - [`TriggerKind::DamagedByAttack`]: after attack damage is placed
//! - [`TriggerKind::KnockedOut`]: before the Pokémon is discarded
//! - [`TriggerKind::BetweenTurns`]: during Pokémon Checkup
//!
//! The parser tags such abilities with their trigger kind. At match setup
//! the Referee indexes them in a [`TriggerRegistry`]; when an event is raised
//! the registry lists the [`ReactiveTrigger`]s it fires. Ordering several
//! simultaneous triggers is a choice for the player who controls them.

mod event;
mod registry;

pub use event::{GameEvent, TriggerKind};
pub use registry::{ReactiveTrigger, TriggerEntry, TriggerRegistry};
