//! # ptcg-referee
//!
//! A rules engine and referee for the Pokémon Trading Card Game.
//!
//! ## Design Principles
//!
//! 1. **Cards Are Data**: card text is parsed into `EffectDescriptor` trees
//!    and run by one generic interpreter. A new card needs no new code as
//!    long as its text uses the known phrasings.
//!
//! 2. **Check, Then Mutate**: every action is checked against a read-only
//!    view before anything changes. A rejected action has no side effects.
//!
//! 3. **Everything Is Logged**: all mutation goes through `AtomicOps`, which
//!    appends a log entry per sub-step and records every random seed before
//!    using it, so matches can be replayed exactly.
//!
//! ## Architecture
//!
//! - **Snapshot Rollback**: state uses `im` persistent structures, so a
//!   snapshot is an O(1) clone. An action that fails or times out part way
//!   through restores its snapshot.
//!
//! - **Choice Checkpoints**: the engine never decides for a player. Real
//!   choices are handed to a `Chooser` with the legal candidates and bounds.
//!
//! ## Modules
//!
//! - `core`: instances, players, state, actions, randomness, config, errors, log
//! - `zones`: zone containers
//! - `cards`: card definitions, instances and the catalog
//! - `ops`: Atomic Operation Layer
//! - `effects`: card text parser, choice contract and interpreter
//! - `triggers`: reactive abilities
//! - `rules`: legality, damage, checkup, knockouts and the `Referee`

pub mod core;
pub mod zones;
pub mod cards;
pub mod ops;
pub mod effects;
pub mod triggers;
pub mod rules;

// Re-export commonly used types
pub use crate::core::{
    InstanceId, PlayerId, PlayerMap,
    ActionRequest, ActionOutcome, Phase, RefereeConfig,
    GameState, GameLogEntry, Actor, Payload,
    AuditSink, MemoryAuditSink, NullAuditSink, TracingAuditSink,
    EntropySource, DeterministicEntropy, OsEntropy, ReplayEntropy, Seed,
    RefereeError, StructuralError, IllegalAction, IllegalReason, ParseAmbiguity, Result,
};

pub use crate::zones::{Location, Zone, ZonePosition};

pub use crate::cards::{
    CardId, CardDefinition, CardInstance, CardCatalog, CardRegistry,
    EnergyType, SpecialCondition, TrainerKind, Stage,
};

pub use crate::ops::AtomicOps;

pub use crate::effects::{
    EffectParser, EffectDescriptor, EffectNode, CardEffects,
    Interpreter, EffectContext, EffectReport,
    Chooser, ChoiceRequest, ChoiceResponse, ChoiceKind,
    AutoChooser, ScriptedChooser, ChannelChooser, SeatedChoosers, FallbackStrategy,
};

pub use crate::triggers::{GameEvent, TriggerKind, TriggerRegistry, ReactiveTrigger};

pub use crate::rules::{Referee, GameOutcome, RuleBook, RulingLookup};
