//! Core types: instances, players, state, actions, randomness, configuration,
//! errors and the game log.
//!
//! Together these form the Game State Store. Mutation of `GameState` goes
//! through [`crate::ops::AtomicOps`].

pub mod action;
pub mod config;
pub mod entity;
pub mod error;
pub mod log;
pub mod player;
pub mod rng;
pub mod state;

pub use action::{ActionOutcome, ActionRequest};
pub use config::{Phase, RefereeConfig};
pub use entity::InstanceId;
pub use error::{
    ConfigError, IllegalAction, IllegalReason, ParseAmbiguity, RefereeError, Result, SnapshotError,
    StructuralError,
};
pub use log::{Actor, AuditSink, GameLogEntry, MemoryAuditSink, NullAuditSink, Payload, TracingAuditSink};
pub use player::{PlayerId, PlayerMap};
pub use rng::{DeterministicEntropy, EntropySource, OsEntropy, ReplayEntropy, Seed, SeededRng};
pub use state::{GameState, PlayerBoard, UsageScope, ZoneSnapshot};
