//! Append-only game log and audit sinks.
//!
//! Every Atomic Operation appends one [`GameLogEntry`] per logical sub-unit
//! (one per card moved, one per coin flipped, ...) to the state's in-memory
//! log. Entries written during an action that is later rolled back vanish
//! with the snapshot; committed entries are forwarded to an [`AuditSink`].
//!
//! Sinks are for audit and replay only. Nothing read back from a sink ever
//! drives live state.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::player::PlayerId;
use super::rng::Seed;

/// Who caused a log entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Actor {
    /// The referee itself (phase changes, checkup, knockouts).
    Referee,
    /// A player, through a submitted action.
    Player(PlayerId),
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Actor::Referee => f.write_str("referee"),
            Actor::Player(p) => write!(f, "player-{}", p.0),
        }
    }
}

/// Key/value details of a log entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload(pub BTreeMap<String, String>);

impl Payload {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field (builder pattern).
    #[must_use]
    pub fn with(mut self, key: &str, value: impl std::fmt::Display) -> Self {
        self.0.insert(key.to_string(), value.to_string());
        self
    }

    /// Read a field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

/// One append-only log record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameLogEntry {
    /// Position in the match log, starting at 0.
    pub sequence: u64,
    pub match_id: String,
    pub actor: Actor,
    pub action: String,
    pub payload: Payload,
    /// Seed consumed by this entry, recorded before it was used.
    pub random_seed: Option<Seed>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

impl GameLogEntry {
    /// Current wall-clock time in milliseconds.
    #[must_use]
    pub fn now_millis() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Append-only destination for committed log entries.
///
/// Implementations may buffer or deliver late; the referee never reads back.
pub trait AuditSink: Send + Sync {
    fn append(&self, entry: &GameLogEntry);
}

/// Discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn append(&self, _entry: &GameLogEntry) {}
}

/// Keeps committed entries in memory, for replay and tests.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<GameLogEntry>>,
}

impl MemoryAuditSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every entry received so far.
    #[must_use]
    pub fn entries(&self) -> Vec<GameLogEntry> {
        self.entries.lock().clone()
    }

    /// Number of entries received.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Seeds in the order they were consumed.
    #[must_use]
    pub fn seed_trail(&self) -> Vec<Seed> {
        self.entries.lock().iter().filter_map(|e| e.random_seed).collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn append(&self, entry: &GameLogEntry) {
        self.entries.lock().push(entry.clone());
    }
}

/// Emits each entry as a `tracing` event on the `ptcg_referee::audit` target.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn append(&self, entry: &GameLogEntry) {
        tracing::info!(
            target: "ptcg_referee::audit",
            sequence = entry.sequence,
            match_id = %entry.match_id,
            actor = %entry.actor,
            action = %entry.action,
            payload = ?entry.payload.0,
            seed = ?entry.random_seed,
        );
    }
}
