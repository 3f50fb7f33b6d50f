//! Error taxonomy.
//!
//! - [`StructuralError`]: an Atomic Operation was asked for something
//!   physically impossible (unknown id, full zone). A caller defect, fatal to
//!   the current request.
//! - [`IllegalAction`]: a rule violation detected before any mutation.
//!   Recoverable: the caller may submit a different action.
//! - [`ParseAmbiguity`]: card text the parser could not claim. Fatal to the
//!   request, surfaced for manual authoring.
//! - [`RefereeError::ChoiceTimeout`]: a mandatory checkpoint expired.
//!   Recoverable: the action was rolled back and may be resubmitted.
//!
//! The core never retries on its own.

use thiserror::Error;

use super::entity::InstanceId;
use super::player::PlayerId;
use crate::cards::{CardId, SpecialCondition};
use crate::effects::EffectOrigin;
use crate::zones::Location;

/// Result alias for referee operations.
pub type Result<T, E = RefereeError> = std::result::Result<T, E>;

/// Structural impossibility inside an Atomic Operation.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("unknown instance {0}")]
    UnknownInstance(InstanceId),

    #[error("unknown card {0}")]
    UnknownCard(CardId),

    #[error("card {0} is already registered")]
    DuplicateCard(CardId),

    #[error("{location} is full (capacity {capacity})")]
    LocationFull { location: Location, capacity: usize },

    #[error("{instance} is not in {expected}")]
    NotAt { instance: InstanceId, expected: Location },

    #[error("{0} is not in play")]
    NotInPlay(InstanceId),

    #[error("{card} is not attached to {host}")]
    NotAttached { card: InstanceId, host: InstanceId },

    #[error("{0} has no evolution to remove")]
    NoPriorLayer(InstanceId),

    #[error("{0} cannot hold cards")]
    InvalidDestination(Location),

    #[error("invalid deck for {player}: {reason}")]
    InvalidDeck { player: PlayerId, reason: String },

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

/// Why an action was rejected.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum IllegalReason {
    #[error("it is not {0}'s turn")]
    NotYourTurn(PlayerId),

    #[error("actions cannot be taken during {0}")]
    WrongPhase(crate::core::Phase),

    #[error("{0} is not in your hand")]
    NotInHand(InstanceId),

    #[error("{0} is not one of your Pokémon in play")]
    NotYourPokemon(InstanceId),

    #[error("{card} is not a {expected}")]
    WrongCardKind { card: InstanceId, expected: &'static str },

    #[error("your Bench is full")]
    BenchFull,

    #[error("{evolution} does not evolve from {target}")]
    EvolutionMismatch { evolution: String, target: String },

    #[error("{0} cannot evolve yet")]
    EvolutionTooEarly(InstanceId),

    #[error("you already attached an Energy this turn")]
    EnergyAlreadyAttached,

    #[error("you already played a Supporter this turn")]
    SupporterAlreadyPlayed,

    #[error("you already played a Stadium this turn")]
    StadiumAlreadyPlayed,

    #[error("{0} is already in play")]
    SameStadiumInPlay(String),

    #[error("{0} already has a Pokémon Tool attached")]
    ToolAlreadyAttached(InstanceId),

    #[error("the first player cannot {0} on their first turn")]
    FirstTurnRestriction(&'static str),

    #[error("no ability at index {0}")]
    NoSuchAbility(usize),

    #[error("{0} has already been used")]
    AbilityLimit(String),

    #[error("{ability} requires {requirement}")]
    AbilityCondition { ability: String, requirement: &'static str },

    #[error("{0} activates on its own and cannot be used")]
    PassiveAbility(String),

    #[error("no attack at index {0}")]
    NoSuchAttack(usize),

    #[error("not enough Energy attached to use {0}")]
    CostNotMet(String),

    #[error("your Active Pokémon is {0}")]
    StatusPrevents(SpecialCondition),

    #[error("{0} cannot be used this turn")]
    AttackDisabled(String),

    #[error("you already retreated this turn")]
    AlreadyRetreated,

    #[error("retreating needs {required} Energy, {offered} offered")]
    RetreatCostNotMet { required: usize, offered: usize },

    #[error("{0} is not on your Bench")]
    NotOnBench(InstanceId),

    #[error("you have no Active Pokémon")]
    NoActivePokemon,

    #[error("this card needs a target")]
    MissingTarget,
}

impl IllegalReason {
    /// Topic used to look up a ruling citation.
    #[must_use]
    pub fn topic(&self) -> &'static str {
        match self {
            IllegalReason::NotYourTurn(_) | IllegalReason::WrongPhase(_) => "turn",
            IllegalReason::NotInHand(_) | IllegalReason::WrongCardKind { .. } => "hand",
            IllegalReason::NotYourPokemon(_) | IllegalReason::MissingTarget => "in play",
            IllegalReason::BenchFull | IllegalReason::NotOnBench(_) => "bench",
            IllegalReason::EvolutionMismatch { .. } | IllegalReason::EvolutionTooEarly(_) => "evolve",
            IllegalReason::EnergyAlreadyAttached => "attach",
            IllegalReason::SupporterAlreadyPlayed => "supporter",
            IllegalReason::StadiumAlreadyPlayed | IllegalReason::SameStadiumInPlay(_) => "stadium",
            IllegalReason::ToolAlreadyAttached(_) => "tool",
            IllegalReason::FirstTurnRestriction(_) => "first turn",
            IllegalReason::NoSuchAbility(_)
            | IllegalReason::AbilityLimit(_)
            | IllegalReason::AbilityCondition { .. }
            | IllegalReason::PassiveAbility(_) => "ability",
            IllegalReason::NoSuchAttack(_)
            | IllegalReason::CostNotMet(_)
            | IllegalReason::AttackDisabled(_)
            | IllegalReason::NoActivePokemon => "attack",
            IllegalReason::StatusPrevents(condition) => condition.name(),
            IllegalReason::AlreadyRetreated | IllegalReason::RetreatCostNotMet { .. } => "retreat",
        }
    }
}

/// A rejected action, optionally annotated with a rulebook citation.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("illegal action: {reason}")]
pub struct IllegalAction {
    pub reason: IllegalReason,
    pub ruling: Option<String>,
}

impl IllegalAction {
    #[must_use]
    pub fn new(reason: IllegalReason) -> Self {
        Self { reason, ruling: None }
    }
}

impl From<IllegalReason> for IllegalAction {
    fn from(reason: IllegalReason) -> Self {
        Self::new(reason)
    }
}

/// Card text no recognizer could claim.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("no recognizer matched {origin} text at: {residual:?}")]
pub struct ParseAmbiguity {
    pub origin: EffectOrigin,
    /// Full normalized text.
    pub text: String,
    /// Unclaimed remainder, starting at the first unrecognized clause.
    pub residual: String,
}

/// Any failure of a submitted request.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RefereeError {
    #[error(transparent)]
    Structural(#[from] StructuralError),

    #[error(transparent)]
    Illegal(#[from] IllegalAction),

    #[error(transparent)]
    Parse(#[from] ParseAmbiguity),

    #[error("{player} did not answer \"{prompt}\" in time")]
    ChoiceTimeout { player: PlayerId, prompt: String },

    #[error("{player} cancelled \"{prompt}\"")]
    ChoiceCancelled { player: PlayerId, prompt: String },

    #[error("invalid choice from {player}: {reason}")]
    InvalidChoice { player: PlayerId, reason: String },

    #[error("the game is over")]
    GameOver,
}

impl From<IllegalReason> for RefereeError {
    fn from(reason: IllegalReason) -> Self {
        RefereeError::Illegal(IllegalAction::new(reason))
    }
}

impl RefereeError {
    /// Whether the caller may resubmit after this error.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RefereeError::Illegal(_) | RefereeError::ChoiceTimeout { .. })
    }

    /// Whether this error ends the current request for good.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, RefereeError::Structural(_) | RefereeError::Parse(_))
    }

    /// The rejection reason, if this is a rule violation.
    #[must_use]
    pub fn illegal_reason(&self) -> Option<&IllegalReason> {
        match self {
            RefereeError::Illegal(action) => Some(&action.reason),
            _ => None,
        }
    }
}

/// Config file failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    Write(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Snapshot encoding failures.
#[derive(Debug, Error)]
#[error("snapshot codec error: {0}")]
pub struct SnapshotError(#[from] pub bincode::Error);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverability() {
        let illegal: RefereeError = IllegalReason::BenchFull.into();
        assert!(illegal.is_recoverable());

        let timeout = RefereeError::ChoiceTimeout {
            player: PlayerId::FIRST,
            prompt: "choose".into(),
        };
        assert!(timeout.is_recoverable());

        let structural: RefereeError = StructuralError::UnknownInstance(InstanceId(1)).into();
        assert!(!structural.is_recoverable());
        assert!(structural.is_fatal());
        assert!(!RefereeError::GameOver.is_recoverable());
    }

    #[test]
    fn test_illegal_message() {
        let err: RefereeError = IllegalReason::SupporterAlreadyPlayed.into();
        assert_eq!(err.to_string(), "illegal action: you already played a Supporter this turn");
        assert_eq!(err.illegal_reason(), Some(&IllegalReason::SupporterAlreadyPlayed));
    }

    #[test]
    fn test_structural_messages() {
        assert_eq!(StructuralError::NotInPlay(InstanceId(3)).to_string(), "Instance(3) is not in play");
        assert_eq!(
            StructuralError::DuplicateCard(CardId(12)).to_string(),
            "card Card(12) is already registered"
        );
    }

    #[test]
    fn test_topics() {
        assert_eq!(IllegalReason::AlreadyRetreated.topic(), "retreat");
        assert_eq!(IllegalReason::StatusPrevents(SpecialCondition::Asleep).topic(), "asleep");
    }
}
