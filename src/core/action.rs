//! Structured action requests.
//!
//! An upstream intent source (human UI, agent policy) produces one
//! `ActionRequest` per submission. The referee checks it for legality before
//! touching state, then executes it to completion.

use serde::{Deserialize, Serialize};

use super::entity::InstanceId;

/// A main-step action submitted by the player whose turn it is.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionRequest {
    /// Put a Basic Pokémon from hand onto the Bench (or the empty Active Spot).
    PlayBasic { card: InstanceId },

    /// Evolve a Pokémon in play with an evolution card from hand.
    ///
    /// With `skip_stage1` a Basic Pokémon evolves straight into a Stage 2
    /// card, as Rare Candy allows.
    Evolve {
        card: InstanceId,
        target: InstanceId,
        #[serde(default)]
        skip_stage1: bool,
    },

    /// Attach an Energy card from hand (once per turn).
    AttachEnergy { card: InstanceId, target: InstanceId },

    /// Play a Trainer card. Pokémon Tools need a `target`.
    PlayTrainer { card: InstanceId, target: Option<InstanceId> },

    /// Use an activated Ability of a Pokémon in play.
    UseAbility { pokemon: InstanceId, ability: usize },

    /// Retreat the Active Pokémon, discarding `energy` to pay the cost.
    Retreat { bench: InstanceId, energy: Vec<InstanceId> },

    /// Use an attack of the Active Pokémon. Ends the turn.
    Attack { attack: usize },

    /// End the turn without attacking.
    EndTurn,
}

impl ActionRequest {
    /// Stable name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ActionRequest::PlayBasic { .. } => "play_basic",
            ActionRequest::Evolve { .. } => "evolve",
            ActionRequest::AttachEnergy { .. } => "attach_energy",
            ActionRequest::PlayTrainer { .. } => "play_trainer",
            ActionRequest::UseAbility { .. } => "use_ability",
            ActionRequest::Retreat { .. } => "retreat",
            ActionRequest::Attack { .. } => "attack",
            ActionRequest::EndTurn => "end_turn",
        }
    }

    /// Whether this action ends the turn.
    #[must_use]
    pub fn ends_turn(&self) -> bool {
        matches!(self, ActionRequest::Attack { .. } | ActionRequest::EndTurn)
    }
}

/// What a completed submission did.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    /// Log entries committed by this submission.
    pub log_entries: usize,
    /// Damage dealt to the Defending Pokémon, for attacks.
    pub damage_dealt: Option<u32>,
    /// Pokémon knocked out while processing the action.
    pub knocked_out: Vec<InstanceId>,
    /// Whether the turn passed to the other player.
    pub turn_ended: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(ActionRequest::EndTurn.kind(), "end_turn");
        assert_eq!(ActionRequest::Attack { attack: 0 }.kind(), "attack");
    }

    #[test]
    fn test_ends_turn() {
        assert!(ActionRequest::Attack { attack: 1 }.ends_turn());
        assert!(!ActionRequest::PlayBasic { card: InstanceId(3) }.ends_turn());
    }

    #[test]
    fn test_request_serde() {
        let request = ActionRequest::Retreat {
            bench: InstanceId(4),
            energy: vec![InstanceId(9), InstanceId(10)],
        };
        let json = serde_json::to_string(&request).unwrap();
        let back: ActionRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(request, back);
    }

    #[test]
    fn test_evolve_defaults_to_one_stage() {
        let request: ActionRequest = serde_json::from_str(r#"{"Evolve":{"card":7,"target":2}}"#).unwrap();
        assert_eq!(
            request,
            ActionRequest::Evolve {
                card: InstanceId(7),
                target: InstanceId(2),
                skip_stage1: false,
            }
        );
    }
}
