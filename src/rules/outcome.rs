//! Win/loss evaluation.
//!
//! A player wins when they have taken all their Prizes, when their opponent
//! has no Pokémon in play, or when their opponent could not draw at the
//! start of their own turn. Conditions are checked together, after
//! knockout processing:
//!
//! | First player wins? | Second player wins? | Outcome            |
//! |--------------------|---------------------|--------------------|
//! | no                 | no                  | game continues     |
//! | yes                | no                  | first player wins  |
//! | no                 | yes                 | second player wins |
//! | yes                | yes                 | tie                |

use serde::{Deserialize, Serialize};

use crate::core::{GameState, PlayerId, PlayerMap};

/// Result of a finished match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameOutcome {
    Win(PlayerId),
    Tie,
}

impl GameOutcome {
    #[must_use]
    pub fn winner(self) -> Option<PlayerId> {
        match self {
            GameOutcome::Win(player) => Some(player),
            GameOutcome::Tie => None,
        }
    }
}

impl std::fmt::Display for GameOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameOutcome::Win(player) => write!(f, "{player} wins"),
            GameOutcome::Tie => f.write_str("tie"),
        }
    }
}

/// What the win check sees of one player.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Standing {
    pub prizes_left: usize,
    pub pokemon_in_play: bool,
    pub decked_out: bool,
}

impl Standing {
    /// Read a player's standing from the state.
    #[must_use]
    pub fn of(state: &GameState, player: PlayerId) -> Self {
        Self {
            prizes_left: state.prizes_remaining(player),
            pokemon_in_play: !state.in_play(player).is_empty(),
            decked_out: state.players[player].decked_out,
        }
    }

    /// Whether this standing has lost on its own.
    fn lost(self) -> bool {
        !self.pokemon_in_play || self.decked_out
    }
}

/// Apply the win table to both standings.
///
/// ```
/// use ptcg_referee::core::{PlayerId, PlayerMap};
/// use ptcg_referee::rules::{decide, GameOutcome, Standing};
///
/// let alive = Standing { prizes_left: 3, pokemon_in_play: true, decked_out: false };
/// let done = Standing { prizes_left: 0, ..alive };
/// assert_eq!(decide(&PlayerMap::pair(alive, alive)), None);
/// assert_eq!(decide(&PlayerMap::pair(done, alive)), Some(GameOutcome::Win(PlayerId::FIRST)));
/// assert_eq!(decide(&PlayerMap::pair(done, done)), Some(GameOutcome::Tie));
/// ```
#[must_use]
pub fn decide(standings: &PlayerMap<Standing>) -> Option<GameOutcome> {
    let wins = |player: PlayerId| standings[player].prizes_left == 0 || standings[player.opponent()].lost();
    match (wins(PlayerId::FIRST), wins(PlayerId::SECOND)) {
        (false, false) => None,
        (true, false) => Some(GameOutcome::Win(PlayerId::FIRST)),
        (false, true) => Some(GameOutcome::Win(PlayerId::SECOND)),
        (true, true) => Some(GameOutcome::Tie),
    }
}

/// Evaluate the win table against the state.
#[must_use]
pub fn evaluate(state: &GameState) -> Option<GameOutcome> {
    decide(&PlayerMap::new(|player| Standing::of(state, player)))
}
