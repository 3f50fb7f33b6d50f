//! Choice checkpoints.
//!
//! The interpreter and the Referee never decide on a player's behalf. When
//! a real choice exists they build a [`ChoiceRequest`] with the legal
//! candidates and bounds and hand it to a [`Chooser`]. How the answer is
//! produced (UI, agent, script) is the chooser's business.
//!
//! Provided choosers:
//!
//! - [`ChannelChooser`]: forwards requests over a crossbeam channel and
//!   waits for the reply, bounded by the request's timeout
//! - [`ScriptedChooser`]: replays queued responses, for tests and replays
//! - [`AutoChooser`]: answers with a fixed [`FallbackStrategy`]
//! - [`SeatedChoosers`]: one chooser per player, routed by `request.player`

use std::collections::VecDeque;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};

use crate::core::{InstanceId, PlayerId, PlayerMap};

/// What a choice is about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChoiceKind {
    /// Pick cards or Pokémon for an effect.
    Targets,
    /// Yes (select the single candidate) or no (select nothing).
    Confirm,
    /// Put every candidate in resolution order.
    Order,
    /// Promote a Benched Pokémon to the empty Active Spot.
    Replacement,
    /// Pick a Prize card to take.
    Prize,
    /// Opening placement of Active and Benched Pokémon.
    Setup,
}

/// A suspended decision.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceRequest {
    /// Who must answer.
    pub player: PlayerId,
    pub kind: ChoiceKind,
    /// Human-readable context, usually the clause being resolved.
    pub prompt: String,
    pub candidates: Vec<InstanceId>,
    pub min: usize,
    pub max: usize,
    pub timeout: Duration,
}

impl ChoiceRequest {
    /// A request for exactly one of `candidates`.
    #[must_use]
    pub fn new(player: PlayerId, kind: ChoiceKind, prompt: impl Into<String>, candidates: Vec<InstanceId>) -> Self {
        Self {
            player,
            kind,
            prompt: prompt.into(),
            candidates,
            min: 1,
            max: 1,
            timeout: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub fn with_bounds(mut self, min: usize, max: usize) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check a selection against the candidates and bounds.
    pub fn check(&self, selected: &[InstanceId]) -> Result<(), String> {
        if selected.len() < self.min || selected.len() > self.max {
            return Err(format!(
                "selected {} of {} candidates, expected {}..={}",
                selected.len(),
                self.candidates.len(),
                self.min,
                self.max
            ));
        }
        for (i, id) in selected.iter().enumerate() {
            if !self.candidates.contains(id) {
                return Err(format!("{id} is not a candidate"));
            }
            if selected[..i].contains(id) {
                return Err(format!("{id} selected twice"));
            }
        }
        Ok(())
    }
}

/// The answer to a [`ChoiceRequest`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChoiceResponse {
    Selected(Vec<InstanceId>),
    TimedOut,
    Cancelled,
}

/// Source of player decisions.
pub trait Chooser {
    /// Block until the player answers, the timeout passes, or the request
    /// is cancelled.
    fn request_choice(&mut self, request: &ChoiceRequest) -> ChoiceResponse;
}

/// Fixed answer policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FallbackStrategy {
    /// Select the first `min` candidates.
    #[default]
    Minimum,
    /// Select the first `max` candidates.
    Maximum,
    /// Select the first candidate, within bounds.
    FirstOption,
    /// Let every request time out.
    TimeOut,
}

impl FallbackStrategy {
    /// Answer `request` under this policy.
    #[must_use]
    pub fn respond(self, request: &ChoiceRequest) -> ChoiceResponse {
        let count = match self {
            FallbackStrategy::Minimum => request.min,
            FallbackStrategy::Maximum => request.max,
            FallbackStrategy::FirstOption => request.min.max(request.max.min(1)),
            FallbackStrategy::TimeOut => return ChoiceResponse::TimedOut,
        };
        ChoiceResponse::Selected(request.candidates.iter().copied().take(count).collect())
    }
}

/// Answers every request with one strategy.
#[derive(Clone, Copy, Debug, Default)]
pub struct AutoChooser(pub FallbackStrategy);

impl Chooser for AutoChooser {
    fn request_choice(&mut self, request: &ChoiceRequest) -> ChoiceResponse {
        self.0.respond(request)
    }
}

/// Replays queued responses, then falls back to a strategy.
///
/// Every request it receives is recorded for inspection.
#[derive(Clone, Debug, Default)]
pub struct ScriptedChooser {
    script: VecDeque<ChoiceResponse>,
    fallback: FallbackStrategy,
    requests: Vec<ChoiceRequest>,
}

impl ScriptedChooser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: FallbackStrategy) -> Self {
        self.fallback = fallback;
        self
    }

    /// Queue a response (builder pattern).
    #[must_use]
    pub fn then(mut self, response: ChoiceResponse) -> Self {
        self.script.push_back(response);
        self
    }

    /// Queue a selection (builder pattern).
    #[must_use]
    pub fn then_select(self, ids: impl IntoIterator<Item = InstanceId>) -> Self {
        self.then(ChoiceResponse::Selected(ids.into_iter().collect()))
    }

    pub fn push(&mut self, response: ChoiceResponse) {
        self.script.push_back(response);
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> &[ChoiceRequest] {
        &self.requests
    }

    /// Responses not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl Chooser for ScriptedChooser {
    fn request_choice(&mut self, request: &ChoiceRequest) -> ChoiceResponse {
        self.requests.push(request.clone());
        self.script
            .pop_front()
            .unwrap_or_else(|| self.fallback.respond(request))
    }
}

/// Routes each request to the chooser of the player who must answer.
pub struct SeatedChoosers {
    seats: PlayerMap<Box<dyn Chooser + Send>>,
}

impl SeatedChoosers {
    #[must_use]
    pub fn new(first: Box<dyn Chooser + Send>, second: Box<dyn Chooser + Send>) -> Self {
        Self {
            seats: PlayerMap::pair(first, second),
        }
    }
}

impl Chooser for SeatedChoosers {
    fn request_choice(&mut self, request: &ChoiceRequest) -> ChoiceResponse {
        self.seats.get_mut(request.player).request_choice(request)
    }
}

/// Chooser that forwards requests to another thread.
pub struct ChannelChooser {
    requests: Sender<ChoiceRequest>,
    responses: Receiver<ChoiceResponse>,
}

/// The answering side of a [`ChannelChooser`].
pub struct ChoiceEndpoint {
    requests: Receiver<ChoiceRequest>,
    responses: Sender<ChoiceResponse>,
}

impl ChannelChooser {
    /// Create a connected chooser and endpoint.
    #[must_use]
    pub fn pair() -> (ChannelChooser, ChoiceEndpoint) {
        let (request_tx, request_rx) = unbounded();
        let (response_tx, response_rx) = unbounded();
        (
            ChannelChooser {
                requests: request_tx,
                responses: response_rx,
            },
            ChoiceEndpoint {
                requests: request_rx,
                responses: response_tx,
            },
        )
    }
}

impl Chooser for ChannelChooser {
    fn request_choice(&mut self, request: &ChoiceRequest) -> ChoiceResponse {
        if self.requests.send(request.clone()).is_err() {
            return ChoiceResponse::Cancelled;
        }
        match self.responses.recv_timeout(request.timeout) {
            Ok(response) => response,
            Err(RecvTimeoutError::Timeout) => {
                tracing::debug!(player = %request.player, prompt = %request.prompt, "choice timed out");
                ChoiceResponse::TimedOut
            }
            Err(RecvTimeoutError::Disconnected) => ChoiceResponse::Cancelled,
        }
    }
}

impl ChoiceEndpoint {
    /// Wait for the next request. `None` once the chooser is dropped.
    #[must_use]
    pub fn recv(&self) -> Option<ChoiceRequest> {
        self.requests.recv().ok()
    }

    /// Wait for the next request, up to `timeout`.
    #[must_use]
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ChoiceRequest> {
        self.requests.recv_timeout(timeout).ok()
    }

    /// Answer the pending request. Returns `false` if the chooser is gone.
    pub fn respond(&self, response: ChoiceResponse) -> bool {
        self.responses.send(response).is_ok()
    }
}
