//! Referee State Machine.
//!
//! The [`Referee`] sequences a match: legality checks before any mutation,
//! the attack damage pipeline, Pokémon Checkup, Knock Out processing and the
//! win check. The rules it applies live in their own modules so they can be
//! tested against plain states:
//!
//! - [`legality`]: is this action allowed right now
//! - [`damage`]: attack damage, step by step
//! - [`checkup`]: Special Conditions between turns
//! - [`knockout`]: simultaneous Knock Outs and Prizes
//! - [`outcome`]: the win/loss table
//! - [`rulebook`]: citations for rejected actions

pub mod checkup;
pub mod damage;
pub mod engine;
pub mod knockout;
pub mod legality;
pub mod outcome;
pub mod rulebook;

pub use checkup::CheckupReport;
pub use damage::{calculate, passive_modifier, DamageCalculation, DamageInput, DamageStep};
pub use engine::Referee;
pub use legality::{check, cost_met, RuleView};
pub use outcome::{decide, evaluate, GameOutcome, Standing};
pub use rulebook::{RuleBook, RulingLookup, Section};
