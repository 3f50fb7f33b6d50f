//! Effect Descriptor Parser.
//!
//! Turns card text into an [`EffectDescriptor`], or reports the text it
//! could not claim as a [`ParseAmbiguity`]. The parser never guesses.
//!
//! ## Pipeline
//!
//! 1. [`normalize`] the text (lowercase, straight quotes, single spaces).
//! 2. Repeatedly skip clause separators and offer the remainder to the
//!    [`RECOGNIZERS`](super::recognizers::RECOGNIZERS) in order. The first
//!    recognizer to claim a prefix wins; if none does, parsing stops with
//!    the unclaimed residual.
//! 3. Fold the claimed pieces into nodes. Markers ("you may", "if heads,",
//!    "before doing damage,") modify the next action; "if you do," makes
//!    it a consequent of the node before it.
//!
//! ## Example
//!
//! ```
//! use ptcg_referee::effects::{Action, EffectOrigin, EffectParser};
//!
//! let parser = EffectParser::new();
//! let heal = parser
//!     .parse("Heal all damage from this Pokémon. If you do, discard all Energy from this Pokémon.", EffectOrigin::Attack)
//!     .unwrap();
//! assert_eq!(heal.nodes.len(), 1);
//! assert_eq!(heal.nodes[0].consequent.len(), 1);
//! assert!(matches!(heal.nodes[0].consequent[0].action, Action::DiscardAttachedEnergy { .. }));
//!
//! let err = parser.parse("Turn your opponent's deck upside down.", EffectOrigin::Trainer).unwrap_err();
//! assert_eq!(err.residual, "turn your opponent's deck upside down.");
//! ```

use serde::{Deserialize, Serialize};

use super::descriptor::{Action, BonusBasis, EffectDescriptor, EffectNode, EffectOrigin, Gate, Timing};
use super::recognizers::{Piece, RECOGNIZERS};
use crate::cards::{CardCategory, CardDefinition, TrainerKind};
use crate::core::ParseAmbiguity;

/// Normalize card text for matching.
///
/// ```
/// use ptcg_referee::effects::normalize;
///
/// assert_eq!(normalize("Your  Opponent’s Active\nPokemon"), "your opponent's active pokémon");
/// ```
#[must_use]
pub fn normalize(text: &str) -> String {
    let text = text
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201c}', '\u{201d}'], "\"")
        .to_lowercase();
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace("pokemon", "pokémon")
}

/// Parsed effects of one card definition.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardEffects {
    /// One descriptor per attack, by index. Attacks without text are empty.
    pub attacks: Vec<EffectDescriptor>,
    /// One descriptor per ability, by index.
    pub abilities: Vec<EffectDescriptor>,
    /// Trainer, Tool, Stadium or Special Energy text.
    pub text: Option<EffectDescriptor>,
}

/// Card text parser.
#[derive(Clone, Copy, Debug, Default)]
pub struct EffectParser;

impl EffectParser {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Parse one effect text in the context of its origin.
    ///
    /// Empty text yields an empty descriptor.
    pub fn parse(&self, text: &str, origin: EffectOrigin) -> Result<EffectDescriptor, ParseAmbiguity> {
        let normalized = normalize(text);
        let mut builder = Builder::new(origin, &normalized);
        let mut pos = 0;

        loop {
            pos += skip_separators(&normalized[pos..]);
            if pos >= normalized.len() {
                break;
            }
            let rest = &normalized[pos..];
            let Some((name, piece, used)) = RECOGNIZERS
                .iter()
                .find_map(|r| r.recognize(rest).map(|(piece, used)| (r.name, piece, used)))
            else {
                return Err(builder.ambiguity(pos));
            };
            tracing::trace!(recognizer = name, clause = &rest[..used], "claimed");
            builder.push(piece, pos, pos + used)?;
            pos += used;
        }

        builder.finish()
    }

    /// Parse every text on a card definition.
    pub fn parse_card(&self, card: &CardDefinition) -> Result<CardEffects, ParseAmbiguity> {
        let attacks = card
            .attacks
            .iter()
            .map(|attack| self.parse(&attack.text, EffectOrigin::Attack))
            .collect::<Result<Vec<_>, _>>()?;
        let abilities = card
            .abilities
            .iter()
            .map(|ability| self.parse(&ability.text, EffectOrigin::Ability))
            .collect::<Result<Vec<_>, _>>()?;

        let origin = match card.category {
            CardCategory::Trainer(TrainerKind::Tool) => Some(EffectOrigin::Tool),
            CardCategory::Trainer(TrainerKind::Stadium) => Some(EffectOrigin::Stadium),
            CardCategory::Trainer(_) => Some(EffectOrigin::Trainer),
            CardCategory::Energy { basic: false } => Some(EffectOrigin::SpecialEnergy),
            _ => None,
        };
        let text = match origin {
            Some(origin) if !card.text.trim().is_empty() => Some(self.parse(&card.text, origin)?),
            _ => None,
        };

        Ok(CardEffects { attacks, abilities, text })
    }
}

fn skip_separators(text: &str) -> usize {
    text.len() - text.trim_start_matches(|c: char| c.is_whitespace() || matches!(c, '.' | ',' | ';')).len()
}

/// Folds claimed pieces into a descriptor.
struct Builder<'t> {
    text: &'t str,
    descriptor: EffectDescriptor,
    before_damage: bool,
    optional: bool,
    gate: Option<Gate>,
    if_you_do: bool,
    /// Start of the first pending marker, if any.
    clause_start: Option<usize>,
}

impl<'t> Builder<'t> {
    fn new(origin: EffectOrigin, text: &'t str) -> Self {
        let mut descriptor = EffectDescriptor::new(origin);
        descriptor.text = text.to_string();
        Self {
            text,
            descriptor,
            before_damage: false,
            optional: false,
            gate: None,
            if_you_do: false,
            clause_start: None,
        }
    }

    fn ambiguity(&self, at: usize) -> ParseAmbiguity {
        ParseAmbiguity {
            origin: self.descriptor.origin,
            text: self.text.to_string(),
            residual: self.text[at..].to_string(),
        }
    }

    fn has_pending(&self) -> bool {
        self.before_damage || self.optional || self.gate.is_some() || self.if_you_do
    }

    fn mark(&mut self, start: usize) {
        self.clause_start.get_or_insert(start);
    }

    fn push(&mut self, piece: Piece, start: usize, end: usize) -> Result<(), ParseAmbiguity> {
        match piece {
            Piece::Skip => {}
            Piece::BeforeDamage => {
                self.mark(start);
                self.before_damage = true;
            }
            Piece::IfYouDo => {
                if self.descriptor.nodes.is_empty() {
                    return Err(self.ambiguity(start));
                }
                self.mark(start);
                self.if_you_do = true;
            }
            Piece::YouMay => {
                self.mark(start);
                self.optional = true;
            }
            Piece::Gate(gate) => {
                if self.gate.is_some() {
                    return Err(self.ambiguity(start));
                }
                self.mark(start);
                self.gate = Some(gate);
            }
            Piece::Limit(limit) => self.descriptor.limit = limit,
            Piece::Trigger(kind) => self.descriptor.trigger = Some(kind),
            Piece::Action(action) => self.add_actions(vec![action], start, end),
            Piece::Actions(actions) => self.add_actions(actions, start, end),
        }
        Ok(())
    }

    fn add_actions(&mut self, actions: Vec<Action>, start: usize, end: usize) {
        let clause_start = self.clause_start.take().unwrap_or(start);
        let clause = self.text[clause_start..end].trim();

        for action in actions {
            let mut node = EffectNode::new(action).with_text(clause);
            if self.before_damage
                || (self.descriptor.origin == EffectOrigin::Attack && node.action.feeds_damage())
            {
                node = node.with_timing(Timing::BeforeDamage);
            }
            if let Some(gate) = self.gate {
                node = node.with_gate(gate);
            }
            if self.optional {
                node = node.optional();
            }
            match self.descriptor.nodes.last_mut() {
                Some(parent) if self.if_you_do => parent.consequent.push(node),
                _ => self.descriptor.nodes.push(node),
            }
        }

        self.before_damage = false;
        self.optional = false;
        self.gate = None;
        self.if_you_do = false;
    }

    fn finish(mut self) -> Result<EffectDescriptor, ParseAmbiguity> {
        if self.has_pending() {
            let at = self.clause_start.unwrap_or(self.text.len());
            return Err(self.ambiguity(at));
        }

        // The discard a "for each card discarded in this way" bonus counts
        // must happen before damage is calculated.
        let nodes = &mut self.descriptor.nodes;
        for i in 0..nodes.len() {
            let counts_discards = matches!(
                nodes[i].action,
                Action::DamageBonus {
                    basis: BonusBasis::DiscardedInThisWay,
                    ..
                }
            );
            if !counts_discards {
                continue;
            }
            if let Some(discard) = nodes[..i].iter_mut().rev().find(|n| {
                matches!(
                    n.action,
                    Action::DiscardAttachedEnergy { .. } | Action::DiscardFromHand { .. }
                )
            }) {
                discard.timing = Timing::BeforeDamage;
            }
        }

        for node in &mut self.descriptor.nodes {
            promote_before_damage(node);
            node.settle_timeout_policy();
        }
        Ok(self.descriptor)
    }
}

/// A node whose consequent runs before damage must run before damage too.
fn promote_before_damage(node: &mut EffectNode) -> bool {
    let mut early = false;
    for consequent in &mut node.consequent {
        early |= promote_before_damage(consequent);
    }
    if early {
        node.timing = Timing::BeforeDamage;
    }
    node.timing == Timing::BeforeDamage
}
