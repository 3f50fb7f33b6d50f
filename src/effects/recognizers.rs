//! Phrase recognizers.
//!
//! One recognizer per canonical phrasing class. Each is an anchored regex
//! over normalized (lowercased, whitespace-collapsed) text plus a builder
//! that turns the captures into a [`Piece`]. A recognizer either claims a
//! prefix of the remaining text or declines.
//!
//! ## Ordering
//!
//! [`RECOGNIZERS`] is tried top to bottom and the first claim wins, so the
//! list runs most-specific-first: clause markers ("before doing damage",
//! "if you do", "you may") before actions, `search ... and attach` before
//! plain `attach`, "discard ... from your hand" before "discard ... energy".

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::descriptor::{
    Action, BonusBasis, CardSource, Condition, CounterAmount, Destination, Gate, HealAmount, ModifierSide, Side,
    SwitchKind, UsageLimit,
};
use super::targeting::{parse_card_filter, parse_pokemon_phrase, parse_quantity, CardFilter, PokemonTarget, Quantity};
use crate::cards::SpecialCondition;
use crate::triggers::TriggerKind;

/// What a recognizer claims from the text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Piece {
    /// Claimed text with no effect of its own (reminder text, "then,").
    Skip,
    /// "Before doing damage," - the next action runs ahead of damage.
    BeforeDamage,
    /// "If you do," - the next action is a consequent of the previous one.
    IfYouDo,
    /// "You may" - the next action is optional.
    YouMay,
    Limit(UsageLimit),
    Trigger(TriggerKind),
    /// Gate on the next action.
    Gate(Gate),
    Action(Action),
    /// Several actions from one clause ("is now Asleep and Poisoned").
    Actions(Vec<Action>),
}

type Build = fn(&Captures<'_>) -> Option<Piece>;

/// One phrasing class.
pub struct Recognizer {
    pub name: &'static str,
    pattern: Regex,
    build: Build,
}

impl Recognizer {
    fn new(name: &'static str, pattern: &str, build: Build) -> Self {
        let pattern = Regex::new(&format!("^(?:{pattern})")).expect("Invalid regex");
        Self { name, pattern, build }
    }

    /// Claim a prefix of `text`, returning the piece and bytes consumed.
    #[must_use]
    pub fn recognize(&self, text: &str) -> Option<(Piece, usize)> {
        let caps = self.pattern.captures(text)?;
        let consumed = caps.get(0)?.end();
        if consumed == 0 {
            return None;
        }
        (self.build)(&caps).map(|piece| (piece, consumed))
    }
}

/// Reminder text accepted without effect.
const REMINDERS: &[&str] = &[
    "don't apply weakness and resistance for benched pokémon",
    "you can't use more than 1 gx attack in a game",
    "you can't use more than 1 vstar power in a game",
    "you can't have more than 1 ace spec card in your deck",
];

/// End of a clause: a full stop, the end of the text, or a joining "and".
const END: &str = r"(?:\s*\.|\s*$|\s+and\s+)";
const CONDITIONS: &str = "asleep|burned|confused|paralyzed|poisoned";

fn target(name: &str) -> String {
    format!(
        r"(?P<{name}>this pokémon|the pokémon this card is attached to|the defending pokémon|the attacking pokémon|that pokémon|it|them|(?:(?:up to \d+|\d+|each|all|any number) of )?(?:your opponent's|your) (?:evolved )?(?:active |benched )?pokémon)"
    )
}

fn number(caps: &Captures<'_>, name: &str) -> Option<u32> {
    match caps.name(name)?.as_str() {
        "a" | "an" => Some(1),
        n => n.parse().ok(),
    }
}

fn pokemon(caps: &Captures<'_>, name: &str) -> Option<PokemonTarget> {
    parse_pokemon_phrase(caps.name(name)?.as_str())
}

fn quantified(caps: &Captures<'_>, name: &str) -> Option<(Quantity, CardFilter)> {
    let (quantity, rest) = parse_quantity(caps.name(name)?.as_str())?;
    Some((quantity, parse_card_filter(rest)?))
}

fn condition(text: &str) -> Option<SpecialCondition> {
    SpecialCondition::from_name(text)
}

/// Every recognizer, most specific first.
pub static RECOGNIZERS: LazyLock<Vec<Recognizer>> = LazyLock::new(build_recognizers);

#[allow(clippy::too_many_lines)]
fn build_recognizers() -> Vec<Recognizer> {
    let this = target("target");
    let from = target("from");
    let to = target("to");

    vec![
        // === Markers ===
        Recognizer::new("reminder", r"\((?P<body>[^)]*)\)", |caps| {
            let body = caps.name("body")?.as_str().trim().trim_end_matches('.');
            REMINDERS.contains(&body).then_some(Piece::Skip)
        }),
        Recognizer::new("before_doing_damage", r"before doing damage,\s*", |_| Some(Piece::BeforeDamage)),
        Recognizer::new("if_you_do", r"if you do,\s*", |_| Some(Piece::IfYouDo)),
        Recognizer::new("then", r"then,?\s+", |_| Some(Piece::Skip)),
        Recognizer::new("you_may", r"you may\s+", |_| Some(Piece::YouMay)),
        Recognizer::new(
            "once_per_turn",
            r"once during your turn(?: \(before your attack\))?,?\s*",
            |_| Some(Piece::Limit(UsageLimit::OncePerTurn)),
        ),
        Recognizer::new("once_per_game", r"once during your game,?\s*", |_| {
            Some(Piece::Limit(UsageLimit::OncePerGame))
        }),
        Recognizer::new(
            "damaged_trigger",
            r"if this pokémon is damaged by an attack(?: from your opponent's pokémon)?(?: \(even if this pokémon is knocked out\))?,\s*",
            |_| Some(Piece::Trigger(TriggerKind::DamagedByAttack)),
        ),
        Recognizer::new(
            "knocked_out_trigger",
            r"if this pokémon is knocked out by damage from an attack(?: from your opponent's pokémon)?,\s*",
            |_| Some(Piece::Trigger(TriggerKind::KnockedOut)),
        ),
        Recognizer::new("checkup_trigger", r"during pokémon checkup,\s*", |_| {
            Some(Piece::Trigger(TriggerKind::BetweenTurns))
        }),
        // === Coins and gates ===
        Recognizer::new("flip_coins", &format!(r"flip (?P<n>a|\d+) coins?{END}"), |caps| {
            Some(Piece::Action(Action::FlipCoins { count: number(caps, "n")? }))
        }),
        Recognizer::new("if_heads", r"if heads,\s*", |_| Some(Piece::Gate(Gate::CoinHeads))),
        Recognizer::new("if_tails", r"if tails,\s*", |_| Some(Piece::Gate(Gate::CoinTails))),
        Recognizer::new("if_active", r"if this pokémon is in the active spot,\s*", |_| {
            Some(Piece::Gate(Gate::If(Condition::SourceInActiveSpot)))
        }),
        Recognizer::new("if_undamaged", r"if this pokémon has no damage counters on it,\s*", |_| {
            Some(Piece::Gate(Gate::If(Condition::SourceUndamaged)))
        }),
        Recognizer::new("if_damaged", r"if this pokémon has any damage counters on it,\s*", |_| {
            Some(Piece::Gate(Gate::If(Condition::SourceDamaged)))
        }),
        Recognizer::new(
            "if_opponent_condition",
            &format!(r"if your opponent's active pokémon is (?P<cond>{CONDITIONS}),\s*"),
            |caps| {
                let cond = condition(caps.name("cond")?.as_str())?;
                Some(Piece::Gate(Gate::If(Condition::OpponentActiveHas(cond))))
            },
        ),
        // === Damage ===
        Recognizer::new("attack_fails", &format!(r"(?:this|that) attack does nothing{END}"), |_| {
            Some(Piece::Action(Action::AttackFails))
        }),
        Recognizer::new(
            "damage_bonus_each",
            &format!(r"this attack does (?P<n>\d+) (?P<more>more )?damage for each (?P<basis>[^.]+?){END}"),
            |caps| {
                let basis = caps.name("basis")?.as_str();
                let basis = if basis.starts_with("heads") {
                    BonusBasis::Heads
                } else if basis.ends_with("discarded in this way") {
                    BonusBasis::DiscardedInThisWay
                } else if let Some(rest) = basis.strip_prefix("damage counter on ") {
                    BonusBasis::DamageCountersOn(parse_pokemon_phrase(rest)?)
                } else if let Some((_, rest)) = basis.split_once("energy attached to ") {
                    BonusBasis::EnergyAttached(parse_pokemon_phrase(rest)?)
                } else {
                    return None;
                };
                Some(Piece::Action(Action::DamageBonus {
                    amount: number(caps, "n")?,
                    basis,
                    replace: caps.name("more").is_none(),
                }))
            },
        ),
        Recognizer::new("damage_bonus_flat", &format!(r"this attack does (?P<n>\d+) more damage{END}"), |caps| {
            Some(Piece::Action(Action::DamageBonus {
                amount: number(caps, "n")?,
                basis: BonusBasis::Flat,
                replace: false,
            }))
        }),
        Recognizer::new(
            "damage_to_self",
            &format!(r"this pokémon (?:also )?does (?P<n>\d+) damage to itself{END}"),
            |caps| Some(Piece::Action(Action::DamageToSelf { amount: number(caps, "n")? })),
        ),
        Recognizer::new(
            "damage_to_targets",
            &format!(r"this attack (?:also )?does (?P<n>\d+) damage to {this}{END}"),
            |caps| {
                Some(Piece::Action(Action::DamageToTargets {
                    amount: number(caps, "n")?,
                    target: pokemon(caps, "target")?,
                }))
            },
        ),
        // === Damage counters ===
        Recognizer::new(
            "heal",
            &format!(r"heal (?:(?P<n>\d+)|(?P<all>all)) damage(?: from {this})?{END}"),
            |caps| {
                let amount = if caps.name("all").is_some() {
                    HealAmount::All
                } else {
                    HealAmount::Amount(number(caps, "n")?)
                };
                let target = match caps.name("target") {
                    Some(_) => pokemon(caps, "target")?,
                    None => PokemonTarget::this(),
                };
                Some(Piece::Action(Action::Heal { target, amount }))
            },
        ),
        Recognizer::new(
            "move_damage_counters",
            &format!(r"move (?:(?P<n>\d+)|(?P<all>all)) damage counters? from {from} to {to}{END}"),
            |caps| {
                let amount = if caps.name("all").is_some() {
                    CounterAmount::All
                } else {
                    CounterAmount::Exactly(number(caps, "n")?)
                };
                Some(Piece::Action(Action::MoveDamageCounters {
                    from: pokemon(caps, "from")?,
                    to: pokemon(caps, "to")?,
                    amount,
                }))
            },
        ),
        Recognizer::new(
            "put_damage_counters",
            &format!(r"put (?P<n>\d+) damage counters? on {this}{END}"),
            |caps| {
                Some(Piece::Action(Action::PutDamageCounters {
                    counters: number(caps, "n")?,
                    target: pokemon(caps, "target")?,
                }))
            },
        ),
        // === Energy and evolution ===
        Recognizer::new(
            "move_energy",
            &format!(r"move (?P<what>[^.]+?energy)(?: cards?)? from {from} to {to}{END}"),
            |caps| {
                let (quantity, filter) = quantified(caps, "what")?;
                Some(Piece::Action(Action::MoveEnergy {
                    filter,
                    quantity,
                    from: pokemon(caps, "from")?,
                    to: pokemon(caps, "to")?,
                }))
            },
        ),
        Recognizer::new(
            "devolve",
            &format!(r"devolve {this}(?: by (?:removing|putting) [^.]+)?{END}"),
            |caps| Some(Piece::Action(Action::Devolve { target: pokemon(caps, "target")? })),
        ),
        // === Search (before attach) ===
        Recognizer::new(
            "search",
            &format!(
                r"search your (?P<src>deck|discard pile) for (?P<what>[^,.]+?)(?:,? reveal (?:it|them),?)?(?:,? and| and) (?:(?P<hand>put (?:it|them) into your hand)|(?P<bench>put (?:it|them) onto your bench)|attach (?:it|them) to {this}){END}"
            ),
            |caps| {
                let (quantity, filter) = quantified(caps, "what")?;
                let source = match caps.name("src")?.as_str() {
                    "deck" => CardSource::Deck,
                    _ => CardSource::Discard,
                };
                let destination = if caps.name("hand").is_some() {
                    Destination::Hand
                } else if caps.name("bench").is_some() {
                    Destination::Bench
                } else {
                    Destination::Attach(pokemon(caps, "target")?)
                };
                Some(Piece::Action(Action::Search {
                    source,
                    filter,
                    quantity,
                    destination,
                }))
            },
        ),
        Recognizer::new(
            "recover_from_discard",
            &format!(r"put (?P<what>[^.]+?) from your discard pile into your hand{END}"),
            |caps| {
                let (quantity, filter) = quantified(caps, "what")?;
                Some(Piece::Action(Action::Search {
                    source: CardSource::Discard,
                    filter,
                    quantity,
                    destination: Destination::Hand,
                }))
            },
        ),
        // === Discard ===
        Recognizer::new("discard_hand", &format!(r"discard your hand{END}"), |_| {
            Some(Piece::Action(Action::DiscardHand))
        }),
        Recognizer::new(
            "discard_from_hand",
            &format!(r"discard (?P<what>[^.]+?) from your hand{END}"),
            |caps| {
                let (quantity, filter) = quantified(caps, "what")?;
                Some(Piece::Action(Action::DiscardFromHand { filter, quantity }))
            },
        ),
        Recognizer::new(
            "discard_stadium",
            &format!(r"discard (?:the |a |any )?stadium(?: card)? in play{END}"),
            |_| Some(Piece::Action(Action::DiscardStadium)),
        ),
        Recognizer::new(
            "discard_energy",
            &format!(r"discard (?P<what>[^.]+?energy)(?: cards?)?(?: (?:from|attached to) {this})?{END}"),
            |caps| {
                let (quantity, filter) = quantified(caps, "what")?;
                let target = match caps.name("target") {
                    Some(_) => pokemon(caps, "target")?,
                    None => PokemonTarget::this(),
                };
                Some(Piece::Action(Action::DiscardAttachedEnergy {
                    target,
                    filter,
                    quantity,
                }))
            },
        ),
        // === Attach ===
        Recognizer::new(
            "attach_energy",
            &format!(
                r"attach (?P<what>[^.]+?energy(?: cards?)?)(?: from your (?P<src>hand|discard pile))? to {this}{END}"
            ),
            |caps| {
                let (quantity, filter) = quantified(caps, "what")?;
                let source = match caps.name("src").map(|m| m.as_str()) {
                    Some("discard pile") => CardSource::Discard,
                    _ => CardSource::Hand,
                };
                Some(Piece::Action(Action::AttachEnergy {
                    source,
                    filter,
                    quantity,
                    target: pokemon(caps, "target")?,
                }))
            },
        ),
        // === Switch ===
        Recognizer::new(
            "switch_yours",
            &format!(r"switch (?:your active pokémon|this pokémon) with 1 of your benched pokémon{END}"),
            |_| Some(Piece::Action(Action::Switch(SwitchKind::Yours))),
        ),
        Recognizer::new(
            "gust",
            &format!(
                r"switch (?:in )?1 of your opponent's benched pokémon (?:with their active pokémon|to the active spot){END}"
            ),
            |_| Some(Piece::Action(Action::Switch(SwitchKind::Gust))),
        ),
        Recognizer::new(
            "opponent_switches",
            &format!(r"your opponent switches their active pokémon with 1 of their benched pokémon{END}"),
            |_| Some(Piece::Action(Action::Switch(SwitchKind::OpponentSwitches))),
        ),
        // === Conditions and locks ===
        Recognizer::new(
            "special_condition",
            &format!(r"{this} is now (?P<c1>{CONDITIONS})(?: and (?P<c2>{CONDITIONS}))?{END}"),
            |caps| {
                let target = pokemon(caps, "target")?;
                let mut actions = vec![Action::ApplyCondition {
                    condition: condition(caps.name("c1")?.as_str())?,
                    target,
                }];
                if let Some(second) = caps.name("c2") {
                    actions.push(Action::ApplyCondition {
                        condition: condition(second.as_str())?,
                        target,
                    });
                }
                Some(Piece::Actions(actions))
            },
        ),
        Recognizer::new(
            "disable_attack",
            &format!(
                r"during your (?P<opp>opponent's )?next turn, (?P<target>this pokémon|the defending pokémon) can't (?:use (?P<attack>[^.]+?)|attack){END}"
            ),
            |caps| {
                Some(Piece::Action(Action::DisableAttack {
                    target: pokemon(caps, "target")?,
                    attack: caps.name("attack").map(|m| m.as_str().to_string()),
                    during: if caps.name("opp").is_some() { Side::Opponents } else { Side::Yours },
                }))
            },
        ),
        // === Tool modifiers ===
        Recognizer::new(
            "attacker_modifier",
            &format!(
                r"(?:the )?attacks (?:used by|of) (?:the pokémon this card is attached to|this pokémon) do (?P<n>\d+) more damage(?: to your opponent's active pokémon)?(?: \(before applying weakness and resistance\))?{END}"
            ),
            |caps| {
                Some(Piece::Action(Action::DamageModifier {
                    side: ModifierSide::Attacker,
                    amount: i32::try_from(number(caps, "n")?).ok()?,
                }))
            },
        ),
        Recognizer::new(
            "defender_modifier",
            &format!(
                r"(?:the pokémon this card is attached to|this pokémon) takes (?P<n>\d+) (?P<dir>less|more) damage from (?:your opponent's )?attacks(?: \(after applying weakness and resistance\))?{END}"
            ),
            |caps| {
                let amount = i32::try_from(number(caps, "n")?).ok()?;
                Some(Piece::Action(Action::DamageModifier {
                    side: ModifierSide::Defender,
                    amount: if &caps["dir"] == "less" { -amount } else { amount },
                }))
            },
        ),
        // === Deck and hand ===
        Recognizer::new("draw", &format!(r"draw (?P<n>a|\d+) cards?{END}"), |caps| {
            Some(Piece::Action(Action::Draw { count: number(caps, "n")? }))
        }),
        Recognizer::new(
            "draw_until",
            &format!(r"draw cards until you have (?P<n>\d+) cards in your hand{END}"),
            |caps| Some(Piece::Action(Action::DrawUntil { hand_size: number(caps, "n")? })),
        ),
        Recognizer::new(
            "shuffle_hand_into_deck",
            &format!(r"(?P<who>shuffle your|your opponent shuffles their) hand into (?:your|their) deck{END}"),
            |caps| {
                let side = if caps["who"].starts_with("your opponent") { Side::Opponents } else { Side::Yours };
                Some(Piece::Action(Action::ShuffleHandIntoDeck { side }))
            },
        ),
        Recognizer::new(
            "shuffle_deck",
            &format!(r"(?P<who>shuffle your|your opponent shuffles their) deck(?: afterward)?{END}"),
            |caps| {
                let side = if caps["who"].starts_with("your opponent") { Side::Opponents } else { Side::Yours };
                Some(Piece::Action(Action::ShuffleDeck { side }))
            },
        ),
    ]
}
