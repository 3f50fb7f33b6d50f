//! Legality checks.
//!
//! Every submitted action is checked here against a read-only view of the
//! state before anything is mutated. A rejected action therefore never has
//! side effects.

use rustc_hash::FxHashMap;

use crate::cards::{CardCatalog, CardDefinition, CardId, EnergyType, SpecialCondition, Stage, TrainerKind};
use crate::core::{ActionRequest, GameState, IllegalReason, InstanceId, Phase, PlayerId, RefereeConfig, UsageScope};
use crate::effects::{CardEffects, Condition, Gate, UsageLimit};
use crate::zones::{Location, Zone};

/// Turn counter keys.
pub(crate) const ENERGY_ATTACHED: &str = "energy_attached";
pub(crate) const SUPPORTER_PLAYED: &str = "supporter_played";
pub(crate) const STADIUM_PLAYED: &str = "stadium_played";
pub(crate) const RETREATED: &str = "retreated";

/// Usage counter of an ability, by its limit.
pub(crate) fn ability_usage(pokemon: InstanceId, ability: usize, name: &str, limit: UsageLimit) -> Option<(UsageScope, String)> {
    match limit {
        UsageLimit::Unlimited => None,
        UsageLimit::OncePerTurn => Some((UsageScope::Turn, format!("ability:{}:{ability}", pokemon.0))),
        UsageLimit::OncePerGame => Some((UsageScope::Game, format!("ability:{}", name.to_lowercase()))),
    }
}

/// Read-only view the checks run against.
pub struct RuleView<'a> {
    pub state: &'a GameState,
    pub catalog: &'a dyn CardCatalog,
    pub config: &'a RefereeConfig,
    pub effects: &'a FxHashMap<CardId, CardEffects>,
}

impl<'a> RuleView<'a> {
    fn definition(&self, id: InstanceId) -> Option<&'a CardDefinition> {
        self.state.definition(self.catalog, id).ok()
    }

    fn in_hand(&self, player: PlayerId, card: InstanceId) -> Result<&'a CardDefinition, IllegalReason> {
        let held = self
            .state
            .get(card)
            .is_some_and(|c| c.location == Location::Zone(player, Zone::Hand));
        if !held {
            return Err(IllegalReason::NotInHand(card));
        }
        self.definition(card).ok_or(IllegalReason::NotInHand(card))
    }

    fn own_pokemon(&self, player: PlayerId, pokemon: InstanceId) -> Result<&'a CardDefinition, IllegalReason> {
        let owned = self
            .state
            .get(pokemon)
            .is_some_and(|c| c.location.is_in_play() && c.location.zone().map(|(p, _)| p) == Some(player));
        if !owned {
            return Err(IllegalReason::NotYourPokemon(pokemon));
        }
        self.definition(pokemon).ok_or(IllegalReason::NotYourPokemon(pokemon))
    }

    fn used(&self, player: PlayerId, key: &str) -> bool {
        self.state.usage_count(player, UsageScope::Turn, key) > 0
    }

    fn has_condition(&self, pokemon: InstanceId, condition: SpecialCondition) -> bool {
        self.state.get(pokemon).is_some_and(|c| c.conditions.contains(condition))
    }

    /// First turn of the game, which is always the first player's.
    fn first_turn(&self) -> bool {
        self.state.turn_number <= 1
    }
}

/// Check one action for `player`.
pub fn check(view: &RuleView<'_>, player: PlayerId, request: &ActionRequest) -> Result<(), IllegalReason> {
    if view.state.phase != Phase::MainStep {
        return Err(IllegalReason::WrongPhase(view.state.phase));
    }
    if view.state.active_player != player {
        return Err(IllegalReason::NotYourTurn(player));
    }

    match request {
        ActionRequest::PlayBasic { card } => {
            let def = view.in_hand(player, *card)?;
            if !def.is_basic_pokemon() {
                return Err(IllegalReason::WrongCardKind {
                    card: *card,
                    expected: "Basic Pokémon",
                });
            }
            if view.state.active(player).is_some() && view.state.zones.is_full(player, Zone::Bench) {
                return Err(IllegalReason::BenchFull);
            }
            Ok(())
        }

        ActionRequest::Evolve {
            card,
            target,
            skip_stage1,
        } => {
            let evolution = view.in_hand(player, *card)?;
            let Some(from) = evolution.evolves_from.as_deref().filter(|_| evolution.is_pokemon()) else {
                return Err(IllegalReason::WrongCardKind {
                    card: *card,
                    expected: "Evolution Pokémon",
                });
            };
            let current = view.own_pokemon(player, *target)?;
            let fits = if *skip_stage1 {
                evolution.stage == Some(Stage::Stage2)
                    && current.is_basic_pokemon()
                    && view.catalog.find_by_name(from).is_some_and(|stage1| {
                        stage1.stage == Some(Stage::Stage1)
                            && stage1
                                .evolves_from
                                .as_deref()
                                .is_some_and(|basic| current.name.eq_ignore_ascii_case(basic))
                    })
            } else {
                current.name.eq_ignore_ascii_case(from)
            };
            if !fits {
                return Err(IllegalReason::EvolutionMismatch {
                    evolution: evolution.name.clone(),
                    target: current.name.clone(),
                });
            }
            let turn = view.state.turn_number;
            let instance = view.state.get(*target).ok_or(IllegalReason::NotYourPokemon(*target))?;
            if turn <= 2 || instance.entered_turn == Some(turn) || instance.evolved_turn == Some(turn) {
                return Err(IllegalReason::EvolutionTooEarly(*target));
            }
            Ok(())
        }

        ActionRequest::AttachEnergy { card, target } => {
            let def = view.in_hand(player, *card)?;
            if !def.is_energy() {
                return Err(IllegalReason::WrongCardKind {
                    card: *card,
                    expected: "Energy",
                });
            }
            view.own_pokemon(player, *target)?;
            if view.used(player, ENERGY_ATTACHED) {
                return Err(IllegalReason::EnergyAlreadyAttached);
            }
            Ok(())
        }

        ActionRequest::PlayTrainer { card, target } => check_trainer(view, player, *card, *target),

        ActionRequest::UseAbility { pokemon, ability } => check_ability(view, player, *pokemon, *ability),

        ActionRequest::Retreat { bench, energy } => check_retreat(view, player, *bench, energy),

        ActionRequest::Attack { attack } => check_attack(view, player, *attack),

        ActionRequest::EndTurn => Ok(()),
    }
}

fn check_trainer(
    view: &RuleView<'_>,
    player: PlayerId,
    card: InstanceId,
    target: Option<InstanceId>,
) -> Result<(), IllegalReason> {
    let def = view.in_hand(player, card)?;
    let Some(kind) = def.trainer_kind() else {
        return Err(IllegalReason::WrongCardKind {
            card,
            expected: "Trainer",
        });
    };

    match kind {
        TrainerKind::Item => Ok(()),
        TrainerKind::Supporter => {
            if view.first_turn() && !view.config.first_turn_supporter {
                return Err(IllegalReason::FirstTurnRestriction("play a Supporter"));
            }
            if view.used(player, SUPPORTER_PLAYED) {
                return Err(IllegalReason::SupporterAlreadyPlayed);
            }
            Ok(())
        }
        TrainerKind::Stadium => {
            if view.used(player, STADIUM_PLAYED) {
                return Err(IllegalReason::StadiumAlreadyPlayed);
            }
            let same = view
                .state
                .zones
                .stadium()
                .and_then(|s| view.definition(s))
                .is_some_and(|s| s.name == def.name);
            if same {
                return Err(IllegalReason::SameStadiumInPlay(def.name.clone()));
            }
            Ok(())
        }
        TrainerKind::Tool => {
            let host = target.ok_or(IllegalReason::MissingTarget)?;
            view.own_pokemon(player, host)?;
            if !view.state.attached_tools(view.catalog, host).is_empty() {
                return Err(IllegalReason::ToolAlreadyAttached(host));
            }
            Ok(())
        }
    }
}

fn check_ability(view: &RuleView<'_>, player: PlayerId, pokemon: InstanceId, ability: usize) -> Result<(), IllegalReason> {
    let def = view.own_pokemon(player, pokemon)?;
    let printed = def.abilities.get(ability).ok_or(IllegalReason::NoSuchAbility(ability))?;
    let descriptor = view
        .effects
        .get(&def.id)
        .and_then(|e| e.abilities.get(ability))
        .ok_or(IllegalReason::NoSuchAbility(ability))?;

    if descriptor.is_empty() || descriptor.is_passive() {
        return Err(IllegalReason::PassiveAbility(printed.name.clone()));
    }
    if let Some((scope, key)) = ability_usage(pokemon, ability, &printed.name, descriptor.limit) {
        if view.state.usage_count(player, scope, &key) > 0 {
            return Err(IllegalReason::AbilityLimit(printed.name.clone()));
        }
    }
    let needs_active = descriptor
        .nodes
        .first()
        .is_some_and(|n| n.gate == Gate::If(Condition::SourceInActiveSpot));
    if needs_active && view.state.active(player) != Some(pokemon) {
        return Err(IllegalReason::AbilityCondition {
            ability: printed.name.clone(),
            requirement: "the Active Spot",
        });
    }
    Ok(())
}

fn check_retreat(
    view: &RuleView<'_>,
    player: PlayerId,
    bench: InstanceId,
    energy: &[InstanceId],
) -> Result<(), IllegalReason> {
    let active = view.state.active(player).ok_or(IllegalReason::NoActivePokemon)?;
    if view.used(player, RETREATED) {
        return Err(IllegalReason::AlreadyRetreated);
    }
    for condition in [SpecialCondition::Asleep, SpecialCondition::Paralyzed] {
        if view.has_condition(active, condition) {
            return Err(IllegalReason::StatusPrevents(condition));
        }
    }
    let on_bench = view
        .state
        .get(bench)
        .is_some_and(|c| c.location == Location::Zone(player, Zone::Bench));
    if !on_bench {
        return Err(IllegalReason::NotOnBench(bench));
    }

    let required = view.definition(active).map_or(0, |d| d.retreat_cost as usize);
    let attached = view.state.attached_energy(view.catalog, active);
    let distinct = energy.iter().enumerate().all(|(i, id)| !energy[..i].contains(id));
    let units: usize = energy
        .iter()
        .filter(|id| attached.contains(id))
        .filter_map(|id| view.definition(*id))
        .map(|d| d.provides.len())
        .sum();
    let offered = energy.len();
    if !distinct || !energy.iter().all(|id| attached.contains(id)) || units < required {
        return Err(IllegalReason::RetreatCostNotMet { required, offered });
    }
    Ok(())
}

fn check_attack(view: &RuleView<'_>, player: PlayerId, index: usize) -> Result<(), IllegalReason> {
    let active = view.state.active(player).ok_or(IllegalReason::NoActivePokemon)?;
    let def = view.definition(active).ok_or(IllegalReason::NoActivePokemon)?;
    let attack = def.attacks.get(index).ok_or(IllegalReason::NoSuchAttack(index))?;

    if view.first_turn() && !view.config.first_turn_attack {
        return Err(IllegalReason::FirstTurnRestriction("attack"));
    }
    for condition in [SpecialCondition::Asleep, SpecialCondition::Paralyzed] {
        if view.has_condition(active, condition) {
            return Err(IllegalReason::StatusPrevents(condition));
        }
    }
    let disabled = view
        .state
        .get(active)
        .and_then(|c| c.disabled_attack.as_ref())
        .is_some_and(|d| d.blocks(&attack.name, view.state.turn_number));
    if disabled {
        return Err(IllegalReason::AttackDisabled(attack.name.clone()));
    }
    if !cost_met(&attack.cost, &view.state.energy_provided(view.catalog, active)) {
        return Err(IllegalReason::CostNotMet(attack.name.clone()));
    }
    Ok(())
}

/// Whether `provided` Energy pays `cost`. Typed costs need their own type;
/// Colorless takes anything left over.
///
/// ```
/// use ptcg_referee::cards::EnergyType::{Colorless, Fire, Water};
/// use ptcg_referee::rules::cost_met;
///
/// assert!(cost_met(&[Fire, Colorless], &[Water, Fire]));
/// assert!(!cost_met(&[Fire, Fire], &[Fire, Water]));
/// ```
#[must_use]
pub fn cost_met(cost: &[EnergyType], provided: &[EnergyType]) -> bool {
    let mut pool: Vec<EnergyType> = provided.to_vec();
    let mut colorless = 0usize;
    for unit in cost {
        if *unit == EnergyType::Colorless {
            colorless += 1;
            continue;
        }
        match pool.iter().position(|e| e == unit) {
            Some(i) => {
                pool.swap_remove(i);
            }
            None => return false,
        }
    }
    pool.len() >= colorless
}
