//! Knock Out processing tests: simultaneous Knock Outs, Prize values,
//! replacement order and the win table.

mod common;

use common::*;
use ptcg_referee::cards::SpecialCondition;
use ptcg_referee::core::{ActionRequest, Phase, PlayerId};
use ptcg_referee::effects::{AutoChooser, ChoiceKind, FallbackStrategy};
use ptcg_referee::rules::GameOutcome;
use ptcg_referee::zones::{Location, Zone};

fn requesters(seen: &[ptcg_referee::effects::ChoiceRequest], kind: ChoiceKind) -> Vec<PlayerId> {
    seen.iter().filter(|r| r.kind == kind).map(|r| r.player).collect()
}

#[test]
fn test_simultaneous_checkup_knockouts() {
    let mut board = Board::new();
    board.prizes(6);
    let mut actives = Vec::new();
    for player in [P0, P1] {
        let active = board.place(player, MAGIKARP, Zone::Active);
        board.place(player, MAGIKARP, Zone::Bench);
        board.place(player, MAGIKARP, Zone::Bench);
        board.damage(active, 20);
        board.condition(active, SpecialCondition::Poisoned);
        actives.push(active);
    }
    board.main_step(P0, 3);
    let (chooser, seen) = Recording::new(AutoChooser(FallbackStrategy::Maximum));
    let mut referee = board.referee(chooser);

    let outcome = referee.submit(P0, ActionRequest::EndTurn).unwrap();

    assert_eq!(outcome.knocked_out, actives);
    let seen = seen.lock();
    assert_eq!(requesters(&seen, ChoiceKind::Prize), vec![P1, P0]);
    assert_eq!(requesters(&seen, ChoiceKind::Replacement), vec![P1, P0]);

    let state = referee.state();
    for player in [P0, P1] {
        assert_eq!(state.prizes_remaining(player), 5);
        assert!(state.active(player).is_some());
        assert_eq!(state.bench(player).len(), 1);
    }
    assert_eq!(state.active_player, P1);
    assert_eq!(state.phase, Phase::MainStep);
}

#[test]
fn test_ex_gives_two_prizes() {
    let mut board = Board::new();
    board.prizes(6);
    let pikachu = board.place(P0, PIKACHU, Zone::Active);
    board.attach(P0, LIGHTNING, pikachu);
    let lapras = board.place(P1, LAPRAS_EX, Zone::Active);
    board.place(P1, MAGIKARP, Zone::Bench);
    board.damage(lapras, 200);
    board.main_step(P0, 3);
    let mut referee = board.referee(AutoChooser(FallbackStrategy::Maximum));

    let outcome = referee.submit(P0, ActionRequest::Attack { attack: 0 }).unwrap();

    assert_eq!(outcome.damage_dealt, Some(20));
    assert_eq!(outcome.knocked_out, vec![lapras]);
    assert_eq!(referee.state().prizes_remaining(P0), 4);
    assert_eq!(referee.state().hand(P0).len(), 2);
}

#[test]
fn test_no_benched_pokemon_loses() {
    let mut board = Board::new();
    board.prizes(6);
    let pikachu = board.place(P0, PIKACHU, Zone::Active);
    board.attach(P0, LIGHTNING, pikachu);
    let magikarp = board.place(P1, MAGIKARP, Zone::Active);
    board.damage(magikarp, 10);
    board.main_step(P0, 3);
    let mut referee = board.referee(AutoChooser(FallbackStrategy::Maximum));

    let outcome = referee.submit(P0, ActionRequest::Attack { attack: 0 }).unwrap();

    assert_eq!(outcome.knocked_out, vec![magikarp]);
    assert_eq!(referee.outcome(), Some(GameOutcome::Win(P0)));
    assert_eq!(referee.phase(), Phase::GameOver);
    assert_eq!(referee.state().prizes_remaining(P0), 5);
}

#[test]
fn test_both_sides_wiped_out_is_a_tie() {
    let mut board = Board::new();
    board.prizes(6);
    let pikachu = board.place(P0, PIKACHU, Zone::Active);
    let magikarp = board.place(P1, MAGIKARP, Zone::Active);
    board.damage(pikachu, 50);
    board.damage(magikarp, 20);
    board.condition(pikachu, SpecialCondition::Poisoned);
    board.condition(magikarp, SpecialCondition::Poisoned);
    board.main_step(P0, 3);
    let mut referee = board.referee(AutoChooser(FallbackStrategy::Maximum));

    referee.submit(P0, ActionRequest::EndTurn).unwrap();

    assert_eq!(referee.outcome(), Some(GameOutcome::Tie));
    assert_eq!(referee.phase(), Phase::GameOver);
}

#[test]
fn test_reactive_ability_resolves_when_knocked_out() {
    let mut board = Board::new();
    board.prizes(6);
    let pikachu = board.place(P0, PIKACHU, Zone::Active);
    board.attach(P0, LIGHTNING, pikachu);
    let ferroseed = board.place(P1, FERROSEED, Zone::Active);
    board.place(P1, MAGIKARP, Zone::Bench);
    board.damage(ferroseed, 50);
    board.main_step(P0, 3);
    let mut referee = board.referee(AutoChooser(FallbackStrategy::Maximum));

    let outcome = referee.submit(P0, ActionRequest::Attack { attack: 0 }).unwrap();

    assert_eq!(outcome.knocked_out, vec![ferroseed]);
    let state = referee.state();
    assert_eq!(state.instance(pikachu).unwrap().damage, 30);
    assert_eq!(state.instance(ferroseed).unwrap().location, Location::Zone(P1, Zone::Discard));
    assert_eq!(state.prizes_remaining(P0), 5);
}
