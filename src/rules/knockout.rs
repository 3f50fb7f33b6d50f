//! Knock Out detection and Prize accounting.
//!
//! Every Pokémon in play whose damage has reached its HP is Knocked Out at
//! the same moment. For each one, its owner's opponent is owed the
//! Pokémon's Prize value plus that opponent's Prize modifier. Replacement
//! Active Pokémon are chosen afterwards, the player who acts next first.

use crate::cards::CardCatalog;
use crate::core::{GameState, InstanceId, PlayerId, PlayerMap, StructuralError};
use crate::ops::AtomicOps;

/// Every Pokémon in play that is Knocked Out, both players, Active first.
pub fn detect(ops: &mut AtomicOps<'_>) -> Result<Vec<InstanceId>, StructuralError> {
    let in_play: Vec<InstanceId> = PlayerId::both().flat_map(|p| ops.state().in_play(p)).collect();
    let mut knocked_out = Vec::new();
    for id in in_play {
        if ops.state().instance(id)?.damage == 0 {
            continue;
        }
        if ops.check_knockout(id)? {
            knocked_out.push(id);
        }
    }
    Ok(knocked_out)
}

/// Prizes each player takes for a batch of simultaneous Knock Outs.
pub fn prizes_owed(
    state: &GameState,
    catalog: &dyn CardCatalog,
    knocked_out: &[InstanceId],
) -> Result<PlayerMap<usize>, StructuralError> {
    let mut owed = PlayerMap::with_value(0usize);
    for id in knocked_out {
        let owner = state.instance(*id)?.owner;
        let taker = owner.opponent();
        let value = i64::from(state.definition(catalog, *id)?.prize_value) + i64::from(state.players[taker].prize_delta);
        owed[taker] += usize::try_from(value.max(0)).unwrap_or(0);
    }
    Ok(owed)
}

/// Order in which players act on a Knock Out batch: the player who takes
/// the next turn goes first.
pub fn acting_order(next_to_act: PlayerId) -> impl Iterator<Item = PlayerId> {
    PlayerId::starting_with(next_to_act)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::{CardDefinition, CardId, CardRegistry, EnergyType};
    use crate::core::{Actor, DeterministicEntropy, RefereeConfig};
    use crate::zones::{Location, Zone, ZonePosition};

    fn catalog() -> CardRegistry {
        CardRegistry::new().with_cards([
            CardDefinition::pokemon(CardId(1), "Magikarp", 30),
            CardDefinition::pokemon(CardId(2), "Lapras ex", 220).with_prize_value(2),
            CardDefinition::basic_energy(CardId(3), EnergyType::Water),
        ]).unwrap()
    }

    fn state(catalog: &CardRegistry) -> GameState {
        let mut deck = vec![CardId(1); 4];
        deck.extend([CardId(2); 2]);
        deck.extend(std::iter::repeat(CardId(3)).take(54));
        GameState::new_match("ko", &RefereeConfig::default(), &PlayerMap::with_value(deck), catalog).unwrap()
    }

    fn place(ops: &mut AtomicOps<'_>, player: PlayerId, card: CardId, zone: Zone) -> InstanceId {
        let id = ops.state().find_in_zone(player, Zone::Deck, card).unwrap();
        ops.move_card(id, Location::Zone(player, zone), ZonePosition::Top).unwrap();
        id
    }

    #[test]
    fn test_detects_simultaneous_knockouts() {
        let catalog = catalog();
        let mut state = state(&catalog);
        let mut entropy = DeterministicEntropy::new(0);
        let mut ops = AtomicOps::new(&mut state, &mut entropy, &catalog, Actor::Referee);
        let a = place(&mut ops, PlayerId::FIRST, CardId(1), Zone::Active);
        let b = place(&mut ops, PlayerId::SECOND, CardId(2), Zone::Active);
        let c = place(&mut ops, PlayerId::SECOND, CardId(1), Zone::Bench);
        ops.update_damage(a, 30).unwrap();
        ops.update_damage(b, 220).unwrap();
        ops.update_damage(c, 20).unwrap();

        assert_eq!(detect(&mut ops).unwrap(), vec![a, b]);

        let owed = prizes_owed(ops.state(), &catalog, &[a, b]).unwrap();
        assert_eq!(owed[PlayerId::FIRST], 2);
        assert_eq!(owed[PlayerId::SECOND], 1);
    }

    #[test]
    fn test_prize_delta_applies_per_knockout() {
        let catalog = catalog();
        let mut state = state(&catalog);
        let mut entropy = DeterministicEntropy::new(0);
        let mut ops = AtomicOps::new(&mut state, &mut entropy, &catalog, Actor::Referee);
        let a = place(&mut ops, PlayerId::SECOND, CardId(1), Zone::Active);
        let b = place(&mut ops, PlayerId::SECOND, CardId(1), Zone::Bench);
        ops.modify_prize_delta(PlayerId::FIRST, 1);

        let owed = prizes_owed(ops.state(), &catalog, &[a, b]).unwrap();
        assert_eq!(owed[PlayerId::FIRST], 4);

        ops.modify_prize_delta(PlayerId::FIRST, -3);
        let owed = prizes_owed(ops.state(), &catalog, &[a]).unwrap();
        assert_eq!(owed[PlayerId::FIRST], 0);
    }

    #[test]
    fn test_acting_order() {
        let order: Vec<PlayerId> = acting_order(PlayerId::SECOND).collect();
        assert_eq!(order, vec![PlayerId::SECOND, PlayerId::FIRST]);
    }
}
