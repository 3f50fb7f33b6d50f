//! Benchmarks for card text parsing and state snapshots.
//!
//! Run with: `cargo bench`

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ptcg_referee::cards::{CardDefinition, CardId, CardRegistry, EnergyType};
use ptcg_referee::core::{GameState, PlayerMap, RefereeConfig};
use ptcg_referee::effects::{EffectOrigin, EffectParser};

const TEXTS: &[(&str, EffectOrigin)] = &[
    ("Heal 30 damage.", EffectOrigin::Ability),
    ("Flip a coin. If tails, this attack does nothing.", EffectOrigin::Attack),
    ("Discard your hand and draw 7 cards.", EffectOrigin::Trainer),
    (
        "Search your deck for up to 2 Basic Pokémon and put them onto your Bench. Then, shuffle your deck.",
        EffectOrigin::Trainer,
    ),
    (
        "Discard any amount of [R] Energy from this Pokémon. \
         This attack does 50 damage for each card you discarded in this way.",
        EffectOrigin::Attack,
    ),
    (
        "If this Pokémon is damaged by an attack from your opponent's Pokémon \
         (even if this Pokémon is Knocked Out), put 3 damage counters on the Attacking Pokémon.",
        EffectOrigin::Ability,
    ),
];

/// Parse each text on its own.
fn benchmark_parse(c: &mut Criterion) {
    let parser = EffectParser::new();
    let mut group = c.benchmark_group("Parse");

    for (i, (text, origin)) in TEXTS.iter().enumerate() {
        group.bench_with_input(BenchmarkId::new("text", i), text, |b, text| {
            b.iter(|| black_box(parser.parse(black_box(text), *origin)));
        });
    }
    group.finish();
}

/// Clone a full match state, the cost paid for every rollback snapshot.
fn benchmark_snapshot(c: &mut Criterion) {
    let catalog = CardRegistry::new().with_cards([
        CardDefinition::pokemon(CardId(1), "Pikachu", 60),
        CardDefinition::basic_energy(CardId(2), EnergyType::Lightning),
    ]).expect("unique card ids");
    let mut deck = vec![CardId(1); 4];
    deck.resize(60, CardId(2));
    let state = GameState::new_match("bench", &RefereeConfig::default(), &PlayerMap::with_value(deck), &catalog)
        .expect("valid decks");

    c.bench_function("snapshot", |b| b.iter(|| black_box(state.snapshot())));
    c.bench_function("to_bytes", |b| b.iter(|| black_box(state.to_bytes())));
}

criterion_group!(benches, benchmark_parse, benchmark_snapshot);
criterion_main!(benches);
