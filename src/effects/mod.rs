//! Card effects: parsing and execution.
//!
//! Card behavior is data. The [`EffectParser`] turns the closed vocabulary
//! of card text into [`EffectDescriptor`] trees; the [`Interpreter`]
//! executes any descriptor against live state. A new card needs no new code
//! as long as its text matches the existing recognizers.
//!
//! - [`descriptor`]: the descriptor tree (actions, gates, timing, chains)
//! - [`targeting`]: quantifiers, Pokémon references and card filters
//! - [`recognizers`]: the ordered phrase recognizers
//! - [`parser`]: text to descriptor
//! - [`choice`]: the suspend/resume contract for player choices
//! - [`interpreter`]: descriptor to Atomic Operations

pub mod choice;
pub mod descriptor;
pub mod interpreter;
pub mod parser;
pub mod recognizers;
pub mod targeting;

pub use choice::{
    AutoChooser, ChannelChooser, ChoiceEndpoint, ChoiceKind, ChoiceRequest, ChoiceResponse, Chooser,
    FallbackStrategy, ScriptedChooser, SeatedChoosers,
};
pub use descriptor::{
    Action, BonusBasis, CardSource, Condition, CounterAmount, Destination, EffectDescriptor, EffectNode,
    EffectOrigin, Gate, HealAmount, ModifierSide, Side, SwitchKind, TimeoutPolicy, Timing, UsageLimit,
};
pub use interpreter::{EffectContext, EffectReport, Interpreter, RunPhase};
pub use parser::{normalize, CardEffects, EffectParser};
pub use targeting::{
    parse_card_filter, parse_pokemon_phrase, parse_quantity, CardFilter, CardKind, PokemonSelector, PokemonTarget,
    Quantity, Spot, TargetContext,
};
