//! Referee configuration and match phases.
//!
//! `RefereeConfig` carries the numeric constants of the rules (deck size,
//! prize count, checkup damage, ...). Every field has a default matching the
//! standard format, so a config file only lists what it overrides:
//!
//! ```toml
//! prize_count = 4
//! choice_timeout_ms = 5000
//! ```
//!
//! `Phase` enumerates the Referee state machine.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// Rules constants for one match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefereeConfig {
    /// Exact deck size required at match start.
    pub deck_size: usize,
    /// Prize cards set aside per player.
    pub prize_count: usize,
    /// Bench capacity.
    pub bench_size: usize,
    /// Cards drawn for the opening hand.
    pub opening_hand: usize,
    /// Copies allowed per card name (basic Energy exempt).
    pub max_copies: usize,
    /// Weakness multiplier.
    pub weakness_multiplier: u32,
    /// Damage placed by Poisoned during checkup.
    pub poison_damage: u32,
    /// Damage placed by Burned during checkup.
    pub burn_damage: u32,
    /// Damage a Confused Pokémon does to itself on tails.
    pub confusion_self_damage: u32,
    /// Whether the first player may attack on the first turn.
    pub first_turn_attack: bool,
    /// Whether the first player may play a Supporter on the first turn.
    pub first_turn_supporter: bool,
    /// Timeout for every choice checkpoint, in milliseconds.
    pub choice_timeout_ms: u64,
    /// Fixed match id. Generated from the entropy source when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_id: Option<String>,
}

impl Default for RefereeConfig {
    fn default() -> Self {
        Self {
            deck_size: 60,
            prize_count: 6,
            bench_size: 5,
            opening_hand: 7,
            max_copies: 4,
            weakness_multiplier: 2,
            poison_damage: 10,
            burn_damage: 20,
            confusion_self_damage: 30,
            first_turn_attack: false,
            first_turn_supporter: false,
            choice_timeout_ms: 30_000,
            match_id: None,
        }
    }
}

impl RefereeConfig {
    /// Parse a config from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Write the config as TOML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let text = toml::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Reject values the referee cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.deck_size < self.opening_hand + self.prize_count {
            return Err(ConfigError::Invalid(format!(
                "deck_size {} cannot cover opening hand {} and {} prizes",
                self.deck_size, self.opening_hand, self.prize_count
            )));
        }
        if self.bench_size == 0 {
            return Err(ConfigError::Invalid("bench_size must be at least 1".into()));
        }
        if self.weakness_multiplier == 0 {
            return Err(ConfigError::Invalid("weakness_multiplier must be at least 1".into()));
        }
        Ok(())
    }

    /// Choice checkpoint timeout.
    #[must_use]
    pub fn choice_timeout(&self) -> Duration {
        Duration::from_millis(self.choice_timeout_ms)
    }
}

/// Referee state machine phases.
///
/// Linear per turn, except that an outright attack failure leaves
/// `AttackDeclared` early, any state may enter `KnockoutProcessing`, and
/// `WinCheck` leads either to `GameOver` or to the next `TurnStart`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Setup,
    TurnStart,
    DrawStep,
    MainStep,
    AttackDeclared,
    DamageCalc,
    EffectResolution,
    Checkup,
    KnockoutProcessing,
    WinCheck,
    GameOver,
}

impl Phase {
    /// Stable name for logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Phase::Setup => "setup",
            Phase::TurnStart => "turn_start",
            Phase::DrawStep => "draw_step",
            Phase::MainStep => "main_step",
            Phase::AttackDeclared => "attack_declared",
            Phase::DamageCalc => "damage_calc",
            Phase::EffectResolution => "effect_resolution",
            Phase::Checkup => "checkup",
            Phase::KnockoutProcessing => "knockout_processing",
            Phase::WinCheck => "win_check",
            Phase::GameOver => "game_over",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_standard_format() {
        let config = RefereeConfig::default();
        assert_eq!(config.deck_size, 60);
        assert_eq!(config.prize_count, 6);
        assert_eq!(config.bench_size, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = RefereeConfig::from_toml_str("prize_count = 4\nchoice_timeout_ms = 250\n").unwrap();
        assert_eq!(config.prize_count, 4);
        assert_eq!(config.choice_timeout(), Duration::from_millis(250));
        assert_eq!(config.deck_size, 60);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = RefereeConfig::from_toml_str("deck_size = 5").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let err = RefereeConfig::from_toml_str("prize_count = \"six\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = RefereeConfig {
            first_turn_attack: true,
            ..RefereeConfig::default()
        };
        let text = toml::to_string_pretty(&config).unwrap();
        assert_eq!(RefereeConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(Phase::KnockoutProcessing.to_string(), "knockout_processing");
        assert_eq!(Phase::default(), Phase::Setup);
    }
}
