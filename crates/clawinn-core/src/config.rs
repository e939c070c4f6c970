//! Simulation configuration.
//!
//! Every constant the simulation uses lives here so it can be tuned from a
//! JSON file without recompiling:
//! - Tick cadence and job-trigger probability
//! - Negotiation pacing, forced-rejection odds and acceptance formula
//! - Cooldown bounds, jackpot odds/interval/amount, role-switch thresholds
//! - Seed population and content-generation budgets

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Negotiation pacing and policy constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NegotiationConfig {
    /// Minimum delay before the greeting, in milliseconds.
    pub greeting_delay_min_ms: u64,
    /// Maximum delay before the greeting, in milliseconds.
    pub greeting_delay_max_ms: u64,
    /// Minimum gap between subsequent messages, in milliseconds.
    pub message_gap_min_ms: u64,
    /// Maximum gap between subsequent messages, in milliseconds.
    pub message_gap_max_ms: u64,
    /// Chance the employer rudely rejects the opening price outright.
    pub angry_rejection_probability: f64,
    /// Chance the employer politely rejects the opening price outright.
    pub polite_rejection_probability: f64,
    /// Counter round at which the worker stops countering.
    pub max_counter_rounds: u32,
    /// Acceptance ratio required in round 0.
    pub accept_threshold_base: f64,
    /// How much the required ratio drops per counter round.
    pub accept_threshold_step: f64,
    /// Lowest required ratio.
    pub accept_threshold_floor: f64,
    /// Lower bound of the share of the gap the worker concedes when countering.
    pub worker_counter_min_share: f64,
    /// Upper bound of that share.
    pub worker_counter_max_share: f64,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            greeting_delay_min_ms: 2_000,
            greeting_delay_max_ms: 5_000,
            message_gap_min_ms: 4_000,
            message_gap_max_ms: 8_000,
            angry_rejection_probability: 0.15,
            polite_rejection_probability: 0.15,
            max_counter_rounds: 3,
            accept_threshold_base: 0.7,
            accept_threshold_step: 0.1,
            accept_threshold_floor: 0.5,
            worker_counter_min_share: 0.3,
            worker_counter_max_share: 0.6,
        }
    }
}

impl NegotiationConfig {
    /// Ratio of offer to asking price the worker accepts in `counter_round`.
    #[must_use]
    pub fn accept_threshold(&self, counter_round: u32) -> f64 {
        let lowered = f64::from(counter_round).mul_add(-self.accept_threshold_step, self.accept_threshold_base);
        lowered.max(self.accept_threshold_floor)
    }
}

/// Cooldown bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownConfig {
    /// Shortest cooldown, in milliseconds.
    pub min_ms: u64,
    /// Longest cooldown, in milliseconds.
    pub max_ms: u64,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            min_ms: 900_000,
            max_ms: 1_200_000,
        }
    }
}

/// Jackpot lottery settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JackpotConfig {
    /// Per-agent win probability for one draw.
    pub probability: f64,
    /// Minimum time between draws, in milliseconds.
    pub interval_ms: u64,
    /// Credits minted per win.
    pub amount: u64,
}

impl Default for JackpotConfig {
    fn default() -> Self {
        Self {
            probability: 0.01,
            interval_ms: 3_600_000,
            amount: 10_000,
        }
    }
}

/// Role-switch thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleConfig {
    /// Employers strictly below this balance become workers.
    pub employer_min_balance: u64,
    /// Workers strictly above this balance become employers.
    pub worker_max_balance: u64,
}

impl Default for RoleConfig {
    fn default() -> Self {
        Self {
            employer_min_balance: 300,
            worker_max_balance: 1_500,
        }
    }
}

/// Seed population.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    /// Number of employers created by seeding.
    pub employers: u32,
    /// Number of workers created by seeding.
    pub workers: u32,
    /// Starting balance of an employer.
    pub employer_starting_balance: u64,
    /// Starting balance of a worker.
    pub worker_starting_balance: u64,
    /// Open tasks posted by each seeded employer.
    pub tasks_per_employer: u32,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            employers: 65,
            workers: 50,
            employer_starting_balance: 2_000,
            worker_starting_balance: 500,
            tasks_per_employer: 2,
        }
    }
}

/// Budgets for the text-generation backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Requests allowed per rolling minute.
    pub max_requests_per_minute: u32,
    /// Tokens allowed per rolling minute.
    pub max_tokens_per_minute: u64,
    /// Tokens allowed per rolling hour.
    pub max_tokens_per_hour: u64,
    /// Give up on a generation after this many milliseconds.
    pub timeout_ms: u64,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            max_requests_per_minute: 50,
            max_tokens_per_minute: 60_000,
            max_tokens_per_hour: 1_000_000,
            timeout_ms: 3_000,
        }
    }
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Wall-clock period of the tick loop, in milliseconds.
    pub tick_interval_ms: u64,
    /// Chance per tick that a new negotiation is attempted.
    pub job_trigger_probability: f64,
    /// Negotiation settings.
    pub negotiation: NegotiationConfig,
    /// Cooldown settings.
    pub cooldown: CooldownConfig,
    /// Jackpot settings.
    pub jackpot: JackpotConfig,
    /// Role-switch settings.
    pub roles: RoleConfig,
    /// Seed population.
    pub population: PopulationConfig,
    /// Content-generation budgets.
    pub content: ContentConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 2_000,
            job_trigger_probability: 0.20,
            negotiation: NegotiationConfig::default(),
            cooldown: CooldownConfig::default(),
            jackpot: JackpotConfig::default(),
            roles: RoleConfig::default(),
            population: PopulationConfig::default(),
            content: ContentConfig::default(),
        }
    }
}

fn check_probability(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("{value} is not a probability"),
        })
    }
}

fn check_range<T: PartialOrd + std::fmt::Display>(
    field: &'static str,
    min: T,
    max: T,
) -> Result<(), ConfigError> {
    if min <= max {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("minimum {min} exceeds maximum {max}"),
        })
    }
}

impl SimConfig {
    /// Load configuration from a JSON file and validate it.
    ///
    /// Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Parse configuration from a JSON string and validate it.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    /// Tick period as a [`Duration`].
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(100..=60_000).contains(&self.tick_interval_ms) {
            return Err(ConfigError::Invalid {
                field: "tick_interval_ms",
                reason: format!("{} is outside 100..=60000", self.tick_interval_ms),
            });
        }
        check_probability("job_trigger_probability", self.job_trigger_probability)?;

        let n = &self.negotiation;
        check_range("negotiation.greeting_delay_ms", n.greeting_delay_min_ms, n.greeting_delay_max_ms)?;
        check_range("negotiation.message_gap_ms", n.message_gap_min_ms, n.message_gap_max_ms)?;
        check_probability("negotiation.angry_rejection_probability", n.angry_rejection_probability)?;
        check_probability("negotiation.polite_rejection_probability", n.polite_rejection_probability)?;
        check_probability(
            "negotiation.forced_rejection_probability",
            n.angry_rejection_probability + n.polite_rejection_probability,
        )?;
        check_range("negotiation.accept_threshold", n.accept_threshold_floor, n.accept_threshold_base)?;
        check_probability("negotiation.worker_counter_min_share", n.worker_counter_min_share)?;
        check_probability("negotiation.worker_counter_max_share", n.worker_counter_max_share)?;
        check_range(
            "negotiation.worker_counter_share",
            n.worker_counter_min_share,
            n.worker_counter_max_share,
        )?;

        check_range("cooldown", self.cooldown.min_ms, self.cooldown.max_ms)?;

        check_probability("jackpot.probability", self.jackpot.probability)?;
        if self.jackpot.amount == 0 {
            return Err(ConfigError::Invalid {
                field: "jackpot.amount",
                reason: "must be greater than 0".to_string(),
            });
        }

        if self.roles.employer_min_balance > self.roles.worker_max_balance {
            return Err(ConfigError::Invalid {
                field: "roles",
                reason: "employer_min_balance exceeds worker_max_balance".to_string(),
            });
        }

        if self.content.timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "content.timeout_ms",
                reason: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use test_case::test_case;

    #[test]
    fn defaults_match_documented_constants() {
        let config = SimConfig::default();
        assert_eq!(config.tick_interval_ms, 2_000);
        assert!((config.job_trigger_probability - 0.20).abs() < f64::EPSILON);
        assert_eq!(config.cooldown.min_ms, 900_000);
        assert_eq!(config.cooldown.max_ms, 1_200_000);
        assert_eq!(config.jackpot.interval_ms, 3_600_000);
        assert_eq!(config.jackpot.amount, 10_000);
        assert_eq!(config.roles.employer_min_balance, 300);
        assert_eq!(config.roles.worker_max_balance, 1_500);
        assert_eq!(config.population.worker_starting_balance, 500);
        assert_eq!(config.population.employer_starting_balance, 2_000);
        assert!(config.validate().is_ok());
    }

    #[test_case(0, 0.7 ; "round zero")]
    #[test_case(1, 0.6 ; "round one")]
    #[test_case(2, 0.5 ; "round two hits floor")]
    #[test_case(5, 0.5 ; "clamped at floor")]
    fn accept_threshold_formula(round: u32, expected: f64) {
        let n = NegotiationConfig::default();
        assert!((n.accept_threshold(round) - expected).abs() < 1e-9);
    }

    #[test]
    fn partial_json_takes_defaults() {
        let config = SimConfig::from_json(r#"{ "tick_interval_ms": 500, "jackpot": { "amount": 42 } }"#)
            .expect("should parse");
        assert_eq!(config.tick_interval_ms, 500);
        assert_eq!(config.jackpot.amount, 42);
        assert!((config.jackpot.probability - 0.01).abs() < f64::EPSILON);
        assert_eq!(config.negotiation.max_counter_rounds, 3);
    }

    #[test]
    fn rejects_bad_probability() {
        let result = SimConfig::from_json(r#"{ "job_trigger_probability": 1.5 }"#);
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { field: "job_trigger_probability", .. })
        ));
    }

    #[test]
    fn rejects_inverted_cooldown() {
        let mut config = SimConfig::default();
        config.cooldown.min_ms = 10;
        config.cooldown.max_ms = 5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_tick_interval() {
        let mut config = SimConfig::default();
        config.tick_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_forced_rejection_over_one() {
        let mut config = SimConfig::default();
        config.negotiation.angry_rejection_probability = 0.6;
        config.negotiation.polite_rejection_probability = 0.6;
        assert!(config.validate().is_err());
    }

    #[test]
    fn save_then_load() {
        let mut config = SimConfig::default();
        config.tick_interval_ms = 3_000;
        let file = NamedTempFile::new().expect("temp file");
        config.save(file.path()).expect("save");
        let loaded = SimConfig::load(file.path()).expect("load");
        assert_eq!(loaded, config);
    }

    #[test]
    fn load_reports_parse_errors() {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(b"{ not json").expect("write");
        assert!(matches!(SimConfig::load(file.path()), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let result = SimConfig::load("/nonexistent/clawinn/config.json");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
