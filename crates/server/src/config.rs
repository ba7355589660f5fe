//! Engine configuration: constants, defaults, and environment overrides.

use std::path::PathBuf;
use std::time::Duration;

use arcade_sim::{FallingParams, RunnerParams, SimError, SnakeParams, Variant, VariantParams};

use crate::bonus::{BonusTable, ResourceKind};

// ============================================================================
// Defaults
// ============================================================================

/// Tick period in milliseconds.
pub const TICK_PERIOD_MS: u64 = 1000;

/// Prefix of every environment variable the engine reads.
pub const ENV_PREFIX: &str = "ARCADE_";

// ============================================================================
// Reward Bindings
// ============================================================================

/// Which resource a variant pays into and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardBinding {
    pub kind: ResourceKind,
    /// Resource units per point of score.
    pub conversion: u32,
    /// The variant stands in for a production cooldown that settlement releases.
    pub production_locked: bool,
}

/// Reward binding per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardBindings {
    pub falling: RewardBinding,
    pub snake: RewardBinding,
    pub runner: RewardBinding,
}

impl Default for RewardBindings {
    fn default() -> Self {
        Self {
            falling: RewardBinding {
                kind: ResourceKind::Coins,
                conversion: 1,
                production_locked: false,
            },
            snake: RewardBinding {
                kind: ResourceKind::Gems,
                conversion: 1,
                production_locked: false,
            },
            runner: RewardBinding {
                kind: ResourceKind::Fuel,
                conversion: 2,
                production_locked: true,
            },
        }
    }
}

impl RewardBindings {
    pub fn for_variant(&self, variant: Variant) -> RewardBinding {
        match variant {
            Variant::FallingCollector => self.falling,
            Variant::GridSnakeCollector => self.snake,
            Variant::ScrollRunner => self.runner,
        }
    }
}

// ============================================================================
// Engine Config
// ============================================================================

/// Configuration error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}: cannot parse `{value}`")]
    Unparsable { var: String, value: String },
    #[error("{var}: {source}")]
    Parameter { var: String, source: SimError },
}

/// Session engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Tick period; `0` disables the scheduler and ticks are driven manually.
    pub tick_period_ms: u64,
    /// Where finished session transcripts are written, if anywhere.
    pub transcript_dir: Option<PathBuf>,
    /// Seed for per-session spawn seeds; random when absent.
    pub seed: Option<u64>,
    pub falling: FallingParams,
    pub snake: SnakeParams,
    pub runner: RunnerParams,
    pub bindings: RewardBindings,
    pub bonus: BonusTable,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: TICK_PERIOD_MS,
            transcript_dir: None,
            seed: None,
            falling: FallingParams::default(),
            snake: SnakeParams::default(),
            runner: RunnerParams::default(),
            bindings: RewardBindings::default(),
            bonus: BonusTable::default(),
        }
    }
}

impl EngineConfig {
    pub fn tick_period(&self) -> Option<Duration> {
        (self.tick_period_ms > 0).then(|| Duration::from_millis(self.tick_period_ms))
    }

    pub fn params_for(&self, variant: Variant) -> VariantParams {
        match variant {
            Variant::FallingCollector => VariantParams::Falling(self.falling.clone()),
            Variant::GridSnakeCollector => VariantParams::Snake(self.snake.clone()),
            Variant::ScrollRunner => VariantParams::Runner(self.runner.clone()),
        }
    }

    /// Override one tuning parameter of a variant.
    pub fn set_param(&mut self, variant: Variant, key: &str, value: f64) -> Result<(), SimError> {
        let mut params = self.params_for(variant);
        params.set(key, value)?;
        match params {
            VariantParams::Falling(p) => self.falling = p,
            VariantParams::Snake(p) => self.snake = p,
            VariantParams::Runner(p) => self.runner = p,
        }
        Ok(())
    }

    /// Defaults overridden by `ARCADE_*` environment variables.
    ///
    /// - `ARCADE_TICK_PERIOD_MS`, `ARCADE_TRANSCRIPT_DIR`, `ARCADE_SEED`
    /// - `ARCADE_<VARIANT>_<PARAM>` for tuning, e.g. `ARCADE_FALLING_SCORE_CAP`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(period) = parse_var(&lookup, "ARCADE_TICK_PERIOD_MS")? {
            config.tick_period_ms = period;
        }
        if let Some(dir) = lookup("ARCADE_TRANSCRIPT_DIR")
            && !dir.trim().is_empty()
        {
            config.transcript_dir = Some(dir.into());
        }
        config.seed = parse_var(&lookup, "ARCADE_SEED")?;

        for variant in Variant::ALL {
            let prefix = variant_prefix(variant);
            for (key, _) in config.params_for(variant).tuning_parameters() {
                let var = format!("{ENV_PREFIX}{prefix}_{}", key.to_uppercase());
                let Some(value) = parse_var::<f64>(&lookup, &var)? else {
                    continue;
                };
                config
                    .set_param(variant, &key, value)
                    .map_err(|source| ConfigError::Parameter {
                        var: var.clone(),
                        source,
                    })?;
            }
            config
                .params_for(variant)
                .validate()
                .map_err(|source| ConfigError::Parameter {
                    var: format!("{ENV_PREFIX}{prefix}_*"),
                    source,
                })?;
        }

        Ok(config)
    }
}

fn variant_prefix(variant: Variant) -> &'static str {
    match variant {
        Variant::FallingCollector => "FALLING",
        Variant::GridSnakeCollector => "SNAKE",
        Variant::ScrollRunner => "RUNNER",
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &str,
) -> Result<Option<T>, ConfigError> {
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse().map(Some).map_err(|_| ConfigError::Unparsable {
        var: var.to_string(),
        value: raw.to_string(),
    })
}
