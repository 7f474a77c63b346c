use serde::{Deserialize, Serialize};

use crate::{
    data::indicator::IndicatorConfig,
    error::{EnvError, GymResult, IoError},
};

pub const DEFAULT_INITIAL_CASH: f64 = 10_000.0;

/// Everything a simulation needs besides its feature series.
///
/// Each environment owns its own copy, so environments with different
/// parameters can run side by side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvConfig {
    /// Cash balance of the ledger at `reset`. Finite and non-negative.
    initial_cash: f64,

    /// Lookback windows and the ordered feature set exposed per instrument.
    indicators: IndicatorConfig,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            initial_cash: DEFAULT_INITIAL_CASH,
            indicators: IndicatorConfig::default(),
        }
    }
}

// ================================================================================================
// Builder
// ================================================================================================

impl EnvConfig {
    pub fn with_initial_cash(self, initial_cash: f64) -> Self {
        Self {
            initial_cash,
            ..self
        }
    }

    pub fn with_indicators(self, indicators: IndicatorConfig) -> Self {
        Self { indicators, ..self }
    }

    /// Shorthand for changing only the shared lookback window.
    pub fn with_window(self, window: u16) -> Self {
        let indicators = self.indicators.clone().with_window(window);
        Self { indicators, ..self }
    }
}

// ================================================================================================
// Accessors
// ================================================================================================

impl EnvConfig {
    pub fn initial_cash(&self) -> f64 {
        self.initial_cash
    }

    pub fn indicators(&self) -> &IndicatorConfig {
        &self.indicators
    }

    pub fn window(&self) -> u16 {
        self.indicators.window
    }
}

// ================================================================================================
// Validation, Identity & Persistence
// ================================================================================================

impl EnvConfig {
    pub fn validate(&self) -> GymResult<()> {
        validate_cash(self.initial_cash)?;
        self.indicators.validate()
    }

    /// Deterministic hash of this configuration, recorded on construction spans.
    pub fn hash(&self) -> GymResult<String> {
        let mut hasher = blake3::Hasher::new();
        let bytes = postcard::to_stdvec(self).map_err(EnvError::Encoding)?;
        hasher.update(&bytes);
        Ok(format!("{}", hasher.finalize()))
    }

    pub fn from_json(json: &str) -> GymResult<Self> {
        let cfg: Self = serde_json::from_str(json).map_err(IoError::Json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn to_json(&self) -> GymResult<String> {
        Ok(serde_json::to_string_pretty(self).map_err(IoError::Json)?)
    }
}

pub(crate) fn validate_cash(cash: f64) -> GymResult<()> {
    if cash.is_finite() && cash >= 0.0 {
        Ok(())
    } else {
        Err(EnvError::InvalidConfig(format!(
            "initial cash must be finite and non-negative, got {cash}"
        ))
        .into())
    }
}
