//! Serializable simulator configuration.
//!
//! A config file looks like:
//!
//! ```toml
//! [account]
//! cash = 10000.0
//! asset = 0.0
//!
//! [margin]
//! initial_margin_rate = 0.1
//! maintenance_margin_rate = 0.05
//!
//! [fees]
//! maker_fee_rate = 0.0002
//! taker_fee_rate = 0.001
//!
//! [engine]
//! settlement = "margin"
//! stop_fee_basis = "trigger"
//! auto_liquidate = false
//! lookahead_window = 5
//! ```
//!
//! Every section and field is optional and falls back to `SimConfig::default()`.

use crate::ledger::{FeeSchedule, MarginRates, SettlementMode};
use crate::order_book::StopFeeBasis;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from loading or validating a config.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Starting balances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    pub cash: f64,
    pub asset: f64,
    /// Net position carried into the run.
    pub position: f64,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            cash: 10_000.0,
            asset: 0.0,
            position: 0.0,
        }
    }
}

/// Controller behavior switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub settlement: SettlementMode,
    pub stop_fee_basis: StopFeeBasis,
    /// Liquidate automatically when the maintenance check fails.
    pub auto_liquidate: bool,
    /// Default number of bars returned by `Simulator::lookahead`.
    pub lookahead_window: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            settlement: SettlementMode::Margin,
            stop_fee_basis: StopFeeBasis::Trigger,
            auto_liquidate: false,
            lookahead_window: 5,
        }
    }
}

/// Complete configuration for one simulator instance.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub account: AccountConfig,
    pub margin: MarginRates,
    pub fees: FeeSchedule,
    pub engine: EngineSettings,
}

impl SimConfig {
    /// Load and validate a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Rates must be finite and non-negative, balances finite and non-negative.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_negative = [
            ("account.cash", self.account.cash),
            ("account.asset", self.account.asset),
            ("margin.initial_margin_rate", self.margin.initial_margin_rate),
            ("margin.maintenance_margin_rate", self.margin.maintenance_margin_rate),
            ("fees.maker_fee_rate", self.fees.maker_fee_rate),
            ("fees.taker_fee_rate", self.fees.taker_fee_rate),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be finite and >= 0, got {value}"
                )));
            }
        }
        if !self.account.position.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "account.position must be finite, got {}",
                self.account.position
            )));
        }
        Ok(())
    }

    /// Deterministic BLAKE3 fingerprint of every parameter that affects a run.
    pub fn fingerprint(&self) -> String {
        use serde_json::json;

        let canonical = json!({
            "account": {
                "asset": self.account.asset,
                "cash": self.account.cash,
                "position": self.account.position,
            },
            "engine": {
                "auto_liquidate": self.engine.auto_liquidate,
                "lookahead_window": self.engine.lookahead_window,
                "settlement": format!("{:?}", self.engine.settlement),
                "stop_fee_basis": format!("{:?}", self.engine.stop_fee_basis),
            },
            "fees": {
                "maker_fee_rate": self.fees.maker_fee_rate,
                "taker_fee_rate": self.fees.taker_fee_rate,
            },
            "margin": {
                "initial_margin_rate": self.margin.initial_margin_rate,
                "maintenance_margin_rate": self.margin.maintenance_margin_rate,
            },
        });

        blake3::hash(canonical.to_string().as_bytes())
            .to_hex()
            .to_string()
    }
}
