//! Configuration management
//!
//! Handles loading and parsing of JSON configuration files, with validation
//! applied before any monitor is constructed.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::Symbol;

/// Configuration errors reported at monitor construction
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: f64 },

    #[error("{name} must be a positive number of seconds, got {value}")]
    ZeroWindow { name: &'static str, value: u64 },

    #[error("history capacity must be positive")]
    ZeroCapacity,

    #[error("no symbols configured")]
    NoSymbols,

    #[error("at most {max} symbols supported, got {count}")]
    TooManySymbols { count: usize, max: usize },
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub trading: TradingConfig,
    #[serde(default)]
    pub conditions: ConditionConfig,
    #[serde(default)]
    pub backtest: BacktestConfig,
    #[serde(default)]
    pub pnl: PnlConfig,
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    /// Reject configurations that would produce meaningless conditions
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.trading.validate()?;
        self.conditions.validate()?;
        self.backtest.validate()?;
        self.pnl.validate()?;
        Ok(())
    }
}

/// Symbols and live-monitor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    pub symbols: Vec<String>,
    /// Upper bound on monitored symbols; a single operator watches a handful
    #[serde(default = "default_max_symbols")]
    pub max_symbols: usize,
    /// Retained price/volume samples per symbol
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    /// Minimum seconds between two live alerts for the same symbol
    #[serde(default = "default_live_cooldown")]
    pub cooldown_secs: u64,
}

fn default_max_symbols() -> usize {
    5
}

fn default_history_capacity() -> usize {
    1000
}

fn default_live_cooldown() -> u64 {
    5
}

impl Default for TradingConfig {
    fn default() -> Self {
        TradingConfig {
            symbols: vec!["AAPL".to_string()],
            max_symbols: default_max_symbols(),
            history_capacity: default_history_capacity(),
            cooldown_secs: default_live_cooldown(),
        }
    }
}

impl TradingConfig {
    pub fn symbols(&self) -> Vec<Symbol> {
        self.symbols.iter().map(Symbol::new).collect()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.symbols.is_empty() {
            return Err(ConfigError::NoSymbols);
        }
        if self.symbols.len() > self.max_symbols {
            return Err(ConfigError::TooManySymbols {
                count: self.symbols.len(),
                max: self.max_symbols,
            });
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.cooldown_secs == 0 {
            return Err(ConfigError::ZeroWindow {
                name: "cooldown_secs",
                value: self.cooldown_secs,
            });
        }
        Ok(())
    }
}

/// Alert condition thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionConfig {
    /// Price rise vs the trailing 10s low, in percent
    pub price_surge_pct: f64,
    /// Current 10s bucket vs mean of the prior 20 buckets
    pub volume_spike_multiplier: f64,
    /// Sustained-volume multiplier for the current and previous buckets
    pub volume_confirmation_multiplier: f64,
    /// First momentum window threshold, in percent
    pub momentum_t1_pct: f64,
    /// Second (stronger) momentum window threshold, in percent
    pub momentum_t2_pct: f64,
    /// Momentum sub-window length in seconds
    pub momentum_window_secs: u64,
    /// Maximum bid/ask spread as a percentage of price; None disables the gate
    #[serde(default)]
    pub max_spread_pct: Option<f64>,
}

impl Default for ConditionConfig {
    fn default() -> Self {
        ConditionConfig {
            price_surge_pct: 2.0,
            volume_spike_multiplier: 5.0,
            volume_confirmation_multiplier: 2.0,
            momentum_t1_pct: 1.0,
            momentum_t2_pct: 1.5,
            momentum_window_secs: 5,
            max_spread_pct: Some(0.5),
        }
    }
}

impl ConditionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let thresholds = [
            ("price_surge_pct", self.price_surge_pct),
            ("volume_spike_multiplier", self.volume_spike_multiplier),
            (
                "volume_confirmation_multiplier",
                self.volume_confirmation_multiplier,
            ),
            ("momentum_t1_pct", self.momentum_t1_pct),
            ("momentum_t2_pct", self.momentum_t2_pct),
        ];
        for (name, value) in thresholds {
            if value <= 0.0 {
                return Err(ConfigError::NonPositive { name, value });
            }
        }
        if self.momentum_window_secs == 0 {
            return Err(ConfigError::ZeroWindow {
                name: "momentum_window_secs",
                value: self.momentum_window_secs,
            });
        }
        if let Some(max_spread) = self.max_spread_pct {
            if max_spread <= 0.0 {
                return Err(ConfigError::NonPositive {
                    name: "max_spread_pct",
                    value: max_spread,
                });
            }
        }
        Ok(())
    }
}

/// Backtest replay settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub data_dir: String,
    /// Minimum seconds between two backtest alerts for the same symbol
    #[serde(default = "default_backtest_cooldown")]
    pub cooldown_secs: u64,
}

fn default_backtest_cooldown() -> u64 {
    60
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            data_dir: "data".to_string(),
            cooldown_secs: default_backtest_cooldown(),
        }
    }
}

impl BacktestConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.cooldown_secs == 0 {
            return Err(ConfigError::ZeroWindow {
                name: "backtest cooldown_secs",
                value: self.cooldown_secs,
            });
        }
        Ok(())
    }
}

/// P&L simulation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PnlConfig {
    /// Starting account balance per symbol, per scenario
    pub initial_capital: f64,
    /// Fixed notional committed to each alert
    pub investment_per_trade: f64,
    /// Per-share commission rate, charged per leg
    pub commission_per_share: f64,
    /// Commission floor per leg
    pub min_commission: f64,
    /// (take-profit %, stop-loss %) scenarios, each run independently
    pub scenarios: Vec<(f64, f64)>,
}

impl Default for PnlConfig {
    fn default() -> Self {
        PnlConfig {
            initial_capital: 10_000.0,
            investment_per_trade: 1_000.0,
            commission_per_share: 0.005,
            min_commission: 1.0,
            scenarios: vec![
                (2.0, 1.0),
                (4.0, 2.0),
                (10.0, 5.0),
                (20.0, 10.0),
                (1.0, 10.0),
            ],
        }
    }
}

impl PnlConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let values = [
            ("initial_capital", self.initial_capital),
            ("investment_per_trade", self.investment_per_trade),
            ("min_commission", self.min_commission),
        ];
        for (name, value) in values {
            if value <= 0.0 {
                return Err(ConfigError::NonPositive { name, value });
            }
        }
        if self.commission_per_share < 0.0 {
            return Err(ConfigError::NonPositive {
                name: "commission_per_share",
                value: self.commission_per_share,
            });
        }
        for &(tp, sl) in &self.scenarios {
            if tp <= 0.0 {
                return Err(ConfigError::NonPositive {
                    name: "take_profit_pct",
                    value: tp,
                });
            }
            if sl <= 0.0 {
                return Err(ConfigError::NonPositive {
                    name: "stop_loss_pct",
                    value: sl,
                });
            }
        }
        Ok(())
    }
}
