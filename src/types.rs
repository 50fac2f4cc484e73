//! Core data types used across the scanner

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for candle data
#[derive(Debug, Error)]
pub enum CandleValidationError {
    #[error("high ({high}) must be >= low ({low})")]
    HighLessThanLow { high: f64, low: f64 },

    #[error("volume ({0}) must be >= 0")]
    NegativeVolume(f64),

    #[error("open ({open}) must be between low ({low}) and high ({high})")]
    OpenOutOfRange { open: f64, low: f64, high: f64 },

    #[error("close ({close}) must be between low ({low}) and high ({high})")]
    CloseOutOfRange { close: f64, low: f64, high: f64 },

    #[error("prices must be positive: open={open}, high={high}, low={low}, close={close}")]
    NonPositivePrice {
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },
}

/// OHLCV candlestick for one session, with the vendor's per-bar VWAP when the
/// data source provides one. The backtester recomputes cumulative VWAP itself
/// and only falls back to `vendor_vwap` when no candle volume is available.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(default)]
    pub vendor_vwap: Option<f64>,
}

impl Candle {
    /// Create a new candle with validation
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        vendor_vwap: Option<f64>,
    ) -> Result<Self, CandleValidationError> {
        let candle = Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            vendor_vwap,
        };
        candle.validate()?;
        Ok(candle)
    }

    /// Validate the candle data
    pub fn validate(&self) -> Result<(), CandleValidationError> {
        if self.open <= 0.0 || self.high <= 0.0 || self.low <= 0.0 || self.close <= 0.0 {
            return Err(CandleValidationError::NonPositivePrice {
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }

        if self.high < self.low {
            return Err(CandleValidationError::HighLessThanLow {
                high: self.high,
                low: self.low,
            });
        }

        if self.volume < 0.0 {
            return Err(CandleValidationError::NegativeVolume(self.volume));
        }

        if self.open < self.low || self.open > self.high {
            return Err(CandleValidationError::OpenOutOfRange {
                open: self.open,
                low: self.low,
                high: self.high,
            });
        }

        if self.close < self.low || self.close > self.high {
            return Err(CandleValidationError::CloseOutOfRange {
                close: self.close,
                low: self.low,
                high: self.high,
            });
        }

        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Ticker symbol using Arc<str> for cheap cloning
///
/// Symbols are cloned on every tick, alert, and scored trade. Arc<str>
/// keeps those clones at O(1) instead of re-allocating a String.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(#[serde(with = "arc_str_serde")] std::sync::Arc<str>);

/// Custom serde for Arc<str>
mod arc_str_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::sync::Arc;

    pub fn serialize<S>(value: &Arc<str>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Arc<str>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Arc::from(s.as_str()))
    }
}

impl Symbol {
    pub fn new(s: impl AsRef<str>) -> Self {
        Symbol(std::sync::Arc::from(s.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single live-feed delivery for one symbol.
///
/// `cumulative_volume` is the session's running total as reported by the
/// feed, not an increment. A decrease relative to the previous delivery is
/// treated as a session rollover and resyncs the baseline.
#[derive(Debug, Clone)]
pub struct TickUpdate {
    pub symbol: Symbol,
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub cumulative_volume: f64,
    pub vendor_vwap: Option<f64>,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
}

/// A triggered alert. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub symbol: Symbol,
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub volume: f64,
    pub vwap: Option<f64>,
    pub reasons: Vec<String>,
}

impl Alert {
    /// One-line summary of why the alert fired
    pub fn reason_summary(&self) -> String {
        self.reasons.join(" | ")
    }
}

impl std::fmt::Display for Alert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} price={:.2} volume={:.0}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.symbol,
            self.price,
            self.volume,
        )?;
        if let Some(vwap) = self.vwap {
            write!(f, " vwap={:.2}", vwap)?;
        }
        write!(f, " | {}", self.reason_summary())
    }
}

/// Outcome of a simulated take-profit / stop-loss bracket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeOutcome {
    Win,
    Loss,
    /// Neither threshold was touched before the data ended
    Open,
}

impl std::fmt::Display for TradeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeOutcome::Win => write!(f, "WIN"),
            TradeOutcome::Loss => write!(f, "LOSS"),
            TradeOutcome::Open => write!(f, "OPEN"),
        }
    }
}

/// One alert scored against subsequent candles by the P&L simulator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredTrade {
    pub symbol: Symbol,
    pub alert_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub outcome: TradeOutcome,
    pub exit_time: Option<DateTime<Utc>>,
    pub shares: f64,
    pub gross_pl: f64,
    pub commission: f64,
    pub net_pl: f64,
}
