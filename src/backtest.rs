//! Backtest replay
//!
//! Replays one session of historical candles per symbol through the same
//! monitor/condition machinery as the live path. Cumulative VWAP is always
//! recomputed from (close, volume) in chronological order; a vendor-supplied
//! per-bar VWAP is consulted only while no candle volume has been seen.
//! Nothing here reads the wall clock: identical candle input produces an
//! identical alert sequence on every run.

use chrono::Duration;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::conditions::ConditionSet;
use crate::config::{Config, ConfigError};
use crate::monitor::SymbolMonitor;
use crate::types::{Alert, Candle, Symbol, TickUpdate};

/// Deterministic per-symbol candle replay
pub struct BacktestRunner {
    config: Config,
}

impl BacktestRunner {
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(BacktestRunner { config })
    }

    /// Replay every symbol's candles and collect the alerts each produces
    pub fn run(&self, data: &HashMap<Symbol, Vec<Candle>>) -> HashMap<Symbol, Vec<Alert>> {
        let mut alerts = HashMap::with_capacity(data.len());
        for (symbol, candles) in data {
            let symbol_alerts = self.replay_symbol(symbol, candles);
            info!(
                symbol = %symbol,
                candles = candles.len(),
                alerts = symbol_alerts.len(),
                "replay complete"
            );
            alerts.insert(symbol.clone(), symbol_alerts);
        }
        alerts
    }

    /// Drive one symbol's candles through a fresh monitor in chronological
    /// order. Each candle contributes its close and volume as one sample;
    /// the running session volume feeds the same cumulative-volume ingest
    /// path the live feed uses.
    fn replay_symbol(&self, symbol: &Symbol, candles: &[Candle]) -> Vec<Alert> {
        let mut ordered: Vec<&Candle> = candles.iter().collect();
        ordered.sort_by_key(|c| c.timestamp);

        let mut monitor = SymbolMonitor::new(
            symbol.clone(),
            ConditionSet::backtest_default(&self.config.conditions),
            Duration::seconds(self.config.backtest.cooldown_secs as i64),
            self.config.trading.history_capacity,
        );

        let mut alerts = Vec::new();
        let mut session_volume = 0.0;

        for candle in ordered {
            session_volume += candle.volume;
            let tick = TickUpdate {
                symbol: symbol.clone(),
                timestamp: candle.timestamp,
                price: candle.close,
                cumulative_volume: session_volume,
                vendor_vwap: candle.vendor_vwap,
                bid: None,
                ask: None,
            };
            monitor.ingest(&tick);
            if let Some(alert) = monitor.evaluate(candle.timestamp) {
                debug!(alert = %alert, "backtest alert");
                alerts.push(alert);
            }
        }

        alerts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn bar(secs: i64, close: f64, volume: f64) -> Candle {
        Candle {
            timestamp: ts(secs),
            open: close,
            high: close + 0.1,
            low: close - 0.1,
            close,
            volume,
            vendor_vwap: None,
        }
    }

    /// 5s bars: a long quiet baseline, then two heavy buckets with the
    /// price ripping off its 10s low on the final bar. Satisfies the VWAP
    /// gate, price surge, volume spike, and sustained confirmation at the
    /// last bar and nowhere earlier.
    fn surging_session() -> Vec<Candle> {
        let mut candles = Vec::new();
        // 66 samples = 22 full baseline buckets of 1500
        for i in 0..66 {
            candles.push(bar(i * 5, 100.0, 500.0));
        }
        // Previous bucket: elevated volume, price barely moving
        candles.push(bar(330, 100.0, 2_000.0));
        candles.push(bar(335, 100.2, 2_000.0));
        candles.push(bar(340, 100.5, 2_000.0));
        // Current bucket: heavy volume, +2.97% off the 10s low at the end
        candles.push(bar(345, 101.0, 5_000.0));
        candles.push(bar(350, 102.0, 5_000.0));
        candles.push(bar(355, 104.0, 5_000.0));
        candles
    }

    #[test]
    fn surge_with_sustained_volume_alerts_once() {
        let config = Config::default();
        let runner = BacktestRunner::new(config).unwrap();
        let mut data = HashMap::new();
        data.insert(Symbol::new("AAPL"), surging_session());

        let alerts = runner.run(&data);
        let alerts = &alerts[&Symbol::new("AAPL")];
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].timestamp, ts(355));
        assert_eq!(alerts[0].price, 104.0);
        // Gate reason first, members in insertion order
        assert!(alerts[0].reasons[0].contains("VWAP"));
    }

    #[test]
    fn replay_is_deterministic() {
        let config = Config::default();
        let runner = BacktestRunner::new(config).unwrap();
        let mut data = HashMap::new();
        data.insert(Symbol::new("AAPL"), surging_session());

        let first = runner.run(&data);
        let second = runner.run(&data);

        let a = &first[&Symbol::new("AAPL")];
        let b = &second[&Symbol::new("AAPL")];
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.timestamp, y.timestamp);
            assert_eq!(x.price, y.price);
            assert_eq!(x.reasons, y.reasons);
        }
    }

    #[test]
    fn quiet_session_produces_no_alerts() {
        let config = Config::default();
        let runner = BacktestRunner::new(config).unwrap();
        let mut data = HashMap::new();
        let candles: Vec<Candle> = (0..40).map(|i| bar(i * 11, 100.0, 1_000.0)).collect();
        data.insert(Symbol::new("AAPL"), candles);

        let alerts = runner.run(&data);
        assert!(alerts[&Symbol::new("AAPL")].is_empty());
    }

    #[test]
    fn unsorted_input_replays_in_chronological_order() {
        let config = Config::default();
        let runner = BacktestRunner::new(config.clone()).unwrap();

        let sorted = surging_session();
        let mut shuffled = sorted.clone();
        shuffled.reverse();

        let mut data_sorted = HashMap::new();
        data_sorted.insert(Symbol::new("AAPL"), sorted);
        let mut data_shuffled = HashMap::new();
        data_shuffled.insert(Symbol::new("AAPL"), shuffled);

        let a = runner.run(&data_sorted);
        let b = runner.run(&data_shuffled);
        assert_eq!(
            a[&Symbol::new("AAPL")].len(),
            b[&Symbol::new("AAPL")].len()
        );
    }
}
