//! Live monitoring engine
//!
//! `SymbolMonitor` owns one symbol's rolling state (cumulative VWAP, sample
//! history, cooldown tracking); `AlertScanner` coordinates a handful of them
//! behind per-symbol locks and drives the live feed loop.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::buckets;
use crate::conditions::{ConditionSet, MarketSnapshot};
use crate::config::{Config, ConfigError};
use crate::feed::{AlertSink, MarketFeed};
use crate::history::RollingHistory;
use crate::types::{Alert, Candle, Symbol, TickUpdate};
use crate::vwap::VwapAccumulator;

/// Channel depth for live tick delivery
const TICK_CHANNEL_CAPACITY: usize = 1024;

/// How often the live loop logs a status summary
const STATUS_INTERVAL_SECS: u64 = 5;

#[derive(Debug, Error)]
pub enum ScannerError {
    #[error("symbol {0} is not monitored")]
    UnmonitoredSymbol(Symbol),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MonitorState {
    AwaitingData,
    Live,
}

/// Read-only summary of one monitor for display/observer polling
#[derive(Debug, Clone)]
pub struct MonitorStatus {
    pub symbol: Symbol,
    pub price: Option<f64>,
    pub cumulative_volume: Option<f64>,
    pub vwap: Option<f64>,
    pub spike_ratio: Option<f64>,
    pub last_update: Option<DateTime<Utc>>,
    pub samples: usize,
}

/// Stateful per-symbol engine: ingests samples, maintains VWAP and history,
/// evaluates the condition set, and deduplicates alerts via cooldown.
pub struct SymbolMonitor {
    symbol: Symbol,
    condition_set: ConditionSet,
    cooldown: Duration,
    vwap: VwapAccumulator,
    history: RollingHistory,
    state: MonitorState,
    last_price: Option<f64>,
    /// Session cumulative volume as last reported by the feed
    last_cumulative_volume: Option<f64>,
    vendor_vwap: Option<f64>,
    bid: Option<f64>,
    ask: Option<f64>,
    last_update: Option<DateTime<Utc>>,
    last_alert_time: Option<DateTime<Utc>>,
}

impl SymbolMonitor {
    pub fn new(
        symbol: Symbol,
        condition_set: ConditionSet,
        cooldown: Duration,
        history_capacity: usize,
    ) -> Self {
        SymbolMonitor {
            symbol,
            condition_set,
            cooldown,
            vwap: VwapAccumulator::new(),
            history: RollingHistory::new(history_capacity),
            state: MonitorState::AwaitingData,
            last_price: None,
            last_cumulative_volume: None,
            vendor_vwap: None,
            bid: None,
            ask: None,
            last_update: None,
            last_alert_time: None,
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// Fold one live tick into VWAP and history.
    ///
    /// The feed reports the session's cumulative volume; the increment for
    /// this tick is the delta from the previous report. A decrease means the
    /// feed rolled to a new session baseline, so the reported total is taken
    /// as a fresh increment rather than producing a negative one.
    pub fn ingest(&mut self, tick: &TickUpdate) {
        let increment = match self.last_cumulative_volume {
            None => tick.cumulative_volume,
            Some(prev) if tick.cumulative_volume < prev => {
                warn!(
                    symbol = %self.symbol,
                    previous = prev,
                    reported = tick.cumulative_volume,
                    "cumulative volume decreased; resyncing session baseline"
                );
                tick.cumulative_volume
            }
            Some(prev) => tick.cumulative_volume - prev,
        };

        self.vwap.ingest(tick.price, increment);
        self.history
            .push(tick.timestamp, tick.price, increment.max(0.0));

        self.last_price = Some(tick.price);
        self.last_cumulative_volume = Some(tick.cumulative_volume);
        self.vendor_vwap = tick.vendor_vwap.or(self.vendor_vwap);
        self.bid = tick.bid.or(self.bid);
        self.ask = tick.ask.or(self.ask);
        self.last_update = Some(tick.timestamp);
        self.state = MonitorState::Live;
    }

    /// Preload a session's bars so live VWAP starts from the day's real
    /// baseline instead of from the first tick. The final cumulative volume
    /// becomes the resync baseline for subsequent feed reports.
    pub fn seed_history(&mut self, bars: &[Candle]) {
        for bar in bars {
            self.vwap.ingest(bar.close, bar.volume);
            self.history.push(bar.timestamp, bar.close, bar.volume);
            self.last_price = Some(bar.close);
            self.last_update = Some(bar.timestamp);
        }
        if self.vwap.cumulative_volume() > 0.0 {
            self.last_cumulative_volume = Some(self.vwap.cumulative_volume());
        }
        if !bars.is_empty() {
            self.state = MonitorState::Live;
        }
    }

    /// Evaluate the condition set against the current state. Emits an alert
    /// only when the composite triggers and the cooldown has elapsed; a
    /// continuously-true condition produces exactly one alert per cooldown
    /// window.
    pub fn evaluate(&mut self, now: DateTime<Utc>) -> Option<Alert> {
        if self.state == MonitorState::AwaitingData {
            return None;
        }
        let price = self.last_price?;

        let snapshot = MarketSnapshot {
            symbol: &self.symbol,
            timestamp: now,
            price,
            cumulative_volume: self.last_cumulative_volume.unwrap_or(0.0),
            vwap: self.vwap.vwap().or(self.vendor_vwap),
            bid: self.bid,
            ask: self.ask,
            history: &self.history,
        };

        let reasons = self.condition_set.evaluate(&snapshot)?;

        if let Some(last) = self.last_alert_time {
            if now - last < self.cooldown {
                debug!(symbol = %self.symbol, "alert suppressed by cooldown");
                return None;
            }
        }
        self.last_alert_time = Some(now);

        Some(Alert {
            symbol: self.symbol.clone(),
            timestamp: now,
            price,
            volume: self.last_cumulative_volume.unwrap_or(0.0),
            vwap: self.vwap.vwap().or(self.vendor_vwap),
            reasons,
        })
    }

    /// Snapshot of current state for observers
    pub fn status(&self) -> MonitorStatus {
        let partitioned = buckets::partition(&self.history);
        MonitorStatus {
            symbol: self.symbol.clone(),
            price: self.last_price,
            cumulative_volume: self.last_cumulative_volume,
            vwap: self.vwap.vwap().or(self.vendor_vwap),
            spike_ratio: buckets::spike_ratio(&partitioned),
            last_update: self.last_update,
            samples: self.history.len(),
        }
    }
}

/// Multi-symbol live scanner.
///
/// Each monitor sits behind its own mutex: ingest and evaluate for a symbol
/// are mutually exclusive, while different symbols proceed independently.
/// There is no cross-symbol shared mutable state.
pub struct AlertScanner {
    symbols: Vec<Symbol>,
    monitors: HashMap<Symbol, Arc<Mutex<SymbolMonitor>>>,
}

impl AlertScanner {
    /// Build monitors for the configured symbols with the default live
    /// condition set. Configuration errors are fatal to construction only.
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;

        let symbols = config.trading.symbols();
        let cooldown = Duration::seconds(config.trading.cooldown_secs as i64);
        let mut monitors = HashMap::with_capacity(symbols.len());

        for symbol in &symbols {
            let monitor = SymbolMonitor::new(
                symbol.clone(),
                ConditionSet::live_default(&config.conditions),
                cooldown,
                config.trading.history_capacity,
            );
            monitors.insert(symbol.clone(), Arc::new(Mutex::new(monitor)));
        }

        Ok(AlertScanner { symbols, monitors })
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    fn monitor(&self, symbol: &Symbol) -> Result<&Arc<Mutex<SymbolMonitor>>, ScannerError> {
        self.monitors
            .get(symbol)
            .ok_or_else(|| ScannerError::UnmonitoredSymbol(symbol.clone()))
    }

    /// Ingest a tick and evaluate conditions under the symbol's lock.
    /// Unknown symbols are rejected without touching any other monitor.
    pub fn update(&self, tick: &TickUpdate) -> Result<Option<Alert>, ScannerError> {
        let monitor = self.monitor(&tick.symbol)?;
        let mut guard = monitor.lock().unwrap_or_else(PoisonError::into_inner);
        guard.ingest(tick);
        Ok(guard.evaluate(tick.timestamp))
    }

    /// Seed one symbol's baseline from a session's historical bars
    pub fn seed_history(&self, symbol: &Symbol, bars: &[Candle]) -> Result<(), ScannerError> {
        let monitor = self.monitor(symbol)?;
        let mut guard = monitor.lock().unwrap_or_else(PoisonError::into_inner);
        guard.seed_history(bars);
        info!(symbol = %symbol, bars = bars.len(), "seeded historical baseline");
        Ok(())
    }

    /// Status summaries in configured symbol order
    pub fn statuses(&self) -> Vec<MonitorStatus> {
        self.symbols
            .iter()
            .filter_map(|s| self.monitors.get(s))
            .map(|m| {
                m.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .status()
            })
            .collect()
    }

    /// Drive the scanner from a live feed until the stop signal flips.
    ///
    /// Ticks arrive on an mpsc channel handed to the feed at subscription.
    /// Alerts go to the sink; a sink failure is logged and monitoring
    /// continues. On exit every feed subscription is released.
    pub async fn run_live<F, S>(
        &self,
        feed: &mut F,
        sink: &mut S,
        mut stop: watch::Receiver<bool>,
    ) -> anyhow::Result<()>
    where
        F: MarketFeed,
        S: AlertSink,
    {
        let (tx, mut rx) = mpsc::channel::<TickUpdate>(TICK_CHANNEL_CAPACITY);
        feed.subscribe(&self.symbols, tx)?;
        info!(symbols = self.symbols.len(), "live monitoring started");

        let mut status_timer = tokio::time::interval(std::time::Duration::from_secs(
            STATUS_INTERVAL_SECS,
        ));
        status_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        info!("stop signal received");
                        break;
                    }
                }
                maybe_tick = rx.recv() => {
                    match maybe_tick {
                        Some(tick) => match self.update(&tick) {
                            Ok(Some(alert)) => {
                                info!(alert = %alert, "alert triggered");
                                if let Err(err) = sink.publish(&alert) {
                                    warn!(error = %err, "alert sink failed");
                                }
                            }
                            Ok(None) => {}
                            Err(err) => warn!(error = %err, "dropped tick"),
                        },
                        None => {
                            info!("feed channel closed");
                            break;
                        }
                    }
                }
                _ = status_timer.tick() => {
                    for status in self.statuses() {
                        debug!(
                            symbol = %status.symbol,
                            price = ?status.price,
                            vwap = ?status.vwap,
                            spike = ?status.spike_ratio,
                            samples = status.samples,
                            "monitor status"
                        );
                    }
                }
            }
        }

        feed.unsubscribe_all()?;
        info!("live monitoring stopped");
        Ok(())
    }
}
