//! External collaborator seams
//!
//! The broker/data-provider layer is out of scope; this module defines the
//! interfaces the core consumes (`MarketFeed`, `AlertSink`), CSV candle
//! loading for historical sessions, and a replay feed that streams a candle
//! file as live ticks so the live loop runs without a broker connection.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::types::{Alert, Candle, Symbol, TickUpdate};

/// A live market-data source. Implementations deliver ticks on the channel
/// handed to `subscribe` from their own tasks/threads; `unsubscribe_all`
/// must stop all delivery and is called when the live loop exits.
pub trait MarketFeed {
    fn subscribe(&mut self, symbols: &[Symbol], tx: mpsc::Sender<TickUpdate>) -> Result<()>;
    fn unsubscribe_all(&mut self) -> Result<()>;
}

/// Downstream consumer of triggered alerts (console, export, notification).
/// A failing sink never halts monitoring.
pub trait AlertSink {
    fn publish(&mut self, alert: &Alert) -> Result<()>;
}

/// Sink that writes alerts to stdout
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl AlertSink for ConsoleSink {
    fn publish(&mut self, alert: &Alert) -> Result<()> {
        println!("ALERT {alert}");
        Ok(())
    }
}

// ============================================================================
// CSV candle loading
// ============================================================================

/// Load one session's candles from a CSV file with columns
/// `timestamp,open,high,low,close,volume[,vwap]`.
pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<Candle>> {
    let mut reader = csv::Reader::from_path(path.as_ref()).context("Failed to open CSV file")?;

    let mut candles = Vec::new();

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;

        let dt_str = record.get(0).context("Missing timestamp column")?;
        let timestamp = dt_str
            .parse::<DateTime<Utc>>()
            .or_else(|_| {
                // Accept naive timestamps and assume UTC
                chrono::NaiveDateTime::parse_from_str(dt_str, "%Y-%m-%d %H:%M:%S")
                    .map(|ndt| DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc))
            })
            .with_context(|| format!("Failed to parse timestamp: {dt_str}"))?;

        let field = |idx: usize, name: &'static str| -> Result<f64> {
            record
                .get(idx)
                .with_context(|| format!("Missing {name} column"))?
                .parse::<f64>()
                .with_context(|| format!("Failed to parse {name} in row {}", row_idx + 1))
        };

        let open = field(1, "open")?;
        let high = field(2, "high")?;
        let low = field(3, "low")?;
        let close = field(4, "close")?;
        let volume = field(5, "volume")?;
        let vendor_vwap = match record.get(6) {
            Some(s) if !s.is_empty() => Some(
                s.parse::<f64>()
                    .with_context(|| format!("Failed to parse vwap in row {}", row_idx + 1))?,
            ),
            _ => None,
        };

        let candle = Candle::new(timestamp, open, high, low, close, volume, vendor_vwap)
            .with_context(|| format!("Invalid candle in row {}", row_idx + 1))?;
        candles.push(candle);
    }

    Ok(candles)
}

/// Load candles for multiple symbols from `{SYMBOL}_{date}.csv` files in a
/// directory. Missing files are logged and skipped; at least one symbol
/// must load.
pub fn load_session(
    data_dir: impl AsRef<Path>,
    symbols: &[Symbol],
    date: NaiveDate,
) -> Result<HashMap<Symbol, Vec<Candle>>> {
    let mut data = HashMap::new();

    for symbol in symbols {
        let filename = format!("{}_{}.csv", symbol.as_str(), date.format("%Y-%m-%d"));
        let path = data_dir.as_ref().join(&filename);

        if !path.exists() {
            warn!("Data file not found: {}", path.display());
            continue;
        }

        let candles =
            load_csv(&path).with_context(|| format!("Failed to load data for {symbol}"))?;

        info!("Loaded {} candles for {}", candles.len(), symbol);
        data.insert(symbol.clone(), candles);
    }

    if data.is_empty() {
        anyhow::bail!("No data loaded for any symbol");
    }

    Ok(data)
}

// ============================================================================
// Replay feed
// ============================================================================

/// Streams recorded candles as live ticks: each bar becomes one tick at its
/// close price, with the session's cumulative volume accumulated along the
/// way. Useful for exercising the live loop without a broker connection.
pub struct CsvReplayFeed {
    data: HashMap<Symbol, Vec<Candle>>,
    tick_interval: std::time::Duration,
    tasks: Vec<JoinHandle<()>>,
}

impl CsvReplayFeed {
    pub fn new(data: HashMap<Symbol, Vec<Candle>>, tick_interval: std::time::Duration) -> Self {
        CsvReplayFeed {
            data,
            tick_interval,
            tasks: Vec::new(),
        }
    }
}

impl MarketFeed for CsvReplayFeed {
    fn subscribe(&mut self, symbols: &[Symbol], tx: mpsc::Sender<TickUpdate>) -> Result<()> {
        for symbol in symbols {
            let Some(candles) = self.data.get(symbol) else {
                warn!(symbol = %symbol, "no replay data for symbol");
                continue;
            };
            let candles = candles.clone();
            let symbol = symbol.clone();
            let tx = tx.clone();
            let interval = self.tick_interval;

            self.tasks.push(tokio::spawn(async move {
                let mut cumulative_volume = 0.0;
                for bar in candles {
                    cumulative_volume += bar.volume;
                    let tick = TickUpdate {
                        symbol: symbol.clone(),
                        timestamp: bar.timestamp,
                        price: bar.close,
                        cumulative_volume,
                        vendor_vwap: bar.vendor_vwap,
                        bid: None,
                        ask: None,
                    };
                    if tx.send(tick).await.is_err() {
                        // Receiver gone; scanner has shut down
                        return;
                    }
                    tokio::time::sleep(interval).await;
                }
                info!(symbol = %symbol, "replay finished");
            }));
        }
        Ok(())
    }

    fn unsubscribe_all(&mut self) -> Result<()> {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct TempCsv(PathBuf);

    impl TempCsv {
        fn write(name: &str, contents: &str) -> Self {
            let path = std::env::temp_dir().join(format!("momentum-scanner-test-{name}.csv"));
            std::fs::write(&path, contents).unwrap();
            TempCsv(path)
        }
    }

    impl Drop for TempCsv {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    #[test]
    fn csv_parses_candles_with_optional_vwap() {
        let file = TempCsv::write(
            "parse-ok",
            "timestamp,open,high,low,close,volume,vwap\n\
             2025-03-10 09:30:00,10.0,10.5,9.8,10.2,1500,10.1\n\
             2025-03-10 09:30:10,10.2,10.6,10.1,10.4,900,\n",
        );
        let candles = load_csv(&file.0).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].vendor_vwap, Some(10.1));
        assert_eq!(candles[1].vendor_vwap, None);
        assert_eq!(candles[1].volume, 900.0);
    }

    #[test]
    fn csv_reports_row_context_on_bad_data() {
        let file = TempCsv::write(
            "parse-bad",
            "timestamp,open,high,low,close,volume\n\
             2025-03-10 09:30:00,10.0,not-a-number,9.8,10.2,1500\n",
        );
        let err = load_csv(&file.0).unwrap_err();
        assert!(format!("{err:#}").contains("row 1"));
    }
}
