//! Live command implementation
//!
//! Replays a recorded session through the live scanner at an accelerated
//! tick rate. The loop runs until the replay finishes or Ctrl-C arrives.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use momentum_scanner::feed::{self, ConsoleSink, CsvReplayFeed};
use momentum_scanner::monitor::AlertScanner;
use momentum_scanner::Config;
use tokio::sync::watch;
use tracing::info;

pub fn run(
    config_path: String,
    date: String,
    data_dir_override: Option<String>,
    tick_ms: u64,
) -> Result<()> {
    info!("Starting live scanner");

    let mut config = Config::from_file(&config_path)?;
    info!("Loaded configuration from: {}", config_path);

    if let Some(dir) = data_dir_override {
        info!("Overriding data directory to: {}", dir);
        config.backtest.data_dir = dir;
    }

    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .context("Invalid session date, expected YYYY-MM-DD")?;
    let symbols = config.trading.symbols();

    let data = feed::load_session(&config.backtest.data_dir, &symbols, date)?;
    info!("Replaying {} symbols at {}ms per tick", data.len(), tick_ms);

    let scanner = AlertScanner::new(&config)?;
    let mut feed = CsvReplayFeed::new(data, std::time::Duration::from_millis(tick_ms));
    let mut sink = ConsoleSink;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let (stop_tx, stop_rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, shutting down");
                let _ = stop_tx.send(true);
            }
        });

        scanner.run_live(&mut feed, &mut sink, stop_rx).await
    })
}
