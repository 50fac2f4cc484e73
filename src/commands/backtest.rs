//! Backtest command implementation

use anyhow::{Context, Result};
use chrono::NaiveDate;
use itertools::Itertools;
use momentum_scanner::backtest::BacktestRunner;
use momentum_scanner::pnl::PnlSimulator;
use momentum_scanner::{feed, Config};
use tracing::info;

pub fn run(
    config_path: String,
    date: String,
    data_dir_override: Option<String>,
    symbols_override: Option<String>,
) -> Result<()> {
    info!("Starting backtest");

    // Load configuration
    let mut config = Config::from_file(&config_path)?;
    info!("Loaded configuration from: {}", config_path);

    // Apply overrides
    if let Some(dir) = data_dir_override {
        info!("Overriding data directory to: {}", dir);
        config.backtest.data_dir = dir;
    }
    if let Some(symbols) = symbols_override {
        info!("Overriding symbols to: {}", symbols);
        config.trading.symbols = symbols
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        config.validate()?;
    }

    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .context("Invalid session date, expected YYYY-MM-DD")?;
    let symbols = config.trading.symbols();

    // Load data
    info!("Loading data from: {}", config.backtest.data_dir);
    let data = feed::load_session(&config.backtest.data_dir, &symbols, date)?;
    info!("Loaded data for {} symbols", data.len());

    // Replay
    let runner = BacktestRunner::new(config.clone())?;
    info!("Running backtest...");
    let alerts = runner.run(&data);
    let total_alerts: usize = alerts.values().map(Vec::len).sum();

    println!("\n{}", "=".repeat(60));
    println!("BACKTEST ALERTS  {}", date);
    println!("{}", "=".repeat(60));
    if total_alerts == 0 {
        println!("No alerts triggered.");
    } else {
        for symbol in alerts
            .keys()
            .sorted_by(|a, b| a.as_str().cmp(b.as_str()))
        {
            for alert in &alerts[symbol] {
                println!("{alert}");
            }
        }
    }

    // Score every configured TP/SL scenario against the session
    let simulator = PnlSimulator::new(config.pnl.clone());
    let results = simulator.run_scenarios(&alerts, &data);

    println!("\n{}", "=".repeat(60));
    println!("P&L SCENARIOS");
    println!("{}", "=".repeat(60));
    println!(
        "{:<22} {:>7} {:>6} {:>7} {:>6} {:>9} {:>12}",
        "Scenario", "Trades", "Wins", "Losses", "Open", "Win rate", "Net P&L"
    );
    for result in &results {
        let win_rate = result
            .win_rate()
            .map(|r| format!("{:.1}%", r))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<22} {:>7} {:>6} {:>7} {:>6} {:>9} {:>12.2}",
            result.scenario.to_string(),
            result.total_trades(),
            result.total_wins(),
            result.total_losses(),
            result.total_open(),
            win_rate,
            result.total_net_pl(),
        );
    }

    println!(
        "\nFinal balances ({:.2} initial per symbol, per scenario):",
        config.pnl.initial_capital
    );
    for result in &results {
        let balances = result
            .symbols
            .iter()
            .map(|s| format!("{} {:.2}", s.symbol, s.final_balance))
            .join(", ");
        println!("  {:<22} {}", result.scenario.to_string(), balances);
    }
    println!("{}", "=".repeat(60));

    info!("Backtest completed successfully");

    Ok(())
}
