//! Momentum scanner - main entry point
//!
//! This binary provides two subcommands:
//! - backtest: Replay a recorded session, print alerts and P&L scenarios
//! - live: Monitor symbols in real time (replaying recorded data as a feed)

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "momentum-scanner")]
#[command(about = "Intraday momentum scanner with alert backtesting and P&L simulation", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay one session's candles and score the alerts
    Backtest {
        /// Path to configuration file
        #[arg(short, long, default_value = "configs/scanner.json")]
        config: String,

        /// Session date (YYYY-MM-DD)
        #[arg(short, long)]
        date: String,

        /// Data directory (overrides config file)
        #[arg(long)]
        data_dir: Option<String>,

        /// Symbols to scan (comma-separated, overrides config file)
        #[arg(short, long)]
        symbols: Option<String>,
    },

    /// Monitor symbols in real time, replaying recorded candles as ticks
    Live {
        /// Path to configuration file
        #[arg(short, long, default_value = "configs/scanner.json")]
        config: String,

        /// Session date to replay (YYYY-MM-DD)
        #[arg(short, long)]
        date: String,

        /// Data directory (overrides config file)
        #[arg(long)]
        data_dir: Option<String>,

        /// Milliseconds between replayed ticks
        #[arg(long, default_value = "250")]
        tick_ms: u64,
    },
}

fn setup_logging(verbose: bool, command_name: &str) -> Result<()> {
    // Create logs directory
    std::fs::create_dir_all("logs")?;

    // Create log file with naming pattern: {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    // Set log level - filter out noisy external crates
    let level = if verbose { "debug" } else { "info" };
    let filter_str = format!("{},tokio=warn,runtime=warn", level);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(true);

    // File layer - same format but without ANSI colors
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_appender)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!("Logging initialized");
    info!("Log file: {}", log_path.display());

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let command_name = match &cli.command {
        Commands::Backtest { .. } => "backtest",
        Commands::Live { .. } => "live",
    };

    setup_logging(cli.verbose, command_name)?;

    match cli.command {
        Commands::Backtest {
            config,
            date,
            data_dir,
            symbols,
        } => commands::backtest::run(config, date, data_dir, symbols),

        Commands::Live {
            config,
            date,
            data_dir,
            tick_ms,
        } => commands::live::run(config, date, data_dir, tick_ms),
    }
}
