//! Integration tests for the momentum scanner
//!
//! These tests drive the public pipeline end to end: ticks through the live
//! scanner, candles through the backtester, and alerts through the P&L
//! simulator.

use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;

use momentum_scanner::backtest::BacktestRunner;
use momentum_scanner::monitor::AlertScanner;
use momentum_scanner::pnl::{PnlSimulator, Scenario};
use momentum_scanner::{Alert, Candle, Config, Symbol, TickUpdate, TradeOutcome};

// =============================================================================
// Test Utilities
// =============================================================================

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn bar(secs: i64, close: f64, volume: f64) -> Candle {
    Candle {
        timestamp: ts(secs),
        open: close,
        high: close + 0.3,
        low: close - 0.3,
        close,
        volume,
        vendor_vwap: None,
    }
}

/// A session that stays quiet for 22 ten-second buckets and then surges:
/// elevated volume in the second-to-last bucket, heavy volume and a +2.97%
/// price rip in the last one. With default thresholds this alerts exactly
/// once, on the final sample.
fn surging_session() -> Vec<Candle> {
    let mut candles = Vec::new();
    for i in 0..66 {
        candles.push(bar(i * 5, 100.0, 500.0));
    }
    candles.push(bar(330, 100.0, 2_000.0));
    candles.push(bar(335, 100.2, 2_000.0));
    candles.push(bar(340, 100.5, 2_000.0));
    candles.push(bar(345, 101.0, 5_000.0));
    candles.push(bar(350, 102.0, 5_000.0));
    candles.push(bar(355, 104.0, 5_000.0));
    candles
}

/// Convert a candle session into the tick stream a live feed would deliver,
/// with the session's cumulative volume and an optional fixed half-spread.
fn ticks_from(
    symbol: &Symbol,
    session: &[Candle],
    half_spread: Option<f64>,
) -> Vec<TickUpdate> {
    let mut cumulative = 0.0;
    session
        .iter()
        .map(|bar| {
            cumulative += bar.volume;
            TickUpdate {
                symbol: symbol.clone(),
                timestamp: bar.timestamp,
                price: bar.close,
                cumulative_volume: cumulative,
                vendor_vwap: None,
                bid: half_spread.map(|h| bar.close - h),
                ask: half_spread.map(|h| bar.close + h),
            }
        })
        .collect()
}

fn config_from_json() -> Config {
    let json = r#"{ "trading": { "symbols": ["AAPL"] } }"#;
    let config: Config = serde_json::from_str(json).unwrap();
    config.validate().unwrap();
    config
}

// =============================================================================
// Live scanner
// =============================================================================

#[test]
fn live_scanner_alerts_once_on_a_surging_session() {
    let config = config_from_json();
    let scanner = AlertScanner::new(&config).unwrap();
    let symbol = Symbol::new("AAPL");

    let mut alerts = Vec::new();
    for tick in ticks_from(&symbol, &surging_session(), None) {
        if let Some(alert) = scanner.update(&tick).unwrap() {
            alerts.push(alert);
        }
    }

    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].timestamp, ts(355));
    assert_eq!(alerts[0].price, 104.0);
    assert!(!alerts[0].reasons.is_empty());
}

#[test]
fn wide_spreads_suppress_an_otherwise_triggering_session() {
    let config = config_from_json();
    let symbol = Symbol::new("AAPL");

    // ~2% spread against the default 0.5% cap
    let scanner = AlertScanner::new(&config).unwrap();
    let alerts: Vec<Alert> = ticks_from(&symbol, &surging_session(), Some(1.0))
        .iter()
        .filter_map(|t| scanner.update(t).unwrap())
        .collect();
    assert!(alerts.is_empty());

    // A tight quote on the same session still alerts
    let scanner = AlertScanner::new(&config).unwrap();
    let alerts: Vec<Alert> = ticks_from(&symbol, &surging_session(), Some(0.01))
        .iter()
        .filter_map(|t| scanner.update(t).unwrap())
        .collect();
    assert_eq!(alerts.len(), 1);
}

#[test]
fn quiet_sessions_never_alert() {
    let config = config_from_json();
    let scanner = AlertScanner::new(&config).unwrap();
    let symbol = Symbol::new("AAPL");

    let session: Vec<Candle> = (0..80).map(|i| bar(i * 5, 100.0, 500.0)).collect();
    for tick in ticks_from(&symbol, &session, None) {
        assert!(scanner.update(&tick).unwrap().is_none());
    }
}

// =============================================================================
// Backtest to P&L pipeline
// =============================================================================

#[test]
fn backtest_alert_wins_under_a_tp_sl_bracket() {
    let config = config_from_json();
    let symbol = Symbol::new("AAPL");

    // The surge alerts at 104.0; a later bar reaches the 2% take-profit
    let mut session = surging_session();
    session.push(bar(365, 107.0, 1_000.0));

    let mut data = HashMap::new();
    data.insert(symbol.clone(), session);

    let runner = BacktestRunner::new(config.clone()).unwrap();
    let alerts = runner.run(&data);
    assert_eq!(alerts[&symbol].len(), 1);

    let simulator = PnlSimulator::new(config.pnl.clone());
    let result = simulator.run_scenario(
        &alerts,
        &data,
        Scenario {
            take_profit_pct: 2.0,
            stop_loss_pct: 1.0,
        },
    );

    assert_eq!(result.total_wins(), 1);
    let sym = &result.symbols[0];
    assert_eq!(sym.trades[0].outcome, TradeOutcome::Win);
    assert!(sym.final_balance > config.pnl.initial_capital);
}

#[test]
fn backtest_replay_is_reproducible() {
    let config = config_from_json();
    let symbol = Symbol::new("AAPL");
    let mut data = HashMap::new();
    data.insert(symbol.clone(), surging_session());

    let runner = BacktestRunner::new(config).unwrap();
    let first = runner.run(&data);
    let second = runner.run(&data);

    assert_eq!(first[&symbol].len(), second[&symbol].len());
    for (a, b) in first[&symbol].iter().zip(second[&symbol].iter()) {
        assert_eq!(a.timestamp, b.timestamp);
        assert_eq!(a.reasons, b.reasons);
    }
}

// =============================================================================
// P&L arithmetic
// =============================================================================

#[test]
fn pnl_applies_per_leg_commission_with_floor() {
    // Entry 100 buys 10 shares; TP at 102 grosses 20.00; each leg's
    // commission is floored at 1.00, so net is 18.00.
    let config = config_from_json();
    let symbol = Symbol::new("AAPL");

    let mut alerts = HashMap::new();
    alerts.insert(
        symbol.clone(),
        vec![Alert {
            symbol: symbol.clone(),
            timestamp: ts(0),
            price: 100.0,
            volume: 50_000.0,
            vwap: Some(99.0),
            reasons: vec!["test".into()],
        }],
    );

    let mut data = HashMap::new();
    data.insert(
        symbol.clone(),
        vec![bar(10, 100.7, 1_000.0), bar(20, 102.7, 1_000.0)],
    );

    let simulator = PnlSimulator::new(config.pnl);
    let result = simulator.run_scenario(
        &alerts,
        &data,
        Scenario {
            take_profit_pct: 2.0,
            stop_loss_pct: 1.0,
        },
    );

    let trade = &result.symbols[0].trades[0];
    assert_eq!(trade.outcome, TradeOutcome::Win);
    assert!((trade.shares - 10.0).abs() < 1e-9);
    assert!((trade.gross_pl - 20.0).abs() < 1e-9);
    assert!((trade.commission - 2.0).abs() < 1e-9);
    assert!((trade.net_pl - 18.0).abs() < 1e-9);
    assert!((result.symbols[0].final_balance - 10_018.0).abs() < 1e-9);
}
