//! Take-profit / stop-loss P&L simulation
//!
//! Scores backtest alerts against the candles that follow them: each alert
//! opens a fixed-notional long position which exits at the first candle to
//! touch the take-profit or stop-loss price. Scenarios are independent; a
//! symbol's balance restarts from the initial capital in every one.

use rayon::prelude::*;
use std::collections::HashMap;
use tracing::info;

use crate::config::PnlConfig;
use crate::types::{Alert, Candle, ScoredTrade, Symbol, TradeOutcome};

/// One (take-profit %, stop-loss %) bracket
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scenario {
    pub take_profit_pct: f64,
    pub stop_loss_pct: f64,
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "TP +{:.1}% / SL -{:.1}%",
            self.take_profit_pct, self.stop_loss_pct
        )
    }
}

/// One symbol's trades and running balance under a single scenario
#[derive(Debug, Clone)]
pub struct SymbolScenarioResult {
    pub symbol: Symbol,
    pub trades: Vec<ScoredTrade>,
    pub final_balance: f64,
}

impl SymbolScenarioResult {
    pub fn wins(&self) -> usize {
        self.trades
            .iter()
            .filter(|t| t.outcome == TradeOutcome::Win)
            .count()
    }

    pub fn losses(&self) -> usize {
        self.trades
            .iter()
            .filter(|t| t.outcome == TradeOutcome::Loss)
            .count()
    }

    pub fn open_trades(&self) -> usize {
        self.trades
            .iter()
            .filter(|t| t.outcome == TradeOutcome::Open)
            .count()
    }

    /// Wins over closed trades; `None` when nothing closed
    pub fn win_rate(&self) -> Option<f64> {
        let closed = self.wins() + self.losses();
        if closed == 0 {
            return None;
        }
        Some(self.wins() as f64 / closed as f64 * 100.0)
    }

    pub fn net_pl(&self) -> f64 {
        self.trades.iter().map(|t| t.net_pl).sum()
    }
}

/// All symbols' results for one scenario
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    pub scenario: Scenario,
    pub symbols: Vec<SymbolScenarioResult>,
}

impl ScenarioResult {
    pub fn total_trades(&self) -> usize {
        self.symbols.iter().map(|s| s.trades.len()).sum()
    }

    pub fn total_wins(&self) -> usize {
        self.symbols.iter().map(|s| s.wins()).sum()
    }

    pub fn total_losses(&self) -> usize {
        self.symbols.iter().map(|s| s.losses()).sum()
    }

    pub fn total_open(&self) -> usize {
        self.symbols.iter().map(|s| s.open_trades()).sum()
    }

    pub fn win_rate(&self) -> Option<f64> {
        let closed = self.total_wins() + self.total_losses();
        if closed == 0 {
            return None;
        }
        Some(self.total_wins() as f64 / closed as f64 * 100.0)
    }

    pub fn total_net_pl(&self) -> f64 {
        self.symbols.iter().map(|s| s.net_pl()).sum()
    }
}

/// Scores alerts with a fixed notional per trade and per-leg commissions
pub struct PnlSimulator {
    config: PnlConfig,
}

impl PnlSimulator {
    pub fn new(config: PnlConfig) -> Self {
        PnlSimulator { config }
    }

    /// Per-leg commission with the broker's minimum applied
    fn leg_commission(&self, shares: f64) -> f64 {
        (shares * self.config.commission_per_share).max(self.config.min_commission)
    }

    /// Walk the candles strictly after the alert and exit at the first one
    /// to touch a bracket price. A candle whose range spans both prices
    /// counts as a win: the take-profit touch is checked first.
    ///
    /// The position is the fixed notional divided by the entry price, so
    /// shares may be fractional.
    fn score_alert(&self, alert: &Alert, candles: &[Candle], scenario: Scenario) -> ScoredTrade {
        let entry = alert.price;
        let shares = self.config.investment_per_trade / entry;

        let tp_price = entry * (1.0 + scenario.take_profit_pct / 100.0);
        let sl_price = entry * (1.0 - scenario.stop_loss_pct / 100.0);

        for candle in candles.iter().filter(|c| c.timestamp > alert.timestamp) {
            if candle.high >= tp_price {
                let gross = (tp_price - entry) * shares;
                let commission = 2.0 * self.leg_commission(shares);
                return ScoredTrade {
                    symbol: alert.symbol.clone(),
                    alert_time: alert.timestamp,
                    entry_price: entry,
                    exit_price: tp_price,
                    outcome: TradeOutcome::Win,
                    exit_time: Some(candle.timestamp),
                    shares,
                    gross_pl: gross,
                    commission,
                    net_pl: gross - commission,
                };
            }
            if candle.low <= sl_price {
                let gross = (sl_price - entry) * shares;
                let commission = 2.0 * self.leg_commission(shares);
                return ScoredTrade {
                    symbol: alert.symbol.clone(),
                    alert_time: alert.timestamp,
                    entry_price: entry,
                    exit_price: sl_price,
                    outcome: TradeOutcome::Loss,
                    exit_time: Some(candle.timestamp),
                    shares,
                    gross_pl: gross,
                    commission,
                    net_pl: gross - commission,
                };
            }
        }

        // Data ended with the position open: only the entry leg was paid
        let commission = self.leg_commission(shares);
        ScoredTrade {
            symbol: alert.symbol.clone(),
            alert_time: alert.timestamp,
            entry_price: entry,
            exit_price: entry,
            outcome: TradeOutcome::Open,
            exit_time: None,
            shares,
            gross_pl: 0.0,
            commission,
            net_pl: -commission,
        }
    }

    /// Score every symbol's alerts under one scenario. Symbols are processed
    /// in name order so the output is stable run to run.
    pub fn run_scenario(
        &self,
        alerts: &HashMap<Symbol, Vec<Alert>>,
        data: &HashMap<Symbol, Vec<Candle>>,
        scenario: Scenario,
    ) -> ScenarioResult {
        let mut symbols: Vec<&Symbol> = alerts.keys().collect();
        symbols.sort_by(|a, b| a.as_str().cmp(b.as_str()));

        let mut results = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let symbol_alerts = &alerts[symbol];
            let mut candles: Vec<Candle> =
                data.get(symbol).cloned().unwrap_or_default();
            candles.sort_by_key(|c| c.timestamp);

            let mut balance = self.config.initial_capital;
            let mut trades = Vec::with_capacity(symbol_alerts.len());
            for alert in symbol_alerts {
                let trade = self.score_alert(alert, &candles, scenario);
                balance += trade.net_pl;
                trades.push(trade);
            }

            info!(
                symbol = %symbol,
                scenario = %scenario,
                trades = trades.len(),
                final_balance = balance,
                "scenario scored"
            );
            results.push(SymbolScenarioResult {
                symbol: symbol.clone(),
                trades,
                final_balance: balance,
            });
        }

        ScenarioResult {
            scenario,
            symbols: results,
        }
    }

    /// Run every configured scenario, in parallel, preserving config order
    pub fn run_scenarios(
        &self,
        alerts: &HashMap<Symbol, Vec<Alert>>,
        data: &HashMap<Symbol, Vec<Candle>>,
    ) -> Vec<ScenarioResult> {
        self.config
            .scenarios
            .par_iter()
            .map(|&(take_profit_pct, stop_loss_pct)| {
                self.run_scenario(
                    alerts,
                    data,
                    Scenario {
                        take_profit_pct,
                        stop_loss_pct,
                    },
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn bar(secs: i64, high: f64, low: f64) -> Candle {
        let mid = (high + low) / 2.0;
        Candle {
            timestamp: ts(secs),
            open: mid,
            high,
            low,
            close: mid,
            volume: 1_000.0,
            vendor_vwap: None,
        }
    }

    fn alert_at(secs: i64, price: f64) -> Alert {
        Alert {
            symbol: Symbol::new("AAPL"),
            timestamp: ts(secs),
            price,
            volume: 50_000.0,
            vwap: Some(price - 1.0),
            reasons: vec!["test".into()],
        }
    }

    fn simulator() -> PnlSimulator {
        PnlSimulator::new(PnlConfig::default())
    }

    fn bracket(tp: f64, sl: f64) -> Scenario {
        Scenario {
            take_profit_pct: tp,
            stop_loss_pct: sl,
        }
    }

    #[test]
    fn take_profit_exit_scores_a_win() {
        // Entry 100, TP 102, SL 99. First candle touches neither; the
        // second reaches 103 without dipping to 99.
        let alert = alert_at(0, 100.0);
        let candles = vec![bar(10, 101.0, 99.5), bar(20, 103.0, 100.0)];
        let trade = simulator()
            .score_alert(&alert, &candles, bracket(2.0, 1.0));

        assert_eq!(trade.outcome, TradeOutcome::Win);
        assert_eq!(trade.exit_time, Some(ts(20)));
        assert_relative_eq!(trade.shares, 10.0);
        assert_relative_eq!(trade.exit_price, 102.0);
        assert_relative_eq!(trade.gross_pl, 20.0);
        // 10 shares x 0.005 = 0.05, floored to 1.00 per leg
        assert_relative_eq!(trade.commission, 2.0);
        assert_relative_eq!(trade.net_pl, 18.0);
    }

    #[test]
    fn stop_loss_exit_scores_a_loss() {
        let alert = alert_at(0, 100.0);
        let candles = vec![bar(10, 100.5, 98.5)];
        let trade = simulator()
            .score_alert(&alert, &candles, bracket(2.0, 1.0));

        assert_eq!(trade.outcome, TradeOutcome::Loss);
        assert_relative_eq!(trade.exit_price, 99.0);
        assert_relative_eq!(trade.gross_pl, -10.0);
        assert_relative_eq!(trade.net_pl, -12.0);
    }

    #[test]
    fn candle_spanning_both_prices_counts_as_win() {
        let alert = alert_at(0, 100.0);
        let candles = vec![bar(10, 103.0, 98.0)];
        let trade = simulator()
            .score_alert(&alert, &candles, bracket(2.0, 1.0));
        assert_eq!(trade.outcome, TradeOutcome::Win);
    }

    #[test]
    fn untouched_bracket_stays_open_with_entry_commission() {
        let alert = alert_at(0, 100.0);
        let candles = vec![bar(10, 101.0, 99.5), bar(20, 101.5, 100.0)];
        let trade = simulator()
            .score_alert(&alert, &candles, bracket(2.0, 1.0));

        assert_eq!(trade.outcome, TradeOutcome::Open);
        assert_eq!(trade.exit_time, None);
        assert_relative_eq!(trade.gross_pl, 0.0);
        assert_relative_eq!(trade.net_pl, -1.0);
    }

    #[test]
    fn candles_at_or_before_the_alert_are_ignored() {
        // The bar at the alert timestamp spans the take-profit price but
        // must not produce an exit; only later bars count.
        let alert = alert_at(10, 100.0);
        let candles = vec![bar(0, 120.0, 90.0), bar(10, 120.0, 90.0)];
        let trade = simulator()
            .score_alert(&alert, &candles, bracket(2.0, 1.0));
        assert_eq!(trade.outcome, TradeOutcome::Open);
    }

    #[test]
    fn per_share_commission_clears_the_minimum_on_large_lots() {
        // Entry 1.00 buys 1000 shares: 1000 x 0.005 = 5.00 per leg
        let alert = alert_at(0, 1.0);
        let candles = vec![bar(10, 1.05, 0.999)];
        let trade = simulator()
            .score_alert(&alert, &candles, bracket(2.0, 1.0));
        assert_eq!(trade.outcome, TradeOutcome::Win);
        assert_relative_eq!(trade.commission, 10.0);
    }

    #[test]
    fn pricey_entries_take_fractional_positions() {
        // Entry 2000 against a 1000 notional: half a share
        let alert = alert_at(0, 2_000.0);
        let candles = vec![bar(10, 2_050.0, 1_990.0)];
        let trade = simulator().score_alert(&alert, &candles, bracket(2.0, 1.0));
        assert_eq!(trade.outcome, TradeOutcome::Win);
        assert_relative_eq!(trade.shares, 0.5);
        // (2040 - 2000) * 0.5 = 20.00 gross
        assert_relative_eq!(trade.gross_pl, 20.0);
    }

    #[test]
    fn scenario_balance_accumulates_per_symbol() {
        let symbol = Symbol::new("AAPL");
        let mut alerts = HashMap::new();
        alerts.insert(symbol.clone(), vec![alert_at(0, 100.0), alert_at(100, 100.0)]);
        let mut data = HashMap::new();
        // First alert wins at ts(20); second stops out at ts(110)
        data.insert(
            symbol.clone(),
            vec![bar(10, 101.0, 99.5), bar(20, 103.0, 100.0), bar(110, 100.5, 98.5)],
        );

        let result = simulator().run_scenario(&alerts, &data, bracket(2.0, 1.0));
        assert_eq!(result.symbols.len(), 1);
        let sym = &result.symbols[0];
        assert_eq!(sym.wins(), 1);
        assert_eq!(sym.losses(), 1);
        assert_relative_eq!(sym.win_rate().unwrap(), 50.0);
        // 10_000 + 18 - 12
        assert_relative_eq!(sym.final_balance, 10_006.0);
    }

    #[test]
    fn scenarios_run_independently_in_config_order() {
        let symbol = Symbol::new("AAPL");
        let mut alerts = HashMap::new();
        alerts.insert(symbol.clone(), vec![alert_at(0, 100.0)]);
        let mut data = HashMap::new();
        data.insert(symbol.clone(), vec![bar(10, 103.0, 99.5)]);

        let config = PnlConfig {
            scenarios: vec![(2.0, 1.0), (4.0, 2.0)],
            ..PnlConfig::default()
        };
        let results = PnlSimulator::new(config).run_scenarios(&alerts, &data);

        assert_eq!(results.len(), 2);
        assert_relative_eq!(results[0].scenario.take_profit_pct, 2.0);
        assert_relative_eq!(results[1].scenario.take_profit_pct, 4.0);
        // TP 2% is hit; TP 4% is not and the trade stays open
        assert_eq!(results[0].total_wins(), 1);
        assert_eq!(results[1].total_open(), 1);
        // Each scenario starts from the same initial capital
        assert_relative_eq!(results[0].symbols[0].final_balance, 10_018.0);
        assert_relative_eq!(results[1].symbols[0].final_balance, 9_999.0);
    }

    #[test]
    fn empty_closed_set_has_no_win_rate() {
        let result = SymbolScenarioResult {
            symbol: Symbol::new("AAPL"),
            trades: vec![],
            final_balance: 10_000.0,
        };
        assert_eq!(result.win_rate(), None);
    }
}
