//! Alert conditions
//!
//! Composable boolean predicates over a market snapshot, AND-combined by
//! `ConditionSet` behind mandatory gate conditions. Conditions are pure:
//! they read the snapshot and produce a verdict with a human-readable
//! trigger reason, nothing else.

use chrono::{DateTime, Duration, Utc};

use crate::buckets;
use crate::config::ConditionConfig;
use crate::history::RollingHistory;
use crate::Symbol;

/// Window consulted by the price-surge low and the momentum rolling high
const LOOKBACK_SECS: i64 = 10;

/// Immutable view of one symbol's current state, handed to every condition
#[derive(Debug, Clone, Copy)]
pub struct MarketSnapshot<'a> {
    pub symbol: &'a Symbol,
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub cumulative_volume: f64,
    pub vwap: Option<f64>,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub history: &'a RollingHistory,
}

/// Outcome of a single condition check
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Triggered(String),
    NotTriggered,
}

impl Verdict {
    pub fn is_triggered(&self) -> bool {
        matches!(self, Verdict::Triggered(_))
    }

    pub fn into_reason(self) -> Option<String> {
        match self {
            Verdict::Triggered(reason) => Some(reason),
            Verdict::NotTriggered => None,
        }
    }
}

/// A single alert predicate. Implementations must be side-effect-free; a
/// condition that lacks the history it needs reports `NotTriggered`, never
/// an error.
pub trait Condition: Send + Sync {
    fn name(&self) -> &'static str;
    fn evaluate(&self, snapshot: &MarketSnapshot<'_>) -> Verdict;
}

// ============================================================================
// Gate conditions
// ============================================================================

/// Mandatory gate: price must be above the session VWAP. Some feeds omit
/// VWAP entirely, so an unavailable VWAP passes through rather than
/// blocking every alert.
#[derive(Debug, Default)]
pub struct PriceAboveVwap;

impl Condition for PriceAboveVwap {
    fn name(&self) -> &'static str {
        "price-above-vwap"
    }

    fn evaluate(&self, snapshot: &MarketSnapshot<'_>) -> Verdict {
        match snapshot.vwap {
            Some(vwap) if snapshot.price > vwap => Verdict::Triggered(format!(
                "price {:.2} above VWAP {:.2}",
                snapshot.price, vwap
            )),
            Some(_) => Verdict::NotTriggered,
            None => Verdict::Triggered(format!(
                "price {:.2}, VWAP unavailable",
                snapshot.price
            )),
        }
    }
}

/// Optional gate: reject wide-spread quotes. Passes through when the feed
/// delivers no bid/ask.
#[derive(Debug)]
pub struct SpreadFilter {
    pub max_spread_pct: f64,
}

impl Condition for SpreadFilter {
    fn name(&self) -> &'static str {
        "spread-filter"
    }

    fn evaluate(&self, snapshot: &MarketSnapshot<'_>) -> Verdict {
        let (bid, ask) = match (snapshot.bid, snapshot.ask) {
            (Some(bid), Some(ask)) => (bid, ask),
            _ => return Verdict::Triggered("spread unknown, filter waived".to_string()),
        };
        if snapshot.price <= 0.0 {
            return Verdict::NotTriggered;
        }
        let spread_pct = (ask - bid) / snapshot.price * 100.0;
        if spread_pct <= self.max_spread_pct {
            Verdict::Triggered(format!(
                "spread {:.2}% within {:.2}% cap",
                spread_pct, self.max_spread_pct
            ))
        } else {
            Verdict::NotTriggered
        }
    }
}

// ============================================================================
// Member conditions
// ============================================================================

/// Price rise versus the lowest price of the trailing 10-second window
#[derive(Debug)]
pub struct PriceSurge {
    pub threshold_pct: f64,
}

impl Condition for PriceSurge {
    fn name(&self) -> &'static str {
        "price-surge"
    }

    fn evaluate(&self, snapshot: &MarketSnapshot<'_>) -> Verdict {
        let window_start = snapshot.timestamp - Duration::seconds(LOOKBACK_SECS);
        let low = match snapshot
            .history
            .min_price_in(window_start, snapshot.timestamp)
        {
            Some(low) if low > 0.0 => low,
            _ => return Verdict::NotTriggered,
        };
        let rise_pct = (snapshot.price - low) / low * 100.0;
        if rise_pct >= self.threshold_pct {
            Verdict::Triggered(format!(
                "price +{:.2}% off 10s low {:.2}",
                rise_pct, low
            ))
        } else {
            Verdict::NotTriggered
        }
    }
}

/// Two consecutive momentum windows, each clearing a rising threshold, with
/// the current price required to sit at the rolling 10-second high so fading
/// reversals do not fire.
///
/// When granular sub-window samples are missing the check degrades to a
/// coarse total return over both windows against the combined threshold,
/// still gated by the rolling high. The coarse figure is reported as-is
/// rather than being split into synthetic per-window returns.
#[derive(Debug)]
pub struct TwoStepMomentum {
    pub t1_pct: f64,
    pub t2_pct: f64,
    pub window: Duration,
}

impl TwoStepMomentum {
    /// Thresholds and window length from the configured momentum settings.
    /// Not part of either default set; operators add it with `with_member`.
    pub fn from_config(config: &ConditionConfig) -> Self {
        TwoStepMomentum {
            t1_pct: config.momentum_t1_pct,
            t2_pct: config.momentum_t2_pct,
            window: Duration::seconds(config.momentum_window_secs as i64),
        }
    }

    fn at_rolling_high(&self, snapshot: &MarketSnapshot<'_>) -> bool {
        let start = snapshot.timestamp - Duration::seconds(LOOKBACK_SECS);
        match snapshot.history.max_price_in(start, snapshot.timestamp) {
            Some(high) => snapshot.price >= high,
            None => false,
        }
    }
}

impl Condition for TwoStepMomentum {
    fn name(&self) -> &'static str {
        "two-step-momentum"
    }

    fn evaluate(&self, snapshot: &MarketSnapshot<'_>) -> Verdict {
        if !self.at_rolling_high(snapshot) {
            return Verdict::NotTriggered;
        }

        let t = snapshot.timestamp;
        let w1_start = t - self.window;
        let w2_start = t - self.window * 2;

        let w1_first = snapshot.history.first_price_in(w1_start, t);
        let w2_first = snapshot.history.first_price_in(w2_start, w1_start);

        match (w2_first, w1_first) {
            (Some(p2), Some(p1)) if p1 > 0.0 && p2 > 0.0 => {
                let r1 = (p1 - p2) / p2 * 100.0;
                let r2 = (snapshot.price - p1) / p1 * 100.0;
                if r1 >= self.t1_pct && r2 >= self.t2_pct {
                    Verdict::Triggered(format!(
                        "momentum +{:.2}% then +{:.2}% over consecutive {}s windows",
                        r1,
                        r2,
                        self.window.num_seconds()
                    ))
                } else {
                    Verdict::NotTriggered
                }
            }
            // Sub-window data unavailable: coarse total-return fallback
            _ => {
                let first = match snapshot.history.first_price_in(w2_start, t) {
                    Some(first) if first > 0.0 => first,
                    _ => return Verdict::NotTriggered,
                };
                let total = (snapshot.price - first) / first * 100.0;
                let combined = self.t1_pct + self.t2_pct;
                if total >= combined {
                    Verdict::Triggered(format!(
                        "coarse momentum +{:.2}% over {}s (threshold {:.1}%)",
                        total,
                        (self.window * 2).num_seconds(),
                        combined
                    ))
                } else {
                    Verdict::NotTriggered
                }
            }
        }
    }
}

/// Current 10-second volume bucket versus the average of the prior twenty
#[derive(Debug)]
pub struct VolumeSpike {
    pub threshold: f64,
}

impl Condition for VolumeSpike {
    fn name(&self) -> &'static str {
        "volume-spike"
    }

    fn evaluate(&self, snapshot: &MarketSnapshot<'_>) -> Verdict {
        let partitioned = buckets::partition(snapshot.history);
        match buckets::spike_ratio(&partitioned) {
            Some(ratio) if ratio >= self.threshold => Verdict::Triggered(format!(
                "10s volume {:.1}x the 20-bucket average",
                ratio
            )),
            _ => Verdict::NotTriggered,
        }
    }
}

/// Sustained volume: current and previous 10-second buckets both elevated
#[derive(Debug)]
pub struct VolumeConfirmation {
    pub multiplier: f64,
}

impl Condition for VolumeConfirmation {
    fn name(&self) -> &'static str {
        "volume-confirmation"
    }

    fn evaluate(&self, snapshot: &MarketSnapshot<'_>) -> Verdict {
        let partitioned = buckets::partition(snapshot.history);
        match buckets::sustain_ratios(&partitioned) {
            Some((current, previous))
                if current > self.multiplier && previous > self.multiplier =>
            {
                Verdict::Triggered(format!(
                    "sustained volume: current {:.1}x, previous {:.1}x",
                    current, previous
                ))
            }
            _ => Verdict::NotTriggered,
        }
    }
}

// ============================================================================
// ConditionSet
// ============================================================================

/// Ordered conditions combined with AND semantics behind mandatory gates.
///
/// Gates and members carry explicit roles; a gate is never iterated as a
/// member. The composite triggers only when every gate passes, every member
/// triggers, and at least one member exists — a gate-only set never fires.
/// Reasons are assembled gate-first and only on a full match.
pub struct ConditionSet {
    name: String,
    gates: Vec<Box<dyn Condition>>,
    members: Vec<Box<dyn Condition>>,
}

impl ConditionSet {
    pub fn new(name: impl Into<String>) -> Self {
        ConditionSet {
            name: name.into(),
            gates: Vec::new(),
            members: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a mandatory gate. Returns self for chaining.
    pub fn with_gate(mut self, gate: Box<dyn Condition>) -> Self {
        self.gates.push(gate);
        self
    }

    /// Add a member condition. Returns self for chaining.
    pub fn with_member(mut self, member: Box<dyn Condition>) -> Self {
        self.members.push(member);
        self
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// `Some(reasons)` iff the full composite triggers; reasons are ordered
    /// gates first, then members in insertion order. Nothing leaks from a
    /// partial match.
    pub fn evaluate(&self, snapshot: &MarketSnapshot<'_>) -> Option<Vec<String>> {
        if self.members.is_empty() {
            return None;
        }

        let mut reasons = Vec::with_capacity(self.gates.len() + self.members.len());

        for gate in &self.gates {
            match gate.evaluate(snapshot) {
                Verdict::Triggered(reason) => reasons.push(reason),
                Verdict::NotTriggered => return None,
            }
        }

        for member in &self.members {
            match member.evaluate(snapshot) {
                Verdict::Triggered(reason) => reasons.push(reason),
                Verdict::NotTriggered => return None,
            }
        }

        Some(reasons)
    }

    /// Default live set: VWAP gate (plus spread filter when configured),
    /// price surge, and 10s volume spike.
    pub fn live_default(config: &ConditionConfig) -> Self {
        let mut set = ConditionSet::new("live-default")
            .with_gate(Box::new(PriceAboveVwap));
        if let Some(max_spread_pct) = config.max_spread_pct {
            set = set.with_gate(Box::new(SpreadFilter { max_spread_pct }));
        }
        set.with_member(Box::new(PriceSurge {
            threshold_pct: config.price_surge_pct,
        }))
        .with_member(Box::new(VolumeSpike {
            threshold: config.volume_spike_multiplier,
        }))
    }

    /// Default backtest set: the live set plus sustained-volume confirmation
    pub fn backtest_default(config: &ConditionConfig) -> Self {
        let mut set = ConditionSet::new("backtest-default")
            .with_gate(Box::new(PriceAboveVwap));
        if let Some(max_spread_pct) = config.max_spread_pct {
            set = set.with_gate(Box::new(SpreadFilter { max_spread_pct }));
        }
        set.with_member(Box::new(PriceSurge {
            threshold_pct: config.price_surge_pct,
        }))
        .with_member(Box::new(VolumeSpike {
            threshold: config.volume_spike_multiplier,
        }))
        .with_member(Box::new(VolumeConfirmation {
            multiplier: config.volume_confirmation_multiplier,
        }))
    }
}
