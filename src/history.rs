//! Rolling price/volume history
//!
//! A capacity-bounded, time-ordered ring buffer of samples. Replaces the
//! obvious map-of-timestamps design: entries are stored in arrival order so
//! ordering guarantees and eviction are explicit, and range queries stay a
//! linear scan over a contiguous window.

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

/// Tolerance applied to both ends of every window query, absorbing feed
/// sampling irregularities of up to 100ms.
pub const WINDOW_JITTER_MS: i64 = 100;

/// One recorded sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub volume: f64,
}

/// Bounded, time-ordered buffer of price/volume samples.
///
/// Timestamps are non-decreasing; duplicates are kept in arrival order.
/// When full, the oldest entry is evicted.
#[derive(Debug, Clone)]
pub struct RollingHistory {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl RollingHistory {
    pub fn new(capacity: usize) -> Self {
        RollingHistory {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest when at capacity. Amortized O(1).
    pub fn push(&mut self, timestamp: DateTime<Utc>, price: f64, volume: f64) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(HistoryEntry {
            timestamp,
            price,
            volume,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Ordered entries within the inclusive `[start, end]` window, widened by
    /// the jitter tolerance on both ends.
    pub fn range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Iterator<Item = &HistoryEntry> {
        let jitter = Duration::milliseconds(WINDOW_JITTER_MS);
        let lo = start - jitter;
        let hi = end + jitter;
        self.entries
            .iter()
            .filter(move |e| e.timestamp >= lo && e.timestamp <= hi)
    }

    /// Lowest price observed in the window, if any sample falls inside it
    pub fn min_price_in(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Option<f64> {
        self.range(start, end).map(|e| e.price).reduce(f64::min)
    }

    /// Highest price observed in the window, if any sample falls inside it
    pub fn max_price_in(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Option<f64> {
        self.range(start, end).map(|e| e.price).reduce(f64::max)
    }

    /// Earliest price in the window, in arrival order
    pub fn first_price_in(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Option<f64> {
        self.range(start, end).next().map(|e| e.price)
    }
}
