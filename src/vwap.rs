//! Cumulative session VWAP
//!
//! Tracks sum(price * volume) / sum(volume) over incremental updates, the
//! same running figure a broker terminal shows for the day.

/// Cumulative volume-weighted average price accumulator.
///
/// Volume never decreases: non-positive increments are ignored so feed
/// jitter cannot corrupt the running totals. Session rollover handling
/// (a feed reporting a smaller cumulative total) happens in the caller
/// that converts cumulative volume to increments; by the time a value
/// reaches `ingest` it is a plain increment.
#[derive(Debug, Clone, Default)]
pub struct VwapAccumulator {
    cumulative_pv: f64,
    cumulative_volume: f64,
}

impl VwapAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in one (price, volume increment) update. Ignored unless the
    /// increment is strictly positive.
    pub fn ingest(&mut self, price: f64, volume_increment: f64) {
        if volume_increment > 0.0 {
            self.cumulative_pv += price * volume_increment;
            self.cumulative_volume += volume_increment;
        }
    }

    /// `None` until any volume has been observed; never reports 0.0 as a
    /// stand-in for "unavailable".
    pub fn vwap(&self) -> Option<f64> {
        if self.cumulative_volume > 0.0 {
            Some(self.cumulative_pv / self.cumulative_volume)
        } else {
            None
        }
    }

    pub fn cumulative_volume(&self) -> f64 {
        self.cumulative_volume
    }
}
