//! Windowed volume buckets
//!
//! Partitions the rolling history into contiguous 10-second volume buckets
//! and derives the spike / sustained-flow verdicts from them. With fewer
//! than the required bucket count the verdict is inconclusive, never an
//! error.

use chrono::{DateTime, Utc};

use crate::history::RollingHistory;

/// Fixed bucket duration in seconds
pub const BUCKET_SECS: i64 = 10;

/// Buckets needed for a spike verdict: 20 history + 1 current
pub const SPIKE_MIN_BUCKETS: usize = 21;

/// Buckets needed for the sustained check: 20 history + 2 under test
pub const SUSTAIN_MIN_BUCKETS: usize = 22;

/// One contiguous volume bucket. The last bucket of a partition may be
/// partial ("current").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeBucket {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub volume: f64,
}

/// Greedy contiguous partition: a bucket opens at the first unassigned
/// sample's timestamp and accumulates while `ts - start <= 10s`; the next
/// sample past that closes it and opens a new one. Exhaustive and
/// non-overlapping, so bucket volumes always sum to the input volumes.
pub fn partition(history: &RollingHistory) -> Vec<VolumeBucket> {
    let mut buckets = Vec::new();
    let mut open: Option<VolumeBucket> = None;

    for entry in history.iter() {
        match open.as_mut() {
            Some(bucket)
                if (entry.timestamp - bucket.start).num_milliseconds() <= BUCKET_SECS * 1000 =>
            {
                bucket.volume += entry.volume;
                bucket.end = entry.timestamp;
            }
            Some(bucket) => {
                buckets.push(*bucket);
                open = Some(VolumeBucket {
                    start: entry.timestamp,
                    end: entry.timestamp,
                    volume: entry.volume,
                });
            }
            None => {
                open = Some(VolumeBucket {
                    start: entry.timestamp,
                    end: entry.timestamp,
                    volume: entry.volume,
                });
            }
        }
    }

    if let Some(bucket) = open {
        buckets.push(bucket);
    }

    buckets
}

fn mean_volume(buckets: &[VolumeBucket]) -> f64 {
    if buckets.is_empty() {
        return 0.0;
    }
    buckets.iter().map(|b| b.volume).sum::<f64>() / buckets.len() as f64
}

/// Ratio of the current bucket's volume to the mean of the 20 preceding
/// buckets. `None` when there are not enough buckets for a verdict or the
/// baseline mean is zero.
pub fn spike_ratio(buckets: &[VolumeBucket]) -> Option<f64> {
    if buckets.len() < SPIKE_MIN_BUCKETS {
        return None;
    }
    let current = buckets[buckets.len() - 1].volume;
    let baseline = mean_volume(&buckets[buckets.len() - 21..buckets.len() - 1]);
    if baseline == 0.0 {
        return None;
    }
    Some(current / baseline)
}

/// Volume of the current and previous buckets, each relative to the mean of
/// the 20 buckets before those two. `None` when there are not enough buckets
/// or the baseline mean is zero.
pub fn sustain_ratios(buckets: &[VolumeBucket]) -> Option<(f64, f64)> {
    if buckets.len() < SUSTAIN_MIN_BUCKETS {
        return None;
    }
    let current = buckets[buckets.len() - 1].volume;
    let previous = buckets[buckets.len() - 2].volume;
    let baseline = mean_volume(&buckets[buckets.len() - 22..buckets.len() - 2]);
    if baseline == 0.0 {
        return None;
    }
    Some((current / baseline, previous / baseline))
}

/// Sustained-flow check: the current bucket and the one immediately before
/// it must each exceed `multiplier` times the mean of the 20 buckets prior
/// to those two. Distinguishes a one-tick spike from sustained volume.
pub fn is_sustained(buckets: &[VolumeBucket], multiplier: f64) -> bool {
    match sustain_ratios(buckets) {
        Some((current, previous)) => current > multiplier && previous > multiplier,
        None => false,
    }
}
