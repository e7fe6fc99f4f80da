//! Good Time Interval type and the clock-zero correction.

use crate::error::{GtiError, Result};
use std::fmt;

/// A closed good-time interval `[start, stop]`.
///
/// `start <= stop` is expected but only enforced when bounds checking is
/// enabled in [`crate::config::FilterConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gti {
    pub start: f64,
    pub stop: f64,
}

impl Gti {
    /// Create a new interval.
    #[inline]
    pub fn new(start: f64, stop: f64) -> Self {
        Self { start, stop }
    }

    /// Length of the interval in seconds.
    #[inline]
    pub fn duration(&self) -> f64 {
        self.stop - self.start
    }

    /// True when `start <= stop` and neither bound is NaN.
    #[inline]
    pub fn is_well_formed(&self) -> bool {
        self.start <= self.stop
    }

    /// Closed-interval membership test.
    #[inline]
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time <= self.stop
    }

    /// Shift both boundaries by a clock offset.
    pub fn corrected(&self, offset: f64) -> Result<Gti> {
        check_offset(offset)?;
        Ok(Gti {
            start: self.start + offset,
            stop: self.stop + offset,
        })
    }

    /// Where the data range `[t0, t1]` lies relative to this interval.
    ///
    /// Touching at a single point counts as overlapping.
    #[inline]
    pub fn placement(&self, t0: f64, t1: f64) -> Placement {
        if t0 < self.start && t0 < self.stop && t1 < self.start && t1 < self.stop {
            Placement::DisjointBefore
        } else if t0 > self.start && t0 > self.stop && t1 > self.start && t1 > self.stop {
            Placement::DisjointAfter
        } else {
            Placement::Overlapping
        }
    }
}

impl fmt::Display for Gti {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.stop)
    }
}

impl From<(f64, f64)> for Gti {
    fn from((start, stop): (f64, f64)) -> Self {
        Gti::new(start, stop)
    }
}

/// Relationship between the event data range and one interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// All data ends before the interval starts.
    DisjointBefore,
    /// All data starts after the interval stops.
    DisjointAfter,
    Overlapping,
}

/// Reject clock offsets that would poison every comparison.
pub fn check_offset(offset: f64) -> Result<()> {
    if !offset.is_finite() {
        return Err(GtiError::Configuration(format!(
            "Clock offset must be finite, got {}",
            offset
        )));
    }
    Ok(())
}

/// Check every interval has `start <= stop`.
pub fn check_bounds(intervals: &[Gti]) -> Result<()> {
    for (i, gti) in intervals.iter().enumerate() {
        if !gti.is_well_formed() {
            return Err(GtiError::Configuration(format!(
                "Malformed interval {} {}: start must not exceed stop",
                i + 1,
                gti
            )));
        }
    }
    Ok(())
}

/// Check intervals are sorted by start and pairwise disjoint.
///
/// Closed intervals sharing an endpoint overlap at that point, so
/// `next.start` must be strictly greater than `prev.stop`.
pub fn check_disjoint(intervals: &[Gti]) -> Result<()> {
    for (i, pair) in intervals.windows(2).enumerate() {
        let (prev, next) = (pair[0], pair[1]);
        if next.start < prev.start {
            return Err(GtiError::Configuration(format!(
                "Intervals not sorted: interval {} {} starts before interval {} {}",
                i + 2,
                next,
                i + 1,
                prev
            )));
        }
        if next.start <= prev.stop {
            return Err(GtiError::Configuration(format!(
                "Intervals overlap: interval {} {} and interval {} {}",
                i + 1,
                prev,
                i + 2,
                next
            )));
        }
    }
    Ok(())
}

/// Total good time covered by a list of intervals.
pub fn exposure(intervals: &[Gti]) -> f64 {
    intervals
        .iter()
        .filter(|g| g.is_well_formed())
        .map(Gti::duration)
        .sum()
}
