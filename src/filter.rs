//! Interval-membership event filter.
//!
//! Selects the events whose corrected arrival time falls inside at least one
//! good-time interval. Events must be sorted by time; each overlapping
//! interval is resolved with two binary searches instead of a scan of the
//! whole list, and intervals entirely outside the data range are rejected
//! in constant time.

use crate::config::{FilterConfig, GtiFrame, IntervalPolicy};
use crate::error::Result;
use crate::event::EventList;
use crate::gti::{check_bounds, check_disjoint, check_offset, Gti, Placement};
use log::{debug, warn};
use std::fmt;

/// Counters collected during one filter call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FilterStats {
    pub events_in: usize,
    pub events_out: usize,
    pub intervals: usize,
    /// Intervals that start after the last event.
    pub skipped_before: usize,
    /// Intervals that stop before the first event.
    pub skipped_after: usize,
    /// Overlapping intervals that selected at least one event.
    pub matched: usize,
    /// Zero events or zero intervals were supplied.
    pub empty_input: bool,
}

impl FilterStats {
    /// Overlapping intervals that fell into a gap between events.
    pub fn empty_overlaps(&self) -> usize {
        self.intervals
            .saturating_sub(self.skipped_before)
            .saturating_sub(self.skipped_after)
            .saturating_sub(self.matched)
    }
}

impl fmt::Display for FilterStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Events: {} -> {}, GTIs: {} (matched {}, before data {}, after data {}, empty {})",
            self.events_in,
            self.events_out,
            self.intervals,
            self.matched,
            self.skipped_before,
            self.skipped_after,
            self.empty_overlaps()
        )
    }
}

/// Result of a filter call: the surviving events and run statistics.
#[derive(Debug, Clone)]
pub struct Filtered {
    pub events: EventList,
    pub stats: FilterStats,
}

/// Good-time-interval filter.
#[derive(Debug, Clone, Default)]
pub struct GtiFilter {
    pub config: FilterConfig,
}

impl GtiFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FilterConfig) -> Self {
        Self { config }
    }

    /// Intervals in the corrected epoch, validated per the configuration.
    fn prepare_intervals(&self, intervals: &[Gti], offset: f64) -> Result<Vec<Gti>> {
        if self.config.check_bounds {
            check_bounds(intervals)?;
        }

        let corrected = match self.config.frame {
            GtiFrame::Raw => intervals
                .iter()
                .map(|gti| gti.corrected(offset))
                .collect::<Result<Vec<_>>>()?,
            GtiFrame::Corrected => intervals.to_vec(),
        };

        if self.config.policy == IntervalPolicy::RequireDisjoint {
            check_disjoint(&corrected)?;
        }

        Ok(corrected)
    }

    /// Filter `events` to the given intervals.
    ///
    /// `offset` (TIMEZERO) is added to every event time, and to every
    /// interval boundary when the intervals are in the raw frame. Returned
    /// event times are corrected. Both interval boundaries are inclusive.
    pub fn apply(&self, events: &EventList, intervals: &[Gti], offset: f64) -> Result<Filtered> {
        check_offset(offset)?;
        events.check_shape("input events")?;
        let intervals = self.prepare_intervals(intervals, offset)?;

        let mut stats = FilterStats {
            events_in: events.len(),
            intervals: intervals.len(),
            ..Default::default()
        };

        if events.is_empty() || intervals.is_empty() {
            warn!(
                "Empty input ({} events, {} intervals); result is empty",
                events.len(),
                intervals.len()
            );
            stats.empty_input = true;
            stats.skipped_before = if events.is_empty() { intervals.len() } else { 0 };
            return Ok(Filtered {
                events: EventList::new(),
                stats,
            });
        }

        // Addition is monotone, so the corrected times stay sorted.
        let times: Vec<f64> = events.times().iter().map(|t| t + offset).collect();
        let (t0, t1) = (times[0], times[times.len() - 1]);

        let mut runs: Vec<(usize, usize)> = Vec::with_capacity(intervals.len());
        for (i, gti) in intervals.iter().enumerate() {
            match gti.placement(t0, t1) {
                Placement::DisjointBefore => {
                    debug!("GTI {} {} starts after the last event", i + 1, gti);
                    stats.skipped_before += 1;
                }
                Placement::DisjointAfter => {
                    debug!("GTI {} {} stops before the first event", i + 1, gti);
                    stats.skipped_after += 1;
                }
                Placement::Overlapping => {
                    let lo = times.partition_point(|&t| t < gti.start);
                    let hi = lo + times[lo..].partition_point(|&t| t <= gti.stop);
                    if lo < hi {
                        stats.matched += 1;
                        runs.push((lo, hi));
                    }
                }
            }
        }

        let total: usize = runs.iter().map(|(lo, hi)| hi - lo).sum();
        let mut out = EventList::with_capacity(total);
        for &(lo, hi) in &runs {
            out.extend_run(&times, events, lo, hi);
        }

        out.check_shape("filtered events")?;
        stats.events_out = out.len();

        Ok(Filtered { events: out, stats })
    }
}

/// Filter with the default configuration: intervals in the raw frame,
/// processed as given, no bounds check.
pub fn filter(events: &EventList, intervals: &[Gti], offset: f64) -> Result<EventList> {
    GtiFilter::new()
        .apply(events, intervals, offset)
        .map(|f| f.events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GtiError;
    use crate::event::Event;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn events_at(times: &[f64]) -> EventList {
        times
            .iter()
            .enumerate()
            .map(|(i, &t)| Event::new(t, (i % 64) as u16, (i % 5) as u8))
            .collect()
    }

    fn corrected_filter() -> GtiFilter {
        GtiFilter::with_config(FilterConfig::new().with_frame(GtiFrame::Corrected))
    }

    /// Per-interval full scan, the way the selection is defined.
    fn naive(events: &EventList, intervals: &[Gti], offset: f64) -> EventList {
        let mut out = EventList::new();
        for gti in intervals {
            let gti = gti.corrected(offset).unwrap();
            for e in events.iter() {
                let t = e.time + offset;
                if gti.contains(t) {
                    out.push(Event::new(t, e.channel, e.detector_id));
                }
            }
        }
        out
    }

    #[test]
    fn test_concrete_scenario() {
        let events = EventList::from(vec![
            Event::new(1.0, 2, 0),
            Event::new(2.0, 3, 0),
            Event::new(3.0, 4, 1),
            Event::new(11.0, 5, 0),
        ]);
        let out = filter(&events, &[Gti::new(0.0, 5.0)], 0.0).unwrap();

        assert_eq!(
            out.iter().collect::<Vec<_>>(),
            vec![
                Event::new(1.0, 2, 0),
                Event::new(2.0, 3, 0),
                Event::new(3.0, 4, 1)
            ]
        );
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        let events = events_at(&[4.9999, 5.0, 7.5, 10.0, 10.0001]);
        let out = filter(&events, &[Gti::new(5.0, 10.0)], 0.0).unwrap();
        assert_eq!(out.times(), &[5.0, 7.5, 10.0]);
    }

    #[test]
    fn test_disjoint_intervals_yield_nothing() {
        let times: Vec<f64> = (0..=100).map(f64::from).collect();
        let events = events_at(&times);

        let result = GtiFilter::new()
            .apply(&events, &[Gti::new(200.0, 300.0), Gti::new(-50.0, -10.0)], 0.0)
            .unwrap();

        assert!(result.events.is_empty());
        assert_eq!(result.stats.skipped_before, 1);
        assert_eq!(result.stats.skipped_after, 1);
        assert_eq!(result.stats.matched, 0);
    }

    #[test]
    fn test_full_containment() {
        let times: Vec<f64> = (0..50).map(|i| i as f64 * 2.0).collect();
        let events = events_at(&times);
        let out = filter(&events, &[Gti::new(-1.0, 1000.0)], 0.0).unwrap();

        assert_eq!(out.len(), 50);
        assert_eq!(out, events);
    }

    #[test]
    fn test_offset_with_corrected_intervals() {
        let times: Vec<f64> = (0..=10).map(f64::from).collect();
        let events = events_at(&times);

        let result = corrected_filter()
            .apply(&events, &[Gti::new(100.0, 105.0)], 100.0)
            .unwrap();

        assert_eq!(
            result.events.times(),
            &[100.0, 101.0, 102.0, 103.0, 104.0, 105.0]
        );
        assert_eq!(result.events.channels(), &events.channels()[0..6]);
        assert_eq!(result.events.detector_ids(), &events.detector_ids()[0..6]);
    }

    #[test]
    fn test_offset_with_raw_intervals() {
        let times: Vec<f64> = (0..=10).map(f64::from).collect();
        let events = events_at(&times);

        // Both sides shifted: membership is decided in the raw frame.
        let out = filter(&events, &[Gti::new(2.0, 4.0)], 100.0).unwrap();
        assert_eq!(out.times(), &[102.0, 103.0, 104.0]);
    }

    #[test]
    fn test_identity_offset_is_repeatable() {
        let events = events_at(&[0.5, 1.5, 2.5, 3.5]);
        let gtis = [Gti::new(1.0, 3.0)];
        let filter = GtiFilter::new();

        let first = filter.apply(&events, &gtis, 0.0).unwrap();
        let second = filter.apply(&events, &gtis, 0.0).unwrap();

        assert_eq!(first.events, second.events);
        assert_eq!(first.stats, second.stats);
    }

    #[test]
    fn test_empty_inputs() {
        let events = events_at(&[1.0, 2.0]);

        let result = GtiFilter::new().apply(&events, &[], 0.0).unwrap();
        assert!(result.events.is_empty());
        assert!(result.stats.empty_input);

        let result = GtiFilter::new()
            .apply(&EventList::new(), &[Gti::new(0.0, 1.0)], 0.0)
            .unwrap();
        assert!(result.events.is_empty());
        assert!(result.stats.empty_input);
        assert_eq!(result.stats.skipped_before, 1);
    }

    #[test]
    fn test_interval_in_gap_between_events() {
        let events = events_at(&[1.0, 2.0, 8.0, 9.0]);
        let result = GtiFilter::new()
            .apply(&events, &[Gti::new(3.0, 7.0)], 0.0)
            .unwrap();

        assert!(result.events.is_empty());
        assert_eq!(result.stats.empty_overlaps(), 1);
    }

    #[test]
    fn test_empty_overlaps_with_inconsistent_counters() {
        let stats = FilterStats {
            intervals: 1,
            skipped_before: 2,
            matched: 1,
            ..Default::default()
        };
        assert_eq!(stats.empty_overlaps(), 0);
        assert!(stats.to_string().contains("empty 0"));
    }

    #[test]
    fn test_interval_touching_data_edge() {
        let events = events_at(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);

        // Sharing only the last event time
        let result = GtiFilter::new()
            .apply(&events, &[Gti::new(5.0, 9.0)], 0.0)
            .unwrap();
        assert_eq!(result.events.times(), &[5.0]);
        assert_eq!(result.stats.matched, 1);
        assert_eq!(result.stats.skipped_before, 0);

        // Sharing only the first event time
        let result = GtiFilter::new()
            .apply(&events, &[Gti::new(-3.0, 0.0)], 0.0)
            .unwrap();
        assert_eq!(result.events.times(), &[0.0]);
        assert_eq!(result.stats.matched, 1);
        assert_eq!(result.stats.skipped_after, 0);
    }

    #[test]
    fn test_overlapping_intervals_emit_duplicates() {
        let events = events_at(&[1.0, 2.0, 3.0, 4.0]);
        let out = filter(&events, &[Gti::new(1.0, 3.0), Gti::new(2.0, 4.0)], 0.0).unwrap();
        assert_eq!(out.times(), &[1.0, 2.0, 3.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_unsorted_intervals_follow_interval_order() {
        let events = events_at(&[1.0, 2.0, 3.0, 4.0]);
        let out = filter(&events, &[Gti::new(3.5, 4.0), Gti::new(0.0, 1.5)], 0.0).unwrap();
        assert_eq!(out.times(), &[4.0, 1.0]);
    }

    #[test]
    fn test_require_disjoint_rejects_overlap() {
        let events = events_at(&[1.0, 2.0]);
        let filter =
            GtiFilter::with_config(FilterConfig::new().with_policy(IntervalPolicy::RequireDisjoint));

        let err = filter
            .apply(&events, &[Gti::new(0.0, 2.0), Gti::new(2.0, 3.0)], 0.0)
            .unwrap_err();
        assert!(matches!(err, GtiError::Configuration(_)));

        let ok = filter
            .apply(&events, &[Gti::new(0.0, 1.0), Gti::new(1.5, 3.0)], 0.0)
            .unwrap();
        assert_eq!(ok.events.times(), &[1.0, 2.0]);
    }

    #[test]
    fn test_bounds_check() {
        let events = events_at(&[1.0, 2.0]);
        let gtis = [Gti::new(3.0, 1.0)];

        // Without the check a reversed interval simply selects nothing.
        let out = filter(&events, &gtis, 0.0).unwrap();
        assert!(out.is_empty());

        let strict = GtiFilter::with_config(FilterConfig::new().with_bounds_check(true));
        assert!(matches!(
            strict.apply(&events, &gtis, 0.0),
            Err(GtiError::Configuration(_))
        ));
    }

    #[test]
    fn test_non_finite_offset() {
        let events = events_at(&[1.0]);
        for offset in [f64::NAN, f64::INFINITY] {
            assert!(matches!(
                filter(&events, &[Gti::new(0.0, 2.0)], offset),
                Err(GtiError::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_matches_naive_scan_on_random_input() {
        let mut rng = SmallRng::seed_from_u64(0x6711);

        for _ in 0..50 {
            let n = rng.gen_range(0..300);
            let mut times: Vec<f64> = (0..n).map(|_| rng.gen_range(0.0..1000.0)).collect();
            times.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let events = events_at(&times);

            let mut gtis: Vec<Gti> = (0..rng.gen_range(0..8))
                .map(|_| {
                    let start = rng.gen_range(-100.0..1100.0);
                    Gti::new(start, start + rng.gen_range(0.0..200.0))
                })
                .collect();
            // Degenerate interval sitting exactly on an event
            if let Some(&t) = times.get(n / 2) {
                gtis.push(Gti::new(t, t));
            }
            let offset = rng.gen_range(-10.0..10.0);

            let out = filter(&events, &gtis, offset).unwrap();
            let expected = naive(&events, &gtis, offset);

            assert_eq!(out, expected);
            assert!(out.check_shape("test").is_ok());
        }
    }
}
