//! Core event types for time-tagged detector data.

use crate::error::{GtiError, Result};
use std::fmt;

/// One detected photon event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    /// Arrival time in instrument clock seconds.
    pub time: f64,
    /// Detector-mode energy channel.
    pub channel: u16,
    /// Detector unit (PCU) that recorded the event.
    pub detector_id: u8,
}

impl Event {
    /// Create a new event.
    #[inline]
    pub fn new(time: f64, channel: u16, detector_id: u8) -> Self {
        Self {
            time,
            channel,
            detector_id,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t{}", self.time, self.channel, self.detector_id)
    }
}

/// A columnar event list: parallel `time`, `channel` and `detector_id`
/// columns of identical length.
///
/// The columns are private so the length invariant can only be broken by
/// [`EventList::from_columns`], which rejects mismatched input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventList {
    time: Vec<f64>,
    channel: Vec<u16>,
    detector_id: Vec<u8>,
}

impl EventList {
    /// Create an empty event list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty event list with room for `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            time: Vec::with_capacity(capacity),
            channel: Vec::with_capacity(capacity),
            detector_id: Vec::with_capacity(capacity),
        }
    }

    /// Build an event list from loader columns, checking that they line up.
    pub fn from_columns(time: Vec<f64>, channel: Vec<u16>, detector_id: Vec<u8>) -> Result<Self> {
        let list = Self {
            time,
            channel,
            detector_id,
        };
        list.check_shape("loader columns")?;
        Ok(list)
    }

    /// Verify that all three columns have the same length.
    pub fn check_shape(&self, context: &'static str) -> Result<()> {
        let n = self.time.len();
        if self.channel.len() != n || self.detector_id.len() != n {
            return Err(GtiError::ShapeMismatch {
                context,
                times: n,
                channels: self.channel.len(),
                detectors: self.detector_id.len(),
            });
        }
        Ok(())
    }

    /// Append a single event.
    #[inline]
    pub fn push(&mut self, event: Event) {
        self.time.push(event.time);
        self.channel.push(event.channel);
        self.detector_id.push(event.detector_id);
    }

    /// Append a contiguous run of events from another list, replacing their
    /// times with the given (already corrected) times.
    pub(crate) fn extend_run(&mut self, times: &[f64], source: &EventList, lo: usize, hi: usize) {
        self.time.extend_from_slice(&times[lo..hi]);
        self.channel.extend_from_slice(&source.channel[lo..hi]);
        self.detector_id
            .extend_from_slice(&source.detector_id[lo..hi]);
    }

    /// Number of events.
    #[inline]
    pub fn len(&self) -> usize {
        self.time.len()
    }

    /// Returns true if the list holds no events.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    #[inline]
    pub fn times(&self) -> &[f64] {
        &self.time
    }

    #[inline]
    pub fn channels(&self) -> &[u16] {
        &self.channel
    }

    #[inline]
    pub fn detector_ids(&self) -> &[u8] {
        &self.detector_id
    }

    /// Event at `index`, if any.
    pub fn get(&self, index: usize) -> Option<Event> {
        Some(Event {
            time: *self.time.get(index)?,
            channel: *self.channel.get(index)?,
            detector_id: *self.detector_id.get(index)?,
        })
    }

    /// Time of the first and last event.
    pub fn time_range(&self) -> Option<(f64, f64)> {
        Some((*self.time.first()?, *self.time.last()?))
    }

    /// Iterate over events in stored order.
    pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        self.time
            .iter()
            .zip(&self.channel)
            .zip(&self.detector_id)
            .map(|((&time, &channel), &detector_id)| Event {
                time,
                channel,
                detector_id,
            })
    }

    /// Keep only events recorded by one of the given detectors.
    pub fn select_detectors(&self, detectors: &[u8]) -> EventList {
        self.iter()
            .filter(|e| detectors.contains(&e.detector_id))
            .collect()
    }

    /// Decompose into the three columns.
    pub fn into_columns(self) -> (Vec<f64>, Vec<u16>, Vec<u8>) {
        (self.time, self.channel, self.detector_id)
    }
}

impl FromIterator<Event> for EventList {
    fn from_iter<I: IntoIterator<Item = Event>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut list = EventList::with_capacity(iter.size_hint().0);
        for event in iter {
            list.push(event);
        }
        list
    }
}

impl From<Vec<Event>> for EventList {
    fn from(events: Vec<Event>) -> Self {
        events.into_iter().collect()
    }
}
