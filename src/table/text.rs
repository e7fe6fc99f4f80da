//! Flat text tables.
//!
//! Event lists hold `time channel detector_id` per line, GTI lists hold
//! `start stop` per line. Columns are separated by any run of whitespace
//! and `#` lines are comments. An event list may record its clock offset
//! in a `# TIMEZERO: <value>` comment.

use super::parsing::{
    comment_value, fields, parse_f64, parse_index, should_skip_line, trim, Lines,
};
use super::LoadedEvents;
use crate::error::{GtiError, Result};
use crate::event::{Event, EventList};
use crate::gti::Gti;

const TIMEZERO_KEY: &str = "TIMEZERO";

fn parse_error(line: usize, message: String) -> GtiError {
    GtiError::Parse { line, message }
}

fn field_str(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn parse_time(bytes: &[u8], name: &str, line: usize) -> Result<f64> {
    match parse_f64(bytes) {
        Some(t) if t.is_finite() => Ok(t),
        _ => Err(parse_error(
            line,
            format!("Invalid {}: '{}'", name, field_str(bytes)),
        )),
    }
}

fn parse_event_line(line: &[u8], line_number: usize) -> Result<Event> {
    let mut cols = fields(line);
    let (Some(t), Some(c), Some(d)) = (cols.next(), cols.next(), cols.next()) else {
        return Err(parse_error(
            line_number,
            format!("Expected at least 3 fields, got {}", fields(line).count()),
        ));
    };

    let time = parse_time(t, "time", line_number)?;
    let channel = parse_index(c)
        .and_then(|v| u16::try_from(v).ok())
        .ok_or_else(|| parse_error(line_number, format!("Invalid channel: '{}'", field_str(c))))?;
    let detector_id = parse_index(d)
        .and_then(|v| u8::try_from(v).ok())
        .ok_or_else(|| {
            parse_error(
                line_number,
                format!("Invalid detector id: '{}'", field_str(d)),
            )
        })?;

    Ok(Event::new(time, channel, detector_id))
}

/// Parse a text event list.
pub fn parse_events(data: &[u8]) -> Result<LoadedEvents> {
    let mut events = EventList::new();
    let mut timezero = None;

    for (line_number, raw) in Lines::new(data) {
        let line = trim(raw);
        if should_skip_line(line) {
            if let Some(value) = comment_value(line, TIMEZERO_KEY) {
                timezero = Some(parse_time(value, "TIMEZERO", line_number)?);
            }
            continue;
        }
        events.push(parse_event_line(line, line_number)?);
    }

    Ok(LoadedEvents {
        events,
        timezero,
        keywords: Vec::new(),
    })
}

/// Parse the TIMEZERO comment of a text event list without reading events.
pub fn parse_timezero(data: &[u8]) -> Result<Option<f64>> {
    for (line_number, raw) in Lines::new(data) {
        let line = trim(raw);
        if let Some(value) = comment_value(line, TIMEZERO_KEY) {
            return parse_time(value, "TIMEZERO", line_number).map(Some);
        }
    }
    Ok(None)
}

/// Parse a text GTI list.
pub fn parse_intervals(data: &[u8]) -> Result<Vec<Gti>> {
    let mut intervals = Vec::new();

    for (line_number, raw) in Lines::new(data) {
        let line = trim(raw);
        if should_skip_line(line) {
            continue;
        }
        let mut cols = fields(line);
        let (Some(start), Some(stop)) = (cols.next(), cols.next()) else {
            return Err(parse_error(
                line_number,
                "Expected 2 fields: start and stop".to_string(),
            ));
        };
        intervals.push(Gti::new(
            parse_time(start, "start", line_number)?,
            parse_time(stop, "stop", line_number)?,
        ));
    }

    Ok(intervals)
}

/// A rectangular table of numbers, stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericTable {
    columns: usize,
    values: Vec<f64>,
}

impl NumericTable {
    pub fn rows(&self) -> usize {
        if self.columns == 0 {
            0
        } else {
            self.values.len() / self.columns
        }
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Copy out column `index` (0-based).
    pub fn column(&self, index: usize) -> Result<Vec<f64>> {
        if index >= self.columns {
            return Err(GtiError::InvalidFormat(format!(
                "Table has {} columns, column {} requested",
                self.columns,
                index + 1
            )));
        }
        Ok(self
            .values
            .chunks_exact(self.columns)
            .map(|row| row[index])
            .collect())
    }
}

/// Parse a whitespace-delimited numeric table. Every row must have the
/// same number of columns.
pub fn parse_numeric_table(data: &[u8]) -> Result<NumericTable> {
    let mut columns = 0;
    let mut values = Vec::new();

    for (line_number, raw) in Lines::new(data) {
        let line = trim(raw);
        if should_skip_line(line) {
            continue;
        }
        let before = values.len();
        for field in fields(line) {
            let value = parse_f64(field).ok_or_else(|| {
                parse_error(line_number, format!("Invalid number: '{}'", field_str(field)))
            })?;
            values.push(value);
        }
        let width = values.len() - before;
        if columns == 0 {
            columns = width;
        } else if width != columns {
            return Err(parse_error(
                line_number,
                format!("Expected {} fields, got {}", columns, width),
            ));
        }
    }

    Ok(NumericTable { columns, values })
}

/// Parse events from a string (useful for testing).
pub fn events_from_str(content: &str) -> Result<EventList> {
    parse_events(content.as_bytes()).map(|loaded| loaded.events)
}

/// Parse intervals from a string (useful for testing).
pub fn intervals_from_str(content: &str) -> Result<Vec<Gti>> {
    parse_intervals(content.as_bytes())
}
