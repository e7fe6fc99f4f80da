//! Apply command: load an event list and a GTI file, filter, and write.

use crate::config::FilterConfig;
use crate::error::{GtiError, Result};
use crate::event::EventList;
use crate::filter::{FilterStats, GtiFilter};
use crate::gti::Gti;
use crate::table::output::write_file;
use crate::table::{
    load_events, load_intervals, verify_time_ordered, LoadedEvents, Provenance, SinkFormat,
};
use log::{info, warn};
use std::fmt;
use std::path::{Path, PathBuf};

/// Summary of one apply run.
#[derive(Debug, Clone)]
pub struct ApplyReport {
    pub output: PathBuf,
    pub timezero: f64,
    pub stats: FilterStats,
    /// Events written after detector selection.
    pub events_written: usize,
}

impl fmt::Display for ApplyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}, TIMEZERO: {}, Written: {}",
            self.output.display(),
            self.stats,
            self.timezero,
            self.events_written
        )
    }
}

/// Apply command configuration.
#[derive(Debug, Clone, Default)]
pub struct ApplyGtiCommand {
    pub config: FilterConfig,
    /// Clock offset to use instead of the one recorded in the event list.
    pub timezero: Option<f64>,
    /// Keep only these detector ids.
    pub detectors: Option<Vec<u8>>,
    /// Skip the time-order check of the event list.
    pub assume_sorted: bool,
    /// Output format; inferred from the output extension when unset.
    pub format: Option<SinkFormat>,
}

impl ApplyGtiCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Output format for `path`.
    pub fn output_format(&self, path: &Path) -> Result<SinkFormat> {
        self.format
            .or_else(|| SinkFormat::from_path(path))
            .ok_or_else(|| {
                GtiError::InvalidFormat(format!(
                    "Cannot infer output format of '{}': use a .dat or .fits extension, or --format",
                    path.display()
                ))
            })
    }

    /// Clock offset for a loaded event list.
    pub fn resolve_timezero(&self, loaded: &LoadedEvents) -> f64 {
        if let Some(tz) = self.timezero {
            return tz;
        }
        loaded.timezero.unwrap_or_else(|| {
            warn!("No TIMEZERO recorded in event list, using 0");
            0.0
        })
    }

    /// Filter already-loaded inputs, then apply detector selection.
    pub fn filter_loaded(
        &self,
        loaded: &LoadedEvents,
        intervals: &[Gti],
    ) -> Result<(EventList, FilterStats, f64)> {
        let timezero = self.resolve_timezero(loaded);
        let filtered =
            GtiFilter::with_config(self.config).apply(&loaded.events, intervals, timezero)?;

        let events = match &self.detectors {
            Some(detectors) => filtered.events.select_detectors(detectors),
            None => filtered.events,
        };
        Ok((events, filtered.stats, timezero))
    }

    /// Execute on files.
    pub fn run<P: AsRef<Path>>(&self, events_path: P, gti_path: P, output: P) -> Result<ApplyReport> {
        let (events_path, gti_path, output) =
            (events_path.as_ref(), gti_path.as_ref(), output.as_ref());
        let format = self.output_format(output)?;

        let loaded = load_events(events_path)?;
        if !self.assume_sorted {
            verify_time_ordered(&loaded.events).map_err(|e| match e {
                GtiError::InvalidFormat(msg) => {
                    GtiError::InvalidFormat(format!("{}: {}", events_path.display(), msg))
                }
                other => other,
            })?;
        }
        let intervals = load_intervals(gti_path)?;

        let (events, stats, timezero) = self.filter_loaded(&loaded, &intervals)?;

        let provenance = Provenance {
            event_list: events_path.display().to_string(),
            gti_file: gti_path.display().to_string(),
            intervals: intervals.len(),
            keywords: loaded.keywords,
            timezero,
        };
        write_file(format.sink().as_ref(), output, &events, &provenance)?;

        let report = ApplyReport {
            output: output.to_path_buf(),
            timezero,
            stats,
            events_written: events.len(),
        };
        info!("{}", report);
        Ok(report)
    }
}
