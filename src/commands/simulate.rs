//! Generate synthetic event lists and GTI files for benchmarking.
//!
//! Events arrive as a Poisson process (exponential inter-arrival times) with
//! uniform channels and detector ids. The observation is split into equal
//! slots and each slot holds one good window, so the GTI list is sorted and
//! disjoint. Event times and GTIs are both written uncorrected, with the
//! clock offset recorded as TIMEZERO.

use crate::error::{GtiError, Result};
use crate::event::{Event, EventList};
use crate::gti::{exposure, Gti};
use crate::table::fits::{self, Card, ColumnData, TableColumn, Value};
use crate::table::output::{write_atomic, TextWriter, CREATOR};
use crate::table::SinkFormat;
use log::info;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Configuration for the simulate command.
#[derive(Debug, Clone)]
pub struct SimulateConfig {
    pub output_dir: PathBuf,
    /// Observation length in seconds.
    pub duration: f64,
    /// Mean event rate in counts per second.
    pub rate: f64,
    pub gti_count: usize,
    /// Share of each slot covered by its good window, in (0, 1).
    pub good_fraction: f64,
    /// Channels are drawn from `0..channels`.
    pub channels: u16,
    /// Detector ids are drawn from `0..detectors`.
    pub detectors: u8,
    /// Raw time of the first slot.
    pub start_time: f64,
    pub timezero: f64,
    pub seed: u64,
    pub format: SinkFormat,
    pub force: bool,
}

impl Default for SimulateConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./gtifilt_sim_data"),
            duration: 1000.0,
            rate: 100.0,
            gti_count: 10,
            good_fraction: 0.8,
            channels: 64,
            detectors: 5,
            start_time: 0.0,
            timezero: 0.0,
            seed: 42,
            format: SinkFormat::Text,
            force: false,
        }
    }
}

impl SimulateConfig {
    fn validate(&self) -> Result<()> {
        let bad = |msg: &str| Err(GtiError::Configuration(msg.to_string()));
        if !(self.duration.is_finite() && self.duration > 0.0) {
            return bad("duration must be positive");
        }
        if !(self.rate.is_finite() && self.rate > 0.0) {
            return bad("rate must be positive");
        }
        if self.gti_count == 0 {
            return bad("at least one GTI is required");
        }
        if !(self.good_fraction > 0.0 && self.good_fraction < 1.0) {
            return bad("good fraction must be between 0 and 1, exclusive");
        }
        if self.channels == 0 || self.detectors == 0 {
            return bad("channel and detector counts must be positive");
        }
        if !self.start_time.is_finite() || !self.timezero.is_finite() {
            return bad("start time and TIMEZERO must be finite");
        }
        Ok(())
    }
}

/// Statistics from a simulate run.
#[derive(Debug, Default, Clone)]
pub struct SimulateStats {
    pub events: usize,
    pub intervals: usize,
    pub exposure: f64,
    pub elapsed_secs: f64,
}

impl fmt::Display for SimulateStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} events, {} GTIs ({:.1}s exposure) in {:.2}s",
            self.events, self.intervals, self.exposure, self.elapsed_secs
        )
    }
}

/// Synthetic data generator.
pub struct SimulateCommand {
    config: SimulateConfig,
}

impl SimulateCommand {
    pub fn new(config: SimulateConfig) -> Self {
        Self { config }
    }

    /// Draw a Poisson event list over the observation.
    pub fn events(&self, rng: &mut SmallRng) -> EventList {
        let c = &self.config;
        let end = c.start_time + c.duration;
        let mut events = EventList::with_capacity((c.duration * c.rate) as usize);
        let mut t = c.start_time;
        loop {
            let u: f64 = rng.gen();
            t += -(1.0 - u).ln() / c.rate;
            if t >= end {
                break;
            }
            events.push(Event::new(
                t,
                rng.gen_range(0..c.channels),
                rng.gen_range(0..c.detectors),
            ));
        }
        events
    }

    /// One good window per slot, placed at random within the slot.
    pub fn intervals(&self, rng: &mut SmallRng) -> Vec<Gti> {
        let c = &self.config;
        let slot = c.duration / c.gti_count as f64;
        let width = slot * c.good_fraction;
        (0..c.gti_count)
            .map(|i| {
                let start = c.start_time + i as f64 * slot + rng.gen::<f64>() * (slot - width);
                Gti::new(start, start + width)
            })
            .collect()
    }

    fn paths(&self) -> (PathBuf, PathBuf) {
        let ext = self.config.format.sink().extension();
        let dir = &self.config.output_dir;
        (
            dir.join(format!("events.{}", ext)),
            dir.join(format!("gti.{}", ext)),
        )
    }

    /// Generate and write both files.
    pub fn run(&self) -> Result<SimulateStats> {
        let start = Instant::now();
        self.config.validate()?;

        let (events_path, gti_path) = self.paths();
        for path in [&events_path, &gti_path] {
            if !self.config.force && path.exists() {
                return Err(GtiError::Configuration(format!(
                    "{} exists, use --force to overwrite",
                    path.display()
                )));
            }
        }

        let mut rng = SmallRng::seed_from_u64(self.config.seed);
        let intervals = self.intervals(&mut rng);
        let events = self.events(&mut rng);

        match self.config.format {
            SinkFormat::Text => {
                self.write_text_events(&events_path, &events)?;
                self.write_text_intervals(&gti_path, &intervals)?;
            }
            SinkFormat::Fits => {
                self.write_fits_events(&events_path, &events)?;
                self.write_fits_intervals(&gti_path, &intervals)?;
            }
        }

        let stats = SimulateStats {
            events: events.len(),
            intervals: intervals.len(),
            exposure: exposure(&intervals),
            elapsed_secs: start.elapsed().as_secs_f64(),
        };
        info!(
            "Simulated {} into {}",
            stats,
            self.config.output_dir.display()
        );
        Ok(stats)
    }

    fn write_text_events(&self, path: &Path, events: &EventList) -> Result<()> {
        write_atomic(path, |out| {
            let mut w = TextWriter::new(out);
            w.write_comment(&format!("Created by {} (seed {})", CREATOR, self.config.seed))?;
            w.write_comment(&format!("TIMEZERO: {}", self.config.timezero))?;
            w.write_comment("Column 1: TIME (raw)")?;
            w.write_comment("Column 2: CHANNEL")?;
            w.write_comment("Column 3: PCUID")?;
            for e in events.iter() {
                w.write_event(e.time, e.channel, e.detector_id)?;
            }
            w.flush()
        })
    }

    fn write_text_intervals(&self, path: &Path, intervals: &[Gti]) -> Result<()> {
        write_atomic(path, |out| {
            let mut w = TextWriter::new(out);
            w.write_comment(&format!("Created by {} (seed {})", CREATOR, self.config.seed))?;
            w.write_comment("Column 1: START (raw)")?;
            w.write_comment("Column 2: STOP (raw)")?;
            for gti in intervals {
                w.write_pair(gti.start, gti.stop)?;
            }
            w.flush()
        })
    }

    fn primary(&self, kind: &str) -> fits::Header {
        fits::primary_header(&[
            Card::new("CREATOR", Value::Str(CREATOR.into())),
            Card::new("TYPE", Value::Str(kind.into())),
            Card::new("TIMEZERO", Value::Float(self.config.timezero))
                .with_comment("clock correction"),
            Card::new("TSTART", Value::Float(self.config.start_time)),
            Card::new(
                "TSTOP",
                Value::Float(self.config.start_time + self.config.duration),
            ),
        ])
    }

    fn write_fits_events(&self, path: &Path, events: &EventList) -> Result<()> {
        let primary = self.primary("simulated event list");
        write_atomic(path, |out| {
            fits::write_table(out, &primary, "EVENTS", &[], &fits::event_columns(events))
        })
    }

    fn write_fits_intervals(&self, path: &Path, intervals: &[Gti]) -> Result<()> {
        let starts: Vec<f64> = intervals.iter().map(|g| g.start).collect();
        let stops: Vec<f64> = intervals.iter().map(|g| g.stop).collect();
        let columns = [
            TableColumn {
                name: "START",
                unit: Some("s"),
                data: ColumnData::F64(&starts),
            },
            TableColumn {
                name: "STOP",
                unit: Some("s"),
                data: ColumnData::F64(&stops),
            },
        ];
        let primary = self.primary("simulated GTI list");
        write_atomic(path, |out| {
            fits::write_table(out, &primary, "STDGTI", &[], &columns)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gti::check_disjoint;
    use crate::table::{load_clock_offset, load_events, load_intervals, verify_time_ordered};

    fn config(dir: &Path) -> SimulateConfig {
        SimulateConfig {
            output_dir: dir.to_path_buf(),
            duration: 200.0,
            rate: 50.0,
            gti_count: 4,
            timezero: 12.5,
            ..Default::default()
        }
    }

    #[test]
    fn test_events_are_ordered_and_in_range() {
        let cmd = SimulateCommand::new(config(Path::new(".")));
        let mut rng = SmallRng::seed_from_u64(7);
        let events = cmd.events(&mut rng);

        assert!(verify_time_ordered(&events).is_ok());
        // 10000 expected; allow a wide margin
        assert!(events.len() > 9000 && events.len() < 11000);
        let (first, last) = events.time_range().unwrap();
        assert!(first >= 0.0 && last < 200.0);
        assert!(events.channels().iter().all(|&c| c < 64));
        assert!(events.detector_ids().iter().all(|&d| d < 5));
    }

    #[test]
    fn test_intervals_are_disjoint() {
        let cmd = SimulateCommand::new(config(Path::new(".")));
        let mut rng = SmallRng::seed_from_u64(7);
        let intervals = cmd.intervals(&mut rng);

        assert_eq!(intervals.len(), 4);
        assert!(check_disjoint(&intervals).is_ok());
        assert!((exposure(&intervals) - 160.0).abs() < 1e-9);
        assert!(intervals.iter().all(|g| g.start >= 0.0 && g.stop <= 200.0));
    }

    #[test]
    fn test_run_text_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let stats = SimulateCommand::new(config(dir.path())).run().unwrap();

        let loaded = load_events(dir.path().join("events.dat")).unwrap();
        assert_eq!(loaded.events.len(), stats.events);
        assert_eq!(loaded.timezero, Some(12.5));
        assert_eq!(load_intervals(dir.path().join("gti.dat")).unwrap().len(), 4);
    }

    #[test]
    fn test_run_fits_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.format = SinkFormat::Fits;
        let stats = SimulateCommand::new(cfg).run().unwrap();

        let loaded = load_events(dir.path().join("events.fits")).unwrap();
        assert_eq!(loaded.events.len(), stats.events);
        assert_eq!(load_clock_offset(dir.path().join("events.fits")).unwrap(), 12.5);
        assert_eq!(load_intervals(dir.path().join("gti.fits")).unwrap().len(), 4);
    }

    #[test]
    fn test_same_seed_same_output() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        SimulateCommand::new(config(a.path())).run().unwrap();
        SimulateCommand::new(config(b.path())).run().unwrap();

        let read = |d: &Path| std::fs::read(d.join("events.dat")).unwrap();
        assert_eq!(read(a.path()), read(b.path()));
    }

    #[test]
    fn test_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        SimulateCommand::new(config(dir.path())).run().unwrap();
        assert!(SimulateCommand::new(config(dir.path())).run().is_err());

        let mut cfg = config(dir.path());
        cfg.force = true;
        assert!(SimulateCommand::new(cfg).run().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let mut cfg = config(Path::new("."));
        cfg.good_fraction = 1.0;
        assert!(SimulateCommand::new(cfg).run().is_err());

        let mut cfg = config(Path::new("."));
        cfg.rate = 0.0;
        assert!(SimulateCommand::new(cfg).run().is_err());
    }
}
