//! Batch command: apply GTIs to many event lists in parallel.
//!
//! A manifest lists one job per line, `events gti output`, with `#` comment
//! lines. Relative paths are resolved against the manifest's directory.

use super::apply::{ApplyGtiCommand, ApplyReport};
use crate::error::{GtiError, Result};
use crate::parallel::process_jobs;
use crate::table::parsing::{fields, should_skip_line, trim, Lines};
use crate::table::InputData;
use log::{error, info};
use std::path::{Path, PathBuf};

/// One manifest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchJob {
    pub events: PathBuf,
    pub gti: PathBuf,
    pub output: PathBuf,
}

/// Parse a manifest. `base` anchors relative paths.
pub fn parse_manifest(data: &[u8], base: &Path) -> Result<Vec<BatchJob>> {
    let resolve = |field: &[u8]| -> PathBuf {
        let path = PathBuf::from(String::from_utf8_lossy(field).into_owned());
        if path.is_absolute() {
            path
        } else {
            base.join(path)
        }
    };

    let mut jobs = Vec::new();
    for (line_number, raw) in Lines::new(data) {
        let line = trim(raw);
        if should_skip_line(line) {
            continue;
        }
        let cols: Vec<&[u8]> = fields(line).collect();
        let [events, gti, output] = cols.as_slice() else {
            return Err(GtiError::Parse {
                line: line_number,
                message: format!("Expected 3 fields: events gti output, got {}", cols.len()),
            });
        };
        jobs.push(BatchJob {
            events: resolve(*events),
            gti: resolve(*gti),
            output: resolve(*output),
        });
    }
    Ok(jobs)
}

/// Read a manifest file.
pub fn read_manifest<P: AsRef<Path>>(path: P) -> Result<Vec<BatchJob>> {
    let path = path.as_ref();
    let data = InputData::open(path)?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    parse_manifest(&data, base)
}

/// Outcome of a batch run.
#[derive(Debug)]
pub struct BatchSummary {
    pub reports: Vec<ApplyReport>,
    pub failures: Vec<(BatchJob, GtiError)>,
}

impl BatchSummary {
    pub fn succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    /// Fold into a single result: an error naming the failed jobs, if any.
    pub fn into_result(self) -> Result<Vec<ApplyReport>> {
        if self.failures.is_empty() {
            return Ok(self.reports);
        }
        let names: Vec<String> = self
            .failures
            .iter()
            .map(|(job, _)| job.events.display().to_string())
            .collect();
        Err(GtiError::InvalidFormat(format!(
            "{} of {} jobs failed: {}",
            self.failures.len(),
            self.failures.len() + self.reports.len(),
            names.join(", ")
        )))
    }
}

/// Batch command: one apply configuration shared by every job.
#[derive(Debug, Clone, Default)]
pub struct BatchCommand {
    pub apply: ApplyGtiCommand,
}

impl BatchCommand {
    pub fn new(apply: ApplyGtiCommand) -> Self {
        Self { apply }
    }

    /// Run every job. A failing job does not stop the others.
    pub fn run_jobs(&self, jobs: &[BatchJob]) -> BatchSummary {
        info!("Running {} jobs", jobs.len());
        let results = process_jobs(jobs, |job| {
            self.apply.run(&job.events, &job.gti, &job.output)
        });

        let mut summary = BatchSummary {
            reports: Vec::with_capacity(jobs.len()),
            failures: Vec::new(),
        };
        for (job, result) in jobs.iter().zip(results) {
            match result {
                Ok(report) => summary.reports.push(report),
                Err(e) => {
                    error!("{}: {}", job.events.display(), e);
                    summary.failures.push((job.clone(), e));
                }
            }
        }
        summary
    }

    /// Read a manifest and run its jobs.
    pub fn run<P: AsRef<Path>>(&self, manifest: P) -> Result<BatchSummary> {
        let jobs = read_manifest(manifest)?;
        Ok(self.run_jobs(&jobs))
    }
}
