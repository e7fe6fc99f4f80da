//! Table containers for event lists and GTIs.
//!
//! Two on-disk layouts are supported:
//! - flat whitespace-delimited text (`#` comments)
//! - FITS binary tables
//!
//! Inputs are opened through [`InputData`], which memory-maps large files
//! and reads small ones into a buffer. The layout of an input is detected
//! from its first bytes; the layout of an output is chosen by the caller
//! through [`output::EventSink`].

pub mod fits;
pub mod output;
pub mod parsing;
pub mod text;
pub mod validation;

pub use output::{EventSink, FitsSink, Provenance, SinkFormat, TextSink};
pub use validation::verify_time_ordered;

use crate::error::Result;
use crate::event::EventList;
use crate::gti::Gti;
use log::debug;
use memmap2::Mmap;
use std::fs::File;
use std::io::Read;
use std::ops::Deref;
use std::path::Path;

/// Minimum file size to use mmap (smaller files use buffered I/O)
const MMAP_THRESHOLD: u64 = 64 * 1024;

/// Raw bytes of an input file.
pub enum InputData {
    Mapped(Mmap),
    Buffered(Vec<u8>),
}

impl InputData {
    /// Open a file, memory-mapping it when it is large enough.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path)?;
        let size = file.metadata()?.len();

        if size >= MMAP_THRESHOLD {
            debug!("Memory-mapping {} ({} bytes)", path.display(), size);
            // The mapping is read-only and dropped before the caller returns.
            let mmap = unsafe { Mmap::map(&file)? };
            Ok(InputData::Mapped(mmap))
        } else {
            let mut buf = Vec::with_capacity(size as usize);
            file.read_to_end(&mut buf)?;
            Ok(InputData::Buffered(buf))
        }
    }

    /// Detected table layout.
    pub fn layout(&self) -> Layout {
        if fits::is_fits(self) {
            Layout::Fits
        } else {
            Layout::Text
        }
    }
}

impl Deref for InputData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            InputData::Mapped(m) => m,
            InputData::Buffered(b) => b,
        }
    }
}

/// On-disk table layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Text,
    Fits,
}

/// An event list together with the clock offset recorded alongside it.
#[derive(Debug, Clone)]
pub struct LoadedEvents {
    pub events: EventList,
    /// TIMEZERO, when the file records one.
    pub timezero: Option<f64>,
    /// Observation keywords worth carrying into the output.
    pub keywords: Vec<fits::Card>,
}

/// Load an event list from a text or FITS file.
pub fn load_events<P: AsRef<Path>>(path: P) -> Result<LoadedEvents> {
    let data = InputData::open(path)?;
    match data.layout() {
        Layout::Fits => fits::read_events(&data),
        Layout::Text => text::parse_events(&data),
    }
}

/// Load good time intervals from a text or FITS file.
pub fn load_intervals<P: AsRef<Path>>(path: P) -> Result<Vec<Gti>> {
    let data = InputData::open(path)?;
    match data.layout() {
        Layout::Fits => fits::read_intervals(&data),
        Layout::Text => text::parse_intervals(&data),
    }
}

/// Load the clock offset recorded in an event list, defaulting to 0.0.
pub fn load_clock_offset<P: AsRef<Path>>(path: P) -> Result<f64> {
    let data = InputData::open(path)?;
    let timezero = match data.layout() {
        Layout::Fits => fits::read_timezero(&data)?,
        Layout::Text => text::parse_timezero(&data)?,
    };
    Ok(timezero.unwrap_or(0.0))
}
