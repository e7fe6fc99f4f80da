//! Output sinks for filtered event lists.
//!
//! The caller picks a [`SinkFormat`] once; the sink then writes the events
//! plus provenance metadata. Text output uses itoa for integers and ryu for
//! times, which prints the shortest string that round-trips to the same f64.

use super::fits::{self, Card, Value};
use crate::error::Result;
use crate::event::EventList;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Buffer size for output writers (1MB).
const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// Name written into provenance headers.
pub const CREATOR: &str = concat!("gtifilt ", env!("CARGO_PKG_VERSION"));

/// Provenance recorded alongside a filtered event list.
#[derive(Debug, Clone, Default)]
pub struct Provenance {
    /// Decoded event list the events came from.
    pub event_list: String,
    /// GTI file that was applied.
    pub gti_file: String,
    /// Number of intervals applied.
    pub intervals: usize,
    /// Observation keywords copied from the input.
    pub keywords: Vec<Card>,
    /// Clock offset applied to the event times.
    pub timezero: f64,
}

/// Keywords holding observation times, shifted along with `TIME`.
const TIME_KEYWORDS: &[&str] = &["TSTART", "TSTOP"];

impl Provenance {
    /// Propagated keywords, with observation times moved to the corrected
    /// frame.
    pub fn corrected_keywords(&self) -> Vec<Card> {
        self.keywords
            .iter()
            .map(|card| match &card.value {
                Some(value) if TIME_KEYWORDS.contains(&card.keyword.as_str()) => {
                    match value.as_f64() {
                        Some(t) => Card {
                            value: Some(Value::Float(t + self.timezero)),
                            ..card.clone()
                        },
                        None => card.clone(),
                    }
                }
                _ => card.clone(),
            })
            .collect()
    }
}

/// A destination format for filtered event lists.
pub trait EventSink: Send + Sync {
    /// Serialize the events and provenance to `out`.
    fn write_events(
        &self,
        out: &mut dyn Write,
        events: &EventList,
        provenance: &Provenance,
    ) -> Result<()>;

    /// Conventional file extension, without the dot.
    fn extension(&self) -> &'static str;
}

/// Available output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkFormat {
    Text,
    Fits,
}

impl SinkFormat {
    /// Parse format from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" | "dat" => Some(Self::Text),
            "fits" | "evt" => Some(Self::Fits),
            _ => None,
        }
    }

    /// Guess a format from a path's extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_str)
    }

    pub fn sink(self) -> Box<dyn EventSink> {
        match self {
            SinkFormat::Text => Box::new(TextSink),
            SinkFormat::Fits => Box::new(FitsSink),
        }
    }
}

/// Write to `path` through a temporary file in the same directory, then
/// atomically replace any existing file.
pub fn write_atomic<P, F>(path: P, write: F) -> Result<()>
where
    P: AsRef<Path>,
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, tmp.as_file());
        write(&mut writer)?;
        writer.flush()?;
    }
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Write a filtered event list to `path` with `sink`.
pub fn write_file<P: AsRef<Path>>(
    sink: &dyn EventSink,
    path: P,
    events: &EventList,
    provenance: &Provenance,
) -> Result<()> {
    write_atomic(path, |out| sink.write_events(out, events, provenance))
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

/// Tab-separated text table writer.
pub struct TextWriter<W: Write> {
    writer: W,
    itoa_buf: itoa::Buffer,
    ryu_buf: ryu::Buffer,
}

impl<W: Write> TextWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            itoa_buf: itoa::Buffer::new(),
            ryu_buf: ryu::Buffer::new(),
        }
    }

    /// Write a `# ` comment line.
    pub fn write_comment(&mut self, text: &str) -> Result<()> {
        self.writer.write_all(b"# ")?;
        self.writer.write_all(text.as_bytes())?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    /// Write a float using ryu.
    #[inline]
    pub fn write_float(&mut self, f: f64) -> Result<()> {
        self.writer.write_all(self.ryu_buf.format(f).as_bytes())?;
        Ok(())
    }

    /// Write an integer using itoa.
    #[inline]
    pub fn write_int<I: itoa::Integer>(&mut self, n: I) -> Result<()> {
        self.writer.write_all(self.itoa_buf.format(n).as_bytes())?;
        Ok(())
    }

    #[inline]
    pub fn write_tab(&mut self) -> Result<()> {
        self.writer.write_all(b"\t")?;
        Ok(())
    }

    #[inline]
    pub fn write_newline(&mut self) -> Result<()> {
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    /// Write one `time<TAB>channel<TAB>detector` row.
    #[inline]
    pub fn write_event(&mut self, time: f64, channel: u16, detector_id: u8) -> Result<()> {
        self.write_float(time)?;
        self.write_tab()?;
        self.write_int(channel)?;
        self.write_tab()?;
        self.write_int(detector_id)?;
        self.write_newline()
    }

    /// Write one `start<TAB>stop` row.
    #[inline]
    pub fn write_pair(&mut self, a: f64, b: f64) -> Result<()> {
        self.write_float(a)?;
        self.write_tab()?;
        self.write_float(b)?;
        self.write_newline()
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Flat text sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextSink;

impl EventSink for TextSink {
    fn write_events(
        &self,
        out: &mut dyn Write,
        events: &EventList,
        provenance: &Provenance,
    ) -> Result<()> {
        let mut w = TextWriter::new(out);
        w.write_comment(&format!("Created by {}", CREATOR))?;
        w.write_comment(&format!("Decoded event list: {}", provenance.event_list))?;
        w.write_comment(&format!("GTI applied: {}", provenance.gti_file))?;
        for card in provenance.corrected_keywords() {
            if let Some(value) = &card.value {
                w.write_comment(&format!("{}: {}", card.keyword, value))?;
            }
        }
        // Times below are already corrected.
        w.write_comment("TIMEZERO: 0")?;
        w.write_comment(&format!("NEVENTS: {}", events.len()))?;
        w.write_comment(&format!("NGTI: {}", provenance.intervals))?;
        w.write_comment("")?;
        w.write_comment("Column 1: TIME (corrected with TIMEZERO)")?;
        w.write_comment("Column 2: CHANNEL")?;
        w.write_comment("Column 3: PCUID")?;
        w.write_comment("")?;

        for event in events.iter() {
            w.write_event(event.time, event.channel, event.detector_id)?;
        }
        w.flush()
    }

    fn extension(&self) -> &'static str {
        "dat"
    }
}

// ---------------------------------------------------------------------------
// FITS
// ---------------------------------------------------------------------------

/// FITS binary table sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct FitsSink;

impl FitsSink {
    fn primary_cards(events: &EventList, provenance: &Provenance) -> Vec<Card> {
        let mut cards = vec![
            Card::new("CREATOR", Value::Str(CREATOR.into())),
            Card::new("TYPE", Value::Str("GTI'd event list".into())),
            Card::new("RAW_EVT", Value::Str(provenance.event_list.clone()))
                .with_comment("Decoded event list"),
            Card::new("GTI_FILE", Value::Str(provenance.gti_file.clone()))
                .with_comment("GTI file applied to decoded event list"),
            Card::new("NEVENTS", Value::Int(events.len() as i64)).with_comment("events kept"),
            Card::new("NGTI", Value::Int(provenance.intervals as i64))
                .with_comment("intervals applied"),
        ];
        cards.extend(provenance.corrected_keywords());
        cards.push(
            Card::new("TIMEZERO", Value::Float(0.0)).with_comment("already applied to TIME"),
        );
        cards.push(Card::commentary(
            "HISTORY",
            "TIMEZERO applied to TIME in column 1.",
        ));
        cards
    }
}

impl EventSink for FitsSink {
    fn write_events(
        &self,
        out: &mut dyn Write,
        events: &EventList,
        provenance: &Provenance,
    ) -> Result<()> {
        let primary = fits::primary_header(&Self::primary_cards(events, provenance));
        fits::write_table(
            out,
            &primary,
            "EVENTS",
            &[],
            &fits::event_columns(events),
        )?;
        out.flush()?;
        Ok(())
    }

    fn extension(&self) -> &'static str {
        "fits"
    }
}
