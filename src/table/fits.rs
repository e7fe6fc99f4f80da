//! Minimal FITS binary-table reader and writer.
//!
//! Covers what event lists and GTI files need: a primary HDU without data,
//! followed by `BINTABLE` extensions with scalar big-endian columns.
//!
//! Layout reminders:
//! - files are a sequence of 2880-byte blocks
//! - headers are 80-byte ASCII cards terminated by an `END` card
//! - table data is `NAXIS2` rows of `NAXIS1` bytes, zero-padded to a block

use super::LoadedEvents;
use crate::error::{GtiError, Result};
use crate::event::EventList;
use crate::gti::Gti;
use rustc_hash::FxHashMap;
use std::fmt;
use std::io::Write;

/// FITS logical record size.
pub const BLOCK_SIZE: usize = 2880;

const CARD_SIZE: usize = 80;

const MAX_STRING_LEN: usize = 66;

/// Observation keywords carried from an input event list into outputs.
pub const PROPAGATED_KEYWORDS: &[&str] = &[
    "OBS_ID", "OBJECT", "TELESCOP", "INSTRUME", "DATAMODE", "TSTART", "TSTOP", "MJDREFI",
    "MJDREFF", "TIMESYS", "TIMEUNIT",
];

fn fits_err(message: impl Into<String>) -> GtiError {
    GtiError::Fits(message.into())
}

/// Bytes of padding needed to reach the next block boundary.
#[inline]
fn padding(len: usize) -> usize {
    (BLOCK_SIZE - len % BLOCK_SIZE) % BLOCK_SIZE
}

/// True if the data starts like a FITS primary header.
pub fn is_fits(data: &[u8]) -> bool {
    data.starts_with(b"SIMPLE  =")
}

// ---------------------------------------------------------------------------
// Header cards
// ---------------------------------------------------------------------------

/// A header keyword value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Logical(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    fn format(&self) -> String {
        match self {
            Value::Logical(b) => format!("{:>20}", if *b { "T" } else { "F" }),
            Value::Int(i) => format!("{:>20}", i),
            Value::Float(f) => {
                let mut buf = ryu::Buffer::new();
                format!("{:>20}", buf.format(*f).to_ascii_uppercase())
            }
            Value::Str(s) => {
                // Quotes must close within the card: at most 68 columns
                // remain after `= `, two of them for the quotes.
                let mut escaped = String::new();
                for c in s.chars() {
                    let len = if c == '\'' { 2 } else { c.len_utf8() };
                    if escaped.len() + len > MAX_STRING_LEN {
                        break;
                    }
                    escaped.push(c);
                    if c == '\'' {
                        escaped.push('\'');
                    }
                }
                format!("'{:<8}'", escaped)
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Logical(b) => write!(f, "{}", if *b { "T" } else { "F" }),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{}", s),
        }
    }
}

/// One 80-column header card.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub keyword: String,
    pub value: Option<Value>,
    pub comment: Option<String>,
}

impl Card {
    pub fn new(keyword: &str, value: Value) -> Self {
        Self {
            keyword: keyword.to_ascii_uppercase(),
            value: Some(value),
            comment: None,
        }
    }

    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }

    /// A `COMMENT` or `HISTORY` card.
    pub fn commentary(keyword: &str, text: &str) -> Self {
        Self {
            keyword: keyword.to_ascii_uppercase(),
            value: None,
            comment: Some(text.to_string()),
        }
    }

    fn is_commentary(&self) -> bool {
        matches!(self.keyword.as_str(), "COMMENT" | "HISTORY" | "")
    }

    /// Render as exactly 80 ASCII bytes.
    fn to_bytes(&self) -> [u8; CARD_SIZE] {
        let mut text = format!("{:<8}", self.keyword);
        match &self.value {
            Some(value) => {
                text.push_str("= ");
                text.push_str(&value.format());
                if let Some(comment) = &self.comment {
                    text.push_str(" / ");
                    text.push_str(comment);
                }
            }
            None => {
                if let Some(comment) = &self.comment {
                    text.push_str(comment);
                }
            }
        }

        let mut out = [b' '; CARD_SIZE];
        for (slot, b) in out.iter_mut().zip(text.bytes()) {
            *slot = if b.is_ascii() && !b.is_ascii_control() {
                b
            } else {
                b'?'
            };
        }
        out
    }

    fn parse(raw: &[u8]) -> Result<Card> {
        let keyword = String::from_utf8_lossy(&raw[..8]).trim().to_string();

        if &raw[8..10] != b"= " || keyword == "COMMENT" || keyword == "HISTORY" {
            let text = String::from_utf8_lossy(&raw[8..]).trim().to_string();
            return Ok(Card {
                keyword,
                value: None,
                comment: (!text.is_empty()).then_some(text),
            });
        }

        let field = String::from_utf8_lossy(&raw[10..]).into_owned();
        let trimmed = field.trim_start();

        let (value, rest) = if let Some(body) = trimmed.strip_prefix('\'') {
            // Quoted string; '' is an escaped quote.
            let mut s = String::new();
            let mut chars = body.char_indices().peekable();
            let mut end = None;
            while let Some((i, c)) = chars.next() {
                if c == '\'' {
                    if matches!(chars.peek(), Some((_, '\''))) {
                        s.push('\'');
                        chars.next();
                    } else {
                        end = Some(i + 1);
                        break;
                    }
                } else {
                    s.push(c);
                }
            }
            let end =
                end.ok_or_else(|| fits_err(format!("Unterminated string in card {}", keyword)))?;
            (
                Some(Value::Str(s.trim_end().to_string())),
                &body[end..],
            )
        } else {
            let (token, rest) = match trimmed.find('/') {
                Some(p) => (&trimmed[..p], &trimmed[p..]),
                None => (trimmed, ""),
            };
            (parse_scalar(token.trim(), &keyword)?, rest)
        };

        let comment = rest
            .trim()
            .strip_prefix('/')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        Ok(Card {
            keyword,
            value,
            comment,
        })
    }
}

fn parse_scalar(token: &str, keyword: &str) -> Result<Option<Value>> {
    if token.is_empty() {
        return Ok(None);
    }
    match token {
        "T" => return Ok(Some(Value::Logical(true))),
        "F" => return Ok(Some(Value::Logical(false))),
        _ => {}
    }
    if let Ok(i) = token.parse::<i64>() {
        return Ok(Some(Value::Int(i)));
    }
    token
        .replace(['D', 'd'], "E")
        .parse::<f64>()
        .map(|f| Some(Value::Float(f)))
        .map_err(|_| fits_err(format!("Invalid value '{}' for keyword {}", token, keyword)))
}

// ---------------------------------------------------------------------------
// Headers
// ---------------------------------------------------------------------------

/// An ordered set of header cards with keyword lookup.
#[derive(Debug, Clone, Default)]
pub struct Header {
    cards: Vec<Card>,
    index: FxHashMap<String, usize>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a card, replacing an existing card with the same keyword.
    /// Commentary cards always append.
    pub fn set(&mut self, card: Card) {
        if card.is_commentary() {
            self.cards.push(card);
            return;
        }
        match self.index.get(&card.keyword) {
            Some(&i) => self.cards[i] = card,
            None => {
                self.index.insert(card.keyword.clone(), self.cards.len());
                self.cards.push(card);
            }
        }
    }

    pub fn get(&self, keyword: &str) -> Option<&Value> {
        let i = *self.index.get(keyword)?;
        self.cards[i].value.as_ref()
    }

    pub fn card(&self, keyword: &str) -> Option<&Card> {
        self.index.get(keyword).map(|&i| &self.cards[i])
    }

    pub fn get_f64(&self, keyword: &str) -> Option<f64> {
        self.get(keyword)?.as_f64()
    }

    pub fn get_i64(&self, keyword: &str) -> Option<i64> {
        self.get(keyword)?.as_i64()
    }

    pub fn get_str(&self, keyword: &str) -> Option<&str> {
        self.get(keyword)?.as_str()
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    fn require_i64(&self, keyword: &str) -> Result<i64> {
        self.get_i64(keyword)
            .ok_or_else(|| fits_err(format!("Missing or non-integer keyword {}", keyword)))
    }

    fn require_usize(&self, keyword: &str) -> Result<usize> {
        let value = self.require_i64(keyword)?;
        usize::try_from(value)
            .map_err(|_| fits_err(format!("Keyword {} must not be negative, got {}", keyword, value)))
    }

    /// Parse a header at the start of `data`, returning it and the number
    /// of bytes it occupies including block padding.
    fn parse(data: &[u8]) -> Result<(Header, usize)> {
        let mut header = Header::new();
        for (i, raw) in data.chunks_exact(CARD_SIZE).enumerate() {
            if raw.starts_with(b"END") && raw[3..].iter().all(|&b| b == b' ') {
                let used = (i + 1) * CARD_SIZE;
                return Ok((header, used + padding(used)));
            }
            header.set(Card::parse(raw)?);
        }
        Err(fits_err("Header has no END card"))
    }

    /// Size in bytes of the data unit that follows this header, unpadded.
    fn data_size(&self) -> Result<usize> {
        let naxis = self.require_i64("NAXIS")?;
        if naxis == 0 {
            return Ok(0);
        }
        let mut count: i64 = 1;
        for i in 1..=naxis {
            count = count.saturating_mul(self.require_i64(&format!("NAXIS{}", i))?);
        }
        let bits = self.require_i64("BITPIX")?.abs();
        let pcount = self.get_i64("PCOUNT").unwrap_or(0);
        let gcount = self.get_i64("GCOUNT").unwrap_or(1);
        let size = (bits / 8)
            .saturating_mul(gcount)
            .saturating_mul(pcount.saturating_add(count));
        usize::try_from(size).map_err(|_| fits_err(format!("Invalid data size {}", size)))
    }

    /// Write all cards, the END card and block padding.
    fn write_to<W: Write + ?Sized>(&self, w: &mut W) -> Result<()> {
        for card in &self.cards {
            w.write_all(&card.to_bytes())?;
        }
        let mut end = [b' '; CARD_SIZE];
        end[..3].copy_from_slice(b"END");
        w.write_all(&end)?;

        let used = (self.cards.len() + 1) * CARD_SIZE;
        w.write_all(&vec![b' '; padding(used)])?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// HDUs and binary tables
// ---------------------------------------------------------------------------

/// One header-data unit, borrowing its data from the file bytes.
#[derive(Debug)]
pub struct Hdu<'a> {
    pub header: Header,
    pub data: &'a [u8],
}

/// Split a FITS file into its HDUs.
pub fn hdus(data: &[u8]) -> Result<Vec<Hdu<'_>>> {
    if !is_fits(data) {
        return Err(fits_err("Not a FITS file (missing SIMPLE keyword)"));
    }

    let mut out = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        if pos > 0 && !data[pos..].starts_with(b"XTENSION") {
            // Trailing bytes that are not an extension are ignored.
            break;
        }
        let (header, header_len) = Header::parse(&data[pos..])?;
        let size = header.data_size()?;
        let start = pos + header_len;
        let end = start
            .checked_add(size)
            .filter(|&e| e <= data.len())
            .ok_or_else(|| fits_err(format!("HDU {} data is truncated", out.len())))?;
        out.push(Hdu {
            header,
            data: &data[start..end],
        });
        pos = end + padding(size);
    }
    Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Logical,
    Bit,
    Byte,
    I16,
    I32,
    I64,
    Char,
    F32,
    F64,
    Complex32,
    Complex64,
    Descriptor32,
    Descriptor64,
}

impl ColumnKind {
    fn from_code(code: char) -> Option<Self> {
        Some(match code {
            'L' => Self::Logical,
            'X' => Self::Bit,
            'B' => Self::Byte,
            'I' => Self::I16,
            'J' => Self::I32,
            'K' => Self::I64,
            'A' => Self::Char,
            'E' => Self::F32,
            'D' => Self::F64,
            'C' => Self::Complex32,
            'M' => Self::Complex64,
            'P' => Self::Descriptor32,
            'Q' => Self::Descriptor64,
            _ => return None,
        })
    }

    fn width(self, repeat: usize) -> usize {
        match self {
            Self::Bit => repeat.div_ceil(8),
            Self::Logical | Self::Byte | Self::Char => repeat,
            Self::I16 => 2 * repeat,
            Self::I32 | Self::F32 => 4 * repeat,
            Self::I64 | Self::F64 | Self::Complex32 | Self::Descriptor32 => 8 * repeat,
            Self::Complex64 | Self::Descriptor64 => 16 * repeat,
        }
    }

    fn is_integer(self) -> bool {
        matches!(self, Self::Byte | Self::I16 | Self::I32 | Self::I64)
    }

    fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }
}

#[derive(Debug, Clone)]
struct Column {
    name: String,
    kind: ColumnKind,
    repeat: usize,
    offset: usize,
    scale: f64,
    zero: f64,
}

/// Parse a TFORM value such as `D`, `1I` or `16A`.
fn parse_tform(tform: &str) -> Option<(usize, ColumnKind)> {
    let tform = tform.trim();
    let digits = tform.chars().take_while(|c| c.is_ascii_digit()).count();
    let repeat = if digits == 0 {
        1
    } else {
        tform[..digits].parse().ok()?
    };
    let code = tform[digits..].chars().next()?;
    Some((repeat, ColumnKind::from_code(code)?))
}

/// A view of a `BINTABLE` extension.
#[derive(Debug)]
pub struct BinTable<'a> {
    columns: Vec<Column>,
    row_len: usize,
    rows: usize,
    data: &'a [u8],
}

impl<'a> BinTable<'a> {
    pub fn from_hdu(hdu: &Hdu<'a>) -> Result<Self> {
        let h = &hdu.header;
        if h.get_str("XTENSION") != Some("BINTABLE") {
            return Err(fits_err("HDU is not a BINTABLE extension"));
        }
        let row_len = h.require_usize("NAXIS1")?;
        let rows = h.require_usize("NAXIS2")?;
        let fields = h.require_i64("TFIELDS")?;

        // FITS allows at most 999 fields
        let mut columns = Vec::with_capacity(fields.clamp(0, 999) as usize);
        let mut offset = 0;
        for i in 1..=fields {
            let tform = h
                .get_str(&format!("TFORM{}", i))
                .ok_or_else(|| fits_err(format!("Missing TFORM{}", i)))?;
            let (repeat, kind) = parse_tform(tform)
                .ok_or_else(|| fits_err(format!("Unsupported TFORM{} '{}'", i, tform)))?;
            let name = h
                .get_str(&format!("TTYPE{}", i))
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|| format!("COL{}", i));
            columns.push(Column {
                name,
                kind,
                repeat,
                offset,
                scale: h.get_f64(&format!("TSCAL{}", i)).unwrap_or(1.0),
                zero: h.get_f64(&format!("TZERO{}", i)).unwrap_or(0.0),
            });
            offset = repeat
                .checked_mul(16)
                .and_then(|_| offset.checked_add(kind.width(repeat)))
                .ok_or_else(|| fits_err(format!("TFORM{} '{}' is too wide", i, tform)))?;
        }

        if offset > row_len {
            return Err(fits_err(format!(
                "Column widths ({} bytes) exceed NAXIS1 ({})",
                offset, row_len
            )));
        }
        let size = row_len
            .checked_mul(rows)
            .ok_or_else(|| fits_err(format!("Table size {} x {} overflows", row_len, rows)))?;
        if hdu.data.len() < size {
            return Err(fits_err("Table data is truncated"));
        }

        Ok(Self {
            columns,
            row_len,
            rows,
            data: hdu.data,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_ok()
    }

    fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| fits_err(format!("Missing column {}", name)))
    }

    fn scalar_column(&self, name: &str) -> Result<&Column> {
        let col = self.column(name)?;
        if col.repeat != 1 || !(col.kind.is_integer() || col.kind.is_float()) {
            return Err(fits_err(format!(
                "Column {} is not a numeric scalar column",
                name
            )));
        }
        Ok(col)
    }

    /// Raw stored values, before scaling. Integers are widened exactly.
    fn raw_values(&self, col: &Column) -> impl Iterator<Item = RawValue> + '_ {
        let (kind, offset) = (col.kind, col.offset);
        (0..self.rows).map(move |row| {
            let start = row * self.row_len + offset;
            let b = &self.data[start..start + kind.width(1)];
            match kind {
                ColumnKind::Byte => RawValue::Int(b[0] as i64),
                ColumnKind::I16 => RawValue::Int(i16::from_be_bytes([b[0], b[1]]) as i64),
                ColumnKind::I32 => {
                    RawValue::Int(i32::from_be_bytes([b[0], b[1], b[2], b[3]]) as i64)
                }
                ColumnKind::I64 => RawValue::Int(i64::from_be_bytes(to_array(b))),
                ColumnKind::F32 => {
                    RawValue::Float(f32::from_be_bytes([b[0], b[1], b[2], b[3]]) as f64)
                }
                _ => RawValue::Float(f64::from_be_bytes(to_array(b))),
            }
        })
    }

    /// Read a numeric column as physical f64 values (`TSCAL`/`TZERO` applied).
    pub fn read_f64(&self, name: &str) -> Result<Vec<f64>> {
        let col = self.scalar_column(name)?;
        let (scale, zero) = (col.scale, col.zero);
        Ok(self
            .raw_values(col)
            .map(|v| v.as_f64() * scale + zero)
            .collect())
    }

    /// Read a numeric column as integers; every physical value must be
    /// integral and fit in an i64.
    pub fn read_i64(&self, name: &str) -> Result<Vec<i64>> {
        let col = self.scalar_column(name)?;
        // TZERO up to 2^64 covers the unsigned 64-bit convention.
        let exact =
            col.scale == 1.0 && col.zero.fract() == 0.0 && col.zero.abs() <= 2f64.powi(64);
        let (scale, zero) = (col.scale, col.zero);

        self.raw_values(col)
            .enumerate()
            .map(|(row, v)| match v {
                RawValue::Int(i) if exact => {
                    let physical = i as i128 + zero as i128;
                    i64::try_from(physical).map_err(|_| {
                        fits_err(format!(
                            "Column {} row {} value {} is out of range",
                            col.name,
                            row + 1,
                            physical
                        ))
                    })
                }
                v => {
                    let f = v.as_f64() * scale + zero;
                    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                        Ok(f as i64)
                    } else {
                        Err(fits_err(format!(
                            "Column {} row {} is not an integer: {}",
                            col.name,
                            row + 1,
                            f
                        )))
                    }
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
enum RawValue {
    Int(i64),
    Float(f64),
}

impl RawValue {
    fn as_f64(self) -> f64 {
        match self {
            RawValue::Int(i) => i as f64,
            RawValue::Float(f) => f,
        }
    }
}

fn to_array(b: &[u8]) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(&b[..8]);
    out
}

/// First binary table extension that has all the named columns.
fn find_table<'a>(hdus: &[Hdu<'a>], columns: &[&str]) -> Result<(usize, BinTable<'a>)> {
    for (i, hdu) in hdus.iter().enumerate().skip(1) {
        if hdu.header.get_str("XTENSION") != Some("BINTABLE") {
            continue;
        }
        let table = BinTable::from_hdu(hdu)?;
        if columns.iter().all(|c| table.has_column(c)) {
            return Ok((i, table));
        }
    }
    Err(fits_err(format!(
        "No binary table with columns {}",
        columns.join(", ")
    )))
}

fn narrow<T: TryFrom<i64>>(values: Vec<i64>, column: &str) -> Result<Vec<T>> {
    values
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            T::try_from(v).map_err(|_| {
                fits_err(format!(
                    "Column {} row {} value {} is out of range",
                    column,
                    row + 1,
                    v
                ))
            })
        })
        .collect()
}

/// TIMEZERO from the primary header, then from the given extension.
fn timezero(hdus: &[Hdu<'_>], ext: usize) -> Option<f64> {
    hdus.first()
        .and_then(|h| h.header.get_f64("TIMEZERO"))
        .or_else(|| hdus.get(ext).and_then(|h| h.header.get_f64("TIMEZERO")))
}

/// Read a decoded event list (`TIME`, `CHANNEL`, `PCUID`).
pub fn read_events(data: &[u8]) -> Result<LoadedEvents> {
    let hdus = hdus(data)?;
    let (ext, table) = find_table(&hdus, &["TIME", "CHANNEL", "PCUID"])?;

    let events = EventList::from_columns(
        table.read_f64("TIME")?,
        narrow(table.read_i64("CHANNEL")?, "CHANNEL")?,
        narrow(table.read_i64("PCUID")?, "PCUID")?,
    )?;

    let timezero = timezero(&hdus, ext);

    let mut keywords = Vec::new();
    for &key in PROPAGATED_KEYWORDS {
        let card = hdus[0].header.card(key).or_else(|| hdus[ext].header.card(key));
        if let Some(card) = card.filter(|c| c.value.is_some()) {
            keywords.push(card.clone());
        }
    }

    Ok(LoadedEvents {
        events,
        timezero,
        keywords,
    })
}

/// Read the TIMEZERO keyword of an event list.
pub fn read_timezero(data: &[u8]) -> Result<Option<f64>> {
    let hdus = hdus(data)?;
    Ok(timezero(&hdus, 1))
}

/// Read a GTI table (`START`, `STOP`).
pub fn read_intervals(data: &[u8]) -> Result<Vec<Gti>> {
    let hdus = hdus(data)?;
    let (_, table) = find_table(&hdus, &["START", "STOP"])?;
    let starts = table.read_f64("START")?;
    let stops = table.read_f64("STOP")?;
    Ok(starts
        .into_iter()
        .zip(stops)
        .map(|(start, stop)| Gti::new(start, stop))
        .collect())
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Column data for [`write_table`].
#[derive(Debug, Clone)]
pub enum ColumnData<'a> {
    F64(&'a [f64]),
    I16(Vec<i16>),
    I32(Vec<i32>),
}

impl ColumnData<'_> {
    fn len(&self) -> usize {
        match self {
            ColumnData::F64(v) => v.len(),
            ColumnData::I16(v) => v.len(),
            ColumnData::I32(v) => v.len(),
        }
    }

    fn tform(&self) -> &'static str {
        match self {
            ColumnData::F64(_) => "D",
            ColumnData::I16(_) => "I",
            ColumnData::I32(_) => "J",
        }
    }

    fn width(&self) -> usize {
        match self {
            ColumnData::F64(_) => 8,
            ColumnData::I16(_) => 2,
            ColumnData::I32(_) => 4,
        }
    }

    fn write_row<W: Write + ?Sized>(&self, row: usize, w: &mut W) -> std::io::Result<()> {
        match self {
            ColumnData::F64(v) => w.write_all(&v[row].to_be_bytes()),
            ColumnData::I16(v) => w.write_all(&v[row].to_be_bytes()),
            ColumnData::I32(v) => w.write_all(&v[row].to_be_bytes()),
        }
    }
}

/// A named output column.
#[derive(Debug, Clone)]
pub struct TableColumn<'a> {
    pub name: &'a str,
    pub unit: Option<&'a str>,
    pub data: ColumnData<'a>,
}

/// Primary header for a file whose data lives in extensions.
pub fn primary_header(cards: &[Card]) -> Header {
    let mut h = Header::new();
    h.set(Card::new("SIMPLE", Value::Logical(true)).with_comment("file conforms to FITS standard"));
    h.set(Card::new("BITPIX", Value::Int(8)));
    h.set(Card::new("NAXIS", Value::Int(0)).with_comment("no data in primary HDU"));
    h.set(Card::new("EXTEND", Value::Logical(true)));
    for card in cards {
        h.set(card.clone());
    }
    h
}

/// Write a primary header followed by one binary table extension.
pub fn write_table<W: Write + ?Sized>(
    w: &mut W,
    primary: &Header,
    extname: &str,
    ext_cards: &[Card],
    columns: &[TableColumn<'_>],
) -> Result<()> {
    let rows = columns.first().map_or(0, |c| c.data.len());
    if let Some(bad) = columns.iter().find(|c| c.data.len() != rows) {
        return Err(fits_err(format!(
            "Column {} has {} rows, expected {}",
            bad.name,
            bad.data.len(),
            rows
        )));
    }
    let row_len: usize = columns.iter().map(|c| c.data.width()).sum();

    let mut h = Header::new();
    h.set(Card::new("XTENSION", Value::Str("BINTABLE".into())).with_comment("binary table extension"));
    h.set(Card::new("BITPIX", Value::Int(8)));
    h.set(Card::new("NAXIS", Value::Int(2)));
    h.set(Card::new("NAXIS1", Value::Int(row_len as i64)).with_comment("bytes per row"));
    h.set(Card::new("NAXIS2", Value::Int(rows as i64)).with_comment("number of rows"));
    h.set(Card::new("PCOUNT", Value::Int(0)));
    h.set(Card::new("GCOUNT", Value::Int(1)));
    h.set(Card::new("TFIELDS", Value::Int(columns.len() as i64)));
    for (i, col) in columns.iter().enumerate() {
        let n = i + 1;
        h.set(Card::new(&format!("TTYPE{}", n), Value::Str(col.name.into())));
        h.set(Card::new(&format!("TFORM{}", n), Value::Str(col.data.tform().into())));
        if let Some(unit) = col.unit {
            h.set(Card::new(&format!("TUNIT{}", n), Value::Str(unit.into())));
        }
    }
    h.set(Card::new("EXTNAME", Value::Str(extname.into())));
    for card in ext_cards {
        h.set(card.clone());
    }

    primary.write_to(w)?;
    h.write_to(w)?;
    for row in 0..rows {
        for col in columns {
            col.data.write_row(row, w)?;
        }
    }
    w.write_all(&vec![0u8; padding(rows * row_len)])?;
    Ok(())
}

/// Event columns in output layout. CHANNEL is written as 16-bit unless a
/// value needs more.
pub fn event_columns(events: &EventList) -> Vec<TableColumn<'_>> {
    let channels = if events.channels().iter().all(|&c| c <= i16::MAX as u16) {
        ColumnData::I16(events.channels().iter().map(|&c| c as i16).collect())
    } else {
        ColumnData::I32(events.channels().iter().map(|&c| c as i32).collect())
    };
    vec![
        TableColumn {
            name: "TIME",
            unit: Some("s"),
            data: ColumnData::F64(events.times()),
        },
        TableColumn {
            name: "CHANNEL",
            unit: None,
            data: channels,
        },
        TableColumn {
            name: "PCUID",
            unit: None,
            data: ColumnData::I16(events.detector_ids().iter().map(|&d| d as i16).collect()),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;

    fn sample_events() -> EventList {
        EventList::from(vec![
            Event::new(100.5, 12, 0),
            Event::new(101.25, 63, 2),
            Event::new(102.0, 7, 4),
        ])
    }

    fn event_file(events: &EventList, primary_cards: &[Card]) -> Vec<u8> {
        let mut buf = Vec::new();
        write_table(
            &mut buf,
            &primary_header(primary_cards),
            "EVENTS",
            &[],
            &event_columns(events),
        )
        .unwrap();
        buf
    }

    #[test]
    fn test_card_formatting() {
        let card = Card::new("NEVENTS", Value::Int(42)).with_comment("events");
        let bytes = card.to_bytes();
        let text = std::str::from_utf8(&bytes).unwrap();
        assert_eq!(text.len(), 80);
        assert!(text.starts_with("NEVENTS =                   42 / events"));

        let card = Card::new("OBJECT", Value::Str("GX 339-4's".into()));
        let text = String::from_utf8(card.to_bytes().to_vec()).unwrap();
        assert!(text.starts_with("OBJECT  = 'GX 339-4''s'"));
    }

    #[test]
    fn test_card_parse_round_trip() {
        let cards = [
            Card::new("TIMEZERO", Value::Float(3.378431500000000e+00)).with_comment("clock"),
            Card::new("OBJECT", Value::Str("it's".into())),
            Card::new("EXTEND", Value::Logical(true)),
            Card::new("NAXIS2", Value::Int(-7)),
            Card::new("TSTART", Value::Float(1.0e20)),
        ];
        for card in cards {
            assert_eq!(Card::parse(&card.to_bytes()).unwrap(), card);
        }
    }

    #[test]
    fn test_long_string_stays_quoted() {
        let path = "/data/".repeat(30);
        let card = Card::new("RAW_EVT", Value::Str(path.clone()));
        let parsed = Card::parse(&card.to_bytes()).unwrap();
        let Some(Value::Str(s)) = parsed.value else {
            panic!("expected string value");
        };
        assert_eq!(s.len(), MAX_STRING_LEN);
        assert!(path.starts_with(&s));
    }

    #[test]
    fn test_card_parse_fortran_exponent() {
        let mut raw = [b' '; 80];
        let text = b"TIMEZERO=   3.37843150000000D+00 / clock correction";
        raw[..text.len()].copy_from_slice(text);
        let card = Card::parse(&raw).unwrap();
        assert_eq!(card.value, Some(Value::Float(3.3784315)));
        assert_eq!(card.comment.as_deref(), Some("clock correction"));
    }

    #[test]
    fn test_header_block_alignment() {
        let buf = event_file(&sample_events(), &[]);
        assert!(is_fits(&buf));
        assert_eq!(buf.len() % BLOCK_SIZE, 0);
        // Primary header, extension header, one data block
        assert_eq!(buf.len(), 3 * BLOCK_SIZE);
    }

    #[test]
    fn test_read_events() {
        let events = sample_events();
        let buf = event_file(
            &events,
            &[
                Card::new("TIMEZERO", Value::Float(3.5)),
                Card::new("OBS_ID", Value::Str("95409-01-18-05".into())),
                Card::new("ORIGIN", Value::Str("local".into())),
            ],
        );

        let loaded = read_events(&buf).unwrap();
        assert_eq!(loaded.events, events);
        assert_eq!(loaded.timezero, Some(3.5));
        assert_eq!(loaded.keywords.len(), 1);
        assert_eq!(loaded.keywords[0].keyword, "OBS_ID");
        assert_eq!(read_timezero(&buf).unwrap(), Some(3.5));
    }

    #[test]
    fn test_read_intervals() {
        let starts = [0.0, 50.0];
        let stops = [10.0, 75.5];
        let mut buf = Vec::new();
        write_table(
            &mut buf,
            &primary_header(&[]),
            "STDGTI",
            &[],
            &[
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
            ],
        )
        .unwrap();

        let gtis = read_intervals(&buf).unwrap();
        assert_eq!(gtis, vec![Gti::new(0.0, 10.0), Gti::new(50.0, 75.5)]);
    }

    #[test]
    fn test_scaled_integer_column() {
        // Unsigned 16-bit convention: TZERO = 32768
        let raw: Vec<i16> = vec![-32768, 0, 32767];
        let mut buf = Vec::new();
        write_table(
            &mut buf,
            &primary_header(&[]),
            "DATA",
            &[Card::new("TZERO1", Value::Int(32768))],
            &[TableColumn {
                name: "VAL",
                unit: None,
                data: ColumnData::I16(raw),
            }],
        )
        .unwrap();

        let hdus = hdus(&buf).unwrap();
        let table = BinTable::from_hdu(&hdus[1]).unwrap();
        assert_eq!(table.read_i64("VAL").unwrap(), vec![0, 32768, 65535]);
        assert_eq!(table.read_f64("val").unwrap(), vec![0.0, 32768.0, 65535.0]);
    }

    #[test]
    fn test_missing_columns() {
        let buf = event_file(&sample_events(), &[]);
        assert!(read_intervals(&buf).is_err());
    }

    #[test]
    fn test_truncated_file() {
        let buf = event_file(&sample_events(), &[]);
        assert!(hdus(&buf[..2 * BLOCK_SIZE + 10]).is_err());
        assert!(hdus(b"not fits").is_err());
    }

    #[test]
    fn test_wide_channels_use_32_bit() {
        let events = EventList::from(vec![Event::new(1.0, 40000, 1)]);
        let buf = event_file(&events, &[]);
        let loaded = read_events(&buf).unwrap();
        assert_eq!(loaded.events.channels(), &[40000]);
    }

    /// Primary header, one extension with `cards`, then `data` padded to a
    /// block.
    fn raw_table(cards: &[Card], data: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        primary_header(&[]).write_to(&mut buf).unwrap();
        let mut h = Header::new();
        for card in cards {
            h.set(card.clone());
        }
        h.write_to(&mut buf).unwrap();
        buf.extend_from_slice(data);
        buf.resize(buf.len() + padding(data.len()), 0);
        buf
    }

    fn bintable_cards(naxis1: i64, naxis2: i64, columns: &[(&str, &str)]) -> Vec<Card> {
        let mut cards = vec![
            Card::new("XTENSION", Value::Str("BINTABLE".into())),
            Card::new("BITPIX", Value::Int(8)),
            Card::new("NAXIS", Value::Int(2)),
            Card::new("NAXIS1", Value::Int(naxis1)),
            Card::new("NAXIS2", Value::Int(naxis2)),
            Card::new("PCOUNT", Value::Int(0)),
            Card::new("GCOUNT", Value::Int(1)),
            Card::new("TFIELDS", Value::Int(columns.len() as i64)),
        ];
        for (i, (name, tform)) in columns.iter().enumerate() {
            cards.push(Card::new(&format!("TTYPE{}", i + 1), Value::Str(name.to_string())));
            cards.push(Card::new(&format!("TFORM{}", i + 1), Value::Str(tform.to_string())));
        }
        cards
    }

    #[test]
    fn test_negative_table_dimensions() {
        // The product is +8, so the data unit itself looks consistent
        let cards = bintable_cards(-8, -1, &[("START", "D"), ("STOP", "D")]);
        let buf = raw_table(&cards, &[0u8; 8]);

        let err = read_intervals(&buf).unwrap_err();
        assert!(matches!(err, GtiError::Fits(_)));
        assert!(err.to_string().contains("NAXIS1"));
    }

    #[test]
    fn test_oversized_repeat_count() {
        let cards = bintable_cards(8, 1, &[("START", "D"), ("STOP", "9223372036854775807D")]);
        let buf = raw_table(&cards, &[0u8; 8]);
        assert!(matches!(read_intervals(&buf), Err(GtiError::Fits(_))));
    }

    #[test]
    fn test_unsigned_64_bit_column() {
        let mut cards = bintable_cards(8, 2, &[("VAL", "K")]);
        cards.push(Card::new("TZERO1", Value::Float(9223372036854775808.0)));
        let mut data = Vec::new();
        data.extend_from_slice(&i64::MIN.to_be_bytes());
        data.extend_from_slice(&(-1i64).to_be_bytes());
        let buf = raw_table(&cards, &data);

        let parsed = hdus(&buf).unwrap();
        let table = BinTable::from_hdu(&parsed[1]).unwrap();
        assert_eq!(table.read_i64("VAL").unwrap(), vec![0, i64::MAX]);

        // Physical value 2^63 does not fit
        let mut data = Vec::new();
        data.extend_from_slice(&0i64.to_be_bytes());
        data.extend_from_slice(&7i64.to_be_bytes());
        let buf = raw_table(&cards, &data);
        let parsed = hdus(&buf).unwrap();
        let table = BinTable::from_hdu(&parsed[1]).unwrap();
        assert!(matches!(table.read_i64("VAL"), Err(GtiError::Fits(_))));
    }

    #[test]
    fn test_parse_tform() {
        assert_eq!(parse_tform("D"), Some((1, ColumnKind::F64)));
        assert_eq!(parse_tform("1I"), Some((1, ColumnKind::I16)));
        assert_eq!(parse_tform("16A"), Some((16, ColumnKind::Char)));
        assert_eq!(parse_tform("Z"), None);
    }
}
