//! Zero-allocation parsing of whitespace-delimited tables.
//!
//! These helpers work directly on byte slices (typically a memory-mapped
//! file) and never allocate in the per-line path.

use memchr::memchr;

/// Fast u64 parsing - no allocation, no error formatting.
///
/// Returns None if the input is empty or contains non-digit characters.
#[inline(always)]
pub fn parse_u64_fast(bytes: &[u8]) -> Option<u64> {
    if bytes.is_empty() {
        return None;
    }
    let mut n: u64 = 0;
    for &b in bytes {
        let d = b.wrapping_sub(b'0');
        if d > 9 {
            return None;
        }
        n = n.checked_mul(10)?.checked_add(d as u64)?;
    }
    Some(n)
}

/// Parse a decimal or exponent-notation float.
#[inline]
pub fn parse_f64(bytes: &[u8]) -> Option<f64> {
    std::str::from_utf8(bytes).ok()?.parse().ok()
}

/// Parse an unsigned integer that may have been written as a float
/// (`3.000000000000000000e+00` in tables dumped with `%.18e`).
#[inline]
pub fn parse_index(bytes: &[u8]) -> Option<u64> {
    if let Some(n) = parse_u64_fast(bytes) {
        return Some(n);
    }
    let f = parse_f64(bytes)?;
    if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 {
        Some(f as u64)
    } else {
        None
    }
}

/// Split a line into fields separated by runs of ASCII whitespace.
#[inline]
pub fn fields(line: &[u8]) -> impl Iterator<Item = &[u8]> {
    line.split(|b| b.is_ascii_whitespace())
        .filter(|f| !f.is_empty())
}

/// Strip leading and trailing ASCII whitespace (including `\r`).
#[inline]
pub fn trim(line: &[u8]) -> &[u8] {
    let start = line
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(line.len());
    let end = line
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |p| p + 1);
    &line[start..end]
}

/// Check if a (trimmed) line should be skipped: empty or a `#` comment.
#[inline(always)]
pub fn should_skip_line(line: &[u8]) -> bool {
    line.is_empty() || line[0] == b'#'
}

/// Iterator over `(line_number, line)` pairs, 1-based, newline excluded.
pub struct Lines<'a> {
    data: &'a [u8],
    pos: usize,
    line_number: usize,
}

impl<'a> Lines<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            line_number: 0,
        }
    }
}

impl<'a> Iterator for Lines<'a> {
    type Item = (usize, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.data.len() {
            return None;
        }
        let rest = &self.data[self.pos..];
        let len = memchr(b'\n', rest).unwrap_or(rest.len());
        self.pos += len + 1;
        self.line_number += 1;
        Some((self.line_number, &rest[..len]))
    }
}

/// Value of a `# KEY: value` or `# KEY = value` comment line, if the line
/// is such a comment for `key` (case-insensitive).
pub fn comment_value<'a>(line: &'a [u8], key: &str) -> Option<&'a [u8]> {
    let body = trim(line.strip_prefix(b"#")?);
    if body.len() <= key.len() || !body[..key.len()].eq_ignore_ascii_case(key.as_bytes()) {
        return None;
    }
    let rest = trim(&body[key.len()..]);
    let rest = rest
        .strip_prefix(b":")
        .or_else(|| rest.strip_prefix(b"="))?;
    Some(trim(rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_u64_fast() {
        assert_eq!(parse_u64_fast(b"12345"), Some(12345));
        assert_eq!(parse_u64_fast(b"0"), Some(0));
        assert_eq!(parse_u64_fast(b""), None);
        assert_eq!(parse_u64_fast(b"abc"), None);
        assert_eq!(parse_u64_fast(b"123abc"), None);
        assert_eq!(parse_u64_fast(b"18446744073709551615"), Some(u64::MAX));
        assert_eq!(parse_u64_fast(b"18446744073709551616"), None);
    }

    #[test]
    fn test_parse_index() {
        assert_eq!(parse_index(b"42"), Some(42));
        assert_eq!(parse_index(b"4.200000000000000000e+01"), Some(42));
        assert_eq!(parse_index(b"4.5"), None);
        assert_eq!(parse_index(b"-1"), None);
    }

    #[test]
    fn test_fields() {
        let f: Vec<&[u8]> = fields(b"  1.5\t 3   0 ").collect();
        assert_eq!(f, vec![&b"1.5"[..], &b"3"[..], &b"0"[..]]);
    }

    #[test]
    fn test_lines() {
        let lines: Vec<_> = Lines::new(b"a\nbb\r\n\nc").collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], (1, &b"a"[..]));
        assert_eq!(trim(lines[1].1), b"bb");
        assert_eq!(lines[2], (3, &b""[..]));
        assert_eq!(lines[3], (4, &b"c"[..]));
    }

    #[test]
    fn test_should_skip_line() {
        assert!(should_skip_line(b""));
        assert!(should_skip_line(b"# Column 1: TIME"));
        assert!(!should_skip_line(b"1.0\t2\t0"));
    }

    #[test]
    fn test_comment_value() {
        assert_eq!(comment_value(b"# TIMEZERO: 3.5", "TIMEZERO"), Some(&b"3.5"[..]));
        assert_eq!(comment_value(b"#timezero = -1", "TIMEZERO"), Some(&b"-1"[..]));
        assert_eq!(comment_value(b"# Column 1: TIME", "TIMEZERO"), None);
        assert_eq!(comment_value(b"1.0 2 3", "TIMEZERO"), None);
    }
}
