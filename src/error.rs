//! Error type shared by loaders, the filter core and sinks.

use std::io;
use thiserror::Error;

/// Errors that can occur while loading, filtering or writing event lists.
#[derive(Error, Debug)]
pub enum GtiError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Non-finite clock offset, malformed interval or an interval list that
    /// violates the selected interval policy.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Parallel event columns of unequal length. Never recovered.
    #[error(
        "Shape mismatch in {context}: {times} times, {channels} channels, {detectors} detector ids"
    )]
    ShapeMismatch {
        context: &'static str,
        times: usize,
        channels: usize,
        detectors: usize,
    },

    #[error("FITS error: {0}")]
    Fits(String),
}

pub type Result<T> = std::result::Result<T, GtiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let e = GtiError::Parse {
            line: 7,
            message: "Invalid time: 'abc'".to_string(),
        };
        assert_eq!(e.to_string(), "Parse error at line 7: Invalid time: 'abc'");

        let e = GtiError::ShapeMismatch {
            context: "input",
            times: 3,
            channels: 2,
            detectors: 3,
        };
        assert_eq!(
            e.to_string(),
            "Shape mismatch in input: 3 times, 2 channels, 3 detector ids"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "missing");
        let e: GtiError = io_err.into();
        assert!(matches!(e, GtiError::Io(_)));
    }
}
