// Clippy allows for the whole crate
#![allow(clippy::should_implement_trait)]

//! gtifilt: Good Time Interval filtering for X-ray timing event lists
//!
//! This library keeps the photon events that fall inside a set of good time
//! intervals, after applying the observation's clock offset (TIMEZERO).
//!
//! # Features
//!
//! - **Binary-search filter**: each interval selects one contiguous run of
//!   the time-sorted event list
//! - **Text and FITS tables**: event lists and GTIs in either layout
//! - **Parallel batches**: many event lists filtered at once with Rayon
//!
//! # Example
//!
//! ```rust,no_run
//! use gtifilt::{filter, table};
//!
//! let loaded = table::load_events("events.dat").unwrap();
//! let intervals = table::load_intervals("obs.gti").unwrap();
//!
//! let offset = loaded.timezero.unwrap_or(0.0);
//! let good = filter(&loaded.events, &intervals, offset).unwrap();
//! ```

pub mod commands;
pub mod config;
pub mod error;
pub mod event;
pub mod filter;
pub mod gti;
pub mod parallel;
pub mod table;

// Re-export commonly used types
pub use config::{FilterConfig, GtiFrame, IntervalPolicy};
pub use error::{GtiError, Result};
pub use event::{Event, EventList};
pub use filter::{filter, FilterStats, Filtered, GtiFilter};
pub use gti::{Gti, Placement};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::commands::{ApplyGtiCommand, BatchCommand, EnergyCommand, SimulateCommand};
    pub use crate::config::{FilterConfig, GtiFrame, IntervalPolicy};
    pub use crate::event::{Event, EventList};
    pub use crate::filter::{filter, GtiFilter};
    pub use crate::gti::Gti;
    pub use crate::table::{load_events, load_intervals};
}
