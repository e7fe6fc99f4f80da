//! Time-order validation for event lists.
//!
//! The filter's boundary search requires events sorted by time. Loaders do
//! not sort, so callers verify the order before filtering unless the input
//! is known to be ordered.

use crate::error::{GtiError, Result};
use crate::event::EventList;

/// Verify that event times are non-decreasing.
///
/// Returns Ok(()) if ordered, Err naming the first offending event if not.
/// NaN times are reported as out of order.
#[allow(clippy::neg_cmp_op_on_partial_ord)]
pub fn verify_time_ordered(events: &EventList) -> Result<()> {
    let times = events.times();
    if let Some(t) = times.first().filter(|t| t.is_nan()) {
        return Err(GtiError::InvalidFormat(format!(
            "Events not time ordered: event 1 has time {}",
            t
        )));
    }
    for (i, pair) in times.windows(2).enumerate() {
        if !(pair[0] <= pair[1]) {
            return Err(GtiError::InvalidFormat(format!(
                "Events not time ordered: event {} at t={} comes after t={}",
                i + 2,
                pair[1],
                pair[0]
            )));
        }
    }
    Ok(())
}
