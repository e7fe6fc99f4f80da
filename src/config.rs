//! Filter configuration.
//!
//! Every option that changes which events survive lives in [`FilterConfig`]
//! and is passed explicitly to each filter call. There is no process-wide
//! state, so concurrent filter invocations cannot influence one another.

/// Clock frame of the supplied interval boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GtiFrame {
    /// Intervals have not been corrected with TIMEZERO yet; the offset is
    /// added to interval boundaries as well as to event times.
    #[default]
    Raw,
    /// Intervals are already in the corrected epoch; only event times are
    /// shifted.
    Corrected,
}

impl GtiFrame {
    /// Parse frame from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "raw" => Some(Self::Raw),
            "corrected" => Some(Self::Corrected),
            _ => None,
        }
    }
}

/// How unsorted or overlapping interval lists are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntervalPolicy {
    /// Process intervals in the given order. Events inside an overlap are
    /// emitted once per interval that covers them, and output order follows
    /// interval order.
    #[default]
    AsGiven,
    /// Require intervals sorted by start and pairwise disjoint; anything
    /// else is a configuration error. Output is then strictly time ordered
    /// and free of duplicates.
    RequireDisjoint,
}

impl IntervalPolicy {
    /// Parse policy from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "as-given" | "as_given" | "asgiven" => Some(Self::AsGiven),
            "require-disjoint" | "require_disjoint" | "disjoint" => Some(Self::RequireDisjoint),
            _ => None,
        }
    }
}

/// Options for a single filter invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FilterConfig {
    pub frame: GtiFrame,
    pub policy: IntervalPolicy,
    /// Reject intervals with `start > stop` (or NaN bounds).
    pub check_bounds: bool,
}

impl FilterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_frame(mut self, frame: GtiFrame) -> Self {
        self.frame = frame;
        self
    }

    pub fn with_policy(mut self, policy: IntervalPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_bounds_check(mut self, enabled: bool) -> Self {
        self.check_bounds = enabled;
        self
    }
}
