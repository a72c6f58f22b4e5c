use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The voting window of a campaign, derived purely from its configured
/// start and end times and the current time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindowState {
    /// The window has not opened yet.
    Scheduled,
    /// Votes may be cast.
    InProgress,
    /// The window has closed.
    Finished,
    /// The campaign has no complete window configured.
    Inactive,
}

impl WindowState {
    /// Derive the window state at `now`. Both ends of the window are inclusive.
    pub fn derive(
        now: DateTime<Utc>,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        match (start, end) {
            (Some(start), Some(end)) => {
                if now < start {
                    Self::Scheduled
                } else if now > end {
                    Self::Finished
                } else {
                    Self::InProgress
                }
            }
            _ => Self::Inactive,
        }
    }

    pub fn is_open(self) -> bool {
        self == Self::InProgress
    }
}

impl Display for WindowState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let state = match self {
            Self::Scheduled => "scheduled",
            Self::InProgress => "in progress",
            Self::Finished => "finished",
            Self::Inactive => "inactive",
        };
        write!(f, "{state}")
    }
}

/// A source of the current time.
///
/// Window state must be evaluated against a fresh reading on every check,
/// so anything that gates votes asks the clock rather than holding a timestamp.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real wall clock.
#[derive(Debug, Default, Copy, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at a single instant.
#[derive(Debug, Copy, Clone)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
