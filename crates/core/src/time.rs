//! Display timezone handling.
//!
//! All instants are stored in UTC; conversion to a local zone happens only
//! when rendering alerts and dashboard buckets.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// IANA zone used when none is configured.
pub const DEFAULT_DISPLAY_TIMEZONE: &str = "Asia/Manila";

/// A fixed IANA timezone used for human-facing timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayZone(Tz);

impl DisplayZone {
    pub fn new(tz: Tz) -> Self {
        Self(tz)
    }

    pub fn tz(&self) -> Tz {
        self.0
    }

    pub fn name(&self) -> &'static str {
        self.0.name()
    }

    pub fn localize(&self, instant: DateTime<Utc>) -> DateTime<Tz> {
        instant.with_timezone(&self.0)
    }

    /// `M/D/YYYY, h:mm:ss AM` in this zone.
    pub fn format(&self, instant: DateTime<Utc>) -> String {
        self.localize(instant)
            .format("%-m/%-d/%Y, %-I:%M:%S %p")
            .to_string()
    }
}

impl Default for DisplayZone {
    fn default() -> Self {
        Self(chrono_tz::Asia::Manila)
    }
}

impl FromStr for DisplayZone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<Tz>()
            .map(Self)
            .map_err(|e| format!("invalid timezone {s:?}: {e}"))
    }
}

impl fmt::Display for DisplayZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
