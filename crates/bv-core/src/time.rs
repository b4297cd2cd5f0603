//! Clock times as validated minutes since midnight.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minutes in one operating day. `24:00` is a valid end-of-day boundary.
pub const MINUTES_PER_DAY: u16 = 1440;

/// Validation errors for time values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimeError {
    /// The minute count was outside `[0, 1440]`.
    #[error("minutes out of range: {minutes} (valid 0..=1440)")]
    OutOfRange { minutes: i64 },

    /// The text did not look like a time of day.
    #[error("unparseable time: {value:?}")]
    Unparseable { value: String },
}

/// A time of day (or a visit duration) in whole minutes.
///
/// Valid values span `00:00` through `24:00` inclusive; construction
/// validates the range, so a `ClockTime` in hand never needs re-checking.
/// The spec's "canonical invalid time" maps to `Option<ClockTime>` /
/// `Err(TimeError)` at the parse site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime(u16);

impl ClockTime {
    /// The start of the day (`00:00`).
    pub const MIDNIGHT: Self = Self(0);

    /// The end-of-day boundary (`24:00`).
    pub const END_OF_DAY: Self = Self(MINUTES_PER_DAY);

    /// Creates a time after validating the minute range.
    pub fn new(minutes: u16) -> Result<Self, TimeError> {
        if minutes > MINUTES_PER_DAY {
            return Err(TimeError::OutOfRange {
                minutes: i64::from(minutes),
            });
        }
        Ok(Self(minutes))
    }

    /// Creates a time, clamping to `[0, 1440]`.
    #[must_use]
    pub const fn clamped(minutes: u16) -> Self {
        if minutes > MINUTES_PER_DAY {
            Self(MINUTES_PER_DAY)
        } else {
            Self(minutes)
        }
    }

    /// The current local wall-clock minute.
    #[must_use]
    pub fn now() -> Self {
        use chrono::Timelike;

        let local = chrono::Local::now();
        let minutes = local.hour() * 60 + local.minute();
        // hour() <= 23 and minute() <= 59, so this always fits
        u16::try_from(minutes).map_or(Self::MIDNIGHT, Self::clamped)
    }

    /// Parses leniently, returning `None` for anything unrecognizable.
    ///
    /// Accepted forms: `HH:MM`, `H:MM`, `HHMM`, `HMM`, and the sentinel
    /// `"now"`.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        text.parse().ok()
    }

    /// Minutes since midnight.
    #[must_use]
    pub const fn minutes(self) -> u16 {
        self.0
    }

    /// The hour component.
    #[must_use]
    pub const fn hour(self) -> u16 {
        self.0 / 60
    }

    /// The minute-of-hour component.
    #[must_use]
    pub const fn minute(self) -> u16 {
        self.0 % 60
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for ClockTime {
    type Err = TimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        if text.eq_ignore_ascii_case("now") {
            return Ok(Self::now());
        }
        let unparseable = || TimeError::Unparseable {
            value: s.to_string(),
        };
        let (hours_part, minutes_part) = if let Some((h, m)) = text.split_once(':') {
            (h, m)
        } else if text.len() >= 3 && text.len() <= 4 && text.bytes().all(|b| b.is_ascii_digit()) {
            text.split_at(text.len() - 2)
        } else {
            return Err(unparseable());
        };
        if hours_part.is_empty()
            || hours_part.len() > 2
            || minutes_part.len() != 2
            || !hours_part.bytes().all(|b| b.is_ascii_digit())
            || !minutes_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(unparseable());
        }
        let hours: u16 = hours_part.parse().map_err(|_| unparseable())?;
        let minutes: u16 = minutes_part.parse().map_err(|_| unparseable())?;
        if minutes > 59 {
            return Err(unparseable());
        }
        Self::new(hours * 60 + minutes)
    }
}

impl TryFrom<String> for ClockTime {
    type Error = TimeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ClockTime> for String {
    fn from(time: ClockTime) -> Self {
        time.to_string()
    }
}

/// Coercion seam used by the statistics functions.
///
/// Anything that can be read as validated minutes: `ClockTime` itself,
/// integer minute counts, and `HH:MM`-style text. Values that fail
/// coercion yield `None` and are excluded from statistics, never an error.
pub trait ToMinutes {
    /// The value as minutes since midnight, or `None` if it does not
    /// coerce to a valid time.
    fn to_minutes(&self) -> Option<u16>;
}

impl ToMinutes for ClockTime {
    fn to_minutes(&self) -> Option<u16> {
        Some(self.0)
    }
}

impl ToMinutes for u16 {
    fn to_minutes(&self) -> Option<u16> {
        (*self <= MINUTES_PER_DAY).then_some(*self)
    }
}

impl ToMinutes for u32 {
    fn to_minutes(&self) -> Option<u16> {
        u16::try_from(*self).ok().and_then(|m| m.to_minutes())
    }
}

impl ToMinutes for i64 {
    fn to_minutes(&self) -> Option<u16> {
        u16::try_from(*self).ok().and_then(|m| m.to_minutes())
    }
}

impl ToMinutes for str {
    fn to_minutes(&self) -> Option<u16> {
        ClockTime::parse(self).map(ClockTime::minutes)
    }
}

impl ToMinutes for String {
    fn to_minutes(&self) -> Option<u16> {
        self.as_str().to_minutes()
    }
}

impl<T: ToMinutes + ?Sized> ToMinutes for &T {
    fn to_minutes(&self) -> Option<u16> {
        (**self).to_minutes()
    }
}

impl<T: ToMinutes> ToMinutes for Option<T> {
    fn to_minutes(&self) -> Option<u16> {
        self.as_ref().and_then(ToMinutes::to_minutes)
    }
}
