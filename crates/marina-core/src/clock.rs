//! Calendar dates for arrivals and departures, and the clock that stamps
//! them.
//!
//! Dates are rendered `M/D/YYYY` without zero padding (`3/7/2024`), which is
//! the format stored on slip records.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// A calendar day on which a boat arrived at or departed from a slip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DockDate(NaiveDate);

impl DockDate {
    /// Builds a date from its components, or `None` if it does not exist.
    #[must_use]
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }
}

impl From<NaiveDate> for DockDate {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl fmt::Display for DockDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.0.month(), self.0.day(), self.0.year())
    }
}

/// A string that is not a valid `M/D/YYYY` date.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid dock date '{value}': expected M/D/YYYY")]
pub struct DockDateParseError {
    /// The rejected input.
    pub value: String,
}

impl FromStr for DockDate {
    type Err = DockDateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || DockDateParseError {
            value: s.to_string(),
        };
        let mut parts = s.split('/');
        let (Some(month), Some(day), Some(year), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(err());
        };

        let month: u32 = month.parse().map_err(|_| err())?;
        let day: u32 = day.parse().map_err(|_| err())?;
        let year: i32 = year.parse().map_err(|_| err())?;
        Self::from_ymd(year, month, day).ok_or_else(err)
    }
}

impl Serialize for DockDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DockDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Source of "today" for occupancy transitions.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Returns the current calendar date.
    fn today(&self) -> DockDate;
}

/// Wall-clock date in the local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> DockDate {
        DockDate(Local::now().date_naive())
    }
}

/// A clock pinned to a single date. Used by tests and replay tooling.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(DockDate);

impl FixedClock {
    /// Creates a clock that always reports `date`.
    #[must_use]
    pub const fn new(date: DockDate) -> Self {
        Self(date)
    }
}

impl Clock for FixedClock {
    fn today(&self) -> DockDate {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_has_no_zero_padding() {
        let date = DockDate::from_ymd(2015, 1, 1).unwrap();
        assert_eq!(date.to_string(), "1/1/2015");

        let date = DockDate::from_ymd(2014, 11, 4).unwrap();
        assert_eq!(date.to_string(), "11/4/2014");
    }

    #[test]
    fn test_parse_accepts_unpadded_and_padded() {
        assert_eq!(
            "3/7/2024".parse::<DockDate>().unwrap(),
            DockDate::from_ymd(2024, 3, 7).unwrap()
        );
        assert_eq!(
            "03/07/2024".parse::<DockDate>().unwrap(),
            DockDate::from_ymd(2024, 3, 7).unwrap()
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", "2024-03-07", "3/7", "3/7/2024/1", "2/30/2024", "a/b/c"] {
            assert!(bad.parse::<DockDate>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_serde_uses_display_format() {
        let date = DockDate::from_ymd(2024, 12, 25).unwrap();
        let json = serde_json::to_string(&date).unwrap();
        assert_eq!(json, "\"12/25/2024\"");
        let back: DockDate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, date);
    }

    #[test]
    fn test_fixed_clock_reports_its_date() {
        let date = DockDate::from_ymd(2020, 2, 29).unwrap();
        assert_eq!(FixedClock::new(date).today(), date);
    }
}
