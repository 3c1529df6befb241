use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Datelike, NaiveDate, TimeZone};

use crate::{error::PlannerError, utils::clock::Clock};

/// Canonical identifier of a planner day. Always rendered as `YYYY-MM-DD` in the user's local
/// calendar, which is also the format records are stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateKey(NaiveDate);

const MIN_YEAR: i32 = 0;
const MAX_YEAR: i32 = 9999;

impl DateKey {
    pub fn new(date: NaiveDate) -> Option<Self> {
        (MIN_YEAR..=MAX_YEAR).contains(&date.year()).then_some(Self(date))
    }

    /// Key for the calendar day containing `instant`, as seen in the instant's own offset.
    /// 23:00 at -05:00 stays on the same day even though it is already tomorrow in UTC.
    pub fn from_instant<Tz: TimeZone>(instant: &DateTime<Tz>) -> Option<Self> {
        Self::new(instant.date_naive())
    }

    /// Key for the user's current local day.
    pub fn today(clock: &dyn Clock) -> Option<Self> {
        Self::from_instant(&clock.now())
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    pub fn previous(&self) -> Option<Self> {
        self.0.pred_opt().and_then(Self::new)
    }

    pub fn next(&self) -> Option<Self> {
        self.0.succ_opt().and_then(Self::new)
    }

    /// Returns keys from `self` to `end`, both inclusive. Empty when `end` is before `self`.
    pub fn days_until(self, end: DateKey) -> impl Iterator<Item = DateKey> {
        std::iter::successors(Some(self), |v| v.next()).take_while(move |v| *v <= end)
    }
}

impl Display for DateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for DateKey {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || PlannerError::MalformedKey(s.to_string());

        // chrono accepts unpadded fields and signed years, so the shape is checked by hand first.
        let bytes = s.as_bytes();
        let shape_ok = bytes.len() == 10
            && bytes.iter().enumerate().all(|(i, b)| match i {
                4 | 7 => *b == b'-',
                _ => b.is_ascii_digit(),
            });
        if !shape_ok {
            return Err(malformed());
        }

        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .and_then(Self::new)
            .ok_or_else(malformed)
    }
}
