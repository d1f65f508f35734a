use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use chrono::NaiveTime;

#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("`{0}` is not formatted as `HH:MM-HH:MM`")]
    Format(String),

    #[error("`{0}` ends before it starts")]
    Reversed(String),
}

/// Validated 24-hour `HH:MM-HH:MM` window whose end is not earlier than its start.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeRange {
    /// `true` when the string is a valid, non-reversed range.
    #[must_use]
    pub fn is_valid(range: &str) -> bool {
        range.parse::<Self>().is_ok()
    }
}

/// Strict zero-padded `HH:MM`.
fn parse_time(time: &str) -> Option<NaiveTime> {
    let bytes = time.as_bytes();
    if bytes.len() != 5 || bytes[2] != b':' || !bytes.iter().enumerate().all(|(i, b)| i == 2 || b.is_ascii_digit()) {
        return None;
    }
    NaiveTime::parse_from_str(time, "%H:%M").ok()
}

impl FromStr for TimeRange {
    type Err = ParseError;

    fn from_str(range: &str) -> Result<Self, Self::Err> {
        let (start, end) = range
            .split_once('-')
            .and_then(|(start, end)| Some((parse_time(start)?, parse_time(end)?)))
            .ok_or_else(|| ParseError::Format(range.to_owned()))?;
        if end < start {
            return Err(ParseError::Reversed(range.to_owned()));
        }
        Ok(Self { start, end })
    }
}

impl Display for TimeRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}
