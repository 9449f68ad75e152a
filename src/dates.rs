//! Resolution of user supplied start/end input into a concrete date interval.
//!
//! Start input is either an absolute `YYYY-MM-DD` date or a non-negative
//! number of days back from today. End input is an absolute date, or empty
//! for today.

use crate::error::{Result, SummaryError};
use chrono::{Days, NaiveDate};
use std::fmt;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// An inclusive range of calendar days.
///
/// An interval whose start is after its end contains no days.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateInterval {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateInterval {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }
}

impl fmt::Display for DateInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start.format(DATE_FORMAT),
            self.end.format(DATE_FORMAT)
        )
    }
}

/// Resolves both bounds of the interval.
pub fn resolve(start_input: &str, end_input: &str, today: NaiveDate) -> Result<DateInterval> {
    let start = resolve_start(start_input, today)?;
    let end = resolve_end(end_input, today)?;
    Ok(DateInterval::new(start, end))
}

/// Resolves the start bound: a number of days back, or an absolute date.
pub fn resolve_start(input: &str, today: NaiveDate) -> Result<NaiveDate> {
    let input = input.trim();
    if !input.is_empty() && input.bytes().all(|b| b.is_ascii_digit()) {
        return input
            .parse::<u64>()
            .ok()
            .and_then(|days_back| today.checked_sub_days(Days::new(days_back)))
            .ok_or_else(|| SummaryError::invalid_date(input));
    }
    parse_date(input)
}

/// Resolves the end bound: empty means today.
pub fn resolve_end(input: &str, today: NaiveDate) -> Result<NaiveDate> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(today);
    }
    parse_date(input)
}

fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input, DATE_FORMAT).map_err(|_| SummaryError::invalid_date(input))
}
