//! Date normalization for the sort column.
//!
//! Cells in the destination table hold dates in whatever shape the form or the
//! table itself produced: a serial day number, `dd/mm/yyyy`, or `yyyy-mm-dd`.
//! [`parse_date_ordinal()`] folds all of them onto a single [`DateOrdinal`]
//! (days since 1899-12-30, the spreadsheet serial epoch) so rows can be
//! compared without caring how each cell was written.
//!
//! Parsing never fails loudly: anything unrecognized yields `None`, which the
//! insertion resolver treats as "append at the end".

use std::fmt;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

const SERIAL_EPOCH: (i32, u32, u32) = (1899, 12, 30);

/// Whole days since the serial epoch. Pinned to calendar dates, so the value
/// is identical on every host regardless of timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DateOrdinal(pub i64);

impl DateOrdinal {
    pub fn from_date(date: NaiveDate) -> Self {
        DateOrdinal((date - serial_epoch()).num_days())
    }

    pub fn days(self) -> i64 {
        self.0
    }

    pub fn to_date(self) -> Option<NaiveDate> {
        serial_epoch().checked_add_signed(Duration::try_days(self.0)?)
    }
}

impl fmt::Display for DateOrdinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_date() {
            Some(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            None => write!(f, "serial {}", self.0),
        }
    }
}

fn serial_epoch() -> NaiveDate {
    let (year, month, day) = SERIAL_EPOCH;
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MIN)
}

/// Normalizes a raw cell into a [`DateOrdinal`].
///
/// Forms are tried in order, first match wins:
/// 1. a bare integer is a serial day count,
/// 2. `d/m/y` with exactly three slash-separated parts,
/// 3. `y-m-d` with exactly three hyphen-separated parts.
///
/// Impossible calendar dates (`31/02/2024`) are rejected rather than rolled
/// over into the next month.
pub fn parse_date_ordinal(raw: &str) -> Option<DateOrdinal> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    parse_serial(value)
        .or_else(|| parse_day_month_year(value))
        .or_else(|| parse_year_month_day(value))
}

fn parse_serial(value: &str) -> Option<DateOrdinal> {
    let digits = value.strip_prefix('-').unwrap_or(value);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse::<i64>().ok().map(DateOrdinal)
}

fn parse_day_month_year(value: &str) -> Option<DateOrdinal> {
    let [day, month, year] = split_three(value, '/')?;
    calendar_ordinal(year, month, day)
}

fn parse_year_month_day(value: &str) -> Option<DateOrdinal> {
    let [year, month, day] = split_three(value, '-')?;
    calendar_ordinal(year, month, day)
}

fn split_three(value: &str, separator: char) -> Option<[&str; 3]> {
    let mut parts = value.split(separator);
    let first = parts.next()?;
    let second = parts.next()?;
    let third = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some([first, second, third])
}

fn calendar_ordinal(year: &str, month: &str, day: &str) -> Option<DateOrdinal> {
    let year = numeric_component(year)? as i32;
    let month = numeric_component(month)?;
    let day = numeric_component(day)?;
    NaiveDate::from_ymd_opt(year, month, day).map(DateOrdinal::from_date)
}

fn numeric_component(part: &str) -> Option<u32> {
    let trimmed = part.trim();
    if trimmed.is_empty() || trimmed.len() > 9 || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    trimmed.parse().ok()
}
