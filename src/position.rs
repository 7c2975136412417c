//! Locating where a new batch belongs in an already ordered table.
//!
//! The populated region of a table is the run of rows directly below the
//! header that ends at the first fully blank row. Anything past that boundary
//! is allocated capacity and never takes part in ordering.
//!
//! Placement is a single linear pass over that region. It relies on the region
//! already being sorted ascending by the sort column; it keeps that order
//! intact but never repairs it.

use log::{debug, warn};
use serde::Serialize;

use crate::date::{DateOrdinal, parse_date_ordinal};

/// Number of contiguous populated rows. `rows` excludes the header.
pub fn data_boundary<R>(rows: &[R]) -> usize
where
    R: AsRef<[String]>,
{
    rows.iter()
        .position(|row| is_blank_row(row.as_ref()))
        .unwrap_or(rows.len())
}

pub fn is_blank_row(row: &[String]) -> bool {
    row.iter().all(|cell| cell.trim().is_empty())
}

/// Why a position was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// Inserted before the first row dated strictly later.
    Ordered,
    /// Every existing date is on or before the new one.
    AfterLatest,
    /// The table holds no data rows yet.
    EmptyTable,
    /// No date field is mapped.
    NoSortColumn,
    /// The batch's own date could not be parsed.
    UnparsableDate,
}

impl Placement {
    /// True when ordering was abandoned in favour of appending.
    pub fn is_fallback(self) -> bool {
        matches!(self, Placement::NoSortColumn | Placement::UnparsableDate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    /// 0-based data row offset the batch is inserted at.
    pub offset: usize,
    pub boundary: usize,
    pub placement: Placement,
}

/// Chooses the data offset for a batch whose first row carries `new_value` in
/// the sort column.
///
/// The comparison pass starts at data offset 1, so the first data row is never
/// displaced: a batch older than everything lands at offset 1. Existing rows
/// that share the new date, or whose date cannot be parsed, are stepped over,
/// which keeps same-day submissions in arrival order.
pub fn resolve_position<R>(rows: &[R], sort_column: Option<usize>, new_value: &str) -> Position
where
    R: AsRef<[String]>,
{
    let boundary = data_boundary(rows);
    let fallback = |placement| Position {
        offset: boundary,
        boundary,
        placement,
    };

    let Some(column) = sort_column else {
        return fallback(Placement::NoSortColumn);
    };
    let Some(new_date) = parse_date_ordinal(new_value) else {
        warn!("Date '{new_value}' is not recognized; appending after row {boundary}");
        return fallback(Placement::UnparsableDate);
    };
    if boundary == 0 {
        return fallback(Placement::EmptyTable);
    }

    match first_later_row(&rows[..boundary], column, new_date) {
        Some(offset) => {
            debug!("Date {new_date} sorts before data row {offset}");
            Position {
                offset,
                boundary,
                placement: Placement::Ordered,
            }
        }
        None => fallback(Placement::AfterLatest),
    }
}

fn first_later_row<R>(rows: &[R], column: usize, new_date: DateOrdinal) -> Option<usize>
where
    R: AsRef<[String]>,
{
    rows.iter()
        .enumerate()
        .skip(1)
        .find(|(_, row)| {
            row.as_ref()
                .get(column)
                .and_then(|cell| parse_date_ordinal(cell))
                .is_some_and(|existing| existing > new_date)
        })
        .map(|(offset, _)| offset)
}

/// A batch together with the offset it will be written at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsertionPlan {
    pub position: usize,
    pub boundary: usize,
    pub placement: Placement,
    pub sort_column: Option<usize>,
    pub rows: Vec<Vec<String>>,
}

impl InsertionPlan {
    pub fn new(position: Position, sort_column: Option<usize>, rows: Vec<Vec<String>>) -> Self {
        InsertionPlan {
            position: position.offset,
            boundary: position.boundary,
            placement: position.placement,
            sort_column,
            rows,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.rows.len()
    }

    /// Rows the populated region will span once the batch is written.
    pub fn required_rows(&self) -> usize {
        self.boundary + self.rows.len()
    }
}
