//! Persistence gateway: the storage seam the ingestion pipeline drives.
//!
//! The pipeline only needs four table primitives (read, ensure capacity,
//! open a gap of blank rows, overwrite a range) plus access to the table's
//! field configuration. [`TableGateway`] captures exactly that surface; the
//! CSV-backed store in [`crate::csv_store`] and [`InMemoryGateway`] implement
//! it.
//!
//! All offsets are 0-based data row offsets: offset 0 is the first row below
//! the header.

use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{error::GatewayError, fields::FieldConfig, position::data_boundary};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableId(String);

impl TableId {
    pub fn new(name: impl Into<String>) -> Self {
        TableId(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Header plus every allocated row, as read from storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSnapshot {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TableSnapshot {
    /// Builds a snapshot, right-padding short rows to the header width.
    pub fn new(header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = header.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                if row.len() < width {
                    row.resize(width, String::new());
                }
                row
            })
            .collect();
        TableSnapshot { header, rows }
    }

    pub fn width(&self) -> usize {
        self.header.len()
    }

    pub fn allocated_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn boundary(&self) -> usize {
        data_boundary(&self.rows)
    }

    /// The contiguous populated rows.
    pub fn data_rows(&self) -> &[Vec<String>] {
        &self.rows[..self.boundary()]
    }

    pub fn revision(&self) -> TableRevision {
        TableRevision::of(&self.header, self.data_rows())
    }
}

/// Content digest of a table's header and populated region.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TableRevision(String);

impl TableRevision {
    pub fn of(header: &[String], rows: &[Vec<String>]) -> Self {
        let mut hasher = Sha256::new();
        for line in std::iter::once(header).chain(rows.iter().map(Vec::as_slice)) {
            hasher.update((line.len() as u64).to_le_bytes());
            for cell in line {
                hasher.update((cell.len() as u64).to_le_bytes());
                hasher.update(cell.as_bytes());
            }
        }
        TableRevision(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex digits, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for TableRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Blocking storage primitives consumed by the ingestion pipeline.
pub trait TableGateway {
    fn read_fields(&self, table: &TableId) -> Result<Vec<FieldConfig>, GatewayError>;

    fn read_table(&self, table: &TableId) -> Result<TableSnapshot, GatewayError>;

    /// Rows allocated below the header, blank or not.
    fn allocated_rows(&self, table: &TableId) -> Result<usize, GatewayError>;

    /// Grows the table to at least `rows` data rows; no-op when already large enough.
    fn ensure_capacity(&mut self, table: &TableId, rows: usize) -> Result<(), GatewayError>;

    /// Shifts rows at and after `at` down by `size`, leaving `size` blank rows.
    fn open_gap(&mut self, table: &TableId, at: usize, size: usize) -> Result<(), GatewayError>;

    /// Overwrites rows starting at `start`; returns the number of cells written.
    fn write_rows(
        &mut self,
        table: &TableId,
        start: usize,
        rows: &[Vec<String>],
    ) -> Result<usize, GatewayError>;
}

/// Shared row-level mutations used by every gateway implementation.
pub(crate) mod ops {
    use super::*;

    pub fn grow(rows: &mut Vec<Vec<String>>, width: usize, target: usize) {
        while rows.len() < target {
            rows.push(vec![String::new(); width]);
        }
    }

    pub fn open_gap(
        rows: &mut Vec<Vec<String>>,
        width: usize,
        at: usize,
        size: usize,
    ) -> Result<(), GatewayError> {
        if at > rows.len() {
            return Err(GatewayError::OutOfRange {
                start: at,
                end: at + size,
                allocated: rows.len(),
            });
        }
        let tail = rows.split_off(at);
        grow(rows, width, at + size);
        rows.extend(tail);
        Ok(())
    }

    pub fn write_rows(
        rows: &mut [Vec<String>],
        width: usize,
        start: usize,
        values: &[Vec<String>],
    ) -> Result<usize, GatewayError> {
        let end = start + values.len();
        if end > rows.len() {
            return Err(GatewayError::OutOfRange {
                start,
                end,
                allocated: rows.len(),
            });
        }
        let mut cells = 0;
        for (target, source) in rows[start..end].iter_mut().zip(values) {
            if target.len() < source.len().max(width) {
                target.resize(source.len().max(width), String::new());
            }
            for (cell, value) in target.iter_mut().zip(source) {
                cell.clone_from(value);
                cells += 1;
            }
        }
        Ok(cells)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOp {
    ReadFields,
    ReadTable,
    AllocatedRows,
    EnsureCapacity,
    OpenGap,
    WriteRows,
}

#[derive(Debug, Clone, Default)]
struct MemoryTable {
    fields: Vec<FieldConfig>,
    snapshot: TableSnapshot,
    expansions: usize,
}

/// Gateway over tables held in process memory.
///
/// Useful for embedding the pipeline and for exercising failure paths:
/// [`InMemoryGateway::fail_on`] makes a chosen primitive return an error.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGateway {
    tables: HashMap<TableId, MemoryTable>,
    failing: Option<GatewayOp>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_table(
        &mut self,
        table: TableId,
        fields: Vec<FieldConfig>,
        header: Vec<String>,
        rows: Vec<Vec<String>>,
    ) {
        let snapshot = TableSnapshot::new(header, rows);
        self.tables.insert(
            table,
            MemoryTable {
                fields,
                snapshot,
                expansions: 0,
            },
        );
    }

    pub fn fail_on(&mut self, op: GatewayOp) {
        self.failing = Some(op);
    }

    pub fn clear_failure(&mut self) {
        self.failing = None;
    }

    pub fn snapshot(&self, table: &TableId) -> Option<&TableSnapshot> {
        self.tables.get(table).map(|t| &t.snapshot)
    }

    /// Number of times `ensure_capacity` actually grew the table.
    pub fn expansions(&self, table: &TableId) -> usize {
        self.tables.get(table).map_or(0, |t| t.expansions)
    }

    /// Replaces the rows of a table, as a competing writer would.
    pub fn overwrite_rows(&mut self, table: &TableId, rows: Vec<Vec<String>>) {
        if let Some(entry) = self.tables.get_mut(table) {
            let header = std::mem::take(&mut entry.snapshot.header);
            entry.snapshot = TableSnapshot::new(header, rows);
        }
    }

    fn check(&self, op: GatewayOp) -> Result<(), GatewayError> {
        if self.failing == Some(op) {
            return Err(GatewayError::Other(format!("injected failure on {op:?}")));
        }
        Ok(())
    }

    fn table(&self, table: &TableId) -> Result<&MemoryTable, GatewayError> {
        self.tables
            .get(table)
            .ok_or_else(|| GatewayError::TableNotFound(table.to_string()))
    }

    fn table_mut(&mut self, table: &TableId) -> Result<&mut MemoryTable, GatewayError> {
        self.tables
            .get_mut(table)
            .ok_or_else(|| GatewayError::TableNotFound(table.to_string()))
    }
}

impl TableGateway for InMemoryGateway {
    fn read_fields(&self, table: &TableId) -> Result<Vec<FieldConfig>, GatewayError> {
        self.check(GatewayOp::ReadFields)?;
        Ok(self.table(table)?.fields.clone())
    }

    fn read_table(&self, table: &TableId) -> Result<TableSnapshot, GatewayError> {
        self.check(GatewayOp::ReadTable)?;
        Ok(self.table(table)?.snapshot.clone())
    }

    fn allocated_rows(&self, table: &TableId) -> Result<usize, GatewayError> {
        self.check(GatewayOp::AllocatedRows)?;
        Ok(self.table(table)?.snapshot.allocated_rows())
    }

    fn ensure_capacity(&mut self, table: &TableId, rows: usize) -> Result<(), GatewayError> {
        self.check(GatewayOp::EnsureCapacity)?;
        let entry = self.table_mut(table)?;
        if entry.snapshot.rows.len() < rows {
            let width = entry.snapshot.width();
            ops::grow(&mut entry.snapshot.rows, width, rows);
            entry.expansions += 1;
        }
        Ok(())
    }

    fn open_gap(&mut self, table: &TableId, at: usize, size: usize) -> Result<(), GatewayError> {
        self.check(GatewayOp::OpenGap)?;
        let entry = self.table_mut(table)?;
        let width = entry.snapshot.width();
        ops::open_gap(&mut entry.snapshot.rows, width, at, size)
    }

    fn write_rows(
        &mut self,
        table: &TableId,
        start: usize,
        rows: &[Vec<String>],
    ) -> Result<usize, GatewayError> {
        self.check(GatewayOp::WriteRows)?;
        let entry = self.table_mut(table)?;
        let width = entry.snapshot.width();
        ops::write_rows(&mut entry.snapshot.rows, width, start, rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn snapshot_pads_short_rows() {
        let snapshot = TableSnapshot::new(strings(&["a", "b", "c"]), vec![strings(&["1"])]);
        assert_eq!(snapshot.rows[0], strings(&["1", "", ""]));
    }

    #[test]
    fn revision_ignores_allocated_blank_rows() {
        let header = strings(&["a", "b"]);
        let data = vec![strings(&["1", "2"])];
        let mut padded = data.clone();
        padded.push(strings(&["", ""]));
        let left = TableSnapshot::new(header.clone(), data).revision();
        let right = TableSnapshot::new(header, padded).revision();
        assert_eq!(left, right);
        assert_eq!(left.as_str().len(), 64);
    }

    #[test]
    fn revision_is_sensitive_to_cell_boundaries() {
        let header = strings(&["a", "b"]);
        let left = TableRevision::of(&header, &[strings(&["ab", "c"])]);
        let right = TableRevision::of(&header, &[strings(&["a", "bc"])]);
        assert_ne!(left, right);
    }

    #[test]
    fn open_gap_shifts_rows_down() {
        let mut rows = vec![strings(&["1"]), strings(&["2"])];
        ops::open_gap(&mut rows, 1, 1, 2).unwrap();
        assert_eq!(
            rows,
            vec![strings(&["1"]), strings(&[""]), strings(&[""]), strings(&["2"])]
        );
        assert!(ops::open_gap(&mut rows, 1, 9, 1).is_err());
    }

    #[test]
    fn write_rows_rejects_ranges_past_capacity() {
        let mut rows = vec![strings(&["", ""])];
        let err = ops::write_rows(&mut rows, 2, 0, &[strings(&["x", "y"]), strings(&["z", "w"])])
            .unwrap_err();
        assert!(matches!(err, GatewayError::OutOfRange { end: 2, .. }));
        let cells = ops::write_rows(&mut rows, 2, 0, &[strings(&["x", "y"])]).unwrap();
        assert_eq!(cells, 2);
        assert_eq!(rows[0], strings(&["x", "y"]));
    }

    #[test]
    fn memory_gateway_counts_effective_expansions() {
        let table = TableId::new("sales");
        let mut gateway = InMemoryGateway::new();
        gateway.insert_table(table.clone(), vec![], strings(&["a"]), vec![]);
        gateway.ensure_capacity(&table, 5).unwrap();
        gateway.ensure_capacity(&table, 5).unwrap();
        gateway.ensure_capacity(&table, 3).unwrap();
        assert_eq!(gateway.expansions(&table), 1);
        assert_eq!(gateway.allocated_rows(&table).unwrap(), 5);
    }
}
