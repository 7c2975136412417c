//! File-backed [`TableGateway`]: one delimited file per table.
//!
//! A store is a directory. Table `sales` lives in `sales.csv` (or `sales.tsv`)
//! with its header in the first line; trailing fully blank rows are allocated
//! capacity. The table's field configuration sits beside it in
//! `sales.fields.yaml` (`sales.fields.json` is accepted as well).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use encoding_rs::{Encoding, UTF_8};
use log::{debug, info};

use crate::{
    error::GatewayError,
    fields::{FieldConfig, header_from_fields, load_fields, save_fields},
    gateway::{TableGateway, TableId, TableSnapshot, ops},
    io_utils,
};

#[derive(Debug, Clone)]
pub struct CsvTableStore {
    root: PathBuf,
    delimiter: Option<u8>,
    encoding: &'static Encoding,
}

impl CsvTableStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        CsvTableStore {
            root: root.into(),
            delimiter: None,
            encoding: UTF_8,
        }
    }

    pub fn with_delimiter(mut self, delimiter: Option<u8>) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Existing `<id>.tsv` wins over `<id>.csv`; new tables default to `.csv`.
    pub fn table_path(&self, table: &TableId) -> PathBuf {
        let tsv = self.root.join(format!("{}.tsv", table.as_str()));
        if tsv.exists() {
            tsv
        } else {
            self.root.join(format!("{}.csv", table.as_str()))
        }
    }

    pub fn fields_path(&self, table: &TableId) -> PathBuf {
        let yaml = self.root.join(format!("{}.fields.yaml", table.as_str()));
        let json = self.root.join(format!("{}.fields.json", table.as_str()));
        if !yaml.exists() && json.exists() {
            json
        } else {
            yaml
        }
    }

    fn delimiter_for(&self, path: &Path) -> u8 {
        io_utils::resolve_delimiter(path, self.delimiter)
    }

    /// Creates a table whose header is derived from `fields`, with `capacity`
    /// blank rows allocated, and stores the field configuration beside it.
    pub fn create_table(
        &self,
        table: &TableId,
        fields: &[FieldConfig],
        capacity: usize,
    ) -> Result<PathBuf> {
        let path = self.table_path(table);
        if path.exists() {
            bail!("Table {path:?} already exists");
        }
        let header = header_from_fields(fields)?;
        if header.is_empty() {
            bail!("Field configuration does not define any positive order");
        }
        let mut rows = Vec::new();
        ops::grow(&mut rows, header.len(), capacity);
        io_utils::write_table_atomic(
            &path,
            &header,
            &rows,
            self.delimiter_for(&path),
            self.encoding,
        )?;
        let fields_path = self.fields_path(table);
        save_fields(fields, &fields_path)?;
        info!(
            "Created table {:?} with {} column(s) and {} allocated row(s)",
            path,
            header.len(),
            capacity
        );
        Ok(path)
    }

    fn load(&self, table: &TableId) -> Result<(PathBuf, TableSnapshot), GatewayError> {
        let path = self.table_path(table);
        if !path.exists() {
            return Err(GatewayError::TableNotFound(table.to_string()));
        }
        let (header, rows) =
            io_utils::read_table_from_path(&path, self.delimiter_for(&path), self.encoding)
                .map_err(|err| GatewayError::Malformed(format!("{err:#}")))?;
        debug!("Loaded {} row(s) from {:?}", rows.len(), path);
        Ok((path, TableSnapshot::new(header, rows)))
    }

    fn store(&self, path: &Path, snapshot: &TableSnapshot) -> Result<(), GatewayError> {
        io_utils::write_table_atomic(
            path,
            &snapshot.header,
            &snapshot.rows,
            self.delimiter_for(path),
            self.encoding,
        )
        .map_err(|err| GatewayError::Other(format!("{err:#}")))
    }
}

impl TableGateway for CsvTableStore {
    fn read_fields(&self, table: &TableId) -> Result<Vec<FieldConfig>, GatewayError> {
        let path = self.fields_path(table);
        if !path.exists() {
            return Err(GatewayError::TableNotFound(format!(
                "{table} (missing field config {})",
                path.display()
            )));
        }
        load_fields(&path).map_err(|err| GatewayError::Malformed(format!("{err:#}")))
    }

    fn read_table(&self, table: &TableId) -> Result<TableSnapshot, GatewayError> {
        self.load(table).map(|(_, snapshot)| snapshot)
    }

    fn allocated_rows(&self, table: &TableId) -> Result<usize, GatewayError> {
        self.load(table).map(|(_, snapshot)| snapshot.allocated_rows())
    }

    fn ensure_capacity(&mut self, table: &TableId, rows: usize) -> Result<(), GatewayError> {
        let (path, mut snapshot) = self.load(table)?;
        if snapshot.allocated_rows() >= rows {
            return Ok(());
        }
        let width = snapshot.width();
        ops::grow(&mut snapshot.rows, width, rows);
        self.store(&path, &snapshot)
    }

    fn open_gap(&mut self, table: &TableId, at: usize, size: usize) -> Result<(), GatewayError> {
        let (path, mut snapshot) = self.load(table)?;
        let width = snapshot.width();
        ops::open_gap(&mut snapshot.rows, width, at, size)?;
        self.store(&path, &snapshot)
    }

    fn write_rows(
        &mut self,
        table: &TableId,
        start: usize,
        rows: &[Vec<String>],
    ) -> Result<usize, GatewayError> {
        let (path, mut snapshot) = self.load(table)?;
        let width = snapshot.width();
        let cells = ops::write_rows(&mut snapshot.rows, width, start, rows)?;
        self.store(&path, &snapshot)?;
        Ok(cells)
    }
}

/// Opens a store rooted at `root`, checking that the directory exists.
pub fn open_store(
    root: &Path,
    delimiter: Option<u8>,
    encoding: &'static Encoding,
) -> Result<CsvTableStore> {
    let metadata =
        std::fs::metadata(root).with_context(|| format!("Opening table store {root:?}"))?;
    if !metadata.is_dir() {
        bail!("Table store {root:?} is not a directory");
    }
    Ok(CsvTableStore::new(root)
        .with_delimiter(delimiter)
        .with_encoding(encoding))
}
