//! Conversion of form submissions into fixed-width table rows.
//!
//! A submission is either a list of flat records (one row each) or a header
//! record plus repeatable line items. The shape of the output is decided by the
//! field configuration, not by the submission: as soon as one field carries a
//! section, rows are built in sectioned mode.
//!
//! In sectioned mode header values are written on the first row only, so a
//! multi-item sale reads as one block in the table. Fields in the
//! always-repeat set (caller allow-list plus fields flagged
//! `repeatAcrossRows`) are copied onto every row, which keeps per-row keys
//! such as the sale date or customer id present for sorting and grouping.

use std::collections::{BTreeMap, BTreeSet};

use log::warn;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    error::IngestError,
    field_map::FieldMap,
    fields::{FieldConfig, Section},
    position::is_blank_row,
};

/// One logical input unit: field name to raw value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Record(BTreeMap<String, String>);

impl Record {
    pub fn new() -> Self {
        Record(BTreeMap::new())
    }

    pub fn with(mut self, field: &str, value: &str) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: &str, value: &str) {
        self.0.insert(field.to_string(), value.to_string());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Values from `self` layered over `base`.
    fn merged_over(&self, base: &Record) -> Record {
        let mut merged = base.0.clone();
        merged.extend(self.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        Record(merged)
    }
}

impl<const N: usize> From<[(&str, &str); N]> for Record {
    fn from(pairs: [(&str, &str); N]) -> Self {
        Record(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

/// Scalar shapes a form client may send for a single field.
#[derive(Deserialize)]
#[serde(untagged)]
enum CellInput {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<CellInput>),
}

impl CellInput {
    fn into_cell(self) -> String {
        match self {
            CellInput::Null => String::new(),
            CellInput::Bool(true) => "TRUE".to_string(),
            CellInput::Bool(false) => "FALSE".to_string(),
            CellInput::Int(value) => value.to_string(),
            CellInput::Float(value) => value.to_string(),
            CellInput::Text(value) => value,
            CellInput::List(values) => values
                .into_iter()
                .map(CellInput::into_cell)
                .filter(|value| !value.is_empty())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = BTreeMap::<String, CellInput>::deserialize(deserializer)?;
        Ok(Record(
            raw.into_iter()
                .map(|(field, value)| (field, value.into_cell()))
                .collect(),
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Submission {
    Sectioned {
        header: Record,
        #[serde(alias = "lineItems", alias = "items")]
        line_items: Vec<Record>,
    },
    Flat {
        records: Vec<Record>,
    },
}

impl Submission {
    pub fn flat(records: Vec<Record>) -> Self {
        Submission::Flat { records }
    }

    pub fn sectioned(header: Record, line_items: Vec<Record>) -> Self {
        Submission::Sectioned { header, line_items }
    }

    /// Number of line items (sectioned) or records (flat).
    pub fn len(&self) -> usize {
        match self {
            Submission::Flat { records } => records.len(),
            Submission::Sectioned { line_items, .. } => line_items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchShape {
    Flat,
    Sectioned,
}

impl BatchShape {
    pub fn for_fields(fields: &[FieldConfig]) -> Self {
        if fields.iter().any(|field| field.section.is_some()) {
            BatchShape::Sectioned
        } else {
            BatchShape::Flat
        }
    }
}

/// Header fields copied onto every row in sectioned mode, by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionPolicy {
    always_repeat: BTreeSet<String>,
}

impl SectionPolicy {
    pub fn new<I, S>(always_repeat: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SectionPolicy {
            always_repeat: always_repeat.into_iter().map(Into::into).collect(),
        }
    }

    fn repeats(&self, field: &FieldConfig) -> bool {
        field.repeat_across_rows || self.always_repeat.contains(&field.field_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub shape: BatchShape,
    pub rows: Vec<Vec<String>>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Raw value in `column` of the first row; this alone decides placement.
    pub fn leading_value(&self, column: usize) -> Option<&str> {
        self.rows.first()?.get(column).map(String::as_str)
    }
}

pub fn build_batch(
    fields: &[FieldConfig],
    map: &FieldMap,
    submission: &Submission,
    policy: &SectionPolicy,
) -> Result<Batch, IngestError> {
    if submission.is_empty() {
        return Err(IngestError::EmptyBatch);
    }
    let shape = BatchShape::for_fields(fields);
    let rows: Vec<Vec<String>> = match shape {
        BatchShape::Flat => {
            let records = flat_records(submission);
            records
                .iter()
                .map(|record| flat_row(fields, map, record))
                .collect()
        }
        BatchShape::Sectioned => {
            let (header, items) = sectioned_records(submission);
            items
                .iter()
                .enumerate()
                .map(|(idx, item)| sectioned_row(fields, map, policy, header, item, idx))
                .collect()
        }
    };

    // A blank row would end the populated region mid-table.
    let built = rows.len();
    let rows = rows
        .into_iter()
        .filter(|row| !is_blank_row(row))
        .collect::<Vec<_>>();
    if rows.len() < built {
        warn!(
            "Dropped {} blank row(s) from a batch of {}",
            built - rows.len(),
            built
        );
    }
    if rows.is_empty() {
        return Err(IngestError::EmptyBatch);
    }
    Ok(Batch { shape, rows })
}

fn flat_records(submission: &Submission) -> Vec<Record> {
    match submission {
        Submission::Flat { records } => records.clone(),
        Submission::Sectioned { header, line_items } => line_items
            .iter()
            .map(|item| item.merged_over(header))
            .collect(),
    }
}

fn sectioned_records(submission: &Submission) -> (&Record, &[Record]) {
    match submission {
        Submission::Sectioned { header, line_items } => (header, line_items.as_slice()),
        // Flat input is non-empty here; its first record doubles as the header.
        Submission::Flat { records } => (&records[0], records.as_slice()),
    }
}

fn place(row: &mut [String], map: &FieldMap, field: &FieldConfig, record: &Record) {
    if let Some(column) = map.column_of(&field.field_name) {
        if let Some(value) = record.get(&field.field_name) {
            row[column] = value.to_string();
        }
    }
}

fn flat_row(fields: &[FieldConfig], map: &FieldMap, record: &Record) -> Vec<String> {
    let mut row = vec![String::new(); map.width()];
    for field in fields {
        place(&mut row, map, field, record);
    }
    row
}

fn sectioned_row(
    fields: &[FieldConfig],
    map: &FieldMap,
    policy: &SectionPolicy,
    header: &Record,
    item: &Record,
    index: usize,
) -> Vec<String> {
    let mut row = vec![String::new(); map.width()];
    for field in fields {
        match field.section {
            Some(Section::Header) => {
                if index == 0 || policy.repeats(field) {
                    place(&mut row, map, field, header);
                }
            }
            Some(Section::LineItem) | None => place(&mut row, map, field, item),
        }
    }
    row
}
