//! Resolution of configured fields onto destination columns.

use std::{collections::BTreeMap, fmt};

use log::{debug, warn};
use serde::Serialize;

use crate::{
    error::{AttemptedField, IngestError},
    fields::{FieldConfig, FieldType},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldMap {
    width: usize,
    columns: BTreeMap<String, usize>,
    sort_column: Option<usize>,
    sort_field: Option<String>,
}

impl FieldMap {
    /// Number of cells every output row must carry.
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn column_of(&self, field_name: &str) -> Option<usize> {
        self.columns.get(field_name).copied()
    }

    /// Column of the first successfully mapped date field.
    pub fn sort_column(&self) -> Option<usize> {
        self.sort_column
    }

    /// Name of the date field that fixed the sort column.
    pub fn sort_field(&self) -> Option<&str> {
        self.sort_field.as_deref()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.columns.iter().map(|(name, column)| (name.as_str(), *column))
    }
}

/// Maps each field to column `order - 1`, in configuration order.
///
/// Fields whose order is not an integer or falls outside the header are
/// dropped with a warning. A later field with the same name overwrites an
/// earlier one. Fails only when nothing at all could be mapped.
pub fn resolve_field_map(fields: &[FieldConfig], width: usize) -> Result<FieldMap, IngestError> {
    let mut columns = BTreeMap::new();
    let mut sort_column = None;
    let mut sort_field = None;

    for field in fields {
        match field.order.column_index(width) {
            Some(column) => {
                debug!(
                    "Mapped field '{}' (order {}) to column {}",
                    field.field_name, field.order, column
                );
                columns.insert(field.field_name.clone(), column);
                if sort_column.is_none() && field.field_type == FieldType::Date {
                    sort_column = Some(column);
                    sort_field = Some(field.field_name.clone());
                }
            }
            None => warn!(
                "Skipping field '{}': order '{}' does not address one of {} column(s)",
                field.field_name, field.order, width
            ),
        }
    }

    if columns.is_empty() {
        let attempted = fields
            .iter()
            .map(|field| AttemptedField {
                field_name: field.field_name.clone(),
                order: field.order.raw().to_string(),
            })
            .collect();
        return Err(IngestError::NoFieldsMapped { width, attempted });
    }

    Ok(FieldMap {
        width,
        columns,
        sort_column,
        sort_field,
    })
}

/// How one configured field fared in resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStatus {
    SortColumn,
    Mapped,
    /// A later field with the same name took its place in the map.
    Overridden,
    OutOfRange,
    InvalidOrder,
}

impl fmt::Display for FieldStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FieldStatus::SortColumn => "sort column",
            FieldStatus::Mapped => "mapped",
            FieldStatus::Overridden => "overridden",
            FieldStatus::OutOfRange => "out of range",
            FieldStatus::InvalidOrder => "invalid order",
        })
    }
}

/// Status of each field in `fields`, in order, as seen by [`resolve_field_map`].
pub fn field_statuses(fields: &[FieldConfig], width: usize) -> Vec<FieldStatus> {
    let map = resolve_field_map(fields, width).ok();
    fields
        .iter()
        .enumerate()
        .map(|(index, field)| {
            let Some(column) = field.order.column_index(width) else {
                return match field.order.position() {
                    Some(_) => FieldStatus::OutOfRange,
                    None => FieldStatus::InvalidOrder,
                };
            };
            let Some(map) = map.as_ref() else {
                return FieldStatus::InvalidOrder;
            };
            let replaced_later = fields[index + 1..].iter().any(|later| {
                later.field_name == field.field_name && later.order.column_index(width).is_some()
            });
            if replaced_later || map.column_of(&field.field_name) != Some(column) {
                FieldStatus::Overridden
            } else if map.sort_field() == Some(field.field_name.as_str())
                && map.sort_column() == Some(column)
            {
                FieldStatus::SortColumn
            } else {
                FieldStatus::Mapped
            }
        })
        .collect()
}
