//! `fields` and `preview` commands.

use anyhow::{Context, Result};
use log::info;

use crate::{
    cli::{FieldsArgs, PreviewArgs},
    field_map::field_statuses,
    gateway::TableGateway,
    table,
};

pub fn execute_fields(args: &FieldsArgs) -> Result<()> {
    let (store, table_id) = crate::open_table_store(&args.store)?;
    let fields = store
        .read_fields(&table_id)
        .with_context(|| format!("Reading field config for '{table_id}'"))?;
    let snapshot = store
        .read_table(&table_id)
        .with_context(|| format!("Reading table '{table_id}'"))?;
    let width = snapshot.width();
    let statuses = field_statuses(&fields, width);

    let headers = ["field", "label", "type", "section", "order", "column", "status"]
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>();
    let rows = fields
        .iter()
        .zip(&statuses)
        .map(|(field, status)| {
            let column = field.order.column_index(width);
            let column_label = column
                .and_then(|index| snapshot.header.get(index).map(|h| format!("{} ({h})", index + 1)))
                .unwrap_or_default();
            vec![
                field.field_name.clone(),
                field.label.clone(),
                field.field_type.to_string(),
                field.section.map(|s| s.to_string()).unwrap_or_default(),
                field.order.to_string(),
                column_label,
                status.to_string(),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);
    info!(
        "Listed {} field(s) for '{}' ({} column header)",
        fields.len(),
        table_id,
        width
    );
    Ok(())
}

pub fn execute_preview(args: &PreviewArgs) -> Result<()> {
    let (store, table_id) = crate::open_table_store(&args.store)?;
    let snapshot = store
        .read_table(&table_id)
        .with_context(|| format!("Reading table '{table_id}'"))?;
    let data = snapshot.data_rows();
    let headers = std::iter::once("#".to_string())
        .chain(snapshot.header.iter().cloned())
        .collect::<Vec<_>>();
    let rows = data
        .iter()
        .take(args.rows)
        .enumerate()
        .map(|(offset, row)| {
            std::iter::once(offset.to_string())
                .chain(row.iter().cloned())
                .collect()
        })
        .collect::<Vec<Vec<String>>>();
    table::print_table(&headers, &rows);
    info!(
        "Displayed {} of {} populated row(s) from '{}' ({} allocated)",
        rows.len(),
        data.len(),
        table_id,
        snapshot.allocated_rows()
    );
    Ok(())
}
