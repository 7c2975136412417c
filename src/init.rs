//! `init` command.

use anyhow::{Context, Result};
use log::info;

use crate::{cli::InitArgs, fields::load_fields};

pub fn execute(args: &InitArgs) -> Result<()> {
    let fields = load_fields(&args.fields)?;
    let (store, table_id) = crate::open_table_store(&args.store)?;
    let path = store
        .create_table(&table_id, &fields, args.capacity)
        .with_context(|| format!("Creating table '{table_id}'"))?;
    info!(
        "Table '{}' ready at {:?} with {} field(s)",
        table_id,
        path,
        fields.len()
    );
    Ok(())
}
