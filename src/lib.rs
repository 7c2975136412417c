pub mod batch;
pub mod capacity;
pub mod cli;
pub mod csv_store;
pub mod date;
pub mod error;
pub mod field_map;
pub mod fields;
pub mod gateway;
pub mod ingest;
pub mod init;
pub mod inspect;
pub mod io_utils;
pub mod observe;
pub mod position;
pub mod submit;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::{LevelFilter, debug};

use crate::{
    cli::{Cli, Commands, StoreArgs},
    csv_store::CsvTableStore,
    gateway::TableId,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sheet_ingest", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => init::execute(&args),
        Commands::Submit(args) => submit::execute(&args),
        Commands::Locate(args) => submit::locate(&args),
        Commands::Fields(args) => inspect::execute_fields(&args),
        Commands::Preview(args) => inspect::execute_preview(&args),
    }
}

pub(crate) fn open_table_store(args: &StoreArgs) -> Result<(CsvTableStore, TableId)> {
    let encoding = io_utils::resolve_encoding(args.encoding.as_deref())?;
    let store = csv_store::open_store(&args.store, args.delimiter, encoding)?;
    let table = TableId::new(args.table.trim());
    debug!(
        "Using table '{}' in {:?} (delimiter '{}', encoding {})",
        table,
        store.root(),
        io_utils::printable_delimiter(io_utils::resolve_delimiter(
            &store.table_path(&table),
            args.delimiter
        )),
        encoding.name()
    );
    Ok((store, table))
}
