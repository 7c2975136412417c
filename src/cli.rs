use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::capacity::DEFAULT_HEADROOM;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Insert form submissions into date-ordered tables",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create a table and its field configuration in a store
    Init(InitArgs),
    /// Insert a submission into a table, keeping it ordered by date
    Submit(SubmitArgs),
    /// Show where a submission would be inserted without writing it
    Locate(SubmitArgs),
    /// Show how a table's fields map onto its columns
    Fields(FieldsArgs),
    /// Preview the populated rows of a table
    Preview(PreviewArgs),
}

#[derive(Debug, Clone, Args)]
pub struct StoreArgs {
    /// Directory holding the tables
    #[arg(short = 's', long = "store")]
    pub store: PathBuf,
    /// Table name (file stem inside the store)
    #[arg(short = 't', long = "table")]
    pub table: String,
    /// Delimiter override for table files (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of table files (defaults to utf-8)
    #[arg(long = "encoding")]
    pub encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct InitArgs {
    #[command(flatten)]
    pub store: StoreArgs,
    /// Field configuration file (YAML, or JSON by extension)
    #[arg(short = 'f', long = "fields")]
    pub fields: PathBuf,
    /// Blank rows to allocate up front
    #[arg(long, default_value_t = DEFAULT_HEADROOM)]
    pub capacity: usize,
}

#[derive(Debug, Args)]
pub struct SubmitArgs {
    #[command(flatten)]
    pub store: StoreArgs,
    /// Submission JSON (`{"records": [...]}` or `{"header": {...}, "line_items": [...]}`); `-` reads stdin
    #[arg(short = 'i', long = "submission")]
    pub submission: PathBuf,
    /// Header field repeated on every line-item row (repeatable)
    #[arg(long = "repeat-field", action = clap::ArgAction::Append, value_delimiter = ',')]
    pub repeat_fields: Vec<String>,
    /// Spare rows added whenever the table has to grow
    #[arg(long, default_value_t = DEFAULT_HEADROOM)]
    pub headroom: usize,
    /// Skip re-reading the table before inserting
    #[arg(long = "no-verify-revision")]
    pub no_verify_revision: bool,
    /// Output format for the result
    #[arg(long, value_enum, default_value = "json")]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct FieldsArgs {
    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub store: StoreArgs,
    /// Number of rows to display
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
#[value(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Json,
    Table,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
