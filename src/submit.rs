//! `submit` and `locate` commands.

use std::{
    fs::File,
    io::{self, BufReader, Read},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use log::{info, warn};
use serde::Serialize;

use crate::{
    batch::Submission,
    cli::{OutputFormat, SubmitArgs},
    error::IngestError,
    ingest::{IngestOptions, IngestReport, ingest, plan_ingest},
    observe::LogObserver,
    table,
};

/// Structured outcome printed for every submission.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionResponse {
    Success(IngestReport),
    Failure { kind: String, message: String },
}

impl SubmissionResponse {
    pub fn from_result(result: &Result<IngestReport, IngestError>) -> Self {
        match result {
            Ok(report) => SubmissionResponse::Success(report.clone()),
            Err(err) => SubmissionResponse::Failure {
                kind: err.kind().to_string(),
                message: err.to_string(),
            },
        }
    }
}

pub fn load_submission(path: &Path) -> Result<Submission> {
    let reader: Box<dyn Read> = if path == Path::new("-") {
        Box::new(io::stdin().lock())
    } else {
        Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Opening submission {path:?}"))?,
        ))
    };
    serde_json::from_reader(reader).with_context(|| format!("Parsing submission {path:?}"))
}

pub fn options_from_args(args: &SubmitArgs) -> IngestOptions {
    IngestOptions {
        headroom: args.headroom,
        always_repeat: args
            .repeat_fields
            .iter()
            .map(|field| field.trim())
            .filter(|field| !field.is_empty())
            .map(str::to_string)
            .collect(),
        verify_revision: !args.no_verify_revision,
    }
}

pub fn execute(args: &SubmitArgs) -> Result<()> {
    let (mut store, table_id) = crate::open_table_store(&args.store)?;
    let submission = load_submission(&args.submission)?;
    let options = options_from_args(args);
    info!(
        "Submitting {} row(s) from {:?} into '{}'",
        submission.len(),
        args.submission,
        table_id
    );

    let result = ingest(&mut store, &table_id, &submission, &options, &mut LogObserver);
    let response = SubmissionResponse::from_result(&result);
    match args.format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&response).context("Serializing response")?
        ),
        OutputFormat::Table => print_response(&response),
    }

    let report = result.map_err(|err| anyhow!(err))?;
    if report.date_fallback {
        warn!(
            "Rows were appended at position {} without date ordering ({:?})",
            report.insert_position, report.placement
        );
    }
    Ok(())
}

pub fn locate(args: &SubmitArgs) -> Result<()> {
    let (store, table_id) = crate::open_table_store(&args.store)?;
    let submission = load_submission(&args.submission)?;
    let options = options_from_args(args);
    let prepared = plan_ingest(&store, &table_id, &submission, &options, &mut LogObserver)?;

    match args.format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&prepared).context("Serializing insertion plan")?
        ),
        OutputFormat::Table => {
            let plan = &prepared.plan;
            let headers = std::iter::once("#".to_string())
                .chain((1..=prepared.width).map(|column| column.to_string()))
                .collect::<Vec<_>>();
            let rows = plan
                .rows
                .iter()
                .enumerate()
                .map(|(idx, row)| {
                    std::iter::once((plan.position + idx).to_string())
                        .chain(row.iter().cloned())
                        .collect()
                })
                .collect::<Vec<Vec<String>>>();
            table::print_table(&headers, &rows);
        }
    }
    info!(
        "Would insert {} row(s) at data offset {} of {} ({:?})",
        prepared.plan.batch_size(),
        prepared.plan.position,
        prepared.plan.boundary,
        prepared.plan.placement
    );
    Ok(())
}

fn print_response(response: &SubmissionResponse) {
    let headers = vec!["key".to_string(), "value".to_string()];
    let rows = match response {
        SubmissionResponse::Success(report) => vec![
            vec!["status".into(), "success".into()],
            vec!["table".into(), report.table.to_string()],
            vec!["rows_inserted".into(), report.rows_inserted.to_string()],
            vec!["insert_position".into(), report.insert_position.to_string()],
            vec!["cells_updated".into(), report.cells_updated.to_string()],
            vec!["placement".into(), format!("{:?}", report.placement)],
        ],
        SubmissionResponse::Failure { kind, message } => vec![
            vec!["status".into(), "failure".into()],
            vec!["kind".into(), kind.clone()],
            vec!["message".into(), message.clone()],
        ],
    };
    table::print_table(&headers, &rows);
}
