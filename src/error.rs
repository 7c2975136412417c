//! Typed failures for the ingestion pipeline.

use std::fmt;

use itertools::Itertools;
use thiserror::Error;

use crate::ingest::IngestStage;

/// One `(fieldName, order)` pair the resolver tried to place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptedField {
    pub field_name: String,
    pub order: String,
}

impl fmt::Display for AttemptedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.field_name, self.order)
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Row range {start}..{end} is outside the {allocated} allocated row(s)")]
    OutOfRange {
        start: usize,
        end: usize,
        allocated: usize,
    },

    #[error("Malformed table data: {0}")]
    Malformed(String),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(
        "No fields could be mapped onto a {width}-column header; attempted: [{}]",
        .attempted.iter().join(", ")
    )]
    NoFieldsMapped {
        width: usize,
        attempted: Vec<AttemptedField>,
    },

    #[error("Submission contains no records or line items")]
    EmptyBatch,

    #[error("Gateway call failed while {stage}: {source}")]
    GatewayUnavailable {
        stage: IngestStage,
        #[source]
        source: GatewayError,
    },

    #[error("Table changed since it was read (revision {expected} became {found}); resubmit")]
    StaleTable { expected: String, found: String },
}

impl IngestError {
    pub fn gateway(stage: IngestStage, source: GatewayError) -> Self {
        IngestError::GatewayUnavailable { stage, source }
    }

    /// Stable token for machine-readable responses.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::NoFieldsMapped { .. } => "no_fields_mapped",
            IngestError::EmptyBatch => "empty_batch",
            IngestError::GatewayUnavailable { .. } => "gateway_unavailable",
            IngestError::StaleTable { .. } => "stale_table",
        }
    }
}
