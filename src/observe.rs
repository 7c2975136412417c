//! Observation hooks for the ingestion state machine.
//!
//! Every stage change of a submission is reported to an [`IngestObserver`].
//! [`LogObserver`] turns those into `log` records; [`RecordingObserver`] keeps
//! them in memory so callers (and tests) can inspect the exact path a
//! submission took.

use log::{debug, error, info};

use crate::{
    error::IngestError,
    gateway::TableId,
    ingest::{IngestReport, IngestStage},
};

pub trait IngestObserver {
    fn on_transition(&mut self, table: &TableId, from: IngestStage, to: IngestStage);

    fn on_failure(&mut self, _table: &TableId, _stage: IngestStage, _error: &IngestError) {}

    fn on_complete(&mut self, _table: &TableId, _report: &IngestReport) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl IngestObserver for LogObserver {
    fn on_transition(&mut self, table: &TableId, from: IngestStage, to: IngestStage) {
        debug!(target: "sheet_ingest::pipeline", "table={table} stage={from}->{to}");
    }

    fn on_failure(&mut self, table: &TableId, stage: IngestStage, err: &IngestError) {
        error!(
            target: "sheet_ingest::pipeline",
            "table={table} failed_stage={stage} kind={} error={err}",
            err.kind()
        );
    }

    fn on_complete(&mut self, table: &TableId, report: &IngestReport) {
        info!(
            target: "sheet_ingest::pipeline",
            "table={table} rows_inserted={} insert_position={} cells_updated={} placement={:?}",
            report.rows_inserted,
            report.insert_position,
            report.cells_updated,
            report.placement
        );
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    pub transitions: Vec<(IngestStage, IngestStage)>,
    pub failures: Vec<(IngestStage, String)>,
    pub completed: Vec<IngestReport>,
}

impl RecordingObserver {
    /// Stages entered, in order.
    pub fn stages(&self) -> Vec<IngestStage> {
        self.transitions.iter().map(|(_, to)| *to).collect()
    }
}

impl IngestObserver for RecordingObserver {
    fn on_transition(&mut self, _table: &TableId, from: IngestStage, to: IngestStage) {
        self.transitions.push((from, to));
    }

    fn on_failure(&mut self, _table: &TableId, stage: IngestStage, err: &IngestError) {
        self.failures.push((stage, err.kind().to_string()));
    }

    fn on_complete(&mut self, _table: &TableId, report: &IngestReport) {
        self.completed.push(report.clone());
    }
}
