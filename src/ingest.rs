//! Ingestion pipeline: from a submission to rows placed in date order.
//!
//! A submission moves through a fixed sequence of stages:
//!
//! ```text
//! Idle -> MappingFields -> BuildingRows -> ResolvingPosition
//!      -> EnsuringCapacity -> OpeningGap -> WritingValues -> Done
//! ```
//!
//! Any stage may end in `Failed`. Failures abort immediately; stages that
//! already reached the gateway are not undone and nothing is retried.
//!
//! The gateway offers "insert blank rows" and "overwrite a range" but no
//! combined shifting insert, so an ordered mid-table write is performed as a
//! gap-open followed by a write into that gap.
//!
//! Concurrent writers are not coordinated. When `verify_revision` is enabled
//! the table is read again right before the gap is opened and the submission
//! is rejected with [`IngestError::StaleTable`] if its populated region
//! changed since the position was computed.

use std::fmt;

use log::debug;
use serde::Serialize;

use crate::{
    batch::{BatchShape, SectionPolicy, Submission, build_batch},
    capacity::{CapacityExpander, CapacityOutcome, DEFAULT_HEADROOM},
    error::IngestError,
    field_map::{FieldMap, resolve_field_map},
    gateway::{TableGateway, TableId, TableRevision},
    observe::IngestObserver,
    position::{InsertionPlan, Placement, resolve_position},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStage {
    Idle,
    MappingFields,
    BuildingRows,
    ResolvingPosition,
    EnsuringCapacity,
    OpeningGap,
    WritingValues,
    Done,
    Failed,
}

impl IngestStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestStage::Idle => "idle",
            IngestStage::MappingFields => "mapping fields",
            IngestStage::BuildingRows => "building rows",
            IngestStage::ResolvingPosition => "resolving position",
            IngestStage::EnsuringCapacity => "ensuring capacity",
            IngestStage::OpeningGap => "opening gap",
            IngestStage::WritingValues => "writing values",
            IngestStage::Done => "done",
            IngestStage::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, IngestStage::Done | IngestStage::Failed)
    }
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOptions {
    /// Spare rows added whenever the table has to grow.
    pub headroom: usize,
    /// Header fields copied onto every line-item row.
    pub always_repeat: Vec<String>,
    /// Re-read the table before opening the gap and abort if it changed.
    pub verify_revision: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        IngestOptions {
            headroom: DEFAULT_HEADROOM,
            always_repeat: Vec::new(),
            verify_revision: true,
        }
    }
}

impl IngestOptions {
    pub fn section_policy(&self) -> SectionPolicy {
        SectionPolicy::new(self.always_repeat.iter().cloned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub table: TableId,
    pub rows_inserted: usize,
    pub insert_position: usize,
    pub cells_updated: usize,
    pub placement: Placement,
    /// Ordering was skipped because the new date was unusable or no date field is mapped.
    pub date_fallback: bool,
    pub shape: BatchShape,
    pub capacity: CapacityOutcome,
}

/// Everything computed before the first write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreparedIngest {
    pub table: TableId,
    pub width: usize,
    pub field_map: FieldMap,
    pub shape: BatchShape,
    pub plan: InsertionPlan,
    pub revision: TableRevision,
}

struct Pipeline<'a, O: IngestObserver + ?Sized> {
    table: &'a TableId,
    stage: IngestStage,
    observer: &'a mut O,
}

impl<'a, O: IngestObserver + ?Sized> Pipeline<'a, O> {
    fn new(table: &'a TableId, observer: &'a mut O) -> Self {
        Pipeline {
            table,
            stage: IngestStage::Idle,
            observer,
        }
    }

    fn enter(&mut self, next: IngestStage) {
        self.observer.on_transition(self.table, self.stage, next);
        self.stage = next;
    }

    fn fail(&mut self, err: IngestError) -> IngestError {
        let stage = self.stage;
        self.enter(IngestStage::Failed);
        self.observer.on_failure(self.table, stage, &err);
        err
    }

    fn prepare<G>(
        &mut self,
        gateway: &G,
        submission: &Submission,
        options: &IngestOptions,
    ) -> Result<PreparedIngest, IngestError>
    where
        G: TableGateway + ?Sized,
    {
        let table = self.table;

        self.enter(IngestStage::MappingFields);
        let fields = gateway
            .read_fields(table)
            .map_err(|e| IngestError::gateway(IngestStage::MappingFields, e))?;
        let snapshot = gateway
            .read_table(table)
            .map_err(|e| IngestError::gateway(IngestStage::MappingFields, e))?;
        let field_map = resolve_field_map(&fields, snapshot.width())?;
        debug!(
            "Mapped {} of {} field(s) onto '{table}' (sort column {:?})",
            field_map.len(),
            fields.len(),
            field_map.sort_column()
        );

        self.enter(IngestStage::BuildingRows);
        let batch = build_batch(&fields, &field_map, submission, &options.section_policy())?;

        self.enter(IngestStage::ResolvingPosition);
        let sort_column = field_map.sort_column();
        let leading = sort_column
            .and_then(|column| batch.leading_value(column))
            .unwrap_or("");
        let position = resolve_position(&snapshot.rows, sort_column, leading);
        let shape = batch.shape;

        Ok(PreparedIngest {
            table: table.clone(),
            width: snapshot.width(),
            field_map,
            shape,
            plan: InsertionPlan::new(position, sort_column, batch.rows),
            revision: snapshot.revision(),
        })
    }

    fn apply<G>(
        &mut self,
        gateway: &mut G,
        prepared: &PreparedIngest,
        options: &IngestOptions,
    ) -> Result<IngestReport, IngestError>
    where
        G: TableGateway + ?Sized,
    {
        let table = self.table;
        let plan = &prepared.plan;

        self.enter(IngestStage::EnsuringCapacity);
        let capacity = CapacityExpander::new(options.headroom)
            .ensure(gateway, table, plan.required_rows())
            .map_err(|e| IngestError::gateway(IngestStage::EnsuringCapacity, e))?;

        self.enter(IngestStage::OpeningGap);
        if options.verify_revision {
            let current = gateway
                .read_table(table)
                .map_err(|e| IngestError::gateway(IngestStage::OpeningGap, e))?
                .revision();
            if current != prepared.revision {
                return Err(IngestError::StaleTable {
                    expected: prepared.revision.short().to_string(),
                    found: current.short().to_string(),
                });
            }
        }
        gateway
            .open_gap(table, plan.position, plan.batch_size())
            .map_err(|e| IngestError::gateway(IngestStage::OpeningGap, e))?;

        self.enter(IngestStage::WritingValues);
        let cells_updated = gateway
            .write_rows(table, plan.position, &plan.rows)
            .map_err(|e| IngestError::gateway(IngestStage::WritingValues, e))?;

        self.enter(IngestStage::Done);
        Ok(IngestReport {
            table: table.clone(),
            rows_inserted: plan.batch_size(),
            insert_position: plan.position,
            cells_updated,
            placement: plan.placement,
            date_fallback: plan.placement.is_fallback(),
            shape: prepared.shape,
            capacity,
        })
    }
}

/// Computes the insertion plan for `submission` without writing anything.
pub fn plan_ingest<G, O>(
    gateway: &G,
    table: &TableId,
    submission: &Submission,
    options: &IngestOptions,
    observer: &mut O,
) -> Result<PreparedIngest, IngestError>
where
    G: TableGateway + ?Sized,
    O: IngestObserver + ?Sized,
{
    let mut pipeline = Pipeline::new(table, observer);
    pipeline
        .prepare(gateway, submission, options)
        .map_err(|err| pipeline.fail(err))
}

/// Runs the full pipeline for one submission against `table`.
pub fn ingest<G, O>(
    gateway: &mut G,
    table: &TableId,
    submission: &Submission,
    options: &IngestOptions,
    observer: &mut O,
) -> Result<IngestReport, IngestError>
where
    G: TableGateway + ?Sized,
    O: IngestObserver + ?Sized,
{
    let mut pipeline = Pipeline::new(table, observer);
    let outcome = pipeline
        .prepare(&*gateway, submission, options)
        .and_then(|prepared| pipeline.apply(gateway, &prepared, options));
    match outcome {
        Ok(report) => {
            pipeline.observer.on_complete(table, &report);
            Ok(report)
        }
        Err(err) => Err(pipeline.fail(err)),
    }
}
