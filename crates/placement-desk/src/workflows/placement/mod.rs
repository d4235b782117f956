//! Candidate placement: eligibility, per-source status reconciliation, exam
//! slot assignment, and the outbound report.
//!
//! A run loads the roster, resolves each source's criteria against it, writes
//! the per-source status columns back, then schedules the union of selections
//! and emits the report. Storage, criteria retrieval, and notification sit
//! behind the traits in [`repository`] so the same pipeline serves the CLI and
//! the HTTP API.

pub mod domain;
pub mod eligibility;
pub mod ledger;
pub mod report;
pub mod repository;
pub mod roster;
pub mod router;
pub mod service;
pub mod slots;
pub mod storage;
pub mod tabular;

#[cfg(test)]
mod tests;

pub use domain::{
    AttributeKind, AttributeValue, Candidate, CandidateId, ScheduledCandidate, SelectionResult,
    SlotAssignment, SourceId, SourceStatus,
};
pub use eligibility::{
    Clause, CompiledCriteria, CriteriaError, CriteriaIssue, EligibilityResolver,
    EligibilitySchema, Resolution, SchemaError, UnknownFieldPolicy,
};
pub use ledger::{LedgerEntry, ReconciliationLedger};
pub use report::{ReportEmitter, ReportFormat};
pub use repository::{
    CriteriaSource, NotifyError, ReportNotice, ReportNotifier, ReportSink, ReportSinkError,
    RosterStore, RosterStoreError, RunRecord, RunRepository, RunRepositoryError, SourceError,
};
pub use roster::{Roster, RosterError, RosterLayout};
pub use router::placement_router;
pub use service::{
    selection_union, PipelineSettings, PlacementError, PlacementService, RunOutcome,
    RunParameters, SourceState, SourceSummary,
};
pub use slots::{CollisionPolicy, SlotAssigner, SlotCalendar, SlotError, SlotSchedule};
pub use storage::{
    DirectoryCriteriaSource, DirectoryReportSink, FileRosterStore, LogNotifier,
    MemoryNotifier, MemoryReportSink, MemoryRosterStore, StaticCriteriaSource,
};
pub use tabular::{Table, TabularError};
