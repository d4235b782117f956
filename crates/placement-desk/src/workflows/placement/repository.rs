use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::domain::SourceId;
use super::roster::{Roster, RosterError};
use super::service::RunOutcome;
use super::tabular::{Table, TabularError};

/// Backing store for the shared roster.
pub trait RosterStore: Send + Sync {
    fn load_roster(&self) -> Result<Roster, RosterStoreError>;
    fn save_roster(&self, roster: &Roster) -> Result<(), RosterStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RosterStoreError {
    #[error("no roster data found at {0}")]
    NotFound(String),
    #[error(transparent)]
    Schema(#[from] RosterError),
    #[error(transparent)]
    Encoding(#[from] TabularError),
    #[error("roster store unavailable: {0}")]
    Unavailable(String),
}

/// Retrieval of raw criteria text (e.g. the latest mail from a recruiter).
pub trait CriteriaSource: Send + Sync {
    fn fetch_latest_text(&self, source: &SourceId) -> Result<Option<String>, SourceError>;

    /// Newest first. Defaults to the latest message only.
    fn fetch_recent_texts(
        &self,
        source: &SourceId,
        limit: usize,
    ) -> Result<Vec<String>, SourceError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        Ok(self.fetch_latest_text(source)?.into_iter().collect())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("criteria source unavailable: {0}")]
    Transport(String),
    #[error("source id '{0}' cannot name a criteria entry")]
    InvalidSource(String),
    #[error("criteria fetch timed out after {after:?}")]
    TimedOut { after: Duration },
    #[error("criteria source io failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Persists the outbound report and says where it went.
pub trait ReportSink: Send + Sync {
    fn save_report(&self, report: &Table) -> Result<PathBuf, ReportSinkError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ReportSinkError {
    #[error("report io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Encoding(#[from] TabularError),
}

/// Outbound message hook (e.g. a mail adapter) fired once a report exists.
pub trait ReportNotifier: Send + Sync {
    fn notify(&self, notice: ReportNotice) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportNotice {
    pub run_id: String,
    pub recipients: Vec<String>,
    pub report_path: PathBuf,
    pub scheduled: usize,
    pub counts_per_source: BTreeMap<SourceId, usize>,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Completed run kept for later lookups.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub outcome: RunOutcome,
    pub report: Option<Table>,
    pub roster: Table,
}

/// Storage for completed runs, keyed by run id.
pub trait RunRepository: Send + Sync {
    fn insert(&self, record: RunRecord) -> Result<(), RunRepositoryError>;
    fn fetch(&self, run_id: &str) -> Result<Option<RunRecord>, RunRepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RunRepositoryError {
    #[error("run already recorded")]
    Conflict,
    #[error("run repository unavailable: {0}")]
    Unavailable(String),
}
