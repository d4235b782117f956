use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::response::Response;
use serde_json::Value;

use crate::workflows::criteria::CriteriaMapping;
use crate::workflows::placement::domain::{AttributeValue, Candidate, SourceId};
use crate::workflows::placement::repository::{
    CriteriaSource, NotifyError, ReportNotice, ReportNotifier, ReportSink, ReportSinkError,
    RosterStore, RosterStoreError, RunRecord, RunRepository, RunRepositoryError, SourceError,
};
use crate::workflows::placement::roster::{Roster, RosterLayout};
use crate::workflows::placement::service::{PipelineSettings, PlacementService};
use crate::workflows::placement::storage::{
    MemoryNotifier, MemoryReportSink, MemoryRosterStore, StaticCriteriaSource,
};
use crate::workflows::placement::tabular::Table;

pub(super) fn candidate(id: &str, cgpa: f64, place: &str, sex: &str) -> Candidate {
    Candidate::new(id, format!("Student {id}"), format!("s{id}@college.test"))
        .with_attribute("cgpa", AttributeValue::Numeric(cgpa))
        .with_attribute("place", AttributeValue::Categorical(place.to_string()))
        .with_attribute("sex", AttributeValue::Categorical(sex.to_string()))
}

pub(super) fn roster(candidates: Vec<Candidate>) -> Roster {
    Roster::from_candidates(RosterLayout::default(), candidates).expect("roster builds")
}

pub(super) fn sample_roster() -> Roster {
    roster(vec![
        candidate("1", 9.0, "Chennai", "F"),
        candidate("2", 7.0, "Chennai", "M"),
        candidate("3", 8.4, "Madurai", "M"),
        candidate("4", 5.0, "Madurai", "F"),
    ])
}

/// `count` records with ids `1..=count`, all identical otherwise.
pub(super) fn numbered_roster(count: usize) -> Roster {
    roster(
        (1..=count)
            .map(|id| candidate(&id.to_string(), 9.0, "Chennai", "F"))
            .collect(),
    )
}

pub(super) fn mapping(pairs: &[(&str, &str)]) -> CriteriaMapping {
    pairs.iter().copied().collect()
}

pub(super) fn source(id: &str) -> SourceId {
    SourceId::new(id)
}

pub(super) struct Harness {
    pub(super) service: PlacementService<MemoryRosterStore, StaticCriteriaSource>,
    pub(super) store: Arc<MemoryRosterStore>,
    pub(super) reports: Arc<MemoryReportSink>,
    pub(super) notifier: Arc<MemoryNotifier>,
}

pub(super) fn harness(
    roster: Roster,
    criteria: StaticCriteriaSource,
    settings: PipelineSettings,
) -> Harness {
    crate::telemetry::init_for_tests();
    let store = Arc::new(MemoryRosterStore::new(roster));
    let reports = Arc::new(MemoryReportSink::default());
    let notifier = Arc::new(MemoryNotifier::default());
    let service = PlacementService::new(
        store.clone(),
        Arc::new(criteria),
        reports.clone(),
        notifier.clone(),
        settings,
    );
    Harness {
        service,
        store,
        reports,
        notifier,
    }
}

/// Sleeps past any sensible fetch timeout before answering.
pub(super) struct SlowCriteriaSource {
    pub(super) delay: Duration,
}

impl CriteriaSource for SlowCriteriaSource {
    fn fetch_latest_text(&self, _source: &SourceId) -> Result<Option<String>, SourceError> {
        std::thread::sleep(self.delay);
        Ok(Some("cgpa: 1.0".to_string()))
    }
}

/// Answers for one source and fails for every other.
pub(super) struct FlakyCriteriaSource {
    pub(super) healthy: SourceId,
    pub(super) text: String,
}

impl CriteriaSource for FlakyCriteriaSource {
    fn fetch_latest_text(&self, source: &SourceId) -> Result<Option<String>, SourceError> {
        if *source == self.healthy {
            Ok(Some(self.text.clone()))
        } else {
            Err(SourceError::Transport("mailbox offline".to_string()))
        }
    }
}

/// Loads a fixed roster but refuses every write.
pub(super) struct ReadOnlyRosterStore {
    pub(super) roster: Roster,
}

impl RosterStore for ReadOnlyRosterStore {
    fn load_roster(&self) -> Result<Roster, RosterStoreError> {
        Ok(self.roster.clone())
    }

    fn save_roster(&self, _roster: &Roster) -> Result<(), RosterStoreError> {
        Err(RosterStoreError::Unavailable("read only".to_string()))
    }
}

pub(super) struct BrokenReportSink;

impl ReportSink for BrokenReportSink {
    fn save_report(&self, _report: &Table) -> Result<PathBuf, ReportSinkError> {
        Err(ReportSinkError::Io(std::io::Error::other("disk full")))
    }
}

pub(super) struct OfflineNotifier;

impl ReportNotifier for OfflineNotifier {
    fn notify(&self, _notice: ReportNotice) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("smtp offline".to_string()))
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryRuns {
    pub(super) records: Arc<Mutex<HashMap<String, RunRecord>>>,
}

impl RunRepository for MemoryRuns {
    fn insert(&self, record: RunRecord) -> Result<(), RunRepositoryError> {
        let mut guard = self.records.lock().expect("runs mutex poisoned");
        if guard.contains_key(&record.outcome.run_id) {
            return Err(RunRepositoryError::Conflict);
        }
        guard.insert(record.outcome.run_id.clone(), record);
        Ok(())
    }

    fn fetch(&self, run_id: &str) -> Result<Option<RunRecord>, RunRepositoryError> {
        let guard = self.records.lock().expect("runs mutex poisoned");
        Ok(guard.get(run_id).cloned())
    }
}

pub(super) struct UnavailableRuns;

impl RunRepository for UnavailableRuns {
    fn insert(&self, _record: RunRecord) -> Result<(), RunRepositoryError> {
        Err(RunRepositoryError::Unavailable("registry offline".to_string()))
    }

    fn fetch(&self, _run_id: &str) -> Result<Option<RunRecord>, RunRepositoryError> {
        Err(RunRepositoryError::Unavailable("registry offline".to_string()))
    }
}

pub(super) fn roster_csv() -> String {
    [
        "Unnamed: 0,student_id,name,email,cgpa,place,sex",
        "0,1,Asha,asha@college.test,9.0,Chennai,F",
        "1,2,Bala,bala@college.test,7.0,Chennai,M",
        "2,3,Chitra,chitra@college.test,8.5,Madurai,F",
    ]
    .join("\n")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 64)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
