use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use placement_desk::workflows::placement::{RunRecord, RunRepository, RunRepositoryError};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Completed runs for the lifetime of the process.
#[derive(Default, Clone)]
pub(crate) struct InMemoryRunRepository {
    records: Arc<Mutex<HashMap<String, RunRecord>>>,
}

impl RunRepository for InMemoryRunRepository {
    fn insert(&self, record: RunRecord) -> Result<(), RunRepositoryError> {
        let mut guard = self
            .records
            .lock()
            .map_err(|_| RunRepositoryError::Unavailable("run registry poisoned".to_string()))?;
        if guard.contains_key(&record.outcome.run_id) {
            return Err(RunRepositoryError::Conflict);
        }
        guard.insert(record.outcome.run_id.clone(), record);
        Ok(())
    }

    fn fetch(&self, run_id: &str) -> Result<Option<RunRecord>, RunRepositoryError> {
        let guard = self
            .records
            .lock()
            .map_err(|_| RunRepositoryError::Unavailable("run registry poisoned".to_string()))?;
        Ok(guard.get(run_id).cloned())
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
