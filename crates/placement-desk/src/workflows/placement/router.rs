use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::domain::SourceId;
use super::repository::{RunRecord, RunRepository, RunRepositoryError};
use super::roster::{Roster, RosterLayout};
use super::service::{PipelineSettings, PlacementError, PlacementService, RunParameters};
use super::storage::{
    MemoryNotifier, MemoryReportSink, MemoryRosterStore, StaticCriteriaSource,
};
use super::tabular::{self, Table};

/// Body of `POST /api/v1/placement/runs`.
#[derive(Debug, Clone, Deserialize)]
pub struct RunRequest {
    pub roster_csv: String,
    pub sources: Vec<SourceCriteria>,
    #[serde(default)]
    pub recipients: Vec<String>,
}

/// Criteria texts for one source, newest first.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceCriteria {
    pub source: String,
    #[serde(default)]
    pub criteria: Vec<String>,
}

/// Shared router state: the run registry plus settings cloned into every run.
pub struct PlacementApi<R> {
    runs: Arc<R>,
    settings: PipelineSettings,
}

impl<R> PlacementApi<R> {
    pub fn new(runs: Arc<R>, settings: PipelineSettings) -> Self {
        Self { runs, settings }
    }
}

/// Router exposing request-scoped placement runs and their recorded outcomes.
pub fn placement_router<R>(runs: Arc<R>, settings: PipelineSettings) -> Router
where
    R: RunRepository + 'static,
{
    let api = Arc::new(PlacementApi::new(runs, settings));
    Router::new()
        .route("/api/v1/placement/runs", post(create_run_handler::<R>))
        .route("/api/v1/placement/runs/:run_id", get(run_status_handler::<R>))
        .with_state(api)
}

pub(crate) async fn create_run_handler<R>(
    State(api): State<Arc<PlacementApi<R>>>,
    axum::Json(request): axum::Json<RunRequest>,
) -> Response
where
    R: RunRepository + 'static,
{
    let roster = match tabular::read_csv(request.roster_csv.as_bytes())
        .map_err(|err| err.to_string())
        .and_then(|table| {
            Roster::from_table(table, RosterLayout::default(), &api.settings.schema)
                .map_err(|err| err.to_string())
        }) {
        Ok(roster) => roster,
        Err(message) => {
            let payload = json!({ "error": message });
            return (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response();
        }
    };

    let mut criteria = StaticCriteriaSource::new();
    let mut sources = Vec::with_capacity(request.sources.len());
    let mut messages_per_source = 1;
    for entry in request.sources {
        let source = SourceId::new(entry.source);
        messages_per_source = messages_per_source.max(entry.criteria.len());
        sources.push(source.clone());
        criteria = criteria.with_messages(source, entry.criteria);
    }

    let store = Arc::new(MemoryRosterStore::new(roster));
    let reports = Arc::new(MemoryReportSink::default());
    let service = PlacementService::new(
        Arc::clone(&store),
        Arc::new(criteria),
        reports.clone(),
        Arc::new(MemoryNotifier::default()),
        api.settings.clone(),
    );
    let parameters = RunParameters {
        recipients: request.recipients,
        messages_per_source,
    };

    let outcome = match service.run(&sources, &parameters).await {
        Ok(outcome) => outcome,
        Err(err) => return placement_error_response(err),
    };

    let roster = store
        .snapshot()
        .map(|roster| roster.to_table())
        .unwrap_or_default();
    let record = RunRecord {
        outcome,
        report: reports.reports().pop(),
        roster,
    };

    let roster_csv = match encode_csv(&record.roster) {
        Ok(csv) => csv,
        Err(message) => {
            let payload = json!({ "error": message });
            return (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response();
        }
    };
    let payload = json!({
        "outcome": &record.outcome,
        "roster_csv": roster_csv,
        "report": &record.report,
    });

    match api.runs.insert(record) {
        Ok(()) => (StatusCode::CREATED, axum::Json(payload)).into_response(),
        Err(RunRepositoryError::Conflict) => {
            let payload = json!({ "error": "run already recorded" });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        Err(other) => {
            let payload = json!({ "error": other.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn run_status_handler<R>(
    State(api): State<Arc<PlacementApi<R>>>,
    Path(run_id): Path<String>,
) -> Response
where
    R: RunRepository + 'static,
{
    match api.runs.fetch(&run_id) {
        Ok(Some(record)) => (StatusCode::OK, axum::Json(record)).into_response(),
        Ok(None) => {
            let payload = json!({
                "run_id": run_id,
                "error": "run not found",
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(other) => {
            let payload = json!({ "error": other.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

fn placement_error_response(err: PlacementError) -> Response {
    let status = if err.is_input_error() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        error!(error = %err, "placement run failed");
        StatusCode::INTERNAL_SERVER_ERROR
    };
    let payload = json!({ "error": err.to_string() });
    (status, axum::Json(payload)).into_response()
}

fn encode_csv(table: &Table) -> Result<String, String> {
    let mut buffer = Vec::new();
    tabular::write_csv(table, &mut buffer).map_err(|err| err.to_string())?;
    String::from_utf8(buffer).map_err(|err| err.to_string())
}
