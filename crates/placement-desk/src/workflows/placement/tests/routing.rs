use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::workflows::placement::router::{placement_router, PlacementApi, RunRequest};
use crate::workflows::placement::service::PipelineSettings;

fn run_payload() -> Value {
    json!({
        "roster_csv": roster_csv(),
        "sources": [
            { "source": "hr@acme.test", "criteria": ["CGPA: 8.0\nPlace: Chennai"] },
            { "source": "talent@globex.test", "criteria": [] }
        ],
        "recipients": ["coordinator@college.test"]
    })
}

fn post_run(payload: &Value) -> Request<Body> {
    Request::post("/api/v1/placement/runs")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(payload).unwrap()))
        .unwrap()
}

#[tokio::test]
async fn create_route_runs_pipeline_and_records_outcome() {
    let runs = Arc::new(MemoryRuns::default());
    let router = placement_router(runs.clone(), PipelineSettings::default());

    let response = router
        .oneshot(post_run(&run_payload()))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    let run_id = payload["outcome"]["run_id"]
        .as_str()
        .expect("run id present")
        .to_string();
    assert_eq!(payload["outcome"]["counts_per_source"]["hr@acme.test"], 1);
    assert_eq!(payload["outcome"]["counts_per_source"]["talent@globex.test"], 0);
    assert_eq!(payload["outcome"]["sources"][1]["state"], "no_criteria");
    assert_eq!(payload["outcome"]["notified"], true);

    let roster_csv = payload["roster_csv"].as_str().expect("roster csv");
    let header_line = roster_csv.lines().next().expect("header line");
    assert_eq!(
        header_line,
        "student_id,name,email,cgpa,place,sex,status_hr@acme.test,status_talent@globex.test"
    );
    assert!(roster_csv.contains("1,Asha,asha@college.test,9.0,Chennai,F,Selected,Not Selected"));

    let report = &payload["report"];
    assert_eq!(report["rows"].as_array().map(Vec::len), Some(1));
    assert_eq!(report["headers"][6], "exam_date");
    assert_eq!(report["rows"][0][3], "9.0");
    assert_eq!(report["rows"][0][6], "2025-04-01");
    assert_eq!(report["rows"][0][7], "09:00 AM");

    assert!(runs
        .records
        .lock()
        .expect("runs mutex")
        .contains_key(&run_id));
}

#[tokio::test]
async fn status_route_returns_recorded_runs() {
    let runs = Arc::new(MemoryRuns::default());
    let router = placement_router(runs.clone(), PipelineSettings::default());

    let created = router
        .clone()
        .oneshot(post_run(&run_payload()))
        .await
        .expect("route executes");
    let run_id = read_json_body(created).await["outcome"]["run_id"]
        .as_str()
        .expect("run id")
        .to_string();

    let response = router
        .oneshot(
            Request::get(format!("/api/v1/placement/runs/{run_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["outcome"]["run_id"], run_id.as_str());
    assert_eq!(payload["outcome"]["scheduled"], 1);
}

#[tokio::test]
async fn status_route_returns_not_found_for_unknown_runs() {
    let router = placement_router(Arc::new(MemoryRuns::default()), PipelineSettings::default());

    let response = router
        .oneshot(
            Request::get("/api/v1/placement/runs/run-999999")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let payload = read_json_body(response).await;
    assert_eq!(payload["run_id"], "run-999999");
}

#[tokio::test]
async fn create_route_rejects_roster_without_required_columns() {
    let router = placement_router(Arc::new(MemoryRuns::default()), PipelineSettings::default());
    let payload = json!({
        "roster_csv": "name,email\nAsha,asha@college.test",
        "sources": [{ "source": "a", "criteria": ["cgpa: 8"] }]
    });

    let response = router.oneshot(post_run(&payload)).await.expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json_body(response).await;
    assert!(body["error"]
        .as_str()
        .expect("error message")
        .contains("student_id"));
}

#[tokio::test]
async fn create_route_rejects_criteria_on_missing_columns() {
    let router = placement_router(Arc::new(MemoryRuns::default()), PipelineSettings::default());
    let payload = json!({
        "roster_csv": "student_id,name,email,cgpa\n1,Asha,asha@college.test,9.1",
        "sources": [{ "source": "a", "criteria": ["place: Chennai"] }]
    });

    let response = router.oneshot(post_run(&payload)).await.expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn create_handler_returns_internal_error_when_registry_is_down() {
    let api = Arc::new(PlacementApi::new(
        Arc::new(UnavailableRuns),
        PipelineSettings::default(),
    ));
    let request: RunRequest = serde_json::from_value(run_payload()).expect("valid request");

    let response =
        crate::workflows::placement::router::create_run_handler::<UnavailableRuns>(
            State(api),
            axum::Json(request),
        )
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
