use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::workflows::submission::router::status_handler;
use crate::workflows::submission::schema::SchemaVersion;

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).expect("serialize body")))
        .expect("request builds")
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("request builds")
}

#[tokio::test]
async fn start_creates_then_resumes() {
    let harness = harness();
    let router = router_for(&harness);

    let response = router
        .clone()
        .oneshot(post_json(
            "/api/v1/submissions",
            json!({ "owner_id": "owner-1", "schema": "legacy" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["step"]["step"], "welcome");
    assert_eq!(payload["step"]["total"], 7);
    assert_eq!(payload["resumed"], false);

    let response = router
        .oneshot(post_json(
            "/api/v1/submissions",
            json!({ "owner_id": "owner-1" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let resumed = read_json_body(response).await;
    assert_eq!(resumed["resumed"], true);
    assert_eq!(resumed["submission"]["schema"], "legacy");
    assert_eq!(
        resumed["submission"]["submission_id"],
        payload["submission"]["submission_id"]
    );
}

#[tokio::test]
async fn actions_return_the_next_step_or_a_typed_validation_error() {
    let harness = harness();
    let id = start(&harness, "owner-1", SchemaVersion::Legacy);
    let router = router_for(&harness);
    let uri = format!("/api/v1/submissions/{id}/actions");

    let response = router
        .clone()
        .oneshot(post_json(&uri, json!({ "action": "advance", "input": "go" })))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["outcome"], "step");
    assert_eq!(payload["step"], "title");

    let response = router
        .clone()
        .oneshot(post_json(&uri, json!({ "action": "advance", "input": "  " })))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert_eq!(payload["step"], "title");
    assert_eq!(payload["field"], "title");
    assert_eq!(payload["kind"]["kind"], "empty");

    let response = router
        .oneshot(post_json(&uri, json!({ "action": "skip" })))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn incomplete_submit_lists_missing_fields() {
    let harness = harness();
    let id = start(&harness, "owner-1", SchemaVersion::Legacy);
    let router = router_for(&harness);

    let response = router
        .oneshot(post_json(
            &format!("/api/v1/submissions/{id}/submit"),
            json!({}),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert_eq!(payload["error"], "missing_fields");
    assert_eq!(
        payload["missing"],
        json!(["title", "description", "product_url", "price", "contact_email"])
    );
}

#[tokio::test]
async fn moderation_maps_conflicts_and_publish_failures() {
    let harness = harness();
    let id = submitted_legacy(&harness, "owner-1");
    let router = router_for(&harness);
    let uri = format!("/api/v1/submissions/{id}/moderation");
    let approve = json!({ "admin_id": "mod-1", "action": "approve" });

    harness.publisher.fail_next("channel offline");
    let response = router
        .clone()
        .oneshot(post_json(&uri, approve.clone()))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(read_json_body(response).await["retryable"], true);

    let response = router
        .clone()
        .oneshot(post_json(&uri, approve.clone()))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["submission"]["status"], "published");
    assert_eq!(payload["audit"]["action"], "approve");
    assert_eq!(payload["notification"]["state"], "delivered");

    let response = router
        .clone()
        .oneshot(post_json(&uri, approve))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(read_json_body(response).await["reason"], "already_moderated");

    let response = router
        .oneshot(get(&format!("/api/v1/submissions/{id}/audit")))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let audit = read_json_body(response).await;
    assert_eq!(audit.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn queue_lists_submitted_records() {
    let harness = harness();
    submitted_legacy(&harness, "owner-1");
    submitted_legacy(&harness, "owner-2");
    fill_legacy(&harness, "owner-3");
    let router = router_for(&harness);

    let response = router
        .oneshot(get("/api/v1/moderation/queue?limit=10"))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let queue = read_json_body(response).await;
    let owners: Vec<&str> = queue
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|entry| entry["owner_id"].as_str())
        .collect();
    assert_eq!(owners, vec!["owner-1", "owner-2"]);
}

#[tokio::test]
async fn unknown_records_and_owners_are_not_found() {
    let harness = harness();
    let router = router_for(&harness);

    let response = router
        .clone()
        .oneshot(get("/api/v1/submissions/sub-missing/step"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = router
        .oneshot(get("/api/v1/submissions/active/nobody"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn status_handler_reports_storage_failures() {
    let harness = harness_with(UnavailableRepository, intake_config());

    let response = status_handler::<UnavailableRepository, RecordingNotifier, ScriptedPublisher>(
        State(Arc::clone(&harness.service)),
        Path("sub-1".to_string()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn forbidden_admins_get_403() {
    let config = crate::config::IntakeConfig {
        admin_ids: vec!["mod-2".to_string()],
        ..intake_config()
    };
    let harness = harness_with(
        crate::workflows::submission::InMemorySubmissionRepository::new(),
        config,
    );
    let id = submitted_legacy(&harness, "owner-1");
    let router = crate::workflows::submission::intake_router(harness.service.clone());

    let response = router
        .oneshot(post_json(
            &format!("/api/v1/submissions/{id}/moderation"),
            json!({ "admin_id": "mod-1", "action": "reject", "reason": "spam" }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn lead_matching_scores_published_listings() {
    let harness = harness();
    let id = submitted_legacy(&harness, "owner-1");
    harness
        .service
        .moderate(
            &id,
            crate::workflows::submission::ModerationRequest {
                admin_id: crate::workflows::submission::AdminId("mod-1".into()),
                action: crate::workflows::submission::AdminAction::Approve,
                reason: None,
                existing_post: None,
            },
        )
        .expect("approve");
    let router = router_for(&harness);

    let response = router
        .oneshot(post_json(
            "/api/v1/leads/match",
            json!({ "id": "req-1", "want": "notion crm template", "budget": "up to $800" }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let leads = read_json_body(response).await;
    assert_eq!(leads[0]["submission_id"], id.0);
    assert_eq!(leads[0]["score"], 50);
}

#[tokio::test]
async fn approving_with_an_unknown_post_is_unprocessable() {
    let harness = harness();
    let id = submitted_legacy(&harness, "owner-1");
    let router = router_for(&harness);

    let response = router
        .oneshot(post_json(
            &format!("/api/v1/submissions/{id}/moderation"),
            json!({
                "admin_id": "mod-1",
                "action": "approve",
                "existing_post": { "channel": "@listings", "post_id": "made-up" },
            }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert_eq!(payload["post"]["post_id"], "made-up");
    assert_eq!(
        stored(harness.repository.as_ref(), &id).status,
        crate::workflows::submission::domain::SubmissionStatus::Submitted
    );
    assert!(harness.publisher.posts().is_empty());
}
