use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::domain::{OwnerId, SubmissionId};
use super::engine::WizardAction;
use super::error::IntakeError;
use super::gateway::{ChannelPublisher, Notifier};
use super::lifecycle::ModerationRequest;
use super::repository::{RepositoryError, SubmissionRepository};
use super::schema::SchemaVersion;
use super::service::IntakeService;
use crate::workflows::matching::BuyerRequest;

const DEFAULT_QUEUE_LIMIT: usize = 50;

/// Router builder exposing the wizard, moderation, and lead-matching endpoints.
pub fn intake_router<R, N, P>(service: Arc<IntakeService<R, N, P>>) -> Router
where
    R: SubmissionRepository + 'static,
    N: Notifier + 'static,
    P: ChannelPublisher + 'static,
{
    Router::new()
        .route("/api/v1/submissions", post(start_handler::<R, N, P>))
        .route(
            "/api/v1/submissions/active/:owner_id",
            get(active_handler::<R, N, P>),
        )
        .route(
            "/api/v1/submissions/:submission_id",
            get(status_handler::<R, N, P>),
        )
        .route(
            "/api/v1/submissions/:submission_id/step",
            get(step_handler::<R, N, P>),
        )
        .route(
            "/api/v1/submissions/:submission_id/actions",
            post(action_handler::<R, N, P>),
        )
        .route(
            "/api/v1/submissions/:submission_id/submit",
            post(submit_handler::<R, N, P>),
        )
        .route(
            "/api/v1/submissions/:submission_id/reopen",
            post(reopen_handler::<R, N, P>),
        )
        .route(
            "/api/v1/submissions/:submission_id/moderation",
            post(moderation_handler::<R, N, P>),
        )
        .route(
            "/api/v1/submissions/:submission_id/audit",
            get(audit_handler::<R, N, P>),
        )
        .route("/api/v1/moderation/queue", get(queue_handler::<R, N, P>))
        .route("/api/v1/leads/match", post(match_handler::<R, N, P>))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct StartRequest {
    owner_id: String,
    #[serde(default)]
    schema: Option<SchemaVersion>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QueueParams {
    limit: Option<usize>,
}

type Service<R, N, P> = State<Arc<IntakeService<R, N, P>>>;

pub(crate) async fn start_handler<R, N, P>(
    State(service): Service<R, N, P>,
    Json(request): Json<StartRequest>,
) -> Response
where
    R: SubmissionRepository + 'static,
    N: Notifier + 'static,
    P: ChannelPublisher + 'static,
{
    let owner = OwnerId(request.owner_id);
    match service.start_or_resume(&owner, request.schema) {
        Ok(session) => {
            let status = if session.resumed {
                StatusCode::OK
            } else {
                StatusCode::CREATED
            };
            (status, Json(session)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn active_handler<R, N, P>(
    State(service): Service<R, N, P>,
    Path(owner_id): Path<String>,
) -> Response
where
    R: SubmissionRepository + 'static,
    N: Notifier + 'static,
    P: ChannelPublisher + 'static,
{
    let owner = OwnerId(owner_id);
    match service.get_active_submission(&owner) {
        Ok(Some(record)) => (StatusCode::OK, Json(record.status_view())).into_response(),
        Ok(None) => {
            let payload = json!({
                "owner_id": owner.0,
                "error": "no active submission",
            });
            (StatusCode::NOT_FOUND, Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn status_handler<R, N, P>(
    State(service): Service<R, N, P>,
    Path(submission_id): Path<String>,
) -> Response
where
    R: SubmissionRepository + 'static,
    N: Notifier + 'static,
    P: ChannelPublisher + 'static,
{
    match service.get(&SubmissionId(submission_id)) {
        Ok(record) => (StatusCode::OK, Json(record.status_view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn step_handler<R, N, P>(
    State(service): Service<R, N, P>,
    Path(submission_id): Path<String>,
) -> Response
where
    R: SubmissionRepository + 'static,
    N: Notifier + 'static,
    P: ChannelPublisher + 'static,
{
    match service.current_step(&SubmissionId(submission_id)) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn action_handler<R, N, P>(
    State(service): Service<R, N, P>,
    Path(submission_id): Path<String>,
    Json(action): Json<WizardAction>,
) -> Response
where
    R: SubmissionRepository + 'static,
    N: Notifier + 'static,
    P: ChannelPublisher + 'static,
{
    match service.apply(&SubmissionId(submission_id), action) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn submit_handler<R, N, P>(
    State(service): Service<R, N, P>,
    Path(submission_id): Path<String>,
) -> Response
where
    R: SubmissionRepository + 'static,
    N: Notifier + 'static,
    P: ChannelPublisher + 'static,
{
    match service.submit(&SubmissionId(submission_id)) {
        Ok(view) => (StatusCode::ACCEPTED, Json(view)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn reopen_handler<R, N, P>(
    State(service): Service<R, N, P>,
    Path(submission_id): Path<String>,
) -> Response
where
    R: SubmissionRepository + 'static,
    N: Notifier + 'static,
    P: ChannelPublisher + 'static,
{
    match service.reopen(&SubmissionId(submission_id)) {
        Ok(session) => (StatusCode::OK, Json(session)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn moderation_handler<R, N, P>(
    State(service): Service<R, N, P>,
    Path(submission_id): Path<String>,
    Json(request): Json<ModerationRequest>,
) -> Response
where
    R: SubmissionRepository + 'static,
    N: Notifier + 'static,
    P: ChannelPublisher + 'static,
{
    match service.moderate(&SubmissionId(submission_id), request) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn audit_handler<R, N, P>(
    State(service): Service<R, N, P>,
    Path(submission_id): Path<String>,
) -> Response
where
    R: SubmissionRepository + 'static,
    N: Notifier + 'static,
    P: ChannelPublisher + 'static,
{
    match service.audit_trail(&SubmissionId(submission_id)) {
        Ok(entries) => (StatusCode::OK, Json(entries)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn queue_handler<R, N, P>(
    State(service): Service<R, N, P>,
    Query(params): Query<QueueParams>,
) -> Response
where
    R: SubmissionRepository + 'static,
    N: Notifier + 'static,
    P: ChannelPublisher + 'static,
{
    match service.moderation_queue(params.limit.unwrap_or(DEFAULT_QUEUE_LIMIT)) {
        Ok(queue) => (StatusCode::OK, Json(queue)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn match_handler<R, N, P>(
    State(service): Service<R, N, P>,
    Json(request): Json<BuyerRequest>,
) -> Response
where
    R: SubmissionRepository + 'static,
    N: Notifier + 'static,
    P: ChannelPublisher + 'static,
{
    match service.match_leads(&request) {
        Ok(leads) => (StatusCode::OK, Json(leads)).into_response(),
        Err(err) => error_response(err),
    }
}

/// Maps intake failures onto HTTP status codes and a JSON error body.
pub fn error_response(err: IntakeError) -> Response {
    let message = err.to_string();
    let (status, payload) = match &err {
        IntakeError::Validation(validation) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({
                "error": message,
                "step": validation.step,
                "field": validation.field,
                "kind": validation.kind,
            }),
        ),
        IntakeError::MissingFields { missing } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({ "error": "missing_fields", "missing": missing }),
        ),
        IntakeError::NotSkippable { .. }
        | IntakeError::UnsupportedAction { .. }
        | IntakeError::ReasonRequired { .. } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({ "error": message }),
        ),
        IntakeError::Conflict { reason } => (
            StatusCode::CONFLICT,
            json!({ "error": "conflict", "reason": reason.label() }),
        ),
        IntakeError::NotFound(id) => (
            StatusCode::NOT_FOUND,
            json!({ "error": message, "submission_id": id }),
        ),
        IntakeError::Repository(RepositoryError::NotFound) => {
            (StatusCode::NOT_FOUND, json!({ "error": message }))
        }
        IntakeError::Forbidden(_) => (StatusCode::FORBIDDEN, json!({ "error": message })),
        IntakeError::Publish(_) => (
            StatusCode::BAD_GATEWAY,
            json!({ "error": message, "retryable": true }),
        ),
        IntakeError::PublishedNotCommitted { post, .. } => {
            let status = if err.conflict_reason().is_some() {
                StatusCode::CONFLICT
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (status, json!({ "error": message, "post": post }))
        }
        IntakeError::UnconfirmedPost { post, .. } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({ "error": message, "post": post }),
        ),
        IntakeError::SchemaMismatch { .. } | IntakeError::Repository(_) => {
            error!(error = %message, "intake request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": message }),
            )
        }
    };
    (status, Json(payload)).into_response()
}
