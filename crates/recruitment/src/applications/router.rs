use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use super::domain::{ApplicationId, ApplicationSubmission, Identity};
use super::service::ApplicationService;
use super::status::StatusUpdateError;
use super::store::ApplicationStore;
use super::submission::SubmissionError;

const SUBMIT_FAILED: &str = "could not submit application";

/// Body of `POST /api/v1/applications`. `username` is the identity resolved by the auth layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitApplicationRequest {
    pub username: String,
    #[serde(flatten)]
    pub submission: ApplicationSubmission,
}

/// Body of `PATCH /api/v1/applications/:application_id/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub application_status: String,
    pub version_number: i64,
}

/// Router builder exposing HTTP endpoints for submission, listing, and review.
pub fn application_router<S>(service: Arc<ApplicationService<S>>) -> Router
where
    S: ApplicationStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/applications",
            post(submit_handler::<S>).get(list_handler::<S>),
        )
        .route(
            "/api/v1/applications/:application_id",
            get(fetch_handler::<S>),
        )
        .route(
            "/api/v1/applications/:application_id/status",
            patch(status_handler::<S>),
        )
        .with_state(service)
}

fn success<T: Serialize>(status: StatusCode, body: T) -> Response {
    (status, axum::Json(json!({ "success": body }))).into_response()
}

fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    (status, axum::Json(json!({ "error": message.into() }))).into_response()
}

/// Malformed bodies (bad JSON, impossible calendar dates, wrong types) are client errors in
/// the same envelope as validation failures.
fn malformed(rejection: JsonRejection) -> Response {
    failure(StatusCode::BAD_REQUEST, rejection.body_text())
}

pub(crate) async fn submit_handler<S>(
    State(service): State<Arc<ApplicationService<S>>>,
    request: Result<axum::Json<SubmitApplicationRequest>, JsonRejection>,
) -> Response
where
    S: ApplicationStore + 'static,
{
    let axum::Json(request) = match request {
        Ok(body) => body,
        Err(rejection) => return malformed(rejection),
    };
    let identity = Identity::Username(request.username);
    match service.submit(&identity, &request.submission).await {
        Ok(_) => success(StatusCode::OK, "success"),
        Err(SubmissionError::Validation(err)) => failure(StatusCode::BAD_REQUEST, err.to_string()),
        Err(SubmissionError::PersonNotFound) => failure(StatusCode::NOT_FOUND, SUBMIT_FAILED),
        Err(SubmissionError::Failed(source)) => {
            error!(error = %source, "submission failed");
            failure(StatusCode::INTERNAL_SERVER_ERROR, SUBMIT_FAILED)
        }
    }
}

pub(crate) async fn list_handler<S>(State(service): State<Arc<ApplicationService<S>>>) -> Response
where
    S: ApplicationStore + 'static,
{
    match service.list().await {
        Ok(views) if views.is_empty() => failure(StatusCode::NOT_FOUND, "no applications found"),
        Ok(views) => success(StatusCode::OK, views),
        Err(err) => {
            error!(error = %err, "listing applications failed");
            failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                "could not retrieve applications",
            )
        }
    }
}

pub(crate) async fn fetch_handler<S>(
    State(service): State<Arc<ApplicationService<S>>>,
    Path(application_id): Path<i64>,
) -> Response
where
    S: ApplicationStore + 'static,
{
    match service.get(ApplicationId(application_id)).await {
        Ok(Some(view)) => success(StatusCode::OK, view),
        Ok(None) => failure(
            StatusCode::NOT_FOUND,
            format!("application {application_id} not found"),
        ),
        Err(err) => {
            error!(error = %err, application_id, "fetching application failed");
            failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                "could not retrieve application",
            )
        }
    }
}

pub(crate) async fn status_handler<S>(
    State(service): State<Arc<ApplicationService<S>>>,
    Path(application_id): Path<i64>,
    request: Result<axum::Json<StatusUpdateRequest>, JsonRejection>,
) -> Response
where
    S: ApplicationStore + 'static,
{
    let axum::Json(request) = match request {
        Ok(body) => body,
        Err(rejection) => return malformed(rejection),
    };
    let outcome = service
        .update_status(
            ApplicationId(application_id),
            &request.application_status,
            request.version_number,
        )
        .await;

    match outcome {
        Ok(receipt) => success(StatusCode::OK, receipt),
        Err(
            err @ (StatusUpdateError::Validation(_) | StatusUpdateError::InvalidStatus(_)),
        ) => failure(StatusCode::BAD_REQUEST, err.to_string()),
        Err(err @ StatusUpdateError::NotFound(_)) => {
            failure(StatusCode::NOT_FOUND, err.to_string())
        }
        Err(StatusUpdateError::Conflict { .. }) => failure(
            StatusCode::CONFLICT,
            "application was already handled or its state changed; reload and try again",
        ),
        Err(err @ StatusUpdateError::InvalidTransition { .. }) => {
            failure(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
        }
        Err(StatusUpdateError::Persistence(source)) => {
            error!(error = %source, application_id, "status update failed");
            failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                "could not update application",
            )
        }
    }
}
