use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::audit::{AuditEntry, AuditSink};
use super::capability::Session;
use super::domain::{
    ApplicationId, ApplicationStatus, ApplicationSubmission, Position, VoteChoice,
};
use super::error::{require_comment, ReviewError};
use super::identity::IdentityProvider;
use super::intake::ApplicationSettings;
use super::notify::Notifier;
use super::repository::ApplicationRepository;
use super::service::{ListQuery, ReviewService, StatusChange, TeamDecision};
use super::view::ApplicationView;

const DEFAULT_AUDIT_LIMIT: usize = 500;

/// Shared handler state: the review service plus the token resolver.
pub struct ReviewApi<R, A, N> {
    pub service: Arc<ReviewService<R, A, N>>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl<R, A, N> Clone for ReviewApi<R, A, N> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            identity: Arc::clone(&self.identity),
        }
    }
}

impl IntoResponse for ReviewError {
    fn into_response(self) -> Response {
        let status = match &self {
            ReviewError::Validation(_) => StatusCode::BAD_REQUEST,
            ReviewError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            ReviewError::NotFound(_) => StatusCode::NOT_FOUND,
            ReviewError::InvalidTransition(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ReviewError::Conflict(_) => StatusCode::CONFLICT,
            ReviewError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ReviewError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let body = Json(json!({
            "kind": self.kind(),
            "error": self.to_string(),
        }));
        (status, body).into_response()
    }
}

/// Router builder exposing the review workflow over HTTP.
pub fn review_router<R, A, N>(
    service: Arc<ReviewService<R, A, N>>,
    identity: Arc<dyn IdentityProvider>,
) -> Router
where
    R: ApplicationRepository + 'static,
    A: AuditSink + 'static,
    N: Notifier + 'static,
{
    Router::new()
        .route(
            "/api/v1/applications",
            post(submit_handler::<R, A, N>).get(list_handler::<R, A, N>),
        )
        .route(
            "/api/v1/applications/:application_id",
            get(detail_handler::<R, A, N>).delete(delete_handler::<R, A, N>),
        )
        .route(
            "/api/v1/applications/:application_id/votes",
            post(vote_handler::<R, A, N>),
        )
        .route(
            "/api/v1/applications/:application_id/comments",
            post(comment_handler::<R, A, N>),
        )
        .route(
            "/api/v1/applications/:application_id/team-approval",
            post(team_approve_handler::<R, A, N>),
        )
        .route(
            "/api/v1/applications/:application_id/team-approval/revoke",
            post(team_unapprove_handler::<R, A, N>),
        )
        .route(
            "/api/v1/applications/:application_id/status",
            patch(status_handler::<R, A, N>),
        )
        .route("/api/v1/audit-logs", get(audit_handler::<R, A, N>))
        .route(
            "/api/v1/settings/intake",
            get(intake_status_handler::<R, A, N>).patch(intake_update_handler::<R, A, N>),
        )
        .with_state(ReviewApi { service, identity })
}

pub(crate) fn authenticate(
    identity: &dyn IdentityProvider,
    headers: &HeaderMap,
) -> Result<Session, ReviewError> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(ReviewError::Unauthenticated)?;

    let principal = identity
        .resolve(token)
        .map_err(|_| ReviewError::Unauthenticated)?;
    Ok(Session::new(principal))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListParams {
    search: Option<String>,
    status: Option<String>,
    position: Option<String>,
}

impl ListParams {
    fn into_query(self) -> Result<ListQuery, ReviewError> {
        Ok(ListQuery {
            search: self.search,
            status: self
                .status
                .as_deref()
                .map(str::parse::<ApplicationStatus>)
                .transpose()?,
            position: self
                .position
                .as_deref()
                .map(str::parse::<Position>)
                .transpose()?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct VoteRequest {
    vote: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommentRequest {
    comment: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TeamApprovalRequest {
    #[serde(alias = "approval_type")]
    track: String,
    #[serde(default)]
    comment: String,
    #[serde(default)]
    expected_version: Option<u64>,
}

impl TeamApprovalRequest {
    fn into_decision(self) -> Result<TeamDecision, ReviewError> {
        Ok(TeamDecision {
            track: self.track.parse()?,
            comment: self.comment,
            expected_version: self.expected_version,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusRequest {
    status: String,
    #[serde(default)]
    comment: String,
    #[serde(default)]
    expected_version: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DeleteParams {
    #[serde(default)]
    confirm: bool,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AuditParams {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IntakeRequest {
    applications_enabled: bool,
}

pub(crate) async fn submit_handler<R, A, N>(
    State(api): State<ReviewApi<R, A, N>>,
    Json(submission): Json<ApplicationSubmission>,
) -> Result<Response, ReviewError>
where
    R: ApplicationRepository + 'static,
    A: AuditSink + 'static,
    N: Notifier + 'static,
{
    let record = api.service.submit(submission)?;
    Ok((StatusCode::CREATED, Json(record.application)).into_response())
}

pub(crate) async fn list_handler<R, A, N>(
    State(api): State<ReviewApi<R, A, N>>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ApplicationView>>, ReviewError>
where
    R: ApplicationRepository + 'static,
    A: AuditSink + 'static,
    N: Notifier + 'static,
{
    let session = authenticate(api.identity.as_ref(), &headers)?;
    let query = params.into_query()?;
    Ok(Json(api.service.list(&session, &query)?))
}

pub(crate) async fn detail_handler<R, A, N>(
    State(api): State<ReviewApi<R, A, N>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
) -> Result<Json<ApplicationView>, ReviewError>
where
    R: ApplicationRepository + 'static,
    A: AuditSink + 'static,
    N: Notifier + 'static,
{
    let session = authenticate(api.identity.as_ref(), &headers)?;
    let id = ApplicationId(application_id);
    Ok(Json(api.service.get(&session, &id)?))
}

pub(crate) async fn delete_handler<R, A, N>(
    State(api): State<ReviewApi<R, A, N>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Result<StatusCode, ReviewError>
where
    R: ApplicationRepository + 'static,
    A: AuditSink + 'static,
    N: Notifier + 'static,
{
    let session = authenticate(api.identity.as_ref(), &headers)?;
    if !params.confirm {
        return Err(ReviewError::Validation(
            "deletion is irreversible; repeat the request with confirm=true".to_string(),
        ));
    }

    api.service.delete(&session, &ApplicationId(application_id))?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn vote_handler<R, A, N>(
    State(api): State<ReviewApi<R, A, N>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
    Json(request): Json<VoteRequest>,
) -> Result<Json<ApplicationView>, ReviewError>
where
    R: ApplicationRepository + 'static,
    A: AuditSink + 'static,
    N: Notifier + 'static,
{
    let session = authenticate(api.identity.as_ref(), &headers)?;
    let choice: VoteChoice = request.vote.parse()?;
    let view = api
        .service
        .vote(&session, &ApplicationId(application_id), choice)?;
    Ok(Json(view))
}

pub(crate) async fn comment_handler<R, A, N>(
    State(api): State<ReviewApi<R, A, N>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
    Json(request): Json<CommentRequest>,
) -> Result<Json<ApplicationView>, ReviewError>
where
    R: ApplicationRepository + 'static,
    A: AuditSink + 'static,
    N: Notifier + 'static,
{
    let session = authenticate(api.identity.as_ref(), &headers)?;
    let view = api
        .service
        .comment(&session, &ApplicationId(application_id), &request.comment)?;
    Ok(Json(view))
}

pub(crate) async fn team_approve_handler<R, A, N>(
    State(api): State<ReviewApi<R, A, N>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
    Json(request): Json<TeamApprovalRequest>,
) -> Result<Json<ApplicationView>, ReviewError>
where
    R: ApplicationRepository + 'static,
    A: AuditSink + 'static,
    N: Notifier + 'static,
{
    let session = authenticate(api.identity.as_ref(), &headers)?;
    let decision = request.into_decision()?;
    require_comment(&decision.comment)?;
    let view = api
        .service
        .team_approve(&session, &ApplicationId(application_id), &decision)?;
    Ok(Json(view))
}

pub(crate) async fn team_unapprove_handler<R, A, N>(
    State(api): State<ReviewApi<R, A, N>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
    Json(request): Json<TeamApprovalRequest>,
) -> Result<Json<ApplicationView>, ReviewError>
where
    R: ApplicationRepository + 'static,
    A: AuditSink + 'static,
    N: Notifier + 'static,
{
    let session = authenticate(api.identity.as_ref(), &headers)?;
    let decision = request.into_decision()?;
    let view = api
        .service
        .team_unapprove(&session, &ApplicationId(application_id), &decision)?;
    Ok(Json(view))
}

pub(crate) async fn status_handler<R, A, N>(
    State(api): State<ReviewApi<R, A, N>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
    Json(request): Json<StatusRequest>,
) -> Result<Json<ApplicationView>, ReviewError>
where
    R: ApplicationRepository + 'static,
    A: AuditSink + 'static,
    N: Notifier + 'static,
{
    let session = authenticate(api.identity.as_ref(), &headers)?;
    let change = StatusChange {
        status: request.status.parse()?,
        comment: request.comment,
        expected_version: request.expected_version,
    };
    let view = api
        .service
        .change_status(&session, &ApplicationId(application_id), &change)?;
    Ok(Json(view))
}

pub(crate) async fn audit_handler<R, A, N>(
    State(api): State<ReviewApi<R, A, N>>,
    headers: HeaderMap,
    Query(params): Query<AuditParams>,
) -> Result<Json<Vec<AuditEntry>>, ReviewError>
where
    R: ApplicationRepository + 'static,
    A: AuditSink + 'static,
    N: Notifier + 'static,
{
    let session = authenticate(api.identity.as_ref(), &headers)?;
    let limit = params.limit.unwrap_or(DEFAULT_AUDIT_LIMIT);
    Ok(Json(api.service.audit_log(&session, limit)?))
}

pub(crate) async fn intake_status_handler<R, A, N>(
    State(api): State<ReviewApi<R, A, N>>,
) -> Json<serde_json::Value>
where
    R: ApplicationRepository + 'static,
    A: AuditSink + 'static,
    N: Notifier + 'static,
{
    let settings = api.service.settings();
    Json(json!({ "applications_enabled": settings.applications_enabled }))
}

pub(crate) async fn intake_update_handler<R, A, N>(
    State(api): State<ReviewApi<R, A, N>>,
    headers: HeaderMap,
    Json(request): Json<IntakeRequest>,
) -> Result<Json<ApplicationSettings>, ReviewError>
where
    R: ApplicationRepository + 'static,
    A: AuditSink + 'static,
    N: Notifier + 'static,
{
    let session = authenticate(api.identity.as_ref(), &headers)?;
    let settings = api
        .service
        .update_intake(&session, request.applications_enabled)?;
    Ok(Json(settings))
}
