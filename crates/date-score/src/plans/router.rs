use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::domain::{CommentId, CommentSubmission, PlanId, PlanSubmission, Target};
use super::repository::PlanRepository;
use super::service::{DatePlanService, PlanServiceError};
use crate::oracle::{PlanSuggester, ScoringOracle};
use crate::store::RepositoryError;

/// Router builder exposing submission, leaderboard, comment, and like endpoints.
pub fn plan_router<R, O>(service: Arc<DatePlanService<R, O>>) -> Router
where
    R: PlanRepository + 'static,
    O: ScoringOracle + PlanSuggester + 'static,
{
    Router::new()
        .route("/api/dates", post(submit_handler::<R, O>))
        .route("/api/dates/ranking", get(ranking_handler::<R, O>))
        .route("/api/dates/search", get(search_handler::<R, O>))
        .route(
            "/api/dates/:plan_id/comments",
            post(add_comment_handler::<R, O>).get(list_comments_handler::<R, O>),
        )
        .route(
            "/api/comments/:comment_id/like",
            post(toggle_comment_like_handler::<R, O>),
        )
        .route(
            "/api/comments/:comment_id/like-status",
            get(comment_like_status_handler::<R, O>),
        )
        .route(
            "/api/plans/:plan_id/like",
            post(toggle_plan_like_handler::<R, O>),
        )
        .route(
            "/api/plans/:plan_id/like-status",
            get(plan_like_status_handler::<R, O>),
        )
        .route(
            "/api/ai-plan-suggestion",
            post(suggestion_handler::<R, O>),
        )
        .with_state(service)
}

type SharedService<R, O> = State<Arc<DatePlanService<R, O>>>;

#[derive(Debug, Deserialize)]
pub(crate) struct SearchQuery {
    pub(crate) keyword: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeviceRequest {
    pub(crate) device_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SuggestionRequest {
    pub(crate) user_input: String,
}

impl IntoResponse for PlanServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            PlanServiceError::Rejected(_) | PlanServiceError::Invalid(_) => {
                StatusCode::BAD_REQUEST
            }
            PlanServiceError::NotFound(_)
            | PlanServiceError::Repository(RepositoryError::NotFound(_)) => StatusCode::NOT_FOUND,
            PlanServiceError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "date plan request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, PlanServiceError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| PlanServiceError::Invalid(rejection.body_text()))
}

fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, PlanServiceError> {
    query
        .map(|Query(value)| value)
        .map_err(|rejection| PlanServiceError::Invalid(rejection.body_text()))
}

fn respond<T: serde::Serialize>(result: Result<T, PlanServiceError>) -> Response {
    match result {
        Ok(value) => (StatusCode::OK, Json(value)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn submit_handler<R, O>(
    State(service): SharedService<R, O>,
    payload: Result<Json<PlanSubmission>, JsonRejection>,
) -> Response
where
    R: PlanRepository + 'static,
    O: ScoringOracle + PlanSuggester + 'static,
{
    let submission = match json_body(payload) {
        Ok(submission) => submission,
        Err(err) => return err.into_response(),
    };
    respond(service.submit(submission).await)
}

pub(crate) async fn ranking_handler<R, O>(State(service): SharedService<R, O>) -> Response
where
    R: PlanRepository + 'static,
    O: ScoringOracle + PlanSuggester + 'static,
{
    respond(service.ranking().await)
}

pub(crate) async fn search_handler<R, O>(
    State(service): SharedService<R, O>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Response
where
    R: PlanRepository + 'static,
    O: ScoringOracle + PlanSuggester + 'static,
{
    let query = match query_params(query) {
        Ok(query) => query,
        Err(err) => return err.into_response(),
    };
    respond(service.search(&query.keyword).await)
}

pub(crate) async fn add_comment_handler<R, O>(
    State(service): SharedService<R, O>,
    Path(plan_id): Path<i64>,
    payload: Result<Json<CommentSubmission>, JsonRejection>,
) -> Response
where
    R: PlanRepository + 'static,
    O: ScoringOracle + PlanSuggester + 'static,
{
    let submission = match json_body(payload) {
        Ok(submission) => submission,
        Err(err) => return err.into_response(),
    };
    respond(
        service
            .add_comment(PlanId(plan_id), submission)
            .await
            .map(|id| json!({ "message": "Comment posted", "id": id })),
    )
}

pub(crate) async fn list_comments_handler<R, O>(
    State(service): SharedService<R, O>,
    Path(plan_id): Path<i64>,
) -> Response
where
    R: PlanRepository + 'static,
    O: ScoringOracle + PlanSuggester + 'static,
{
    respond(
        service
            .comments(PlanId(plan_id))
            .await
            .map(|comments| json!({ "comments": comments })),
    )
}

pub(crate) async fn toggle_comment_like_handler<R, O>(
    State(service): SharedService<R, O>,
    Path(comment_id): Path<i64>,
    payload: Result<Json<DeviceRequest>, JsonRejection>,
) -> Response
where
    R: PlanRepository + 'static,
    O: ScoringOracle + PlanSuggester + 'static,
{
    toggle_like(&service, Target::Comment(CommentId(comment_id)), payload).await
}

pub(crate) async fn toggle_plan_like_handler<R, O>(
    State(service): SharedService<R, O>,
    Path(plan_id): Path<i64>,
    payload: Result<Json<DeviceRequest>, JsonRejection>,
) -> Response
where
    R: PlanRepository + 'static,
    O: ScoringOracle + PlanSuggester + 'static,
{
    toggle_like(&service, Target::Plan(PlanId(plan_id)), payload).await
}

async fn toggle_like<R, O>(
    service: &DatePlanService<R, O>,
    target: Target,
    payload: Result<Json<DeviceRequest>, JsonRejection>,
) -> Response
where
    R: PlanRepository + 'static,
    O: ScoringOracle + PlanSuggester + 'static,
{
    let request = match json_body(payload) {
        Ok(request) => request,
        Err(err) => return err.into_response(),
    };
    respond(service.toggle_like(target, &request.device_id).await)
}

pub(crate) async fn comment_like_status_handler<R, O>(
    State(service): SharedService<R, O>,
    Path(comment_id): Path<i64>,
    query: Result<Query<DeviceRequest>, QueryRejection>,
) -> Response
where
    R: PlanRepository + 'static,
    O: ScoringOracle + PlanSuggester + 'static,
{
    like_status(&service, Target::Comment(CommentId(comment_id)), query).await
}

pub(crate) async fn plan_like_status_handler<R, O>(
    State(service): SharedService<R, O>,
    Path(plan_id): Path<i64>,
    query: Result<Query<DeviceRequest>, QueryRejection>,
) -> Response
where
    R: PlanRepository + 'static,
    O: ScoringOracle + PlanSuggester + 'static,
{
    like_status(&service, Target::Plan(PlanId(plan_id)), query).await
}

async fn like_status<R, O>(
    service: &DatePlanService<R, O>,
    target: Target,
    query: Result<Query<DeviceRequest>, QueryRejection>,
) -> Response
where
    R: PlanRepository + 'static,
    O: ScoringOracle + PlanSuggester + 'static,
{
    let request = match query_params(query) {
        Ok(request) => request,
        Err(err) => return err.into_response(),
    };
    respond(service.like_status(target, &request.device_id).await)
}

pub(crate) async fn suggestion_handler<R, O>(
    State(service): SharedService<R, O>,
    payload: Result<Json<SuggestionRequest>, JsonRejection>,
) -> Response
where
    R: PlanRepository + 'static,
    O: ScoringOracle + PlanSuggester + 'static,
{
    let request = match json_body(payload) {
        Ok(request) => request,
        Err(err) => return err.into_response(),
    };
    respond(service.suggest(&request.user_input).await)
}
