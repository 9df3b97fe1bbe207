use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use serde_json::Value;
use tokio::sync::Notify;

use crate::oracle::{Evaluation, OracleError, PlanSuggester, PlanSuggestion, ScoringOracle};
use crate::plans::domain::{
    CommentId, NewComment, NewPlan, PlanComment, PlanId, PlanSubmission, PlanSummary, RankedPlan,
    Target,
};
use crate::plans::repository::PlanRepository;
use crate::plans::{plan_router, ContentFilter, DatePlanService, PlanServiceSettings};
use crate::scoring::{ConsistencyMode, PopulationEntry, ScoreStore, ScoreUpdate, SubScores};
use crate::store::{InMemoryPlanStore, RepositoryError};

/// Plan whose additional notes carry the uniform grade [`GradingOracle`] hands out.
pub(super) fn submission(notes: &str) -> PlanSubmission {
    PlanSubmission {
        age: "27".to_string(),
        occupation: "designer".to_string(),
        gender: "female".to_string(),
        date: "2025-05-17".to_string(),
        day_of_week: "Saturday".to_string(),
        time_of_day: "evening".to_string(),
        date_number: "3".to_string(),
        location: "harbour district".to_string(),
        cost: "8000".to_string(),
        additional_notes: notes.to_string(),
    }
}

pub(super) fn settings(consistency: ConsistencyMode) -> PlanServiceSettings {
    PlanServiceSettings {
        consistency,
        oracle_timeout: Duration::from_secs(5),
    }
}

pub(super) fn filter() -> ContentFilter {
    ContentFilter::new(["forbidden"])
}

/// Grades every criterion with the number at the end of the plan text.
pub(super) struct GradingOracle;

#[async_trait]
impl ScoringOracle for GradingOracle {
    async fn evaluate(&self, plan_text: &str) -> Result<Evaluation, OracleError> {
        let grade = plan_text
            .split_whitespace()
            .last()
            .and_then(|token| token.parse::<i32>().ok())
            .ok_or_else(|| OracleError::Malformed("no grade in plan text".to_string()))?;
        Ok(Evaluation {
            scores: SubScores::uniform(grade),
            comment: format!("graded {grade}"),
        })
    }
}

#[async_trait]
impl PlanSuggester for GradingOracle {
    async fn suggest(&self, request: &str) -> Result<PlanSuggestion, OracleError> {
        Ok(PlanSuggestion {
            plan_title: format!("Idea for {request}"),
            plan_description: "Walk along the river, then dinner.".to_string(),
            estimated_cost: "6000 yen".to_string(),
            duration: "4 hours".to_string(),
            tips: "Book ahead.".to_string(),
        })
    }
}

pub(super) struct FailingOracle;

#[async_trait]
impl ScoringOracle for FailingOracle {
    async fn evaluate(&self, _plan_text: &str) -> Result<Evaluation, OracleError> {
        Err(OracleError::Status {
            status: 503,
            body: "overloaded".to_string(),
        })
    }
}

#[async_trait]
impl PlanSuggester for FailingOracle {
    async fn suggest(&self, _request: &str) -> Result<PlanSuggestion, OracleError> {
        Err(OracleError::Refused("blocked".to_string()))
    }
}

pub(super) fn build_service(
    consistency: ConsistencyMode,
) -> (
    DatePlanService<InMemoryPlanStore, GradingOracle>,
    Arc<InMemoryPlanStore>,
) {
    let store = Arc::new(InMemoryPlanStore::default());
    let service = DatePlanService::new(
        store.clone(),
        Arc::new(GradingOracle),
        filter(),
        settings(consistency),
    );
    (service, store)
}

pub(super) fn router_with_service<R, O>(service: DatePlanService<R, O>) -> axum::Router
where
    R: PlanRepository + 'static,
    O: ScoringOracle + PlanSuggester + 'static,
{
    plan_router(Arc::new(service))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) struct UnavailableStore;

fn offline() -> RepositoryError {
    RepositoryError::Unavailable("database offline".to_string())
}

#[async_trait]
impl ScoreStore for UnavailableStore {
    async fn population(&self) -> Result<Vec<PopulationEntry>, RepositoryError> {
        Err(offline())
    }

    async fn apply_scores(&self, _updates: &[ScoreUpdate]) -> Result<(), RepositoryError> {
        Err(offline())
    }
}

#[async_trait]
impl PlanRepository for UnavailableStore {
    async fn insert_plan(&self, _plan: NewPlan) -> Result<PlanId, RepositoryError> {
        Err(offline())
    }

    async fn score(&self, _id: PlanId) -> Result<Option<i32>, RepositoryError> {
        Err(offline())
    }

    async fn ranking(&self) -> Result<Vec<RankedPlan>, RepositoryError> {
        Err(offline())
    }

    async fn search(&self, _keyword: &str) -> Result<Vec<PlanSummary>, RepositoryError> {
        Err(offline())
    }

    async fn exists(&self, _target: Target) -> Result<bool, RepositoryError> {
        Err(offline())
    }

    async fn insert_comment(&self, _comment: NewComment) -> Result<CommentId, RepositoryError> {
        Err(offline())
    }

    async fn comments(&self, _plan_id: PlanId) -> Result<Vec<PlanComment>, RepositoryError> {
        Err(offline())
    }

    async fn add_like(&self, _target: Target, _device_id: &str) -> Result<bool, RepositoryError> {
        Err(offline())
    }

    async fn remove_like(
        &self,
        _target: Target,
        _device_id: &str,
    ) -> Result<bool, RepositoryError> {
        Err(offline())
    }

    async fn has_liked(&self, _target: Target, _device_id: &str) -> Result<bool, RepositoryError> {
        Err(offline())
    }

    async fn like_count(&self, _target: Target) -> Result<i64, RepositoryError> {
        Err(offline())
    }
}

/// In-memory store whose first score write-back parks until released.
#[derive(Default)]
pub(super) struct GatedStore {
    pub(super) inner: InMemoryPlanStore,
    pub(super) entered: Arc<Notify>,
    pub(super) release: Arc<Notify>,
    tripped: AtomicBool,
}

#[async_trait]
impl ScoreStore for GatedStore {
    async fn population(&self) -> Result<Vec<PopulationEntry>, RepositoryError> {
        self.inner.population().await
    }

    async fn apply_scores(&self, updates: &[ScoreUpdate]) -> Result<(), RepositoryError> {
        if !self.tripped.swap(true, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.apply_scores(updates).await
    }
}

#[async_trait]
impl PlanRepository for GatedStore {
    async fn insert_plan(&self, plan: NewPlan) -> Result<PlanId, RepositoryError> {
        self.inner.insert_plan(plan).await
    }

    async fn score(&self, id: PlanId) -> Result<Option<i32>, RepositoryError> {
        self.inner.score(id).await
    }

    async fn ranking(&self) -> Result<Vec<RankedPlan>, RepositoryError> {
        self.inner.ranking().await
    }

    async fn search(&self, keyword: &str) -> Result<Vec<PlanSummary>, RepositoryError> {
        self.inner.search(keyword).await
    }

    async fn exists(&self, target: Target) -> Result<bool, RepositoryError> {
        self.inner.exists(target).await
    }

    async fn insert_comment(&self, comment: NewComment) -> Result<CommentId, RepositoryError> {
        self.inner.insert_comment(comment).await
    }

    async fn comments(&self, plan_id: PlanId) -> Result<Vec<PlanComment>, RepositoryError> {
        self.inner.comments(plan_id).await
    }

    async fn add_like(&self, target: Target, device_id: &str) -> Result<bool, RepositoryError> {
        self.inner.add_like(target, device_id).await
    }

    async fn remove_like(&self, target: Target, device_id: &str) -> Result<bool, RepositoryError> {
        self.inner.remove_like(target, device_id).await
    }

    async fn has_liked(&self, target: Target, device_id: &str) -> Result<bool, RepositoryError> {
        self.inner.has_liked(target, device_id).await
    }

    async fn like_count(&self, target: Target) -> Result<i64, RepositoryError> {
        self.inner.like_count(target).await
    }
}

pub(super) fn gated_service(
    consistency: ConsistencyMode,
) -> (
    Arc<DatePlanService<GatedStore, GradingOracle>>,
    Arc<GatedStore>,
) {
    let store = Arc::new(GatedStore::default());
    let service = DatePlanService::new(
        store.clone(),
        Arc::new(GradingOracle),
        filter(),
        settings(consistency),
    );
    (Arc::new(service), store)
}
