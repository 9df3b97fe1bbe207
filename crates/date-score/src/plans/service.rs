use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::domain::{
    CommentId, CommentSubmission, LikeStatus, LikeToggle, NewComment, NewPlan, PlanComment,
    PlanId, PlanSubmission, PlanSummary, RankedPlan, ScoredPlan, Target,
};
use super::filter::{ContentFilter, ContentRejected};
use super::repository::PlanRepository;
use crate::oracle::{
    evaluate_or_fallback, suggest_or_fallback, PlanSuggester, PlanSuggestion, ScoringOracle,
};
use crate::scoring::{recalculate_all, recalculate_detached, ConsistencyMode};
use crate::store::RepositoryError;

/// Runtime knobs for [`DatePlanService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanServiceSettings {
    pub consistency: ConsistencyMode,
    pub oracle_timeout: Duration,
}

impl Default for PlanServiceSettings {
    fn default() -> Self {
        Self {
            consistency: ConsistencyMode::Serialized,
            oracle_timeout: Duration::from_secs(30),
        }
    }
}

/// Service composing the content filter, scoring oracle, and record store.
pub struct DatePlanService<R, O> {
    repository: Arc<R>,
    oracle: Arc<O>,
    filter: Arc<ContentFilter>,
    settings: PlanServiceSettings,
    // single-writer gate for insert + recalculate in serialized mode
    write_gate: Mutex<()>,
}

impl<R, O> DatePlanService<R, O>
where
    R: PlanRepository + 'static,
    O: ScoringOracle + PlanSuggester + 'static,
{
    pub fn new(
        repository: Arc<R>,
        oracle: Arc<O>,
        filter: ContentFilter,
        settings: PlanServiceSettings,
    ) -> Self {
        Self {
            repository,
            oracle,
            filter: Arc::new(filter),
            settings,
            write_gate: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> PlanServiceSettings {
        self.settings
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Filter, grade, persist, and re-rank a new plan.
    ///
    /// Oracle failures are absorbed into neutral grades; store failures abort.
    pub async fn submit(
        &self,
        submission: PlanSubmission,
    ) -> Result<ScoredPlan, PlanServiceError> {
        self.screen(&submission.joined_text())?;

        let plan_text = submission.render_plan_text();
        let evaluation =
            evaluate_or_fallback(self.oracle.as_ref(), &plan_text, self.settings.oracle_timeout)
                .await;
        let composite = evaluation.scores.composite();

        let new_plan = NewPlan {
            plan: plan_text.clone(),
            comment: evaluation.comment.clone(),
            sub_scores: evaluation.scores,
            provisional_score: composite,
            metadata: submission.metadata(),
            created_at: Utc::now(),
        };

        let (id, recalculated, score) = match self.settings.consistency {
            ConsistencyMode::Serialized => {
                let _gate = self.write_gate.lock().await;
                self.persist_and_rescore(new_plan).await?
            }
            ConsistencyMode::Legacy => self.persist_and_rescore(new_plan).await?,
        };

        info!(plan_id = %id, composite, score, recalculated, "date plan scored");

        Ok(ScoredPlan {
            id,
            score,
            comment: evaluation.comment,
            plan: plan_text,
            detailed_scores: evaluation.scores,
        })
    }

    async fn persist_and_rescore(
        &self,
        plan: NewPlan,
    ) -> Result<(PlanId, usize, i32), PlanServiceError> {
        let repository = self.repository.as_ref();
        let id = repository.insert_plan(plan).await?;
        // legacy mode keeps the unlocked read-then-write pass
        let recalculated = match self.settings.consistency {
            ConsistencyMode::Serialized => recalculate_all(repository).await?,
            ConsistencyMode::Legacy => recalculate_detached(repository).await?,
        };
        let score = self
            .repository
            .score(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("date plan {id}")))?;
        Ok((id, recalculated, score))
    }

    /// Run one recalculation pass outside of a submission.
    pub async fn recalculate(&self) -> Result<usize, PlanServiceError> {
        let updated = match self.settings.consistency {
            ConsistencyMode::Serialized => {
                let _gate = self.write_gate.lock().await;
                recalculate_all(self.repository.as_ref()).await?
            }
            ConsistencyMode::Legacy => recalculate_all(self.repository.as_ref()).await?,
        };
        Ok(updated)
    }

    pub async fn ranking(&self) -> Result<Vec<RankedPlan>, PlanServiceError> {
        Ok(self.repository.ranking().await?)
    }

    /// Case-insensitive match on plan text, AI comment, and notes. An empty
    /// keyword lists every plan.
    pub async fn search(&self, keyword: &str) -> Result<Vec<PlanSummary>, PlanServiceError> {
        Ok(self.repository.search(keyword).await?)
    }

    pub async fn add_comment(
        &self,
        plan_id: PlanId,
        submission: CommentSubmission,
    ) -> Result<CommentId, PlanServiceError> {
        let username = submission.username.trim();
        let comment = submission.comment.trim();
        if username.is_empty() || comment.is_empty() {
            return Err(PlanServiceError::Invalid(
                "username and comment are required".to_string(),
            ));
        }
        self.screen(&format!("{username} {comment}"))?;
        self.require(Target::Plan(plan_id)).await?;

        let id = self
            .repository
            .insert_comment(NewComment {
                plan_id,
                username: username.to_string(),
                comment: comment.to_string(),
                created_at: Utc::now(),
            })
            .await?;
        info!(plan_id = %plan_id, comment_id = id.0, "comment posted");
        Ok(id)
    }

    pub async fn comments(&self, plan_id: PlanId) -> Result<Vec<PlanComment>, PlanServiceError> {
        Ok(self.repository.comments(plan_id).await?)
    }

    /// Like the target if this device has not yet, otherwise remove the like.
    pub async fn toggle_like(
        &self,
        target: Target,
        device_id: &str,
    ) -> Result<LikeToggle, PlanServiceError> {
        let device_id = Self::device(device_id)?;
        self.require(target).await?;

        let (liked, message) = if self.repository.has_liked(target, device_id).await? {
            self.repository.remove_like(target, device_id).await?;
            (false, "Like removed")
        } else {
            // a concurrent like from the same device leaves it liked either way
            self.repository.add_like(target, device_id).await?;
            (true, "Liked")
        };

        let like_count = self.repository.like_count(target).await?;
        Ok(LikeToggle {
            message: message.to_string(),
            liked,
            like_count,
        })
    }

    pub async fn like_status(
        &self,
        target: Target,
        device_id: &str,
    ) -> Result<LikeStatus, PlanServiceError> {
        let device_id = Self::device(device_id)?;
        Ok(LikeStatus {
            liked: self.repository.has_liked(target, device_id).await?,
            like_count: self.repository.like_count(target).await?,
        })
    }

    /// Generate a date idea; never scored or stored.
    pub async fn suggest(&self, user_input: &str) -> Result<PlanSuggestion, PlanServiceError> {
        let request = user_input.trim();
        if request.is_empty() {
            return Err(PlanServiceError::Invalid(
                "user_input must not be empty".to_string(),
            ));
        }
        self.screen(request)?;
        Ok(suggest_or_fallback(self.oracle.as_ref(), request, self.settings.oracle_timeout).await)
    }

    fn screen(&self, text: &str) -> Result<(), ContentRejected> {
        self.filter.check(text).map_err(|rejected| {
            warn!(word = %rejected.word, "input rejected by content filter");
            rejected
        })
    }

    async fn require(&self, target: Target) -> Result<(), PlanServiceError> {
        if self.repository.exists(target).await? {
            Ok(())
        } else {
            Err(PlanServiceError::NotFound(target))
        }
    }

    fn device(device_id: &str) -> Result<&str, PlanServiceError> {
        let device_id = device_id.trim();
        if device_id.is_empty() {
            Err(PlanServiceError::Invalid(
                "device_id must not be empty".to_string(),
            ))
        } else {
            Ok(device_id)
        }
    }
}

/// Error raised by the date plan service.
#[derive(Debug, thiserror::Error)]
pub enum PlanServiceError {
    #[error(transparent)]
    Rejected(#[from] ContentRejected),
    #[error("{0}")]
    Invalid(String),
    #[error("{} {} not found", .0.label(), .0.raw_id())]
    NotFound(Target),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
