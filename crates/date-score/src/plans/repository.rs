use async_trait::async_trait;

use super::domain::{
    CommentId, NewComment, NewPlan, PlanComment, PlanId, PlanSummary, RankedPlan, Target,
};
use crate::scoring::ScoreStore;
use crate::store::RepositoryError;

/// Storage abstraction so the service can run against SQLite or memory.
///
/// The scoring half of the contract lives on [`ScoreStore`]; everything here
/// is bookkeeping for the leaderboard and its social features.
#[async_trait]
pub trait PlanRepository: ScoreStore {
    async fn insert_plan(&self, plan: NewPlan) -> Result<PlanId, RepositoryError>;

    /// Current stored score of a plan.
    async fn score(&self, id: PlanId) -> Result<Option<i32>, RepositoryError>;

    /// Every plan ordered by score descending, ties by id ascending.
    async fn ranking(&self) -> Result<Vec<RankedPlan>, RepositoryError>;

    /// Case-sensitive substring match on plan text, AI comment, or notes.
    async fn search(&self, keyword: &str) -> Result<Vec<PlanSummary>, RepositoryError>;

    async fn exists(&self, target: Target) -> Result<bool, RepositoryError>;

    async fn insert_comment(&self, comment: NewComment) -> Result<CommentId, RepositoryError>;

    /// Comments under a plan, newest first.
    async fn comments(&self, plan_id: PlanId) -> Result<Vec<PlanComment>, RepositoryError>;

    /// Returns `false` when the device had already liked the target.
    async fn add_like(&self, target: Target, device_id: &str) -> Result<bool, RepositoryError>;

    /// Returns `false` when there was no like to remove.
    async fn remove_like(&self, target: Target, device_id: &str)
        -> Result<bool, RepositoryError>;

    async fn has_liked(&self, target: Target, device_id: &str) -> Result<bool, RepositoryError>;

    async fn like_count(&self, target: Target) -> Result<i64, RepositoryError>;
}
