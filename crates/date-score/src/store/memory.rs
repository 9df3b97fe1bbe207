use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::RepositoryError;
use crate::plans::domain::{
    CommentId, NewComment, NewPlan, PlanComment, PlanId, PlanSummary, RankedPlan, Target,
};
use crate::plans::repository::PlanRepository;
use crate::scoring::{deviation_scores, PopulationEntry, ScoreStore, ScoreUpdate};

/// Process-local store. Clones share the same records.
#[derive(Default, Clone)]
pub struct InMemoryPlanStore {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    last_plan_id: i64,
    last_comment_id: i64,
    plans: BTreeMap<PlanId, StoredPlan>,
    comments: BTreeMap<CommentId, StoredComment>,
    plan_likes: BTreeSet<(PlanId, String)>,
    comment_likes: BTreeSet<(CommentId, String)>,
}

struct StoredPlan {
    record: NewPlan,
    score: i32,
}

struct StoredComment {
    record: NewComment,
}

impl StoredPlan {
    fn summary(&self, id: PlanId) -> PlanSummary {
        PlanSummary {
            id,
            plan: self.record.plan.clone(),
            score: self.score,
            comment: self.record.comment.clone(),
            metadata: self.record.metadata.clone(),
        }
    }

    /// `folded` must already be ASCII-lowercased.
    fn matches(&self, folded: &str) -> bool {
        [
            &self.record.plan,
            &self.record.comment,
            &self.record.metadata.additional_notes,
        ]
        .iter()
        .any(|field| field.to_ascii_lowercase().contains(folded))
    }
}

impl MemoryState {
    fn population(&self) -> Vec<PopulationEntry> {
        self.plans
            .iter()
            .map(|(id, stored)| PopulationEntry {
                id: *id,
                sub_scores: stored.record.sub_scores,
            })
            .collect()
    }

    fn apply_scores(&mut self, updates: &[ScoreUpdate]) -> Result<(), RepositoryError> {
        if let Some(missing) = updates
            .iter()
            .find(|update| !self.plans.contains_key(&update.id))
        {
            return Err(RepositoryError::NotFound(format!("date plan {}", missing.id)));
        }

        for update in updates {
            if let Some(stored) = self.plans.get_mut(&update.id) {
                stored.score = update.score;
            }
        }
        Ok(())
    }

    fn plan_like_count(&self, id: PlanId) -> i64 {
        self.plan_likes
            .iter()
            .filter(|(liked, _)| *liked == id)
            .count() as i64
    }

    fn comment_like_count(&self, id: CommentId) -> i64 {
        self.comment_likes
            .iter()
            .filter(|(liked, _)| *liked == id)
            .count() as i64
    }
}

impl InMemoryPlanStore {
    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("in-memory store poisoned".to_string()))
    }

    /// Number of stored plans.
    pub fn len(&self) -> Result<usize, RepositoryError> {
        Ok(self.lock()?.plans.len())
    }

    pub fn is_empty(&self) -> Result<bool, RepositoryError> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl ScoreStore for InMemoryPlanStore {
    async fn population(&self) -> Result<Vec<PopulationEntry>, RepositoryError> {
        Ok(self.lock()?.population())
    }

    async fn apply_scores(&self, updates: &[ScoreUpdate]) -> Result<(), RepositoryError> {
        self.lock()?.apply_scores(updates)
    }

    async fn recalculate(&self) -> Result<usize, RepositoryError> {
        let mut state = self.lock()?;
        let updates = deviation_scores(&state.population());
        state.apply_scores(&updates)?;
        Ok(updates.len())
    }
}

#[async_trait]
impl PlanRepository for InMemoryPlanStore {
    async fn insert_plan(&self, plan: NewPlan) -> Result<PlanId, RepositoryError> {
        let mut state = self.lock()?;
        state.last_plan_id += 1;
        let id = PlanId(state.last_plan_id);
        let score = plan.provisional_score;
        state.plans.insert(id, StoredPlan { record: plan, score });
        Ok(id)
    }

    async fn score(&self, id: PlanId) -> Result<Option<i32>, RepositoryError> {
        let state = self.lock()?;
        Ok(state.plans.get(&id).map(|stored| stored.score))
    }

    async fn ranking(&self) -> Result<Vec<RankedPlan>, RepositoryError> {
        let state = self.lock()?;
        let mut rows: Vec<RankedPlan> = state
            .plans
            .iter()
            .map(|(id, stored)| {
                RankedPlan::new(
                    stored.summary(*id),
                    stored.record.sub_scores,
                    state.plan_like_count(*id),
                )
            })
            .collect();
        rows.sort_by(|a, b| b.score().cmp(&a.score()).then(a.id().cmp(&b.id())));
        Ok(rows)
    }

    async fn search(&self, keyword: &str) -> Result<Vec<PlanSummary>, RepositoryError> {
        let folded = keyword.to_ascii_lowercase();
        let state = self.lock()?;
        let mut rows: Vec<PlanSummary> = state
            .plans
            .iter()
            .filter(|(_, stored)| stored.matches(&folded))
            .map(|(id, stored)| stored.summary(*id))
            .collect();
        rows.sort_by(|a, b| b.score.cmp(&a.score).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn exists(&self, target: Target) -> Result<bool, RepositoryError> {
        let state = self.lock()?;
        Ok(match target {
            Target::Plan(id) => state.plans.contains_key(&id),
            Target::Comment(id) => state.comments.contains_key(&id),
        })
    }

    async fn insert_comment(&self, comment: NewComment) -> Result<CommentId, RepositoryError> {
        let mut state = self.lock()?;
        if !state.plans.contains_key(&comment.plan_id) {
            return Err(RepositoryError::NotFound(format!(
                "date plan {}",
                comment.plan_id
            )));
        }
        state.last_comment_id += 1;
        let id = CommentId(state.last_comment_id);
        state.comments.insert(id, StoredComment { record: comment });
        Ok(id)
    }

    async fn comments(&self, plan_id: PlanId) -> Result<Vec<PlanComment>, RepositoryError> {
        let state = self.lock()?;
        let mut rows: Vec<PlanComment> = state
            .comments
            .iter()
            .filter(|(_, stored)| stored.record.plan_id == plan_id)
            .map(|(id, stored)| PlanComment {
                id: *id,
                username: stored.record.username.clone(),
                comment: stored.record.comment.clone(),
                created_at: stored.record.created_at,
                like_count: state.comment_like_count(*id),
            })
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn add_like(&self, target: Target, device_id: &str) -> Result<bool, RepositoryError> {
        let mut state = self.lock()?;
        match target {
            Target::Plan(id) => {
                if !state.plans.contains_key(&id) {
                    return Err(RepositoryError::NotFound(format!("date plan {id}")));
                }
                Ok(state.plan_likes.insert((id, device_id.to_string())))
            }
            Target::Comment(id) => {
                if !state.comments.contains_key(&id) {
                    return Err(RepositoryError::NotFound(format!("comment {}", id.0)));
                }
                Ok(state.comment_likes.insert((id, device_id.to_string())))
            }
        }
    }

    async fn remove_like(
        &self,
        target: Target,
        device_id: &str,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.lock()?;
        Ok(match target {
            Target::Plan(id) => state.plan_likes.remove(&(id, device_id.to_string())),
            Target::Comment(id) => state.comment_likes.remove(&(id, device_id.to_string())),
        })
    }

    async fn has_liked(&self, target: Target, device_id: &str) -> Result<bool, RepositoryError> {
        let state = self.lock()?;
        Ok(match target {
            Target::Plan(id) => state.plan_likes.contains(&(id, device_id.to_string())),
            Target::Comment(id) => state.comment_likes.contains(&(id, device_id.to_string())),
        })
    }

    async fn like_count(&self, target: Target) -> Result<i64, RepositoryError> {
        let state = self.lock()?;
        Ok(match target {
            Target::Plan(id) => state.plan_like_count(id),
            Target::Comment(id) => state.comment_like_count(id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plans::domain::PlanMetadata;
    use crate::scoring::SubScores;
    use chrono::Utc;

    fn plan(notes: &str, grade: i32) -> NewPlan {
        NewPlan {
            plan: format!("Notes: {notes}"),
            comment: "ok".to_string(),
            sub_scores: SubScores::uniform(grade),
            provisional_score: grade,
            metadata: PlanMetadata {
                additional_notes: notes.to_string(),
                ..PlanMetadata::default()
            },
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn apply_scores_is_all_or_nothing() {
        let store = InMemoryPlanStore::default();
        let id = store.insert_plan(plan("picnic", 60)).await.expect("insert");

        let result = store
            .apply_scores(&[
                ScoreUpdate { id, score: 70 },
                ScoreUpdate {
                    id: PlanId(99),
                    score: 30,
                },
            ])
            .await;

        assert!(matches!(result, Err(RepositoryError::NotFound(_))));
        assert_eq!(store.score(id).await.expect("read"), Some(60));
    }

    #[tokio::test]
    async fn likes_are_unique_per_device() {
        let store = InMemoryPlanStore::default();
        let id = store.insert_plan(plan("museum", 50)).await.expect("insert");
        let target = Target::Plan(id);

        assert!(store.add_like(target, "device-a").await.expect("like"));
        assert!(!store.add_like(target, "device-a").await.expect("like again"));
        assert!(store.add_like(target, "device-b").await.expect("like"));
        assert_eq!(store.like_count(target).await.expect("count"), 2);

        assert!(store.remove_like(target, "device-a").await.expect("unlike"));
        assert!(!store.remove_like(target, "device-a").await.expect("unlike again"));
        assert!(!store.has_liked(target, "device-a").await.expect("status"));
    }

    #[tokio::test]
    async fn search_is_ordered_by_score() {
        let store = InMemoryPlanStore::default();
        let low = store.insert_plan(plan("beach walk", 40)).await.expect("insert");
        let high = store.insert_plan(plan("beach bbq", 80)).await.expect("insert");
        store.insert_plan(plan("cinema", 90)).await.expect("insert");

        let rows = store.search("beach").await.expect("search");
        let ids: Vec<PlanId> = rows.iter().map(|row| row.id).collect();
        assert_eq!(ids, vec![high, low]);

        let rows = store.search("BEACH").await.expect("search");
        let ids: Vec<PlanId> = rows.iter().map(|row| row.id).collect();
        assert_eq!(ids, vec![high, low]);
        assert_eq!(store.search("").await.expect("search").len(), 3);
    }

    #[tokio::test]
    async fn recalculate_rescores_every_plan() {
        let store = InMemoryPlanStore::default();
        let low = store.insert_plan(plan("park", 40)).await.expect("insert");
        let high = store.insert_plan(plan("opera", 60)).await.expect("insert");

        assert_eq!(store.recalculate().await.expect("recalculate"), 2);
        assert_eq!(store.score(low).await.expect("read"), Some(40));
        assert_eq!(store.score(high).await.expect("read"), Some(60));
        assert_eq!(store.len().expect("len"), 2);
    }

    #[test]
    fn poisoned_store_reports_unavailable() {
        let store = InMemoryPlanStore::default();
        let shared = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = shared.state.lock().expect("lock");
            panic!("poison the store");
        })
        .join();

        assert!(matches!(store.len(), Err(RepositoryError::Unavailable(_))));
        assert!(matches!(store.is_empty(), Err(RepositoryError::Unavailable(_))));
    }
}
