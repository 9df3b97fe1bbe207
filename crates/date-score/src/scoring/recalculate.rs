use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::deviation::{PopulationStats, NEUTRAL_DEVIATION};
use super::{PlanId, SubScores};
use crate::store::RepositoryError;

/// One member of the population as read back from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopulationEntry {
    pub id: PlanId,
    pub sub_scores: SubScores,
}

/// Deviation score to persist for a single plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreUpdate {
    pub id: PlanId,
    pub score: i32,
}

/// The slice of the record store the recalculation pass depends on.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Every stored plan's grades, read fresh on each call.
    async fn population(&self) -> Result<Vec<PopulationEntry>, RepositoryError>;

    /// Persist all updates or none of them.
    async fn apply_scores(&self, updates: &[ScoreUpdate]) -> Result<(), RepositoryError>;

    /// Read the population and write its deviation scores back as one unit.
    ///
    /// The default runs the two steps back to back with nothing held between
    /// them. Stores that can lock across both steps override it, so a writer
    /// in another process cannot slip a plan in between.
    async fn recalculate(&self) -> Result<usize, RepositoryError> {
        recalculate_detached(self).await
    }
}

/// How submissions coordinate their insert and recalculation steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyMode {
    /// Insert and recalculation run under a single-writer gate.
    #[default]
    Serialized,
    /// No gate: concurrent submissions may persist scores computed against a
    /// population that is missing each other's records.
    Legacy,
}

impl ConsistencyMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "serialized" | "serial" => Some(Self::Serialized),
            "legacy" | "unsynchronized" => Some(Self::Legacy),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Serialized => "serialized",
            Self::Legacy => "legacy",
        }
    }
}

/// Composite and normalize every entry against the population it belongs to.
pub fn deviation_scores(population: &[PopulationEntry]) -> Vec<ScoreUpdate> {
    let composites: Vec<i32> = population
        .iter()
        .map(|entry| entry.sub_scores.composite())
        .collect();
    let stats = PopulationStats::from_scores(&composites);

    population
        .iter()
        .zip(&composites)
        .map(|(entry, &composite)| ScoreUpdate {
            id: entry.id,
            score: stats.map_or(NEUTRAL_DEVIATION, |stats| stats.deviation(composite)),
        })
        .collect()
}

/// Recompute and persist the deviation score of every stored plan.
///
/// Returns the number of plans written. The write-back is a single batch, so
/// a store failure leaves every plan at its previous score.
pub async fn recalculate_all<S>(store: &S) -> Result<usize, RepositoryError>
where
    S: ScoreStore + ?Sized,
{
    let updated = store.recalculate().await?;
    debug!(plans = updated, "recalculated deviation scores");
    Ok(updated)
}

/// Snapshot the population, then write back in a separate step.
///
/// Another writer can land between the read and the write-back, leaving its
/// plan scored against a population that never included it. Only the legacy
/// consistency mode calls this directly.
pub async fn recalculate_detached<S>(store: &S) -> Result<usize, RepositoryError>
where
    S: ScoreStore + ?Sized,
{
    let population = store.population().await?;
    if population.is_empty() {
        return Ok(0);
    }

    let updates = deviation_scores(&population);
    store.apply_scores(&updates).await?;
    Ok(updates.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryPlanStore;

    fn entry(id: i64, composite: i32) -> PopulationEntry {
        PopulationEntry {
            id: PlanId(id),
            sub_scores: SubScores::uniform(composite),
        }
    }

    #[test]
    fn deviation_scores_follow_population() {
        let updates = deviation_scores(&[entry(1, 40), entry(2, 50), entry(3, 60)]);
        let scores: Vec<i32> = updates.iter().map(|update| update.score).collect();
        assert_eq!(scores, vec![38, 50, 62]);
        assert_eq!(updates[2].id, PlanId(3));
    }

    #[test]
    fn single_plan_is_neutral() {
        let updates = deviation_scores(&[entry(7, 70)]);
        assert_eq!(
            updates,
            vec![ScoreUpdate {
                id: PlanId(7),
                score: NEUTRAL_DEVIATION
            }]
        );
    }

    #[test]
    fn equal_composites_receive_equal_scores() {
        let updates = deviation_scores(&[entry(1, 55), entry(2, 80), entry(3, 55)]);
        assert_eq!(updates[0].score, updates[2].score);
        assert!(updates[1].score > updates[0].score);
    }

    #[test]
    fn consistency_mode_parses_known_labels() {
        assert_eq!(
            ConsistencyMode::parse(" Serialized "),
            Some(ConsistencyMode::Serialized)
        );
        assert_eq!(ConsistencyMode::parse("legacy"), Some(ConsistencyMode::Legacy));
        assert_eq!(ConsistencyMode::parse("eventually"), None);
        assert_eq!(ConsistencyMode::default().label(), "serialized");
    }

    #[tokio::test]
    async fn empty_store_updates_nothing() {
        let store = InMemoryPlanStore::default();
        assert_eq!(recalculate_all(&store).await.expect("pass succeeds"), 0);
        assert_eq!(recalculate_detached(&store).await.expect("pass succeeds"), 0);
    }
}
