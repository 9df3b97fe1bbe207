//! Scoring core: composite weighting, population normalization, and the
//! recalculation pass that keeps every stored score consistent.

mod composite;
mod deviation;
mod recalculate;

pub use composite::{composite, SubScores, WEIGHTS};
pub use deviation::{normalize, DEVIATION_CEILING, DEVIATION_FLOOR, NEUTRAL_DEVIATION};
pub use recalculate::{
    deviation_scores, recalculate_all, recalculate_detached, ConsistencyMode, PopulationEntry,
    ScoreStore, ScoreUpdate,
};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-assigned identity of a scored plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanId(pub i64);

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
