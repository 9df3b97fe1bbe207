//! The scoring oracle: an external LLM that grades plan text.
//!
//! Every failure mode collapses into [`Evaluation::fallback`] before the
//! pipeline sees it, so a submission always ends up with some score.

mod gemini;

pub use gemini::GeminiClient;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::scoring::SubScores;

pub const FALLBACK_COMMENT: &str = "Evaluation failed; the AI could not score this plan.";

/// Grades and commentary for one plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub scores: SubScores,
    pub comment: String,
}

impl Evaluation {
    pub fn fallback() -> Self {
        Self {
            scores: SubScores::NEUTRAL,
            comment: FALLBACK_COMMENT.to_string(),
        }
    }

    /// Rejects grades outside `[0, 100]`.
    pub fn validated(self) -> Result<Self, OracleError> {
        let names = [
            "age_appropriateness",
            "cost_effectiveness",
            "creativity",
            "balance",
            "relationship_progress",
        ];
        for (field, value) in names.into_iter().zip(self.scores.as_array()) {
            if !(0..=100).contains(&value) {
                return Err(OracleError::OutOfRange { field, value });
            }
        }
        Ok(self)
    }
}

/// Generated date idea returned by the suggestion endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSuggestion {
    pub plan_title: String,
    pub plan_description: String,
    pub estimated_cost: String,
    pub duration: String,
    pub tips: String,
}

impl PlanSuggestion {
    pub fn fallback() -> Self {
        Self {
            plan_title: "Suggestion unavailable".to_string(),
            plan_description: "The AI could not put together a date plan right now.".to_string(),
            estimated_cost: "unknown".to_string(),
            duration: "unknown".to_string(),
            tips: "Try again in a moment.".to_string(),
        }
    }
}

/// Failure modes of an oracle call. Callers never branch on these; they are
/// logged and replaced by the fallback.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("oracle is not configured: {0}")]
    NotConfigured(&'static str),
    #[error("oracle transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("oracle returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("oracle refused the request: {0}")]
    Refused(String),
    #[error("oracle response malformed: {0}")]
    Malformed(String),
    #[error("oracle grade {field} out of range: {value}")]
    OutOfRange { field: &'static str, value: i32 },
    #[error("oracle timed out after {0:?}")]
    Timeout(Duration),
}

/// Capability interface over the grading service.
#[async_trait]
pub trait ScoringOracle: Send + Sync {
    async fn evaluate(&self, plan_text: &str) -> Result<Evaluation, OracleError>;
}

/// Free-form date idea generation; not part of scoring.
#[async_trait]
pub trait PlanSuggester: Send + Sync {
    async fn suggest(&self, request: &str) -> Result<PlanSuggestion, OracleError>;
}

/// Grade `plan_text`, substituting the neutral fallback on any failure.
pub async fn evaluate_or_fallback<O>(oracle: &O, plan_text: &str, timeout: Duration) -> Evaluation
where
    O: ScoringOracle + ?Sized,
{
    let outcome = match tokio::time::timeout(timeout, oracle.evaluate(plan_text)).await {
        Ok(result) => result.and_then(Evaluation::validated),
        Err(_) => Err(OracleError::Timeout(timeout)),
    };

    outcome.unwrap_or_else(|error| {
        warn!(%error, "plan evaluation failed; using neutral fallback");
        Evaluation::fallback()
    })
}

/// Generate a suggestion, substituting a fixed placeholder on any failure.
pub async fn suggest_or_fallback<O>(oracle: &O, request: &str, timeout: Duration) -> PlanSuggestion
where
    O: PlanSuggester + ?Sized,
{
    let outcome = match tokio::time::timeout(timeout, oracle.suggest(request)).await {
        Ok(result) => result,
        Err(_) => Err(OracleError::Timeout(timeout)),
    };

    outcome.unwrap_or_else(|error| {
        warn!(%error, "plan suggestion failed; using placeholder");
        PlanSuggestion::fallback()
    })
}
