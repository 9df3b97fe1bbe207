//! Date plan submission, leaderboard, and the social features around it.
//!
//! [`DatePlanService`] owns the pipeline (filter, oracle, persist, re-rank);
//! [`plan_router`] exposes it over HTTP.

pub mod domain;
pub mod filter;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    CommentId, CommentSubmission, LikeStatus, LikeToggle, NewComment, NewPlan, PlanComment,
    PlanId, PlanMetadata, PlanSubmission, PlanSummary, RankedPlan, ScoredPlan, Target,
};
pub use filter::{ContentFilter, ContentRejected};
pub use repository::PlanRepository;
pub use router::plan_router;
pub use service::{DatePlanService, PlanServiceError, PlanServiceSettings};
