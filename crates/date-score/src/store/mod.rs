//! Record store backends for plans, comments, and likes.

mod memory;
mod sqlite;

pub use memory::InMemoryPlanStore;
pub use sqlite::SqlitePlanStore;

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
