use async_trait::async_trait;
use thiserror::Error;

use crate::models::{MatchDecision, ProcessingLogEntry, Product, RunStatus, User, UserOutcome};

/// Errors that can occur when interacting with the candidate store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Read/write boundary to the relational candidate store.
///
/// Users and products are owned by the ingestion and catalog subsystems; the
/// pipeline only reads them. All pipeline writes go through the idempotent
/// upsert and the transactional batch commit so that at-least-once
/// re-execution after a partial failure converges to the same state.
#[async_trait]
pub trait Store: Send + Sync {
    /// Users awaiting a pipeline pass, oldest first.
    async fn fetch_unprocessed_users(&self, limit: u32) -> Result<Vec<User>, StoreError>;

    /// The active product catalog, in stable order.
    async fn fetch_active_products(&self) -> Result<Vec<Product>, StoreError>;

    /// Idempotent upsert of one decision. Never touches notification state.
    async fn upsert_match(&self, decision: &MatchDecision) -> Result<(), StoreError>;

    /// Flip the processed flag for the given users.
    async fn mark_processed(&self, user_ids: &[String]) -> Result<(), StoreError>;

    /// Append a run-boundary audit record, returning its id.
    async fn append_log(&self, entry: &ProcessingLogEntry) -> Result<i64, StoreError>;

    /// Record a run's terminal state on an existing log entry.
    async fn complete_log(
        &self,
        log_id: i64,
        status: RunStatus,
        records_processed: i64,
        details: &str,
    ) -> Result<(), StoreError>;

    /// Commit one batch atomically: every outcome's decisions, the processed
    /// flags, and the run log's record count move together or not at all.
    /// Returns the number of decisions written.
    async fn commit_batch(&self, log_id: i64, outcomes: &[UserOutcome])
        -> Result<u64, StoreError>;
}
