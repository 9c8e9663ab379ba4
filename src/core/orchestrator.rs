use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use crate::core::evaluator::Evaluator;
use crate::core::matcher::Matcher;
use crate::models::{ProcessingLogEntry, Product, RunStatus, User, UserOutcome};
use crate::services::{Oracle, Store, StoreError};

/// Process type recorded in the audit log for matching runs.
pub const PROCESS_TYPE: &str = "matching";

#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Precondition violation: fatal to the run, no user rows touched.
    #[error("no active products in catalog")]
    EmptyCatalog,

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Per-user failure. Caught at the batch loop, never unwinds the run.
#[derive(Debug, Error)]
enum UserError {
    #[error("invalid profile: {0}")]
    InvalidProfile(#[from] validator::ValidationErrors),
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Users pulled per batch.
    pub batch_size: u32,
    /// Rule-scored candidates forwarded to the oracle per user.
    pub top_candidates: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            top_candidates: 5,
        }
    }
}

/// Outcome of one matching run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub users_processed: usize,
    pub users_failed: usize,
    pub matches_created: u64,
    pub cancelled: bool,
}

impl RunSummary {
    fn details(&self) -> String {
        let mut details = format!(
            "Processed {} users ({} failed), created {} matches",
            self.users_processed, self.users_failed, self.matches_created
        );
        if self.cancelled {
            details.push_str("; run cancelled before completion");
        }
        details
    }
}

/// Drives the full pipeline over the queue of unprocessed users in bounded
/// batches, with per-user failure isolation and at-least-once commit
/// semantics.
///
/// Store and oracle are injected so runs are reproducible against test
/// doubles.
pub struct Orchestrator<S, O> {
    store: Arc<S>,
    matcher: Matcher,
    evaluator: Evaluator<O>,
    config: OrchestratorConfig,
    cancel: Arc<AtomicBool>,
}

impl<S: Store, O: Oracle> Orchestrator<S, O> {
    pub fn new(
        store: Arc<S>,
        matcher: Matcher,
        evaluator: Evaluator<O>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            matcher,
            evaluator,
            config,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag checked between users; setting it stops the run gracefully after
    /// the in-flight user commits.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Execute one matching run. Run-level status lands in the processing
    /// log regardless of outcome.
    pub async fn run(&self) -> Result<RunSummary, OrchestratorError> {
        let run_id = Uuid::new_v4();
        let entry = ProcessingLogEntry::started(PROCESS_TYPE, format!("Matching run {}", run_id));
        let log_id = self.store.append_log(&entry).await?;

        tracing::info!("Starting matching run {}", run_id);

        match self.run_batches(run_id, log_id).await {
            Ok(summary) => {
                self.store
                    .complete_log(
                        log_id,
                        RunStatus::Completed,
                        summary.users_processed as i64,
                        &summary.details(),
                    )
                    .await?;

                tracing::info!("Matching run {} completed: {}", run_id, summary.details());
                Ok(summary)
            }
            Err(err) => {
                let details = format!("Matching run {} failed: {}", run_id, err);
                if let Err(log_err) = self
                    .store
                    .complete_log(log_id, RunStatus::Failed, 0, &details)
                    .await
                {
                    tracing::error!("Failed to record run failure: {}", log_err);
                }

                tracing::error!("{}", details);
                Err(err)
            }
        }
    }

    async fn run_batches(
        &self,
        run_id: Uuid,
        log_id: i64,
    ) -> Result<RunSummary, OrchestratorError> {
        let catalog = self.store.fetch_active_products().await?;
        if catalog.is_empty() {
            return Err(OrchestratorError::EmptyCatalog);
        }

        let mut summary = RunSummary {
            run_id,
            users_processed: 0,
            users_failed: 0,
            matches_created: 0,
            cancelled: false,
        };

        // Failed users stay unprocessed for the next run; tracking attempted
        // ids keeps this run from refetching them forever.
        let mut attempted: HashSet<String> = HashSet::new();
        let mut batch_number = 0u32;

        loop {
            let batch = self
                .store
                .fetch_unprocessed_users(self.config.batch_size)
                .await?;
            let fresh: Vec<User> = batch
                .into_iter()
                .filter(|user| !attempted.contains(&user.user_id))
                .collect();

            if fresh.is_empty() {
                break;
            }
            batch_number += 1;

            let mut outcomes: Vec<UserOutcome> = Vec::with_capacity(fresh.len());

            for user in &fresh {
                if self.cancel.load(Ordering::Relaxed) {
                    summary.cancelled = true;
                    break;
                }

                attempted.insert(user.user_id.clone());

                match self.process_user(user, &catalog).await {
                    Ok(outcome) => outcomes.push(outcome),
                    Err(err) => {
                        summary.users_failed += 1;
                        tracing::warn!(
                            "Failed to process user {}, leaving unprocessed: {}",
                            user.user_id,
                            err
                        );
                    }
                }
            }

            // The whole batch is attempted before anything commits; the
            // commit itself is one transaction.
            summary.users_processed += outcomes.len();
            summary.matches_created += self.store.commit_batch(log_id, &outcomes).await?;

            tracing::info!(
                "Batch {}: {} users committed, {} total matches",
                batch_number,
                outcomes.len(),
                summary.matches_created
            );

            if summary.cancelled {
                tracing::info!("Matching run {} cancelled between users", run_id);
                break;
            }
        }

        Ok(summary)
    }

    /// One user through prefilter, scoring, and oracle refinement. Any error
    /// here is that user's alone.
    async fn process_user(
        &self,
        user: &User,
        catalog: &[Product],
    ) -> Result<UserOutcome, UserError> {
        user.validate()?;

        let shortlist = self
            .matcher
            .shortlist(user, catalog, self.config.top_candidates);

        tracing::debug!(
            "User {}: {} of {} products prefiltered, {} shortlisted",
            user.user_id,
            shortlist.prefiltered,
            shortlist.total_candidates,
            shortlist.candidates.len()
        );

        let decisions = self.evaluator.evaluate_user(user, &shortlist.candidates).await;

        Ok(UserOutcome {
            user_id: user.user_id.clone(),
            decisions,
        })
    }
}
