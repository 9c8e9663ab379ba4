//! Lendmatch - loan product matching engine
//!
//! Matches applicant profiles against a catalog of loan products through a
//! three-stage pipeline: cheap prefiltering, deterministic rule scoring, and
//! external-oracle refinement of the top candidates. A batch orchestrator
//! drives the pipeline over the queue of unprocessed users with per-user
//! failure isolation and idempotent, at-least-once-safe persistence.

pub mod config;
pub mod core;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use crate::core::{
    Evaluator, EvaluatorConfig, Matcher, Orchestrator, OrchestratorConfig, OrchestratorError,
    RunSummary,
};
pub use crate::models::{
    EligibilityStatus, EmploymentStatus, MatchDecision, PrefilterConfig, Product, RuleWeights,
    ScoredCandidate, User,
};
pub use crate::services::{HttpOracle, Oracle, OracleError, PostgresStore, Store, StoreError};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        // Verify that the library exports work correctly
        let matcher = Matcher::with_defaults();
        let user = User {
            user_id: "u1".to_string(),
            email: "u1@example.com".to_string(),
            monthly_income: 5000.0,
            credit_score: 720,
            employment_status: EmploymentStatus::Employed,
            age: 35,
            processed: false,
        };
        let shortlist = matcher.shortlist(&user, &[], 5);
        assert_eq!(shortlist.total_candidates, 0);
    }
}
