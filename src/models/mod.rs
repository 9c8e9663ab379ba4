// Model exports
pub mod domain;
pub mod oracle;

pub use domain::{
    EligibilityStatus, EmploymentStatus, MatchDecision, PrefilterConfig, ProcessingLogEntry,
    Product, RuleWeights, RunStatus, ScoredCandidate, User, UserOutcome,
};
pub use oracle::{parse_verdict, EvaluationRequest, OracleVerdict};
