use serde::{Deserialize, Serialize};
use validator::Validate;

/// Employment status of an applicant, as reported by the ingestion subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentStatus {
    Employed,
    Unemployed,
    SelfEmployed,
    Student,
    Retired,
}

impl EmploymentStatus {
    /// Parse the store's text column. Accepts both `self_employed` and the
    /// hyphenated form seen in ingested data.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "employed" | "full-time" | "full_time" => Some(Self::Employed),
            "unemployed" => Some(Self::Unemployed),
            "self-employed" | "self_employed" => Some(Self::SelfEmployed),
            "student" => Some(Self::Student),
            "retired" => Some(Self::Retired),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Employed => "employed",
            Self::Unemployed => "unemployed",
            Self::SelfEmployed => "self-employed",
            Self::Student => "student",
            Self::Retired => "retired",
        }
    }
}

/// Applicant profile. Owned by the ingestion subsystem; the pipeline only
/// reads it and flips `processed` after a successful write-back.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct User {
    pub user_id: String,
    pub email: String,
    #[validate(range(min = 0.0))]
    pub monthly_income: f64,
    #[validate(range(min = 300, max = 850))]
    pub credit_score: i32,
    pub employment_status: EmploymentStatus,
    #[validate(range(min = 18, max = 100))]
    pub age: i32,
    #[serde(default)]
    pub processed: bool,
}

impl User {
    pub fn annual_income(&self) -> f64 {
        self.monthly_income * 12.0
    }
}

/// Loan product from the catalog. Owned by the catalog-discovery subsystem;
/// read-only to the pipeline. Absent bounds impose no constraint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub product_id: String,
    pub name: String,
    pub provider: String,
    pub interest_rate_min: Option<f64>,
    pub interest_rate_max: Option<f64>,
    pub min_loan_amount: Option<f64>,
    pub max_loan_amount: Option<f64>,
    pub min_income: Option<f64>,
    pub min_credit_score: Option<i32>,
    pub max_credit_score: Option<i32>,
    pub employment_policy: Option<String>,
    pub min_age: Option<i32>,
    pub max_age: Option<i32>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// Final eligibility verdict attached to a match decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityStatus {
    Eligible,
    LikelyEligible,
    NeedsReview,
}

impl EligibilityStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "eligible" => Some(Self::Eligible),
            "likely_eligible" => Some(Self::LikelyEligible),
            "needs_review" => Some(Self::NeedsReview),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eligible => "eligible",
            Self::LikelyEligible => "likely_eligible",
            Self::NeedsReview => "needs_review",
        }
    }
}

/// Persisted outcome of evaluating one (user, product) pair.
///
/// At most one decision exists per pair; re-evaluation updates the stored row
/// rather than duplicating it. Notification state lives only in the store and
/// is never written by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchDecision {
    pub user_id: String,
    pub product_id: String,
    /// Final score in [0.0, 1.0].
    pub score: f64,
    pub status: EligibilityStatus,
    /// Ordered, human-readable reason trail explaining provenance.
    pub reasons: Vec<String>,
}

/// A rule-scored candidate product, the unit the evaluator consumes.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub product: Product,
    pub rule_score: f64,
}

/// Per-user success record handed to `Store::commit_batch`.
#[derive(Debug, Clone)]
pub struct UserOutcome {
    pub user_id: String,
    pub decisions: Vec<MatchDecision>,
}

/// Status of a pipeline run, recorded in the processing log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Started,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Append-only audit record for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingLogEntry {
    pub process_type: String,
    pub status: RunStatus,
    pub records_processed: i64,
    pub details: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl ProcessingLogEntry {
    pub fn started(process_type: &str, details: String) -> Self {
        Self {
            process_type: process_type.to_string(),
            status: RunStatus::Started,
            records_processed: 0,
            details,
            started_at: chrono::Utc::now(),
            completed_at: None,
        }
    }
}

/// Weights for the rule scorer's five dimensions. Must sum to 1.0.
#[derive(Debug, Clone, Copy)]
pub struct RuleWeights {
    pub credit: f64,
    pub income: f64,
    pub employment: f64,
    pub age: f64,
    pub rate: f64,
}

impl Default for RuleWeights {
    fn default() -> Self {
        Self {
            credit: 0.35,
            income: 0.25,
            employment: 0.20,
            age: 0.10,
            rate: 0.10,
        }
    }
}

/// Tolerance bands for the prefilter stage.
#[derive(Debug, Clone, Copy)]
pub struct PrefilterConfig {
    /// Points below a product's minimum credit score that still pass.
    pub credit_buffer: i32,
    /// Fraction below a product's minimum income that still passes.
    pub income_buffer_percent: f64,
    /// Years outside a product's age range that still pass.
    pub age_buffer: i32,
}

impl Default for PrefilterConfig {
    fn default() -> Self {
        Self {
            credit_buffer: 50,
            income_buffer_percent: 0.15,
            age_buffer: 2,
        }
    }
}
