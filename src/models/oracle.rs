use serde::{Deserialize, Serialize};

use crate::models::{EligibilityStatus, Product, User};

/// Structured evaluation request sent to the oracle for one (user, product)
/// pair. Rendered into a prompt asking for a JSON verdict.
#[derive(Debug, Clone)]
pub struct EvaluationRequest<'a> {
    pub user: &'a User,
    pub product: &'a Product,
}

impl<'a> EvaluationRequest<'a> {
    pub fn new(user: &'a User, product: &'a Product) -> Self {
        Self { user, product }
    }

    /// Render the prompt text. The oracle is instructed to answer with the
    /// JSON shape `OracleVerdict` parses.
    pub fn prompt(&self) -> String {
        let user = self.user;
        let product = self.product;

        format!(
            "Evaluate whether this applicant is eligible for the given loan product.\n\
             \n\
             Applicant profile:\n\
             - Credit score: {credit}\n\
             - Annual income: ${annual:.2}\n\
             - Employment: {employment}\n\
             - Age: {age}\n\
             \n\
             Loan product:\n\
             - Product: {name}\n\
             - Provider: {provider}\n\
             - Interest rate: {rate_min}% - {rate_max}%\n\
             - Loan amount: ${amount_min} - ${amount_max}\n\
             - Minimum credit score: {min_credit}\n\
             - Minimum income required: ${min_income}\n\
             - Employment requirements: {policy}\n\
             - Age range: {age_min} - {age_max}\n\
             \n\
             Respond with JSON only:\n\
             {{\n\
               \"eligible\": true or false,\n\
               \"confidence\": 0.0 to 1.0,\n\
               \"status\": \"eligible\" or \"likely_eligible\" or \"needs_review\",\n\
               \"reasons\": [\"...\"],\n\
               \"risk_factors\": [\"...\"]\n\
             }}",
            credit = user.credit_score,
            annual = user.annual_income(),
            employment = user.employment_status.as_str(),
            age = user.age,
            name = product.name,
            provider = product.provider,
            rate_min = fmt_opt_f64(product.interest_rate_min),
            rate_max = fmt_opt_f64(product.interest_rate_max),
            amount_min = fmt_opt_f64(product.min_loan_amount),
            amount_max = fmt_opt_f64(product.max_loan_amount),
            min_credit = fmt_opt_i32(product.min_credit_score),
            min_income = fmt_opt_f64(product.min_income),
            policy = product.employment_policy.as_deref().unwrap_or("none"),
            age_min = fmt_opt_i32(product.min_age),
            age_max = fmt_opt_i32(product.max_age),
        )
    }
}

fn fmt_opt_f64(value: Option<f64>) -> String {
    value.map_or_else(|| "unspecified".to_string(), |v| format!("{:.2}", v))
}

fn fmt_opt_i32(value: Option<i32>) -> String {
    value.map_or_else(|| "unspecified".to_string(), |v| v.to_string())
}

/// Structured verdict returned by the oracle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleVerdict {
    pub eligible: bool,
    pub confidence: f64,
    pub status: EligibilityStatus,
    pub reasons: Vec<String>,
    #[serde(default)]
    pub risk_factors: Vec<String>,
}

/// Parse the oracle's response text into a verdict.
///
/// Tries a strict JSON parse first (tolerating markdown code fences and
/// surrounding prose), then a lenient keyword pass. Returns `None` when the
/// text is unusable, which callers treat as an oracle failure.
pub fn parse_verdict(text: &str) -> Option<OracleVerdict> {
    strict_parse(text).or_else(|| lenient_parse(text))
}

fn strict_parse(text: &str) -> Option<OracleVerdict> {
    let body = extract_json(text)?;
    let mut verdict: OracleVerdict = serde_json::from_str(body).ok()?;
    verdict.confidence = verdict.confidence.clamp(0.0, 1.0);
    Some(verdict)
}

/// Find the JSON object in a response that may be fenced or wrapped in prose.
fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Keyword-presence fallback for malformed JSON. Succeeds only when the text
/// actually talks about eligibility.
fn lenient_parse(text: &str) -> Option<OracleVerdict> {
    let lower = text.to_lowercase();
    if !lower.contains("eligible") {
        return None;
    }

    if lower.contains("true") {
        Some(OracleVerdict {
            eligible: true,
            confidence: 0.7,
            status: EligibilityStatus::LikelyEligible,
            reasons: vec!["External evaluation text suggests eligibility".to_string()],
            risk_factors: vec![],
        })
    } else {
        Some(OracleVerdict {
            eligible: false,
            confidence: 0.3,
            status: EligibilityStatus::NeedsReview,
            reasons: vec!["External evaluation text suggests review is needed".to_string()],
            risk_factors: vec![],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EmploymentStatus;

    fn sample_user() -> User {
        User {
            user_id: "u1".to_string(),
            email: "u1@example.com".to_string(),
            monthly_income: 6250.0,
            credit_score: 780,
            employment_status: EmploymentStatus::Employed,
            age: 32,
            processed: false,
        }
    }

    fn sample_product() -> Product {
        Product {
            product_id: "p1".to_string(),
            name: "Personal Loan Plus".to_string(),
            provider: "Acme Bank".to_string(),
            interest_rate_min: Some(8.99),
            interest_rate_max: Some(24.99),
            min_loan_amount: Some(1000.0),
            max_loan_amount: Some(50_000.0),
            min_income: Some(30_000.0),
            min_credit_score: Some(650),
            max_credit_score: Some(850),
            employment_policy: Some("steady employment required".to_string()),
            min_age: Some(21),
            max_age: Some(65),
            is_active: true,
        }
    }

    #[test]
    fn test_prompt_contains_profile_and_product() {
        let user = sample_user();
        let product = sample_product();
        let prompt = EvaluationRequest::new(&user, &product).prompt();

        assert!(prompt.contains("780"));
        assert!(prompt.contains("75000.00"));
        assert!(prompt.contains("Personal Loan Plus"));
        assert!(prompt.contains("steady employment required"));
        assert!(prompt.contains("\"eligible\""));
    }

    #[test]
    fn test_prompt_unbounded_fields() {
        let user = sample_user();
        let mut product = sample_product();
        product.min_income = None;
        product.max_age = None;

        let prompt = EvaluationRequest::new(&user, &product).prompt();
        assert!(prompt.contains("unspecified"));
    }

    #[test]
    fn test_strict_parse() {
        let text = r#"{"eligible": true, "confidence": 0.9, "status": "eligible", "reasons": ["strong credit"]}"#;
        let verdict = parse_verdict(text).unwrap();

        assert!(verdict.eligible);
        assert_eq!(verdict.confidence, 0.9);
        assert_eq!(verdict.status, EligibilityStatus::Eligible);
        assert_eq!(verdict.reasons, vec!["strong credit"]);
        assert!(verdict.risk_factors.is_empty());
    }

    #[test]
    fn test_strict_parse_fenced() {
        let text = "```json\n{\"eligible\": false, \"confidence\": 0.4, \"status\": \"needs_review\", \"reasons\": [\"income below minimum\"], \"risk_factors\": [\"thin file\"]}\n```";
        let verdict = parse_verdict(text).unwrap();

        assert!(!verdict.eligible);
        assert_eq!(verdict.status, EligibilityStatus::NeedsReview);
        assert_eq!(verdict.risk_factors, vec!["thin file"]);
    }

    #[test]
    fn test_strict_parse_clamps_confidence() {
        let text = r#"{"eligible": true, "confidence": 1.7, "status": "eligible", "reasons": []}"#;
        let verdict = parse_verdict(text).unwrap();
        assert_eq!(verdict.confidence, 1.0);
    }

    #[test]
    fn test_lenient_parse_eligible() {
        let verdict = parse_verdict("The applicant looks eligible: true, based on income.").unwrap();
        assert!(verdict.eligible);
        assert_eq!(verdict.status, EligibilityStatus::LikelyEligible);
        assert_eq!(verdict.confidence, 0.7);
    }

    #[test]
    fn test_lenient_parse_needs_review() {
        let verdict = parse_verdict("Unclear whether eligible; manual check advised.").unwrap();
        assert!(!verdict.eligible);
        assert_eq!(verdict.status, EligibilityStatus::NeedsReview);
        assert_eq!(verdict.confidence, 0.3);
    }

    #[test]
    fn test_unusable_text_fails() {
        assert!(parse_verdict("HTTP 502 upstream gateway error").is_none());
        assert!(parse_verdict("").is_none());
    }
}
