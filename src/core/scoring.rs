use std::cmp::Ordering;

use crate::models::{EmploymentStatus, Product, RuleWeights, ScoredCandidate, User};

/// Reference interest-rate band used to normalize rate preference: products
/// at 5% score 1.0, products at 35% score 0.0.
const RATE_CEILING: f64 = 35.0;
const RATE_SPAN: f64 = 30.0;

/// Component score when a product specifies no credit range / income floor.
const DEFAULT_CREDIT_COMPONENT: f64 = 0.8;
const DEFAULT_INCOME_COMPONENT: f64 = 0.8;

/// Component score for an absent or unclear employment policy.
const DEFAULT_EMPLOYMENT_COMPONENT: f64 = 0.5;
const DEFAULT_RATE_COMPONENT: f64 = 0.5;

/// Stage 2 of the matching pipeline: deterministic weighted scoring.
///
/// Returns candidates sorted by score descending; ties keep input order
/// (stable sort). Pure function of its inputs, no randomness, no I/O.
pub fn rank_candidates(
    user: &User,
    candidates: Vec<Product>,
    weights: &RuleWeights,
) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = candidates
        .into_iter()
        .map(|product| {
            let rule_score = score_product(user, &product, weights);
            ScoredCandidate {
                product,
                rule_score,
            }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.rule_score
            .partial_cmp(&a.rule_score)
            .unwrap_or(Ordering::Equal)
    });

    scored
}

/// Weighted sum of the five scoring dimensions, in [0.0, 1.0].
pub fn score_product(user: &User, product: &Product, weights: &RuleWeights) -> f64 {
    let credit = credit_component(
        user.credit_score,
        product.min_credit_score,
        product.max_credit_score,
    );
    let income = income_component(user.annual_income(), product.min_income);
    let employment = employment_component(
        user.employment_status,
        product.employment_policy.as_deref(),
    );
    let age = age_component(user.age, product.min_age, product.max_age);
    let rate = rate_component(product.interest_rate_min);

    let total = credit * weights.credit
        + income * weights.income
        + employment * weights.employment
        + age * weights.age
        + rate * weights.rate;

    total.clamp(0.0, 1.0)
}

/// Linear position of the user's score within the product's credit range,
/// clamped to [0, 1].
#[inline]
fn credit_component(credit_score: i32, min: Option<i32>, max: Option<i32>) -> f64 {
    match (min, max) {
        (Some(min), Some(max)) if max > min => {
            let position = f64::from(credit_score - min) / f64::from(max - min);
            position.clamp(0.0, 1.0)
        }
        (Some(min), Some(_)) => {
            if credit_score >= min {
                1.0
            } else {
                0.0
            }
        }
        _ => DEFAULT_CREDIT_COMPONENT,
    }
}

/// Ratio of annual income to the required minimum, capped at 1.0.
#[inline]
fn income_component(annual_income: f64, min_income: Option<f64>) -> f64 {
    match min_income {
        Some(min) if min > 0.0 => (annual_income / min).min(1.0),
        Some(_) => 1.0,
        None => DEFAULT_INCOME_COMPONENT,
    }
}

/// Categorical compatibility between applicant status and the product's
/// free-text employment policy: 1.0 for an exact match down to 0.1 for a
/// clear incompatibility.
#[inline]
pub fn employment_component(status: EmploymentStatus, policy: Option<&str>) -> f64 {
    let Some(policy) = policy else {
        return DEFAULT_EMPLOYMENT_COMPONENT;
    };
    let policy = policy.to_lowercase();
    if policy.trim().is_empty() {
        return DEFAULT_EMPLOYMENT_COMPONENT;
    }

    let wants_employment = policy.contains("employment") || policy.contains("employed");
    let wants_steady = policy.contains("steady") || policy.contains("stable");
    let wants_income = policy.contains("income");

    match status {
        EmploymentStatus::Employed => {
            if wants_employment || wants_steady {
                1.0
            } else if wants_income {
                0.9
            } else {
                DEFAULT_EMPLOYMENT_COMPONENT
            }
        }
        EmploymentStatus::SelfEmployed => {
            if policy.contains("self-employed") || policy.contains("self employed") {
                1.0
            } else if wants_income {
                0.7
            } else if wants_steady {
                0.4
            } else if wants_employment {
                0.6
            } else {
                DEFAULT_EMPLOYMENT_COMPONENT
            }
        }
        EmploymentStatus::Retired => {
            if wants_income {
                0.7
            } else if wants_employment || wants_steady {
                0.3
            } else {
                DEFAULT_EMPLOYMENT_COMPONENT
            }
        }
        EmploymentStatus::Student => {
            if wants_steady {
                0.1
            } else if wants_employment {
                0.4
            } else {
                DEFAULT_EMPLOYMENT_COMPONENT
            }
        }
        EmploymentStatus::Unemployed => {
            if wants_employment || wants_steady {
                0.1
            } else if wants_income {
                0.3
            } else {
                DEFAULT_EMPLOYMENT_COMPONENT
            }
        }
    }
}

/// 1.0 inside the age range, decaying 0.1 per year outside, floored at 0.0.
#[inline]
fn age_component(age: i32, min_age: Option<i32>, max_age: Option<i32>) -> f64 {
    if let Some(min) = min_age {
        if age < min {
            return (1.0 - f64::from(min - age) * 0.1).max(0.0);
        }
    }
    if let Some(max) = max_age {
        if age > max {
            return (1.0 - f64::from(age - max) * 0.1).max(0.0);
        }
    }
    1.0
}

/// Lower minimum rates score higher across the reference band.
#[inline]
fn rate_component(interest_rate_min: Option<f64>) -> f64 {
    match interest_rate_min {
        Some(rate) => ((RATE_CEILING - rate) / RATE_SPAN).clamp(0.0, 1.0),
        None => DEFAULT_RATE_COMPONENT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user() -> User {
        User {
            user_id: "test_user".to_string(),
            email: "test@example.com".to_string(),
            monthly_income: 6250.0,
            credit_score: 780,
            employment_status: EmploymentStatus::Employed,
            age: 32,
            processed: false,
        }
    }

    fn test_product() -> Product {
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
            employment_policy: Some("employment required".to_string()),
            min_age: Some(21),
            max_age: Some(65),
            is_active: true,
        }
    }

    #[test]
    fn test_reference_scenario_score() {
        // credit (780-650)/200 = 0.65, income capped 1.0, employment 1.0,
        // age 1.0, rate (35-8.99)/30 = 0.867
        let score = score_product(&test_user(), &test_product(), &RuleWeights::default());
        let expected = 0.35 * 0.65 + 0.25 + 0.20 + 0.10 + 0.10 * (26.01 / 30.0);

        assert!((score - expected).abs() < 1e-9);
        assert!((score - 0.8642).abs() < 0.001);
    }

    #[test]
    fn test_score_is_deterministic() {
        let user = test_user();
        let product = test_product();
        let weights = RuleWeights::default();

        let first = score_product(&user, &product, &weights);
        let second = score_product(&user, &product, &weights);
        assert_eq!(first, second);
    }

    #[test]
    fn test_credit_component_positions() {
        assert_eq!(credit_component(650, Some(650), Some(850)), 0.0);
        assert_eq!(credit_component(850, Some(650), Some(850)), 1.0);
        assert!((credit_component(750, Some(650), Some(850)) - 0.5).abs() < 1e-9);
        // Below min clamps at zero
        assert_eq!(credit_component(600, Some(650), Some(850)), 0.0);
        // Degenerate range
        assert_eq!(credit_component(700, Some(700), Some(700)), 1.0);
        assert_eq!(credit_component(699, Some(700), Some(700)), 0.0);
        // No range set
        assert_eq!(credit_component(700, None, None), 0.8);
        assert_eq!(credit_component(700, Some(650), None), 0.8);
    }

    #[test]
    fn test_income_component() {
        assert_eq!(income_component(60_000.0, Some(30_000.0)), 1.0);
        assert!((income_component(15_000.0, Some(30_000.0)) - 0.5).abs() < 1e-9);
        assert_eq!(income_component(10_000.0, None), 0.8);
        assert_eq!(income_component(10_000.0, Some(0.0)), 1.0);
    }

    #[test]
    fn test_employment_component_table() {
        use EmploymentStatus::*;

        assert_eq!(employment_component(Employed, Some("employment required")), 1.0);
        assert_eq!(employment_component(Employed, Some("steady income")), 1.0);
        assert_eq!(employment_component(Unemployed, Some("employment required")), 0.1);
        assert_eq!(employment_component(Student, Some("steady employment")), 0.1);
        assert_eq!(employment_component(SelfEmployed, Some("verifiable income")), 0.7);
        assert_eq!(
            employment_component(SelfEmployed, Some("self-employed welcome")),
            1.0
        );
        assert_eq!(employment_component(Retired, Some("employment required")), 0.3);
        // Absent or unclear policy
        assert_eq!(employment_component(Employed, None), 0.5);
        assert_eq!(employment_component(Unemployed, Some("   ")), 0.5);
        assert_eq!(employment_component(Student, Some("18+ only")), 0.5);
    }

    #[test]
    fn test_age_component_decay() {
        assert_eq!(age_component(30, Some(21), Some(65)), 1.0);
        assert!((age_component(19, Some(21), Some(65)) - 0.8).abs() < 1e-9);
        assert!((age_component(70, Some(21), Some(65)) - 0.5).abs() < 1e-9);
        // 15 years out floors at zero
        assert_eq!(age_component(80, Some(21), Some(65)), 0.0);
        assert_eq!(age_component(99, None, None), 1.0);
    }

    #[test]
    fn test_rate_component() {
        assert!((rate_component(Some(5.0)) - 1.0).abs() < 1e-9);
        assert!((rate_component(Some(35.0)) - 0.0).abs() < 1e-9);
        assert!((rate_component(Some(20.0)) - 0.5).abs() < 1e-9);
        // Outside the reference band clamps
        assert_eq!(rate_component(Some(3.0)), 1.0);
        assert_eq!(rate_component(Some(40.0)), 0.0);
        assert_eq!(rate_component(None), 0.5);
    }

    #[test]
    fn test_rank_candidates_sorted_descending() {
        let user = test_user();

        let mut cheap = test_product();
        cheap.product_id = "cheap".to_string();
        cheap.interest_rate_min = Some(6.0);

        let mut expensive = test_product();
        expensive.product_id = "expensive".to_string();
        expensive.interest_rate_min = Some(29.0);

        let ranked = rank_candidates(
            &user,
            vec![expensive, cheap],
            &RuleWeights::default(),
        );

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].product.product_id, "cheap");
        assert!(ranked[0].rule_score > ranked[1].rule_score);
    }

    #[test]
    fn test_rank_ties_keep_input_order() {
        let user = test_user();

        let mut first = test_product();
        first.product_id = "first".to_string();
        let mut second = test_product();
        second.product_id = "second".to_string();
        let mut third = test_product();
        third.product_id = "third".to_string();

        let ranked = rank_candidates(
            &user,
            vec![first, second, third],
            &RuleWeights::default(),
        );

        let ids: Vec<&str> = ranked.iter().map(|c| c.product.product_id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_score_stays_in_unit_interval() {
        let mut user = test_user();
        user.credit_score = 300;
        user.monthly_income = 0.0;
        user.age = 100;
        user.employment_status = EmploymentStatus::Unemployed;

        let score = score_product(&user, &test_product(), &RuleWeights::default());
        assert!((0.0..=1.0).contains(&score));
    }
}
