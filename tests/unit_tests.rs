// Unit tests for the lendmatch pipeline stages

use lendmatch::core::prefilter::{candidates, retains};
use lendmatch::core::{rank_candidates, score_product, Matcher};
use lendmatch::models::{
    parse_verdict, EligibilityStatus, EmploymentStatus, PrefilterConfig, Product, RuleWeights,
    User,
};

fn applicant(credit_score: i32, monthly_income: f64, age: i32) -> User {
    User {
        user_id: "applicant".to_string(),
        email: "applicant@example.com".to_string(),
        monthly_income,
        credit_score,
        employment_status: EmploymentStatus::Employed,
        age,
        processed: false,
    }
}

fn reference_product() -> Product {
    Product {
        product_id: "ref".to_string(),
        name: "Reference Loan".to_string(),
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
fn test_reference_applicant_is_retained() {
    let user = applicant(780, 6250.0, 32);
    assert!(retains(&user, &reference_product(), &PrefilterConfig::default()));
}

#[test]
fn test_low_credit_applicant_is_rejected_before_scoring() {
    let user = applicant(500, 6250.0, 32);
    let survivors = candidates(&user, &[reference_product()], &PrefilterConfig::default());
    assert!(survivors.is_empty());
}

#[test]
fn test_reference_rule_score() {
    let user = applicant(780, 6250.0, 32);
    let score = score_product(&user, &reference_product(), &RuleWeights::default());

    // credit 0.65, income 1.0, employment 1.0, age 1.0, rate 0.867
    assert!((score - 0.8642).abs() < 0.001);
}

#[test]
fn test_scoring_is_reproducible_across_calls() {
    let user = applicant(712, 3870.0, 47);
    let product = reference_product();
    let weights = RuleWeights::default();

    let scores: Vec<f64> = (0..10)
        .map(|_| score_product(&user, &product, &weights))
        .collect();

    assert!(scores.windows(2).all(|pair| pair[0] == pair[1]));
}

#[test]
fn test_ranking_orders_by_score() {
    let user = applicant(780, 6250.0, 32);

    let mut low_rate = reference_product();
    low_rate.product_id = "low_rate".to_string();
    low_rate.interest_rate_min = Some(6.0);

    let mut high_rate = reference_product();
    high_rate.product_id = "high_rate".to_string();
    high_rate.interest_rate_min = Some(28.0);

    let ranked = rank_candidates(&user, vec![high_rate, low_rate], &RuleWeights::default());

    assert_eq!(ranked[0].product.product_id, "low_rate");
    assert_eq!(ranked[1].product.product_id, "high_rate");
    assert!(ranked[0].rule_score > ranked[1].rule_score);
}

#[test]
fn test_matcher_shortlists_top_candidates() {
    let user = applicant(780, 6250.0, 32);
    let catalog: Vec<Product> = (0..8)
        .map(|i| {
            let mut p = reference_product();
            p.product_id = format!("p{}", i);
            p.interest_rate_min = Some(6.0 + i as f64 * 2.0);
            p
        })
        .collect();

    let shortlist = Matcher::with_defaults().shortlist(&user, &catalog, 5);

    assert_eq!(shortlist.candidates.len(), 5);
    assert_eq!(shortlist.total_candidates, 8);
    assert_eq!(shortlist.candidates[0].product.product_id, "p0");
}

#[test]
fn test_unemployed_applicant_filtered_from_employment_gated_products() {
    let mut user = applicant(780, 6250.0, 32);
    user.employment_status = EmploymentStatus::Unemployed;

    let mut open = reference_product();
    open.product_id = "open".to_string();
    open.employment_policy = None;

    let survivors = candidates(
        &user,
        &[reference_product(), open],
        &PrefilterConfig::default(),
    );

    assert_eq!(survivors.len(), 1);
    assert_eq!(survivors[0].product_id, "open");
}

#[test]
fn test_verdict_parsing_end_to_end() {
    let strict = parse_verdict(
        r#"{"eligible": true, "confidence": 0.82, "status": "eligible", "reasons": ["solid income"]}"#,
    )
    .unwrap();
    assert!(strict.eligible);
    assert_eq!(strict.status, EligibilityStatus::Eligible);

    let lenient = parse_verdict("eligible: true, looks fine overall").unwrap();
    assert_eq!(lenient.status, EligibilityStatus::LikelyEligible);

    assert!(parse_verdict("upstream timeout").is_none());
}
