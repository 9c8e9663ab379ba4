use crate::models::{EmploymentStatus, PrefilterConfig, Product, User};

/// Stage 1 of the matching pipeline: cheap elimination of provably
/// incompatible products under widened tolerance bands.
///
/// Intentionally permissive. False positives are acceptable (stage 2 scores
/// precisely); false negatives are not, since a product dropped here never
/// reaches scoring.
pub fn candidates(user: &User, products: &[Product], config: &PrefilterConfig) -> Vec<Product> {
    products
        .iter()
        .filter(|product| retains(user, product, config))
        .cloned()
        .collect()
}

/// Check a single (user, product) pair against the tolerance bands.
#[inline]
pub fn retains(user: &User, product: &Product, config: &PrefilterConfig) -> bool {
    if !product.is_active {
        return false;
    }

    // Credit score, buffered on the lower bound only
    if let Some(min) = product.min_credit_score {
        if user.credit_score < min - config.credit_buffer {
            return false;
        }
    }
    if let Some(max) = product.max_credit_score {
        if user.credit_score > max {
            return false;
        }
    }

    // Income, buffered
    if let Some(min_income) = product.min_income {
        if user.annual_income() < min_income * (1.0 - config.income_buffer_percent) {
            return false;
        }
    }

    // Age, buffered on both sides
    if let Some(min_age) = product.min_age {
        if user.age < min_age - config.age_buffer {
            return false;
        }
    }
    if let Some(max_age) = product.max_age {
        if user.age > max_age + config.age_buffer {
            return false;
        }
    }

    // Employment: reject only on hard keyword conflicts
    if let Some(policy) = product.employment_policy.as_deref() {
        if employment_hard_conflict(user.employment_status, policy) {
            return false;
        }
    }

    true
}

/// Hard employment incompatibilities. Anything not provably incompatible
/// passes; the rule scorer grades the rest.
#[inline]
pub fn employment_hard_conflict(status: EmploymentStatus, policy: &str) -> bool {
    let policy = policy.to_lowercase();

    match status {
        EmploymentStatus::Unemployed => {
            policy.contains("employment") || policy.contains("employed")
        }
        EmploymentStatus::Student => policy.contains("steady") || policy.contains("stable"),
        _ => false,
    }
}
