use crate::core::{prefilter, scoring};
use crate::models::{PrefilterConfig, Product, RuleWeights, ScoredCandidate, User};

/// Result of shortlisting one user against the product catalog.
#[derive(Debug)]
pub struct Shortlist {
    /// Top-K rule-scored candidates, highest score first.
    pub candidates: Vec<ScoredCandidate>,
    /// Size of the catalog considered.
    pub total_candidates: usize,
    /// Survivors of the prefilter stage, before ranking and truncation.
    pub prefiltered: usize,
}

/// Per-user shortlist assembly: prefilter, rank, truncate to top-K.
///
/// Pure and deterministic; the expensive oracle stage consumes its output.
#[derive(Debug, Clone)]
pub struct Matcher {
    weights: RuleWeights,
    prefilter: PrefilterConfig,
}

impl Matcher {
    pub fn new(weights: RuleWeights, prefilter: PrefilterConfig) -> Self {
        Self { weights, prefilter }
    }

    pub fn with_defaults() -> Self {
        Self::new(RuleWeights::default(), PrefilterConfig::default())
    }

    pub fn shortlist(&self, user: &User, catalog: &[Product], top_k: usize) -> Shortlist {
        let survivors = prefilter::candidates(user, catalog, &self.prefilter);
        let prefiltered = survivors.len();

        let mut candidates = scoring::rank_candidates(user, survivors, &self.weights);
        candidates.truncate(top_k);

        Shortlist {
            candidates,
            total_candidates: catalog.len(),
            prefiltered,
        }
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::with_defaults()
    }
}
