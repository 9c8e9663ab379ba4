use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::models::{
    EligibilityStatus, EvaluationRequest, MatchDecision, OracleVerdict, ScoredCandidate, User,
};
use crate::services::{Oracle, OracleError};

/// Weight of the rule score vs. the oracle's confidence in the final blend.
const RULE_BLEND_WEIGHT: f64 = 0.7;
const CONFIDENCE_BLEND_WEIGHT: f64 = 0.3;

/// Policy knobs for the oracle refinement stage. All of these are tunables,
/// not invariants; defaults follow the oracle's published quota guidance.
#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    /// Total attempts per candidate for transient failures.
    pub max_attempts: u32,
    /// First backoff delay; doubles on every retry.
    pub backoff_base: Duration,
    /// Minimum delay between successive oracle calls.
    pub min_call_interval: Duration,
    /// Minimum rule score required to emit a fallback decision when the
    /// oracle is unavailable (strict greater-than).
    pub fallback_threshold: f64,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_millis(500),
            min_call_interval: Duration::from_millis(500),
            fallback_threshold: 0.6,
        }
    }
}

/// Stage 3 of the matching pipeline: refine the top rule-scored candidates
/// through the external oracle, degrading to rule-based decisions when the
/// oracle is unavailable.
///
/// Candidates are evaluated sequentially in ranked order; the pacing
/// watermark is shared, so concurrent callers still respect the oracle's
/// rate limit.
pub struct Evaluator<O> {
    oracle: O,
    config: EvaluatorConfig,
    last_call: Mutex<Option<Instant>>,
}

impl<O: Oracle> Evaluator<O> {
    pub fn new(oracle: O, config: EvaluatorConfig) -> Self {
        Self {
            oracle,
            config,
            last_call: Mutex::new(None),
        }
    }

    /// Evaluate a user's shortlisted candidates, highest rule score first.
    pub async fn evaluate_user(
        &self,
        user: &User,
        candidates: &[ScoredCandidate],
    ) -> Vec<MatchDecision> {
        let mut decisions = Vec::new();

        for candidate in candidates {
            if let Some(decision) = self.evaluate_candidate(user, candidate).await {
                decisions.push(decision);
            }
        }

        decisions
    }

    async fn evaluate_candidate(
        &self,
        user: &User,
        candidate: &ScoredCandidate,
    ) -> Option<MatchDecision> {
        let request = EvaluationRequest::new(user, &candidate.product);

        match self.call_with_retry(&request).await {
            Ok(verdict) => self.confirmed_decision(user, candidate, verdict),
            Err(err) if err.aborts_candidate() => {
                tracing::warn!(
                    "Oracle permanently rejected evaluation of ({}, {}): {}",
                    user.user_id,
                    candidate.product.product_id,
                    err
                );
                None
            }
            Err(err) => {
                tracing::warn!(
                    "Oracle unavailable for ({}, {}), using rule fallback: {}",
                    user.user_id,
                    candidate.product.product_id,
                    err
                );
                self.fallback_decision(user, candidate)
            }
        }
    }

    /// Success path: blend the deterministic rule score with the oracle's
    /// confidence. Ineligible verdicts emit nothing.
    fn confirmed_decision(
        &self,
        user: &User,
        candidate: &ScoredCandidate,
        verdict: OracleVerdict,
    ) -> Option<MatchDecision> {
        if !verdict.eligible {
            tracing::debug!(
                "Oracle found ({}, {}) ineligible",
                user.user_id,
                candidate.product.product_id
            );
            return None;
        }

        let score = (RULE_BLEND_WEIGHT * candidate.rule_score
            + CONFIDENCE_BLEND_WEIGHT * verdict.confidence)
            .clamp(0.0, 1.0);

        let mut reasons = verdict.reasons;
        reasons.extend(
            verdict
                .risk_factors
                .into_iter()
                .map(|factor| format!("Risk factor: {}", factor)),
        );
        reasons.push(format!(
            "External evaluation confirmed eligibility (confidence {:.2})",
            verdict.confidence
        ));

        Some(MatchDecision {
            user_id: user.user_id.clone(),
            product_id: candidate.product.product_id.clone(),
            score,
            status: verdict.status,
            reasons,
        })
    }

    /// Degraded path: pure rule-based decision, emitted only above the
    /// configured threshold so the pipeline never silently drops strong
    /// candidates when the oracle is down.
    fn fallback_decision(
        &self,
        user: &User,
        candidate: &ScoredCandidate,
    ) -> Option<MatchDecision> {
        if candidate.rule_score <= self.config.fallback_threshold {
            tracing::debug!(
                "Rule score {:.2} below fallback threshold for ({}, {})",
                candidate.rule_score,
                user.user_id,
                candidate.product.product_id
            );
            return None;
        }

        Some(MatchDecision {
            user_id: user.user_id.clone(),
            product_id: candidate.product.product_id.clone(),
            score: candidate.rule_score,
            status: EligibilityStatus::LikelyEligible,
            reasons: vec![
                "Rule-based fallback: external evaluation unavailable".to_string(),
                format!("Rule score: {:.2}", candidate.rule_score),
            ],
        })
    }

    /// One paced oracle call per attempt; transient failures back off
    /// exponentially up to the attempt cap. Permanent and malformed errors
    /// return immediately.
    async fn call_with_retry(
        &self,
        request: &EvaluationRequest<'_>,
    ) -> Result<OracleVerdict, OracleError> {
        let mut backoff = self.config.backoff_base;
        let mut attempt = 1u32;

        loop {
            self.pace().await;

            match self.oracle.evaluate(request).await {
                Ok(verdict) => return Ok(verdict),
                Err(err) if err.is_transient() && attempt < self.config.max_attempts => {
                    tracing::warn!(
                        "Oracle attempt {}/{} failed ({}), retrying in {:?}",
                        attempt,
                        self.config.max_attempts,
                        err,
                        backoff
                    );
                    sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Enforce the minimum inter-call delay. The watermark lock is held
    /// across the sleep so concurrent callers queue instead of bursting.
    async fn pace(&self) {
        if self.config.min_call_interval.is_zero() {
            return;
        }

        let mut last = self.last_call.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.config.min_call_interval {
                sleep(self.config.min_call_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}
