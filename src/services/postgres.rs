use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use crate::models::{
    EmploymentStatus, MatchDecision, ProcessingLogEntry, Product, RunStatus, User, UserOutcome,
};
use crate::services::store::{Store, StoreError};

const UPSERT_MATCH_SQL: &str = r#"
    INSERT INTO user_product_matches
        (user_id, product_id, match_score, eligibility_status, match_reasons,
         created_at, updated_at, notification_sent)
    VALUES ($1, $2, $3, $4, $5, NOW(), NOW(), FALSE)
    ON CONFLICT (user_id, product_id)
    DO UPDATE SET
        match_score = EXCLUDED.match_score,
        eligibility_status = EXCLUDED.eligibility_status,
        match_reasons = EXCLUDED.match_reasons,
        updated_at = NOW()
"#;

/// PostgreSQL implementation of the candidate store.
///
/// The match upsert deliberately leaves `notification_sent` and
/// `notification_sent_at` out of the conflict update: re-evaluating a pair
/// refreshes its score but never resurrects it in the notification queue.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect and run migrations.
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
        idle_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(idle_timeout)
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    pub async fn from_settings(
        url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
        acquire_timeout_secs: Option<u64>,
        idle_timeout_secs: Option<u64>,
    ) -> Result<Self, StoreError> {
        Self::new(
            url,
            max_connections.unwrap_or(10),
            min_connections.unwrap_or(1),
            Duration::from_secs(acquire_timeout_secs.unwrap_or(5)),
            Duration::from_secs(idle_timeout_secs.unwrap_or(600)),
        )
        .await
    }

    /// Health check for the database connection
    pub async fn health_check(&self) -> Result<bool, StoreError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }

    fn user_from_row(row: &sqlx::postgres::PgRow) -> Option<User> {
        let user_id: String = row.get("user_id");
        let status_text: String = row.get("employment_status");

        let Some(employment_status) = EmploymentStatus::parse(&status_text) else {
            tracing::warn!(
                "Skipping user {} with unknown employment status {:?}",
                user_id,
                status_text
            );
            return None;
        };

        Some(User {
            user_id,
            email: row.get("email"),
            monthly_income: row.get("monthly_income"),
            credit_score: row.get("credit_score"),
            employment_status,
            age: row.get("age"),
            processed: row.get("processed"),
        })
    }

    fn product_from_row(row: &sqlx::postgres::PgRow) -> Product {
        Product {
            product_id: row.get("product_id"),
            name: row.get("product_name"),
            provider: row.get("provider_name"),
            interest_rate_min: row.get("interest_rate_min"),
            interest_rate_max: row.get("interest_rate_max"),
            min_loan_amount: row.get("min_loan_amount"),
            max_loan_amount: row.get("max_loan_amount"),
            min_income: row.get("min_income_required"),
            min_credit_score: row.get("min_credit_score"),
            max_credit_score: row.get("max_credit_score"),
            employment_policy: row.get("employment_requirements"),
            min_age: row.get("age_min"),
            max_age: row.get("age_max"),
            is_active: row.get("is_active"),
        }
    }
}

/// Shared by the standalone upsert and the batch transaction.
async fn exec_upsert<'e, E>(executor: E, decision: &MatchDecision) -> Result<(), sqlx::Error>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(UPSERT_MATCH_SQL)
        .bind(&decision.user_id)
        .bind(&decision.product_id)
        .bind(decision.score)
        .bind(decision.status.as_str())
        .bind(json!(&decision.reasons))
        .execute(executor)
        .await?;

    Ok(())
}

#[async_trait]
impl Store for PostgresStore {
    async fn fetch_unprocessed_users(&self, limit: u32) -> Result<Vec<User>, StoreError> {
        let query = r#"
            SELECT user_id, email, monthly_income, credit_score,
                   employment_status, age, processed
            FROM users
            WHERE processed = FALSE
            ORDER BY created_at, user_id
            LIMIT $1
        "#;

        let rows = sqlx::query(query)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        // Rows with unusable data are skipped, not fatal: one bad ingest row
        // must not stall the whole queue.
        let users: Vec<User> = rows.iter().filter_map(Self::user_from_row).collect();

        tracing::debug!("Fetched {} unprocessed users", users.len());

        Ok(users)
    }

    async fn fetch_active_products(&self) -> Result<Vec<Product>, StoreError> {
        let query = r#"
            SELECT product_id, product_name, provider_name,
                   interest_rate_min, interest_rate_max,
                   min_loan_amount, max_loan_amount,
                   min_income_required, min_credit_score, max_credit_score,
                   employment_requirements, age_min, age_max, is_active
            FROM loan_products
            WHERE is_active = TRUE
            ORDER BY product_id
        "#;

        let rows = sqlx::query(query).fetch_all(&self.pool).await?;
        let products: Vec<Product> = rows.iter().map(Self::product_from_row).collect();

        tracing::debug!("Fetched {} active products", products.len());

        Ok(products)
    }

    async fn upsert_match(&self, decision: &MatchDecision) -> Result<(), StoreError> {
        exec_upsert(&self.pool, decision).await?;

        tracing::debug!(
            "Upserted match ({}, {}) score {:.3}",
            decision.user_id,
            decision.product_id,
            decision.score
        );

        Ok(())
    }

    async fn mark_processed(&self, user_ids: &[String]) -> Result<(), StoreError> {
        if user_ids.is_empty() {
            return Ok(());
        }

        sqlx::query("UPDATE users SET processed = TRUE WHERE user_id = ANY($1)")
            .bind(user_ids)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn append_log(&self, entry: &ProcessingLogEntry) -> Result<i64, StoreError> {
        let query = r#"
            INSERT INTO processing_logs
                (process_type, status, details, records_processed, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
        "#;

        let row = sqlx::query(query)
            .bind(&entry.process_type)
            .bind(entry.status.as_str())
            .bind(&entry.details)
            .bind(entry.records_processed)
            .bind(entry.started_at)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get("id"))
    }

    async fn complete_log(
        &self,
        log_id: i64,
        status: RunStatus,
        records_processed: i64,
        details: &str,
    ) -> Result<(), StoreError> {
        let query = r#"
            UPDATE processing_logs
            SET status = $2, records_processed = $3, details = $4, completed_at = NOW()
            WHERE id = $1
        "#;

        sqlx::query(query)
            .bind(log_id)
            .bind(status.as_str())
            .bind(records_processed)
            .bind(details)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn commit_batch(
        &self,
        log_id: i64,
        outcomes: &[UserOutcome],
    ) -> Result<u64, StoreError> {
        if outcomes.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut matches_written = 0u64;
        let mut user_ids = Vec::with_capacity(outcomes.len());

        for outcome in outcomes {
            user_ids.push(outcome.user_id.clone());
            for decision in &outcome.decisions {
                exec_upsert(&mut *tx, decision).await?;
                matches_written += 1;
            }
        }

        sqlx::query("UPDATE users SET processed = TRUE WHERE user_id = ANY($1)")
            .bind(&user_ids)
            .execute(&mut *tx)
            .await?;

        // The run's log entry moves with the flags so a processed user always
        // has a log record reflecting it.
        sqlx::query(
            "UPDATE processing_logs SET records_processed = records_processed + $2 WHERE id = $1",
        )
        .bind(log_id)
        .bind(user_ids.len() as i64)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(
            "Committed batch: {} users, {} matches",
            user_ids.len(),
            matches_written
        );

        Ok(matches_written)
    }
}
