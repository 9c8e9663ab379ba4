use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use lendmatch::config::Settings;
use lendmatch::core::{Evaluator, EvaluatorConfig, Matcher, Orchestrator, OrchestratorConfig};
use lendmatch::models::{PrefilterConfig, RuleWeights};
use lendmatch::services::{HttpOracle, PostgresStore};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    // Initialize logging
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if log_format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.init();
    }

    info!("Starting lendmatch matching engine...");

    // Load configuration
    let settings = Settings::load().unwrap_or_else(|e| {
        error!("Failed to load configuration: {}", e);
        panic!("Configuration error: {}", e);
    });

    info!("Configuration loaded successfully");

    // Initialize the candidate store
    let db_max_conn = settings.database.max_connections.unwrap_or(10);

    let store = Arc::new(
        PostgresStore::from_settings(
            &settings.database.url,
            settings.database.max_connections,
            settings.database.min_connections,
            settings.database.acquire_timeout_secs,
            settings.database.idle_timeout_secs,
        )
        .await
        .unwrap_or_else(|e| {
            error!("Failed to connect to PostgreSQL: {}", e);
            panic!("PostgreSQL connection error: {}", e);
        }),
    );

    info!("PostgreSQL store initialized (max: {} connections)", db_max_conn);

    // Initialize the evaluation oracle client
    let oracle = HttpOracle::new(
        settings.oracle.endpoint.clone(),
        settings.oracle.api_key.clone(),
        settings.oracle.model.clone(),
        Duration::from_secs(settings.oracle.timeout_secs),
    );

    info!("Oracle client initialized (model: {})", settings.oracle.model);

    // Assemble the pipeline with configured weights and tolerance bands
    let weights = RuleWeights {
        credit: settings.scoring.weights.credit,
        income: settings.scoring.weights.income,
        employment: settings.scoring.weights.employment,
        age: settings.scoring.weights.age,
        rate: settings.scoring.weights.rate,
    };

    let prefilter = PrefilterConfig {
        credit_buffer: settings.matching.credit_buffer,
        income_buffer_percent: settings.matching.income_buffer_percent,
        age_buffer: settings.matching.age_buffer,
    };

    let matcher = Matcher::new(weights, prefilter);

    let evaluator = Evaluator::new(
        oracle,
        EvaluatorConfig {
            max_attempts: settings.oracle.max_attempts,
            backoff_base: Duration::from_millis(settings.oracle.backoff_base_ms),
            min_call_interval: Duration::from_millis(settings.oracle.min_call_interval_ms),
            fallback_threshold: settings.matching.fallback_threshold,
        },
    );

    let orchestrator = Orchestrator::new(
        store,
        matcher,
        evaluator,
        OrchestratorConfig {
            batch_size: settings.matching.batch_size,
            top_candidates: settings.matching.top_candidates,
        },
    );

    // Graceful shutdown: finish the in-flight user, commit, then stop
    let cancel = orchestrator.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested, stopping after the current user");
            cancel.store(true, Ordering::Relaxed);
        }
    });

    match orchestrator.run().await {
        Ok(summary) => {
            info!(
                "Run {} finished: {} users processed, {} failed, {} matches created",
                summary.run_id,
                summary.users_processed,
                summary.users_failed,
                summary.matches_created
            );
            Ok(())
        }
        Err(e) => {
            error!("Matching run failed: {}", e);
            std::process::exit(1);
        }
    }
}
