//! Background worker: claims `process_run` jobs and produces reports.

mod shutdown;

use std::sync::Arc;

use anyhow::Context;

use tailor_ai::{Bm25Scorer, OpenAiClient, OpenAiConfig, ReportGenerator, UnconfiguredGenerator};
use tailor_infra::config::GeneratorConfig;
use tailor_infra::{
    PostgresJobStore, PostgresReportStore, PostgresResumeStore, PostgresRunStore, ReportPipeline,
    Worker, WorkerConfig, db,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tailor_observability::init();

    let config = WorkerConfig::from_env().context("invalid worker configuration")?;

    let pool = db::connect(&config.database_url, config.database_max_connections)
        .await
        .context("failed to connect to database")?;
    db::run_migrations(&pool)
        .await
        .context("failed to run migrations")?;

    let jobs = Arc::new(PostgresJobStore::new(pool.clone()).with_max_attempts(config.max_attempts));
    let runs = Arc::new(PostgresRunStore::new(pool.clone()));
    let pipeline = ReportPipeline::new(
        runs.clone(),
        Arc::new(PostgresResumeStore::new(pool.clone())),
        Arc::new(PostgresReportStore::new(pool)),
        Arc::new(Bm25Scorer::new()),
        build_generator(&config.generator)?,
    )
    .with_generation_timeout(config.generator.timeout);

    let worker = Arc::new(
        Worker::new(config.worker_id.clone(), jobs, runs, pipeline)
            .with_poll_interval(config.poll_interval),
    );

    if let Some(older_than) = config.stale_lock_after {
        worker
            .release_stale_locks(older_than)
            .await
            .context("failed to release stale locks")?;
    }

    let shutdown = shutdown::install_shutdown_handler();
    let handle = tokio::spawn({
        let worker = worker.clone();
        let shutdown = shutdown.clone();
        async move { worker.run(shutdown).await }
    });

    shutdown.cancelled().await;
    match tokio::time::timeout(config.shutdown_grace, handle).await {
        Ok(Ok(())) => tracing::info!(worker_id = %config.worker_id, "worker drained"),
        Ok(Err(err)) => tracing::error!(error = %err, "worker task panicked"),
        Err(_) => tracing::warn!(
            grace_secs = config.shutdown_grace.as_secs(),
            "worker did not stop within the grace period"
        ),
    }

    Ok(())
}

fn build_generator(config: &GeneratorConfig) -> anyhow::Result<Arc<dyn ReportGenerator>> {
    let Some(api_key) = config.api_key.as_deref() else {
        tracing::warn!("OPENAI_API_KEY not set; runs will fail until it is configured");
        return Ok(Arc::new(UnconfiguredGenerator::new("OPENAI_API_KEY")));
    };

    let client = OpenAiClient::new(
        OpenAiConfig::new(api_key)
            .with_model(config.model.clone())
            .with_base_url(config.base_url.clone())
            .with_timeout(config.timeout),
    )
    .context("failed to build OpenAI client")?;
    tracing::info!(model = client.model(), "report generator configured");
    Ok(Arc::new(client))
}
