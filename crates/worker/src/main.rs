use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use stockratings_core::ingest::{HttpPageFetcher, IngestionPipeline};
use stockratings_core::storage::{InMemoryRatingsRepository, PgRatingsRepository};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "stockratings_worker")]
struct Args {
    /// Fetch and classify every page but keep the results in memory instead of the database.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = stockratings_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let fetcher = Arc::new(HttpPageFetcher::from_settings(&settings)?);

    if args.dry_run {
        let repo = Arc::new(InMemoryRatingsRepository::new());
        let mut pipeline = IngestionPipeline::new(fetcher, repo.clone());
        let report = pipeline.run().await?;
        tracing::info!(
            dry_run = true,
            pages = report.pages,
            raw_rows = repo.raw_count().await,
            normalized_rows = repo.normalized_count().await,
            "ratings ingestion (dry-run)"
        );
        return Ok(());
    }

    let db_url = settings.require_database_url()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(settings.db_max_connections())
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;

    stockratings_core::storage::migrate(&pool).await?;

    let Some(lock) = stockratings_core::storage::lock::try_acquire_ingest_lock(&pool).await? else {
        tracing::warn!("ingest lock not acquired; another run in progress");
        return Ok(());
    };

    let repo = Arc::new(PgRatingsRepository::from_env(pool.clone())?);
    let mut pipeline = IngestionPipeline::new(fetcher, repo);

    let started_at = chrono::Utc::now();
    let outcome = pipeline.run().await;

    let run_id = stockratings_core::storage::runs::record_ingest_run(
        &pool,
        started_at,
        &outcome,
        &pipeline.progress(),
    )
    .await;

    if let Err(e) = lock.release().await {
        tracing::warn!(error = %e, "failed to release ingest lock");
    }

    let run_id = run_id?;
    match outcome {
        Ok(report) => {
            tracing::info!(
                %run_id,
                pages = report.pages,
                raw_rows = report.raw_rows,
                normalized_rows = report.normalized_rows,
                "persisted stock ratings snapshot"
            );
            Ok(())
        }
        Err(err) => {
            let err = anyhow::Error::new(err);
            sentry_anyhow::capture_anyhow(&err);
            Err(err.context(format!("stock ratings ingestion failed (run_id={run_id})")))
        }
    }
}

fn init_sentry(settings: &stockratings_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
