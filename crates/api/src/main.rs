use axum::{routing::get, Json, Router};
use std::sync::Arc;
use stockratings_core::query::RatingsQueryService;
use stockratings_core::storage::PgRatingsRepository;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod ratings;

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

    let ratings = match connect(&settings).await {
        Ok(pool) => Some(RatingsQueryService::new(Arc::new(PgRatingsRepository::new(
            pool,
        )))),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "database unavailable; starting API in degraded mode");
            None
        }
    };

    let app = router(AppState { ratings });

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn connect(settings: &stockratings_core::config::Settings) -> anyhow::Result<sqlx::PgPool> {
    let db_url = settings.require_database_url()?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(settings.db_max_connections())
        .connect(db_url)
        .await?;
    stockratings_core::storage::migrate(&pool).await?;
    Ok(pool)
}

#[derive(Debug, Clone)]
pub(crate) struct AppState {
    pub(crate) ratings: Option<RatingsQueryService>,
}

fn router(state: AppState) -> Router {
    let v1 = Router::new()
        .route("/stock_ratings", get(ratings::get_stock_ratings))
        .route("/stock_ratings/", get(ratings::get_stock_ratings));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/ping", get(ping))
        .route("/ping/", get(ping))
        .nest("/v1", v1)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn ping() -> Json<&'static str> {
    Json("pong")
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
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
