use crate::error::IngestError;
use crate::ingest::IngestReport;
use anyhow::Context;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub async fn record_ingest_run(
    pool: &sqlx::PgPool,
    started_at: DateTime<Utc>,
    outcome: &Result<IngestReport, IngestError>,
    progress: &IngestReport,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    let finished_at = Utc::now();

    let (status, error_kind, error) = match outcome {
        Ok(_) => ("success", None, None),
        Err(err) => ("error", Some(err.kind()), Some(format_error(err))),
    };

    sqlx::query(
        "INSERT INTO stock_rating_ingest_runs \
         (id, started_at, finished_at, status, error_kind, error, pages, raw_rows, normalized_rows) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .persistent(false)
    .bind(id)
    .bind(started_at)
    .bind(finished_at)
    .bind(status)
    .bind(error_kind)
    .bind(error)
    .bind(to_i64(progress.pages))
    .bind(to_i64(progress.raw_rows))
    .bind(to_i64(progress.normalized_rows))
    .execute(pool)
    .await
    .context("insert stock_rating_ingest_runs failed")?;

    Ok(id)
}

/// Full cause chain, plus the offending upstream record when there is one.
pub fn format_error(err: &IngestError) -> String {
    let mut out = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = std::error::Error::source(cause);
    }
    if let Some(record) = err.record() {
        if let Ok(json) = serde_json::to_string(record) {
            out.push_str(" record=");
            out.push_str(&json);
        }
    }
    out
}

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
