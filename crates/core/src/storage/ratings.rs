use crate::domain::rating::{
    ActionType, NormalizedRating, RatingLevel, RawRatingRecord, ScoredRating,
};
use crate::domain::score::score_sql;
use crate::error::StorageError;
use crate::query::RatingsQuery;
use crate::storage::RatingsRepository;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

const DEFAULT_INSERT_BATCH: usize = 500;

#[derive(Debug, Clone)]
pub struct PgRatingsRepository {
    pool: sqlx::PgPool,
    chunk_size: usize,
}

impl PgRatingsRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self {
            pool,
            chunk_size: DEFAULT_INSERT_BATCH,
        }
    }

    /// Reads `RATINGS_INSERT_BATCH` (rows per INSERT statement, default 500).
    pub fn from_env(pool: sqlx::PgPool) -> Result<Self, StorageError> {
        let chunk_size = std::env::var("RATINGS_INSERT_BATCH")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(DEFAULT_INSERT_BATCH);

        if chunk_size < 1 {
            return Err(StorageError::Config(
                "RATINGS_INSERT_BATCH must be >= 1".to_string(),
            ));
        }

        Ok(Self { pool, chunk_size })
    }

    pub fn pool(&self) -> &sqlx::PgPool {
        &self.pool
    }
}

type ScoredRow = (
    Uuid,
    String,
    String,
    String,
    ActionType,
    RatingLevel,
    RatingLevel,
    Decimal,
    Decimal,
    DateTime<Utc>,
    Decimal,
    i32,
);

#[async_trait::async_trait]
impl RatingsRepository for PgRatingsRepository {
    async fn clear_all(&self) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("TRUNCATE stock_ratings, raw_stock_ratings")
            .persistent(false)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn insert_raw_batch(&self, items: &[RawRatingRecord]) -> Result<u64, StorageError> {
        if items.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut affected: u64 = 0;

        for (batch_idx, chunk) in items.chunks(self.chunk_size).enumerate() {
            let t0 = std::time::Instant::now();
            let mut qb = sqlx::QueryBuilder::new(
                "INSERT INTO raw_stock_ratings \
                 (id, ticker, target_from, target_to, company, action, brokerage, rating_from, rating_to, time) ",
            );
            qb.push_values(chunk, |mut b, record| {
                let e = &record.event;
                b.push_bind(record.id)
                    .push_bind(e.ticker.as_str())
                    .push_bind(e.target_from.as_str())
                    .push_bind(e.target_to.as_str())
                    .push_bind(e.company.as_str())
                    .push_bind(e.action.as_str())
                    .push_bind(e.brokerage.as_str())
                    .push_bind(e.rating_from.as_str())
                    .push_bind(e.rating_to.as_str())
                    .push_bind(e.time.as_str());
            });

            let res = qb.build().persistent(false).execute(&mut *tx).await?;
            affected += res.rows_affected();

            tracing::debug!(
                batch_idx,
                batch_size = chunk.len(),
                elapsed_ms = t0.elapsed().as_millis(),
                "raw_stock_ratings batch insert"
            );
        }

        tx.commit().await?;
        Ok(affected)
    }

    async fn insert_normalized_batch(
        &self,
        items: &[NormalizedRating],
    ) -> Result<u64, StorageError> {
        if items.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut affected: u64 = 0;

        for (batch_idx, chunk) in items.chunks(self.chunk_size).enumerate() {
            let t0 = std::time::Instant::now();
            let mut qb = sqlx::QueryBuilder::new(
                "INSERT INTO stock_ratings \
                 (raw_id, ticker, company, brokerage, action, rating_from, rating_to, target_from, target_to, at) ",
            );
            qb.push_values(chunk, |mut b, r| {
                b.push_bind(r.raw_id)
                    .push_bind(r.ticker.as_str())
                    .push_bind(r.company.as_str())
                    .push_bind(r.brokerage.as_str())
                    .push_bind(r.action)
                    .push_bind(r.rating_from)
                    .push_bind(r.rating_to)
                    .push_bind(r.target_from)
                    .push_bind(r.target_to)
                    .push_bind(r.at);
            });

            let res = qb.build().persistent(false).execute(&mut *tx).await?;
            affected += res.rows_affected();

            tracing::debug!(
                batch_idx,
                batch_size = chunk.len(),
                elapsed_ms = t0.elapsed().as_millis(),
                "stock_ratings batch insert"
            );
        }

        tx.commit().await?;
        Ok(affected)
    }

    async fn query(&self, query: &RatingsQuery) -> Result<Vec<ScoredRating>, StorageError> {
        let mut qb = build_query(query);
        let rows: Vec<ScoredRow> = qb.build_query_as().fetch_all(&self.pool).await?;

        Ok(rows
            .into_iter()
            .map(
                |(
                    raw_id,
                    ticker,
                    company,
                    brokerage,
                    action,
                    rating_from,
                    rating_to,
                    target_from,
                    target_to,
                    at,
                    target_delta,
                    score,
                )| ScoredRating {
                    rating: NormalizedRating {
                        raw_id,
                        ticker,
                        company,
                        brokerage,
                        action,
                        rating_from,
                        rating_to,
                        target_from,
                        target_to,
                        at,
                    },
                    target_delta,
                    score,
                },
            )
            .collect())
    }
}

// Sort column and direction come from closed enums; filters and pagination are bound.
fn build_query(query: &RatingsQuery) -> sqlx::QueryBuilder<'_, sqlx::Postgres> {
    let mut qb = sqlx::QueryBuilder::new(format!(
        "SELECT raw_id, ticker, company, brokerage, action, rating_from, rating_to, \
                target_from, target_to, at, target_delta, score \
         FROM ( \
             SELECT id, raw_id, ticker, company, brokerage, action, rating_from, rating_to, \
                    target_from, target_to, at, \
                    (target_to - target_from) AS target_delta, \
                    {}::INT4 AS score \
             FROM stock_ratings \
         ) AS scored \
         WHERE strpos(lower(ticker), lower(",
        score_sql()
    ));
    qb.push_bind(query.ticker_like.as_str());
    qb.push(")) > 0 AND strpos(lower(company), lower(");
    qb.push_bind(query.company_like.as_str());
    qb.push(")) > 0 ORDER BY ");
    qb.push(query.sort_by.as_sql());
    qb.push(" ");
    qb.push(query.sort_order.as_sql());
    qb.push(", id ASC OFFSET ");
    qb.push_bind(query.offset);
    qb.push(" LIMIT ");
    qb.push_bind(query.limit);
    qb
}
