pub mod lock;
pub mod memory;
pub mod ratings;
pub mod runs;

use crate::domain::rating::{NormalizedRating, RawRatingRecord, ScoredRating};
use crate::error::StorageError;
use crate::query::RatingsQuery;
use anyhow::Context;

pub use memory::InMemoryRatingsRepository;
pub use ratings::PgRatingsRepository;

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}

/// Storage for raw and normalized ratings.
///
/// Each insert call carries one fetched page and is committed on its own. `clear_all` must
/// remove both tables in a single transaction.
///
/// Raw rows are only written for pages where every item classified. A page that fails
/// classification leaves no raw rows; the offending record is kept in the ingest run log.
#[async_trait::async_trait]
pub trait RatingsRepository: Send + Sync {
    async fn clear_all(&self) -> Result<(), StorageError>;

    async fn insert_raw_batch(&self, items: &[RawRatingRecord]) -> Result<u64, StorageError>;

    async fn insert_normalized_batch(
        &self,
        items: &[NormalizedRating],
    ) -> Result<u64, StorageError>;

    async fn query(&self, query: &RatingsQuery) -> Result<Vec<ScoredRating>, StorageError>;
}
