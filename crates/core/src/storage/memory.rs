use crate::domain::rating::{NormalizedRating, RawRatingRecord, ScoredRating};
use crate::error::StorageError;
use crate::query::{RatingsQuery, SortColumn, SortOrder};
use crate::storage::RatingsRepository;
use std::cmp::Ordering;
use tokio::sync::Mutex;

/// Operations that can be made to fail on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    Clear,
    InsertRaw,
    InsertNormalized,
    Query,
}

#[derive(Debug, Default)]
struct State {
    raw: Vec<RawRatingRecord>,
    normalized: Vec<NormalizedRating>,
    fail_on: Option<FailOn>,
}

/// Process-local repository used for dry runs and tests. Mirrors the Postgres query semantics:
/// case-insensitive substring filters, allow-listed sort with insertion order as tie-break.
#[derive(Debug, Default)]
pub struct InMemoryRatingsRepository {
    state: Mutex<State>,
}

impl InMemoryRatingsRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_on(&self, op: Option<FailOn>) {
        self.state.lock().await.fail_on = op;
    }

    pub async fn raw_count(&self) -> usize {
        self.state.lock().await.raw.len()
    }

    pub async fn normalized_count(&self) -> usize {
        self.state.lock().await.normalized.len()
    }

    pub async fn raw_records(&self) -> Vec<RawRatingRecord> {
        self.state.lock().await.raw.clone()
    }

    pub async fn normalized_records(&self) -> Vec<NormalizedRating> {
        self.state.lock().await.normalized.clone()
    }
}

fn check(state: &State, op: FailOn) -> Result<(), StorageError> {
    if state.fail_on == Some(op) {
        return Err(StorageError::Backend(format!("injected failure on {op:?}")));
    }
    Ok(())
}

#[async_trait::async_trait]
impl RatingsRepository for InMemoryRatingsRepository {
    async fn clear_all(&self) -> Result<(), StorageError> {
        let mut state = self.state.lock().await;
        check(&state, FailOn::Clear)?;
        state.raw.clear();
        state.normalized.clear();
        Ok(())
    }

    async fn insert_raw_batch(&self, items: &[RawRatingRecord]) -> Result<u64, StorageError> {
        let mut state = self.state.lock().await;
        check(&state, FailOn::InsertRaw)?;
        if let Some(dup) = items
            .iter()
            .find(|item| state.raw.iter().any(|r| r.id == item.id))
        {
            return Err(StorageError::Backend(format!(
                "duplicate raw rating id {}",
                dup.id
            )));
        }
        state.raw.extend_from_slice(items);
        Ok(items.len() as u64)
    }

    async fn insert_normalized_batch(
        &self,
        items: &[NormalizedRating],
    ) -> Result<u64, StorageError> {
        let mut state = self.state.lock().await;
        check(&state, FailOn::InsertNormalized)?;
        // Same guarantee as the foreign key on stock_ratings.raw_id.
        if let Some(orphan) = items
            .iter()
            .find(|item| !state.raw.iter().any(|r| r.id == item.raw_id))
        {
            return Err(StorageError::Backend(format!(
                "normalized rating references unknown raw id {}",
                orphan.raw_id
            )));
        }
        state.normalized.extend_from_slice(items);
        Ok(items.len() as u64)
    }

    async fn query(&self, query: &RatingsQuery) -> Result<Vec<ScoredRating>, StorageError> {
        let state = self.state.lock().await;
        check(&state, FailOn::Query)?;

        let ticker_like = query.ticker_like.to_lowercase();
        let company_like = query.company_like.to_lowercase();

        let mut rows: Vec<ScoredRating> = state
            .normalized
            .iter()
            .filter(|r| r.ticker.to_lowercase().contains(&ticker_like))
            .filter(|r| r.company.to_lowercase().contains(&company_like))
            .cloned()
            .map(ScoredRating::from_rating)
            .collect();

        // Stable sort keeps insertion order among equal keys.
        rows.sort_by(|a, b| {
            let ord = compare(query.sort_by, a, b);
            match query.sort_order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });

        let offset = usize::try_from(query.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(query.limit).unwrap_or(usize::MAX);
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }
}

fn compare(column: SortColumn, a: &ScoredRating, b: &ScoredRating) -> Ordering {
    let (ra, rb) = (&a.rating, &b.rating);
    match column {
        SortColumn::Score => a.score.cmp(&b.score),
        SortColumn::TargetDelta => a.target_delta.cmp(&b.target_delta),
        SortColumn::TargetFrom => ra.target_from.cmp(&rb.target_from),
        SortColumn::TargetTo => ra.target_to.cmp(&rb.target_to),
        SortColumn::Ticker => ra.ticker.cmp(&rb.ticker),
        SortColumn::Company => ra.company.cmp(&rb.company),
        SortColumn::Brokerage => ra.brokerage.cmp(&rb.brokerage),
        SortColumn::Action => ra.action.cmp(&rb.action),
        SortColumn::RatingFrom => ra.rating_from.cmp(&rb.rating_from),
        SortColumn::RatingTo => ra.rating_to.cmp(&rb.rating_to),
        SortColumn::At => ra.at.cmp(&rb.at),
    }
}
