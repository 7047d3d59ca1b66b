use crate::classify::{classify_action, classify_rating, parse_target};
use crate::domain::rating::{NormalizedRating, RawRatingEvent, RawRatingRecord};
use crate::error::{ClassifyError, IngestError};
use crate::ingest::fetcher::PageFetcher;
use crate::storage::RatingsRepository;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Clearing,
    Fetching,
    Classifying,
    Persisting,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub pages: u64,
    pub raw_rows: u64,
    pub normalized_rows: u64,
}

/// Full-refresh loader: clears storage, then fetches, classifies and persists one page at a
/// time until the upstream API runs out of pages. The first error aborts the run.
pub struct IngestionPipeline {
    fetcher: Arc<dyn PageFetcher>,
    repo: Arc<dyn RatingsRepository>,
    state: PipelineState,
    progress: IngestReport,
}

impl IngestionPipeline {
    pub fn new(fetcher: Arc<dyn PageFetcher>, repo: Arc<dyn RatingsRepository>) -> Self {
        Self {
            fetcher,
            repo,
            state: PipelineState::Idle,
            progress: IngestReport::default(),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Counts persisted so far. After a failed run this tells how much of the partial
    /// snapshot made it to storage.
    pub fn progress(&self) -> IngestReport {
        self.progress
    }

    pub async fn run(&mut self) -> Result<IngestReport, IngestError> {
        self.progress = IngestReport::default();
        let t0 = std::time::Instant::now();

        let res = self.run_pages().await;
        match &res {
            Ok(report) => {
                self.transition(PipelineState::Done);
                tracing::info!(
                    pages = report.pages,
                    raw_rows = report.raw_rows,
                    normalized_rows = report.normalized_rows,
                    elapsed_ms = t0.elapsed().as_millis(),
                    "ratings ingestion finished"
                );
            }
            Err(err) => {
                self.transition(PipelineState::Failed);
                tracing::error!(
                    kind = err.kind(),
                    error = %err,
                    record = ?err.record(),
                    pages = self.progress.pages,
                    raw_rows = self.progress.raw_rows,
                    "ratings ingestion failed"
                );
            }
        }
        res
    }

    async fn run_pages(&mut self) -> Result<IngestReport, IngestError> {
        self.transition(PipelineState::Clearing);
        self.repo.clear_all().await.map_err(IngestError::Clear)?;

        let mut cursor = String::new();
        loop {
            self.transition(PipelineState::Fetching);
            let page = self.fetcher.fetch(&cursor).await?;
            self.progress.pages += 1;

            if !page.items.is_empty() {
                self.transition(PipelineState::Classifying);
                let (raw, normalized) = classify_page(&page.items)?;

                self.transition(PipelineState::Persisting);
                self.progress.raw_rows += self
                    .repo
                    .insert_raw_batch(&raw)
                    .await
                    .map_err(|source| IngestError::Insert {
                        table: "raw_stock_ratings",
                        source,
                    })?;
                self.progress.normalized_rows += self
                    .repo
                    .insert_normalized_batch(&normalized)
                    .await
                    .map_err(|source| IngestError::Insert {
                        table: "stock_ratings",
                        source,
                    })?;
            }

            tracing::info!(
                page = self.progress.pages,
                items = page.items.len(),
                next_page = %page.next_page,
                "ratings page ingested"
            );

            if page.is_last() {
                break;
            }
            cursor = page.next_page;
        }

        Ok(self.progress)
    }

    fn transition(&mut self, next: PipelineState) {
        tracing::trace!(from = ?self.state, to = ?next, "ingestion state");
        self.state = next;
    }
}

// The whole page is classified before anything is written, so a bad record never leaves a
// half-persisted page behind.
fn classify_page(
    items: &[RawRatingEvent],
) -> Result<(Vec<RawRatingRecord>, Vec<NormalizedRating>), IngestError> {
    let mut raw = Vec::with_capacity(items.len());
    let mut normalized = Vec::with_capacity(items.len());

    for event in items {
        let id = Uuid::new_v4();
        normalized.push(normalize_event(id, event)?);
        raw.push(RawRatingRecord {
            id,
            event: event.clone(),
        });
    }

    Ok((raw, normalized))
}

/// Pure conversion of one upstream event. `raw_id` links the result to its raw record.
pub fn normalize_event(
    raw_id: Uuid,
    event: &RawRatingEvent,
) -> Result<NormalizedRating, IngestError> {
    let at = DateTime::parse_from_rfc3339(&event.time)
        .map_err(|source| IngestError::TimeParse {
            record: Box::new(event.clone()),
            source,
        })?
        .with_timezone(&Utc);

    classify_fields(raw_id, event, at).map_err(|source| IngestError::Classify {
        record: Box::new(event.clone()),
        source,
    })
}

fn classify_fields(
    raw_id: Uuid,
    event: &RawRatingEvent,
    at: DateTime<Utc>,
) -> Result<NormalizedRating, ClassifyError> {
    Ok(NormalizedRating {
        raw_id,
        ticker: event.ticker.clone(),
        company: event.company.clone(),
        brokerage: event.brokerage.clone(),
        rating_from: classify_rating(&event.rating_from)?,
        rating_to: classify_rating(&event.rating_to)?,
        action: classify_action(&event.action)?,
        target_from: parse_target(&event.target_from)?,
        target_to: parse_target(&event.target_to)?,
        at,
    })
}
