use crate::domain::rating::ScoredRating;
use crate::error::QueryError;
use crate::storage::RatingsRepository;
use std::sync::Arc;

pub const DEFAULT_LIMIT: i64 = 10;

/// Columns a caller may sort by. Anything else is rejected before SQL is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortColumn {
    #[default]
    Score,
    TargetDelta,
    TargetFrom,
    TargetTo,
    Ticker,
    Company,
    Brokerage,
    Action,
    RatingFrom,
    RatingTo,
    At,
}

impl SortColumn {
    pub const ALL: [SortColumn; 11] = [
        SortColumn::Score,
        SortColumn::TargetDelta,
        SortColumn::TargetFrom,
        SortColumn::TargetTo,
        SortColumn::Ticker,
        SortColumn::Company,
        SortColumn::Brokerage,
        SortColumn::Action,
        SortColumn::RatingFrom,
        SortColumn::RatingTo,
        SortColumn::At,
    ];

    /// Column identifier in the scored ratings projection.
    pub fn as_sql(self) -> &'static str {
        match self {
            SortColumn::Score => "score",
            SortColumn::TargetDelta => "target_delta",
            SortColumn::TargetFrom => "target_from",
            SortColumn::TargetTo => "target_to",
            SortColumn::Ticker => "ticker",
            SortColumn::Company => "company",
            SortColumn::Brokerage => "brokerage",
            SortColumn::Action => "action",
            SortColumn::RatingFrom => "rating_from",
            SortColumn::RatingTo => "rating_to",
            SortColumn::At => "at",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, QueryError> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_sql() == raw)
            .ok_or_else(|| QueryError::InvalidSortColumn(raw.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, QueryError> {
        if raw.eq_ignore_ascii_case("asc") {
            Ok(SortOrder::Asc)
        } else if raw.eq_ignore_ascii_case("desc") {
            Ok(SortOrder::Desc)
        } else {
            Err(QueryError::InvalidSortOrder(raw.to_string()))
        }
    }
}

/// Request parameters as the boundary received them. Missing or empty values take defaults.
#[derive(Debug, Clone, Default)]
pub struct RatingsQueryInput {
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub ticker_like: Option<String>,
    pub company_like: Option<String>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

/// Validated query handed to the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatingsQuery {
    pub sort_by: SortColumn,
    pub sort_order: SortOrder,
    pub ticker_like: String,
    pub company_like: String,
    pub offset: i64,
    pub limit: i64,
}

impl Default for RatingsQuery {
    fn default() -> Self {
        Self {
            sort_by: SortColumn::default(),
            sort_order: SortOrder::default(),
            ticker_like: String::new(),
            company_like: String::new(),
            offset: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl TryFrom<RatingsQueryInput> for RatingsQuery {
    type Error = QueryError;

    fn try_from(input: RatingsQueryInput) -> Result<Self, Self::Error> {
        let sort_by = match non_empty(input.sort_by) {
            Some(s) => SortColumn::parse(&s)?,
            None => SortColumn::default(),
        };
        let sort_order = match non_empty(input.sort_order) {
            Some(s) => SortOrder::parse(&s)?,
            None => SortOrder::default(),
        };

        let offset = input.offset.unwrap_or(0);
        if offset < 0 {
            return Err(QueryError::InvalidPagination {
                field: "offset",
                value: offset,
            });
        }
        let limit = input.limit.unwrap_or(DEFAULT_LIMIT);
        if limit < 0 {
            return Err(QueryError::InvalidPagination {
                field: "limit",
                value: limit,
            });
        }

        Ok(Self {
            sort_by,
            sort_order,
            ticker_like: input.ticker_like.unwrap_or_default(),
            company_like: input.company_like.unwrap_or_default(),
            offset,
            limit,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

#[derive(Clone)]
pub struct RatingsQueryService {
    repo: Arc<dyn RatingsRepository>,
}

impl RatingsQueryService {
    pub fn new(repo: Arc<dyn RatingsRepository>) -> Self {
        Self { repo }
    }

    pub async fn get_ratings(
        &self,
        input: RatingsQueryInput,
    ) -> Result<Vec<ScoredRating>, QueryError> {
        let query = RatingsQuery::try_from(input)?;
        let t0 = std::time::Instant::now();

        let rows = self.repo.query(&query).await.map_err(QueryError::Unexpected)?;

        tracing::debug!(
            sort_by = query.sort_by.as_sql(),
            sort_order = query.sort_order.as_sql(),
            offset = query.offset,
            limit = query.limit,
            rows = rows.len(),
            elapsed_ms = t0.elapsed().as_millis(),
            "ratings query"
        );
        Ok(rows)
    }
}

impl std::fmt::Debug for RatingsQueryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RatingsQueryService").finish_non_exhaustive()
    }
}
