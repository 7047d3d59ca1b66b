use crate::domain::rating::RawRatingEvent;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("ratings API request failed")]
    Network(#[from] reqwest::Error),

    #[error("ratings API returned HTTP {status}")]
    BadStatus { status: u16 },

    #[error("ratings API response is not a valid page")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    #[error("unknown rating: {0:?}")]
    UnknownRating(String),

    #[error("unknown action: {0:?}")]
    UnknownAction(String),

    #[error("unknown target: {0:?}")]
    UnknownTarget(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error")]
    Sqlx(#[from] sqlx::Error),

    #[error("invalid storage configuration: {0}")]
    Config(String),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to clear stored ratings")]
    Clear(#[source] StorageError),

    #[error("failed to fetch ratings page")]
    Fetch(#[from] FetchError),

    #[error("failed to parse time {:?} of {} rating", .record.time, .record.ticker)]
    TimeParse {
        record: Box<RawRatingEvent>,
        #[source]
        source: chrono::ParseError,
    },

    #[error("failed to classify {} rating from {}", .record.ticker, .record.brokerage)]
    Classify {
        record: Box<RawRatingEvent>,
        #[source]
        source: ClassifyError,
    },

    #[error("failed to insert {table} batch")]
    Insert {
        table: &'static str,
        #[source]
        source: StorageError,
    },
}

impl IngestError {
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::Clear(_) => "clear",
            IngestError::Fetch(_) => "fetch",
            IngestError::TimeParse { .. } => "time_parse",
            IngestError::Classify { source, .. } => match source {
                ClassifyError::UnknownRating(_) => "unknown_rating",
                ClassifyError::UnknownAction(_) => "unknown_action",
                ClassifyError::UnknownTarget(_) => "unknown_target",
            },
            IngestError::Insert { .. } => "insert",
        }
    }

    /// The upstream record that could not be normalized, if this error came from one.
    pub fn record(&self) -> Option<&RawRatingEvent> {
        match self {
            IngestError::TimeParse { record, .. } | IngestError::Classify { record, .. } => {
                Some(&**record)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid sort column: {0:?}")]
    InvalidSortColumn(String),

    #[error("invalid sort order: {0:?}")]
    InvalidSortOrder(String),

    #[error("invalid pagination: {field} must be non-negative (got {value})")]
    InvalidPagination { field: &'static str, value: i64 },

    #[error("unexpected error while querying ratings")]
    Unexpected(#[source] StorageError),
}

impl QueryError {
    pub fn is_client_error(&self) -> bool {
        !matches!(self, QueryError::Unexpected(_))
    }
}
