use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One analyst rating event exactly as the upstream API reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRatingEvent {
    pub ticker: String,
    pub target_from: String,
    pub target_to: String,
    pub company: String,
    pub action: String,
    pub brokerage: String,
    pub rating_from: String,
    pub rating_to: String,
    pub time: String,
}

/// A raw event plus the id it is persisted under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRatingRecord {
    pub id: Uuid,
    pub event: RawRatingEvent,
}

// Declaration order matters: it matches the Postgres enum and drives enum-column sorting.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "stock_rating", rename_all = "lowercase")]
pub enum RatingLevel {
    Buy,
    Hold,
    Sell,
    Pending,
}

impl RatingLevel {
    pub const ALL: [RatingLevel; 4] = [
        RatingLevel::Buy,
        RatingLevel::Hold,
        RatingLevel::Sell,
        RatingLevel::Pending,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RatingLevel::Buy => "buy",
            RatingLevel::Hold => "hold",
            RatingLevel::Sell => "sell",
            RatingLevel::Pending => "pending",
        }
    }

    /// Analyst stance used by the score: bullish +1, bearish -1, neutral or unknown 0.
    pub fn weight(self) -> i32 {
        match self {
            RatingLevel::Buy => 1,
            RatingLevel::Hold | RatingLevel::Pending => 0,
            RatingLevel::Sell => -1,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "stock_action", rename_all = "lowercase")]
pub enum ActionType {
    Up,
    Down,
    Reiterated,
}

impl ActionType {
    pub const ALL: [ActionType; 3] = [ActionType::Up, ActionType::Down, ActionType::Reiterated];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::Up => "up",
            ActionType::Down => "down",
            ActionType::Reiterated => "reiterated",
        }
    }

    pub fn weight(self) -> i32 {
        match self {
            ActionType::Up => 1,
            ActionType::Reiterated => 0,
            ActionType::Down => -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRating {
    pub raw_id: Uuid,
    pub ticker: String,
    pub company: String,
    pub brokerage: String,
    pub action: ActionType,
    pub rating_from: RatingLevel,
    pub rating_to: RatingLevel,
    pub target_from: Decimal,
    pub target_to: Decimal,
    pub at: DateTime<Utc>,
}

impl NormalizedRating {
    pub fn target_delta(&self) -> Decimal {
        self.target_to - self.target_from
    }
}

/// A normalized rating annotated with its read-time attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredRating {
    pub rating: NormalizedRating,
    pub target_delta: Decimal,
    pub score: i32,
}

impl ScoredRating {
    pub fn from_rating(rating: NormalizedRating) -> Self {
        let score = super::score::score(rating.action, rating.rating_from, rating.rating_to);
        Self {
            target_delta: rating.target_delta(),
            score,
            rating,
        }
    }
}
