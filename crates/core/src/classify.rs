use crate::domain::rating::{ActionType, RatingLevel};
use crate::error::ClassifyError;
use rust_decimal::Decimal;
use std::str::FromStr;

const BUY_RATINGS: &[&str] = &[
    "Strong-Buy",
    "Overweight",
    "Outperform",
    "Outperformer",
    "Market Outperform",
    "Sector Outperform",
    "Buy",
    "Positive",
    "Speculative Buy",
];

const HOLD_RATINGS: &[&str] = &[
    "Market Perform",
    "In-Line",
    "Hold",
    "Neutral",
    "Equal Weight",
    "Sector Weight",
    "Sector Perform",
    "Peer Perform",
];

const SELL_RATINGS: &[&str] = &[
    "Underperform",
    "Underweight",
    "Sell",
    "Negative",
    "Reduce",
    "Sector Underperform",
];

// Brokerages leave the rating blank while a new rating is pending.
const PENDING_RATINGS: &[&str] = &[""];

const UP_ACTIONS: &[&str] = &["target raised by", "upgraded by"];
const DOWN_ACTIONS: &[&str] = &["target lowered by", "downgraded by"];
const REITERATED_ACTIONS: &[&str] = &["target set by", "reiterated by", "initiated by"];

const RATING_TABLE: &[(RatingLevel, &[&str])] = &[
    (RatingLevel::Buy, BUY_RATINGS),
    (RatingLevel::Hold, HOLD_RATINGS),
    (RatingLevel::Sell, SELL_RATINGS),
    (RatingLevel::Pending, PENDING_RATINGS),
];

const ACTION_TABLE: &[(ActionType, &[&str])] = &[
    (ActionType::Up, UP_ACTIONS),
    (ActionType::Down, DOWN_ACTIONS),
    (ActionType::Reiterated, REITERATED_ACTIONS),
];

/// Exact, case-sensitive lookup of a brokerage rating label.
pub fn classify_rating(raw: &str) -> Result<RatingLevel, ClassifyError> {
    RATING_TABLE
        .iter()
        .find(|(_, labels)| labels.contains(&raw))
        .map(|(level, _)| *level)
        .ok_or_else(|| ClassifyError::UnknownRating(raw.to_string()))
}

pub fn classify_action(raw: &str) -> Result<ActionType, ClassifyError> {
    ACTION_TABLE
        .iter()
        .find(|(_, verbs)| verbs.contains(&raw))
        .map(|(action, _)| *action)
        .ok_or_else(|| ClassifyError::UnknownAction(raw.to_string()))
}

/// Parses a currency string such as `"$1,234.50"` without going through binary floats.
pub fn parse_target(raw: &str) -> Result<Decimal, ClassifyError> {
    let cleaned: String = raw.chars().filter(|c| !matches!(c, '$' | ',')).collect();
    let cleaned = cleaned.trim();
    if !is_decimal_numeral(cleaned) {
        return Err(ClassifyError::UnknownTarget(raw.to_string()));
    }

    Decimal::from_str(cleaned).map_err(|_| ClassifyError::UnknownTarget(raw.to_string()))
}

/// Optional sign, digits, optional `.` fraction. `Decimal::from_str` alone also takes `_`
/// separators and exponents.
fn is_decimal_numeral(s: &str) -> bool {
    let unsigned = s.strip_prefix(['+', '-']).unwrap_or(s);
    let (int, frac) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    !(int.is_empty() && frac.is_empty()) && all_digits(int) && all_digits(frac)
}
