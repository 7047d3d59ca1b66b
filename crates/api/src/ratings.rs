use crate::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use stockratings_core::domain::rating::{ActionType, RatingLevel, ScoredRating};
use stockratings_core::error::QueryError;
use stockratings_core::query::RatingsQueryInput;

/// Query string of `GET /v1/stock_ratings/`. Pagination stays textual so a malformed value
/// can be reported as a client error instead of an extractor rejection.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct StockRatingsParams {
    sort_by: Option<String>,
    sort_order: Option<String>,
    ticker_like: Option<String>,
    company_like: Option<String>,
    offset: Option<String>,
    limit: Option<String>,
}

impl StockRatingsParams {
    fn into_input(self) -> Result<RatingsQueryInput, ApiError> {
        Ok(RatingsQueryInput {
            offset: parse_int("offset", self.offset.as_deref())?,
            limit: parse_int("limit", self.limit.as_deref())?,
            sort_by: self.sort_by,
            sort_order: self.sort_order,
            ticker_like: self.ticker_like,
            company_like: self.company_like,
        })
    }
}

fn parse_int(field: &str, value: Option<&str>) -> Result<Option<i64>, ApiError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s
            .parse::<i64>()
            .map(Some)
            .map_err(|_| ApiError::bad_request(format!("Invalid {field}"))),
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct StockRatingsResponse {
    length: usize,
    ratings: Vec<ApiRating>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ApiRating {
    ticker: String,
    company: String,
    brokerage: String,
    target_from: String,
    target_to: String,
    action: ActionType,
    rating_from: RatingLevel,
    rating_to: RatingLevel,
    at: String,
    target_delta: String,
    score: i32,
}

impl From<ScoredRating> for ApiRating {
    fn from(row: ScoredRating) -> Self {
        let r = row.rating;
        Self {
            target_from: r.target_from.to_string(),
            target_to: r.target_to.to_string(),
            at: r.at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            ticker: r.ticker,
            company: r.company,
            brokerage: r.brokerage,
            action: r.action,
            rating_from: r.rating_from,
            rating_to: r.rating_to,
            target_delta: row.target_delta.to_string(),
            score: row.score,
        }
    }
}

pub(crate) async fn get_stock_ratings(
    State(state): State<AppState>,
    Query(params): Query<StockRatingsParams>,
) -> Result<Json<StockRatingsResponse>, ApiError> {
    let Some(service) = &state.ratings else {
        return Err(ApiError {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: "database unavailable".to_string(),
        });
    };

    let input = params.into_input()?;
    let rows = service.get_ratings(input).await?;

    let ratings: Vec<ApiRating> = rows.into_iter().map(ApiRating::from).collect();
    Ok(Json(StockRatingsResponse {
        length: ratings.len(),
        ratings,
    }))
}

#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: String) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message,
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        if err.is_client_error() {
            return Self::bad_request(err.to_string());
        }

        let err = anyhow::Error::new(err);
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %format!("{err:#}"), "stock ratings query failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "unexpected error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use std::sync::Arc;
    use stockratings_core::domain::rating::{NormalizedRating, RawRatingEvent, RawRatingRecord};
    use stockratings_core::query::RatingsQueryService;
    use stockratings_core::storage::{InMemoryRatingsRepository, RatingsRepository};

    fn rating(ticker: &str, action: ActionType) -> NormalizedRating {
        NormalizedRating {
            raw_id: uuid::Uuid::new_v4(),
            ticker: ticker.to_string(),
            company: format!("{ticker} Corp"),
            brokerage: "Acme".to_string(),
            action,
            rating_from: RatingLevel::Hold,
            rating_to: RatingLevel::Buy,
            target_from: Decimal::new(1000, 2),
            target_to: Decimal::new(1250, 2),
            at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    async fn state_with(rows: Vec<NormalizedRating>) -> AppState {
        let repo = Arc::new(InMemoryRatingsRepository::new());
        let raw: Vec<RawRatingRecord> = rows
            .iter()
            .map(|r| RawRatingRecord {
                id: r.raw_id,
                event: RawRatingEvent {
                    ticker: r.ticker.clone(),
                    target_from: String::new(),
                    target_to: String::new(),
                    company: r.company.clone(),
                    action: String::new(),
                    brokerage: r.brokerage.clone(),
                    rating_from: String::new(),
                    rating_to: String::new(),
                    time: String::new(),
                },
            })
            .collect();
        repo.insert_raw_batch(&raw).await.unwrap();
        repo.insert_normalized_batch(&rows).await.unwrap();
        AppState {
            ratings: Some(RatingsQueryService::new(repo)),
        }
    }

    fn params(pairs: &[(&str, &str)]) -> StockRatingsParams {
        let mut p = StockRatingsParams::default();
        for (k, v) in pairs {
            let v = Some(v.to_string());
            match *k {
                "sort_by" => p.sort_by = v,
                "sort_order" => p.sort_order = v,
                "ticker_like" => p.ticker_like = v,
                "company_like" => p.company_like = v,
                "offset" => p.offset = v,
                "limit" => p.limit = v,
                other => panic!("unknown param {other}"),
            }
        }
        p
    }

    #[test]
    fn non_integer_pagination_is_bad_request() {
        let err = params(&[("offset", "ten")]).into_input().unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Invalid offset");

        let err = params(&[("limit", "1.5")]).into_input().unwrap_err();
        assert_eq!(err.message, "Invalid limit");
    }

    #[test]
    fn blank_pagination_uses_defaults() {
        let input = params(&[("offset", ""), ("limit", " 25 ")]).into_input().unwrap();
        assert_eq!(input.offset, None);
        assert_eq!(input.limit, Some(25));
    }

    #[test]
    fn serializes_rating_for_the_wire() {
        let row = ScoredRating::from_rating(rating("AAPL", ActionType::Up));
        let v = serde_json::to_value(ApiRating::from(row)).unwrap();
        assert_eq!(v["ticker"], "AAPL");
        assert_eq!(v["action"], "up");
        assert_eq!(v["rating_from"], "hold");
        assert_eq!(v["rating_to"], "buy");
        assert_eq!(v["target_from"], "10.00");
        assert_eq!(v["target_to"], "12.50");
        assert_eq!(v["target_delta"], "2.50");
        assert_eq!(v["at"], "2024-01-01T00:00:00Z");
        assert_eq!(v["score"], 6);
    }

    #[tokio::test]
    async fn returns_length_and_ratings() {
        let state = state_with(vec![
            rating("MSFT", ActionType::Reiterated),
            rating("AAPL", ActionType::Up),
        ])
        .await;

        let Json(body) = get_stock_ratings(State(state), Query(params(&[("limit", "1")])))
            .await
            .unwrap();

        assert_eq!(body.length, 1);
        assert_eq!(body.ratings[0].ticker, "AAPL");
    }

    #[tokio::test]
    async fn invalid_sort_column_is_bad_request() {
        let state = state_with(vec![rating("AAPL", ActionType::Up)]).await;

        let err = get_stock_ratings(State(state), Query(params(&[("sort_by", "id; --")])))
            .await
            .unwrap_err();

        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("invalid sort column"));
    }

    #[tokio::test]
    async fn degraded_mode_is_service_unavailable() {
        let state = AppState { ratings: None };
        let err = get_stock_ratings(State(state), Query(StockRatingsParams::default()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
