//! `RatingsQueryService` over the in-memory repository: filters, sorting, pagination, errors.

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use stockratings_core::domain::rating::{
    ActionType, NormalizedRating, RatingLevel, RawRatingEvent, RawRatingRecord,
};
use stockratings_core::error::QueryError;
use stockratings_core::query::{RatingsQueryInput, RatingsQueryService, SortColumn};
use stockratings_core::storage::memory::FailOn;
use stockratings_core::storage::{InMemoryRatingsRepository, RatingsRepository};

struct Row {
    ticker: &'static str,
    company: &'static str,
    action: ActionType,
    from: RatingLevel,
    to: RatingLevel,
    target_from: i64,
    target_to: i64,
    day: u32,
}

async fn seeded(rows: &[Row]) -> Arc<InMemoryRatingsRepository> {
    let repo = Arc::new(InMemoryRatingsRepository::new());
    let mut raw = Vec::new();
    let mut normalized = Vec::new();
    for r in rows {
        let id = Uuid::new_v4();
        raw.push(RawRatingRecord {
            id,
            event: RawRatingEvent {
                ticker: r.ticker.to_string(),
                target_from: format!("${}", r.target_from),
                target_to: format!("${}", r.target_to),
                company: r.company.to_string(),
                action: String::new(),
                brokerage: "Acme".to_string(),
                rating_from: String::new(),
                rating_to: String::new(),
                time: String::new(),
            },
        });
        normalized.push(NormalizedRating {
            raw_id: id,
            ticker: r.ticker.to_string(),
            company: r.company.to_string(),
            brokerage: "Acme".to_string(),
            action: r.action,
            rating_from: r.from,
            rating_to: r.to,
            target_from: Decimal::from(r.target_from),
            target_to: Decimal::from(r.target_to),
            at: Utc.with_ymd_and_hms(2024, 1, r.day, 0, 0, 0).unwrap(),
        });
    }
    repo.insert_raw_batch(&raw).await.unwrap();
    repo.insert_normalized_batch(&normalized).await.unwrap();
    repo
}

fn fixture() -> Vec<Row> {
    use ActionType::*;
    use RatingLevel::*;
    vec![
        Row {
            ticker: "AAPL",
            company: "Apple Inc.",
            action: Up,
            from: Hold,
            to: Buy,
            target_from: 100,
            target_to: 120,
            day: 1,
        },
        Row {
            ticker: "MSFT",
            company: "Microsoft",
            action: Reiterated,
            from: Buy,
            to: Buy,
            target_from: 300,
            target_to: 300,
            day: 2,
        },
        Row {
            ticker: "AAP",
            company: "Advance Auto Parts",
            action: Down,
            from: Buy,
            to: Sell,
            target_from: 80,
            target_to: 50,
            day: 3,
        },
        Row {
            ticker: "GOOG",
            company: "Alphabet",
            action: Up,
            from: Hold,
            to: Hold,
            target_from: 150,
            target_to: 170,
            day: 4,
        },
        Row {
            ticker: "TSLA",
            company: "Tesla",
            action: Reiterated,
            from: Pending,
            to: Hold,
            target_from: 200,
            target_to: 190,
            day: 5,
        },
    ]
}

fn input() -> RatingsQueryInput {
    RatingsQueryInput::default()
}

fn tickers(rows: &[stockratings_core::domain::rating::ScoredRating]) -> Vec<&str> {
    rows.iter().map(|r| r.rating.ticker.as_str()).collect()
}

#[tokio::test]
async fn defaults_sort_by_score_desc_with_limit_ten() {
    let service = RatingsQueryService::new(seeded(&fixture()).await);

    let rows = service.get_ratings(input()).await.unwrap();

    // AAPL 6, GOOG 3, MSFT 1, TSLA 0, AAP -8
    assert_eq!(tickers(&rows), vec!["AAPL", "GOOG", "MSFT", "TSLA", "AAP"]);
    let scores: Vec<i32> = rows.iter().map(|r| r.score).collect();
    assert_eq!(scores, vec![6, 3, 1, 0, -8]);
}

#[tokio::test]
async fn ticker_filter_is_case_insensitive_substring() {
    let service = RatingsQueryService::new(seeded(&fixture()).await);

    let rows = service
        .get_ratings(RatingsQueryInput {
            ticker_like: Some("aap".to_string()),
            ..input()
        })
        .await
        .unwrap();

    assert_eq!(rows.len(), 2);
    assert!(rows
        .iter()
        .all(|r| r.rating.ticker.to_lowercase().contains("aap")));
}

#[tokio::test]
async fn company_filter_combines_with_ticker_filter() {
    let service = RatingsQueryService::new(seeded(&fixture()).await);

    let rows = service
        .get_ratings(RatingsQueryInput {
            ticker_like: Some("AAP".to_string()),
            company_like: Some("PARTS".to_string()),
            ..input()
        })
        .await
        .unwrap();

    assert_eq!(tickers(&rows), vec!["AAP"]);
}

#[tokio::test]
async fn empty_filter_returns_everything_subject_to_pagination() {
    let service = RatingsQueryService::new(seeded(&fixture()).await);

    let page = |offset, limit| RatingsQueryInput {
        ticker_like: Some(String::new()),
        sort_by: Some("at".to_string()),
        sort_order: Some("asc".to_string()),
        offset: Some(offset),
        limit: Some(limit),
        ..input()
    };

    let first = service.get_ratings(page(0, 2)).await.unwrap();
    let second = service.get_ratings(page(2, 2)).await.unwrap();
    let third = service.get_ratings(page(4, 2)).await.unwrap();
    let past_end = service.get_ratings(page(10, 2)).await.unwrap();

    assert_eq!(tickers(&first), vec!["AAPL", "MSFT"]);
    assert_eq!(tickers(&second), vec!["AAP", "GOOG"]);
    assert_eq!(tickers(&third), vec!["TSLA"]);
    assert!(past_end.is_empty());
}

#[tokio::test]
async fn sorts_by_target_delta() {
    let service = RatingsQueryService::new(seeded(&fixture()).await);

    let rows = service
        .get_ratings(RatingsQueryInput {
            sort_by: Some("target_delta".to_string()),
            sort_order: Some("asc".to_string()),
            ..input()
        })
        .await
        .unwrap();

    let deltas: Vec<Decimal> = rows.iter().map(|r| r.target_delta).collect();
    assert_eq!(
        deltas,
        vec![-30i64, -10, 0, 20, 20]
            .into_iter()
            .map(Decimal::from)
            .collect::<Vec<_>>()
    );
    // Equal deltas keep insertion order.
    assert_eq!(rows[3].rating.ticker, "AAPL");
    assert_eq!(rows[4].rating.ticker, "GOOG");
}

#[tokio::test]
async fn every_allow_listed_column_is_accepted() {
    let service = RatingsQueryService::new(seeded(&fixture()).await);

    for col in SortColumn::ALL {
        let rows = service
            .get_ratings(RatingsQueryInput {
                sort_by: Some(col.as_sql().to_string()),
                ..input()
            })
            .await
            .unwrap();
        assert_eq!(rows.len(), 5, "column {}", col.as_sql());
    }
}

#[tokio::test]
async fn rejects_unknown_sort_column() {
    let service = RatingsQueryService::new(seeded(&fixture()).await);

    for raw in ["; DROP TABLE", "unknown_col"] {
        let err = service
            .get_ratings(RatingsQueryInput {
                sort_by: Some(raw.to_string()),
                ..input()
            })
            .await
            .unwrap_err();
        assert!(
            matches!(&err, QueryError::InvalidSortColumn(c) if c == raw),
            "got {err:?}"
        );
        assert!(err.is_client_error());
    }
}

#[tokio::test]
async fn repository_failure_is_unexpected() {
    let repo = seeded(&fixture()).await;
    repo.fail_on(Some(FailOn::Query)).await;
    let service = RatingsQueryService::new(repo);

    let err = service.get_ratings(input()).await.unwrap_err();
    assert!(matches!(err, QueryError::Unexpected(_)), "got {err:?}");
    assert!(!err.is_client_error());
}
