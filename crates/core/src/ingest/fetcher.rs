use crate::config::Settings;
use crate::error::FetchError;
use crate::ingest::types::RatingsPage;
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Cursor-addressed source of rating pages. An empty cursor asks for the first page.
#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, cursor: &str) -> Result<RatingsPage, FetchError>;
}

#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    http: reqwest::Client,
    host: String,
    auth: HeaderValue,
}

impl HttpPageFetcher {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let host = settings.require_data_host()?.to_string();
        let token = settings.require_data_token()?.to_string();

        let timeout_secs = std::env::var("DATA_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self::new(host, token, Duration::from_secs(timeout_secs))
    }

    pub fn new(host: String, token: String, timeout: Duration) -> anyhow::Result<Self> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .context("DATA_TOKEN is not a valid header value")?;
        auth.set_sensitive(true);

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build ratings API http client")?;

        Ok(Self { http, host, auth })
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, self.auth.clone());
        headers
    }
}

#[async_trait::async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, cursor: &str) -> Result<RatingsPage, FetchError> {
        let mut req = self.http.get(&self.host).headers(self.headers());
        if !cursor.is_empty() {
            req = req.query(&[("next_page", cursor)]);
        }

        let res = req.send().await?;

        let status = res.status();
        if status != StatusCode::OK {
            return Err(FetchError::BadStatus {
                status: status.as_u16(),
            });
        }

        let body = res.text().await?;
        let page = serde_json::from_str::<RatingsPage>(&body)?;

        tracing::debug!(
            cursor,
            items = page.items.len(),
            next_page = %page.next_page,
            "fetched ratings page"
        );
        Ok(page)
    }
}
