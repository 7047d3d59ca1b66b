pub mod classify;
pub mod domain;
pub mod error;
pub mod ingest;
pub mod query;
pub mod storage;

pub mod config {
    use anyhow::Context;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub data_host: Option<String>,
        pub data_token: Option<String>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                database_url: non_empty_var("DATABASE_URL"),
                data_host: non_empty_var("DATA_HOST"),
                data_token: non_empty_var("DATA_TOKEN"),
                sentry_dsn: non_empty_var("SENTRY_DSN"),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_data_host(&self) -> anyhow::Result<&str> {
            self.data_host.as_deref().context("DATA_HOST is required")
        }

        pub fn require_data_token(&self) -> anyhow::Result<&str> {
            self.data_token.as_deref().context("DATA_TOKEN is required")
        }

        pub fn db_max_connections(&self) -> u32 {
            std::env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse::<u32>().ok())
                .filter(|n| *n >= 1)
                .unwrap_or(5)
        }
    }

    fn non_empty_var(key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|s| !s.trim().is_empty())
    }

}
