use std::time::Duration;

use adreel_core::generation::{LengthBounds, DEFAULT_MAX_LENGTH_SECS, DEFAULT_MIN_LENGTH_SECS};

/// Server configuration loaded from environment variables.
///
/// Everything except the workflow webhook URL has a default suitable for
/// local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `150`). Kept above the
    /// workflow timeout so the transport's own timeout is what job calls hit.
    pub request_timeout_secs: u64,
    /// Fixed workflow endpoint used when a job call carries no resume pointer.
    pub workflow_webhook_url: String,
    /// Timeout for a single outbound workflow call (default: `120`).
    pub workflow_timeout_secs: u64,
    /// Accepted video length range.
    pub length_bounds: LengthBounds,
    /// Cadence of the progress estimator on watch sessions (default: 1s).
    pub progress_tick: Duration,
    /// Postgres URL. `None` runs on the in-memory store.
    pub database_url: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default                 |
    /// |------------------------------|-------------------------|
    /// | `HOST`                       | `0.0.0.0`               |
    /// | `PORT`                       | `3000`                  |
    /// | `CORS_ORIGINS`               | `http://localhost:3000` |
    /// | `REQUEST_TIMEOUT_SECS`       | `150`                   |
    /// | `WORKFLOW_WEBHOOK_URL`       | (required)              |
    /// | `WORKFLOW_TIMEOUT_SECS`      | `120`                   |
    /// | `GENERATION_MIN_LENGTH_SECS` | `10`                    |
    /// | `GENERATION_MAX_LENGTH_SECS` | `15`                    |
    /// | `PROGRESS_TICK_MILLIS`       | `1000`                  |
    /// | `DATABASE_URL`               | (unset: in-memory)      |
    ///
    /// Panics on malformed values so misconfiguration fails at startup.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "150".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let workflow_webhook_url =
            std::env::var("WORKFLOW_WEBHOOK_URL").expect("WORKFLOW_WEBHOOK_URL must be set");

        let workflow_timeout_secs: u64 = std::env::var("WORKFLOW_TIMEOUT_SECS")
            .unwrap_or_else(|_| "120".into())
            .parse()
            .expect("WORKFLOW_TIMEOUT_SECS must be a valid u64");

        let min_length: i32 = std::env::var("GENERATION_MIN_LENGTH_SECS")
            .map(|v| {
                v.parse()
                    .expect("GENERATION_MIN_LENGTH_SECS must be a valid i32")
            })
            .unwrap_or(DEFAULT_MIN_LENGTH_SECS);

        let max_length: i32 = std::env::var("GENERATION_MAX_LENGTH_SECS")
            .map(|v| {
                v.parse()
                    .expect("GENERATION_MAX_LENGTH_SECS must be a valid i32")
            })
            .unwrap_or(DEFAULT_MAX_LENGTH_SECS);

        let length_bounds = LengthBounds::new(min_length, max_length)
            .unwrap_or_else(|e| panic!("Invalid generation length bounds: {e}"));

        let progress_tick_millis: u64 = std::env::var("PROGRESS_TICK_MILLIS")
            .unwrap_or_else(|_| "1000".into())
            .parse()
            .expect("PROGRESS_TICK_MILLIS must be a valid u64");
        assert!(progress_tick_millis > 0, "PROGRESS_TICK_MILLIS must be positive");

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            workflow_webhook_url,
            workflow_timeout_secs,
            length_bounds,
            progress_tick: Duration::from_millis(progress_tick_millis),
            database_url,
        }
    }

    pub fn workflow_timeout(&self) -> Duration {
        Duration::from_secs(self.workflow_timeout_secs)
    }
}
