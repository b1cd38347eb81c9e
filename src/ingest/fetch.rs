// src/ingest/fetch.rs
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::config::FetchConfig;
use crate::error::FetchError;

const USER_AGENT: &str = concat!("fx-rate-watcher/", env!("CARGO_PKG_VERSION"));

/// Retrieves raw markup from a URL. Outcome logging is left to the caller.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Option<Duration>,
    max_retries: u8,
}

impl HttpFetcher {
    pub fn new(cfg: &FetchConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self {
            client,
            timeout: cfg.timeout(),
            max_retries: cfg.max_retries,
        })
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries;
        self
    }

    /// Total requests per fetch: the first one plus every retry.
    fn attempts(&self) -> u32 {
        u32::from(self.max_retries) + 1
    }

    async fn attempt(&self, url: &str) -> Result<String, FetchError> {
        let mut req = self.client.get(url);
        if let Some(t) = self.timeout {
            req = req.timeout(t);
        }

        let rsp = req.send().await.map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })?;

        let status = rsp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        rsp.text().await.map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let attempts = self.attempts();
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.attempt(url).await {
                Ok(body) => return Ok(body),
                Err(e) if attempt < attempts => {
                    let backoff = backoff(attempt);
                    tracing::debug!(
                        target: "ingest",
                        error = %e,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        "fetch attempt failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// 500 ms, 1 s, 2 s, ... capped at 32 s.
fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(500u64 << attempt.saturating_sub(1).min(6))
}
