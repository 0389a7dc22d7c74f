//! Resilient page fetching for target sites.
//!
//! Every attempt goes out with a randomly chosen browser User-Agent and a
//! browser-like header set. Failed attempts (transport error, non-success
//! status, blank body) are retried with exponential backoff plus jitter.

use crate::config::FetchConfig;
use crate::error::ScraperError;
use async_trait::async_trait;
use rand::Rng;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use std::time::Duration;
use tracing::{debug, warn};

/// Desktop browser identities rotated across attempts.
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:122.0) Gecko/20100101 Firefox/122.0",
];

/// Anything that can hand back the text of a page.
///
/// Adapters take this as a parameter so they can run against a live site
/// or an in-memory page set.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetches `url`, letting `extra_headers` override the defaults.
    async fn fetch_text(
        &self,
        url: &str,
        extra_headers: &HeaderMap,
    ) -> Result<String, ScraperError>;

    /// Fetches `url` with the default headers only.
    async fn fetch_page(&self, url: &str) -> Result<String, ScraperError> {
        self.fetch_text(url, &HeaderMap::new()).await
    }
}

/// Common HTTP client configuration for target sites.
pub fn create_http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().cookie_store(true).build()
}

/// Picks one of [`USER_AGENTS`] uniformly at random.
pub fn random_user_agent() -> &'static str {
    USER_AGENTS[rand::rng().random_range(0..USER_AGENTS.len())]
}

/// HTTP fetcher with retry and backoff.
#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    config: FetchConfig,
}

impl Fetcher {
    /// Creates a fetcher with its own HTTP client.
    pub fn new(config: FetchConfig) -> Result<Self, ScraperError> {
        Ok(Self::with_client(create_http_client()?, config))
    }

    /// Creates a fetcher sharing an existing client.
    pub fn with_client(client: reqwest::Client, config: FetchConfig) -> Self {
        Self { client, config }
    }

    /// Browser-like defaults for one attempt.
    fn default_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(random_user_agent()));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        if let Ok(lang) = HeaderValue::from_str(&self.config.accept_language) {
            headers.insert(ACCEPT_LANGUAGE, lang);
        }
        headers.insert(HeaderName::from_static("dnt"), HeaderValue::from_static("1"));
        headers.insert(
            HeaderName::from_static("upgrade-insecure-requests"),
            HeaderValue::from_static("1"),
        );
        headers
    }

    /// Delay after the failed attempt with zero-based index `attempt`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self
            .config
            .backoff_base_ms
            .saturating_mul(2u64.saturating_pow(attempt));
        let jitter = rand::rng().random_range(0..=self.config.jitter_ms);
        Duration::from_millis(base.saturating_add(jitter))
    }

    /// Performs a single attempt, describing any failure as a message.
    async fn attempt(&self, url: &str, extra_headers: &HeaderMap) -> Result<String, String> {
        let mut headers = self.default_headers();
        for (name, value) in extra_headers {
            headers.insert(name.clone(), value.clone());
        }

        let response = self
            .client
            .get(url)
            .headers(headers)
            .timeout(self.config.timeout())
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status));
        }

        let text = response.text().await.map_err(|e| e.to_string())?;
        if text.trim().is_empty() {
            return Err("Empty response".to_string());
        }

        Ok(text)
    }
}

#[async_trait]
impl PageSource for Fetcher {
    async fn fetch_text(
        &self,
        url: &str,
        extra_headers: &HeaderMap,
    ) -> Result<String, ScraperError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 0..max_attempts {
            match self.attempt(url, extra_headers).await {
                Ok(text) => {
                    debug!(url, attempt = attempt + 1, bytes = text.len(), "Fetched page");
                    return Ok(text);
                }
                Err(e) => {
                    last_error = e;
                    if attempt + 1 < max_attempts {
                        let delay = self.backoff_delay(attempt);
                        warn!(
                            url,
                            attempt = attempt + 1,
                            max_attempts,
                            error = %last_error,
                            "Fetch failed, retrying in {:?}",
                            delay
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        warn!(url, max_attempts, error = %last_error, "Fetch attempts exhausted");
        Err(ScraperError::FetchExhausted {
            url: url.to_string(),
            attempts: max_attempts,
            message: last_error,
        })
    }
}
