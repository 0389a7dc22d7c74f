//! Facade over the adapters.
//!
//! [`MediaClient`] owns the collaborators the adapters take as parameters
//! (page fetcher, renderer, optional cache) and adds what the adapters
//! deliberately leave out: result caching, endpoint selection and fan-out
//! across several sources.

use crate::adapters::{
    self, AdapterOp, AdapterOutput, Diagnostics, Episode, SearchResult, VideoOutcome,
    VideoResolver,
};
use crate::cache::{self, Cache, MemoryCache};
use crate::config::{Config, RenderingConfig};
use crate::error::ScraperError;
use crate::fetch::{Fetcher, PageSource};
use crate::render::{RemoteRenderer, Renderer};
use crate::source::MediaSource;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Outcome of searching one source as part of [`MediaClient::search_all`].
#[derive(Debug)]
pub struct SourceSearch {
    pub source_name: String,
    pub results: Result<Vec<SearchResult>, ScraperError>,
}

/// Entry point for searching, listing episodes and resolving videos.
pub struct MediaClient {
    pages: Arc<dyn PageSource>,
    renderer: Arc<dyn Renderer>,
    cache: Option<Arc<dyn Cache>>,
    ttl: Duration,
    rendering: RenderingConfig,
    /// Outer `None` defers to `BROWSERLESS_URL`.
    fallback_endpoint: Option<Option<String>>,
}

impl MediaClient {
    /// Creates a client without a cache.
    pub fn new(
        pages: Arc<dyn PageSource>,
        renderer: Arc<dyn Renderer>,
        rendering: RenderingConfig,
    ) -> Self {
        Self {
            pages,
            renderer,
            cache: None,
            ttl: Duration::ZERO,
            rendering,
            fallback_endpoint: None,
        }
    }

    /// Builds the live client described by `config`.
    pub fn from_config(config: &Config) -> Result<Self, ScraperError> {
        let pages = Arc::new(Fetcher::new(config.fetch.clone())?);
        let renderer = Arc::new(RemoteRenderer::new(Duration::from_millis(
            config.rendering.grace_ms,
        ))?);
        let client = Self::new(pages, renderer, config.rendering.clone());

        Ok(if config.cache.enabled {
            client.with_cache(Arc::new(MemoryCache::new()), config.cache.ttl())
        } else {
            client
        })
    }

    /// Stores results in `cache` for `ttl`.
    pub fn with_cache(mut self, cache: Arc<dyn Cache>, ttl: Duration) -> Self {
        self.cache = Some(cache);
        self.ttl = ttl;
        self
    }

    /// Overrides the `BROWSERLESS_URL` fallback endpoint.
    pub fn with_fallback_endpoint(mut self, endpoint: Option<String>) -> Self {
        self.fallback_endpoint = Some(endpoint);
        self
    }

    /// Searches one source. See [`adapters::search`].
    pub async fn search(
        &self,
        source: &MediaSource,
        keyword: &str,
    ) -> Result<Vec<SearchResult>, ScraperError> {
        let key = cache::search_key(source.name(), keyword);
        if let Some(results) = self.cached::<Vec<SearchResult>>(&key) {
            return Ok(results);
        }

        let results = adapters::search(self.pages.as_ref(), source, keyword).await?;
        if !results.is_empty() {
            self.store(&key, &results);
        }
        Ok(results)
    }

    /// Lists episodes on a detail page. See [`adapters::get_episodes`].
    pub async fn episodes(
        &self,
        source: &MediaSource,
        detail_url: &str,
    ) -> Result<Vec<Episode>, ScraperError> {
        let key = cache::episodes_key(detail_url);
        if let Some(episodes) = self.cached::<Vec<Episode>>(&key) {
            return Ok(episodes);
        }

        let episodes = adapters::get_episodes(self.pages.as_ref(), source, detail_url).await?;
        if !episodes.is_empty() {
            self.store(&key, &episodes);
        }
        Ok(episodes)
    }

    /// Resolves the video behind an episode page.
    ///
    /// `endpoint` wins over the configured endpoints, which win over
    /// `BROWSERLESS_URL`.
    pub async fn extract_video(
        &self,
        source: &MediaSource,
        episode_url: &str,
        endpoint: Option<&str>,
    ) -> VideoOutcome {
        let key = cache::extract_key(episode_url);
        if let Some(video_url) = self.cached::<String>(&key) {
            let mut trace = Diagnostics::default();
            trace.push("cacheHit", json!({ "key": key }));
            return VideoOutcome::resolved(video_url, trace);
        }

        let endpoint = endpoint
            .filter(|e| !e.trim().is_empty())
            .or_else(|| self.rendering.pick_endpoint());

        let mut resolver = VideoResolver::new(self.renderer.as_ref(), &self.rendering.default_host);
        if let Some(fallback) = &self.fallback_endpoint {
            resolver = resolver.with_fallback_endpoint(fallback.clone());
        }

        let outcome = resolver.resolve(source, episode_url, endpoint).await;
        if let Some(video_url) = &outcome.video_url {
            self.store(&key, video_url);
        }
        outcome
    }

    /// Searches every source concurrently.
    ///
    /// Outcomes arrive in completion order. One source failing does not
    /// affect the others.
    pub async fn search_all(&self, sources: &[MediaSource], keyword: &str) -> Vec<SourceSearch> {
        let mut pending: FuturesUnordered<_> = sources
            .iter()
            .map(|source| async move {
                SourceSearch {
                    source_name: source.name().to_string(),
                    results: self.search(source, keyword).await,
                }
            })
            .collect();

        let mut outcomes = Vec::with_capacity(sources.len());
        while let Some(outcome) = pending.next().await {
            debug!(source = %outcome.source_name, ok = outcome.results.is_ok(), "Source finished");
            outcomes.push(outcome);
        }
        info!(sources = sources.len(), keyword, "Multi-source search complete");
        outcomes
    }

    /// Runs one operation.
    pub async fn execute(&self, op: AdapterOp) -> Result<AdapterOutput, ScraperError> {
        match op {
            AdapterOp::Search { source, keyword } => {
                self.search(&source, &keyword).await.map(AdapterOutput::Search)
            }
            AdapterOp::Episodes { source, detail_url } => self
                .episodes(&source, &detail_url)
                .await
                .map(AdapterOutput::Episodes),
            AdapterOp::ExtractVideo {
                source,
                episode_url,
                endpoint,
            } => Ok(AdapterOutput::ExtractVideo(
                self.extract_video(&source, &episode_url, endpoint.as_deref())
                    .await,
            )),
        }
    }

    fn cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.cache.as_ref()?.get(key)?;
        serde_json::from_value(value).ok()
    }

    fn store<T: Serialize>(&self, key: &str, value: &T) {
        if let Some(cache) = &self.cache
            && let Ok(value) = serde_json::to_value(value)
        {
            cache.set(key, value, self.ttl);
        }
    }
}
