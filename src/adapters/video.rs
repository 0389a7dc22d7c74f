//! Video URL resolution through a rendered episode page.
//!
//! The episode page is rendered once in a remote browser. The result is then
//! checked by four strategies in a fixed order, and the first hit wins:
//!
//! 1. the value returned by the source's extraction script,
//! 2. network requests captured while the page loaded,
//! 3. the source's `matchVideoUrl` pattern run against the rendered HTML,
//! 4. `<iframe>` sources on the rendered page.
//!
//! Resolution never fails. Every outcome carries a trace of the
//! checkpoints it passed.

use super::{Diagnostics, VideoOutcome};
use crate::config::RENDERING_ENDPOINT_ENV;
use crate::html::{self, Document};
use crate::render::{DEFAULT_RENDER_HOST, RenderEndpoint, RenderPlan, RenderResult, Renderer};
use crate::source::MediaSource;
use crate::urls::{self, clean_scheme_duplication, looks_like_video};
use serde_json::{Value as JsonValue, json};
use std::borrow::Cow;
use tracing::{debug, info, warn};

/// Which check produced the video URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    Script,
    Network,
    HtmlPattern,
    Iframe,
}

impl Strategy {
    fn as_str(self) -> &'static str {
        match self {
            Strategy::Script => "script",
            Strategy::Network => "network",
            Strategy::HtmlPattern => "htmlPattern",
            Strategy::Iframe => "iframe",
        }
    }
}

/// Resolves episode pages to playable video URLs.
pub struct VideoResolver<'a> {
    renderer: &'a dyn Renderer,
    default_host: String,
    fallback_endpoint: Option<String>,
}

impl<'a> VideoResolver<'a> {
    /// Creates a resolver whose fallback endpoint comes from `BROWSERLESS_URL`.
    pub fn new(renderer: &'a dyn Renderer, default_host: &str) -> Self {
        let fallback_endpoint = std::env::var(RENDERING_ENDPOINT_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty());
        Self {
            renderer,
            default_host: default_host.to_string(),
            fallback_endpoint,
        }
    }

    /// Replaces the endpoint used when a call supplies none.
    pub fn with_fallback_endpoint(mut self, endpoint: Option<String>) -> Self {
        self.fallback_endpoint = endpoint.filter(|v| !v.trim().is_empty());
        self
    }

    /// Resolves `episode_url` using `endpoint`, or the fallback when absent.
    pub async fn resolve(
        &self,
        source: &MediaSource,
        episode_url: &str,
        endpoint: Option<&str>,
    ) -> VideoOutcome {
        let mut trace = Diagnostics::default();

        let provided = endpoint.map(str::trim).filter(|e| !e.is_empty());
        let (raw_endpoint, endpoint_kind) = match (provided, self.fallback_endpoint.as_deref()) {
            (Some(raw), _) => (raw, "user-provided"),
            (None, Some(raw)) => (raw, "system-default"),
            (None, None) => {
                debug!(url = episode_url, "No rendering endpoint, skipping video extraction");
                return VideoOutcome::unresolved(trace);
            }
        };

        let Some(origin) = urls::origin(episode_url) else {
            warn!(url = episode_url, "Episode URL has no origin");
            trace.push("invalidEpisodeUrl", json!({ "url": episode_url }));
            return VideoOutcome::unresolved(trace);
        };

        trace.push("browserAttemptStart", json!({ "endpoint": endpoint_kind }));

        let endpoint = match RenderEndpoint::parse(raw_endpoint, &self.default_host) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                warn!(error = %e, "Unusable rendering endpoint");
                trace.push("browserAttemptError", JsonValue::String(e.to_string()));
                return VideoOutcome::unresolved(trace);
            }
        };

        let matcher = source.search_config().match_video();
        let plan = RenderPlan::new(episode_url)
            .capture(matcher.capture_network_pattern.clone())
            .wait_for(matcher.wait_for_selector.clone())
            .settle(matcher.wait())
            .timeout(matcher.timeout())
            .script(matcher.extract_function.clone());

        let result = match self.renderer.render(&endpoint, &plan).await {
            Ok(result) => result,
            Err(e) => {
                warn!(source = source.name(), url = episode_url, error = %e, "Rendering failed");
                trace.push("browserAttemptError", JsonValue::String(e.to_string()));
                return VideoOutcome::unresolved(trace);
            }
        };

        trace.push(
            "browserResult",
            json!({
                "htmlLength": result.html.len(),
                "capturedCount": result.captured_urls.len(),
                "hasScriptResult": result.script_result.as_ref().is_some_and(|v| !v.is_null()),
            }),
        );

        match pick_video_url(&result, matcher.match_video_url.as_deref(), &origin) {
            Some((strategy, video_url)) => {
                info!(
                    source = source.name(),
                    url = episode_url,
                    strategy = strategy.as_str(),
                    video = %video_url,
                    "Video URL resolved"
                );
                trace.push("resolvedBy", json!({ "strategy": strategy.as_str() }));
                VideoOutcome::resolved(video_url, trace)
            }
            None => {
                info!(source = source.name(), url = episode_url, "No video URL found");
                trace.push("noVideoFound", JsonValue::Null);
                VideoOutcome::unresolved(trace)
            }
        }
    }
}

/// Resolves `episode_url` against the default rendering host.
///
/// `endpoint` may be a bare token or a full URL; without one the
/// `BROWSERLESS_URL` environment variable is used.
pub async fn extract_video_url(
    renderer: &dyn Renderer,
    source: &MediaSource,
    episode_url: &str,
    endpoint: Option<&str>,
) -> VideoOutcome {
    VideoResolver::new(renderer, DEFAULT_RENDER_HOST)
        .resolve(source, episode_url, endpoint)
        .await
}

fn pick_video_url(
    result: &RenderResult,
    pattern: Option<&str>,
    origin: &str,
) -> Option<(Strategy, String)> {
    if let Some(JsonValue::String(value)) = &result.script_result
        && (looks_like_video(value) || value.starts_with("http"))
    {
        return Some((Strategy::Script, clean_scheme_duplication(value)));
    }

    if let Some(captured) = result.captured_urls.iter().find(|u| looks_like_video(u)) {
        return Some((Strategy::Network, clean_scheme_duplication(captured)));
    }

    if let Some(pattern) = pattern.filter(|p| !p.trim().is_empty())
        && let Some(found) = urls::extract_first_match(&result.html, pattern)
    {
        let decoded = urlencoding::decode(&found)
            .map(Cow::into_owned)
            .unwrap_or(found);
        if decoded.starts_with("http") {
            return Some((Strategy::HtmlPattern, clean_scheme_duplication(&decoded)));
        }
    }

    iframe_video(&result.html, origin).map(|url| (Strategy::Iframe, url))
}

fn iframe_video(page: &str, origin: &str) -> Option<String> {
    let doc = Document::parse(page);
    let frames = doc.select_all("iframe").ok()?;
    frames
        .into_iter()
        .map(|frame| html::attr(Some(frame), "src"))
        .filter(|src| !src.trim().is_empty())
        .filter_map(|src| urls::resolve(&src, origin).ok())
        .find(|src| looks_like_video(src))
        .map(|src| clean_scheme_duplication(&src))
}
