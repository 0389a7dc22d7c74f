//! Client for the remote headless-browser service.
//!
//! The service runs a fixed procedure that walks a list of declarative
//! steps (intercept, navigate, wait, sleep, evaluate, capture) sent in the
//! request context. Only the step list varies between calls; the procedure
//! itself is a constant.

use crate::error::ScraperError;
use crate::utils::check_response_status;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// User-Agent the remote browser presents to the target site.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

/// Host addressed when an endpoint is given as a bare token.
pub const DEFAULT_RENDER_HOST: &str = "https://chrome.browserless.io";

/// Bound on the optional wait-for-selector step.
const WAIT_FOR_SELECTOR_MS: u64 = 5000;

/// Remote procedure executed by the `/function` endpoint.
const FUNCTION_SOURCE: &str = r#"export default async ({ page, context }) => {
  const capturedUrls = [];
  let scriptResult = null;
  let html = '';
  for (const step of context.steps) {
    switch (step.op) {
      case 'setUserAgent':
        await page.setUserAgent(step.userAgent);
        break;
      case 'interceptRequests': {
        let pattern = null;
        try { pattern = step.pattern ? new RegExp(step.pattern, 'i') : null; } catch (e) {}
        await page.setRequestInterception(true);
        page.on('request', (request) => {
          const u = request.url();
          const hit = pattern
            ? pattern.test(u)
            : (u.includes('.m3u8') || u.includes('.mp4') || u.includes('.ts'));
          if (hit) capturedUrls.push(u);
          request.continue();
        });
        break;
      }
      case 'navigate':
        try { await page.goto(step.url, { waitUntil: 'networkidle2', timeout: step.timeoutMs }); } catch (e) {}
        break;
      case 'waitForSelector':
        try { await page.waitForSelector(step.selector, { timeout: step.timeoutMs }); } catch (e) {}
        break;
      case 'sleep':
        await new Promise((resolve) => setTimeout(resolve, step.ms));
        break;
      case 'evaluate':
        try {
          scriptResult = await page.evaluate((s) => {
            try { return eval('(function() { ' + s + ' })()'); } catch (e) { return null; }
          }, step.script);
        } catch (e) { scriptResult = null; }
        break;
      case 'captureHtml':
        html = await page.content();
        break;
    }
  }
  return { html, capturedUrls, scriptResult };
};"#;

/// Address of a rendering service.
///
/// Accepts either a bare token, addressed against the default host, or a
/// full endpoint URL. `ws://` and `wss://` are rewritten to their HTTP
/// equivalents since the service is called over plain HTTP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderEndpoint {
    base: Url,
}

impl RenderEndpoint {
    pub fn parse(raw: &str, default_host: &str) -> Result<Self, ScraperError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ScraperError::InvalidUrl("empty rendering endpoint".to_string()));
        }

        let base = if raw.contains("://") {
            let normalized = if let Some(rest) = raw.strip_prefix("wss://") {
                format!("https://{rest}")
            } else if let Some(rest) = raw.strip_prefix("ws://") {
                format!("http://{rest}")
            } else {
                raw.to_string()
            };
            let url = Url::parse(&normalized)
                .map_err(|e| ScraperError::InvalidUrl(format!("{raw}: {e}")))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ScraperError::InvalidUrl(format!(
                    "{raw}: unsupported scheme '{}'",
                    url.scheme()
                )));
            }
            url
        } else {
            let mut url = Url::parse(default_host)
                .map_err(|e| ScraperError::InvalidUrl(format!("{default_host}: {e}")))?;
            url.query_pairs_mut().append_pair("token", raw);
            url
        };

        Ok(Self { base })
    }

    /// Builds the URL for `path`, replacing any existing values of `params`.
    pub fn url_for(&self, path: &str, params: &[(&str, String)]) -> Url {
        let mut url = self.base.clone();
        url.set_path(path);

        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !params.iter().any(|(name, _)| &**key == *name))
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        url.set_query(None);
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in &kept {
                query.append_pair(key, value);
            }
            for (key, value) in params {
                query.append_pair(key, value);
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }
        url
    }
}

/// One declarative instruction for the remote browser.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RenderStep {
    SetUserAgent { user_agent: String },
    /// Record request URLs matching `pattern` (or a video default) without blocking them.
    InterceptRequests { pattern: Option<String> },
    /// Navigation errors and timeouts are tolerated.
    Navigate { url: String, timeout_ms: u64 },
    WaitForSelector { selector: String, timeout_ms: u64 },
    Sleep { ms: u64 },
    /// Evaluation errors yield a null script result.
    Evaluate { script: String },
    CaptureHtml,
}

/// What to do with an episode page in the remote browser.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPlan {
    pub url: String,
    pub capture_pattern: Option<String>,
    pub wait_for: Option<String>,
    pub settle: Duration,
    pub timeout: Duration,
    pub script: Option<String>,
}

impl RenderPlan {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            capture_pattern: None,
            wait_for: None,
            settle: Duration::ZERO,
            timeout: Duration::from_millis(crate::source::DEFAULT_TIMEOUT_MS),
            script: None,
        }
    }

    pub fn capture(mut self, pattern: Option<String>) -> Self {
        self.capture_pattern = pattern.filter(|p| !p.trim().is_empty());
        self
    }

    pub fn wait_for(mut self, selector: Option<String>) -> Self {
        self.wait_for = selector.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn script(mut self, script: Option<String>) -> Self {
        self.script = script.filter(|s| !s.trim().is_empty());
        self
    }

    /// The step list in execution order.
    pub fn steps(&self) -> Vec<RenderStep> {
        let mut steps = vec![
            RenderStep::SetUserAgent {
                user_agent: BROWSER_USER_AGENT.to_string(),
            },
            RenderStep::InterceptRequests {
                pattern: self.capture_pattern.clone(),
            },
            RenderStep::Navigate {
                url: self.url.clone(),
                timeout_ms: self.timeout.as_millis() as u64,
            },
        ];
        if let Some(selector) = &self.wait_for {
            steps.push(RenderStep::WaitForSelector {
                selector: selector.clone(),
                timeout_ms: WAIT_FOR_SELECTOR_MS,
            });
        }
        if !self.settle.is_zero() {
            steps.push(RenderStep::Sleep {
                ms: self.settle.as_millis() as u64,
            });
        }
        if let Some(script) = &self.script {
            steps.push(RenderStep::Evaluate {
                script: script.clone(),
            });
        }
        steps.push(RenderStep::CaptureHtml);
        steps
    }
}

/// What the remote browser saw.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderResult {
    #[serde(default)]
    pub html: String,
    /// Matching request URLs in the order the browser issued them.
    #[serde(default)]
    pub captured_urls: Vec<String>,
    #[serde(default)]
    pub script_result: Option<JsonValue>,
}

#[derive(Serialize)]
struct FunctionRequest<'a> {
    code: &'a str,
    context: FunctionContext,
}

#[derive(Serialize)]
struct FunctionContext {
    steps: Vec<RenderStep>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ContentRequest<'a> {
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    wait_for_selector: Option<&'a str>,
}

/// Executes render plans somewhere.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(
        &self,
        endpoint: &RenderEndpoint,
        plan: &RenderPlan,
    ) -> Result<RenderResult, ScraperError>;
}

/// Renderer backed by a browserless-compatible HTTP service.
#[derive(Clone)]
pub struct RemoteRenderer {
    client: reqwest::Client,
    grace: Duration,
}

impl RemoteRenderer {
    pub fn new(grace: Duration) -> Result<Self, ScraperError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self::with_client(client, grace))
    }

    pub fn with_client(client: reqwest::Client, grace: Duration) -> Self {
        Self { client, grace }
    }

    /// Renders `url` through the simple `/content` endpoint and returns its HTML.
    pub async fn render_content(
        &self,
        endpoint: &RenderEndpoint,
        url: &str,
        wait_for: Option<&str>,
        timeout: Duration,
    ) -> Result<String, ScraperError> {
        let target = endpoint.url_for("/content", &[("timeout", timeout.as_millis().to_string())]);
        let response = self
            .client
            .post(target)
            .timeout(timeout + self.grace)
            .json(&ContentRequest {
                url,
                wait_for_selector: wait_for,
            })
            .send()
            .await?;

        let response = check_response_status(response).await?;
        Ok(response.text().await?)
    }
}

#[async_trait]
impl Renderer for RemoteRenderer {
    async fn render(
        &self,
        endpoint: &RenderEndpoint,
        plan: &RenderPlan,
    ) -> Result<RenderResult, ScraperError> {
        let budget = plan.timeout + self.grace;
        let target = endpoint.url_for("/function", &[("timeout", budget.as_millis().to_string())]);
        let steps = plan.steps();
        debug!(url = %plan.url, steps = steps.len(), "Sending render plan");

        let response = self
            .client
            .post(target)
            .timeout(budget)
            .json(&FunctionRequest {
                code: FUNCTION_SOURCE,
                context: FunctionContext { steps },
            })
            .send()
            .await?;

        let response = check_response_status(response).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ScraperError::Parse(format!("Invalid render result: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    const DEFAULT_HOST: &str = "https://chrome.browserless.io";

    #[test]
    fn test_endpoint_from_token() {
        let endpoint = RenderEndpoint::parse("abc123", DEFAULT_HOST).unwrap();
        let url = endpoint.url_for("/function", &[("timeout", "35000".to_string())]);
        assert_eq!(
            url.as_str(),
            "https://chrome.browserless.io/function?token=abc123&timeout=35000"
        );
    }

    #[test]
    fn test_endpoint_from_websocket_url() {
        let endpoint =
            RenderEndpoint::parse("wss://render.example:3000/?token=t&timeout=1", DEFAULT_HOST)
                .unwrap();
        let url = endpoint.url_for("/content", &[("timeout", "30000".to_string())]);
        assert_eq!(
            url.as_str(),
            "https://render.example:3000/content?token=t&timeout=30000"
        );

        let endpoint = RenderEndpoint::parse("ws://localhost:3000", DEFAULT_HOST).unwrap();
        assert_eq!(
            endpoint.url_for("/function", &[]).as_str(),
            "http://localhost:3000/function"
        );
    }

    #[test]
    fn test_endpoint_rejects_garbage() {
        assert!(RenderEndpoint::parse("", DEFAULT_HOST).is_err());
        assert!(RenderEndpoint::parse("http://", DEFAULT_HOST).is_err());
        assert!(RenderEndpoint::parse("ftp://render.example", DEFAULT_HOST).is_err());
    }

    #[test]
    fn test_plan_steps_minimal() {
        let steps = RenderPlan::new("https://site.test/ep/1").steps();
        assert_eq!(steps.len(), 4);
        assert!(matches!(steps[0], RenderStep::SetUserAgent { .. }));
        assert_eq!(steps[1], RenderStep::InterceptRequests { pattern: None });
        assert_eq!(
            steps[2],
            RenderStep::Navigate {
                url: "https://site.test/ep/1".to_string(),
                timeout_ms: 30000
            }
        );
        assert_eq!(steps[3], RenderStep::CaptureHtml);
    }

    #[test]
    fn test_plan_steps_full_order() {
        let plan = RenderPlan::new("https://site.test/ep/1")
            .capture(Some(r"\.m3u8".to_string()))
            .wait_for(Some("#player".to_string()))
            .settle(Duration::from_millis(5000))
            .timeout(Duration::from_millis(20000))
            .script(Some("return window.url;".to_string()));

        let ops: Vec<String> = plan
            .steps()
            .iter()
            .map(|s| serde_json::to_value(s).unwrap()["op"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            ops,
            [
                "setUserAgent",
                "interceptRequests",
                "navigate",
                "waitForSelector",
                "sleep",
                "evaluate",
                "captureHtml"
            ]
        );
    }

    #[test]
    fn test_blank_options_are_dropped() {
        let plan = RenderPlan::new("https://site.test/")
            .capture(Some(" ".to_string()))
            .wait_for(Some(String::new()))
            .script(Some("  ".to_string()));
        assert_eq!(plan.capture_pattern, None);
        assert_eq!(plan.wait_for, None);
        assert_eq!(plan.script, None);
    }

    #[test]
    fn test_step_wire_format() {
        let value = serde_json::to_value(RenderStep::Navigate {
            url: "https://site.test/".to_string(),
            timeout_ms: 1000,
        })
        .unwrap();
        assert_eq!(
            value,
            json!({"op": "navigate", "url": "https://site.test/", "timeoutMs": 1000})
        );
    }

    #[tokio::test]
    async fn test_render_posts_plan() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/function")
                    .query_param("token", "tok")
                    .query_param("timeout", "25000")
                    .body_contains("export default async")
                    .body_contains(r#""op":"navigate""#)
                    .body_contains(r#""url":"https://site.test/ep/1""#);
                then.status(200).json_body(json!({
                    "html": "<html></html>",
                    "capturedUrls": ["https://cdn.test/a.m3u8"],
                    "scriptResult": null
                }));
            })
            .await;

        let endpoint =
            RenderEndpoint::parse(&format!("{}/?token=tok", server.base_url()), DEFAULT_HOST)
                .unwrap();
        let renderer = RemoteRenderer::new(Duration::from_millis(5000)).unwrap();
        let plan = RenderPlan::new("https://site.test/ep/1").timeout(Duration::from_millis(20000));

        let result = renderer.render(&endpoint, &plan).await.unwrap();
        mock.assert_async().await;
        assert_eq!(result.html, "<html></html>");
        assert_eq!(result.captured_urls, vec!["https://cdn.test/a.m3u8"]);
        assert_eq!(result.script_result, None);
    }

    #[tokio::test]
    async fn test_render_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/function");
                then.status(429).body("too many sessions");
            })
            .await;

        let endpoint = RenderEndpoint::parse(&server.base_url(), DEFAULT_HOST).unwrap();
        let renderer = RemoteRenderer::new(Duration::from_millis(100)).unwrap();
        let err = renderer
            .render(&endpoint, &RenderPlan::new("https://site.test/"))
            .await
            .unwrap_err();

        match err {
            ScraperError::RenderingService { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body, "too many sessions");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_render_content() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/content")
                    .query_param("timeout", "30000")
                    .json_body(json!({"url": "https://site.test/", "waitForSelector": "#list"}));
                then.status(200).body("<html>rendered</html>");
            })
            .await;

        let endpoint = RenderEndpoint::parse(&server.base_url(), DEFAULT_HOST).unwrap();
        let renderer = RemoteRenderer::new(Duration::from_millis(100)).unwrap();
        let html = renderer
            .render_content(
                &endpoint,
                "https://site.test/",
                Some("#list"),
                Duration::from_millis(30000),
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(html, "<html>rendered</html>");
    }

    #[tokio::test]
    async fn test_render_gives_up_after_timeout_plus_grace() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/function");
                then.status(200)
                    .json_body(json!({"html": "<html></html>", "capturedUrls": []}))
                    .delay(Duration::from_secs(3));
            })
            .await;

        let endpoint = RenderEndpoint::parse(&server.base_url(), DEFAULT_HOST).unwrap();
        let renderer = RemoteRenderer::new(Duration::from_millis(100)).unwrap();
        let plan = RenderPlan::new("https://site.test/").timeout(Duration::from_millis(200));

        let started = std::time::Instant::now();
        let err = renderer.render(&endpoint, &plan).await.unwrap_err();

        match err {
            ScraperError::Http(e) => assert!(e.is_timeout(), "not a timeout: {e}"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(mock.hits_async().await, 1);
    }
}
