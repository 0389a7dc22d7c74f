//! Site adapters driven entirely by media source configuration.
//!
//! This module defines the records the adapters produce and the closed set
//! of operations a caller can ask for. Each operation lives in its own
//! submodule and is a free async function taking its collaborators
//! explicitly; none of them keeps state between calls.

mod episodes;
mod search;
mod video;

pub use episodes::get_episodes;
pub use search::{MAX_SEARCH_RESULTS, search};
pub use video::{VideoResolver, extract_video_url};

use crate::source::MediaSource;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// One candidate title found on a site's search page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Name of the media source that produced this result.
    pub source_name: String,

    /// Identifier generated at search time.
    pub source_id: String,

    pub title: String,

    /// Absolute URL of the detail page.
    pub url: String,

    /// Always empty from search; filled by callers after [`get_episodes`].
    pub episodes: Vec<Episode>,
}

/// One playable episode link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub title: String,

    /// Absolute URL of the episode page.
    pub url: String,

    /// Best-effort numeric label. Not unique, not dense.
    pub sort: String,
}

/// A labelled checkpoint reached while resolving a video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticStep {
    pub label: String,
    #[serde(default, skip_serializing_if = "JsonValue::is_null")]
    pub data: JsonValue,
}

/// Checkpoints in the order they were reached.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub steps: Vec<DiagnosticStep>,
}

impl Diagnostics {
    pub fn push(&mut self, label: &str, data: JsonValue) {
        self.steps.push(DiagnosticStep {
            label: label.to_string(),
            data,
        });
    }

    pub fn labels(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.label.as_str()).collect()
    }
}

/// Result of a video resolution attempt. Never an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoOutcome {
    pub video_url: Option<String>,
    pub debug: Diagnostics,
}

impl VideoOutcome {
    pub fn resolved(url: String, debug: Diagnostics) -> Self {
        Self {
            video_url: Some(url),
            debug,
        }
    }

    pub fn unresolved(debug: Diagnostics) -> Self {
        Self {
            video_url: None,
            debug,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.video_url.is_some()
    }
}

/// Everything a caller can ask of a media source.
#[derive(Debug, Clone)]
pub enum AdapterOp {
    Search {
        source: MediaSource,
        keyword: String,
    },
    Episodes {
        source: MediaSource,
        detail_url: String,
    },
    ExtractVideo {
        source: MediaSource,
        episode_url: String,
        /// Rendering endpoint for this call; falls back to configuration.
        endpoint: Option<String>,
    },
}

/// The answer to an [`AdapterOp`], variant for variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AdapterOutput {
    Search(Vec<SearchResult>),
    Episodes(Vec<Episode>),
    ExtractVideo(VideoOutcome),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_search_result_wire_names() {
        let result = SearchResult {
            source_name: "Example".to_string(),
            source_id: "abc".to_string(),
            title: "Show A".to_string(),
            url: "https://example.test/v/1".to_string(),
            episodes: Vec::new(),
        };
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "sourceName": "Example",
                "sourceId": "abc",
                "title": "Show A",
                "url": "https://example.test/v/1",
                "episodes": []
            })
        );
    }

    #[test]
    fn test_outcome_wire_shape() {
        let mut debug = Diagnostics::default();
        debug.push("browserAttemptStart", json!({"endpoint": "user-provided"}));
        debug.push("noVideoFound", JsonValue::Null);
        let outcome = VideoOutcome::unresolved(debug);

        assert!(!outcome.is_resolved());
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({
                "videoUrl": null,
                "debug": {"steps": [
                    {"label": "browserAttemptStart", "data": {"endpoint": "user-provided"}},
                    {"label": "noVideoFound"}
                ]}
            })
        );
    }
}
