//! Declarative media source configuration.
//!
//! A media source describes one third-party site: how to build its search
//! URL, which selectors find results and episodes, and how to pull a video
//! URL out of an episode page. The JSON shape follows the exported media
//! source documents, so field names are camelCase and almost everything is
//! optional. [`SearchConfig::subject_format`] and
//! [`SearchConfig::channel_plan`] turn the string tags into closed enums
//! before any page is fetched.

use crate::error::{ConfigError, ScraperError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Placeholder substituted in `searchUrl`.
pub const KEYWORD_PLACEHOLDER: &str = "{keyword}";

/// Default settle time after navigation.
pub const DEFAULT_WAIT_MS: u64 = 5000;

/// Default navigation timeout inside the remote browser.
pub const DEFAULT_TIMEOUT_MS: u64 = 30000;

/// One configured site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaSource {
    #[serde(default)]
    pub factory_id: String,
    #[serde(default)]
    pub version: u32,
    pub arguments: MediaSourceArguments,
}

impl MediaSource {
    /// Display name used to tag results.
    pub fn name(&self) -> &str {
        &self.arguments.name
    }

    /// Site interpretation rules.
    pub fn search_config(&self) -> &SearchConfig {
        &self.arguments.search_config
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaSourceArguments {
    pub name: String,
    #[serde(default)]
    pub icon_url: Option<String>,
    #[serde(default)]
    pub search_config: SearchConfig,
    #[serde(default)]
    pub tier: Option<u32>,
}

/// Raw site rules as they appear in the JSON document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchConfig {
    pub search_url: Option<String>,
    pub search_use_only_first_word: bool,
    pub subject_format_id: String,
    pub selector_subject_format_a: Option<SubjectFormatASelectors>,
    pub selector_subject_format_indexed: Option<SubjectFormatIndexedSelectors>,
    pub channel_format_id: String,
    pub selector_channel_format_flattened: Option<ChannelFormatFlattenedSelectors>,
    pub selector_channel_format_no_channel: Option<ChannelFormatNoChannelSelectors>,
    pub match_video: Option<MatchVideo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubjectFormatASelectors {
    pub select_lists: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubjectFormatIndexedSelectors {
    pub select_names: String,
    pub select_links: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelFormatFlattenedSelectors {
    pub select_episode_lists: String,
    pub select_episodes_from_list: String,
    pub match_episode_sort_from_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelFormatNoChannelSelectors {
    pub select_episodes: String,
    pub match_episode_sort_from_name: Option<String>,
}

/// Video resolution parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MatchVideo {
    pub match_video_url: Option<String>,
    pub wait_for_selector: Option<String>,
    pub wait_ms: Option<u64>,
    pub timeout: Option<u64>,
    pub capture_network_pattern: Option<String>,
    pub extract_function: Option<String>,
}

impl MatchVideo {
    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms.filter(|ms| *ms > 0).unwrap_or(DEFAULT_WAIT_MS))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout.filter(|ms| *ms > 0).unwrap_or(DEFAULT_TIMEOUT_MS))
    }
}

/// How search results are laid out on the results page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectFormat {
    /// One selector yielding anchors carrying both title and link.
    Anchors { lists: String },
    /// Parallel name and link selectors, zipped by position.
    Indexed { names: String, links: String },
    /// A tag this crate does not know; searches yield nothing.
    Unsupported(String),
}

/// Selectors for one way of listing episodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeSelectors {
    pub items: String,
    pub sort_pattern: Option<String>,
}

/// Where episode links are found on a detail page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPlan {
    /// Episode containers plus the item selector applied inside them.
    pub grouped: Option<(String, EpisodeSelectors)>,
    /// Whole-document item selector, used when the grouped pass finds nothing.
    pub flat: Option<EpisodeSelectors>,
}

impl SearchConfig {
    /// The `searchUrl` template.
    pub fn search_url_template(&self) -> Result<&str, ScraperError> {
        self.search_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ScraperError::Config("searchUrl is required".to_string()))
    }

    /// Builds the search URL for `keyword`.
    pub fn build_search_url(&self, keyword: &str) -> Result<String, ScraperError> {
        let template = self.search_url_template()?;
        let keyword = if self.search_use_only_first_word {
            first_word(keyword)
        } else {
            keyword
        };
        Ok(template.replacen(KEYWORD_PLACEHOLDER, &urlencoding::encode(keyword), 1))
    }

    /// Resolves `subjectFormatId` and its selector block.
    pub fn subject_format(&self) -> Result<SubjectFormat, ScraperError> {
        match self.subject_format_id.as_str() {
            "a" => {
                let lists = self
                    .selector_subject_format_a
                    .as_ref()
                    .map(|s| s.select_lists.trim())
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| {
                        ScraperError::Config(
                            "selectorSubjectFormatA.selectLists is required for format 'a'"
                                .to_string(),
                        )
                    })?;
                Ok(SubjectFormat::Anchors {
                    lists: lists.to_string(),
                })
            }
            "indexed" => {
                let selectors = self
                    .selector_subject_format_indexed
                    .as_ref()
                    .filter(|s| {
                        !s.select_names.trim().is_empty() && !s.select_links.trim().is_empty()
                    })
                    .ok_or_else(|| {
                        ScraperError::Config(
                            "selectorSubjectFormatIndexed.selectNames and selectLinks are required for format 'indexed'"
                                .to_string(),
                        )
                    })?;
                Ok(SubjectFormat::Indexed {
                    names: selectors.select_names.trim().to_string(),
                    links: selectors.select_links.trim().to_string(),
                })
            }
            other => Ok(SubjectFormat::Unsupported(other.to_string())),
        }
    }

    /// Resolves `channelFormatId` and the episode selector blocks.
    pub fn channel_plan(&self) -> Result<ChannelPlan, ScraperError> {
        let flat = self
            .selector_channel_format_no_channel
            .as_ref()
            .filter(|s| !s.select_episodes.trim().is_empty())
            .map(|s| EpisodeSelectors {
                items: s.select_episodes.trim().to_string(),
                sort_pattern: s.match_episode_sort_from_name.clone(),
            });

        match self.channel_format_id.as_str() {
            "flattened" | "index-grouped" => {
                let grouped = self.selector_channel_format_flattened.as_ref().filter(|s| {
                    !s.select_episode_lists.trim().is_empty()
                        && !s.select_episodes_from_list.trim().is_empty()
                });
                let Some(selectors) = grouped else {
                    if flat.is_some() {
                        warn!(
                            channel_format = %self.channel_format_id,
                            "Grouped episode selectors missing, only the flat selector will be tried"
                        );
                        return Ok(ChannelPlan {
                            grouped: None,
                            flat,
                        });
                    }
                    return Err(ScraperError::Config(format!(
                        "selectorChannelFormatFlattened.selectEpisodeLists and selectEpisodesFromList are required for format '{}'",
                        self.channel_format_id
                    )));
                };
                Ok(ChannelPlan {
                    grouped: Some((
                        selectors.select_episode_lists.trim().to_string(),
                        EpisodeSelectors {
                            items: selectors.select_episodes_from_list.trim().to_string(),
                            sort_pattern: selectors.match_episode_sort_from_name.clone(),
                        },
                    )),
                    flat,
                })
            }
            "no-channel" => {
                if flat.is_none() {
                    return Err(ScraperError::Config(
                        "selectorChannelFormatNoChannel.selectEpisodes is required for format 'no-channel'"
                            .to_string(),
                    ));
                }
                Ok(ChannelPlan {
                    grouped: None,
                    flat,
                })
            }
            other => {
                warn!(
                    channel_format = other,
                    "Unrecognized channel format, only the flat episode selector will be tried"
                );
                Ok(ChannelPlan {
                    grouped: None,
                    flat,
                })
            }
        }
    }

    /// Video parameters, defaulted when the block is absent.
    pub fn match_video(&self) -> MatchVideo {
        self.match_video.clone().unwrap_or_default()
    }
}

/// First token of a keyword split on ASCII and full-width spaces.
pub fn first_word(keyword: &str) -> &str {
    keyword
        .split([' ', '\u{3000}'])
        .find(|part| !part.is_empty())
        .unwrap_or("")
}

/// The set of configured sources.
#[derive(Debug, Clone, Default)]
pub struct SourceList {
    sources: Vec<MediaSource>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SourceDocument {
    Exported {
        #[serde(rename = "exportedMediaSourceDataList")]
        exported: ExportedSources,
    },
    Bare(Vec<MediaSource>),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportedSources {
    #[serde(default)]
    media_sources: Vec<MediaSource>,
}

impl SourceList {
    pub fn new(sources: Vec<MediaSource>) -> Self {
        Self { sources }
    }

    /// Parses an exported document or a bare JSON array of sources.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let sources = match serde_json::from_str::<SourceDocument>(json)? {
            SourceDocument::Exported { exported } => exported.media_sources,
            SourceDocument::Bare(sources) => sources,
        };
        Ok(Self { sources })
    }

    /// Reads and parses a source document from disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Finds a source by display name.
    pub fn find(&self, name: &str) -> Option<&MediaSource> {
        self.sources.iter().find(|s| s.name() == name)
    }

    pub fn all(&self) -> &[MediaSource] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORTED: &str = r##"{
        "exportedMediaSourceDataList": {
            "mediaSources": [{
                "factoryId": "web-selector",
                "version": 2,
                "arguments": {
                    "name": "Example",
                    "searchConfig": {
                        "searchUrl": "https://example.test/s?q={keyword}",
                        "searchUseOnlyFirstWord": true,
                        "subjectFormatId": "a",
                        "selectorSubjectFormatA": { "selectLists": "a.result-link" },
                        "channelFormatId": "index-grouped",
                        "selectorChannelFormatFlattened": {
                            "selectChannelNames": ".tab",
                            "matchChannelName": "(.*)",
                            "selectEpisodeLists": ".playlist",
                            "selectEpisodesFromList": "a"
                        },
                        "selectorChannelFormatNoChannel": { "selectEpisodes": ".eps a" },
                        "matchVideo": {
                            "matchVideoUrl": "(?<v>https?://.+\\.m3u8)",
                            "enableNestedUrl": false,
                            "waitMs": 1500
                        }
                    }
                }
            }]
        }
    }"##;

    fn config_with(subject: &str, channel: &str) -> SearchConfig {
        SearchConfig {
            search_url: Some("https://example.test/s?q={keyword}".to_string()),
            subject_format_id: subject.to_string(),
            channel_format_id: channel.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_exported_document() {
        let list = SourceList::from_json(EXPORTED).unwrap();
        assert_eq!(list.len(), 1);

        let source = list.find("Example").unwrap();
        assert_eq!(source.factory_id, "web-selector");
        let config = source.search_config();
        assert!(config.search_use_only_first_word);
        assert_eq!(
            config.subject_format().unwrap(),
            SubjectFormat::Anchors {
                lists: "a.result-link".to_string()
            }
        );

        let plan = config.channel_plan().unwrap();
        let (lists, items) = plan.grouped.unwrap();
        assert_eq!(lists, ".playlist");
        assert_eq!(items.items, "a");
        assert_eq!(plan.flat.unwrap().items, ".eps a");

        let video = config.match_video();
        assert_eq!(video.wait(), Duration::from_millis(1500));
        assert_eq!(video.timeout(), Duration::from_millis(DEFAULT_TIMEOUT_MS));
    }

    #[test]
    fn test_parse_bare_array() {
        let json = r#"[{"arguments":{"name":"Bare","searchConfig":{}}}]"#;
        let list = SourceList::from_json(json).unwrap();
        assert_eq!(list.all()[0].name(), "Bare");
        assert!(list.find("Missing").is_none());
    }

    #[test]
    fn test_invalid_document() {
        assert!(matches!(
            SourceList::from_json("{\"nope\": 1}"),
            Err(ConfigError::SourceList(_))
        ));
    }

    #[test]
    fn test_build_search_url_encodes_keyword() {
        let config = config_with("a", "");
        assert_eq!(
            config.build_search_url("Show A&B").unwrap(),
            "https://example.test/s?q=Show%20A%26B"
        );
    }

    #[test]
    fn test_build_search_url_first_word() {
        let mut config = config_with("a", "");
        config.search_use_only_first_word = true;
        assert_eq!(
            config.build_search_url("进击的巨人\u{3000}最终季 Part 2").unwrap(),
            format!(
                "https://example.test/s?q={}",
                urlencoding::encode("进击的巨人")
            )
        );
        assert_eq!(
            config.build_search_url("  Frieren  season").unwrap(),
            "https://example.test/s?q=Frieren"
        );
    }

    #[test]
    fn test_missing_search_url() {
        let config = SearchConfig::default();
        assert!(matches!(
            config.build_search_url("x"),
            Err(ScraperError::Config(_))
        ));
    }

    #[test]
    fn test_subject_format_requires_selectors() {
        assert!(matches!(
            config_with("a", "").subject_format(),
            Err(ScraperError::Config(_))
        ));
        assert!(matches!(
            config_with("indexed", "").subject_format(),
            Err(ScraperError::Config(_))
        ));

        let mut config = config_with("indexed", "");
        config.selector_subject_format_indexed = Some(SubjectFormatIndexedSelectors {
            select_names: ".name".to_string(),
            select_links: ".link".to_string(),
        });
        assert_eq!(
            config.subject_format().unwrap(),
            SubjectFormat::Indexed {
                names: ".name".to_string(),
                links: ".link".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_subject_format_is_unsupported() {
        assert_eq!(
            config_with("json-path", "").subject_format().unwrap(),
            SubjectFormat::Unsupported("json-path".to_string())
        );
    }

    #[test]
    fn test_channel_plan_variants() {
        assert!(matches!(
            config_with("a", "flattened").channel_plan(),
            Err(ScraperError::Config(_))
        ));
        assert!(matches!(
            config_with("a", "no-channel").channel_plan(),
            Err(ScraperError::Config(_))
        ));

        let mut config = config_with("a", "no-channel");
        config.selector_channel_format_no_channel = Some(ChannelFormatNoChannelSelectors {
            select_episodes: "a.ep".to_string(),
            match_episode_sort_from_name: None,
        });
        let plan = config.channel_plan().unwrap();
        assert!(plan.grouped.is_none());
        assert_eq!(plan.flat.unwrap().items, "a.ep");

        let plan = config_with("a", "mystery").channel_plan().unwrap();
        assert!(plan.grouped.is_none() && plan.flat.is_none());
    }

    #[test]
    fn test_grouped_format_without_group_block_uses_flat() {
        for tag in ["flattened", "index-grouped"] {
            let mut config = config_with("a", tag);
            config.selector_channel_format_no_channel = Some(ChannelFormatNoChannelSelectors {
                select_episodes: "a.ep".to_string(),
                match_episode_sort_from_name: None,
            });

            let plan = config.channel_plan().unwrap();
            assert!(plan.grouped.is_none());
            assert_eq!(plan.flat.unwrap().items, "a.ep");

            config.selector_channel_format_flattened = Some(ChannelFormatFlattenedSelectors {
                select_episode_lists: " ".to_string(),
                select_episodes_from_list: "a".to_string(),
                match_episode_sort_from_name: None,
            });
            let plan = config.channel_plan().unwrap();
            assert!(plan.grouped.is_none());
            assert!(plan.flat.is_some());
        }
    }

    #[test]
    fn test_first_word() {
        assert_eq!(first_word("one two"), "one");
        assert_eq!(first_word("\u{3000}一\u{3000}二"), "一");
        assert_eq!(first_word(""), "");
    }
}
