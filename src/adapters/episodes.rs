//! Episode listing from a detail page.
//!
//! Detail pages often carry several lists with identical markup (the real
//! playlist, "related" titles, per-mirror tabs). With a grouped channel
//! format the container holding the most episode items is taken as the
//! real one. When that finds nothing the flat selector is tried over the
//! whole document.

use super::Episode;
use crate::error::ScraperError;
use crate::fetch::PageSource;
use crate::html::{self, Document};
use crate::source::{ChannelPlan, EpisodeSelectors, MediaSource};
use crate::urls;
use crate::utils::digits_only;
use regex::{Regex, RegexBuilder};
use scraper::ElementRef;
use tracing::{debug, info, warn};

/// Lists the episodes on `detail_url`.
///
/// Fails only when the configuration is incomplete or `detail_url` has no
/// origin to resolve links against. An unreachable page yields an empty list.
pub async fn get_episodes(
    pages: &dyn PageSource,
    source: &MediaSource,
    detail_url: &str,
) -> Result<Vec<Episode>, ScraperError> {
    let plan = source.search_config().channel_plan()?;
    let base = urls::origin(detail_url)
        .ok_or_else(|| ScraperError::InvalidDetailUrl(detail_url.to_string()))?;

    let page = match pages.fetch_page(detail_url).await {
        Ok(page) => page,
        Err(e) => {
            warn!(source = source.name(), url = detail_url, error = %e, "Detail page unavailable");
            return Ok(Vec::new());
        }
    };

    let episodes = extract_episodes(&page, &plan, &base);
    info!(source = source.name(), url = detail_url, count = episodes.len(), "Episodes listed");
    Ok(episodes)
}

fn extract_episodes(page: &str, plan: &ChannelPlan, base: &str) -> Vec<Episode> {
    let doc = Document::parse(page);

    if let Some((lists, selectors)) = &plan.grouped {
        let episodes = richest_container(&doc, lists, selectors, base);
        if !episodes.is_empty() {
            return episodes;
        }
    }

    if let Some(selectors) = &plan.flat {
        match doc.select_all(&selectors.items) {
            Ok(items) => {
                debug!(count = items.len(), "Using flat episode selector");
                return to_episodes(items, selectors, base);
            }
            Err(e) => warn!(error = %e, "Episode selector failed"),
        }
    }

    Vec::new()
}

/// Episodes from the container with the most items. Ties go to the first.
fn richest_container(
    doc: &Document,
    lists: &str,
    selectors: &EpisodeSelectors,
    base: &str,
) -> Vec<Episode> {
    let containers = match doc.select_all(lists) {
        Ok(containers) => containers,
        Err(e) => {
            warn!(error = %e, "Episode list selector failed");
            return Vec::new();
        }
    };
    let item = match html::compile(&selectors.items) {
        Ok(item) => item,
        Err(e) => {
            warn!(error = %e, "Episode selector failed");
            return Vec::new();
        }
    };

    let mut best: Vec<ElementRef<'_>> = Vec::new();
    for container in &containers {
        let items = html::select_within(*container, &item);
        if items.len() > best.len() {
            best = items;
        }
    }

    debug!(containers = containers.len(), items = best.len(), "Picked episode container");
    to_episodes(best, selectors, base)
}

fn to_episodes(
    items: Vec<ElementRef<'_>>,
    selectors: &EpisodeSelectors,
    base: &str,
) -> Vec<Episode> {
    let sort = SortPattern::new(selectors.sort_pattern.as_deref());

    items
        .into_iter()
        .filter_map(|item| {
            let href = html::attr(Some(item), "href");
            if href.trim().is_empty() {
                return None;
            }
            let url = match urls::resolve(&href, base) {
                Ok(url) => url,
                Err(e) => {
                    debug!(href = %href, error = %e, "Skipping episode");
                    return None;
                }
            };
            let title = html::text(Some(item));
            Some(Episode {
                sort: sort.label(&title),
                title,
                url,
            })
        })
        .collect()
}

/// Derives the sort label from an episode title.
struct SortPattern {
    regex: Option<Regex>,
}

impl SortPattern {
    fn new(pattern: Option<&str>) -> Self {
        let regex = pattern
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .and_then(|p| match RegexBuilder::new(p).case_insensitive(true).build() {
                Ok(regex) => Some(regex),
                Err(e) => {
                    warn!(pattern = p, error = %e, "Invalid episode sort pattern");
                    None
                }
            });
        Self { regex }
    }

    /// Group `ep`, else group 1, else the whole match. Falls back to the
    /// title's digits.
    fn label(&self, title: &str) -> String {
        self.regex
            .as_ref()
            .and_then(|regex| regex.captures(title))
            .and_then(|caps| {
                caps.name("ep")
                    .or_else(|| caps.get(1))
                    .or_else(|| caps.get(0))
                    .map(|m| m.as_str().to_string())
            })
            .unwrap_or_else(|| digits_only(title))
    }
}
