//! Search page interpretation.

use super::SearchResult;
use crate::error::ScraperError;
use crate::fetch::PageSource;
use crate::html::{self, Document};
use crate::source::{MediaSource, SubjectFormat};
use crate::urls;
use crate::utils::generate_result_id;
use tracing::{debug, info, warn};

/// Upper bound on results returned from one search.
pub const MAX_SEARCH_RESULTS: usize = 8;

/// Searches one media source for `keyword`.
///
/// Results keep document order and never exceed [`MAX_SEARCH_RESULTS`].
/// Only configuration problems are errors; an unreachable site or a page
/// that matches nothing yields an empty list.
pub async fn search(
    pages: &dyn PageSource,
    source: &MediaSource,
    keyword: &str,
) -> Result<Vec<SearchResult>, ScraperError> {
    let config = source.search_config();
    let search_url = config.build_search_url(keyword)?;
    let format = config.subject_format()?;
    let base = urls::origin(&search_url).ok_or_else(|| {
        ScraperError::Config(format!("searchUrl is not an absolute URL: {search_url}"))
    })?;

    if let SubjectFormat::Unsupported(tag) = &format {
        warn!(source = source.name(), subject_format = %tag, "Unrecognized subject format");
        return Ok(Vec::new());
    }

    debug!(source = source.name(), url = %search_url, "Searching");
    let page = match pages.fetch_page(&search_url).await {
        Ok(page) => page,
        Err(e) => {
            warn!(source = source.name(), error = %e, "Search page unavailable");
            return Ok(Vec::new());
        }
    };

    let results = extract_results(&page, &format, &base, source.name());
    info!(source = source.name(), keyword, count = results.len(), "Search complete");
    Ok(results)
}

/// Pulls results out of a search page. Bad elements are skipped.
fn extract_results(
    page: &str,
    format: &SubjectFormat,
    base: &str,
    source_name: &str,
) -> Vec<SearchResult> {
    let doc = Document::parse(page);
    let mut results = Vec::new();

    match format {
        SubjectFormat::Anchors { lists } => match doc.select_all(lists) {
            Ok(anchors) => {
                for anchor in anchors {
                    if results.len() == MAX_SEARCH_RESULTS {
                        break;
                    }
                    let href = html::attr(Some(anchor), "href");
                    push_result(&mut results, source_name, html::text(Some(anchor)), &href, base);
                }
            }
            Err(e) => warn!(source = source_name, error = %e, "Search selector failed"),
        },
        SubjectFormat::Indexed { names, links } => {
            match (doc.select_all(names), doc.select_all(links)) {
                (Ok(names), Ok(links)) => {
                    for (name, link) in names.into_iter().zip(links) {
                        if results.len() == MAX_SEARCH_RESULTS {
                            break;
                        }
                        let href = html::attr(Some(link), "href");
                        push_result(&mut results, source_name, html::text(Some(name)), &href, base);
                    }
                }
                (Err(e), _) | (_, Err(e)) => {
                    warn!(source = source_name, error = %e, "Search selector failed")
                }
            }
        }
        SubjectFormat::Unsupported(_) => {}
    }

    results
}

fn push_result(
    results: &mut Vec<SearchResult>,
    source_name: &str,
    title: String,
    href: &str,
    base: &str,
) {
    match urls::resolve(href, base) {
        Ok(url) => results.push(SearchResult {
            source_name: source_name.to_string(),
            source_id: generate_result_id(),
            title,
            url,
            episodes: Vec::new(),
        }),
        Err(e) => debug!(href, error = %e, "Skipping search result"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::testing::StubPages;
    use crate::config::FetchConfig;
    use crate::fetch::Fetcher;
    use crate::source::{
        MediaSourceArguments, SearchConfig, SubjectFormatASelectors, SubjectFormatIndexedSelectors,
    };
    use httpmock::prelude::*;

    const SEARCH_URL: &str = "https://example.test/s?q={keyword}";

    fn anchor_source(search_url: &str, lists: &str) -> MediaSource {
        MediaSource {
            factory_id: "web-selector".to_string(),
            version: 2,
            arguments: MediaSourceArguments {
                name: "Example".to_string(),
                icon_url: None,
                search_config: SearchConfig {
                    search_url: Some(search_url.to_string()),
                    subject_format_id: "a".to_string(),
                    selector_subject_format_a: Some(SubjectFormatASelectors {
                        select_lists: lists.to_string(),
                    }),
                    ..Default::default()
                },
                tier: None,
            },
        }
    }

    fn anchors(count: usize) -> String {
        let links: String = (1..=count)
            .map(|i| format!("<a class=\"result-link\" href=\"/v/{i}\">Show {i}</a>"))
            .collect();
        format!("<html><body><div class=results>{links}</div></body></html>")
    }

    #[tokio::test]
    async fn test_search_resolves_against_site_origin() {
        let page = r#"<html><body>
            <a class="result-link" href="/v/1">Show A</a>
            <a class="result-link" href="/v/2">Show A Season 2</a>
            <a class="result-link" href="https://cdn.example.test/v/3">Show A Movie</a>
            <a class="other" href="/ad">Ad</a>
        </body></html>"#;
        let pages =
            StubPages::default().with_page("https://example.test/s?q=Show%20A", page);
        let source = anchor_source(SEARCH_URL, "a.result-link");

        let results = search(&pages, &source, "Show A").await.unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].url, "https://example.test/v/1");
        assert_eq!(results[0].title, "Show A");
        assert_eq!(results[1].url, "https://example.test/v/2");
        assert_eq!(results[2].url, "https://cdn.example.test/v/3");
        for result in &results {
            assert_eq!(result.source_name, "Example");
            assert!(result.episodes.is_empty());
            assert!(!result.source_id.is_empty());
        }
        assert_ne!(results[0].source_id, results[1].source_id);
    }

    #[tokio::test]
    async fn test_search_caps_results_in_document_order() {
        let pages = StubPages::default().with_page("https://example.test/s?q=x", &anchors(12));
        let source = anchor_source(SEARCH_URL, "a.result-link");

        let results = search(&pages, &source, "x").await.unwrap();

        assert_eq!(results.len(), MAX_SEARCH_RESULTS);
        let titles: Vec<_> = results.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles.first(), Some(&"Show 1"));
        assert_eq!(titles.last(), Some(&"Show 8"));
    }

    #[tokio::test]
    async fn test_search_skips_malformed_href() {
        let mut links = String::new();
        for i in 1..=10 {
            let href = if i == 4 {
                "http://[broken".to_string()
            } else {
                format!("/v/{i}")
            };
            links.push_str(&format!("<a class=\"result-link\" href=\"{href}\">Show {i}</a>"));
        }
        links.push_str("<a class=\"result-link\">No link</a>");
        let page = format!("<html><body>{links}</body></html>");
        let pages = StubPages::default().with_page("https://example.test/s?q=x", &page);
        let source = anchor_source(SEARCH_URL, "a.result-link");

        let results = search(&pages, &source, "x").await.unwrap();

        let titles: Vec<_> = results.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(
            titles,
            ["Show 1", "Show 2", "Show 3", "Show 5", "Show 6", "Show 7", "Show 8", "Show 9"]
        );
    }

    #[tokio::test]
    async fn test_search_indexed_pairs_by_position() {
        let page = r#"<html><body>
            <ul>
                <li><span class="name">First</span><a class="go" href="/d/1">go</a></li>
                <li><span class="name">Second</span><a class="go" href="/d/2">go</a></li>
                <li><span class="name">Orphan</span></li>
            </ul>
        </body></html>"#;
        let mut source = anchor_source(SEARCH_URL, "unused");
        let config = &mut source.arguments.search_config;
        config.subject_format_id = "indexed".to_string();
        config.selector_subject_format_indexed = Some(SubjectFormatIndexedSelectors {
            select_names: "span.name".to_string(),
            select_links: "a.go".to_string(),
        });
        let pages = StubPages::default().with_page("https://example.test/s?q=x", page);

        let results = search(&pages, &source, "x").await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "First");
        assert_eq!(results[0].url, "https://example.test/d/1");
        assert_eq!(results[1].title, "Second");
        assert_eq!(results[1].url, "https://example.test/d/2");
    }

    #[tokio::test]
    async fn test_search_first_word_only() {
        let pages = StubPages::default();
        let mut source = anchor_source(SEARCH_URL, "a");
        source.arguments.search_config.search_use_only_first_word = true;

        let results = search(&pages, &source, "Frieren Season 2").await.unwrap();

        assert!(results.is_empty());
        assert_eq!(pages.requested(), ["https://example.test/s?q=Frieren"]);
    }

    #[tokio::test]
    async fn test_search_unreachable_site_is_empty() {
        let pages = StubPages::default();
        let source = anchor_source(SEARCH_URL, "a.result-link");
        assert!(search(&pages, &source, "x").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_invalid_selector_is_empty() {
        let pages = StubPages::default().with_page("https://example.test/s?q=x", &anchors(3));
        let source = anchor_source(SEARCH_URL, "a[");
        assert!(search(&pages, &source, "x").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_unknown_format_skips_fetch() {
        let pages = StubPages::default();
        let mut source = anchor_source(SEARCH_URL, "a");
        source.arguments.search_config.subject_format_id = "json".to_string();

        assert!(search(&pages, &source, "x").await.unwrap().is_empty());
        assert!(pages.requested().is_empty());
    }

    #[tokio::test]
    async fn test_search_config_errors() {
        let pages = StubPages::default();

        let mut source = anchor_source(SEARCH_URL, "a");
        source.arguments.search_config.search_url = None;
        assert!(matches!(
            search(&pages, &source, "x").await,
            Err(ScraperError::Config(_))
        ));

        let source = anchor_source("/relative?q={keyword}", "a");
        assert!(matches!(
            search(&pages, &source, "x").await,
            Err(ScraperError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_search_over_http() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/s").header_exists("user-agent");
                then.status(200)
                    .header("content-type", "text/html")
                    .body(anchors(3));
            })
            .await;

        let fetcher = Fetcher::new(FetchConfig::default()).unwrap();
        let source = anchor_source(&server.url("/s?q={keyword}"), "a.result-link");

        let results = search(&fetcher, &source, "Show A").await.unwrap();

        mock.assert_async().await;
        let urls: Vec<_> = results.iter().map(|r| r.url.clone()).collect();
        assert_eq!(
            urls,
            [server.url("/v/1"), server.url("/v/2"), server.url("/v/3")]
        );
    }
}
