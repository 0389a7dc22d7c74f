//! URL helpers shared by every adapter.
//!
//! Site configurations hand us relative links, proxy-wrapped links and
//! user-written regular expressions. Everything here is lenient: bad input
//! yields an error or `None` for the caller to skip, never a panic.

use crate::error::ScraperError;
use regex::{Regex, RegexBuilder};
use std::sync::LazyLock;
use tracing::warn;
use url::Url;

/// Matches every scheme prefix inside a (possibly wrapped) URL.
static SCHEME_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://").unwrap());

/// Resolves `href` against `base` and returns the absolute URL.
pub fn resolve(href: &str, base: &str) -> Result<String, ScraperError> {
    let href = href.trim();
    if href.is_empty() {
        return Err(ScraperError::InvalidUrl("empty href".to_string()));
    }

    let base_url = Url::parse(base).map_err(|e| ScraperError::InvalidUrl(format!("{base}: {e}")))?;
    base_url
        .join(href)
        .map(String::from)
        .map_err(|e| ScraperError::InvalidUrl(format!("{href}: {e}")))
}

/// Returns the `scheme://host[:port]` origin of an absolute URL.
///
/// Returns `None` for unparsable URLs and for schemes without a network
/// origin (`data:`, `about:`, ...).
pub fn origin(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let origin = parsed.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}

/// Runs a user-supplied pattern against `haystack` and returns the URL it captures.
///
/// The pattern is case-insensitive. A named group `v` wins, then a non-empty
/// group 1, then the whole match. Escaped slashes (`\/`) from inline JSON are
/// turned back into `/`. Compile failures are logged and treated as no match.
pub fn extract_first_match(haystack: &str, pattern: &str) -> Option<String> {
    let regex = match RegexBuilder::new(pattern).case_insensitive(true).build() {
        Ok(regex) => regex,
        Err(e) => {
            warn!(pattern, error = %e, "Invalid video URL pattern");
            return None;
        }
    };

    let caps = regex.captures(haystack)?;
    let value = caps
        .name("v")
        .filter(|m| !m.as_str().is_empty())
        .or_else(|| caps.get(1).filter(|m| !m.as_str().is_empty()))
        .or_else(|| caps.get(0))?
        .as_str();

    Some(value.replace("\\/", "/"))
}

/// Drops everything before the last `http://` or `https://` in `url`.
///
/// Redirect wrappers and proxies often embed the real address after their
/// own; the last scheme occurrence is the real target.
pub fn clean_scheme_duplication(url: &str) -> String {
    let mut starts = SCHEME_REGEX.find_iter(url).map(|m| m.start());
    let first = starts.next();
    match (first, starts.last()) {
        (Some(_), Some(last)) => url[last..].to_string(),
        _ => url.to_string(),
    }
}

/// Returns true if the URL points at a video manifest or file.
pub fn looks_like_video(url: &str) -> bool {
    url.contains(".m3u8") || url.contains(".mp4")
}
