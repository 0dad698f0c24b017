//! URL handling module for Forum-Harvest
//!
//! This module provides URL normalization, thread id derivation, listing page
//! addressing and category exclusion matching.

mod matcher;
mod normalize;

use crate::{UrlError, UrlResult};
use url::Url;

// Re-export main functions
pub use matcher::{find_exclusion, matches_pattern};
pub use normalize::normalize_url;

/// Derives the stable thread id from a thread URL
///
/// Forum software addresses threads as `/threads/<slug>.<id>/`, sometimes
/// with trailing action segments (`/unread`, `/page-3`). The id is the part
/// after the last dot of the last path segment that has one; URLs without a
/// dotted segment fall back to their last path segment.
///
/// # Examples
///
/// ```
/// use forum_harvest::url::thread_id_from_url;
/// use url::Url;
///
/// let url = Url::parse("https://forum.example.com/threads/hello.10/").unwrap();
/// assert_eq!(thread_id_from_url(&url).unwrap(), "10");
///
/// let url = Url::parse("https://forum.example.com/threads/42/").unwrap();
/// assert_eq!(thread_id_from_url(&url).unwrap(), "42");
/// ```
pub fn thread_id_from_url(url: &Url) -> UrlResult<String> {
    let segments: Vec<&str> = url
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    let dotted = segments.iter().rev().find_map(|segment| {
        segment
            .rsplit_once('.')
            .map(|(_, id)| id)
            .filter(|id| !id.is_empty())
    });

    dotted
        .or_else(|| segments.last().copied())
        .map(str::to_string)
        .ok_or_else(|| UrlError::MissingThreadId(url.to_string()))
}

/// Builds the URL of listing page `page` (1-based) of a category
///
/// Page 1 is the category URL itself; later pages append the configured
/// segment with `{n}` replaced by the page number.
pub fn listing_page_url(category_url: &str, page: u32, segment: &str) -> UrlResult<Url> {
    let base = Url::parse(category_url).map_err(|e| UrlError::Parse(e.to_string()))?;
    if page <= 1 {
        return Ok(base);
    }

    let mut base = base;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    base.join(&segment.replace("{n}", &page.to_string()))
        .map_err(|e| UrlError::Parse(e.to_string()))
}

/// Synthesizes a readable name for a link with no text of its own
///
/// Uses the last path segment, dropping a trailing `.<id>` suffix and turning
/// separators into spaces: `/forums/local-news.7/` becomes `local news`.
pub fn name_from_url(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .unwrap_or_default();

    let slug = match segment.rsplit_once('.') {
        Some((slug, _)) if !slug.is_empty() => slug,
        _ => segment,
    };

    let name = slug.replace(['-', '_'], " ").trim().to_string();
    if name.is_empty() {
        url.host_str().unwrap_or_default().to_string()
    } else {
        name
    }
}
