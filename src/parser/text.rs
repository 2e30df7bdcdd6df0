//! Regex extractors for URLs and counters.

use regex::Regex;
use std::sync::LazyLock;

static PEOPLE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"people/([^/?#]+)").expect("valid regex"));

static TRAILING_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(\d+)/?(?:[?#][^/]*)?$").expect("valid regex"));

static LEADING_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)").expect("valid regex"));

/// Pull the unique name out of a profile URL
/// (`https://www.douban.com/people/tabris17/` -> `tabris17`).
pub fn username_from_url(url: &str) -> Option<String> {
    PEOPLE_URL
        .captures(url)
        .map(|caps| caps[1].to_string())
}

/// Pull the external id off the tail of a resource URL
/// (`.../note/123456/`, `.../status/789/`, `.../album/42/`).
pub fn douban_id_from_url(url: &str) -> Option<i64> {
    TRAILING_ID
        .captures(url)
        .and_then(|caps| caps[1].parse().ok())
}

/// Keep only the leading integer of a counter with suffix text
/// (`"12人转发"` -> `12`).
pub fn leading_count(text: &str) -> Option<i64> {
    LEADING_COUNT
        .captures(text)
        .and_then(|caps| caps[1].parse().ok())
}
