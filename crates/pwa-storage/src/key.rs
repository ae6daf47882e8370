//! Request identity and key normalization
//!
//! Every place that compares cache keys goes through [`MatchOptions`], so a
//! lookup and the write that populated the entry always agree on what
//! "the same request" means.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Identity of a cached request: method plus absolute URL.
///
/// Fragments never take part in the identity and are stripped on
/// construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestKey {
    pub method: String,
    pub url: Url,
}

impl RequestKey {
    pub fn new(method: impl Into<String>, mut url: Url) -> Self {
        url.set_fragment(None);
        Self {
            method: method.into().to_ascii_uppercase(),
            url,
        }
    }

    /// Key for a plain GET of `url`
    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    /// Stable string form used for hashing on-disk entry names
    pub fn storage_id(&self) -> String {
        format!("{} {}", self.method, self.url)
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Matching options applied when looking a request up in a bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOptions {
    /// Drop the query string from both sides before comparing
    #[serde(default)]
    pub ignore_search: bool,
    /// Match regardless of the probe's method
    #[serde(default)]
    pub ignore_method: bool,
}

impl MatchOptions {
    pub fn ignoring_search() -> Self {
        Self {
            ignore_search: true,
            ignore_method: false,
        }
    }

    /// Comparison form of a URL under these options
    pub fn normalize(&self, url: &Url) -> String {
        let mut url = url.clone();
        url.set_fragment(None);
        if self.ignore_search {
            url.set_query(None);
        }
        url.to_string()
    }

    /// Whether the stored key answers the probe
    pub fn matches(&self, stored: &RequestKey, probe: &RequestKey) -> bool {
        if !self.ignore_method && (!probe.is_get() || stored.method != probe.method) {
            return false;
        }
        self.normalize(&stored.url) == self.normalize(&probe.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_fragment_is_stripped() {
        let key = RequestKey::get(url("https://app.local/index.html#top"));
        assert_eq!(key.url.as_str(), "https://app.local/index.html");
    }

    #[test]
    fn test_method_is_uppercased() {
        let key = RequestKey::new("post", url("https://app.local/api"));
        assert_eq!(key.method, "POST");
        assert!(!key.is_get());
    }

    #[test]
    fn test_exact_match_requires_query() {
        let stored = RequestKey::get(url("https://app.local/static/icon.png"));
        let probe = RequestKey::get(url("https://app.local/static/icon.png?v=2"));

        assert!(!MatchOptions::default().matches(&stored, &probe));
        assert!(MatchOptions::ignoring_search().matches(&stored, &probe));
    }

    #[test]
    fn test_ignore_search_applies_to_stored_side() {
        let stored = RequestKey::get(url("https://app.local/fonts/icons.woff2?v=1.11"));
        let probe = RequestKey::get(url("https://app.local/fonts/icons.woff2"));

        assert!(MatchOptions::ignoring_search().matches(&stored, &probe));
    }

    #[test]
    fn test_non_get_probe_never_matches() {
        let stored = RequestKey::get(url("https://app.local/static/app.js"));
        let probe = RequestKey::new("POST", url("https://app.local/static/app.js"));

        assert!(!MatchOptions::ignoring_search().matches(&stored, &probe));

        let lenient = MatchOptions {
            ignore_search: false,
            ignore_method: true,
        };
        assert!(lenient.matches(&stored, &probe));
    }

    #[test]
    fn test_different_paths_do_not_match() {
        let stored = RequestKey::get(url("https://app.local/static/a.css"));
        let probe = RequestKey::get(url("https://app.local/static/b.css"));
        assert!(!MatchOptions::ignoring_search().matches(&stored, &probe));
    }
}
