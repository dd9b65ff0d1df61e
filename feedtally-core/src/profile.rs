//! Profile handle extraction

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

static HANDLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/([A-Za-z0-9_]{1,15})(?:/|$)").expect("valid regex"));

/// Handle of the profile a page belongs to, from the first path segment.
///
/// `https://x.com/alice/with_replies` gives `alice`. Returns `None` for
/// unparseable locations or a path without a handle-shaped first segment.
pub fn profile_handle(location: &str) -> Option<String> {
    let url = Url::parse(location).ok()?;
    HANDLE
        .captures(url.path())
        .map(|caps| caps[1].to_string())
}
