//! Decoding of the elisp literals org-roam writes into SQLite.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

/// Strip surrounding double quotes.
pub fn trim_quotes(s: &str) -> &str {
    s.trim_matches('"')
}

/// Strip quotes and undo elisp backslash escaping (`\\pi` → `\pi`).
pub fn clean_title(s: &str) -> String {
    trim_quotes(s).replace("\\\\", "\\")
}

/// Parse an elisp property alist such as `(("CATEGORY" . "foo") ("ID" . "bar"))`.
///
/// Unquoted values (`("BLOCKED" . t)`) are kept verbatim. Anything that does
/// not look like a `(KEY . VALUE)` pair is ignored.
pub fn parse_elisp_props(s: &str) -> BTreeMap<String, String> {
    static PAIR_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"\("([^"]+)"\s*\.\s*"?([^")]*)"?\)"#).expect("valid regex")
    });

    PAIR_RE
        .captures_iter(s)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .collect()
}
