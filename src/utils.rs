//! Text helpers for normalizing extracted fields and keeping log lines short,
//! plus a filesystem check used before writing the database or JSON output.

use scraper::{Html, Node};
use std::fs;
use std::path::Path;
use tracing::{info, instrument};

/// Maximum number of characters kept in a stored summary.
pub const SUMMARY_MAX_CHARS: usize = 500;

/// Marker appended to summaries cut at [`SUMMARY_MAX_CHARS`].
pub const ELLIPSIS: &str = "...";

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters and suffixed with the number of
/// bytes that were left out.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Cut a summary to [`SUMMARY_MAX_CHARS`] characters, appending [`ELLIPSIS`]
/// when anything was removed. Shorter input is returned unchanged.
pub fn truncate_summary(s: &str) -> String {
    match s.char_indices().nth(SUMMARY_MAX_CHARS) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}{}", s[..cut].trim_end(), ELLIPSIS),
    }
}

/// Collapse every run of whitespace (newlines included) into one space and
/// trim both ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Elements whose boundaries separate words in rendered text.
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "br", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote",
    "section", "article", "tr", "td", "th", "figcaption",
];

/// Reduce an HTML fragment to plain text with collapsed whitespace.
///
/// Entities are decoded, tags dropped, and block-level boundaries become
/// spaces so paragraphs do not run together. Plain text passes straight
/// through [`collapse_whitespace`].
pub fn strip_html(s: &str) -> String {
    if !s.contains('<') && !s.contains('&') {
        return collapse_whitespace(s);
    }

    let fragment = Html::parse_fragment(s);
    let mut out = String::with_capacity(s.len());
    for node in fragment.root_element().descendants() {
        match node.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if BLOCK_ELEMENTS.contains(&el.name()) => out.push(' '),
            _ => {}
        }
    }
    collapse_whitespace(&out)
}

/// Make sure the directory that will hold `path` exists.
///
/// # Arguments
///
/// * `path` - A file about to be created or opened.
///
/// # Returns
///
/// `Ok(())` once the parent directory exists. A bare file name (no parent
/// component) needs nothing.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent)?;
            info!(dir = %parent.display(), "Directory ready");
            Ok(())
        }
        _ => Ok(()),
    }
}
