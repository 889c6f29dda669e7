//! Locating and rewriting `[INTERNAL_LINK ...]` directives.

use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;

use crate::types::LinkPlaceholder;

/// A directive found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderMatch {
    /// Byte range of the whole directive.
    pub range: Range<usize>,
    pub placeholder: LinkPlaceholder,
}

fn directive_regex() -> &'static Regex {
    static DIRECTIVE: OnceLock<Regex> = OnceLock::new();
    DIRECTIVE.get_or_init(|| {
        Regex::new(r"\[INTERNAL_LINK\b([^\]]*)\]").expect("directive regex is valid")
    })
}

fn attribute_regex() -> &'static Regex {
    static ATTR: OnceLock<Regex> = OnceLock::new();
    ATTR.get_or_init(|| Regex::new(r#"(\w+)\s*=\s*"([^"]*)""#).expect("attribute regex is valid"))
}

/// Every directive in document order, well-formed or not.
///
/// Missing attributes come back as empty strings; values are trimmed.
pub fn scan(document: &str) -> Vec<PlaceholderMatch> {
    directive_regex()
        .captures_iter(document)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let attrs = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            let mut key = "";
            let mut anchor = "";
            for a in attribute_regex().captures_iter(attrs) {
                let value = a.get(2).map(|m| m.as_str()).unwrap_or("");
                match a.get(1).map(|m| m.as_str()) {
                    Some("slug") => key = value,
                    Some("text") => anchor = value,
                    _ => {}
                }
            }
            Some(PlaceholderMatch {
                range: whole.range(),
                placeholder: LinkPlaceholder::new(key.trim(), anchor.trim()),
            })
        })
        .collect()
}

/// Rebuild `document`, replacing each directive with whatever `f` returns.
///
/// `f` sees directives in document order.
pub fn rewrite<F>(document: &str, mut f: F) -> String
where
    F: FnMut(&LinkPlaceholder) -> String,
{
    let mut out = String::with_capacity(document.len());
    let mut cursor = 0;
    for m in scan(document) {
        out.push_str(&document[cursor..m.range.start]);
        out.push_str(&f(&m.placeholder));
        cursor = m.range.end;
    }
    out.push_str(&document[cursor..]);
    out
}

/// Whether any directive syntax is left.
pub fn contains_directive(document: &str) -> bool {
    document.contains("[INTERNAL_LINK")
}
