pub mod fallback;
pub mod field;
pub mod table;

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::model::{EntityProfile, FieldValue, ProfileField, Source};

static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

const SKIP_TAGS: &[&str] = &["script", "style", "noscript", "template"];
const LINE_TAGS: &[&str] = &[
    "p", "div", "br", "li", "tr", "table", "section", "article", "ul", "ol", "dt", "dd", "h1",
    "h2", "h3", "h4", "h5", "h6", "header", "footer",
];

/// Ordered extraction strategies for profile pages; the first one that applies wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    InfoTable,
    TextPatterns,
}

pub const STRATEGIES: [Strategy; 2] = [Strategy::InfoTable, Strategy::TextPatterns];

impl Strategy {
    /// `None` when the strategy's structure is absent from the document.
    pub fn apply(self, doc: &Html) -> Option<Vec<(ProfileField, FieldValue)>> {
        match self {
            Strategy::InfoTable => table::parse(doc),
            Strategy::TextPatterns => fallback::parse(&document_text(doc)),
        }
    }
}

/// Run the strategies in order and build a profile from the first that applies.
pub fn extract_profile(
    doc: &Html,
    source: Source,
    source_url: &str,
) -> (EntityProfile, Option<Strategy>) {
    let mut profile = EntityProfile::empty(source, source_url);
    for strategy in STRATEGIES {
        if let Some(fields) = strategy.apply(doc) {
            for (field, value) in fields {
                profile.set(field, value);
            }
            return (profile, Some(strategy));
        }
    }
    (profile, None)
}

/// Text of a whole document with block elements on their own lines.
pub fn document_text(doc: &Html) -> String {
    let mut out = String::new();
    push_text(doc.root_element(), &mut out);
    out
}

/// Text of a fragment with block elements on their own lines.
pub fn element_text(el: ElementRef) -> String {
    let mut out = String::new();
    push_text(el, &mut out);
    out
}

fn push_text(el: ElementRef, out: &mut String) {
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_el) = ElementRef::wrap(child) {
            let tag = child_el.value().name();
            if SKIP_TAGS.contains(&tag) {
                continue;
            }
            push_text(child_el, out);
            if LINE_TAGS.contains(&tag) {
                out.push('\n');
            } else if matches!(tag, "td" | "th") {
                out.push(' ');
            }
        }
    }
}

/// Collapse runs of whitespace (including newlines) into single spaces and trim.
pub fn collapse_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Inline text of an element, whitespace-collapsed.
pub fn clean_text(el: ElementRef) -> String {
    collapse_ws(&el.text().collect::<String>())
}

/// All anchors with an href, as (label, href) in document order.
pub fn anchors(root: ElementRef) -> Vec<(String, String)> {
    root.select(&ANCHOR)
        .filter_map(|a| {
            let href = a.value().attr("href")?.trim();
            Some((clean_text(a), href.to_string()))
        })
        .collect()
}

/// First absolute http(s) link under `root`.
pub fn first_absolute_link(root: ElementRef) -> Option<String> {
    anchors(root)
        .into_iter()
        .map(|(_, href)| href)
        .find(|href| href.starts_with("http"))
}

/// Resolve `href` against `base`. Returns `None` for unparseable input.
pub fn join_url(base: &str, href: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    base.join(href).ok().map(|u| u.to_string())
}

/// Host of a URL without a leading `www.`.
pub fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .host_str()
        .map(|h| h.trim_start_matches("www.").to_string())
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}
