use std::sync::LazyLock;

use itertools::Itertools;
use scraper::{ElementRef, Selector};

use super::{clean_text, collapse_ws, element_text};
use crate::model::{FieldValue, NOT_FOUND};

static LIST_ITEMS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("ul li, ol li").unwrap());
static LINKS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());
static LABELS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span, .badge, .label, .tag").unwrap());

/// Checked in this order; the first one present in the text is used for splitting.
pub const SEPARATORS: [char; 6] = [',', ';', '|', '\n', '•', '-'];

/// Whitespace-collapsed text of a fragment, or the "not found" sentinel.
pub fn extract_scalar(fragment: ElementRef) -> FieldValue {
    let text = collapse_ws(&fragment.text().collect::<Vec<_>>().join(" "));
    if text.is_empty() {
        FieldValue::not_found()
    } else {
        FieldValue::Scalar(text)
    }
}

/// Ordered items of a fragment: list items, then links, then inline labels,
/// then delimiter splitting of the plain text.
pub fn extract_list(fragment: ElementRef) -> FieldValue {
    let tiers: [&Selector; 3] = [&*LIST_ITEMS, &*LINKS, &*LABELS];
    for sel in tiers {
        let items = clean_items(fragment.select(sel).map(clean_text));
        if !items.is_empty() {
            return FieldValue::List(items);
        }
    }
    FieldValue::List(split_text(&element_text(fragment)))
}

/// Split free text on the first separator present; whole text as one item otherwise.
pub fn split_text(text: &str) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() || text == NOT_FOUND {
        return Vec::new();
    }
    match SEPARATORS.iter().find(|sep| text.contains(**sep)) {
        Some(sep) => clean_items(text.split(*sep).map(collapse_ws)),
        None => clean_items(std::iter::once(collapse_ws(text))),
    }
}

fn clean_items(items: impl Iterator<Item = String>) -> Vec<String> {
    items
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty() && item != NOT_FOUND)
        .unique()
        .collect()
}
