use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use super::field::{extract_list, extract_scalar};
use crate::model::{FieldValue, ProfileField};

static TABLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td, th").unwrap());

/// A table containing any of these (lowercased) is an info block.
pub const INFO_KEYWORDS: [&str; 6] = [
    "names",
    "country",
    "motivation",
    "first seen",
    "description",
    "observed sectors",
];

/// Checked top to bottom; a label matches the first entry with a key contained in it.
/// Containment is loose on purpose ("Target Country" still reads as a country row), so
/// "Observed countries" lands on `Country` before `TargetCountries` is consulted.
pub const SYNONYMS: &[(ProfileField, &[&str])] = &[
    (ProfileField::Names, &["names", "name"]),
    (ProfileField::Country, &["country", "countries"]),
    (ProfileField::Motivation, &["motivation"]),
    (ProfileField::FirstSeen, &["first seen", "first"]),
    (ProfileField::Description, &["description"]),
    (ProfileField::Sectors, &["observed sectors", "sectors"]),
    (
        ProfileField::TargetCountries,
        &["observed countries", "target countries"],
    ),
    (ProfileField::Tools, &["tools used", "tools", "malware"]),
    (ProfileField::Information, &["information", "details"]),
];

/// Lowercase, drop colons, trim.
pub fn normalize_label(raw: &str) -> String {
    raw.to_lowercase().replace(':', "").trim().to_string()
}

pub fn match_field(label: &str) -> Option<ProfileField> {
    let label = normalize_label(label);
    if label.is_empty() {
        return None;
    }
    SYNONYMS
        .iter()
        .find(|(_, keys)| keys.iter().any(|k| label == *k || label.contains(k)))
        .map(|(field, _)| *field)
}

pub fn is_info_block(table: ElementRef) -> bool {
    let text = table.text().collect::<String>().to_lowercase();
    INFO_KEYWORDS.iter().any(|kw| text.contains(kw))
}

/// First qualifying table in document order.
pub fn find_info_block(doc: &Html) -> Option<ElementRef<'_>> {
    doc.select(&TABLE).find(|t| is_info_block(*t))
}

/// Map the rows of a block onto profile fields. Later rows overwrite earlier ones.
pub fn parse_block(block: ElementRef) -> Vec<(ProfileField, FieldValue)> {
    let mut fields = Vec::new();
    for row in block.select(&ROW) {
        let cells: Vec<ElementRef> = row.select(&CELL).collect();
        if cells.len() < 2 {
            continue;
        }
        let label = cells[0].text().collect::<String>();
        let Some(field) = match_field(&label) else {
            continue;
        };
        let value = if field.is_list() {
            extract_list(cells[1])
        } else {
            extract_scalar(cells[1])
        };
        fields.push((field, value));
    }
    fields
}

/// `None` when the document has no info block.
pub fn parse(doc: &Html) -> Option<Vec<(ProfileField, FieldValue)>> {
    find_info_block(doc).map(parse_block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityProfile, Source};
    use crate::parser::extract_profile;

    #[test]
    fn label_normalization() {
        assert_eq!(normalize_label("  First Seen: "), "first seen");
        assert_eq!(match_field("Country:"), Some(ProfileField::Country));
        assert_eq!(match_field("Target Country"), Some(ProfileField::Country));
        assert_eq!(match_field("Observed countries"), Some(ProfileField::Country));
        assert_eq!(match_field("Tools used"), Some(ProfileField::Tools));
        assert_eq!(match_field("Malware families"), Some(ProfileField::Tools));
        assert_eq!(match_field("More details"), Some(ProfileField::Information));
        assert_eq!(match_field("Sponsor"), None);
        assert_eq!(match_field(""), None);
    }

    #[test]
    fn loose_match_accepts_incidental_substring() {
        // "Username" contains "name"
        assert_eq!(match_field("Username"), Some(ProfileField::Names));
    }

    #[test]
    fn first_qualifying_table_wins() {
        let doc = Html::parse_document(
            "<table><tr><td>Nav</td><td>Home</td></tr></table>\
             <table><tr><td>Country</td><td>Russia</td></tr></table>\
             <table><tr><td>Country</td><td>China</td></tr></table>",
        );
        let fields = parse(&doc).unwrap();
        assert_eq!(
            fields,
            vec![(ProfileField::Country, FieldValue::Scalar("Russia".into()))]
        );
    }

    #[test]
    fn rows_with_one_cell_are_skipped() {
        let doc = Html::parse_document(
            "<table><tr><th colspan=2>Names</th></tr><tr><td>Names</td><td>APT28, Sofacy</td></tr></table>",
        );
        let fields = parse(&doc).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].1, FieldValue::Scalar("APT28, Sofacy".into()));
    }

    #[test]
    fn no_info_table() {
        let doc = Html::parse_document("<table><tr><td>a</td><td>b</td></tr></table>");
        assert!(parse(&doc).is_none());
    }

    #[test]
    fn etda_card_fixture() {
        let html = std::fs::read_to_string("tests/fixtures/etda_card.html").unwrap();
        let doc = Html::parse_document(&html);
        let (profile, _) = extract_profile(&doc, Source::Etda, "https://apt.etda.or.th/card");
        assert_eq!(
            profile.names.as_scalar(),
            Some("APT 28, Sofacy, Fancy Bear, Sednit, STRONTIUM")
        );
        assert_eq!(profile.country.as_scalar(), Some("Russia"));
        assert_eq!(profile.motivation.as_scalar(), Some("Information theft and espionage"));
        assert_eq!(profile.first_seen.as_scalar(), Some("2004"));
        assert!(profile.description.as_scalar().unwrap().starts_with("APT 28 is"));
        assert_eq!(
            profile.sectors.items(),
            ["Aerospace", "Defense", "Energy", "Government", "Media"]
        );
        assert_eq!(profile.tools.items(), ["X-Agent", "Zebrocy", "Mimikatz"]);
        assert!(profile.information.as_scalar().is_some());
    }

    #[test]
    fn parsing_is_idempotent() {
        let html = std::fs::read_to_string("tests/fixtures/etda_card.html").unwrap();
        let doc = Html::parse_document(&html);
        let first: EntityProfile = extract_profile(&doc, Source::Etda, "u").0;
        let second: EntityProfile = extract_profile(&doc, Source::Etda, "u").0;
        assert_eq!(first, second);
        let reparsed = Html::parse_document(&html);
        assert_eq!(first, extract_profile(&reparsed, Source::Etda, "u").0);
    }
}
