use std::sync::LazyLock;

use regex::Regex;

use crate::model::{FieldValue, ProfileField};

/// One line-anchored `<label>[:] <value>` pattern per scalar field.
static PATTERNS: LazyLock<Vec<(ProfileField, Regex)>> = LazyLock::new(|| {
    [
        (ProfileField::Names, r"names?"),
        (ProfileField::Country, r"country"),
        (ProfileField::Motivation, r"motivation"),
        (ProfileField::FirstSeen, r"first[ \t]+seen"),
        (ProfileField::Description, r"description"),
    ]
    .into_iter()
    .map(|(field, label)| {
        let re = Regex::new(&format!(r"(?im)^[ \t]*{}\b[ \t]*:?[ \t]*(\S.*?)[ \t]*$", label))
            .unwrap();
        (field, re)
    })
    .collect()
});

/// Scalar fields found in plain text; `None` when no pattern matches at all.
pub fn parse(text: &str) -> Option<Vec<(ProfileField, FieldValue)>> {
    let text = text.replace("\r\n", "\n");
    let fields: Vec<_> = PATTERNS
        .iter()
        .filter_map(|(field, re)| {
            let value = re.captures(&text)?.get(1)?.as_str().trim();
            if value.is_empty() {
                None
            } else {
                Some((*field, FieldValue::Scalar(value.to_string())))
            }
        })
        .collect();

    if fields.is_empty() {
        None
    } else {
        Some(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(fields: &[(ProfileField, FieldValue)], field: ProfileField) -> Option<&str> {
        fields
            .iter()
            .find(|(f, _)| *f == field)
            .and_then(|(_, v)| v.as_scalar())
    }

    #[test]
    fn picks_up_labelled_lines() {
        let text = "Threat card\nNames: Turla, Snake\n  Country: Russia\nMotivation Espionage\nFirst  seen: 1996\n";
        let fields = parse(text).unwrap();
        assert_eq!(value(&fields, ProfileField::Names), Some("Turla, Snake"));
        assert_eq!(value(&fields, ProfileField::Country), Some("Russia"));
        assert_eq!(value(&fields, ProfileField::Motivation), Some("Espionage"));
        assert_eq!(value(&fields, ProfileField::FirstSeen), Some("1996"));
        assert_eq!(value(&fields, ProfileField::Description), None);
    }

    #[test]
    fn case_insensitive_first_match_wins() {
        let fields = parse("COUNTRY: China\ncountry: Iran").unwrap();
        assert_eq!(value(&fields, ProfileField::Country), Some("China"));
    }

    #[test]
    fn label_must_start_the_line() {
        assert!(parse("The country: unknown origin").is_none());
    }

    #[test]
    fn label_prefix_of_longer_word_is_ignored() {
        assert!(parse("Namespace: kube-system").is_none());
    }

    #[test]
    fn only_scalars() {
        let fields = parse("Name: Lazarus\r\nDescription: North Korean group\r\n").unwrap();
        assert!(fields.iter().all(|(_, v)| matches!(v, FieldValue::Scalar(_))));
        assert_eq!(value(&fields, ProfileField::Description), Some("North Korean group"));
    }
}
