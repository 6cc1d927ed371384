use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Single representation of an absent scalar field.
pub const NOT_FOUND: &str = "Not found";

/// Free-text entity name for one aggregation run.
///
/// Whitespace is collapsed on construction; comparisons go through `lower()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Query {
    text: String,
    lower: String,
}

impl Query {
    /// Returns `None` for blank input.
    pub fn new(raw: &str) -> Option<Self> {
        let text = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.is_empty() {
            return None;
        }
        let lower = text.to_lowercase();
        Some(Query { text, lower })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn lower(&self) -> &str {
        &self.lower
    }

    /// True when the lowercased query occurs inside `haystack` (case-insensitive).
    pub fn is_in(&self, haystack: &str) -> bool {
        haystack.to_lowercase().contains(&self.lower)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub url: String,
    pub label: String,
}

impl Link {
    pub fn new(url: impl Into<String>, label: impl Into<String>) -> Self {
        Link {
            url: url.into(),
            label: label.into(),
        }
    }
}

/// Typed value pulled out of a markup fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Scalar(String),
    List(Vec<String>),
    LinkList(Vec<Link>),
}

impl FieldValue {
    pub fn not_found() -> Self {
        FieldValue::Scalar(NOT_FOUND.to_string())
    }

    pub fn empty_list() -> Self {
        FieldValue::List(Vec::new())
    }

    pub fn empty_links() -> Self {
        FieldValue::LinkList(Vec::new())
    }

    /// Only the scalar sentinel counts as "not found"; an empty list is a found-but-empty value.
    pub fn is_not_found(&self) -> bool {
        matches!(self, FieldValue::Scalar(s) if s == NOT_FOUND)
    }

    /// True for the sentinel and for empty lists.
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Scalar(s) => s == NOT_FOUND,
            FieldValue::List(items) => items.is_empty(),
            FieldValue::LinkList(links) => links.is_empty(),
        }
    }

    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            FieldValue::Scalar(s) if s != NOT_FOUND => Some(s),
            _ => None,
        }
    }

    pub fn items(&self) -> &[String] {
        match self {
            FieldValue::List(items) => items,
            _ => &[],
        }
    }

    pub fn links(&self) -> &[Link] {
        match self {
            FieldValue::LinkList(links) => links,
            _ => &[],
        }
    }

    pub fn len(&self) -> usize {
        match self {
            FieldValue::Scalar(_) => usize::from(!self.is_not_found()),
            FieldValue::List(items) => items.len(),
            FieldValue::LinkList(links) => links.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Scored candidate produced while ranking one adapter's search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateMatch {
    pub label: String,
    pub url: String,
    pub score: u32,
}

/// Named fields an entity profile can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileField {
    Names,
    Country,
    Motivation,
    FirstSeen,
    Description,
    Sectors,
    TargetCountries,
    Tools,
    Information,
}

impl ProfileField {
    pub fn is_list(self) -> bool {
        matches!(
            self,
            ProfileField::Sectors | ProfileField::TargetCountries | ProfileField::Tools
        )
    }
}

/// Normalized record for one matched entity from one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityProfile {
    pub source: Source,
    pub source_url: String,
    pub names: FieldValue,
    pub country: FieldValue,
    pub motivation: FieldValue,
    pub first_seen: FieldValue,
    pub description: FieldValue,
    pub sectors: FieldValue,
    pub target_countries: FieldValue,
    pub tools: FieldValue,
    pub information: FieldValue,
    pub operations: FieldValue,
    pub links: FieldValue,
}

impl EntityProfile {
    pub fn empty(source: Source, source_url: impl Into<String>) -> Self {
        EntityProfile {
            source,
            source_url: source_url.into(),
            names: FieldValue::not_found(),
            country: FieldValue::not_found(),
            motivation: FieldValue::not_found(),
            first_seen: FieldValue::not_found(),
            description: FieldValue::not_found(),
            sectors: FieldValue::empty_list(),
            target_countries: FieldValue::empty_list(),
            tools: FieldValue::empty_list(),
            information: FieldValue::not_found(),
            operations: FieldValue::empty_list(),
            links: FieldValue::empty_links(),
        }
    }

    pub(crate) fn set(&mut self, field: ProfileField, value: FieldValue) {
        let slot = match field {
            ProfileField::Names => &mut self.names,
            ProfileField::Country => &mut self.country,
            ProfileField::Motivation => &mut self.motivation,
            ProfileField::FirstSeen => &mut self.first_seen,
            ProfileField::Description => &mut self.description,
            ProfileField::Sectors => &mut self.sectors,
            ProfileField::TargetCountries => &mut self.target_countries,
            ProfileField::Tools => &mut self.tools,
            ProfileField::Information => &mut self.information,
        };
        *slot = value;
    }
}

/// One ATT&CK technique as listed on a group page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TechniqueRecord {
    pub id: String,
    pub name: String,
    pub domain: String,
    pub usage: String,
}

/// MITRE ATT&CK group with the techniques attributed to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreatGroup {
    pub id: String,
    pub name: String,
    pub associated_groups: String,
    pub description: String,
    pub url: String,
    pub techniques: Vec<TechniqueRecord>,
}

impl ThreatGroup {
    /// Techniques grouped by domain, domains in first-seen order.
    pub fn techniques_by_domain(&self) -> Vec<(&str, Vec<&TechniqueRecord>)> {
        let mut grouped: Vec<(&str, Vec<&TechniqueRecord>)> = Vec::new();
        for tech in &self.techniques {
            match grouped.iter_mut().find(|(d, _)| *d == tech.domain) {
                Some((_, list)) => list.push(tech),
                None => grouped.push((tech.domain.as_str(), vec![tech])),
            }
        }
        grouped
    }
}

/// Article, report, or page reference returned by search-style sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Resource {
    pub title: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl Resource {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Resource {
            title: title.into(),
            url: url.into(),
            ..Default::default()
        }
    }
}

/// External intelligence sources, in presentation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Etda,
    Mitre,
    GoogleCloud,
    NetEnrich,
    SocRadar,
    Pulsedive,
    QiAnXin,
    Malpedia,
    AptNotes,
}

impl Source {
    pub const ALL: [Source; 9] = [
        Source::Etda,
        Source::Mitre,
        Source::GoogleCloud,
        Source::NetEnrich,
        Source::SocRadar,
        Source::Pulsedive,
        Source::QiAnXin,
        Source::Malpedia,
        Source::AptNotes,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Source::Etda => "ETDA",
            Source::Mitre => "MITRE ATT&CK",
            Source::GoogleCloud => "Google Cloud APT",
            Source::NetEnrich => "NetEnrich",
            Source::SocRadar => "SOCRadar",
            Source::Pulsedive => "Pulsedive",
            Source::QiAnXin => "QiAnXin",
            Source::Malpedia => "Malpedia",
            Source::AptNotes => "APTnotes",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What one adapter contributes to the aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum SourceOutcome {
    Empty,
    Profile(Box<EntityProfile>),
    Groups(Vec<ThreatGroup>),
    Resources(Vec<Resource>),
}

impl SourceOutcome {
    pub fn is_empty(&self) -> bool {
        match self {
            SourceOutcome::Empty => true,
            SourceOutcome::Profile(_) => false,
            SourceOutcome::Groups(groups) => groups.is_empty(),
            SourceOutcome::Resources(items) => items.is_empty(),
        }
    }

    pub fn technique_count(&self) -> usize {
        match self {
            SourceOutcome::Groups(groups) => groups.iter().map(|g| g.techniques.len()).sum(),
            _ => 0,
        }
    }

    pub fn resource_count(&self) -> usize {
        match self {
            SourceOutcome::Empty => 0,
            SourceOutcome::Profile(profile) => profile.links.len(),
            SourceOutcome::Groups(_) => self.technique_count(),
            SourceOutcome::Resources(items) => items.len(),
        }
    }

    /// Outbound URLs in the order the aggregate reference set should see them.
    pub fn reference_links(&self) -> Vec<Link> {
        match self {
            SourceOutcome::Empty => Vec::new(),
            SourceOutcome::Profile(profile) => {
                let mut links = vec![Link::new(&profile.source_url, profile.source.name())];
                links.extend(profile.links.links().iter().cloned());
                links
            }
            SourceOutcome::Groups(groups) => groups
                .iter()
                .map(|g| Link::new(&g.url, format!("{} {}", g.id, g.name)))
                .collect(),
            SourceOutcome::Resources(items) => items
                .iter()
                .filter(|r| !r.url.is_empty())
                .map(|r| Link::new(&r.url, &r.title))
                .collect(),
        }
    }
}

/// Unified output of one query run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateResult {
    pub query: String,
    pub sources: BTreeMap<Source, SourceOutcome>,
    pub references: Vec<Link>,
    pub technique_count: usize,
    pub resource_count: usize,
}

impl AggregateResult {
    pub fn get(&self, source: Source) -> &SourceOutcome {
        self.sources.get(&source).unwrap_or(&SourceOutcome::Empty)
    }

    pub fn has_results(&self) -> bool {
        self.sources.values().any(|o| !o.is_empty())
    }

    pub fn groups(&self) -> &[ThreatGroup] {
        match self.get(Source::Mitre) {
            SourceOutcome::Groups(groups) => groups,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_normalizes_whitespace() {
        let q = Query::new("  Lazarus \t  Group \n").unwrap();
        assert_eq!(q.as_str(), "Lazarus Group");
        assert_eq!(q.lower(), "lazarus group");
        assert!(Query::new("   ").is_none());
    }

    #[test]
    fn not_found_differs_from_empty_list() {
        assert!(FieldValue::not_found().is_not_found());
        assert!(!FieldValue::empty_list().is_not_found());
        assert!(FieldValue::empty_list().is_blank());
        assert_eq!(FieldValue::not_found().len(), 0);
        assert_eq!(FieldValue::Scalar("x".into()).len(), 1);
    }

    #[test]
    fn techniques_grouped_in_first_seen_domain_order() {
        let tech = |d: &str, id: &str| TechniqueRecord {
            id: id.into(),
            name: String::new(),
            domain: d.into(),
            usage: String::new(),
        };
        let group = ThreatGroup {
            id: "G0001".into(),
            name: "Test".into(),
            associated_groups: String::new(),
            description: String::new(),
            url: String::new(),
            techniques: vec![
                tech("Mobile", "T1"),
                tech("Enterprise", "T2"),
                tech("Mobile", "T3"),
            ],
        };
        let grouped = group.techniques_by_domain();
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].0, "Mobile");
        assert_eq!(grouped[0].1.len(), 2);
        assert_eq!(grouped[1].0, "Enterprise");
    }

    #[test]
    fn outcome_counts() {
        let outcome = SourceOutcome::Resources(vec![Resource::new("a", "u1"), Resource::new("b", "")]);
        assert_eq!(outcome.resource_count(), 2);
        assert_eq!(outcome.reference_links().len(), 1);
        assert!(SourceOutcome::Groups(Vec::new()).is_empty());
        assert!(SourceOutcome::Empty.is_empty());
    }
}
