//! Plain-text rendering of an [`AggregateResult`].

use crate::model::{
    AggregateResult, EntityProfile, FieldValue, Resource, Source, SourceOutcome, ThreatGroup,
};
use crate::parser::truncate;

const WIDE_RULE: usize = 70;
const RULE: usize = 60;
const LIST_PREVIEW: usize = 5;
const LINK_PREVIEW: usize = 10;
const TECHNIQUES_PER_DOMAIN: usize = 10;
const OPERATIONS_SHOWN: usize = 3;

/// Shown verbatim whenever no source returned anything.
pub const NO_RESULTS_GUIDANCE: [&str; 4] = [
    "Try using:",
    "   • Alternative names or aliases",
    "   • Numbers instead of text (e.g., 'APT1' instead of 'APT One')",
    "   • Partial names (e.g., 'Lazarus' instead of 'Lazarus Group')",
];

pub fn no_results(query: &str) -> String {
    let mut out = vec![format!("No results found for '{}' in any database.", query)];
    out.extend(NO_RESULTS_GUIDANCE.iter().map(|l| l.to_string()));
    out.join("\n")
}

pub fn render(result: &AggregateResult) -> String {
    if !result.has_results() {
        return no_results(&result.query);
    }

    let mut out = vec!["SEARCH RESULTS".to_string()];
    for (source, outcome) in &result.sources {
        let body = match outcome {
            SourceOutcome::Empty => continue,
            SourceOutcome::Profile(profile) => profile_lines(profile),
            SourceOutcome::Groups(groups) => group_lines(groups),
            SourceOutcome::Resources(items) => resource_lines(*source, items),
        };
        out.push(String::new());
        out.extend(header(*source));
        out.extend(body);
    }
    out.push(String::new());
    out.extend(summary(result));
    out.join("\n")
}

fn header(source: Source) -> Vec<String> {
    let width = if source == Source::Etda { WIDE_RULE } else { RULE };
    vec![
        "=".repeat(width),
        section_title(source).to_string(),
        "=".repeat(width),
    ]
}

fn section_title(source: Source) -> &'static str {
    match source {
        Source::Etda => "ETDA APT GROUP INFORMATION",
        Source::Mitre => "MITRE ATT&CK FRAMEWORK ANALYSIS",
        Source::GoogleCloud => "GOOGLE CLOUD APT GROUPS DATABASE",
        Source::NetEnrich => "NETENRICH KNOWLEDGE BASE",
        Source::SocRadar => "SOCRADAR THREAT INTELLIGENCE",
        Source::Pulsedive => "PULSEDIVE THREAT INTELLIGENCE",
        Source::QiAnXin => "QIANXIN THREAT INTELLIGENCE",
        Source::Malpedia => "MALPEDIA THREAT INTELLIGENCE",
        Source::AptNotes => "APTNOTES RESEARCH REPORTS",
    }
}

/// `a, b, c, d, e and 3 more`
fn preview(items: &[String]) -> String {
    if items.len() <= LIST_PREVIEW {
        return items.join(", ");
    }
    format!(
        "{} and {} more",
        items[..LIST_PREVIEW].join(", "),
        items.len() - LIST_PREVIEW
    )
}

fn scalar_line(out: &mut Vec<String>, label: &str, value: &FieldValue) {
    if let Some(text) = value.as_scalar() {
        out.push(format!("{}: {}", label, text));
    }
}

fn profile_lines(profile: &EntityProfile) -> Vec<String> {
    let mut out = Vec::new();
    scalar_line(&mut out, "Names", &profile.names);
    scalar_line(&mut out, "Country", &profile.country);
    scalar_line(&mut out, "Motivation", &profile.motivation);
    scalar_line(&mut out, "First seen", &profile.first_seen);
    if let Some(description) = profile.description.as_scalar() {
        out.push(format!("Description: {}", truncate(description, 200)));
    }
    if !profile.sectors.is_blank() {
        out.push(format!("Observed Sectors: {}", preview(profile.sectors.items())));
    }
    if !profile.target_countries.is_blank() {
        out.push(format!(
            "Observed Countries: {}",
            preview(profile.target_countries.items())
        ));
    }
    let tools = profile.tools.items();
    if !tools.is_empty() {
        out.push("Tools Used:".to_string());
        out.extend(tools.iter().take(LIST_PREVIEW).map(|t| format!("  • {}", t)));
        if tools.len() > LIST_PREVIEW {
            out.push(format!("  • ... and {} more tools", tools.len() - LIST_PREVIEW));
        }
    }
    scalar_line(&mut out, "Additional Information", &profile.information);

    let operations = profile.operations.items();
    if !operations.is_empty() {
        out.push("Known Operations:".to_string());
        for (i, op) in operations.iter().take(OPERATIONS_SHOWN).enumerate() {
            out.push(format!("  {}. {}", i + 1, op));
        }
    }

    out.push(format!("Source URL: {}", profile.source_url));
    let links = profile.links.links();
    if !links.is_empty() {
        out.push(format!("References ({} found):", links.len()));
        for (i, link) in links.iter().take(LINK_PREVIEW).enumerate() {
            out.push(format!("  {}. {}", i + 1, truncate(&link.label, 80)));
            out.push(format!("     {}", link.url));
        }
        if links.len() > LINK_PREVIEW {
            out.push(format!("  ... and {} more", links.len() - LINK_PREVIEW));
        }
    }
    out
}

fn group_lines(groups: &[ThreatGroup]) -> Vec<String> {
    let mut out = Vec::new();
    for group in groups {
        out.push(String::new());
        out.push(format!("Group ID: {}", group.id));
        out.push(format!("Name: {}", group.name));
        if !group.associated_groups.is_empty() {
            out.push(format!("Associated Groups: {}", group.associated_groups));
        }
        if !group.description.is_empty() {
            out.push(format!("Description: {}", group.description));
        }
        out.push(format!("Source URL: {}", group.url));

        if group.techniques.is_empty() {
            out.push("   No techniques found for this group.".to_string());
            continue;
        }
        out.push(format!("Techniques Used ({} total):", group.techniques.len()));
        for (domain, techniques) in group.techniques_by_domain() {
            out.push(format!("   {} Domain ({} techniques):", domain, techniques.len()));
            for tech in techniques.iter().take(TECHNIQUES_PER_DOMAIN) {
                out.push(format!("     • {} - {}", tech.id, tech.name));
                if !tech.usage.is_empty() {
                    out.push(format!("       Usage: {}", truncate(&tech.usage, 100)));
                }
            }
            if techniques.len() > TECHNIQUES_PER_DOMAIN {
                out.push(format!(
                    "     ... and {} more techniques",
                    techniques.len() - TECHNIQUES_PER_DOMAIN
                ));
            }
        }
    }
    let total: usize = groups.iter().map(|g| g.techniques.len()).sum();
    out.push(String::new());
    out.push(format!(
        "MITRE Summary: {} group(s) found with {} total techniques",
        groups.len(),
        total
    ));
    out
}

fn resource_lines(source: Source, items: &[Resource]) -> Vec<String> {
    let mut out = vec![format!("Found {} result(s) from {}:", items.len(), source)];
    for (i, r) in items.iter().enumerate() {
        out.push(String::new());
        out.push(format!("#{} {}", i + 1, r.title));
        if !r.url.is_empty() {
            out.push(format!("   URL: {}", r.url));
        }
        let optional = [
            ("Date", &r.date),
            ("Source", &r.publisher),
            ("Filename", &r.filename),
            ("SHA-1", &r.digest),
            ("Excerpt", &r.snippet),
        ];
        for (label, value) in optional {
            if let Some(value) = value {
                out.push(format!("   {}: {}", label, value));
            }
        }
    }
    out
}

fn found_label(outcome: &SourceOutcome) -> String {
    match outcome {
        SourceOutcome::Empty => "Not found".to_string(),
        SourceOutcome::Profile(_) => "Found".to_string(),
        SourceOutcome::Groups(groups) => format!("{} group(s) found", groups.len()),
        SourceOutcome::Resources(items) => format!("{} found", items.len()),
    }
}

fn summary(result: &AggregateResult) -> Vec<String> {
    let mut out = vec![
        "=".repeat(WIDE_RULE),
        "COMPREHENSIVE SEARCH SUMMARY".to_string(),
        "=".repeat(WIDE_RULE),
    ];
    for source in Source::ALL {
        out.push(format!("{}: {}", source, found_label(result.get(source))));
    }
    out.push(format!("Total Resources Found: {}", result.resource_count));
    out
}
