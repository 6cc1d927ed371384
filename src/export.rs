use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::info;

use crate::model::{Query, ThreatGroup};

const NAVIGATOR_DOMAIN: &str = "enterprise-attack";
const NAVIGATOR_VERSION: &str = "4.5";
const TECHNIQUE_COLOR: &str = "#ff6666";
const RULE: usize = 50;

/// ATT&CK Navigator layer file.
#[derive(Debug, Serialize)]
pub struct NavigatorLayer {
    pub name: String,
    pub description: String,
    pub domain: &'static str,
    pub version: &'static str,
    pub techniques: Vec<LayerTechnique>,
}

#[derive(Debug, Serialize)]
pub struct LayerTechnique {
    #[serde(rename = "techniqueID")]
    pub technique_id: String,
    pub color: &'static str,
    pub score: u32,
    pub comment: String,
}

/// One entry per technique of every group; the same id may repeat across groups.
pub fn navigator_layer(query: &Query, groups: &[ThreatGroup]) -> NavigatorLayer {
    NavigatorLayer {
        name: format!("{} - MITRE ATT&CK Techniques", query),
        description: format!("Techniques used by {} according to MITRE ATT&CK", query),
        domain: NAVIGATOR_DOMAIN,
        version: NAVIGATOR_VERSION,
        techniques: groups
            .iter()
            .flat_map(|g| &g.techniques)
            .map(|t| LayerTechnique {
                technique_id: t.id.clone(),
                color: TECHNIQUE_COLOR,
                score: 1,
                comment: t.usage.clone(),
            })
            .collect(),
    }
}

fn or<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.is_empty() {
        default
    } else {
        value
    }
}

pub fn technique_report(query: &Query, groups: &[ThreatGroup], generated_at: DateTime<Local>) -> String {
    let mut out = vec![
        "MITRE ATT&CK Analysis Report".to_string(),
        "=".repeat(RULE),
        String::new(),
        format!("APT Group: {}", query),
        "Generated from: MITRE ATT&CK Database".to_string(),
        format!("Report Date: {}", generated_at.format("%Y-%m-%d %H:%M:%S")),
        String::new(),
    ];

    for group in groups {
        out.push(format!("Group ID: {}", or(&group.id, "Unknown")));
        out.push(format!("Name: {}", or(&group.name, "Unknown")));
        out.push(format!("Associated Groups: {}", or(&group.associated_groups, "None")));
        out.push(format!(
            "Description: {}",
            or(&group.description, "No description available")
        ));
        out.push(format!("Source URL: {}", or(&group.url, "Unknown")));
        out.push(String::new());

        if group.techniques.is_empty() {
            out.push("No techniques found for this group.".to_string());
            out.push(String::new());
            continue;
        }
        out.push(format!("Techniques Used ({} total):", group.techniques.len()));
        out.push("-".repeat(RULE));
        for tech in &group.techniques {
            out.push(format!("• {} - {}", tech.id, tech.name));
            out.push(format!("  Domain: {}", tech.domain));
            out.push(format!("  Usage: {}", tech.usage));
            out.push(String::new());
        }
    }
    out.push(String::new());
    out.join("\n")
}

/// `APT 28` -> `APT_28`
fn file_stem(query: &Query) -> String {
    query.as_str().replace(' ', "_")
}

/// Writes the Navigator layer and the text report into `dir`. No groups, no files.
pub fn write_all(dir: &Path, query: &Query, groups: &[ThreatGroup]) -> anyhow::Result<Vec<PathBuf>> {
    if groups.is_empty() {
        return Ok(Vec::new());
    }
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let stem = file_stem(query);

    let layer_path = dir.join(format!("{}_MITRE_Navigator.json", stem));
    let layer = serde_json::to_string_pretty(&navigator_layer(query, groups))?;
    std::fs::write(&layer_path, layer)
        .with_context(|| format!("writing {}", layer_path.display()))?;

    let report_path = dir.join(format!("{}_MITRE_Techniques_Report.txt", stem));
    std::fs::write(&report_path, technique_report(query, groups, Local::now()))
        .with_context(|| format!("writing {}", report_path.display()))?;

    info!("Saved {} and {}", layer_path.display(), report_path.display());
    Ok(vec![layer_path, report_path])
}
