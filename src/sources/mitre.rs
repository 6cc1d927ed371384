use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use scraper::{ElementRef, Html, Selector};
use tracing::{info, warn};

use super::{endpoint, Adapter};
use crate::config::Settings;
use crate::error::{ParseFault, SourceError};
use crate::fetch::{fetch_ok, Fetcher};
use crate::model::{Query, Source, SourceOutcome, TechniqueRecord, ThreatGroup};
use crate::parser::clean_text;
use crate::rank;

/// Group detail pages fetched at once.
const MAX_CONCURRENT_GROUPS: usize = 8;

static TABLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());

/// Row of the ATT&CK groups index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRow {
    pub id: String,
    pub name: String,
    pub associated_groups: String,
    pub description: String,
}

impl GroupRow {
    fn label(&self) -> String {
        format!("{} {}", self.name, self.associated_groups)
    }
}

pub struct Mitre {
    fetcher: Arc<dyn Fetcher>,
    base: String,
}

impl Mitre {
    pub fn new(settings: &Settings, fetcher: Arc<dyn Fetcher>) -> Self {
        Mitre {
            fetcher,
            base: settings.sources.mitre_base.clone(),
        }
    }

    /// Technique table for one group; `None` when the page cannot be retrieved.
    async fn group(&self, row: GroupRow) -> Option<ThreatGroup> {
        let url = endpoint(&self.base, &format!("groups/{}/", row.id));
        let page = match fetch_ok(self.fetcher.as_ref(), &url, &[]).await {
            Ok(page) => page,
            Err(e) => {
                warn!("Skipping MITRE group {}: {}", row.id, e);
                return None;
            }
        };
        let techniques = parse_techniques(&page.body);
        Some(ThreatGroup {
            id: row.id,
            name: row.name,
            associated_groups: row.associated_groups,
            description: row.description,
            url,
            techniques,
        })
    }
}

#[async_trait]
impl Adapter for Mitre {
    fn source(&self) -> Source {
        Source::Mitre
    }

    async fn search(&self, query: &Query) -> Result<SourceOutcome, SourceError> {
        info!("Searching MITRE ATT&CK for {}", query);
        let index = fetch_ok(self.fetcher.as_ref(), &endpoint(&self.base, "groups/"), &[]).await?;
        let rows = matching_groups(&parse_groups(&index.body)?, query);
        if rows.is_empty() {
            return Ok(SourceOutcome::Empty);
        }

        let groups: Vec<ThreatGroup> = stream::iter(rows)
            .map(|row| self.group(row))
            .buffered(MAX_CONCURRENT_GROUPS)
            .filter_map(|group| async move { group })
            .collect()
            .await;
        let techniques: usize = groups.iter().map(|g| g.techniques.len()).sum();
        info!(
            "MITRE ATT&CK: {} group(s), {} technique(s)",
            groups.len(),
            techniques
        );

        if groups.is_empty() {
            Ok(SourceOutcome::Empty)
        } else {
            Ok(SourceOutcome::Groups(groups))
        }
    }
}

fn cells(row: ElementRef) -> Vec<String> {
    row.select(&CELL).map(clean_text).collect()
}

/// Index rows with at least four cells. A page without any table is malformed.
pub fn parse_groups(body: &str) -> Result<Vec<GroupRow>, ParseFault> {
    let doc = Html::parse_document(body);
    if doc.select(&TABLE).next().is_none() {
        return Err(ParseFault::MissingStructure("groups table"));
    }

    Ok(doc
        .select(&ROW)
        .map(cells)
        .filter_map(|c| match c.as_slice() {
            [id, name, associated_groups, description, ..] => Some(GroupRow {
                id: id.clone(),
                name: name.clone(),
                associated_groups: associated_groups.clone(),
                description: description.clone(),
            }),
            _ => None,
        })
        .collect())
}

/// Rows whose name or aliases contain the query, most relevant first.
pub fn matching_groups(rows: &[GroupRow], query: &Query) -> Vec<GroupRow> {
    let mut matched: Vec<(u32, GroupRow)> = rows
        .iter()
        .filter(|row| query.is_in(&row.label()))
        .map(|row| (rank::score(&row.label(), query.as_str()), row.clone()))
        .collect();
    matched.sort_by(|a, b| b.0.cmp(&a.0));
    matched.into_iter().map(|(_, row)| row).collect()
}

/// Technique rows: domain, id, name, usage. Sub-technique rows without a domain are skipped.
pub fn parse_techniques(body: &str) -> Vec<TechniqueRecord> {
    let doc = Html::parse_document(body);
    doc.select(&ROW)
        .map(cells)
        .filter_map(|c| match c.as_slice() {
            [domain, id, name, usage, ..] if id.starts_with('T') && !domain.is_empty() => {
                Some(TechniqueRecord {
                    id: id.clone(),
                    name: name.clone(),
                    domain: domain.clone(),
                    usage: usage.clone(),
                })
            }
            _ => None,
        })
        .collect()
}
