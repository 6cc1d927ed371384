use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use itertools::Itertools;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, info};

use super::{endpoint, Adapter};
use crate::config::Settings;
use crate::error::SourceError;
use crate::fetch::{fetch_ok, Fetcher};
use crate::model::{CandidateMatch, EntityProfile, FieldValue, Link, Query, Source, SourceOutcome};
use crate::parser::{self, anchors, document_text, host_of, join_url};
use crate::rank;

const LIST_PATH: &str = "cgi-bin/listgroups.cgi";
const CARD_MARKER: &str = "showcard.cgi";
const MAX_OPERATIONS: usize = 5;
const MIN_OPERATION_LEN: usize = 20;
const OPERATION_WORDS: [&str; 3] = ["operation", "attack", "campaign"];

static TABLE_LINKS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table tr a[href]").unwrap());
static ALL_LINKS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4}").unwrap());

/// Thailand CERT threat group cards.
pub struct Etda {
    fetcher: Arc<dyn Fetcher>,
    base: String,
    max_links: usize,
}

impl Etda {
    pub fn new(settings: &Settings, fetcher: Arc<dyn Fetcher>) -> Self {
        Etda {
            fetcher,
            base: settings.sources.etda_base.clone(),
            max_links: settings.max_results,
        }
    }
}

#[async_trait]
impl Adapter for Etda {
    fn source(&self) -> Source {
        Source::Etda
    }

    async fn search(&self, query: &Query) -> Result<SourceOutcome, SourceError> {
        info!("Searching ETDA for {}", query);
        let padded = format!(" {} ", query.as_str());
        let params = [("c", ""), ("v", ""), ("s", ""), ("m", ""), ("x", padded.as_str())];
        let list = fetch_ok(self.fetcher.as_ref(), &endpoint(&self.base, LIST_PATH), &params).await?;

        let ranked = candidates(&list.body, &self.base, query);
        let Some(top) = ranked.into_iter().next() else {
            info!("No ETDA candidates for {}", query);
            return Ok(SourceOutcome::Empty);
        };
        debug!("ETDA top candidate {} (score {})", top.label, top.score);

        let card = fetch_ok(self.fetcher.as_ref(), &top.url, &[]).await?;
        let profile = parse_card(&card.body, &top.url, &self.base, self.max_links);
        Ok(SourceOutcome::Profile(Box::new(profile)))
    }
}

/// Ranked card links from a group listing. Links inside tables are tried first,
/// then every link on the page.
pub fn candidates(body: &str, base: &str, query: &Query) -> Vec<CandidateMatch> {
    let doc = Html::parse_document(body);
    let card_links = |sel: &Selector| -> Vec<(String, String)> {
        doc.select(sel)
            .filter_map(|a| {
                let href = a.value().attr("href")?;
                if !href.contains(CARD_MARKER) {
                    return None;
                }
                Some((parser::clean_text(a), join_url(base, href)?))
            })
            .collect()
    };

    let in_tables = rank::rank(card_links(&*TABLE_LINKS), query.as_str());
    if !in_tables.is_empty() {
        return in_tables;
    }
    rank::rank(card_links(&*ALL_LINKS), query.as_str())
}

/// Group card: profile fields through the ordered strategies, plus operations and references.
pub fn parse_card(body: &str, url: &str, base: &str, max_links: usize) -> EntityProfile {
    let doc = Html::parse_document(body);
    let (mut profile, strategy) = parser::extract_profile(&doc, Source::Etda, url);
    debug!("ETDA card {} parsed with {:?}", url, strategy);

    profile.operations = FieldValue::List(operations(&document_text(&doc)));
    profile.links = FieldValue::LinkList(reference_links(&doc, base, max_links));
    profile
}

/// Lines that read like dated operations, first few only.
pub fn operations(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| line.chars().count() > MIN_OPERATION_LEN && YEAR.is_match(line))
        .filter(|line| {
            let lower = line.to_lowercase();
            OPERATION_WORDS.iter().any(|w| lower.contains(w))
        })
        .map(parser::collapse_ws)
        .take(MAX_OPERATIONS)
        .collect()
}

/// Outbound references: absolute, off-site, labelled, unique by URL.
fn reference_links(doc: &Html, base: &str, max_links: usize) -> Vec<Link> {
    let own_host = host_of(base);
    anchors(doc.root_element())
        .into_iter()
        .filter(|(label, href)| {
            !label.is_empty()
                && href.starts_with("http")
                && !href.to_lowercase().contains("javascript:")
                && host_of(href) != own_host
        })
        .unique_by(|(_, href)| href.clone())
        .take(max_links)
        .map(|(label, href)| Link::new(href, label))
        .collect()
}
