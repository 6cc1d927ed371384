use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};

use super::{endpoint, outcome, Adapter};
use crate::config::Settings;
use crate::error::SourceError;
use crate::fetch::{fetch_ok, Fetcher};
use crate::model::{EntityProfile, FieldValue, Link, Query, Resource, Source, SourceOutcome};
use crate::parser::{clean_text, document_text, first_absolute_link};
use crate::variants::{self, Variant};

const VARIANTS: [Variant; 4] = [
    Variant::LowerUnderscore,
    Variant::LowerNoSpace,
    Variant::Lower,
    Variant::Underscore,
];
const FIELD_SEPARATOR: char = '⋅';
const MIN_DESCRIPTION: usize = 20;

static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());

/// One report listed on an actor page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub date: String,
    pub publisher: String,
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorPage {
    pub description: Option<String>,
    pub reports: Vec<Report>,
}

impl ActorPage {
    fn into_profile(self, url: &str) -> EntityProfile {
        let mut profile = EntityProfile::empty(Source::Malpedia, url);
        if let Some(description) = self.description {
            profile.description = FieldValue::Scalar(description);
        }
        profile.links = FieldValue::LinkList(
            self.reports
                .into_iter()
                .filter(|r| !r.url.is_empty())
                .map(|r| {
                    let label = format!("{} ⋅ {} ⋅ {}", r.date, r.publisher, r.title);
                    Link::new(r.url, label)
                })
                .collect(),
        );
        profile
    }
}

/// Malpedia actor pages, falling back to a library search.
pub struct Malpedia {
    fetcher: Arc<dyn Fetcher>,
    base: String,
}

impl Malpedia {
    pub fn new(settings: &Settings, fetcher: Arc<dyn Fetcher>) -> Self {
        Malpedia {
            fetcher,
            base: settings.sources.malpedia_base.clone(),
        }
    }

    async fn actor(&self, url: String) -> Option<(String, ActorPage)> {
        let page = match self.fetcher.fetch(&url, &[]).await {
            Ok(page) if page.status == 200 => page,
            Ok(page) => {
                debug!("Malpedia {} -> {}", url, page.status);
                return None;
            }
            Err(e) => {
                debug!("Malpedia {} failed: {}", url, e);
                return None;
            }
        };
        parse_actor(&page.body).map(|actor| (url, actor))
    }
}

#[async_trait]
impl Adapter for Malpedia {
    fn source(&self) -> Source {
        Source::Malpedia
    }

    async fn search(&self, query: &Query) -> Result<SourceOutcome, SourceError> {
        info!("Searching Malpedia for {}", query);
        let template = endpoint(&self.base, "actor/{}");
        let candidates = variants::candidate_urls(&template, &variants::generate(query, &VARIANTS));

        if let Some((url, actor)) = variants::first_hit(&candidates, |url| self.actor(url)).await {
            info!("Malpedia actor {} with {} report(s)", url, actor.reports.len());
            return Ok(SourceOutcome::Profile(Box::new(actor.into_profile(&url))));
        }

        let library = endpoint(&self.base, "library");
        let page = fetch_ok(self.fetcher.as_ref(), &library, &[("search", query.as_str())]).await?;
        let entries = parse_library(&page.body, query);
        info!("Malpedia library: {} entries", entries.len());
        Ok(outcome(entries))
    }
}

fn cells(row: ElementRef) -> Vec<String> {
    row.select(&CELL).map(clean_text).collect()
}

/// Actor page with at least one complete report row; `None` otherwise.
pub fn parse_actor(body: &str) -> Option<ActorPage> {
    let doc = Html::parse_document(body);
    let reports: Vec<Report> = doc
        .select(&ROW)
        .filter_map(|row| match cells(row).as_slice() {
            [date, publisher, title, ..]
                if !date.is_empty() && !publisher.is_empty() && !title.is_empty() =>
            {
                Some(Report {
                    date: date.clone(),
                    publisher: publisher.clone(),
                    title: title.clone(),
                    url: first_absolute_link(row).unwrap_or_default(),
                })
            }
            _ => None,
        })
        .collect();
    if reports.is_empty() {
        return None;
    }

    let description = document_text(&doc)
        .lines()
        .map(str::trim)
        .find(|line| {
            line.chars().count() > MIN_DESCRIPTION
                && !line.starts_with('|')
                && line.to_lowercase().contains("threat actor")
        })
        .map(str::to_string);

    Some(ActorPage {
        description,
        reports,
    })
}

/// Library rows mentioning the query. The first cell holding `date ⋅ source ⋅ title` is split.
pub fn parse_library(body: &str, query: &Query) -> Vec<Resource> {
    let doc = Html::parse_document(body);
    doc.select(&ROW)
        .filter(|row| row.select(&CELL).count() >= 2)
        .filter(|row| query.is_in(&row.text().collect::<String>()))
        .filter_map(|row| {
            let text = row
                .select(&CELL)
                .map(clean_text)
                .find(|t| t.contains(FIELD_SEPARATOR))?;
            let parts: Vec<&str> = text.split(FIELD_SEPARATOR).map(str::trim).collect();
            let [date, publisher, title, ..] = parts.as_slice() else {
                return None;
            };
            if title.is_empty() {
                return None;
            }
            let mut resource = Resource::new(*title, first_absolute_link(row).unwrap_or_default());
            resource.date = Some(date.to_string());
            resource.publisher = Some(publisher.to_string());
            Some(resource)
        })
        .collect()
}
