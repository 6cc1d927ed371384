use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::{debug, info};

use super::{endpoint, Adapter};
use crate::config::Settings;
use crate::error::SourceError;
use crate::fetch::{fetch_ok, Fetcher};
use crate::model::{Query, Resource, Source, SourceOutcome};
use crate::parser::{anchors, clean_text, document_text, join_url};
use crate::variants::{self, Variant};

const VARIANTS: [Variant; 5] = [
    Variant::LowerNoSpace,
    Variant::LowerHyphen,
    Variant::Lower,
    Variant::NoSpace,
    Variant::Underscore,
];

static THREAT_BLOCK: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.threat-header, div.threat-info, section.threat-details").unwrap()
});
static H1: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").unwrap());

/// Pulsedive threat pages, guessed from name variants.
pub struct Pulsedive {
    fetcher: Arc<dyn Fetcher>,
    base: String,
}

impl Pulsedive {
    pub fn new(settings: &Settings, fetcher: Arc<dyn Fetcher>) -> Self {
        Pulsedive {
            fetcher,
            base: settings.sources.pulsedive_base.clone(),
        }
    }

    async fn threat_page(&self, url: String) -> Option<String> {
        match self.fetcher.fetch(&url, &[]).await {
            Ok(page) if page.status == 200 && is_threat_page(&page.body) => Some(url),
            Ok(page) => {
                debug!("Pulsedive {} -> {}", url, page.status);
                None
            }
            Err(e) => {
                debug!("Pulsedive {} failed: {}", url, e);
                None
            }
        }
    }
}

#[async_trait]
impl Adapter for Pulsedive {
    fn source(&self) -> Source {
        Source::Pulsedive
    }

    async fn search(&self, query: &Query) -> Result<SourceOutcome, SourceError> {
        info!("Searching Pulsedive for {}", query);
        let template = endpoint(&self.base, "threat/{}");
        let candidates = variants::candidate_urls(&template, &variants::generate(query, &VARIANTS));

        let hit = variants::first_hit(&candidates, |url| self.threat_page(url)).await;
        let url = match hit {
            Some(url) => url,
            None => {
                let search = endpoint(&self.base, "search");
                let params = [("q", query.as_str()), ("type", "threat")];
                let page = fetch_ok(self.fetcher.as_ref(), &search, &params).await?;
                match search_result(&page.body, &self.base, query) {
                    Some(url) => url,
                    None => return Ok(SourceOutcome::Empty),
                }
            }
        };

        info!("Pulsedive threat page: {}", url);
        Ok(SourceOutcome::Resources(vec![Resource::new(
            format!("Pulsedive threat: {}", query),
            url,
        )]))
    }
}

/// A threat page carries one of the threat blocks, an `h1` about a threat,
/// or talks about threat intelligence.
pub fn is_threat_page(body: &str) -> bool {
    let doc = Html::parse_document(body);
    doc.select(&THREAT_BLOCK).next().is_some()
        || doc
            .select(&H1)
            .any(|h| clean_text(h).to_lowercase().contains("threat"))
        || document_text(&doc)
            .to_lowercase()
            .contains("threat intelligence")
}

/// First `/threat/` link whose href mentions the query.
pub fn search_result(body: &str, base: &str, query: &Query) -> Option<String> {
    let doc = Html::parse_document(body);
    anchors(doc.root_element())
        .into_iter()
        .find(|(_, href)| href.contains("/threat/") && query.is_in(href))
        .and_then(|(_, href)| join_url(base, &href))
}
