use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::info;

use super::{dedup_by_url, endpoint, outcome, resolve_href, Adapter};
use crate::config::Settings;
use crate::error::SourceError;
use crate::fetch::{fetch_ok, Fetcher};
use crate::model::{Query, Resource, Source, SourceOutcome};
use crate::parser::{anchors, clean_text, join_url, truncate};

const SEARCH_PATH: &str = "content/search";
const DEFAULT_TITLE: &str = "NetEnrich Resource";
const MAX_SNIPPET: usize = 200;

static RESULT_CARD: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        "div.result, div.search-result, div.content-item, \
         article.result, article.search-result, article.content-item",
    )
    .unwrap()
});
static CARD_TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1, h2, h3, h4, a").unwrap());
static CARD_LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static CARD_SNIPPET: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p, div.snippet, div.excerpt").unwrap());

/// NetEnrich knowledge base search.
pub struct NetEnrich {
    fetcher: Arc<dyn Fetcher>,
    base: String,
    max_results: usize,
}

impl NetEnrich {
    pub fn new(settings: &Settings, fetcher: Arc<dyn Fetcher>) -> Self {
        NetEnrich {
            fetcher,
            base: settings.sources.netenrich_base.clone(),
            max_results: settings.max_results,
        }
    }
}

#[async_trait]
impl Adapter for NetEnrich {
    fn source(&self) -> Source {
        Source::NetEnrich
    }

    async fn search(&self, query: &Query) -> Result<SourceOutcome, SourceError> {
        info!("Searching NetEnrich for {}", query);
        let url = endpoint(&self.base, SEARCH_PATH);
        let page = fetch_ok(self.fetcher.as_ref(), &url, &[("query", query.as_str())]).await?;
        let mut found = parse(&page.body, &self.base, query);
        found.truncate(self.max_results);
        info!("NetEnrich: {} resource(s)", found.len());
        Ok(outcome(found))
    }
}

/// Matching links anywhere on the page, then matching result cards, unique by URL.
pub fn parse(body: &str, base: &str, query: &Query) -> Vec<Resource> {
    let doc = Html::parse_document(body);

    let links = anchors(doc.root_element())
        .into_iter()
        .filter(|(label, href)| query.is_in(label) || query.is_in(href))
        .filter_map(|(label, href)| {
            let url = resolve_href(base, &href)?;
            let title = if label.is_empty() {
                DEFAULT_TITLE.to_string()
            } else {
                label
            };
            Some(Resource::new(title, url))
        });

    let cards = doc.select(&RESULT_CARD).filter_map(|card| {
        let title = clean_text(card.select(&CARD_TITLE).next()?);
        if !query.is_in(&title) {
            return None;
        }
        let href = card.select(&CARD_LINK).next()?.value().attr("href")?;
        let url = join_url(base, href).filter(|url| url.starts_with("http"))?;
        let mut resource = Resource::new(title, url);
        resource.snippet = card
            .select(&CARD_SNIPPET)
            .next()
            .map(|el| truncate(&clean_text(el), MAX_SNIPPET));
        Some(resource)
    });

    dedup_by_url(links.chain(cards).collect())
}
