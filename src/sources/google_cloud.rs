use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::info;

use super::{outcome, Adapter};
use crate::config::Settings;
use crate::error::SourceError;
use crate::fetch::{fetch_ok, Fetcher};
use crate::model::{Query, Resource, Source, SourceOutcome};
use crate::parser::{clean_text, truncate};

const MAX_DESCRIPTION: usize = 500;

static SECTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div, section, article").unwrap());
static PARAGRAPH: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p").unwrap());
static HEADING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1, h2, h3, h4").unwrap());

/// Google Cloud's APT groups insight page.
pub struct GoogleCloud {
    fetcher: Arc<dyn Fetcher>,
    url: String,
}

impl GoogleCloud {
    pub fn new(settings: &Settings, fetcher: Arc<dyn Fetcher>) -> Self {
        GoogleCloud {
            fetcher,
            url: settings.sources.google_cloud_url.clone(),
        }
    }
}

#[async_trait]
impl Adapter for GoogleCloud {
    fn source(&self) -> Source {
        Source::GoogleCloud
    }

    async fn search(&self, query: &Query) -> Result<SourceOutcome, SourceError> {
        info!("Searching Google Cloud APT groups for {}", query);
        let page = fetch_ok(self.fetcher.as_ref(), &self.url, &[]).await?;
        let profiles = parse(&page.body, &self.url, query);
        info!("Google Cloud APT: {} profile(s)", profiles.len());
        Ok(outcome(profiles))
    }
}

/// One entry per distinct paragraph mentioning the query. Nested containers
/// repeat their children's text, hence the dedup on the normalized description.
pub fn parse(body: &str, page_url: &str, query: &Query) -> Vec<Resource> {
    let doc = Html::parse_document(body);
    let mut seen = HashSet::new();
    let mut profiles = Vec::new();

    for section in doc.select(&SECTION) {
        if !query.is_in(&section.text().collect::<String>()) {
            continue;
        }
        let Some(paragraph) = section
            .select(&PARAGRAPH)
            .map(clean_text)
            .find(|text| query.is_in(text))
        else {
            continue;
        };
        if !seen.insert(paragraph.to_lowercase()) {
            continue;
        }

        let title = section
            .select(&HEADING)
            .map(clean_text)
            .find(|h| !h.is_empty())
            .unwrap_or_else(|| query.to_string());
        let mut profile = Resource::new(title, page_url);
        profile.snippet = Some(truncate(&paragraph, MAX_DESCRIPTION));
        profiles.push(profile);
    }

    profiles
}
