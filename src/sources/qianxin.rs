use std::sync::Arc;

use async_trait::async_trait;
use itertools::Itertools;
use scraper::Html;
use tracing::{debug, info};

use super::{endpoint, outcome, Adapter};
use crate::config::Settings;
use crate::error::SourceError;
use crate::fetch::{fetch_ok, Fetcher};
use crate::model::{Query, Resource, Source, SourceOutcome};
use crate::parser::{anchors, document_text, join_url};

const LIST_PATH: &str = "apt/apt";
const DETAIL_MARKER: &str = "/apt/detail/";

/// Detail links pulled from the APT list page.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Listing {
    /// Links whose label or href names the query.
    pub direct: Vec<Resource>,
    /// Every detail link, used when nothing names the query but the page mentions it.
    pub unverified: Vec<Resource>,
    pub mentions_query: bool,
}

/// QiAnXin threat intelligence APT list.
pub struct QiAnXin {
    fetcher: Arc<dyn Fetcher>,
    base: String,
    max_probes: usize,
}

impl QiAnXin {
    pub fn new(settings: &Settings, fetcher: Arc<dyn Fetcher>) -> Self {
        QiAnXin {
            fetcher,
            base: settings.sources.qianxin_base.clone(),
            max_probes: settings.max_results,
        }
    }
}

#[async_trait]
impl Adapter for QiAnXin {
    fn source(&self) -> Source {
        Source::QiAnXin
    }

    async fn search(&self, query: &Query) -> Result<SourceOutcome, SourceError> {
        info!("Searching QiAnXin for {}", query);
        let page = fetch_ok(self.fetcher.as_ref(), &endpoint(&self.base, LIST_PATH), &[]).await?;
        let listing = parse(&page.body, &self.base, query);

        if !listing.direct.is_empty() {
            info!("QiAnXin: {} link(s)", listing.direct.len());
            return Ok(outcome(listing.direct));
        }
        if !listing.mentions_query {
            return Ok(SourceOutcome::Empty);
        }

        let mut confirmed = Vec::new();
        for link in listing.unverified.into_iter().take(self.max_probes) {
            if self.fetcher.probe_exists(&link.url).await {
                confirmed.push(link);
            } else {
                debug!("QiAnXin detail {} not reachable", link.url);
            }
        }
        info!("QiAnXin: {} confirmed link(s)", confirmed.len());
        Ok(outcome(confirmed))
    }
}

pub fn parse(body: &str, base: &str, query: &Query) -> Listing {
    let doc = Html::parse_document(body);
    let details: Vec<(String, Resource)> = anchors(doc.root_element())
        .into_iter()
        .filter(|(_, href)| href.contains(DETAIL_MARKER))
        .filter_map(|(label, href)| {
            let url = join_url(base, &href)?;
            let title = if label.is_empty() { url.clone() } else { label.clone() };
            Some((format!("{} {}", label, href), Resource::new(title, url)))
        })
        .unique_by(|(_, r)| r.url.clone())
        .collect();

    let direct = details
        .iter()
        .filter(|(haystack, _)| query.is_in(haystack))
        .map(|(_, r)| r.clone())
        .collect();

    Listing {
        direct,
        unverified: details.into_iter().map(|(_, r)| r).collect(),
        mentions_query: query.is_in(&document_text(&doc)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::StaticFetcher;

    const BASE: &str = "https://ti.qianxin.com";
    const LIST: &str = r#"<html><body>
        <h2>APT groups tracked, including Ocean Lotus</h2>
        <a href="/apt/detail/5fc9b4f0">Lazarus</a>
        <a href="/apt/detail/5fc9b4f0">Lazarus (again)</a>
        <a href="/apt/detail/apt-c-00">海莲花</a>
        <a href="/news/lazarus">Lazarus news</a>
      </body></html>"#;

    #[test]
    fn direct_matches_by_label_or_href() {
        let listing = parse(LIST, BASE, &Query::new("lazarus").unwrap());
        assert_eq!(listing.direct.len(), 1);
        assert_eq!(listing.direct[0].url, "https://ti.qianxin.com/apt/detail/5fc9b4f0");

        let listing = parse(LIST, BASE, &Query::new("APT-C-00").unwrap());
        assert_eq!(listing.direct[0].title, "海莲花");
    }

    #[test]
    fn mention_without_direct_link() {
        let listing = parse(LIST, BASE, &Query::new("Ocean Lotus").unwrap());
        assert!(listing.direct.is_empty());
        assert!(listing.mentions_query);
        assert_eq!(listing.unverified.len(), 2);
    }

    #[tokio::test]
    async fn probes_detail_links_when_only_mentioned() {
        let fetcher = Arc::new(
            StaticFetcher::new()
                .page("https://ti.qianxin.com/apt/apt", LIST)
                .page("https://ti.qianxin.com/apt/detail/apt-c-00", "<h1>OceanLotus</h1>"),
        );
        let adapter = QiAnXin::new(&Settings::default(), fetcher.clone());
        let outcome = adapter.search(&Query::new("ocean lotus").unwrap()).await.unwrap();

        let SourceOutcome::Resources(found) = outcome else {
            panic!("expected resources");
        };
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].url, "https://ti.qianxin.com/apt/detail/apt-c-00");
        assert!(fetcher
            .requested()
            .contains(&"HEAD https://ti.qianxin.com/apt/detail/5fc9b4f0".to_string()));
    }

    #[tokio::test]
    async fn head_checks_capped_at_max_results() {
        let mut list = String::from("<h2>Reports on Ocean Lotus</h2>");
        for i in 0..13 {
            list.push_str(&format!(r#"<a href="/apt/detail/g{}">Group {}</a>"#, i, i));
        }
        let fetcher = Arc::new(StaticFetcher::new().page("https://ti.qianxin.com/apt/apt", &list));
        let adapter = QiAnXin::new(&Settings::default(), fetcher.clone());
        let outcome = adapter.search(&Query::new("ocean lotus").unwrap()).await.unwrap();

        assert!(matches!(outcome, SourceOutcome::Empty));
        let heads: Vec<String> = fetcher
            .requested()
            .into_iter()
            .filter(|r| r.starts_with("HEAD "))
            .collect();
        assert_eq!(heads.len(), 10);
        assert_eq!(heads[9], "HEAD https://ti.qianxin.com/apt/detail/g9");
    }

    #[tokio::test]
    async fn unrelated_page_is_empty() {
        let fetcher = StaticFetcher::new().page("https://ti.qianxin.com/apt/apt", LIST);
        let adapter = QiAnXin::new(&Settings::default(), Arc::new(fetcher));
        let outcome = adapter.search(&Query::new("Equation").unwrap()).await.unwrap();
        assert!(matches!(outcome, SourceOutcome::Empty));
    }
}
