use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};

use super::{endpoint, outcome, resolve_href, Adapter};
use crate::config::Settings;
use crate::error::SourceError;
use crate::fetch::{fetch_ok, Fetcher};
use crate::model::{Query, Resource, Source, SourceOutcome};
use crate::parser::{anchors, clean_text, join_url, truncate};

const PROFILES_PATH: &str = "category/threat-actor-profiles/";
const PROFILE_MARKER: &str = "dark-web-profile";
const UNKNOWN_TITLE: &str = "Unknown Title";
const MAX_EXCERPT: usize = 300;
const MIN_PARAGRAPH: usize = 50;

static ARTICLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("article").unwrap());
static POST: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.post, div.entry, div.search-result").unwrap());
static HEADING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1, h2, h3, h4").unwrap());
static LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());
static HREF: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static EXCERPT: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        "p.excerpt, p.summary, p.description, div.excerpt, div.summary, div.description",
    )
    .unwrap()
});
static PARAGRAPH: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p").unwrap());
static DATE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        "time.date, time.published, time.post-date, span.date, span.published, span.post-date",
    )
    .unwrap()
});

/// SOCRadar blog search with the threat actor profile category as fallback.
pub struct SocRadar {
    fetcher: Arc<dyn Fetcher>,
    base: String,
    max_results: usize,
}

impl SocRadar {
    pub fn new(settings: &Settings, fetcher: Arc<dyn Fetcher>) -> Self {
        SocRadar {
            fetcher,
            base: settings.sources.socradar_base.clone(),
            max_results: settings.max_results,
        }
    }

    fn search_url(&self, query: &Query) -> String {
        format!(
            "{}/?s={}",
            self.base.trim_end_matches('/'),
            query.lower().replace(' ', "+")
        )
    }
}

#[async_trait]
impl Adapter for SocRadar {
    fn source(&self) -> Source {
        Source::SocRadar
    }

    async fn search(&self, query: &Query) -> Result<SourceOutcome, SourceError> {
        info!("Searching SOCRadar for {}", query);
        let page = fetch_ok(self.fetcher.as_ref(), &self.search_url(query), &[]).await?;
        let mut found = parse_articles(&page.body, &self.base, query);

        if found.is_empty() {
            debug!("No SOCRadar articles, trying threat actor profiles");
            let url = endpoint(&self.base, PROFILES_PATH);
            let page = fetch_ok(self.fetcher.as_ref(), &url, &[]).await?;
            found = parse_profiles(&page.body, &self.base, query);
        }

        found.truncate(self.max_results);
        info!("SOCRadar: {} article(s)", found.len());
        Ok(outcome(found))
    }
}

/// Search result posts with a link and a title mentioning the query.
pub fn parse_articles(body: &str, base: &str, query: &Query) -> Vec<Resource> {
    let doc = Html::parse_document(body);
    let mut posts: Vec<ElementRef> = doc.select(&ARTICLE).collect();
    if posts.is_empty() {
        posts = doc.select(&POST).collect();
    }

    posts
        .into_iter()
        .filter_map(|post| {
            let article = article(post, base);
            (!article.url.is_empty() && query.is_in(&article.title)).then_some(article)
        })
        .collect()
}

fn article(post: ElementRef, base: &str) -> Resource {
    let title = post
        .select(&HEADING)
        .next()
        .or_else(|| post.select(&LINK).next())
        .map(clean_text)
        .unwrap_or_else(|| UNKNOWN_TITLE.to_string());
    let url = post
        .select(&HREF)
        .next()
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| resolve_href(base, href))
        .unwrap_or_default();

    let excerpt = post.select(&EXCERPT).next().map(clean_text).or_else(|| {
        post.select(&PARAGRAPH)
            .map(clean_text)
            .find(|text| text.chars().count() > MIN_PARAGRAPH)
    });

    let mut resource = Resource::new(title, url);
    resource.snippet = excerpt.map(|text| truncate(&text, MAX_EXCERPT));
    resource.date = post.select(&DATE).next().map(clean_text);
    resource
}

/// Profile links from the category page whose label mentions the query.
pub fn parse_profiles(body: &str, base: &str, query: &Query) -> Vec<Resource> {
    let doc = Html::parse_document(body);
    anchors(doc.root_element())
        .into_iter()
        .filter(|(label, href)| href.contains(PROFILE_MARKER) && query.is_in(label))
        .filter_map(|(label, href)| {
            let url = if href.starts_with("http") {
                href
            } else {
                join_url(base, &href)?
            };
            let mut resource = Resource::new(label, url);
            resource.snippet = Some(format!("Threat actor profile for {}", query));
            resource.publisher = Some("Threat Actor Profiles".to_string());
            Some(resource)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::StaticFetcher;

    const BASE: &str = "https://socradar.io";

    const SEARCH: &str = r#"<html><body>
        <article>
          <h2><a href="https://socradar.io/apt-profile-lazarus-group/">APT Profile: Lazarus Group</a></h2>
          <time class="published">March 4, 2024</time>
          <p>Short teaser.</p>
          <p>Lazarus Group has been conducting financially motivated campaigns against exchanges for years.</p>
        </article>
        <article>
          <h2>Weekly roundup</h2>
          <a href="/weekly-roundup/">Read</a>
          <div class="excerpt">Lazarus shows up here, but not in the title.</div>
        </article>
        <article>
          <h3>Lazarus without a link</h3>
        </article>
      </body></html>"#;

    #[test]
    fn articles_need_url_and_title_match() {
        let found = parse_articles(SEARCH, BASE, &Query::new("Lazarus").unwrap());
        assert_eq!(found.len(), 1);
        let a = &found[0];
        assert_eq!(a.title, "APT Profile: Lazarus Group");
        assert_eq!(a.url, "https://socradar.io/apt-profile-lazarus-group/");
        assert_eq!(a.date.as_deref(), Some("March 4, 2024"));
        assert!(a.snippet.as_deref().unwrap().starts_with("Lazarus Group has been"));
    }

    #[test]
    fn div_posts_when_no_articles() {
        let html = r#"<div class="post"><a href="/turla-snake/">Turla and Snake</a>
            <p class="summary">Short.</p></div>"#;
        let found = parse_articles(html, BASE, &Query::new("turla").unwrap());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Turla and Snake");
        assert_eq!(found[0].url, "https://socradar.io/turla-snake/");
        assert_eq!(found[0].snippet.as_deref(), Some("Short."));
    }

    #[test]
    fn profile_links() {
        let html = r#"<a href="/dark-web-profile-lazarus-group/">Dark Web Profile: Lazarus Group</a>
            <a href="https://socradar.io/dark-web-profile-apt29/">Dark Web Profile: APT29</a>
            <a href="/lazarus-news/">Lazarus news</a>"#;
        let found = parse_profiles(html, BASE, &Query::new("lazarus").unwrap());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].url, "https://socradar.io/dark-web-profile-lazarus-group/");
    }

    #[tokio::test]
    async fn search_caps_articles() {
        let many: String = (0..14)
            .map(|i| {
                format!(
                    r#"<article><h2><a href="/lazarus-{}/">Lazarus report {}</a></h2></article>"#,
                    i, i
                )
            })
            .collect();
        let fetcher = StaticFetcher::new().page("https://socradar.io/?s=lazarus", &many);
        let adapter = SocRadar::new(&Settings::default(), Arc::new(fetcher));
        let outcome = adapter.search(&Query::new("Lazarus").unwrap()).await.unwrap();

        let SourceOutcome::Resources(found) = outcome else {
            panic!("expected resources");
        };
        assert_eq!(found.len(), 10);
        assert_eq!(found[9].url, "https://socradar.io/lazarus-9/");
    }

    #[tokio::test]
    async fn falls_back_to_profiles() {
        let fetcher = StaticFetcher::new()
            .page("https://socradar.io/?s=fancy+bear", "<p>No results</p>")
            .page(
                "https://socradar.io/category/threat-actor-profiles/",
                r#"<a href="/dark-web-profile-fancy-bear/">Dark Web Profile: Fancy Bear</a>"#,
            );
        let adapter = SocRadar::new(&Settings::default(), Arc::new(fetcher));
        let outcome = adapter.search(&Query::new("Fancy Bear").unwrap()).await.unwrap();
        let SourceOutcome::Resources(found) = outcome else {
            panic!("expected resources");
        };
        assert_eq!(found[0].snippet.as_deref(), Some("Threat actor profile for Fancy Bear"));
    }
}
