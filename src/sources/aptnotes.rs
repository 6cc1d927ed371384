use std::sync::Arc;

use async_trait::async_trait;
use itertools::Itertools;
use rayon::prelude::*;
use serde::Deserialize;
use tracing::info;

use super::{outcome, Adapter};
use crate::config::Settings;
use crate::error::{ParseFault, SourceError};
use crate::fetch::{fetch_ok, Fetcher};
use crate::model::{Query, Resource, Source, SourceOutcome};

/// One entry of the APTnotes feed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Note {
    pub title: String,
    pub source: String,
    pub link: String,
    pub date: String,
    pub year: String,
    pub filename: String,
    #[serde(rename = "SHA-1")]
    pub sha1: String,
}

impl Note {
    /// Any term, or any word of a term, inside the title or filename.
    fn matches(&self, terms: &[String]) -> bool {
        let title = self.title.to_lowercase();
        let filename = self.filename.to_lowercase();
        let hit = |needle: &str| title.contains(needle) || filename.contains(needle);
        terms
            .iter()
            .any(|term| hit(term.as_str()) || term.split_whitespace().any(hit))
    }

    fn into_resource(self) -> Resource {
        let date = match (self.date.is_empty(), self.year.is_empty()) {
            (true, true) => None,
            (false, true) => Some(self.date),
            (true, false) => Some(self.year),
            (false, false) => Some(format!("{} ({})", self.date, self.year)),
        };
        Resource {
            title: self.title,
            url: self.link,
            snippet: None,
            date,
            publisher: (!self.source.is_empty()).then_some(self.source),
            filename: (!self.filename.is_empty()).then_some(self.filename),
            digest: (!self.sha1.is_empty()).then_some(self.sha1),
        }
    }
}

/// APTnotes research report index.
pub struct AptNotes {
    fetcher: Arc<dyn Fetcher>,
    url: String,
}

impl AptNotes {
    pub fn new(settings: &Settings, fetcher: Arc<dyn Fetcher>) -> Self {
        AptNotes {
            fetcher,
            url: settings.sources.aptnotes_url.clone(),
        }
    }
}

#[async_trait]
impl Adapter for AptNotes {
    fn source(&self) -> Source {
        Source::AptNotes
    }

    async fn search(&self, query: &Query) -> Result<SourceOutcome, SourceError> {
        info!("Loading APTnotes feed");
        let page = fetch_ok(self.fetcher.as_ref(), &self.url, &[]).await?;
        let notes: Vec<Note> = serde_json::from_str(&page.body).map_err(ParseFault::from)?;
        let found = search_notes(notes, query);
        info!("APTnotes: {} report(s) for {}", found.len(), query);
        Ok(outcome(found))
    }
}

/// Lowercased query, without spaces, with underscores, and without "apt". Blank terms are dropped.
pub fn search_terms(query: &Query) -> Vec<String> {
    let lower = query.lower();
    [
        lower.to_string(),
        lower.replace(' ', ""),
        lower.replace(' ', "_"),
        lower.replace("apt", "").trim().to_string(),
    ]
    .into_iter()
    .filter(|t| !t.is_empty())
    .unique()
    .collect()
}

/// Matching notes in feed order.
pub fn search_notes(notes: Vec<Note>, query: &Query) -> Vec<Resource> {
    let terms = search_terms(query);
    notes
        .into_par_iter()
        .filter(|note| note.matches(&terms))
        .map(Note::into_resource)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::StaticFetcher;

    fn feed() -> Vec<Note> {
        let json = std::fs::read_to_string("tests/fixtures/aptnotes.json").unwrap();
        serde_json::from_str(&json).unwrap()
    }

    fn titles(found: &[Resource]) -> Vec<&str> {
        found.iter().map(|r| r.title.as_str()).collect()
    }

    #[test]
    fn terms() {
        let q = Query::new("APT 28").unwrap();
        assert_eq!(search_terms(&q), vec!["apt 28", "apt28", "apt_28", "28"]);
        assert_eq!(search_terms(&Query::new("apt").unwrap()), vec!["apt"]);
    }

    #[test]
    fn filename_or_title_match() {
        let found = search_notes(feed(), &Query::new("APT28").unwrap());
        assert_eq!(
            titles(&found),
            vec![
                "Operation Pawn Storm: Using Decoys to Evade Detection",
                "APT28: A Window into Russia's Cyber Espionage Operations?",
            ]
        );
        let first = &found[0];
        assert_eq!(first.publisher.as_deref(), Some("Trend Micro"));
        assert_eq!(first.date.as_deref(), Some("10/22/2014 (2014)"));
        assert_eq!(first.filename.as_deref(), Some("Sofacy_APT28_Pawn_Storm"));
        assert!(first.digest.is_some());
    }

    #[test]
    fn single_words_of_a_term_match() {
        // "group" alone matches the HAMMERTOSS title
        let found = search_notes(feed(), &Query::new("Lazarus Group").unwrap());
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].title, "Lazarus Under the Hood");
        assert_eq!(found[0].digest, None);
    }

    #[test]
    fn missing_fields_default() {
        let notes: Vec<Note> = serde_json::from_str(r#"[{"Title": "Only a title"}]"#).unwrap();
        assert_eq!(notes[0].link, "");
        let r = notes[0].clone().into_resource();
        assert_eq!(r.date, None);
        assert_eq!(r.publisher, None);
    }

    #[tokio::test]
    async fn bad_feed_is_a_parse_fault() {
        let settings = Settings::default();
        let fetcher = StaticFetcher::new().page(&settings.sources.aptnotes_url, "<html>rate limited</html>");
        let adapter = AptNotes::new(&settings, Arc::new(fetcher));
        let err = adapter.search(&Query::new("APT28").unwrap()).await.unwrap_err();
        assert!(matches!(err, SourceError::Parse(ParseFault::Json(_))));
    }

    #[tokio::test]
    async fn search_feed() {
        let settings = Settings::default();
        let json = std::fs::read_to_string("tests/fixtures/aptnotes.json").unwrap();
        let fetcher = StaticFetcher::new().page(&settings.sources.aptnotes_url, &json);
        let adapter = AptNotes::new(&settings, Arc::new(fetcher));
        let outcome = adapter.search(&Query::new("hammertoss").unwrap()).await.unwrap();
        assert_eq!(outcome.resource_count(), 1);
    }
}
