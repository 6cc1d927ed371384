//! One adapter per external intelligence source.
//!
//! Adapters fetch through the injected [`Fetcher`] and do all markup work in
//! synchronous helpers, so no parsed document is held across an await point.

pub mod aptnotes;
pub mod etda;
pub mod google_cloud;
pub mod malpedia;
pub mod mitre;
pub mod netenrich;
pub mod pulsedive;
pub mod qianxin;
pub mod socradar;

use std::sync::Arc;

use async_trait::async_trait;
use itertools::Itertools;

use crate::config::Settings;
use crate::error::SourceError;
use crate::fetch::Fetcher;
use crate::model::{Query, Resource, Source, SourceOutcome};
use crate::parser::join_url;

#[async_trait]
pub trait Adapter: Send + Sync {
    fn source(&self) -> Source;

    /// `Ok(SourceOutcome::Empty)` means the source was reachable but nothing matched.
    async fn search(&self, query: &Query) -> Result<SourceOutcome, SourceError>;
}

/// Every source, in presentation order.
pub fn default_adapters(settings: &Settings, fetcher: Arc<dyn Fetcher>) -> Vec<Box<dyn Adapter>> {
    vec![
        Box::new(etda::Etda::new(settings, fetcher.clone())),
        Box::new(mitre::Mitre::new(settings, fetcher.clone())),
        Box::new(google_cloud::GoogleCloud::new(settings, fetcher.clone())),
        Box::new(netenrich::NetEnrich::new(settings, fetcher.clone())),
        Box::new(socradar::SocRadar::new(settings, fetcher.clone())),
        Box::new(pulsedive::Pulsedive::new(settings, fetcher.clone())),
        Box::new(qianxin::QiAnXin::new(settings, fetcher.clone())),
        Box::new(malpedia::Malpedia::new(settings, fetcher.clone())),
        Box::new(aptnotes::AptNotes::new(settings, fetcher)),
    ]
}

/// `base` and `path` joined with exactly one slash.
pub(crate) fn endpoint(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Site-relative hrefs are joined to `base`, absolute http(s) ones kept, anything else dropped.
pub(crate) fn resolve_href(base: &str, href: &str) -> Option<String> {
    if href.starts_with('/') {
        join_url(base, href)
    } else if href.starts_with("http") {
        Some(href.to_string())
    } else {
        None
    }
}

/// First occurrence of each URL wins.
pub(crate) fn dedup_by_url(resources: Vec<Resource>) -> Vec<Resource> {
    resources
        .into_iter()
        .unique_by(|r| r.url.clone())
        .collect()
}

pub(crate) fn outcome(resources: Vec<Resource>) -> SourceOutcome {
    if resources.is_empty() {
        SourceOutcome::Empty
    } else {
        SourceOutcome::Resources(resources)
    }
}
