use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::join_all;
use futures::FutureExt;
use itertools::Itertools;
use tracing::{info, warn};

use crate::config::Settings;
use crate::fetch::Fetcher;
use crate::model::{AggregateResult, Query, Source, SourceOutcome};
use crate::sources::{default_adapters, Adapter};

/// Runs every adapter for one query and merges what they return.
pub struct Aggregator {
    adapters: Vec<Box<dyn Adapter>>,
}

impl Aggregator {
    pub fn new(adapters: Vec<Box<dyn Adapter>>) -> Self {
        Aggregator { adapters }
    }

    pub fn with_defaults(settings: &Settings, fetcher: Arc<dyn Fetcher>) -> Self {
        Self::new(default_adapters(settings, fetcher))
    }

    pub fn sources(&self) -> Vec<Source> {
        self.adapters.iter().map(|a| a.source()).collect()
    }

    /// All adapters run concurrently; none can fail the run.
    pub async fn run(&self, query: &Query) -> AggregateResult {
        let outcomes = join_all(
            self.adapters
                .iter()
                .map(|adapter| contained(adapter.as_ref(), query)),
        )
        .await;

        let result = assemble(query, outcomes);
        info!(
            "{} of {} sources returned data, {} resource(s)",
            result.sources.values().filter(|o| !o.is_empty()).count(),
            result.sources.len(),
            result.resource_count
        );
        result
    }
}

/// Adapter boundary: errors and panics both become `Empty`.
async fn contained(adapter: &dyn Adapter, query: &Query) -> (Source, SourceOutcome) {
    let source = adapter.source();
    let outcome = match AssertUnwindSafe(adapter.search(query)).catch_unwind().await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            warn!("{} search failed: {}", source, e);
            SourceOutcome::Empty
        }
        Err(_) => {
            warn!("{} search panicked", source);
            SourceOutcome::Empty
        }
    };
    (source, outcome)
}

/// Pure assembly of per-source outcomes into the aggregate. Keyed by source, so the
/// result does not depend on the order adapters finished in.
pub fn assemble<I>(query: &Query, outcomes: I) -> AggregateResult
where
    I: IntoIterator<Item = (Source, SourceOutcome)>,
{
    let sources: BTreeMap<Source, SourceOutcome> = outcomes.into_iter().collect();

    let references = sources
        .values()
        .flat_map(SourceOutcome::reference_links)
        .unique_by(|link| link.url.clone())
        .collect();
    let technique_count = sources.values().map(SourceOutcome::technique_count).sum();
    let resource_count = sources.values().map(SourceOutcome::resource_count).sum();

    AggregateResult {
        query: query.to_string(),
        sources,
        references,
        technique_count,
        resource_count,
    }
}
