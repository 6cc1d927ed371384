use std::future::Future;

use itertools::Itertools;
use tracing::debug;

use crate::model::Query;

/// Upper bound on sequential probes for one source.
pub const MAX_ATTEMPTS: usize = 5;

/// Spelling transformations applied to a query to guess a resource slug.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    LowerNoSpace,
    LowerHyphen,
    LowerUnderscore,
    Lower,
    NoSpace,
    Underscore,
}

impl Variant {
    pub fn apply(self, query: &Query) -> String {
        let text = query.as_str();
        match self {
            Variant::LowerNoSpace => query.lower().replace(' ', ""),
            Variant::LowerHyphen => query.lower().replace(' ', "-"),
            Variant::LowerUnderscore => query.lower().replace(' ', "_"),
            Variant::Lower => query.lower().to_string(),
            Variant::NoSpace => text.replace(' ', ""),
            Variant::Underscore => text.replace(' ', "_"),
        }
    }
}

/// Distinct spellings in `order`, capped at `MAX_ATTEMPTS`.
pub fn generate(query: &Query, order: &[Variant]) -> Vec<String> {
    order
        .iter()
        .map(|v| v.apply(query))
        .unique()
        .take(MAX_ATTEMPTS)
        .collect()
}

/// Fill `{}` in `template` with each variant.
pub fn candidate_urls(template: &str, variants: &[String]) -> Vec<String> {
    variants.iter().map(|v| template.replace("{}", v)).collect()
}

/// Probe candidates in order and stop at the first hit.
pub async fn first_hit<T, F, Fut>(candidates: &[String], mut probe: F) -> Option<T>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for candidate in candidates.iter().take(MAX_ATTEMPTS) {
        if let Some(hit) = probe(candidate.clone()).await {
            debug!("variant hit: {}", candidate);
            return Some(hit);
        }
        debug!("variant miss: {}", candidate);
    }
    None
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    const PULSEDIVE: &[Variant] = &[
        Variant::LowerNoSpace,
        Variant::LowerHyphen,
        Variant::Lower,
        Variant::NoSpace,
        Variant::Underscore,
    ];

    #[test]
    fn variants_in_fixed_order() {
        let q = Query::new("Fancy Bear").unwrap();
        assert_eq!(
            generate(&q, PULSEDIVE),
            vec!["fancybear", "fancy-bear", "fancy bear", "FancyBear", "Fancy_Bear"]
        );
    }

    #[test]
    fn duplicate_spellings_probe_once() {
        let q = Query::new("turla").unwrap();
        assert_eq!(generate(&q, PULSEDIVE), vec!["turla"]);
    }

    #[test]
    fn template_fill() {
        let urls = candidate_urls("https://x.test/actor/{}", &["a_b".into(), "ab".into()]);
        assert_eq!(urls, vec!["https://x.test/actor/a_b", "https://x.test/actor/ab"]);
    }

    #[tokio::test]
    async fn stops_at_first_success() {
        let seen = RefCell::new(Vec::new());
        let candidates: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let hit = first_hit(&candidates, |c| {
            seen.borrow_mut().push(c.clone());
            async move { (c == "b").then(|| c.to_uppercase()) }
        })
        .await;
        assert_eq!(hit.as_deref(), Some("B"));
        assert_eq!(*seen.borrow(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn bounded_attempts() {
        let seen = RefCell::new(0usize);
        let candidates: Vec<String> = (0..9).map(|i| i.to_string()).collect();
        let hit: Option<()> = first_hit(&candidates, |_| {
            *seen.borrow_mut() += 1;
            async { None }
        })
        .await;
        assert!(hit.is_none());
        assert_eq!(*seen.borrow(), MAX_ATTEMPTS);
    }
}
