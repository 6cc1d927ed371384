use crate::model::CandidateMatch;

const EXACT: u32 = 100;
const SUBSTRING: u32 = 50;
const WORD_EXACT: u32 = 20;
const WORD_PARTIAL: u32 = 10;
const TOKEN_BONUS: u32 = 5;

/// Relevance of `label` to `query`. Pure function of the two lowercased strings;
/// 0 means the candidate is excluded.
pub fn score(label: &str, query: &str) -> u32 {
    if label.is_empty() || query.is_empty() {
        return 0;
    }

    let label = label.to_lowercase();
    let query = query.to_lowercase();
    let mut score = 0;

    if query == label {
        score += EXACT;
    } else if label.contains(&query) {
        score += SUBSTRING;
    }

    for q in query.split_whitespace() {
        for l in label.split_whitespace() {
            if q == l {
                score += WORD_EXACT;
            } else if l.contains(q) || q.contains(l) {
                score += WORD_PARTIAL;
            }
        }
    }

    for token in ["apt", "group"] {
        if query.contains(token) && label.contains(token) {
            score += TOKEN_BONUS;
        }
    }

    score
}

/// Score (label, url) pairs, drop zero scores, sort descending. Ties keep input order.
pub fn rank<I>(candidates: I, query: &str) -> Vec<CandidateMatch>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut ranked: Vec<CandidateMatch> = candidates
        .into_iter()
        .filter_map(|(label, url)| {
            let score = score(&label, query);
            (score > 0).then_some(CandidateMatch { label, url, score })
        })
        .collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(labels: &[&str]) -> Vec<(String, String)> {
        labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.to_string(), format!("https://x.test/{}", i)))
            .collect()
    }

    #[test]
    fn substring_plus_word_match() {
        assert_eq!(score("Lazarus Group", "lazarus"), 70);
    }

    #[test]
    fn split_query_against_joined_label() {
        // apt28 contains apt (+10), apt28 contains 28 (+10), apt co-occurrence (+5)
        assert_eq!(score("APT28", "apt 28"), 25);
    }

    #[test]
    fn exact_match() {
        // exact (+100), word (+20), apt bonus (+5)
        assert_eq!(score("APT28", "apt28"), 125);
        // exact (+100), two words (+40), apt and group bonuses (+10)
        assert_eq!(score("APT Group", "apt group"), 150);
    }

    #[test]
    fn unrelated_is_zero() {
        assert_eq!(score("Turla", "lazarus"), 0);
        assert_eq!(score("", "lazarus"), 0);
        assert_eq!(score("Turla", ""), 0);
    }

    #[test]
    fn deterministic() {
        for _ in 0..3 {
            assert_eq!(score("Fancy Bear", "bear"), score("Fancy Bear", "bear"));
        }
        assert_eq!(score("FANCY bear", "Bear"), score("fancy bear", "bear"));
    }

    #[test]
    fn rank_sorts_desc_excludes_zero_and_is_stable() {
        let ranked = rank(
            pairs(&["Turla", "Lazarus Group", "Lazarus", "Andariel", "Lazarus Team"]),
            "lazarus",
        );
        let labels: Vec<&str> = ranked.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["Lazarus", "Lazarus Group", "Lazarus Team"]);
        assert_eq!(ranked[0].score, 120);
        assert_eq!(ranked[1].score, ranked[2].score);
        assert!(ranked.iter().all(|c| c.score > 0));
        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(ranked[1].url, "https://x.test/1");
        assert_eq!(ranked[2].url, "https://x.test/4");
    }

    #[test]
    fn exact_name_ranks_first() {
        let ranked = rank(pairs(&["APT28 Tools", "APT 28", "APT29", "Kimsuky"]), "apt 28");
        assert_eq!(ranked[0].label, "APT 28");
        assert!(ranked[0].score >= 100);
        assert!(ranked.iter().all(|c| c.label != "Kimsuky"));
    }
}
