//! In-memory inverted index over search summaries.
//!
//! Scoring is TF-IDF with per-field boosts. Every query term must match
//! (AND semantics). A query term matches index terms it is a prefix of;
//! when it prefixes nothing, terms within a Jaro-Winkler similarity of
//! [`FUZZY_THRESHOLD`] match instead, at a discount.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use strsim::jaro_winkler;

use super::SearchHit;
use crate::models::SearchSummary;

/// Field weights. Fields not listed weigh 1.
pub const FIELD_BOOSTS: &[(&str, f64)] = &[("name", 10.0), ("pet_name", 2.0)];

/// Minimum similarity for a typo-tolerant match.
pub const FUZZY_THRESHOLD: f64 = 0.9;

/// Score multiplier for a term matched only by prefix.
const PREFIX_FACTOR: f64 = 0.5;

/// Score multiplier for a fuzzy match, applied on top of the similarity.
const FUZZY_FACTOR: f64 = 0.25;

fn boost(field: &str) -> f64 {
    FIELD_BOOSTS
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, b)| *b)
        .unwrap_or(1.0)
}

/// Lowercased alphanumeric runs.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Boosted term frequencies of one summary.
fn weigh(summary: &SearchSummary) -> HashMap<String, f64> {
    let mut weights = HashMap::new();
    for (field, text) in summary.fields() {
        let b = boost(field);
        for term in tokenize(text) {
            *weights.entry(term).or_insert(0.0) += b;
        }
    }
    weights
}

/// Counts describing index contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub documents: usize,
    pub terms: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextIndex {
    documents: BTreeMap<String, SearchSummary>,
    /// term -> document id -> boosted term frequency
    postings: BTreeMap<String, BTreeMap<String, f64>>,
}

impl TextIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            documents: self.documents.len(),
            terms: self.postings.len(),
        }
    }

    pub fn document(&self, id: &str) -> Option<&SearchSummary> {
        self.documents.get(id)
    }

    /// Insert or replace the summary for `summary.id`.
    pub fn update(&mut self, summary: SearchSummary) {
        self.remove(&summary.id);

        for (term, weight) in weigh(&summary) {
            self.postings
                .entry(term)
                .or_default()
                .insert(summary.id.clone(), weight);
        }
        self.documents.insert(summary.id.clone(), summary);
    }

    /// Remove a document. Returns whether it was indexed.
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(old) = self.documents.remove(id) else {
            return false;
        };

        for term in weigh(&old).into_keys() {
            if let Some(docs) = self.postings.get_mut(&term) {
                docs.remove(id);
                if docs.is_empty() {
                    self.postings.remove(&term);
                }
            }
        }
        true
    }

    pub fn reset(&mut self) {
        self.documents.clear();
        self.postings.clear();
    }

    fn idf(&self, doc_count: usize) -> f64 {
        (1.0 + self.documents.len() as f64 / doc_count.max(1) as f64).ln()
    }

    /// Index terms matched by one query term, with their score multiplier.
    fn expand(&self, query_term: &str) -> Vec<(&str, f64)> {
        let prefixed: Vec<(&str, f64)> = self
            .postings
            .range(query_term.to_string()..)
            .take_while(|(term, _)| term.starts_with(query_term))
            .map(|(term, _)| {
                let factor = if term == query_term { 1.0 } else { PREFIX_FACTOR };
                (term.as_str(), factor)
            })
            .collect();
        if !prefixed.is_empty() {
            return prefixed;
        }

        self.postings
            .keys()
            .filter_map(|term| {
                let similarity = jaro_winkler(query_term, term);
                (similarity >= FUZZY_THRESHOLD).then_some((term.as_str(), similarity * FUZZY_FACTOR))
            })
            .collect()
    }

    /// Ranked matches for `query`, best first. Ties order by id.
    pub fn search(&self, query: &str) -> Vec<SearchHit> {
        let terms = tokenize(query);
        if terms.is_empty() {
            return Vec::new();
        }

        let mut scores: HashMap<&str, f64> = HashMap::new();
        let mut matched: Option<HashSet<&str>> = None;

        for query_term in &terms {
            let mut term_docs: HashSet<&str> = HashSet::new();
            for (term, factor) in self.expand(query_term) {
                let Some(docs) = self.postings.get(term) else {
                    continue;
                };
                let idf = self.idf(docs.len());
                for (id, weight) in docs {
                    *scores.entry(id.as_str()).or_insert(0.0) += weight * idf * factor;
                    term_docs.insert(id.as_str());
                }
            }

            matched = Some(match matched {
                None => term_docs,
                Some(prev) => prev.intersection(&term_docs).copied().collect(),
            });
        }

        let matched = matched.unwrap_or_default();
        let mut hits: Vec<SearchHit> = matched
            .into_iter()
            .map(|id| SearchHit {
                id: id.to_string(),
                score: scores.get(id).copied().unwrap_or(0.0),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: &str, name: &str, pet_name: &str, note: &str) -> SearchSummary {
        SearchSummary {
            id: id.into(),
            name: name.into(),
            pet_name: pet_name.into(),
            note: note.into(),
            ..Default::default()
        }
    }

    fn sample() -> TextIndex {
        let mut index = TextIndex::new();
        index.update(summary("c-1", "Ann Smith", "Rex", ""));
        index.update(summary("c-2", "Bob Jones", "Smithers", "referred by smith"));
        index.update(summary("c-3", "Carol White", "Tom", "allergic to penicillin"));
        index
    }

    fn ids(hits: &[SearchHit]) -> Vec<&str> {
        hits.iter().map(|h| h.id.as_str()).collect()
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("Ann O'Neil, 555-0001"), vec!["ann", "o", "neil", "555", "0001"]);
        assert!(tokenize("  --  ").is_empty());
    }

    #[test]
    fn test_boosted_field_ranks_first() {
        let hits = sample().search("smith");
        assert_eq!(ids(&hits), vec!["c-1", "c-2"]);
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn test_prefix_match() {
        let hits = sample().search("penic");
        assert_eq!(ids(&hits), vec!["c-3"]);
    }

    #[test]
    fn test_all_terms_required() {
        let index = sample();
        assert_eq!(ids(&index.search("ann rex")), vec!["c-1"]);
        assert!(index.search("ann tom").is_empty());
    }

    #[test]
    fn test_fuzzy_fallback() {
        let hits = sample().search("penicilin");
        assert_eq!(ids(&hits), vec!["c-3"]);
        assert!(sample().search("zzzz").is_empty());
    }

    #[test]
    fn test_update_is_idempotent() {
        let mut index = sample();
        let before = index.search("smith");
        let stats = index.stats();

        index.update(summary("c-1", "Ann Smith", "Rex", ""));
        index.update(summary("c-1", "Ann Smith", "Rex", ""));

        assert_eq!(index.search("smith"), before);
        assert_eq!(index.stats(), stats);
    }

    #[test]
    fn test_update_replaces_old_terms() {
        let mut index = sample();
        index.update(summary("c-1", "Ann Baker", "Rex", ""));
        assert_eq!(ids(&index.search("smith")), vec!["c-2"]);
        assert_eq!(ids(&index.search("baker")), vec!["c-1"]);
    }

    #[test]
    fn test_remove_and_reset() {
        let mut index = sample();
        assert!(index.remove("c-3"));
        assert!(!index.remove("c-3"));
        assert!(index.search("penicillin").is_empty());

        index.reset();
        assert!(index.is_empty());
        assert_eq!(index.stats().terms, 0);
    }
}
