use std::collections::BTreeSet;

use crate::text;

pub const DEFAULT_MIN_COMPLETE: usize = 2;
pub const DEFAULT_INDEX_NAMESPACE: &str = "typeahead-index";
pub const DEFAULT_DATA_NAMESPACE: &str = "typeahead-data";

/// Shared configuration for loader and matcher, read-only once a call
/// begins. Also owns the key-naming scheme, which existing deployments
/// depend on byte-for-byte:
///
/// - registry key:  `<index_namespace>:<collection>`
/// - postings key:  `<index_namespace>:<collection>:<prefix>`
/// - payload key:   `<data_namespace>:<collection>` (hash keyed by item id)
/// - cache key:     `<index_namespace>:<collection>:<word1|word2|...>`
#[derive(Debug, Clone)]
pub struct IndexSettings {
    pub min_complete: usize,
    stop_words: BTreeSet<String>,
    pub index_namespace: String,
    pub data_namespace: String,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            min_complete: DEFAULT_MIN_COMPLETE,
            stop_words: ["vs", "at", "the"].iter().map(|w| (*w).to_string()).collect(),
            index_namespace: DEFAULT_INDEX_NAMESPACE.to_string(),
            data_namespace: DEFAULT_DATA_NAMESPACE.to_string(),
        }
    }
}

impl IndexSettings {
    #[must_use]
    pub fn with_min_complete(mut self, min_complete: usize) -> Self {
        self.min_complete = min_complete;
        self
    }

    /// Replaces the stop-word list. Words are normalized on entry so later
    /// membership checks against normalized query/phrase words line up.
    #[must_use]
    pub fn with_stop_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.stop_words = words
            .into_iter()
            .map(|w| text::normalize(w.as_ref()))
            .filter(|w| !w.is_empty())
            .collect();
        self
    }

    #[must_use]
    pub fn stop_words(&self) -> &BTreeSet<String> {
        &self.stop_words
    }

    #[must_use]
    pub fn index_prefix(&self, collection: &str) -> String {
        format!("{}:{collection}", self.index_namespace)
    }

    #[must_use]
    pub fn postings_key(&self, collection: &str, prefix: &str) -> String {
        format!("{}:{prefix}", self.index_prefix(collection))
    }

    #[must_use]
    pub fn data_key(&self, collection: &str) -> String {
        format!("{}:{collection}", self.data_namespace)
    }

    #[must_use]
    pub fn cache_key(&self, collection: &str, sorted_words: &[String]) -> String {
        format!("{}:{}", self.index_prefix(collection), sorted_words.join("|"))
    }
}
