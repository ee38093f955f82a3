use crate::error::{Result, TypeaheadError};
use crate::models::Item;
use crate::settings::IndexSettings;
use crate::store::IndexStore;
use crate::text;

/// Per-query knobs. `limit = 0` means no truncation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOptions {
    pub limit: usize,
    pub cache: bool,
    pub expiry_secs: u64,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            limit: 5,
            cache: true,
            expiry_secs: 600,
        }
    }
}

/// Answers free-text prefix queries by intersecting the postings sets of
/// every query word, with a TTL'd result cache in the store.
#[derive(Debug, Clone)]
pub struct Matcher<S: IndexStore> {
    collection: String,
    settings: IndexSettings,
    store: S,
}

impl<S: IndexStore> Matcher<S> {
    pub fn new(collection: impl Into<String>, settings: IndexSettings, store: S) -> Self {
        Self {
            collection: collection.into(),
            settings,
            store,
        }
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Words that take part in the intersection, sorted into the canonical
    /// cache-key order. A word survives only when it is long enough AND not
    /// a stop word.
    fn query_words(&self, query: &str) -> Vec<String> {
        let normalized = text::normalize(query);
        let mut words: Vec<String> = normalized
            .split(' ')
            .filter(|word| {
                !word.is_empty()
                    && text::grapheme_count(word) >= self.settings.min_complete
                    && !self.settings.stop_words().contains(*word)
            })
            .map(str::to_string)
            .collect();
        words.sort();
        words
    }

    /// Ranked matches for `query`: score descending, ties by id ascending.
    /// No surviving query words means an empty result without touching the
    /// store; "no matches" is never an error.
    pub fn matches(&self, query: &str, options: &MatchOptions) -> Result<Vec<Item>> {
        let words = self.query_words(query);
        if words.is_empty() {
            return Ok(Vec::new());
        }

        let cache_key = self.settings.cache_key(&self.collection, &words);
        let sources: Vec<String> = words
            .iter()
            .map(|word| self.settings.postings_key(&self.collection, word))
            .collect();

        // A single-word cache key IS that word's postings key, so the
        // intersection would write the set onto itself and the expiry would
        // put a TTL on live postings. Read the postings set directly instead.
        if sources.len() > 1 {
            let fresh = !options.cache || !self.store.exists(&cache_key)?;
            if fresh {
                self.store.intersect_weighted(&cache_key, &sources)?;
                self.store.expire(&cache_key, options.expiry_secs)?;
            }
        }

        let stop = if options.limit == 0 {
            -1
        } else {
            i64::try_from(options.limit).unwrap_or(i64::MAX) - 1
        };
        let ids = self.store.sorted_set_range_desc(&cache_key, 0, stop)?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let data_key = self.settings.data_key(&self.collection);
        let payloads = self.store.hash_multi_get(&data_key, &ids)?;

        let mut items = Vec::with_capacity(ids.len());
        for (id, payload) in ids.iter().zip(payloads) {
            // A missing payload is a stale postings reference (e.g. mid
            // replace); a payload that no longer parses is corruption and
            // must not be silently filtered.
            let Some(payload) = payload else { continue };
            let item: Item = serde_json::from_str(&payload).map_err(|source| {
                TypeaheadError::CorruptPayload {
                    id: id.clone(),
                    source,
                }
            })?;
            items.push(item);
        }
        Ok(items)
    }
}
