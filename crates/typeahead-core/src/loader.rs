use crate::error::{Result, TypeaheadError};
use crate::models::{Item, ItemRef};
use crate::settings::IndexSettings;
use crate::store::{Batch, IndexStore};
use crate::text;

/// Writes items into the index: payload hash, per-prefix postings sets, and
/// the prefix registry. Owns the add/remove/replace protocol that keeps the
/// three consistent.
#[derive(Debug, Clone)]
pub struct Loader<S: IndexStore> {
    collection: String,
    settings: IndexSettings,
    store: S,
}

impl<S: IndexStore> Loader<S> {
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

    #[must_use]
    pub fn settings(&self) -> &IndexSettings {
        &self.settings
    }

    fn registry_key(&self) -> String {
        self.settings.index_prefix(&self.collection)
    }

    fn postings_key(&self, prefix: &str) -> String {
        self.settings.postings_key(&self.collection, prefix)
    }

    fn data_key(&self) -> String {
        self.settings.data_key(&self.collection)
    }

    fn prefixes_for(&self, item: &Item) -> std::collections::BTreeSet<String> {
        text::prefixes_for_phrase(
            &item.phrase(),
            self.settings.min_complete,
            self.settings.stop_words(),
        )
    }

    /// Indexes one item. An existing item with the same id is fully
    /// retracted first, so a re-add replaces rather than merges; pass
    /// `skip_duplicate_check` when the id is known to be absent (bulk load
    /// after `clear`).
    ///
    /// The payload write and all postings/registry writes go out as one
    /// atomic batch. An item whose term yields no prefixes is stored but
    /// unsearchable; that is not an error.
    pub fn add(&self, item: &Item, skip_duplicate_check: bool) -> Result<()> {
        item.validate()?;

        // Retraction and insertion are two separate batches. A query landing
        // between them observes the item as fully absent.
        if !skip_duplicate_check {
            self.remove(&ItemRef::from(item))?;
        }

        let member = item.id.as_member();
        let score = item.score_f64();
        // Serializing the struct re-emits defaulted fields, so the stored
        // payload always carries an explicit score.
        let payload = serde_json::to_string(item)?;

        let mut batch = Batch::default();
        batch.hash_set(self.data_key(), &member, payload);
        for prefix in self.prefixes_for(item) {
            batch.set_add(self.registry_key(), &prefix);
            batch.sorted_set_add(self.postings_key(&prefix), score, &member);
        }
        self.store.run_batch(batch)
    }

    /// Retracts one item by id. Prefixes are derived from the *stored*
    /// payload, never from caller-supplied text, so retraction always
    /// matches what was actually indexed. Removing an absent id is a no-op;
    /// a stored payload that no longer parses is surfaced as
    /// [`TypeaheadError::CorruptPayload`].
    pub fn remove(&self, item_ref: &ItemRef) -> Result<()> {
        let member = item_ref.id.as_member();
        let Some(stored) = self.store.hash_get(&self.data_key(), &member)? else {
            return Ok(());
        };
        let stored: Item =
            serde_json::from_str(&stored).map_err(|source| TypeaheadError::CorruptPayload {
                id: member.clone(),
                source,
            })?;

        let prefixes = self.prefixes_for(&stored);

        let mut batch = Batch::default();
        batch.hash_delete(self.data_key(), &member);
        for prefix in &prefixes {
            batch.sorted_set_remove(self.postings_key(prefix), &member);
        }
        self.store.run_batch(batch)?;

        // Registry membership is derived from postings emptiness, checked
        // against the store: a prefix still held by another item stays
        // registered.
        let mut cleanup = Batch::default();
        for prefix in &prefixes {
            if !self.store.exists(&self.postings_key(prefix))? {
                cleanup.set_remove(self.registry_key(), prefix);
            }
        }
        if !cleanup.is_empty() {
            self.store.run_batch(cleanup)?;
        }
        Ok(())
    }

    /// Deletes every postings set named by the registry, the registry
    /// itself, and the payload hash, in one batch.
    pub fn clear(&self) -> Result<()> {
        let prefixes = self.store.set_members(&self.registry_key())?;
        let mut batch = Batch::default();
        for prefix in &prefixes {
            batch.delete(self.postings_key(prefix));
        }
        batch.delete(self.registry_key());
        batch.delete(self.data_key());
        self.store.run_batch(batch)
    }

    /// Bulk replace: `clear`, then add every item with the duplicate check
    /// skipped. The input comes back unchanged as confirmation.
    ///
    /// The clear and the adds are not one atomic unit. Queries issued during
    /// the reload window may see an empty or partially populated collection,
    /// and may cache that view until its TTL runs out; availability during
    /// reload is chosen over read-your-writes here.
    pub fn load(&self, items: Vec<Item>) -> Result<Vec<Item>> {
        self.clear()?;
        for item in &items {
            self.add(item, true)?;
        }
        Ok(items)
    }
}
