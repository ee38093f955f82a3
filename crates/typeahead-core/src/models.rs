use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::error::{Result, TypeaheadError};

/// Item identifier, unique within a collection. JSON integer and string ids
/// both round-trip in their original form; both index under the same member
/// representation (`3` and `"3"` collide on purpose).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Int(i64),
    Text(String),
}

impl ItemId {
    /// The string form used as hash field / sorted-set member in the store.
    #[must_use]
    pub fn as_member(&self) -> String {
        match self {
            Self::Int(value) => value.to_string(),
            Self::Text(value) => value.clone(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Text(value) if value.is_empty())
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value}"),
        }
    }
}

impl From<i64> for ItemId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// One indexable entry. `term` plus `aliases` drive prefix derivation;
/// `score` drives ranking; every other JSON field is preserved verbatim in
/// the stored payload through the flattened map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub term: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default = "default_score")]
    pub score: Number,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_score() -> Number {
    Number::from(0)
}

impl Item {
    #[must_use]
    pub fn new(id: impl Into<ItemId>, term: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            term: term.into(),
            aliases: Vec::new(),
            score: default_score(),
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn with_score(mut self, score: impl Into<Number>) -> Self {
        self.score = score.into();
        self
    }

    #[must_use]
    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    /// Term and aliases joined with single spaces; the text the item is
    /// indexed under.
    #[must_use]
    pub fn phrase(&self) -> String {
        let mut parts = Vec::with_capacity(1 + self.aliases.len());
        parts.push(self.term.as_str());
        parts.extend(self.aliases.iter().map(String::as_str));
        parts.join(" ")
    }

    #[must_use]
    pub fn score_f64(&self) -> f64 {
        self.score.as_f64().unwrap_or(0.0)
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(TypeaheadError::InvalidItem(
                "items must at least specify both an id and a term (id is empty)".to_string(),
            ));
        }
        if self.term.is_empty() {
            return Err(TypeaheadError::InvalidItem(
                "items must at least specify both an id and a term (term is empty)".to_string(),
            ));
        }
        Ok(())
    }
}

/// Removal reference. Only the id is read; any other JSON fields on the
/// incoming line are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRef {
    pub id: ItemId,
}

impl From<&Item> for ItemRef {
    fn from(item: &Item) -> Self {
        Self {
            id: item.id.clone(),
        }
    }
}
