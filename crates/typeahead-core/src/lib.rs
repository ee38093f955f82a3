// Public fallible APIs in this crate share one concrete error contract (`TypeaheadError`).
// Repeating per-function `# Errors` boilerplate obscures behavior more than it clarifies.
#![allow(
    clippy::missing_errors_doc,
    reason = "crate-wide fallible API uses one explicit error type; per-item boilerplate would duplicate contract"
)]

pub mod error;
pub mod jsonl;
pub mod loader;
pub mod matcher;
pub mod models;
pub mod settings;
pub mod store;
pub mod text;

pub use error::{Result, TypeaheadError};
pub use loader::Loader;
pub use matcher::{MatchOptions, Matcher};
pub use models::{Item, ItemId, ItemRef};
pub use settings::IndexSettings;
pub use store::{Batch, IndexStore, MemoryStore, SqliteStore};
