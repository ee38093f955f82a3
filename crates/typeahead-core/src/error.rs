use thiserror::Error;

pub type Result<T> = std::result::Result<T, TypeaheadError>;

#[derive(Debug, Error)]
pub enum TypeaheadError {
    #[error("invalid item: {0}")]
    InvalidItem(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("corrupt payload for id {id}: {source}")]
    CorruptPayload {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TypeaheadError {
    pub(crate) fn mutex_poisoned(what: &str) -> Self {
        Self::StoreUnavailable(format!("{what} mutex poisoned"))
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidItem(_) => "INVALID_ITEM",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Self::CorruptPayload { .. } => "CORRUPT_PAYLOAD",
            Self::Json(_) => "JSON_ERROR",
            Self::Io(_) => "IO_ERROR",
        }
    }
}

impl From<rusqlite::Error> for TypeaheadError {
    fn from(err: rusqlite::Error) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}
