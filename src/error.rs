use thiserror::Error;

/// Coarse classification of every failure the pipeline can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    StoreUnavailable,
    StructuralMismatch,
    InvalidPredicate,
    FetchFailure,
    Export,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("store unavailable: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("store unavailable: table `{0}` does not exist")]
    MissingTable(String),

    #[error("table `{table}` is missing required column `{column}`")]
    StructuralMismatch { table: String, column: String },

    #[error("invalid predicate `{name}`: {reason}")]
    InvalidPredicate { name: String, reason: String },

    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Sqlite(_) | Error::MissingTable(_) => ErrorKind::StoreUnavailable,
            Error::StructuralMismatch { .. } => ErrorKind::StructuralMismatch,
            Error::InvalidPredicate { .. } => ErrorKind::InvalidPredicate,
            Error::Fetch { .. } => ErrorKind::FetchFailure,
            Error::Csv(_) | Error::Json(_) | Error::Io(_) => ErrorKind::Export,
        }
    }

    pub(crate) fn invalid_predicate(name: &str, reason: impl Into<String>) -> Self {
        Error::InvalidPredicate {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn fetch(url: &str, reason: impl ToString) -> Self {
        Error::Fetch {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
