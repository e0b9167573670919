// ⚠️ Library errors
//
// The reconciliation core (ledger, pins, solver) never fails: shortfalls and
// over-pins are data carried by the solver's remainder. Only the collaborators
// around it (catalog loading, count sheets, storage, config) can error.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Catalog errors
    #[error("Unknown denomination: {0}")]
    UnknownDenomination(String),

    #[error("Invalid denomination catalog: {0}")]
    InvalidCatalog(String),

    // Input errors
    #[error("Invalid count for {denomination}: {value:?}")]
    InvalidCount {
        denomination: String,
        value: String,
    },

    #[error("Invalid pin specification: {0} (expected ID=COUNT)")]
    InvalidPinSpec(String),

    // Storage errors
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid record file name: {0}")]
    InvalidRecordName(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    // Authentication
    #[error("Not authenticated")]
    Unauthenticated,
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
