// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// One source adapter failed or timed out; the run continues in partial mode.
    #[error("source '{name}' unavailable: {reason}")]
    SourceUnavailable { name: String, reason: String },

    #[error("no usable rate for {currency}: {reason}")]
    RateUnresolvable { currency: String, reason: String },

    /// Retry of a batch that is already committed. Callers treat this as a no-op.
    #[error("batch {timestamp} already recorded")]
    DuplicateBatchKey { timestamp: String },

    #[error("another run is already in progress (lock: {lock})")]
    ConcurrentRunDetected { lock: String },

    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("{currency} has no primary symbol for source '{source_class}'")]
    NotMapped {
        currency: String,
        source_class: String,
    },

    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("database error: {0}")]
    Database(rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Config(#[from] toml::de::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            name: name.into(),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        // Foreign keys, CHECKs and the append-only triggers all surface as
        // constraint failures.
        match &err {
            rusqlite::Error::SqliteFailure(code, msg)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Error::IntegrityViolation(msg.clone().unwrap_or_else(|| code.to_string()))
            }
            _ => Error::Database(err),
        }
    }
}
