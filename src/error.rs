//! Error types for lgatlas.
//!
//! This module defines all error types used throughout the lgatlas crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for lgatlas operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Fetch Errors ===
    /// An HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A data source could not produce its payload.
    #[error("failed to fetch from source '{name}': {message}")]
    SourceFetch {
        /// Name of the data source.
        name: &'static str,
        /// Description of what went wrong.
        message: String,
    },

    /// A downloaded payload could not be decoded.
    #[error("failed to decode {what}: {message}")]
    PayloadDecode {
        /// What was being decoded (e.g. "boundary GeoJSON").
        what: String,
        /// Description of what went wrong.
        message: String,
    },

    // === Data Errors ===
    /// The store has no data to answer the request.
    #[error("no {what} in the store; run `lgatlas fetch` first")]
    NoData {
        /// What was requested (e.g. "observations for 2024").
        what: String,
    },

    /// A region name matched nothing in the store.
    #[error("unknown region '{name}'")]
    UnknownRegion {
        /// The name as given.
        name: String,
    },

    /// An indicator name matched no known indicator.
    #[error("unknown indicator '{name}'")]
    UnknownIndicator {
        /// The name as given.
        name: String,
    },

    /// An observation was rejected by quality screening.
    #[error("observation rejected: {reason}")]
    ObservationRejected {
        /// Why the observation was rejected.
        reason: String,
    },

    // === Geometry Errors ===
    /// GeoJSON parsing or construction failed.
    #[error("GeoJSON error: {0}")]
    GeoJson(Box<geojson::Error>),

    // === Server Errors ===
    /// The dashboard server could not bind its address.
    #[error("failed to bind {addr}: {message}")]
    ServerBind {
        /// The requested listen address.
        addr: String,
        /// Description of what went wrong.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV decoding failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for lgatlas operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl From<geojson::Error> for Error {
    fn from(err: geojson::Error) -> Self {
        Self::GeoJson(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a source fetch error.
    #[must_use]
    pub fn source_fetch(name: &'static str, message: impl Into<String>) -> Self {
        Self::SourceFetch {
            name,
            message: message.into(),
        }
    }

    /// Create a payload decode error.
    #[must_use]
    pub fn payload_decode(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PayloadDecode {
            what: what.into(),
            message: message.into(),
        }
    }

    /// Create a no-data error for a missing slice of the store.
    #[must_use]
    pub fn no_data(what: impl Into<String>) -> Self {
        Self::NoData { what: what.into() }
    }

    /// Create an unknown-region error.
    #[must_use]
    pub fn unknown_region(name: impl Into<String>) -> Self {
        Self::UnknownRegion { name: name.into() }
    }

    /// Check if this error means the store is empty for the request.
    #[must_use]
    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData { .. })
    }

    /// Check if this error is an unknown-region lookup.
    #[must_use]
    pub fn is_unknown_region(&self) -> bool {
        matches!(self, Self::UnknownRegion { .. })
    }

    /// Check if this error came from fetching or decoding a remote source.
    ///
    /// These are the errors the fetch pipeline may recover from by falling
    /// back to bundled sample data.
    #[must_use]
    pub fn is_fetch(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::SourceFetch { .. } | Self::PayloadDecode { .. }
        )
    }
}
