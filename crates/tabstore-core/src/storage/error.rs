//! Error taxonomy shared by every storage backend.

use snafu::{Backtrace, prelude::*};

/// General result type used by storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
///
/// Expected conditions (an artifact that already exists, an artifact that
/// is missing) are ordinary variants, not panics, because callers
/// routinely probe for optional datasets. Nothing here is retried
/// internally.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StorageError {
    /// A write without `overwrite` targeted an artifact that exists.
    #[snafu(display("Artifact '{name}' already exists"))]
    AlreadyExists {
        /// The artifact name that collided.
        name: String,
        /// The backtrace captured when the error occurred.
        backtrace: Backtrace,
    },

    /// A read targeted an artifact that does not exist.
    #[snafu(display("Artifact '{name}' does not exist"))]
    NotFound {
        /// The artifact name that was requested.
        name: String,
        /// The backtrace captured when the error occurred.
        backtrace: Backtrace,
    },

    /// The header and table disagree beyond the documented subset
    /// tolerance, or an embedded schema is structurally invalid.
    #[snafu(display("Schema error for '{name}': {details}"))]
    Schema {
        /// The artifact name being written or read.
        name: String,
        /// What exactly did not line up.
        details: String,
        /// The backtrace captured when the error occurred.
        backtrace: Backtrace,
    },

    /// Stored header JSON failed to parse.
    #[snafu(display("Malformed header for '{name}': {source}"))]
    MalformedHeader {
        /// The table name whose header is damaged.
        name: String,
        /// The underlying JSON parse error.
        source: serde_json::Error,
        /// The backtrace captured when the error occurred.
        backtrace: Backtrace,
    },

    /// The backend's physical format cannot represent the data as given.
    #[snafu(display("{backend} backend cannot store '{name}': {details}"))]
    FormatLimitation {
        /// Name of the backend family that refused the data.
        backend: String,
        /// The artifact (or column) that triggered the refusal.
        name: String,
        /// What the format cannot express.
        details: String,
        /// The backtrace captured when the error occurred.
        backtrace: Backtrace,
    },

    /// A container file failed its magic, version, or checksum validation.
    #[snafu(display("Corrupted container at {path}: {details}"))]
    Corrupted {
        /// Path of the damaged file.
        path: String,
        /// What validation failed.
        details: String,
        /// The backtrace captured when the error occurred.
        backtrace: Backtrace,
    },

    /// An I/O error occurred on the local filesystem.
    #[snafu(display("I/O error at {path}: {source}"))]
    Io {
        /// The path where the I/O error occurred.
        path: String,
        /// The underlying OS error.
        source: std::io::Error,
        /// The backtrace captured when the error occurred.
        backtrace: Backtrace,
    },

    /// An Arrow codec failure while encoding or decoding a table.
    #[snafu(display("Arrow codec error for '{name}': {source}"))]
    Arrow {
        /// The artifact being encoded or decoded.
        name: String,
        /// The underlying Arrow error.
        source: arrow::error::ArrowError,
        /// The backtrace captured when the error occurred.
        backtrace: Backtrace,
    },

    /// A JSON document failed to parse or serialize.
    #[snafu(display("Malformed JSON document '{name}': {source}"))]
    Json {
        /// The document name.
        name: String,
        /// The underlying JSON error.
        source: serde_json::Error,
        /// The backtrace captured when the error occurred.
        backtrace: Backtrace,
    },
}
