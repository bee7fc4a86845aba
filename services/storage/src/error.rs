//! Storage error taxonomy
//!
//! - `TargetError`: the connection target cannot be resolved
//! - `ProvisioningError`: schema / continuous-query setup failed (fatal)
//! - `WriteFailure`: one batch could not be persisted (contained)

use thiserror::Error;

// ── Backend ─────────────────────────────────────────────────────────

/// Why a single request against the backend failed.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("backend reported: {0}")]
    Backend(String),

    #[error("unexpected response: {0}")]
    Response(String),

    #[error("point encoding failed: {0}")]
    Encode(String),
}

// ── Connection target ───────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    #[error("Invalid connection URI {uri:?}: {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("Unsupported URI scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Invalid port: {0:?}")]
    InvalidPort(String),

    #[error("No target database given")]
    MissingDatabase,
}

// ── Provisioning ────────────────────────────────────────────────────

/// Startup failure. The pipeline must not start when this is returned.
#[derive(Error, Debug)]
pub enum ProvisioningError {
    #[error("Connection target: {0}")]
    Target(#[from] TargetError),

    #[error("HTTP client setup failed: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Create database {database:?} failed: {source}")]
    CreateDatabase {
        database: String,
        #[source]
        source: BackendError,
    },

    #[error("Listing continuous queries failed: {source}")]
    ListContinuousQueries {
        #[source]
        source: BackendError,
    },

    #[error("Create continuous query {name:?} failed: {source}")]
    CreateContinuousQuery {
        name: String,
        #[source]
        source: BackendError,
    },
}

// ── Writes ──────────────────────────────────────────────────────────

/// A whole batch was rejected or the backend was unreachable.
///
/// Writes are never retried by the sink.
#[derive(Error, Debug)]
#[error("Write of {batch_size} points failed: {cause}")]
pub struct WriteFailure {
    pub batch_size: usize,
    #[source]
    pub cause: BackendError,
}

impl WriteFailure {
    pub fn new(batch_size: usize, cause: BackendError) -> Self {
        Self { batch_size, cause }
    }
}
