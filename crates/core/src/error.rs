//! Error types for the restitch domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all restitch operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Transport errors ---
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    // --- Merge errors ---
    #[error("Merge error: {0}")]
    Merge(#[from] MergeError),

    // --- Configuration errors ---
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures of the external generation transport.
///
/// The controller never retries these itself; retry policy for transient
/// network failures belongs to the transport implementation. A transport
/// error terminates the continuation loop and the engine merges whatever
/// fragments were collected so far.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Transport not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Failures of the merge layer.
///
/// Most merge problems are absorbed by the fallback chain and encoded into
/// the result/metadata; only the variants here escape to the caller.
#[derive(Debug, Error)]
pub enum MergeError {
    /// No fragments were collected at all, so even best-effort
    /// concatenation is impossible. The one fatal merge condition.
    #[error("No fragments to merge")]
    NoFragments,

    /// A degraded merge surfaced as a hard failure because the caller's
    /// failure policy is `raise_error`.
    #[error("Merge degraded ({fallback_level}): {detail}")]
    Degraded {
        fallback_level: String,
        detail: String,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Failed to read config file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),
}
