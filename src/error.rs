//! Error types for the moderation engine.

/// Top-level error type for the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),
}

/// Configuration-related errors.
///
/// Surfaced once at configuration load; the affected rule or feature degrades
/// to a no-op rather than failing the whole pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Invalid notify target {raw:?}: expected \"guild:<id>\" or \"private:<id>\"")]
    InvalidNotifyTarget { raw: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Transport/adapter errors: failed lookups and failed sends.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to send to {target}: {reason}")]
    SendFailed { target: String, reason: String },

    #[error("Lookup failed for {subject}: {reason}")]
    LookupFailed { subject: String, reason: String },

    #[error("Decision submission failed for request {request_id}: {reason}")]
    DecisionFailed { request_id: String, reason: String },
}

/// Errors resolving a pending approval.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("No pending approval #{seq}")]
    NotFound { seq: u32 },

    #[error("Failed to resolve request {request_id}: {reason}")]
    SubmitFailed { request_id: String, reason: String },
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;
