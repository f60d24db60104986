//! Error types for the Bolty domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Bolty operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Conversation store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Workspace errors ---
    #[error("Workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    // --- Request validation ---
    #[error("Invalid request: {0}")]
    Validation(String),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

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

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Capability not supported: {0}")]
    Unsupported(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected response shape: {0}")]
    InvalidResponse(String),

    #[error("All model attempts failed: {message}")]
    Exhausted {
        message: String,
        #[source]
        last: Option<Box<ProviderError>>,
    },
}

/// How the resilient invoker should react to a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The model does not exist or lacks the requested capability.
    NotFoundOrUnsupported,
    /// Rate limiting, overload or an internal backend error.
    Transient,
    /// Anything else: give up on this model without retrying.
    Other,
}

impl ProviderError {
    /// Classify this error for retry and fallback decisions.
    pub fn class(&self) -> FailureClass {
        match self {
            Self::ModelNotFound(_) | Self::Unsupported(_) => FailureClass::NotFoundOrUnsupported,
            Self::RateLimited { .. } | Self::Timeout(_) => FailureClass::Transient,
            Self::ApiError {
                status_code,
                message,
            } => {
                let lower = message.to_lowercase();
                match status_code {
                    404 => FailureClass::NotFoundOrUnsupported,
                    429 | 500 | 502 | 503 | 504 => FailureClass::Transient,
                    _ if lower.contains("overload") || lower.contains("temporar") => {
                        FailureClass::Transient
                    }
                    _ if lower.contains("not found")
                        || lower.contains("not supported")
                        || lower.contains("unsupported") =>
                    {
                        FailureClass::NotFoundOrUnsupported
                    }
                    _ => FailureClass::Other,
                }
            }
            _ => FailureClass::Other,
        }
    }

    /// Whether another attempt against the same model may succeed.
    pub fn is_transient(&self) -> bool {
        self.class() == FailureClass::Transient
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corrupted record: {0}")]
    Corrupted(String),
}

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("Path rejected: {path}: {reason}")]
    PathRejected { path: String, reason: String },

    #[error("Write failed for {path}: {reason}")]
    WriteFailed { path: String, reason: String },

    #[error("Command not permitted: {0}")]
    CommandDenied(String),

    #[error("Command failed: {command}: {reason}")]
    CommandFailed { command: String, reason: String },
}
