//! Error taxonomy for the upstream fetch path (spec §4.3, §7).
//!
//! Every other boundary in this crate returns `anyhow::Result<T>` with `.context(..)`
//! breadcrumbs, matching the rest of the codebase. The fetch path is the one place a
//! concrete enum earns its keep: the retry wrapper and the orchestrator both need to
//! pattern-match on retryable-vs-permanent without string-sniffing an `anyhow::Error`.

use std::fmt;

/// Statuses the retry wrapper (§4.3) treats as transient.
pub const RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

#[derive(Debug, Clone)]
pub enum FetchError {
    /// Timeout, or an HTTP status in [`RETRYABLE_STATUSES`]. Eligible for retry.
    Retryable { status: Option<u16>, message: String },
    /// Any other 4xx, or a malformed payload. Not retried; the caller skips this wallet.
    Permanent { status: Option<u16>, message: String },
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Retryable { .. })
    }

    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        if RETRYABLE_STATUSES.contains(&status) {
            FetchError::Retryable { status: Some(status), message: message.into() }
        } else {
            FetchError::Permanent { status: Some(status), message: message.into() }
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        // Timeouts surface as retryable with the synthetic status the spec assigns them (§4.4).
        FetchError::Retryable { status: Some(408), message: message.into() }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Retryable { status, .. } => *status,
            FetchError::Permanent { status, .. } => *status,
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Retryable { status, message } => {
                write!(f, "retryable upstream error (status={status:?}): {message}")
            }
            FetchError::Permanent { status, message } => {
                write!(f, "permanent upstream error (status={status:?}): {message}")
            }
        }
    }
}

impl std::error::Error for FetchError {}
