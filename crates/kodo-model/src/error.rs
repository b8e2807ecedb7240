// Copyright (c) 2024-2026 Kodo Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::time::Duration;

/// Classification of a provider failure.  The orchestrator branches on
/// [`ProviderError::retryable`]; the kind itself is surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ContextLengthExceeded,
    ContentBlocked,
    RateLimit,
    QuotaExceeded,
    InvalidModel,
    AuthenticationFailed,
    PermissionDenied,
    Network,
    Timeout,
    ServiceUnavailable,
    ToolCallingNotSupported,
    StreamingNotSupported,
    InvalidRequest,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::ContextLengthExceeded => "context length exceeded",
            ErrorKind::ContentBlocked => "content blocked",
            ErrorKind::RateLimit => "rate limit",
            ErrorKind::QuotaExceeded => "quota exceeded",
            ErrorKind::InvalidModel => "invalid model",
            ErrorKind::AuthenticationFailed => "authentication failed",
            ErrorKind::PermissionDenied => "permission denied",
            ErrorKind::Network => "network error",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ServiceUnavailable => "service unavailable",
            ErrorKind::ToolCallingNotSupported => "tool calling not supported",
            ErrorKind::StreamingNotSupported => "streaming not supported",
            ErrorKind::InvalidRequest => "invalid request",
        };
        f.write_str(s)
    }
}

/// A tagged provider failure.
///
/// `retry_after` carries the provider's back-off hint when one was present
/// (e.g. a `Retry-After` header on a 429).
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ProviderError {
    pub kind: ErrorKind,
    pub message: String,
    pub retry_after: Option<Duration>,
}

impl ProviderError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn with_retry_after(mut self, after: Duration) -> Self {
        self.retry_after = Some(after);
        self
    }

    /// Transient conditions the caller may retry; everything else is final
    /// for the current request.
    pub fn retryable(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::RateLimit
                | ErrorKind::Network
                | ErrorKind::Timeout
                | ErrorKind::ServiceUnavailable
        )
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
