use async_trait::async_trait;
use serde_json::Value;

use crate::protocol::{InputRequest, TermResponse};
use crate::session::SessionId;

/// Request/response binding to the remote text session.
///
/// Implementations must not add their own per-request timeout: the data
/// endpoint is a long poll.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Starts (or restarts) the remote session with an opaque payload.
    async fn init(&self, session: &SessionId, payload: &Value) -> Result<TermResponse, TransportError>;

    /// Fetches the next batch of output and directives.
    async fn poll(&self, session: &SessionId, nonce: &str) -> Result<TermResponse, TransportError>;

    /// Sends a submitted line, interrupt, or shortcut invocation.
    async fn send_input(&self, session: &SessionId, input: &InputRequest) -> Result<(), TransportError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("unexpected status: {status} body={body}")]
    Status { status: u16, body: String },
    #[error("request failed: {0}")]
    Request(String),
    #[error("invalid response body: {0}")]
    Decode(String),
}

/// Recovery class of a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// 403: the server no longer knows this session.
    SessionExpired,
    /// 500: the server-side session failed.
    ServerError,
    /// Anything else; retried after a fixed delay.
    Transient,
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn failure_kind(&self) -> FailureKind {
        match self.status() {
            Some(403) => FailureKind::SessionExpired,
            Some(500) => FailureKind::ServerError,
            _ => FailureKind::Transient,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> TransportError {
        TransportError::Status {
            status: code,
            body: String::new(),
        }
    }

    #[test]
    fn classifies_statuses() {
        assert_eq!(status(403).failure_kind(), FailureKind::SessionExpired);
        assert_eq!(status(500).failure_kind(), FailureKind::ServerError);
        assert_eq!(status(502).failure_kind(), FailureKind::Transient);
        assert_eq!(status(404).failure_kind(), FailureKind::Transient);
        assert_eq!(
            TransportError::Request("connection refused".into()).failure_kind(),
            FailureKind::Transient
        );
    }
}
