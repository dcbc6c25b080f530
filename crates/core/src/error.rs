//! Failure taxonomy shared by every core component.
//!
//! The core never retries and never substitutes default content for a failed
//! upstream call: whatever goes wrong is surfaced to the caller as one of these
//! variants, and the HTTP boundary decides how to render it.

/// A typed failure produced by the core.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoachError {
    /// The text-generation or speech service could not be reached.
    #[error("Upstream service unavailable: {0}")]
    UpstreamUnavailable(String),
    /// The upstream answered with a non-success status.
    #[error("Upstream service rejected the request with status {status}: {body}")]
    UpstreamRejected { status: u16, body: String },
    /// The upstream answered successfully but without the expected text or audio.
    #[error("Malformed upstream response: {0}")]
    MalformedUpstreamResponse(String),
    /// The caller omitted required scenario or turn data.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl CoachError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }
}

impl From<reqwest::Error> for CoachError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::MalformedUpstreamResponse(err.to_string())
        } else {
            Self::UpstreamUnavailable(err.to_string())
        }
    }
}

pub type Result<T, E = CoachError> = std::result::Result<T, E>;

/// Passes a successful response through, or turns a non-success one into
/// `UpstreamRejected` carrying the status and the raw body text.
pub(crate) async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::warn!(status = status.as_u16(), "Upstream rejected request");
    Err(CoachError::UpstreamRejected {
        status: status.as_u16(),
        body,
    })
}
