use thiserror::Error;

/// Reasons the gate rejects a request.
///
/// Validation is one-shot: every variant is surfaced to the client as an
/// unauthorized response, never retried.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("malformed authorization header")]
    MalformedHeader,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("signing key lookup failed: {0}")]
    KeyLookup(String),
}
