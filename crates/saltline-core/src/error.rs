//! Error types for saltline

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// saltline core error types
#[derive(Debug, Error)]
pub enum Error {
    /// Envelope is not valid JSON or is missing a required field
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(#[from] serde_json::Error),

    /// An envelope field failed base64 decoding
    #[error("invalid base64 in envelope: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    /// Nonce has the wrong length
    #[error("invalid nonce length: {0} (expected 24)")]
    InvalidNonceLength(usize),

    /// AEAD open failed: wrong key, tampering, or corruption
    #[error("authentication failed")]
    AuthenticationFailed,

    /// AEAD seal failed
    #[error("encryption failed")]
    EncryptionFailed,
}
