//! Error types for the issuance service and OCSP responder.

use thiserror::Error;
use webca_core::CoreError;
use webca_crypto::CryptoError;

/// Errors raised by the service layer
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Signing keys or settings are missing or malformed.
    #[error("config error: {0}")]
    Config(String),

    /// Certificate store lookup or insert failed.
    #[error("store error: {0}")]
    Store(String),

    /// The CRL could not be written to its output path.
    #[error("CRL write error: {0}")]
    CrlWrite(String),

    /// An OCSP request could not be understood.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// HTTP listener failed to bind or serve.
    #[error("server error: {0}")]
    Server(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ServiceError {
    /// Message of a policy violation, if this is one
    #[must_use]
    pub fn policy_message(&self) -> Option<&str> {
        match self {
            Self::Core(CoreError::Policy(m)) | Self::Crypto(CryptoError::Core(CoreError::Policy(m))) => {
                Some(m)
            }
            _ => None,
        }
    }
}
