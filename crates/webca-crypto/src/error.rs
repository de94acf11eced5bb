//! Error types for certificate, CRL and OCSP construction.

use thiserror::Error;
use webca_core::CoreError;

/// Result type alias for crypto operations
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors raised while building or parsing X.509 structures
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Key generation, import or signing failed
    #[error("key error: {0}")]
    Key(String),

    /// Certificate signing request could not be parsed or built
    #[error("CSR error: {0}")]
    Csr(String),

    /// Certificate could not be built or parsed
    #[error("certificate error: {0}")]
    Certificate(String),

    /// Extension descriptor or value is invalid
    #[error("extension error: {0}")]
    Extension(String),

    /// CRL could not be built
    #[error("CRL error: {0}")]
    Crl(String),

    /// OCSP message could not be parsed or built
    #[error("OCSP error: {0}")]
    Ocsp(String),

    /// Requested validity does not nest inside the issuer's validity
    #[error(
        "validity exceeds issuer: requested {not_before}..{not_after}, issuer valid {issuer_not_before}..{issuer_not_after}"
    )]
    ValidityExceedsIssuer {
        not_before: i64,
        not_after: i64,
        issuer_not_before: i64,
        issuer_not_after: i64,
    },

    /// Algorithm or operation not supported
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Policy or domain error from the core crate
    #[error(transparent)]
    Core(#[from] CoreError),

    /// JSON descriptor could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<rcgen::Error> for CryptoError {
    fn from(e: rcgen::Error) -> Self {
        Self::Certificate(e.to_string())
    }
}

impl From<rsa::Error> for CryptoError {
    fn from(e: rsa::Error) -> Self {
        Self::Key(e.to_string())
    }
}

impl From<pem::PemError> for CryptoError {
    fn from(e: pem::PemError) -> Self {
        Self::Csr(format!("invalid PEM: {e}"))
    }
}

impl CryptoError {
    /// True when the failure is a policy decision rather than a fault
    #[must_use]
    pub const fn is_policy(&self) -> bool {
        matches!(self, Self::Core(CoreError::Policy(_)))
    }
}
