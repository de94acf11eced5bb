use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors shared by every layer of the certificate authority
#[derive(Error, Debug)]
pub enum CoreError {
    /// Request does not satisfy the template policy (key size, key usage, subject shape)
    #[error("policy violation: {0}")]
    Policy(String),

    /// New certificate validity would fall outside the issuer's validity
    #[error("validity exceeds issuer: {0}")]
    Validity(String),

    /// Signing keys or process configuration are missing or malformed
    #[error("configuration error: {0}")]
    Config(String),

    /// A certificate with this serial number is already stored
    #[error("certificate already exists: serial {serial}")]
    CertificateExists {
        /// Hex serial of the duplicate certificate
        serial: String,
    },

    /// Record lookup failed
    #[error("not found: {0}")]
    NotFound(String),

    /// Backing store failed
    #[error("store error: {0}")]
    Store(String),

    /// Value could not be parsed into a domain type
    #[error("invalid value: {0}")]
    Invalid(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Returns true for errors that reject a request permanently
    #[must_use]
    pub const fn is_policy(&self) -> bool {
        matches!(self, Self::Policy(_))
    }
}
