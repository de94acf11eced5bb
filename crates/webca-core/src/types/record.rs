use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RevocationReason;

/// An issued certificate as kept by the record store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRecord {
    /// Lower-case hex serial number
    pub serial: String,

    /// Request this certificate was issued for
    #[serde(default)]
    pub request_id: Option<u64>,

    pub user: String,

    /// Subject in OpenSSL form
    pub subject: String,

    pub valid_from: DateTime<Utc>,

    pub valid_to: DateTime<Utc>,

    /// Hex serial of the issuing certificate
    pub issuer_serial: String,

    /// PEM encoded certificate
    pub pem: String,
}

/// Revocation of one certificate. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revoked {
    /// Hex serial of the revoked certificate
    pub serial: String,

    pub date: DateTime<Utc>,

    #[serde(default)]
    pub reason: RevocationReason,
}

impl Revoked {
    pub fn new(serial: impl Into<String>, reason: RevocationReason) -> Self {
        Self {
            serial: serial.into(),
            date: Utc::now(),
            reason,
        }
    }
}

/// Published CRL URL and the certificates it covers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrlLocation {
    pub id: u64,

    pub url: String,

    #[serde(default)]
    pub deleted: bool,

    /// Hex serials of certificates that point at this location
    #[serde(default)]
    pub certificates: Vec<String>,
}

impl CrlLocation {
    pub fn new(id: u64, url: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            deleted: false,
            certificates: Vec::new(),
        }
    }
}
