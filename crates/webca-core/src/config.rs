//! Parameter names and values kept in the key/value configuration store.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Key of the JSON-encoded [`CrlConfig`](crate::types::CrlConfig)
pub const CRL_CONFIG: &str = "crlconfig-b953912c-e962-4c0e-b75b-d7faa23c78f2";

/// The four signing key pairs the CA needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SigningRole {
    /// Signs issued certificates
    CertSign,
    /// Signs CRLs
    CrlSign,
    /// Re-signs the internal CSRs built during issuance
    CsrSign,
    /// Signs OCSP responses
    OcspSign,
}

impl SigningRole {
    pub const ALL: [Self; 4] = [Self::CertSign, Self::CrlSign, Self::CsrSign, Self::OcspSign];

    /// Configuration parameter holding this role's key reference
    #[must_use]
    pub const fn param_name(self) -> &'static str {
        match self {
            Self::CertSign => "keysign-c96a8d20-9746-4a95-8d91-17c762b78cf5",
            Self::CrlSign => "crlsign-c3da02d3-3abf-467a-9f6d-666256eb606f",
            Self::CsrSign => "csrsign-2ea16b24-3350-44ea-a1ba-7d546d4941b4",
            Self::OcspSign => "ocspsign-5d2f6a4e-1c1b-4f47-9a55-0e0b8f2c6d31",
        }
    }
}

impl std::fmt::Display for SigningRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CertSign => write!(f, "certificate signing"),
            Self::CrlSign => write!(f, "CRL signing"),
            Self::CsrSign => write!(f, "CSR signing"),
            Self::OcspSign => write!(f, "OCSP signing"),
        }
    }
}

/// Reference to a key pair: which certificate store, which serial
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyRef {
    pub store_id: String,
    /// Lower-case hex serial
    pub serial: String,
}

impl KeyRef {
    pub fn new(store_id: impl Into<String>, serial: impl Into<String>) -> Self {
        Self {
            store_id: store_id.into(),
            serial: serial.into(),
        }
    }
}

impl std::fmt::Display for KeyRef {
    /// Stored form: `store_id,serial`
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.store_id, self.serial)
    }
}

impl std::str::FromStr for KeyRef {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let (store, serial) = s
            .split_once(',')
            .ok_or_else(|| CoreError::Config(format!("malformed key reference {s:?}")))?;
        let (store, serial) = (store.trim(), serial.trim());
        if store.is_empty() || serial.is_empty() {
            return Err(CoreError::Config(format!("incomplete key reference {s:?}")));
        }
        Ok(Self::new(store, serial.to_ascii_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_ref_round_trip() {
        let r: KeyRef = "9a16e500-cc97-48e4-9b62-4e41d91c2607,0A1B".parse().unwrap();
        assert_eq!(r.serial, "0a1b");
        assert_eq!(r.to_string(), "9a16e500-cc97-48e4-9b62-4e41d91c2607,0a1b");
    }

    #[test]
    fn test_key_ref_incomplete() {
        assert!("store,".parse::<KeyRef>().is_err());
        assert!("noserial".parse::<KeyRef>().is_err());
    }

    #[test]
    fn test_param_names_distinct() {
        let mut names: Vec<&str> = SigningRole::ALL.iter().map(|r| r.param_name()).collect();
        names.push(CRL_CONFIG);
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 5);
    }
}
