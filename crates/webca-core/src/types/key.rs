use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Public key algorithm family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    /// RSA
    Rsa,
    /// DSA
    Dsa,
    /// Elliptic curve (ECDSA / ECDH)
    Ec,
}

impl KeyType {
    /// All key types, in the order their numeric codes are assigned
    pub const ALL: [Self; 3] = [Self::Rsa, Self::Dsa, Self::Ec];

    /// Stable numeric code used in stored templates
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Rsa => 1,
            Self::Dsa => 2,
            Self::Ec => 3,
        }
    }

    /// Look up a key type by its numeric code
    pub fn from_code(code: u8) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.code() == code)
            .ok_or_else(|| CoreError::Invalid(format!("unknown key type code {code}")))
    }
}

impl std::fmt::Display for KeyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rsa => write!(f, "RSA"),
            Self::Dsa => write!(f, "DSA"),
            Self::Ec => write!(f, "EC"),
        }
    }
}

impl std::str::FromStr for KeyType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "rsa" => Ok(Self::Rsa),
            "dsa" => Ok(Self::Dsa),
            "ec" | "ecdsa" => Ok(Self::Ec),
            other => Err(CoreError::Invalid(format!("unknown key type {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip() {
        for key in KeyType::ALL {
            assert_eq!(KeyType::from_code(key.code()).unwrap(), key);
        }
        assert!(KeyType::from_code(9).is_err());
    }

    #[test]
    fn test_parse() {
        assert_eq!("RSA".parse::<KeyType>().unwrap(), KeyType::Rsa);
        assert_eq!("ecdsa".parse::<KeyType>().unwrap(), KeyType::Ec);
        assert!("ed25519".parse::<KeyType>().is_err());
    }
}
