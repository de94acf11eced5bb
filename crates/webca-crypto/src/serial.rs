//! Certificate serial numbers.

use rand::RngCore;

use crate::error::{CryptoError, Result};

const SERIAL_LEN: usize = 16;

/// Positive certificate serial, big-endian without leading zero bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Serial(Vec<u8>);

impl Serial {
    /// Random 127-bit serial; never zero
    #[must_use]
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        loop {
            let mut bytes = [0u8; SERIAL_LEN];
            rng.fill_bytes(&mut bytes);
            bytes[0] &= 0x7f;
            let serial = Self::from_bytes(&bytes);
            if !serial.0.is_empty() {
                return serial;
            }
        }
    }

    /// Serial from big-endian bytes as found in an INTEGER
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
        Self(bytes[start..].to_vec())
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.trim().trim_start_matches("0x");
        let padded = if s.len() % 2 == 1 {
            format!("0{s}")
        } else {
            s.to_string()
        };
        let bytes = hex::decode(&padded)
            .map_err(|e| CryptoError::Certificate(format!("invalid serial {s:?}: {e}")))?;
        Ok(Self::from_bytes(&bytes))
    }

    /// Lower-case hex without leading zeros, the form records are keyed by
    #[must_use]
    pub fn to_hex(&self) -> String {
        let encoded = hex::encode(&self.0);
        let trimmed = encoded.trim_start_matches('0');
        if trimmed.is_empty() {
            String::from("0")
        } else {
            trimmed.to_string()
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Display for Serial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::str::FromStr for Serial {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_serials_are_positive_and_unique() {
        let mut seen = HashSet::new();
        for _ in 0..256 {
            let s = Serial::generate();
            assert!(!s.as_bytes().is_empty());
            assert!(s.as_bytes().len() <= SERIAL_LEN);
            if s.as_bytes().len() == SERIAL_LEN {
                assert!(s.as_bytes()[0] < 0x80);
            }
            assert!(seen.insert(s.to_hex()));
        }
    }

    #[test]
    fn test_hex_forms() {
        let s = Serial::from_bytes(&[0x00, 0x0a, 0xbc]);
        assert_eq!(s.to_hex(), "abc");
        assert_eq!(Serial::from_hex("ABC").unwrap(), s);
        assert_eq!(Serial::from_hex("000abc").unwrap(), s);
        assert!(Serial::from_hex("xyz").is_err());
    }
}
