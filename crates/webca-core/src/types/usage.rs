use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// X.509 keyUsage bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyUsage {
    DigitalSignature,
    NonRepudiation,
    KeyEncipherment,
    DataEncipherment,
    KeyAgreement,
    KeyCertSign,
    #[serde(rename = "cRLSign")]
    CrlSign,
    EncipherOnly,
    DecipherOnly,
}

impl KeyUsage {
    /// All usages in bit order
    pub const ALL: [Self; 9] = [
        Self::DigitalSignature,
        Self::NonRepudiation,
        Self::KeyEncipherment,
        Self::DataEncipherment,
        Self::KeyAgreement,
        Self::KeyCertSign,
        Self::CrlSign,
        Self::EncipherOnly,
        Self::DecipherOnly,
    ];

    /// Position in the keyUsage BIT STRING (RFC 5280 4.2.1.3)
    #[must_use]
    pub const fn bit(self) -> u8 {
        match self {
            Self::DigitalSignature => 0,
            Self::NonRepudiation => 1,
            Self::KeyEncipherment => 2,
            Self::DataEncipherment => 3,
            Self::KeyAgreement => 4,
            Self::KeyCertSign => 5,
            Self::CrlSign => 6,
            Self::EncipherOnly => 7,
            Self::DecipherOnly => 8,
        }
    }

    /// Stable numeric code used by stored templates (1-based)
    #[must_use]
    pub const fn code(self) -> u8 {
        self.bit() + 1
    }

    /// OpenSSL short name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::DigitalSignature => "digitalSignature",
            Self::NonRepudiation => "nonRepudiation",
            Self::KeyEncipherment => "keyEncipherment",
            Self::DataEncipherment => "dataEncipherment",
            Self::KeyAgreement => "keyAgreement",
            Self::KeyCertSign => "keyCertSign",
            Self::CrlSign => "cRLSign",
            Self::EncipherOnly => "encipherOnly",
            Self::DecipherOnly => "decipherOnly",
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|u| u.code() == code)
            .ok_or_else(|| CoreError::Invalid(format!("unknown key usage code {code}")))
    }
}

impl std::fmt::Display for KeyUsage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for KeyUsage {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|u| u.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| CoreError::Invalid(format!("unknown key usage {s}")))
    }
}

/// A set of [`KeyUsage`] flags stored as a bitmask
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<KeyUsage>", into = "Vec<KeyUsage>")]
pub struct KeyUsageSet(u16);

impl KeyUsageSet {
    /// Empty set
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Build a set from a slice of usages
    #[must_use]
    pub fn of(usages: &[KeyUsage]) -> Self {
        usages.iter().copied().collect()
    }

    /// Add a usage, returning the updated set
    #[must_use]
    pub const fn with(self, usage: KeyUsage) -> Self {
        Self(self.0 | (1 << usage.bit()))
    }

    pub fn insert(&mut self, usage: KeyUsage) {
        self.0 |= 1 << usage.bit();
    }

    #[must_use]
    pub const fn contains(self, usage: KeyUsage) -> bool {
        self.0 & (1 << usage.bit()) != 0
    }

    /// True when every flag in `self` is also in `other`
    #[must_use]
    pub const fn is_subset(self, other: Self) -> bool {
        self.0 & !other.0 == 0
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Raw bitmask, bit N set for usage with bit position N
    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Iterate usages in bit order
    pub fn iter(self) -> impl Iterator<Item = KeyUsage> {
        KeyUsage::ALL.into_iter().filter(move |u| self.contains(*u))
    }
}

impl FromIterator<KeyUsage> for KeyUsageSet {
    fn from_iter<I: IntoIterator<Item = KeyUsage>>(iter: I) -> Self {
        let mut set = Self::empty();
        for usage in iter {
            set.insert(usage);
        }
        set
    }
}

impl From<Vec<KeyUsage>> for KeyUsageSet {
    fn from(v: Vec<KeyUsage>) -> Self {
        v.into_iter().collect()
    }
}

impl From<KeyUsageSet> for Vec<KeyUsage> {
    fn from(set: KeyUsageSet) -> Self {
        set.iter().collect()
    }
}

impl std::fmt::Display for KeyUsageSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.iter().map(KeyUsage::name).collect();
        f.write_str(&names.join(", "))
    }
}

impl std::str::FromStr for KeyUsageSet {
    type Err = CoreError;

    /// Parse an OpenSSL style list such as `"digitalSignature, keyEncipherment"`
    fn from_str(s: &str) -> Result<Self> {
        s.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty() && !p.eq_ignore_ascii_case("critical"))
            .map(str::parse::<KeyUsage>)
            .collect()
    }
}

/// X.509 extendedKeyUsage purposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtKeyUsage {
    #[serde(rename = "serverAuth")]
    ServerAuth,
    #[serde(rename = "clientAuth")]
    ClientAuth,
    #[serde(rename = "codeSigning")]
    CodeSigning,
    #[serde(rename = "emailProtection")]
    EmailProtection,
    #[serde(rename = "timeStamping")]
    TimeStamping,
    #[serde(rename = "OCSPSigning")]
    OcspSigning,
    #[serde(rename = "ipsecIKE")]
    IpsecIke,
    #[serde(rename = "msCodeInd")]
    MsCodeInd,
    #[serde(rename = "msCodeCom")]
    MsCodeCom,
    #[serde(rename = "msCTLSign")]
    MsCtlSign,
    #[serde(rename = "msEFS")]
    MsEfs,
}

impl ExtKeyUsage {
    pub const ALL: [Self; 11] = [
        Self::ServerAuth,
        Self::ClientAuth,
        Self::CodeSigning,
        Self::EmailProtection,
        Self::TimeStamping,
        Self::OcspSigning,
        Self::IpsecIke,
        Self::MsCodeInd,
        Self::MsCodeCom,
        Self::MsCtlSign,
        Self::MsEfs,
    ];

    /// Stable numeric code used by stored templates (1-based)
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::ServerAuth => 1,
            Self::ClientAuth => 2,
            Self::CodeSigning => 3,
            Self::EmailProtection => 4,
            Self::TimeStamping => 5,
            Self::OcspSigning => 6,
            Self::IpsecIke => 7,
            Self::MsCodeInd => 8,
            Self::MsCodeCom => 9,
            Self::MsCtlSign => 10,
            Self::MsEfs => 11,
        }
    }

    /// OpenSSL short name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ServerAuth => "serverAuth",
            Self::ClientAuth => "clientAuth",
            Self::CodeSigning => "codeSigning",
            Self::EmailProtection => "emailProtection",
            Self::TimeStamping => "timeStamping",
            Self::OcspSigning => "OCSPSigning",
            Self::IpsecIke => "ipsecIKE",
            Self::MsCodeInd => "msCodeInd",
            Self::MsCodeCom => "msCodeCom",
            Self::MsCtlSign => "msCTLSign",
            Self::MsEfs => "msEFS",
        }
    }

    /// Object identifier arcs
    #[must_use]
    pub const fn oid(self) -> &'static [u64] {
        match self {
            Self::ServerAuth => &[1, 3, 6, 1, 5, 5, 7, 3, 1],
            Self::ClientAuth => &[1, 3, 6, 1, 5, 5, 7, 3, 2],
            Self::CodeSigning => &[1, 3, 6, 1, 5, 5, 7, 3, 3],
            Self::EmailProtection => &[1, 3, 6, 1, 5, 5, 7, 3, 4],
            Self::TimeStamping => &[1, 3, 6, 1, 5, 5, 7, 3, 8],
            Self::OcspSigning => &[1, 3, 6, 1, 5, 5, 7, 3, 9],
            Self::IpsecIke => &[1, 3, 6, 1, 5, 5, 7, 3, 17],
            Self::MsCodeInd => &[1, 3, 6, 1, 4, 1, 311, 2, 1, 21],
            Self::MsCodeCom => &[1, 3, 6, 1, 4, 1, 311, 2, 1, 22],
            Self::MsCtlSign => &[1, 3, 6, 1, 4, 1, 311, 10, 3, 1],
            Self::MsEfs => &[1, 3, 6, 1, 4, 1, 311, 10, 3, 4],
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|u| u.code() == code)
            .ok_or_else(|| CoreError::Invalid(format!("unknown extended key usage code {code}")))
    }

    /// Reverse lookup from OID arcs
    #[must_use]
    pub fn from_oid(oid: &[u64]) -> Option<Self> {
        Self::ALL.into_iter().find(|u| u.oid() == oid)
    }
}

impl std::fmt::Display for ExtKeyUsage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for ExtKeyUsage {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|u| u.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| CoreError::Invalid(format!("unknown extended key usage {s}")))
    }
}
