use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Reason a certificate was revoked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RevocationReason {
    #[default]
    Unspecified,
    KeyCompromise,
    #[serde(rename = "CACompromise")]
    CaCompromise,
    AffiliationChanged,
    Superseded,
    CessationOfOperation,
    CertificateHold,
}

impl RevocationReason {
    pub const ALL: [Self; 7] = [
        Self::Unspecified,
        Self::KeyCompromise,
        Self::CaCompromise,
        Self::AffiliationChanged,
        Self::Superseded,
        Self::CessationOfOperation,
        Self::CertificateHold,
    ];

    /// Reasons an end user may pick when revoking their own certificate
    pub const USER_SELECTABLE: [Self; 5] = [
        Self::Unspecified,
        Self::KeyCompromise,
        Self::AffiliationChanged,
        Self::Superseded,
        Self::CessationOfOperation,
    ];

    /// Stable numeric code used by stored records (1-based)
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Unspecified => 1,
            Self::KeyCompromise => 2,
            Self::CaCompromise => 3,
            Self::AffiliationChanged => 4,
            Self::Superseded => 5,
            Self::CessationOfOperation => 6,
            Self::CertificateHold => 7,
        }
    }

    /// `CRLReason` enumeration value (RFC 5280 5.3.1)
    #[must_use]
    pub const fn crl_code(self) -> u8 {
        self.code() - 1
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Unspecified => "unspecified",
            Self::KeyCompromise => "keyCompromise",
            Self::CaCompromise => "CACompromise",
            Self::AffiliationChanged => "affiliationChanged",
            Self::Superseded => "superseded",
            Self::CessationOfOperation => "cessationOfOperation",
            Self::CertificateHold => "certificateHold",
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|r| r.code() == code)
            .ok_or_else(|| CoreError::Invalid(format!("unknown revocation reason code {code}")))
    }

    /// Map a `CRLReason` value back, if it is one this system issues
    #[must_use]
    pub fn from_crl_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.crl_code() == code)
    }

    #[must_use]
    pub fn is_user_selectable(self) -> bool {
        Self::USER_SELECTABLE.contains(&self)
    }
}

impl std::fmt::Display for RevocationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for RevocationReason {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|r| r.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| CoreError::Invalid(format!("unknown revocation reason {s}")))
    }
}
