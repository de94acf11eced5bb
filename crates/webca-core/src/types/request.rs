use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a certificate request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    /// Waiting for approval or issuance
    #[default]
    Processing,
    /// A certificate was issued
    Issued,
    /// Policy rejected the request; terminal
    Rejected,
    /// Issuance failed unexpectedly; terminal until an operator requeues it
    Error,
}

impl RequestStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Processing)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Processing => write!(f, "processing"),
            Self::Issued => write!(f, "issued"),
            Self::Rejected => write!(f, "rejected"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A user's request for a certificate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,

    /// Requesting user
    pub user: String,

    /// Subject in OpenSSL form, e.g. `/C=ES/O=Example/CN=alice`
    pub subject: String,

    /// Comma separated SAN entries such as `DNS:a.example,email:b@example`
    #[serde(default)]
    pub san: Option<String>,

    /// PEM encoded PKCS#10 request submitted by the user
    pub csr: String,

    pub template_id: u64,

    #[serde(default)]
    pub approved: bool,

    #[serde(default)]
    pub status: RequestStatus,

    /// Shown to the user when rejected
    #[serde(default)]
    pub reject_reason: Option<String>,

    /// Diagnostic detail for administrators
    #[serde(default)]
    pub admin_comment: Option<String>,

    pub created: DateTime<Utc>,
}

impl Request {
    pub fn new(
        id: u64,
        user: impl Into<String>,
        subject: impl Into<String>,
        csr: impl Into<String>,
        template_id: u64,
    ) -> Self {
        Self {
            id,
            user: user.into(),
            subject: subject.into(),
            san: None,
            csr: csr.into(),
            template_id,
            approved: false,
            status: RequestStatus::Processing,
            reject_reason: None,
            admin_comment: None,
            created: Utc::now(),
        }
    }

    /// Approved and still waiting for a certificate
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.approved && self.status == RequestStatus::Processing
    }

    /// Requested SAN entries, trimmed and without empties
    #[must_use]
    pub fn san_entries(&self) -> Vec<String> {
        self.san
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }

    pub fn reject(&mut self, reason: impl Into<String>) {
        self.status = RequestStatus::Rejected;
        self.reject_reason = Some(reason.into());
    }

    pub fn fail(&mut self, comment: impl Into<String>) {
        self.status = RequestStatus::Error;
        self.admin_comment = Some(comment.into());
    }
}
