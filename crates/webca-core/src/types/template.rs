use serde::{Deserialize, Serialize};

use super::{ExtKeyUsage, ExtensionDescriptor, KeyType, KeyUsageSet};

/// Shape the subject of a request must have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    /// Common name only
    #[default]
    Cn,
    /// Common name plus email address; the email moves into the SAN
    User,
    /// Full distinguished name (C, ST, L, O, OU, CN)
    Dn,
    /// Distinguished name with at least a common name
    DnPartial,
}

/// basicConstraints policy of a template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BasicConstraintsPolicy {
    /// Issue CA certificates
    #[serde(default)]
    pub ca: bool,

    /// Maximum number of intermediate CAs below the issued one
    #[serde(default)]
    pub path_len: Option<u8>,
}

impl BasicConstraintsPolicy {
    #[must_use]
    pub const fn end_entity() -> Self {
        Self {
            ca: false,
            path_len: None,
        }
    }

    #[must_use]
    pub const fn ca(path_len: Option<u8>) -> Self {
        Self { ca: true, path_len }
    }
}

impl std::fmt::Display for BasicConstraintsPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.ca, self.path_len) {
            (false, _) => write!(f, "CA:FALSE"),
            (true, None) => write!(f, "CA:TRUE"),
            (true, Some(n)) => write!(f, "CA:TRUE, pathlen:{n}"),
        }
    }
}

/// Administrator-defined issuance policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: u64,

    pub name: String,

    /// Validity of issued certificates in days
    pub days: u32,

    #[serde(default = "default_min_bits_rsa")]
    pub min_bits_rsa: u32,

    #[serde(default = "default_min_bits_dsa")]
    pub min_bits_dsa: u32,

    #[serde(default = "default_min_bits_ec")]
    pub min_bits_ec: u32,

    #[serde(default)]
    pub required_subject: SubjectKind,

    /// SAN prefixes a request may ask for (`DNS`, `email`, `URI`, `IP`)
    #[serde(default)]
    pub allowed_san: Vec<String>,

    #[serde(default)]
    pub basic_constraints: BasicConstraintsPolicy,

    #[serde(default)]
    pub key_usage: KeyUsageSet,

    #[serde(default)]
    pub ext_key_usage: Vec<ExtKeyUsage>,

    #[serde(default)]
    pub ext_key_usage_critical: bool,

    /// Additional extensions appended to every certificate
    #[serde(default)]
    pub extensions: Vec<ExtensionDescriptor>,

    #[serde(default)]
    pub auto_sign: bool,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_version")]
    pub version: u32,
}

const fn default_min_bits_rsa() -> u32 {
    2048
}

const fn default_min_bits_dsa() -> u32 {
    2048
}

const fn default_min_bits_ec() -> u32 {
    256
}

const fn default_true() -> bool {
    true
}

const fn default_version() -> u32 {
    1
}

impl Template {
    /// New enabled end-entity template with default key minimums
    pub fn new(id: u64, name: impl Into<String>, days: u32) -> Self {
        Self {
            id,
            name: name.into(),
            days,
            min_bits_rsa: default_min_bits_rsa(),
            min_bits_dsa: default_min_bits_dsa(),
            min_bits_ec: default_min_bits_ec(),
            required_subject: SubjectKind::default(),
            allowed_san: Vec::new(),
            basic_constraints: BasicConstraintsPolicy::end_entity(),
            key_usage: KeyUsageSet::empty(),
            ext_key_usage: Vec::new(),
            ext_key_usage_critical: false,
            extensions: Vec::new(),
            auto_sign: false,
            enabled: true,
            version: default_version(),
        }
    }

    /// Minimum key size for this key type
    #[must_use]
    pub const fn min_bits_for(&self, key_type: KeyType) -> u32 {
        match key_type {
            KeyType::Rsa => self.min_bits_rsa,
            KeyType::Dsa => self.min_bits_dsa,
            KeyType::Ec => self.min_bits_ec,
        }
    }

    /// Validity in seconds
    #[must_use]
    pub fn validity_secs(&self) -> i64 {
        i64::from(self.days) * 86_400
    }

    #[must_use]
    pub fn allows_san_prefix(&self, prefix: &str) -> bool {
        self.allowed_san
            .iter()
            .any(|p| p.eq_ignore_ascii_case(prefix))
    }

    /// Edit the template, bumping `version` when any policy field changed.
    ///
    /// Name, `enabled` and `version` itself are not policy fields.
    pub fn revise(&mut self, edit: impl FnOnce(&mut Self)) {
        let before = self.policy();
        edit(self);
        if self.policy() != before {
            self.version += 1;
        }
    }

    fn policy(&self) -> Self {
        Self {
            name: String::new(),
            enabled: true,
            version: 0,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KeyUsage;

    #[test]
    fn test_min_bits_for() {
        let mut t = Template::new(1, "web", 365);
        t.min_bits_ec = 384;
        assert_eq!(t.min_bits_for(KeyType::Rsa), 2048);
        assert_eq!(t.min_bits_for(KeyType::Ec), 384);
        assert_eq!(t.validity_secs(), 365 * 86_400);
    }

    #[test]
    fn test_revise_bumps_version_on_policy_change() {
        let mut t = Template::new(1, "web", 365);
        t.revise(|t| t.name = String::from("renamed"));
        assert_eq!(t.version, 1);
        t.revise(|t| t.key_usage.insert(KeyUsage::DigitalSignature));
        assert_eq!(t.version, 2);
        t.revise(|t| t.days = 30);
        assert_eq!(t.version, 3);
        t.revise(|t| t.days = 30);
        assert_eq!(t.version, 3);
    }

    #[test]
    fn test_deserialize_defaults() {
        let t: Template = serde_json::from_str(r#"{"id": 4, "name": "x", "days": 10}"#).unwrap();
        assert!(t.enabled);
        assert_eq!(t.version, 1);
        assert_eq!(t.min_bits_rsa, 2048);
        assert!(!t.basic_constraints.ca);
        assert_eq!(t.basic_constraints.to_string(), "CA:FALSE");
    }

    #[test]
    fn test_san_prefix() {
        let mut t = Template::new(1, "web", 365);
        t.allowed_san = vec![String::from("DNS")];
        assert!(t.allows_san_prefix("dns"));
        assert!(!t.allows_san_prefix("email"));
    }
}
