use serde::{Deserialize, Serialize};

/// JSON description of a certificate extension
///
/// ```json
/// {"name": "authorityInfoAccess", "critical": false, "value": "OCSP;URI:http://ocsp.example/"}
/// ```
///
/// `name` is an OpenSSL extension short name or a dotted OID; `value` is the
/// ASCII configuration string for that extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionDescriptor {
    pub name: String,

    #[serde(default)]
    pub critical: bool,

    pub value: String,
}

impl ExtensionDescriptor {
    pub fn new(name: impl Into<String>, critical: bool, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            critical,
            value: value.into(),
        }
    }
}
