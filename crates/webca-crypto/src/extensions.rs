//! X.509 v3 extensions: a closed set of known kinds plus a raw fallback.
//!
//! Extensions are described either directly or through JSON descriptors of the
//! form `{"name": "keyUsage", "critical": true, "value": "digitalSignature"}`,
//! where the value uses OpenSSL configuration syntax.

use std::net::IpAddr;

use webca_core::{ExtKeyUsage, ExtensionDescriptor, KeyUsageSet};
use yasna::{DERWriter, Tag};

use crate::der;
use crate::error::{CryptoError, Result};

pub const OID_SUBJECT_KEY_IDENTIFIER: &[u64] = &[2, 5, 29, 14];
pub const OID_KEY_USAGE: &[u64] = &[2, 5, 29, 15];
pub const OID_SUBJECT_ALT_NAME: &[u64] = &[2, 5, 29, 17];
pub const OID_BASIC_CONSTRAINTS: &[u64] = &[2, 5, 29, 19];
pub const OID_CRL_DISTRIBUTION_POINTS: &[u64] = &[2, 5, 29, 31];
pub const OID_AUTHORITY_KEY_IDENTIFIER: &[u64] = &[2, 5, 29, 35];
pub const OID_EXT_KEY_USAGE: &[u64] = &[2, 5, 29, 37];
pub const OID_AUTHORITY_INFO_ACCESS: &[u64] = &[1, 3, 6, 1, 5, 5, 7, 1, 1];

const OID_AD_OCSP: &[u64] = &[1, 3, 6, 1, 5, 5, 7, 48, 1];
const OID_AD_CA_ISSUERS: &[u64] = &[1, 3, 6, 1, 5, 5, 7, 48, 2];

/// GeneralName forms used in SAN, CDP and AIA
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneralName {
    Email(String),
    Dns(String),
    Uri(String),
    Ip(IpAddr),
}

impl GeneralName {
    /// Parse `email:`, `DNS:`, `URI:` or `IP:` prefixed entries
    pub fn parse(entry: &str) -> Result<Self> {
        let (prefix, value) = entry
            .split_once(':')
            .ok_or_else(|| CryptoError::Extension(format!("malformed name entry {entry:?}")))?;
        let value = value.trim();
        let ascii = |v: &str| {
            if v.is_ascii() && !v.is_empty() {
                Ok(v.to_string())
            } else {
                Err(CryptoError::Extension(format!("invalid {prefix} value {v:?}")))
            }
        };
        match prefix.trim().to_ascii_lowercase().as_str() {
            "email" => Ok(Self::Email(ascii(value)?)),
            "dns" => Ok(Self::Dns(ascii(value)?)),
            "uri" => Ok(Self::Uri(ascii(value)?)),
            "ip" => value
                .parse()
                .map(Self::Ip)
                .map_err(|_| CryptoError::Extension(format!("invalid IP address {value:?}"))),
            other => Err(CryptoError::Extension(format!("unsupported name type {other}"))),
        }
    }

    /// Prefix used in OpenSSL syntax and template SAN allow-lists
    #[must_use]
    pub const fn prefix(&self) -> &'static str {
        match self {
            Self::Email(_) => "email",
            Self::Dns(_) => "DNS",
            Self::Uri(_) => "URI",
            Self::Ip(_) => "IP",
        }
    }

    fn write(&self, w: DERWriter) {
        match self {
            Self::Email(v) => w.write_tagged_implicit(Tag::context(1), |w| w.write_ia5_string(v)),
            Self::Dns(v) => w.write_tagged_implicit(Tag::context(2), |w| w.write_ia5_string(v)),
            Self::Uri(v) => w.write_tagged_implicit(Tag::context(6), |w| w.write_ia5_string(v)),
            Self::Ip(IpAddr::V4(a)) => {
                w.write_tagged_implicit(Tag::context(7), |w| w.write_bytes(&a.octets()));
            }
            Self::Ip(IpAddr::V6(a)) => {
                w.write_tagged_implicit(Tag::context(7), |w| w.write_bytes(&a.octets()));
            }
        }
    }
}

impl std::fmt::Display for GeneralName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Email(v) | Self::Dns(v) | Self::Uri(v) => write!(f, "{}:{v}", self.prefix()),
            Self::Ip(a) => write!(f, "IP:{a}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMethod {
    Ocsp,
    CaIssuers,
}

impl AccessMethod {
    const fn oid(self) -> &'static [u64] {
        match self {
            Self::Ocsp => OID_AD_OCSP,
            Self::CaIssuers => OID_AD_CA_ISSUERS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionValue {
    BasicConstraints { ca: bool, path_len: Option<u8> },
    KeyUsage(KeyUsageSet),
    ExtendedKeyUsage(Vec<ExtKeyUsage>),
    SubjectAltName(Vec<GeneralName>),
    /// Full-name URIs, one distribution point each
    CrlDistributionPoints(Vec<String>),
    AuthorityInfoAccess(Vec<(AccessMethod, String)>),
    SubjectKeyIdentifier(Vec<u8>),
    AuthorityKeyIdentifier {
        key_id: Vec<u8>,
        /// DER `Name` of the issuer's issuer
        issuer: Option<Vec<u8>>,
        /// Serial of the issuer certificate
        serial: Option<Vec<u8>>,
    },
    /// Any other extension, value already DER encoded
    Raw { oid: Vec<u64>, der: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub value: ExtensionValue,
    pub critical: bool,
}

impl Extension {
    #[must_use]
    pub const fn new(value: ExtensionValue, critical: bool) -> Self {
        Self { value, critical }
    }

    #[must_use]
    pub fn oid(&self) -> &[u64] {
        match &self.value {
            ExtensionValue::BasicConstraints { .. } => OID_BASIC_CONSTRAINTS,
            ExtensionValue::KeyUsage(_) => OID_KEY_USAGE,
            ExtensionValue::ExtendedKeyUsage(_) => OID_EXT_KEY_USAGE,
            ExtensionValue::SubjectAltName(_) => OID_SUBJECT_ALT_NAME,
            ExtensionValue::CrlDistributionPoints(_) => OID_CRL_DISTRIBUTION_POINTS,
            ExtensionValue::AuthorityInfoAccess(_) => OID_AUTHORITY_INFO_ACCESS,
            ExtensionValue::SubjectKeyIdentifier(_) => OID_SUBJECT_KEY_IDENTIFIER,
            ExtensionValue::AuthorityKeyIdentifier { .. } => OID_AUTHORITY_KEY_IDENTIFIER,
            ExtensionValue::Raw { oid, .. } => oid,
        }
    }

    /// DER of the extension value (the content of `extnValue`)
    #[must_use]
    pub fn value_der(&self) -> Vec<u8> {
        match &self.value {
            ExtensionValue::BasicConstraints { ca, path_len } => yasna::construct_der(|w| {
                w.write_sequence(|w| {
                    if *ca {
                        w.next().write_bool(true);
                    }
                    if let Some(n) = path_len {
                        w.next().write_u8(*n);
                    }
                });
            }),
            ExtensionValue::KeyUsage(set) => {
                let (bytes, len) = key_usage_bits(*set);
                yasna::construct_der(|w| w.write_bitvec_bytes(&bytes, len))
            }
            ExtensionValue::ExtendedKeyUsage(usages) => yasna::construct_der(|w| {
                w.write_sequence_of(|w| {
                    for u in usages {
                        w.next().write_oid(&der::oid(u.oid()));
                    }
                });
            }),
            ExtensionValue::SubjectAltName(names) => yasna::construct_der(|w| {
                w.write_sequence_of(|w| {
                    for n in names {
                        n.write(w.next());
                    }
                });
            }),
            ExtensionValue::CrlDistributionPoints(urls) => yasna::construct_der(|w| {
                w.write_sequence_of(|w| {
                    for url in urls {
                        w.next().write_sequence(|w| {
                            w.next().write_tagged(Tag::context(0), |w| {
                                w.write_tagged_implicit(Tag::context(0), |w| {
                                    w.write_sequence_of(|w| {
                                        GeneralName::Uri(url.clone()).write(w.next());
                                    });
                                });
                            });
                        });
                    }
                });
            }),
            ExtensionValue::AuthorityInfoAccess(entries) => yasna::construct_der(|w| {
                w.write_sequence_of(|w| {
                    for (method, url) in entries {
                        w.next().write_sequence(|w| {
                            w.next().write_oid(&der::oid(method.oid()));
                            GeneralName::Uri(url.clone()).write(w.next());
                        });
                    }
                });
            }),
            ExtensionValue::SubjectKeyIdentifier(id) => yasna::construct_der(|w| w.write_bytes(id)),
            ExtensionValue::AuthorityKeyIdentifier {
                key_id,
                issuer,
                serial,
            } => yasna::construct_der(|w| {
                w.write_sequence(|w| {
                    w.next()
                        .write_tagged_implicit(Tag::context(0), |w| w.write_bytes(key_id));
                    if let (Some(issuer), Some(serial)) = (issuer, serial) {
                        w.next().write_tagged_implicit(Tag::context(1), |w| {
                            w.write_sequence_of(|w| {
                                w.next()
                                    .write_tagged(Tag::context(4), |w| w.write_der(issuer));
                            });
                        });
                        w.next().write_tagged_implicit(Tag::context(2), |w| {
                            w.write_bigint_bytes(serial, true);
                        });
                    }
                });
            }),
            ExtensionValue::Raw { der, .. } => der.clone(),
        }
    }

    /// Full `Extension` SEQUENCE
    #[must_use]
    pub fn to_der(&self) -> Vec<u8> {
        let value = self.value_der();
        yasna::construct_der(|w| der::write_extension(w, self.oid(), self.critical, &value))
    }

    pub(crate) fn to_custom(&self) -> rcgen::CustomExtension {
        let mut ext = rcgen::CustomExtension::from_oid_content(self.oid(), self.value_der());
        ext.set_criticality(self.critical);
        ext
    }

    /// Extension read from a CSR or certificate; kept as raw DER
    #[must_use]
    pub fn from_der(oid: Vec<u64>, critical: bool, der: Vec<u8>) -> Self {
        Self::new(ExtensionValue::Raw { oid, der }, critical)
    }

    /// Build an extension from a `{name, critical, value}` descriptor.
    ///
    /// A value starting with `critical,` also marks the extension critical.
    pub fn from_descriptor(desc: &ExtensionDescriptor) -> Result<Self> {
        let mut value = desc.value.trim();
        let mut critical = desc.critical;
        if let Some(rest) = value.strip_prefix("critical") {
            if let Some(rest) = rest.trim_start().strip_prefix(',') {
                critical = true;
                value = rest.trim();
            }
        }
        let parsed = match desc.name.as_str() {
            "basicConstraints" => parse_basic_constraints(value)?,
            "keyUsage" => ExtensionValue::KeyUsage(value.parse()?),
            "extendedKeyUsage" => ExtensionValue::ExtendedKeyUsage(
                split_list(value)
                    .map(str::parse::<ExtKeyUsage>)
                    .collect::<std::result::Result<_, _>>()?,
            ),
            "subjectAltName" => ExtensionValue::SubjectAltName(
                split_list(value)
                    .map(GeneralName::parse)
                    .collect::<Result<_>>()?,
            ),
            "crlDistributionPoints" => ExtensionValue::CrlDistributionPoints(
                split_list(value)
                    .map(|e| match GeneralName::parse(e)? {
                        GeneralName::Uri(u) => Ok(u),
                        other => Err(CryptoError::Extension(format!(
                            "distribution points must be URIs, got {other}"
                        ))),
                    })
                    .collect::<Result<_>>()?,
            ),
            "authorityInfoAccess" => ExtensionValue::AuthorityInfoAccess(
                split_list(value)
                    .map(parse_access_description)
                    .collect::<Result<_>>()?,
            ),
            "subjectKeyIdentifier" => ExtensionValue::SubjectKeyIdentifier(
                hex::decode(value.replace(':', "")).map_err(|e| {
                    CryptoError::Extension(format!("invalid key identifier {value:?}: {e}"))
                })?,
            ),
            name if name.starts_with(|c: char| c.is_ascii_digit()) => {
                let oid = der::parse_oid(name)?;
                let der = if let Some(hex_value) = value.strip_prefix("DER:") {
                    hex::decode(hex_value.replace(':', "")).map_err(|e| {
                        CryptoError::Extension(format!("invalid DER value for {name}: {e}"))
                    })?
                } else {
                    yasna::construct_der(|w| w.write_utf8_string(value))
                };
                ExtensionValue::Raw { oid, der }
            }
            other => {
                return Err(CryptoError::Extension(format!(
                    "unknown extension name {other}"
                )))
            }
        };
        Ok(Self::new(parsed, critical))
    }
}

/// Parse one JSON extension descriptor
pub fn json_to_extension(json: &str) -> Result<Extension> {
    let desc: ExtensionDescriptor = serde_json::from_str(json)?;
    Extension::from_descriptor(&desc)
}

/// SubjectAltName from `prefix:value` entries
pub fn build_san<S: AsRef<str>>(entries: &[S]) -> Result<Extension> {
    let names = entries
        .iter()
        .map(|e| GeneralName::parse(e.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    Ok(Extension::new(ExtensionValue::SubjectAltName(names), false))
}

/// CRL distribution points, one per URL
#[must_use]
pub fn build_cdp(urls: &[String]) -> Extension {
    Extension::new(ExtensionValue::CrlDistributionPoints(urls.to_vec()), false)
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_basic_constraints(value: &str) -> Result<ExtensionValue> {
    let mut ca = None;
    let mut path_len = None;
    for part in split_list(value) {
        let (key, v) = part
            .split_once(':')
            .ok_or_else(|| CryptoError::Extension(format!("malformed basicConstraints {value:?}")))?;
        match key.trim().to_ascii_lowercase().as_str() {
            "ca" => ca = Some(v.trim().eq_ignore_ascii_case("true")),
            "pathlen" => {
                path_len = Some(v.trim().parse::<u8>().map_err(|_| {
                    CryptoError::Extension(format!("invalid pathlen {v:?}"))
                })?);
            }
            other => {
                return Err(CryptoError::Extension(format!(
                    "unknown basicConstraints field {other}"
                )))
            }
        }
    }
    let ca = ca.ok_or_else(|| CryptoError::Extension(String::from("basicConstraints needs CA:")))?;
    if !ca && path_len.is_some() {
        return Err(CryptoError::Extension(String::from(
            "pathlen requires CA:TRUE",
        )));
    }
    Ok(ExtensionValue::BasicConstraints { ca, path_len })
}

/// `OCSP;URI:http://...` or `caIssuers;URI:http://...`
fn parse_access_description(entry: &str) -> Result<(AccessMethod, String)> {
    let (method, location) = entry
        .split_once(';')
        .ok_or_else(|| CryptoError::Extension(format!("malformed access description {entry:?}")))?;
    let method = match method.trim() {
        m if m.eq_ignore_ascii_case("OCSP") => AccessMethod::Ocsp,
        m if m.eq_ignore_ascii_case("caIssuers") => AccessMethod::CaIssuers,
        other => {
            return Err(CryptoError::Extension(format!(
                "unknown access method {other}"
            )))
        }
    };
    match GeneralName::parse(location)? {
        GeneralName::Uri(u) => Ok((method, u)),
        other => Err(CryptoError::Extension(format!(
            "access location must be a URI, got {other}"
        ))),
    }
}

/// Named bit list encoding: trailing zero bits dropped
fn key_usage_bits(set: KeyUsageSet) -> (Vec<u8>, usize) {
    let bits = set.bits();
    if bits == 0 {
        return (Vec::new(), 0);
    }
    let len = 16 - bits.leading_zeros() as usize;
    let mut bytes = vec![0u8; len.div_ceil(8)];
    for i in 0..len {
        if bits & (1 << i) != 0 {
            bytes[i / 8] |= 0x80 >> (i % 8);
        }
    }
    (bytes, len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use webca_core::KeyUsage;
    use x509_parser::extensions::{GeneralName as ParsedName, ParsedExtension, X509Extension};
    use x509_parser::prelude::FromDer;

    fn parse(ext: &Extension) -> X509Extension<'static> {
        let der: &'static [u8] = Box::leak(ext.to_der().into_boxed_slice());
        X509Extension::from_der(der).unwrap().1
    }

    #[test]
    fn test_basic_constraints_descriptor() {
        let ext = Extension::from_descriptor(&ExtensionDescriptor::new(
            "basicConstraints",
            false,
            "critical, CA:TRUE, pathlen:0",
        ))
        .unwrap();
        assert!(ext.critical);
        assert_eq!(
            ext.value,
            ExtensionValue::BasicConstraints {
                ca: true,
                path_len: Some(0)
            }
        );
        match parse(&ext).parsed_extension() {
            ParsedExtension::BasicConstraints(bc) => {
                assert!(bc.ca);
                assert_eq!(bc.path_len_constraint, Some(0));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_end_entity_basic_constraints_is_empty_sequence() {
        let ext = Extension::new(
            ExtensionValue::BasicConstraints {
                ca: false,
                path_len: None,
            },
            true,
        );
        assert_eq!(ext.value_der(), vec![0x30, 0x00]);
    }

    #[test]
    fn test_key_usage_bits() {
        let set = KeyUsageSet::of(&[KeyUsage::DigitalSignature, KeyUsage::KeyEncipherment]);
        assert_eq!(key_usage_bits(set), (vec![0b1010_0000], 3));
        let set = KeyUsageSet::of(&[KeyUsage::DecipherOnly]);
        assert_eq!(key_usage_bits(set), (vec![0, 0x80], 9));

        let ext = Extension::new(ExtensionValue::KeyUsage(KeyUsageSet::of(&[
            KeyUsage::KeyCertSign,
            KeyUsage::CrlSign,
        ])), true);
        match parse(&ext).parsed_extension() {
            ParsedExtension::KeyUsage(ku) => {
                assert!(ku.key_cert_sign());
                assert!(ku.crl_sign());
                assert!(!ku.digital_signature());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_san_descriptor() {
        let ext = json_to_extension(
            r#"{"name": "subjectAltName", "critical": false, "value": "DNS:www.example.org, email:a@example.org, IP:10.0.0.1"}"#,
        )
        .unwrap();
        match parse(&ext).parsed_extension() {
            ParsedExtension::SubjectAlternativeName(san) => {
                assert_eq!(san.general_names.len(), 3);
                assert!(matches!(san.general_names[0], ParsedName::DNSName("www.example.org")));
                assert!(matches!(san.general_names[1], ParsedName::RFC822Name("a@example.org")));
                assert!(matches!(san.general_names[2], ParsedName::IPAddress(ip) if ip.to_vec() == vec![10, 0, 0, 1]));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_cdp_and_aia() {
        let cdp = build_cdp(&[String::from("http://ca.example.org/ca.crl")]);
        match parse(&cdp).parsed_extension() {
            ParsedExtension::CRLDistributionPoints(points) => assert_eq!(points.points.len(), 1),
            other => panic!("unexpected {other:?}"),
        }

        let aia = Extension::from_descriptor(&ExtensionDescriptor::new(
            "authorityInfoAccess",
            false,
            "OCSP;URI:http://ocsp.example.org",
        ))
        .unwrap();
        match parse(&aia).parsed_extension() {
            ParsedExtension::AuthorityInfoAccess(aia) => {
                assert_eq!(aia.accessdescs.len(), 1);
                assert!(matches!(
                    aia.accessdescs[0].access_location,
                    ParsedName::URI("http://ocsp.example.org")
                ));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_oid_named_extension() {
        let ext = Extension::from_descriptor(&ExtensionDescriptor::new(
            "1.3.6.1.4.1.99999.1",
            false,
            "DER:0500",
        ))
        .unwrap();
        assert_eq!(ext.oid(), &[1, 3, 6, 1, 4, 1, 99999, 1]);
        assert_eq!(ext.value_der(), vec![0x05, 0x00]);
    }

    #[test]
    fn test_rejects_unknown_and_malformed() {
        assert!(json_to_extension(r#"{"name": "bogusExtension", "value": "x"}"#).is_err());
        assert!(json_to_extension("{not json").is_err());
        assert!(json_to_extension(r#"{"name": "keyUsage", "value": "flying"}"#).is_err());
        assert!(json_to_extension(r#"{"name": "basicConstraints", "value": "CA:FALSE, pathlen:1"}"#).is_err());
    }
}
