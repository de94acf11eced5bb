//! Certificate construction and inspection.
//!
//! Certificates are assembled with rcgen. Every extension, including the
//! basic constraints, travels as an explicit extension so the issued
//! certificate carries exactly what the (internal) request asked for, plus a
//! computed SubjectKeyIdentifier and AuthorityKeyIdentifier.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use rcgen::{CertificateParams, IsCa, SerialNumber};
use time::OffsetDateTime;
use tracing::debug;
use webca_core::{BasicConstraintsPolicy, ExtKeyUsage, KeyType, KeyUsage, KeyUsageSet, SubjectName};
use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::{GeneralName as ParsedName, ParsedExtension};
use x509_parser::prelude::FromDer;

use crate::csr::{create_certificate_request, create_self_signed_request, CertificateRequest};
use crate::der;
use crate::error::{CryptoError, Result};
use crate::extensions::{
    Extension, ExtensionValue, OID_AUTHORITY_KEY_IDENTIFIER, OID_SUBJECT_KEY_IDENTIFIER,
};
use crate::keys::{KeyPair, PublicKey};
use crate::name::{encode_name, from_x509_name, to_distinguished_name};
use crate::serial::Serial;

const PEM_TAG: &str = "CERTIFICATE";

/// Decoded fields of a certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    pub serial: Serial,
    pub subject: SubjectName,
    /// DER `Name` of the subject, as encoded in the certificate
    pub subject_der: Vec<u8>,
    pub issuer_der: Vec<u8>,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub public_key: PublicKey,
    pub key_id: Option<Vec<u8>>,
    pub basic_constraints: Option<BasicConstraintsPolicy>,
    pub key_usage: KeyUsageSet,
    pub ext_key_usage: Vec<ExtKeyUsage>,
    /// SAN entries in `prefix:value` form
    pub subject_alt_names: Vec<String>,
}

impl CertificateInfo {
    fn from_x509(cert: &X509Certificate<'_>) -> Result<Self> {
        let not_before = der::from_unix(cert.validity().not_before.timestamp())?;
        let not_after = der::from_unix(cert.validity().not_after.timestamp())?;

        let basic_constraints = cert
            .basic_constraints()
            .map_err(|e| CryptoError::Certificate(format!("bad basicConstraints: {e}")))?
            .map(|bc| BasicConstraintsPolicy {
                ca: bc.value.ca,
                path_len: bc
                    .value
                    .path_len_constraint
                    .and_then(|n| u8::try_from(n).ok()),
            });

        let mut key_usage = KeyUsageSet::empty();
        if let Ok(Some(ku)) = cert.key_usage() {
            let ku = ku.value;
            let flags = [
                (ku.digital_signature(), KeyUsage::DigitalSignature),
                (ku.non_repudiation(), KeyUsage::NonRepudiation),
                (ku.key_encipherment(), KeyUsage::KeyEncipherment),
                (ku.data_encipherment(), KeyUsage::DataEncipherment),
                (ku.key_agreement(), KeyUsage::KeyAgreement),
                (ku.key_cert_sign(), KeyUsage::KeyCertSign),
                (ku.crl_sign(), KeyUsage::CrlSign),
                (ku.encipher_only(), KeyUsage::EncipherOnly),
                (ku.decipher_only(), KeyUsage::DecipherOnly),
            ];
            key_usage = flags.into_iter().filter(|(set, _)| *set).map(|(_, u)| u).collect();
        }

        let mut ext_key_usage = Vec::new();
        if let Ok(Some(eku)) = cert.extended_key_usage() {
            let eku = eku.value;
            let flags = [
                (eku.server_auth, ExtKeyUsage::ServerAuth),
                (eku.client_auth, ExtKeyUsage::ClientAuth),
                (eku.code_signing, ExtKeyUsage::CodeSigning),
                (eku.email_protection, ExtKeyUsage::EmailProtection),
                (eku.time_stamping, ExtKeyUsage::TimeStamping),
                (eku.ocsp_signing, ExtKeyUsage::OcspSigning),
            ];
            ext_key_usage.extend(flags.into_iter().filter(|(set, _)| *set).map(|(_, u)| u));
            for oid in &eku.other {
                if let Some(u) = der::parse_oid(&oid.to_id_string())
                    .ok()
                    .and_then(|arcs| ExtKeyUsage::from_oid(&arcs))
                {
                    ext_key_usage.push(u);
                }
            }
        }

        let mut subject_alt_names = Vec::new();
        if let Ok(Some(san)) = cert.subject_alternative_name() {
            for name in &san.value.general_names {
                match name {
                    ParsedName::RFC822Name(v) => subject_alt_names.push(format!("email:{v}")),
                    ParsedName::DNSName(v) => subject_alt_names.push(format!("DNS:{v}")),
                    ParsedName::URI(v) => subject_alt_names.push(format!("URI:{v}")),
                    ParsedName::IPAddress(bytes) => {
                        let ip = match bytes.len() {
                            4 => <[u8; 4]>::try_from(*bytes).ok().map(IpAddr::from),
                            16 => <[u8; 16]>::try_from(*bytes).ok().map(IpAddr::from),
                            _ => None,
                        };
                        if let Some(ip) = ip {
                            subject_alt_names.push(format!("IP:{ip}"));
                        }
                    }
                    other => debug!(name = ?other, "ignoring SAN entry"),
                }
            }
        }

        let key_id = cert.extensions().iter().find_map(|ext| match ext.parsed_extension() {
            ParsedExtension::SubjectKeyIdentifier(kid) => Some(kid.0.to_vec()),
            _ => None,
        });

        Ok(Self {
            serial: Serial::from_bytes(cert.raw_serial()),
            subject: from_x509_name(cert.subject())?,
            subject_der: cert.subject().as_raw().to_vec(),
            issuer_der: cert.issuer().as_raw().to_vec(),
            not_before,
            not_after,
            public_key: PublicKey::from_spki(cert.public_key())?,
            key_id,
            basic_constraints,
            key_usage,
            ext_key_usage,
            subject_alt_names,
        })
    }

    #[must_use]
    pub fn is_ca(&self) -> bool {
        self.basic_constraints.is_some_and(|bc| bc.ca)
    }
}

/// A DER encoded certificate with its decoded fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    der: Vec<u8>,
    info: CertificateInfo,
}

impl Certificate {
    pub fn from_der(der: Vec<u8>) -> Result<Self> {
        let (_, cert) = X509Certificate::from_der(&der)
            .map_err(|e| CryptoError::Certificate(format!("unparsable certificate: {e}")))?;
        let info = CertificateInfo::from_x509(&cert)?;
        Ok(Self { der, info })
    }

    pub fn from_pem(pem: &str) -> Result<Self> {
        let block = pem::parse(pem)
            .map_err(|e| CryptoError::Certificate(format!("invalid PEM: {e}")))?;
        if block.tag() != PEM_TAG {
            return Err(CryptoError::Certificate(format!(
                "expected a certificate, found {}",
                block.tag()
            )));
        }
        Self::from_der(block.contents().to_vec())
    }

    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    #[must_use]
    pub fn to_pem(&self) -> String {
        pem::encode(&pem::Pem::new(PEM_TAG, self.der.clone()))
    }

    #[must_use]
    pub const fn info(&self) -> &CertificateInfo {
        &self.info
    }

    #[must_use]
    pub const fn serial(&self) -> &Serial {
        &self.info.serial
    }
}

/// Who signs a new certificate
#[derive(Debug, Clone, Copy)]
pub enum Issuer<'a> {
    /// The request is signed with its own key (a root)
    SelfSigned(&'a KeyPair),
    /// An existing CA certificate and its key
    Certificate(&'a Certificate, &'a KeyPair),
}

/// Validity as offsets in seconds from the signing time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validity {
    pub not_before: i64,
    pub not_after: i64,
}

impl Validity {
    #[must_use]
    pub const fn seconds(not_before: i64, not_after: i64) -> Self {
        Self {
            not_before,
            not_after,
        }
    }

    /// Starting now, lasting `days`
    #[must_use]
    pub const fn days(days: u32) -> Self {
        Self::seconds(0, days as i64 * 86_400)
    }
}

fn offset(secs: i64) -> Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(secs)
        .map_err(|e| CryptoError::Certificate(format!("time out of range: {e}")))
}

/// Sign a certificate for `request`.
///
/// Subject and extensions are copied from the request; SubjectKeyIdentifier
/// and AuthorityKeyIdentifier are computed. When the issuer is a certificate
/// the new validity must lie within the issuer's.
pub fn create_certificate(
    request: &CertificateRequest,
    issuer: Issuer<'_>,
    serial: &Serial,
    validity: Validity,
) -> Result<Certificate> {
    let now = Utc::now().timestamp();
    let not_before = now + validity.not_before;
    let not_after = now + validity.not_after;
    if not_after <= not_before {
        return Err(CryptoError::Certificate(String::from(
            "validity ends before it starts",
        )));
    }

    let authority_key_id = match issuer {
        Issuer::SelfSigned(key) => {
            if key.public().raw() != request.public_key.raw() {
                return Err(CryptoError::Certificate(String::from(
                    "self-signed request does not carry the signing key",
                )));
            }
            ExtensionValue::AuthorityKeyIdentifier {
                key_id: request.public_key.key_id(),
                issuer: Some(encode_name(&request.subject)?),
                serial: Some(serial.as_bytes().to_vec()),
            }
        }
        Issuer::Certificate(cert, key) => {
            let info = cert.info();
            if key.public().raw() != info.public_key.raw() {
                return Err(CryptoError::Certificate(String::from(
                    "issuer key does not match issuer certificate",
                )));
            }
            let (issuer_nb, issuer_na) = (info.not_before.timestamp(), info.not_after.timestamp());
            if not_before < issuer_nb || not_after > issuer_na {
                return Err(CryptoError::ValidityExceedsIssuer {
                    not_before,
                    not_after,
                    issuer_not_before: issuer_nb,
                    issuer_not_after: issuer_na,
                });
            }
            ExtensionValue::AuthorityKeyIdentifier {
                key_id: info
                    .key_id
                    .clone()
                    .unwrap_or_else(|| info.public_key.key_id()),
                issuer: Some(info.issuer_der.clone()),
                serial: Some(info.serial.as_bytes().to_vec()),
            }
        }
    };

    let mut params = CertificateParams::default();
    params.not_before = offset(not_before)?;
    params.not_after = offset(not_after)?;
    params.serial_number = Some(SerialNumber::from(serial.as_bytes().to_vec()));
    params.distinguished_name = to_distinguished_name(&request.subject)?;
    params.is_ca = IsCa::NoCa;
    params.use_authority_key_identifier_extension = false;

    let generated = [OID_SUBJECT_KEY_IDENTIFIER, OID_AUTHORITY_KEY_IDENTIFIER];
    params.custom_extensions = request
        .extensions
        .iter()
        .filter(|e| !generated.contains(&e.oid()))
        .map(Extension::to_custom)
        .collect();
    params.custom_extensions.push(
        Extension::new(
            ExtensionValue::SubjectKeyIdentifier(request.public_key.key_id()),
            false,
        )
        .to_custom(),
    );
    params
        .custom_extensions
        .push(Extension::new(authority_key_id, false).to_custom());

    let der = match issuer {
        Issuer::SelfSigned(key) => params.self_signed(key)?.der().to_vec(),
        Issuer::Certificate(cert, key) => {
            let subject_key = request.public_key.subject_key()?;
            let signer = rcgen::Issuer::from_ca_cert_pem(&cert.to_pem(), key)?;
            params.signed_by(&subject_key, &signer)?.der().to_vec()
        }
    };
    debug!(serial = %serial, subject = %request.subject, "signed certificate");
    Certificate::from_der(der)
}

/// New key pair and self-signed certificate
pub fn create_self_signed(
    name: &SubjectName,
    key_type: KeyType,
    bits: u32,
    duration_secs: i64,
    extensions: &[Extension],
) -> Result<(KeyPair, Certificate)> {
    let key = KeyPair::generate(key_type, bits)?;
    let request = create_self_signed_request(&key, name, extensions)?;
    let cert = create_certificate(
        &request,
        Issuer::SelfSigned(&key),
        &Serial::generate(),
        Validity::seconds(0, duration_secs),
    )?;
    Ok((key, cert))
}

/// New RSA CA key pair and certificate, self-signed unless `signing` is given.
///
/// Always carries critical `CA:TRUE[, pathlen:N]` and `keyCertSign, cRLSign`.
pub fn create_ca_certificate(
    name: &SubjectName,
    bits: u32,
    path_len: Option<u8>,
    duration_secs: i64,
    signing: Option<(&Certificate, &KeyPair)>,
) -> Result<(KeyPair, Certificate)> {
    let extensions = [
        Extension::new(ExtensionValue::BasicConstraints { ca: true, path_len }, true),
        Extension::new(
            ExtensionValue::KeyUsage(KeyUsageSet::of(&[KeyUsage::KeyCertSign, KeyUsage::CrlSign])),
            true,
        ),
    ];
    let Some((cert, cert_key)) = signing else {
        return create_self_signed(name, KeyType::Rsa, bits, duration_secs, &extensions);
    };
    let key = KeyPair::generate(KeyType::Rsa, bits)?;
    let request = create_certificate_request(key.public(), name, &extensions, &key)?;
    let issued = create_certificate(
        &request,
        Issuer::Certificate(cert, cert_key),
        &Serial::generate(),
        Validity::seconds(0, duration_secs),
    )?;
    Ok((key, issued))
}
