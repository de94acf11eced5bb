//! PKCS#10 certificate signing requests.

use webca_core::{policy, KeyType, SubjectName, Template};
use x509_parser::certification_request::X509CertificationRequest;
use x509_parser::cri_attributes::ParsedCriAttribute;
use x509_parser::prelude::FromDer;
use yasna::Tag;

use crate::der::{self, sign_der};
use crate::error::{CryptoError, Result};
use crate::extensions::Extension;
use crate::keys::{KeyPair, PublicKey};
use crate::name::{encode_name, from_x509_name};

const OID_EXTENSION_REQUEST: &[u64] = &[1, 2, 840, 113_549, 1, 9, 14];
const PEM_TAG: &str = "CERTIFICATE REQUEST";

/// A parsed certificate signing request.
///
/// The signature is not verified: submitted requests are only a carrier for
/// the public key and subject, and every issued certificate goes through an
/// internally re-signed request first.
#[derive(Debug, Clone)]
pub struct CertificateRequest {
    der: Vec<u8>,
    pub subject: SubjectName,
    pub public_key: PublicKey,
    /// Requested extensions, in order
    pub extensions: Vec<Extension>,
}

impl CertificateRequest {
    /// Parse a PEM or DER encoded request
    pub fn parse(input: &[u8]) -> Result<Self> {
        let start = input
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(input.len());
        let trimmed = &input[start..];
        if trimmed.starts_with(b"-----BEGIN") {
            let block = pem::parse(trimmed)?;
            if block.tag() != PEM_TAG && block.tag() != "NEW CERTIFICATE REQUEST" {
                return Err(CryptoError::Csr(format!(
                    "expected a certificate request, found {}",
                    block.tag()
                )));
            }
            Self::from_der(block.contents().to_vec())
        } else {
            Self::from_der(input.to_vec())
        }
    }

    pub fn from_pem(pem: &str) -> Result<Self> {
        Self::parse(pem.as_bytes())
    }

    pub fn from_der(der: Vec<u8>) -> Result<Self> {
        let (_, csr) = X509CertificationRequest::from_der(&der)
            .map_err(|e| CryptoError::Csr(format!("unparsable request: {e}")))?;
        let info = &csr.certification_request_info;
        let subject = from_x509_name(&info.subject)?;
        let public_key = PublicKey::from_spki(&info.subject_pki)?;

        let mut extensions = Vec::new();
        for attr in info.iter_attributes() {
            if let ParsedCriAttribute::ExtensionRequest(req) = attr.parsed_attribute() {
                for ext in &req.extensions {
                    extensions.push(Extension::from_der(
                        der::parse_oid(&ext.oid.to_id_string())?,
                        ext.critical,
                        ext.value.to_vec(),
                    ));
                }
            }
        }

        Ok(Self {
            der,
            subject,
            public_key,
            extensions,
        })
    }

    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    #[must_use]
    pub fn to_pem(&self) -> String {
        pem::encode(&pem::Pem::new(PEM_TAG, self.der.clone()))
    }

    /// Key type and size check against a template
    pub fn check_against(&self, template: &Template) -> Result<()> {
        policy::check_key_type(template, self.public_key.key_type)?;
        policy::check_key_size(template, self.public_key.key_type, self.public_key.bits)?;
        Ok(())
    }
}

/// Build a request for `public_key` and sign it with `signer`.
///
/// The signer need not own `public_key`; the issuance path signs requests
/// for user keys with the dedicated CSR signing key.
pub fn create_certificate_request(
    public_key: &PublicKey,
    subject: &SubjectName,
    extensions: &[Extension],
    signer: &KeyPair,
) -> Result<CertificateRequest> {
    if subject.is_empty() {
        return Err(CryptoError::Csr(String::from("request subject is empty")));
    }
    let name = encode_name(subject)?;
    let ext_der: Vec<Vec<u8>> = extensions.iter().map(Extension::to_der).collect();

    let info = yasna::construct_der(|w| {
        w.write_sequence(|w| {
            w.next().write_u8(0);
            w.next().write_der(&name);
            w.next().write_der(public_key.spki());
            w.next().write_tagged_implicit(Tag::context(0), |w| {
                w.write_set(|w| {
                    if ext_der.is_empty() {
                        return;
                    }
                    w.next().write_sequence(|w| {
                        w.next().write_oid(&der::oid(OID_EXTENSION_REQUEST));
                        w.next().write_set(|w| {
                            w.next().write_sequence(|w| {
                                for ext in &ext_der {
                                    w.next().write_der(ext);
                                }
                            });
                        });
                    });
                });
            });
        });
    });

    CertificateRequest::from_der(sign_der(&info, signer)?)
}

/// Self-signed request for a key pair we hold
pub fn create_self_signed_request(
    key: &KeyPair,
    subject: &SubjectName,
    extensions: &[Extension],
) -> Result<CertificateRequest> {
    create_certificate_request(key.public(), subject, extensions, key)
}

/// Summary of a submitted request, as shown before approval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSummary {
    pub subject: SubjectName,
    pub key_type: KeyType,
    pub bits: u32,
}

/// Parse a submitted request and check its key against the template
pub fn validate_request(input: &[u8], template: &Template) -> Result<RequestSummary> {
    let csr = CertificateRequest::parse(input)?;
    csr.check_against(template)?;
    Ok(RequestSummary {
        subject: csr.subject,
        key_type: csr.public_key.key_type,
        bits: csr.public_key.bits,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extensions::ExtensionValue;
    use webca_core::{KeyUsage, KeyUsageSet};

    #[test]
    fn test_self_signed_request_round_trip() {
        let key = KeyPair::generate(KeyType::Rsa, 2048).unwrap();
        let subject: SubjectName = "/C=ES/O=Example/CN=alice".parse().unwrap();
        let ku = Extension::new(
            ExtensionValue::KeyUsage(KeyUsageSet::of(&[KeyUsage::DigitalSignature])),
            true,
        );
        let csr = create_self_signed_request(&key, &subject, &[ku.clone()]).unwrap();

        let back = CertificateRequest::from_pem(&csr.to_pem()).unwrap();
        assert_eq!(back.subject, subject);
        assert_eq!(&back.public_key, key.public());
        assert_eq!(back.extensions.len(), 1);
        assert_eq!(back.extensions[0].oid(), ku.oid());
        assert!(back.extensions[0].critical);
        assert_eq!(back.extensions[0].value_der(), ku.value_der());
    }

    #[test]
    fn test_delegated_signer() {
        let user = KeyPair::generate(KeyType::Rsa, 2048).unwrap();
        let signer = KeyPair::generate(KeyType::Rsa, 2048).unwrap();
        let subject = SubjectName::common_name("bob");
        let csr = create_certificate_request(user.public(), &subject, &[], &signer).unwrap();
        assert_eq!(&csr.public_key, user.public());
        assert!(csr.extensions.is_empty());
    }

    #[test]
    fn test_validate_request_against_template() {
        let key = KeyPair::generate(KeyType::Rsa, 1024).unwrap();
        let csr = create_self_signed_request(&key, &SubjectName::common_name("small"), &[]).unwrap();

        let mut template = Template::new(1, "web", 365);
        template.key_usage = KeyUsageSet::of(&[KeyUsage::DigitalSignature]);
        let err = validate_request(csr.to_pem().as_bytes(), &template).unwrap_err();
        assert!(err.is_policy());

        template.min_bits_rsa = 1024;
        let summary = validate_request(csr.der(), &template).unwrap();
        assert_eq!(summary.key_type, KeyType::Rsa);
        assert_eq!(summary.bits, 1024);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(CertificateRequest::parse(b"not a request").is_err());
        assert!(CertificateRequest::parse(b"-----BEGIN CERTIFICATE REQUEST-----\n!!\n-----END CERTIFICATE REQUEST-----\n").is_err());
    }
}
