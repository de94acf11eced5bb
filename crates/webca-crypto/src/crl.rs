//! Certificate revocation lists (RFC 5280 section 5).
//!
//! The list itself is serialized and signed by rcgen; entries carry a
//! CRLReason except for `unspecified`, which RFC 5280 says to leave out.

use chrono::{DateTime, Duration, Utc};
use rcgen::{CertificateRevocationListParams, KeyIdMethod, RevokedCertParams, SerialNumber};
use tracing::info;
use webca_core::{KeyUsage, RevocationReason};

use crate::certs::Certificate;
use crate::der;
use crate::error::{CryptoError, Result};
use crate::keys::KeyPair;
use crate::serial::Serial;

const PEM_TAG: &str = "X509 CRL";

/// One revoked certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevokedEntry {
    pub serial: Serial,
    pub date: DateTime<Utc>,
    pub reason: RevocationReason,
}

impl RevokedEntry {
    fn to_params(&self) -> Result<RevokedCertParams> {
        Ok(RevokedCertParams {
            serial_number: SerialNumber::from_slice(self.serial.as_bytes()),
            revocation_time: der::to_offset(self.date)?,
            reason_code: Some(rcgen_reason(self.reason)),
            invalidity_date: None,
        })
    }
}

const fn rcgen_reason(reason: RevocationReason) -> rcgen::RevocationReason {
    match reason {
        RevocationReason::Unspecified => rcgen::RevocationReason::Unspecified,
        RevocationReason::KeyCompromise => rcgen::RevocationReason::KeyCompromise,
        RevocationReason::CaCompromise => rcgen::RevocationReason::CaCompromise,
        RevocationReason::AffiliationChanged => rcgen::RevocationReason::AffiliationChanged,
        RevocationReason::Superseded => rcgen::RevocationReason::Superseded,
        RevocationReason::CessationOfOperation => rcgen::RevocationReason::CessationOfOperation,
        RevocationReason::CertificateHold => rcgen::RevocationReason::CertificateHold,
    }
}

/// A signed CRL
#[derive(Debug, Clone)]
pub struct Crl {
    der: Vec<u8>,
    pub this_update: DateTime<Utc>,
    pub next_update: DateTime<Utc>,
    pub number: u64,
}

impl Crl {
    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    #[must_use]
    pub fn to_pem(&self) -> String {
        pem::encode(&pem::Pem::new(PEM_TAG, self.der.clone()))
    }
}

/// Build and sign a CRL listing `revoked`.
///
/// The issuer name is the issuer certificate's subject. The
/// AuthorityKeyIdentifier is the issuer's subject key identifier, or the
/// SHA-1 key identifier of its public key when the certificate has none.
pub fn create_crl(
    revoked: &[RevokedEntry],
    valid_days: u32,
    issuer: &Certificate,
    key: &KeyPair,
    sequence: u64,
) -> Result<Crl> {
    let info = issuer.info();
    if key.public().raw() != info.public_key.raw() {
        return Err(CryptoError::Crl(String::from(
            "signing key does not match the CRL issuer certificate",
        )));
    }
    if !info.key_usage.is_empty() && !info.key_usage.contains(KeyUsage::CrlSign) {
        return Err(CryptoError::Crl(String::from(
            "issuer certificate is not allowed to sign CRLs",
        )));
    }

    let this_update = der::from_unix(Utc::now().timestamp())?;
    let next_update = this_update
        .checked_add_signed(Duration::days(i64::from(valid_days)))
        .ok_or_else(|| {
            CryptoError::Crl(format!("CRL validity of {valid_days} days is out of range"))
        })?;

    let params = CertificateRevocationListParams {
        this_update: der::to_offset(this_update)?,
        next_update: der::to_offset(next_update)?,
        crl_number: SerialNumber::from(sequence),
        issuing_distribution_point: None,
        revoked_certs: revoked
            .iter()
            .map(RevokedEntry::to_params)
            .collect::<Result<_>>()?,
        key_identifier_method: KeyIdMethod::PreSpecified(
            info.key_id
                .clone()
                .unwrap_or_else(|| info.public_key.key_id()),
        ),
    };
    let signer = rcgen::Issuer::from_ca_cert_pem(&issuer.to_pem(), key)?;
    let der = params
        .signed_by(&signer)
        .map_err(|e| CryptoError::Crl(e.to_string()))?
        .der()
        .to_vec();

    info!(
        number = sequence,
        revoked = revoked.len(),
        next_update = %next_update,
        "built CRL"
    );
    Ok(Crl {
        der,
        this_update,
        next_update,
        number: sequence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certs::create_ca_certificate;
    use webca_core::SubjectName;
    use x509_parser::extensions::ParsedExtension;
    use x509_parser::parse_x509_crl;

    fn crl_number(der: &[u8]) -> u64 {
        let (_, crl) = parse_x509_crl(der).unwrap();
        let ext = crl
            .extensions()
            .iter()
            .find(|e| e.oid.to_id_string() == "2.5.29.20")
            .unwrap();
        yasna::parse_der(ext.value, |r| r.read_u64()).unwrap()
    }

    #[test]
    fn test_crl_contents() {
        let (key, ca) =
            create_ca_certificate(&SubjectName::common_name("CRL CA"), 2048, None, 86_400 * 30, None)
                .unwrap();
        let revoked = vec![
            RevokedEntry {
                serial: Serial::from_hex("0a1b2c").unwrap(),
                date: Utc::now() - Duration::hours(1),
                reason: RevocationReason::KeyCompromise,
            },
            RevokedEntry {
                serial: Serial::generate(),
                date: Utc::now(),
                reason: RevocationReason::Superseded,
            },
            RevokedEntry {
                serial: Serial::generate(),
                date: Utc::now(),
                reason: RevocationReason::Unspecified,
            },
        ];
        let crl = create_crl(&revoked, 15, &ca, &key, 7).unwrap();
        assert!(crl.to_pem().starts_with("-----BEGIN X509 CRL-----"));

        let (_, parsed) = parse_x509_crl(crl.der()).unwrap();
        assert_eq!(parsed.issuer().as_raw(), ca.info().subject_der.as_slice());
        let last = parsed.last_update().timestamp();
        let next = parsed.next_update().unwrap().timestamp();
        assert_eq!(next - last, 15 * 86_400);

        let entries: Vec<_> = parsed.iter_revoked_certificates().collect();
        assert_eq!(entries.len(), 3);
        assert_eq!(Serial::from_bytes(entries[0].raw_serial()).to_hex(), "a1b2c");
        assert_eq!(entries[0].reason_code().map(|(_, r)| r.0), Some(1));
        assert_eq!(entries[1].reason_code().map(|(_, r)| r.0), Some(4));
        assert!(entries[2].reason_code().is_none());
        let aki = parsed.extensions().iter().find_map(|e| match e.parsed_extension() {
            ParsedExtension::AuthorityKeyIdentifier(aki) => {
                aki.key_identifier.as_ref().map(|k| k.0.to_vec())
            }
            _ => None,
        });
        assert_eq!(aki, ca.info().key_id.clone());
        assert_eq!(crl_number(crl.der()), 7);

        let verifier = ring::signature::UnparsedPublicKey::new(
            &ring::signature::RSA_PKCS1_2048_8192_SHA256,
            ca.info().public_key.raw(),
        );
        verifier
            .verify(parsed.tbs_cert_list.as_ref(), &parsed.signature_value.data)
            .unwrap();
    }

    #[test]
    fn test_validity_out_of_range() {
        let (key, ca) =
            create_ca_certificate(&SubjectName::common_name("CRL CA"), 2048, None, 86_400 * 30, None)
                .unwrap();
        let err = create_crl(&[], u32::MAX, &ca, &key, 1).unwrap_err();
        assert!(matches!(err, CryptoError::Crl(_)));
    }

    #[test]
    fn test_crl_numbers_increase() {
        let (key, ca) =
            create_ca_certificate(&SubjectName::common_name("CRL CA"), 2048, None, 86_400, None)
                .unwrap();
        let first = create_crl(&[], 1, &ca, &key, 1).unwrap();
        let second = create_crl(&[], 1, &ca, &key, 2).unwrap();
        assert!(crl_number(second.der()) > crl_number(first.der()));
        assert_eq!(first.next_update - first.this_update, Duration::days(1));
    }

    #[test]
    fn test_rejects_foreign_key() {
        let (_, ca) =
            create_ca_certificate(&SubjectName::common_name("CRL CA"), 2048, None, 86_400, None)
                .unwrap();
        let other = KeyPair::generate(webca_core::KeyType::Rsa, 2048).unwrap();
        assert!(create_crl(&[], 1, &ca, &other, 1).is_err());
    }
}
