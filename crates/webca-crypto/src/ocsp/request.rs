use yasna::{ASN1Result, BERReader, Tag};

use super::OID_OCSP_NONCE;
use crate::certs::Certificate;
use crate::der::{self, sha1, OID_SHA1};
use crate::error::{CryptoError, Result};
use crate::extensions::Extension;
use crate::serial::Serial;

/// Identifies one certificate in a request or response.
///
/// The encoded form is kept so responses can echo exactly what the client
/// sent, whatever hash algorithm it used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertId {
    der: Vec<u8>,
    pub hash_algorithm: Vec<u64>,
    pub issuer_name_hash: Vec<u8>,
    pub issuer_key_hash: Vec<u8>,
    pub serial: Serial,
}

impl CertId {
    /// SHA-1 CertID for `serial` under `issuer`
    #[must_use]
    pub fn new(issuer: &Certificate, serial: &Serial) -> Self {
        let info = issuer.info();
        let issuer_name_hash = sha1(&info.subject_der);
        let issuer_key_hash = sha1(info.public_key.raw());
        let der = yasna::construct_der(|w| {
            w.write_sequence(|w| {
                w.next().write_sequence(|w| {
                    w.next().write_oid(&der::oid(OID_SHA1));
                    w.next().write_null();
                });
                w.next().write_bytes(&issuer_name_hash);
                w.next().write_bytes(&issuer_key_hash);
                w.next().write_bigint_bytes(serial.as_bytes(), true);
            });
        });
        Self {
            der,
            hash_algorithm: OID_SHA1.to_vec(),
            issuer_name_hash,
            issuer_key_hash,
            serial: serial.clone(),
        }
    }

    pub fn from_der(der: Vec<u8>) -> Result<Self> {
        let (hash_algorithm, issuer_name_hash, issuer_key_hash, serial) =
            yasna::parse_der(&der, |r| {
                r.read_sequence(|r| {
                    let alg = r.next().read_sequence(|r| {
                        let oid = r.next().read_oid()?;
                        r.read_optional(|r| r.read_null())?;
                        Ok(oid)
                    })?;
                    let name_hash = r.next().read_bytes()?;
                    let key_hash = r.next().read_bytes()?;
                    let (serial, _) = r.next().read_bigint_bytes()?;
                    Ok((alg, name_hash, key_hash, serial))
                })
            })
            .map_err(der::asn1_err(CryptoError::Ocsp))?;
        if serial.is_empty() {
            return Err(CryptoError::Ocsp(String::from("CertID without serial number")));
        }
        Ok(Self {
            der,
            hash_algorithm: hash_algorithm.components().clone(),
            issuer_name_hash,
            issuer_key_hash,
            serial: Serial::from_bytes(&serial),
        })
    }

    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }
}

/// A parsed or locally built OCSP request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcspRequest {
    pub cert_ids: Vec<CertId>,
    /// The nonce extension, echoed back in the response
    pub nonce: Option<Extension>,
}

impl OcspRequest {
    #[must_use]
    pub const fn new(cert_ids: Vec<CertId>) -> Self {
        Self {
            cert_ids,
            nonce: None,
        }
    }

    #[must_use]
    pub fn with_nonce(mut self, nonce: &[u8]) -> Self {
        let value = yasna::construct_der(|w| w.write_bytes(nonce));
        self.nonce = Some(Extension::from_der(OID_OCSP_NONCE.to_vec(), false, value));
        self
    }

    /// Parse a DER `OCSPRequest`.
    ///
    /// Any signature on the request is skipped, not verified.
    pub fn parse(der: &[u8]) -> Result<Self> {
        let (version, raw_ids, extensions) = yasna::parse_der(der, |r| {
            r.read_sequence(|r| {
                let tbs = r.next().read_sequence(|r| {
                    let version =
                        r.read_optional(|r| r.read_tagged(Tag::context(0), |r| r.read_u8()))?;
                    r.read_optional(|r| r.read_tagged(Tag::context(1), |r| r.read_der()))?;
                    let mut ids = Vec::new();
                    r.next().read_sequence_of(|r| {
                        r.read_sequence(|r| {
                            ids.push(r.next().read_der()?);
                            r.read_optional(|r| r.read_tagged(Tag::context(0), |r| r.read_der()))?;
                            Ok(())
                        })
                    })?;
                    let extensions =
                        r.read_optional(|r| r.read_tagged(Tag::context(2), read_extensions))?;
                    Ok((version, ids, extensions))
                })?;
                r.read_optional(|r| r.read_tagged(Tag::context(0), |r| r.read_der()))?;
                Ok(tbs)
            })
        })
        .map_err(der::asn1_err(CryptoError::Ocsp))?;

        if version.unwrap_or(0) != 0 {
            return Err(CryptoError::Ocsp(format!(
                "unsupported request version {}",
                version.unwrap_or(0)
            )));
        }
        if raw_ids.is_empty() {
            return Err(CryptoError::Ocsp(String::from("request names no certificate")));
        }
        let cert_ids = raw_ids
            .into_iter()
            .map(CertId::from_der)
            .collect::<Result<Vec<_>>>()?;
        let nonce = extensions
            .unwrap_or_default()
            .into_iter()
            .find(|e| e.oid() == OID_OCSP_NONCE);

        Ok(Self { cert_ids, nonce })
    }

    /// Unsigned DER encoding
    #[must_use]
    pub fn to_der(&self) -> Vec<u8> {
        yasna::construct_der(|w| {
            w.write_sequence(|w| {
                w.next().write_sequence(|w| {
                    w.next().write_sequence(|w| {
                        for id in &self.cert_ids {
                            w.next().write_sequence(|w| w.next().write_der(id.der()));
                        }
                    });
                    if let Some(nonce) = &self.nonce {
                        w.next().write_tagged(Tag::context(2), |w| {
                            w.write_sequence(|w| {
                                der::write_extension(
                                    w.next(),
                                    nonce.oid(),
                                    nonce.critical,
                                    &nonce.value_der(),
                                );
                            });
                        });
                    }
                });
            });
        })
    }
}

/// `Extensions ::= SEQUENCE OF Extension`, values kept raw
pub(super) fn read_extensions(r: BERReader) -> ASN1Result<Vec<Extension>> {
    let mut out = Vec::new();
    r.read_sequence_of(|r| {
        let ext = r.read_sequence(|r| {
            let oid = r.next().read_oid()?;
            let critical = r.read_default(false, |r| r.read_bool())?;
            let value = r.next().read_bytes()?;
            Ok(Extension::from_der(oid.components().clone(), critical, value))
        })?;
        out.push(ext);
        Ok(())
    })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certs::create_ca_certificate;
    use webca_core::SubjectName;

    fn issuer() -> Certificate {
        create_ca_certificate(&SubjectName::common_name("OCSP CA"), 2048, None, 86_400, None)
            .unwrap()
            .1
    }

    #[test]
    fn test_request_round_trip() {
        let ca = issuer();
        let serial = Serial::from_hex("01f4").unwrap();
        let request = OcspRequest::new(vec![CertId::new(&ca, &serial)]).with_nonce(b"nonce-123");

        let parsed = OcspRequest::parse(&request.to_der()).unwrap();
        assert_eq!(parsed, request);
        let id = &parsed.cert_ids[0];
        assert_eq!(id.serial.to_hex(), "1f4");
        assert_eq!(id.hash_algorithm, OID_SHA1);
        assert_eq!(id.issuer_key_hash, ca.info().public_key.key_id());
        assert_eq!(id.issuer_name_hash.len(), 20);
    }

    #[test]
    fn test_multiple_ids_without_nonce() {
        let ca = issuer();
        let ids = vec![
            CertId::new(&ca, &Serial::generate()),
            CertId::new(&ca, &Serial::generate()),
        ];
        let parsed = OcspRequest::parse(&OcspRequest::new(ids.clone()).to_der()).unwrap();
        assert_eq!(parsed.cert_ids, ids);
        assert!(parsed.nonce.is_none());
    }

    #[test]
    fn test_malformed_requests() {
        assert!(OcspRequest::parse(b"").is_err());
        assert!(OcspRequest::parse(&[0x30, 0x03, 0x02, 0x01, 0x01]).is_err());
        assert!(OcspRequest::parse(&OcspRequest::new(Vec::new()).to_der()).is_err());
    }
}
