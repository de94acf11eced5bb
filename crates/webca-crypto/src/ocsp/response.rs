use chrono::{DateTime, Utc};
use ring::signature;
use tracing::debug;
use webca_core::{KeyType, RevocationReason};
use yasna::models::GeneralizedTime;
use yasna::{ASN1Result, BERReaderSeq, Tag};

use super::request::{read_extensions, CertId};
use super::{OID_OCSP_BASIC, OID_OCSP_NONCE};
use crate::certs::Certificate;
use crate::der;
use crate::error::{CryptoError, Result};
use crate::extensions::Extension;
use crate::keys::{KeyPair, PublicKey};

/// `OCSPResponseStatus`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OcspResponseStatus {
    Successful,
    MalformedRequest,
    InternalError,
    TryLater,
    SigRequired,
    Unauthorized,
}

impl OcspResponseStatus {
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::Successful => 0,
            Self::MalformedRequest => 1,
            Self::InternalError => 2,
            Self::TryLater => 3,
            Self::SigRequired => 5,
            Self::Unauthorized => 6,
        }
    }

    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Successful),
            1 => Some(Self::MalformedRequest),
            2 => Some(Self::InternalError),
            3 => Some(Self::TryLater),
            5 => Some(Self::SigRequired),
            6 => Some(Self::Unauthorized),
            _ => None,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Successful => "successful",
            Self::MalformedRequest => "malformed_request",
            Self::InternalError => "internal_error",
            Self::TryLater => "try_later",
            Self::SigRequired => "sig_required",
            Self::Unauthorized => "unauthorized",
        }
    }
}

impl std::fmt::Display for OcspResponseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Status of one certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertStatus {
    Good,
    Revoked {
        date: DateTime<Utc>,
        reason: Option<RevocationReason>,
    },
    Unknown,
}

/// Signing material of the responder
#[derive(Debug, Clone, Copy)]
pub struct ResponseSigner<'a> {
    pub key: &'a KeyPair,
    /// Certificate of `key`, included in every response
    pub certificate: &'a Certificate,
    /// The CA whose certificates are being answered for
    pub issuer: &'a Certificate,
}

/// Status-only response without `responseBytes`.
///
/// Used for every non-successful status; these responses are never signed.
#[must_use]
pub fn error_response(status: OcspResponseStatus) -> Vec<u8> {
    yasna::construct_der(|w| {
        w.write_sequence(|w| w.next().write_enum(status.code()));
    })
}

/// Build a signed `successful` response answering each `(id, status)` pair.
///
/// `nonce` is copied into the response extensions unchanged.
pub fn build_response(
    signer: &ResponseSigner<'_>,
    responses: &[(CertId, CertStatus)],
    nonce: Option<&Extension>,
) -> Result<Vec<u8>> {
    if responses.is_empty() {
        return Err(CryptoError::Ocsp(String::from("no certificate statuses to sign")));
    }
    if signer.key.public().raw() != signer.certificate.info().public_key.raw() {
        return Err(CryptoError::Ocsp(String::from(
            "responder key does not match the responder certificate",
        )));
    }

    let produced_at = der::now()?;
    let statuses = responses
        .iter()
        .map(|(id, status)| match status {
            CertStatus::Revoked { date, .. } => der::to_offset(*date).map(|d| (id, status, Some(d))),
            _ => Ok((id, status, None)),
        })
        .collect::<Result<Vec<_>>>()?;
    let key_hash = signer.key.public().key_id();

    let tbs = yasna::construct_der(|w| {
        w.write_sequence(|w| {
            w.next()
                .write_tagged(Tag::context(2), |w| w.write_bytes(&key_hash));
            der::write_generalized_time(w.next(), produced_at);
            w.next().write_sequence(|w| {
                for (id, status, revoked_at) in &statuses {
                    w.next().write_sequence(|w| {
                        w.next().write_der(id.der());
                        match (status, revoked_at) {
                            (CertStatus::Revoked { reason, .. }, Some(at)) => {
                                w.next().write_tagged_implicit(Tag::context(1), |w| {
                                    w.write_sequence(|w| {
                                        der::write_generalized_time(w.next(), *at);
                                        if let Some(reason) = reason {
                                            w.next().write_tagged(Tag::context(0), |w| {
                                                w.write_enum(i64::from(reason.crl_code()));
                                            });
                                        }
                                    });
                                });
                            }
                            (CertStatus::Unknown, _) => {
                                w.next()
                                    .write_tagged_implicit(Tag::context(2), |w| w.write_null());
                            }
                            _ => {
                                w.next()
                                    .write_tagged_implicit(Tag::context(0), |w| w.write_null());
                            }
                        }
                        der::write_generalized_time(w.next(), produced_at);
                    });
                }
            });
            if let Some(nonce) = nonce {
                w.next().write_tagged(Tag::context(1), |w| {
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

    let signature = signer.key.sign_bytes(&tbs)?;
    let scheme = signer.key.scheme();
    let mut certs = vec![signer.certificate.der()];
    if signer.issuer.der() != signer.certificate.der() {
        certs.push(signer.issuer.der());
    }
    let basic = yasna::construct_der(|w| {
        w.write_sequence(|w| {
            w.next().write_der(&tbs);
            scheme.write_algorithm_identifier(w.next());
            w.next().write_bitvec_bytes(&signature, signature.len() * 8);
            w.next().write_tagged(Tag::context(0), |w| {
                w.write_sequence(|w| {
                    for cert in &certs {
                        w.next().write_der(cert);
                    }
                });
            });
        });
    });

    debug!(responses = responses.len(), "signed OCSP response");
    Ok(yasna::construct_der(|w| {
        w.write_sequence(|w| {
            w.next().write_enum(OcspResponseStatus::Successful.code());
            w.next().write_tagged(Tag::context(0), |w| {
                w.write_sequence(|w| {
                    w.next().write_oid(&der::oid(OID_OCSP_BASIC));
                    w.next().write_bytes(&basic);
                });
            });
        });
    }))
}

/// One answered certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleResponse {
    pub cert_id: CertId,
    pub status: CertStatus,
    pub this_update: DateTime<Utc>,
}

/// Body of a `successful` response
#[derive(Debug, Clone)]
pub struct BasicResponse {
    /// Responder id, when given by key hash
    pub responder_key_hash: Option<Vec<u8>>,
    pub produced_at: DateTime<Utc>,
    pub responses: Vec<SingleResponse>,
    /// Raw value of the nonce extension
    pub nonce: Option<Vec<u8>>,
    pub certificates: Vec<Certificate>,
    tbs: Vec<u8>,
    signature: Vec<u8>,
}

impl BasicResponse {
    /// Check the response signature against `key`
    pub fn verify(&self, key: &PublicKey) -> Result<()> {
        let alg: &'static dyn signature::VerificationAlgorithm = match (key.key_type, key.bits) {
            (KeyType::Rsa, _) => &signature::RSA_PKCS1_2048_8192_SHA256,
            (KeyType::Ec, 256) => &signature::ECDSA_P256_SHA256_ASN1,
            (KeyType::Ec, 384) => &signature::ECDSA_P384_SHA384_ASN1,
            (key_type, bits) => {
                return Err(CryptoError::Unsupported(format!(
                    "OCSP signature check with {key_type} {bits}"
                )))
            }
        };
        signature::UnparsedPublicKey::new(alg, key.raw())
            .verify(&self.tbs, &self.signature)
            .map_err(|_| CryptoError::Ocsp(String::from("response signature does not verify")))
    }
}

/// A parsed `OCSPResponse`
#[derive(Debug, Clone)]
pub struct OcspResponse {
    pub status: OcspResponseStatus,
    pub basic: Option<BasicResponse>,
}

impl OcspResponse {
    pub fn parse(der: &[u8]) -> Result<Self> {
        let (code, bytes) = yasna::parse_der(der, |r| {
            r.read_sequence(|r| {
                let code = r.next().read_enum()?;
                let bytes = r.read_optional(|r| {
                    r.read_tagged(Tag::context(0), |r| {
                        r.read_sequence(|r| {
                            let oid = r.next().read_oid()?;
                            let body = r.next().read_bytes()?;
                            Ok((oid, body))
                        })
                    })
                })?;
                Ok((code, bytes))
            })
        })
        .map_err(der::asn1_err(CryptoError::Ocsp))?;

        let status = OcspResponseStatus::from_code(code)
            .ok_or_else(|| CryptoError::Ocsp(format!("unknown response status {code}")))?;
        let basic = match bytes {
            None => None,
            Some((oid, body)) => {
                if oid.components().as_slice() != OID_OCSP_BASIC {
                    return Err(CryptoError::Ocsp(format!(
                        "unsupported response type {}",
                        der::oid_string(oid.components())
                    )));
                }
                Some(parse_basic(&body)?)
            }
        };
        Ok(Self { status, basic })
    }

    /// The answer for `serial`, if the response carries one
    #[must_use]
    pub fn find(&self, serial: &crate::serial::Serial) -> Option<&SingleResponse> {
        self.basic
            .as_ref()?
            .responses
            .iter()
            .find(|r| &r.cert_id.serial == serial)
    }
}

enum RawStatus {
    Good,
    Revoked(GeneralizedTime, Option<i64>),
    Unknown,
}

struct RawSingle {
    cert_id: Vec<u8>,
    status: RawStatus,
    this_update: GeneralizedTime,
}

fn read_cert_status(r: &mut BERReaderSeq<'_, '_>) -> ASN1Result<RawStatus> {
    if r
        .read_optional(|r| r.read_tagged_implicit(Tag::context(0), |r| r.read_null()))?
        .is_some()
    {
        return Ok(RawStatus::Good);
    }
    let revoked = r.read_optional(|r| {
        r.read_tagged_implicit(Tag::context(1), |r| {
            r.read_sequence(|r| {
                let date = r.next().read_generalized_time()?;
                let reason =
                    r.read_optional(|r| r.read_tagged(Tag::context(0), |r| r.read_enum()))?;
                Ok((date, reason))
            })
        })
    })?;
    if let Some((date, reason)) = revoked {
        return Ok(RawStatus::Revoked(date, reason));
    }
    r.next()
        .read_tagged_implicit(Tag::context(2), |r| r.read_null())?;
    Ok(RawStatus::Unknown)
}

fn to_utc(t: &GeneralizedTime) -> Result<DateTime<Utc>> {
    der::from_unix(t.datetime().unix_timestamp())
}

fn parse_basic(body: &[u8]) -> Result<BasicResponse> {
    let (tbs, signature, raw_certs) = yasna::parse_der(body, |r| {
        r.read_sequence(|r| {
            let tbs = r.next().read_der()?;
            r.next().read_der()?;
            let (signature, _) = r.next().read_bitvec_bytes()?;
            let mut certs = Vec::new();
            r.read_optional(|r| {
                r.read_tagged(Tag::context(0), |r| {
                    r.read_sequence_of(|r| {
                        certs.push(r.read_der()?);
                        Ok(())
                    })
                })
            })?;
            Ok((tbs, signature, certs))
        })
    })
    .map_err(der::asn1_err(CryptoError::Ocsp))?;

    let (key_hash, produced_at, singles, extensions) = yasna::parse_der(&tbs, |r| {
        r.read_sequence(|r| {
            r.read_optional(|r| r.read_tagged(Tag::context(0), |r| r.read_u8()))?;
            let by_name = r.read_optional(|r| r.read_tagged(Tag::context(1), |r| r.read_der()))?;
            let key_hash = if by_name.is_some() {
                None
            } else {
                Some(
                    r.next()
                        .read_tagged(Tag::context(2), |r| r.read_bytes())?,
                )
            };
            let produced_at = r.next().read_generalized_time()?;
            let mut singles = Vec::new();
            r.next().read_sequence_of(|r| {
                r.read_sequence(|r| {
                    let cert_id = r.next().read_der()?;
                    let status = read_cert_status(r)?;
                    let this_update = r.next().read_generalized_time()?;
                    r.read_optional(|r| r.read_tagged(Tag::context(0), |r| r.read_der()))?;
                    r.read_optional(|r| r.read_tagged(Tag::context(1), |r| r.read_der()))?;
                    singles.push(RawSingle {
                        cert_id,
                        status,
                        this_update,
                    });
                    Ok(())
                })
            })?;
            let extensions =
                r.read_optional(|r| r.read_tagged(Tag::context(1), read_extensions))?;
            Ok((key_hash, produced_at, singles, extensions))
        })
    })
    .map_err(der::asn1_err(CryptoError::Ocsp))?;

    let mut responses = Vec::with_capacity(singles.len());
    for single in singles {
        let status = match single.status {
            RawStatus::Good => CertStatus::Good,
            RawStatus::Unknown => CertStatus::Unknown,
            RawStatus::Revoked(date, reason) => CertStatus::Revoked {
                date: to_utc(&date)?,
                reason: reason
                    .and_then(|code| u8::try_from(code).ok())
                    .and_then(RevocationReason::from_crl_code),
            },
        };
        responses.push(SingleResponse {
            cert_id: CertId::from_der(single.cert_id)?,
            status,
            this_update: to_utc(&single.this_update)?,
        });
    }

    Ok(BasicResponse {
        responder_key_hash: key_hash,
        produced_at: to_utc(&produced_at)?,
        responses,
        nonce: extensions
            .unwrap_or_default()
            .into_iter()
            .find(|e| e.oid() == OID_OCSP_NONCE)
            .map(|e| e.value_der()),
        certificates: raw_certs
            .into_iter()
            .map(Certificate::from_der)
            .collect::<Result<Vec<_>>>()?,
        tbs,
        signature,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certs::create_ca_certificate;
    use crate::ocsp::OcspRequest;
    use crate::serial::Serial;
    use chrono::Duration;
    use webca_core::SubjectName;

    struct Fixture {
        ca: Certificate,
        responder_key: KeyPair,
        responder: Certificate,
    }

    fn fixture() -> Fixture {
        let (ca_key, ca) =
            create_ca_certificate(&SubjectName::common_name("OCSP CA"), 2048, None, 86_400, None)
                .unwrap();
        let (responder_key, responder) = create_ca_certificate(
            &SubjectName::common_name("OCSP responder"),
            2048,
            Some(0),
            3_600,
            Some((&ca, &ca_key)),
        )
        .unwrap();
        Fixture {
            ca,
            responder_key,
            responder,
        }
    }

    impl Fixture {
        fn signer(&self) -> ResponseSigner<'_> {
            ResponseSigner {
                key: &self.responder_key,
                certificate: &self.responder,
                issuer: &self.ca,
            }
        }
    }

    #[test]
    fn test_revoked_response_with_nonce() {
        let f = fixture();
        let serial = Serial::generate();
        let request = OcspRequest::new(vec![CertId::new(&f.ca, &serial)]).with_nonce(b"abc");
        let revoked_at = Utc::now() - Duration::days(2);
        let der = build_response(
            &f.signer(),
            &[(
                request.cert_ids[0].clone(),
                CertStatus::Revoked {
                    date: revoked_at,
                    reason: Some(RevocationReason::KeyCompromise),
                },
            )],
            request.nonce.as_ref(),
        )
        .unwrap();

        let parsed = OcspResponse::parse(&der).unwrap();
        assert_eq!(parsed.status, OcspResponseStatus::Successful);
        let single = parsed.find(&serial).unwrap();
        match single.status {
            CertStatus::Revoked { date, reason } => {
                assert_eq!(date.timestamp(), revoked_at.timestamp());
                assert_eq!(reason, Some(RevocationReason::KeyCompromise));
            }
            other => panic!("expected revoked, got {other:?}"),
        }

        let basic = parsed.basic.unwrap();
        assert_eq!(
            basic.nonce,
            request.nonce.as_ref().map(Extension::value_der)
        );
        assert_eq!(
            basic.responder_key_hash,
            Some(f.responder_key.public().key_id())
        );
        assert_eq!(basic.certificates.len(), 2);
        assert_eq!(basic.certificates[0], f.responder);
        assert_eq!(basic.certificates[1], f.ca);
        basic.verify(&f.responder.info().public_key).unwrap();
    }

    #[test]
    fn test_good_and_unknown_in_one_response() {
        let f = fixture();
        let good = Serial::generate();
        let unknown = Serial::generate();
        let der = build_response(
            &f.signer(),
            &[
                (CertId::new(&f.ca, &good), CertStatus::Good),
                (CertId::new(&f.ca, &unknown), CertStatus::Unknown),
            ],
            None,
        )
        .unwrap();

        let parsed = OcspResponse::parse(&der).unwrap();
        assert_eq!(parsed.find(&good).unwrap().status, CertStatus::Good);
        assert_eq!(parsed.find(&unknown).unwrap().status, CertStatus::Unknown);
        assert!(parsed.basic.unwrap().nonce.is_none());
    }

    #[test]
    fn test_error_response_has_no_body() {
        for status in [
            OcspResponseStatus::MalformedRequest,
            OcspResponseStatus::InternalError,
            OcspResponseStatus::Unauthorized,
        ] {
            let parsed = OcspResponse::parse(&error_response(status)).unwrap();
            assert_eq!(parsed.status, status);
            assert!(parsed.basic.is_none());
        }
        assert_eq!(error_response(OcspResponseStatus::InternalError), [0x30, 0x03, 0x0a, 0x01, 0x02]);
    }

    #[test]
    fn test_tampered_signature_fails() {
        let f = fixture();
        let der = build_response(
            &f.signer(),
            &[(CertId::new(&f.ca, &Serial::generate()), CertStatus::Good)],
            None,
        )
        .unwrap();
        let mut basic = OcspResponse::parse(&der).unwrap().basic.unwrap();
        basic.signature[0] ^= 0xff;
        assert!(basic.verify(&f.responder.info().public_key).is_err());
    }

    #[test]
    fn test_signer_must_own_certificate() {
        let f = fixture();
        let other = KeyPair::generate(KeyType::Rsa, 2048).unwrap();
        let signer = ResponseSigner {
            key: &other,
            certificate: &f.responder,
            issuer: &f.ca,
        };
        let err = build_response(
            &signer,
            &[(CertId::new(&f.ca, &Serial::generate()), CertStatus::Good)],
            None,
        );
        assert!(err.is_err());
    }
}
