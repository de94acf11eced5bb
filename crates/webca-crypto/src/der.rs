//! Small DER helpers shared by the CSR, CRL and OCSP encoders.

use chrono::{DateTime, TimeZone, Utc};
use ring::digest;
use time::OffsetDateTime;
use yasna::models::{GeneralizedTime, ObjectIdentifier};
use yasna::DERWriter;

use crate::error::{CryptoError, Result};
use crate::keys::KeyPair;

pub(crate) const OID_SHA1: &[u64] = &[1, 3, 14, 3, 2, 26];
pub(crate) const OID_RSA_ENCRYPTION: &[u64] = &[1, 2, 840, 113_549, 1, 1, 1];
pub(crate) const OID_EC_PUBLIC_KEY: &[u64] = &[1, 2, 840, 10045, 2, 1];
pub(crate) const OID_DSA: &[u64] = &[1, 2, 840, 10040, 4, 1];
pub(crate) const OID_P256: &[u64] = &[1, 2, 840, 10045, 3, 1, 7];
pub(crate) const OID_P384: &[u64] = &[1, 3, 132, 0, 34];
pub(crate) const OID_P521: &[u64] = &[1, 3, 132, 0, 35];

/// SHA-1 digest, used for key identifiers and OCSP CertIDs
pub(crate) fn sha1(data: &[u8]) -> Vec<u8> {
    digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, data)
        .as_ref()
        .to_vec()
}

pub(crate) fn oid(arcs: &[u64]) -> ObjectIdentifier {
    ObjectIdentifier::from_slice(arcs)
}

/// Parse a dotted object identifier such as `2.5.29.19`
pub(crate) fn parse_oid(s: &str) -> Result<Vec<u64>> {
    let arcs = s
        .trim()
        .split('.')
        .map(str::parse::<u64>)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| CryptoError::Extension(format!("invalid object identifier {s}")))?;
    if arcs.len() < 2 {
        return Err(CryptoError::Extension(format!("invalid object identifier {s}")));
    }
    Ok(arcs)
}

/// Dotted form of an OID
pub(crate) fn oid_string(arcs: &[u64]) -> String {
    arcs.iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

/// One `Extension` SEQUENCE: OID, optional critical flag, OCTET STRING value
pub(crate) fn write_extension(w: DERWriter, oid_arcs: &[u64], critical: bool, value: &[u8]) {
    w.write_sequence(|w| {
        w.next().write_oid(&oid(oid_arcs));
        if critical {
            w.next().write_bool(true);
        }
        w.next().write_bytes(value);
    });
}

pub(crate) fn write_generalized_time(w: DERWriter, t: OffsetDateTime) {
    w.write_generalized_time(&GeneralizedTime::from_datetime(t));
}

pub(crate) fn to_offset(t: DateTime<Utc>) -> Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(t.timestamp())
        .map_err(|e| CryptoError::Certificate(format!("time out of range: {e}")))
}

pub(crate) fn from_unix(secs: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| CryptoError::Certificate(format!("time out of range: {secs}")))
}

/// Current time truncated to whole seconds
pub(crate) fn now() -> Result<OffsetDateTime> {
    to_offset(Utc::now())
}

/// Wrap a to-be-signed structure: `SEQUENCE { tbs, signatureAlgorithm, signature }`
pub(crate) fn sign_der(tbs: &[u8], key: &KeyPair) -> Result<Vec<u8>> {
    let signature = key.sign_bytes(tbs)?;
    let scheme = key.scheme();
    Ok(yasna::construct_der(|w| {
        w.write_sequence(|w| {
            w.next().write_der(tbs);
            scheme.write_algorithm_identifier(w.next());
            w.next().write_bitvec_bytes(&signature, signature.len() * 8);
        });
    }))
}

/// Map a yasna parse failure into the given error family
pub(crate) fn asn1_err(
    wrap: fn(String) -> CryptoError,
) -> impl Fn(yasna::ASN1Error) -> CryptoError {
    move |e| wrap(format!("malformed DER: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_oid() {
        assert_eq!(parse_oid("2.5.29.19").unwrap(), vec![2, 5, 29, 19]);
        assert!(parse_oid("2").is_err());
        assert!(parse_oid("2.x.1").is_err());
        assert_eq!(oid_string(&[1, 3, 6, 1]), "1.3.6.1");
    }

    #[test]
    fn test_extension_omits_false_critical() {
        let der = yasna::construct_der(|w| write_extension(w, &[2, 5, 29, 14], false, &[4, 0]));
        let critical = yasna::construct_der(|w| write_extension(w, &[2, 5, 29, 14], true, &[4, 0]));
        assert_eq!(critical.len(), der.len() + 3);
    }
}
