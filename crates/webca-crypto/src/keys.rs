//! Key pairs and public keys.
//!
//! RSA keys are generated and used through the `rsa` crate. EC keys are only
//! imported (from PKCS#8) and sign through rcgen's ring backend. DSA public
//! keys can be recognised in requests but never used for signing.

use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use rsa::signature::{SignatureEncoding, Signer};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use sha2::Sha256;
use webca_core::KeyType;
use x509_parser::public_key::PublicKey as ParsedKey;
use x509_parser::x509::SubjectPublicKeyInfo;
use yasna::DERWriter;

use crate::der::{self, OID_DSA, OID_EC_PUBLIC_KEY, OID_P256, OID_P384, OID_P521, OID_RSA_ENCRYPTION};
use crate::error::{CryptoError, Result};

/// Signature algorithm of a signing key; always SHA-256 or stronger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureScheme {
    RsaSha256,
    EcdsaP256Sha256,
    EcdsaP384Sha384,
}

impl SignatureScheme {
    pub(crate) fn rcgen(self) -> &'static rcgen::SignatureAlgorithm {
        match self {
            Self::RsaSha256 => &rcgen::PKCS_RSA_SHA256,
            Self::EcdsaP256Sha256 => &rcgen::PKCS_ECDSA_P256_SHA256,
            Self::EcdsaP384Sha384 => &rcgen::PKCS_ECDSA_P384_SHA384,
        }
    }

    const fn oid(self) -> &'static [u64] {
        match self {
            Self::RsaSha256 => &[1, 2, 840, 113_549, 1, 1, 11],
            Self::EcdsaP256Sha256 => &[1, 2, 840, 10045, 4, 3, 2],
            Self::EcdsaP384Sha384 => &[1, 2, 840, 10045, 4, 3, 3],
        }
    }

    /// `AlgorithmIdentifier` of the signature; RSA carries an explicit NULL
    pub(crate) fn write_algorithm_identifier(self, w: DERWriter) {
        w.write_sequence(|w| {
            w.next().write_oid(&der::oid(self.oid()));
            if self == Self::RsaSha256 {
                w.next().write_null();
            }
        });
    }

    fn from_curve_bits(bits: u32) -> Option<Self> {
        match bits {
            256 => Some(Self::EcdsaP256Sha256),
            384 => Some(Self::EcdsaP384Sha384),
            _ => None,
        }
    }
}

/// Public half of a key, as found in a CSR or certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    pub key_type: KeyType,
    pub bits: u32,
    /// Key bits as carried in the SPKI BIT STRING (PKCS#1 for RSA, the point for EC)
    raw: Vec<u8>,
    /// DER `SubjectPublicKeyInfo`
    spki: Vec<u8>,
    scheme: Option<SignatureScheme>,
}

impl PublicKey {
    /// Read a parsed `SubjectPublicKeyInfo`
    pub fn from_spki(spki: &SubjectPublicKeyInfo<'_>) -> Result<Self> {
        let alg = der::parse_oid(&spki.algorithm.algorithm.to_id_string())?;
        let raw = spki.subject_public_key.data.to_vec();
        let (key_type, bits, scheme) = if alg == OID_RSA_ENCRYPTION {
            let bits = match spki.parsed() {
                Ok(ParsedKey::RSA(k)) => u32::try_from(k.key_size()).unwrap_or(0),
                _ => return Err(CryptoError::Key(String::from("malformed RSA public key"))),
            };
            (KeyType::Rsa, bits, Some(SignatureScheme::RsaSha256))
        } else if alg == OID_EC_PUBLIC_KEY {
            let curve = spki
                .algorithm
                .parameters
                .as_ref()
                .and_then(|p| p.as_oid().ok())
                .map(|o| der::parse_oid(&o.to_id_string()))
                .transpose()?
                .ok_or_else(|| CryptoError::Key(String::from("EC key without named curve")))?;
            let bits = if curve == OID_P256 {
                256
            } else if curve == OID_P384 {
                384
            } else if curve == OID_P521 {
                521
            } else {
                return Err(CryptoError::Unsupported(format!(
                    "EC curve {}",
                    der::oid_string(&curve)
                )));
            };
            (KeyType::Ec, bits, SignatureScheme::from_curve_bits(bits))
        } else if alg == OID_DSA {
            (KeyType::Dsa, dsa_bits(&raw)?, None)
        } else {
            return Err(CryptoError::Unsupported(format!(
                "public key algorithm {}",
                der::oid_string(&alg)
            )));
        };
        Ok(Self {
            key_type,
            bits,
            raw,
            spki: spki.raw.to_vec(),
            scheme,
        })
    }

    fn new(key_type: KeyType, bits: u32, raw: Vec<u8>, scheme: SignatureScheme) -> Self {
        let spki = yasna::construct_der(|w| {
            w.write_sequence(|w| {
                w.next().write_sequence(|w| match scheme {
                    SignatureScheme::RsaSha256 => {
                        w.next().write_oid(&der::oid(OID_RSA_ENCRYPTION));
                        w.next().write_null();
                    }
                    SignatureScheme::EcdsaP256Sha256 => {
                        w.next().write_oid(&der::oid(OID_EC_PUBLIC_KEY));
                        w.next().write_oid(&der::oid(OID_P256));
                    }
                    SignatureScheme::EcdsaP384Sha384 => {
                        w.next().write_oid(&der::oid(OID_EC_PUBLIC_KEY));
                        w.next().write_oid(&der::oid(OID_P384));
                    }
                });
                w.next().write_bitvec_bytes(&raw, raw.len() * 8);
            });
        });
        Self {
            key_type,
            bits,
            raw,
            spki,
            scheme: Some(scheme),
        }
    }

    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    #[must_use]
    pub fn spki(&self) -> &[u8] {
        &self.spki
    }

    /// SHA-1 of the public key bits (RFC 5280 4.2.1.2, method 1)
    #[must_use]
    pub fn key_id(&self) -> Vec<u8> {
        der::sha1(&self.raw)
    }

    /// View usable as an rcgen certificate subject key
    pub(crate) fn subject_key(&self) -> Result<SubjectKey<'_>> {
        let scheme = self.scheme.ok_or_else(|| {
            CryptoError::Unsupported(format!(
                "{} {}-bit keys cannot be embedded in certificates",
                self.key_type, self.bits
            ))
        })?;
        Ok(SubjectKey {
            raw: &self.raw,
            scheme,
        })
    }
}

/// DSA sizes follow the prime length; approximate it from the public value
fn dsa_bits(raw: &[u8]) -> Result<u32> {
    let (y, _) = yasna::parse_der(raw, |r| r.read_bigint_bytes())
        .map_err(der::asn1_err(CryptoError::Key))?;
    let bits = u32::try_from(y.len() * 8).unwrap_or(u32::MAX);
    Ok(bits.div_ceil(1024) * 1024)
}

pub(crate) struct SubjectKey<'a> {
    raw: &'a [u8],
    scheme: SignatureScheme,
}

impl rcgen::PublicKeyData for SubjectKey<'_> {
    fn der_bytes(&self) -> &[u8] {
        self.raw
    }

    fn algorithm(&self) -> &'static rcgen::SignatureAlgorithm {
        self.scheme.rcgen()
    }
}

enum Inner {
    Rsa {
        key: RsaPrivateKey,
        signer: rsa::pkcs1v15::SigningKey<Sha256>,
    },
    Ec(rcgen::KeyPair),
}

/// Private key plus its public half
pub struct KeyPair {
    inner: Inner,
    public: PublicKey,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("key_type", &self.public.key_type)
            .field("bits", &self.public.bits)
            .finish_non_exhaustive()
    }
}

impl KeyPair {
    /// Generate a new key. Only RSA generation is supported.
    pub fn generate(key_type: KeyType, bits: u32) -> Result<Self> {
        if bits == 0 {
            return Err(CryptoError::Key(String::from("key size must be positive")));
        }
        match key_type {
            KeyType::Rsa => {
                let size = usize::try_from(bits)
                    .map_err(|_| CryptoError::Key(format!("key size {bits} out of range")))?;
                let key = RsaPrivateKey::new(&mut OsRng, size)?;
                Self::from_rsa(key)
            }
            KeyType::Ec => Err(CryptoError::Unsupported(String::from(
                "EC keys must be imported, not generated",
            ))),
            KeyType::Dsa => Err(CryptoError::Unsupported(String::from("DSA key generation"))),
        }
    }

    fn from_rsa(key: RsaPrivateKey) -> Result<Self> {
        let bits = u32::try_from(key.size() * 8)
            .map_err(|_| CryptoError::Key(String::from("RSA key too large")))?;
        let raw = key
            .to_public_key()
            .to_pkcs1_der()
            .map_err(|e| CryptoError::Key(e.to_string()))?
            .as_bytes()
            .to_vec();
        let public = PublicKey::new(KeyType::Rsa, bits, raw, SignatureScheme::RsaSha256);
        let signer = rsa::pkcs1v15::SigningKey::<Sha256>::new(key.clone());
        Ok(Self {
            inner: Inner::Rsa { key, signer },
            public,
        })
    }

    fn from_rcgen(kp: rcgen::KeyPair) -> Result<Self> {
        let alg = rcgen::PublicKeyData::algorithm(&kp);
        let scheme = if alg == &rcgen::PKCS_ECDSA_P256_SHA256 {
            SignatureScheme::EcdsaP256Sha256
        } else if alg == &rcgen::PKCS_ECDSA_P384_SHA384 {
            SignatureScheme::EcdsaP384Sha384
        } else {
            return Err(CryptoError::Unsupported(String::from(
                "only RSA and NIST P-256/P-384 keys can be imported",
            )));
        };
        let bits = match scheme {
            SignatureScheme::EcdsaP384Sha384 => 384,
            _ => 256,
        };
        let raw = rcgen::PublicKeyData::der_bytes(&kp).to_vec();
        Ok(Self {
            public: PublicKey::new(KeyType::Ec, bits, raw, scheme),
            inner: Inner::Ec(kp),
        })
    }

    /// Import a PKCS#8 DER private key
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self> {
        if let Ok(key) = RsaPrivateKey::from_pkcs8_der(der) {
            return Self::from_rsa(key);
        }
        let pem = pem::encode(&pem::Pem::new("PRIVATE KEY", der.to_vec()));
        let kp = rcgen::KeyPair::from_pem(&pem)
            .map_err(|e| CryptoError::Key(format!("unreadable private key: {e}")))?;
        Self::from_rcgen(kp)
    }

    /// Import a PEM private key (PKCS#8, or PKCS#1 for RSA)
    pub fn from_pem(pem: &str) -> Result<Self> {
        if let Ok(key) = RsaPrivateKey::from_pkcs8_pem(pem) {
            return Self::from_rsa(key);
        }
        if let Ok(key) = RsaPrivateKey::from_pkcs1_pem(pem) {
            return Self::from_rsa(key);
        }
        let kp = rcgen::KeyPair::from_pem(pem)
            .map_err(|e| CryptoError::Key(format!("unreadable private key: {e}")))?;
        Self::from_rcgen(kp)
    }

    pub fn to_pkcs8_der(&self) -> Result<Vec<u8>> {
        match &self.inner {
            Inner::Rsa { key, .. } => Ok(key
                .to_pkcs8_der()
                .map_err(|e| CryptoError::Key(e.to_string()))?
                .as_bytes()
                .to_vec()),
            Inner::Ec(kp) => Ok(kp.serialize_der()),
        }
    }

    pub fn to_pem(&self) -> Result<String> {
        match &self.inner {
            Inner::Rsa { key, .. } => Ok(key
                .to_pkcs8_pem(LineEnding::LF)
                .map_err(|e| CryptoError::Key(e.to_string()))?
                .to_string()),
            Inner::Ec(kp) => Ok(kp.serialize_pem()),
        }
    }

    #[must_use]
    pub const fn public(&self) -> &PublicKey {
        &self.public
    }

    #[must_use]
    pub const fn key_type(&self) -> KeyType {
        self.public.key_type
    }

    #[must_use]
    pub const fn bits(&self) -> u32 {
        self.public.bits
    }

    pub(crate) fn scheme(&self) -> SignatureScheme {
        match &self.inner {
            Inner::Rsa { .. } => SignatureScheme::RsaSha256,
            Inner::Ec(_) => self
                .public
                .scheme
                .unwrap_or(SignatureScheme::EcdsaP256Sha256),
        }
    }

    /// Sign `msg` with the key's scheme
    pub fn sign_bytes(&self, msg: &[u8]) -> Result<Vec<u8>> {
        match &self.inner {
            Inner::Rsa { signer, .. } => signer
                .try_sign(msg)
                .map(|s| s.to_vec())
                .map_err(|e| CryptoError::Key(format!("RSA signing failed: {e}"))),
            Inner::Ec(kp) => rcgen::SigningKey::sign(kp, msg)
                .map_err(|e| CryptoError::Key(format!("EC signing failed: {e}"))),
        }
    }
}

impl rcgen::PublicKeyData for KeyPair {
    fn der_bytes(&self) -> &[u8] {
        &self.public.raw
    }

    fn algorithm(&self) -> &'static rcgen::SignatureAlgorithm {
        self.scheme().rcgen()
    }
}

impl rcgen::SigningKey for KeyPair {
    fn sign(&self, msg: &[u8]) -> std::result::Result<Vec<u8>, rcgen::Error> {
        self.sign_bytes(msg).map_err(|_| rcgen::Error::RemoteKeyError)
    }
}
