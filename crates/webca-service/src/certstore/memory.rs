use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;
use webca_core::{CoreError, ExtKeyUsage, KeyUsage};
use webca_crypto::{Certificate, KeyPair, PublicKey, Serial};

use super::CertStore;
use crate::Result;

/// Id of the in-process store
pub const STORE_ID: Uuid = Uuid::from_u128(0x9a16_e500_cc97_48e4_9b62_4e41_d91c_2607);

/// One stored key pair, PEM encoded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPair {
    /// Lower-case hex serial
    pub serial: String,
    pub key_pem: String,
    pub certificate_pem: String,
}

/// Certificate store held in memory; persisted through snapshots
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, StoredPair>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_pairs(pairs: Vec<StoredPair>) -> Self {
        let entries = pairs.into_iter().map(|p| (p.serial.clone(), p)).collect();
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Every stored pair, ordered by serial
    pub async fn pairs(&self) -> Vec<StoredPair> {
        self.entries.read().await.values().cloned().collect()
    }

    async fn entry(&self, serial: &Serial) -> Result<StoredPair> {
        self.entries
            .read()
            .await
            .get(&serial.to_hex())
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("no key pair with serial {serial}")).into())
    }
}

fn matches(cert: &Certificate, key_usage: &[KeyUsage], ext_key_usage: &[ExtKeyUsage]) -> bool {
    let info = cert.info();
    key_usage.iter().any(|ku| info.key_usage.contains(*ku))
        || ext_key_usage
            .iter()
            .any(|eku| info.ext_key_usage.contains(eku))
}

#[async_trait]
impl CertStore for MemoryStore {
    fn store_id(&self) -> Uuid {
        STORE_ID
    }

    async fn get_private_key(&self, serial: &Serial) -> Result<KeyPair> {
        Ok(KeyPair::from_pem(&self.entry(serial).await?.key_pem)?)
    }

    async fn get_public_key(&self, serial: &Serial) -> Result<PublicKey> {
        Ok(self.get_certificate(serial).await?.info().public_key.clone())
    }

    async fn get_certificate(&self, serial: &Serial) -> Result<Certificate> {
        Ok(Certificate::from_pem(&self.entry(serial).await?.certificate_pem)?)
    }

    async fn get_certificates(
        &self,
        key_usage: &[KeyUsage],
        ext_key_usage: &[ExtKeyUsage],
    ) -> Result<Vec<Certificate>> {
        let pems: Vec<String> = self
            .entries
            .read()
            .await
            .values()
            .map(|p| p.certificate_pem.clone())
            .collect();
        let mut out = Vec::new();
        for pem in pems {
            let cert = Certificate::from_pem(&pem)?;
            if (key_usage.is_empty() && ext_key_usage.is_empty())
                || matches(&cert, key_usage, ext_key_usage)
            {
                out.push(cert);
            }
        }
        Ok(out)
    }

    async fn add_certificate(&self, key: &KeyPair, certificate: &Certificate) -> Result<()> {
        if key.public() != &certificate.info().public_key {
            return Err(CoreError::Invalid(String::from(
                "key pair does not belong to the certificate",
            ))
            .into());
        }
        let serial = certificate.serial().to_hex();
        let pair = StoredPair {
            serial: serial.clone(),
            key_pem: key.to_pem()?,
            certificate_pem: certificate.to_pem(),
        };
        let mut entries = self.entries.write().await;
        if entries.contains_key(&serial) {
            return Err(CoreError::CertificateExists { serial }.into());
        }
        debug!(serial = %serial, "stored key pair");
        entries.insert(serial, pair);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ServiceError;
    use webca_core::SubjectName;
    use webca_crypto::create_ca_certificate;

    fn ca(name: &str) -> (KeyPair, Certificate) {
        create_ca_certificate(&SubjectName::common_name(name), 2048, None, 86_400, None).unwrap()
    }

    #[tokio::test]
    async fn test_add_and_get() {
        let store = MemoryStore::new();
        let (key, cert) = ca("Store CA");
        store.add_certificate(&key, &cert).await.unwrap();

        let serial = cert.serial().clone();
        assert_eq!(store.get_certificate(&serial).await.unwrap(), cert);
        assert_eq!(
            store.get_private_key(&serial).await.unwrap().public(),
            key.public()
        );
        assert_eq!(&store.get_public_key(&serial).await.unwrap(), key.public());
        assert!(store.get_certificate(&Serial::generate()).await.is_err());
    }

    #[tokio::test]
    async fn test_duplicate_serial_rejected() {
        let store = MemoryStore::new();
        let (key, cert) = ca("Store CA");
        store.add_certificate(&key, &cert).await.unwrap();
        let err = store.add_certificate(&key, &cert).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::CertificateExists { .. })
        ));
        assert_eq!(store.pairs().await.len(), 1);
    }

    #[tokio::test]
    async fn test_usage_filters() {
        let store = MemoryStore::new();
        let (key, cert) = ca("Store CA");
        store.add_certificate(&key, &cert).await.unwrap();

        assert_eq!(store.get_certificates(&[], &[]).await.unwrap().len(), 1);
        assert_eq!(
            store
                .get_certificates(&[KeyUsage::KeyCertSign], &[])
                .await
                .unwrap()
                .len(),
            1
        );
        assert!(store
            .get_certificates(&[KeyUsage::KeyAgreement], &[ExtKeyUsage::ServerAuth])
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_rejects_mismatched_key() {
        let store = MemoryStore::new();
        let (_, cert) = ca("Store CA");
        let (other, _) = ca("Other CA");
        assert!(store.add_certificate(&other, &cert).await.is_err());
    }
}
