//! Resolution of the signing key roles through the configuration store.

use tracing::debug;
use uuid::Uuid;
use webca_core::repository::ConfigStore;
use webca_core::{KeyRef, SigningRole};
use webca_crypto::{Certificate, KeyPair, Serial};

use crate::certstore::StoreRegistry;
use crate::{Result, ServiceError};

/// A key pair together with its certificate
#[derive(Debug)]
pub struct SigningPair {
    pub key: KeyPair,
    pub certificate: Certificate,
}

/// Point `role` at the key pair stored under `serial` in `store_id`
pub async fn register_signing_pair<C>(
    config: &C,
    role: SigningRole,
    store_id: Uuid,
    serial: &Serial,
) -> Result<()>
where
    C: ConfigStore + ?Sized,
{
    let key_ref = KeyRef::new(store_id.to_string(), serial.to_hex());
    config
        .set_value(role.param_name(), &key_ref.to_string())
        .await?;
    debug!(role = %role, key = %key_ref, "registered signing key");
    Ok(())
}

/// Load the key pair configured for `role`.
///
/// Every failure is a configuration error: the role is unset, names an
/// unknown store, or points at a serial the store does not hold.
pub async fn load_signing_pair<C>(
    config: &C,
    stores: &StoreRegistry,
    role: SigningRole,
) -> Result<SigningPair>
where
    C: ConfigStore + ?Sized,
{
    let value = config
        .get_value(role.param_name())
        .await?
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ServiceError::Config(format!("no {role} key configured")))?;
    let key_ref: KeyRef = value
        .parse()
        .map_err(|e| ServiceError::Config(format!("{role} key: {e}")))?;
    let store = stores.get(&key_ref.store_id)?;
    let serial = Serial::from_hex(&key_ref.serial)
        .map_err(|e| ServiceError::Config(format!("{role} key: {e}")))?;

    let unresolved = |e: ServiceError| ServiceError::Config(format!("{role} key {key_ref}: {e}"));
    let certificate = store.get_certificate(&serial).await.map_err(unresolved)?;
    let key = store.get_private_key(&serial).await.map_err(unresolved)?;
    Ok(SigningPair { key, certificate })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certstore::{CertStore, MemoryStore, STORE_ID};
    use crate::repository::MemoryRepository;
    use std::sync::Arc;
    use webca_core::SubjectName;
    use webca_crypto::create_ca_certificate;

    #[tokio::test]
    async fn test_register_and_load() {
        let store = Arc::new(MemoryStore::new());
        let (key, cert) =
            create_ca_certificate(&SubjectName::common_name("Root"), 2048, None, 86_400, None)
                .unwrap();
        store.add_certificate(&key, &cert).await.unwrap();
        let stores = StoreRegistry::new().with_store(store);
        let repo = MemoryRepository::new();

        register_signing_pair(&repo, SigningRole::CrlSign, STORE_ID, cert.serial())
            .await
            .unwrap();
        let pair = load_signing_pair(&repo, &stores, SigningRole::CrlSign)
            .await
            .unwrap();
        assert_eq!(pair.certificate, cert);
        assert_eq!(pair.key.public(), key.public());
    }

    #[tokio::test]
    async fn test_unresolved_roles_are_config_errors() {
        let stores = StoreRegistry::new().with_store(Arc::new(MemoryStore::new()));
        let repo = MemoryRepository::new();

        let err = load_signing_pair(&repo, &stores, SigningRole::CertSign)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Config(_)));

        register_signing_pair(&repo, SigningRole::CertSign, STORE_ID, &Serial::generate())
            .await
            .unwrap();
        let err = load_signing_pair(&repo, &stores, SigningRole::CertSign)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Config(_)));
    }
}
