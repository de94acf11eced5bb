//! First-run setup of a CA: root certificate and the four signing roles.

use tracing::info;
use webca_core::repository::ConfigStore;
use webca_core::{ExtKeyUsage, KeyType, KeyUsage, KeyUsageSet, SigningRole, SubjectName};
use webca_crypto::{
    create_ca_certificate, create_certificate, create_self_signed, create_self_signed_request,
    Certificate, Extension, ExtensionValue, Issuer, KeyPair, Serial, Validity,
};

use crate::certstore::CertStore;
use crate::signing::register_signing_pair;
use crate::{Result, ServiceError};

/// Parameters of a new CA
#[derive(Debug, Clone)]
pub struct CaSetup {
    pub name: SubjectName,
    /// RSA key size for every generated key
    pub bits: u32,
    /// Root certificate lifetime
    pub days: u32,
}

impl Default for CaSetup {
    fn default() -> Self {
        Self {
            name: SubjectName::common_name("webca Root CA"),
            bits: 2048,
            days: 3650,
        }
    }
}

/// Certificates created by [`bootstrap_ca`]
#[derive(Debug, Clone)]
pub struct Bootstrapped {
    /// Signs certificates and CRLs
    pub root: Certificate,
    pub csr_signer: Certificate,
    pub ocsp_signer: Certificate,
}

/// Create the root CA, a CSR signing pair and an OCSP signing certificate,
/// store them in `store` and point every [`SigningRole`] at them.
///
/// Refuses to run when a certificate signing key is already configured.
pub async fn bootstrap_ca<C>(
    config: &C,
    store: &dyn CertStore,
    setup: &CaSetup,
) -> Result<Bootstrapped>
where
    C: ConfigStore + ?Sized,
{
    let existing = config.get_value(SigningRole::CertSign.param_name()).await?;
    if existing.is_some_and(|v| !v.trim().is_empty()) {
        return Err(ServiceError::Config(String::from(
            "a certificate signing key is already configured",
        )));
    }
    let duration = i64::from(setup.days) * 86_400;
    let cn = setup.name.cn().unwrap_or("webca");

    let (root_key, root) = create_ca_certificate(&setup.name, setup.bits, None, duration, None)?;
    store.add_certificate(&root_key, &root).await?;

    let (csr_key, csr_signer) = create_self_signed(
        &SubjectName::common_name(format!("{cn} CSR signing")),
        KeyType::Rsa,
        setup.bits,
        duration,
        &[],
    )?;
    store.add_certificate(&csr_key, &csr_signer).await?;

    let ocsp_key = KeyPair::generate(KeyType::Rsa, setup.bits)?;
    let ocsp_request = create_self_signed_request(
        &ocsp_key,
        &SubjectName::common_name(format!("{cn} OCSP responder")),
        &[
            Extension::new(
                ExtensionValue::BasicConstraints {
                    ca: false,
                    path_len: None,
                },
                true,
            ),
            Extension::new(
                ExtensionValue::KeyUsage(KeyUsageSet::of(&[KeyUsage::DigitalSignature])),
                true,
            ),
            Extension::new(
                ExtensionValue::ExtendedKeyUsage(vec![ExtKeyUsage::OcspSigning]),
                false,
            ),
        ],
    )?;
    // Must end before the root does
    let ocsp_signer = create_certificate(
        &ocsp_request,
        Issuer::Certificate(&root, &root_key),
        &Serial::generate(),
        Validity::seconds(0, duration - duration / 10),
    )?;
    store.add_certificate(&ocsp_key, &ocsp_signer).await?;

    let store_id = store.store_id();
    register_signing_pair(config, SigningRole::CertSign, store_id, root.serial()).await?;
    register_signing_pair(config, SigningRole::CrlSign, store_id, root.serial()).await?;
    register_signing_pair(config, SigningRole::CsrSign, store_id, csr_signer.serial()).await?;
    register_signing_pair(config, SigningRole::OcspSign, store_id, ocsp_signer.serial()).await?;

    info!(
        root = %root.serial(),
        subject = %setup.name,
        "initialised certificate authority"
    );
    Ok(Bootstrapped {
        root,
        csr_signer,
        ocsp_signer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certstore::{MemoryStore, StoreRegistry};
    use crate::repository::MemoryRepository;
    use crate::signing::load_signing_pair;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_bootstrap_registers_all_roles() {
        let repo = MemoryRepository::new();
        let store = Arc::new(MemoryStore::new());
        let ca = bootstrap_ca(&repo, &*store, &CaSetup::default())
            .await
            .unwrap();

        let stores = StoreRegistry::new().with_store(store);
        for role in SigningRole::ALL {
            load_signing_pair(&repo, &stores, role).await.unwrap();
        }
        let ocsp = load_signing_pair(&repo, &stores, SigningRole::OcspSign)
            .await
            .unwrap();
        assert_eq!(ocsp.certificate, ca.ocsp_signer);
        let info = ca.ocsp_signer.info();
        assert_eq!(info.ext_key_usage, vec![ExtKeyUsage::OcspSigning]);
        assert!(info.not_after < ca.root.info().not_after);
        assert_eq!(info.issuer_der, ca.root.info().subject_der);
    }

    #[tokio::test]
    async fn test_bootstrap_refuses_second_run() {
        let repo = MemoryRepository::new();
        let store = MemoryStore::new();
        let setup = CaSetup {
            days: 30,
            ..CaSetup::default()
        };
        bootstrap_ca(&repo, &store, &setup).await.unwrap();
        let err = bootstrap_ca(&repo, &store, &setup).await.unwrap_err();
        assert!(matches!(err, ServiceError::Config(_)));
    }
}
