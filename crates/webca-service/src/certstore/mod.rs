//! Certificate stores: where key pairs and their certificates live.
//!
//! Stores identify themselves with a stable UUID. Key references kept in the
//! configuration store name a store by that id plus a certificate serial, and
//! the [`StoreRegistry`] built at startup resolves them.

mod memory;

pub use memory::{MemoryStore, StoredPair, STORE_ID};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;
use webca_core::{ExtKeyUsage, KeyUsage};
use webca_crypto::{Certificate, KeyPair, PublicKey, Serial};

use crate::{Result, ServiceError};

/// Storage for key pairs and their certificates, addressed by serial
#[async_trait]
pub trait CertStore: Send + Sync {
    /// Stable identifier used in key references
    fn store_id(&self) -> Uuid;

    async fn get_private_key(&self, serial: &Serial) -> Result<KeyPair>;

    async fn get_public_key(&self, serial: &Serial) -> Result<PublicKey>;

    async fn get_certificate(&self, serial: &Serial) -> Result<Certificate>;

    /// Certificates allowing any of the given usages; all of them when both
    /// filters are empty
    async fn get_certificates(
        &self,
        key_usage: &[KeyUsage],
        ext_key_usage: &[ExtKeyUsage],
    ) -> Result<Vec<Certificate>>;

    /// Store a key pair and its certificate as one unit.
    ///
    /// Fails with `CertificateExists` when the serial is already present.
    async fn add_certificate(&self, key: &KeyPair, certificate: &Certificate) -> Result<()>;
}

/// Stores known to the process, keyed by store id
#[derive(Clone, Default)]
pub struct StoreRegistry {
    stores: HashMap<Uuid, Arc<dyn CertStore>>,
}

impl std::fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("stores", &self.stores.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl StoreRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn CertStore>) -> Self {
        self.register(store);
        self
    }

    pub fn register(&mut self, store: Arc<dyn CertStore>) {
        self.stores.insert(store.store_id(), store);
    }

    /// Look up a store by the id stored in a key reference
    pub fn get(&self, id: &str) -> Result<Arc<dyn CertStore>> {
        let uuid = Uuid::parse_str(id.trim())
            .map_err(|e| ServiceError::Config(format!("invalid store id {id:?}: {e}")))?;
        self.stores
            .get(&uuid)
            .cloned()
            .ok_or_else(|| ServiceError::Config(format!("unknown certificate store {uuid}")))
    }
}
