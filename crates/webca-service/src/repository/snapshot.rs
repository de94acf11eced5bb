use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use super::{MemoryRepository, RepositoryState};
use crate::certstore::{MemoryStore, StoredPair};
use crate::Result;

/// Records plus key pairs, persisted as one JSON document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub repository: RepositoryState,
    #[serde(default)]
    pub keys: Vec<StoredPair>,
}

impl Snapshot {
    pub async fn capture(repo: &MemoryRepository, store: &MemoryStore) -> Self {
        Self {
            repository: repo.state().await,
            keys: store.pairs().await,
        }
    }

    /// Rebuild the in-memory repository and store
    #[must_use]
    pub fn restore(self) -> (MemoryRepository, MemoryStore) {
        (
            MemoryRepository::from_state(self.repository),
            MemoryStore::from_pairs(self.keys),
        )
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write to a sibling temporary file, then rename over `path`
    pub async fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;
        debug!(path = %path.display(), "saved snapshot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certstore::CertStore;
    use webca_core::repository::ConfigStore;
    use webca_core::SubjectName;
    use webca_crypto::create_ca_certificate;

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("webca.json");

        let repo = MemoryRepository::new();
        let store = MemoryStore::new();
        repo.set_value("param", "value").await.unwrap();
        repo.add_crl_location("http://ca.example.org/ca.crl")
            .await
            .unwrap();
        let (key, cert) =
            create_ca_certificate(&SubjectName::common_name("Root"), 2048, None, 86_400, None)
                .unwrap();
        store.add_certificate(&key, &cert).await.unwrap();

        let snapshot = Snapshot::capture(&repo, &store).await;
        snapshot.save(&path).await.unwrap();
        let loaded = Snapshot::load(&path).await.unwrap();
        assert_eq!(loaded, snapshot);

        let (repo, store) = loaded.restore();
        assert_eq!(
            repo.get_value("param").await.unwrap().as_deref(),
            Some("value")
        );
        assert_eq!(store.get_certificate(cert.serial()).await.unwrap(), cert);
    }

    #[tokio::test]
    async fn test_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Snapshot::load(&dir.path().join("absent.json")).await.is_err());
    }
}
