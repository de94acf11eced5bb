//! Command implementations.

pub mod crl;
pub mod init;
pub mod ocsp_query;
pub mod serve;

use anyhow::{Context as _, Result};
use std::path::PathBuf;
use std::sync::Arc;
use webca_service::certstore::{MemoryStore, StoreRegistry};
use webca_service::repository::{MemoryRepository, Snapshot};
use webca_service::{IssuanceService, ServiceConfig};

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    pub config: ServiceConfig,
}

/// Repository and key store restored from the data snapshot
pub struct Workspace {
    pub repo: Arc<MemoryRepository>,
    pub store: Arc<MemoryStore>,
    pub stores: StoreRegistry,
    path: PathBuf,
}

impl Context {
    /// Restore the snapshot written by `webca init`.
    pub async fn open(&self) -> Result<Workspace> {
        let path = self.config.snapshot_path();
        let snapshot = Snapshot::load(&path).await.with_context(|| {
            format!(
                "cannot read {}; run `webca init` first",
                path.display()
            )
        })?;
        let (repo, store) = snapshot.restore();
        let store = Arc::new(store);
        Ok(Workspace {
            repo: Arc::new(repo),
            stores: StoreRegistry::new().with_store(store.clone()),
            store,
            path,
        })
    }
}

impl Workspace {
    /// Write the current state back to the snapshot
    pub async fn save(&self) -> Result<()> {
        Snapshot::capture(&self.repo, &self.store)
            .await
            .save(&self.path)
            .await
            .with_context(|| format!("cannot write {}", self.path.display()))
    }

    pub fn issuance(&self, config: &ServiceConfig) -> IssuanceService {
        IssuanceService::new(self.repo.clone(), self.stores.clone(), config.clone())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::cli::args::InitArgs;

    /// Context rooted in a fresh temporary directory, already initialised
    pub async fn initialised() -> (Context, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context {
            config: ServiceConfig {
                data_dir: dir.path().to_path_buf(),
                crl_path: dir.path().join("ca.crl"),
                ..ServiceConfig::default()
            },
        };
        let args = InitArgs {
            subject: String::from("/CN=Test Root"),
            bits: 2048,
            days: 365,
            crl_url: vec![String::from("http://ca.example.org/ca.crl")],
            force: false,
        };
        super::init::execute(ctx.clone(), args).await.unwrap();
        (ctx, dir)
    }
}
