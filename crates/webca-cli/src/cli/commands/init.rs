//! `webca init` - Create the certificate authority.

use anyhow::{bail, Result};
use webca_core::SubjectName;
use webca_service::certstore::MemoryStore;
use webca_service::repository::{MemoryRepository, Snapshot};
use webca_service::{bootstrap_ca, CaSetup};

use super::Context;
use crate::cli::args::InitArgs;

pub async fn execute(ctx: Context, args: InitArgs) -> Result<()> {
    let path = ctx.config.snapshot_path();
    if path.exists() && !args.force {
        bail!(
            "{} already exists; pass --force to replace it",
            path.display()
        );
    }
    tokio::fs::create_dir_all(&ctx.config.data_dir).await?;

    let name: SubjectName = args.subject.parse()?;
    if name.cn().is_none() {
        bail!("the CA subject needs a common name (CN)");
    }
    let setup = CaSetup {
        name,
        bits: args.bits,
        days: args.days,
    };

    let repo = MemoryRepository::new();
    let store = MemoryStore::new();
    let ca = bootstrap_ca(&repo, &store, &setup).await?;
    for url in &args.crl_url {
        repo.add_crl_location(url.as_str()).await?;
    }
    Snapshot::capture(&repo, &store).await.save(&path).await?;

    println!("Root CA:        {} (serial {})", setup.name, ca.root.serial());
    println!("CSR signing:    serial {}", ca.csr_signer.serial());
    println!("OCSP signing:   serial {}", ca.ocsp_signer.serial());
    println!("Snapshot:       {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::testing::initialised;
    use webca_core::repository::{ConfigStore, CrlLocationRepository};
    use webca_core::SigningRole;

    #[tokio::test]
    async fn test_init_writes_snapshot() {
        let (ctx, _dir) = initialised().await;
        let ws = ctx.open().await.unwrap();
        for role in SigningRole::ALL {
            assert!(ws.repo.get_value(role.param_name()).await.unwrap().is_some());
        }
        assert_eq!(ws.repo.active_crl_locations().await.unwrap().len(), 1);
        assert_eq!(ws.store.pairs().await.len(), 3);
    }

    #[tokio::test]
    async fn test_init_refuses_to_overwrite() {
        let (ctx, _dir) = initialised().await;
        let args = InitArgs {
            subject: String::from("/CN=Other Root"),
            bits: 2048,
            days: 365,
            crl_url: Vec::new(),
            force: false,
        };
        assert!(execute(ctx, args).await.is_err());
    }
}
