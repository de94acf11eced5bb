//! `webca crl` - Regenerate the certificate revocation list.

use anyhow::Result;
use webca_core::config::CRL_CONFIG;
use webca_core::repository::ConfigStore;

use super::Context;
use crate::cli::args::CrlArgs;

pub async fn execute(ctx: Context, args: CrlArgs) -> Result<()> {
    let ws = ctx.open().await?;
    let service = ws.issuance(&ctx.config);

    if args.force {
        let mut crl_config = service.crl_config().await?;
        crl_config.last_update = None;
        ws.repo
            .set_value(CRL_CONFIG, &serde_json::to_string(&crl_config)?)
            .await?;
    }

    // Keep the recorded status even when publishing failed
    let published = service.check_crl().await;
    ws.save().await?;
    let published = published?;

    let crl_config = service.crl_config().await?;
    if published {
        println!(
            "Published CRL number {} to {}",
            crl_config.sequence.saturating_sub(1),
            crl_config.path
        );
    } else if let Some(due) = crl_config.due_at() {
        println!("CRL is current; next one due {due}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::testing::initialised;

    #[tokio::test]
    async fn test_crl_published_then_forced() {
        let (ctx, dir) = initialised().await;
        execute(ctx.clone(), CrlArgs { force: false }).await.unwrap();
        let first = std::fs::read_to_string(dir.path().join("ca.crl")).unwrap();
        assert!(first.starts_with("-----BEGIN X509 CRL-----"));

        execute(ctx.clone(), CrlArgs { force: false }).await.unwrap();
        let service = ctx.open().await.unwrap().issuance(&ctx.config);
        assert_eq!(service.crl_config().await.unwrap().sequence, 2);

        execute(ctx.clone(), CrlArgs { force: true }).await.unwrap();
        let service = ctx.open().await.unwrap().issuance(&ctx.config);
        assert_eq!(service.crl_config().await.unwrap().sequence, 3);
    }
}
