//! `webca serve` - Run the issuance poller and the OCSP responder.

use anyhow::{Context as _, Result};
use std::sync::Arc;
use tracing::info;
use webca_service::{ocsp, IssuanceService, OcspResponder};

use super::{Context, Workspace};

pub async fn execute(ctx: Context) -> Result<()> {
    let ws = ctx.open().await?;
    let service = ws.issuance(&ctx.config);
    let responder = OcspResponder::from_config(ws.repo.clone(), &ws.stores)
        .await
        .context("OCSP responder not started")?;

    let result = tokio::select! {
        result = ocsp::serve(ctx.config.ocsp_listen, Arc::new(responder)) => {
            result.map_err(anyhow::Error::from)
        }
        result = poll(&service, &ws) => result,
        signal = tokio::signal::ctrl_c() => {
            info!("shutting down");
            signal.map_err(anyhow::Error::from)
        }
    };
    ws.save().await?;
    result
}

/// Issuance cycles, saving the snapshot after any cycle that changed state
async fn poll(service: &IssuanceService, ws: &Workspace) -> Result<()> {
    service
        .run_with(|report| async move {
            if report.changed() {
                ws.save().await
            } else {
                Ok(())
            }
        })
        .await
}
