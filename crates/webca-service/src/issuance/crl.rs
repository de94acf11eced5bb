use chrono::Utc;
use std::path::Path;
use tracing::{error, info};
use webca_core::config::CRL_CONFIG;
use webca_core::{CrlConfig, SigningRole};
use webca_crypto::{create_crl, Crl, RevokedEntry, Serial};

use super::IssuanceService;
use crate::signing::load_signing_pair;
use crate::{Result, ServiceError};

impl IssuanceService {
    /// Stored CRL state, or a fresh one built from the service settings
    pub async fn crl_config(&self) -> Result<CrlConfig> {
        match self.repo.get_value(CRL_CONFIG).await? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(CrlConfig {
                days: self.config.crl_days,
                ..CrlConfig::with_path(self.config.crl_path.to_string_lossy())
            }),
        }
    }

    async fn save_crl_config(&self, crl_config: &CrlConfig) -> Result<()> {
        let json = serde_json::to_string(crl_config)?;
        self.repo.set_value(CRL_CONFIG, &json).await?;
        Ok(())
    }

    /// Regenerate the CRL when it is due. Returns whether one was published.
    ///
    /// A failure after the CRL became due is recorded in the stored status;
    /// dates and sequence stay untouched so the next cycle retries.
    pub async fn check_crl(&self) -> Result<bool> {
        let mut crl_config = self.crl_config().await?;
        if !crl_config.is_due(Utc::now()) {
            return Ok(false);
        }
        info!(sequence = crl_config.sequence, "CRL time");

        let published = self.publish_crl(&crl_config).await.and_then(|crl| {
            crl_config.mark_published(crl.this_update)?;
            Ok(crl)
        });
        match published {
            Ok(crl) => {
                self.save_crl_config(&crl_config).await?;
                info!(
                    number = crl.number,
                    path = %crl_config.path,
                    next_update = %crl.next_update,
                    "CRL published"
                );
                Ok(true)
            }
            Err(e) => {
                error!(path = %crl_config.path, error = %e, "CRL not published");
                crl_config.mark_failed(&e);
                self.save_crl_config(&crl_config).await?;
                Err(e)
            }
        }
    }

    async fn publish_crl(&self, crl_config: &CrlConfig) -> Result<Crl> {
        let pair = load_signing_pair(&*self.repo, &self.stores, SigningRole::CrlSign).await?;
        let revoked = self
            .repo
            .list_revoked()
            .await?
            .into_iter()
            .map(|r| -> Result<RevokedEntry> {
                Ok(RevokedEntry {
                    serial: Serial::from_hex(&r.serial)?,
                    date: r.date,
                    reason: r.reason,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let crl = create_crl(
            &revoked,
            crl_config.days,
            &pair.certificate,
            &pair.key,
            crl_config.sequence,
        )?;
        write_crl(Path::new(&crl_config.path), &crl.to_pem()).await?;
        Ok(crl)
    }
}

/// Overwrite the CRL file
async fn write_crl(path: &Path, pem: &str) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(ServiceError::CrlWrite(String::from(
            "no CRL output path configured",
        )));
    }
    tokio::fs::write(path, pem)
        .await
        .map_err(|e| ServiceError::CrlWrite(format!("{}: {e}", path.display())))
}
