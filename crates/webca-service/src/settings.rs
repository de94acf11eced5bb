//! Service configuration loaded from TOML.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for the issuance poller and OCSP responder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Sleep between polling cycles in milliseconds (default: 1000).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// OCSP responder URL advertised in issued certificates.
    #[serde(default)]
    pub ocsp_url: Option<String>,

    /// OCSP HTTP listen address (default: 127.0.0.1:8080).
    #[serde(default = "default_ocsp_listen")]
    pub ocsp_listen: SocketAddr,

    /// Output path used when no CRL configuration is stored yet.
    #[serde(default = "default_crl_path")]
    pub crl_path: PathBuf,

    /// CRL update period in days for a fresh CRL configuration.
    #[serde(default = "default_crl_days")]
    pub crl_days: u32,

    /// Directory holding the JSON snapshot; also stripped from diagnostics.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            ocsp_url: None,
            ocsp_listen: default_ocsp_listen(),
            crl_path: default_crl_path(),
            crl_days: default_crl_days(),
            data_dir: default_data_dir(),
        }
    }
}

impl ServiceConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content).map_err(|e| crate::ServiceError::Config(e.to_string()))
        } else {
            Ok(Self::default())
        }
    }

    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Path of the JSON snapshot inside `data_dir`
    #[must_use]
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join("webca.json")
    }
}

const fn default_poll_interval() -> u64 {
    1000
}

fn default_ocsp_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_crl_path() -> PathBuf {
    PathBuf::from("webca.crl")
}

const fn default_crl_days() -> u32 {
    15
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServiceConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.ocsp_listen.port(), 8080);
        assert_eq!(config.crl_days, 15);
        assert!(config.ocsp_url.is_none());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("webca.toml");
        std::fs::write(
            &path,
            "poll_interval_ms = 250\nocsp_url = \"http://ocsp.example.org\"\ncrl_days = 3\n",
        )
        .unwrap();
        let config = ServiceConfig::load(&path).unwrap();
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.ocsp_url.as_deref(), Some("http://ocsp.example.org"));
        assert_eq!(config.crl_days, 3);
        assert_eq!(config.ocsp_listen, default_ocsp_listen());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServiceConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.poll_interval_ms, 1000);
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "poll_interval_ms = \"soon\"").unwrap();
        assert!(matches!(
            ServiceConfig::load(&path),
            Err(crate::ServiceError::Config(_))
        ));
    }
}
