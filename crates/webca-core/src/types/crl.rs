use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Status string stored after a successful regeneration
pub const CRL_STATUS_OK: &str = "OK";

/// Persisted CRL publication state
///
/// Stored as a JSON blob in the configuration store. Timestamps are unix
/// seconds; `None` means the CRL has never been produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrlConfig {
    /// Where the PEM CRL is written
    #[serde(default)]
    pub path: String,

    #[serde(default)]
    pub last_update: Option<i64>,

    #[serde(default)]
    pub next_update: Option<i64>,

    /// Days between regenerations; also the CRL nextUpdate horizon
    #[serde(default = "default_days")]
    pub days: u32,

    #[serde(default)]
    pub delta_last_update: Option<i64>,

    #[serde(default)]
    pub delta_next_update: Option<i64>,

    #[serde(default = "default_delta_days")]
    pub delta_days: u32,

    /// CRL number of the next CRL to be issued
    #[serde(default = "default_sequence")]
    pub sequence: u64,

    /// `OK` or the last failure
    #[serde(default)]
    pub status: String,
}

const fn default_days() -> u32 {
    15
}

const fn default_delta_days() -> u32 {
    1
}

const fn default_sequence() -> u64 {
    1
}

impl Default for CrlConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            last_update: None,
            next_update: None,
            days: default_days(),
            delta_last_update: None,
            delta_next_update: None,
            delta_days: default_delta_days(),
            sequence: default_sequence(),
            status: String::new(),
        }
    }
}

impl CrlConfig {
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// When the next CRL is due; `None` means due immediately, which also
    /// covers a period too long to represent
    #[must_use]
    pub fn due_at(&self) -> Option<DateTime<Utc>> {
        let last = Utc.timestamp_opt(self.last_update?, 0).single()?;
        last.checked_add_signed(self.period())
    }

    fn period(&self) -> Duration {
        Duration::days(i64::from(self.days))
    }

    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due_at().map_or(true, |due| now > due)
    }

    /// Record a successful regeneration at `now`.
    ///
    /// Leaves the state untouched when `now + days` is out of range.
    pub fn mark_published(&mut self, now: DateTime<Utc>) -> Result<()> {
        let next = now.checked_add_signed(self.period()).ok_or_else(|| {
            CoreError::Config(format!("CRL period of {} days is out of range", self.days))
        })?;
        self.last_update = Some(now.timestamp());
        self.next_update = Some(next.timestamp());
        self.sequence += 1;
        self.status = String::from(CRL_STATUS_OK);
        Ok(())
    }

    /// Record a failed regeneration; dates and sequence stay untouched
    pub fn mark_failed(&mut self, error: impl std::fmt::Display) {
        self.status = error.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_config_is_due() {
        let config = CrlConfig::default();
        assert_eq!(config.days, 15);
        assert_eq!(config.sequence, 1);
        assert!(config.due_at().is_none());
        assert!(config.is_due(Utc::now()));
    }

    #[test]
    fn test_mark_published() {
        let mut config = CrlConfig::with_path("/tmp/ca.crl");
        let now = Utc::now();
        config.mark_published(now).unwrap();
        assert_eq!(config.sequence, 2);
        assert_eq!(config.status, CRL_STATUS_OK);
        assert!(!config.is_due(now + Duration::days(14)));
        assert!(config.is_due(now + Duration::days(16)));
        assert_eq!(
            config.next_update.unwrap() - config.last_update.unwrap(),
            15 * 86_400
        );
    }

    #[test]
    fn test_period_out_of_range() {
        let mut config = CrlConfig {
            days: u32::MAX,
            ..CrlConfig::default()
        };
        let err = config.mark_published(Utc::now()).unwrap_err();
        assert!(err.to_string().contains("out of range"));
        assert_eq!(config.sequence, 1);
        assert!(config.last_update.is_none());

        config.last_update = Some(Utc::now().timestamp());
        assert!(config.due_at().is_none());
        assert!(config.is_due(Utc::now()));
    }

    #[test]
    fn test_mark_failed_keeps_sequence() {
        let mut config = CrlConfig::default();
        config.mark_failed("disk full");
        assert_eq!(config.sequence, 1);
        assert_eq!(config.status, "disk full");
        assert!(config.last_update.is_none());
    }

    #[test]
    fn test_json_blob() {
        let json = r#"{"path": "/var/ca.crl", "days": 7, "sequence": 4}"#;
        let config: CrlConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.days, 7);
        assert_eq!(config.sequence, 4);
        assert_eq!(config.delta_days, 1);
    }
}
