//! Engine configuration.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

/// Rejections after which a queue entry is moved to the dead letters.
pub const DEFAULT_MAX_REJECTIONS: u32 = 5;

/// Period of the background sync timer.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(60);

/// Tuning knobs for a [`SyncEngine`](crate::SyncEngine).
///
/// Deserializes from e.g. `{"maxRejections": 3, "syncIntervalSecs": 30}`;
/// missing fields take their defaults and `"maxRejections": null` turns
/// dead-lettering off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncConfig {
    pub max_rejections: Option<u32>,
    #[serde(rename = "syncIntervalSecs", with = "secs")]
    pub sync_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_rejections: Some(DEFAULT_MAX_REJECTIONS),
            sync_interval: DEFAULT_SYNC_INTERVAL,
        }
    }
}

impl SyncConfig {
    pub fn with_max_rejections(mut self, max: Option<u32>) -> Self {
        self.max_rejections = max;
        self
    }

    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Whether an entry rejected `rejections` times belongs in the dead letters.
    pub fn is_exhausted(&self, rejections: u32) -> bool {
        self.max_rejections.is_some_and(|max| rejections >= max)
    }
}

mod secs {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        value.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        if secs == 0 {
            return Err(serde::de::Error::custom("sync interval must be at least one second"));
        }
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_missing_fields() {
        let config: SyncConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SyncConfig::default());
        assert_eq!(config.max_rejections, Some(5));
        assert_eq!(config.sync_interval, Duration::from_secs(60));
    }

    #[test]
    fn parses_overrides() {
        let config: SyncConfig =
            serde_json::from_str(r#"{"maxRejections": null, "syncIntervalSecs": 15}"#).unwrap();
        assert_eq!(config.max_rejections, None);
        assert_eq!(config.sync_interval, Duration::from_secs(15));
        assert!(!config.is_exhausted(1_000));
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(serde_json::from_str::<SyncConfig>(r#"{"syncIntervalSecs": 0}"#).is_err());
    }

    #[test]
    fn exhaustion_threshold() {
        let config = SyncConfig::default().with_max_rejections(Some(2));
        assert!(!config.is_exhausted(1));
        assert!(config.is_exhausted(2));
    }
}
