use crate::settings::error::SettingsError;
use engine_core::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};
use tracing::{debug, info};

pub mod error;

/// Prefix of the environment variables that override file settings,
/// e.g. `TSYNC_PAGE_SIZE=5000`.
pub const ENV_PREFIX: &str = "TSYNC_";

/// Client-side tuning for the transformation synchronization layer.
///
/// Every field has a default, so an empty JSON object is a valid settings
/// file. Values are passed explicitly to the components that use them;
/// nothing reads process-wide state after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Page size for file and task listings.
    pub page_size: usize,
    /// Page size for transformation listings.
    pub transformation_page_size: usize,
    /// Attempts per listing page before the fetch gives up.
    pub page_retry_budget: usize,
    /// Attempts per status-update chunk before it is reported as failed.
    pub chunk_retry_budget: usize,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    /// Upper bound on entries per status-update submission.
    pub status_chunk_size: usize,
    /// Upper bound on LFNs per file-removal submission.
    pub removal_chunk_size: usize,
    /// A file proposed back to `Unused` whose error count is a positive
    /// multiple of this value is parked in `MaxReset` instead.
    pub max_reset_counter: u32,
    /// Whether migration turns parent `MaxReset` files into `Unused` on the
    /// derived side.
    pub reset_unused_on_max_reset: bool,
    pub listing_timeout_secs: u64,
    pub call_timeout_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            page_size: 10_000,
            transformation_page_size: 100,
            page_retry_budget: 5,
            chunk_retry_budget: 3,
            retry_base_delay_ms: 250,
            retry_max_delay_ms: 5_000,
            status_chunk_size: 5_000,
            removal_chunk_size: 100,
            max_reset_counter: 10,
            reset_unused_on_max_reset: true,
            listing_timeout_secs: 1_800,
            call_timeout_secs: 120,
        }
    }
}

impl SyncSettings {
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| SettingsError::Read {
                path: path.display().to_string(),
                source,
            })?;
        let settings: SyncSettings =
            serde_json::from_str(&raw).map_err(|source| SettingsError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        info!(path = %path.display(), "Loaded client settings");
        Ok(settings)
    }

    /// Applies `TSYNC_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, SettingsError> {
        self.with_overrides(std::env::vars())
    }

    /// Applies `TSYNC_*` overrides from the given variables; unrelated
    /// variables are ignored.
    pub fn with_overrides(
        mut self,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self, SettingsError> {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let invalid = || SettingsError::InvalidOverride {
                key: key.clone(),
                value: value.clone(),
            };
            match name {
                "PAGE_SIZE" => self.page_size = value.parse().map_err(|_| invalid())?,
                "TRANSFORMATION_PAGE_SIZE" => {
                    self.transformation_page_size = value.parse().map_err(|_| invalid())?
                }
                "PAGE_RETRY_BUDGET" => {
                    self.page_retry_budget = value.parse().map_err(|_| invalid())?
                }
                "CHUNK_RETRY_BUDGET" => {
                    self.chunk_retry_budget = value.parse().map_err(|_| invalid())?
                }
                "RETRY_BASE_DELAY_MS" => {
                    self.retry_base_delay_ms = value.parse().map_err(|_| invalid())?
                }
                "RETRY_MAX_DELAY_MS" => {
                    self.retry_max_delay_ms = value.parse().map_err(|_| invalid())?
                }
                "STATUS_CHUNK_SIZE" => {
                    self.status_chunk_size = value.parse().map_err(|_| invalid())?
                }
                "REMOVAL_CHUNK_SIZE" => {
                    self.removal_chunk_size = value.parse().map_err(|_| invalid())?
                }
                "MAX_RESET_COUNTER" => {
                    self.max_reset_counter = value.parse().map_err(|_| invalid())?
                }
                "RESET_UNUSED_ON_MAX_RESET" => {
                    self.reset_unused_on_max_reset = value.parse().map_err(|_| invalid())?
                }
                "LISTING_TIMEOUT_SECS" => {
                    self.listing_timeout_secs = value.parse().map_err(|_| invalid())?
                }
                "CALL_TIMEOUT_SECS" => {
                    self.call_timeout_secs = value.parse().map_err(|_| invalid())?
                }
                _ => {
                    debug!(key = %key, "Ignoring unknown settings override");
                    continue;
                }
            }
            debug!(key = %key, value = %value, "Applied settings override");
        }
        Ok(self)
    }

    pub fn validate(self) -> Result<Self, SettingsError> {
        let non_zero = [
            ("page_size", self.page_size as u64),
            ("transformation_page_size", self.transformation_page_size as u64),
            ("page_retry_budget", self.page_retry_budget as u64),
            ("chunk_retry_budget", self.chunk_retry_budget as u64),
            ("status_chunk_size", self.status_chunk_size as u64),
            ("removal_chunk_size", self.removal_chunk_size as u64),
            ("max_reset_counter", self.max_reset_counter as u64),
            ("listing_timeout_secs", self.listing_timeout_secs),
            ("call_timeout_secs", self.call_timeout_secs),
        ];
        if let Some(&(name, _)) = non_zero.iter().find(|(_, value)| *value == 0) {
            return Err(SettingsError::Invalid {
                name,
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.retry_max_delay_ms < self.retry_base_delay_ms {
            return Err(SettingsError::Invalid {
                name: "retry_max_delay_ms",
                reason: format!(
                    "must not be below retry_base_delay_ms ({})",
                    self.retry_base_delay_ms
                ),
            });
        }
        Ok(self)
    }

    pub fn page_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.page_retry_budget,
            Duration::from_millis(self.retry_base_delay_ms),
            Duration::from_millis(self.retry_max_delay_ms),
        )
    }

    pub fn chunk_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.chunk_retry_budget,
            Duration::from_millis(self.retry_base_delay_ms),
            Duration::from_millis(self.retry_max_delay_ms),
        )
    }

    pub fn listing_timeout(&self) -> Duration {
        Duration::from_secs(self.listing_timeout_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_match_service_conventions() {
        let settings = SyncSettings::default();
        assert_eq!(settings.page_size, 10_000);
        assert_eq!(settings.page_retry_budget, 5);
        assert_eq!(settings.status_chunk_size, 5_000);
        assert_eq!(settings.max_reset_counter, 10);
        assert!(settings.reset_unused_on_max_reset);
    }

    #[tokio::test]
    async fn test_partial_file_keeps_remaining_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        tokio::fs::write(&path, r#"{ "page_size": 250, "max_reset_counter": 3 }"#)
            .await
            .unwrap();

        let settings = SyncSettings::from_file(&path).await.unwrap();
        assert_eq!(settings.page_size, 250);
        assert_eq!(settings.max_reset_counter, 3);
        assert_eq!(settings.status_chunk_size, 5_000);
    }

    #[tokio::test]
    async fn test_missing_file_reports_path() {
        let err = SyncSettings::from_file("/definitely/not/here.json")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }

    #[test]
    fn test_overrides_apply_and_ignore_foreign_vars() {
        let settings = SyncSettings::default()
            .with_overrides(vars(&[
                ("TSYNC_STATUS_CHUNK_SIZE", "100"),
                ("TSYNC_RESET_UNUSED_ON_MAX_RESET", "false"),
                ("HOME", "/root"),
            ]))
            .unwrap();

        assert_eq!(settings.status_chunk_size, 100);
        assert!(!settings.reset_unused_on_max_reset);
    }

    #[test]
    fn test_unparsable_override_is_rejected() {
        let err = SyncSettings::default()
            .with_overrides(vars(&[("TSYNC_PAGE_SIZE", "lots")]))
            .unwrap_err();
        assert!(matches!(err, SettingsError::InvalidOverride { .. }));
    }

    #[test]
    fn test_validate_rejects_zero_sizes() {
        let settings = SyncSettings {
            status_chunk_size: 0,
            ..Default::default()
        };
        let err = settings.validate().unwrap_err();
        assert!(matches!(
            err,
            SettingsError::Invalid {
                name: "status_chunk_size",
                ..
            }
        ));
    }

    #[test]
    fn test_retry_policies_follow_budgets() {
        let settings = SyncSettings {
            page_retry_budget: 7,
            chunk_retry_budget: 2,
            ..Default::default()
        };
        assert_eq!(settings.page_retry_policy().max_attempts, 7);
        assert_eq!(settings.chunk_retry_policy().max_attempts, 2);
    }
}
