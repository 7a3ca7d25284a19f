//! Run settings: management tag key, default retention, region selection.
//!
//! Settings come from the environment (the same variable names the
//! scheduled function has always used), from a JSON file, and finally from
//! CLI overrides. They are plain values passed into the run; nothing here is
//! global.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Env var naming the management tag key
pub const ENV_TAG_KEY: &str = "custom_tag";
/// Env var holding the fallback retention in days
pub const ENV_DEFAULT_RETENTION: &str = "default_retention_days";
/// Env var with a comma-separated region list replacing discovery
pub const ENV_REGIONS: &str = "custom_aws_regions";
/// Env var bounding the number of regions processed at once
pub const ENV_MAX_PARALLEL_REGIONS: &str = "max_parallel_regions";

pub const DEFAULT_TAG_KEY: &str = "scheduler:ebs-auto-snapshot-creation";
pub const DEFAULT_RETENTION_DAYS: u32 = 7;
pub const DEFAULT_MAX_PARALLEL_REGIONS: usize = 4;

/// Settings for one invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Tag key that configures volumes and records snapshot state
    pub management_tag_key: String,
    /// Retention used when a volume tag has no valid `retention`
    pub default_retention_days: u32,
    /// Regions to process; `None` means ask the provider
    pub region_override: Option<Vec<String>>,
    /// Upper bound on concurrently processed regions
    pub max_parallel_regions: usize,
    /// Log mutations instead of performing them
    pub dry_run: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            management_tag_key: DEFAULT_TAG_KEY.to_string(),
            default_retention_days: DEFAULT_RETENTION_DAYS,
            region_override: None,
            max_parallel_regions: DEFAULT_MAX_PARALLEL_REGIONS,
            dry_run: false,
        }
    }
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup.
    ///
    /// Unset variables keep their defaults; set but unparseable numeric
    /// variables are an error rather than a silent fallback.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(tag_key) = lookup(ENV_TAG_KEY) {
            settings.management_tag_key = tag_key.trim().to_string();
        }

        if let Some(days) = lookup(ENV_DEFAULT_RETENTION) {
            settings.default_retention_days = days
                .trim()
                .parse()
                .with_context(|| format!("{ENV_DEFAULT_RETENTION}='{days}' is not a number of days"))?;
        }

        if let Some(regions) = lookup(ENV_REGIONS) {
            settings.region_override = Some(parse_region_list(&regions));
        }

        if let Some(workers) = lookup(ENV_MAX_PARALLEL_REGIONS) {
            settings.max_parallel_regions = workers
                .trim()
                .parse()
                .with_context(|| format!("{ENV_MAX_PARALLEL_REGIONS}='{workers}' is not a number"))?;
        }

        Ok(settings)
    }

    /// Save settings to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize settings to JSON")?;

        fs::write(&path, json)
            .with_context(|| format!("Failed to write settings to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Load settings from a JSON file; missing fields take their defaults
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings from {:?}", path.as_ref()))?;

        let settings: Self =
            serde_json::from_str(&content).context("Failed to parse settings JSON")?;

        Ok(settings)
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        if self.management_tag_key.trim().is_empty() {
            anyhow::bail!("Management tag key must not be empty");
        }

        if self.max_parallel_regions == 0 {
            anyhow::bail!("max_parallel_regions must be at least 1");
        }

        if let Some(regions) = &self.region_override {
            if regions.is_empty() {
                anyhow::bail!("Region override is set but lists no regions");
            }
            if let Some(bad) = regions
                .iter()
                .find(|r| r.trim().is_empty() || r.chars().any(char::is_whitespace))
            {
                anyhow::bail!("Invalid region name '{}' in region override", bad);
            }
        }

        Ok(())
    }
}

/// Split a comma-separated region list into trimmed, lower-cased names.
pub fn parse_region_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|region| region.trim().to_lowercase())
        .filter(|region| !region.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_env_is_empty() {
        let settings = Settings::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.management_tag_key, "scheduler:ebs-auto-snapshot-creation");
        assert_eq!(settings.default_retention_days, 7);
        assert!(settings.region_override.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("custom_tag", "backup:policy"),
            ("default_retention_days", "14"),
            ("custom_aws_regions", " US-East-1, eu-west-1 ,,"),
        ]))
        .unwrap();

        assert_eq!(settings.management_tag_key, "backup:policy");
        assert_eq!(settings.default_retention_days, 14);
        assert_eq!(
            settings.region_override,
            Some(vec!["us-east-1".to_string(), "eu-west-1".to_string()])
        );
    }

    #[test]
    fn test_bad_retention_env_is_an_error() {
        let result = Settings::from_lookup(lookup_from(&[("default_retention_days", "week")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_empty_tag_key() {
        let settings = Settings {
            management_tag_key: "  ".to_string(),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let settings = Settings {
            max_parallel_regions: 0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_region_override() {
        let settings = Settings {
            region_override: Some(vec![]),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());

        let settings = Settings {
            region_override: Some(vec!["us east".to_string()]),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let settings = Settings {
            default_retention_days: 30,
            region_override: Some(vec!["ap-south-1".to_string()]),
            ..Settings::default()
        };
        settings.save_to_file(&path).unwrap();

        let loaded = Settings::load_from_file(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "default_retention_days": 3 }"#).unwrap();

        let loaded = Settings::load_from_file(&path).unwrap();
        assert_eq!(loaded.default_retention_days, 3);
        assert_eq!(loaded.management_tag_key, DEFAULT_TAG_KEY);
    }

    #[test]
    fn test_parse_region_list() {
        assert_eq!(parse_region_list(""), Vec::<String>::new());
        assert_eq!(parse_region_list("a, B ,"), vec!["a", "b"]);
    }
}
