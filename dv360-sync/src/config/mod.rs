//! Sync configuration
//!
//! Loaded from a TOML file:
//!
//! ```toml
//! [api]
//! base_url = "https://displayvideo.googleapis.com"
//! version = "v3"
//! token_env = "DV360_ACCESS_TOKEN"
//! log_request_bodies = true
//!
//! [retry]
//! preset = "conservative"
//! max_attempts = 4
//!
//! [[resources]]
//! kind = "line_item"
//! sheet = "Line Items"
//! filter = "entityStatus=ENTITY_STATUS_ACTIVE"
//!
//! [resources.translators]
//! "budget.maxAmount" = "micros"
//! ```
//!
//! Every resource gets its kind's default translators; the `translators`
//! table adds more or turns one off with `"none"`.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::api::{ResilienceConfig, RetryConfig};
use crate::api::resilience::ResilienceConfigBuilder;
use crate::codec::{TranslatorKind, TranslatorSet};
use crate::model::ResourceKind;

pub const DEFAULT_BASE_URL: &str = "https://displayvideo.googleapis.com";
/// Must be a version that still serves the line item
/// `:bulkListLineItemAssignedTargetingOptions` and
/// `:bulkEditLineItemAssignedTargetingOptions` methods targeting relies on
pub const DEFAULT_VERSION: &str = "v3";
pub const DEFAULT_TOKEN_ENV: &str = "DV360_ACCESS_TOKEN";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Translator name that disables a default translator
const NO_TRANSLATOR: &str = "none";

/// Configuration problems; all of them stop a pass before any row is touched
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    UnknownKind(String),
    UnknownTranslator { sheet: String, field: String, name: String },
    DuplicateSheet(String),
    InvalidFilter { sheet: String, filter: String },
    UnknownPreset(String),
    UnknownSheet(String),
    MissingColumn { sheet: String, column: String },
    ReadOnlyKind { sheet: String, kind: ResourceKind },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::UnknownKind(kind) => write!(
                f,
                "unknown resource kind '{}' (expected one of: {})",
                kind,
                ResourceKind::all()
                    .iter()
                    .map(|k| k.name())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            ConfigError::UnknownTranslator { sheet, field, name } => write!(
                f,
                "sheet '{}': unknown translator '{}' for field '{}' (expected date, micros or none)",
                sheet, name, field
            ),
            ConfigError::DuplicateSheet(sheet) => {
                write!(f, "sheet '{}' is configured more than once", sheet)
            }
            ConfigError::InvalidFilter { sheet, filter } => write!(
                f,
                "sheet '{}': filter '{}' is not of the form key=value[ AND key=value]*",
                sheet, filter
            ),
            ConfigError::UnknownPreset(preset) => write!(
                f,
                "unknown retry preset '{}' (expected default, conservative or disabled)",
                preset
            ),
            ConfigError::UnknownSheet(sheet) => {
                write!(f, "sheet '{}' is not configured", sheet)
            }
            ConfigError::MissingColumn { sheet, column } => {
                write!(f, "sheet '{}' has no '{}' column", sheet, column)
            }
            ConfigError::ReadOnlyKind { sheet, kind } => {
                write!(f, "sheet '{}' holds {} entities, which are read-only", sheet, kind)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub api: ApiSettings,
    pub retry: RetrySettings,
    pub resources: Vec<ResourceConfig>,
}

/// `[api]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub version: String,
    /// Environment variable holding the bearer token
    pub token_env: String,
    pub timeout_secs: u64,
    /// Maximum pages fetched per list call
    pub page_limit: Option<usize>,
    /// Tag request logs with a correlation id (on unless the retry preset is `disabled`)
    pub correlation_ids: Option<bool>,
    /// Log request bodies at debug level
    pub log_request_bodies: Option<bool>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            version: DEFAULT_VERSION.to_string(),
            token_env: DEFAULT_TOKEN_ENV.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            page_limit: None,
            correlation_ids: None,
            log_request_bodies: None,
        }
    }
}

impl ApiSettings {
    /// Versioned API root, e.g. `https://displayvideo.googleapis.com/v3`
    pub fn root_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.version.trim_matches('/')
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// `[retry]`: an optional preset, then individual overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub preset: Option<String>,
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub backoff_multiplier: Option<f64>,
    pub jitter: Option<bool>,
}

impl RetrySettings {
    pub fn resilience(&self) -> Result<ResilienceConfig, ConfigError> {
        let base = match &self.preset {
            Some(name) => ResilienceConfig::preset(name)
                .ok_or_else(|| ConfigError::UnknownPreset(name.clone()))?,
            None => ResilienceConfig::default(),
        };

        let mut builder = ResilienceConfigBuilder::from_config(base);
        if let Some(attempts) = self.max_attempts {
            builder = builder.max_attempts(attempts);
        }
        if let Some(ms) = self.base_delay_ms {
            builder = builder.base_delay(Duration::from_millis(ms));
        }
        if let Some(ms) = self.max_delay_ms {
            builder = builder.max_delay(Duration::from_millis(ms));
        }
        if let Some(multiplier) = self.backoff_multiplier {
            builder = builder.backoff_multiplier(multiplier);
        }
        if let Some(jitter) = self.jitter {
            builder = builder.jitter(jitter);
        }
        Ok(builder.build())
    }

    /// Effective retry parameters
    pub fn retry_config(&self) -> Result<RetryConfig, ConfigError> {
        Ok(self.resilience()?.retry)
    }
}

/// `[[resources]]`: one sheet bound to one resource kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub kind: String,
    pub sheet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// Field path -> translator name (`date`, `micros`, `none`)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub translators: BTreeMap<String, String>,
}

impl ResourceConfig {
    pub fn new(kind: ResourceKind, sheet: impl Into<String>) -> Self {
        Self {
            kind: kind.name().to_string(),
            sheet: sheet.into(),
            filter: None,
            translators: BTreeMap::new(),
        }
    }

    pub fn resource_kind(&self) -> Result<ResourceKind, ConfigError> {
        ResourceKind::parse(&self.kind).ok_or_else(|| ConfigError::UnknownKind(self.kind.clone()))
    }

    /// Kind defaults overlaid with the configured translators
    pub fn translator_set(&self) -> Result<TranslatorSet, ConfigError> {
        let kind = self.resource_kind()?;

        let mut set = TranslatorSet::new();
        for (field_path, translator) in kind.default_translators() {
            set.insert(*field_path, translator.build());
        }

        for (field_path, name) in &self.translators {
            if name.trim().eq_ignore_ascii_case(NO_TRANSLATOR) {
                set.remove(field_path);
                continue;
            }
            let translator =
                TranslatorKind::parse(name).ok_or_else(|| ConfigError::UnknownTranslator {
                    sheet: self.sheet.clone(),
                    field: field_path.clone(),
                    name: name.clone(),
                })?;
            set.insert(field_path.clone(), translator.build());
        }

        Ok(set)
    }

    fn validate_filter(&self) -> Result<(), ConfigError> {
        let Some(filter) = &self.filter else {
            return Ok(());
        };
        let trimmed = filter.trim();
        if trimmed.is_empty() || filter_pattern().is_some_and(|re| re.is_match(trimmed)) {
            Ok(())
        } else {
            Err(ConfigError::InvalidFilter {
                sheet: self.sheet.clone(),
                filter: filter.clone(),
            })
        }
    }
}

/// `key=value[ AND key=value]*`, values bare or double-quoted
fn filter_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            let clause = r#"[A-Za-z][A-Za-z0-9_.]*\s*=\s*(?:"[^"]*"|[^\s"]+)"#;
            Regex::new(&format!(r"^{clause}(?:\s+AND\s+{clause})*$")).ok()
        })
        .as_ref()
}

impl SyncConfig {
    /// `<config dir>/dv360-sync/config.toml`
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::config_dir().context("Could not determine the user config directory")?;
        Ok(dir.join("dv360-sync").join("config.toml"))
    }

    /// Read, parse and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        log::debug!(
            "Loaded {} resource(s) from {}",
            config.resources.len(),
            path.display()
        );
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: SyncConfig = toml::from_str(text).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Check kinds, translators, filters and sheet names
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retry.resilience()?;

        let mut sheets = HashSet::new();
        for resource in &self.resources {
            resource.resource_kind()?;
            resource.translator_set()?;
            resource.validate_filter()?;
            if !sheets.insert(resource.sheet.trim().to_lowercase()) {
                return Err(ConfigError::DuplicateSheet(resource.sheet.clone()));
            }
        }
        Ok(())
    }

    /// The resource bound to `sheet` (case-insensitive)
    pub fn resource_for_sheet(&self, sheet: &str) -> Result<&ResourceConfig, ConfigError> {
        self.resources
            .iter()
            .find(|resource| resource.sheet.trim().eq_ignore_ascii_case(sheet.trim()))
            .ok_or_else(|| ConfigError::UnknownSheet(sheet.to_string()))
    }

    /// Retry policy from `[retry]` plus the request logging switches of `[api]`
    pub fn resilience(&self) -> Result<ResilienceConfig, ConfigError> {
        let mut builder = ResilienceConfigBuilder::from_config(self.retry.resilience()?);
        if let Some(enabled) = self.api.correlation_ids {
            builder = builder.correlation_ids(enabled);
        }
        if let Some(enabled) = self.api.log_request_bodies {
            builder = builder.request_logging(enabled);
        }
        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[api]
version = "v4"
page_limit = 10

[retry]
preset = "conservative"
max_attempts = 4

[[resources]]
kind = "campaign"
sheet = "Campaigns"

[[resources]]
kind = "line-item"
sheet = "Line Items"
filter = "entityStatus=ENTITY_STATUS_ACTIVE AND lineItemType=${type}"

[resources.translators]
"budget.maxAmount" = "none"
"partnerRevenueModel.markupAmount" = "micros"
"#;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::from_toml("").unwrap();
        assert_eq!(config.api.root_url(), "https://displayvideo.googleapis.com/v3");
        assert_eq!(config.api.token_env, "DV360_ACCESS_TOKEN");
        assert_eq!(config.api.timeout(), Duration::from_secs(60));
        assert!(config.resources.is_empty());

        let retry = config.retry.retry_config().unwrap();
        assert_eq!(retry, RetryConfig::default());
    }

    #[test]
    fn test_parse_sample() {
        let config = SyncConfig::from_toml(SAMPLE).unwrap();

        assert_eq!(config.api.root_url(), "https://displayvideo.googleapis.com/v4");
        assert_eq!(config.api.page_limit, Some(10));

        let retry = config.retry.retry_config().unwrap();
        assert_eq!(retry.max_attempts, 4);
        assert_eq!(retry.base_delay, RetryConfig::conservative().base_delay);

        let line_items = config.resource_for_sheet("line items").unwrap();
        assert_eq!(line_items.resource_kind().unwrap(), ResourceKind::LineItem);

        let translators = line_items.translator_set().unwrap();
        assert!(translators.get("budget.maxAmount").is_none());
        assert!(translators.get("partnerRevenueModel.markupAmount").is_some());
        assert!(translators.get("flight.dateRange.startDate").is_some());
    }

    #[test]
    fn test_request_logging_switches() {
        let config = SyncConfig::from_toml("").unwrap();
        let monitoring = config.resilience().unwrap().monitoring;
        assert!(monitoring.correlation_ids);
        assert!(!monitoring.request_logging);

        let config = SyncConfig::from_toml(
            "[api]\ncorrelation_ids = false\nlog_request_bodies = true\n\n[retry]\nmax_attempts = 5\n",
        )
        .unwrap();
        let resilience = config.resilience().unwrap();
        assert!(!resilience.monitoring.correlation_ids);
        assert!(resilience.monitoring.request_logging);
        assert_eq!(resilience.retry.max_attempts, 5);
    }

    #[test]
    fn test_unknown_kind() {
        let error = SyncConfig::from_toml("[[resources]]\nkind = \"budget\"\nsheet = \"B\"\n")
            .unwrap_err();
        assert_eq!(
            error.downcast_ref::<ConfigError>(),
            Some(&ConfigError::UnknownKind("budget".to_string()))
        );
    }

    #[test]
    fn test_unknown_translator() {
        let text = "[[resources]]\nkind = \"campaign\"\nsheet = \"C\"\n[resources.translators]\nx = \"currency\"\n";
        let error = SyncConfig::from_toml(text).unwrap_err();
        assert!(matches!(
            error.downcast_ref::<ConfigError>(),
            Some(ConfigError::UnknownTranslator { .. })
        ));
    }

    #[test]
    fn test_duplicate_sheet() {
        let text = "[[resources]]\nkind = \"campaign\"\nsheet = \"C\"\n[[resources]]\nkind = \"creative\"\nsheet = \"c\"\n";
        let error = SyncConfig::from_toml(text).unwrap_err();
        assert_eq!(
            error.downcast_ref::<ConfigError>(),
            Some(&ConfigError::DuplicateSheet("c".to_string()))
        );
    }

    #[test]
    fn test_filter_grammar() {
        let mut resource = ResourceConfig::new(ResourceKind::Campaign, "C");
        for good in [
            "entityStatus=ENTITY_STATUS_ACTIVE",
            "entityStatus = ENTITY_STATUS_ACTIVE AND campaignId=${id}",
            "displayName=\"Spring Sale\"",
        ] {
            resource.filter = Some(good.to_string());
            assert!(resource.validate_filter().is_ok(), "rejected {}", good);
        }
        for bad in ["entityStatus", "a=b OR c=d", "=x", "a=b AND"] {
            resource.filter = Some(bad.to_string());
            assert!(resource.validate_filter().is_err(), "accepted {}", bad);
        }
    }

    #[test]
    fn test_unknown_preset() {
        let error = SyncConfig::from_toml("[retry]\npreset = \"turbo\"\n").unwrap_err();
        assert_eq!(
            error.downcast_ref::<ConfigError>(),
            Some(&ConfigError::UnknownPreset("turbo".to_string()))
        );
    }

    #[test]
    fn test_unknown_sheet() {
        let config = SyncConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(
            config.resource_for_sheet("Creatives").unwrap_err(),
            ConfigError::UnknownSheet("Creatives".to_string())
        );
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = SyncConfig::load(&path).unwrap();
        assert_eq!(config.resources.len(), 2);
        assert!(SyncConfig::load(&dir.path().join("missing.toml")).is_err());
    }
}
