//! Resilience configuration with builder pattern
//!
//! Bundles the retry policy with request logging switches, with presets for
//! the common cases.

use super::retry::RetryConfig;
use std::time::Duration;

/// Resilience configuration for API requests
#[derive(Debug, Clone, Default)]
pub struct ResilienceConfig {
    pub retry: RetryConfig,
    pub monitoring: MonitoringConfig,
}

/// Request logging configuration
#[derive(Debug, Clone)]
pub struct MonitoringConfig {
    /// Tag every request with a correlation id in the logs
    pub correlation_ids: bool,
    /// Log request bodies at debug level
    pub request_logging: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            correlation_ids: true,
            request_logging: false,
        }
    }
}

impl ResilienceConfig {
    /// Create a new builder for ResilienceConfig
    pub fn builder() -> ResilienceConfigBuilder {
        ResilienceConfigBuilder::new()
    }

    /// Fewer, slower retries for shared or quota-constrained accounts
    pub fn conservative() -> Self {
        Self {
            retry: RetryConfig::conservative(),
            monitoring: MonitoringConfig::default(),
        }
    }

    /// Disable retries (for testing)
    pub fn disabled() -> Self {
        Self {
            retry: RetryConfig::disabled(),
            monitoring: MonitoringConfig {
                correlation_ids: false,
                request_logging: false,
            },
        }
    }

    /// Look up a preset by name
    pub fn preset(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "default" => Some(Self::default()),
            "conservative" => Some(Self::conservative()),
            "disabled" => Some(Self::disabled()),
            _ => None,
        }
    }
}

/// Builder for ResilienceConfig
#[derive(Debug)]
pub struct ResilienceConfigBuilder {
    config: ResilienceConfig,
}

impl ResilienceConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ResilienceConfig::default(),
        }
    }

    /// Start from a preset instead of the defaults
    pub fn from_config(config: ResilienceConfig) -> Self {
        Self { config }
    }

    /// Set max attempts (including the first)
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.retry.max_attempts = attempts;
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.config.retry.base_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.config.retry.max_delay = delay;
        self
    }

    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.config.retry.backoff_multiplier = multiplier;
        self
    }

    /// Enable/disable jitter on backoff delays
    pub fn jitter(mut self, enabled: bool) -> Self {
        self.config.retry.jitter = enabled;
        self
    }

    /// Enable/disable correlation IDs
    pub fn correlation_ids(mut self, enabled: bool) -> Self {
        self.config.monitoring.correlation_ids = enabled;
        self
    }

    /// Enable/disable request body logging
    pub fn request_logging(mut self, enabled: bool) -> Self {
        self.config.monitoring.request_logging = enabled;
        self
    }

    /// Build the final configuration
    pub fn build(self) -> ResilienceConfig {
        self.config
    }
}

impl Default for ResilienceConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ResilienceConfig::default();

        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay, Duration::from_millis(500));
        assert_eq!(config.retry.max_delay, Duration::from_millis(30_000));
        assert!(config.retry.jitter);
        assert!(config.monitoring.correlation_ids);
    }

    #[test]
    fn test_conservative_config() {
        let config = ResilienceConfig::conservative();
        assert_eq!(config.retry.max_attempts, 2);
        assert!(config.retry.base_delay > RetryConfig::default().base_delay);
    }

    #[test]
    fn test_disabled_config() {
        let config = ResilienceConfig::disabled();

        assert_eq!(config.retry.max_attempts, 1);
        assert!(!config.monitoring.correlation_ids);
        assert!(!config.monitoring.request_logging);
    }

    #[test]
    fn test_preset_lookup() {
        assert_eq!(ResilienceConfig::preset("Conservative").map(|c| c.retry.max_attempts), Some(2));
        assert!(ResilienceConfig::preset("aggressive").is_none());
    }

    #[test]
    fn test_builder_pattern() {
        let config = ResilienceConfig::builder()
            .max_attempts(5)
            .base_delay(Duration::from_millis(100))
            .backoff_multiplier(1.5)
            .jitter(false)
            .request_logging(true)
            .build();

        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay, Duration::from_millis(100));
        assert_eq!(config.retry.backoff_multiplier, 1.5);
        assert!(!config.retry.jitter);
        assert!(config.monitoring.request_logging);
        assert!(config.monitoring.correlation_ids);
    }
}
