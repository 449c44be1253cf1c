//! Engine configuration.

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};

/// Configuration for an [`Engine`](crate::Engine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of uncommitted row operations during a save.
    pub batch_size: usize,
    /// Whether adapters that support it enforce foreign keys.
    pub foreign_keys: bool,
    /// Rows between progress reports, used when the progress port has no
    /// preference of its own.
    pub report_granularity: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            foreign_keys: true,
            report_granularity: 100,
        }
    }
}

impl EngineConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the batch size.
    #[must_use]
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Sets foreign key enforcement.
    #[must_use]
    pub fn with_foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    /// Sets the default report granularity.
    #[must_use]
    pub fn with_report_granularity(mut self, rows: u64) -> Self {
        self.report_granularity = rows;
        self
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] for a zero batch size or a zero
    /// report granularity.
    pub fn validate(&self) -> EngineResult<()> {
        if self.batch_size == 0 {
            return Err(EngineError::InvalidConfig(
                "batch_size must be at least 1".into(),
            ));
        }
        if self.report_granularity == 0 {
            return Err(EngineError::InvalidConfig(
                "report_granularity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let config = EngineConfig::new().with_batch_size(0);
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidConfig(_))
        ));
        assert!(EngineConfig::new()
            .with_report_granularity(0)
            .validate()
            .is_err());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"batch_size": 2}"#).unwrap();
        assert_eq!(config.batch_size, 2);
        assert!(config.foreign_keys);
        assert_eq!(config.report_granularity, 100);

        let text = serde_json::to_string(&config.clone().with_foreign_keys(false)).unwrap();
        let back: EngineConfig = serde_json::from_str(&text).unwrap();
        assert!(!back.foreign_keys);
    }
}
