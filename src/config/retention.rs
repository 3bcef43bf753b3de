//! Retention configuration types.

use serde::Deserialize;

use super::ConfigError;

/// Default number of versions kept per document.
pub const DEFAULT_MAX_VERSIONS: usize = 50;
/// Default key namespace for snapshot and index records.
pub const DEFAULT_NAMESPACE: &str = "versions";

/// Version retention configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Key prefix for all records written by the engine.
    pub namespace: String,
    /// Maximum number of snapshots kept per document.
    pub max_versions: usize,
    /// Chance (0.0..=1.0) that creating a snapshot also runs a full prune
    /// of the document's history. 0 leaves pruning entirely to the caller.
    pub prune_probability: f64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            max_versions: DEFAULT_MAX_VERSIONS,
            prune_probability: 0.0,
        }
    }
}

impl RetentionConfig {
    pub fn with_max_versions(mut self, max_versions: usize) -> Self {
        self.max_versions = max_versions;
        self
    }

    pub fn with_prune_probability(mut self, probability: f64) -> Self {
        self.prune_probability = probability;
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_versions == 0 {
            return Err(ConfigError::Invalid(
                "retention.max_versions must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.prune_probability) {
            return Err(ConfigError::Invalid(format!(
                "retention.prune_probability must be within 0..=1, got {}",
                self.prune_probability
            )));
        }
        let namespace = self.namespace.trim_matches('/');
        if namespace.is_empty() || namespace.split('/').any(|s| s.is_empty() || s.starts_with('.')) {
            return Err(ConfigError::Invalid(format!(
                "retention.namespace {:?} is not a valid key prefix",
                self.namespace
            )));
        }
        Ok(())
    }
}
