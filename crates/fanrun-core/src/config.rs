//! Runner configuration.

use serde::Deserialize;

/// Runner configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Whether failed units are reported to the pipeline host.
    ///
    /// When disabled, failures are dropped after the run.
    pub write_errors: bool,
}

impl RunConfig {
    /// Builder method to toggle error reporting.
    pub fn with_write_errors(mut self, write_errors: bool) -> Self {
        self.write_errors = write_errors;
        self
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { write_errors: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_writes_errors() {
        assert!(RunConfig::default().write_errors);
        assert!(!RunConfig::default().with_write_errors(false).write_errors);
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: RunConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, RunConfig::default());

        let config: RunConfig = serde_json::from_str(r#"{"write_errors": false}"#).unwrap();
        assert!(!config.write_errors);
    }
}
