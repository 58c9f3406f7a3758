//! Verification Configuration
//!
//! Tolerances used when comparing stored values against recomputed ones,
//! and report verbosity. Loaded from a TOML file; every field has a default
//! so a partial file is enough.

use crate::error::{Result, VerifyError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete verification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    /// Absolute tolerance between stored and calculated stage rates
    pub rate_tolerance: f64,
    /// Absolute tolerance between stored and calculated unbiased pass@k
    pub pass_at_k_tolerance: f64,
    /// Allowed |sum - 1| for the per-attempt stage decomposition
    pub decomposition_tolerance: f64,
    /// Allowed gap between first_test_success_rate and task_success_rate
    pub task_success_tolerance: f64,
    /// Print comparison blocks for records without findings
    pub show_matching: bool,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            rate_tolerance: 1e-4,
            pass_at_k_tolerance: 1e-4,
            decomposition_tolerance: 1e-9,
            task_success_tolerance: 1e-9,
            show_matching: true,
        }
    }
}

impl VerifyConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| VerifyError::io(path, e))?;
        Self::from_toml(&raw).map_err(|message| VerifyError::Config {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Parse and validate configuration text
    pub fn from_toml(raw: &str) -> std::result::Result<Self, String> {
        let config: Self = toml::from_str(raw).map_err(|e| e.to_string())?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        let tolerances = [
            ("rate_tolerance", self.rate_tolerance),
            ("pass_at_k_tolerance", self.pass_at_k_tolerance),
            ("decomposition_tolerance", self.decomposition_tolerance),
            ("task_success_tolerance", self.task_success_tolerance),
        ];
        for (name, value) in tolerances {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{} must be a non-negative number, got {}", name, value));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = VerifyConfig::from_toml("rate_tolerance = 0.01\n").unwrap();
        assert_eq!(config.rate_tolerance, 0.01);
        assert_eq!(config.pass_at_k_tolerance, 1e-4);
        assert!(config.show_matching);
    }

    #[test]
    fn test_negative_tolerance_rejected() {
        let err = VerifyConfig::from_toml("pass_at_k_tolerance = -1.0\n").unwrap_err();
        assert!(err.contains("pass_at_k_tolerance"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = VerifyConfig::load(Path::new("/nonexistent/verify.toml")).unwrap_err();
        assert!(matches!(err, VerifyError::Io { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("verify.toml");
        std::fs::write(&path, "show_matching = false\ndecomposition_tolerance = 1e-6\n").unwrap();

        let config = VerifyConfig::load(&path).unwrap();
        assert!(!config.show_matching);
        assert_eq!(config.decomposition_tolerance, 1e-6);
    }
}
