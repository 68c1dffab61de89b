//! Pipeline configuration.
//!
//! All tunables consumed by the metrics and quality engines live here so
//! that a run is fully described by one TOML file plus the CLI paths.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Bounds for the implied-volatility root finder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Convergence tolerance on price error (model price vs. mid).
    pub price_tolerance: f64,
    /// Hard cap on iterations for both Newton and bisection phases.
    pub max_iterations: u32,
    /// Upper bound of the volatility search domain, annualized.
    /// Anything above is treated as a bad input price.
    pub max_vol: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            price_tolerance: 1e-6,
            max_iterations: 100,
            max_vol: 5.0,
        }
    }
}

/// Thresholds for the data-quality rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Volume / open-interest ratio above which a contract is flagged as
    /// unusually high turnover.
    pub volume_oi_outlier_threshold: f64,
    /// Maximum tolerated fraction of records with null implied volatility.
    pub iv_null_rate_threshold: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            volume_oi_outlier_threshold: 1.0,
            iv_null_rate_threshold: 0.15,
        }
    }
}

/// Full pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Annualized risk-free rate for Black-Scholes inversion.
    /// Source: 3-month T-bill (https://fred.stlouisfed.org/series/DTB3).
    pub risk_free_rate: f64,
    /// Annualized dividend yield; zero unless the underlying pays one.
    pub dividend_yield: f64,
    pub solver: SolverConfig,
    pub quality: QualityConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.05,
            dividend_yield: 0.0,
            solver: SolverConfig::default(),
            quality: QualityConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.risk_free_rate, 0.05);
        assert_eq!(cfg.dividend_yield, 0.0);
        assert_eq!(cfg.quality.volume_oi_outlier_threshold, 1.0);
        assert_eq!(cfg.quality.iv_null_rate_threshold, 0.15);
        assert_eq!(cfg.solver.max_iterations, 100);
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let cfg: PipelineConfig = toml::from_str(
            r#"
            risk_free_rate = 0.053

            [quality]
            iv_null_rate_threshold = 0.20
            "#,
        )
        .unwrap();

        assert_eq!(cfg.risk_free_rate, 0.053);
        assert_eq!(cfg.quality.iv_null_rate_threshold, 0.20);
        // Untouched sections keep their defaults
        assert_eq!(cfg.quality.volume_oi_outlier_threshold, 1.0);
        assert_eq!(cfg.solver.max_vol, 5.0);
    }
}
