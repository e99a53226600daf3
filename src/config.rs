// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Engine configuration
//!
//! Tunables live in [`EngineConfig`], which can be read from a TOML file
//! and overridden from the environment. Fixed limits are plain constants.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Retries after the unperturbed attempt
pub const DEFAULT_MAX_PERTURBATION_ATTEMPTS: usize = 5;

/// Perturbation magnitude relative to the bounding-box diagonal
pub const DEFAULT_PERTURBATION_SCALE: f64 = 1e-6;

/// Ray directions tried per classification seed
pub const DEFAULT_RAY_ATTEMPTS: usize = 8;

/// Edge flips allowed while recovering constraints in one triangle
pub const DEFAULT_MAX_FLIP_ITERATIONS: usize = 10_000;

/// Distance, relative to the working bounding-box diagonal, under which
/// vertices restored after a perturbed run are treated as one
pub const WELD_TOLERANCE_SCALE: f64 = 1e-10;

/// Largest triangle count accepted from a mesh file
pub const MAX_FILE_TRIANGLES: usize = 50_000_000;

/// Largest vertex count accepted from a mesh file header
pub const MAX_FILE_VERTICES: usize = 3 * MAX_FILE_TRIANGLES;

/// Barycentric slack for triple-point containment. Values inside the band
/// are treated as undecidable and trigger a perturbation retry.
pub const TRIPLE_POINT_TOLERANCE: f64 = 1e-10;

/// Default configuration file looked up by [`EngineConfig::load`]
pub const CONFIG_FILE: &str = "polycork.toml";

/// Settings for the optional local remeshing pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RemeshConfig {
    /// Edges shorter than this fraction of the mean edge length are collapsed
    pub min_edge_ratio: f64,
    /// Edges longer than this multiple of the mean edge length are split
    pub max_edge_ratio: f64,
    /// Edges whose adjacent minimum angle is below this are flipped if it helps
    pub min_angle_degrees: f64,
    /// Sweeps over the mesh
    pub max_iterations: usize,
}

impl Default for RemeshConfig {
    fn default() -> Self {
        Self {
            min_edge_ratio: 0.05,
            max_edge_ratio: 4.0,
            min_angle_degrees: 15.0,
            max_iterations: 4,
        }
    }
}

/// Boolean engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_perturbation_attempts: usize,
    pub perturbation_scale: f64,
    pub ray_attempts: usize,
    pub max_flip_iterations: usize,
    /// Reject operands that are not closed or that self-intersect
    pub check_solidity: bool,
    /// Evaluate candidate pairs on the rayon pool
    pub parallel: bool,
    pub remesh: Option<RemeshConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_perturbation_attempts: DEFAULT_MAX_PERTURBATION_ATTEMPTS,
            perturbation_scale: DEFAULT_PERTURBATION_SCALE,
            ray_attempts: DEFAULT_RAY_ATTEMPTS,
            max_flip_iterations: DEFAULT_MAX_FLIP_ITERATIONS,
            check_solidity: true,
            parallel: true,
            remesh: None,
        }
    }
}

impl EngineConfig {
    /// Serial configuration, mainly for reproducing issues
    pub fn serial() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }

    /// Enable the remeshing pass with default settings
    pub fn with_remesh(mut self) -> Self {
        self.remesh = Some(RemeshConfig::default());
        self
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: EngineConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn load() -> Result<Self> {
        let mut config = if PathBuf::from(CONFIG_FILE).exists() {
            Self::from_file(CONFIG_FILE)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `POLYCORK_*` environment variables on top of the current values
    pub fn apply_env_overrides(&mut self) {
        if let Ok(attempts) = std::env::var("POLYCORK_MAX_ATTEMPTS") {
            if let Ok(attempts) = attempts.parse() {
                self.max_perturbation_attempts = attempts;
            }
        }

        if let Ok(parallel) = std::env::var("POLYCORK_PARALLEL") {
            self.parallel = parallel.parse().unwrap_or(self.parallel);
        }

        if let Ok(check) = std::env::var("POLYCORK_CHECK_SOLIDITY") {
            self.check_solidity = check.parse().unwrap_or(self.check_solidity);
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {:?}", path.as_ref()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_perturbation_attempts, 5);
        assert!(config.check_solidity);
        assert!(config.remesh.is_none());
        assert!(!EngineConfig::serial().parallel);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: EngineConfig = toml::from_str("ray_attempts = 3\nparallel = false\n").unwrap();
        assert_eq!(config.ray_attempts, 3);
        assert!(!config.parallel);
        assert_eq!(config.max_flip_iterations, DEFAULT_MAX_FLIP_ITERATIONS);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");

        let config = EngineConfig {
            max_perturbation_attempts: 2,
            ..EngineConfig::default()
        }
        .with_remesh();
        config.save(&path).unwrap();

        let loaded = EngineConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(EngineConfig::from_file("/nonexistent/polycork.toml").is_err());
    }
}
