//! Configuration system for BiasLens.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI args.
//! Configuration is loaded from `~/.config/biaslens/config.toml` and/or
//! `.biaslens/config.toml` in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::types::{
    BiasType, MAX_ITERATIONS, MAX_RECOMMENDATIONS, MIN_ITERATIONS, RecommendationMode,
};

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BiasLensConfig {
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub baseline: BaselineDefaults,
    #[serde(default)]
    pub drift: DriftConfig,
    #[serde(default)]
    pub recommendations: RecommendationConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Defaults applied when a command does not name them explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Bias types probed when none are given.
    #[serde(default = "default_heuristic_types")]
    pub heuristic_types: Vec<BiasType>,
    /// Trials per bias type (10-100).
    #[serde(default = "default_iteration_count")]
    pub iteration_count: u32,
    /// Fixed RNG seed for reproducible runs. Random when unset.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_heuristic_types() -> Vec<BiasType> {
    BiasType::ALL.to_vec()
}
fn default_iteration_count() -> u32 {
    50
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            heuristic_types: default_heuristic_types(),
            iteration_count: default_iteration_count(),
            seed: None,
        }
    }
}

/// Baseline used to classify evaluations before a named one exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineDefaults {
    #[serde(default = "default_baseline_name")]
    pub name: String,
    #[serde(default = "default_mean")]
    pub mean: f64,
    #[serde(default = "default_std_dev")]
    pub std_dev: f64,
    /// Explicit green threshold instead of `mean + 0.5σ`.
    #[serde(default)]
    pub green_zone_max: Option<f64>,
    /// Explicit yellow threshold instead of `mean + 1.5σ`.
    #[serde(default)]
    pub yellow_zone_max: Option<f64>,
}

fn default_baseline_name() -> String {
    "default".to_string()
}
fn default_mean() -> f64 {
    30.0
}
fn default_std_dev() -> f64 {
    15.0
}

impl Default for BaselineDefaults {
    fn default() -> Self {
        Self {
            name: default_baseline_name(),
            mean: default_mean(),
            std_dev: default_std_dev(),
            green_zone_max: None,
            yellow_zone_max: None,
        }
    }
}

/// Drift and trend sensitivity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftConfig {
    /// |z| above which a score raises a drift alert.
    #[serde(default = "default_z_threshold")]
    pub z_threshold: f64,
    /// |slope| below which a trend counts as stable.
    #[serde(default = "default_stable_slope")]
    pub stable_slope: f64,
}

fn default_z_threshold() -> f64 {
    2.0
}
fn default_stable_slope() -> f64 {
    0.5
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            z_threshold: default_z_threshold(),
            stable_slope: default_stable_slope(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationConfig {
    #[serde(default)]
    pub mode: RecommendationMode,
    #[serde(default = "default_max_recommendations")]
    pub max_recommendations: usize,
}

fn default_max_recommendations() -> usize {
    MAX_RECOMMENDATIONS
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            mode: RecommendationMode::default(),
            max_recommendations: default_max_recommendations(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Where records and logs are written. Falls back to the platform data dir.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl StorageConfig {
    /// Resolve the data directory: explicit setting, then the platform data
    /// dir, then `.biaslens/data` under the workspace.
    pub fn resolve_data_dir(&self, workspace: &Path) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        if let Some(dirs) = project_dirs() {
            return dirs.data_dir().to_path_buf();
        }
        workspace.join(".biaslens").join("data")
    }
}

impl BiasLensConfig {
    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| -> Result<(), ConfigError> { Err(ConfigError::Invalid { message }) };

        if self.evaluation.heuristic_types.is_empty() {
            return invalid("evaluation.heuristic_types must name at least one bias type".into());
        }
        if !(MIN_ITERATIONS..=MAX_ITERATIONS).contains(&self.evaluation.iteration_count) {
            return invalid(format!(
                "evaluation.iteration_count {} outside {MIN_ITERATIONS}..={MAX_ITERATIONS}",
                self.evaluation.iteration_count
            ));
        }
        if !self.baseline.mean.is_finite() || !self.baseline.std_dev.is_finite() {
            return invalid("baseline.mean and baseline.std_dev must be finite".into());
        }
        if self.baseline.std_dev < 0.0 {
            return invalid(format!(
                "baseline.std_dev {} must not be negative",
                self.baseline.std_dev
            ));
        }
        if let (Some(green), Some(yellow)) =
            (self.baseline.green_zone_max, self.baseline.yellow_zone_max)
        {
            if green > yellow {
                return invalid(format!(
                    "baseline.green_zone_max {green} exceeds yellow_zone_max {yellow}"
                ));
            }
        }
        if self.drift.z_threshold.is_nan() || self.drift.z_threshold <= 0.0 {
            return invalid(format!(
                "drift.z_threshold {} must be positive",
                self.drift.z_threshold
            ));
        }
        if self.drift.stable_slope.is_nan() || self.drift.stable_slope < 0.0 {
            return invalid(format!(
                "drift.stable_slope {} must not be negative",
                self.drift.stable_slope
            ));
        }
        if self.recommendations.max_recommendations == 0
            || self.recommendations.max_recommendations > MAX_RECOMMENDATIONS
        {
            return invalid(format!(
                "recommendations.max_recommendations {} outside 1..={MAX_RECOMMENDATIONS}",
                self.recommendations.max_recommendations
            ));
        }
        Ok(())
    }

    /// Render as TOML, e.g. for `config init`.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid {
            message: e.to_string(),
        })
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("dev", "biaslens", "biaslens")
}

/// Path of the workspace-level config file.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".biaslens").join("config.toml")
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `BIASLENS_`)
/// 3. Workspace-local config (`.biaslens/config.toml`)
/// 4. User config (`~/.config/biaslens/config.toml`)
/// 5. Built-in defaults
///
/// The merged result is validated before it is returned.
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&BiasLensConfig>,
) -> Result<BiasLensConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(BiasLensConfig::default()));

    if let Some(dirs) = project_dirs() {
        let user_config = dirs.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // BIASLENS_EVALUATION__ITERATION_COUNT, BIASLENS_DRIFT__Z_THRESHOLD, ...
    figment = figment.merge(Env::prefixed("BIASLENS_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    let config: BiasLensConfig = figment.extract().map_err(|e| ConfigError::Load {
        message: e.to_string(),
    })?;
    config.validate()?;
    Ok(config)
}

/// Check whether any BiasLens config file exists (user-level or workspace-level).
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if let Some(dirs) = project_dirs() {
        if dirs.config_dir().join("config.toml").exists() {
            return true;
        }
    }
    workspace.is_some_and(|ws| workspace_config_path(ws).exists())
}

/// Write the default configuration to `.biaslens/config.toml` under `workspace`.
///
/// Refuses to overwrite an existing file unless `force` is set.
pub fn write_default_config(workspace: &Path, force: bool) -> Result<PathBuf, ConfigError> {
    let path = workspace_config_path(workspace);
    if path.exists() && !force {
        return Err(ConfigError::Invalid {
            message: format!("{} already exists", path.display()),
        });
    }
    let body = BiasLensConfig::default().to_toml()?;
    let write = || -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, body)
    };
    write().map_err(|e| ConfigError::Load {
        message: format!("failed to write {}: {e}", path.display()),
    })?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BiasLensConfig::default();
        assert_eq!(config.evaluation.iteration_count, 50);
        assert_eq!(config.evaluation.heuristic_types.len(), 5);
        assert_eq!(config.baseline.mean, 30.0);
        assert_eq!(config.baseline.std_dev, 15.0);
        assert_eq!(config.drift.z_threshold, 2.0);
        assert_eq!(config.recommendations.mode, RecommendationMode::Both);
        assert_eq!(config.recommendations.max_recommendations, 7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: BiasLensConfig = toml::from_str(
            r#"
[evaluation]
iteration_count = 20

[baseline]
green_zone_max = 40.0
"#,
        )
        .unwrap();
        assert_eq!(config.evaluation.iteration_count, 20);
        assert_eq!(config.evaluation.heuristic_types, BiasType::ALL.to_vec());
        assert_eq!(config.baseline.green_zone_max, Some(40.0));
        assert_eq!(config.baseline.mean, 30.0);
        assert_eq!(config.drift.stable_slope, 0.5);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = BiasLensConfig::default();
        config.evaluation.iteration_count = 5;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));

        let mut config = BiasLensConfig::default();
        config.baseline.green_zone_max = Some(60.0);
        config.baseline.yellow_zone_max = Some(50.0);
        assert!(config.validate().is_err());

        let mut config = BiasLensConfig::default();
        config.recommendations.max_recommendations = 8;
        assert!(config.validate().is_err());

        let mut config = BiasLensConfig::default();
        config.drift.z_threshold = 0.0;
        assert!(config.validate().is_err());

        let mut config = BiasLensConfig::default();
        config.evaluation.heuristic_types.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_config_with_overrides() {
        let mut overrides = BiasLensConfig::default();
        overrides.evaluation.iteration_count = 80;
        overrides.recommendations.mode = RecommendationMode::Technical;
        let config = load_config(None, Some(&overrides)).unwrap();
        assert_eq!(config.evaluation.iteration_count, 80);
        assert_eq!(config.recommendations.mode, RecommendationMode::Technical);
    }

    #[test]
    fn test_load_config_from_workspace() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".biaslens")).unwrap();
        std::fs::write(
            workspace_config_path(dir.path()),
            r#"
[evaluation]
heuristic_types = ["anchoring", "sunk_cost"]

[drift]
z_threshold = 3.0

[recommendations]
mode = "simplified"
"#,
        )
        .unwrap();

        assert!(config_exists(Some(dir.path())));
        let config = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(
            config.evaluation.heuristic_types,
            vec![BiasType::Anchoring, BiasType::SunkCost]
        );
        assert_eq!(config.drift.z_threshold, 3.0);
        assert_eq!(config.recommendations.mode, RecommendationMode::Simplified);
    }

    #[test]
    fn test_load_config_invalid_workspace_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".biaslens")).unwrap();
        std::fs::write(
            workspace_config_path(dir.path()),
            "[evaluation]\niteration_count = 500\n",
        )
        .unwrap();
        assert!(matches!(
            load_config(Some(dir.path()), None),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_write_default_config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_default_config(dir.path(), false).unwrap();
        let body = std::fs::read_to_string(&path).unwrap();
        let parsed: BiasLensConfig = toml::from_str(&body).unwrap();
        assert_eq!(parsed, BiasLensConfig::default());

        assert!(write_default_config(dir.path(), false).is_err());
        assert!(write_default_config(dir.path(), true).is_ok());
    }

    #[test]
    fn test_resolve_data_dir_explicit() {
        let storage = StorageConfig {
            data_dir: Some(PathBuf::from("/tmp/biaslens-data")),
        };
        assert_eq!(
            storage.resolve_data_dir(Path::new(".")),
            PathBuf::from("/tmp/biaslens-data")
        );
    }
}
