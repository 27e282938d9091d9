use once_cell::sync::Lazy;
use serde::Deserialize;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};
use thiserror::Error;
use yaml_rust2::YamlEmitter;

use crate::yaml_include::load_yaml_with_includes;

/// Weather condition to road-risk points, as used when engineering the
/// `weather_risk` training feature.
pub static DEFAULT_WEATHER_RISK: Lazy<BTreeMap<String, f64>> = Lazy::new(|| {
    [
        ("Clear", 0.0),
        ("Fair", 0.0),
        ("Partly Cloudy", 1.0),
        ("Mostly Cloudy", 1.0),
        ("Overcast", 2.0),
        ("Light Rain", 3.0),
        ("Rain", 4.0),
        ("Heavy Rain", 5.0),
        ("Light Snow", 4.0),
        ("Snow", 5.0),
        ("Heavy Snow", 6.0),
        ("Fog", 3.0),
        ("Thunderstorm", 5.0),
        ("Light Drizzle", 2.0),
        ("Drizzle", 3.0),
    ]
    .into_iter()
    .map(|(condition, risk)| (condition.to_string(), risk))
    .collect()
});

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid YAML in {}: {source}", .path.display())]
    Scan {
        path: PathBuf,
        source: yaml_rust2::ScanError,
    },

    #[error("config file {} contains no YAML document", .0.display())]
    EmptyDocument(PathBuf),

    #[error("include directive without a path in {}", .0.display())]
    EmptyInclude(PathBuf),

    #[error("include cycle detected at {}", .0.display())]
    IncludeCycle(PathBuf),

    #[error("failed to re-emit merged YAML: {0}")]
    Emit(#[from] yaml_rust2::EmitError),

    #[error("config does not match the expected shape: {0}")]
    Deserialize(#[from] serde_yml::Error),
}

#[derive(Debug, Deserialize, Clone)]
pub struct CommonConfig {
    pub project_name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            project_name: "telematics-risk".to_string(),
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Thresholds used when blending the heuristic score with the rule-based
/// traditional score.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct BlendSettings {
    pub min_samples: usize,
    pub ml_confidence_threshold: f64,
    pub max_ml_weight: f64,
    pub sufficient_data_points: usize,
    pub window_days: u32,
}

impl Default for BlendSettings {
    fn default() -> Self {
        Self {
            min_samples: 50,
            ml_confidence_threshold: 0.7,
            max_ml_weight: 0.8,
            sufficient_data_points: 100,
            window_days: 180,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ScoringConfig {
    pub blend: BlendSettings,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn clip(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PreprocessingSettings {
    pub weather_risk: BTreeMap<String, f64>,
    pub default_weather_risk: f64,
    pub visibility_fill: f64,
    pub distance_bounds: Bounds,
    pub temperature_bounds: Bounds,
    pub wind_speed_bounds: Bounds,
    pub visibility_bounds: Bounds,
}

impl Default for PreprocessingSettings {
    fn default() -> Self {
        Self {
            weather_risk: DEFAULT_WEATHER_RISK.clone(),
            default_weather_risk: 2.0,
            visibility_fill: 10.0,
            distance_bounds: Bounds::new(0.0, 50.0),
            temperature_bounds: Bounds::new(-50.0, 150.0),
            wind_speed_bounds: Bounds::new(0.0, 100.0),
            visibility_bounds: Bounds::new(0.0, 10.0),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RandomForestSettings {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features tried per split; `None` means the square root of the total.
    pub max_features: Option<usize>,
    pub balanced_class_weight: bool,
}

impl Default for RandomForestSettings {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 10,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            balanced_class_weight: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct GradientBoostingSettings {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for GradientBoostingSettings {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 6,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrainerConfig {
    pub dataset_path: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_test_ratio")]
    pub test_ratio: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub random_forest: RandomForestSettings,
    #[serde(default)]
    pub gradient_boosting: GradientBoostingSettings,
    #[serde(default)]
    pub preprocessing: PreprocessingSettings,
}

impl TrainerConfig {
    pub fn new(dataset_path: impl Into<String>) -> Self {
        Self {
            dataset_path: dataset_path.into(),
            output_dir: default_output_dir(),
            test_ratio: default_test_ratio(),
            seed: default_seed(),
            random_forest: RandomForestSettings::default(),
            gradient_boosting: GradientBoostingSettings::default(),
            preprocessing: PreprocessingSettings::default(),
        }
    }
}

fn default_output_dir() -> String {
    "ml_models".to_string()
}

fn default_test_ratio() -> f64 {
    0.2
}

fn default_seed() -> u64 {
    42
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub common: CommonConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    pub trainer: TrainerConfig,
}

impl Config {
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let yaml = load_yaml_with_includes(config_path.as_ref())?;

        let mut contents = String::new();
        {
            let mut emitter = YamlEmitter::new(&mut contents);
            emitter.dump(&yaml)?;
        }

        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let config = serde_yml::from_str(contents)?;
        Ok(config)
    }
}
