pub mod config;
pub mod yaml_include;

/// Common utilities shared across the telematics risk workspace
///
/// This crate provides the pieces that both the scoring and the training
/// executables rely on:
///
/// - YAML configuration loading with `!include` merging
/// - Configuration sections for the integrated scorer and the offline trainer
pub use config::{Config, ConfigError};
