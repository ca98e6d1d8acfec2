//! Job configuration loaded from TOML.
//!
//! Config keys (TOML): `[training]` holds the numeric training settings handed to the
//! trainer, `[logging]` the verbosity of the per-job log sink. Missing keys fall back
//! to defaults; values are range-checked by [`TrainingSettings::validated`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize, de::Error as SerdeDeError};
use thiserror::Error;

use crate::config_defaults::{
    MAX_BATCH_SIZE, MIN_BATCH_SIZE, MIN_EPOCHS, MIN_PATCH_SIZE, MIN_SAMPLES_PER_CLASS,
    default_batch_size, default_epochs, default_log_filter, default_max_samples_per_class,
    default_patch_size,
};

/// Aggregate configuration for one training job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    #[serde(default)]
    pub training: TrainingSettings,
    #[serde(default)]
    pub logging: LogSettings,
}

/// Raw training settings as read from disk.
///
/// Config keys: `batch_size`, `epochs`, `max_samples_per_class`, `patch_height`,
/// `patch_width`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingSettings {
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    /// Maximum number of training epochs.
    #[serde(default = "default_epochs")]
    pub epochs: u32,
    /// Maximum number of patches sampled per label.
    #[serde(default = "default_max_samples_per_class")]
    pub max_samples_per_class: u32,
    #[serde(default = "default_patch_size")]
    pub patch_height: u32,
    #[serde(default = "default_patch_size")]
    pub patch_width: u32,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            epochs: default_epochs(),
            max_samples_per_class: default_max_samples_per_class(),
            patch_height: default_patch_size(),
            patch_width: default_patch_size(),
        }
    }
}

impl TrainingSettings {
    /// Check every setting against its allowed range and freeze the result.
    pub fn validated(self) -> Result<InvocationConfig, ConfigError> {
        check_range("batch_size", self.batch_size, MIN_BATCH_SIZE, Some(MAX_BATCH_SIZE))?;
        check_range("epochs", self.epochs, MIN_EPOCHS, None)?;
        check_range(
            "max_samples_per_class",
            self.max_samples_per_class,
            MIN_SAMPLES_PER_CLASS,
            None,
        )?;
        check_range("patch_height", self.patch_height, MIN_PATCH_SIZE, None)?;
        check_range("patch_width", self.patch_width, MIN_PATCH_SIZE, None)?;
        Ok(InvocationConfig { settings: self })
    }
}

fn check_range(key: &'static str, value: u32, min: u32, max: Option<u32>) -> Result<(), ConfigError> {
    let above_max = max.is_some_and(|max| value > max);
    if value < min || above_max {
        return Err(ConfigError::OutOfRange {
            key,
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// Training settings that passed validation. Immutable for the lifetime of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvocationConfig {
    settings: TrainingSettings,
}

impl InvocationConfig {
    pub fn batch_size(&self) -> u32 {
        self.settings.batch_size
    }

    pub fn epochs(&self) -> u32 {
        self.settings.epochs
    }

    pub fn max_samples_per_class(&self) -> u32 {
        self.settings.max_samples_per_class
    }

    pub fn patch_height(&self) -> u32 {
        self.settings.patch_height
    }

    pub fn patch_width(&self) -> u32 {
        self.settings.patch_width
    }
}

/// Verbosity of the per-job log sink.
///
/// Config keys: `filter`, `redirect_level`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSettings {
    /// `EnvFilter` directive applied to the job's subscriber.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Level at which redirected trainer output is recorded.
    #[serde(default)]
    pub redirect_level: RedirectLevel,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            redirect_level: RedirectLevel::default(),
        }
    }
}

/// Level used for lines captured from the trainer's output streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedirectLevel {
    Trace,
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Setting `{key}` = {value} is out of range (min {min}{})", format_max(.max))]
    OutOfRange {
        key: &'static str,
        value: u32,
        min: u32,
        max: Option<u32>,
    },
}

fn format_max(max: &Option<u32>) -> String {
    max.map(|max| format!(", max {max}")).unwrap_or_default()
}

/// Load a job configuration from a TOML file.
pub fn load_from_path(path: &Path) -> Result<JobConfig, ConfigError> {
    let bytes = std::fs::read(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let text = String::from_utf8(bytes).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source: SerdeDeError::custom(source),
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source,
    })
}

/// Load from `path` when given, otherwise return defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<JobConfig, ConfigError> {
    match path {
        Some(path) => load_from_path(path),
        None => Ok(JobConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_documented_values() {
        let config = TrainingSettings::default().validated().unwrap();
        assert_eq!(config.batch_size(), 16);
        assert_eq!(config.epochs(), 15);
        assert_eq!(config.max_samples_per_class(), 2000);
        assert_eq!(config.patch_height(), 256);
        assert_eq!(config.patch_width(), 256);
    }

    #[test]
    fn batch_size_above_max_is_rejected() {
        let settings = TrainingSettings {
            batch_size: 65,
            ..TrainingSettings::default()
        };
        let err = settings.validated().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::OutOfRange {
                key: "batch_size",
                value: 65,
                ..
            }
        ));
        assert!(err.to_string().contains("max 64"));
    }

    #[test]
    fn lower_bounds_are_enforced() {
        let cases = [
            ("epochs", TrainingSettings { epochs: 0, ..Default::default() }),
            (
                "max_samples_per_class",
                TrainingSettings { max_samples_per_class: 99, ..Default::default() },
            ),
            ("patch_height", TrainingSettings { patch_height: 31, ..Default::default() }),
            ("patch_width", TrainingSettings { patch_width: 16, ..Default::default() }),
            ("batch_size", TrainingSettings { batch_size: 0, ..Default::default() }),
        ];
        for (expected_key, settings) in cases {
            match settings.validated() {
                Err(ConfigError::OutOfRange { key, .. }) => assert_eq!(key, expected_key),
                other => panic!("expected range error for {expected_key}, got {other:?}"),
            }
        }
    }

    #[test]
    fn boundary_values_are_accepted() {
        let settings = TrainingSettings {
            batch_size: 64,
            epochs: 1,
            max_samples_per_class: 100,
            patch_height: 32,
            patch_width: 32,
        };
        assert!(settings.validated().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("job.toml");
        std::fs::write(
            &path,
            "[training]\nepochs = 3\npatch_width = 64\n\n[logging]\nredirect_level = \"info\"\n",
        )
        .unwrap();
        let config = load_from_path(&path).unwrap();
        assert_eq!(config.training.epochs, 3);
        assert_eq!(config.training.patch_width, 64);
        assert_eq!(config.training.patch_height, 256);
        assert_eq!(config.training.batch_size, 16);
        assert_eq!(config.logging.redirect_level, RedirectLevel::Info);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn malformed_toml_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[training\nepochs = ").unwrap();
        let err = load_from_path(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseToml { .. }));
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn missing_path_uses_defaults() {
        assert_eq!(load_or_default(None).unwrap(), JobConfig::default());
    }
}
