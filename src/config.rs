//! Configuration file handling.
//!
//! Settings come from `.survey-trends.toml` (or an explicit `--config` path)
//! and are then overridden by command-line flags.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Scale;

pub const DEFAULT_CONFIG_FILE: &str = ".survey-trends.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("scale bounds must be finite numbers, got {min} and {max}")]
    InvalidScale { min: f64, max: f64 },
    #[error("scale minimum {min} is greater than maximum {max}")]
    InvertedScale { min: f64, max: f64 },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub scale: ScaleConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub export: ExportConfig,
}

/// Where survey data originally comes from. Recognized but not used for
/// manual entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleConfig {
    #[serde(default = "default_scale_min")]
    pub min: f64,

    #[serde(default = "default_scale_max")]
    pub max: f64,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            min: default_scale_min(),
            max: default_scale_max(),
        }
    }
}

fn default_scale_min() -> f64 {
    1.0
}

fn default_scale_max() -> f64 {
    10.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".survey-data")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_export_file")]
    pub file_name: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            file_name: default_export_file(),
        }
    }
}

fn default_export_file() -> String {
    crate::csv_codec::DEFAULT_FILE_NAME.to_string()
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub data_dir: Option<PathBuf>,
    pub scale_min: Option<f64>,
    pub scale_max: Option<f64>,
    pub source_url: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Returns `Ok(None)` if the default file doesn't exist.
    pub fn load_default() -> Result<Option<Self>, ConfigError> {
        let path = Path::new(DEFAULT_CONFIG_FILE);
        if path.exists() {
            Ok(Some(Self::load(path)?))
        } else {
            Ok(None)
        }
    }

    pub fn merge(&mut self, overrides: &Overrides) {
        if let Some(ref dir) = overrides.data_dir {
            self.storage.data_dir = dir.clone();
        }
        if let Some(min) = overrides.scale_min {
            self.scale.min = min;
        }
        if let Some(max) = overrides.scale_max {
            self.scale.max = max;
        }
        if let Some(ref url) = overrides.source_url {
            self.source.url = Some(url.clone());
        }
    }

    pub fn scale(&self) -> Result<Scale, ConfigError> {
        let ScaleConfig { min, max } = self.scale;
        if !min.is_finite() || !max.is_finite() {
            return Err(ConfigError::InvalidScale { min, max });
        }
        if min > max {
            return Err(ConfigError::InvertedScale { min, max });
        }
        Ok(Scale { min, max })
    }

    pub fn default_toml() -> String {
        toml::to_string_pretty(&Config::default()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.source.url, None);
        assert_eq!(config.scale().unwrap(), Scale { min: 1.0, max: 10.0 });
        assert_eq!(config.storage.data_dir, PathBuf::from(".survey-data"));
        assert_eq!(config.export.file_name, "survey-entries.csv");
    }

    #[test]
    fn parses_partial_file() {
        let content = r#"
[source]
url = "https://example.org/surveys.json"

[scale]
max = 5.0
"#;
        let config: Config = toml::from_str(content).unwrap();
        assert_eq!(
            config.source.url.as_deref(),
            Some("https://example.org/surveys.json")
        );
        assert_eq!(config.scale.min, 1.0);
        assert_eq!(config.scale.max, 5.0);
        assert_eq!(config.storage, StorageConfig::default());
    }

    #[test]
    fn overrides_take_precedence() {
        let mut config = Config::default();
        config.merge(&Overrides {
            data_dir: Some(PathBuf::from("/tmp/surveys")),
            scale_min: Some(0.0),
            scale_max: None,
            source_url: None,
        });

        assert_eq!(config.storage.data_dir, PathBuf::from("/tmp/surveys"));
        assert_eq!(config.scale().unwrap(), Scale { min: 0.0, max: 10.0 });
    }

    #[test]
    fn inverted_scale_is_rejected() {
        let mut config = Config::default();
        config.scale.min = 7.0;
        config.scale.max = 3.0;
        assert!(matches!(
            config.scale(),
            Err(ConfigError::InvertedScale { .. })
        ));
    }

    #[test]
    fn non_finite_scale_is_rejected() {
        let mut config = Config::default();
        config.merge(&Overrides {
            scale_min: Some(f64::NAN),
            ..Overrides::default()
        });
        assert!(matches!(
            config.scale(),
            Err(ConfigError::InvalidScale { .. })
        ));

        let config: Config = toml::from_str("[scale]\nmax = inf\n").unwrap();
        assert!(matches!(
            config.scale(),
            Err(ConfigError::InvalidScale { .. })
        ));
    }

    #[test]
    fn load_reports_parse_errors_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[scale\nmin = ").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn default_toml_round_trips() {
        let text = Config::default_toml();
        assert!(text.contains("[scale]"));
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed, Config::default());
    }
}
