//! Runtime configuration shared by the daemon and the CLI.
//!
//! Layering: built-in defaults, then an optional TOML file named by
//! `FACEID_CONFIG`, then `FACEID_*` environment variables.

use crate::decider::{DecideError, Thresholds};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to encode default configuration: {source}")]
    Defaults {
        #[source]
        source: toml::ser::Error,
    },
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
    #[error(transparent)]
    Threshold(#[from] DecideError),
    #[error("capture region must have a non-zero width and height")]
    EmptyCaptureRegion,
}

/// Where frames come from and how the probe is cut out of them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CaptureSettings {
    /// Image file an external camera helper keeps overwriting with the newest frame.
    pub frame_path: PathBuf,
    pub region_x: u32,
    pub region_y: u32,
    pub region_width: u32,
    pub region_height: u32,
    /// A frame is rejected as dark when more than this share of pixels is near black.
    pub dark_ratio: f32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            frame_path: default_data_dir().join("camera").join("frame.jpg"),
            region_x: 200,
            region_y: 120,
            region_width: 250,
            region_height: 250,
            dark_ratio: 0.95,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Siamese network ONNX artifact.
    pub model_path: PathBuf,
    /// Directory of enrolled reference images.
    pub gallery_dir: PathBuf,
    /// Location the capture layer writes the probe to, and verification reads it from.
    pub probe_path: PathBuf,
    pub thresholds: Thresholds,
    /// ONNX Runtime intra-op threads.
    pub scorer_threads: usize,
    pub capture: CaptureSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self::with_data_dir(&default_data_dir())
    }
}

impl Config {
    /// Defaults rooted at `data_dir`.
    pub fn with_data_dir(data_dir: &Path) -> Self {
        Self {
            model_path: data_dir.join("siamese_network.onnx"),
            gallery_dir: data_dir.join("verification_images"),
            probe_path: data_dir.join("input_image").join("input_image.jpg"),
            thresholds: Thresholds::default(),
            scorer_threads: 2,
            capture: CaptureSettings {
                frame_path: data_dir.join("camera").join("frame.jpg"),
                ..CaptureSettings::default()
            },
        }
    }

    /// Load from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_sources(|key| std::env::var(key).ok())
    }

    /// Load using `env` for variable lookup.
    pub fn from_sources(env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let data_dir = data_dir_from(&env);
        let mut config = match env("FACEID_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path), &data_dir)?,
            None => Self::with_data_dir(&data_dir),
        };

        if let Some(v) = env("FACEID_MODEL_PATH") {
            config.model_path = PathBuf::from(v);
        }
        if let Some(v) = env("FACEID_GALLERY_DIR") {
            config.gallery_dir = PathBuf::from(v);
        }
        if let Some(v) = env("FACEID_PROBE_PATH") {
            config.probe_path = PathBuf::from(v);
        }
        if let Some(v) = env("FACEID_FRAME_PATH") {
            config.capture.frame_path = PathBuf::from(v);
        }
        if let Some(v) = parse_env(&env, "FACEID_DETECTION_THRESHOLD")? {
            config.thresholds.detection = v;
        }
        if let Some(v) = parse_env(&env, "FACEID_VERIFICATION_THRESHOLD")? {
            config.thresholds.verification = v;
        }
        if let Some(v) = parse_env(&env, "FACEID_SCORER_THREADS")? {
            config.scorer_threads = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file; missing fields fall back to defaults under `data_dir`.
    pub fn from_file(path: &Path, data_dir: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let parse_err = |source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        };

        // Start from data-dir defaults, then let the file override field by field.
        let mut merged = toml::Value::try_from(Self::with_data_dir(data_dir))
            .map_err(|source| ConfigError::Defaults { source })?;
        let overrides: toml::Value = toml::from_str(&text).map_err(parse_err)?;
        merge_toml(&mut merged, overrides);
        merged.try_into().map_err(parse_err)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.thresholds.validate()?;
        if self.capture.region_width == 0 || self.capture.region_height == 0 {
            return Err(ConfigError::EmptyCaptureRegion);
        }
        if !(0.0..=1.0).contains(&self.capture.dark_ratio) {
            return Err(ConfigError::InvalidValue {
                key: "capture.dark_ratio",
                value: self.capture.dark_ratio.to_string(),
            });
        }
        if self.scorer_threads == 0 {
            return Err(ConfigError::InvalidValue {
                key: "scorer_threads",
                value: "0".into(),
            });
        }
        Ok(())
    }
}

fn merge_toml(base: &mut toml::Value, overrides: toml::Value) {
    match (base, overrides) {
        (toml::Value::Table(base), toml::Value::Table(overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(&key) {
                    Some(existing) => merge_toml(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, value) => *base = value,
    }
}

fn parse_env<T: std::str::FromStr>(
    env: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match env(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value: raw.clone() }),
    }
}

fn data_dir_from(env: &impl Fn(&str) -> Option<String>) -> PathBuf {
    env("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let home = env("HOME").unwrap_or_else(|| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("faceid")
}

/// `$XDG_DATA_HOME/faceid`, falling back to `$HOME/.local/share/faceid`.
pub fn default_data_dir() -> PathBuf {
    data_dir_from(&|key: &str| std::env::var(key).ok())
}
