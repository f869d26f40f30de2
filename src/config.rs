use crate::error::ConfigError;
use crate::labels::DEFAULT_THRESHOLD;
use crate::tensor::{InputSize, Quantization};
use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf};
use tracing::{debug, error, warn};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ModelSource {
    /// Local path, or a file name inside `repo`.
    pub file: String,
    /// Hugging Face repository to download `file` from when it is not local.
    pub repo: Option<String>,
}

impl Default for ModelSource {
    fn default() -> Self {
        Self {
            file: "mobilenet_v2_quant.onnx".to_string(),
            repo: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CameraSettings {
    pub index: u32,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            index: 0,
            width: 224,
            height: 224,
            fps: 30,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub model: ModelSource,
    pub labels: PathBuf,
    pub input_size: InputSize,
    pub quantization: Quantization,
    pub threshold: f32,
    pub camera: CameraSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: ModelSource::default(),
            labels: PathBuf::from("labels.txt"),
            input_size: InputSize::default(),
            quantization: Quantization::default(),
            threshold: DEFAULT_THRESHOLD,
            camera: CameraSettings::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_threshold(self.threshold)?;
        let InputSize { width, height } = self.input_size;
        if width == 0 || height == 0 {
            return Err(ConfigError::InputSize { width, height });
        }
        self.quantization.validate()
    }
}

pub fn validate_threshold(threshold: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(ConfigError::Threshold(threshold))
    }
}

pub fn config_path() -> PathBuf {
    env::var_os("LIVE_LABEL_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("live-label.json"))
}

pub fn load_config() -> Config {
    let path = config_path();
    match fs::read(&path) {
        Ok(data) => match serde_json::from_slice(&data) {
            Ok(cfg) => return cfg,
            Err(e) => warn!(path = %path.display(), "ignoring unreadable config: {e}"),
        },
        Err(_) => debug!(path = %path.display(), "no config file, using defaults"),
    }
    Config::default()
}

pub fn save_config(cfg: &Config) {
    let path = config_path();
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    match serde_json::to_vec_pretty(cfg) {
        Ok(data) => {
            if let Err(e) = fs::write(&path, data) {
                error!("failed to write config: {e}");
            }
        }
        Err(e) => error!("failed to encode config: {e}"),
    }
}
