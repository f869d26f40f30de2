use crate::tensor::InputSize;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A single camera frame could not be turned into pixels.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Malformed(String),
    #[error("failed to decode frame: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("model not loaded: {0}")]
    NotLoaded(String),
    #[error("input tensor is {actual} bytes but the model expects {expected}")]
    InputSize { expected: usize, actual: usize },
    #[error(
        "model expects {}x{} input but {}x{} is configured",
        .declared.width, .declared.height, .configured.width, .configured.height
    )]
    InputShape {
        declared: InputSize,
        configured: InputSize,
    },
    #[error("model evaluation failed: {0}")]
    Run(String),
    #[error("unusable model output: {0}")]
    Output(String),
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("{labels} labels do not match {scores} output scores")]
pub struct LabelCountMismatchError {
    pub labels: usize,
    pub scores: usize,
}

/// Everything that can go wrong while classifying one frame.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error(transparent)]
    Labels(#[from] LabelCountMismatchError),
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("threshold {0} is outside [0, 1]")]
    Threshold(f32),
    #[error("input size {width}x{height} must be non-zero")]
    InputSize { width: u32, height: u32 },
    #[error("quantization scale {0} must be positive and finite")]
    Scale(f32),
    #[error("quantization zero point {0} is outside 0..=255")]
    ZeroPoint(i32),
}

/// Failures that keep the system from reaching a running state.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to read labels from {path}: {source}")]
    Labels { path: PathBuf, source: io::Error },
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error(transparent)]
    LabelCount(#[from] LabelCountMismatchError),
    #[error("camera unavailable: {0}")]
    Camera(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("daemon did not answer")]
    NoReply,
}
