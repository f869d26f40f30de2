//! Classifies live camera frames with a quantized model and reports the most
//! confident label.
//!
//! A frame flows through [`frame::convert`], [`tensor::prepare`],
//! [`model::InferenceEngine::infer`] and [`labels::score`]; the
//! [`pipeline::FramePipeline`] runs that chain on a single worker thread and
//! keeps only the latest camera frame waiting.

pub mod camera;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod error;
pub mod frame;
pub mod ipc;
pub mod labels;
pub mod model;
pub mod pipeline;
pub mod tensor;

pub use cli::{classify_file, current_status, execute, run_cli, Cli, Commands};
pub use error::{
    ClassifyError, ConfigError, Error, FrameError, InferenceError, LabelCountMismatchError,
    StartupError,
};
pub use frame::{convert, InterleavedImage, Plane, RawFrame};
pub use labels::{score, ClassificationResult, LabelScore};
pub use model::{InferenceEngine, Model, OnnxModel};
pub use pipeline::{Classifier, FramePipeline, FrameSender, FrameStatus, PipelineState, Submission};
pub use tensor::{prepare, InputSize, InputTensor, OutputTensor, Quantization};
