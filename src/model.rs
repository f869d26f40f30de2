use crate::error::InferenceError;
use crate::tensor::{InputSize, InputTensor, OutputTensor, CHANNELS};
use candle_core::{DType, Device, Tensor};
use candle_onnx::onnx::{self, tensor_proto::DataType, tensor_shape_proto::dimension, type_proto};
use candle_onnx::{read_file, simple_eval};
use hf_hub::api::sync::Api;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A loaded classification model.
///
/// Implementations are the seam to whatever runtime holds the weights; the
/// rest of the pipeline only sees quantized tensors.
pub trait Model: Send + Sync {
    /// Spatial input resolution declared by the model, if it declares one.
    fn input_size(&self) -> Option<InputSize>;
    /// Number of output classes declared by the model, if it declares one.
    fn class_count(&self) -> Option<usize>;
    fn run(&self, input: &InputTensor) -> Result<OutputTensor, InferenceError>;
}

/// Runs a model against tensors of one fixed, validated size.
pub struct InferenceEngine {
    model: Box<dyn Model>,
    input_size: InputSize,
}

impl std::fmt::Debug for InferenceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceEngine")
            .field("input_size", &self.input_size)
            .field("class_count", &self.model.class_count())
            .finish()
    }
}

impl InferenceEngine {
    /// Fails when the model declares an input resolution other than `input_size`.
    pub fn new(model: Box<dyn Model>, input_size: InputSize) -> Result<Self, InferenceError> {
        if let Some(declared) = model.input_size() {
            if declared != input_size {
                return Err(InferenceError::InputShape {
                    declared,
                    configured: input_size,
                });
            }
        }
        Ok(Self { model, input_size })
    }

    pub fn input_size(&self) -> InputSize {
        self.input_size
    }

    pub fn class_count(&self) -> Option<usize> {
        self.model.class_count()
    }

    /// Blocks for the duration of one model evaluation.
    pub fn infer(&self, input: &InputTensor) -> Result<OutputTensor, InferenceError> {
        let expected = self.input_size.byte_len();
        if input.len() != expected {
            return Err(InferenceError::InputSize {
                expected,
                actual: input.len(),
            });
        }
        self.model.run(input)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Nhwc,
    Nchw,
}

/// An ONNX graph evaluated on the CPU with candle.
pub struct OnnxModel {
    model: onnx::ModelProto,
    input_name: String,
    output_name: String,
    layout: Layout,
    float_input: bool,
    input_size: Option<InputSize>,
    class_count: Option<usize>,
    device: Device,
}

fn tensor_dims(info: &onnx::ValueInfoProto) -> Option<(i32, Vec<Option<usize>>)> {
    let Some(type_proto::Value::TensorType(tensor)) = info.r#type.as_ref()?.value.as_ref() else {
        return None;
    };
    let dims = tensor
        .shape
        .as_ref()?
        .dim
        .iter()
        .map(|d| match &d.value {
            Some(dimension::Value::DimValue(v)) if *v > 0 => Some(*v as usize),
            _ => None,
        })
        .collect();
    Some((tensor.elem_type, dims))
}

impl OnnxModel {
    pub fn load(path: &Path) -> Result<Self, InferenceError> {
        let model = read_file(path)
            .map_err(|e| InferenceError::NotLoaded(format!("{}: {e}", path.display())))?;
        let model = Self::from_proto(model)?;
        info!(
            path = %path.display(),
            input_size = ?model.input_size,
            class_count = ?model.class_count,
            "model loaded"
        );
        Ok(model)
    }

    pub fn from_proto(model: onnx::ModelProto) -> Result<Self, InferenceError> {
        let graph = model
            .graph
            .as_ref()
            .ok_or_else(|| InferenceError::NotLoaded("model graph missing".into()))?;
        let input = graph
            .input
            .first()
            .ok_or_else(|| InferenceError::NotLoaded("model has no inputs".into()))?;
        let output = graph
            .output
            .first()
            .ok_or_else(|| InferenceError::NotLoaded("model has no outputs".into()))?;

        let (elem_type, dims) = tensor_dims(input).unwrap_or((DataType::Uint8 as i32, vec![]));
        let (layout, input_size) = match dims.as_slice() {
            [_, Some(h), Some(w), Some(c)] if *c == CHANNELS => {
                (Layout::Nhwc, Some(InputSize::new(*w as u32, *h as u32)))
            }
            [_, Some(c), Some(h), Some(w)] if *c == CHANNELS => {
                (Layout::Nchw, Some(InputSize::new(*w as u32, *h as u32)))
            }
            [_, _, _, Some(c)] if *c == CHANNELS => (Layout::Nhwc, None),
            [_, Some(c), _, _] if *c == CHANNELS => (Layout::Nchw, None),
            _ => (Layout::Nhwc, None),
        };
        let class_count = tensor_dims(output).and_then(|(_, dims)| dims.last().copied().flatten());
        debug!(?layout, elem_type, "model input");

        Ok(Self {
            input_name: input.name.clone(),
            output_name: output.name.clone(),
            layout,
            float_input: elem_type == DataType::Float as i32,
            input_size,
            class_count,
            device: Device::Cpu,
            model,
        })
    }

    fn input_tensor(&self, input: &InputTensor) -> candle_core::Result<Tensor> {
        let size = input.size();
        let tensor = Tensor::from_vec(
            input.as_slice().to_vec(),
            (1, size.height as usize, size.width as usize, CHANNELS),
            &self.device,
        )?;
        let tensor = match self.layout {
            Layout::Nhwc => tensor,
            Layout::Nchw => tensor.permute((0, 3, 1, 2))?.contiguous()?,
        };
        if self.float_input {
            tensor.to_dtype(DType::F32)
        } else {
            Ok(tensor)
        }
    }
}

impl Model for OnnxModel {
    fn input_size(&self) -> Option<InputSize> {
        self.input_size
    }

    fn class_count(&self) -> Option<usize> {
        self.class_count
    }

    fn run(&self, input: &InputTensor) -> Result<OutputTensor, InferenceError> {
        let tensor = self
            .input_tensor(input)
            .map_err(|e| InferenceError::Run(format!("failed to build input: {e}")))?;
        let mut inputs = HashMap::new();
        inputs.insert(self.input_name.clone(), tensor);
        let mut outputs =
            simple_eval(&self.model, inputs).map_err(|e| InferenceError::Run(e.to_string()))?;
        let output = outputs
            .remove(&self.output_name)
            .ok_or_else(|| InferenceError::Output(format!("{} missing", self.output_name)))?;
        let output = output
            .flatten_all()
            .map_err(|e| InferenceError::Output(e.to_string()))?;
        let scores = match output.dtype() {
            DType::U8 => output.to_vec1::<u8>(),
            _ => output.to_dtype(DType::F32).and_then(|t| t.to_vec1::<f32>()).map(|probs| {
                probs
                    .into_iter()
                    .map(|p| (p * 255.0).round().clamp(0.0, 255.0) as u8)
                    .collect()
            }),
        }
        .map_err(|e| InferenceError::Output(e.to_string()))?;
        Ok(OutputTensor::new(scores))
    }
}

/// Resolves `file` locally, falling back to a download from the Hugging Face
/// repository `repo`.
pub fn resolve_model_path(file: &str, repo: Option<&str>) -> Result<PathBuf, InferenceError> {
    let local = PathBuf::from(file);
    if local.exists() {
        return Ok(local);
    }
    let Some(repo) = repo else {
        return Err(InferenceError::NotLoaded(format!(
            "{file} does not exist and no model repository is configured"
        )));
    };
    debug!(repo, file, "downloading model");
    Api::new()
        .and_then(|api| api.model(repo.to_string()).get(file))
        .map_err(|e| InferenceError::NotLoaded(format!("failed to download {file} from {repo}: {e}")))
}
