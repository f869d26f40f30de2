use candle_onnx::onnx::{
    tensor_proto::DataType,
    tensor_shape_proto::{dimension, Dimension},
    type_proto, GraphProto, ModelProto, TensorShapeProto, TypeProto, ValueInfoProto,
};
use live_label::model::{resolve_model_path, InferenceEngine, Model, OnnxModel};
use live_label::tensor::{InputSize, InputTensor, OutputTensor};
use live_label::InferenceError;
use std::path::Path;

struct Declared(Option<InputSize>);

impl Model for Declared {
    fn input_size(&self) -> Option<InputSize> {
        self.0
    }

    fn class_count(&self) -> Option<usize> {
        Some(2)
    }

    fn run(&self, _input: &InputTensor) -> Result<OutputTensor, InferenceError> {
        Ok(OutputTensor::new(vec![7, 9]))
    }
}

fn value_info(name: &str, elem_type: DataType, dims: &[i64]) -> ValueInfoProto {
    let dim = dims
        .iter()
        .map(|&d| Dimension {
            value: Some(dimension::Value::DimValue(d)),
            ..Default::default()
        })
        .collect();
    ValueInfoProto {
        name: name.to_string(),
        r#type: Some(TypeProto {
            value: Some(type_proto::Value::TensorType(type_proto::Tensor {
                elem_type: elem_type as i32,
                shape: Some(TensorShapeProto { dim }),
            })),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn model(input: ValueInfoProto, output: ValueInfoProto) -> ModelProto {
    ModelProto {
        graph: Some(GraphProto {
            input: vec![input],
            output: vec![output],
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[test]
fn engine_runs_matching_input() {
    let size = InputSize::new(2, 2);
    let engine = InferenceEngine::new(Box::new(Declared(Some(size))), size).unwrap();
    let input = InputTensor::new(size, vec![0; size.byte_len()]).unwrap();
    assert_eq!(engine.infer(&input).unwrap().as_slice(), &[7, 9]);
    assert_eq!(engine.class_count(), Some(2));
}

#[test]
fn engine_rejects_declared_size_mismatch() {
    let err = InferenceEngine::new(
        Box::new(Declared(Some(InputSize::new(224, 224)))),
        InputSize::new(128, 128),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        InferenceError::InputShape { declared, configured }
            if declared == InputSize::new(224, 224) && configured == InputSize::new(128, 128)
    ));
}

#[test]
fn engine_rejects_same_area_with_other_shape() {
    let err = InferenceEngine::new(
        Box::new(Declared(Some(InputSize::new(224, 224)))),
        InputSize::new(112, 448),
    )
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "model expects 224x224 input but 112x448 is configured"
    );
}

#[test]
fn engine_rejects_wrong_tensor_length() {
    let engine = InferenceEngine::new(Box::new(Declared(None)), InputSize::new(4, 4)).unwrap();
    let input = InputTensor::new(InputSize::new(2, 2), vec![0; 12]).unwrap();
    assert!(matches!(
        engine.infer(&input),
        Err(InferenceError::InputSize {
            expected: 48,
            actual: 12
        })
    ));
}

#[test]
fn onnx_nhwc_shapes_are_read_from_graph() {
    let proto = model(
        value_info("input", DataType::Uint8, &[1, 224, 224, 3]),
        value_info("output", DataType::Uint8, &[1, 1001]),
    );
    let model = OnnxModel::from_proto(proto).unwrap();
    assert_eq!(model.input_size(), Some(InputSize::new(224, 224)));
    assert_eq!(model.class_count(), Some(1001));
}

#[test]
fn onnx_nchw_shapes_are_read_from_graph() {
    let proto = model(
        value_info("x", DataType::Float, &[1, 3, 32, 48]),
        value_info("y", DataType::Float, &[1, 10]),
    );
    let model = OnnxModel::from_proto(proto).unwrap();
    assert_eq!(model.input_size(), Some(InputSize::new(48, 32)));
    assert_eq!(model.class_count(), Some(10));
}

#[test]
fn onnx_without_graph_is_not_loaded() {
    assert!(matches!(
        OnnxModel::from_proto(ModelProto::default()),
        Err(InferenceError::NotLoaded(_))
    ));
}

#[test]
fn missing_model_file_is_not_loaded() {
    assert!(matches!(
        OnnxModel::load(Path::new("/nonexistent/model.onnx")),
        Err(InferenceError::NotLoaded(_))
    ));
}

#[test]
fn local_model_path_is_preferred() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let path = file.path().to_str().unwrap();
    assert_eq!(
        resolve_model_path(path, Some("unused/repo")).unwrap(),
        file.path()
    );
}

#[test]
fn missing_model_without_repo_fails() {
    assert!(matches!(
        resolve_model_path("/nonexistent/model.onnx", None),
        Err(InferenceError::NotLoaded(_))
    ));
}
