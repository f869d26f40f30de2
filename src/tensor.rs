use crate::error::ConfigError;
use crate::frame::InterleavedImage;
use image::imageops::{self, FilterType};
use serde::{Deserialize, Serialize};

/// Colour channels per pixel in the model input.
pub const CHANNELS: usize = 3;

/// Spatial resolution of the model input.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct InputSize {
    pub width: u32,
    pub height: u32,
}

impl Default for InputSize {
    fn default() -> Self {
        Self {
            width: 224,
            height: 224,
        }
    }
}

impl InputSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Byte length of an input tensor at this size.
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * CHANNELS
    }
}

/// Affine mapping from pixel values to the model's quantized input domain:
/// `q = clamp(round(pixel / scale) + zero_point, 0, 255)`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct Quantization {
    pub scale: f32,
    pub zero_point: i32,
}

impl Default for Quantization {
    fn default() -> Self {
        Self {
            scale: 1.0,
            zero_point: 0,
        }
    }
}

impl Quantization {
    pub fn is_identity(&self) -> bool {
        self.scale == 1.0 && self.zero_point == 0
    }

    pub fn quantize(&self, value: u8) -> u8 {
        let q = (value as f32 / self.scale).round() as i32 + self.zero_point;
        q.clamp(0, 255) as u8
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(ConfigError::Scale(self.scale));
        }
        if !(0..=255).contains(&self.zero_point) {
            return Err(ConfigError::ZeroPoint(self.zero_point));
        }
        Ok(())
    }
}

/// Quantized HWC model input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputTensor {
    size: InputSize,
    data: Vec<u8>,
}

impl InputTensor {
    /// Returns `None` when `data` does not hold exactly `size.byte_len()` bytes.
    pub fn new(size: InputSize, data: Vec<u8>) -> Option<Self> {
        (data.len() == size.byte_len()).then_some(Self { size, data })
    }

    pub fn size(&self) -> InputSize {
        self.size
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

/// One quantized score per label class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTensor(Vec<u8>);

impl OutputTensor {
    pub fn new(scores: Vec<u8>) -> Self {
        Self(scores)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for OutputTensor {
    fn from(scores: Vec<u8>) -> Self {
        Self(scores)
    }
}

/// Resizes `image` to `size` (bilinear) and quantizes every channel value.
pub fn prepare(image: InterleavedImage, size: InputSize, quantization: Quantization) -> InputTensor {
    let rgb = image.into_rgb();
    let resized = if rgb.dimensions() == (size.width, size.height) {
        rgb
    } else {
        imageops::resize(&rgb, size.width, size.height, FilterType::Triangle)
    };
    let mut data = resized.into_raw();
    if !quantization.is_identity() {
        for value in data.iter_mut() {
            *value = quantization.quantize(*value);
        }
    }
    InputTensor { size, data }
}
