use crate::error::FrameError;
use image::RgbImage;
use tracing::trace;

/// One plane of a planar camera frame.
///
/// `row_stride` is the byte distance between the starts of two rows and
/// `pixel_stride` the byte distance between two neighbouring samples in a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plane {
    pub data: Vec<u8>,
    pub row_stride: usize,
    pub pixel_stride: usize,
}

impl Plane {
    pub fn new(data: Vec<u8>, row_stride: usize, pixel_stride: usize) -> Self {
        Self {
            data,
            row_stride,
            pixel_stride,
        }
    }

    /// A plane whose samples are tightly packed.
    pub fn packed(data: Vec<u8>, row_stride: usize) -> Self {
        Self::new(data, row_stride, 1)
    }

    fn sample(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.row_stride + x * self.pixel_stride]
    }

    fn covers(&self, width: usize, height: usize) -> bool {
        if width == 0 || height == 0 {
            return true;
        }
        if self.pixel_stride == 0 {
            return false;
        }
        let Some(row_span) = (width - 1).checked_mul(self.pixel_stride) else {
            return false;
        };
        if self.row_stride <= row_span {
            return false;
        }
        (height - 1)
            .checked_mul(self.row_stride)
            .and_then(|offset| offset.checked_add(row_span))
            .is_some_and(|last| last < self.data.len())
    }
}

/// A YUV 4:2:0 sample as delivered by the camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub y: Plane,
    pub u: Plane,
    pub v: Plane,
}

fn chroma_dims(width: u32, height: u32) -> (usize, usize) {
    (width.div_ceil(2) as usize, height.div_ceil(2) as usize)
}

fn check_dims(format: &str, width: u32, height: u32) -> Result<(), FrameError> {
    if width == 0 || height == 0 {
        return Err(FrameError::Malformed(format!(
            "empty {format} frame {width}x{height}"
        )));
    }
    Ok(())
}

impl RawFrame {
    pub fn new(width: u32, height: u32, y: Plane, u: Plane, v: Plane) -> Self {
        Self {
            width,
            height,
            y,
            u,
            v,
        }
    }

    /// Splits a contiguous I420 buffer (Y, then U, then V) into planes.
    pub fn from_i420(width: u32, height: u32, data: &[u8]) -> Result<Self, FrameError> {
        check_dims("I420", width, height)?;
        let luma = width as usize * height as usize;
        let (cw, ch) = chroma_dims(width, height);
        let chroma = cw * ch;
        if data.len() != luma + 2 * chroma {
            return Err(FrameError::Malformed(format!(
                "I420 {width}x{height} needs {} bytes, got {}",
                luma + 2 * chroma,
                data.len()
            )));
        }
        let (y, rest) = data.split_at(luma);
        let (u, v) = rest.split_at(chroma);
        Ok(Self::new(
            width,
            height,
            Plane::packed(y.to_vec(), width as usize),
            Plane::packed(u.to_vec(), cw),
            Plane::packed(v.to_vec(), cw),
        ))
    }

    /// Splits an NV12 buffer (Y, then interleaved UV) into planes. The chroma
    /// planes keep the interleaving through a pixel stride of two.
    pub fn from_nv12(width: u32, height: u32, data: &[u8]) -> Result<Self, FrameError> {
        check_dims("NV12", width, height)?;
        let luma = width as usize * height as usize;
        let (cw, ch) = chroma_dims(width, height);
        let expected = luma + 2 * cw * ch;
        if data.len() < expected {
            return Err(FrameError::Malformed(format!(
                "NV12 {width}x{height} needs {expected} bytes, got {}",
                data.len()
            )));
        }
        let uv = &data[luma..expected];
        Ok(Self::new(
            width,
            height,
            Plane::packed(data[..luma].to_vec(), width as usize),
            Plane::new(uv.to_vec(), 2 * cw, 2),
            Plane::new(uv[1..].to_vec(), 2 * cw, 2),
        ))
    }

    /// Converts packed YUYV 4:2:2 into planar 4:2:0, taking chroma from even rows.
    pub fn from_yuyv(width: u32, height: u32, data: &[u8]) -> Result<Self, FrameError> {
        check_dims("YUYV", width, height)?;
        if width % 2 != 0 {
            return Err(FrameError::Malformed(format!(
                "YUYV width must be even, got {width}"
            )));
        }
        let (w, h) = (width as usize, height as usize);
        if data.len() < w * h * 2 {
            return Err(FrameError::Malformed(format!(
                "YUYV {width}x{height} needs {} bytes, got {}",
                w * h * 2,
                data.len()
            )));
        }
        let (cw, ch) = chroma_dims(width, height);
        let mut y = Vec::with_capacity(w * h);
        let mut u = Vec::with_capacity(cw * ch);
        let mut v = Vec::with_capacity(cw * ch);
        for (row, line) in data[..w * h * 2].chunks_exact(w * 2).enumerate() {
            for quad in line.chunks_exact(4) {
                y.push(quad[0]);
                y.push(quad[2]);
                if row % 2 == 0 {
                    u.push(quad[1]);
                    v.push(quad[3]);
                }
            }
        }
        Ok(Self::new(
            width,
            height,
            Plane::packed(y, w),
            Plane::packed(u, cw),
            Plane::packed(v, cw),
        ))
    }

    fn validate(&self) -> Result<(), FrameError> {
        let (w, h) = (self.width as usize, self.height as usize);
        if w == 0 || h == 0 {
            return Err(FrameError::Malformed(format!(
                "empty frame {}x{}",
                self.width, self.height
            )));
        }
        if self.y.data.len() != w * h {
            return Err(FrameError::Malformed(format!(
                "luma plane has {} bytes, expected {}",
                self.y.data.len(),
                w * h
            )));
        }
        if self.y.row_stride != w || self.y.pixel_stride != 1 {
            return Err(FrameError::Malformed(format!(
                "luma strides {}/{} do not match width {w}",
                self.y.row_stride, self.y.pixel_stride
            )));
        }
        let (cw, ch) = chroma_dims(self.width, self.height);
        for (name, plane) in [("u", &self.u), ("v", &self.v)] {
            if !plane.covers(cw, ch) {
                return Err(FrameError::Malformed(format!(
                    "{name} plane ({} bytes, strides {}/{}) does not cover {cw}x{ch}",
                    plane.data.len(),
                    plane.row_stride,
                    plane.pixel_stride
                )));
            }
        }
        Ok(())
    }
}

/// Single-plane NV21 encoding: full luma followed by alternating V/U samples.
struct Nv21 {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Nv21 {
    fn interleave(frame: &RawFrame) -> Self {
        let (cw, ch) = chroma_dims(frame.width, frame.height);
        let mut data = Vec::with_capacity(frame.y.data.len() + 2 * cw * ch);
        data.extend_from_slice(&frame.y.data);
        for row in 0..ch {
            for col in 0..cw {
                data.push(frame.v.sample(col, row));
                data.push(frame.u.sample(col, row));
            }
        }
        Self {
            width: frame.width,
            height: frame.height,
            data,
        }
    }

    /// BT.601 limited range, integer coefficients.
    fn decode(&self) -> Result<RgbImage, FrameError> {
        let (w, h) = (self.width as usize, self.height as usize);
        let cw = self.width.div_ceil(2) as usize;
        let (luma, chroma) = self.data.split_at(w * h);
        let mut rgb = Vec::with_capacity(w * h * 3);
        for y in 0..h {
            for x in 0..w {
                let vu = ((y / 2) * cw + x / 2) * 2;
                let (Some(&v), Some(&u)) = (chroma.get(vu), chroma.get(vu + 1)) else {
                    return Err(FrameError::Decode(format!(
                        "chroma sample missing at {x},{y}"
                    )));
                };
                let c = luma[y * w + x] as i32 - 16;
                let d = u as i32 - 128;
                let e = v as i32 - 128;
                let r = (298 * c + 409 * e + 128) >> 8;
                let g = (298 * c - 100 * d - 208 * e + 128) >> 8;
                let b = (298 * c + 516 * d + 128) >> 8;
                rgb.extend_from_slice(&[
                    r.clamp(0, 255) as u8,
                    g.clamp(0, 255) as u8,
                    b.clamp(0, 255) as u8,
                ]);
            }
        }
        RgbImage::from_raw(self.width, self.height, rgb)
            .ok_or_else(|| FrameError::Decode("pixel buffer does not fit dimensions".into()))
    }
}

/// An interleaved RGB bitmap produced from a camera frame.
#[derive(Debug, Clone, PartialEq)]
pub struct InterleavedImage(RgbImage);

impl InterleavedImage {
    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn as_rgb(&self) -> &RgbImage {
        &self.0
    }

    pub fn into_rgb(self) -> RgbImage {
        self.0
    }
}

impl From<RgbImage> for InterleavedImage {
    fn from(image: RgbImage) -> Self {
        Self(image)
    }
}

/// Decodes a planar YUV 4:2:0 frame into RGB.
///
/// The frame is consumed: its planes are released when this returns,
/// whether or not decoding succeeded.
pub fn convert(frame: RawFrame) -> Result<InterleavedImage, FrameError> {
    frame.validate()?;
    let nv21 = Nv21::interleave(&frame);
    drop(frame);
    trace!(width = nv21.width, height = nv21.height, "decoding nv21");
    nv21.decode().map(InterleavedImage)
}
