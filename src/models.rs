use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::{GrayImage, ImageFormat, Luma};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

use crate::error::{DigitError, Result};

/// Side length of the canonical classifier input.
pub const TENSOR_SIZE: u32 = 28;
/// Number of pixels in a normalized tensor.
pub const TENSOR_LEN: usize = (TENSOR_SIZE * TENSOR_SIZE) as usize;
/// Number of digit classes.
pub const NUM_CLASSES: usize = 10;

/// Decoded single-channel input image.
pub type RawImage = GrayImage;

/// Bounding box in raw image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    /// Build the box spanning two inclusive corners.
    pub fn from_corners(min_x: u32, min_y: u32, max_x: u32, max_y: u32) -> Self {
        Self {
            x: min_x,
            y: min_y,
            width: max_x - min_x + 1,
            height: max_y - min_y + 1,
        }
    }

    /// Whether the box lies fully inside an image of the given size.
    pub fn fits_within(&self, image_width: u32, image_height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.x + self.width <= image_width
            && self.y + self.height <= image_height
    }
}

/// Extent of one connected foreground region.
#[derive(Debug, Clone)]
pub struct Contour {
    pub label: u32,
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
    pub pixel_count: u32,
}

impl Contour {
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    pub fn area(&self) -> u32 {
        self.pixel_count
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_corners(self.min_x, self.min_y, self.max_x, self.max_y)
    }
}

/// A 28x28x1 grid of intensities in [0, 1], row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTensor {
    data: Box<[f32]>,
}

impl NormalizedTensor {
    /// All-zero tensor, produced when the input has no foreground.
    pub fn zeros() -> Self {
        Self {
            data: vec![0.0; TENSOR_LEN].into_boxed_slice(),
        }
    }

    /// Wrap row-major values. Values are clamped into [0, 1].
    pub fn from_values(values: Vec<f32>) -> Result<Self> {
        if values.len() != TENSOR_LEN {
            return Err(DigitError::Shape(format!(
                "expected {} values, got {}",
                TENSOR_LEN,
                values.len()
            )));
        }
        let data = values
            .into_iter()
            .map(|v| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) })
            .collect();
        Ok(Self { data })
    }

    /// Divide every 8-bit sample of a 28x28 image by 255.
    pub fn from_image(image: &GrayImage) -> Self {
        debug_assert_eq!(image.dimensions(), (TENSOR_SIZE, TENSOR_SIZE));
        let data = image.pixels().map(|p| p[0] as f32 / 255.0).collect();
        Self { data }
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.data[(y * TENSOR_SIZE + x) as usize]
    }

    pub fn values(&self) -> &[f32] {
        &self.data
    }

    /// Shape as (height, width, channels).
    pub fn shape(&self) -> (usize, usize, usize) {
        (TENSOR_SIZE as usize, TENSOR_SIZE as usize, 1)
    }

    pub fn is_zero(&self) -> bool {
        self.data.iter().all(|&v| v == 0.0)
    }
}

/// Lossless PNG of the 28x28 pre-normalization pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewImage {
    png: Vec<u8>,
}

impl PreviewImage {
    pub fn encode(image: &GrayImage) -> Result<Self> {
        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| DigitError::Encode(e.to_string()))?;
        Ok(Self { png })
    }

    /// Preview for the empty-foreground case.
    pub fn blank() -> Result<Self> {
        Self::encode(&GrayImage::from_pixel(TENSOR_SIZE, TENSOR_SIZE, Luma([0u8])))
    }

    pub fn png_bytes(&self) -> &[u8] {
        &self.png
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.png)
    }

    /// Decode the PNG back into pixels.
    pub fn decode(&self) -> Result<GrayImage> {
        image::load_from_memory_with_format(&self.png, ImageFormat::Png)
            .map(|img| img.to_luma8())
            .map_err(|e| DigitError::Decode(e.to_string()))
    }
}

impl Serialize for PreviewImage {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

/// Ten non-negative class scores, index = digit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbabilityVector(pub [f32; NUM_CLASSES]);

impl ProbabilityVector {
    /// Validate raw classifier output.
    pub fn from_scores(scores: &[f32]) -> Result<Self> {
        if scores.len() != NUM_CLASSES {
            return Err(DigitError::Inference(format!(
                "expected {} class scores, got {}",
                NUM_CLASSES,
                scores.len()
            )));
        }
        if let Some(bad) = scores.iter().find(|s| !s.is_finite() || **s < 0.0) {
            return Err(DigitError::Inference(format!("invalid class score {}", bad)));
        }
        let mut out = [0.0; NUM_CLASSES];
        out.copy_from_slice(scores);
        Ok(Self(out))
    }

    pub fn scores(&self) -> &[f32; NUM_CLASSES] {
        &self.0
    }
}

/// A ranked runner-up label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Alternative {
    pub digit: u8,
    pub confidence: f32,
}

/// Ensemble output for one digit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub digit: u8,
    pub confidence: f32,
    pub alternatives: Vec<Alternative>,
    #[serde(rename = "preprocessed_image")]
    pub preview: PreviewImage,
}

impl PredictionResult {
    pub fn is_low_confidence(&self, threshold: f32) -> bool {
        self.confidence < threshold
    }
}

/// One located digit in multi-digit mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DigitPrediction {
    pub digit: u8,
    pub confidence: f32,
    #[serde(rename = "boundingBox")]
    pub bounding_box: BoundingBox,
    pub alternatives: Vec<Alternative>,
    #[serde(rename = "preprocessed_image")]
    pub preview: PreviewImage,
}

impl DigitPrediction {
    pub fn new(result: PredictionResult, bounding_box: BoundingBox) -> Self {
        Self {
            digit: result.digit,
            confidence: result.confidence,
            bounding_box,
            alternatives: result.alternatives,
            preview: result.preview,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultiPrediction {
    pub predictions: Vec<DigitPrediction>,
}

/// Descriptive metadata about the classifier artifact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub model_file: String,
    pub model_path: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified_rfc3339: Option<String>,
}
