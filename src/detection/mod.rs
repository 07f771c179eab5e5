pub mod augment;
pub mod contours;
pub mod ensemble;
pub mod normalize;
pub mod preprocessing;

use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::classifier::Classifier;
use crate::config::RecognizerConfig;
use crate::debug::DebugConfig;
use crate::error::{DigitError, Result};
use crate::models::{BoundingBox, DigitPrediction, MultiPrediction, PredictionResult, RawImage};
use ensemble::Ensemble;
use normalize::NormalizeParams;
use preprocessing::Polarity;

/// Decode uploaded bytes into a grayscale image.
pub fn decode_grayscale(bytes: &[u8]) -> Result<RawImage> {
    image::load_from_memory(bytes)
        .map(|img| img.to_luma8())
        .map_err(|e| DigitError::Decode(e.to_string()))
}

/// Main recognition orchestrator
///
/// Holds the shared classifier and runs the single- and multi-digit flows.
/// Every call is independent; nothing is kept between requests.
pub struct Recognizer {
    classifier: Arc<dyn Classifier>,
    normalize_params: NormalizeParams,
    min_component_size: u32,
    low_confidence_threshold: f32,
    multi_mode: Ensemble,
    debug: Option<DebugConfig>,
}

impl Recognizer {
    pub fn new(classifier: Arc<dyn Classifier>, config: &RecognizerConfig) -> Self {
        Self {
            classifier,
            normalize_params: NormalizeParams {
                clip_limit: config.clahe_clip_limit,
                tile_grid: config.clahe_tile_grid,
            },
            min_component_size: config.min_component_size,
            low_confidence_threshold: config.low_confidence_threshold,
            multi_mode: if config.augment_multi {
                Ensemble::Augmented
            } else {
                Ensemble::Single
            },
            debug: None,
        }
    }

    pub fn with_debug(mut self, debug: DebugConfig) -> Self {
        self.debug = Some(debug);
        self
    }

    /// Recognize one digit from encoded image bytes.
    #[instrument(skip_all, fields(bytes = data.len()))]
    pub fn predict_bytes(&self, data: &[u8]) -> Result<PredictionResult> {
        let image = decode_grayscale(data)?;
        info!(width = image.width(), height = image.height(), "Image decoded");
        if let Some(debug) = &self.debug {
            debug.save_image("debug_input.png", &image);
        }
        self.predict(&image)
    }

    /// Single-digit flow: normalize, then the augmented ensemble.
    pub fn predict(&self, image: &RawImage) -> Result<PredictionResult> {
        let normalized = normalize::normalize(image, self.normalize_params)?;
        if let Some(debug) = &self.debug {
            debug.save_preview("debug_preprocessed.png", &normalized.preview);
        }

        let result = ensemble::score(
            &normalized.tensor,
            normalized.preview,
            self.classifier.as_ref(),
            Ensemble::Augmented,
        )?;
        self.log_result(&result);
        Ok(result)
    }

    /// Recognize every digit in encoded image bytes.
    #[instrument(skip_all, fields(bytes = data.len()))]
    pub fn predict_multi_bytes(&self, data: &[u8]) -> Result<MultiPrediction> {
        let image = decode_grayscale(data)?;
        info!(width = image.width(), height = image.height(), "Image decoded");
        if let Some(debug) = &self.debug {
            debug.save_image("debug_multi_input.png", &image);
        }
        Ok(self.predict_multi(&image))
    }

    /// Multi-digit flow: segment, then classify each crop.
    ///
    /// A digit whose sub-pipeline fails is left out; the rest still return.
    pub fn predict_multi(&self, image: &RawImage) -> MultiPrediction {
        let polarity = Polarity::detect(image);
        let digits = contours::segment_with_polarity(image, self.min_component_size, polarity);
        info!(components = digits.len(), ?polarity, "Image segmented");

        let predictions = digits
            .into_iter()
            .filter_map(|(bbox, crop)| match self.predict_digit(bbox, &crop, polarity) {
                Ok(prediction) => Some(prediction),
                Err(e) => {
                    warn!(x = bbox.x, y = bbox.y, error = %e, "Skipping digit");
                    None
                }
            })
            .collect();

        MultiPrediction { predictions }
    }

    fn predict_digit(
        &self,
        bbox: BoundingBox,
        crop: &RawImage,
        polarity: Polarity,
    ) -> Result<DigitPrediction> {
        let normalized = normalize::normalize_with_polarity(crop, self.normalize_params, polarity)?;
        if let Some(debug) = &self.debug {
            debug.save_preview(&format!("debug_multi_pre_{}_{}.png", bbox.x, bbox.y), &normalized.preview);
        }

        let result = ensemble::score(
            &normalized.tensor,
            normalized.preview,
            self.classifier.as_ref(),
            self.multi_mode,
        )?;
        debug!(x = bbox.x, y = bbox.y, w = bbox.width, h = bbox.height, "Digit located");
        self.log_result(&result);
        Ok(DigitPrediction::new(result, bbox))
    }

    fn log_result(&self, result: &PredictionResult) {
        if result.is_low_confidence(self.low_confidence_threshold) {
            warn!(digit = result.digit, confidence = result.confidence, "Low confidence prediction");
        } else {
            info!(digit = result.digit, confidence = result.confidence, "Digit predicted");
        }
    }
}
