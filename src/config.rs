use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{DigitError, Result};

/// Memory layout of the tensor handed to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    /// [1, 28, 28, 1], as exported from Keras.
    #[default]
    Nhwc,
    /// [1, 1, 28, 28], as exported from PyTorch.
    Nchw,
}

impl TensorLayout {
    pub fn shape(&self) -> [usize; 4] {
        match self {
            TensorLayout::Nhwc => [1, 28, 28, 1],
            TensorLayout::Nchw => [1, 1, 28, 28],
        }
    }
}

/// Recognizer settings. Missing fields fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    /// Path to the classifier artifact (`.rten`).
    pub model_path: PathBuf,
    /// Free-form description reported by the model-info query.
    pub model_description: String,
    pub input_layout: TensorLayout,
    /// Apply softmax to raw model outputs (for exports that emit logits).
    pub apply_softmax: bool,
    /// CLAHE clip limit.
    pub clahe_clip_limit: f32,
    /// CLAHE tiles per axis.
    pub clahe_tile_grid: u32,
    /// Segmenter drops components narrower or shorter than this.
    pub min_component_size: u32,
    pub low_confidence_threshold: f32,
    /// Use the augmented ensemble in multi-digit mode too.
    pub augment_multi: bool,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("mnist_final_model.rten"),
            model_description: "Custom-trained MNIST digit classifier.".to_string(),
            input_layout: TensorLayout::Nhwc,
            apply_softmax: false,
            clahe_clip_limit: 2.0,
            clahe_tile_grid: 8,
            min_component_size: 10,
            low_confidence_threshold: 0.70,
            augment_multi: false,
        }
    }
}

impl RecognizerConfig {
    /// Load settings from a JSON file and validate them.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.clahe_tile_grid == 0 {
            return Err(DigitError::Config("clahe_tile_grid must be positive".into()));
        }
        if !(self.clahe_clip_limit > 0.0) {
            return Err(DigitError::Config(format!(
                "clahe_clip_limit must be positive, got {}",
                self.clahe_clip_limit
            )));
        }
        if self.min_component_size == 0 {
            return Err(DigitError::Config("min_component_size must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.low_confidence_threshold) {
            return Err(DigitError::Config(format!(
                "low_confidence_threshold must be within [0, 1], got {}",
                self.low_confidence_threshold
            )));
        }
        Ok(())
    }
}
