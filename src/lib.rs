pub mod classifier;
pub mod config;
pub mod debug;
pub mod detection;
pub mod error;
pub mod models;

pub use classifier::{Classifier, RtenClassifier, model_info};
pub use config::{RecognizerConfig, TensorLayout};
pub use debug::DebugConfig;
pub use detection::Recognizer;
pub use error::{DigitError, Result};
pub use models::{
    Alternative, BoundingBox, Contour, DigitPrediction, ModelInfo, MultiPrediction,
    NormalizedTensor, PredictionResult, PreviewImage, ProbabilityVector, RawImage,
};
