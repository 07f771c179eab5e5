use image::GrayImage;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{DigitError, Result};
use crate::models::PreviewImage;

/// Directory that receives intermediate images for inspection.
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Root directory for debug outputs
    pub output_dir: PathBuf,
}

impl DebugConfig {
    /// The directory must be empty or non-existent; it is created if missing.
    pub fn new(output_dir: PathBuf) -> Result<Self> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(DigitError::Config(format!(
                    "debug directory is not empty: {}",
                    output_dir.display()
                )));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        Ok(Self { output_dir })
    }

    /// Save a decoded input image. Failures are logged, never returned.
    pub fn save_image(&self, name: &str, image: &GrayImage) {
        let path = self.output_dir.join(name);
        match image.save(&path) {
            Ok(()) => debug!(path = %path.display(), "Debug image saved"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to save debug image"),
        }
    }

    /// Save an already encoded preview. Failures are logged, never returned.
    pub fn save_preview(&self, name: &str, preview: &PreviewImage) {
        let path = self.output_dir.join(name);
        match std::fs::write(&path, preview.png_bytes()) {
            Ok(()) => debug!(path = %path.display(), "Debug preview saved"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to save debug preview"),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.output_dir
    }
}
