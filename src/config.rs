use crate::{BarcodeError, ColorSample, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Widest canvas border accepted from a configuration
pub const MAX_MARGIN: u32 = 10_000;

/// Tunables for a single run. Every field has a default, so a JSON file only
/// needs to name the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarcodeConfig {
    /// Number of barcode columns to aim for in movie mode
    pub target_length: usize,
    /// Width every frame is shrunk to before averaging
    pub frame_width: u32,
    /// Height every frame is shrunk to before averaging
    pub frame_height: u32,
    /// Longest side of the quick extractor's thumbnail
    pub quick_resize: u32,
    /// Adaptive palette size of the quick extractor
    pub quick_colors: usize,
    /// Number of clusters in scene mode
    pub colors: usize,
    /// K-means iteration cap
    pub max_iterations: usize,
    /// K-means convergence threshold on centroid movement, in RGB units of 0..1
    pub tolerance: f64,
    /// Seeded k-means runs in scene mode; the lowest scoring run wins
    pub runs: usize,
    /// Height of the rendered strip
    pub strip_height: u32,
    /// Width of the scene bar; the source image width when unset
    pub bar_width: Option<u32>,
    /// Canvas color around the output, any CSS color
    pub background: String,
    /// Canvas border in pixels
    pub margin: u32,
}

impl Default for BarcodeConfig {
    fn default() -> Self {
        Self {
            target_length: crate::DEFAULT_TARGET_LENGTH,
            frame_width: crate::DEFAULT_FRAME_SIZE.0,
            frame_height: crate::DEFAULT_FRAME_SIZE.1,
            quick_resize: crate::DEFAULT_QUICK_RESIZE,
            quick_colors: crate::DEFAULT_QUICK_COLORS,
            colors: crate::DEFAULT_SCENE_COLORS,
            max_iterations: 300,
            tolerance: 1e-4,
            runs: crate::DEFAULT_KMEANS_RUNS,
            strip_height: crate::DEFAULT_STRIP_HEIGHT,
            bar_width: None,
            background: "#252525".to_string(),
            margin: 20,
        }
    }
}

fn invalid(message: &str) -> BarcodeError {
    BarcodeError::InvalidConfig(message.to_string())
}

impl BarcodeConfig {
    /// Load a configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| BarcodeError::CannotOpen {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config: Self = serde_json::from_str(&text)?;
        debug!("Loaded configuration from {}: {:?}", path.display(), config);
        Ok(config)
    }

    /// Check that every value is usable
    pub fn validate(&self) -> Result<()> {
        if self.target_length == 0 {
            return Err(invalid("Barcode length must be greater than 0"));
        }
        if self.frame_width == 0 || self.frame_height == 0 {
            return Err(invalid("Frame size must be greater than 0"));
        }
        if self.quick_resize == 0 {
            return Err(invalid("Thumbnail size must be greater than 0"));
        }
        if self.quick_colors == 0 {
            return Err(invalid("Quick palette size must be greater than 0"));
        }
        if self.colors == 0 || self.colors > crate::MAX_CLUSTERS {
            return Err(BarcodeError::InvalidClusterCount(self.colors));
        }
        if self.max_iterations == 0 {
            return Err(invalid("Iteration cap must be greater than 0"));
        }
        if self.tolerance.is_nan() || self.tolerance < 0.0 {
            return Err(invalid("Tolerance must be non-negative"));
        }
        if self.runs == 0 {
            return Err(invalid("K-means runs must be greater than 0"));
        }
        if self.strip_height == 0 {
            return Err(invalid("Strip height must be greater than 0"));
        }
        if self.bar_width == Some(0) {
            return Err(invalid("Bar width must be greater than 0"));
        }
        if self.margin > MAX_MARGIN {
            return Err(BarcodeError::InvalidConfig(format!(
                "Margin must be at most {} pixels",
                MAX_MARGIN
            )));
        }
        self.background_color()?;
        Ok(())
    }

    /// Frame size used by the reducer
    pub fn frame_size(&self) -> (u32, u32) {
        (self.frame_width, self.frame_height)
    }

    /// Parse the background color
    pub fn background_color(&self) -> Result<ColorSample> {
        let color = colorgrad::Color::from_html(&self.background).map_err(|e| {
            BarcodeError::InvalidConfig(format!(
                "Invalid background color '{}': {}",
                self.background, e
            ))
        })?;
        let [r, g, b, _] = color.to_rgba8();
        Ok(image::Rgb([r, g, b]))
    }
}
