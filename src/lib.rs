//! Color Barcode - condense a movie into a color barcode, or a still scene into
//! a bar of its dominant colors.
//!
//! Movie mode decodes every frame, shrinks it, averages fixed-size runs of
//! consecutive frames and picks one dominant color per run. Scene mode clusters
//! the pixels of a single image and lays the clusters out as proportional bands.

pub mod cli;
pub mod config;
pub mod decoder;
pub mod extractor;
pub mod pipeline;
pub mod quantizer;
pub mod reducer;
pub mod renderer;
pub mod strip;

pub use cli::{Cli, Mode};
pub use config::BarcodeConfig;
pub use decoder::{load_image, FrameSequence, FrameSource, VideoDecoder};
pub use extractor::{
    ClusterExtractor, DominantColorExtractor, Palette, PaletteEntry, QuickExtractor,
};
pub use pipeline::{Pipeline, Progress, Stage};
pub use reducer::{sampling_rate, FrameReducer};
pub use renderer::{RenderConfig, Renderer};
pub use strip::{Band, ColorStrip};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name
pub const PACKAGE_NAME: &str = env!("CARGO_PKG_NAME");

/// Number of barcode columns when no length is requested
pub const DEFAULT_TARGET_LENGTH: usize = 1440;

/// Resolution every movie frame is shrunk to before averaging
pub const DEFAULT_FRAME_SIZE: (u32, u32) = (256, 144);

/// Longest side of the thumbnail used by the quick extractor
pub const DEFAULT_QUICK_RESIZE: u32 = 150;

/// Number of palette entries used by the quick extractor
pub const DEFAULT_QUICK_COLORS: usize = 10;

/// Number of clusters used in scene mode
pub const DEFAULT_SCENE_COLORS: usize = 10;

/// Upper bound on scene clusters; cluster labels are stored as `u8`
pub const MAX_CLUSTERS: usize = 256;

/// Seeded k-means runs per scene
pub const DEFAULT_KMEANS_RUNS: usize = 3;

/// Height of every rendered strip
pub const DEFAULT_STRIP_HEIGHT: u32 = 500;

/// Suffix appended to the movie name for barcode output
pub const BARCODE_SUFFIX: &str = "_barcode.png";

/// Suffix appended to the scene name for palette output
pub const PRIMARY_COLORS_SUFFIX: &str = "_primarycolors.png";

/// A packed 8-bit RGB raster.
pub type Frame = image::RgbImage;

/// One RGB color, channels in R, G, B order.
pub type ColorSample = image::Rgb<u8>;

/// Error types used throughout the application
#[derive(thiserror::Error, Debug)]
pub enum BarcodeError {
    #[error("Cannot open '{path}': {reason}")]
    CannotOpen { path: String, reason: String },

    #[error("Invalid sampling rate: {0}")]
    InvalidRate(String),

    #[error("Invalid cluster count {0}: between 1 and 256 clusters are supported")]
    InvalidClusterCount(usize),

    #[error("Frame sequence is empty")]
    EmptySequence,

    #[error("Image has no pixels")]
    EmptyImage,

    #[error("Nothing to assemble: no colors were given")]
    EmptyInput,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Video decoding error: {0}")]
    VideoDecoding(#[from] ffmpeg_next::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, BarcodeError>;

/// Utility functions
pub mod utils {
    use std::path::{Path, PathBuf};

    /// Name of the output file for `input`: everything before the first `.`
    /// of the file name, followed by `suffix`, placed in `dir`. A dotfile
    /// such as `.clip.mp4` has an empty stem and yields just `suffix`.
    pub fn output_path(input: &Path, suffix: &str, dir: &Path) -> PathBuf {
        let name = input
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("output");
        let stem = name.split('.').next().unwrap_or_default();
        dir.join(format!("{}{}", stem, suffix))
    }

    /// Dimensions of `(width, height)` shrunk so that neither side exceeds
    /// `bound`, preserving the aspect ratio. Never grows the input.
    pub fn fit_within(width: u32, height: u32, bound: u32) -> (u32, u32) {
        let longest = width.max(height);
        if longest <= bound || longest == 0 {
            return (width, height);
        }
        let scale = bound as f64 / longest as f64;
        let fit = |side: u32| ((side as f64 * scale).round() as u32).max(1);
        (fit(width), fit(height))
    }

    /// Squared euclidean distance between two RGB points
    pub fn distance_squared(a: [f64; 3], b: [f64; 3]) -> f64 {
        (0..3).map(|i| (a[i] - b[i]) * (a[i] - b[i])).sum()
    }
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        load_image, sampling_rate, utils::*, BarcodeConfig, BarcodeError, Band, Cli,
        ClusterExtractor, ColorSample, ColorStrip, DominantColorExtractor, Frame, FrameReducer,
        FrameSequence, FrameSource, Mode, Palette, PaletteEntry, Pipeline, Progress,
        QuickExtractor, RenderConfig, Renderer, Result, Stage, VideoDecoder,
    };
}

#[cfg(test)]
mod tests {
    use super::utils::*;
    use std::path::Path;

    #[test]
    fn test_output_path_uses_text_before_first_dot() {
        let movie = Path::new("/movies/big.buck.bunny.mp4");
        let path = output_path(movie, "_barcode.png", Path::new("out"));
        assert_eq!(path, Path::new("out/big_barcode.png"));

        let scene = Path::new("scene.jpg");
        let path = output_path(scene, "_primarycolors.png", Path::new("."));
        assert_eq!(path, Path::new("./scene_primarycolors.png"));
    }

    #[test]
    fn test_output_path_dotfile_has_empty_stem() {
        let hidden = Path::new("clips/.hidden.mp4");
        let path = output_path(hidden, "_barcode.png", Path::new("."));
        assert_eq!(path, Path::new("./_barcode.png"));

        let path = output_path(Path::new("noext"), "_barcode.png", Path::new("."));
        assert_eq!(path, Path::new("./noext_barcode.png"));
    }

    #[test]
    fn test_fit_within() {
        assert_eq!(fit_within(256, 144, 150), (150, 84));
        assert_eq!(fit_within(144, 256, 150), (84, 150));
        assert_eq!(fit_within(100, 50, 150), (100, 50));
        assert_eq!(fit_within(1000, 1, 150), (150, 1));
    }

    #[test]
    fn test_distance_squared() {
        assert_eq!(distance_squared([0.0, 0.0, 0.0], [3.0, 4.0, 0.0]), 25.0);
        assert_eq!(distance_squared([1.0, 2.0, 3.0], [1.0, 2.0, 3.0]), 0.0);
    }
}
