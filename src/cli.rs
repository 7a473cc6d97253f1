use crate::{BarcodeConfig, Result};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Generate a color profile of an entire movie or a particular scene",
    long_about = None
)]
pub struct Cli {
    /// m to generate a barcode for a movie, s to generate the color profile of a scene
    #[arg(required = true)]
    pub mode: Mode,

    /// Path of the movie or scene
    #[arg(required = true)]
    pub path: PathBuf,

    /// Length of the barcode (movie mode)
    #[arg(short, long)]
    pub length: Option<usize>,

    /// Number of primary colors to find (scene mode)
    #[arg(short, long)]
    pub colors: Option<usize>,

    /// Height of the generated strip in pixels
    #[arg(long)]
    pub height: Option<u32>,

    /// Directory the image is written to
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// JSON file with configuration overrides
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Movie barcode
    #[value(name = "m")]
    Movie,
    /// Scene palette
    #[value(name = "s")]
    Scene,
}

impl Cli {
    /// Validate command line arguments
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.path.exists() {
            return Err(format!("Input file does not exist: {}", self.path.display()));
        }

        if self.length == Some(0) {
            return Err("Barcode length must be greater than 0".to_string());
        }

        if self.colors == Some(0) {
            return Err("Number of colors must be greater than 0".to_string());
        }

        if self.height == Some(0) {
            return Err("Height must be greater than 0".to_string());
        }

        if !self.output_dir.is_dir() {
            return Err(format!(
                "Output directory does not exist: {}",
                self.output_dir.display()
            ));
        }

        Ok(())
    }

    /// Effective configuration: the config file if given, overridden by flags
    pub fn build_config(&self) -> Result<BarcodeConfig> {
        let mut config = match &self.config {
            Some(path) => BarcodeConfig::from_file(path)?,
            None => BarcodeConfig::default(),
        };
        if let Some(length) = self.length {
            config.target_length = length;
        }
        if let Some(colors) = self.colors {
            config.colors = colors;
        }
        if let Some(height) = self.height {
            config.strip_height = height;
        }
        config.validate()?;
        Ok(config)
    }

    /// Output file for this run
    pub fn output_path(&self) -> PathBuf {
        let suffix = match self.mode {
            Mode::Movie => crate::BARCODE_SUFFIX,
            Mode::Scene => crate::PRIMARY_COLORS_SUFFIX,
        };
        crate::utils::output_path(&self.path, suffix, &self.output_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modes() {
        let cli = Cli::try_parse_from(["color-barcode", "m", "movie.mp4", "-l", "720"]).unwrap();
        assert_eq!(cli.mode, Mode::Movie);
        assert_eq!(cli.length, Some(720));

        let cli =
            Cli::try_parse_from(["color-barcode", "s", "scene.jpg", "--colors", "4"]).unwrap();
        assert_eq!(cli.mode, Mode::Scene);
        assert_eq!(cli.colors, Some(4));
    }

    #[test]
    fn test_invalid_mode() {
        assert!(Cli::try_parse_from(["color-barcode", "x", "movie.mp4"]).is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "color-barcode",
            "s",
            "scene.jpg",
            "-c",
            "3",
            "--height",
            "80",
        ])
        .unwrap();
        let config = cli.build_config().unwrap();
        assert_eq!(config.colors, 3);
        assert_eq!(config.strip_height, 80);
        assert_eq!(config.target_length, 1440);
    }

    #[test]
    fn test_output_path() {
        let cli =
            Cli::try_parse_from(["color-barcode", "m", "/videos/film.final.mkv", "-o", "out"])
                .unwrap();
        assert_eq!(cli.output_path(), PathBuf::from("out/film_barcode.png"));
    }

    #[test]
    fn test_validate_missing_file() {
        let cli = Cli::try_parse_from(["color-barcode", "s", "nonexistent.png"]).unwrap();
        let err = cli.validate().unwrap_err();
        assert!(err.contains("does not exist"));
    }
}
