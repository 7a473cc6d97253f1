use crate::{BarcodeConfig, BarcodeError, ColorSample, Frame, Result};
use image::imageops;
use log::{debug, info};
use std::path::Path;

/// Presentation settings for written files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderConfig {
    /// Canvas color around the output
    pub background: ColorSample,
    /// Canvas border in pixels
    pub margin: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            background: image::Rgb([0x25, 0x25, 0x25]),
            margin: 20,
        }
    }
}

impl RenderConfig {
    pub fn from_config(config: &BarcodeConfig) -> Result<Self> {
        Ok(Self {
            background: config.background_color()?,
            margin: config.margin,
        })
    }
}

/// Writes strips to PNG files
pub struct Renderer {
    config: RenderConfig,
}

impl Renderer {
    /// Create a new renderer
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Place rasters top to bottom, horizontally centred, on a background
    /// canvas with no gap between them.
    pub fn compose(&self, rasters: &[&Frame]) -> Result<Frame> {
        let margin = self.config.margin;
        let too_large = || BarcodeError::InvalidConfig("Output canvas is too large".into());

        let content_width = rasters.iter().map(|r| r.width()).max().unwrap_or(0);
        let content_height = rasters
            .iter()
            .try_fold(0u32, |sum, r| sum.checked_add(r.height()))
            .ok_or_else(too_large)?;
        let padded = |side: u32| {
            margin
                .checked_mul(2)
                .and_then(|border| side.checked_add(border))
                .ok_or_else(too_large)
        };

        let mut canvas = Frame::from_pixel(
            padded(content_width)?,
            padded(content_height)?,
            self.config.background,
        );

        let mut y = margin;
        for raster in rasters {
            let x = margin + (content_width - raster.width()) / 2;
            imageops::replace(&mut canvas, *raster, x as i64, y as i64);
            y += raster.height();
        }
        Ok(canvas)
    }

    /// Write a movie barcode
    pub fn write_barcode(&self, barcode: &Frame, path: &Path) -> Result<()> {
        let canvas = self.compose(&[barcode])?;
        canvas.save(path)?;
        info!("Barcode written to {}", path.display());
        Ok(())
    }

    /// Write a scene with its dominant color bar beneath it
    pub fn write_scene(&self, scene: &Frame, bar: &Frame, path: &Path) -> Result<()> {
        let canvas = self.compose(&[scene, bar])?;
        debug!("Scene canvas {}x{}", canvas.width(), canvas.height());
        canvas.save(path)?;
        info!("Primary colors written to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_compose_stacks_without_gap() {
        let renderer = Renderer::new(RenderConfig {
            background: Rgb([1, 1, 1]),
            margin: 2,
        });
        let top = Frame::from_pixel(4, 3, Rgb([200, 0, 0]));
        let bottom = Frame::from_pixel(4, 5, Rgb([0, 0, 200]));

        let canvas = renderer.compose(&[&top, &bottom]).unwrap();
        assert_eq!(canvas.dimensions(), (8, 12));
        assert_eq!(*canvas.get_pixel(0, 0), Rgb([1, 1, 1]));
        assert_eq!(*canvas.get_pixel(2, 4), Rgb([200, 0, 0]));
        assert_eq!(*canvas.get_pixel(2, 5), Rgb([0, 0, 200]));
        assert_eq!(*canvas.get_pixel(5, 9), Rgb([0, 0, 200]));
        assert_eq!(*canvas.get_pixel(5, 10), Rgb([1, 1, 1]));
    }

    #[test]
    fn test_compose_centres_narrow_rasters() {
        let renderer = Renderer::new(RenderConfig {
            background: Rgb([0, 0, 0]),
            margin: 0,
        });
        let wide = Frame::from_pixel(6, 1, Rgb([9, 9, 9]));
        let narrow = Frame::from_pixel(2, 1, Rgb([50, 50, 50]));

        let canvas = renderer.compose(&[&wide, &narrow]).unwrap();
        assert_eq!(*canvas.get_pixel(1, 1), Rgb([0, 0, 0]));
        assert_eq!(*canvas.get_pixel(2, 1), Rgb([50, 50, 50]));
        assert_eq!(*canvas.get_pixel(3, 1), Rgb([50, 50, 50]));
        assert_eq!(*canvas.get_pixel(4, 1), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_write_barcode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movie_barcode.png");
        let renderer = Renderer::new(RenderConfig::default());

        let barcode = Frame::from_pixel(3, 10, Rgb([10, 20, 30]));
        renderer.write_barcode(&barcode, &path).unwrap();

        let written = image::open(&path).unwrap().to_rgb8();
        assert_eq!(written.dimensions(), (43, 50));
        assert_eq!(*written.get_pixel(20, 20), Rgb([10, 20, 30]));
    }

    #[test]
    fn test_compose_rejects_overflowing_margin() {
        let renderer = Renderer::new(RenderConfig {
            background: Rgb([0, 0, 0]),
            margin: u32::MAX / 2 + 1,
        });
        let raster = Frame::from_pixel(1, 1, Rgb([1, 2, 3]));
        assert!(matches!(
            renderer.compose(&[&raster]),
            Err(BarcodeError::InvalidConfig(_))
        ));
    }
}
