use crate::extractor::Palette;
use crate::{BarcodeError, ColorSample, Frame, Result};
use log::debug;

/// A run of identical columns in a strip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Band {
    pub color: ColorSample,
    pub width: u32,
}

/// Ordered color bands laid out left to right
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColorStrip {
    bands: Vec<Band>,
}

impl ColorStrip {
    /// One 1-pixel column per color, in the given order
    pub fn barcode(colors: &[ColorSample]) -> Result<Self> {
        if colors.is_empty() {
            return Err(BarcodeError::EmptyInput);
        }
        let bands = colors.iter().map(|&color| Band { color, width: 1 }).collect();
        Ok(Self { bands })
    }

    /// Bands proportional to the palette weights, in palette order, spanning
    /// exactly `total_width` pixels.
    ///
    /// Band edges come from a running cursor so rounding never accumulates;
    /// the last edge is pinned to `total_width`.
    pub fn bar_chart(palette: &Palette, total_width: u32) -> Result<Self> {
        if palette.is_empty() {
            return Err(BarcodeError::EmptyInput);
        }

        let mut bands = Vec::with_capacity(palette.len());
        let mut cursor = 0.0f64;
        let mut start = 0u32;
        let last = palette.len() - 1;
        for (i, entry) in palette.iter().enumerate() {
            cursor += entry.weight.max(0.0) * total_width as f64;
            let end = if i == last {
                total_width
            } else {
                (cursor.round() as u32).clamp(start, total_width)
            };
            bands.push(Band {
                color: entry.color,
                width: end - start,
            });
            start = end;
        }

        debug!("Laid out {} bands over {} pixels", bands.len(), total_width);
        Ok(Self { bands })
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    /// Total width in pixels
    pub fn width(&self) -> u32 {
        self.bands.iter().map(|band| band.width).sum()
    }

    /// Rasterize at `height` pixels, no blending between bands
    pub fn render(&self, height: u32) -> Frame {
        let mut raster = Frame::new(self.width(), height);
        let mut x0 = 0;
        for band in &self.bands {
            for x in x0..x0 + band.width {
                for y in 0..height {
                    raster.put_pixel(x, y, band.color);
                }
            }
            x0 += band.width;
        }
        raster
    }
}
