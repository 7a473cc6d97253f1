use crate::quantizer::{map_counts, median_cut};
use crate::utils::fit_within;
use crate::{BarcodeError, ColorSample, Frame, Result};
use image::imageops::{self, FilterType};
use kmeans_colors::{get_kmeans, Kmeans};
use log::debug;
use palette::Srgb;

/// Something that can name the dominant color(s) of a raster.
///
/// Implementations are pure: the same image always gives the same output and
/// nothing is shared between calls.
pub trait DominantColorExtractor {
    type Output;

    fn extract(&self, image: &Frame) -> Result<Self::Output>;
}

/// One dominant color with its share of the image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaletteEntry {
    pub color: ColorSample,
    /// Fraction of pixels, in `[0, 1]`
    pub weight: f64,
}

/// Weighted set of dominant colors. Weights sum to 1.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Palette {
    entries: Vec<PaletteEntry>,
}

impl Palette {
    pub fn new(entries: Vec<PaletteEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[PaletteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PaletteEntry> {
        self.entries.iter()
    }

    pub fn total_weight(&self) -> f64 {
        self.entries.iter().map(|entry| entry.weight).sum()
    }
}

impl<'a> IntoIterator for &'a Palette {
    type Item = &'a PaletteEntry;
    type IntoIter = std::slice::Iter<'a, PaletteEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Cheap single-color extraction used once per barcode column.
///
/// The image is shrunk to a thumbnail, reduced to a small adaptive palette by
/// median cut, and the palette entry covering the most pixels wins. Ties in
/// the palette selection may differ from other quantizers; that only shows as
/// minor visual variation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuickExtractor {
    /// Longest side of the thumbnail
    pub resize: u32,
    /// Palette size
    pub colors: usize,
}

impl Default for QuickExtractor {
    fn default() -> Self {
        Self {
            resize: crate::DEFAULT_QUICK_RESIZE,
            colors: crate::DEFAULT_QUICK_COLORS,
        }
    }
}

impl QuickExtractor {
    pub fn new(resize: u32, colors: usize) -> Self {
        Self { resize, colors }
    }
}

impl DominantColorExtractor for QuickExtractor {
    type Output = ColorSample;

    fn extract(&self, image: &Frame) -> Result<ColorSample> {
        if image.width() == 0 || image.height() == 0 {
            return Err(BarcodeError::EmptyImage);
        }

        let (width, height) = fit_within(image.width(), image.height(), self.resize);
        let thumbnail;
        let source = if (width, height) == image.dimensions() {
            image
        } else {
            thumbnail = imageops::resize(image, width, height, FilterType::Triangle);
            &thumbnail
        };

        let palette = median_cut(source, self.colors.max(1));
        let counts = map_counts(source, &palette);

        // First entry wins ties
        let best = counts
            .iter()
            .enumerate()
            .fold(0, |best, (i, &count)| if count > counts[best] { i } else { best });

        palette.get(best).copied().ok_or(BarcodeError::EmptyImage)
    }
}

/// K-means extraction of the `k` dominant colors of a still scene.
///
/// Runs at full resolution; every pixel is a point in RGB space. Each run is
/// seeded from `seed` plus the run index, so the same image always gives the
/// same palette.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterExtractor {
    pub k: usize,
    pub max_iterations: usize,
    pub tolerance: f32,
    pub runs: usize,
    pub seed: u64,
}

impl Default for ClusterExtractor {
    fn default() -> Self {
        Self {
            k: crate::DEFAULT_SCENE_COLORS,
            max_iterations: 300,
            tolerance: 1e-4,
            runs: crate::DEFAULT_KMEANS_RUNS,
            seed: 0,
        }
    }
}

impl ClusterExtractor {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            ..Default::default()
        }
    }

    /// Extract the palette, calling `on_run` after every finished k-means run
    /// with the number of runs done so far.
    pub fn extract_with_progress<F>(&self, image: &Frame, mut on_run: F) -> Result<Palette>
    where
        F: FnMut(usize),
    {
        if self.k < 1 || self.k > crate::MAX_CLUSTERS {
            return Err(BarcodeError::InvalidClusterCount(self.k));
        }
        if image.width() == 0 || image.height() == 0 {
            return Err(BarcodeError::EmptyImage);
        }

        let pixels: Vec<Srgb> = image
            .pixels()
            .map(|p| Srgb::<u8>::new(p[0], p[1], p[2]).into_format::<f32>())
            .collect();
        debug!(
            "Clustering {} pixels into {} clusters ({} runs)",
            pixels.len(),
            self.k,
            self.runs.max(1)
        );

        let mut best: Option<Kmeans<Srgb>> = None;
        for run in 0..self.runs.max(1) {
            let result = get_kmeans(
                self.k,
                self.max_iterations,
                self.tolerance,
                false,
                &pixels,
                self.seed + run as u64,
            );
            debug!("K-means run {} scored {}", run + 1, result.score);
            if best.as_ref().map_or(true, |b| result.score < b.score) {
                best = Some(result);
            }
            on_run(run + 1);
        }
        let best = best.ok_or(BarcodeError::EmptyImage)?;

        let mut counts = vec![0u64; best.centroids.len()];
        for &index in &best.indices {
            counts[index as usize] += 1;
        }

        // Centroids left without members are dropped
        let total = pixels.len() as f64;
        let entries = best
            .centroids
            .iter()
            .zip(&counts)
            .filter(|(_, &count)| count > 0)
            .map(|(&centroid, &count)| {
                let rgb: Srgb<u8> = centroid.into_format();
                PaletteEntry {
                    color: image::Rgb([rgb.red, rgb.green, rgb.blue]),
                    weight: count as f64 / total,
                }
            })
            .collect();

        Ok(Palette::new(entries))
    }
}

impl DominantColorExtractor for ClusterExtractor {
    type Output = Palette;

    fn extract(&self, image: &Frame) -> Result<Palette> {
        self.extract_with_progress(image, |_| {})
    }
}
