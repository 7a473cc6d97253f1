//! Adaptive palette quantization by median cut.
//!
//! The color space of an image is recursively split into boxes holding roughly
//! equal pixel populations; each box contributes the population-weighted mean
//! of its colors as one palette entry. Pixels are then mapped to the nearest
//! entry.

use crate::utils::distance_squared;
use crate::{ColorSample, Frame};
use std::collections::HashMap;

/// Distinct colors of an image with their pixel counts, in first-seen order.
pub fn histogram(image: &Frame) -> Vec<([u8; 3], u64)> {
    let mut index: HashMap<[u8; 3], usize> = HashMap::new();
    let mut colors: Vec<([u8; 3], u64)> = Vec::new();
    for pixel in image.pixels() {
        let slot = *index.entry(pixel.0).or_insert_with(|| {
            colors.push((pixel.0, 0));
            colors.len() - 1
        });
        colors[slot].1 += 1;
    }
    colors
}

#[derive(Debug, Clone)]
struct ColorBox {
    colors: Vec<([u8; 3], u64)>,
    population: u64,
}

impl ColorBox {
    fn new(colors: Vec<([u8; 3], u64)>) -> Self {
        let population = colors.iter().map(|(_, count)| count).sum();
        Self { colors, population }
    }

    /// Channel with the widest spread and that spread
    fn widest_channel(&self) -> (usize, u8) {
        (0..3)
            .map(|channel| {
                let (min, max) = self
                    .colors
                    .iter()
                    .fold((u8::MAX, u8::MIN), |(min, max), (c, _)| {
                        (min.min(c[channel]), max.max(c[channel]))
                    });
                (channel, max.saturating_sub(min))
            })
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
            .unwrap_or((0, 0))
    }

    fn can_split(&self) -> bool {
        self.colors.len() > 1
    }

    /// Split at the population median of the widest channel
    fn split(mut self) -> (ColorBox, ColorBox) {
        let (channel, _) = self.widest_channel();
        self.colors.sort_by_key(|(c, _)| c[channel]);

        let half = self.population / 2;
        let mut running = 0;
        let mut cut = 1;
        for (i, (_, count)) in self.colors.iter().enumerate() {
            running += count;
            if running >= half {
                cut = i + 1;
                break;
            }
        }
        let cut = cut.clamp(1, self.colors.len() - 1);

        let upper = self.colors.split_off(cut);
        (ColorBox::new(self.colors), ColorBox::new(upper))
    }

    fn mean(&self) -> ColorSample {
        let mut sums = [0u64; 3];
        for (color, count) in &self.colors {
            for channel in 0..3 {
                sums[channel] += color[channel] as u64 * count;
            }
        }
        let population = self.population.max(1);
        image::Rgb(sums.map(|sum| ((sum + population / 2) / population) as u8))
    }
}

/// Pick up to `colors` representative colors for `image` by median cut.
///
/// Returns fewer entries when the image has fewer distinct colors, and an empty
/// palette for an empty image.
pub fn median_cut(image: &Frame, colors: usize) -> Vec<ColorSample> {
    let distinct = histogram(image);
    if distinct.is_empty() || colors == 0 {
        return Vec::new();
    }

    let mut boxes = vec![ColorBox::new(distinct)];
    while boxes.len() < colors {
        // Most populated box that still holds more than one color
        let candidate = boxes
            .iter()
            .enumerate()
            .filter(|(_, b)| b.can_split())
            .max_by(|a, b| a.1.population.cmp(&b.1.population).then(b.0.cmp(&a.0)))
            .map(|(i, _)| i);

        let Some(index) = candidate else { break };
        let (lower, upper) = boxes.swap_remove(index).split();
        boxes.push(lower);
        boxes.push(upper);
    }

    boxes.iter().map(ColorBox::mean).collect()
}

/// Index of the palette entry closest to `color`; ties go to the lower index.
pub fn nearest(palette: &[ColorSample], color: &ColorSample) -> usize {
    let point = color.0.map(f64::from);
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (i, entry) in palette.iter().enumerate() {
        let distance = distance_squared(entry.0.map(f64::from), point);
        if distance < best_distance {
            best = i;
            best_distance = distance;
        }
    }
    best
}

/// Map every pixel to its nearest palette entry and count the hits per entry.
pub fn map_counts(image: &Frame, palette: &[ColorSample]) -> Vec<u64> {
    let mut counts = vec![0u64; palette.len()];
    if palette.is_empty() {
        return counts;
    }
    for (color, count) in histogram(image) {
        counts[nearest(palette, &image::Rgb(color))] += count;
    }
    counts
}
