use crate::decoder::FrameSource;
use crate::extractor::{ClusterExtractor, DominantColorExtractor, Palette, QuickExtractor};
use crate::reducer::{sampling_rate, FrameReducer};
use crate::strip::ColorStrip;
use crate::{BarcodeConfig, BarcodeError, ColorSample, Frame, Result};
use log::{debug, info, warn};

/// Pipeline stage a progress event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Decoding and averaging frames
    Reading,
    /// Picking one color per averaged frame
    Extracting,
    /// Seeded k-means runs over a still scene
    Clustering,
}

/// Progress notification passed to the observer hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub stage: Stage,
    pub done: u64,
    pub total: Option<u64>,
}

type ProgressHook = Box<dyn FnMut(&Progress)>;

/// Runs one movie or scene summarization from start to finish.
///
/// Nothing is kept between runs and every failure aborts the run.
pub struct Pipeline {
    config: BarcodeConfig,
    progress: Option<ProgressHook>,
}

impl Pipeline {
    pub fn new(config: BarcodeConfig) -> Self {
        Self {
            config,
            progress: None,
        }
    }

    /// Observe progress through `hook`
    pub fn with_progress<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&Progress) + 'static,
    {
        self.progress = Some(Box::new(hook));
        self
    }

    pub fn config(&self) -> &BarcodeConfig {
        &self.config
    }

    fn report(&mut self, stage: Stage, done: u64, total: Option<u64>) {
        if let Some(hook) = self.progress.as_mut() {
            hook(&Progress { stage, done, total });
        }
    }

    /// Decode, average and extract one color per bucket of `source`
    pub fn movie_colors<S: FrameSource>(
        &mut self,
        source: &mut S,
    ) -> Result<Vec<ColorSample>> {
        let reduced = match source.frame_count() {
            Some(0) => return Err(BarcodeError::EmptySequence),
            Some(total) => self.reduce_counted(source, total)?,
            None => self.reduce_buffered(source)?,
        };
        if reduced.is_empty() {
            return Err(BarcodeError::EmptySequence);
        }

        info!("Generating bar code from {} buckets", reduced.len());
        let extractor =
            QuickExtractor::new(self.config.quick_resize, self.config.quick_colors);
        let total = reduced.len() as u64;
        let mut colors = Vec::with_capacity(reduced.len());
        for (i, frame) in reduced.iter().enumerate() {
            colors.push(extractor.extract(frame)?);
            self.report(Stage::Extracting, i as u64 + 1, Some(total));
        }
        Ok(colors)
    }

    /// Full movie mode: the barcode strip for `source`
    pub fn movie_barcode<S: FrameSource>(&mut self, source: &mut S) -> Result<ColorStrip> {
        let colors = self.movie_colors(source)?;
        ColorStrip::barcode(&colors)
    }

    /// Stream frames straight into the reducer when the count is known
    fn reduce_counted<S: FrameSource>(
        &mut self,
        source: &mut S,
        total: u64,
    ) -> Result<Vec<Frame>> {
        let rate = sampling_rate(total, self.config.target_length)?;
        info!("Reading {} frames, averaging every {}", total, rate);

        let mut reducer = FrameReducer::new(rate, self.config.frame_size())?;
        let mut reduced = Vec::new();
        let mut seen = 0u64;
        while let Some(frame) = source.next_frame()? {
            seen += 1;
            if let Some(mean) = reducer.push(&frame) {
                reduced.push(mean);
            }
            self.report(Stage::Reading, seen, Some(total));
        }

        if seen == 0 {
            return Err(BarcodeError::EmptySequence);
        }
        if seen != total {
            warn!("Expected {} frames but decoded {}", total, seen);
        }
        debug!("{} frames left over after the last full bucket", reducer.pending());
        Ok(reduced)
    }

    /// Without a frame count every resized frame is held until the source
    /// is exhausted.
    fn reduce_buffered<S: FrameSource>(&mut self, source: &mut S) -> Result<Vec<Frame>> {
        warn!("Frame count unknown, buffering the whole movie");
        let (width, height) = self.config.frame_size();
        let mut frames = Vec::new();
        while let Some(frame) = source.next_frame()? {
            frames.push(FrameReducer::resize(&frame, (width, height)));
            self.report(Stage::Reading, frames.len() as u64, None);
        }
        if frames.is_empty() {
            return Err(BarcodeError::EmptySequence);
        }

        let rate = sampling_rate(frames.len() as u64, self.config.target_length)?;
        info!("Resampling {} frames, averaging every {}", frames.len(), rate);
        let mut reducer = FrameReducer::new(rate, (width, height))?;
        Ok(frames
            .iter()
            .filter_map(|frame| reducer.push_resized(frame))
            .collect())
    }

    /// Cluster a still scene into its weighted dominant colors
    pub fn scene_colors(&mut self, image: &Frame) -> Result<Palette> {
        let extractor = ClusterExtractor {
            k: self.config.colors,
            max_iterations: self.config.max_iterations,
            tolerance: self.config.tolerance as f32,
            runs: self.config.runs,
            ..Default::default()
        };
        let runs = self.config.runs.max(1) as u64;

        let mut hook = self.progress.take();
        let result = extractor.extract_with_progress(image, |run| {
            if let Some(hook) = hook.as_mut() {
                hook(&Progress {
                    stage: Stage::Clustering,
                    done: run as u64,
                    total: Some(runs),
                });
            }
        });
        self.progress = hook;

        let palette = result?;
        info!("Found {} dominant colors", palette.len());
        Ok(palette)
    }

    /// Full scene mode: the palette and its bar chart. The bar spans the
    /// configured width, or the image width when none is set.
    pub fn scene_palette(&mut self, image: &Frame) -> Result<(Palette, ColorStrip)> {
        let palette = self.scene_colors(image)?;
        let width = self.config.bar_width.unwrap_or(image.width());
        let strip = ColorStrip::bar_chart(&palette, width)?;
        Ok((palette, strip))
    }
}
