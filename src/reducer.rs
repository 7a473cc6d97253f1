use crate::{BarcodeError, Frame, Result};
use image::imageops::{self, FilterType};
use log::debug;

/// Number of consecutive frames averaged into one barcode column.
///
/// Rejects a zero `target_length`, and any input too short to give every
/// column at least one frame.
pub fn sampling_rate(total_frames: u64, target_length: usize) -> Result<usize> {
    if target_length == 0 {
        return Err(BarcodeError::InvalidRate(
            "barcode length must be greater than 0".to_string(),
        ));
    }
    let rate = total_frames / target_length as u64;
    if rate == 0 {
        return Err(BarcodeError::InvalidRate(format!(
            "{} frames cannot fill a barcode of length {}",
            total_frames, target_length
        )));
    }
    Ok(rate as usize)
}

/// Shrinks frames to a fixed resolution and collapses each run of
/// `sampling_rate` frames into its per-pixel mean.
///
/// A trailing run shorter than `sampling_rate` is never emitted.
#[derive(Debug)]
pub struct FrameReducer {
    sampling_rate: usize,
    width: u32,
    height: u32,
    sums: Vec<f32>,
    count: usize,
}

impl FrameReducer {
    /// Create a reducer averaging `sampling_rate` frames at `size` resolution
    pub fn new(sampling_rate: usize, size: (u32, u32)) -> Result<Self> {
        if sampling_rate < 1 {
            return Err(BarcodeError::InvalidRate(
                "sampling rate must be at least 1".to_string(),
            ));
        }
        let (width, height) = size;
        Ok(Self {
            sampling_rate,
            width,
            height,
            sums: vec![0.0; width as usize * height as usize * 3],
            count: 0,
        })
    }

    pub fn sampling_rate(&self) -> usize {
        self.sampling_rate
    }

    /// Frames accumulated towards the current bucket
    pub fn pending(&self) -> usize {
        self.count
    }

    /// Shrink `frame` to `size` with bicubic interpolation
    pub fn resize(frame: &Frame, size: (u32, u32)) -> Frame {
        if frame.dimensions() == size {
            frame.clone()
        } else {
            imageops::resize(frame, size.0, size.1, FilterType::CatmullRom)
        }
    }

    /// Add a frame that is normally already at the reducer's resolution.
    /// Anything else is resized first.
    ///
    /// Returns the averaged frame when this completes a bucket.
    pub(crate) fn push_resized(&mut self, frame: &Frame) -> Option<Frame> {
        if frame.dimensions() != (self.width, self.height) {
            return self.push(frame);
        }
        for (sum, &sample) in self.sums.iter_mut().zip(frame.as_raw()) {
            *sum += sample as f32;
        }
        self.count += 1;

        if self.count < self.sampling_rate {
            return None;
        }

        let divisor = self.count as f32;
        let mean = self.sums.iter().map(|&sum| (sum / divisor) as u8).collect();
        self.sums.iter_mut().for_each(|sum| *sum = 0.0);
        self.count = 0;
        Frame::from_raw(self.width, self.height, mean)
    }

    /// Resize and add a frame, returning the averaged frame when this
    /// completes a bucket.
    pub fn push(&mut self, frame: &Frame) -> Option<Frame> {
        let resized = Self::resize(frame, (self.width, self.height));
        self.push_resized(&resized)
    }

    /// Reduce a whole sequence. Fails on an empty sequence.
    pub fn reduce<I>(&mut self, frames: I) -> Result<Vec<Frame>>
    where
        I: IntoIterator<Item = Frame>,
    {
        let mut seen = 0usize;
        let mut reduced = Vec::new();
        for frame in frames {
            seen += 1;
            if let Some(mean) = self.push(&frame) {
                reduced.push(mean);
            }
        }
        if seen == 0 {
            return Err(BarcodeError::EmptySequence);
        }
        debug!(
            "Reduced {} frames into {} buckets, {} left over",
            seen,
            reduced.len(),
            self.count
        );
        Ok(reduced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(width: u32, height: u32, color: [u8; 3]) -> Frame {
        Frame::from_pixel(width, height, Rgb(color))
    }

    #[test]
    fn test_sampling_rate() {
        assert_eq!(sampling_rate(14400, 1440).unwrap(), 10);
        assert_eq!(sampling_rate(14439, 1440).unwrap(), 10);
        assert_eq!(sampling_rate(10, 2).unwrap(), 5);
    }

    #[test]
    fn test_sampling_rate_too_short() {
        assert!(matches!(
            sampling_rate(1000, 1440),
            Err(BarcodeError::InvalidRate(_))
        ));
        assert!(matches!(
            sampling_rate(1000, 0),
            Err(BarcodeError::InvalidRate(_))
        ));
    }

    #[test]
    fn test_zero_rate_rejected() {
        assert!(matches!(
            FrameReducer::new(0, (4, 4)),
            Err(BarcodeError::InvalidRate(_))
        ));
    }

    #[test]
    fn test_empty_sequence() {
        let mut reducer = FrameReducer::new(2, (4, 4)).unwrap();
        assert!(matches!(
            reducer.reduce(Vec::new()),
            Err(BarcodeError::EmptySequence)
        ));
    }

    #[test]
    fn test_bucket_count_drops_partial_tail() {
        for (frames, rate) in [(10usize, 3usize), (9, 3), (2, 3), (7, 1), (12, 5)] {
            let mut reducer = FrameReducer::new(rate, (4, 3)).unwrap();
            let input = (0..frames).map(|_| solid(4, 3, [9, 9, 9]));
            let reduced = reducer.reduce(input).unwrap();
            assert_eq!(
                reduced.len(),
                frames / rate,
                "{} frames at rate {}",
                frames,
                rate
            );
            assert_eq!(reducer.pending(), frames % rate);
        }
    }

    #[test]
    fn test_bucket_is_mean_of_frames() {
        let mut reducer = FrameReducer::new(3, (2, 2)).unwrap();
        let input = vec![
            solid(2, 2, [0, 30, 255]),
            solid(2, 2, [10, 60, 255]),
            solid(2, 2, [20, 91, 254]),
        ];
        let reduced = reducer.reduce(input).unwrap();
        assert_eq!(reduced.len(), 1);
        // 181 / 3 and 764 / 3 truncate
        assert_eq!(*reduced[0].get_pixel(1, 1), Rgb([10, 60, 254]));
    }

    #[test]
    fn test_frames_are_resized() {
        let mut reducer = FrameReducer::new(1, (16, 9)).unwrap();
        let mean = reducer.push(&solid(64, 36, [0, 0, 0])).unwrap();
        assert_eq!(mean.dimensions(), (16, 9));
        assert_eq!(*mean.get_pixel(8, 4), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_buckets_are_independent() {
        let mut reducer = FrameReducer::new(2, (1, 1)).unwrap();
        assert!(reducer.push(&solid(1, 1, [200, 0, 0])).is_none());
        let first = reducer.push(&solid(1, 1, [100, 0, 0])).unwrap();
        assert!(reducer.push(&solid(1, 1, [0, 0, 40])).is_none());
        let second = reducer.push(&solid(1, 1, [0, 0, 20])).unwrap();
        assert_eq!(*first.get_pixel(0, 0), Rgb([150, 0, 0]));
        assert_eq!(*second.get_pixel(0, 0), Rgb([0, 0, 30]));
    }

    #[test]
    fn test_push_resized_never_truncates_mismatched_frames() {
        let mut reducer = FrameReducer::new(2, (4, 2)).unwrap();
        assert!(reducer.push_resized(&solid(8, 4, [0, 0, 0])).is_none());
        let mean = reducer.push_resized(&solid(4, 2, [40, 0, 0])).unwrap();
        assert_eq!(mean.dimensions(), (4, 2));
        assert_eq!(*mean.get_pixel(3, 1), Rgb([20, 0, 0]));
    }
}
