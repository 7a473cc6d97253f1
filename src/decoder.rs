use crate::{BarcodeError, Frame, Result};
use ffmpeg_next as ffmpeg;
use log::{debug, info, warn};
use std::collections::VecDeque;
use std::path::Path;

/// An ordered, finite supply of RGB frames
pub trait FrameSource {
    /// Total number of frames, if the source knows it up front
    fn frame_count(&self) -> Option<u64>;

    /// The next frame in temporal order, or `None` once exhausted
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Video decoder that extracts RGB frames from video files
pub struct VideoDecoder {
    input_context: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: Option<ffmpeg::software::scaling::Context>,
    total_frames: Option<u64>,
    frames_decoded: u64,
    eof_sent: bool,
    fps: f64,
    duration: f64,
}

fn cannot_open(path: &Path, reason: impl ToString) -> BarcodeError {
    BarcodeError::CannotOpen {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

impl VideoDecoder {
    /// Open a video file and prepare its best video stream for decoding
    pub fn new(path: &Path) -> Result<Self> {
        if let Err(e) = ffmpeg::init() {
            debug!("FFmpeg init error: {:?}", e);
        }

        debug!("Attempting to open video file: {}", path.display());
        let input_context = ffmpeg::format::input(&path).map_err(|e| cannot_open(path, e))?;

        let stream = input_context
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| cannot_open(path, "no video stream found"))?;
        let stream_index = stream.index();
        info!("Found video stream {} in file '{}'", stream_index, path.display());

        let parameters = stream.parameters();
        let context_decoder = ffmpeg::codec::context::Context::from_parameters(parameters)
            .map_err(|e| cannot_open(path, format!("failed to create codec context: {}", e)))?;
        let decoder = context_decoder
            .decoder()
            .video()
            .map_err(|e| cannot_open(path, format!("failed to create video decoder: {}", e)))?;

        let fps = stream.avg_frame_rate();
        let fps = if fps.denominator() != 0 {
            fps.numerator() as f64 / fps.denominator() as f64
        } else {
            25.0
        };

        let duration = if stream.duration() != ffmpeg::ffi::AV_NOPTS_VALUE {
            stream.duration() as f64 * stream.time_base().numerator() as f64
                / stream.time_base().denominator() as f64
        } else {
            0.0
        };

        let reported = stream.frames();
        let total_frames = if reported > 0 {
            Some(reported as u64)
        } else {
            debug!("Container does not report a frame count, counting packets");
            match count_packets(path, stream_index) {
                Ok(0) => None,
                Ok(count) => Some(count),
                Err(e) => {
                    warn!("Error in getting total frames: {}", e);
                    None
                }
            }
        };

        debug!(
            "Video info: {}x{}, {:.2} FPS, {:.2}s duration, {:?} frames",
            decoder.width(),
            decoder.height(),
            fps,
            duration,
            total_frames
        );

        Ok(Self {
            input_context,
            stream_index,
            decoder,
            scaler: None,
            total_frames,
            frames_decoded: 0,
            eof_sent: false,
            fps,
            duration,
        })
    }

    /// Get video FPS
    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Get video duration in seconds
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Get video dimensions
    pub fn dimensions(&self) -> (u32, u32) {
        (self.decoder.width(), self.decoder.height())
    }

    /// Number of frames handed out so far
    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    fn next_packet(&mut self) -> Option<ffmpeg::Packet> {
        let stream_index = self.stream_index;
        self.input_context
            .packets()
            .find_map(|(stream, packet)| (stream.index() == stream_index).then_some(packet))
    }

    /// Convert a decoded frame to packed RGB24
    fn convert_frame(&mut self, frame: &ffmpeg::frame::Video) -> Result<Frame> {
        let width = frame.width();
        let height = frame.height();

        if self.scaler.is_none() {
            self.scaler = Some(ffmpeg::software::scaling::Context::get(
                frame.format(),
                width,
                height,
                ffmpeg::format::Pixel::RGB24,
                width,
                height,
                ffmpeg::software::scaling::Flags::BILINEAR,
            )?);
        }

        let mut rgb_frame = ffmpeg::frame::Video::empty();
        if let Some(ref mut scaler) = self.scaler {
            scaler.run(frame, &mut rgb_frame)?;
        }

        // Rows may be padded past width * 3
        let row = width as usize * 3;
        let stride = rgb_frame.stride(0);
        let data = rgb_frame.data(0);
        let mut packed = Vec::with_capacity(row * height as usize);
        for y in 0..height as usize {
            packed.extend_from_slice(&data[y * stride..y * stride + row]);
        }

        debug!("Decoded frame {}: {}x{}", self.frames_decoded, width, height);

        Frame::from_raw(width, height, packed)
            .ok_or(BarcodeError::VideoDecoding(ffmpeg::Error::InvalidData))
    }
}

impl FrameSource for VideoDecoder {
    fn frame_count(&self) -> Option<u64> {
        self.total_frames
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let mut decoded_frame = ffmpeg::frame::Video::empty();

        loop {
            match self.decoder.receive_frame(&mut decoded_frame) {
                Ok(()) => {
                    self.frames_decoded += 1;
                    return self.convert_frame(&decoded_frame).map(Some);
                }
                Err(ffmpeg::Error::Eof) => return Ok(None),
                Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::ffi::EAGAIN => {}
                Err(e) => return Err(e.into()),
            }

            if self.eof_sent {
                return Ok(None);
            }

            match self.next_packet() {
                Some(packet) => self.decoder.send_packet(&packet)?,
                None => {
                    self.decoder.send_eof()?;
                    self.eof_sent = true;
                }
            }
        }
    }
}

/// Count the packets of one stream without decoding them
fn count_packets(path: &Path, stream_index: usize) -> Result<u64> {
    let mut input = ffmpeg::format::input(&path)?;
    let count = input
        .packets()
        .filter(|(stream, _)| stream.index() == stream_index)
        .count();
    Ok(count as u64)
}

/// In-memory frame source
#[derive(Debug, Default, Clone)]
pub struct FrameSequence {
    frames: VecDeque<Frame>,
    total: u64,
}

impl FrameSequence {
    /// Create a sequence that yields `frames` in order
    pub fn new(frames: Vec<Frame>) -> Self {
        let total = frames.len() as u64;
        Self {
            frames: frames.into(),
            total,
        }
    }

    /// Frames not yet handed out
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for FrameSequence {
    fn frame_count(&self) -> Option<u64> {
        Some(self.total)
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(self.frames.pop_front())
    }
}

/// Decode a still image into an RGB raster
pub fn load_image(path: &Path) -> Result<Frame> {
    let image = image::open(path).map_err(|e| cannot_open(path, e))?;
    debug!("Loaded image {}: {}x{}", path.display(), image.width(), image.height());
    Ok(image.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    /// Render a `testsrc` clip of `width`x`height` at 10 fps with the ffmpeg
    /// CLI. `None` when ffmpeg is not installed.
    fn create_test_video(dir: &Path, name: &str, width: u32, height: u32) -> Option<PathBuf> {
        let video_path = dir.join(name);
        let source = format!("testsrc=duration=1:size={}x{}:rate=10", width, height);
        let output = std::process::Command::new("ffmpeg")
            .args(["-f", "lavfi", "-i", &source, "-pix_fmt", "yuv420p", "-y"])
            .arg(&video_path)
            .output();

        match output {
            Ok(result) if result.status.success() => Some(video_path),
            _ => {
                eprintln!("ffmpeg not available, skipping video test");
                None
            }
        }
    }

    fn decode_all(decoder: &mut VideoDecoder) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Some(frame) = decoder.next_frame().unwrap() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn test_decode_every_frame() {
        let dir = tempfile::tempdir().unwrap();
        let Some(video) = create_test_video(dir.path(), "clip.mp4", 160, 120) else {
            return;
        };

        let mut decoder = VideoDecoder::new(&video).unwrap();
        assert_eq!(decoder.dimensions(), (160, 120));
        assert_eq!(decoder.frame_count(), Some(10));

        let frames = decode_all(&mut decoder);
        assert_eq!(frames.len(), 10);
        assert!(frames.iter().all(|frame| frame.dimensions() == (160, 120)));
        assert_eq!(decoder.frames_decoded(), 10);

        // Drained decoders stay drained
        assert!(decoder.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_decode_padded_rows() {
        // 150 * 3 bytes is not a multiple of ffmpeg's line alignment
        let dir = tempfile::tempdir().unwrap();
        let Some(video) = create_test_video(dir.path(), "narrow.mp4", 150, 100) else {
            return;
        };

        let mut decoder = VideoDecoder::new(&video).unwrap();
        let frame = decoder.next_frame().unwrap().unwrap();
        assert_eq!(frame.dimensions(), (150, 100));
        assert_eq!(frame.as_raw().len(), 150 * 100 * 3);

        // testsrc draws color bars, so a packed row holds many colors
        let first_row: Vec<_> = (0..150).map(|x| *frame.get_pixel(x, 5)).collect();
        assert!(first_row.windows(2).any(|pair| pair[0] != pair[1]));
    }

    #[test]
    fn test_frame_count_from_packets() {
        // Matroska does not store a frame count, so the packets are counted
        let dir = tempfile::tempdir().unwrap();
        let Some(video) = create_test_video(dir.path(), "clip.mkv", 160, 120) else {
            return;
        };

        let mut decoder = VideoDecoder::new(&video).unwrap();
        assert_eq!(decoder.frame_count(), Some(10));
        assert_eq!(decode_all(&mut decoder).len(), 10);
    }

    #[test]
    fn test_invalid_file() {
        let invalid_path = PathBuf::from("nonexistent.mp4");
        let result = VideoDecoder::new(&invalid_path);
        assert!(matches!(result, Err(BarcodeError::CannotOpen { .. })));
    }

    #[test]
    fn test_frame_sequence_order() {
        let frames = vec![
            Frame::from_pixel(2, 2, image::Rgb([1, 0, 0])),
            Frame::from_pixel(2, 2, image::Rgb([2, 0, 0])),
        ];
        let mut sequence = FrameSequence::new(frames);
        assert_eq!(sequence.frame_count(), Some(2));

        assert_eq!(sequence.next_frame().unwrap().unwrap().get_pixel(0, 0)[0], 1);
        assert_eq!(sequence.next_frame().unwrap().unwrap().get_pixel(0, 0)[0], 2);
        assert!(sequence.next_frame().unwrap().is_none());
        assert_eq!(sequence.remaining(), 0);
    }

    #[test]
    fn test_load_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("still.png");
        image::RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 128]))
            .save(&path)
            .unwrap();

        let frame = load_image(&path).unwrap();
        assert_eq!(frame.dimensions(), (3, 2));
        assert_eq!(*frame.get_pixel(2, 1), image::Rgb([10, 20, 30]));

        let missing = load_image(&dir.path().join("missing.png"));
        assert!(matches!(missing, Err(BarcodeError::CannotOpen { .. })));
    }
}
