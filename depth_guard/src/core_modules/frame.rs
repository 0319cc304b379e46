// THEORY:
// `GrayFrame` is the "dumb" data container every stage of the core exchanges: a
// dense, row-major grid of 8-bit samples with fixed dimensions. Raw disparity,
// the floor reference and the anomaly map all share this shape, so comparing two
// frames is a single zipped pass over two flat buffers.
//
// Key principles:
// 1.  **Validated Shape**: A frame can only be built when its buffer length equals
//     width × height and neither dimension is zero. Everything downstream relies on
//     that, so indexing never needs bounds juggling and a mean never divides by zero.
// 2.  **No Semantics**: The container does not know whether a sample is disparity,
//     expected floor brightness or anomaly magnitude. The aliases below only name
//     the role a frame plays in the pipeline.
// 3.  **Image Interop**: Frames convert to and from `image::GrayImage` and can be
//     written as PNG for inspection.

use crate::core_modules::error::FrameError;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, GrayImage, ImageEncoder, Luma};
use std::path::Path;

/// A dense, row-major grid of unsigned 8-bit samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayFrame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

/// Disparity samples: `0` is invalid, larger values are closer.
pub type DisparityFrame = GrayFrame;

/// Per-pixel deviation from the expected floor: `0` matches, larger is more unexpected.
pub type AnomalyFrame = GrayFrame;

impl GrayFrame {
    /// Wraps a row-major buffer, checking it holds exactly `width * height` samples.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::EmptyFrame { width, height });
        }
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(FrameError::buffer_mismatch(expected, data.len()));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A frame with every sample set to `value`.
    pub fn filled(width: u32, height: u32, value: u8) -> Result<Self, FrameError> {
        Self::new(width, height, vec![value; width as usize * height as usize])
    }

    /// Builds a frame from equally sized rows.
    pub fn from_rows<R: AsRef<[u8]>>(rows: &[R]) -> Result<Self, FrameError> {
        let height = rows.len() as u32;
        let width = rows.first().map_or(0, |row| row.as_ref().len()) as u32;
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for row in rows {
            data.extend_from_slice(row.as_ref());
        }
        // Ragged rows surface as a length mismatch.
        Self::new(width, height, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// `(width, height)`.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always false: zero-sized frames cannot be constructed.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Flat offset of `(x, y)`, computed in `usize` like the buffer length.
    fn index(&self, x: u32, y: u32) -> usize {
        pixel_index(self.width, x, y)
    }

    /// The sample at column `x`, row `y`, or `None` outside the frame.
    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get(self.index(x, y)).copied()
    }

    /// One scanline.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let start = self.index(0, y);
        self.data.get(start..start + self.width as usize)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        self.data.chunks_exact(self.width as usize)
    }

    /// Mean sample value over the whole frame, no masking.
    pub fn mean(&self) -> f64 {
        let sum: u64 = self.data.iter().map(|&v| u64::from(v)).sum();
        sum as f64 / self.data.len() as f64
    }

    pub fn to_gray_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            Luma([self.data[self.index(x, y)]])
        })
    }

    pub fn from_gray_image(image: &GrayImage) -> Result<Self, FrameError> {
        Self::new(image.width(), image.height(), image.as_raw().clone())
    }

    /// Writes the frame as an 8-bit grayscale PNG.
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<(), image::ImageError> {
        let output = std::fs::File::create(path)?;
        let encoder = PngEncoder::new(output);
        encoder.write_image(&self.data, self.width, self.height, ExtendedColorType::L8)?;
        Ok(())
    }
}

fn pixel_index(width: u32, x: u32, y: u32) -> usize {
    y as usize * width as usize + x as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_buffer_length() {
        let err = GrayFrame::new(4, 2, vec![0; 7]).unwrap_err();
        assert_eq!(err, FrameError::buffer_mismatch(8, 7));
    }

    #[test]
    fn rejects_zero_dimensions() {
        assert!(matches!(
            GrayFrame::new(0, 2, Vec::new()),
            Err(FrameError::EmptyFrame { width: 0, height: 2 })
        ));
        let no_rows: [[u8; 0]; 0] = [];
        assert!(GrayFrame::from_rows(&no_rows).is_err());
    }

    #[test]
    fn rejects_ragged_rows() {
        let rows = vec![vec![1u8, 2, 3], vec![4u8, 5]];
        assert!(matches!(
            GrayFrame::from_rows(&rows),
            Err(FrameError::BufferSizeMismatch { .. })
        ));
    }

    #[test]
    fn indexes_row_major() {
        let frame = GrayFrame::from_rows(&[[1u8, 2, 3], [4, 5, 6]]).unwrap();
        assert_eq!(frame.dimensions(), (3, 2));
        assert_eq!(frame.get(0, 0), Some(1));
        assert_eq!(frame.get(2, 1), Some(6));
        assert_eq!(frame.get(3, 0), None);
        assert_eq!(frame.row(1), Some(&[4u8, 5, 6][..]));
        assert_eq!(frame.rows().count(), 2);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn offsets_past_u32_range_do_not_wrap() {
        // 70_000 x 70_000 samples is more than u32::MAX.
        let offset = pixel_index(70_000, 5, 69_999);
        assert_eq!(offset, 69_999usize * 70_000 + 5);
        assert!(offset > u32::MAX as usize);
    }

    #[test]
    fn mean_covers_every_sample() {
        let frame = GrayFrame::from_rows(&[[0u8, 0, 0, 0], [30, 30, 30, 30]]).unwrap();
        assert_eq!(frame.mean(), 15.0);
    }

    #[test]
    fn gray_image_conversion_keeps_layout() {
        let frame = GrayFrame::from_rows(&[[10u8, 20], [30, 40], [50, 60]]).unwrap();
        let image = frame.to_gray_image();
        assert_eq!(image.dimensions(), (2, 3));
        assert_eq!(image.get_pixel(1, 2).0, [60]);
        assert_eq!(GrayFrame::from_gray_image(&image).unwrap(), frame);
    }

    #[test]
    fn save_png_writes_decodable_file() {
        let frame = GrayFrame::from_rows(&[[0u8, 128, 255], [255, 128, 0]]).unwrap();
        let path = std::env::temp_dir()
            .join(format!("depth_guard_frame_{}.png", std::process::id()));

        frame.save_png(&path).expect("Error Saving File.");
        let decoded = image::open(&path).expect("Error Opening File.").to_luma8();
        let _ = std::fs::remove_file(&path);

        assert_eq!(GrayFrame::from_gray_image(&decoded).unwrap(), frame);
    }
}
