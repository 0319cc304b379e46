// THEORY:
// The danger score says *how much* a frame deviates from the floor; the anomaly
// grid says *where*. It slices the anomaly frame into a grid of rectangular chunks
// and averages each one, the same spatial pooling that turns hundreds of thousands
// of pixels into a few dozen regional summaries and cancels single-pixel noise.
//
// Key principles:
// 1.  **Spatial Pooling**: A chunk's mean anomaly is the unit of localisation.
//     Chunks on the right and bottom edges may be partial when the frame size is not
//     a multiple of the chunk size; they average only the pixels they cover.
// 2.  **Read-Only Summary**: The grid is derived from one anomaly frame and keeps no
//     history. It never feeds back into the danger score.
// 3.  **Coarse Bearing**: The hottest chunk's horizontal position is reported as the
//     left, centre or right third of the view, which is what an alert needs.

use crate::core_modules::error::FrameError;
use crate::core_modules::frame::AnomalyFrame;

/// Horizontal third of the view a chunk sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bearing {
    Left,
    Centre,
    Right,
}

impl std::fmt::Display for Bearing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Bearing::Left => write!(f, "left"),
            Bearing::Centre => write!(f, "ahead"),
            Bearing::Right => write!(f, "right"),
        }
    }
}

/// Summary of one rectangular region of an anomaly frame.
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyChunk {
    /// Column index of this chunk in the grid.
    pub chunk_x: u32,
    /// Row index of this chunk in the grid.
    pub chunk_y: u32,
    /// Average anomaly over the pixels the chunk covers.
    pub mean_anomaly: f64,
    /// Largest anomaly inside the chunk.
    pub peak: u8,
}

/// A grid of chunk summaries over one anomaly frame.
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyGrid {
    frame_width: u32,
    chunk_width: u32,
    chunk_height: u32,
    grid_width: u32,
    grid_height: u32,
    chunks: Vec<AnomalyChunk>,
}

impl AnomalyGrid {
    /// Slices `anomaly` into `chunk_width` × `chunk_height` regions and averages each.
    pub fn summarize(
        anomaly: &AnomalyFrame,
        chunk_width: u32,
        chunk_height: u32,
    ) -> Result<Self, FrameError> {
        if chunk_width == 0 || chunk_height == 0 {
            return Err(FrameError::EmptyFrame {
                width: chunk_width,
                height: chunk_height,
            });
        }

        let (width, height) = anomaly.dimensions();
        let grid_width = width.div_ceil(chunk_width);
        let grid_height = height.div_ceil(chunk_height);
        let num_chunks = (grid_width * grid_height) as usize;

        let mut sums = vec![0u64; num_chunks];
        let mut counts = vec![0u64; num_chunks];
        let mut peaks = vec![0u8; num_chunks];

        for (y, row) in anomaly.rows().enumerate() {
            let chunk_row = y as u32 / chunk_height;
            for (x, &value) in row.iter().enumerate() {
                let index = (chunk_row * grid_width + x as u32 / chunk_width) as usize;
                sums[index] += u64::from(value);
                counts[index] += 1;
                peaks[index] = peaks[index].max(value);
            }
        }

        let chunks = (0..num_chunks)
            .map(|index| AnomalyChunk {
                chunk_x: index as u32 % grid_width,
                chunk_y: index as u32 / grid_width,
                mean_anomaly: sums[index] as f64 / counts[index].max(1) as f64,
                peak: peaks[index],
            })
            .collect();

        Ok(Self {
            frame_width: width,
            chunk_width,
            chunk_height,
            grid_width,
            grid_height,
            chunks,
        })
    }

    /// `(columns, rows)` of the grid.
    pub fn grid_dimensions(&self) -> (u32, u32) {
        (self.grid_width, self.grid_height)
    }

    /// `(width, height)` of a full chunk in pixels.
    pub fn chunk_dimensions(&self) -> (u32, u32) {
        (self.chunk_width, self.chunk_height)
    }

    /// Chunks in row-major grid order.
    pub fn chunks(&self) -> &[AnomalyChunk] {
        &self.chunks
    }

    pub fn chunk(&self, chunk_x: u32, chunk_y: u32) -> Option<&AnomalyChunk> {
        if chunk_x >= self.grid_width || chunk_y >= self.grid_height {
            return None;
        }
        self.chunks.get((chunk_y * self.grid_width + chunk_x) as usize)
    }

    /// The chunk with the largest mean anomaly; the first one wins a tie.
    pub fn hottest_chunk(&self) -> Option<&AnomalyChunk> {
        self.chunks.iter().fold(None, |best: Option<&AnomalyChunk>, chunk| match best {
            Some(current) if current.mean_anomaly >= chunk.mean_anomaly => Some(current),
            _ => Some(chunk),
        })
    }

    /// Which third of the view the centre of `chunk` falls in.
    pub fn bearing_of(&self, chunk: &AnomalyChunk) -> Bearing {
        let left = chunk.chunk_x * self.chunk_width;
        let right = (left + self.chunk_width).min(self.frame_width);
        let centre = f64::from(left + right) / 2.0;
        let third = f64::from(self.frame_width) / 3.0;
        if centre < third {
            Bearing::Left
        } else if centre < 2.0 * third {
            Bearing::Centre
        } else {
            Bearing::Right
        }
    }

    pub fn hottest_bearing(&self) -> Option<Bearing> {
        self.hottest_chunk().map(|chunk| self.bearing_of(chunk))
    }
}
