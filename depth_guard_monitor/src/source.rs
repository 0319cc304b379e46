// THEORY:
// The monitor needs disparity frames without depending on a particular camera SDK.
// Two sources implement the core's `DisparitySource` trait:
//
// 1.  **DirectorySource**: replays a recording, one grayscale PNG of raw disparity
//     per frame, in file-name order. A file that vanished mid-run reads as a
//     disconnected camera; a file that cannot be decoded is a decode error.
// 2.  **SyntheticSource**: fabricates a scene from the floor reference itself. The
//     first frame is the empty floor, later frames add an obstacle that widens and
//     brightens as it "approaches", plus a stripe of invalid pixels on the left edge.
//     Its native range is the full 8-bit range, so its floor matches the reference
//     exactly.

use depth_guard::parallel_pipeline::DisparitySource;
use depth_guard::{DisparityFrame, GrayFrame, ReferenceFrame, SourceError};
use image::ImageError;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct DirectorySource {
    paths: VecDeque<PathBuf>,
    max_disparity: f64,
}

impl DirectorySource {
    pub fn open<P: AsRef<Path>>(dir: P, max_disparity: f64) -> Result<Self, SourceError> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir)
            .map_err(|err| SourceError::Disconnected(format!("{}: {err}", dir.display())))?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
            })
            .collect();
        paths.sort();

        debug!("Found {} disparity frames in {}", paths.len(), dir.display());
        Ok(Self {
            paths: paths.into(),
            max_disparity,
        })
    }

    pub fn remaining(&self) -> usize {
        self.paths.len()
    }
}

impl DisparitySource for DirectorySource {
    fn max_disparity(&self) -> f64 {
        self.max_disparity
    }

    fn next_frame(&mut self) -> Result<Option<DisparityFrame>, SourceError> {
        let Some(path) = self.paths.pop_front() else {
            return Ok(None);
        };

        let image = image::open(&path).map_err(|err| match err {
            ImageError::IoError(io) => {
                SourceError::Disconnected(format!("{}: {io}", path.display()))
            }
            other => SourceError::Decode(format!("{}: {other}", path.display())),
        })?;
        Ok(Some(GrayFrame::from_gray_image(&image.to_luma8())?))
    }
}

pub struct SyntheticSource {
    floor: DisparityFrame,
    frames_total: u32,
    next: u32,
}

impl SyntheticSource {
    pub fn new(reference: &ReferenceFrame, frames_total: u32) -> Self {
        Self {
            floor: reference.frame().clone(),
            frames_total,
            next: 0,
        }
    }

    fn render(&self, index: u32) -> Result<DisparityFrame, SourceError> {
        if index == 0 {
            return Ok(self.floor.clone());
        }

        let (width, height) = self.floor.dimensions();
        let progress = f64::from(index) / f64::from(self.frames_total);
        let half_width = (progress * f64::from(width) / 2.0) as u32;
        let left = (width / 2).saturating_sub(half_width);
        let right = (width / 2 + half_width).min(width);
        let stripe = (width / 16).max(1);
        let obstacle = (60.0 + progress * 190.0) as u8;

        let mut data = self.floor.clone().into_vec();
        for row in data.chunks_exact_mut(width as usize) {
            for (x, sample) in row.iter_mut().enumerate() {
                let x = x as u32;
                if x < stripe {
                    *sample = 0;
                } else if x >= left && x < right {
                    *sample = obstacle;
                }
            }
        }
        Ok(GrayFrame::new(width, height, data)?)
    }
}

impl DisparitySource for SyntheticSource {
    fn max_disparity(&self) -> f64 {
        255.0
    }

    fn next_frame(&mut self) -> Result<Option<DisparityFrame>, SourceError> {
        if self.next >= self.frames_total {
            return Ok(None);
        }
        let frame = self.render(self.next)?;
        self.next += 1;
        Ok(Some(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depth_guard::{MountGeometry, analyze, build_reference, scale_factor_for};

    fn reference() -> ReferenceFrame {
        build_reference(&MountGeometry::new(64, 40, 45.0, -30.0, 50.0, 7.5, 883.15)).unwrap()
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("depth_guard_{name}_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn synthetic_scene_starts_empty_and_closes_in() {
        let reference = reference();
        let mut source = SyntheticSource::new(&reference, 10);
        let scale_factor = scale_factor_for(source.max_disparity()).unwrap();

        let mut scores = Vec::new();
        while let Some(frame) = source.next_frame().unwrap() {
            let analysis = analyze(&frame, scale_factor, &reference).unwrap();
            scores.push(analysis.danger.value());
            if scores.len() > 1 {
                assert!(analysis.occluded_pixels > 0);
            }
        }

        assert_eq!(scores.len(), 10);
        assert_eq!(scores[0], 0);
        assert!(scores[9] > 5, "scores {scores:?}");
    }

    #[test]
    fn directory_frames_are_replayed_in_name_order() {
        let dir = scratch_dir("replay");
        GrayFrame::filled(4, 2, 20).unwrap().save_png(dir.join("frame_002.png")).unwrap();
        GrayFrame::filled(4, 2, 10).unwrap().save_png(dir.join("frame_001.png")).unwrap();
        std::fs::write(dir.join("notes.txt"), "not a frame").unwrap();

        let mut source = DirectorySource::open(&dir, 95.0).unwrap();
        assert_eq!(source.remaining(), 2);
        assert_eq!(source.next_frame().unwrap().unwrap().get(0, 0), Some(10));
        assert_eq!(source.next_frame().unwrap().unwrap().get(0, 0), Some(20));
        assert!(source.next_frame().unwrap().is_none());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn vanished_frame_reads_as_disconnect() {
        let dir = scratch_dir("vanish");
        let path = dir.join("frame_001.png");
        GrayFrame::filled(4, 2, 10).unwrap().save_png(&path).unwrap();

        let mut source = DirectorySource::open(&dir, 95.0).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(
            source.next_frame(),
            Err(SourceError::Disconnected(_))
        ));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn corrupt_frame_is_a_decode_error() {
        let dir = scratch_dir("corrupt");
        std::fs::write(dir.join("frame_001.png"), b"definitely not png").unwrap();

        let mut source = DirectorySource::open(&dir, 95.0).unwrap();
        assert!(matches!(source.next_frame(), Err(SourceError::Decode(_))));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_directory_reads_as_disconnect() {
        let missing = std::env::temp_dir().join("depth_guard_no_such_dir_for_sure");
        assert!(matches!(
            DirectorySource::open(missing, 95.0),
            Err(SourceError::Disconnected(_))
        ));
    }
}
