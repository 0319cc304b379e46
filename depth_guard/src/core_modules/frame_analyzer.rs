// THEORY:
// The frame analyzer scores a single disparity frame against the static floor
// reference. It is stateless: the same three inputs always give the same score,
// and nothing carries over between frames.
//
// The per-pixel path is four steps fused into one pass:
// 1.  **Rescale**: the camera's native disparity range is stretched into 0..255 by
//     `scale_factor` (normally `255 / max_disparity`), truncating into `u8`.
// 2.  **Occlusion Fill**: a sample that is still 0 carries no depth. It is assumed
//     to be floor and takes the reference value, so sensor holes never read as
//     danger.
// 3.  **Wide Difference**: `|effective - reference|` is taken in `i16`, where every
//     `u8` pair fits, then clamped back into `u8`. Unsigned wraparound cannot occur.
// 4.  **Aggregate**: the mean anomaly over the whole frame, divided by 5, rounded
//     and clamped, is the 0..10 danger score (10 = most danger).

use crate::core_modules::error::{AnalysisError, ConfigError};
use crate::core_modules::frame::{AnomalyFrame, DisparityFrame, GrayFrame};
use crate::core_modules::reference_model::ReferenceFrame;

/// Mean anomaly that corresponds to one danger point.
pub const DANGER_SCALE: f64 = 5.0;
/// Highest danger score.
pub const MAX_DANGER: u8 = 10;

/// Collision danger in `0..=10`, 10 being the most dangerous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DangerScore(u8);

impl DangerScore {
    /// Clamps a raw value into range.
    pub fn new(value: u8) -> Self {
        Self(value.min(MAX_DANGER))
    }

    /// `clamp(round(mean / 5), 0, 10)`.
    pub fn from_mean_anomaly(mean_anomaly: f64) -> Self {
        if mean_anomaly.is_nan() {
            return Self(0);
        }
        let scaled = (mean_anomaly / DANGER_SCALE).round();
        Self(scaled.clamp(0.0, f64::from(MAX_DANGER)) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// True when the score is strictly above `threshold`.
    pub fn exceeds(self, threshold: u8) -> bool {
        self.0 > threshold
    }

    /// The opposite convention, 10 = safest.
    pub fn inverted(self) -> u8 {
        MAX_DANGER - self.0
    }
}

impl std::fmt::Display for DangerScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything the analyzer learned about one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameAnalysis {
    /// The 0..10 danger score.
    pub danger: DangerScore,
    /// Per-pixel deviation from the expected floor.
    pub anomaly: AnomalyFrame,
    /// Mean of `anomaly` before scaling into a score.
    pub mean_anomaly: f64,
    /// Samples that were 0 after rescaling and took the reference value.
    pub occluded_pixels: usize,
}

/// Maps the camera's native disparity range onto 0..255.
pub fn scale_factor_for(max_disparity: f64) -> Result<f64, ConfigError> {
    if !max_disparity.is_finite() || max_disparity <= 0.0 {
        return Err(ConfigError::InvalidMaxDisparity(max_disparity));
    }
    Ok(255.0 / max_disparity)
}

/// `|effective - reference|` without unsigned underflow.
#[inline]
pub fn anomaly_value(effective: u8, reference: u8) -> u8 {
    let difference = (i16::from(effective) - i16::from(reference)).abs();
    difference.clamp(0, 255) as u8
}

#[inline]
fn rescale_sample(raw: u8, scale_factor: f64) -> u8 {
    // `as` saturates, so an oversized factor pins at 255 instead of wrapping.
    (f64::from(raw) * scale_factor) as u8
}

/// Rescales a raw disparity frame into the 0..255 brightness space.
pub fn rescale(raw: &DisparityFrame, scale_factor: f64) -> Result<DisparityFrame, AnalysisError> {
    check_scale_factor(scale_factor)?;
    let data = raw
        .as_slice()
        .iter()
        .map(|&sample| rescale_sample(sample, scale_factor))
        .collect();
    GrayFrame::new(raw.width(), raw.height(), data)
        .map_err(|_| shape_mismatch(raw, raw.dimensions()))
}

/// Scores a raw disparity frame against the floor reference.
pub fn analyze(
    raw: &DisparityFrame,
    scale_factor: f64,
    reference: &ReferenceFrame,
) -> Result<FrameAnalysis, AnalysisError> {
    if raw.dimensions() != reference.dimensions() {
        return Err(shape_mismatch(raw, reference.dimensions()));
    }
    check_scale_factor(scale_factor)?;

    let mut occluded_pixels = 0usize;
    let mut sum = 0u64;
    let anomaly_data: Vec<u8> = raw
        .as_slice()
        .iter()
        .zip(reference.as_slice())
        .map(|(&sample, &expected)| {
            let mut effective = rescale_sample(sample, scale_factor);
            if effective == 0 {
                effective = expected;
                occluded_pixels += 1;
            }
            let anomaly = anomaly_value(effective, expected);
            sum += u64::from(anomaly);
            anomaly
        })
        .collect();

    let mean_anomaly = sum as f64 / anomaly_data.len() as f64;
    let anomaly = GrayFrame::new(raw.width(), raw.height(), anomaly_data)
        .map_err(|_| shape_mismatch(raw, reference.dimensions()))?;

    Ok(FrameAnalysis {
        danger: DangerScore::from_mean_anomaly(mean_anomaly),
        anomaly,
        mean_anomaly,
        occluded_pixels,
    })
}

fn check_scale_factor(scale_factor: f64) -> Result<(), AnalysisError> {
    if !scale_factor.is_finite() || scale_factor <= 0.0 {
        return Err(AnalysisError::InvalidScaleFactor(scale_factor));
    }
    Ok(())
}

fn shape_mismatch(raw: &DisparityFrame, expected: (u32, u32)) -> AnalysisError {
    AnalysisError::ShapeMismatch {
        expected_width: expected.0,
        expected_height: expected.1,
        actual_width: raw.width(),
        actual_height: raw.height(),
    }
}
