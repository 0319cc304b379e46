//! Error types for the collision-danger core.

use std::fmt;
use thiserror::Error;

/// Invalid mount geometry or camera parameters, detected before any frame is processed.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Frame width or height is zero.
    #[error("frame dimensions must be non-zero, got {width}x{height}")]
    InvalidDimensions {
        /// Configured width in pixels.
        width: u32,
        /// Configured height in pixels.
        height: u32,
    },

    /// Vertical field of view outside the open interval (0, 180) degrees.
    #[error("vertical field of view must be in (0, 180) degrees, got {0}")]
    InvalidFieldOfView(f64),

    /// A parameter that must be strictly positive is not.
    #[error("{name} must be finite and greater than zero, got {value}")]
    NonPositive {
        /// Name of the offending parameter.
        name: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// A parameter is `NaN` or infinite.
    #[error("{name} must be finite, got {value}")]
    NonFinite {
        /// Name of the offending parameter.
        name: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// The camera reported an unusable maximum disparity.
    #[error("camera maximum disparity must be finite and greater than zero, got {0}")]
    InvalidMaxDisparity(f64),

    /// The configuration file could not be read.
    #[error("failed to read mount configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML for a mount geometry.
    #[error("failed to parse mount configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ConfigError {
    /// Creates a non-positive parameter error.
    #[must_use]
    pub const fn non_positive(name: &'static str, value: f64) -> Self {
        Self::NonPositive { name, value }
    }

    /// Creates a non-finite parameter error.
    #[must_use]
    pub const fn non_finite(name: &'static str, value: f64) -> Self {
        Self::NonFinite { name, value }
    }
}

/// Why a reference row could not be evaluated from the tangent model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainErrorKind {
    /// The viewing angle sits on the horizon or straight down/up.
    TangentSingularity,
    /// The implied floor distance is zero, negative or not finite.
    NonPositiveDistance,
}

impl fmt::Display for DomainErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TangentSingularity => write!(f, "tangent singularity"),
            Self::NonPositiveDistance => write!(f, "non-positive floor distance"),
        }
    }
}

/// A per-row failure of the floor model. Recovered locally while the reference is built.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("row {row}: {kind} at viewing angle {theta_deg} degrees")]
pub struct DomainError {
    /// Scanline index of the affected row.
    pub row: u32,
    /// Viewing angle of the row in degrees.
    pub theta_deg: f64,
    /// What went wrong.
    pub kind: DomainErrorKind,
}

/// A frame could not be scored.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// The disparity frame and reference disagree on dimensions.
    #[error(
        "disparity frame is {actual_width}x{actual_height} but the reference is {expected_width}x{expected_height}"
    )]
    ShapeMismatch {
        /// Reference width.
        expected_width: u32,
        /// Reference height.
        expected_height: u32,
        /// Disparity frame width.
        actual_width: u32,
        /// Disparity frame height.
        actual_height: u32,
    },

    /// The disparity rescale factor is zero, negative or not finite.
    #[error("scale factor must be finite and greater than zero, got {0}")]
    InvalidScaleFactor(f64),
}

/// A pixel buffer does not describe a valid frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Width or height is zero.
    #[error("frame dimensions must be non-zero, got {width}x{height}")]
    EmptyFrame {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },

    /// Buffer length differs from width × height.
    #[error("buffer size mismatch: expected {expected}, got {actual}")]
    BufferSizeMismatch {
        /// Expected buffer length.
        expected: usize,
        /// Actual buffer length.
        actual: usize,
    },
}

impl FrameError {
    /// Creates a buffer size mismatch error.
    #[must_use]
    pub const fn buffer_mismatch(expected: usize, actual: usize) -> Self {
        Self::BufferSizeMismatch { expected, actual }
    }
}

/// A disparity source failed to deliver a frame.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The device stopped responding.
    #[error("camera disconnected: {0}")]
    Disconnected(String),

    /// A captured buffer could not be decoded.
    #[error("failed to decode disparity frame: {0}")]
    Decode(String),

    /// A decoded buffer did not form a valid frame.
    #[error(transparent)]
    Frame(#[from] FrameError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_names_parameter() {
        let err = ConfigError::non_positive("mount_elevation_cm", -1.0);
        let msg = format!("{err}");
        assert!(msg.contains("mount_elevation_cm"));
        assert!(msg.contains("-1"));
    }

    #[test]
    fn domain_error_display() {
        let err = DomainError {
            row: 12,
            theta_deg: 0.0,
            kind: DomainErrorKind::TangentSingularity,
        };
        let msg = format!("{err}");
        assert!(msg.contains("row 12"));
        assert!(msg.contains("tangent singularity"));
    }

    #[test]
    fn shape_mismatch_reports_both_shapes() {
        let err = AnalysisError::ShapeMismatch {
            expected_width: 640,
            expected_height: 400,
            actual_width: 320,
            actual_height: 200,
        };
        let msg = format!("{err}");
        assert!(msg.contains("640x400"));
        assert!(msg.contains("320x200"));
    }

    #[test]
    fn frame_error_buffer_mismatch() {
        let msg = format!("{}", FrameError::buffer_mismatch(8, 6));
        assert!(msg.contains('8'));
        assert!(msg.contains('6'));
    }
}
