// THEORY:
// `MountGeometry` is the only configuration the analysis core needs: where the
// camera sits, how it is tilted, and the optics that turn distance into disparity.
// It is validated once at startup; every later computation assumes the values are
// finite and in range, which keeps the per-row and per-frame code free of checks.
//
// Angles follow one convention throughout: degrees, negative = tilted toward the
// floor. Distances are centimetres, matching the stereo baseline unit.

use crate::core_modules::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_WIDTH: u32 = 640;
pub const DEFAULT_HEIGHT: u32 = 400;
pub const DEFAULT_MOUNT_ELEVATION_CM: f64 = 45.0;
pub const DEFAULT_MOUNT_ANGLE_DEG: f64 = -30.0;
pub const DEFAULT_VFOV_DEG: f64 = 50.0;
pub const DEFAULT_BASELINE_CM: f64 = 7.5;
pub const DEFAULT_FOCAL_CONST: f64 = 883.15;

/// Which end of the vertical field of view row 0 looks along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowOrientation {
    /// Row 0 takes the lowest ray (`-vfov/2 + mount_angle`), the last row the highest.
    #[default]
    BottomUp,
    /// Row 0 takes the highest ray (`+vfov/2 + mount_angle`).
    TopDown,
}

/// Fixed physical parameters of the camera mount and stereo optics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountGeometry {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Height of the camera above the floor.
    pub mount_elevation_cm: f64,
    /// Tilt of the optical axis from horizontal, negative = downward.
    pub mount_angle_deg: f64,
    /// Vertical field of view, in (0, 180).
    pub vfov_deg: f64,
    /// Distance between the two stereo imagers.
    pub baseline_cm: f64,
    /// Focal constant of the disparity formula.
    pub focal_const: f64,
    /// Row-to-angle direction of the reference curve.
    pub row_orientation: RowOrientation,
    /// Value given to singular rows when no regular row exists to copy from.
    pub singular_ceiling: u8,
}

impl Default for MountGeometry {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            mount_elevation_cm: DEFAULT_MOUNT_ELEVATION_CM,
            mount_angle_deg: DEFAULT_MOUNT_ANGLE_DEG,
            vfov_deg: DEFAULT_VFOV_DEG,
            baseline_cm: DEFAULT_BASELINE_CM,
            focal_const: DEFAULT_FOCAL_CONST,
            row_orientation: RowOrientation::BottomUp,
            singular_ceiling: u8::MAX,
        }
    }
}

impl MountGeometry {
    /// Builds a geometry with the default orientation and ceiling. Not validated.
    pub fn new(
        width: u32,
        height: u32,
        mount_elevation_cm: f64,
        mount_angle_deg: f64,
        vfov_deg: f64,
        baseline_cm: f64,
        focal_const: f64,
    ) -> Self {
        Self {
            width,
            height,
            mount_elevation_cm,
            mount_angle_deg,
            vfov_deg,
            baseline_cm,
            focal_const,
            ..Self::default()
        }
    }

    pub fn with_row_orientation(mut self, row_orientation: RowOrientation) -> Self {
        self.row_orientation = row_orientation;
        self
    }

    pub fn with_singular_ceiling(mut self, singular_ceiling: u8) -> Self {
        self.singular_ceiling = singular_ceiling;
        self
    }

    /// Reads a TOML file and validates it. Missing keys fall back to the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let geometry: MountGeometry = toml::from_str(contents)?;
        geometry.validate()?;
        Ok(geometry)
    }

    /// Checks every constraint the reference builder relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }

        let finite = [
            ("mount_elevation_cm", self.mount_elevation_cm),
            ("mount_angle_deg", self.mount_angle_deg),
            ("vfov_deg", self.vfov_deg),
            ("baseline_cm", self.baseline_cm),
            ("focal_const", self.focal_const),
        ];
        if let Some(&(name, value)) = finite.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ConfigError::non_finite(name, value));
        }

        if self.vfov_deg <= 0.0 || self.vfov_deg >= 180.0 {
            return Err(ConfigError::InvalidFieldOfView(self.vfov_deg));
        }

        let positive = [
            ("mount_elevation_cm", self.mount_elevation_cm),
            ("baseline_cm", self.baseline_cm),
            ("focal_const", self.focal_const),
        ];
        if let Some(&(name, value)) = positive.iter().find(|(_, v)| *v <= 0.0) {
            return Err(ConfigError::non_positive(name, value));
        }

        Ok(())
    }

    /// Viewing angle of a scanline, interpolated linearly across the field of view.
    ///
    /// A single-row frame looks along the optical axis.
    pub fn viewing_angle_deg(&self, row: u32) -> f64 {
        let t = if self.height <= 1 {
            0.5
        } else {
            f64::from(row) / f64::from(self.height - 1)
        };
        let t = match self.row_orientation {
            RowOrientation::BottomUp => t,
            RowOrientation::TopDown => 1.0 - t,
        };
        let low = -self.vfov_deg / 2.0 + self.mount_angle_deg;
        let high = self.vfov_deg / 2.0 + self.mount_angle_deg;
        low + (high - low) * t
    }

    /// The disparity formula: brightness-space disparity of a surface at `distance_cm`.
    pub fn depth_to_brightness(&self, distance_cm: f64) -> f64 {
        self.baseline_cm * self.focal_const / distance_cm
    }

    /// Distance implied by an 8-bit brightness, given the camera's native disparity range.
    ///
    /// Returns `None` for `0`, which carries no depth.
    pub fn brightness_to_depth(&self, brightness: u8, max_disparity: f64) -> Option<f64> {
        if brightness == 0 || max_disparity.is_nan() || max_disparity <= 0.0 {
            return None;
        }
        let disparity = max_disparity * f64::from(brightness) / 255.0;
        Some(self.baseline_cm * self.focal_const / disparity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn default_matches_deployed_mount() {
        let geometry = MountGeometry::default();
        assert_eq!((geometry.width, geometry.height), (640, 400));
        assert_eq!(geometry.mount_angle_deg, -30.0);
        assert!(geometry.validate().is_ok());
    }

    #[test]
    fn rejects_zero_dimensions() {
        let geometry = MountGeometry::new(0, 400, 45.0, -30.0, 50.0, 7.5, 883.15);
        assert!(matches!(
            geometry.validate(),
            Err(ConfigError::InvalidDimensions { width: 0, height: 400 })
        ));
    }

    #[test]
    fn rejects_degenerate_field_of_view() {
        for vfov in [0.0, -10.0, 180.0, 270.0] {
            let geometry = MountGeometry::new(640, 400, 45.0, -30.0, vfov, 7.5, 883.15);
            assert!(matches!(
                geometry.validate(),
                Err(ConfigError::InvalidFieldOfView(_))
            ));
        }
    }

    #[test]
    fn rejects_non_positive_optics() {
        let geometry = MountGeometry::new(640, 400, 45.0, -30.0, 50.0, 0.0, 883.15);
        assert!(matches!(
            geometry.validate(),
            Err(ConfigError::NonPositive { name: "baseline_cm", .. })
        ));
        let geometry = MountGeometry::new(640, 400, -1.0, -30.0, 50.0, 7.5, 883.15);
        assert!(matches!(
            geometry.validate(),
            Err(ConfigError::NonPositive { name: "mount_elevation_cm", .. })
        ));
    }

    #[test]
    fn rejects_non_finite_angle() {
        let geometry = MountGeometry::new(640, 400, 45.0, f64::NAN, 50.0, 7.5, 883.15);
        assert!(matches!(
            geometry.validate(),
            Err(ConfigError::NonFinite { name: "mount_angle_deg", .. })
        ));
    }

    #[test]
    fn viewing_angle_spans_field_of_view() {
        let geometry = MountGeometry::default();
        assert_relative_eq!(geometry.viewing_angle_deg(0), -55.0);
        assert_relative_eq!(geometry.viewing_angle_deg(399), -5.0);

        let flipped = geometry.with_row_orientation(RowOrientation::TopDown);
        assert_relative_eq!(flipped.viewing_angle_deg(0), -5.0);
        assert_relative_eq!(flipped.viewing_angle_deg(399), -55.0);
    }

    #[test]
    fn single_row_looks_along_optical_axis() {
        let geometry = MountGeometry::new(8, 1, 45.0, -20.0, 50.0, 7.5, 883.15);
        assert_relative_eq!(geometry.viewing_angle_deg(0), -20.0);
    }

    #[test]
    fn brightness_and_depth_are_inverse() {
        let geometry = MountGeometry::default();
        // Full-scale brightness maps back to the native maximum disparity.
        let depth = geometry.brightness_to_depth(255, 95.0).unwrap();
        assert_relative_eq!(depth, 7.5 * 883.15 / 95.0, epsilon = 1e-9);
        assert_relative_eq!(geometry.depth_to_brightness(depth), 95.0, epsilon = 1e-9);
        assert_eq!(geometry.brightness_to_depth(0, 95.0), None);
    }

    #[test]
    fn loads_partial_toml_over_defaults() {
        let geometry = MountGeometry::from_toml_str(
            r#"
            mount_elevation_cm = 30.0
            mount_angle_deg = -20.0
            row_orientation = "top_down"
            "#,
        )
        .unwrap();
        assert_eq!(geometry.mount_elevation_cm, 30.0);
        assert_eq!(geometry.row_orientation, RowOrientation::TopDown);
        assert_eq!(geometry.width, DEFAULT_WIDTH);
        assert_eq!(geometry.focal_const, DEFAULT_FOCAL_CONST);
    }

    #[test]
    fn invalid_toml_values_are_rejected() {
        assert!(matches!(
            MountGeometry::from_toml_str("vfov_deg = 0.0"),
            Err(ConfigError::InvalidFieldOfView(_))
        ));
        assert!(matches!(
            MountGeometry::from_toml_str("width = \"wide\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
