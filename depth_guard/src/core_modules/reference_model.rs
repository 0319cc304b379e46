// THEORY:
// The reference model answers one question per scanline: "what disparity would an
// empty floor produce here?" It is the static baseline every frame is compared
// against, built once at startup and rebuilt only when the mount moves.
//
// Key principles:
// 1.  **Tangent Floor Model**: A scanline looks along a ray at angle `theta` from
//     horizontal. That ray meets the floor at `elevation / |tan(theta)|`, and the
//     camera's own disparity formula `baseline * focal / distance` turns the
//     distance back into the 0..255 brightness space measured frames live in.
//     Steep rays hit the floor close by and come out bright; the curve is not
//     linear in the row index.
// 2.  **Row Constant**: The floor model has no horizontal term, so a row is one
//     value copied across the width.
// 3.  **Local Recovery**: A ray on the horizon never meets the floor and a
//     vertical ray has no tangent. Those rows raise a `DomainError`, are logged,
//     and borrow the value of the nearest regular row (lower row wins a tie) or,
//     when there is none, the configured ceiling. The map is always complete.
// 4.  **Determinism**: The build is a pure function of the geometry.

use crate::core_modules::error::{ConfigError, DomainError, DomainErrorKind};
use crate::core_modules::frame::GrayFrame;
use crate::core_modules::mount_geometry::MountGeometry;
use tracing::{debug, warn};

/// Angular distance, in degrees, within which a ray counts as horizontal or vertical.
const SINGULAR_ANGLE_EPSILON_DEG: f64 = 1e-9;

/// Expected-floor disparity map plus the diagnostics of its construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceFrame {
    frame: GrayFrame,
    row_values: Vec<u8>,
    domain_errors: Vec<DomainError>,
}

impl ReferenceFrame {
    /// The full-resolution map.
    pub fn frame(&self) -> &GrayFrame {
        &self.frame
    }

    /// One value per scanline, top row first.
    pub fn row_values(&self) -> &[u8] {
        &self.row_values
    }

    /// Rows that hit a singularity and were filled by substitution.
    pub fn domain_errors(&self) -> &[DomainError] {
        &self.domain_errors
    }

    pub fn width(&self) -> u32 {
        self.frame.width()
    }

    pub fn height(&self) -> u32 {
        self.frame.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.frame.dimensions()
    }

    pub fn as_slice(&self) -> &[u8] {
        self.frame.as_slice()
    }
}

#[cfg(test)]
impl ReferenceFrame {
    /// Wraps hand-written rows; each row must already be constant.
    pub(crate) fn from_rows_for_test<const W: usize>(rows: &[[u8; W]]) -> Self {
        let frame = GrayFrame::from_rows(rows).expect("test rows form a frame");
        let row_values = rows.iter().map(|row| row[0]).collect();
        Self {
            frame,
            row_values,
            domain_errors: Vec::new(),
        }
    }
}

/// Builds the expected-floor map for a mount geometry.
///
/// Fails only on an invalid geometry; per-row singularities are recovered.
pub fn build_reference(geometry: &MountGeometry) -> Result<ReferenceFrame, ConfigError> {
    geometry.validate()?;

    let mut domain_errors = Vec::new();
    let evaluated: Vec<Option<u8>> = (0..geometry.height)
        .map(|row| {
            let theta_deg = geometry.viewing_angle_deg(row);
            match floor_distance(geometry.mount_elevation_cm, theta_deg) {
                Ok(distance) => Some(quantize(geometry.depth_to_brightness(distance))),
                Err(kind) => {
                    let error = DomainError {
                        row,
                        theta_deg,
                        kind,
                    };
                    warn!("Reference {error}; substituting a neighbouring row");
                    domain_errors.push(error);
                    None
                }
            }
        })
        .collect();

    let row_values = resolve_singular_rows(&evaluated, geometry.singular_ceiling);

    let width = geometry.width as usize;
    let mut data = Vec::with_capacity(width * row_values.len());
    for &value in &row_values {
        data.extend(std::iter::repeat_n(value, width));
    }
    let frame = GrayFrame::new(geometry.width, geometry.height, data)
        .map_err(|_| ConfigError::InvalidDimensions {
            width: geometry.width,
            height: geometry.height,
        })?;

    debug!(
        "Built {}x{} floor reference (rows {}..{}, {} singular)",
        geometry.width,
        geometry.height,
        row_values.first().copied().unwrap_or_default(),
        row_values.last().copied().unwrap_or_default(),
        domain_errors.len()
    );

    Ok(ReferenceFrame {
        frame,
        row_values,
        domain_errors,
    })
}

/// Distance along the floor to where a ray at `theta_deg` lands.
fn floor_distance(mount_elevation_cm: f64, theta_deg: f64) -> Result<f64, DomainErrorKind> {
    let folded = theta_deg.rem_euclid(180.0);
    let on_horizon =
        folded < SINGULAR_ANGLE_EPSILON_DEG || 180.0 - folded < SINGULAR_ANGLE_EPSILON_DEG;
    let vertical = (folded - 90.0).abs() < SINGULAR_ANGLE_EPSILON_DEG;
    if on_horizon || vertical {
        return Err(DomainErrorKind::TangentSingularity);
    }

    let tangent = theta_deg.to_radians().tan();
    if !tangent.is_finite() || tangent == 0.0 {
        return Err(DomainErrorKind::TangentSingularity);
    }

    let distance = mount_elevation_cm / tangent.abs();
    if !distance.is_finite() || distance <= 0.0 {
        return Err(DomainErrorKind::NonPositiveDistance);
    }
    Ok(distance)
}

/// Truncates a brightness into `u8`, saturating above 255.
fn quantize(brightness: f64) -> u8 {
    if brightness.is_nan() {
        return 0;
    }
    brightness.clamp(0.0, 255.0) as u8
}

/// Gives every singular row the value of its nearest regular row, or `ceiling` if none exist.
fn resolve_singular_rows(evaluated: &[Option<u8>], ceiling: u8) -> Vec<u8> {
    (0..evaluated.len())
        .map(|row| {
            if let Some(value) = evaluated[row] {
                return value;
            }
            (1..evaluated.len())
                .find_map(|offset| {
                    let above = row.checked_sub(offset).and_then(|i| evaluated[i]);
                    let below = evaluated.get(row + offset).copied().flatten();
                    above.or(below)
                })
                .unwrap_or(ceiling)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::mount_geometry::RowOrientation;

    #[test]
    fn build_is_deterministic() {
        let geometry = MountGeometry::default();
        let first = build_reference(&geometry).unwrap();
        let second = build_reference(&geometry).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.as_slice(), second.as_slice());
    }

    #[test]
    fn rows_are_constant_across_width() {
        let reference = build_reference(&MountGeometry::default()).unwrap();
        assert_eq!(reference.dimensions(), (640, 400));
        for (y, row) in reference.frame().rows().enumerate() {
            let expected = reference.row_values()[y];
            assert!(row.iter().all(|&v| v == expected), "row {y} is not constant");
        }
    }

    #[test]
    fn default_mount_brightness_falls_toward_horizon() {
        let reference = build_reference(&MountGeometry::default()).unwrap();
        let rows = reference.row_values();
        assert!(rows.windows(2).all(|pair| pair[0] >= pair[1]));
        assert!(rows[0] > rows[rows.len() - 1]);
        assert!(reference.domain_errors().is_empty());

        // 7.5 * 883.15 / 45 * tan(55°) and * tan(5°), truncated.
        assert_eq!(rows[0], 210);
        assert_eq!(rows[rows.len() - 1], 12);
    }

    #[test]
    fn tangent_model_is_not_linear_in_row() {
        let reference = build_reference(&MountGeometry::default()).unwrap();
        let rows = reference.row_values();
        let upper_drop = i32::from(rows[0]) - i32::from(rows[100]);
        let lower_drop = i32::from(rows[299]) - i32::from(rows[399]);
        assert!(upper_drop > lower_drop * 3 / 2);
    }

    #[test]
    fn top_down_orientation_reverses_curve() {
        let geometry = MountGeometry::default();
        let bottom_up = build_reference(&geometry).unwrap();
        let top_down =
            build_reference(&geometry.with_row_orientation(RowOrientation::TopDown)).unwrap();
        let mut reversed = bottom_up.row_values().to_vec();
        reversed.reverse();
        assert_eq!(top_down.row_values(), reversed.as_slice());
    }

    #[test]
    fn horizon_row_takes_neighbour_value() {
        // Rows look at -30°, 0°, +30°: the middle ray never meets the floor.
        let geometry = MountGeometry::new(4, 3, 45.0, 0.0, 60.0, 7.5, 883.15);
        let reference = build_reference(&geometry).unwrap();

        assert_eq!(reference.row_values(), &[84, 84, 84]);
        assert_eq!(reference.domain_errors().len(), 1);
        let error = reference.domain_errors()[0];
        assert_eq!(error.row, 1);
        assert_eq!(error.kind, DomainErrorKind::TangentSingularity);
    }

    #[test]
    fn vertical_row_takes_neighbour_value() {
        // Rows look at -90°, -60°, -30°.
        let geometry = MountGeometry::new(2, 3, 45.0, -60.0, 60.0, 7.5, 883.15);
        let reference = build_reference(&geometry).unwrap();

        assert_eq!(reference.domain_errors().len(), 1);
        assert_eq!(reference.domain_errors()[0].row, 0);
        assert_eq!(reference.row_values()[0], reference.row_values()[1]);
        assert_eq!(reference.row_values()[1], 254);
        assert_eq!(reference.row_values()[2], 84);
    }

    #[test]
    fn all_singular_rows_fall_back_to_ceiling() {
        let geometry =
            MountGeometry::new(5, 1, 45.0, 0.0, 40.0, 7.5, 883.15).with_singular_ceiling(200);
        let reference = build_reference(&geometry).unwrap();
        assert_eq!(reference.row_values(), &[200]);
        assert!(reference.as_slice().iter().all(|&v| v == 200));
        assert_eq!(reference.domain_errors().len(), 1);
    }

    #[test]
    fn steep_close_mount_saturates_at_full_scale() {
        let geometry = MountGeometry::new(3, 6, 10.0, -80.0, 10.0, 7.5, 883.15);
        let reference = build_reference(&geometry).unwrap();
        assert!(reference.row_values().iter().all(|&v| v == 255));
        assert!(reference.domain_errors().is_empty());
    }

    #[test]
    fn invalid_geometry_fails_before_building() {
        let geometry = MountGeometry::new(640, 0, 45.0, -30.0, 50.0, 7.5, 883.15);
        assert!(matches!(
            build_reference(&geometry),
            Err(ConfigError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn resolve_prefers_lower_row_on_tie() {
        let rows = [Some(10), None, Some(30)];
        assert_eq!(resolve_singular_rows(&rows, 255), vec![10, 10, 30]);
        let rows = [None, None, Some(7)];
        assert_eq!(resolve_singular_rows(&rows, 255), vec![7, 7, 7]);
    }
}
