// THEORY:
// The `pipeline` module is the top-level, synchronous API of the core. It owns the
// one piece of state that outlives a frame, the floor reference, and hands out
// per-frame danger reports.
//
// Lifecycle:
// 1.  **Startup**: the mount geometry and the camera's maximum disparity are
//     validated together; any problem is a `ConfigError` before a frame is seen.
// 2.  **Per Frame**: `process_frame` is a thin call into the stateless analyzer with
//     the cached scale factor and reference.
// 3.  **Remount**: `reconfigure` rebuilds the reference when the camera is moved.
//     The reference sits behind an `Arc`, so workers holding the previous one keep
//     a consistent map until they pick up the new one.

use crate::core_modules::error::{AnalysisError, ConfigError};
use crate::core_modules::frame::DisparityFrame;
use crate::core_modules::frame_analyzer::{FrameAnalysis, analyze, scale_factor_for};
use crate::core_modules::mount_geometry::MountGeometry;
use crate::core_modules::reference_model::{ReferenceFrame, build_reference};
use std::sync::Arc;
use tracing::info;

/// Native disparity range of the stock stereo pipeline.
pub const DEFAULT_MAX_DISPARITY: f64 = 95.0;

/// Everything needed to turn raw disparity into danger reports.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub geometry: MountGeometry,
    /// The camera's largest native disparity value.
    pub max_disparity: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            geometry: MountGeometry::default(),
            max_disparity: DEFAULT_MAX_DISPARITY,
        }
    }
}

/// The collision-danger engine: a cached floor reference plus the analyzer.
#[derive(Debug, Clone)]
pub struct DangerPipeline {
    config: PipelineConfig,
    scale_factor: f64,
    reference: Arc<ReferenceFrame>,
}

impl DangerPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        let scale_factor = scale_factor_for(config.max_disparity)?;
        let reference = Arc::new(build_reference(&config.geometry)?);
        log_reference(&config.geometry, &reference);
        Ok(Self {
            config,
            scale_factor,
            reference,
        })
    }

    /// Scores one raw disparity frame.
    pub fn process_frame(&self, raw: &DisparityFrame) -> Result<FrameAnalysis, AnalysisError> {
        analyze(raw, self.scale_factor, &self.reference)
    }

    /// Rebuilds the reference for a new mount. The old reference stays in place on error.
    pub fn reconfigure(&mut self, geometry: MountGeometry) -> Result<(), ConfigError> {
        let reference = Arc::new(build_reference(&geometry)?);
        log_reference(&geometry, &reference);
        self.reference = reference;
        self.config.geometry = geometry;
        Ok(())
    }

    pub fn reference(&self) -> &Arc<ReferenceFrame> {
        &self.reference
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

fn log_reference(geometry: &MountGeometry, reference: &ReferenceFrame) {
    info!(
        "Floor reference ready: {}x{}, mount {} cm at {} deg, {} singular row(s)",
        geometry.width,
        geometry.height,
        geometry.mount_elevation_cm,
        geometry.mount_angle_deg,
        reference.domain_errors().len()
    );
}
