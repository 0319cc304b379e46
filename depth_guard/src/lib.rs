// THEORY:
// This file is the entry point for the `depth_guard` library crate. It exposes the
// collision-danger core as a small public API: build a floor reference once from
// the camera mount geometry, then score every disparity frame against it.
//
// The heavy lifting lives in `core_modules`; `pipeline` wraps it in a single
// easy-to-hold facade, and `parallel_pipeline` drives it from a capture loop on a
// dedicated worker with a latest-wins result mailbox.

pub mod core_modules;
pub mod parallel_pipeline;
pub mod pipeline;

pub use core_modules::anomaly_grid::{AnomalyGrid, Bearing};
pub use core_modules::error::{
    AnalysisError, ConfigError, DomainError, DomainErrorKind, FrameError, SourceError,
};
pub use core_modules::frame::{AnomalyFrame, DisparityFrame, GrayFrame};
pub use core_modules::frame_analyzer::{
    DangerScore, FrameAnalysis, analyze, anomaly_value, scale_factor_for,
};
pub use core_modules::mount_geometry::{MountGeometry, RowOrientation};
pub use core_modules::reference_model::{ReferenceFrame, build_reference};
