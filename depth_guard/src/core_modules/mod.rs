pub mod anomaly_grid;
pub mod error;
pub mod frame;
pub mod frame_analyzer;
pub mod mount_geometry;
pub mod reference_model;
