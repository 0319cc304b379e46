// THEORY:
// The core hands out a danger score per frame and nothing more; deciding when that
// deserves the user's attention is the caller's job, and this module is that caller.
//
// Key principles:
// 1.  **Confirmation**: A frame counts as dangerous when its score is strictly above
//     the warning threshold. An alert is raised only after `confirm_frames`
//     dangerous frames in a row, so a single noisy frame can be ignored if wanted.
// 2.  **Episode Latch**: Once raised, the warning is logged a single time and stays
//     latched until a safe frame arrives; a long approach does not flood the log.
// 3.  **Convention at the Edge**: The core always speaks "10 = most danger". Users
//     who prefer a safety score get `10 - danger` here, for display only.

use clap::ValueEnum;
use depth_guard::{AnomalyGrid, Bearing, DangerScore, FrameAnalysis};
use tracing::{info, warn};

/// How a score is presented to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ScoreConvention {
    /// 10 = most danger.
    #[default]
    Danger,
    /// 10 = safest.
    Safety,
}

impl ScoreConvention {
    pub fn display_value(self, danger: DangerScore) -> u8 {
        match self {
            ScoreConvention::Danger => danger.value(),
            ScoreConvention::Safety => danger.inverted(),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ScoreConvention::Danger => "danger",
            ScoreConvention::Safety => "safety",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertConfig {
    /// Scores strictly above this are dangerous.
    pub warning_threshold: u8,
    /// Dangerous frames in a row needed to raise an alert.
    pub confirm_frames: u32,
    /// Chunk size used to locate the obstacle.
    pub chunk_width: u32,
    pub chunk_height: u32,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            warning_threshold: 5,
            confirm_frames: 1,
            chunk_width: 40,
            chunk_height: 40,
        }
    }
}

/// What one observed frame did to the alert state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertTransition {
    /// No alert, none starting.
    Quiet,
    /// An alert began on this frame.
    Raised { bearing: Option<Bearing> },
    /// An alert that was already active continues.
    Sustained,
    /// The active alert ended on this frame.
    Cleared,
}

/// Tracks the alert state across frames.
#[derive(Debug)]
pub struct AlertMonitor {
    config: AlertConfig,
    consecutive: u32,
    active: bool,
    alerts_raised: u64,
}

impl AlertMonitor {
    pub fn new(config: AlertConfig) -> Self {
        Self {
            config,
            consecutive: 0,
            active: false,
            alerts_raised: 0,
        }
    }

    pub fn observe(&mut self, analysis: &FrameAnalysis) -> AlertTransition {
        if !analysis.danger.exceeds(self.config.warning_threshold) {
            self.consecutive = 0;
            if self.active {
                self.active = false;
                info!("Obstacle warning cleared (danger {})", analysis.danger);
                return AlertTransition::Cleared;
            }
            return AlertTransition::Quiet;
        }

        self.consecutive = self.consecutive.saturating_add(1);
        if self.active {
            return AlertTransition::Sustained;
        }
        if self.consecutive < self.config.confirm_frames.max(1) {
            return AlertTransition::Quiet;
        }

        self.active = true;
        self.alerts_raised += 1;
        let bearing = self.locate(analysis);
        match bearing {
            Some(bearing) => warn!(
                "Warning! You are moving close to an obstacle ({bearing}), danger {}",
                analysis.danger
            ),
            None => warn!(
                "Warning! You are moving close to an obstacle, danger {}",
                analysis.danger
            ),
        }
        AlertTransition::Raised { bearing }
    }

    fn locate(&self, analysis: &FrameAnalysis) -> Option<Bearing> {
        AnomalyGrid::summarize(
            &analysis.anomaly,
            self.config.chunk_width,
            self.config.chunk_height,
        )
        .ok()
        .and_then(|grid| grid.hottest_bearing())
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn alerts_raised(&self) -> u64 {
        self.alerts_raised
    }
}
