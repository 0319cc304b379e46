// THEORY:
// `parallel_pipeline` runs the core inside a live capture loop. A camera produces
// frames at its own, possibly irregular, pace; a UI consumes results at another.
// Only the newest danger state matters, so nothing in between may queue up.
//
// Key principles:
// 1.  **One Dedicated Worker**: a single blocking task pulls a frame, analyzes it and
//     publishes the result, one frame at a time. Capture may block; analysis never
//     does.
// 2.  **Latest-Wins Mailbox**: results go into a `watch` channel, a single slot that
//     each publish overwrites. A slow consumer skips frames instead of building a
//     backlog.
// 3.  **Cooperative Stop**: the stop flag is checked once per iteration, so the loop
//     halts at frame granularity. A source reaching its end or failing also ends the
//     loop; a frame with the wrong shape is rejected and the loop carries on.
// 4.  **Shared Reference**: the floor reference is read-only behind an `Arc`, so any
//     number of analyses may run against it at once without locking. `analyze_batch`
//     uses that to score a recorded sequence across every core.

use crate::core_modules::error::{AnalysisError, ConfigError, SourceError};
use crate::core_modules::frame::DisparityFrame;
use crate::core_modules::frame_analyzer::{FrameAnalysis, analyze, scale_factor_for};
use crate::core_modules::reference_model::ReferenceFrame;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

/// A camera, or anything standing in for one.
pub trait DisparitySource: Send + 'static {
    /// Largest native disparity value the device reports.
    fn max_disparity(&self) -> f64;

    /// Blocks until the next frame is available. `Ok(None)` ends the stream.
    fn next_frame(&mut self) -> Result<Option<DisparityFrame>, SourceError>;
}

/// One published result.
#[derive(Debug, Clone)]
pub struct FramePacket {
    /// Capture order, starting at 0. Rejected frames consume an id too.
    pub frame_id: u64,
    pub captured_at: Instant,
    pub analysis: FrameAnalysis,
}

/// Why the capture loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    Requested,
    SourceExhausted,
    SourceFailed(String),
}

/// Counters reported when the worker exits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSummary {
    pub frames_analyzed: u64,
    pub frames_rejected: u64,
    pub stop_reason: StopReason,
}

/// Receiving end of the latest-wins mailbox. `None` until the first frame lands.
pub type LatestFrame = watch::Receiver<Option<Arc<FramePacket>>>;

/// A running capture/analyze loop. Dropping it stops the loop before its next frame.
pub struct AnalysisWorker {
    stop_tx: watch::Sender<bool>,
    results: LatestFrame,
    handle: JoinHandle<WorkerSummary>,
}

impl AnalysisWorker {
    /// Starts pulling frames from `source` on the blocking pool of the current runtime.
    pub fn spawn<S: DisparitySource>(
        mut source: S,
        reference: Arc<ReferenceFrame>,
    ) -> Result<Self, ConfigError> {
        let scale_factor = scale_factor_for(source.max_disparity())?;
        let (stop_tx, stop_rx) = watch::channel(false);
        let (result_tx, results) = watch::channel(None);

        let handle = tokio::task::spawn_blocking(move || {
            run_capture_loop(&mut source, scale_factor, &reference, &stop_rx, &result_tx)
        });

        Ok(Self {
            stop_tx,
            results,
            handle,
        })
    }

    /// A new handle on the mailbox. `changed()` errors once the worker has exited
    /// and its last result has been seen.
    pub fn subscribe(&self) -> LatestFrame {
        self.results.clone()
    }

    /// Asks the loop to stop before its next frame.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the loop to end on its own or after `stop()`.
    pub async fn join(self) -> Result<WorkerSummary, JoinError> {
        // The stop sender must outlive the wait, or the loop reads its closure as a stop.
        let Self { stop_tx, handle, .. } = self;
        let summary = handle.await;
        drop(stop_tx);
        summary
    }
}

/// A closed stop channel means the worker handle is gone; nobody is left to read results.
fn stop_requested(stop_rx: &watch::Receiver<bool>) -> bool {
    stop_rx.has_changed().is_err() || *stop_rx.borrow()
}

fn run_capture_loop<S: DisparitySource>(
    source: &mut S,
    scale_factor: f64,
    reference: &ReferenceFrame,
    stop_rx: &watch::Receiver<bool>,
    result_tx: &watch::Sender<Option<Arc<FramePacket>>>,
) -> WorkerSummary {
    let mut frame_id = 0u64;
    let mut frames_analyzed = 0u64;
    let mut frames_rejected = 0u64;

    debug!("Capture loop started (scale factor {scale_factor:.4})");

    let stop_reason = loop {
        if stop_requested(stop_rx) {
            break StopReason::Requested;
        }

        let raw = match source.next_frame() {
            Ok(Some(raw)) => raw,
            Ok(None) => break StopReason::SourceExhausted,
            Err(err) => {
                warn!("Disparity source failed: {err}");
                break StopReason::SourceFailed(err.to_string());
            }
        };
        let captured_at = Instant::now();

        match analyze(&raw, scale_factor, reference) {
            Ok(analysis) => {
                frames_analyzed += 1;
                result_tx.send_replace(Some(Arc::new(FramePacket {
                    frame_id,
                    captured_at,
                    analysis,
                })));
            }
            Err(err) => {
                frames_rejected += 1;
                warn!("Rejected frame {frame_id}: {err}");
            }
        }
        frame_id += 1;
    };

    info!(
        "Capture loop stopped ({stop_reason:?}): {frames_analyzed} analyzed, \
         {frames_rejected} rejected"
    );

    WorkerSummary {
        frames_analyzed,
        frames_rejected,
        stop_reason,
    }
}

/// Analyzes many frames against one reference across all cores. Output order matches input.
pub async fn analyze_batch(
    frames: Vec<DisparityFrame>,
    scale_factor: f64,
    reference: Arc<ReferenceFrame>,
) -> Result<Vec<Result<FrameAnalysis, AnalysisError>>, JoinError> {
    if frames.is_empty() {
        return Ok(Vec::new());
    }

    let total = frames.len();
    let workers = num_cpus::get().clamp(1, total);
    let per_worker = total.div_ceil(workers);

    let mut remaining = frames;
    let mut batches = Vec::with_capacity(workers);
    while !remaining.is_empty() {
        let rest = remaining.split_off(per_worker.min(remaining.len()));
        batches.push(std::mem::replace(&mut remaining, rest));
    }

    let tasks = batches.into_iter().map(|batch| {
        let reference = Arc::clone(&reference);
        tokio::task::spawn_blocking(move || {
            batch
                .iter()
                .map(|raw| analyze(raw, scale_factor, &reference))
                .collect::<Vec<_>>()
        })
    });

    let mut results = Vec::with_capacity(total);
    for batch in futures::future::join_all(tasks).await {
        results.extend(batch?);
    }
    Ok(results)
}
