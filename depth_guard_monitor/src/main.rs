// THEORY:
// `depth_guard_monitor` is the calling layer around the collision-danger core. It
// owns everything the core deliberately leaves out: where frames come from, how a
// score becomes an alert, and what the user sees.
//
// Flow of `run`:
// 1.  **Startup**: load the mount geometry, validate it together with the camera's
//     max disparity and build the floor reference once.
// 2.  **Capture**: a dedicated worker pulls frames from the chosen source and
//     publishes only the newest analysis.
// 3.  **Present**: this task waits for new results, feeds the alert policy, logs
//     the score in the chosen convention and optionally writes a heat map.
// 4.  **Shutdown**: Ctrl-C asks the worker to stop after its current frame; the
//     last results are drained and the worker's summary is reported.

mod alerts;
mod heatmap;
mod source;

use alerts::{AlertConfig, AlertMonitor, ScoreConvention};
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use depth_guard::parallel_pipeline::{AnalysisWorker, FramePacket, StopReason};
use depth_guard::pipeline::{DangerPipeline, PipelineConfig};
use depth_guard::{MountGeometry, build_reference};
use source::{DirectorySource, SyntheticSource};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "depth_guard_monitor")]
#[command(about = "Warn about obstacles in front of a floor-facing stereo camera")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the expected-floor reference map as a grayscale PNG.
    Reference {
        /// Mount geometry TOML file. Defaults to the stock mount.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output PNG path.
        #[arg(long)]
        out: PathBuf,
    },

    /// Analyze a disparity stream and raise proximity alerts.
    Run(RunArgs),
}

#[derive(Debug, Clone, Args)]
struct RunArgs {
    /// Mount geometry TOML file. Defaults to the stock mount.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory of raw disparity PNG frames, replayed in name order.
    #[arg(long, conflicts_with = "synthetic", required_unless_present = "synthetic")]
    input: Option<PathBuf>,

    /// Generate this many frames of an approaching obstacle instead of reading files.
    #[arg(long)]
    synthetic: Option<u32>,

    /// Directory to write one anomaly heat map per analyzed frame.
    #[arg(long)]
    output: Option<PathBuf>,

    /// The camera's largest native disparity value.
    #[arg(long, default_value = "95.0")]
    max_disparity: f64,

    /// Danger scores strictly above this raise an alert.
    #[arg(long, default_value = "5")]
    warning_threshold: u8,

    /// Dangerous frames in a row required before alerting.
    #[arg(long, default_value = "1")]
    confirm_frames: u32,

    /// How scores are shown.
    #[arg(long, value_enum, default_value_t = ScoreConvention::Danger)]
    convention: ScoreConvention,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Reference { config, out } => write_reference(config.as_deref(), &out),
        Commands::Run(args) => run(args).await,
    }
}

fn load_geometry(path: Option<&Path>) -> anyhow::Result<MountGeometry> {
    match path {
        Some(path) => MountGeometry::load(path)
            .with_context(|| format!("loading mount geometry from {}", path.display())),
        None => Ok(MountGeometry::default()),
    }
}

fn write_reference(config: Option<&Path>, out: &Path) -> anyhow::Result<()> {
    let geometry = load_geometry(config)?;
    let reference = build_reference(&geometry)?;
    reference
        .frame()
        .save_png(out)
        .with_context(|| format!("writing reference to {}", out.display()))?;

    info!(
        "Wrote {}x{} reference to {} ({} singular row(s))",
        reference.width(),
        reference.height(),
        out.display(),
        reference.domain_errors().len()
    );
    Ok(())
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let geometry = load_geometry(args.config.as_deref())?;
    let pipeline = DangerPipeline::new(PipelineConfig {
        geometry,
        max_disparity: args.max_disparity,
    })?;

    if let Some(dir) = &args.output {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
    }

    let reference = Arc::clone(pipeline.reference());
    let worker = match (&args.input, args.synthetic) {
        (Some(dir), _) => {
            let source = DirectorySource::open(dir, args.max_disparity)?;
            info!("Replaying {} frame(s) from {}", source.remaining(), dir.display());
            AnalysisWorker::spawn(source, reference)?
        }
        (None, Some(frames)) => {
            let source = SyntheticSource::new(&reference, frames);
            AnalysisWorker::spawn(source, reference)?
        }
        (None, None) => anyhow::bail!("either --input or --synthetic is required"),
    };

    let mut alerts = AlertMonitor::new(AlertConfig {
        warning_threshold: args.warning_threshold,
        confirm_frames: args.confirm_frames,
        ..AlertConfig::default()
    });
    let mut latest = worker.subscribe();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut stopping = false;

    loop {
        tokio::select! {
            changed = latest.changed() => {
                if changed.is_err() {
                    break;
                }
                let packet = latest.borrow_and_update().clone();
                if let Some(packet) = packet {
                    if let Err(err) = present(&packet, &mut alerts, &args) {
                        worker.stop();
                        return Err(err);
                    }
                }
            }
            _ = &mut ctrl_c, if !stopping => {
                info!("Interrupt received, stopping after the current frame");
                stopping = true;
                worker.stop();
            }
        }
    }

    let summary = worker.join().await.context("analysis worker panicked")?;
    info!(
        "Analyzed {} frame(s), rejected {}, raised {} alert(s)",
        summary.frames_analyzed,
        summary.frames_rejected,
        alerts.alerts_raised()
    );

    if alerts.is_active() {
        warn!("Stream ended while the obstacle warning was still active");
    }

    if let StopReason::SourceFailed(reason) = summary.stop_reason {
        error!("{reason}. Please reconnect the camera.");
        anyhow::bail!("disparity source failed: {reason}");
    }
    Ok(())
}

fn present(packet: &FramePacket, alerts: &mut AlertMonitor, args: &RunArgs) -> anyhow::Result<()> {
    let analysis = &packet.analysis;
    alerts.observe(analysis);

    info!(
        "frame {}: {} {} (mean anomaly {:.1}, {} occluded)",
        packet.frame_id,
        args.convention.label(),
        args.convention.display_value(analysis.danger),
        analysis.mean_anomaly,
        analysis.occluded_pixels
    );

    if let Some(dir) = &args.output {
        let path = dir.join(format!("anomaly_{:06}.png", packet.frame_id));
        heatmap::save_heatmap(&analysis.anomaly, &path)
            .with_context(|| format!("writing heat map {}", path.display()))?;
    }
    Ok(())
}
