// THEORY:
// `lens_tester` is the command-line driver. It runs the exposure engine on one
// of two inputs:
//
// 1.  **Video**: frames are decoded with OpenCV, every `stride`-th frame is run
//     through a YOLO model (inline, or on an ordered worker pool), ids are
//     assigned in frame order, and the tracked detections feed the engine.
// 2.  **Replay**: a JSON-lines file of already-tracked detections, one record
//     per sampled frame.
//
// Either way it ends by printing the tactical report and writing the timeline
// chart and JSON export into the output directory.

mod annotate;
mod detector;
mod identity;
mod video;

use anyhow::{Context, Result, bail};
use clap::{ArgGroup, Parser};
use detector::{DetectorSettings, RawDetection, YoloDetector};
use exposure_lens::parallel_pipeline::{FrameWorker, OrderedWorkerPool, default_worker_count};
use exposure_lens::pipeline::DEFAULT_HEAD_MARKER;
use exposure_lens::{
    CategoryThresholds, ExposurePipeline, ExposureReport, FrameClock, GapThreshold, PipelineConfig,
    ReplaySource,
};
use identity::{DEFAULT_MAX_FRAMES_SINCE_SEEN, IdentityAssigner};
use lens_visualizer::{ReportTable, TimelineLayout, save_timeline, snapshot_path, write_json};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use video::{SampledFrame, VideoInput};

const DEFAULT_LOG_FILTER: &str = "lens_tester=info,exposure_lens=info";

/// Measures how long each opponent stays on screen.
#[derive(Parser, Debug)]
#[command(name = "lens_tester", version, about)]
#[command(group(ArgGroup::new("input").required(true).args(["video", "detections"])))]
struct Args {
    /// Gameplay video to analyze.
    #[arg(long, requires = "model")]
    video: Option<PathBuf>,

    /// JSON-lines file of tracked detections to replay instead of a video.
    #[arg(long)]
    detections: Option<PathBuf>,

    /// YOLO detection model exported to ONNX.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Class names in model output order.
    #[arg(long, value_delimiter = ',', default_value = "CT,CT_HEAD,T,T_HEAD")]
    classes: Vec<String>,

    /// Directory for snapshots, the timeline chart and the JSON export.
    #[arg(long, default_value = "engagements")]
    output_dir: PathBuf,

    /// Minimum detection confidence.
    #[arg(long, default_value_t = 0.5)]
    confidence: f32,

    /// IoU above which overlapping boxes of one class are suppressed.
    #[arg(long, default_value_t = 0.45)]
    nms_iou: f32,

    /// Square model input size in pixels.
    #[arg(long, default_value_t = 640)]
    input_size: i32,

    /// Run detection on every Nth frame.
    #[arg(long, default_value_t = 2)]
    stride: u64,

    /// Merge exposures of one target separated by less than this many seconds.
    #[arg(long, default_value_t = 0.5)]
    gap: f64,

    /// Exposures shorter than this are Flash/Noise.
    #[arg(long, default_value_t = 0.2)]
    flash_below: f64,

    /// Exposures shorter than this (and not Flash/Noise) are Standard.
    #[arg(long, default_value_t = 1.0)]
    standard_below: f64,

    /// Class label substring marking head detections.
    #[arg(long, default_value = DEFAULT_HEAD_MARKER)]
    head_marker: String,

    /// Detection workers; 0 uses one per CPU, 1 runs detection inline.
    #[arg(long, default_value_t = 0)]
    workers: usize,

    /// Max match distance for keeping an id, as a fraction of the frame's longer side.
    #[arg(long, default_value_t = 0.1)]
    max_match_distance: f32,

    /// Sampled frames a lost target keeps its id for.
    #[arg(long, default_value_t = DEFAULT_MAX_FRAMES_SINCE_SEEN)]
    max_coast_frames: u32,

    /// Do not save a snapshot when a new target appears.
    #[arg(long)]
    no_snapshots: bool,
}

impl Args {
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let config = PipelineConfig {
            gap_threshold: GapThreshold::new(self.gap)?,
            categories: CategoryThresholds::new(self.flash_below, self.standard_below)?,
            head_marker: self.head_marker.clone(),
        };
        config.validate()?;
        Ok(config)
    }

    fn worker_count(&self) -> usize {
        if self.workers == 0 { default_worker_count() } else { self.workers }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let config = args.pipeline_config()?;
    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("failed to create {}", args.output_dir.display()))?;

    let report = match (&args.video, &args.detections) {
        (Some(video), _) => analyze_video(&args, video, config.clone()).await?,
        (None, Some(detections)) => analyze_replay(detections, config.clone())?,
        (None, None) => bail!("either --video or --detections is required"),
    };

    write_outputs(&args, &config, &report)
}

fn analyze_replay(path: &Path, config: PipelineConfig) -> Result<ExposureReport> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    info!(detections = %path.display(), "replaying detections");

    let mut pipeline = ExposurePipeline::new(config)?;
    pipeline.on_window_opened(|event| {
        info!(
            time = format!("{:.2}s", event.time),
            track_id = event.track_id,
            class = %event.class_label,
            "new target detected"
        );
    });
    Ok(pipeline.run_replay(ReplaySource::new(BufReader::new(file)))?)
}

/// Per-frame state of a video run, fed in frame order.
struct VideoAnalysis {
    pipeline: ExposurePipeline,
    identities: IdentityAssigner,
    snapshot_dir: Option<PathBuf>,
}

impl VideoAnalysis {
    fn absorb(&mut self, frame: SampledFrame, raw: Vec<RawDetection>) -> Result<()> {
        let opened = self.pipeline.process_with(&mut self.identities, &raw, frame.time)?;

        for event in &opened {
            info!(
                time = format!("{:.2}s", event.time),
                track_id = event.track_id,
                class = %event.class_label,
                "new target detected"
            );
            let Some(dir) = &self.snapshot_dir else {
                continue;
            };
            let path = snapshot_path(dir, event);
            let visible = self.identities.visible();
            if let Err(e) = annotate::save_engagement_snapshot(&frame.image, &visible, &self.identities, &path) {
                warn!(path = %path.display(), "failed to save snapshot: {e:#}");
            }
        }
        Ok(())
    }
}

async fn analyze_video(args: &Args, video_path: &Path, config: PipelineConfig) -> Result<ExposureReport> {
    // --- 1. Video I/O Initialization ---
    let model = args.model.as_deref().context("--model is required with --video")?;
    let mut input = VideoInput::open(video_path)?;
    let clock = FrameClock::new(input.fps, args.stride)?;
    info!(
        video = %video_path.display(),
        fps = input.fps,
        frames = input.frame_count,
        duration = format!("{:.2}s", input.duration_seconds()),
        stride = clock.stride(),
        "processing video"
    );

    // --- 2. Engine & Identity Initialization ---
    let settings = DetectorSettings {
        input_size: args.input_size,
        num_classes: args.classes.len(),
        confidence: args.confidence,
        nms_iou: args.nms_iou,
    };
    let max_distance = args.max_match_distance * input.width.max(input.height) as f32;
    let mut analysis = VideoAnalysis {
        pipeline: ExposurePipeline::new(config)?,
        identities: IdentityAssigner::new(args.classes.clone(), max_distance, args.max_coast_frames),
        snapshot_dir: (!args.no_snapshots).then(|| args.output_dir.clone()),
    };

    // --- 3. Main Processing Loop ---
    let worker_count = args.worker_count();
    let mut frames_read = 0u64;
    if worker_count <= 1 {
        let mut detector = YoloDetector::load(model, settings)?;
        while let Some(image) = input.read()? {
            let index = frames_read;
            frames_read += 1;
            if !clock.samples(index) {
                continue;
            }
            let frame = SampledFrame { index, time: clock.time_of(index), image };
            let (frame, raw) = detector.process(frame)?;
            analysis.absorb(frame, raw)?;
        }
    } else {
        let detectors = (0..worker_count)
            .map(|_| YoloDetector::load(model, settings))
            .collect::<Result<Vec<_>>>()?;
        let mut pool = OrderedWorkerPool::new(detectors)?;
        let max_in_flight = worker_count * 2;
        info!(workers = worker_count, "running detection on worker pool");

        while let Some(image) = input.read()? {
            let index = frames_read;
            frames_read += 1;
            if !clock.samples(index) {
                continue;
            }
            pool.submit(SampledFrame { index, time: clock.time_of(index), image })?;

            // Bound memory: wait for the oldest frame once enough are queued.
            while pool.in_flight() >= max_in_flight {
                let Some((_, result)) = pool.next_ordered().await else {
                    break;
                };
                let (frame, raw) = result?;
                analysis.absorb(frame, raw)?;
            }
        }

        // --- 4. Drain ---
        while let Some((_, result)) = pool.next_ordered().await {
            let (frame, raw) = result?;
            analysis.absorb(frame, raw)?;
        }
        pool.shutdown().await;
    }

    // --- 5. Finalize ---
    let end_time = clock.end_time(frames_read);
    info!(frames_read, end_time = format!("{end_time:.2}s"), "video finished");
    Ok(analysis.pipeline.finish(end_time)?)
}

fn write_outputs(args: &Args, config: &PipelineConfig, report: &ExposureReport) -> Result<()> {
    let timeline_path = args.output_dir.join("exposure_timeline.png");
    if save_timeline(report.intervals(), &TimelineLayout::default(), &timeline_path)? {
        info!(path = %timeline_path.display(), "timeline chart saved");
    }

    let json_path = args.output_dir.join("exposures.json");
    write_json(report, config, &json_path)?;
    info!(path = %json_path.display(), "exposure export saved");

    println!("{}", ReportTable::new(report));
    let output_dir = std::path::absolute(&args.output_dir).unwrap_or_else(|_| args.output_dir.clone());
    println!("Engagement frames saved to: {}", output_dir.display());
    Ok(())
}
