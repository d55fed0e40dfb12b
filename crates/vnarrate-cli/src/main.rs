//! VideoNarrate command-line binary.
//!
//! Settings come from `VNARRATE_*` environment variables (a `.env` file is
//! loaded first); command-line flags override them.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vnarrate_media::config::parse_label_list;
use vnarrate_media::{
    run, write_artifacts, DetectorBuilder, FfmpegFrameSource, MatchingMode, PipelineConfig, ReplayDetector,
    RunOutput,
};
use vnarrate_models::{parse_timestamp, DetectorBackend, Event};

#[derive(Parser, Debug)]
#[command(
    name = "vnarrate",
    version,
    about = "Convert videos into time-aware narratives and JSON events"
)]
struct Args {
    /// Input video file
    #[arg(long, value_name = "PATH")]
    input: Option<PathBuf>,

    /// Output directory for events.jsonl, captions and summary.json
    #[arg(long, value_name = "DIR")]
    out: Option<PathBuf>,

    /// Sampling rate in frames per second
    #[arg(long)]
    fps: Option<u32>,

    /// Window length in seconds
    #[arg(long)]
    window: Option<f64>,

    /// Stride between windows in seconds
    #[arg(long)]
    stride: Option<f64>,

    /// Detector backend: yolov8-seg, mock or replay
    #[arg(long)]
    detector: Option<DetectorBackend>,

    /// ONNX model for the yolov8-seg backend
    #[arg(long, value_name = "PATH")]
    model: Option<String>,

    /// Detections JSONL for the replay backend
    #[arg(long, value_name = "PATH")]
    replay: Option<PathBuf>,

    /// Minimum detection confidence
    #[arg(long)]
    min_det_conf: Option<f64>,

    /// Stop after this much media time (seconds, MM:SS or HH:MM:SS)
    #[arg(long, value_parser = parse_max_seconds)]
    max_seconds: Option<f64>,

    /// Comma-separated labels to keep
    #[arg(long, value_name = "LABELS")]
    allow_labels: Option<String>,

    /// IoU threshold for track matching
    #[arg(long)]
    iou_threshold: Option<f64>,

    /// Frames a track survives without a match
    #[arg(long)]
    max_age: Option<u64>,

    /// Track assignment policy: independent or exclusive
    #[arg(long)]
    matching: Option<MatchingMode>,

    /// Drop retired tracks from the identity table
    #[arg(long)]
    evict_retired: bool,

    /// Emit the trailing partial window at end of stream
    #[arg(long)]
    flush_partial: bool,

    /// Print the JSON schema of an event line and exit
    #[arg(long)]
    print_schema: bool,
}

fn parse_max_seconds(raw: &str) -> Result<f64, String> {
    parse_timestamp(raw).map_err(|e| e.to_string())
}

impl Args {
    /// Layer the command-line flags over `config`.
    fn apply(&self, mut config: PipelineConfig) -> PipelineConfig {
        if let Some(fps) = self.fps {
            config.fps = fps;
        }
        if let Some(window) = self.window {
            config.window = window;
        }
        if let Some(stride) = self.stride {
            config.stride = stride;
        }
        if let Some(detector) = self.detector {
            config.detector = detector;
        }
        if let Some(model) = &self.model {
            config.model_path = model.clone();
        }
        if let Some(replay) = &self.replay {
            config.replay_path = Some(replay.clone());
        }
        if let Some(min_det_conf) = self.min_det_conf {
            config.min_det_conf = min_det_conf;
        }
        if let Some(max_seconds) = self.max_seconds {
            config.max_seconds = Some(max_seconds);
        }
        if let Some(labels) = &self.allow_labels {
            config.allowed_labels = parse_label_list(labels);
        }
        if let Some(iou_threshold) = self.iou_threshold {
            config.iou_threshold = iou_threshold;
        }
        if let Some(max_age) = self.max_age {
            config.max_age = max_age;
        }
        if let Some(matching) = self.matching {
            config.matching = matching;
        }
        config.evict_retired |= self.evict_retired;
        config.flush_partial_window |= self.flush_partial;
        config
    }
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("vnarrate=info,vnarrate_media=info,ort=warn,onnxruntime=warn"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn narrate(args: &Args, config: &PipelineConfig) -> anyhow::Result<RunOutput> {
    if let Some(input) = &args.input {
        let detector = DetectorBuilder::from_config(config).build();
        let mut source = FfmpegFrameSource::open(input, config.fps).await;
        return Ok(run(config, &mut source, detector.as_ref()).await?);
    }

    if config.detector.needs_pixels() {
        bail!("--input is required: the {} detector needs decoded frames", config.detector);
    }
    if config.detector != DetectorBackend::Replay {
        bail!("--input is required unless --detector replay is used");
    }

    let path = config
        .replay_path
        .as_ref()
        .context("--replay is required for replay runs without --input")?;
    let detector = ReplayDetector::from_path(path)
        .with_context(|| format!("Failed to load replay file {}", path.display()))?;
    let mut source = detector.frame_source(config.fps);
    Ok(run(config, &mut source, &detector).await?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    if args.print_schema {
        let schema = schemars::schema_for!(Event);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    init_tracing();

    let out = args.out.clone().context("--out is required")?;
    let config = args.apply(PipelineConfig::from_env());
    config.validate()?;
    info!(?config, "Pipeline config");

    let output = narrate(&args, &config).await?;
    let paths = write_artifacts(&out, &output.events)
        .await
        .with_context(|| format!("Failed to write artifacts to {}", out.display()))?;

    info!(
        events = output.events.len(),
        frames = output.stats.frames_processed,
        events_path = %paths.events.display(),
        srt_path = %paths.srt.display(),
        vtt_path = %paths.vtt.display(),
        summary_path = %paths.summary.display(),
        "Narration complete"
    );

    Ok(())
}
