//! Frame sources.
//!
//! A frame source is a lazy, single-pass sequence of sampled frames. The
//! FFmpeg source decodes on a background task and hands frames over a bounded
//! channel so decoding stays at most a few frames ahead of detection.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use image::RgbImage;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{NarrateError, NarrateResult};
use crate::probe::probe_video;

/// Frames buffered between the decoder task and the consumer.
pub const FRAME_CHANNEL_CAPACITY: usize = 8;

/// One sampled frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Native frame index in the source
    pub index: u64,
    /// Sampled time in seconds
    pub timestamp: f64,
    /// Decoded pixels; absent for replay runs
    pub image: Option<RgbImage>,
}

impl Frame {
    pub fn new(index: u64, timestamp: f64, image: RgbImage) -> Self {
        Self {
            index,
            timestamp,
            image: Some(image),
        }
    }

    /// A frame carrying only its position.
    pub fn without_image(index: u64, timestamp: f64) -> Self {
        Self {
            index,
            timestamp,
            image: None,
        }
    }
}

/// Lazy sequence of frames.
#[async_trait]
pub trait FrameSource: Send {
    /// Next frame, or `None` once the source is exhausted.
    async fn next_frame(&mut self) -> Option<Frame>;

    /// Source name for logging.
    fn name(&self) -> &str;
}

/// Native frames skipped between samples: `round(native_fps / fps)`, at least 1.
pub fn sampling_interval(native_fps: f64, fps: u32) -> u64 {
    let ratio = native_fps / f64::from(fps.max(1));
    if ratio.is_finite() {
        ratio.round().max(1.0) as u64
    } else {
        1
    }
}

/// Frames decoded by an `ffmpeg` child process.
pub struct FfmpegFrameSource {
    path: PathBuf,
    rx: Option<mpsc::Receiver<Frame>>,
}

impl FfmpegFrameSource {
    /// Open `path` for sampling at `fps` frames per second.
    ///
    /// Never fails: a missing decoder or unreadable input yields a source
    /// with zero frames.
    pub async fn open(path: impl AsRef<Path>, fps: u32) -> Self {
        let path = path.as_ref().to_path_buf();
        match spawn_decoder(&path, fps).await {
            Ok(rx) => Self { path, rx: Some(rx) },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Video source unavailable, producing no frames");
                Self { path, rx: None }
            }
        }
    }
}

#[async_trait]
impl FrameSource for FfmpegFrameSource {
    async fn next_frame(&mut self) -> Option<Frame> {
        match self.rx.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        }
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

impl std::fmt::Debug for FfmpegFrameSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegFrameSource")
            .field("path", &self.path)
            .field("open", &self.rx.is_some())
            .finish()
    }
}

async fn spawn_decoder(path: &Path, fps: u32) -> NarrateResult<mpsc::Receiver<Frame>> {
    which::which("ffmpeg").map_err(|_| NarrateError::FfmpegNotFound)?;
    let info = probe_video(path).await?;

    if info.width == 0 || info.height == 0 {
        return Err(NarrateError::probe_failed("Video stream has no dimensions"));
    }

    let interval = sampling_interval(info.fps, fps);
    let out_fps = f64::from(fps.max(1));
    let frame_bytes = info.width as usize * info.height as usize * 3;

    let mut child = Command::new("ffmpeg")
        .args(["-hide_banner", "-loglevel", "error", "-i"])
        .arg(path)
        .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| NarrateError::internal("Failed to capture FFmpeg stdout"))?;

    info!(
        path = %path.display(),
        width = info.width,
        height = info.height,
        native_fps = info.fps,
        fps,
        interval,
        "Decoding video"
    );

    let (tx, rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
    let (width, height) = (info.width, info.height);

    tokio::spawn(async move {
        let mut reader = BufReader::new(stdout);
        let mut native_index: u64 = 0;
        let mut out_index: u64 = 0;

        loop {
            let mut buf = vec![0u8; frame_bytes];
            if reader.read_exact(&mut buf).await.is_err() {
                break;
            }

            if native_index % interval == 0 {
                let Some(image) = RgbImage::from_raw(width, height, buf) else {
                    warn!(native_index, "Dropping frame with unexpected buffer size");
                    break;
                };
                let frame = Frame::new(native_index, out_index as f64 / out_fps, image);
                if tx.send(frame).await.is_err() {
                    debug!("Frame consumer went away, stopping decoder");
                    break;
                }
                out_index += 1;
            }
            native_index += 1;
        }

        stop_decoder(&mut child).await;
        debug!(native_frames = native_index, sampled = out_index, "Decoder finished");
    });

    Ok(rx)
}

/// Kill the decoder process and reap it.
async fn stop_decoder(child: &mut Child) {
    if let Err(e) = child.kill().await {
        debug!(error = %e, "Failed to stop ffmpeg");
    }
}

/// Frames supplied by an iterator.
pub struct IterFrameSource<I> {
    frames: I,
    name: String,
}

impl<I> IterFrameSource<I>
where
    I: Iterator<Item = Frame> + Send,
{
    pub fn new(frames: I) -> Self {
        Self::named(frames, "iter")
    }

    pub fn named(frames: I, name: impl Into<String>) -> Self {
        Self {
            frames,
            name: name.into(),
        }
    }
}

impl IterFrameSource<std::vec::IntoIter<Frame>> {
    /// Source over a fixed list of frames.
    pub fn from_frames(frames: Vec<Frame>) -> Self {
        Self::new(frames.into_iter())
    }
}

#[async_trait]
impl<I> FrameSource for IterFrameSource<I>
where
    I: Iterator<Item = Frame> + Send,
{
    async fn next_frame(&mut self) -> Option<Frame> {
        self.frames.next()
    }

    fn name(&self) -> &str {
        &self.name
    }
}
