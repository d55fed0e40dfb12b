//! Output artifacts: events JSONL, SRT and WebVTT captions, summary JSON.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::info;
use vnarrate_models::{format_srt_timestamp, format_vtt_timestamp, CaptionLine, Event, Summary};

use crate::compose::{build_summary, compose_captions};
use crate::error::NarrateResult;

pub const EVENTS_FILE: &str = "events.jsonl";
pub const SRT_FILE: &str = "captions.srt";
pub const VTT_FILE: &str = "captions.vtt";
pub const SUMMARY_FILE: &str = "summary.json";

/// Paths of the files written by `write_artifacts`.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub events: PathBuf,
    pub srt: PathBuf,
    pub vtt: PathBuf,
    pub summary: PathBuf,
}

impl ArtifactPaths {
    pub fn in_dir(out_dir: impl AsRef<Path>) -> Self {
        let dir = out_dir.as_ref();
        Self {
            events: dir.join(EVENTS_FILE),
            srt: dir.join(SRT_FILE),
            vtt: dir.join(VTT_FILE),
            summary: dir.join(SUMMARY_FILE),
        }
    }
}

async fn ensure_parent(path: &Path) -> NarrateResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}

/// One JSON object per line, in event order.
pub async fn write_events_jsonl(path: impl AsRef<Path>, events: &[Event]) -> NarrateResult<()> {
    let path = path.as_ref();
    ensure_parent(path).await?;

    let mut out = String::new();
    for event in events {
        out.push_str(&serde_json::to_string(event)?);
        out.push('\n');
    }
    fs::write(path, out).await?;
    Ok(())
}

fn render_srt(captions: &[CaptionLine]) -> String {
    let mut out = String::new();
    for (i, caption) in captions.iter().enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            format_srt_timestamp(caption.t_start),
            format_srt_timestamp(caption.t_end),
            caption.text.trim()
        ));
    }
    out
}

fn render_vtt(captions: &[CaptionLine]) -> String {
    let mut out = String::from("WEBVTT\n\n");
    for caption in captions {
        out.push_str(&format!(
            "{} --> {}\n{}\n\n",
            format_vtt_timestamp(caption.t_start),
            format_vtt_timestamp(caption.t_end),
            caption.text.trim()
        ));
    }
    out
}

/// Numbered SubRip cues.
pub async fn write_srt(path: impl AsRef<Path>, captions: &[CaptionLine]) -> NarrateResult<()> {
    let path = path.as_ref();
    ensure_parent(path).await?;
    fs::write(path, render_srt(captions)).await?;
    Ok(())
}

/// WebVTT cues after a `WEBVTT` header.
pub async fn write_vtt(path: impl AsRef<Path>, captions: &[CaptionLine]) -> NarrateResult<()> {
    let path = path.as_ref();
    ensure_parent(path).await?;
    fs::write(path, render_vtt(captions)).await?;
    Ok(())
}

/// Pretty-printed summary JSON.
pub async fn write_summary(path: impl AsRef<Path>, summary: &Summary) -> NarrateResult<()> {
    let path = path.as_ref();
    ensure_parent(path).await?;
    fs::write(path, serde_json::to_string_pretty(summary)?).await?;
    Ok(())
}

/// Write every artifact for `events` into `out_dir`.
pub async fn write_artifacts(out_dir: impl AsRef<Path>, events: &[Event]) -> NarrateResult<ArtifactPaths> {
    let paths = ArtifactPaths::in_dir(out_dir);
    let captions = compose_captions(events);

    write_events_jsonl(&paths.events, events).await?;
    write_srt(&paths.srt, &captions).await?;
    write_vtt(&paths.vtt, &captions).await?;
    write_summary(&paths.summary, &build_summary(events)).await?;

    info!(
        events = events.len(),
        captions = captions.len(),
        out_dir = %paths.events.parent().unwrap_or(Path::new(".")).display(),
        "Artifacts written"
    );

    Ok(paths)
}
