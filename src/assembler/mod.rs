//! Clip assembly through ffmpeg.
//!
//! Resolves matched spans to downloaded files and renders them back to back
//! into one video, normalizing every clip to the same frame size, frame rate
//! and audio layout so the concat filter accepts them.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::matcher::MatchItem;

/// Clips shorter than this are padded so ffmpeg always gets a frame
const MIN_CLIP_SECONDS: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Clip {
    pub video_id: String,
    pub path: PathBuf,
    pub text: String,
    pub start: f64,
    pub end: f64,
}

impl Clip {
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(MIN_CLIP_SECONDS)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Text drawn faintly over the whole output
    pub watermark: Option<String>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: 720,
            height: 1280,
            fps: 30,
            watermark: None,
        }
    }
}

/// Map matched items to their source files.
///
/// Fails with `NotFound` for the first item whose video was never downloaded.
pub fn plan_clips(config: &AppConfig, items: &[MatchItem]) -> Result<Vec<Clip>, AppError> {
    items
        .iter()
        .map(|item| {
            let path = config.video_path(&item.video_id);
            if !path.exists() {
                return Err(AppError::NotFound(format!(
                    "video file for '{}' ({})",
                    item.text,
                    path.display()
                )));
            }
            Ok(Clip {
                video_id: item.video_id.clone(),
                path,
                text: item.text.clone(),
                start: item.start,
                end: item.end,
            })
        })
        .collect()
}

/// ffmpeg arguments that trim every clip and concatenate them into `output`
pub fn build_ffmpeg_args(clips: &[Clip], output: &Path, options: &RenderOptions) -> Vec<String> {
    let mut args = vec!["-y".to_string()];

    for clip in clips {
        args.extend([
            "-ss".to_string(),
            format!("{:.3}", clip.start),
            "-t".to_string(),
            format!("{:.3}", clip.duration()),
            "-i".to_string(),
            clip.path.to_string_lossy().to_string(),
        ]);
    }

    let (w, h) = (options.width, options.height);
    let mut filter = String::new();
    for i in 0..clips.len() {
        filter.push_str(&format!(
            "[{i}:v]scale={w}:{h}:force_original_aspect_ratio=decrease,\
pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={fps},format=yuv420p[v{i}];\
[{i}:a]aresample=44100,aformat=channel_layouts=stereo[a{i}];",
            fps = options.fps
        ));
    }
    for i in 0..clips.len() {
        filter.push_str(&format!("[v{i}][a{i}]"));
    }
    filter.push_str(&format!("concat=n={}:v=1:a=1[cv][outa]", clips.len()));

    match &options.watermark {
        Some(text) => {
            let escaped = text.replace('\\', "\\\\").replace(':', "\\:").replace('\'', "\\'");
            filter.push_str(&format!(
                ";[cv]drawtext=text='{}':fontcolor=white@0.35:fontsize=20:x=w-tw-20:y=h-th-20[outv]",
                escaped
            ));
        }
        None => filter.push_str(";[cv]null[outv]"),
    }

    args.extend([
        "-filter_complex".to_string(),
        filter,
        "-map".to_string(),
        "[outv]".to_string(),
        "-map".to_string(),
        "[outa]".to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        "medium".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        "128k".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        output.to_string_lossy().to_string(),
    ]);
    args
}

/// Render clips into `output` with ffmpeg
pub async fn render(
    ffmpeg_path: &str,
    clips: &[Clip],
    output: &Path,
    options: &RenderOptions,
) -> Result<PathBuf, AppError> {
    if clips.is_empty() {
        return Err(AppError::Other("Nothing to render".to_string()));
    }
    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    log::info!("Rendering {} clips to {}", clips.len(), output.display());

    let result = Command::new(ffmpeg_path)
        .args(build_ffmpeg_args(clips, output, options))
        .output()
        .await
        .map_err(|e| AppError::external("ffmpeg", format!("failed to run: {}", e)))?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        let tail: Vec<&str> = stderr.lines().rev().take(10).collect();
        let tail: Vec<&str> = tail.into_iter().rev().collect();
        return Err(AppError::external("ffmpeg", tail.join("\n")));
    }

    log::info!("Render complete: {}", output.display());
    Ok(output.to_path_buf())
}
