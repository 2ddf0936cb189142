use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::TranscriberConfig;
use crate::error::AppError;

const STDERR_TAIL_LINES: usize = 20;

/// Message sent to the transcribe task
pub struct TranscribeJob {
    pub video_id: String,
    pub video_path: PathBuf,
}

/// Result from a transcribe task
pub struct TranscribeResult {
    pub video_id: String,
    pub result: Result<PathBuf, AppError>,
    pub duration_seconds: Option<f64>,
}

/// Run the transcribe task loop
pub async fn transcribe_task(
    config: TranscriberConfig,
    transcripts_path: PathBuf,
    mut rx: mpsc::Receiver<TranscribeJob>,
    result_tx: mpsc::Sender<TranscribeResult>,
    cancel: CancellationToken,
) {
    log::info!("Transcribe task started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                log::info!("Transcribe task cancelled");
                break;
            }
            job = rx.recv() => {
                match job {
                    Some(job) => {
                        let start = std::time::Instant::now();
                        let result = transcribe_video(
                            &config,
                            &transcripts_path,
                            &job.video_path,
                            &cancel,
                        ).await;
                        let duration_seconds = if result.is_ok() { Some(start.elapsed().as_secs_f64()) } else { None };
                        let _ = result_tx.send(TranscribeResult {
                            video_id: job.video_id,
                            result,
                            duration_seconds,
                        }).await;
                    }
                    None => {
                        log::info!("Transcribe task channel closed");
                        break;
                    }
                }
            }
        }
    }
}

/// Path of the JSON transcript the transcriber writes for a video
pub fn transcript_path_for(transcripts_path: &Path, video_path: &Path) -> PathBuf {
    let stem = video_path
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();
    transcripts_path.join(format!("{}.json", stem))
}

/// Transcriber arguments: word timestamps on, JSON output into `transcripts_path`
pub fn build_transcribe_args(
    config: &TranscriberConfig,
    transcripts_path: &Path,
    video_path: &Path,
) -> Vec<String> {
    let mut args = vec![
        video_path.to_string_lossy().to_string(),
        "--model".to_string(),
        config.model.clone(),
        "--language".to_string(),
        config.language.clone(),
        "--word_timestamps".to_string(),
        "True".to_string(),
        "--output_format".to_string(),
        "json".to_string(),
        "--output_dir".to_string(),
        transcripts_path.to_string_lossy().to_string(),
    ];
    args.extend(config.extra_args.iter().cloned());
    args
}

/// Transcribe one video, reusing an existing transcript file when present
pub async fn transcribe_video(
    config: &TranscriberConfig,
    transcripts_path: &Path,
    video_path: &Path,
    cancel: &CancellationToken,
) -> Result<PathBuf, AppError> {
    let transcript_path = transcript_path_for(transcripts_path, video_path);
    if transcript_path.exists() {
        log::info!("Reusing transcript {:?}", transcript_path);
        return Ok(transcript_path);
    }

    if !video_path.exists() {
        return Err(AppError::NotFound(format!("Video file {:?}", video_path)));
    }

    if cancel.is_cancelled() {
        return Err(AppError::Other("Transcription cancelled".to_string()));
    }

    log::info!("Running {} on {:?}", config.program, video_path);

    let mut child = Command::new(&config.program)
        .args(build_transcribe_args(config, transcripts_path, video_path))
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| AppError::external("transcriber", format!("failed to spawn {}: {}", config.program, e)))?;

    // Keep the tail of stderr for error reports
    let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
    if let Some(stderr) = child.stderr.take() {
        let mut reader = BufReader::new(stderr).lines();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    log::info!("Killing transcription subprocess");
                    let _ = child.kill().await;
                    return Err(AppError::Other("Transcription cancelled".to_string()));
                }
                line = reader.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            log::debug!("transcriber: {}", line);
                            if tail.len() == STDERR_TAIL_LINES {
                                tail.pop_front();
                            }
                            tail.push_back(line);
                        }
                        Ok(None) => break, // EOF
                        Err(_) => break,
                    }
                }
            }
        }
    }

    let status = child.wait().await?;
    if !status.success() {
        let message = tail.into_iter().collect::<Vec<_>>().join("\n");
        return Err(AppError::external(
            "transcriber",
            format!("exited with {}: {}", status, message),
        ));
    }

    if !transcript_path.exists() {
        return Err(AppError::external(
            "transcriber",
            format!("no transcript written at {:?}", transcript_path),
        ));
    }

    log::info!("Transcription output saved to: {:?}", transcript_path);
    Ok(transcript_path)
}
