use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::DownloaderConfig;
use crate::error::AppError;

const BACKOFF_DELAYS: [u64; 2] = [2, 8];
const MAX_ATTEMPTS: usize = 3;

/// Message sent to the download task
pub struct DownloadJob {
    pub video_id: String,
}

/// Result from a download task
pub struct DownloadResult {
    pub video_id: String,
    pub result: Result<PathBuf, AppError>,
    pub duration_seconds: Option<f64>,
}

/// Run the download task loop, receiving jobs and sending results
pub async fn download_task(
    config: DownloaderConfig,
    downloads_dir: PathBuf,
    video_extension: String,
    mut rx: mpsc::Receiver<DownloadJob>,
    result_tx: mpsc::Sender<DownloadResult>,
    cancel: CancellationToken,
) {
    log::info!("Download task started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                log::info!("Download task cancelled");
                break;
            }
            job = rx.recv() => {
                match job {
                    Some(job) => {
                        let start = std::time::Instant::now();
                        let result = download_video(
                            &config,
                            &job.video_id,
                            &downloads_dir,
                            &video_extension,
                            &cancel,
                        ).await;
                        let duration_seconds = if result.is_ok() { Some(start.elapsed().as_secs_f64()) } else { None };
                        let _ = result_tx.send(DownloadResult {
                            video_id: job.video_id,
                            result,
                            duration_seconds,
                        }).await;
                    }
                    None => {
                        log::info!("Download task channel closed");
                        break;
                    }
                }
            }
        }
    }
}

/// Download one video with yt-dlp, retrying with backoff.
///
/// A video whose file is already present is not downloaded again.
pub async fn download_video(
    config: &DownloaderConfig,
    video_id: &str,
    downloads_dir: &Path,
    video_extension: &str,
    cancel: &CancellationToken,
) -> Result<PathBuf, AppError> {
    let file_path = downloads_dir.join(format!("{}.{}", video_id, video_extension));
    if file_path.exists() {
        log::debug!("Skipping {} (already downloaded)", video_id);
        return Ok(file_path);
    }

    let mut last_error = None;
    for attempt in 0..MAX_ATTEMPTS {
        if cancel.is_cancelled() {
            return Err(AppError::Other("Download cancelled".to_string()));
        }

        match try_download(config, video_id, downloads_dir, video_extension, cancel).await {
            Ok(()) if file_path.exists() => return Ok(file_path),
            Ok(()) => {
                last_error = Some(AppError::external(
                    "yt-dlp",
                    format!("finished but {} is missing", file_path.display()),
                ));
            }
            Err(e) => {
                if e.to_string().contains("inappropriate for some users") {
                    log::warn!("{}: video may be inappropriate for some users", video_id);
                    return Err(e);
                }
                last_error = Some(e);
            }
        }

        if let (Some(delay), Some(e)) = (BACKOFF_DELAYS.get(attempt), last_error.as_ref()) {
            log::warn!(
                "Download attempt {} for {} failed, retrying in {}s: {}",
                attempt + 1,
                video_id,
                delay,
                e
            );
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(AppError::Other("Download cancelled".to_string()));
                }
                _ = tokio::time::sleep(std::time::Duration::from_secs(*delay)) => {}
            }
        }
    }

    Err(last_error.unwrap_or_else(|| AppError::Other(format!("Download of {} failed", video_id))))
}

/// yt-dlp arguments for one video
pub fn build_download_args(
    config: &DownloaderConfig,
    video_id: &str,
    downloads_dir: &Path,
    video_extension: &str,
) -> Vec<String> {
    let output_template = downloads_dir.join("%(id)s.%(ext)s");
    vec![
        "-f".to_string(),
        config.format.clone(),
        "-o".to_string(),
        output_template.to_string_lossy().to_string(),
        "--merge-output-format".to_string(),
        video_extension.to_string(),
        "--no-playlist".to_string(),
        "--quiet".to_string(),
        "--no-check-certificate".to_string(),
        config.url_template.replace("{id}", video_id),
    ]
}

async fn try_download(
    config: &DownloaderConfig,
    video_id: &str,
    downloads_dir: &Path,
    video_extension: &str,
    cancel: &CancellationToken,
) -> Result<(), AppError> {
    log::info!("Downloading {}", video_id);

    let child = Command::new(&config.program)
        .args(build_download_args(config, video_id, downloads_dir, video_extension))
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| AppError::external("yt-dlp", format!("failed to spawn: {}", e)))?;

    let output = tokio::select! {
        _ = cancel.cancelled() => {
            return Err(AppError::Other("Download cancelled".to_string()));
        }
        output = child.wait_with_output() => output?,
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AppError::external("yt-dlp", stderr.trim().to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_download_args() {
        let config = DownloaderConfig::default();
        let args = build_download_args(&config, "abc123", Path::new("/data/downloads"), "mp4");

        assert_eq!(args[0], "-f");
        assert_eq!(args[3], "/data/downloads/%(id)s.%(ext)s");
        assert!(args.contains(&"--no-playlist".to_string()));
        assert_eq!(
            args.last().unwrap(),
            "https://www.youtube.com/watch?v=abc123"
        );
    }

    #[tokio::test]
    async fn test_cancel_interrupts_retry_backoff() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = DownloaderConfig {
            program: "/nonexistent/yt-dlp".to_string(),
            ..DownloaderConfig::default()
        };
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            canceller.cancel();
        });

        let started = std::time::Instant::now();
        let err = download_video(&config, "vid1", temp.path(), "mp4", &cancel)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cancelled"));
        // First backoff alone is 2s
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_existing_file_is_not_downloaded() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(temp.path().join("vid1.mp4"), b"video").unwrap();

        let config = DownloaderConfig {
            program: "/nonexistent/yt-dlp".to_string(),
            ..DownloaderConfig::default()
        };
        let path = download_video(&config, "vid1", temp.path(), "mp4", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(path, temp.path().join("vid1.mp4"));
    }
}
