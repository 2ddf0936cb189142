use serde::Serialize;
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::config::DownloaderConfig;
use crate::error::AppError;

/// One upload listed on a channel
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub video_id: String,
    pub duration: f64,
}

/// Duration summary of the shorts picked from a channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShortsStats {
    pub total: usize,
    pub average_seconds: f64,
    pub longest_id: String,
    pub longest_seconds: f64,
    pub shortest_id: String,
    pub shortest_seconds: f64,
}

impl ShortsStats {
    /// `None` when there are no shorts to summarize
    pub fn from_entries(entries: &[CatalogEntry]) -> Option<Self> {
        let first = entries.first()?;
        let mut longest = first;
        let mut shortest = first;
        let mut sum = 0.0;
        for entry in entries {
            sum += entry.duration;
            if entry.duration > longest.duration {
                longest = entry;
            }
            if entry.duration < shortest.duration {
                shortest = entry;
            }
        }
        Some(Self {
            total: entries.len(),
            average_seconds: sum / entries.len() as f64,
            longest_id: longest.video_id.clone(),
            longest_seconds: longest.duration,
            shortest_id: shortest.video_id.clone(),
            shortest_seconds: shortest.duration,
        })
    }
}

/// Arguments that list a channel's uploads as `<id> <duration>` lines
pub fn build_catalog_args(channel_url: &str) -> Vec<String> {
    vec![
        "--flat-playlist".to_string(),
        "--print".to_string(),
        "%(id)s %(duration)s".to_string(),
        "--no-warnings".to_string(),
        channel_url.to_string(),
    ]
}

/// Parse `<id> <duration>` lines. Entries without a known duration
/// (live streams, premieres) are dropped.
pub fn parse_catalog(output: &str) -> Vec<CatalogEntry> {
    let mut entries = Vec::new();
    for line in output.lines() {
        let mut parts = line.split_whitespace();
        let (Some(video_id), Some(duration)) = (parts.next(), parts.next()) else {
            continue;
        };
        match duration.parse::<f64>() {
            Ok(duration) => entries.push(CatalogEntry {
                video_id: video_id.to_string(),
                duration,
            }),
            Err(_) => log::debug!("No duration for {} ({}), skipping", video_id, duration),
        }
    }
    entries
}

/// Uploads no longer than `max_duration` seconds, in listing order
pub fn select_shorts(entries: Vec<CatalogEntry>, max_duration: f64) -> Vec<CatalogEntry> {
    entries
        .into_iter()
        .filter(|entry| entry.duration <= max_duration)
        .collect()
}

/// List a channel with the downloader and keep its shorts
pub async fn fetch_channel_shorts(
    config: &DownloaderConfig,
    channel_url: &str,
    cancel: &CancellationToken,
) -> Result<Vec<CatalogEntry>, AppError> {
    log::info!("Listing uploads of {}", channel_url);

    let child = Command::new(&config.program)
        .args(build_catalog_args(channel_url))
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| AppError::external("yt-dlp", format!("failed to spawn: {}", e)))?;

    let output = tokio::select! {
        _ = cancel.cancelled() => {
            return Err(AppError::Other("Channel listing cancelled".to_string()));
        }
        output = child.wait_with_output() => output?,
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AppError::external("yt-dlp", stderr.trim().to_string()));
    }

    let entries = parse_catalog(&String::from_utf8_lossy(&output.stdout));
    let listed = entries.len();
    let shorts = select_shorts(entries, config.max_duration);
    log::info!(
        "{} uploads listed, {} no longer than {}s",
        listed,
        shorts.len(),
        config.max_duration
    );
    Ok(shorts)
}
