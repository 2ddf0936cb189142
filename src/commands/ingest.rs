use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::database::Database;
use crate::error::AppError;
use crate::worker::catalog::{fetch_channel_shorts, ShortsStats};
use crate::worker::{IngestReport, IngestWorker};

/// Video ids from a file, one per line. Blank lines and `#` comments are
/// ignored; full watch URLs are reduced to their `v=` id.
pub fn read_video_ids(path: &Path) -> Result<Vec<String>, AppError> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_video_ids(&content))
}

fn parse_video_ids(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| match line.split_once("v=") {
            Some((_, rest)) => rest.split('&').next().unwrap_or(rest).to_string(),
            None => line.to_string(),
        })
        .collect()
}

/// Merge two id lists, keeping first-seen order
fn merge_video_ids(first: Vec<String>, second: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    first
        .into_iter()
        .chain(second)
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// Download the ids in `ids_file` and the shorts of `channel`, then
/// transcribe and index everything in the downloads directory.
pub async fn run_ingest(
    db: &Arc<Database>,
    config: &AppConfig,
    ids_file: Option<&Path>,
    channel: Option<&str>,
    cancel: CancellationToken,
) -> Result<IngestReport, AppError> {
    let listed = match ids_file {
        Some(path) => read_video_ids(path)?,
        None => Vec::new(),
    };

    let mut shorts = None;
    let mut channel_ids = Vec::new();
    if let Some(channel) = channel {
        let entries = fetch_channel_shorts(&config.downloader, channel, &cancel).await?;
        shorts = ShortsStats::from_entries(&entries);
        match &shorts {
            Some(stats) => {
                log::info!("Total shorts: {}", stats.total);
                log::info!(
                    "Avg short duration: {:.2}s ({:.2} min)",
                    stats.average_seconds,
                    stats.average_seconds / 60.0
                );
                log::info!("Longest short: {} @ {:.2}s", stats.longest_id, stats.longest_seconds);
                log::info!("Shortest short: {} @ {:.2}s", stats.shortest_id, stats.shortest_seconds);
            }
            None => log::warn!("No shorts found on {}", channel),
        }
        channel_ids = entries.into_iter().map(|e| e.video_id).collect();
    }

    let worker = IngestWorker::new(db.clone(), config.clone());
    let mut report = worker
        .run(merge_video_ids(listed, channel_ids), cancel)
        .await?;
    report.shorts = shorts;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_video_ids() {
        let content = "\
# shorts to fetch
abc123

https://www.youtube.com/watch?v=def456&t=3s
  ghi789
";
        assert_eq!(parse_video_ids(content), vec!["abc123", "def456", "ghi789"]);
    }

    #[test]
    fn test_merge_video_ids_dedupes() {
        let ids = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert_eq!(
            merge_video_ids(ids(&["a", "b"]), ids(&["b", "c", "a"])),
            ids(&["a", "b", "c"])
        );
    }

    #[tokio::test]
    async fn test_channel_listing_failure_stops_before_ingest() {
        let temp = tempfile::TempDir::new().unwrap();
        let mut config = AppConfig::rooted_at(temp.path().to_path_buf());
        config.downloader.program = "/nonexistent/yt-dlp".to_string();
        let db = Arc::new(Database::open_in_memory().unwrap());

        let result = run_ingest(
            &db,
            &config,
            None,
            Some("https://example.invalid/c"),
            CancellationToken::new(),
        )
        .await;
        assert!(matches!(result, Err(AppError::External { .. })));
    }
}
