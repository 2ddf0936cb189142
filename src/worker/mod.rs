pub mod catalog;
pub mod download;
pub mod transcribe;

use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::database::{Database, IngestOutcome};
use crate::error::AppError;
use crate::transcript::parse_transcript;

use download::{DownloadJob, DownloadResult};
use transcribe::{TranscribeJob, TranscribeResult};

/// Totals for one ingestion run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    pub downloaded: usize,
    pub download_failed: usize,
    pub ingested: usize,
    pub skipped: usize,
    pub failed: usize,
    pub segments: usize,
    pub words: usize,
    pub cancelled: bool,
    /// Set when the run started from a channel listing
    pub shorts: Option<catalog::ShortsStats>,
}

/// Downloads, transcribes and stores videos.
///
/// Download and transcription each run in their own task, fed through
/// channels; the scheduler loop here keeps one transcription in flight and
/// writes finished transcripts to the store.
pub struct IngestWorker {
    db: Arc<Database>,
    config: AppConfig,
}

impl IngestWorker {
    pub fn new(db: Arc<Database>, config: AppConfig) -> Self {
        Self { db, config }
    }

    /// Local videos in the downloads directory that the store has not seen
    pub fn pending_local_videos(&self) -> Result<Vec<TranscribeJob>, AppError> {
        let dir = &self.config.downloads_dir;
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut videos: Vec<(String, PathBuf)> = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_video = path
                .extension()
                .map_or(false, |ext| ext == self.config.video_extension.as_str());
            if !is_video {
                continue;
            }
            if let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().to_string()) {
                videos.push((stem, path));
            }
        }
        videos.sort();

        let mut jobs = Vec::new();
        for (video_id, video_path) in videos {
            if self.db.has_video(&video_id)? {
                log::debug!("Skipping {} (already in database)", video_id);
                continue;
            }
            jobs.push(TranscribeJob {
                video_id,
                video_path,
            });
        }
        Ok(jobs)
    }

    /// Run the pipeline: download `video_ids`, then transcribe and store every
    /// video in the downloads directory that is not indexed yet.
    pub async fn run(
        &self,
        video_ids: Vec<String>,
        cancel: CancellationToken,
    ) -> Result<IngestReport, AppError> {
        log::info!(
            "Run started at {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        self.config.ensure_dirs()?;

        let mut report = IngestReport::default();
        let mut queued: HashSet<String> = HashSet::new();
        let mut pending: VecDeque<TranscribeJob> = VecDeque::new();
        for job in self.pending_local_videos()? {
            queued.insert(job.video_id.clone());
            pending.push_back(job);
        }
        log::info!(
            "{} local videos to transcribe, {} videos to download",
            pending.len(),
            video_ids.len()
        );

        // Create channels
        let (download_tx, download_rx) = mpsc::channel::<DownloadJob>(4);
        let (download_result_tx, mut download_result_rx) = mpsc::channel::<DownloadResult>(4);
        let (transcribe_tx, transcribe_rx) = mpsc::channel::<TranscribeJob>(4);
        let (transcribe_result_tx, mut transcribe_result_rx) =
            mpsc::channel::<TranscribeResult>(4);

        // Spawn download task
        let download_handle = tokio::spawn(download::download_task(
            self.config.downloader.clone(),
            self.config.downloads_dir.clone(),
            self.config.video_extension.clone(),
            download_rx,
            download_result_tx,
            cancel.clone(),
        ));

        // Feed download jobs from their own task so a full channel never
        // stalls the scheduler
        tokio::spawn(async move {
            for video_id in video_ids {
                if download_tx.send(DownloadJob { video_id }).await.is_err() {
                    break;
                }
            }
        });

        // Spawn transcribe task
        let transcribe_handle = tokio::spawn(transcribe::transcribe_task(
            self.config.transcriber.clone(),
            self.config.transcripts_dir.clone(),
            transcribe_rx,
            transcribe_result_tx,
            cancel.clone(),
        ));

        let mut downloads_done = false;
        let mut transcribe_busy = false;

        // Scheduler loop
        loop {
            if !transcribe_busy {
                if let Some(job) = pending.pop_front() {
                    if transcribe_tx.send(job).await.is_err() {
                        log::warn!("Transcribe task is gone, stopping");
                        break;
                    }
                    transcribe_busy = true;
                }
            }

            if downloads_done && !transcribe_busy && pending.is_empty() {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    log::info!("Ingestion cancelled");
                    report.cancelled = true;
                    break;
                }
                result = download_result_rx.recv(), if !downloads_done => {
                    match result {
                        Some(result) => self.handle_download_complete(
                            result,
                            &mut report,
                            &mut queued,
                            &mut pending,
                        ),
                        None => downloads_done = true,
                    }
                }
                result = transcribe_result_rx.recv(), if transcribe_busy => {
                    transcribe_busy = false;
                    match result {
                        Some(result) => self.handle_transcribe_complete(result, &mut report).await,
                        None => {
                            log::warn!("Transcribe result channel closed");
                            break;
                        }
                    }
                }
            }
        }

        // A result can win the race against the cancel branch above
        report.cancelled |= cancel.is_cancelled();

        drop(transcribe_tx);
        let _ = download_handle.await;
        let _ = transcribe_handle.await;

        log::info!(
            "All done: {} ingested, {} skipped, {} failed ({} segments, {} words). Updated as of {}",
            report.ingested,
            report.skipped,
            report.failed,
            report.segments,
            report.words,
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        Ok(report)
    }

    fn handle_download_complete(
        &self,
        result: DownloadResult,
        report: &mut IngestReport,
        queued: &mut HashSet<String>,
        pending: &mut VecDeque<TranscribeJob>,
    ) {
        match result.result {
            Ok(video_path) => {
                report.downloaded += 1;
                if let Some(secs) = result.duration_seconds {
                    log::info!("Downloaded {} in {:.1}s", result.video_id, secs);
                }
                match self.db.has_video(&result.video_id) {
                    Ok(true) => {}
                    Ok(false) => {
                        if queued.insert(result.video_id.clone()) {
                            pending.push_back(TranscribeJob {
                                video_id: result.video_id,
                                video_path,
                            });
                        }
                    }
                    Err(e) => {
                        log::error!("Failed to check {} in database: {}", result.video_id, e);
                        report.failed += 1;
                    }
                }
            }
            Err(e) => {
                log::warn!("Failed {}: {}", result.video_id, e);
                report.download_failed += 1;
            }
        }
    }

    async fn handle_transcribe_complete(&self, result: TranscribeResult, report: &mut IngestReport) {
        let video_id = result.video_id.clone();
        let transcript_path = match result.result {
            Ok(path) => path,
            Err(e) => {
                log::error!("Transcription failed for {}: {}", video_id, e);
                report.failed += 1;
                return;
            }
        };
        if let Some(secs) = result.duration_seconds {
            log::info!("Transcribed {} in {:.1}s", video_id, secs);
        }

        match self.store_transcript(&video_id, transcript_path).await {
            Ok(IngestOutcome::Inserted { segments, words }) => {
                log::info!("Indexed {}: {} segments, {} words", video_id, segments, words);
                report.ingested += 1;
                report.segments += segments;
                report.words += words;
            }
            Ok(IngestOutcome::Skipped) => {
                report.skipped += 1;
            }
            Err(e) => {
                log::error!("Failed to index {}: {}", video_id, e);
                report.failed += 1;
            }
        }
    }

    async fn store_transcript(
        &self,
        video_id: &str,
        transcript_path: PathBuf,
    ) -> Result<IngestOutcome, AppError> {
        let content = tokio::fs::read_to_string(&transcript_path).await?;
        let parsed = parse_transcript(&content)?;
        if parsed.is_empty() {
            log::warn!("Transcript for {} has no words", video_id);
        }

        let db = self.db.clone();
        let video_id = video_id.to_string();
        let outcome = tokio::task::spawn_blocking(move || {
            db.ingest_video(&video_id, &parsed.segments, &parsed.words)
        })
        .await??;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TRANSCRIPT: &str = r#"{"segments": [
        {"text": " This means that.", "words": [
            {"word": " This", "start": 0.0, "end": 0.2},
            {"word": " means", "start": 0.2, "end": 0.5},
            {"word": " that.", "start": 0.5, "end": 0.9}
        ]}
    ]}"#;

    fn setup() -> (IngestWorker, Arc<Database>, TempDir) {
        let temp = TempDir::new().unwrap();
        let mut config = AppConfig::rooted_at(temp.path().to_path_buf());
        config.transcriber.program = "/nonexistent/whisper".to_string();
        config.ensure_dirs().unwrap();
        let db = Arc::new(Database::new(&config.db_path).unwrap());
        (IngestWorker::new(db.clone(), config), db, temp)
    }

    #[tokio::test]
    async fn test_ingests_local_videos_with_existing_transcripts() {
        let (worker, db, temp) = setup();
        let root = temp.path();
        std::fs::write(root.join("downloads/vid1.mp4"), b"video").unwrap();
        std::fs::write(root.join("downloads/notes.txt"), b"not a video").unwrap();
        std::fs::write(root.join("transcripts/vid1.json"), TRANSCRIPT).unwrap();

        let report = worker.run(Vec::new(), CancellationToken::new()).await.unwrap();
        assert_eq!(report.ingested, 1);
        assert_eq!(report.segments, 1);
        assert_eq!(report.words, 3);
        assert!(db.has_video("vid1").unwrap());

        // Second run finds nothing left to do
        let report = worker.run(Vec::new(), CancellationToken::new()).await.unwrap();
        assert_eq!(report.ingested, 0);
        assert_eq!(report.failed, 0);
    }

    #[tokio::test]
    async fn test_empty_transcript_is_not_reingested() {
        let (worker, db, temp) = setup();
        let root = temp.path();
        std::fs::write(root.join("downloads/silent.mp4"), b"video").unwrap();
        std::fs::write(root.join("transcripts/silent.json"), r#"{"segments": []}"#).unwrap();

        let report = worker.run(Vec::new(), CancellationToken::new()).await.unwrap();
        assert_eq!(report.ingested, 1);
        assert_eq!(report.words, 0);
        assert!(db.has_video("silent").unwrap());

        let report = worker.run(Vec::new(), CancellationToken::new()).await.unwrap();
        assert_eq!(report.ingested, 0);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.failed, 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_stops_slow_transcription_and_keeps_committed_videos() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let mut config = AppConfig::rooted_at(root.to_path_buf());
        // The "video" is a shell script the transcriber runs; it never writes a transcript
        config.transcriber.program = "sh".to_string();
        config.ensure_dirs().unwrap();
        let db = Arc::new(Database::new(&config.db_path).unwrap());
        let worker = IngestWorker::new(db.clone(), config);

        std::fs::write(root.join("downloads/a.mp4"), b"video").unwrap();
        std::fs::write(root.join("transcripts/a.json"), TRANSCRIPT).unwrap();
        std::fs::write(root.join("downloads/b.mp4"), "exec sleep 30\n").unwrap();

        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        let watched = db.clone();
        tokio::spawn(async move {
            while !watched.has_video("a").unwrap_or(false) {
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            }
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            canceller.cancel();
        });

        let started = std::time::Instant::now();
        let report = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            worker.run(Vec::new(), cancel),
        )
        .await
        .expect("run did not stop after cancel")
        .unwrap();

        assert!(report.cancelled);
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
        assert_eq!(report.ingested, 1);
        assert!(db.has_video("a").unwrap());
        assert!(!db.has_video("b").unwrap());
    }

    #[tokio::test]
    async fn test_missing_transcriber_counts_as_failure() {
        let (worker, db, temp) = setup();
        std::fs::write(temp.path().join("downloads/vid2.mp4"), b"video").unwrap();

        let report = worker.run(Vec::new(), CancellationToken::new()).await.unwrap();
        assert_eq!(report.failed, 1);
        assert!(!db.has_video("vid2").unwrap());
    }

    #[tokio::test]
    async fn test_pending_skips_indexed_videos() {
        let (worker, db, temp) = setup();
        std::fs::write(temp.path().join("downloads/a.mp4"), b"video").unwrap();
        std::fs::write(temp.path().join("downloads/b.mp4"), b"video").unwrap();
        db.ingest_video(
            "a",
            &[],
            &[crate::database::NewWord {
                word: "hi".to_string(),
                start: 0.0,
                end: 0.1,
            }],
        )
        .unwrap();

        let pending = worker.pending_local_videos().unwrap();
        let ids: Vec<&str> = pending.iter().map(|j| j.video_id.as_str()).collect();
        assert_eq!(ids, vec!["b"]);
    }
}
