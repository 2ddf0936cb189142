use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::{CorpusStats, Database, SegmentSpan, WordFrequency};
use crate::error::AppError;
use crate::matcher::normalize::normalize;

pub async fn get_stats(db: &Arc<Database>) -> Result<CorpusStats, AppError> {
    db.get_stats().map_err(AppError::from)
}

#[derive(Debug, Serialize)]
pub struct WordCountResponse {
    pub word: String,
    pub count: i64,
}

/// How many times the creator has said a word
pub async fn word_count(db: &Arc<Database>, word: String) -> Result<WordCountResponse, AppError> {
    let tokens = normalize(&word)?;
    if tokens.len() != 1 {
        return Err(AppError::Other(format!(
            "Expected a single word, got {} words",
            tokens.len()
        )));
    }
    let word = tokens.into_iter().next().unwrap_or_default();
    let count = db.word_count(&word)?;
    Ok(WordCountResponse { word, count })
}

pub async fn top_words(db: &Arc<Database>, limit: Option<i64>) -> Result<Vec<WordFrequency>, AppError> {
    db.top_words(limit.unwrap_or(10)).map_err(AppError::from)
}

#[derive(Debug, Serialize)]
pub struct SegmentListing {
    #[serde(flatten)]
    pub segment: SegmentSpan,
    pub video_path: PathBuf,
}

pub async fn list_segments(
    db: &Arc<Database>,
    config: &AppConfig,
) -> Result<Vec<SegmentListing>, AppError> {
    let segments = db.list_segments()?;
    Ok(segments
        .into_iter()
        .map(|segment| SegmentListing {
            video_path: config.video_path(&segment.video_id),
            segment,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::NewWord;

    fn word(w: &str, start: f64) -> NewWord {
        NewWord {
            word: w.to_string(),
            start,
            end: start + 0.2,
        }
    }

    #[tokio::test]
    async fn test_word_count_normalizes_query() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.ingest_video("v1", &[], &[word("wow", 0.0), word("wow", 1.0)])
            .unwrap();

        let response = word_count(&db, "  WOW! ".to_string()).await.unwrap();
        assert_eq!(response.word, "wow");
        assert_eq!(response.count, 2);

        assert!(word_count(&db, "two words".to_string()).await.is_err());
        assert!(word_count(&db, "?!".to_string()).await.is_err());
    }

    #[tokio::test]
    async fn test_list_segments_resolves_paths() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = AppConfig::rooted_at(temp.path().to_path_buf());
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.ingest_video(
            "v1",
            &[crate::database::NewSegment {
                text: "hi there".to_string(),
                start: 0.0,
                end: 0.8,
            }],
            &[word("hi", 0.0), word("there", 0.4)],
        )
        .unwrap();

        let listing = list_segments(&db, &config).await.unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].video_path, config.video_path("v1"));
    }
}
