use serde::Serialize;
use std::sync::Arc;

use crate::database::memory::MemoryCorpus;
use crate::database::{Database, SegmentSearchHit};
use crate::error::AppError;
use crate::matcher::normalize::normalize;
use crate::matcher::{CorpusStore, MatchItem, SegmentCoverage, SentenceMatcher};

#[derive(Debug, Serialize)]
pub struct MatchResponse {
    pub sentence: String,
    pub tokens: Vec<String>,
    pub items: Vec<MatchItem>,
    pub total_duration: f64,
}

/// Strict sentence match: every token must be covered or the call fails
pub async fn match_sentence(db: &Arc<Database>, sentence: String) -> Result<MatchResponse, AppError> {
    match_sentence_in(db.clone(), sentence).await
}

/// Strict match against any corpus store, e.g. a preloaded `MemoryCorpus`
pub async fn match_sentence_in<S>(store: S, sentence: String) -> Result<MatchResponse, AppError>
where
    S: CorpusStore + Send + 'static,
{
    log::info!("Matching sentence: '{}'", sentence);

    let matcher = SentenceMatcher::new(store);
    let (tokens, items, sentence) = tokio::task::spawn_blocking(move || {
        let tokens = normalize(&sentence)?;
        let items = matcher.match_sentence(&sentence)?;
        Ok::<_, AppError>((tokens, items, sentence))
    })
    .await??;

    let total_duration = items.iter().map(|i| (i.end - i.start).max(0.0)).sum();
    log::info!(
        "Matched {} tokens with {} clips ({:.2}s)",
        tokens.len(),
        items.len(),
        total_duration
    );

    Ok(MatchResponse {
        sentence,
        tokens,
        items,
        total_duration,
    })
}

/// Best-effort segment cover; unmatched words are reported, not fatal
pub async fn find_segments(db: &Arc<Database>, sentence: String) -> Result<SegmentCoverage, AppError> {
    find_segments_in(db.clone(), sentence).await
}

pub async fn find_segments_in<S>(store: S, sentence: String) -> Result<SegmentCoverage, AppError>
where
    S: CorpusStore + Send + 'static,
{
    let matcher = SentenceMatcher::new(store);
    let coverage =
        tokio::task::spawn_blocking(move || matcher.find_all_segments(&sentence)).await??;
    Ok(coverage)
}

/// Load the whole corpus into memory, for repeated lookups without SQLite
pub async fn load_memory_corpus(db: &Arc<Database>) -> Result<Arc<MemoryCorpus>, AppError> {
    let db = db.clone();
    let corpus = tokio::task::spawn_blocking(move || MemoryCorpus::from_database(&db)).await??;
    Ok(Arc::new(corpus))
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SegmentSearchHit>,
    pub query: String,
}

pub async fn search_segments(
    db: &Arc<Database>,
    query: String,
    limit: Option<i64>,
) -> Result<SearchResponse, AppError> {
    let limit = limit.unwrap_or(20);

    log::info!("Searching segments for: '{}' (limit={})", query, limit);

    let clean_query = query.trim();
    if clean_query.is_empty() {
        return Ok(SearchResponse {
            results: vec![],
            query: query.clone(),
        });
    }

    let results = db.search_segments(clean_query, limit).map_err(AppError::from)?;

    Ok(SearchResponse { results, query })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{NewSegment, NewWord};
    use crate::error::MatchError;
    use crate::matcher::MatchKind;

    fn seeded_db() -> Arc<Database> {
        let db = Database::open_in_memory().unwrap();
        db.ingest_video(
            "vid1",
            &[NewSegment {
                text: "this means that".to_string(),
                start: 1.0,
                end: 2.0,
            }],
            &[
                NewWord { word: "this".to_string(), start: 1.0, end: 1.3 },
                NewWord { word: "means".to_string(), start: 1.3, end: 1.6 },
                NewWord { word: "that".to_string(), start: 1.6, end: 2.0 },
            ],
        )
        .unwrap();
        Arc::new(db)
    }

    #[tokio::test]
    async fn test_match_sentence_command() {
        let db = seeded_db();
        let response = match_sentence(&db, "This means THAT, that!".to_string())
            .await
            .unwrap();

        assert_eq!(response.tokens.len(), 4);
        assert_eq!(response.items.len(), 2);
        assert_eq!(response.items[0].kind, MatchKind::Segment);
        assert_eq!(response.items[1].kind, MatchKind::Word);
        assert!((response.total_duration - 1.4).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_match_sentence_command_surfaces_unmatched_token() {
        let db = seeded_db();
        let err = match_sentence(&db, "this and that".to_string())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Match(MatchError::UnmatchedToken { position: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_memory_corpus_gives_same_answers() {
        let db = seeded_db();
        let corpus = load_memory_corpus(&db).await.unwrap();

        let from_db = match_sentence(&db, "this means that that".to_string())
            .await
            .unwrap();
        let from_memory = match_sentence_in(corpus.clone(), "this means that that".to_string())
            .await
            .unwrap();
        assert_eq!(from_db.items, from_memory.items);

        let coverage = find_segments_in(corpus, "well this means that".to_string())
            .await
            .unwrap();
        assert_eq!(coverage.found.len(), 1);
        assert_eq!(coverage.leftover, vec!["well"]);
    }

    #[tokio::test]
    async fn test_search_segments_blank_query() {
        let db = seeded_db();
        let response = search_segments(&db, "   ".to_string(), None).await.unwrap();
        assert!(response.results.is_empty());
    }
}
