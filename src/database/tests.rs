// Edge-case tests for the transcript corpus store
// Run with: cargo test --package soundbite --lib database::tests

#[cfg(test)]
mod corpus_tests {
    use crate::database::memory::MemoryCorpus;
    use crate::database::{Database, IngestOutcome, NewSegment, NewWord};
    use crate::matcher::CorpusStore;
    use tempfile::TempDir;

    fn setup_test_db() -> (Database, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Database::new(&db_path).unwrap();
        (db, temp_dir)
    }

    fn segment(text: &str, start: f64, end: f64) -> NewSegment {
        NewSegment {
            text: text.to_string(),
            start,
            end,
        }
    }

    fn words(text: &str, start: f64) -> Vec<NewWord> {
        text.split_whitespace()
            .enumerate()
            .map(|(i, w)| NewWord {
                word: w.to_string(),
                start: start + i as f64 * 0.5,
                end: start + i as f64 * 0.5 + 0.4,
            })
            .collect()
    }

    // =========================================================================
    // Schema and ingestion
    // =========================================================================

    #[test]
    fn test_schema_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        {
            let db = Database::new(&db_path).unwrap();
            db.ingest_video("v1", &[segment("hello there", 0.0, 1.0)], &words("hello there", 0.0))
                .unwrap();
        }
        let db = Database::new(&db_path).unwrap();
        assert!(db.has_video("v1").unwrap());
        assert_eq!(db.get_stats().unwrap().segments, 1);
    }

    #[test]
    fn test_ingest_is_idempotent_per_video() {
        let (db, _temp) = setup_test_db();
        let first = db
            .ingest_video("v1", &[segment("one two", 0.0, 1.0)], &words("one two", 0.0))
            .unwrap();
        assert_eq!(first, IngestOutcome::Inserted { segments: 1, words: 2 });

        let second = db
            .ingest_video("v1", &[segment("one two", 0.0, 1.0)], &words("one two", 0.0))
            .unwrap();
        assert_eq!(second, IngestOutcome::Skipped);

        let stats = db.get_stats().unwrap();
        assert_eq!(stats.segments, 1);
        assert_eq!(stats.words, 2);
    }

    #[test]
    fn test_has_video_with_words_only() {
        let (db, _temp) = setup_test_db();
        assert!(!db.has_video("v1").unwrap());
        db.ingest_video("v1", &[], &words("lonely", 0.0)).unwrap();
        assert!(db.has_video("v1").unwrap());
    }

    #[test]
    fn test_empty_transcript_is_recorded_once() {
        let (db, _temp) = setup_test_db();
        let first = db.ingest_video("silent", &[], &[]).unwrap();
        assert_eq!(first, IngestOutcome::Inserted { segments: 0, words: 0 });
        assert!(db.has_video("silent").unwrap());

        let second = db.ingest_video("silent", &[], &[]).unwrap();
        assert_eq!(second, IngestOutcome::Skipped);
        assert_eq!(db.get_stats().unwrap().videos, 1);
    }

    #[test]
    fn test_inverted_segment_is_rejected_atomically() {
        let (db, _temp) = setup_test_db();
        let result = db.ingest_video(
            "v1",
            &[segment("fine", 0.0, 1.0), segment("backwards", 3.0, 2.0)],
            &words("fine backwards", 0.0),
        );
        assert!(result.is_err());
        // Nothing from the failed transaction is visible
        assert!(!db.has_video("v1").unwrap());
        assert_eq!(db.get_stats().unwrap().segments, 0);
    }

    // =========================================================================
    // Exact lookups
    // =========================================================================

    #[test]
    fn test_segment_lookup_is_exact_not_containment() {
        let (db, _temp) = setup_test_db();
        db.ingest_video("v1", &[segment("a b c", 0.0, 1.5)], &words("a b c", 0.0))
            .unwrap();

        assert!(db.find_segment("a b").unwrap().is_none());
        assert!(db.find_segment("b c").unwrap().is_none());
        let hit = db.find_segment("a b c").unwrap().unwrap();
        assert_eq!(hit.video_id, "v1");
        assert_eq!(hit.text, "a b c");
    }

    #[test]
    fn test_lookups_ignore_case() {
        let (db, _temp) = setup_test_db();
        db.ingest_video("v1", &[segment("hello there", 0.0, 1.0)], &words("hello there", 0.0))
            .unwrap();

        assert!(db.find_segment("HELLO There").unwrap().is_some());
        assert!(db.find_word("HeLLo").unwrap().is_some());
        assert!(db.find_word("hell").unwrap().is_none());
    }

    #[test]
    fn test_tie_break_prefers_earliest_video_then_start() {
        let (db, _temp) = setup_test_db();
        db.ingest_video("vid_b", &[segment("same words", 0.5, 1.5)], &words("same words", 0.5))
            .unwrap();
        db.ingest_video(
            "vid_a",
            &[segment("same words", 7.0, 8.0), segment("same words", 2.0, 3.0)],
            &words("same words", 7.0),
        )
        .unwrap();

        let hit = db.find_segment("same words").unwrap().unwrap();
        assert_eq!(hit.video_id, "vid_a");
        assert_eq!(hit.start, 2.0);

        let word = db.find_word("same").unwrap().unwrap();
        assert_eq!(word.video_id, "vid_a");
        assert_eq!(word.start, 7.0);
    }

    #[test]
    fn test_corpus_store_impl_delegates() {
        let (db, _temp) = setup_test_db();
        db.ingest_video("v1", &[segment("x y", 0.0, 1.0)], &words("x y", 0.0))
            .unwrap();
        assert!(db.find_segment_by_phrase("x y").unwrap().is_some());
        assert!(db.find_word_span("y").unwrap().is_some());
        assert!(db.find_word_span("z").unwrap().is_none());
    }

    // =========================================================================
    // Search and reporting
    // =========================================================================

    #[test]
    fn test_search_finds_contained_phrase() {
        let (db, _temp) = setup_test_db();
        db.ingest_video(
            "v1",
            &[
                segment("i like big trucks", 0.0, 2.0),
                segment("trucks are big", 3.0, 4.0),
            ],
            &words("i like big trucks", 0.0),
        )
        .unwrap();

        let hits = db.search_segments("Big Trucks!", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].segment.text, "i like big trucks");
        assert!(hits[0].snippet.contains("[big"));

        assert!(db.search_segments("?!", 10).unwrap().is_empty());
    }

    #[test]
    fn test_search_quotes_fts_operators() {
        let (db, _temp) = setup_test_db();
        db.ingest_video("v1", &[segment("this or that", 0.0, 1.0)], &words("this or that", 0.0))
            .unwrap();
        let hits = db.search_segments("this OR that", 10).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_word_count_and_top_words() {
        let (db, _temp) = setup_test_db();
        db.ingest_video("v1", &[], &words("the cat the dog the", 0.0)).unwrap();
        db.ingest_video("v2", &[], &words("dog cat", 0.0)).unwrap();

        assert_eq!(db.word_count("the").unwrap(), 3);
        assert_eq!(db.word_count("THE").unwrap(), 3);
        assert_eq!(db.word_count("bird").unwrap(), 0);

        let top = db.top_words(10).unwrap();
        let ranked: Vec<(&str, i64)> = top.iter().map(|w| (w.word.as_str(), w.count)).collect();
        // Ties fall back to alphabetical order
        assert_eq!(ranked, vec![("the", 3), ("cat", 2), ("dog", 2)]);

        assert_eq!(db.top_words(1).unwrap().len(), 1);
    }

    #[test]
    fn test_stats() {
        let (db, _temp) = setup_test_db();
        db.ingest_video("v1", &[segment("hi hi", 0.0, 1.0)], &words("hi hi", 0.0))
            .unwrap();
        db.ingest_video("v2", &[], &words("yo", 0.0)).unwrap();

        let stats = db.get_stats().unwrap();
        assert_eq!(stats.videos, 2);
        assert_eq!(stats.segments, 1);
        assert_eq!(stats.words, 3);
        assert_eq!(stats.distinct_words, 2);
    }

    #[test]
    fn test_memory_corpus_matches_database() {
        let (db, _temp) = setup_test_db();
        db.ingest_video("vid_b", &[segment("good morning", 0.0, 1.0)], &words("good morning", 0.0))
            .unwrap();
        db.ingest_video("vid_a", &[segment("good morning", 4.0, 5.0)], &words("good morning", 4.0))
            .unwrap();

        let corpus = MemoryCorpus::from_database(&db).unwrap();
        assert_eq!(
            corpus.find_segment_by_phrase("good morning").unwrap(),
            db.find_segment("good morning").unwrap()
        );
        assert_eq!(
            corpus.find_word_span("morning").unwrap(),
            db.find_word("morning").unwrap()
        );
    }

    #[test]
    fn test_memory_corpus_agrees_on_duplicate_word_timestamps() {
        let (db, _temp) = setup_test_db();
        let dupes = [(1.2, "Hi"), (1.5, "hi"), (1.9, "HI")]
            .iter()
            .map(|(end, w)| NewWord {
                word: w.to_string(),
                start: 1.0,
                end: *end,
            })
            .collect::<Vec<_>>();
        db.ingest_video("vid", &[], &dupes).unwrap();

        let corpus = MemoryCorpus::from_database(&db).unwrap();
        let from_db = db.find_word("hi").unwrap().unwrap();
        assert_eq!(from_db.end, 1.2);
        assert_eq!(corpus.find_word_span("hi").unwrap(), Some(from_db));
    }
}
