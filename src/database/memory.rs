//! In-memory corpus for small catalogs and tests.
//!
//! Same lookup contract as the SQLite store: keys are the lowercase
//! normalized text and every bucket is kept sorted by
//! `(video_id, start, id)` so the first entry is the tie-break winner.
//! Words have no id of their own; an insertion sequence stands in for the
//! rowid, which matches SQLite when loaded with `from_database`.

use std::cmp::Ordering;
use std::collections::HashMap;

use anyhow::Result;

use super::{Database, SegmentSpan, WordSpan};
use crate::error::StoreError;
use crate::matcher::CorpusStore;

#[derive(Debug, Default, Clone)]
pub struct MemoryCorpus {
    segments: HashMap<String, Vec<SegmentSpan>>,
    words: HashMap<String, Vec<(u64, WordSpan)>>,
    next_segment_id: i64,
    next_word_seq: u64,
}

fn segment_order(a: &SegmentSpan, b: &SegmentSpan) -> Ordering {
    a.video_id
        .cmp(&b.video_id)
        .then(a.start.total_cmp(&b.start))
        .then(a.id.cmp(&b.id))
}

fn word_order(a: &(u64, WordSpan), b: &(u64, WordSpan)) -> Ordering {
    a.1.video_id
        .cmp(&b.1.video_id)
        .then(a.1.start.total_cmp(&b.1.start))
        .then(a.0.cmp(&b.0))
}

impl MemoryCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Eagerly load every span from the database.
    pub fn from_database(db: &Database) -> Result<Self> {
        let mut corpus = Self::new();
        for segment in db.list_segments()? {
            corpus.push_segment(segment);
        }
        for word in db.list_words()? {
            corpus.insert_word(&word.video_id, &word.word, word.start, word.end);
        }
        log::info!(
            "Loaded in-memory corpus: {} distinct phrases, {} distinct words",
            corpus.segments.len(),
            corpus.words.len()
        );
        Ok(corpus)
    }

    /// Add a segment, assigning the next id. `text` must already be normalized.
    pub fn insert_segment(&mut self, video_id: &str, text: &str, start: f64, end: f64) -> i64 {
        let id = self.next_segment_id + 1;
        self.push_segment(SegmentSpan {
            id,
            video_id: video_id.to_string(),
            text: text.to_string(),
            start,
            end,
        });
        id
    }

    fn push_segment(&mut self, segment: SegmentSpan) {
        self.next_segment_id = self.next_segment_id.max(segment.id);
        let bucket = self.segments.entry(segment.text.to_lowercase()).or_default();
        let pos = bucket
            .binary_search_by(|other| segment_order(other, &segment))
            .unwrap_or_else(|pos| pos);
        bucket.insert(pos, segment);
    }

    /// Add a word occurrence. `word` must already be normalized.
    pub fn insert_word(&mut self, video_id: &str, word: &str, start: f64, end: f64) {
        self.next_word_seq += 1;
        let entry = (
            self.next_word_seq,
            WordSpan {
                video_id: video_id.to_string(),
                word: word.to_string(),
                start,
                end,
            },
        );
        let bucket = self.words.entry(word.to_lowercase()).or_default();
        let pos = bucket
            .binary_search_by(|other| word_order(other, &entry))
            .unwrap_or_else(|pos| pos);
        bucket.insert(pos, entry);
    }
}

impl CorpusStore for MemoryCorpus {
    fn find_segment_by_phrase(&self, phrase: &str) -> Result<Option<SegmentSpan>, StoreError> {
        Ok(self
            .segments
            .get(&phrase.to_lowercase())
            .and_then(|bucket| bucket.first())
            .cloned())
    }

    fn find_word_span(&self, word: &str) -> Result<Option<WordSpan>, StoreError> {
        Ok(self
            .words
            .get(&word.to_lowercase())
            .and_then(|bucket| bucket.first())
            .map(|(_, span)| span.clone()))
    }
}
