use serde::{Deserialize, Serialize};

/// A single transcribed word with its time range in the source video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordSpan {
    pub video_id: String,
    pub word: String,
    pub start: f64,
    pub end: f64,
}

/// A contiguous transcribed utterance.
///
/// `text` is the space-joined normalized words of the utterance, so it can be
/// looked up by exact phrase equality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSpan {
    pub id: i64,
    pub video_id: String,
    pub text: String,
    pub start: f64,
    pub end: f64,
}

/// Segment row waiting to be written for a video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSegment {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

/// Word row waiting to be written for a video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWord {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestOutcome {
    Inserted { segments: usize, words: usize },
    /// The video already had rows; nothing was written.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordFrequency {
    pub word: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusStats {
    pub videos: i64,
    pub segments: i64,
    pub words: i64,
    pub distinct_words: i64,
}

/// Search result from FTS query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentSearchHit {
    pub segment: SegmentSpan,
    pub snippet: String,
    pub rank: f64,
}
