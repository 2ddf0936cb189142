//! Sentence-to-clip matching.
//!
//! Splits a sentence into the longest phrases the corpus has recorded as
//! whole segments, falling back to single words, and returns the source spans
//! in sentence order.

pub mod normalize;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::database::{SegmentSpan, WordSpan};
use crate::error::{MatchError, StoreError};
use normalize::normalize;

/// Lookups the matcher needs from a transcript corpus.
///
/// Both lookups compare normalized text exactly and case-insensitively. When
/// several rows match, implementations return the one with the smallest
/// `(video_id, start)`.
pub trait CorpusStore {
    fn find_segment_by_phrase(&self, phrase: &str) -> Result<Option<SegmentSpan>, StoreError>;

    fn find_word_span(&self, word: &str) -> Result<Option<WordSpan>, StoreError>;
}

impl<S: CorpusStore + ?Sized> CorpusStore for &S {
    fn find_segment_by_phrase(&self, phrase: &str) -> Result<Option<SegmentSpan>, StoreError> {
        (**self).find_segment_by_phrase(phrase)
    }

    fn find_word_span(&self, word: &str) -> Result<Option<WordSpan>, StoreError> {
        (**self).find_word_span(word)
    }
}

impl<S: CorpusStore + ?Sized> CorpusStore for std::sync::Arc<S> {
    fn find_segment_by_phrase(&self, phrase: &str) -> Result<Option<SegmentSpan>, StoreError> {
        (**self).find_segment_by_phrase(phrase)
    }

    fn find_word_span(&self, word: &str) -> Result<Option<WordSpan>, StoreError> {
        (**self).find_word_span(word)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Segment,
    Word,
}

impl std::fmt::Display for MatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Segment => write!(f, "segment"),
            Self::Word => write!(f, "word"),
        }
    }
}

/// One clip to splice, in sentence order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchItem {
    pub kind: MatchKind,
    pub text: String,
    pub video_id: String,
    pub start: f64,
    pub end: f64,
}

impl MatchItem {
    /// Number of sentence tokens this item covers
    pub fn token_count(&self) -> usize {
        match self.kind {
            MatchKind::Word => 1,
            MatchKind::Segment => self.text.split_whitespace().count(),
        }
    }
}

impl From<SegmentSpan> for MatchItem {
    fn from(segment: SegmentSpan) -> Self {
        Self {
            kind: MatchKind::Segment,
            text: segment.text,
            video_id: segment.video_id,
            start: segment.start,
            end: segment.end,
        }
    }
}

impl From<WordSpan> for MatchItem {
    fn from(word: WordSpan) -> Self {
        Self {
            kind: MatchKind::Word,
            text: word.word,
            video_id: word.video_id,
            start: word.start,
            end: word.end,
        }
    }
}

/// A segment found by [`SentenceMatcher::find_all_segments`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhraseMatch {
    pub phrase: String,
    /// Zero-based index of the first covered token
    pub first_token: usize,
    pub token_count: usize,
    pub segment: SegmentSpan,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentCoverage {
    pub found: Vec<PhraseMatch>,
    /// Tokens no segment covered, in sentence order
    pub leftover: Vec<String>,
}

pub struct SentenceMatcher<S> {
    store: S,
}

impl<S: CorpusStore> SentenceMatcher<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Match a whole sentence or fail.
    ///
    /// At each position the longest phrase recorded as a segment wins; a lone
    /// word is only used when no segment of any length starts there. Any token
    /// that matches neither aborts the call with its 1-based position.
    pub fn match_sentence(&self, sentence: &str) -> Result<Vec<MatchItem>, MatchError> {
        let tokens = normalize(sentence)?;
        let n = tokens.len();
        let mut results = Vec::new();
        let mut i = 0;

        while i < n {
            if let Some((segment, length)) = self.longest_segment_at(&tokens, i)? {
                log::debug!("Segment match at {}: '{}' ({} tokens)", i + 1, segment.text, length);
                results.push(MatchItem::from(segment));
                i += length;
                continue;
            }

            let token = &tokens[i];
            match self.store.find_word_span(token)? {
                Some(word) => {
                    log::debug!("Word match at {}: '{}'", i + 1, word.word);
                    results.push(MatchItem::from(word));
                    i += 1;
                }
                None => {
                    return Err(MatchError::UnmatchedToken {
                        token: token.clone(),
                        position: i + 1,
                    });
                }
            }
        }

        Ok(results)
    }

    fn longest_segment_at(
        &self,
        tokens: &[String],
        start: usize,
    ) -> Result<Option<(SegmentSpan, usize)>, StoreError> {
        for length in (1..=tokens.len() - start).rev() {
            let phrase = tokens[start..start + length].join(" ");
            if let Some(segment) = self.store.find_segment_by_phrase(&phrase)? {
                return Ok(Some((segment, length)));
            }
        }
        Ok(None)
    }

    /// Best-effort segment cover for reporting.
    ///
    /// Windows are tried longest first, left to right within each length;
    /// a window touching an already covered token is skipped. Never fails on
    /// unmatched tokens: they are returned as `leftover`. `found` is ordered
    /// by position in the sentence.
    pub fn find_all_segments(&self, sentence: &str) -> Result<SegmentCoverage, MatchError> {
        let tokens = normalize(sentence)?;
        let total = tokens.len();
        let mut used: HashSet<usize> = HashSet::new();
        let mut found = Vec::new();

        for n in (1..=total).rev() {
            for i in 0..=(total - n) {
                if (i..i + n).any(|j| used.contains(&j)) {
                    continue;
                }
                let phrase = tokens[i..i + n].join(" ");
                if let Some(segment) = self.store.find_segment_by_phrase(&phrase)? {
                    used.extend(i..i + n);
                    found.push(PhraseMatch {
                        phrase,
                        first_token: i,
                        token_count: n,
                        segment,
                    });
                }
            }
        }

        found.sort_by_key(|m| m.first_token);
        let leftover = tokens
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !used.contains(i))
            .map(|(_, token)| token)
            .collect();

        Ok(SegmentCoverage { found, leftover })
    }
}
