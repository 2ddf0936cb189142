//! Whisper transcript parsing.
//!
//! Turns transcriber JSON into the word and segment rows the store keeps.
//! Segment text is rebuilt from its normalized words so that exact phrase
//! lookups line up with word lookups.

use serde_json::Value;

use crate::database::{NewSegment, NewWord};
use crate::error::AppError;
use crate::matcher::normalize::normalize_lenient;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedTranscript {
    pub segments: Vec<NewSegment>,
    pub words: Vec<NewWord>,
}

impl ParsedTranscript {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty() && self.words.is_empty()
    }
}

/// A raw word as the transcriber reported it, before normalization
struct RawWord {
    text: String,
    start: f64,
    end: f64,
}

/// Parse transcript JSON with word timestamps.
///
/// Accepts the faster-whisper shape (`segments[].words[]`, seconds) and the
/// whisper-cli full JSON shape (`transcription[].tokens[]`, milliseconds).
pub fn parse_transcript(content: &str) -> Result<ParsedTranscript, AppError> {
    let json: Value = serde_json::from_str(content)?;

    let raw_segments = if let Some(segments) = json.get("segments").and_then(|v| v.as_array()) {
        segments.iter().map(faster_whisper_words).collect::<Vec<_>>()
    } else if let Some(transcription) = json.get("transcription").and_then(|v| v.as_array()) {
        transcription.iter().map(whisper_cli_words).collect::<Vec<_>>()
    } else {
        return Err(AppError::Json(
            "Unrecognized transcript format: expected 'segments' or 'transcription'".to_string(),
        ));
    };

    let mut parsed = ParsedTranscript::default();
    for (idx, raw_words) in raw_segments.into_iter().enumerate() {
        push_segment(&mut parsed, idx, raw_words);
    }
    Ok(parsed)
}

fn push_segment(parsed: &mut ParsedTranscript, idx: usize, raw_words: Vec<RawWord>) {
    let mut words = Vec::new();
    for raw in raw_words {
        for token in normalize_lenient(&raw.text) {
            words.push(NewWord {
                word: token,
                start: raw.start,
                end: raw.end,
            });
        }
    }

    let (first, last) = match (words.first(), words.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => {
            log::warn!("Segment {} has no words, skipping", idx);
            return;
        }
    };

    if first.start > last.end {
        log::warn!(
            "Segment {} ends before it starts ({:.2}s > {:.2}s), skipping",
            idx,
            first.start,
            last.end
        );
        return;
    }

    let text = words
        .iter()
        .map(|w| w.word.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    parsed.segments.push(NewSegment {
        text,
        start: first.start,
        end: last.end,
    });
    parsed.words.extend(words);
}

fn faster_whisper_words(segment: &Value) -> Vec<RawWord> {
    let Some(words) = segment.get("words").and_then(|w| w.as_array()) else {
        return Vec::new();
    };

    words
        .iter()
        .filter_map(|w| {
            let text = w.get("word").and_then(|t| t.as_str())?.to_string();
            let start = w.get("start").and_then(|v| v.as_f64())?;
            let end = w.get("end").and_then(|v| v.as_f64())?;
            Some(RawWord { text, start, end })
        })
        .collect()
}

/// whisper-cli emits sub-word tokens: a token that does not start with a
/// space continues the previous word.
fn whisper_cli_words(segment: &Value) -> Vec<RawWord> {
    let Some(tokens) = segment.get("tokens").and_then(|t| t.as_array()) else {
        return Vec::new();
    };

    let mut words: Vec<RawWord> = Vec::new();
    for token in tokens {
        let Some(text) = token.get("text").and_then(|t| t.as_str()) else {
            continue;
        };
        if text.starts_with("[_") {
            continue;
        }
        let Some((start, end)) = token_times(token) else {
            continue;
        };

        match words.last_mut() {
            Some(prev) if !text.starts_with(' ') => {
                prev.text.push_str(text);
                prev.end = end;
            }
            _ => words.push(RawWord {
                text: text.to_string(),
                start,
                end,
            }),
        }
    }
    words
}

fn token_times(token: &Value) -> Option<(f64, f64)> {
    if let Some(offsets) = token.get("offsets") {
        let from = offsets.get("from").and_then(|v| v.as_f64())?;
        let to = offsets.get("to").and_then(|v| v.as_f64())?;
        return Some((from / 1000.0, to / 1000.0));
    }
    let timestamps = token.get("timestamps")?;
    let from = timestamps.get("from").and_then(|v| v.as_str()).and_then(parse_timestamp_str)?;
    let to = timestamps.get("to").and_then(|v| v.as_str()).and_then(parse_timestamp_str)?;
    Some((from, to))
}

/// Parse timestamp string like "00:01:23,456" or "01:23.456" to seconds
pub fn parse_timestamp_str(s: &str) -> Option<f64> {
    let s = s.replace(',', ".");
    let parts: Vec<&str> = s.split(':').collect();
    match parts.len() {
        3 => {
            let hours: f64 = parts[0].parse().ok()?;
            let minutes: f64 = parts[1].parse().ok()?;
            let seconds: f64 = parts[2].parse().ok()?;
            Some(hours * 3600.0 + minutes * 60.0 + seconds)
        }
        2 => {
            let minutes: f64 = parts[0].parse().ok()?;
            let seconds: f64 = parts[1].parse().ok()?;
            Some(minutes * 60.0 + seconds)
        }
        _ => None,
    }
}
