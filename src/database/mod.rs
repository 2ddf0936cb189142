pub mod memory;
pub mod models;

#[cfg(test)]
mod tests;

use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::StoreError;
use crate::matcher::normalize::normalize_to_string;
use crate::matcher::CorpusStore;

pub use models::*;

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn new(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        // Enable WAL mode for concurrent reads
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA cache_size=10000;
            PRAGMA temp_store=MEMORY;
        ",
        )?;

        Self::with_connection(conn)
    }

    /// Throwaway database, mostly for tests and one-shot tools.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        // Initialize schema
        db.init_schema()?;

        Ok(db)
    }

    fn conn(&self) -> std::result::Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            -- One row per processed video, even when its transcript was empty
            CREATE TABLE IF NOT EXISTS videos (
                video_id TEXT PRIMARY KEY,
                ingested_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS words (
                id INTEGER PRIMARY KEY,
                video_id TEXT NOT NULL,
                word TEXT NOT NULL COLLATE NOCASE,
                start_time REAL NOT NULL,
                end_time REAL NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_word_text ON words(word);
            CREATE INDEX IF NOT EXISTS idx_word_video_id ON words(video_id);

            CREATE TABLE IF NOT EXISTS segments (
                id INTEGER PRIMARY KEY,
                video_id TEXT NOT NULL,
                segment_text TEXT NOT NULL COLLATE NOCASE,
                start_time REAL NOT NULL,
                end_time REAL NOT NULL,
                CHECK (start_time <= end_time)
            );

            -- Exact phrase lookups go through this index
            CREATE INDEX IF NOT EXISTS idx_segment_text ON segments(segment_text);
            CREATE INDEX IF NOT EXISTS idx_segment_video_id ON segments(video_id);

            -- Full-text search index on segments (containment search)
            CREATE VIRTUAL TABLE IF NOT EXISTS segments_fts USING fts5(
                segment_text,
                content='segments',
                content_rowid='id'
            );

            -- Triggers to keep FTS in sync
            CREATE TRIGGER IF NOT EXISTS segments_ai AFTER INSERT ON segments BEGIN
                INSERT INTO segments_fts(rowid, segment_text) VALUES (new.id, new.segment_text);
            END;
            CREATE TRIGGER IF NOT EXISTS segments_ad AFTER DELETE ON segments BEGIN
                INSERT INTO segments_fts(segments_fts, rowid, segment_text) VALUES('delete', old.id, old.segment_text);
            END;
            "#,
        )?;
        Ok(())
    }

    // =========================================================================
    // Ingestion
    // =========================================================================

    pub fn has_video(&self, video_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM videos WHERE video_id = ?1",
                params![video_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Write all spans of one video in a single transaction.
    ///
    /// The video is recorded in `videos` in the same transaction, so one that
    /// was already ingested is left untouched even if its transcript had no
    /// words. Re-running ingestion over the same downloads is idempotent.
    pub fn ingest_video(
        &self,
        video_id: &str,
        segments: &[NewSegment],
        words: &[NewWord],
    ) -> Result<IngestOutcome> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let inserted = tx.execute(
            "INSERT OR IGNORE INTO videos (video_id, ingested_at) VALUES (?1, ?2)",
            params![video_id, chrono::Utc::now().to_rfc3339()],
        )?;
        if inserted == 0 {
            log::debug!("Video {} already indexed, skipping", video_id);
            return Ok(IngestOutcome::Skipped);
        }

        {
            let mut stmt = tx.prepare(
                "INSERT INTO segments (video_id, segment_text, start_time, end_time)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for segment in segments {
                stmt.execute(params![video_id, segment.text, segment.start, segment.end])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO words (video_id, word, start_time, end_time)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for word in words {
                stmt.execute(params![video_id, word.word, word.start, word.end])?;
            }
        }

        tx.commit()?;

        Ok(IngestOutcome::Inserted {
            segments: segments.len(),
            words: words.len(),
        })
    }

    // =========================================================================
    // Exact lookups
    // =========================================================================

    pub fn find_segment(&self, phrase: &str) -> std::result::Result<Option<SegmentSpan>, StoreError> {
        let conn = self.conn()?;
        let segment = conn
            .query_row(
                "SELECT id, video_id, segment_text, start_time, end_time
                 FROM segments
                 WHERE segment_text = ?1
                 ORDER BY video_id, start_time, id
                 LIMIT 1",
                params![phrase],
                |row| {
                    Ok(SegmentSpan {
                        id: row.get(0)?,
                        video_id: row.get(1)?,
                        text: row.get(2)?,
                        start: row.get(3)?,
                        end: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(segment)
    }

    pub fn find_word(&self, word: &str) -> std::result::Result<Option<WordSpan>, StoreError> {
        let conn = self.conn()?;
        let span = conn
            .query_row(
                "SELECT video_id, word, start_time, end_time
                 FROM words
                 WHERE word = ?1
                 ORDER BY video_id, start_time, id
                 LIMIT 1",
                params![word],
                |row| {
                    Ok(WordSpan {
                        video_id: row.get(0)?,
                        word: row.get(1)?,
                        start: row.get(2)?,
                        end: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(span)
    }

    // =========================================================================
    // Segment search (FTS5)
    // =========================================================================

    /// Segments containing the query as a contiguous phrase, best match first
    pub fn search_segments(&self, query: &str, limit: i64) -> Result<Vec<SegmentSearchHit>> {
        let phrase = normalize_to_string(query);
        if phrase.is_empty() {
            return Ok(Vec::new());
        }
        // Quoted so FTS5 treats the tokens as one phrase, not as operators
        let fts_query = format!("\"{}\"", phrase.replace('"', "\"\""));

        let conn = self.conn()?;
        let sql = r#"
            SELECT
                s.id,
                s.video_id,
                s.segment_text,
                s.start_time,
                s.end_time,
                snippet(segments_fts, 0, '[', ']', '...', 16) as snippet,
                bm25(segments_fts) as rank
            FROM segments_fts
            JOIN segments s ON segments_fts.rowid = s.id
            WHERE segments_fts MATCH ?1
            ORDER BY rank
            LIMIT ?2
        "#;

        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params![fts_query, limit], |row| {
            Ok(SegmentSearchHit {
                segment: SegmentSpan {
                    id: row.get(0)?,
                    video_id: row.get(1)?,
                    text: row.get(2)?,
                    start: row.get(3)?,
                    end: row.get(4)?,
                },
                snippet: row.get(5)?,
                rank: row.get(6)?,
            })
        })?;

        let mut hits = Vec::new();
        for row in rows {
            hits.push(row?);
        }
        Ok(hits)
    }

    // =========================================================================
    // Reporting
    // =========================================================================

    pub fn word_count(&self, word: &str) -> Result<i64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM words WHERE word = ?1",
            params![word],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Most frequent words, ties broken alphabetically
    pub fn top_words(&self, limit: i64) -> Result<Vec<WordFrequency>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT LOWER(word) AS w, COUNT(*) AS freq
             FROM words
             GROUP BY w
             ORDER BY freq DESC, w ASC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok(WordFrequency {
                word: row.get(0)?,
                count: row.get(1)?,
            })
        })?;

        let mut words = Vec::new();
        for row in rows {
            words.push(row?);
        }
        Ok(words)
    }

    pub fn list_segments(&self) -> Result<Vec<SegmentSpan>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, video_id, segment_text, start_time, end_time
             FROM segments
             ORDER BY video_id, start_time, id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SegmentSpan {
                id: row.get(0)?,
                video_id: row.get(1)?,
                text: row.get(2)?,
                start: row.get(3)?,
                end: row.get(4)?,
            })
        })?;

        let mut segments = Vec::new();
        for row in rows {
            segments.push(row?);
        }
        Ok(segments)
    }

    pub fn list_words(&self) -> Result<Vec<WordSpan>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT video_id, word, start_time, end_time
             FROM words
             ORDER BY video_id, start_time, id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(WordSpan {
                video_id: row.get(0)?,
                word: row.get(1)?,
                start: row.get(2)?,
                end: row.get(3)?,
            })
        })?;

        let mut words = Vec::new();
        for row in rows {
            words.push(row?);
        }
        Ok(words)
    }

    pub fn get_stats(&self) -> Result<CorpusStats> {
        let conn = self.conn()?;

        let videos: i64 = conn.query_row(
            "SELECT COUNT(*) FROM videos",
            [],
            |row| row.get(0),
        )?;
        let segments: i64 =
            conn.query_row("SELECT COUNT(*) FROM segments", [], |row| row.get(0))?;
        let words: i64 = conn.query_row("SELECT COUNT(*) FROM words", [], |row| row.get(0))?;
        let distinct_words: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT LOWER(word)) FROM words",
            [],
            |row| row.get(0),
        )?;

        Ok(CorpusStats {
            videos,
            segments,
            words,
            distinct_words,
        })
    }
}

impl CorpusStore for Database {
    fn find_segment_by_phrase(
        &self,
        phrase: &str,
    ) -> std::result::Result<Option<SegmentSpan>, StoreError> {
        self.find_segment(phrase)
    }

    fn find_word_span(&self, word: &str) -> std::result::Result<Option<WordSpan>, StoreError> {
        self.find_word(word)
    }
}
