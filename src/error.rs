use thiserror::Error;

/// Failure of a single corpus lookup.
///
/// Kept distinct from "no row matched" so a broken store never looks like a
/// missing word to the matcher.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store query failed: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised while turning a sentence into clip spans.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("Sentence contains no valid words after cleaning")]
    EmptyInput,

    #[error("Word '{token}' (from sentence position {position}) not found in the database")]
    UnmatchedToken { token: String, position: usize },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Typed application error hierarchy for every CLI command.
///
/// Serializes as a plain string so `--json` output carries the same message
/// the terminal shows.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Io(String),

    #[error("{0}")]
    Json(String),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error("{tool} failed: {message}")]
    External { tool: &'static str, message: String },

    #[error("{0}")]
    Other(String),
}

impl AppError {
    pub fn external(tool: &'static str, message: impl std::fmt::Display) -> Self {
        AppError::External {
            tool,
            message: message.to_string(),
        }
    }
}

impl serde::Serialize for AppError {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

// ── From impls ─────────────────────────────────────────────────────────────

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        AppError::Database(e.to_string())
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        AppError::Database(e.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Match(MatchError::Store(e))
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Json(e.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(e: serde_yaml::Error) -> Self {
        AppError::Json(e.to_string())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(e: tokio::task::JoinError) -> Self {
        AppError::Other(format!("Background task failed: {}", e))
    }
}

impl From<String> for AppError {
    fn from(s: String) -> Self {
        AppError::Other(s)
    }
}

impl From<&str> for AppError {
    fn from(s: &str) -> Self {
        AppError::Other(s.to_string())
    }
}
