//! Application configuration.
//!
//! Loaded from YAML; every field has a default so a missing file or a
//! partial file both work. Paths the file leaves out are derived from
//! `data_dir`, and relative paths are taken relative to it. `.env` entries in
//! the data directory override the file for the two paths people move around
//! most.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::AppError;

const APP_DIR: &str = "soundbite";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriberConfig {
    /// whisper-style CLI that writes a JSON transcript with word timestamps
    pub program: String,
    pub model: String,
    pub language: String,
    pub extra_args: Vec<String>,
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        Self {
            program: "whisper-ctranslate2".to_string(),
            model: "tiny.en".to_string(),
            language: "en".to_string(),
            extra_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloaderConfig {
    pub program: String,
    pub format: String,
    pub url_template: String,
    /// Longest video, in seconds, kept when listing a channel
    pub max_duration: f64,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            program: "yt-dlp".to_string(),
            format: "bestvideo[height<=720]+bestaudio/best[height<=720]".to_string(),
            url_template: "https://www.youtube.com/watch?v={id}".to_string(),
            max_duration: 60.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub downloads_dir: PathBuf,
    pub transcripts_dir: PathBuf,
    pub renders_dir: PathBuf,
    pub video_extension: String,
    pub ffmpeg_path: String,
    pub transcriber: TranscriberConfig,
    pub downloader: DownloaderConfig,
}

/// On-disk shape of the config file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    data_dir: Option<PathBuf>,
    db_path: Option<PathBuf>,
    downloads_dir: Option<PathBuf>,
    transcripts_dir: Option<PathBuf>,
    renders_dir: Option<PathBuf>,
    video_extension: Option<String>,
    ffmpeg_path: Option<String>,
    transcriber: TranscriberConfig,
    downloader: DownloaderConfig,
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::rooted_at(default_data_dir())
    }
}

impl AppConfig {
    /// Defaults with every path under `data_dir`
    pub fn rooted_at(data_dir: PathBuf) -> Self {
        Self {
            db_path: data_dir.join("transcriptions.db"),
            downloads_dir: data_dir.join("downloads"),
            transcripts_dir: data_dir.join("transcripts"),
            renders_dir: data_dir.join("renders"),
            data_dir,
            video_extension: "mp4".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            transcriber: TranscriberConfig::default(),
            downloader: DownloaderConfig::default(),
        }
    }

    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.yaml")
    }

    /// Load config from `path` (or the default location), then apply `.env`.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);

        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config = Self::from_yaml(&content)?;
            log::info!("Loaded config from {}", path.display());
            config
        } else {
            log::debug!("No config at {}, using defaults", path.display());
            Self::default()
        };

        let data_dir = config.data_dir.clone();
        config.apply_env(&data_dir);
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, AppError> {
        let file: ConfigFile = serde_yaml::from_str(content)?;
        Ok(Self::from_file(file))
    }

    fn from_file(file: ConfigFile) -> Self {
        let mut config = Self::rooted_at(file.data_dir.unwrap_or_else(default_data_dir));
        let root = config.data_dir.clone();
        // join() keeps absolute paths as they are
        if let Some(path) = file.db_path {
            config.db_path = root.join(path);
        }
        if let Some(path) = file.downloads_dir {
            config.downloads_dir = root.join(path);
        }
        if let Some(path) = file.transcripts_dir {
            config.transcripts_dir = root.join(path);
        }
        if let Some(path) = file.renders_dir {
            config.renders_dir = root.join(path);
        }
        if let Some(ext) = file.video_extension {
            config.video_extension = ext;
        }
        if let Some(ffmpeg) = file.ffmpeg_path {
            config.ffmpeg_path = ffmpeg;
        }
        config.transcriber = file.transcriber;
        config.downloader = file.downloader;
        config
    }

    fn apply_env(&mut self, project_dir: &Path) {
        if let Some(db) = load_env_value(project_dir, "SOUNDBITE_DB") {
            log::info!("Database path overridden from .env");
            self.db_path = PathBuf::from(db);
        }
        if let Some(downloads) = load_env_value(project_dir, "SOUNDBITE_DOWNLOADS") {
            log::info!("Downloads directory overridden from .env");
            self.downloads_dir = PathBuf::from(downloads);
        }
    }

    /// Where the downloaded file for a video lives
    pub fn video_path(&self, video_id: &str) -> PathBuf {
        self.downloads_dir
            .join(format!("{}.{}", video_id, self.video_extension))
    }

    pub fn ensure_dirs(&self) -> Result<(), AppError> {
        for dir in [
            &self.data_dir,
            &self.downloads_dir,
            &self.transcripts_dir,
            &self.renders_dir,
        ] {
            std::fs::create_dir_all(dir)?;
        }
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

/// Load a value from the .env file by key name
pub fn load_env_value(project_dir: &Path, key: &str) -> Option<String> {
    let env_path = project_dir.join(".env");
    let prefix = format!("{}=", key);
    let content = std::fs::read_to_string(env_path).ok()?;
    for line in content.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix(&prefix) {
            let value = rest.trim().trim_matches('"').trim_matches('\'');
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}
