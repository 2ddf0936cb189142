use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::assembler::{self, Clip, RenderOptions};
use crate::config::AppConfig;
use crate::database::Database;
use crate::error::AppError;

use super::search::match_sentence;

#[derive(Debug, Serialize)]
pub struct RenderResponse {
    pub output_path: PathBuf,
    pub clips: Vec<Clip>,
}

/// Match a sentence and splice the clips into one video
pub async fn render_sentence(
    db: &Arc<Database>,
    config: &AppConfig,
    sentence: String,
    output: Option<PathBuf>,
    watermark: Option<String>,
) -> Result<RenderResponse, AppError> {
    let matched = match_sentence(db, sentence).await?;
    let clips = assembler::plan_clips(config, &matched.items)?;

    let output_path = output.unwrap_or_else(|| {
        config
            .renders_dir
            .join(default_output_name(&matched.tokens, chrono::Local::now()))
    });

    let options = RenderOptions {
        watermark,
        ..RenderOptions::default()
    };
    let output_path =
        assembler::render(&config.ffmpeg_path, &clips, &output_path, &options).await?;

    Ok(RenderResponse { output_path, clips })
}

/// `<first words>-<timestamp>.mp4`
fn default_output_name(tokens: &[String], now: chrono::DateTime<chrono::Local>) -> String {
    let slug: String = tokens
        .iter()
        .take(5)
        .map(|t| {
            t.chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("_");
    format!("{}-{}.mp4", slug, now.format("%Y%m%d-%H%M%S"))
}
