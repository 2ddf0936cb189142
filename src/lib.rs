pub mod assembler;
mod commands;
pub mod config;
pub mod database;
pub mod error;
pub mod matcher;
pub mod transcript;
pub mod worker;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use tracing_subscriber::EnvFilter;

use config::AppConfig;
use database::Database;

pub use matcher::{CorpusStore, MatchItem, MatchKind, SentenceMatcher};

#[derive(Debug, Parser)]
#[command(name = "soundbite", version, about = "Splice new sentences out of a creator's transcribed clips")]
pub struct Cli {
    /// Config file (YAML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database path, overriding the config
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Download, transcribe and index videos
    Ingest {
        /// File with one video id (or watch URL) per line to download first
        #[arg(long)]
        download: Option<PathBuf>,
        /// Channel URL whose shorts are listed and downloaded first
        #[arg(long)]
        channel: Option<String>,
    },
    /// Match a sentence to clips, failing on any unknown word
    Match {
        sentence: String,
        /// Load the corpus into memory instead of querying SQLite per phrase
        #[arg(long)]
        memory: bool,
    },
    /// Report which phrases of a sentence exist as whole segments
    Segments {
        sentence: String,
        #[arg(long)]
        memory: bool,
    },
    /// Match a sentence and render the spliced video
    Render {
        sentence: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        watermark: Option<String>,
    },
    /// How many times a word was said
    Count { word: String },
    /// Most frequent words
    Top {
        #[arg(short, default_value_t = 10)]
        n: i64,
    },
    /// List every indexed segment
    List,
    /// Full-text search for segments containing a phrase
    Search {
        query: String,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Corpus statistics
    Stats,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "soundbite=debug,soundbite_lib=debug" } else { "soundbite=info,soundbite_lib=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce(&T) -> String) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", text(value));
    }
    Ok(())
}

/// Entry point for the `soundbite` binary
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(run_cli(cli))
}

pub async fn run_cli(cli: Cli) -> anyhow::Result<()> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    config.ensure_dirs()?;

    let db = Arc::new(
        Database::new(&config.db_path)
            .with_context(|| format!("Failed to open database {}", config.db_path.display()))?,
    );
    let span = tracing::info_span!("command", db = %config.db_path.display());
    dispatch(cli.command, cli.json, &config, &db)
        .instrument(span)
        .await
}

async fn dispatch(
    command: Command,
    json: bool,
    config: &AppConfig,
    db: &Arc<Database>,
) -> anyhow::Result<()> {
    match command {
        Command::Ingest { download, channel } => {
            let cancel = CancellationToken::new();
            let ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::info!("Interrupt received, finishing current step");
                    ctrl_c.cancel();
                }
            });
            let report = commands::run_ingest(
                db,
                config,
                download.as_deref(),
                channel.as_deref(),
                cancel,
            )
            .await?;
            emit(json, &report, |r| {
                let mut lines = Vec::new();
                if let Some(shorts) = &r.shorts {
                    lines.push(format!(
                        "{} shorts, avg {:.2}s, longest {} @ {:.2}s, shortest {} @ {:.2}s",
                        shorts.total,
                        shorts.average_seconds,
                        shorts.longest_id,
                        shorts.longest_seconds,
                        shorts.shortest_id,
                        shorts.shortest_seconds
                    ));
                }
                lines.push(format!(
                    "Ingested {} videos ({} segments, {} words); {} skipped, {} failed, {} downloads failed",
                    r.ingested, r.segments, r.words, r.skipped, r.failed, r.download_failed
                ));
                if r.cancelled {
                    lines.push("Cancelled before finishing".to_string());
                }
                lines.join("\n")
            })?;
        }
        Command::Match { sentence, memory } => {
            let response = if memory {
                let corpus = commands::load_memory_corpus(db).await?;
                commands::match_sentence_in(corpus, sentence).await?
            } else {
                commands::match_sentence(db, sentence).await?
            };
            emit(json, &response, |r| {
                r.items
                    .iter()
                    .map(|item| {
                        format!(
                            "{:<20} {:<8} {} {:>7.2}s - {:>7.2}s",
                            item.text, item.kind, item.video_id, item.start, item.end
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })?;
        }
        Command::Segments { sentence, memory } => {
            let coverage = if memory {
                let corpus = commands::load_memory_corpus(db).await?;
                commands::find_segments_in(corpus, sentence).await?
            } else {
                commands::find_segments(db, sentence).await?
            };
            emit(json, &coverage, |c| {
                let mut lines: Vec<String> = c
                    .found
                    .iter()
                    .map(|m| {
                        format!(
                            "\"{}\" -> {} ({:.2}s - {:.2}s)",
                            m.phrase,
                            config.video_path(&m.segment.video_id).display(),
                            m.segment.start,
                            m.segment.end
                        )
                    })
                    .collect();
                if !c.leftover.is_empty() {
                    lines.push(format!("Unmatched: {}", c.leftover.join(" ")));
                }
                lines.join("\n")
            })?;
        }
        Command::Render {
            sentence,
            output,
            watermark,
        } => {
            let response =
                commands::render_sentence(db, config, sentence, output, watermark).await?;
            emit(json, &response, |r| {
                format!(
                    "Rendered {} clips to {}",
                    r.clips.len(),
                    r.output_path.display()
                )
            })?;
        }
        Command::Count { word } => {
            let response = commands::word_count(db, word).await?;
            emit(json, &response, |r| {
                format!("The creator has said \"{}\" {} times!", r.word, r.count)
            })?;
        }
        Command::Top { n } => {
            let words = commands::top_words(db, Some(n)).await?;
            emit(json, &words, |words| {
                let mut lines = vec![format!("Top {} most common words:", n)];
                for (rank, w) in words.iter().enumerate() {
                    lines.push(format!("{}. \"{}\" - {} occurrences", rank + 1, w.word, w.count));
                }
                lines.join("\n")
            })?;
        }
        Command::List => {
            let segments = commands::list_segments(db, config).await?;
            emit(json, &segments, |segments| {
                segments
                    .iter()
                    .map(|s| {
                        format!(
                            "[{}] {} ({:.2}s-{:.2}s): \"{}\" -> {}",
                            s.segment.id,
                            s.segment.video_id,
                            s.segment.start,
                            s.segment.end,
                            s.segment.text,
                            s.video_path.display()
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })?;
        }
        Command::Search { query, limit } => {
            let response = commands::search_segments(db, query, Some(limit)).await?;
            emit(json, &response, |r| {
                r.results
                    .iter()
                    .map(|hit| {
                        format!(
                            "{} {:>7.2}s  {}",
                            hit.segment.video_id, hit.segment.start, hit.snippet
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })?;
        }
        Command::Stats => {
            let stats = commands::get_stats(db).await?;
            emit(json, &stats, |s| {
                format!(
                    "{} videos, {} segments, {} words ({} distinct)",
                    s.videos, s.segments, s.words, s.distinct_words
                )
            })?;
        }
    }

    Ok(())
}
