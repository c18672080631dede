//! `subburn` command-line front-end.
//!
//! # Startup sequence
//!
//! 1. Initialise logging (`RUST_LOG` overrides the `info` default).
//! 2. Load [`AppConfig`] (defaults on first run).
//! 3. Build the tokio runtime.
//! 4. Dispatch the subcommand.  `transcribe` and `burn` go through a
//!    [`PipelineRunner`]; Ctrl-C sends `Cancel` and exits without waiting
//!    for the result.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

use subburn::{
    audio::{AudioExtractor, FfmpegDecoder},
    burn::{BurnOrchestrator, BurnRequest, FfmpegTranscoder},
    config::{AppConfig, AppPaths},
    pipeline::{lock_state, new_shared_state, PipelineCommand, PipelineRunner, PipelineState},
    stt::{LanguageHint, ModelContext, ModelDownloader, ModelStore, Transcriber, WhisperEngine, MODELS},
    subtitle::{parse_srt, save_srt, Alignment, Rgb, SubtitleStyle},
};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(author, version, about = "Transcribe media to SRT and burn subtitles into video", long_about = None)]
struct Cli {
    /// Use this settings file instead of the platform default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Transcribe a media file to SRT
    Transcribe {
        /// Audio or video file
        media: PathBuf,
        /// Model name (tiny, base, small, medium)
        #[arg(short, long)]
        model: Option<String>,
        /// Language code, or "auto"
        #[arg(short, long)]
        language: Option<String>,
        /// Write the SRT here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Stop waiting after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Burn an SRT file into a video
    Burn {
        video: PathBuf,
        subtitles: PathBuf,
        /// Font size in points (10-60)
        #[arg(long)]
        font_size: Option<u32>,
        /// Vertical margin in pixels (0-100)
        #[arg(long)]
        margin: Option<u32>,
        /// Text color as RRGGBB hex
        #[arg(long)]
        color: Option<String>,
        /// bottom-center, top-center, center or bottom-left
        #[arg(long)]
        align: Option<Alignment>,
        /// Hardware video encoder, e.g. h264_videotoolbox
        #[arg(long)]
        encoder: Option<String>,
        /// Directory for the burned video
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// List known models and whether they are installed
    Models,

    /// Download a model into the models directory
    Download { name: String },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let paths = AppPaths::new();

    // 2. Configuration
    let settings_file = cli.config.clone().unwrap_or_else(|| paths.settings_file.clone());
    let config = AppConfig::load_from(&settings_file).unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    // 4. Dispatch
    rt.block_on(async move {
        match cli.command {
            Commands::Transcribe {
                media,
                model,
                language,
                output,
                timeout,
            } => {
                let model = model.unwrap_or_else(|| config.stt.model.clone());
                let language = LanguageHint::from_code(language.as_deref().unwrap_or(&config.stt.language));
                let cmd = PipelineCommand::Transcribe {
                    media,
                    model,
                    language,
                    timeout: timeout.map(Duration::from_secs),
                };
                let srt = run_pipeline(&config, &paths, cmd).await?;
                let srt = srt.unwrap_or_default();
                match output {
                    Some(path) => {
                        save_srt(&path, &srt)
                            .with_context(|| format!("could not write {}", path.display()))?;
                        println!("Saved subtitles to {}", path.display());
                    }
                    None => print!("{srt}"),
                }
                Ok(())
            }

            Commands::Burn {
                video,
                subtitles,
                font_size,
                margin,
                color,
                align,
                encoder,
                output_dir,
            } => {
                let mut config = config;
                if let Some(enc) = encoder {
                    config.burn.video_encoder = enc;
                }
                if output_dir.is_some() {
                    config.burn.output_dir = output_dir;
                }

                let base = &config.style;
                let style = SubtitleStyle::new(
                    font_size.unwrap_or(base.font_size),
                    margin.unwrap_or(base.margin_v),
                    match color {
                        Some(hex) => parse_hex_color(&hex)?,
                        None => base.color,
                    },
                    align.unwrap_or(base.alignment),
                );
                warn_if_not_srt(&subtitles);

                let cmd = PipelineCommand::Burn(BurnRequest::new(video, subtitles, &style));
                run_pipeline(&config, &paths, cmd).await?;
                Ok(())
            }

            Commands::Models => {
                let store = ModelStore::new(config.models_dir(&paths));
                println!("Models directory: {}", store.dir().display());
                for m in MODELS {
                    let mark = if store.is_available(m.name) { "installed" } else { "-" };
                    println!("  {:<8} {:<10} {}", m.name, mark, m.description);
                }
                Ok(())
            }

            Commands::Download { name } => {
                let downloader = ModelDownloader::new(ModelStore::new(config.models_dir(&paths)));
                let path = downloader.download(&name).await?;
                println!("Model '{name}' ready at {}", path.display());
                Ok(())
            }
        }
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Run one command through a fresh [`PipelineRunner`] and return the last
/// transcript on success.
async fn run_pipeline(
    config: &AppConfig,
    paths: &AppPaths,
    cmd: PipelineCommand,
) -> Result<Option<String>> {
    let context = Arc::new(ModelContext::new(
        Arc::new(WhisperEngine::new()),
        ModelStore::new(config.models_dir(paths)),
    ));
    let extractor = AudioExtractor::new(Arc::new(FfmpegDecoder::from_config(&config.decoder)));
    let transcriber = Transcriber::new(context, extractor).with_config(&config.stt);
    let burner = BurnOrchestrator::new(
        Arc::new(FfmpegTranscoder::new(&config.burn.ffmpeg_path)),
        config.output_dir(paths),
    )
    .with_config(&config.burn);

    let state = new_shared_state(config.clone());
    let (tx, rx) = mpsc::channel(4);
    let runner = tokio::spawn(PipelineRunner::new(state.clone(), transcriber, burner).run(rx));

    tx.send(cmd).await.context("pipeline runner stopped")?;

    tokio::select! {
        joined = runner => joined.context("pipeline runner panicked")?,
        _ = tokio::signal::ctrl_c() => {
            let _ = tx.send(PipelineCommand::Cancel).await;
            bail!("cancelled");
        }
    }

    let st = lock_state(&state);
    match st.status {
        PipelineState::Done => {
            log::info!("{}", st.message);
            if let Some(out) = &st.last_output {
                println!("Saved to {}", out.display());
            }
            Ok(st.last_transcript.clone())
        }
        _ => bail!(
            "{} ({})",
            st.message,
            st.error_kind.unwrap_or("Unknown")
        ),
    }
}

fn parse_hex_color(hex: &str) -> Result<Rgb> {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 {
        bail!("color must be RRGGBB, got '{hex}'");
    }
    let value = u32::from_str_radix(hex, 16).with_context(|| format!("invalid color '{hex}'"))?;
    Ok(Rgb::new((value >> 16) as u8, (value >> 8) as u8, value as u8))
}

fn warn_if_not_srt(path: &Path) {
    match std::fs::read_to_string(path).map(|text| parse_srt(&text)) {
        Ok(Ok(cues)) if cues.is_empty() => log::warn!("{} has no subtitle cues", path.display()),
        Ok(Ok(cues)) => log::info!("{} cues in {}", cues.len(), path.display()),
        Ok(Err(e)) => log::warn!("{} is not valid SRT: {e}", path.display()),
        Err(e) => log::warn!("could not read {}: {e}", path.display()),
    }
}
