//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::subtitle::SubtitleStyle;

// ---------------------------------------------------------------------------
// SttConfig
// ---------------------------------------------------------------------------

/// Settings for the Whisper STT engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// Model name resolved to `ggml-<model>.bin` (e.g. `"base"`).
    pub model: String,
    /// Speech language as an ISO-639-1 code, or `"auto"` for Whisper's
    /// built-in language detection.
    pub language: String,
    /// No-speech probability threshold.  Lower suppresses silence more
    /// aggressively.
    pub silence_threshold: f32,
    /// Explicit inference thread count.  `None` uses the host-derived
    /// default (`max(2, min(cores - 1, 8))`).
    pub threads: Option<i32>,
    /// Override for the directory holding model files.
    pub models_dir: Option<PathBuf>,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: "base".into(),
            language: "auto".into(),
            silence_threshold: 0.6,
            threads: None,
            models_dir: None,
        }
    }
}

// ---------------------------------------------------------------------------
// DecoderConfig
// ---------------------------------------------------------------------------

/// External binaries used to demux/decode media into PCM.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".into(),
            ffprobe_path: "ffprobe".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// BurnConfig
// ---------------------------------------------------------------------------

/// Settings for the subtitle burn step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BurnConfig {
    /// Transcoder executable.
    pub ffmpeg_path: String,
    /// Hardware video encoder passed to `-c:v`.
    pub video_encoder: String,
    /// Target video bitrate passed to `-b:v`.
    pub video_bitrate: String,
    /// Destination directory for burned videos.  `None` means the
    /// documents directory.
    pub output_dir: Option<PathBuf>,
}

/// Platform hardware encoder: VideoToolbox on Apple, NVENC elsewhere.
pub fn default_video_encoder() -> &'static str {
    if cfg!(target_os = "macos") {
        "h264_videotoolbox"
    } else {
        "h264_nvenc"
    }
}

impl Default for BurnConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".into(),
            video_encoder: default_video_encoder().into(),
            video_bitrate: "5M".into(),
            output_dir: None,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use subburn::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// STT engine settings.
    pub stt: SttConfig,
    /// Media decoder settings.
    pub decoder: DecoderConfig,
    /// Burn / transcoder settings.
    pub burn: BurnConfig,
    /// Default subtitle style offered for burning.
    pub style: SubtitleStyle,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Models directory: the configured override or the documents dir.
    pub fn models_dir(&self, paths: &AppPaths) -> PathBuf {
        self.stt
            .models_dir
            .clone()
            .unwrap_or_else(|| paths.models_dir.clone())
    }

    /// Output directory: the configured override or the documents dir.
    pub fn output_dir(&self, paths: &AppPaths) -> PathBuf {
        self.burn
            .output_dir
            .clone()
            .unwrap_or_else(|| paths.output_dir.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
