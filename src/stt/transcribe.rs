//! Transcription parameters, result types and the end-to-end transcriber.
//!
//! [`Transcriber`] runs `load → extract → infer` under the
//! [`ModelContext`] lock and returns a [`TranscriptionOutcome`].
//! [`RunParameters`] carries the per-run engine settings.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::audio::AudioExtractor;
use crate::config::SttConfig;
use crate::stt::context::ModelContext;
use crate::stt::engine::{RawSegment, SttError};
use crate::subtitle;

// ---------------------------------------------------------------------------
// SamplingStrategy
// ---------------------------------------------------------------------------

/// Decoding strategy handed to Whisper.  Only deterministic greedy decoding
/// is used.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum SamplingStrategy {
    /// Greedy (single-pass) decoding.
    Greedy {
        /// Number of candidate tokens evaluated per step.  1 is fastest.
        best_of: i32,
    },
}

impl Default for SamplingStrategy {
    fn default() -> Self {
        Self::Greedy { best_of: 1 }
    }
}

// ---------------------------------------------------------------------------
// LanguageHint
// ---------------------------------------------------------------------------

/// Spoken language, or engine-side detection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LanguageHint {
    #[default]
    Auto,
    /// ISO-639-1 code such as `"en"` or `"zh"`.
    Explicit(String),
}

impl LanguageHint {
    /// `"auto"` (any case) or an empty string means [`LanguageHint::Auto`].
    pub fn from_code(code: &str) -> Self {
        let code = code.trim();
        if code.is_empty() || code.eq_ignore_ascii_case("auto") {
            Self::Auto
        } else {
            Self::Explicit(code.to_ascii_lowercase())
        }
    }

    /// Code passed to the engine; `None` requests auto-detection.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Auto => None,
            Self::Explicit(code) => Some(code),
        }
    }
}

// ---------------------------------------------------------------------------
// RunParameters
// ---------------------------------------------------------------------------

/// Default no-speech threshold.
pub const DEFAULT_SILENCE_THRESHOLD: f32 = 0.6;

/// Immutable settings for one inference run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunParameters {
    pub strategy: SamplingStrategy,
    /// CPU threads handed to Whisper, see [`thread_count_for`].
    pub threads: i32,
    pub language: LanguageHint,
    /// No-speech probability threshold; lower = more aggressive silence
    /// suppression.
    pub silence_threshold: f32,
}

impl RunParameters {
    /// Greedy decoding, host-derived thread count, default threshold.
    pub fn new(language: LanguageHint) -> Self {
        Self {
            strategy: SamplingStrategy::default(),
            threads: default_threads(),
            language,
            silence_threshold: DEFAULT_SILENCE_THRESHOLD,
        }
    }
}

/// `max(2, min(cores - 1, 8))`: one core stays free for the caller.
pub fn thread_count_for(cores: usize) -> i32 {
    let cores = i32::try_from(cores).unwrap_or(i32::MAX);
    (cores - 1).min(8).max(2)
}

/// [`thread_count_for`] applied to this host.
pub fn default_threads() -> i32 {
    thread_count_for(host_cores())
}

/// A configured thread count forced into `2..=thread_count_for(cores)`.
pub fn clamp_threads(requested: i32, cores: usize) -> i32 {
    requested.clamp(2, thread_count_for(cores))
}

fn host_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// A single time-aligned text chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Start time in hundredths of a second.
    pub start_cs: u64,
    /// End time in hundredths of a second, `>= start_cs`.
    pub end_cs: u64,
    /// Text trimmed of surrounding whitespace; may be empty.
    pub text: String,
}

impl Segment {
    /// Build a segment, trimming `text` and clamping `end` to `start`.
    pub fn new(start_cs: u64, end_cs: u64, text: impl AsRef<str>) -> Self {
        Self {
            start_cs,
            end_cs: end_cs.max(start_cs),
            text: text.as_ref().trim().to_string(),
        }
    }
}

impl From<RawSegment> for Segment {
    fn from(raw: RawSegment) -> Self {
        let start = raw.t0.max(0) as u64;
        let end = raw.t1.max(0) as u64;
        Segment::new(start, end, raw.text)
    }
}

/// What a transcription produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptionOutcome {
    /// The audio track decoded to zero samples; inference was skipped.
    NoAudio,
    /// Segments in chronological (emission) order.
    Segments(Vec<Segment>),
}

impl TranscriptionOutcome {
    pub fn segments(&self) -> &[Segment] {
        match self {
            Self::NoAudio => &[],
            Self::Segments(s) => s,
        }
    }

    /// SRT text; empty for [`TranscriptionOutcome::NoAudio`].
    pub fn to_srt(&self) -> String {
        subtitle::format_srt(self.segments())
    }
}

// ---------------------------------------------------------------------------
// Transcriber
// ---------------------------------------------------------------------------

/// Media file → segments.
///
/// Cheap to clone; clones share the same [`ModelContext`].
///
/// ```rust,no_run
/// use std::path::Path;
/// use std::sync::Arc;
/// use subburn::audio::{AudioExtractor, FfmpegDecoder};
/// use subburn::stt::{LanguageHint, ModelContext, ModelStore, Transcriber, WhisperEngine};
///
/// let context = Arc::new(ModelContext::new(
///     Arc::new(WhisperEngine::new()),
///     ModelStore::new("/home/me/Documents"),
/// ));
/// let extractor = AudioExtractor::new(Arc::new(FfmpegDecoder::default()));
/// let transcriber = Transcriber::new(context, extractor);
///
/// let outcome = transcriber
///     .transcribe_blocking(Path::new("talk.mp4"), "base", &LanguageHint::Auto)
///     .unwrap();
/// print!("{}", outcome.to_srt());
/// ```
#[derive(Debug, Clone)]
pub struct Transcriber {
    context: Arc<ModelContext>,
    extractor: AudioExtractor,
    silence_threshold: f32,
    threads: Option<i32>,
}

impl Transcriber {
    pub fn new(context: Arc<ModelContext>, extractor: AudioExtractor) -> Self {
        Self {
            context,
            extractor,
            silence_threshold: DEFAULT_SILENCE_THRESHOLD,
            threads: None,
        }
    }

    /// Apply the tunables from `[stt]` in the settings file.
    pub fn with_config(mut self, config: &SttConfig) -> Self {
        self.silence_threshold = config.silence_threshold;
        self.threads = config.threads.map(|t| {
            let clamped = clamp_threads(t, host_cores());
            if clamped != t {
                log::warn!("stt: threads = {t} is out of range, using {clamped}");
            }
            clamped
        });
        self
    }

    pub fn context(&self) -> &Arc<ModelContext> {
        &self.context
    }

    /// Parameters for one run with `language`.
    pub fn run_parameters(&self, language: &LanguageHint) -> RunParameters {
        let mut params = RunParameters::new(language.clone());
        params.silence_threshold = self.silence_threshold;
        if let Some(threads) = self.threads {
            params.threads = threads;
        }
        params
    }

    /// Transcribe on the calling thread.
    ///
    /// Blocks for the whole inference pass and cannot be interrupted; call it
    /// from a worker thread (see [`transcribe`](Self::transcribe)).
    ///
    /// # Errors
    ///
    /// Model errors from [`ModelContext`], audio errors from
    /// [`AudioExtractor`], or [`SttError::InferenceFailed`].
    pub fn transcribe_blocking(
        &self,
        media_path: &Path,
        model_name: &str,
        language: &LanguageHint,
    ) -> Result<TranscriptionOutcome, SttError> {
        let mut ctx = self.context.lock();

        // ── 1. Model ─────────────────────────────────────────────────────
        ctx.load(model_name)?;

        // ── 2. Audio ─────────────────────────────────────────────────────
        let audio = self.extractor.extract(media_path)?;
        if audio.is_empty() {
            log::warn!("stt: {} produced no audio data", media_path.display());
            return Ok(TranscriptionOutcome::NoAudio);
        }

        // ── 3. Inference ─────────────────────────────────────────────────
        let params = self.run_parameters(language);
        let started = Instant::now();
        let segments = ctx.run(&params, audio.as_slice())?;
        drop(audio);

        log::info!(
            "stt: {} segments in {:.1}s ({} threads, language {})",
            segments.len(),
            started.elapsed().as_secs_f32(),
            params.threads,
            params.language.code().unwrap_or("auto")
        );

        Ok(TranscriptionOutcome::Segments(segments))
    }

    /// Transcribe on tokio's blocking pool.
    ///
    /// Dropping the returned future does not stop the native call; the
    /// worker finishes and its result is discarded.
    pub async fn transcribe(
        &self,
        media_path: PathBuf,
        model_name: String,
        language: LanguageHint,
    ) -> Result<TranscriptionOutcome, SttError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || {
            this.transcribe_blocking(&media_path, &model_name, &language)
        })
        .await
        .map_err(|e| SttError::Internal(e.to_string()))?
    }

    /// [`transcribe`](Self::transcribe) with a ceiling on how long the caller
    /// waits.
    ///
    /// On expiry this returns [`SttError::TimedOut`] at once; the worker keeps
    /// the model lock until inference ends, so the next request queues
    /// behind it.
    pub async fn transcribe_with_timeout(
        &self,
        media_path: PathBuf,
        model_name: String,
        language: LanguageHint,
        limit: Duration,
    ) -> Result<TranscriptionOutcome, SttError> {
        match tokio::time::timeout(limit, self.transcribe(media_path, model_name, language)).await
        {
            Ok(result) => result,
            Err(_) => {
                log::warn!("stt: gave up waiting after {limit:?}");
                Err(SttError::TimedOut(limit))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
