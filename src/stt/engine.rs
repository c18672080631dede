//! Native speech engine seam and its whisper-rs implementation.
//!
//! # Overview
//!
//! [`SpeechEngine`] turns a model file into a loaded [`SpeechModel`] handle.
//! The handle is an owned resource: dropping the `Box<dyn SpeechModel>`
//! frees the native context, so there is no separate `free` call to forget.
//!
//! [`SpeechModel`] mirrors the engine's call contract: one blocking
//! [`full`](SpeechModel::full) pass, then indexed accessors for the
//! resulting segments.
//!
//! [`WhisperEngine`] is the production implementation over
//! `whisper_rs::WhisperContext`.
//!
//! `MockSpeechEngine` (available under `#[cfg(test)]`) counts native
//! initialisations and releases so the model lifecycle can be unit-tested
//! without a GGML file.

use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use whisper_rs::{
    FullParams, WhisperContext, WhisperContextParameters, WhisperError, WhisperState,
};

use crate::audio::AudioError;
use crate::stt::transcribe::{RunParameters, SamplingStrategy};

// ---------------------------------------------------------------------------
// SttError
// ---------------------------------------------------------------------------

/// All errors that can arise from the transcription pipeline.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SttError {
    /// No `ggml-<name>.bin` file exists in the models directory.
    #[error("Model '{0}' not found in the models directory.")]
    ModelNotFound(String),

    /// The engine returned no usable context for the model file.
    #[error("Failed to initialize Whisper context: {0}")]
    ContextInitializationFailed(String),

    /// The media file could not be decoded.
    #[error("Could not decode audio file: {0}")]
    AudioReadingFailed(String),

    /// The media file has no audio stream.
    #[error("No audio track found.")]
    NoAudioTrack,

    /// The inference pass returned a non-zero code.
    #[error("Whisper inference failed with code {0}.")]
    InferenceFailed(i32),

    /// Fetching a model file failed.
    #[error("Model download failed: {0}")]
    Download(String),

    /// The caller stopped waiting.  The native call still runs to
    /// completion; its result is dropped.
    #[error("Transcription did not finish within {0:?}.")]
    TimedOut(Duration),

    /// The background task running the transcription panicked or was
    /// aborted.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AudioError> for SttError {
    fn from(e: AudioError) -> Self {
        match e {
            AudioError::NoAudioTrack => SttError::NoAudioTrack,
            AudioError::ReadingFailed(msg) => SttError::AudioReadingFailed(msg),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine traits
// ---------------------------------------------------------------------------

/// One segment exactly as the engine reports it.
///
/// Times are in the engine's native unit: hundredths of a second.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSegment {
    pub text: String,
    pub t0: i64,
    pub t1: i64,
}

/// Factory for native model handles.
pub trait SpeechEngine: Send + Sync {
    /// Initialise a native context from `model_path`.
    ///
    /// # Errors
    ///
    /// [`SttError::ContextInitializationFailed`] when the engine cannot
    /// produce a valid handle.
    fn init(&self, model_path: &Path) -> Result<Box<dyn SpeechModel>, SttError>;
}

/// A loaded model.  Dropping it releases the native context.
///
/// Not `Sync`: every call must go through the owning
/// [`ModelContext`](crate::stt::ModelContext) lock.
pub trait SpeechModel: Send {
    /// Run a full blocking inference pass over 16 kHz mono samples.
    fn full(&mut self, params: &RunParameters, samples: &[f32]) -> Result<(), SttError>;

    /// Number of segments produced by the last [`full`](Self::full) call.
    fn n_segments(&self) -> Result<usize, SttError>;

    /// Segment `index` of the last pass, `0 <= index < n_segments()`.
    fn segment(&self, index: usize) -> Result<RawSegment, SttError>;
}

// Compile-time assertion: Box<dyn SpeechEngine> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn SpeechEngine>, _: Box<dyn SpeechModel>) {}
};

// ---------------------------------------------------------------------------
// WhisperEngine
// ---------------------------------------------------------------------------

/// Production [`SpeechEngine`] backed by whisper.cpp through `whisper-rs`.
#[derive(Debug, Clone, Default)]
pub struct WhisperEngine {
    use_gpu: bool,
}

impl WhisperEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request GPU offload where the linked whisper.cpp build supports it.
    pub fn with_gpu(mut self, use_gpu: bool) -> Self {
        self.use_gpu = use_gpu;
        self
    }
}

impl SpeechEngine for WhisperEngine {
    fn init(&self, model_path: &Path) -> Result<Box<dyn SpeechModel>, SttError> {
        let path_str = model_path.to_str().ok_or_else(|| {
            SttError::ContextInitializationFailed(format!(
                "model path contains non-UTF-8 characters: {}",
                model_path.display()
            ))
        })?;

        let mut ctx_params = WhisperContextParameters::default();
        ctx_params.use_gpu(self.use_gpu);

        let ctx = WhisperContext::new_with_params(path_str, ctx_params)
            .map_err(|e| SttError::ContextInitializationFailed(e.to_string()))?;
        let state = ctx
            .create_state()
            .map_err(|e| SttError::ContextInitializationFailed(e.to_string()))?;

        Ok(Box::new(WhisperModel { state, _ctx: ctx }))
    }
}

/// A whisper context plus the single inference state used with it.
///
/// Field order matters: the state is dropped before the context.
struct WhisperModel {
    state: WhisperState,
    _ctx: WhisperContext,
}

// SAFETY: whisper-rs declares its context and state Send; the model is
// only ever touched by the thread holding the ModelContext lock.
unsafe impl Send for WhisperModel {}

/// Engine return code carried by a whisper-rs error, `-1` when the error
/// did not originate from a numeric native return.
fn native_code(e: &WhisperError) -> i32 {
    match e {
        WhisperError::GenericError(code) => *code,
        _ => -1,
    }
}

impl SpeechModel for WhisperModel {
    fn full(&mut self, params: &RunParameters, samples: &[f32]) -> Result<(), SttError> {
        let strategy = match params.strategy {
            SamplingStrategy::Greedy { best_of } => whisper_rs::SamplingStrategy::Greedy { best_of },
        };

        let mut fp = FullParams::new(strategy);
        // `None` lets whisper auto-detect the language.  The borrow of
        // `params` outlives `fp`, which is consumed by `full` below.
        fp.set_language(params.language.code());
        fp.set_n_threads(params.threads);
        fp.set_no_speech_thold(params.silence_threshold);
        fp.set_translate(false);
        fp.set_print_progress(false);
        fp.set_print_realtime(false);
        fp.set_print_special(false);
        fp.set_print_timestamps(false);

        self.state.full(fp, samples).map_err(|e| {
            log::error!("stt: whisper_full failed: {e}");
            SttError::InferenceFailed(native_code(&e))
        })?;
        Ok(())
    }

    fn n_segments(&self) -> Result<usize, SttError> {
        self.state
            .full_n_segments()
            .map(|n| n.max(0) as usize)
            .map_err(|e| SttError::InferenceFailed(native_code(&e)))
    }

    fn segment(&self, index: usize) -> Result<RawSegment, SttError> {
        let i = index as i32;
        let text = self
            .state
            .full_get_segment_text(i)
            .map_err(|e| SttError::InferenceFailed(native_code(&e)))?;
        let t0 = self
            .state
            .full_get_segment_t0(i)
            .map_err(|e| SttError::InferenceFailed(native_code(&e)))?;
        let t1 = self
            .state
            .full_get_segment_t1(i)
            .map_err(|e| SttError::InferenceFailed(native_code(&e)))?;
        Ok(RawSegment { text, t0, t1 })
    }
}

// ---------------------------------------------------------------------------
// MockSpeechEngine  (test-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) use mock::MockSpeechEngine;


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
