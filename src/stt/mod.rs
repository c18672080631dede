//! Speech-to-text: model files, the loaded-model lifecycle and transcription.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │ Transcriber                                                │
//! │   lock ─▶ ModelContext ──load──▶ ModelStore (ggml-*.bin)   │
//! │             │                                              │
//! │             │ SpeechEngine::init ─▶ Box<dyn SpeechModel>   │
//! │             ▼                                              │
//! │   AudioExtractor ─▶ samples ─▶ SpeechModel::full ─▶ Segment│
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use subburn::stt::{LanguageHint, ModelContext, ModelStore, WhisperEngine};
//!
//! let ctx = ModelContext::new(Arc::new(WhisperEngine::new()), ModelStore::new("models"));
//! ctx.load("base").expect("run `subburn download base` first");
//! assert!(ctx.is_loaded("base"));
//! ctx.release();
//! # let _ = LanguageHint::Auto;
//! ```

pub mod context;
pub mod download;
pub mod engine;
pub mod model;
pub mod transcribe;

// ── Public re-exports ──────────────────────────────────────────────────────

pub use context::{ContextGuard, ModelContext};
pub use download::ModelDownloader;
pub use engine::{RawSegment, SpeechEngine, SpeechModel, SttError, WhisperEngine};
pub use model::{find_model, ModelInfo, ModelStore, MODELS};
pub use transcribe::{
    clamp_threads, default_threads, thread_count_for, LanguageHint, RunParameters, SamplingStrategy, Segment,
    TranscriptionOutcome, Transcriber,
};
