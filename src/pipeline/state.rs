//! Pipeline status and shared application state.
//!
//! [`PipelineState`] is the coarse phase a front-end shows.  [`AppState`]
//! holds everything a front-end reads: phase, message, last results and the
//! last error kind.  Only the [`PipelineRunner`](super::PipelineRunner) task
//! writes to it.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::AppConfig;

// ---------------------------------------------------------------------------
// PipelineState
// ---------------------------------------------------------------------------

/// ```text
/// Idle ──Transcribe──▶ Transcribing ──ok──▶ Done
///      ──Burn───────▶ Burning ──────ok──▶ Done
///                     any ──error──▶ Error
///                     any ──Cancel──▶ Idle
/// Done / Error ──next command──▶ Transcribing | Burning
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    #[default]
    Idle,
    /// Model load, audio extraction and inference on the blocking pool.
    Transcribing,
    /// Staging and transcoding.
    Burning,
    /// The last request succeeded.
    Done,
    /// The last request failed; see [`AppState::error_kind`].
    Error,
}

impl PipelineState {
    /// ```
    /// use subburn::pipeline::PipelineState;
    ///
    /// assert!(PipelineState::Transcribing.is_busy());
    /// assert!(PipelineState::Burning.is_busy());
    /// assert!(!PipelineState::Done.is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        matches!(self, PipelineState::Transcribing | PipelineState::Burning)
    }

    pub fn label(&self) -> &'static str {
        match self {
            PipelineState::Idle => "Idle",
            PipelineState::Transcribing => "Transcribing",
            PipelineState::Burning => "Burning",
            PipelineState::Done => "Done",
            PipelineState::Error => "Error",
        }
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub status: PipelineState,

    /// Human-readable line describing the latest transition.
    pub message: String,

    /// SRT text of the last successful transcription.
    pub last_transcript: Option<String>,

    /// Final path of the last successful burn.
    pub last_output: Option<PathBuf>,

    /// Taxonomy name of the last failure, e.g. `"ModelNotFound"`.
    /// Cleared when a new request starts.
    pub error_kind: Option<&'static str>,

    pub config: AppConfig,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// SharedState
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`AppState`].  Keep critical sections short and
/// never hold the lock across `.await`.
pub type SharedState = Arc<Mutex<AppState>>;

pub fn new_shared_state(config: AppConfig) -> SharedState {
    Arc::new(Mutex::new(AppState::new(config)))
}

/// Lock, recovering from poisoning: writers only assign whole fields.
pub fn lock_state(state: &SharedState) -> MutexGuard<'_, AppState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_active_phases_are_busy() {
        assert!(!PipelineState::Idle.is_busy());
        assert!(PipelineState::Transcribing.is_busy());
        assert!(PipelineState::Burning.is_busy());
        assert!(!PipelineState::Done.is_busy());
        assert!(!PipelineState::Error.is_busy());
    }

    #[test]
    fn labels() {
        assert_eq!(PipelineState::Idle.label(), "Idle");
        assert_eq!(PipelineState::Burning.label(), "Burning");
        assert_eq!(PipelineState::Done.label(), "Done");
    }

    #[test]
    fn default_state_is_idle_and_empty() {
        let state = AppState::default();
        assert_eq!(state.status, PipelineState::Idle);
        assert!(state.message.is_empty());
        assert!(state.last_transcript.is_none());
        assert!(state.error_kind.is_none());
    }

    #[test]
    fn shared_state_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SharedState>();
    }

    #[test]
    fn poisoned_state_is_still_readable() {
        let state = new_shared_state(AppConfig::default());
        let s2 = Arc::clone(&state);
        let _ = std::thread::spawn(move || {
            let _guard = s2.lock().unwrap();
            panic!("poison");
        })
        .join();
        assert!(state.lock().is_err());
        lock_state(&state).status = PipelineState::Done;
        assert_eq!(lock_state(&state).status, PipelineState::Done);
    }
}
