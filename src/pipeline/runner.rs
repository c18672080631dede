//! Pipeline runner: the single task that turns commands into work and work
//! results into [`AppState`](super::AppState) changes.
//!
//! # Flow
//!
//! ```text
//! PipelineCommand (mpsc) ──▶ PipelineRunner::run()
//!   Transcribe ─▶ tokio::spawn(Transcriber::transcribe)       [Transcribing]
//!   Burn       ─▶ BurnOrchestrator::spawn + status watcher   [Burning]
//!   ReleaseModel ─▶ spawn_blocking(ModelContext::release)
//!   Cancel     ─▶ forget the in-flight request id            [Idle]
//!
//! background task ──Event (mpsc)──▶ same loop ──▶ SharedState
//! ```
//!
//! Background tasks never touch [`SharedState`]; they report back through
//! the loop, which drops results whose request id is no longer current.
//! Inference and transcoding are never interrupted: cancel only means the
//! eventual result is ignored.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::burn::{BurnError, BurnOrchestrator, BurnRequest};
use crate::stt::{LanguageHint, SttError, TranscriptionOutcome, Transcriber};

use super::state::{lock_state, PipelineState, SharedState};

// ---------------------------------------------------------------------------
// PipelineError
// ---------------------------------------------------------------------------

/// Any failure a request can end with.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PipelineError {
    #[error(transparent)]
    Stt(#[from] SttError),

    #[error(transparent)]
    Burn(#[from] BurnError),

    /// The audio track decoded to zero samples.
    #[error("No audio data found in the selected file.")]
    NoAudio,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Stable taxonomy name for front-ends.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Stt(e) => match e {
                SttError::ModelNotFound(_) => "ModelNotFound",
                SttError::ContextInitializationFailed(_) => "ContextInitializationFailed",
                SttError::AudioReadingFailed(_) => "AudioReadingFailed",
                SttError::NoAudioTrack => "NoAudioTrack",
                SttError::InferenceFailed(_) => "InferenceFailed",
                SttError::Download(_) => "DownloadFailed",
                SttError::TimedOut(_) => "TimedOut",
                SttError::Internal(_) => "Internal",
            },
            PipelineError::Burn(BurnError::FileSetupFailed(_)) => "FileSetupFailed",
            PipelineError::Burn(BurnError::BurnFailed(_)) => "BurnFailed",
            PipelineError::NoAudio => "NoAudioData",
            PipelineError::Internal(_) => "Internal",
        }
    }
}

// ---------------------------------------------------------------------------
// Commands and events
// ---------------------------------------------------------------------------

/// Requests accepted by [`PipelineRunner::run`].
#[derive(Debug, Clone)]
pub enum PipelineCommand {
    Transcribe {
        media: PathBuf,
        model: String,
        language: LanguageHint,
        /// Stop waiting after this long.  The native call still finishes.
        timeout: Option<Duration>,
    },
    Burn(BurnRequest),
    /// Free the loaded model.  Waits for any running inference first.
    ReleaseModel,
    /// Discard the in-flight request's result.
    Cancel,
}

enum Event {
    Transcribed {
        id: u64,
        result: Result<TranscriptionOutcome, SttError>,
    },
    Burned {
        id: u64,
        result: Result<PathBuf, BurnError>,
    },
    Progress {
        id: u64,
        message: &'static str,
    },
    ModelReleased,
}

// ---------------------------------------------------------------------------
// PipelineRunner
// ---------------------------------------------------------------------------

/// Owns the write side of [`SharedState`].
///
/// ```rust,no_run
/// use tokio::sync::mpsc;
/// use subburn::config::AppConfig;
/// use subburn::pipeline::{new_shared_state, PipelineCommand, PipelineRunner};
/// use subburn::stt::LanguageHint;
/// # use subburn::stt::Transcriber;
/// # use subburn::burn::BurnOrchestrator;
/// # async fn demo(transcriber: Transcriber, burner: BurnOrchestrator) {
/// let state = new_shared_state(AppConfig::default());
/// let (tx, rx) = mpsc::channel(8);
/// let runner = PipelineRunner::new(state.clone(), transcriber, burner);
/// let task = tokio::spawn(runner.run(rx));
///
/// tx.send(PipelineCommand::Transcribe {
///     media: "talk.mp4".into(),
///     model: "base".into(),
///     language: LanguageHint::Auto,
///     timeout: None,
/// })
/// .await
/// .unwrap();
/// drop(tx);
/// task.await.unwrap();
/// println!("{}", state.lock().unwrap().message);
/// # }
/// ```
pub struct PipelineRunner {
    state: SharedState,
    transcriber: Transcriber,
    burner: BurnOrchestrator,
    next_id: u64,
    active: Option<u64>,
}

impl PipelineRunner {
    pub fn new(state: SharedState, transcriber: Transcriber, burner: BurnOrchestrator) -> Self {
        Self {
            state,
            transcriber,
            burner,
            next_id: 0,
            active: None,
        }
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Process commands until `commands` closes and no request is in flight.
    pub async fn run(mut self, mut commands: mpsc::Receiver<PipelineCommand>) {
        let (events_tx, mut events) = mpsc::unbounded_channel::<Event>();
        let mut commands_open = true;

        loop {
            tokio::select! {
                cmd = commands.recv(), if commands_open => match cmd {
                    Some(cmd) => self.handle_command(cmd, &events_tx),
                    None => commands_open = false,
                },
                Some(event) = events.recv() => self.handle_event(event),
            }

            if !commands_open && self.active.is_none() {
                break;
            }
        }

        log::info!("pipeline: command channel closed, runner shutting down");
    }

    // -----------------------------------------------------------------------
    // Command handlers
    // -----------------------------------------------------------------------

    fn handle_command(&mut self, cmd: PipelineCommand, events: &mpsc::UnboundedSender<Event>) {
        match cmd {
            PipelineCommand::Transcribe {
                media,
                model,
                language,
                timeout,
            } => {
                let Some(id) = self.begin(PipelineState::Transcribing, "Transcribing...") else {
                    return;
                };
                log::info!("pipeline: transcribing {} with '{model}'", media.display());
                let transcriber = self.transcriber.clone();
                let events = events.clone();
                tokio::spawn(async move {
                    let result = match timeout {
                        Some(limit) => {
                            transcriber
                                .transcribe_with_timeout(media, model, language, limit)
                                .await
                        }
                        None => transcriber.transcribe(media, model, language).await,
                    };
                    let _ = events.send(Event::Transcribed { id, result });
                });
            }

            PipelineCommand::Burn(request) => {
                let Some(id) = self.begin(PipelineState::Burning, "Preparing files...") else {
                    return;
                };
                log::info!("pipeline: burning {}", request.video.display());
                let handle = self.burner.spawn(request);

                let mut status = handle.status.clone();
                let progress = events.clone();
                tokio::spawn(async move {
                    while status.changed().await.is_ok() {
                        let current = status.borrow_and_update().clone();
                        let _ = progress.send(Event::Progress {
                            id,
                            message: current.label(),
                        });
                        if current.is_terminal() {
                            break;
                        }
                    }
                });

                let events = events.clone();
                tokio::spawn(async move {
                    let result = handle.wait().await;
                    let _ = events.send(Event::Burned { id, result });
                });
            }

            PipelineCommand::ReleaseModel => {
                let context = self.transcriber.context().clone();
                let events = events.clone();
                tokio::task::spawn_blocking(move || {
                    context.release();
                    let _ = events.send(Event::ModelReleased);
                });
            }

            PipelineCommand::Cancel => match self.active.take() {
                Some(id) => {
                    log::info!("pipeline: request {id} cancelled; its result will be discarded");
                    let mut st = lock_state(&self.state);
                    st.status = PipelineState::Idle;
                    st.message = "Cancelled.".into();
                }
                None => log::debug!("pipeline: nothing to cancel"),
            },
        }
    }

    /// Start a request.  `None` when another one is still running.
    fn begin(&mut self, status: PipelineState, message: &str) -> Option<u64> {
        if let Some(active) = self.active {
            log::warn!("pipeline: request {active} still running; new request ignored");
            return None;
        }
        self.next_id += 1;
        let id = self.next_id;
        self.active = Some(id);

        let mut st = lock_state(&self.state);
        st.status = status;
        st.message = message.to_string();
        st.error_kind = None;
        Some(id)
    }

    // -----------------------------------------------------------------------
    // Event handlers
    // -----------------------------------------------------------------------

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Progress { id, message } => {
                if self.active == Some(id) {
                    lock_state(&self.state).message = message.to_string();
                }
            }

            Event::Transcribed { id, result } => {
                if !self.finish(id) {
                    return;
                }
                match result {
                    Ok(TranscriptionOutcome::Segments(segments)) => {
                        let srt = crate::subtitle::format_srt(&segments);
                        let mut st = lock_state(&self.state);
                        st.status = PipelineState::Done;
                        st.message = format!("Transcription complete: {} segments.", segments.len());
                        st.last_transcript = Some(srt);
                    }
                    Ok(TranscriptionOutcome::NoAudio) => self.set_error(PipelineError::NoAudio),
                    Err(e) => self.set_error(e.into()),
                }
            }

            Event::Burned { id, result } => {
                if !self.finish(id) {
                    return;
                }
                match result {
                    Ok(path) => {
                        let mut st = lock_state(&self.state);
                        st.status = PipelineState::Done;
                        st.message = format!("Saved to {}", path.display());
                        st.last_output = Some(path);
                    }
                    Err(e) => self.set_error(e.into()),
                }
            }

            Event::ModelReleased => {
                log::info!("pipeline: model released");
                let mut st = lock_state(&self.state);
                if !st.status.is_busy() {
                    st.message = "Model released.".into();
                }
            }
        }
    }

    /// `true` if `id` is the current request (which is now over).
    fn finish(&mut self, id: u64) -> bool {
        if self.active == Some(id) {
            self.active = None;
            true
        } else {
            log::debug!("pipeline: discarding result of abandoned request {id}");
            false
        }
    }

    fn set_error(&self, error: PipelineError) {
        log::error!("pipeline error ({}): {error}", error.kind());
        let mut st = lock_state(&self.state);
        st.status = PipelineState::Error;
        st.message = error.to_string();
        st.error_kind = Some(error.kind());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
