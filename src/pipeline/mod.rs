//! Command-driven pipeline over transcription and burning.
//!
//! # Architecture
//!
//! ```text
//! front-end ──PipelineCommand (mpsc)──▶ PipelineRunner::run()  ← tokio task
//!                                          │
//!                                          ├─ Transcribe → Transcriber (blocking pool)
//!                                          ├─ Burn       → BurnOrchestrator
//!                                          ├─ ReleaseModel
//!                                          └─ Cancel
//!
//! SharedState (Arc<Mutex<AppState>>) ←── written only by the runner,
//!                                        read by the front-end
//! ```

pub mod runner;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use runner::{PipelineCommand, PipelineError, PipelineRunner};
pub use state::{lock_state, new_shared_state, AppState, PipelineState, SharedState};
