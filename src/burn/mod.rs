//! Subtitle burn-in.
//!
//! # Architecture
//!
//! ```text
//! BurnRequest ─▶ BurnOrchestrator ─┬─ AccessGuard + copy ─▶ <tmp>/input.*, subs.srt
//!                                  ├─ TranscodeCommand ─▶ Transcoder (ffmpeg)
//!                                  ├─ move output ─▶ burned_output_<ts>.mp4
//!                                  └─ remove <tmp>
//!            watch::Receiver<BurnStatus> ◀── every transition
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use subburn::burn::{BurnOrchestrator, BurnRequest, FfmpegTranscoder};
//! use subburn::subtitle::SubtitleStyle;
//!
//! # async fn demo() {
//! let orch = BurnOrchestrator::new(Arc::new(FfmpegTranscoder::default()), "/home/me/Documents");
//! let out = orch
//!     .burn(BurnRequest::new("clip.mp4", "clip.srt", &SubtitleStyle::default()))
//!     .await
//!     .unwrap();
//! println!("{}", out.display());
//! # }
//! ```

pub mod access;
pub mod job;
pub mod orchestrator;
pub mod transcoder;

pub use access::{AccessGuard, NoScopedAccess, ScopedAccess};
pub use job::{BurnError, BurnJob, BurnRequest, BurnStatus};
pub use orchestrator::{claim_output_path, BurnHandle, BurnOrchestrator};
pub use transcoder::{FfmpegTranscoder, TranscodeCommand, TranscodeOutcome, Transcoder};
