//! Media → subtitles, and subtitles → burned-in video.
//!
//! - [`audio`]: media file → 16 kHz mono samples through an external decoder.
//! - [`stt`]: model files, the single loaded Whisper model, transcription.
//! - [`subtitle`]: SRT text and burn-in style translation.
//! - [`burn`]: staging, transcoding and cleanup of burn jobs.
//! - [`pipeline`]: command-driven runner and shared status for front-ends.
//! - [`config`]: paths and `settings.toml`.

pub mod audio;
pub mod burn;
pub mod config;
pub mod pipeline;
pub mod stt;
pub mod subtitle;
