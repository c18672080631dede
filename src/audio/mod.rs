//! Audio extraction: media file → decoder → 16 kHz mono `f32`.
//!
//! # Pipeline
//!
//! ```text
//! media file → MediaDecoder::audio_tracks → first track
//!            → MediaDecoder::open_pcm(s16le, mono, 16 kHz)
//!            → AudioExtractor (block-wise i16 → f32 / 32768)
//!            → AudioSampleBuffer
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use subburn::audio::{AudioExtractor, FfmpegDecoder};
//!
//! let extractor = AudioExtractor::new(Arc::new(FfmpegDecoder::default()));
//! let audio = extractor.extract(Path::new("interview.mp4")).unwrap();
//! println!("{} samples ({:.1}s)", audio.len(), audio.duration_secs());
//! ```

pub mod buffer;
pub mod decoder;
pub mod extract;

pub use buffer::{AudioSampleBuffer, CHANNELS, SAMPLE_RATE};
pub use decoder::{AudioTrack, FfmpegDecoder, MediaDecoder, PcmFormat};
pub use extract::{i16_to_f32, AudioError, AudioExtractor};
