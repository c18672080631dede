//! Subtitle text and burn-in style.
//!
//! - [`srt`]: `Segment` ⇄ SubRip text.
//! - [`style`]: [`SubtitleStyle`] → transcoder `force_style` override, plus
//!   filter-path escaping.

pub mod srt;
pub mod style;

pub use srt::{format_srt, format_timestamp, parse_srt, save_srt, SrtError};
pub use style::{escape_filter_path, Alignment, Rgb, SubtitleStyle};
