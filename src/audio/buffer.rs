//! Owned 16 kHz mono `f32` sample buffer handed to the inference engine.
//!
//! # Example
//!
//! ```rust
//! use subburn::audio::AudioSampleBuffer;
//!
//! let buf = AudioSampleBuffer::new(vec![0.0; 8_000]);
//! assert_eq!(buf.sample_rate(), 16_000);
//! assert!((buf.duration_secs() - 0.5).abs() < 1e-6);
//! ```

/// Sample rate consumed by Whisper.
pub const SAMPLE_RATE: u32 = 16_000;
/// Channel count consumed by Whisper.
pub const CHANNELS: u16 = 1;

/// Normalised samples (approximately `[-1.0, 1.0]`) at [`SAMPLE_RATE`] Hz,
/// single channel.
///
/// Rate and channel layout are fixed: anything else must be converted by the
/// decoder before samples land here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioSampleBuffer {
    samples: Vec<f32>,
}

impl AudioSampleBuffer {
    /// Wrap samples that are already 16 kHz mono.
    pub fn new(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    pub fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    pub fn channels(&self) -> u16 {
        CHANNELS
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// `true` when the track decoded to zero samples ("no audio data").
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.samples
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / SAMPLE_RATE as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_empty() {
        let buf = AudioSampleBuffer::default();
        assert!(buf.is_empty());
        assert_eq!(buf.len(), 0);
        assert_eq!(buf.duration_secs(), 0.0);
    }

    #[test]
    fn fixed_contract_values() {
        let buf = AudioSampleBuffer::new(vec![0.25; 3]);
        assert_eq!(buf.sample_rate(), 16_000);
        assert_eq!(buf.channels(), 1);
        assert_eq!(buf.as_slice(), &[0.25, 0.25, 0.25]);
    }

    #[test]
    fn five_seconds_of_samples() {
        let buf = AudioSampleBuffer::new(vec![0.0; 80_000]);
        assert!((buf.duration_secs() - 5.0).abs() < 1e-6);
        assert_eq!(buf.into_inner().len(), 80_000);
    }
}
