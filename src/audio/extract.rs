//! Media file → 16 kHz mono `f32` samples.
//!
//! [`AudioExtractor`] picks the first audio track, asks the
//! [`MediaDecoder`] for 16-bit signed little-endian mono PCM at 16 kHz and
//! converts it block by block.  Nothing is buffered beyond one block of
//! bytes plus the growing sample vector.

use std::io::{ErrorKind, Read};
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use super::buffer::AudioSampleBuffer;
use super::decoder::{MediaDecoder, PcmFormat};

/// Bytes pulled from the decoder per read.
const BLOCK_BYTES: usize = 32 * 1024;

// ---------------------------------------------------------------------------
// AudioError
// ---------------------------------------------------------------------------

/// Reasons audio extraction can fail.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AudioError {
    /// The container holds no audio stream.
    #[error("No audio track found.")]
    NoAudioTrack,

    /// The container could not be opened or the decoder failed mid-stream.
    #[error("Could not decode audio file: {0}")]
    ReadingFailed(String),
}

// ---------------------------------------------------------------------------
// AudioExtractor
// ---------------------------------------------------------------------------

/// Produces an [`AudioSampleBuffer`] from any media file the decoder can
/// open.
#[derive(Clone)]
pub struct AudioExtractor {
    decoder: Arc<dyn MediaDecoder>,
}

impl std::fmt::Debug for AudioExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioExtractor").finish_non_exhaustive()
    }
}

impl AudioExtractor {
    pub fn new(decoder: Arc<dyn MediaDecoder>) -> Self {
        Self { decoder }
    }

    /// Decode the first audio track of `media_path`.
    ///
    /// # Errors
    ///
    /// - [`AudioError::NoAudioTrack`]: the container has no audio stream.
    /// - [`AudioError::ReadingFailed`]: open or mid-stream decode failure.
    ///   Partially decoded samples are discarded.
    ///
    /// A track with zero decodable frames yields an empty buffer, not an
    /// error.
    pub fn extract(&self, media_path: &Path) -> Result<AudioSampleBuffer, AudioError> {
        let tracks = self.decoder.audio_tracks(media_path)?;
        let track = tracks.first().ok_or(AudioError::NoAudioTrack)?;

        let mut reader = self
            .decoder
            .open_pcm(media_path, track, &PcmFormat::WHISPER)?;

        let mut samples: Vec<f32> = Vec::new();
        let mut block = vec![0u8; BLOCK_BYTES];
        let mut carry: Option<u8> = None;

        loop {
            let n = match reader.read(&mut block) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(AudioError::ReadingFailed(e.to_string())),
            };
            append_s16le(&block[..n], &mut carry, &mut samples);
        }

        if carry.is_some() {
            log::warn!("audio: decoder emitted an odd trailing byte; dropped");
        }

        log::debug!(
            "audio: extracted {} samples ({:.2}s) from {}",
            samples.len(),
            samples.len() as f32 / PcmFormat::WHISPER.sample_rate as f32,
            media_path.display()
        );

        Ok(AudioSampleBuffer::new(samples))
    }
}

/// Convert one signed 16-bit sample to a normalised float.
pub fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / 32768.0
}

/// Append little-endian `i16` samples from `bytes`, joining a byte left over
/// from the previous block with the first byte of this one.
fn append_s16le(mut bytes: &[u8], carry: &mut Option<u8>, out: &mut Vec<f32>) {
    if let Some(lo) = carry.take() {
        match bytes.split_first() {
            Some((&hi, rest)) => {
                out.push(i16_to_f32(i16::from_le_bytes([lo, hi])));
                bytes = rest;
            }
            None => {
                *carry = Some(lo);
                return;
            }
        }
    }

    let mut pairs = bytes.chunks_exact(2);
    out.extend(
        pairs
            .by_ref()
            .map(|p| i16_to_f32(i16::from_le_bytes([p[0], p[1]]))),
    );
    *carry = pairs.remainder().first().copied();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::audio::decoder::AudioTrack;
    use std::io::{self, Cursor};

    /// In-memory decoder: a fixed track list and a byte payload, optionally
    /// failing after the payload has been read.
    pub(crate) struct MemoryDecoder {
        pub tracks: Vec<AudioTrack>,
        pub pcm: Vec<u8>,
        pub fail_after_payload: bool,
        pub chunk: usize,
    }

    impl MemoryDecoder {
        pub fn with_samples(samples: &[i16]) -> Self {
            Self {
                tracks: vec![AudioTrack {
                    index: 0,
                    codec: Some("pcm_s16le".into()),
                    channels: Some(1),
                    sample_rate: Some(16_000),
                }],
                pcm: samples.iter().flat_map(|s| s.to_le_bytes()).collect(),
                fail_after_payload: false,
                chunk: 3,
            }
        }

        pub fn without_tracks() -> Self {
            Self {
                tracks: Vec::new(),
                ..Self::with_samples(&[])
            }
        }
    }

    /// Hands out at most `chunk` bytes per read so samples straddle reads.
    struct ChunkedReader {
        inner: Cursor<Vec<u8>>,
        chunk: usize,
        fail_at_end: bool,
    }

    impl Read for ChunkedReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let limit = buf.len().min(self.chunk);
            let n = self.inner.read(&mut buf[..limit])?;
            if n == 0 && self.fail_at_end {
                return Err(io::Error::new(io::ErrorKind::Other, "decoder crashed"));
            }
            Ok(n)
        }
    }

    impl MediaDecoder for MemoryDecoder {
        fn audio_tracks(&self, _path: &Path) -> Result<Vec<AudioTrack>, AudioError> {
            Ok(self.tracks.clone())
        }

        fn open_pcm(
            &self,
            _path: &Path,
            _track: &AudioTrack,
            format: &PcmFormat,
        ) -> Result<Box<dyn Read + Send>, AudioError> {
            assert_eq!(*format, PcmFormat::WHISPER);
            Ok(Box::new(ChunkedReader {
                inner: Cursor::new(self.pcm.clone()),
                chunk: self.chunk,
                fail_at_end: self.fail_after_payload,
            }))
        }
    }

    fn extractor(decoder: MemoryDecoder) -> AudioExtractor {
        AudioExtractor::new(Arc::new(decoder))
    }

    #[test]
    fn converts_by_dividing_by_32768() {
        assert_eq!(i16_to_f32(0), 0.0);
        assert_eq!(i16_to_f32(i16::MIN), -1.0);
        assert_eq!(i16_to_f32(16_384), 0.5);
        assert!(i16_to_f32(i16::MAX) < 1.0);
    }

    #[test]
    fn samples_straddling_reads_are_reassembled() {
        let samples = [0i16, 16_384, -16_384, i16::MIN, 1];
        let buf = extractor(MemoryDecoder::with_samples(&samples))
            .extract(Path::new("clip.m4a"))
            .unwrap();
        assert_eq!(
            buf.as_slice(),
            &[0.0, 0.5, -0.5, -1.0, 1.0 / 32768.0][..]
        );
    }

    #[test]
    fn no_tracks_is_no_audio_track() {
        let err = extractor(MemoryDecoder::without_tracks())
            .extract(Path::new("silent-film.mp4"))
            .unwrap_err();
        assert_eq!(err, AudioError::NoAudioTrack);
    }

    #[test]
    fn empty_track_is_empty_buffer() {
        let buf = extractor(MemoryDecoder::with_samples(&[]))
            .extract(Path::new("empty.wav"))
            .unwrap();
        assert!(buf.is_empty());
    }

    #[test]
    fn mid_stream_failure_discards_partial_output() {
        let mut decoder = MemoryDecoder::with_samples(&[100, 200, 300]);
        decoder.fail_after_payload = true;
        let err = extractor(decoder)
            .extract(Path::new("broken.mp4"))
            .unwrap_err();
        assert!(matches!(err, AudioError::ReadingFailed(msg) if msg.contains("crashed")));
    }

    #[test]
    fn odd_trailing_byte_is_dropped() {
        let mut decoder = MemoryDecoder::with_samples(&[16_384, -16_384]);
        decoder.pcm.push(0x7f);
        let buf = extractor(decoder).extract(Path::new("odd.wav")).unwrap();
        assert_eq!(buf.as_slice(), &[0.5, -0.5][..]);
    }

    #[test]
    fn odd_byte_is_carried_between_blocks() {
        let mut carry = None;
        let mut out = Vec::new();
        append_s16le(&[0x00, 0x40, 0x01], &mut carry, &mut out);
        assert_eq!(out, vec![0.5]);
        assert_eq!(carry, Some(0x01));

        append_s16le(&[], &mut carry, &mut out);
        assert_eq!(carry, Some(0x01));

        append_s16le(&[0x00], &mut carry, &mut out);
        assert_eq!(out.len(), 2);
        assert_eq!(carry, None);
    }
}
