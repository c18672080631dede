//! Media demux/decode collaborator.
//!
//! [`MediaDecoder`] lists the audio tracks of a container and opens a PCM
//! byte stream for one of them in a caller-negotiated [`PcmFormat`].
//! Resampling and downmixing happen inside the decoder, never in Rust.
//!
//! [`FfmpegDecoder`] is the production implementation: `ffprobe` lists the
//! streams as JSON, `ffmpeg` decodes the selected stream to raw PCM on stdout.

use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use serde::Deserialize;

use super::buffer::{CHANNELS, SAMPLE_RATE};
use super::extract::AudioError;
use crate::config::DecoderConfig;

// ---------------------------------------------------------------------------
// PcmFormat
// ---------------------------------------------------------------------------

/// Linear PCM output format requested from the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
    pub signed: bool,
    pub big_endian: bool,
}

impl PcmFormat {
    /// 16-bit signed little-endian, mono, 16 kHz.
    pub const WHISPER: PcmFormat = PcmFormat {
        sample_rate: SAMPLE_RATE,
        channels: CHANNELS,
        bit_depth: 16,
        signed: true,
        big_endian: false,
    };

    /// `(muxer, codec)` names understood by ffmpeg, or `None` if the layout
    /// has no raw PCM equivalent.
    fn ffmpeg_names(&self) -> Option<(&'static str, &'static str)> {
        match (self.bit_depth, self.signed, self.big_endian) {
            (8, false, _) => Some(("u8", "pcm_u8")),
            (16, true, false) => Some(("s16le", "pcm_s16le")),
            (16, true, true) => Some(("s16be", "pcm_s16be")),
            (32, true, false) => Some(("s32le", "pcm_s32le")),
            (32, true, true) => Some(("s32be", "pcm_s32be")),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// AudioTrack / MediaDecoder
// ---------------------------------------------------------------------------

/// One audio stream inside a media container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioTrack {
    /// Container-level stream index.
    pub index: u32,
    pub codec: Option<String>,
    pub channels: Option<u16>,
    pub sample_rate: Option<u32>,
}

/// Demux/decode service returning raw PCM in a negotiated format.
pub trait MediaDecoder: Send + Sync {
    /// Audio tracks in container order.  Empty when the file has none.
    fn audio_tracks(&self, path: &Path) -> Result<Vec<AudioTrack>, AudioError>;

    /// Start decoding `track` as `format`.  The returned reader yields raw
    /// PCM bytes; an `Err` from `read` means the decoder failed mid-stream.
    fn open_pcm(
        &self,
        path: &Path,
        track: &AudioTrack,
        format: &PcmFormat,
    ) -> Result<Box<dyn Read + Send>, AudioError>;
}

// ---------------------------------------------------------------------------
// FfmpegDecoder
// ---------------------------------------------------------------------------

/// `ffprobe` + `ffmpeg` backed [`MediaDecoder`].
#[derive(Debug, Clone)]
pub struct FfmpegDecoder {
    ffmpeg: String,
    ffprobe: String,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    index: u32,
    codec_name: Option<String>,
    channels: Option<u16>,
    // ffprobe reports the rate as a string.
    sample_rate: Option<String>,
}

impl From<ProbeStream> for AudioTrack {
    fn from(s: ProbeStream) -> Self {
        AudioTrack {
            index: s.index,
            codec: s.codec_name,
            channels: s.channels,
            sample_rate: s.sample_rate.and_then(|r| r.parse().ok()),
        }
    }
}

impl FfmpegDecoder {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    pub fn from_config(config: &DecoderConfig) -> Self {
        Self::new(&config.ffmpeg_path, &config.ffprobe_path)
    }
}

impl Default for FfmpegDecoder {
    fn default() -> Self {
        Self::from_config(&DecoderConfig::default())
    }
}

/// Parse `ffprobe -print_format json -show_streams` output.
fn parse_probe_json(json: &[u8]) -> Result<Vec<AudioTrack>, AudioError> {
    let probe: ProbeOutput = serde_json::from_slice(json)
        .map_err(|e| AudioError::ReadingFailed(format!("unreadable ffprobe output: {e}")))?;
    Ok(probe.streams.into_iter().map(AudioTrack::from).collect())
}

impl MediaDecoder for FfmpegDecoder {
    fn audio_tracks(&self, path: &Path) -> Result<Vec<AudioTrack>, AudioError> {
        let output = Command::new(&self.ffprobe)
            .args(["-v", "error", "-print_format", "json", "-show_streams"])
            .args(["-select_streams", "a"])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| AudioError::ReadingFailed(format!("failed to spawn ffprobe: {e}")))?;

        if !output.status.success() {
            return Err(AudioError::ReadingFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        parse_probe_json(&output.stdout)
    }

    fn open_pcm(
        &self,
        path: &Path,
        track: &AudioTrack,
        format: &PcmFormat,
    ) -> Result<Box<dyn Read + Send>, AudioError> {
        let (muxer, codec) = format.ffmpeg_names().ok_or_else(|| {
            AudioError::ReadingFailed(format!("unsupported PCM layout: {format:?}"))
        })?;

        let mut child = Command::new(&self.ffmpeg)
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(path)
            .args(["-map", &format!("0:{}", track.index), "-vn"])
            .args(["-f", muxer, "-acodec", codec])
            .args(["-ac", &format.channels.to_string()])
            .args(["-ar", &format.sample_rate.to_string()])
            .arg("-")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AudioError::ReadingFailed(format!("failed to spawn ffmpeg: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AudioError::ReadingFailed("ffmpeg stdout not captured".into()))?;

        // Drain stderr on its own thread so a chatty decoder can never block
        // on a full pipe while we read stdout.
        let stderr_thread = child.stderr.take().map(|mut stderr| {
            std::thread::spawn(move || {
                let mut text = String::new();
                let _ = stderr.read_to_string(&mut text);
                text
            })
        });

        log::debug!("audio: decoding stream 0:{} of {}", track.index, path.display());

        Ok(Box::new(DecoderPipe {
            child,
            stdout,
            stderr_thread,
            finished: false,
        }))
    }
}

// ---------------------------------------------------------------------------
// DecoderPipe
// ---------------------------------------------------------------------------

/// Reader over the decoder's stdout.  At end of stream it reaps the process
/// and turns a non-zero exit into an I/O error.
struct DecoderPipe {
    child: Child,
    stdout: ChildStdout,
    stderr_thread: Option<JoinHandle<String>>,
    finished: bool,
}

impl Read for DecoderPipe {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.finished {
            return Ok(0);
        }

        let n = self.stdout.read(buf)?;
        if n > 0 || buf.is_empty() {
            return Ok(n);
        }

        self.finished = true;
        let status = self.child.wait()?;
        if status.success() {
            return Ok(0);
        }

        let stderr = self
            .stderr_thread
            .take()
            .and_then(|t| t.join().ok())
            .unwrap_or_default();
        Err(io::Error::new(
            io::ErrorKind::Other,
            format!("decoder exited with {status}: {}", stderr.trim()),
        ))
    }
}

impl Drop for DecoderPipe {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whisper_format_maps_to_s16le() {
        assert_eq!(
            PcmFormat::WHISPER.ffmpeg_names(),
            Some(("s16le", "pcm_s16le"))
        );
        assert_eq!(PcmFormat::WHISPER.sample_rate, 16_000);
        assert_eq!(PcmFormat::WHISPER.channels, 1);
    }

    #[test]
    fn float_layout_is_unsupported() {
        let fmt = PcmFormat {
            bit_depth: 24,
            ..PcmFormat::WHISPER
        };
        assert!(fmt.ffmpeg_names().is_none());
    }

    #[test]
    fn probe_json_with_two_tracks() {
        let json = br#"{
            "streams": [
                { "index": 1, "codec_name": "aac", "channels": 2, "sample_rate": "48000" },
                { "index": 2, "codec_name": "ac3", "channels": 6, "sample_rate": "44100" }
            ]
        }"#;
        let tracks = parse_probe_json(json).unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].index, 1);
        assert_eq!(tracks[0].codec.as_deref(), Some("aac"));
        assert_eq!(tracks[0].sample_rate, Some(48_000));
        assert_eq!(tracks[1].channels, Some(6));
    }

    #[test]
    fn probe_json_without_streams_is_empty() {
        assert!(parse_probe_json(b"{}").unwrap().is_empty());
        assert!(parse_probe_json(br#"{"streams": []}"#).unwrap().is_empty());
    }

    #[test]
    fn garbage_probe_output_is_reading_failure() {
        let err = parse_probe_json(b"not json").unwrap_err();
        assert!(matches!(err, AudioError::ReadingFailed(_)));
    }

    /// Fake `ffprobe` / `ffmpeg` shell scripts that ignore their arguments.
    #[cfg(unix)]
    fn scripted_decoder(dir: &Path, ffmpeg_body: &str) -> FfmpegDecoder {
        use std::os::unix::fs::PermissionsExt;

        let write_script = |name: &str, body: &str| {
            let path = dir.join(name);
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path.to_string_lossy().into_owned()
        };
        let ffprobe = write_script(
            "ffprobe",
            r#"echo '{"streams":[{"index":0,"codec_name":"aac","channels":2,"sample_rate":"44100"}]}'"#,
        );
        let ffmpeg = write_script("ffmpeg", ffmpeg_body);
        FfmpegDecoder::new(ffmpeg, ffprobe)
    }

    #[cfg(unix)]
    #[test]
    fn decoder_stdout_becomes_samples() {
        use crate::audio::AudioExtractor;
        use std::sync::Arc;

        let dir = tempfile::tempdir().unwrap();
        // 0x4000 = 16384, 0xC000 = -16384
        let decoder = scripted_decoder(dir.path(), r"printf '\000\100\000\300'");
        let buf = AudioExtractor::new(Arc::new(decoder))
            .extract(Path::new("clip.mp4"))
            .unwrap();
        assert_eq!(buf.as_slice(), &[0.5, -0.5][..]);
    }

    #[cfg(unix)]
    #[test]
    fn decoder_failing_exit_is_reading_failure() {
        use crate::audio::AudioExtractor;
        use std::sync::Arc;

        let dir = tempfile::tempdir().unwrap();
        let decoder = scripted_decoder(
            dir.path(),
            r"printf '\000\100'; echo 'Invalid data found when processing input' >&2; exit 1",
        );
        let err = AudioExtractor::new(Arc::new(decoder))
            .extract(Path::new("broken.mp4"))
            .unwrap_err();
        assert!(
            matches!(&err, AudioError::ReadingFailed(m)
                if m.contains("decoder exited") && m.contains("Invalid data found")),
            "{err:?}"
        );
    }

    #[test]
    fn missing_ffprobe_binary_is_reading_failure() {
        let decoder = FfmpegDecoder::new("ffmpeg", "/nonexistent/ffprobe-binary");
        let err = decoder
            .audio_tracks(Path::new("/nonexistent/input.mp4"))
            .unwrap_err();
        assert!(matches!(err, AudioError::ReadingFailed(_)));
    }
}
