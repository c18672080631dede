//! Transcoder invocation: command construction and the process seam.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;

use crate::subtitle::{escape_filter_path, SubtitleStyle};

// ---------------------------------------------------------------------------
// TranscodeCommand
// ---------------------------------------------------------------------------

/// Everything needed to burn one subtitle file into one video.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeCommand {
    pub input: PathBuf,
    pub subtitles: PathBuf,
    pub output: PathBuf,
    pub style: SubtitleStyle,
    /// `-c:v` value, e.g. `h264_videotoolbox`.
    pub video_encoder: String,
    /// `-b:v` value, e.g. `5M`.
    pub video_bitrate: String,
}

impl TranscodeCommand {
    /// `subtitles='<path>':force_style='<override>'`.
    pub fn filter(&self) -> String {
        format!(
            "subtitles='{}':force_style='{}'",
            escape_filter_path(&self.subtitles.to_string_lossy()),
            self.style.translate()
        )
    }

    /// Argument vector, without the program name.
    ///
    /// Overwrite, input, subtitle filter, hardware encoder at a fixed
    /// bitrate, audio stream copied untouched, output.
    pub fn args(&self) -> Vec<String> {
        vec![
            "-y".into(),
            "-i".into(),
            self.input.to_string_lossy().into_owned(),
            "-vf".into(),
            self.filter(),
            "-c:v".into(),
            self.video_encoder.clone(),
            "-b:v".into(),
            self.video_bitrate.clone(),
            "-c:a".into(),
            "copy".into(),
            self.output.to_string_lossy().into_owned(),
        ]
    }

    /// Single-line shell-style rendering, for logs and `--dry-run`.
    pub fn to_command_string(&self) -> String {
        format!(
            "-y -i \"{}\" -vf \"{}\" -c:v {} -b:v {} -c:a copy \"{}\"",
            self.input.display(),
            self.filter(),
            self.video_encoder,
            self.video_bitrate,
            self.output.display()
        )
    }
}

// ---------------------------------------------------------------------------
// Transcoder
// ---------------------------------------------------------------------------

/// What the transcoder reported when it finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeOutcome {
    pub success: bool,
    /// Exit code; `None` when killed by a signal.
    pub code: Option<i32>,
    /// Captured diagnostic output.
    pub log: String,
}

/// The external video transcoder.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Run with `args` and wait for completion.  `Err` only when the
    /// process could not be started or awaited.
    async fn run(&self, args: &[String]) -> std::io::Result<TranscodeOutcome>;
}

/// Runs the `ffmpeg` binary as a child process.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: PathBuf,
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn run(&self, args: &[String]) -> std::io::Result<TranscodeOutcome> {
        log::info!("burn: {} {}", self.program.display(), args.join(" "));

        let output = tokio::process::Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            // Jobs run in their own task, so this only fires when the
            // runtime shuts down mid-job and would otherwise orphan ffmpeg.
            .kill_on_drop(true)
            .output()
            .await?;

        let log = String::from_utf8_lossy(&output.stderr).into_owned();
        for line in log.lines().filter(|l| !l.trim().is_empty()) {
            log::debug!("burn: ffmpeg: {line}");
        }

        Ok(TranscodeOutcome {
            success: output.status.success(),
            code: output.status.code(),
            log,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subtitle::{Alignment, Rgb};

    fn command(subs: &str) -> TranscodeCommand {
        TranscodeCommand {
            input: "/tmp/job/input.mp4".into(),
            subtitles: subs.into(),
            output: "/tmp/job/output.mp4".into(),
            style: SubtitleStyle::default(),
            video_encoder: "h264_videotoolbox".into(),
            video_bitrate: "5M".into(),
        }
    }

    #[test]
    fn argument_vector_layout() {
        let args = command("/tmp/job/subs.srt").args();
        assert_eq!(
            args,
            [
                "-y",
                "-i",
                "/tmp/job/input.mp4",
                "-vf",
                "subtitles='/tmp/job/subs.srt':force_style='FontSize=24,PrimaryColour=&H00FFFFFF,\
                 Alignment=2,MarginV=20,Outline=1,OutlineColour=&H00000000,BorderStyle=1'",
                "-c:v",
                "h264_videotoolbox",
                "-b:v",
                "5M",
                "-c:a",
                "copy",
                "/tmp/job/output.mp4",
            ]
        );
    }

    #[test]
    fn command_string_quotes_paths() {
        let mut cmd = command("/tmp/job/subs.srt");
        cmd.style = SubtitleStyle::new(30, 0, Rgb::new(0, 0, 255), Alignment::TopCenter);
        let s = cmd.to_command_string();
        assert!(s.starts_with("-y -i \"/tmp/job/input.mp4\" -vf \"subtitles='/tmp/job/subs.srt'"));
        assert!(s.contains("PrimaryColour=&H00FF0000,Alignment=6,MarginV=0"));
        assert!(s.ends_with("-c:v h264_videotoolbox -b:v 5M -c:a copy \"/tmp/job/output.mp4\""));
    }

    #[test]
    fn quoted_subtitle_path_has_no_bare_quote_in_filter() {
        let filter = command("/tmp/it's here/sub's.srt").filter();
        let path_part = filter
            .strip_prefix("subtitles='")
            .and_then(|rest| rest.split_once("':force_style="))
            .map(|(p, _)| p)
            .unwrap();
        assert_eq!(path_part, "/tmp/it\\'s here/sub\\'s.srt");
        let bytes = path_part.as_bytes();
        for (i, &b) in bytes.iter().enumerate() {
            if b == b'\'' {
                assert_eq!(bytes[i - 1], b'\\');
            }
        }
    }

    #[tokio::test]
    async fn missing_binary_is_an_io_error() {
        let t = FfmpegTranscoder::new("/nonexistent/ffmpeg-binary");
        assert!(t.run(&["-version".into()]).await.is_err());
    }
}
