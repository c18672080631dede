//! SubRip (`.srt`) text: formatting, parsing and saving.
//!
//! ```text
//! 1
//! 00:00:00,000 --> 00:00:02,500
//! Hello
//!
//! ```
//!
//! Times are carried in hundredths of a second, the unit the inference
//! engine reports, so the millisecond field always ends in `0`.

use std::fmt::Write as _;
use std::path::Path;

use thiserror::Error;

use crate::stt::Segment;

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// `HH:MM:SS,mmm` for a time in centiseconds.
pub fn format_timestamp(cs: u64) -> String {
    let hours = cs / 360_000;
    let minutes = (cs / 6_000) % 60;
    let seconds = (cs / 100) % 60;
    let millis = (cs % 100) * 10;
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

/// Render `segments` as SRT.  No segments → empty string.
pub fn format_srt(segments: &[Segment]) -> String {
    let mut out = String::new();
    for (i, seg) in segments.iter().enumerate() {
        // Writing into a String cannot fail.
        let _ = write!(
            out,
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            format_timestamp(seg.start_cs),
            format_timestamp(seg.end_cs),
            seg.text
        );
    }
    out
}

/// Write `srt` text to `path`, creating parent directories.
pub fn save_srt(path: &Path, srt: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, srt)
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Malformed SRT input.  `line` is 1-based.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SrtError {
    #[error("line {line}: expected a timestamp line containing '-->'")]
    MissingTimestamp { line: usize },

    #[error("line {line}: invalid timestamp '{value}'")]
    InvalidTimestamp { line: usize, value: String },

    #[error("line {line}: cue ends before it starts")]
    EndBeforeStart { line: usize },
}

/// Parse SRT text into segments, in file order.
///
/// The index line is optional, `.` is accepted in place of `,` and
/// multi-line cue text is joined with `\n`.  Sub-centisecond precision is
/// truncated.
pub fn parse_srt(input: &str) -> Result<Vec<Segment>, SrtError> {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);
    let mut lines = input.lines().enumerate().peekable();
    let mut segments = Vec::new();

    while let Some((idx, line)) = lines.next() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (time_no, time_line) = if line.contains("-->") {
            (idx + 1, line)
        } else {
            match lines.next() {
                Some((n, l)) if l.contains("-->") => (n + 1, l.trim()),
                Some((n, _)) => return Err(SrtError::MissingTimestamp { line: n + 1 }),
                None => return Err(SrtError::MissingTimestamp { line: idx + 2 }),
            }
        };

        let (start_raw, end_raw) = time_line
            .split_once("-->")
            .map(|(a, b)| (a.trim(), b.trim()))
            .ok_or(SrtError::MissingTimestamp { line: time_no })?;
        // Some writers append position hints after the end time.
        let end_raw = end_raw.split_whitespace().next().unwrap_or("");

        let start = parse_timestamp(start_raw).ok_or_else(|| SrtError::InvalidTimestamp {
            line: time_no,
            value: start_raw.to_string(),
        })?;
        let end = parse_timestamp(end_raw).ok_or_else(|| SrtError::InvalidTimestamp {
            line: time_no,
            value: end_raw.to_string(),
        })?;
        if end < start {
            return Err(SrtError::EndBeforeStart { line: time_no });
        }

        let mut text = Vec::new();
        while let Some((_, next)) = lines.peek() {
            if next.trim().is_empty() {
                break;
            }
            text.push(next.trim());
            lines.next();
        }

        segments.push(Segment::new(start, end, text.join("\n")));
    }

    Ok(segments)
}

/// `HH:MM:SS,mmm` (or `.mmm`, or no fraction) → centiseconds.
fn parse_timestamp(value: &str) -> Option<u64> {
    let (hms, frac) = match value.split_once([',', '.']) {
        Some((hms, frac)) => (hms, frac),
        None => (value, ""),
    };

    let mut parts = hms.split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: u64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || minutes >= 60 || seconds >= 60 {
        return None;
    }

    if !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let mut millis = frac.chars().take(3).collect::<String>();
    while millis.len() < 3 {
        millis.push('0');
    }
    let millis: u64 = millis.parse().ok()?;

    Some((hours * 3_600 + minutes * 60 + seconds) * 100 + millis / 10)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn timestamp_fields() {
        assert_eq!(format_timestamp(0), "00:00:00,000");
        assert_eq!(format_timestamp(250), "00:00:02,500");
        assert_eq!(format_timestamp(6_001), "00:01:00,010");
        assert_eq!(format_timestamp(360_000 + 59 * 6_000 + 5_999), "01:59:59,990");
        assert_eq!(format_timestamp(100 * 360_000), "100:00:00,000");
    }

    #[test]
    fn empty_input_is_empty_output() {
        assert_eq!(format_srt(&[]), "");
        assert_eq!(parse_srt("").unwrap(), Vec::new());
        assert_eq!(parse_srt("\n\n  \n").unwrap(), Vec::new());
    }

    #[test]
    fn hello_world_block_layout() {
        let srt = format_srt(&[Segment::new(0, 250, "Hello"), Segment::new(250, 500, "world")]);
        assert_eq!(
            srt,
            "1\n00:00:00,000 --> 00:00:02,500\nHello\n\n\
             2\n00:00:02,500 --> 00:00:05,000\nworld\n\n"
        );
    }

    #[test]
    fn format_then_parse_returns_the_same_segments() {
        let segments = vec![
            Segment::new(0, 0, ""),
            Segment::new(5, 137, "สวัสดีครับ"),
            Segment::new(137, 360_123, "two\nlines"),
            Segment::new(400_000, 400_050, "12"),
        ];
        assert_eq!(parse_srt(&format_srt(&segments)).unwrap(), segments);
    }

    #[test]
    fn parser_accepts_common_variations() {
        let input = "\u{feff}00:00:01.5 --> 00:00:03,250 X1:0 X2:10\r\nfirst\r\n\r\n\
                     7\n00:00:04,000 --> 00:00:05,009\n  padded  \n";
        let segments = parse_srt(input).unwrap();
        assert_eq!(
            segments,
            vec![Segment::new(150, 325, "first"), Segment::new(400, 500, "padded")]
        );
    }

    #[test]
    fn parser_reports_bad_lines() {
        assert_eq!(
            parse_srt("1\nnot a time\nx\n"),
            Err(SrtError::MissingTimestamp { line: 2 })
        );
        assert_eq!(
            parse_srt("1\n00:00:xx,000 --> 00:00:01,000\n"),
            Err(SrtError::InvalidTimestamp {
                line: 2,
                value: "00:00:xx,000".into()
            })
        );
        assert_eq!(
            parse_srt("00:00:02,000 --> 00:00:01,000\nx\n"),
            Err(SrtError::EndBeforeStart { line: 1 })
        );
        assert_eq!(parse_srt("1"), Err(SrtError::MissingTimestamp { line: 2 }));
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("exports/today/out.srt");
        let srt = format_srt(&[Segment::new(0, 100, "hi")]);
        save_srt(&path, &srt).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), srt);
    }
}
