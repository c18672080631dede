//! Burn job lifecycle through the public API.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use subburn::burn::{
    BurnError, BurnJob, BurnOrchestrator, BurnRequest, BurnStatus, TranscodeOutcome, Transcoder,
};
use subburn::subtitle::{format_srt, SubtitleStyle};
use subburn::stt::Segment;
use tempfile::{tempdir, TempDir};

/// Fake transcoder: on success copies the staged input to the output path.
struct FakeFfmpeg {
    succeed: bool,
}

#[async_trait]
impl Transcoder for FakeFfmpeg {
    async fn run(&self, args: &[String]) -> std::io::Result<TranscodeOutcome> {
        let input = &args[2];
        let filter = &args[4];
        let output = &args[args.len() - 1];
        assert!(filter.starts_with("subtitles='"));
        assert!(filter.contains(":force_style='FontSize=24,"));

        if !self.succeed {
            return Ok(TranscodeOutcome {
                success: false,
                code: Some(187),
                log: "[h264_videotoolbox] Error: cannot create compression session".into(),
            });
        }
        std::fs::copy(input, output)?;
        Ok(TranscodeOutcome {
            success: true,
            code: Some(0),
            log: String::new(),
        })
    }
}

struct Dirs {
    inputs: TempDir,
    output: TempDir,
    scratch: TempDir,
}

fn setup() -> (Dirs, BurnRequest) {
    let dirs = Dirs {
        inputs: tempdir().unwrap(),
        output: tempdir().unwrap(),
        scratch: tempdir().unwrap(),
    };
    let video = dirs.inputs.path().join("holiday.mp4");
    let subs = dirs.inputs.path().join("holiday.srt");
    std::fs::write(&video, b"fake mp4 bytes").unwrap();
    std::fs::write(&subs, format_srt(&[Segment::new(0, 250, "Hello")])).unwrap();
    let request = BurnRequest::new(video, subs, &SubtitleStyle::default());
    (dirs, request)
}

fn orchestrator(dirs: &Dirs, succeed: bool) -> BurnOrchestrator {
    BurnOrchestrator::new(Arc::new(FakeFfmpeg { succeed }), dirs.output.path())
        .with_temp_root(dirs.scratch.path())
}

fn is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir).unwrap().next().is_none()
}

#[tokio::test]
async fn successful_burn_produces_output_and_removes_temp_dir() {
    let (dirs, request) = setup();
    let (job, status) = BurnJob::new(request);

    let out = orchestrator(&dirs, true).run(&job).await.unwrap();

    assert_eq!(*status.borrow(), BurnStatus::Succeeded(out.clone()));
    assert_eq!(out.parent(), Some(dirs.output.path()));
    assert_eq!(std::fs::read(&out).unwrap(), b"fake mp4 bytes");
    assert!(is_empty(dirs.scratch.path()));
}

#[tokio::test]
async fn failed_burn_reports_log_and_still_cleans_up() {
    let (dirs, request) = setup();
    let (job, status) = BurnJob::new(request);

    let err = orchestrator(&dirs, false).run(&job).await.unwrap_err();

    assert!(matches!(&err, BurnError::BurnFailed(log) if log.contains("compression session")));
    assert_eq!(*status.borrow(), BurnStatus::Failed(err));
    assert!(is_empty(dirs.output.path()));
    assert!(is_empty(dirs.scratch.path()));
}

#[tokio::test]
async fn status_passes_through_every_phase() {
    let (dirs, request) = setup();
    let handle = orchestrator(&dirs, true).spawn(request);
    let mut rx = handle.status.clone();

    let mut seen = vec![rx.borrow().clone()];
    let watcher = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            seen.push(rx.borrow_and_update().clone());
        }
        seen
    });

    let out = handle.wait().await.unwrap();
    let seen = watcher.await.unwrap();

    // Intermediate states may be coalesced by the watch channel, but the
    // final state is always observed.
    assert_eq!(seen.last(), Some(&BurnStatus::Succeeded(out)));
}
