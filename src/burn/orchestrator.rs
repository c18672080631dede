//! Runs burn jobs: stage → transcode → move result → clean up.
//!
//! # Staging layout
//!
//! ```text
//! <tmp>/subburn-XXXXXX/
//!     input.<ext>    copy of the source video
//!     subs.srt       copy of the subtitle file
//!     output.mp4     written by the transcoder
//! ```
//!
//! Fixed names keep user paths (quotes, colons, spaces) out of the filter
//! expression.  The directory is removed before the job reports a terminal
//! status, on success and on failure.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use tempfile::TempDir;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::access::{AccessGuard, NoScopedAccess, ScopedAccess};
use super::job::{BurnError, BurnJob, BurnRequest, BurnStatus};
use super::transcoder::{TranscodeCommand, Transcoder};
use crate::config::BurnConfig;

const STAGED_SUBTITLES: &str = "subs.srt";
const STAGED_OUTPUT: &str = "output.mp4";
const OUTPUT_PREFIX: &str = "burned_output_";

/// Shared, cloneable burn runner.
#[derive(Clone)]
pub struct BurnOrchestrator {
    transcoder: Arc<dyn Transcoder>,
    access: Arc<dyn ScopedAccess>,
    output_dir: PathBuf,
    video_encoder: String,
    video_bitrate: String,
    temp_root: Option<PathBuf>,
}

impl std::fmt::Debug for BurnOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BurnOrchestrator")
            .field("output_dir", &self.output_dir)
            .field("video_encoder", &self.video_encoder)
            .field("video_bitrate", &self.video_bitrate)
            .finish_non_exhaustive()
    }
}

/// A spawned burn: live status plus the final result.
pub struct BurnHandle {
    pub status: watch::Receiver<BurnStatus>,
    task: JoinHandle<Result<PathBuf, BurnError>>,
}

impl BurnHandle {
    /// Wait for the job to finish.
    pub async fn wait(self) -> Result<PathBuf, BurnError> {
        self.task
            .await
            .map_err(|e| BurnError::BurnFailed(format!("burn task aborted: {e}")))?
    }
}

impl BurnOrchestrator {
    pub fn new(transcoder: Arc<dyn Transcoder>, output_dir: impl Into<PathBuf>) -> Self {
        let defaults = BurnConfig::default();
        Self {
            transcoder,
            access: Arc::new(NoScopedAccess),
            output_dir: output_dir.into(),
            video_encoder: defaults.video_encoder,
            video_bitrate: defaults.video_bitrate,
            temp_root: None,
        }
    }

    /// Encoder and bitrate from `[burn]` settings.
    pub fn with_config(mut self, config: &BurnConfig) -> Self {
        self.video_encoder = config.video_encoder.clone();
        self.video_bitrate = config.video_bitrate.clone();
        self
    }

    pub fn with_access(mut self, access: Arc<dyn ScopedAccess>) -> Self {
        self.access = access;
        self
    }

    /// Create working directories under `root` instead of the system temp
    /// directory.
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(root.into());
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Run `request` on the tokio runtime and return immediately.
    pub fn spawn(&self, request: BurnRequest) -> BurnHandle {
        let (job, status) = BurnJob::new(request);
        let this = self.clone();
        let task = tokio::spawn(async move { this.run(&job).await });
        BurnHandle { status, task }
    }

    /// Run `request` to completion.
    ///
    /// The job runs in its own task: dropping this future stops waiting but
    /// the transcoder still finishes and the staging directory is still
    /// cleaned up.
    pub async fn burn(&self, request: BurnRequest) -> Result<PathBuf, BurnError> {
        self.spawn(request).wait().await
    }

    /// Drive `job` through its whole state machine.
    ///
    /// Always ends with the job in `Succeeded` or `Failed`, and the staging
    /// directory removed.
    pub async fn run(&self, job: &BurnJob) -> Result<PathBuf, BurnError> {
        let result = self.run_inner(job).await;
        match &result {
            Ok(path) => {
                log::info!("burn: finished → {}", path.display());
                job.set_status(BurnStatus::Succeeded(path.clone()));
            }
            Err(e) => {
                log::error!("burn: {e}");
                job.set_status(BurnStatus::Failed(e.clone()));
            }
        }
        result
    }

    async fn run_inner(&self, job: &BurnJob) -> Result<PathBuf, BurnError> {
        let request = job.request();
        validate_input(&request.video, "video")?;
        validate_input(&request.subtitles, "subtitle")?;

        // ── staging ──────────────────────────────────────────────────────
        job.set_status(BurnStatus::Staging);
        let work_dir = self.create_work_dir()?;
        log::info!("burn: staging in {}", work_dir.path().display());

        let outcome = self.stage_and_transcode(job, work_dir.path()).await;

        // ── cleanup ──────────────────────────────────────────────────────
        let dir_path = work_dir.path().to_path_buf();
        if let Err(e) = work_dir.close() {
            log::warn!("burn: could not remove {}: {e}", dir_path.display());
        }

        outcome
    }

    fn create_work_dir(&self) -> Result<TempDir, BurnError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("subburn-");
        let dir = match &self.temp_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        };
        dir.map_err(|e| BurnError::FileSetupFailed(format!("could not create working directory: {e}")))
    }

    async fn stage_and_transcode(&self, job: &BurnJob, work: &Path) -> Result<PathBuf, BurnError> {
        let request = job.request();

        let staged_video = work.join(staged_video_name(&request.video));
        let staged_subs = work.join(STAGED_SUBTITLES);
        let staged_output = work.join(STAGED_OUTPUT);

        self.copy_in(&request.video, &staged_video).await?;
        self.copy_in(&request.subtitles, &staged_subs).await?;

        // ── running ──────────────────────────────────────────────────────
        job.set_status(BurnStatus::Running);
        let command = TranscodeCommand {
            input: staged_video,
            subtitles: staged_subs,
            output: staged_output.clone(),
            style: request.style.clone(),
            video_encoder: self.video_encoder.clone(),
            video_bitrate: self.video_bitrate.clone(),
        };
        log::debug!("burn: command: {}", command.to_command_string());

        let outcome = self
            .transcoder
            .run(&command.args())
            .await
            .map_err(|e| BurnError::BurnFailed(format!("could not start transcoder: {e}")))?;

        if !outcome.success {
            let detail = if outcome.log.trim().is_empty() {
                format!("transcoder exited with code {:?}", outcome.code)
            } else {
                outcome.log
            };
            return Err(BurnError::BurnFailed(detail));
        }
        if !staged_output.is_file() {
            return Err(BurnError::BurnFailed(
                "transcoder reported success but wrote no output".into(),
            ));
        }

        // ── result ───────────────────────────────────────────────────────
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| BurnError::FileSetupFailed(format!("could not create {}: {e}", self.output_dir.display())))?;
        let dest = claim_output_path(&self.output_dir, Local::now())
            .await
            .map_err(|e| BurnError::FileSetupFailed(format!("could not reserve output name: {e}")))?;
        if let Err(e) = move_file(&staged_output, &dest).await {
            let _ = tokio::fs::remove_file(&dest).await;
            return Err(BurnError::FileSetupFailed(format!(
                "could not move output to {}: {e}",
                dest.display()
            )));
        }
        Ok(dest)
    }

    /// Copy one input, holding its access grant only for the copy.
    async fn copy_in(&self, src: &Path, dst: &Path) -> Result<(), BurnError> {
        let _grant = AccessGuard::acquire(self.access.as_ref(), src);
        tokio::fs::copy(src, dst).await.map(drop).map_err(|e| {
            BurnError::FileSetupFailed(format!("could not copy {}: {e}", src.display()))
        })
    }
}

fn validate_input(path: &Path, what: &str) -> Result<(), BurnError> {
    if path.as_os_str().is_empty() {
        return Err(BurnError::FileSetupFailed(format!("no {what} file selected")));
    }
    if !path.is_file() {
        return Err(BurnError::FileSetupFailed(format!(
            "{what} file not found: {}",
            path.display()
        )));
    }
    Ok(())
}

/// `input.<ext>` keeping an alphanumeric source extension, `input.mp4`
/// otherwise.
fn staged_video_name(src: &Path) -> String {
    let ext = src
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "mp4".into());
    format!("input.{ext}")
}

/// Reserve `burned_output_<YYYYmmdd_HHMMSS>.mp4` in `dir`, suffixed `_2`,
/// `_3`, … when taken.
///
/// The name is claimed by creating an empty file with `create_new`, so two
/// jobs finishing in the same second never get the same path.  The caller
/// moves its output over the placeholder.
pub async fn claim_output_path(dir: &Path, now: DateTime<Local>) -> io::Result<PathBuf> {
    let stamp = now.format("%Y%m%d_%H%M%S");
    for n in 1u32..=u32::MAX {
        let name = match n {
            1 => format!("{OUTPUT_PREFIX}{stamp}.mp4"),
            n => format!("{OUTPUT_PREFIX}{stamp}_{n}.mp4"),
        };
        let candidate = dir.join(name);
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
            .await
        {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
    Err(io::Error::new(io::ErrorKind::AlreadyExists, "no free output name"))
}

/// Rename, falling back to copy + remove across filesystems.  `dst` may be
/// an existing placeholder and is replaced.
async fn move_file(src: &Path, dst: &Path) -> io::Result<()> {
    if tokio::fs::rename(src, dst).await.is_ok() {
        return Ok(());
    }
    if let Err(e) = tokio::fs::copy(src, dst).await {
        let _ = tokio::fs::remove_file(dst).await;
        return Err(e);
    }
    tokio::fs::remove_file(src).await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
