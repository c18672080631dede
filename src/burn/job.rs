//! Burn job request, status and errors.
//!
//! ```text
//! Pending ─▶ Staging ─▶ Running ─▶ Succeeded(path)
//!               │          │
//!               └──────────┴─────▶ Failed(error)
//! ```

use std::path::PathBuf;

use thiserror::Error;
use tokio::sync::watch;

use crate::subtitle::SubtitleStyle;

// ---------------------------------------------------------------------------
// BurnError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BurnError {
    /// Inputs were missing or could not be staged, or the result could not
    /// be moved into place.
    #[error("Failed to set up files: {0}")]
    FileSetupFailed(String),

    /// The transcoder reported failure; carries its log output.
    #[error("Burning failed: {0}")]
    BurnFailed(String),
}

// ---------------------------------------------------------------------------
// BurnStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BurnStatus {
    #[default]
    Pending,
    Staging,
    Running,
    Succeeded(PathBuf),
    Failed(BurnError),
}

impl BurnStatus {
    pub fn label(&self) -> &'static str {
        match self {
            BurnStatus::Pending => "Pending",
            BurnStatus::Staging => "Preparing files...",
            BurnStatus::Running => "Burning subtitles...",
            BurnStatus::Succeeded(_) => "Done",
            BurnStatus::Failed(_) => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BurnStatus::Succeeded(_) | BurnStatus::Failed(_))
    }
}

// ---------------------------------------------------------------------------
// BurnRequest / BurnJob
// ---------------------------------------------------------------------------

/// Inputs for one burn.  The style is a snapshot taken when the request is
/// built.
#[derive(Debug, Clone, PartialEq)]
pub struct BurnRequest {
    pub video: PathBuf,
    pub subtitles: PathBuf,
    pub style: SubtitleStyle,
}

impl BurnRequest {
    pub fn new(video: impl Into<PathBuf>, subtitles: impl Into<PathBuf>, style: &SubtitleStyle) -> Self {
        Self {
            video: video.into(),
            subtitles: subtitles.into(),
            style: style.clamped(),
        }
    }
}

/// One burn in flight.  Status changes are published on a watch channel;
/// only the job itself writes to it.
#[derive(Debug)]
pub struct BurnJob {
    request: BurnRequest,
    status: watch::Sender<BurnStatus>,
}

impl BurnJob {
    /// New job in [`BurnStatus::Pending`] plus a receiver for its status.
    pub fn new(request: BurnRequest) -> (Self, watch::Receiver<BurnStatus>) {
        let (status, rx) = watch::channel(BurnStatus::Pending);
        (Self { request, status }, rx)
    }

    pub fn request(&self) -> &BurnRequest {
        &self.request
    }

    pub fn status(&self) -> BurnStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<BurnStatus> {
        self.status.subscribe()
    }

    pub(crate) fn set_status(&self, status: BurnStatus) {
        log::debug!("burn: status -> {}", status.label());
        // send_replace never fails, even with no receivers left.
        self.status.send_replace(status);
    }
}
