// ─── Update Events ───
// Progress and status notifications pushed to whatever shell observes the
// cycle. Emitting never blocks the transfer or extraction loop.

use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::core::downloader::DownloadProgress;

/// Stages of one update cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStage {
    Planned,
    Downloading,
    Extracting,
    SyncingConfig,
    Persisting,
    Done,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum UpdateEvent {
    Stage(CycleStage),
    Status(String),
    Download(DownloadProgress),
    /// Extraction percentage, 0..=100.
    Extraction(u8),
}

/// Cheap, cloneable handle used to publish [`UpdateEvent`]s.
///
/// Backed by an unbounded channel: a slow observer only grows the queue and
/// a dropped observer turns every emit into a no-op.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<UnboundedSender<UpdateEvent>>,
}

impl EventSink {
    pub fn new(tx: UnboundedSender<UpdateEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A sink nobody listens to.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn channel() -> (Self, UnboundedReceiver<UpdateEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn emit(&self, event: UpdateEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }

    pub fn stage(&self, stage: CycleStage) {
        self.emit(UpdateEvent::Stage(stage));
    }

    pub fn status(&self, message: impl Into<String>) {
        self.emit(UpdateEvent::Status(message.into()));
    }

    pub fn download(&self, progress: DownloadProgress) {
        self.emit(UpdateEvent::Download(progress));
    }

    pub fn extraction(&self, percent: u8) {
        self.emit(UpdateEvent::Extraction(percent.min(100)));
    }
}
