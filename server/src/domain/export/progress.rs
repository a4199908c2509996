//! Export progress hand-off
//!
//! The pipeline runs on a worker thread and reports through
//! `ProgressObserver`. `ChannelObserver` forwards every event over an
//! unbounded channel, so the receiving side owns all presentation state.

use std::path::PathBuf;

use tokio::sync::mpsc;

use super::sink::SinkStrategy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportEvent {
    Started {
        strategy: SinkStrategy,
        /// `None` when the size is unknown (indeterminate progress)
        estimate: Option<u64>,
    },
    Progress {
        rows_written: u64,
        total: Option<u64>,
    },
    FileFinished {
        path: PathBuf,
        rows: u64,
    },
}

/// Receives export events from the worker thread
pub trait ProgressObserver: Send + Sync {
    fn on_event(&self, event: ExportEvent);

    fn on_progress(&self, rows_written: u64, total: Option<u64>) {
        self.on_event(ExportEvent::Progress {
            rows_written,
            total,
        });
    }
}

pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<ExportEvent>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::UnboundedSender<ExportEvent>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ExportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl ProgressObserver for ChannelObserver {
    fn on_event(&self, event: ExportEvent) {
        // A dropped receiver only means nobody is watching
        if self.tx.send(event).is_err() {
            tracing::trace!("Progress receiver dropped");
        }
    }
}
