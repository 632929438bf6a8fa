//! Per-source listener loop.
//!
//! One listener task runs per configured source. Each pass it waits on the
//! monitor (bounded by the monitor's receive timeout), turns an interesting
//! message into a [`QsoRecord`] and hands it off: onto the dispatch queue, or
//! straight to the uploader in direct mode.
//!
//! A monitor error ends only this listener. Stop requests arrive through the
//! listener's own state channel or the pipeline-wide shutdown signal and are
//! checked before every receive.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::contract::{Monitor, MonitorMessage, QsoRecord, SourceKind, WsjtxEventKind};
use crate::normalize::normalize;
use crate::pipeline::PipelineStats;
use crate::queue::{EnqueueError, QueueProducer};
use crate::uploader::UploaderAdapter;

/// The N1MM+ monitor's "nothing arrived" marker.
pub const N1MM_TIMEOUT_MARKER: &str = "timeout";

/// Run state of one listener. Transitions: `Stopped -> Running -> Stopping -> Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Stopped,
    Running,
    Stopping,
}

/// Why a listener task returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerExit {
    /// A stop was requested.
    Stopped,
    /// The monitor reported an error.
    MonitorFailed { error: String },
}

pub(crate) enum Handoff {
    Queued(QueueProducer),
    Direct(Arc<UploaderAdapter>),
}

pub(crate) struct Listener {
    pub source: SourceKind,
    pub monitor: Box<dyn Monitor>,
    pub handoff: Handoff,
    pub state: Arc<watch::Sender<ListenerState>>,
    pub shutdown: watch::Receiver<bool>,
    pub stats: Arc<PipelineStats>,
}

/// Decide whether a monitor message carries a record for `source`.
///
/// N1MM+ messages are already record-shaped and pass through untouched
/// apart from the timeout marker. WSJT-X messages only count when tagged
/// as a logged ADIF record, and their payload goes through [`normalize`].
pub fn extract_record(source: SourceKind, message: &MonitorMessage) -> Option<QsoRecord> {
    match (source, message) {
        (_, MonitorMessage::NoEvent) => None,
        (SourceKind::N1mm, MonitorMessage::Text(text)) => {
            if text == N1MM_TIMEOUT_MARKER {
                return None;
            }
            QsoRecord::new(source, text.clone())
        }
        (SourceKind::Wsjtx, MonitorMessage::Wsjtx(event)) => {
            if event.kind != WsjtxEventKind::LoggedAdif {
                return None;
            }
            QsoRecord::new(source, normalize(&event.content))
        }
        (source, other) => {
            debug!(%source, message = ?other, "Ignoring message from unexpected source type");
            None
        }
    }
}

impl Listener {
    pub(crate) async fn run(mut self) -> ListenerExit {
        let source = self.source;
        info!(%source, "{source} logging thread starting.");
        let mut state_rx = self.state.subscribe();

        let exit = loop {
            if *self.shutdown.borrow_and_update() {
                break ListenerExit::Stopped;
            }
            if *state_rx.borrow_and_update() != ListenerState::Running {
                break ListenerExit::Stopped;
            }

            let received = tokio::select! {
                biased;
                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        break ListenerExit::Stopped;
                    }
                    continue;
                }
                _ = state_rx.changed() => continue,
                received = self.monitor.get_message() => received,
            };

            match received {
                Ok(message) => {
                    if let Some(record) = extract_record(source, &message) {
                        hand_off(&self.handoff, &self.stats, record).await;
                    }
                }
                Err(e) => {
                    warn!(%source, error = %e, "{source} monitor failed, listener stopping");
                    self.state.send_replace(ListenerState::Stopping);
                    break ListenerExit::MonitorFailed {
                        error: e.to_string(),
                    };
                }
            }
        };

        self.state.send_replace(ListenerState::Stopped);
        info!(%source, "{source} logging thread exiting.");
        exit
    }
}

/// Borrows only the handoff and counters, so the monitor is never held
/// across an upload.
async fn hand_off(handoff: &Handoff, stats: &PipelineStats, record: QsoRecord) {
    let source = record.source();
    match handoff {
        Handoff::Queued(producer) => match producer.try_enqueue(record) {
            Ok(()) => info!(%source, queued = producer.len(), "{source} QSO queued"),
            Err(EnqueueError::Full(record)) => {
                stats.record_dropped(1);
                warn!(%source, record = record.text(), "Queue full, {source} QSO not queued.");
            }
            Err(EnqueueError::Closed(record)) => {
                stats.record_dropped(1);
                warn!(%source, record = record.text(), "Queue closed, {source} QSO not queued.");
            }
        },
        Handoff::Direct(uploader) => {
            let delivery = uploader.deliver(&record).await;
            stats.record(&delivery);
        }
    }
}
