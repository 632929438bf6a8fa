//! Lifecycle coordinator: owns the listeners, the dispatch queue and the
//! main consumption loop.
//!
//! # Lifecycle
//! - [`Pipeline::spawn_listener`] moves a source from `Stopped` to `Running`
//!   on its own task. Monitors arrive already bound; binding is the
//!   caller's job and a bind failure must abort before anything is spawned.
//! - [`Pipeline::run`] drives the main loop until the stop future resolves
//!   or every listener has gone away, then performs [`Pipeline::shutdown`]:
//!   raise the shared shutdown signal, mark every listener `Stopping`, and
//!   join them all before returning.
//!
//! # Dispatch
//! - Queued: listeners `try_enqueue`; the main loop is the only consumer and
//!   idles for the configured interval whenever the queue is empty.
//! - Direct: listeners upload inline through the shared
//!   [`UploaderAdapter`]; the main loop only waits for a stop.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use futures::FutureExt;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::{DispatchMode, PipelineConfig};
use crate::contract::{Monitor, SourceKind, UploadOutcome};
use crate::error::PipelineError;
use crate::listener::{Handoff, Listener, ListenerExit, ListenerState};
use crate::queue::{dispatch_queue, QueueConsumer, QueueProducer};
use crate::uploader::{Delivery, UploaderAdapter};

/// Counters reported when the pipeline stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub delivered: u64,
    pub failed: u64,
    /// Records discarded because the queue was full, or still queued at shutdown.
    pub dropped: u64,
    pub dry_run: u64,
}

#[derive(Debug, Default)]
pub(crate) struct PipelineStats {
    delivered: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
    dry_run: AtomicU64,
}

impl PipelineStats {
    pub(crate) fn record(&self, delivery: &Delivery) {
        let counter = match delivery {
            Delivery::Uploaded(UploadOutcome::Delivered { .. }) => &self.delivered,
            Delivery::Uploaded(UploadOutcome::Failed { .. }) => &self.failed,
            Delivery::DryRun => &self.dry_run,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self, n: u64) {
        self.dropped.fetch_add(n, Ordering::Relaxed);
    }

    fn summary(&self) -> RunSummary {
        RunSummary {
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            dry_run: self.dry_run.load(Ordering::Relaxed),
        }
    }
}

/// Coordinator-side handle on one listener task.
pub struct ListenerHandle {
    source: SourceKind,
    state: Arc<watch::Sender<ListenerState>>,
    task: Option<JoinHandle<ListenerExit>>,
}

impl ListenerHandle {
    pub fn source(&self) -> SourceKind {
        self.source
    }

    pub fn state(&self) -> ListenerState {
        *self.state.borrow()
    }

    /// Clear the run flag. Idempotent; a listener that already stopped stays `Stopped`.
    pub fn stop(&self) {
        self.state.send_if_modified(|state| {
            if *state == ListenerState::Running {
                *state = ListenerState::Stopping;
                true
            } else {
                false
            }
        });
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }

    /// Wait for the task to return. `Ok(None)` if it was already joined.
    pub async fn join(&mut self) -> Result<Option<ListenerExit>, PipelineError> {
        let Some(task) = self.task.take() else {
            return Ok(None);
        };
        let joined = task.await;
        self.state.send_replace(ListenerState::Stopped);
        match joined {
            Ok(exit) => Ok(Some(exit)),
            Err(e) => Err(PipelineError::ListenerPanicked {
                kind: self.source,
                reason: e.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopExit {
    StopRequested,
    SourcesExhausted,
}

pub struct Pipeline {
    config: PipelineConfig,
    uploader: Arc<UploaderAdapter>,
    shutdown: Arc<watch::Sender<bool>>,
    listeners: Vec<ListenerHandle>,
    producer: Option<QueueProducer>,
    consumer: Option<QueueConsumer>,
    stats: Arc<PipelineStats>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, uploader: UploaderAdapter) -> Result<Self, PipelineError> {
        config.validate()?;
        let (producer, consumer) = match config.mode {
            DispatchMode::Queued => {
                let (producer, consumer) = dispatch_queue(config.queue_capacity);
                (Some(producer), Some(consumer))
            }
            DispatchMode::Direct => (None, None),
        };
        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            config,
            uploader: Arc::new(uploader),
            shutdown: Arc::new(shutdown),
            listeners: Vec::new(),
            producer,
            consumer,
            stats: Arc::new(PipelineStats::default()),
        })
    }

    pub fn mode(&self) -> DispatchMode {
        self.config.mode
    }

    pub fn listeners(&self) -> &[ListenerHandle] {
        &self.listeners
    }

    /// Start a listener task for an already-bound monitor. Must be called
    /// from within a Tokio runtime.
    pub fn spawn_listener(&mut self, source: SourceKind, monitor: Box<dyn Monitor>) {
        let handoff = match &self.producer {
            Some(producer) => Handoff::Queued(producer.clone()),
            None => Handoff::Direct(Arc::clone(&self.uploader)),
        };
        let (state, _) = watch::channel(ListenerState::Stopped);
        let state = Arc::new(state);
        state.send_replace(ListenerState::Running);

        let listener = Listener {
            source,
            monitor,
            handoff,
            state: Arc::clone(&state),
            shutdown: self.shutdown.subscribe(),
            stats: Arc::clone(&self.stats),
        };
        let task = tokio::spawn(listener.run());
        self.listeners.push(ListenerHandle {
            source,
            state,
            task: Some(task),
        });
    }

    /// Stop one listener and wait for it, leaving the others running.
    pub async fn stop_listener(
        &mut self,
        source: SourceKind,
    ) -> Result<Option<ListenerExit>, PipelineError> {
        let mut joined = None;
        for handle in self.listeners.iter_mut().filter(|h| h.source == source) {
            handle.stop();
            joined = handle.join().await?;
        }
        Ok(joined)
    }

    /// Run the main loop until `stop` resolves or no listener is left, then
    /// shut everything down. A panic in the main loop is re-raised only
    /// after every listener has been joined.
    pub async fn run<F>(mut self, stop: F) -> Result<RunSummary, PipelineError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        // Only listeners keep the queue open from here on, so it
        // disconnects once the last one exits.
        self.producer.take();

        let trigger = Arc::clone(&self.shutdown);
        let stop_task = tokio::spawn(async move {
            stop.await;
            info!("Stop requested");
            trigger.send_replace(true);
        });

        info!(
            mode = ?self.config.mode,
            listeners = self.listeners.len(),
            "Monitoring UDP ports for QSO messages."
        );
        let exit = AssertUnwindSafe(self.main_loop()).catch_unwind().await;
        stop_task.abort();
        match exit {
            Ok(LoopExit::StopRequested) => info!("Main loop stopping on request"),
            Ok(LoopExit::SourcesExhausted) => {
                warn!("All listeners have exited, main loop stopping")
            }
            Err(panic) => {
                error!("Main loop panicked, shutting down listeners");
                if let Err(e) = self.shutdown().await {
                    error!(error = %e, "Listener did not exit cleanly after main loop panic");
                }
                std::panic::resume_unwind(panic);
            }
        }

        self.shutdown().await?;
        let summary = self.stats.summary();
        info!(
            delivered = summary.delivered,
            failed = summary.failed,
            dropped = summary.dropped,
            dry_run = summary.dry_run,
            "Pipeline stopped"
        );
        Ok(summary)
    }

    async fn main_loop(&mut self) -> LoopExit {
        let mut shutdown_rx = self.shutdown.subscribe();
        let idle = self.config.idle_interval();
        loop {
            if *shutdown_rx.borrow_and_update() {
                return LoopExit::StopRequested;
            }

            match self.consumer.as_mut() {
                Some(consumer) => match consumer.try_dequeue() {
                    Ok(Some(record)) => {
                        let delivery = self.uploader.deliver(&record).await;
                        self.stats.record(&delivery);
                        continue;
                    }
                    Ok(None) => {}
                    Err(TryRecvError::Disconnected) => return LoopExit::SourcesExhausted,
                    Err(TryRecvError::Empty) => {}
                },
                None => {
                    if self.listeners.iter().all(ListenerHandle::is_finished) {
                        return LoopExit::SourcesExhausted;
                    }
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(idle) => {}
                _ = shutdown_rx.changed() => {}
            }
        }
    }

    /// Clear every run flag and join every listener. Records still queued
    /// are discarded. Safe to call more than once.
    pub async fn shutdown(&mut self) -> Result<(), PipelineError> {
        self.shutdown.send_replace(true);
        for handle in &self.listeners {
            handle.stop();
        }

        info!("Waiting for listeners to exit.");
        let results = join_all(self.listeners.iter_mut().map(ListenerHandle::join)).await;

        if let Some(consumer) = self.consumer.as_mut() {
            let discarded = consumer.drain();
            if discarded > 0 {
                warn!(discarded, "Discarding queued QSOs that were not logged");
                self.stats.record_dropped(discarded as u64);
            }
        }

        let mut first_error = None;
        for result in results {
            match result {
                Ok(Some(exit)) => info!(?exit, "Listener joined"),
                Ok(None) => {}
                Err(e) => {
                    error!(error = %e, "Listener did not exit cleanly");
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        // Listener tasks outlive a dropped pipeline unless told to stop.
        self.shutdown.send_replace(true);
    }
}
