//! Bounded FIFO between the listener tasks and the single uploading consumer.
//!
//! Producers never wait: when the queue is full the record is handed back
//! and the caller logs and drops it. The consumer only polls; the main loop
//! does its own bounded idling so shutdown stays responsive.

use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};

use crate::contract::QsoRecord;

#[derive(Debug, thiserror::Error)]
pub enum EnqueueError {
    #[error("dispatch queue full")]
    Full(QsoRecord),
    #[error("dispatch queue closed")]
    Closed(QsoRecord),
}

impl EnqueueError {
    pub fn into_record(self) -> QsoRecord {
        match self {
            EnqueueError::Full(record) | EnqueueError::Closed(record) => record,
        }
    }
}

/// Producer half, cloned into every listener.
#[derive(Debug, Clone)]
pub struct QueueProducer {
    tx: mpsc::Sender<QsoRecord>,
}

/// Consumer half, owned by the main loop.
#[derive(Debug)]
pub struct QueueConsumer {
    rx: mpsc::Receiver<QsoRecord>,
}

/// Build a queue holding at most `capacity` records. `capacity` must be non-zero.
pub fn dispatch_queue(capacity: usize) -> (QueueProducer, QueueConsumer) {
    let (tx, rx) = mpsc::channel(capacity);
    (QueueProducer { tx }, QueueConsumer { rx })
}

impl QueueProducer {
    pub fn try_enqueue(&self, record: QsoRecord) -> Result<(), EnqueueError> {
        self.tx.try_send(record).map_err(|err| match err {
            TrySendError::Full(record) => EnqueueError::Full(record),
            TrySendError::Closed(record) => EnqueueError::Closed(record),
        })
    }

    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

impl QueueConsumer {
    /// `Ok(None)` when nothing is ready. `Err(Disconnected)` once every
    /// producer is gone and the queue has been drained.
    pub fn try_dequeue(&mut self) -> Result<Option<QsoRecord>, TryRecvError> {
        match self.rx.try_recv() {
            Ok(record) => Ok(Some(record)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Drop everything still queued, returning how many records were discarded.
    pub fn drain(&mut self) -> usize {
        let mut dropped = 0;
        while let Ok(Some(_)) = self.try_dequeue() {
            dropped += 1;
        }
        dropped
    }
}
