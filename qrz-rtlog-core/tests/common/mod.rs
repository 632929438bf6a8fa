#![allow(dead_code)]

use std::cell::Cell;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use qrz_rtlog_core::contract::{
    LogbookClient, Monitor, MonitorMessage, UploadResult, WsjtxEvent, WsjtxEventKind,
};
use qrz_rtlog_core::error::{MonitorError, UploadError};

/// Replays a fixed script, then behaves like an idle socket: every call
/// waits one receive timeout and reports `NoEvent`.
pub struct ScriptedMonitor {
    script: VecDeque<Result<MonitorMessage, MonitorError>>,
    receive_timeout: Duration,
    last: Option<MonitorMessage>,
    pub polls: Arc<AtomicUsize>,
    /// Set once the owning listener task has dropped the monitor.
    pub released: Arc<AtomicBool>,
}

impl ScriptedMonitor {
    pub fn new(
        script: Vec<Result<MonitorMessage, MonitorError>>,
        receive_timeout: Duration,
    ) -> Self {
        Self {
            script: script.into(),
            receive_timeout,
            last: None,
            polls: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Script the given messages followed by a receive failure, so the
    /// listener exits once it has seen everything.
    pub fn finite(messages: Vec<MonitorMessage>) -> Self {
        let mut script: Vec<_> = messages.into_iter().map(Ok).collect();
        script.push(Err(closed_socket()));
        Self::new(script, Duration::from_millis(20))
    }

    pub fn idle(receive_timeout: Duration) -> Self {
        Self::new(Vec::new(), receive_timeout)
    }
}

#[async_trait]
impl Monitor for ScriptedMonitor {
    async fn get_message(&mut self) -> Result<MonitorMessage, MonitorError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        match self.script.pop_front() {
            Some(Ok(message)) => {
                self.last = Some(message.clone());
                Ok(message)
            }
            Some(Err(e)) => Err(e),
            None => {
                tokio::time::sleep(self.receive_timeout).await;
                self.last = Some(MonitorMessage::NoEvent);
                Ok(MonitorMessage::NoEvent)
            }
        }
    }

    fn last_message(&self) -> Option<MonitorMessage> {
        self.last.clone()
    }
}

impl Drop for ScriptedMonitor {
    fn drop(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

/// A monitor that is `Send` but not `Sync`, like one holding a `Cell`.
pub struct UnsharedMonitor {
    inner: ScriptedMonitor,
    seen: Cell<usize>,
}

impl UnsharedMonitor {
    pub fn new(inner: ScriptedMonitor) -> Self {
        Self {
            inner,
            seen: Cell::new(0),
        }
    }
}

#[async_trait]
impl Monitor for UnsharedMonitor {
    async fn get_message(&mut self) -> Result<MonitorMessage, MonitorError> {
        self.seen.set(self.seen.get() + 1);
        self.inner.get_message().await
    }

    fn last_message(&self) -> Option<MonitorMessage> {
        self.inner.last_message()
    }
}

pub fn closed_socket() -> MonitorError {
    MonitorError::Receive(std::io::Error::new(
        std::io::ErrorKind::ConnectionAborted,
        "socket closed",
    ))
}

pub fn logged_adif(payload: &[u8]) -> MonitorMessage {
    MonitorMessage::Wsjtx(WsjtxEvent {
        kind: WsjtxEventKind::LoggedAdif,
        id: "WSJT-X".to_string(),
        content: payload.to_vec(),
    })
}

pub fn wsjtx_event(kind: WsjtxEventKind) -> MonitorMessage {
    MonitorMessage::Wsjtx(WsjtxEvent {
        kind,
        id: "WSJT-X".to_string(),
        content: Vec::new(),
    })
}

pub fn accepted() -> UploadResult {
    UploadResult {
        count: 1,
        status: true,
        info: String::new(),
    }
}

/// Logbook client that takes a while per upload and records how many
/// uploads overlapped.
#[derive(Default)]
pub struct SlowClient {
    pub delay: Duration,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub uploaded: Mutex<Vec<String>>,
}

impl SlowClient {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }
}

#[async_trait]
impl LogbookClient for SlowClient {
    async fn upload(&self, record: &str) -> Result<UploadResult, UploadError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.uploaded.lock().unwrap().push(record.to_string());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(accepted())
    }
}
