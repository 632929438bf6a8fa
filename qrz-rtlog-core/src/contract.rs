//! # contract: interfaces consumed by the logging pipeline
//!
//! The pipeline owns no network code of its own. It talks to two kinds of
//! collaborators through the traits in this module:
//!
//! - a [`Monitor`] per source application, which listens on a UDP endpoint
//!   and hands back one [`MonitorMessage`] per receive call, and
//! - a [`LogbookClient`], which submits one record to the remote logbook and
//!   reports an [`UploadResult`].
//!
//! ## Mocking & Testing
//! - Both traits are annotated for `mockall` so tests can script monitors and
//!   logbook responses without sockets or HTTP.
//!
//! ## Adding New Sources
//! - Extend [`SourceKind`] and teach [`crate::listener`] how to classify the
//!   new source's messages.

use std::fmt;

use async_trait::async_trait;

use mockall::{automock, predicate::*};

use crate::error::{MonitorError, UploadError};

/// The application a record or listener belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// N1MM+ contest logger.
    N1mm,
    /// WSJT-X digital mode application.
    Wsjtx,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::N1mm => f.write_str("N1MM+"),
            SourceKind::Wsjtx => f.write_str("WSJT-X"),
        }
    }
}

/// One completed contact, ready for upload.
///
/// The text is never empty after trimming. Records are not mutated once
/// built and carry no identity beyond their content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QsoRecord {
    source: SourceKind,
    text: String,
}

impl QsoRecord {
    /// Returns `None` when `text` is blank.
    pub fn new(source: SourceKind, text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return None;
        }
        Some(Self { source, text })
    }

    pub fn source(&self) -> SourceKind {
        self.source
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

/// WSJT-X UDP message types, numbered as on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WsjtxEventKind {
    Heartbeat,
    Status,
    Decode,
    Clear,
    QsoLogged,
    Close,
    /// A complete ADIF record for a contact the operator just logged.
    LoggedAdif,
    Other(u32),
}

impl From<u32> for WsjtxEventKind {
    fn from(value: u32) -> Self {
        match value {
            0 => WsjtxEventKind::Heartbeat,
            1 => WsjtxEventKind::Status,
            2 => WsjtxEventKind::Decode,
            3 => WsjtxEventKind::Clear,
            5 => WsjtxEventKind::QsoLogged,
            6 => WsjtxEventKind::Close,
            12 => WsjtxEventKind::LoggedAdif,
            other => WsjtxEventKind::Other(other),
        }
    }
}

/// A tagged WSJT-X event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsjtxEvent {
    pub kind: WsjtxEventKind,
    /// Client id of the sending WSJT-X instance.
    pub id: String,
    /// Raw payload; for [`WsjtxEventKind::LoggedAdif`] this is the ADIF text,
    /// which is not guaranteed to be valid UTF-8.
    pub content: Vec<u8>,
}

/// What a single [`Monitor::get_message`] call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorMessage {
    /// A record-shaped text payload (N1MM+).
    Text(String),
    /// The receive timed out without a real event.
    NoEvent,
    Wsjtx(WsjtxEvent),
}

/// Listens on one source application's network endpoint.
///
/// `get_message` blocks for at most the monitor's receive timeout. An `Err`
/// means the monitor can no longer be used and ends the owning listener.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Monitor: Send {
    async fn get_message(&mut self) -> Result<MonitorMessage, MonitorError>;

    /// The most recent message returned by `get_message`, if any.
    fn last_message(&self) -> Option<MonitorMessage>;
}

/// Raw result reported by the remote logbook for one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    /// Number of records the service accepted.
    pub count: i64,
    /// Service-level status flag.
    pub status: bool,
    /// Human-readable diagnostic text.
    pub info: String,
}

/// Success/failure classification of an [`UploadResult`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Delivered { info: String },
    Failed { count: i64, info: String },
}

impl UploadResult {
    /// A count of exactly one is the only success.
    pub fn outcome(&self) -> UploadOutcome {
        if self.count == 1 {
            UploadOutcome::Delivered {
                info: self.info.clone(),
            }
        } else {
            UploadOutcome::Failed {
                count: self.count,
                info: self.info.clone(),
            }
        }
    }
}

impl UploadOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, UploadOutcome::Delivered { .. })
    }
}

/// Submits records to the remote logbook service.
///
/// Implementations are not assumed to tolerate concurrent calls; the
/// pipeline serializes every call through [`crate::uploader::UploaderAdapter`].
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait LogbookClient: Send + Sync {
    async fn upload(&self, record: &str) -> Result<UploadResult, UploadError>;
}
