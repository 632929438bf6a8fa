//! Error types shared by the pipeline and its collaborators.

use crate::contract::SourceKind;

/// Failure reported by a [`crate::contract::Monitor`].
///
/// A bind failure is fatal at startup; any other variant terminates only
/// the listener that observed it.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("cannot bind {endpoint}: {source}")]
    Bind {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid endpoint {endpoint}: {reason}")]
    Endpoint { endpoint: String, reason: String },
    #[error("receive failed: {0}")]
    Receive(#[from] std::io::Error),
}

/// Failure reported by a [`crate::contract::LogbookClient`] before any
/// result could be read from the remote service.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected response: {0}")]
    Response(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
    #[error("{kind} listener panicked: {reason}")]
    ListenerPanicked { kind: SourceKind, reason: String },
}
