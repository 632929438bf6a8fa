use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::PipelineError;

/// Records held by the dispatch queue before listeners start dropping.
pub const DEFAULT_QUEUE_CAPACITY: usize = 20;
/// Seconds the main loop idles when the dispatch queue is empty.
pub const DEFAULT_IDLE_INTERVAL_SECS: f64 = 5.0;

/// How listeners hand records to the uploader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Listeners enqueue; the main loop is the only uploader.
    #[default]
    Queued,
    /// Listeners upload inline, one call at a time.
    Direct,
}

/// A UDP endpoint a monitor binds to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub ip: String,
    pub port: u16,
    /// Receive timeout in seconds.
    pub timeout: f64,
}

impl EndpointConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    /// Saturates instead of panicking on a value `validate` would reject.
    pub fn receive_timeout(&self) -> Duration {
        positive_secs(self.timeout).unwrap_or(Duration::MAX)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if positive_secs(self.timeout).is_none() {
            return Err(PipelineError::InvalidConfig(format!(
                "receive timeout for {} must be a positive number of seconds, got {}",
                self.address(),
                self.timeout
            )));
        }
        Ok(())
    }

    pub fn trace_loaded(&self, source: &str) {
        info!(
            source,
            address = %self.address(),
            timeout_secs = self.timeout,
            "Loaded source endpoint"
        );
    }
}

/// Settings for the pipeline core itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub mode: DispatchMode,
    pub queue_capacity: usize,
    /// Idle interval in seconds.
    pub idle_interval: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: DispatchMode::Queued,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            idle_interval: DEFAULT_IDLE_INTERVAL_SECS,
        }
    }
}

impl PipelineConfig {
    /// Saturates instead of panicking on a value `validate` would reject.
    pub fn idle_interval(&self) -> Duration {
        positive_secs(self.idle_interval).unwrap_or(Duration::MAX)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.queue_capacity == 0 {
            return Err(PipelineError::InvalidConfig(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        if positive_secs(self.idle_interval).is_none() {
            return Err(PipelineError::InvalidConfig(format!(
                "idle_interval must be a positive number of seconds, got {}",
                self.idle_interval
            )));
        }
        Ok(())
    }

    pub fn trace_loaded(&self) {
        info!(
            mode = ?self.mode,
            queue_capacity = self.queue_capacity,
            idle_interval_secs = self.idle_interval,
            "Loaded pipeline config"
        );
        debug!(?self, "Pipeline config loaded (full debug)");
    }
}

/// `None` unless `secs` is above zero and fits in a `Duration`.
fn positive_secs(secs: f64) -> Option<Duration> {
    if secs <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(secs).ok()
}
