//! Single entry point into the remote logbook client.
//!
//! Every upload in the process goes through one [`UploaderAdapter`]. The
//! adapter holds an async mutex around the client, so even when listeners
//! upload inline (direct dispatch) the client only ever sees one call at a
//! time. It adds no logic beyond that and the success/failure reporting.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::contract::{LogbookClient, QsoRecord, UploadOutcome};

/// What happened to a record handed to [`UploaderAdapter::deliver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Uploaded(UploadOutcome),
    /// Dry-run mode: the record was reported and never sent.
    DryRun,
}

pub struct UploaderAdapter {
    client: Arc<dyn LogbookClient>,
    gate: Mutex<()>,
    dry_run: bool,
}

impl UploaderAdapter {
    pub fn new(client: Arc<dyn LogbookClient>, dry_run: bool) -> Self {
        Self {
            client,
            gate: Mutex::new(()),
            dry_run,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Upload one record and classify the result.
    ///
    /// A transport error counts as a failed upload with zero records
    /// delivered. Nothing is retried.
    pub async fn upload(&self, record: &QsoRecord) -> UploadOutcome {
        let _serialized = self.gate.lock().await;
        debug!(source = %record.source(), record = record.text(), "Uploading QSO");
        match self.client.upload(record.text()).await {
            Ok(result) => {
                debug!(
                    count = result.count,
                    status = result.status,
                    info = %result.info,
                    "Logbook responded"
                );
                result.outcome()
            }
            Err(e) => UploadOutcome::Failed {
                count: 0,
                info: e.to_string(),
            },
        }
    }

    /// Upload (or, in dry-run mode, just print) a record and report the
    /// outcome to the operator.
    pub async fn deliver(&self, record: &QsoRecord) -> Delivery {
        if self.dry_run {
            info!(source = %record.source(), "Dryrun mode, {} QSO not logged", record.source());
            println!("{}", record.text());
            return Delivery::DryRun;
        }
        let outcome = self.upload(record).await;
        report(record, &outcome);
        Delivery::Uploaded(outcome)
    }
}

fn report(record: &QsoRecord, outcome: &UploadOutcome) {
    match outcome {
        UploadOutcome::Delivered { .. } => {
            info!(source = %record.source(), "{} QSO logged", record.source());
        }
        UploadOutcome::Failed { count, info } => {
            warn!(
                source = %record.source(),
                count,
                record = record.text(),
                "{} QSO NOT logged: {}",
                record.source(),
                info
            );
        }
    }
}
