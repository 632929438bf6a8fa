//! Command-line surface for qrz-rtlog.
//!
//! [`Cli`] mirrors the classic `qrz-rtlog [-dhv] <yml_file>` usage plus a
//! `--direct` switch for inline uploads. [`run`] wires the YAML config, the
//! QRZ client and the UDP monitors into a core [`Pipeline`] and drives it
//! until Ctrl-C. Pipeline behaviour itself lives in `qrz-rtlog-core`.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use qrz_rtlog_core::config::DispatchMode;
use qrz_rtlog_core::contract::SourceKind;
use qrz_rtlog_core::pipeline::{Pipeline, RunSummary};
use qrz_rtlog_core::uploader::UploaderAdapter;
use tracing::{error, info};

use crate::load_config::{load_config, CliConfig};
use crate::monitor::UdpMonitor;
use crate::upload::QrzClient;

pub const PROGRAM: &str = "qrz-rtlog";

/// Perform real-time QSO logging to QRZ.com from supported applications.
#[derive(Parser, Debug, Default)]
#[command(name = "qrz-rtlog", version, disable_help_flag = true)]
pub struct Cli {
    /// Dry run only, do not log the QSO (used for test and debug)
    #[arg(short = 'd', long = "dry-run", conflicts_with = "direct")]
    pub dry_run: bool,

    /// Print usage and exit
    #[arg(short = 'h', long = "help")]
    pub help: bool,

    /// Print verbose debug messages
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Upload from the listeners instead of through the dispatch queue
    #[arg(long)]
    pub direct: bool,

    /// YAML configuration file
    #[arg(value_name = "yml_file")]
    pub config: Option<PathBuf>,
}

pub fn usage() -> String {
    format!(
        "Usage: {PROGRAM} [-dhv] [--direct] <yml_file>\n\
         Perform real-time QSO logging to QRZ.com from supported applications.\n\
         <yml_file> is a YAML configuration file.\n\
         Options:\n\
         \x20 -d = Dryrun only, do not log the QSO (used for test and debug)\n\
         \x20 -h = Print this message and exit\n\
         \x20 -v = Print verbose debug messages\n\
         \x20 --direct = Upload from the listeners instead of the dispatch queue\n"
    )
}

/// Run until Ctrl-C.
pub async fn run(cli: Cli) -> Result<RunSummary> {
    run_until(cli, interrupted()).await
}

/// Run until `stop` resolves or every listener has exited.
pub async fn run_until<F>(cli: Cli, stop: F) -> Result<RunSummary>
where
    F: Future<Output = ()> + Send + 'static,
{
    let Some(config_path) = cli.config.as_ref() else {
        return Err(anyhow::anyhow!("No YAML configuration file specified."));
    };
    let mut config = load_config(config_path)?;
    if cli.direct {
        config.pipeline.mode = DispatchMode::Direct;
    }
    if cli.dry_run {
        info!("Dryrun mode, no QSOs will be logged");
    }

    let client = QrzClient::new(
        &config.qrz.call,
        config.qrz.api_key(),
        cli.verbose,
        config.qrz.url.as_deref(),
    )?;

    // Every port is bound before any listener starts.
    let monitors = bind_monitors(&config).await?;

    let mut pipeline = Pipeline::new(
        config.pipeline.clone(),
        UploaderAdapter::new(Arc::new(client), cli.dry_run),
    )?;
    for (source, monitor) in monitors {
        pipeline.spawn_listener(source, Box::new(monitor));
    }

    let summary = pipeline.run(stop).await?;
    info!(?summary, "{PROGRAM} exiting.");
    Ok(summary)
}

/// Bind one monitor per configured source, WSJT-X first.
pub async fn bind_monitors(config: &CliConfig) -> Result<Vec<(SourceKind, UdpMonitor)>> {
    let mut bound = Vec::new();
    for (source, endpoint) in config.endpoints() {
        match UdpMonitor::bind(source, endpoint).await {
            Ok(monitor) => bound.push((source, monitor)),
            Err(e) => {
                error!(%source, error = %e, "{source} bind error");
                return Err(anyhow::anyhow!("{source} bind error: {e}"));
            }
        }
    }
    Ok(bound)
}

async fn interrupted() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Keyboard interrupt"),
        Err(e) => {
            error!(error = %e, "Cannot listen for Ctrl-C, running until all listeners exit");
            std::future::pending::<()>().await;
        }
    }
}
