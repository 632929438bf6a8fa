use anyhow::Result;
use clap::Parser;
use qrz_rtlog::cli::{run, usage, Cli};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // RUST_LOG wins over -v.
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if cli.help {
        print!("{}", usage());
        std::process::exit(1);
    }
    if cli.config.is_none() {
        println!("No YAML configuration file specified.");
        print!("{}", usage());
        std::process::exit(1);
    }

    tracing::info!(dry_run = cli.dry_run, direct = cli.direct, "CLI arguments parsed, invoking run");
    let result = run(cli).await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "qrz-rtlog exited with error");
    }
    result.map(|_| ())
}
