use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use waypost_common::observability::{LogConfig, init_logging};
use waypost_config::{WaypostConfig, WaypostConfigLoader, default_config_path};

use pipeline::Pipeline;
use scheduler::{Cadence, Scheduler};

mod pipeline;
mod scheduler;

/// Posts a random website to Twitter/X and Mastodon on a fixed cadence.
#[derive(Debug, Parser)]
#[command(name = "waypost", version, about)]
struct Cli {
    /// YAML configuration file. Without it, `waypost.yaml` is used when present.
    #[arg(long, short, env = "WAYPOST_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_path = init_logging(LogConfig::default())?;

    let loader = match &cli.config {
        Some(path) => WaypostConfigLoader::new().with_file(path),
        None => WaypostConfigLoader::new().with_optional_file(default_config_path()),
    };
    let cfg: WaypostConfig = loader.load().context("loading configuration")?;

    tracing::info!(
        mode = ?cfg.mode(),
        log = %log_path.display(),
        interval_hours = cfg.schedule.interval_hours,
        "waypost.start"
    );

    let pipeline = Pipeline::from_config(&cfg)?;
    let scheduler = Scheduler::new(Arc::new(pipeline), Cadence::from_config(&cfg));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("waypost.ctrl_c");
        }
        _ = scheduler.run_forever() => {}
    }
    Ok(())
}
