use anyhow::Result;
use clap::Parser;
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tagpick_cli::logging;
use tagpick_controller::{
    arm_driver::SerialArmDriver,
    config::TagpickConfig,
    mission::{Mission, MissionOutcome},
    pose_source::HttpPoseSource,
};

#[derive(Parser)]
#[command(author, version)]
struct Args {
    /// Serial port to use
    #[arg()]
    port: Option<String>,

    /// Pose service URL
    #[arg(long)]
    pose_url: Option<String>,

    /// Config file (json or yaml), defaults to the built-in calibration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Sets the level of verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn load_config(args: &Args) -> Result<TagpickConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = path.to_string_lossy();
            if text.ends_with(".yaml") || text.ends_with(".yml") {
                TagpickConfig::load_yaml(&text)?
            } else {
                TagpickConfig::load_json(&text)?
            }
        }
        None => TagpickConfig::included(),
    };
    if let Some(port) = &args.port {
        config.serial.port = port.clone();
    }
    if let Some(url) = &args.pose_url {
        config.pose_service.url = url.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::setup_tracing(args.verbose);

    let config = load_config(&args)?;

    let driver = SerialArmDriver::new(&config.serial.port, config.serial.baud_rate)?;
    tracing::info!("arm connected on {}", config.serial.port);
    let poses = HttpPoseSource::new(
        &config.pose_service.url,
        config.pose_service.request_timeout(),
    )?;

    let shutdown = Arc::new(AtomicBool::new(false));

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to wait for Ctrl+c");
            tracing::info!("Detected Ctrl+c");
            shutdown.store(true, Ordering::Release);
        }
    });

    let mut mission = Mission::new(driver, Box::new(poses), config, shutdown);
    match mission.run().await? {
        MissionOutcome::Completed => tracing::info!("pick and place completed"),
        MissionOutcome::Interrupted => tracing::info!("stopped by operator"),
    }

    Ok(())
}
