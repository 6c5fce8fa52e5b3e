pub mod config;

use std::process::ExitCode;

use config::PwmcConfig;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pwmc=debug,pwmc_core=info,pwmc_devices=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cfg_name = match args.as_slice() {
        [cfg_name] => cfg_name,
        _ => {
            error!("usage: pwmc <config.yaml>, got {:?}", args);
            return ExitCode::from(2);
        }
    };

    let config = match PwmcConfig::load(cfg_name) {
        Ok(config) => config,
        Err(err) => {
            error!("Failed to parse config {}: {}", cfg_name, err);
            return ExitCode::FAILURE;
        }
    };

    info!("pwmc starting up!");
    if let Some(ref name) = config.metadata.name {
        info!("name: {name}")
    }
    if let Some(ref descrip) = config.metadata.description {
        info!("description: {descrip}")
    }
    info!(
        "PCA9685 at 0x{:02x} on {:?} bus {}, clock {:?}",
        config.device.i2c_address, config.bus, config.device.i2c_bus, config.device.clock
    );
    for line in config.channel_summary() {
        info!("{line}");
    }

    match config.start().await {
        Ok(_) => {
            info!("pwmc shut down!");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("pwmc exited with an error: {}", err);
            ExitCode::FAILURE
        }
    }
}
