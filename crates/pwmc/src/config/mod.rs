use config_rs::{Config, ConfigError, File};
use pwmc_core::sim::{NoDelay, SimulatedChip};
use pwmc_devices::{
    devices::pca9685::{ChannelMode, Pca9685DeviceBuilder, Pca9685DeviceConfig},
    error::BuildError,
    ModuleBuilder, ModuleIO,
};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Deserialize, Debug, Default)]
pub struct PwmcMetadataConfig {
    pub name: Option<String>,
    pub description: Option<String>,
}

///Where the PCA9685 is attached
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusConfig {
    ///A Raspberry Pi I2C bus, chosen by `device.i2c_bus`
    #[cfg(feature = "rpi")]
    Rpi,
    ///An in-memory chip answering on `device.i2c_address`, for dry runs
    Simulated,
}

impl BusConfig {
    pub async fn build(
        &self,
        device: &Pca9685DeviceConfig,
        cancel_token: CancellationToken,
    ) -> Result<ModuleIO, BuildError> {
        match self {
            #[cfg(feature = "rpi")]
            Self::Rpi => Pca9685DeviceBuilder::new(
                |bus| pwmc_rpi::get_bus(bus).map_err(BuildError::from),
                pwmc_rpi::get_delay,
            )
            .try_build(device, cancel_token)
            .await
            .map(|dev| dev.into()),
            Self::Simulated => {
                let chip = SimulatedChip::new(device.i2c_address);
                Pca9685DeviceBuilder::new(move |_| Ok(chip.clone()), || NoDelay)
                    .try_build(device, cancel_token)
                    .await
                    .map(|dev| dev.into())
            }
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct PwmcConfig {
    #[serde(default)]
    pub metadata: PwmcMetadataConfig,
    pub bus: BusConfig,
    #[serde(default)]
    pub device: Pca9685DeviceConfig,
}

impl PwmcConfig {
    ///Read a config file. The format is picked from the extension.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(path))
            .build()
            .and_then(|config| config.try_deserialize::<PwmcConfig>())
    }

    ///One line per configured channel, in channel order
    pub fn channel_summary(&self) -> Vec<String> {
        let mut channels: Vec<_> = self.device.channels.iter().collect();
        channels.sort_by(|(a_name, a), (b_name, b)| (a.channel, a_name).cmp(&(b.channel, b_name)));
        channels
            .into_iter()
            .map(|(name, c)| {
                let mut line = match c.mode {
                    ChannelMode::Duty => format!("channel {:>2} {}: duty", c.channel, name),
                    ChannelMode::Pulse => format!("channel {:>2} {}: pulse us", c.channel, name),
                };
                if c.invert && c.mode == ChannelMode::Duty {
                    line.push_str(", inverted");
                }
                if let Some(start) = c.start {
                    line.push_str(&format!(", starts at {}", start));
                }
                line
            })
            .collect()
    }

    ///Build the device, then run until ctrl-c. The chip is put to sleep before this returns.
    pub async fn start(self) -> Result<(), BuildError> {
        let cancel_token = CancellationToken::new();

        debug!("building PCA9685 on {:?} bus ...", self.bus);
        let ModuleIO {
            join_handle,
            outputs,
        } = self.bus.build(&self.device, cancel_token.clone()).await?;

        let mut names: Vec<&String> = outputs.keys().collect();
        names.sort();
        info!("got the following outputs: {:?}", names);

        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("unable to listen for shutdown signal, shutting down now: {}", err);
        }
        info!("shutting down ...");
        cancel_token.cancel();
        drop(outputs);

        join_handle
            .await
            .map_err(|err| BuildError::from_string(format!("PCA9685 task failed: {}", err)))
    }
}
