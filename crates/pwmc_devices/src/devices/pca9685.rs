use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use embedded_hal::delay::DelayNs;
use futures::future::join_all;
use pwmc_core::{
    registers::{DEFAULT_ADDRESS, FREQUENCY_OSCILLATOR, MAX_TICKS},
    BusTransport, Channel, ClockSource, DeviceHandle, OutputDriver, Pca9685,
};
use serde::Deserialize;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{error::BuildError, ModuleBuilder, ModuleIO, Output};

use tracing::{debug, error, info, warn};

///How values sent to a channel are interpreted
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelMode {
    ///Duty cycle from 0.0 (off) to 1.0 (fully on)
    #[default]
    Duty,
    ///Pulse width in microseconds at the start of each cycle (servos). `invert` is ignored.
    Pulse,
}

//io level config -- corresponds to one pin on the pwm chip
#[derive(Debug, Deserialize, Clone)]
pub struct ChannelConfig {
    pub channel: u8,
    #[serde(default)]
    pub mode: ChannelMode,
    #[serde(default)]
    pub invert: bool,
    ///Value applied while the device is built
    #[serde(default)]
    pub start: Option<f64>,
}

fn default_bus() -> u8 {
    1
}

fn default_address() -> u8 {
    DEFAULT_ADDRESS
}

fn default_oscillator() -> u32 {
    FREQUENCY_OSCILLATOR
}

//system level config -- corresponds to 1 pwm chip instance
#[derive(Debug, Deserialize)]
pub struct Pca9685DeviceConfig {
    #[serde(default = "default_bus")]
    pub i2c_bus: u8,
    #[serde(default = "default_address")]
    pub i2c_address: u8,
    #[serde(default = "default_oscillator")]
    pub oscillator_hz: u32,
    #[serde(default)]
    pub clock: ClockSource,
    #[serde(default)]
    pub output: OutputDriver,
    #[serde(default)]
    pub channels: HashMap<String, ChannelConfig>,
}

impl Default for Pca9685DeviceConfig {
    fn default() -> Self {
        Self {
            i2c_bus: default_bus(),
            i2c_address: default_address(),
            oscillator_hz: default_oscillator(),
            clock: ClockSource::default(),
            output: OutputDriver::default(),
            channels: HashMap::new(),
        }
    }
}

//connected pwm chip instance
pub struct Pca9685Device {
    pub join_handle: JoinHandle<()>,
    pub channels: HashMap<String, Output<f64>>,
}

impl From<Pca9685Device> for ModuleIO {
    fn from(dev: Pca9685Device) -> Self {
        ModuleIO {
            join_handle: dev.join_handle,
            outputs: dev.channels,
        }
    }
}

///Ticks for a duty cycle between 0.0 and 1.0. Out of range values are clamped, NaN is off.
pub fn duty_ticks(value: f64) -> u16 {
    if value.is_nan() {
        0
    } else {
        (value.min(1.0).max(0.0) * MAX_TICKS as f64).round() as u16
    }
}

fn apply_value<B, D>(
    device: &mut Pca9685<B, D>,
    cfg: &ChannelConfig,
    value: f64,
) -> Result<(), pwmc_core::Error<B::Error>>
where
    B: BusTransport,
    D: DelayNs,
{
    match cfg.mode {
        ChannelMode::Duty => device.set_channel_value(cfg.channel, duty_ticks(value), cfg.invert),
        ChannelMode::Pulse => {
            let micros = if value.is_nan() { 0.0 } else { value.max(0.0).min(u32::MAX as f64) };
            device
                .set_pulse_microseconds(cfg.channel, micros as u32)
                .map(|_| ())
        }
    }
}

fn lock_and_apply<B, D>(device: &Mutex<Pca9685<B, D>>, cfg: &ChannelConfig, value: f64)
where
    B: BusTransport,
    D: DelayNs,
{
    let mut device = match device.lock() {
        Ok(device) => device,
        Err(poisoned) => poisoned.into_inner(),
    };
    if let Err(err) = apply_value(&mut device, cfg, value) {
        error!("error setting PCA9685 device output! {}", err);
    }
}

fn spawn_pca_output_task<B, D>(
    device: Arc<Mutex<Pca9685<B, D>>>,
    cfg: ChannelConfig,
    mut rx: mpsc::Receiver<f64>,
    cancel_token: CancellationToken,
) -> JoinHandle<()>
where
    B: BusTransport + Send + 'static,
    D: DelayNs + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => break,
                new_value = rx.recv() => match new_value {
                    Some(new_value) => lock_and_apply(&device, &cfg, new_value),
                    None => break,
                },
            }
        }
        debug!("Pca9685Device output task for channel {} shutting down.", cfg.channel)
    })
}

///Check every configured channel index, collecting all the bad ones
fn validate_channels(channels: &HashMap<String, ChannelConfig>) -> Result<(), BuildError> {
    let errs: Vec<BuildError> = channels
        .iter()
        .filter(|(_, c)| Channel::try_from(c.channel).is_err())
        .map(|(name, c)| {
            BuildError::from_string(format!(
                "PCA9685 channel {} has index {}, expected 0 to 15",
                name, c.channel
            ))
        })
        .collect();
    if errs.is_empty() {
        Ok(())
    } else {
        Err(BuildError::from_errs(errs))
    }
}

impl Pca9685Device {
    pub fn build<B, D>(
        config: &Pca9685DeviceConfig,
        bus: B,
        delay: D,
        cancel_token: CancellationToken,
    ) -> Result<Pca9685Device, BuildError>
    where
        B: BusTransport + Send + 'static,
        D: DelayNs + Send + 'static,
    {
        validate_channels(&config.channels)?;

        let handle = DeviceHandle::with_oscillator(config.i2c_address, config.oscillator_hz);
        let mut device = Pca9685::new(bus, delay, handle);

        device.begin(config.clock)?;
        device.set_output_mode(config.output)?;

        for (name, c) in &config.channels {
            if let Some(start) = c.start {
                debug!("PCA9685 channel {} starting at {}", name, start);
                apply_value(&mut device, c, start)?;
            }
        }

        info!(
            "PCA9685 at 0x{:02x} configured with {:?}, {} channels",
            config.i2c_address,
            config.clock,
            config.channels.len()
        );

        let device = Arc::new(Mutex::new(device));

        let mut channels = HashMap::with_capacity(config.channels.len());
        let mut join_handles: Vec<JoinHandle<()>> = Vec::with_capacity(config.channels.len());
        for (k, c) in &config.channels {
            let (output, out_rx) = Output::new();
            let join_handle =
                spawn_pca_output_task(device.clone(), c.clone(), out_rx, cancel_token.clone());
            channels.insert(k.to_string(), output);
            join_handles.push(join_handle);
        }

        let join_handle = tokio::spawn(async move {
            //with no channel tasks to drain, the chip stays awake until shutdown
            if join_handles.is_empty() {
                cancel_token.cancelled().await;
            }
            join_all(join_handles).await;
            let mut device = match device.lock() {
                Ok(device) => device,
                Err(poisoned) => poisoned.into_inner(),
            };
            match device.sleep() {
                Ok(_) => debug!("PCA9685 put to sleep on shutdown"),
                Err(err) => warn!("error putting PCA9685 to sleep on shutdown! {}", err),
            }
            debug!("pca 9685 tasks all done!")
        });

        Ok(Pca9685Device {
            join_handle,
            channels,
        })
    }
}

pub struct Pca9685DeviceBuilder<B, D, F, G>
where
    B: BusTransport + Send + 'static,
    D: DelayNs + Send + 'static,
    F: Fn(u8) -> Result<B, BuildError>,
    G: Fn() -> D,
{
    i2c_bus_provider: F,
    delay_provider: G,
}

impl<B, D, F, G> Pca9685DeviceBuilder<B, D, F, G>
where
    B: BusTransport + Send + 'static,
    D: DelayNs + Send + 'static,
    F: Fn(u8) -> Result<B, BuildError>,
    G: Fn() -> D,
{
    pub fn new(i2c_bus_provider: F, delay_provider: G) -> Pca9685DeviceBuilder<B, D, F, G> {
        Pca9685DeviceBuilder {
            i2c_bus_provider,
            delay_provider,
        }
    }
}

impl<B, D, F, G> ModuleBuilder for Pca9685DeviceBuilder<B, D, F, G>
where
    B: BusTransport + Send + 'static,
    D: DelayNs + Send + 'static,
    F: Fn(u8) -> Result<B, BuildError>,
    G: Fn() -> D,
{
    type Config = Pca9685DeviceConfig;
    type Module = Pca9685Device;

    async fn try_build(
        &self,
        cfg: &Pca9685DeviceConfig,
        cancel_token: CancellationToken,
    ) -> Result<Pca9685Device, BuildError> {
        let bus = (self.i2c_bus_provider)(cfg.i2c_bus)?;
        Pca9685Device::build(cfg, bus, (self.delay_provider)(), cancel_token)
    }
}
