//!Async modules around the pwmc drivers. A module owns a driver, exposes one `Output` per named channel, and runs a
//! task per channel that applies the values sent to it.

pub mod devices;
pub mod error;

use error::BuildError;
use std::{collections::HashMap, future::Future};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;

///Sending side of a module channel.
pub struct Output<T> {
    pub tx: mpsc::Sender<T>,
}

impl<T> Output<T> {
    pub fn new() -> (Self, mpsc::Receiver<T>) {
        let (tx, rx) = mpsc::channel(1);
        (Self { tx }, rx)
    }
    pub fn sink(&self) -> mpsc::Sender<T> {
        self.tx.clone()
    }
}

///The outputs and a join handle provided by a module.
///
///Callers should use `join_handle.await`
pub struct ModuleIO {
    pub join_handle: JoinHandle<()>,
    pub outputs: HashMap<String, Output<f64>>,
}

///Entity that constructs a module from its configuration, using some externally provided resource (an I2C bus).
pub trait ModuleBuilder {
    type Config;
    type Module: Into<ModuleIO>;

    fn try_build(
        &self,
        cfg: &Self::Config,
        cancel_token: CancellationToken,
    ) -> impl Future<Output = Result<Self::Module, BuildError>>;
}
