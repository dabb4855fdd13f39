//! Data acquisition hardware
//!
//! Vendor drivers sit behind [`DaqBackend`]. Scanning a backend yields one
//! [`Channel`] per analog input with TEDS already decoded where the sensor
//! carries it. Measurements run through [`AcquisitionTask`]; [`ReplayTask`]
//! plays recorded data through the same interface.

mod channel;
mod replay;
mod task;

pub use channel::{Channel, ChannelInfo, ChannelInfoSource};
pub use replay::ReplayTask;
pub use task::{nearest_even_divisor, AcquisitionTask, TaskSettings, CALLBACK_TARGET};

use log::{debug, info, warn};
use thiserror::Error;

use crate::store::StoreError;
use crate::teds::TedsError;

#[derive(Error, Debug)]
pub enum HardwareError {
    #[error("TEDS error: {0}")]
    Teds(#[from] TedsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Channel {channel}: sensitivity must be positive, got {value}")]
    InvalidSensitivity { channel: String, value: f64 },

    #[error("Task has no channels")]
    NoChannels,

    #[error("Task '{0}' is already running")]
    AlreadyRunning(String),

    #[error("Task '{0}' is not running")]
    NotRunning(String),

    #[error("Requested {requested} samples, only {available} available")]
    Exhausted { requested: usize, available: usize },

    #[error("Backend error: {0}")]
    Backend(String),
}

/// An analog input device as reported by the driver
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    pub name: String,
    /// Input range in volts
    pub voltage_range: (f64, f64),
    /// Physical channel names
    pub channels: Vec<String>,
}

/// Driver seam for DAQ vendors
pub trait DaqBackend {
    fn devices(&self) -> Result<Vec<DeviceInfo>, HardwareError>;

    /// Raw TEDS bytes of a channel; `None` if no TEDS sensor is attached
    fn read_teds(&self, channel: &str) -> Result<Option<Vec<u8>>, HardwareError>;
}

/// Channels found on the connected hardware
#[derive(Debug, Clone, Default)]
pub struct Hardware {
    pub channels: Vec<Channel>,
}

impl Hardware {
    pub fn scan<B: DaqBackend + ?Sized>(backend: &B) -> Result<Self, HardwareError> {
        let mut channels = Vec::new();
        for device in backend.devices()? {
            debug!("Device {}: {} channels", device.name, device.channels.len());
            for name in &device.channels {
                let bytes = backend.read_teds(name)?;
                let mut channel = Channel::new(name.clone(), bytes.is_some(), device.voltage_range);
                if let Some(bytes) = bytes {
                    // a corrupt TEDS chip should not hide the channel
                    if let Err(e) = channel.set_channel_info(ChannelInfoSource::TedsBytes(bytes)) {
                        warn!("{}: unreadable TEDS: {}", name, e);
                    }
                }
                channels.push(channel);
            }
        }
        info!("Found {} channels", channels.len());
        Ok(Self { channels })
    }

    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.name == name)
    }

    pub fn channel_mut(&mut self, name: &str) -> Option<&mut Channel> {
        self.channels.iter_mut().find(|c| c.name == name)
    }

    /// Excitation and response channels in scan order
    pub fn split(&self) -> (Vec<&Channel>, Vec<&Channel>) {
        self.channels.iter().partition(|c| !c.is_resp)
    }
}
