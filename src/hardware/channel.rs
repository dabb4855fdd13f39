// src/hardware/channel.rs
//
// Physical DAQ channels and the sensor information attached to them

use log::debug;
use std::path::PathBuf;

use super::HardwareError;
use crate::core::measurement::Direction;
use crate::teds::Teds;

/// Sensor description of a channel
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ChannelInfo {
    #[default]
    None,
    /// Decoded from hardware or virtual TEDS
    Teds(Teds),
    /// Entered by hand; limits in physical units
    Manual {
        sens_ref: f64,
        min_val: f64,
        max_val: f64,
    },
}

/// Where channel information comes from
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelInfoSource {
    /// TEDS bytes as returned by the driver
    TedsBytes(Vec<u8>),
    /// Virtual TEDS file with the NI preamble
    VirtualTedsFile(PathBuf),
    /// Sensitivity in V per physical unit
    Manual { sens_ref: f64, is_resp: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    /// Device qualified name, e.g. `Dev1/ai2`
    pub name: String,
    pub hw_teds: bool,
    /// Input range of the device in volts
    pub voltage_range: (f64, f64),
    pub is_resp: bool,
    pub direction: Direction,
    pub disp_name: String,
    pub info: ChannelInfo,
}

impl Channel {
    pub fn new(name: impl Into<String>, hw_teds: bool, voltage_range: (f64, f64)) -> Self {
        Self {
            name: name.into(),
            hw_teds,
            voltage_range,
            is_resp: false,
            direction: Direction::PlusZ,
            disp_name: String::new(),
            info: ChannelInfo::None,
        }
    }

    pub fn set_channel_info(&mut self, source: ChannelInfoSource) -> Result<(), HardwareError> {
        match source {
            ChannelInfoSource::TedsBytes(bytes) => {
                let teds = Teds::from_daq_bytes(&bytes)?;
                self.is_resp = teds.is_accelerometer();
                self.info = ChannelInfo::Teds(teds);
            }
            ChannelInfoSource::VirtualTedsFile(path) => {
                let teds = Teds::read_virtual_file(&path)?;
                self.is_resp = teds.is_accelerometer();
                self.info = ChannelInfo::Teds(teds);
            }
            ChannelInfoSource::Manual { sens_ref, is_resp } => {
                if !(sens_ref > 0.0) {
                    return Err(HardwareError::InvalidSensitivity {
                        channel: self.name.clone(),
                        value: sens_ref,
                    });
                }
                self.is_resp = is_resp;
                self.info = ChannelInfo::Manual {
                    sens_ref,
                    min_val: self.voltage_range.0 / sens_ref,
                    max_val: self.voltage_range.1 / sens_ref,
                };
            }
        }
        debug!("Channel {}: is_resp={} info={:?}", self.name, self.is_resp, self.info);
        Ok(())
    }

    /// Reference sensitivity from TEDS or manual entry
    pub fn sensitivity(&self) -> Option<f64> {
        match &self.info {
            ChannelInfo::None => None,
            ChannelInfo::Teds(teds) => teds.sensitivity(),
            ChannelInfo::Manual { sens_ref, .. } => Some(*sens_ref),
        }
    }

    /// Name shown to the user, falls back to the physical name
    pub fn label(&self) -> &str {
        if self.disp_name.is_empty() {
            &self.name
        } else {
            &self.disp_name
        }
    }
}
