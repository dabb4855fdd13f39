//! IEEE 1451.4 Transducer Electronic Data Sheets
//!
//! Decodes the TEDS a sensor carries (read through the DAQ driver as a byte
//! list) or ships as a virtual TEDS file, and encodes it back.
//!
//! Supported templates:
//! - 25: accelerometer / force (accelerometer variants only)
//! - 36: thermocouple

mod bits;
mod element;
mod template;

pub use bits::{bits_from_daq_bytes, BitReader, BitWriter};
pub use element::{teds_epoch, ElementKind, TedsValue};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use template::FieldSpec;

/// NI prefixes virtual TEDS files with this 40 bit marker (MSB first)
pub const NI_PREAMBLE: u64 = 0xDA6E_0CCC_BA;
pub const NI_PREAMBLE_BITS: usize = 40;

#[derive(Error, Debug)]
pub enum TedsError {
    #[error("TEDS stream ended at bit {position}: wanted {wanted} bits, {available} left")]
    UnexpectedEnd {
        wanted: usize,
        position: usize,
        available: usize,
    },

    #[error("Field width of {0} bits is not supported")]
    FieldTooWide(usize),

    #[error("Preamble {found:#x} does not match the NI default")]
    PreambleMismatch { found: u64 },

    #[error("Unsupported TEDS template {0}")]
    UnsupportedTemplate(u64),

    #[error("Unsupported template variant: {0}")]
    UnsupportedVariant(&'static str),

    #[error("Value {value} does not fit in {bits} bits")]
    ValueOutOfRange { value: f64, bits: usize },

    #[error("Text '{text}' exceeds {max} characters")]
    TextTooLong { text: String, max: usize },

    #[error("Character '{0}' cannot be encoded")]
    InvalidCharacter(char),

    #[error("Field kind {kind} cannot hold value {value}")]
    KindMismatch { kind: String, value: String },

    #[error("Virtual TEDS byte {byte:#04x} at offset {offset} is not a bit")]
    InvalidVirtualByte { byte: u8, offset: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One decoded TEDS field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TedsField {
    pub name: String,
    pub value: TedsValue,
    #[serde(skip)]
    kind: Option<ElementKind>,
}

impl TedsField {
    pub fn kind(&self) -> Option<ElementKind> {
        self.kind
    }
}

/// A decoded standard TEDS, fields kept in stream order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Teds {
    pub fields: Vec<TedsField>,
}

impl Teds {
    /// Decode a TEDS bit stream.
    ///
    /// Virtual TEDS files written by NI tools carry a preamble that is not
    /// part of the standard; set `has_preamble` to verify and skip it.
    pub fn parse(bits: Vec<bool>, has_preamble: bool) -> Result<Self, TedsError> {
        let mut reader = BitReader::new(bits);
        let mut teds = Teds::default();

        if has_preamble {
            let found = reader.read_uint_msb(NI_PREAMBLE_BITS)?;
            if found != NI_PREAMBLE {
                return Err(TedsError::PreambleMismatch { found });
            }
        }

        teds.process(&mut reader, template::BASIC)?;
        teds.check_basic();

        let template_id = teds.uint("template_id").unwrap_or_default();
        match template_id {
            template::ACCEL_FORCE_TEMPLATE => teds.accelerometer_force(&mut reader)?,
            template::THERMOCOUPLE_TEMPLATE => {
                teds.process(&mut reader, template::THERMOCOUPLE)?
            }
            other => return Err(TedsError::UnsupportedTemplate(other)),
        }

        teds.process(&mut reader, template::CALIBRATION)?;
        debug!(
            "Decoded TEDS template {} with {} fields ({} of {} bits used)",
            template_id,
            teds.fields.len(),
            reader.position(),
            reader.len()
        );
        Ok(teds)
    }

    /// Decode the byte list a DAQ driver reports for a hardware TEDS channel
    pub fn from_daq_bytes(bytes: &[u8]) -> Result<Self, TedsError> {
        Self::parse(bits_from_daq_bytes(bytes), false)
    }

    /// Read a virtual TEDS file: one byte (0 or 1) per bit, NI preamble first
    pub fn read_virtual_file<P: AsRef<Path>>(path: P) -> Result<Self, TedsError> {
        let bytes = fs::read(path.as_ref())?;
        let bits = bytes
            .iter()
            .enumerate()
            .map(|(offset, &byte)| match byte {
                0 => Ok(false),
                1 => Ok(true),
                _ => Err(TedsError::InvalidVirtualByte { byte, offset }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::parse(bits, true)
    }

    /// Write the TEDS as a virtual TEDS file including the NI preamble
    pub fn write_virtual_file<P: AsRef<Path>>(&self, path: P) -> Result<(), TedsError> {
        let mut writer = BitWriter::new();
        writer.push_uint_msb(NI_PREAMBLE, NI_PREAMBLE_BITS)?;
        writer.extend(self.encode()?);
        let bytes: Vec<u8> = writer.into_bits().into_iter().map(u8::from).collect();
        fs::write(path.as_ref(), bytes)?;
        Ok(())
    }

    /// Encode every non-constant field back into a bit stream
    pub fn to_bits(&self) -> Result<Vec<bool>, TedsError> {
        Ok(self.encode()?.into_bits())
    }

    fn encode(&self) -> Result<BitWriter, TedsError> {
        let mut writer = BitWriter::new();
        for field in &self.fields {
            if let Some(kind) = field.kind {
                kind.encode(&field.value, &mut writer)?;
            }
        }
        Ok(writer)
    }

    fn process(&mut self, reader: &mut BitReader, specs: &[FieldSpec]) -> Result<(), TedsError> {
        for (name, kind) in specs {
            let value = kind.decode(reader)?;
            self.fields.push(TedsField {
                name: (*name).to_string(),
                value,
                kind: Some(*kind),
            });
        }
        Ok(())
    }

    fn check_basic(&self) {
        if self.uint("version_number") != Some(2) {
            warn!("Sensor utilizes legacy TEDS format");
        }
    }

    fn accelerometer_force(&mut self, reader: &mut BitReader) -> Result<(), TedsError> {
        self.process(reader, template::ACCEL_FORCE_SELECT)?;

        let force = self.uint("acceleration_force").unwrap_or_default();
        let extended = self.uint("extended_functionality").unwrap_or_default();
        match (force, extended) {
            (0, 0) => self.process(reader, template::ACCELEROMETER)?,
            (0, _) => self.process(reader, template::ACCELEROMETER_EXTENDED)?,
            (_, 0) => return Err(TedsError::UnsupportedVariant("force sensor")),
            _ => return Err(TedsError::UnsupportedVariant("extended force sensor")),
        }

        self.process(reader, template::ACCEL_FORCE_COMMON)?;
        if self.uint("transfer_function") == Some(1) {
            self.process(reader, template::TRANSFER_FUNCTION)?;
        }
        self.process(reader, template::ACCEL_FORCE_REFERENCE)
    }

    pub fn get(&self, name: &str) -> Option<&TedsValue> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    /// Replace the value of an existing field, returns false if absent
    pub fn set(&mut self, name: &str, value: TedsValue) -> bool {
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(field) => {
                field.value = value;
                true
            }
            None => false,
        }
    }

    pub fn uint(&self, name: &str) -> Option<u64> {
        match self.get(name)? {
            TedsValue::UInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn float(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            TedsValue::Float(v) => Some(*v),
            TedsValue::UInt(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            TedsValue::Text(s) | TedsValue::Constant(s) => Some(s),
            _ => None,
        }
    }

    /// Template 25 with the acceleration bit cleared
    pub fn is_accelerometer(&self) -> bool {
        self.uint("template_id") == Some(template::ACCEL_FORCE_TEMPLATE)
            && self.uint("acceleration_force") == Some(0)
    }

    /// Reference sensitivity in V per engineering unit
    pub fn sensitivity(&self) -> Option<f64> {
        self.float("sens_ref").or_else(|| self.float("sens_ref_01"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    /// Accelerometer TEDS (template 25, no extended functionality)
    fn accelerometer_bits(version: u64, transfer_function: bool) -> BitWriter {
        let mut w = BitWriter::new();
        w.push_uint(43, 14).unwrap(); // manufacturer
        w.push_uint(1234, 15).unwrap();
        w.push_uint(1, 5).unwrap();
        w.push_uint(version, 6).unwrap();
        w.push_uint(98765, 24).unwrap();
        w.push_uint(0, 2).unwrap();
        w.push_uint(25, 8).unwrap();
        w.push_uint(0, 1).unwrap(); // acceleration
        w.push_uint(0, 1).unwrap(); // no extended functionality
        w.push_uint(33083, 16).unwrap(); // sens_ref ~ 0.0102 V/(m/s^2)
        w.push_uint(10, 8).unwrap();
        w.push_uint(3, 2).unwrap(); // direction
        w.push_uint(20, 6).unwrap();
        w.push_uint(0, 1).unwrap();
        w.push_uint(u64::from(transfer_function), 1).unwrap();
        if transfer_function {
            w.push_uint(1, 7).unwrap();
            w.push_uint(2, 9).unwrap();
            w.push_uint(3, 9).unwrap();
            w.push_uint(63, 7).unwrap();
            w.push_uint(32, 6).unwrap();
        }
        w.push_uint(100, 8).unwrap();
        w.push_uint(16, 5).unwrap(); // 23 degC
        w.push_uint(9000, 16).unwrap();
        w.push_uint(0b00011_00010_00001, 15).unwrap(); // "abc"
        w.push_uint(365, 12).unwrap();
        w.push_uint(7, 11).unwrap();
        w.push_uint(1, 2).unwrap();
        w.push_uint(0, 1).unwrap();
        for c in "PCB".chars() {
            w.push_uint(c as u64, 7).unwrap();
        }
        w
    }

    #[test]
    fn test_parse_accelerometer() {
        let teds = Teds::parse(accelerometer_bits(2, false).into_bits(), false).unwrap();
        assert_eq!(teds.uint("manufacturer_id"), Some(43));
        assert_eq!(teds.uint("serial_number"), Some(98765));
        assert_eq!(teds.uint("template_id"), Some(25));
        assert!(teds.is_accelerometer());
        let sens = teds.sensitivity().unwrap();
        assert!((sens - 0.0102).abs() < 1e-5);
        assert_eq!(teds.float("ref_temp"), Some(23.0));
        assert_eq!(teds.text("calibration_initials"), Some("abc"));
        assert_eq!(teds.text("user_data"), Some("PCB"));
        assert_eq!(teds.text("ac_dc_coupling"), Some("AC"));
        assert_eq!(
            teds.get("calibration_date"),
            Some(&TedsValue::Date(teds_epoch() + chrono::Duration::days(9000)))
        );
        assert!(teds.get("tf_sp").is_none());
    }

    #[test]
    fn test_transfer_function_block() {
        let teds = Teds::parse(accelerometer_bits(2, true).into_bits(), false).unwrap();
        let sl = teds.float("tf_sl").unwrap();
        assert!(sl.abs() < 1e-9);
        assert!(teds.float("temp_coef").unwrap().abs() < 1e-9);
    }

    #[test]
    fn test_reencode_matches_stream() {
        let bits = accelerometer_bits(2, true).into_bits();
        let teds = Teds::parse(bits.clone(), false).unwrap();
        assert_eq!(teds.to_bits().unwrap(), bits);
    }

    #[test]
    fn test_unsupported_template() {
        let mut w = BitWriter::new();
        for (_, kind) in template::BASIC.iter().take(6) {
            w.push_uint(0, kind.width().unwrap()).unwrap();
        }
        w.push_uint(40, 8).unwrap();
        let err = Teds::parse(w.into_bits(), false).unwrap_err();
        assert!(matches!(err, TedsError::UnsupportedTemplate(40)));
    }

    #[test]
    fn test_truncated_stream() {
        let mut bits = accelerometer_bits(2, false).into_bits();
        bits.truncate(90);
        assert!(matches!(
            Teds::parse(bits, false),
            Err(TedsError::UnexpectedEnd { .. })
        ));
    }

    #[test]
    fn test_virtual_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sensor.ted");
        let mut teds = Teds::parse(accelerometer_bits(2, false).into_bits(), false).unwrap();
        teds.set(
            "calibration_date",
            TedsValue::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()),
        );
        teds.write_virtual_file(&path).unwrap();

        let raw = std::fs::read(&path).unwrap();
        assert!(raw.iter().all(|&b| b <= 1));

        let back = Teds::read_virtual_file(&path).unwrap();
        assert_eq!(
            back.get("calibration_date"),
            Some(&TedsValue::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()))
        );
        assert_eq!(back.uint("serial_number"), Some(98765));
    }

    #[test]
    fn test_virtual_file_bad_preamble() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.ted");
        std::fs::write(&path, vec![0u8; 200]).unwrap();
        assert!(matches!(
            Teds::read_virtual_file(&path),
            Err(TedsError::PreambleMismatch { found: 0 })
        ));
    }

    #[test]
    fn test_daq_bytes_layout() {
        let bits = accelerometer_bits(2, false).into_bits();
        let bytes: Vec<u8> = bits
            .chunks(8)
            .map(|chunk| {
                chunk
                    .iter()
                    .enumerate()
                    .fold(0u8, |acc, (i, &b)| acc | (u8::from(b) << i))
            })
            .collect();
        let teds = Teds::from_daq_bytes(&bytes).unwrap();
        assert_eq!(teds.uint("model_number"), Some(1234));
        assert_eq!(teds.text("user_data"), Some("PCB"));
    }
}
