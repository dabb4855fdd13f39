//! TEDS field encodings

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::bits::{BitReader, BitWriter};
use super::TedsError;

/// Reference date for TEDS `Date` fields
pub fn teds_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1998, 1, 1).unwrap_or_default()
}

/// How a single TEDS field is laid out in the bit stream
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ElementKind {
    /// Unsigned integer
    UnInt { bits: usize },
    /// 5-bit characters, `1..=31` -> `a..=DEL`, `0` -> space
    Chr5 { bits: usize },
    /// 7-bit ASCII until the end of the stream
    Ascii,
    /// Days since 1998-01-01
    Date { bits: usize },
    /// Constant resolution: `start + n * step`
    ConRes { bits: usize, start: f64, step: f64 },
    /// Constant relative resolution: `start * (1 + 2 * tolerance)^n`
    ConRelRes { bits: usize, start: f64, tolerance: f64 },
    /// Implied by the template, occupies no bits
    Constant(&'static str),
}

/// Decoded value of a TEDS field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TedsValue {
    UInt(u64),
    Text(String),
    Date(NaiveDate),
    Float(f64),
    Constant(String),
}

impl std::fmt::Display for TedsValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TedsValue::UInt(v) => write!(f, "{}", v),
            TedsValue::Text(s) | TedsValue::Constant(s) => write!(f, "{}", s),
            TedsValue::Date(d) => write!(f, "{}", d),
            TedsValue::Float(v) => write!(f, "{:.6e}", v),
        }
    }
}

impl ElementKind {
    /// Number of bits the field occupies, `None` for the open-ended ASCII block
    pub fn width(&self) -> Option<usize> {
        match *self {
            ElementKind::UnInt { bits }
            | ElementKind::Chr5 { bits }
            | ElementKind::Date { bits }
            | ElementKind::ConRes { bits, .. }
            | ElementKind::ConRelRes { bits, .. } => Some(bits),
            ElementKind::Ascii => None,
            ElementKind::Constant(_) => Some(0),
        }
    }

    pub fn decode(&self, reader: &mut BitReader) -> Result<TedsValue, TedsError> {
        let value = match *self {
            ElementKind::UnInt { bits } => TedsValue::UInt(reader.read_uint(bits)?),
            ElementKind::Chr5 { bits } => {
                let mut text = String::new();
                for _ in 0..bits / 5 {
                    text.push(chr5_to_char(reader.read_uint(5)? as u8));
                }
                TedsValue::Text(text)
            }
            ElementKind::Ascii => {
                let mut text = String::new();
                while reader.remaining() >= 7 {
                    text.push(char::from(reader.read_uint(7)? as u8));
                }
                // the rest of a hardware TEDS page is zero filled
                TedsValue::Text(text.trim_end_matches('\0').to_string())
            }
            ElementKind::Date { bits } => {
                let days = reader.read_uint(bits)?;
                TedsValue::Date(teds_epoch() + Duration::days(days as i64))
            }
            ElementKind::ConRes { bits, start, step } => {
                let n = reader.read_uint(bits)?;
                TedsValue::Float(start + n as f64 * step)
            }
            ElementKind::ConRelRes { bits, start, tolerance } => {
                let n = reader.read_uint(bits)?;
                TedsValue::Float(start * (1.0 + 2.0 * tolerance).powi(n as i32))
            }
            ElementKind::Constant(text) => TedsValue::Constant(text.to_string()),
        };
        Ok(value)
    }

    pub fn encode(&self, value: &TedsValue, writer: &mut BitWriter) -> Result<(), TedsError> {
        match (*self, value) {
            (ElementKind::Constant(_), _) => Ok(()),
            (ElementKind::UnInt { bits }, TedsValue::UInt(v)) => writer.push_uint(*v, bits),
            (ElementKind::Chr5 { bits }, TedsValue::Text(text)) => {
                let slots = bits / 5;
                let chars: Vec<char> = text.chars().collect();
                if chars.len() > slots {
                    return Err(TedsError::TextTooLong {
                        text: text.clone(),
                        max: slots,
                    });
                }
                for i in 0..slots {
                    let code = chars.get(i).map_or(Ok(0), |&c| char_to_chr5(c))?;
                    writer.push_uint(u64::from(code), 5)?;
                }
                Ok(())
            }
            (ElementKind::Ascii, TedsValue::Text(text)) => {
                for c in text.chars() {
                    if !c.is_ascii() {
                        return Err(TedsError::InvalidCharacter(c));
                    }
                    writer.push_uint(c as u64, 7)?;
                }
                Ok(())
            }
            (ElementKind::Date { bits }, TedsValue::Date(date)) => {
                let days = (*date - teds_epoch()).num_days();
                if days < 0 {
                    return Err(TedsError::ValueOutOfRange {
                        value: days as f64,
                        bits,
                    });
                }
                writer.push_uint(days as u64, bits)
            }
            (ElementKind::ConRes { bits, start, step }, TedsValue::Float(v)) => {
                let n = quantize((v - start) / step, bits)?;
                writer.push_uint(n, bits)
            }
            (ElementKind::ConRelRes { bits, start, tolerance }, TedsValue::Float(v)) => {
                if *v <= 0.0 || start <= 0.0 {
                    return Err(TedsError::ValueOutOfRange { value: *v, bits });
                }
                let n = quantize((v / start).ln() / (1.0 + 2.0 * tolerance).ln(), bits)?;
                writer.push_uint(n, bits)
            }
            (kind, value) => Err(TedsError::KindMismatch {
                kind: format!("{:?}", kind),
                value: value.to_string(),
            }),
        }
    }
}

fn quantize(code: f64, bits: usize) -> Result<u64, TedsError> {
    let rounded = code.round();
    let max = if bits >= 64 { u64::MAX as f64 } else { ((1u64 << bits) - 1) as f64 };
    if !rounded.is_finite() || rounded < 0.0 || rounded > max {
        return Err(TedsError::ValueOutOfRange { value: code, bits });
    }
    Ok(rounded as u64)
}

fn chr5_to_char(code: u8) -> char {
    match code {
        0 => ' ',
        c => char::from(b'`' + c),
    }
}

fn char_to_chr5(c: char) -> Result<u8, TedsError> {
    match c {
        ' ' => Ok(0),
        '`'..='\x7f' => Ok(c as u8 - b'`'),
        'A'..='Z' => Ok(c.to_ascii_lowercase() as u8 - b'`'),
        _ => Err(TedsError::InvalidCharacter(c)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(kind: ElementKind, writer: BitWriter) -> TedsValue {
        let mut reader = BitReader::new(writer.into_bits());
        kind.decode(&mut reader).unwrap()
    }

    #[test]
    fn test_chr5_initials() {
        let kind = ElementKind::Chr5 { bits: 15 };
        let mut writer = BitWriter::new();
        kind.encode(&TedsValue::Text("JKL".into()), &mut writer).unwrap();
        assert_eq!(writer.len(), 15);
        assert_eq!(read(kind, writer), TedsValue::Text("jkl".into()));
    }

    #[test]
    fn test_chr5_all_codes_round_trip() {
        let kind = ElementKind::Chr5 { bits: 5 * 32 };
        let mut writer = BitWriter::new();
        for code in 0..32u64 {
            writer.push_uint(code, 5).unwrap();
        }
        let decoded = read(kind, writer);
        let mut encoded = BitWriter::new();
        kind.encode(&decoded, &mut encoded).unwrap();
        assert_eq!(read(kind, encoded), decoded);
    }

    #[test]
    fn test_date_offset_from_epoch() {
        let kind = ElementKind::Date { bits: 16 };
        let mut writer = BitWriter::new();
        writer.push_uint(366, 16).unwrap();
        let expected = NaiveDate::from_ymd_opt(1999, 1, 2).unwrap();
        assert_eq!(read(kind, writer), TedsValue::Date(expected));
    }

    #[test]
    fn test_con_rel_res_sensitivity() {
        // 100 mV/g class sensor, sens_ref encoding from the accelerometer template
        let kind = ElementKind::ConRelRes { bits: 16, start: 5e-7, tolerance: 0.00015 };
        let mut writer = BitWriter::new();
        kind.encode(&TedsValue::Float(0.0102), &mut writer).unwrap();
        match read(kind, writer) {
            TedsValue::Float(v) => assert!((v - 0.0102).abs() / 0.0102 < 3e-4),
            other => panic!("unexpected value {:?}", other),
        }
    }

    #[test]
    fn test_con_res_out_of_range() {
        let kind = ElementKind::ConRes { bits: 5, start: 15.0, step: 0.5 };
        let mut writer = BitWriter::new();
        let err = kind.encode(&TedsValue::Float(40.0), &mut writer).unwrap_err();
        assert!(matches!(err, TedsError::ValueOutOfRange { bits: 5, .. }));
    }

    #[test]
    fn test_ascii_trims_zero_fill() {
        let mut writer = BitWriter::new();
        ElementKind::Ascii.encode(&TedsValue::Text("ok".into()), &mut writer).unwrap();
        writer.push_uint(0, 20).unwrap();
        assert_eq!(read(ElementKind::Ascii, writer), TedsValue::Text("ok".into()));
    }

    #[test]
    fn test_constant_consumes_nothing() {
        let mut reader = BitReader::new(vec![true; 4]);
        let value = ElementKind::Constant("AC").decode(&mut reader).unwrap();
        assert_eq!(value, TedsValue::Constant("AC".into()));
        assert_eq!(reader.position(), 0);
    }
}
