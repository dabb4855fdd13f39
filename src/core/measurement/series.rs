// src/core/measurement/series.rs
//
// SEP-005 style time series as exchanged with the acquisition layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::MeasurementError;

/// Measurement direction of a channel in the global frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "Scalar")]
    Scalar,
    #[serde(rename = "+X")]
    PlusX,
    #[serde(rename = "-X")]
    MinusX,
    #[serde(rename = "+Y")]
    PlusY,
    #[serde(rename = "-Y")]
    MinusY,
    #[serde(rename = "+Z")]
    PlusZ,
    #[serde(rename = "-Z")]
    MinusZ,
}

impl Default for Direction {
    fn default() -> Self {
        Self::PlusZ
    }
}

impl Direction {
    pub fn all() -> [Self; 7] {
        [
            Self::Scalar,
            Self::PlusX,
            Self::MinusX,
            Self::PlusY,
            Self::MinusY,
            Self::PlusZ,
            Self::MinusZ,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Scalar => "Scalar",
            Direction::PlusX => "+X",
            Direction::MinusX => "-X",
            Direction::PlusY => "+Y",
            Direction::MinusY => "-Y",
            Direction::PlusZ => "+Z",
            Direction::MinusZ => "-Z",
        }
    }

    /// Axis index (0 = x, 1 = y, 2 = z) and sign, `None` for scalars
    pub fn axis(&self) -> Option<(usize, f64)> {
        match self {
            Direction::Scalar => None,
            Direction::PlusX => Some((0, 1.0)),
            Direction::MinusX => Some((0, -1.0)),
            Direction::PlusY => Some((1, 1.0)),
            Direction::MinusY => Some((1, -1.0)),
            Direction::PlusZ => Some((2, 1.0)),
            Direction::MinusZ => Some((2, -1.0)),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = MeasurementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Direction::all()
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| MeasurementError::UnknownDirection(s.to_string()))
    }
}

/// One channel of sampled data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub data: Vec<f64>,
    pub unit_str: String,
    pub fs: u32,
    pub quantity: String,
    pub name: String,
    #[serde(default)]
    pub direction: Direction,
}

impl TimeSeries {
    pub fn new(
        data: Vec<f64>,
        unit_str: impl Into<String>,
        fs: u32,
        quantity: impl Into<String>,
        name: impl Into<String>,
        direction: Direction,
    ) -> Self {
        Self {
            data,
            unit_str: unit_str.into(),
            fs,
            quantity: quantity.into(),
            name: name.into(),
            direction,
        }
    }

    /// Build one series per row of a channel-major sample block
    pub fn from_rows(
        rows: &[Vec<f64>],
        unit_str: &str,
        fs: u32,
        quantity: &str,
        names: &[String],
        directions: &[Direction],
    ) -> Result<Vec<Self>, MeasurementError> {
        if names.len() != rows.len() || directions.len() != rows.len() {
            return Err(MeasurementError::Shape(format!(
                "{} rows but {} names and {} directions",
                rows.len(),
                names.len(),
                directions.len()
            )));
        }
        Ok(rows
            .iter()
            .zip(names.iter().zip(directions.iter()))
            .map(|(row, (name, direction))| {
                Self::new(row.clone(), unit_str, fs, quantity, name.clone(), *direction)
            })
            .collect())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_parse() {
        assert_eq!("+Z".parse::<Direction>().unwrap(), Direction::PlusZ);
        assert_eq!("-x".parse::<Direction>().unwrap(), Direction::MinusX);
        assert_eq!("scalar".parse::<Direction>().unwrap(), Direction::Scalar);
        assert!("Q".parse::<Direction>().is_err());
    }

    #[test]
    fn test_direction_serde_uses_signed_names() {
        let json = serde_json::to_string(&Direction::MinusY).unwrap();
        assert_eq!(json, "\"-Y\"");
    }

    #[test]
    fn test_from_rows() {
        let rows = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        let names = vec!["a".to_string(), "b".to_string()];
        let series = TimeSeries::from_rows(
            &rows,
            "m/s^2",
            100,
            "acceleration",
            &names,
            &[Direction::PlusZ, Direction::MinusZ],
        )
        .unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[1].name, "b");
        assert_eq!(series[1].direction, Direction::MinusZ);

        assert!(TimeSeries::from_rows(&rows, "N", 100, "force", &names[..1], &[]).is_err());
    }
}
