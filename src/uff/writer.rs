// src/uff/writer.rs
//
// Appending UFF writer for geometry, measured FRFs and mode shapes

use chrono::Local;
use log::{debug, info};
use num_complex::Complex64;
use std::collections::{BTreeSet, HashMap};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::format::{columns, e13, e20, fmt_e, ints10, text80};
use super::reader::UffReader;
use super::UffError;
use crate::core::ema::Ema;
use crate::core::measurement::{Direction, FrfForm, FrfKind};

const DELIMITER: &str = "    -1\n";

/// UFF direction code: 0 scalar, ±1 x, ±2 y, ±3 z
pub fn direction_to_int(direction: Direction) -> i32 {
    match direction {
        Direction::Scalar => 0,
        Direction::PlusX => 1,
        Direction::MinusX => -1,
        Direction::PlusY => 2,
        Direction::MinusY => -2,
        Direction::PlusZ => 3,
        Direction::MinusZ => -3,
    }
}

/// Writes each dataset type at most once per file
pub struct UffWriter {
    path: PathBuf,
    name: String,
    present: BTreeSet<i32>,
}

impl UffWriter {
    /// Open (or create) `path` and write the 151 header if it has none
    pub fn open(path: impl AsRef<Path>, name: impl Into<String>) -> Result<Self, UffError> {
        let path = path.as_ref().to_path_buf();
        let present = if path.exists() {
            UffReader::read(&path)?.set_types()
        } else {
            BTreeSet::new()
        };
        debug!("UFF {} holds datasets {:?}", path.display(), present);

        let mut writer = Self {
            path,
            name: name.into(),
            present,
        };
        writer.write_header()?;
        Ok(writer)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set_types(&self) -> &BTreeSet<i32> {
        &self.present
    }

    /// Append a dataset unless its type is already present; returns whether
    /// it was written
    fn append(&mut self, set_type: i32, body: &str) -> Result<bool, UffError> {
        if self.present.contains(&set_type) {
            debug!("Dataset {} already present, skipping", set_type);
            return Ok(false);
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(body.as_bytes())?;
        self.present.insert(set_type);
        Ok(true)
    }

    fn dataset(set_type: i32, records: &str) -> String {
        format!("{}{:6}\n{}{}", DELIMITER, set_type, records, DELIMITER)
    }

    fn write_header(&mut self) -> Result<bool, UffError> {
        let now = Local::now();
        let date = now.format("%d-%b-%y").to_string();
        let time = now.format("%H:%M:%S").to_string();

        let mut rec = String::new();
        rec.push_str(&text80(&self.name));
        rec.push('\n');
        rec.push_str(&text80("No"));
        rec.push('\n');
        rec.push_str(&text80("SDLMA"));
        rec.push('\n');
        rec.push_str(&format!("{:<10}{:<10}{:10}{:10}{:10}\n", date, time, 0, 0, 0));
        rec.push_str(&format!("{:<10}{:<10}\n", date, time));
        rec.push_str(&text80("SDLMA"));
        rec.push('\n');
        rec.push_str(&format!("{:<10}{:<10}\n", date, time));
        self.append(151, &Self::dataset(151, &rec))
    }

    /// Dataset 164: SI units
    pub fn write_units(&mut self) -> Result<bool, UffError> {
        let rec = format!(
            "{:10}{:<20}{:10}\n{}{}{}\n{}\n",
            1,
            "metric",
            1,
            fmt_e(1.0, 25, 16),
            fmt_e(1.0, 25, 16),
            fmt_e(1.0, 25, 16),
            fmt_e(1.0, 25, 16),
        );
        self.append(164, &Self::dataset(164, &rec))
    }

    /// Dataset 2420: the global frame as the only coordinate system
    pub fn write_coord_system(&mut self) -> Result<bool, UffError> {
        let mut rec = format!("{:10}\n{}\n{}\n{}\n", 1, "Name", ints10(&[1, 0, 8]), "Coord 1");
        for row in 0..3 {
            for col in 0..3 {
                rec.push_str(&fmt_e(if row == col { 1.0 } else { 0.0 }, 25, 16));
            }
            rec.push('\n');
        }
        self.append(2420, &Self::dataset(2420, &rec))
    }

    /// Dataset 15: nodes labelled from 1 in the global frame
    pub fn write_nodes(&mut self, nodes: &[[f64; 3]]) -> Result<bool, UffError> {
        let mut rec = String::new();
        for (i, node) in nodes.iter().enumerate() {
            rec.push_str(&ints10(&[i as i64 + 1, 0, 0, 0]));
            for &v in node {
                rec.push_str(&e13(v));
            }
            rec.push('\n');
        }
        self.append(15, &Self::dataset(15, &rec))
    }

    /// Dataset 2412: faces (quads as 94, others as 91) then lines as beams.
    /// Node indices are zero based.
    pub fn write_mesh(&mut self, lines: &[Vec<usize>], faces: &[Vec<usize>]) -> Result<bool, UffError> {
        let node_ids = |nodes: &[usize]| {
            let ids: Vec<i64> = nodes.iter().map(|&n| n as i64 + 1).collect();
            ints10(&ids)
        };

        let mut rec = String::new();
        let mut label = 0i64;
        for face in faces {
            label += 1;
            let element = if face.len() == 4 { 94 } else { 91 };
            rec.push_str(&ints10(&[label, element, 0, 0, 0, face.len() as i64]));
            rec.push('\n');
            rec.push_str(&node_ids(face));
            rec.push('\n');
        }
        for line in lines {
            label += 1;
            rec.push_str(&ints10(&[label, 11, 0, 0, 1, 2]));
            rec.push('\n');
            rec.push_str(&ints10(&[0, 1, 1]));
            rec.push('\n');
            rec.push_str(&node_ids(line));
            rec.push('\n');
        }
        self.append(2412, &Self::dataset(2412, &rec))
    }

    /// Dataset 58: measured H1 accelerance of every response (DC dropped).
    ///
    /// `mp_to_node` maps channel names to UFF node labels.
    pub fn write_frfs(&mut self, ema: &Ema, mp_to_node: &HashMap<String, usize>) -> Result<bool, UffError> {
        if self.present.contains(&58) {
            return Ok(false);
        }
        let mut body = String::new();
        let mut count = 0;
        for measurement in ema.measurements() {
            let reference = &measurement.exc()[0];
            let ref_node = node_of(mp_to_node, &reference.name)?;
            let ref_dir = direction_to_int(reference.direction);
            let frf = measurement.frf().get(FrfKind::H1, FrfForm::Accelerance);
            let freq = &measurement.frf().f_axis()[1..];

            for (r, resp) in measurement.resp().iter().enumerate() {
                let rsp_node = node_of(mp_to_node, &resp.name)?;
                let rsp_dir = direction_to_int(resp.direction);
                let data: Vec<Complex64> = (1..frf.dim().2).map(|k| frf[[r, 0, k]]).collect();
                let rec = frf_records(
                    &format!("{} {}", measurement.name(), resp.name),
                    (rsp_node, rsp_dir),
                    (ref_node, ref_dir),
                    freq,
                    &data,
                );
                body.push_str(&Self::dataset(58, &rec));
                count += 1;
            }
        }
        info!("Writing {} FRFs to {}", count, self.path.display());
        self.append(58, &body)
    }

    /// Dataset 55: one complex mode shape per natural frequency
    pub fn write_modes(&mut self, ema: &Ema, mp_to_node: &HashMap<String, usize>) -> Result<bool, UffError> {
        if self.present.contains(&55) {
            return Ok(false);
        }
        let results = ema.results().ok_or(UffError::NoResults)?;

        let mut responses: Vec<(usize, usize, Direction)> = Vec::new();
        for (j, row) in ema.response_rows().iter().enumerate() {
            responses.push((j, node_of(mp_to_node, &row.name)?, row.direction));
        }
        let expected = (responses.len(), results.nat_freq.len());
        if results.phi.dim() != expected {
            return Err(UffError::ShapeMismatch {
                expected,
                found: results.phi.dim(),
            });
        }
        // by node, then channel index
        responses.sort_by_key(|&(j, node, _)| (node, j));

        let mut body = String::new();
        for (i, &freq) in results.nat_freq.iter().enumerate() {
            let mut rec = String::new();
            rec.push_str(&text80("NONE"));
            rec.push('\n');
            for _ in 0..3 {
                rec.push_str(&text80("NONE"));
                rec.push('\n');
            }
            rec.push_str(&text80(&format!("Mode {} at {} Hz", i + 1, freq)));
            rec.push('\n');
            // model type, analysis type (complex eigen), data characteristic,
            // specific data type, data type (complex), values per node
            rec.push_str(&ints10(&[1, 3, 2, 12, 5, 3]));
            rec.push('\n');
            rec.push_str(&ints10(&[2, 6, 1, i as i64 + 1]));
            rec.push('\n');
            let eig = Complex64::new(0.0, 2.0 * std::f64::consts::PI * freq);
            for v in [eig.re, eig.im, 0.0, 0.0, 0.0, 0.0] {
                rec.push_str(&e13(v));
            }
            rec.push('\n');

            for &(j, node, direction) in &responses {
                let value = results.phi[[j, i]];
                let mut xyz = [Complex64::new(0.0, 0.0); 3];
                if let Some((axis, sign)) = direction.axis() {
                    xyz[axis] = value * sign;
                }
                rec.push_str(&ints10(&[node as i64]));
                rec.push('\n');
                for c in xyz {
                    rec.push_str(&e13(c.re));
                    rec.push_str(&e13(c.im));
                }
                rec.push('\n');
            }
            body.push_str(&Self::dataset(55, &rec));
        }
        info!("Writing {} modes to {}", results.nat_freq.len(), self.path.display());
        self.append(55, &body)
    }
}

fn node_of(mp_to_node: &HashMap<String, usize>, name: &str) -> Result<usize, UffError> {
    mp_to_node
        .get(name)
        .copied()
        .ok_or_else(|| UffError::UnknownPoint(name.to_string()))
}

/// Records 1-12 of an ASCII, complex double, evenly spaced FRF
fn frf_records(
    id: &str,
    response: (usize, i32),
    reference: (usize, i32),
    freq: &[f64],
    data: &[Complex64],
) -> String {
    let mut rec = String::new();
    rec.push_str(&text80(id));
    rec.push('\n');
    for _ in 0..4 {
        rec.push_str(&text80("NONE"));
        rec.push('\n');
    }
    // function type 4 = FRF
    rec.push_str(&format!(
        "{:5}{:10}{:5}{:10} {:<10}{:10}{:4} {:<10}{:10}{:4}\n",
        4, 1, 0, 0, "TestCase", response.0, response.1, "TestCase", reference.0, reference.1
    ));
    let (start, step) = match freq {
        [] => (0.0, 0.0),
        [only] => (*only, 0.0),
        [first, second, ..] => (*first, second - first),
    };
    // ordinate type 6 = complex double, even abscissa spacing
    rec.push_str(&ints10(&[6, data.len() as i64, 1]));
    rec.push_str(&e13(start));
    rec.push_str(&e13(step));
    rec.push_str(&e13(0.0));
    rec.push('\n');
    // abscissa (frequency), ordinate numerator (acceleration),
    // ordinate denominator (force), z axis
    for (data_type, label, unit) in [
        (18, "Frequency", "Hz"),
        (12, "Acceleration", "m/s^2"),
        (13, "Force", "N"),
        (0, "NONE", "NONE"),
    ] {
        rec.push_str(&format!("{:10}{:5}{:5}{:5} {:<20} {:<20}\n", data_type, 0, 0, 0, label, unit));
    }
    let flat: Vec<f64> = data.iter().flat_map(|c| [c.re, c.im]).collect();
    rec.push_str(&columns(&flat, 4, e20));
    rec
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_codes() {
        assert_eq!(direction_to_int(Direction::Scalar), 0);
        assert_eq!(direction_to_int(Direction::MinusY), -2);
        assert_eq!(direction_to_int(Direction::PlusZ), 3);
    }

    #[test]
    fn test_geometry_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plate.uff");

        let mut writer = UffWriter::open(&path, "Plate").unwrap();
        assert!(writer.write_units().unwrap());
        assert!(writer.write_coord_system().unwrap());
        assert!(writer.write_nodes(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]]).unwrap());
        assert!(writer.write_mesh(&[vec![0, 2]], &[vec![0, 1, 2, 3], vec![0, 1, 2]]).unwrap());
        assert!(!writer.write_nodes(&[[5.0, 5.0, 5.0]]).unwrap());

        // a second writer sees the existing datasets and adds nothing
        let mut again = UffWriter::open(&path, "Plate").unwrap();
        assert!(!again.write_units().unwrap());

        let reader = UffReader::read(&path).unwrap();
        assert_eq!(
            reader.set_types().into_iter().collect::<Vec<_>>(),
            vec![15, 151, 164, 2412, 2420]
        );
        assert_eq!(reader.sets().iter().filter(|s| s.set_type == 151).count(), 1);
        let nodes = reader.nodes().unwrap();
        assert_eq!(nodes.len(), 4);
        assert_eq!(nodes[2], (3, [1.0, 1.0, 0.0]));

        let mesh = reader.sets().iter().find(|s| s.set_type == 2412).unwrap();
        assert_eq!(mesh.lines[0], ints10(&[1, 94, 0, 0, 0, 4]));
        assert_eq!(mesh.lines[1], ints10(&[1, 2, 3, 4]));
        assert_eq!(mesh.lines[2], ints10(&[2, 91, 0, 0, 0, 3]));
        assert_eq!(mesh.lines[4], ints10(&[3, 11, 0, 0, 1, 2]));
        assert_eq!(mesh.lines[6], ints10(&[1, 3]));
    }

    #[test]
    fn test_mode_shapes_must_match_responses() {
        use crate::core::ema::Solver;
        use crate::core::measurement::{Measurement, TimeSeries};
        use serde_json::json;

        let dir = tempfile::tempdir().unwrap();
        let mut force = vec![0.0; 16];
        force[1] = 1.0;
        let decay: Vec<f64> = (0..16).map(|i| 0.5f64.powi(i)).collect();
        let meas = Measurement::new(
            "m1",
            16,
            16,
            vec![TimeSeries::new(force, "N", 16, "force", "p1", Direction::MinusZ)],
            vec![
                TimeSeries::new(decay.clone(), "m/s^2", 16, "acceleration", "p1", Direction::PlusZ),
                TimeSeries::new(decay, "m/s^2", 16, "acceleration", "p2", Direction::PlusZ),
            ],
            "",
        )
        .unwrap();
        let mut ema = Ema::new(1.0, 7.0, 2, Solver::Lscf, Vec::new());
        ema.add_measurement(meas);
        let session = ema.export_to_file(&dir.path().join("session")).unwrap();

        // one shape entry for two responses
        let one = json!({"v": 1, "dim": [1, 1], "data": [[1.0, 0.0]]});
        let mut record: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&session).unwrap()).unwrap();
        record["results"] = json!({
            "nat_freq": [3.0],
            "nat_xi": [0.01],
            "h": {"v": 1, "dim": [0, 0], "data": []},
            "a": one,
            "phi": one,
        });
        std::fs::write(&session, record.to_string()).unwrap();
        let ema = Ema::import_from_file(&session).unwrap();

        let mp_to_node = HashMap::from([("p1".to_string(), 1), ("p2".to_string(), 2)]);
        let mut writer = UffWriter::open(dir.path().join("modes.uff"), "modes").unwrap();
        let err = writer.write_modes(&ema, &mp_to_node).unwrap_err();
        assert!(matches!(
            err,
            UffError::ShapeMismatch { expected: (2, 1), found: (1, 1) }
        ));
    }

    #[test]
    fn test_frf_record_layout() {
        let data = vec![Complex64::new(1.0, -1.0), Complex64::new(0.5, 0.25), Complex64::new(0.0, 2.0)];
        let rec = frf_records("m1 p2", (2, 3), (1, -3), &[1.0, 2.0, 3.0], &data);
        let lines: Vec<&str> = rec.lines().collect();
        assert!(lines[5].contains(&format!("{:<10}{:10}{:4}", "TestCase", 2, 3)));
        assert!(lines[5].ends_with("         1  -3"));
        assert!(lines[6].starts_with("         6         3         1"));
        // 3 complex points at 2 per line
        assert_eq!(lines.len(), 6 + 1 + 4 + 2);
        assert_eq!(lines[11].len(), 80);
    }
}
