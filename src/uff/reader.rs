// src/uff/reader.rs
//
// Minimal UFF reader: splits a file into datasets and decodes the node
// table.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use super::UffError;

/// One dataset between `-1` delimiters
#[derive(Debug, Clone, PartialEq)]
pub struct UffSet {
    pub set_type: i32,
    /// Record lines after the type line
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UffReader {
    sets: Vec<UffSet>,
}

fn is_delimiter(line: &str) -> bool {
    line.trim_end() == "    -1" || (line.len() <= 6 && line.trim() == "-1")
}

impl UffReader {
    pub fn read(path: &Path) -> Result<Self, UffError> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, UffError> {
        let mut sets = Vec::new();
        let mut lines = text.lines().enumerate();

        while let Some((_, line)) = lines.next() {
            if !is_delimiter(line) {
                continue;
            }
            let (type_line_no, type_line) = match lines.next() {
                Some(entry) => entry,
                None => break,
            };
            let set_type: i32 = type_line.trim().parse().map_err(|_| UffError::Parse {
                line: type_line_no + 1,
                message: format!("expected dataset type, found '{}'", type_line.trim()),
            })?;

            let mut body = Vec::new();
            let mut closed = false;
            for (_, line) in lines.by_ref() {
                if is_delimiter(line) {
                    closed = true;
                    break;
                }
                body.push(line.to_string());
            }
            if !closed {
                return Err(UffError::Parse {
                    line: type_line_no + 1,
                    message: format!("dataset {} is not terminated", set_type),
                });
            }
            sets.push(UffSet { set_type, lines: body });
        }
        Ok(Self { sets })
    }

    pub fn sets(&self) -> &[UffSet] {
        &self.sets
    }

    /// Dataset types present in the file
    pub fn set_types(&self) -> BTreeSet<i32> {
        self.sets.iter().map(|s| s.set_type).collect()
    }

    /// Nodes of every dataset 15 as `(label, [x, y, z])`
    pub fn nodes(&self) -> Result<Vec<(usize, [f64; 3])>, UffError> {
        let mut nodes = Vec::new();
        for set in self.sets.iter().filter(|s| s.set_type == 15) {
            for (i, line) in set.lines.iter().enumerate() {
                let fields: Vec<&str> = line.split_whitespace().collect();
                let parse_err = || UffError::Parse {
                    line: i + 1,
                    message: format!("bad node record '{}'", line),
                };
                if fields.len() < 7 {
                    return Err(parse_err());
                }
                let label: usize = fields[0].parse().map_err(|_| parse_err())?;
                let mut xyz = [0.0; 3];
                for (axis, field) in fields[4..7].iter().enumerate() {
                    xyz[axis] = field.parse().map_err(|_| parse_err())?;
                }
                nodes.push((label, xyz));
            }
        }
        Ok(nodes)
    }
}
