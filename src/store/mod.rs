//! JSON datastores for measurements, EMA sessions and task settings

use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const STORE_EXTENSION: &str = "json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed datastore {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Append `.json` unless the path already carries that extension
pub fn with_store_extension(path: &Path) -> PathBuf {
    match path.extension() {
        Some(ext) if ext == STORE_EXTENSION => path.to_path_buf(),
        _ => {
            let mut name = path.as_os_str().to_owned();
            name.push(".");
            name.push(STORE_EXTENSION);
            PathBuf::from(name)
        }
    }
}

/// Serialize `value` to `path` (extension fixed up). Returns the written path.
pub fn save<T: Serialize>(path: &Path, value: &T) -> Result<PathBuf, StoreError> {
    let path = with_store_extension(path);
    let io_err = |source| StoreError::Io { path: path.clone(), source };

    let file = File::create(&path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, value).map_err(|source| StoreError::Json {
        path: path.clone(),
        source,
    })?;
    writer.flush().map_err(io_err)?;
    debug!("Wrote datastore {}", path.display());
    Ok(path)
}

pub fn load<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let file = File::open(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}
