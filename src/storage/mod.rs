//! Artifact storage
//!
//! A durable key→blob mapping addressed by path. Stages only talk to the
//! [`ArtifactStore`] trait; typed helpers for CSV tables, numeric arrays,
//! serialized objects and YAML documents live on [`ArtifactStoreExt`].

use crate::data::Dataset;
use crate::error::{PipelineError, Result};
use ndarray::Array2;
use parking_lot::Mutex;
use polars::prelude::*;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Path-addressed blob store
pub trait ArtifactStore: Send + Sync {
    /// Write `bytes` at `path`, creating intermediate directories
    fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()>;

    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>>;

    fn exists(&self, path: &Path) -> bool;
}

/// Typed read/write helpers available on every store
pub trait ArtifactStoreExt: ArtifactStore {
    /// Delimited text with a header row
    fn write_csv(&self, path: &Path, dataset: &Dataset) -> Result<()> {
        let mut frame = dataset.frame().clone();
        let mut buf = Vec::new();
        CsvWriter::new(&mut buf)
            .include_header(true)
            .finish(&mut frame)?;
        self.write_bytes(path, &buf)
    }

    fn read_csv(&self, path: &Path) -> Result<Dataset> {
        let bytes = self.read_bytes(path)?;
        let frame = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(1000))
            .into_reader_with_file_handle(Cursor::new(bytes))
            .finish()?;
        Ok(Dataset::new(frame))
    }

    fn write_array(&self, path: &Path, array: &Array2<f64>) -> Result<()> {
        self.write_bytes(path, &bincode::serialize(array)?)
    }

    fn read_array(&self, path: &Path) -> Result<Array2<f64>> {
        Ok(bincode::deserialize(&self.read_bytes(path)?)?)
    }

    fn write_object<T: Serialize>(&self, path: &Path, object: &T) -> Result<()> {
        self.write_bytes(path, &bincode::serialize(object)?)
    }

    fn read_object<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        Ok(bincode::deserialize(&self.read_bytes(path)?)?)
    }

    fn write_yaml<T: Serialize>(&self, path: &Path, document: &T) -> Result<()> {
        self.write_bytes(path, serde_yaml::to_string(document)?.as_bytes())
    }

    fn read_yaml<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        Ok(serde_yaml::from_slice(&self.read_bytes(path)?)?)
    }
}

impl<S: ArtifactStore + ?Sized> ArtifactStoreExt for S {}

/// Local filesystem store. Paths are used as given.
#[derive(Debug, Clone, Default)]
pub struct LocalArtifactStore;

impl LocalArtifactStore {
    pub fn new() -> Self {
        Self
    }
}

impl ArtifactStore for LocalArtifactStore {
    fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(bytes)?;
        writer.flush()?;
        debug!(path = %path.display(), bytes = bytes.len(), "artifact written");
        Ok(())
    }

    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>> {
        let mut file = File::open(path).map_err(|e| {
            PipelineError::IoError(std::io::Error::new(
                e.kind(),
                format!("{}: {}", path.display(), e),
            ))
        })?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// Store held in memory, keyed by path
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    blobs: Mutex<HashMap<PathBuf, Vec<u8>>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored paths, sorted
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.blobs.lock().keys().cloned().collect();
        paths.sort();
        paths
    }
}

impl ArtifactStore for InMemoryArtifactStore {
    fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        self.blobs.lock().insert(path.to_path_buf(), bytes.to_vec());
        Ok(())
    }

    fn read_bytes(&self, path: &Path) -> Result<Vec<u8>> {
        self.blobs.lock().get(path).cloned().ok_or_else(|| {
            PipelineError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no artifact at {}", path.display()),
            ))
        })
    }

    fn exists(&self, path: &Path) -> bool {
        self.blobs.lock().contains_key(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::collections::BTreeMap;

    #[test]
    fn test_local_store_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("blob.bin");
        let store = LocalArtifactStore::new();

        store.write_bytes(&path, b"hello").unwrap();
        assert!(store.exists(&path));
        assert_eq!(store.read_bytes(&path).unwrap(), b"hello");
    }

    #[test]
    fn test_missing_artifact_is_io_error() {
        let store = InMemoryArtifactStore::new();
        assert!(matches!(
            store.read_bytes(Path::new("nope.csv")),
            Err(PipelineError::IoError(_))
        ));
    }

    #[test]
    fn test_csv_keeps_missing_values() {
        let store = InMemoryArtifactStore::new();
        let path = Path::new("t/train.csv");
        let ds = Dataset::new(
            df!("a" => &[Some(1i64), None, Some(3)], "b" => &[1.5f64, 2.5, 3.5]).unwrap(),
        );

        store.write_csv(path, &ds).unwrap();
        let back = store.read_csv(path).unwrap();

        assert_eq!(back.column_names(), vec!["a", "b"]);
        assert_eq!(back.column_values("a").unwrap(), vec![Some(1.0), None, Some(3.0)]);
    }

    #[test]
    fn test_array_and_yaml_helpers() {
        let store = InMemoryArtifactStore::new();
        let arr = array![[1.0, f64::NAN], [3.0, 4.0]];
        store.write_array(Path::new("x.bin"), &arr).unwrap();
        let back = store.read_array(Path::new("x.bin")).unwrap();
        assert_eq!(back.shape(), &[2, 2]);
        assert!(back[[0, 1]].is_nan());

        let doc = BTreeMap::from([("k".to_string(), 1.5f64)]);
        store.write_yaml(Path::new("r.yaml"), &doc).unwrap();
        let loaded: BTreeMap<String, f64> = store.read_yaml(Path::new("r.yaml")).unwrap();
        assert_eq!(loaded, doc);
        assert_eq!(store.paths().len(), 2);
    }
}
