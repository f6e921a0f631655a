//! Document-store row sources

use super::{ColumnKind, Dataset};
use crate::error::{PipelineError, Result};
use parking_lot::Mutex;
use polars::prelude::*;
use serde_json::{Map, Number, Value};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// One untyped document
pub type Record = Map<String, Value>;

/// Identifier field assigned by the store to every inserted document
pub const DEFAULT_ID_FIELD: &str = "_id";

/// A queryable collection of untyped records
pub trait RowSource: Send + Sync {
    /// Fetch every record in the collection
    fn fetch_all(&self) -> Result<Vec<Record>>;

    /// Insert records, assigning store identifiers. Returns the number inserted.
    fn insert_many(&self, records: Vec<Record>) -> Result<usize>;

    /// Name of the store-generated identifier field
    fn id_field(&self) -> &str {
        DEFAULT_ID_FIELD
    }

    /// Human-readable location, for logs
    fn describe(&self) -> String;
}

fn with_generated_id(mut record: Record, id_field: &str) -> Record {
    if !record.contains_key(id_field) {
        record.insert(
            id_field.to_string(),
            Value::String(Uuid::new_v4().simple().to_string()),
        );
    }
    record
}

/// Collection stored as `<root>/<database>/<collection>.jsonl`, one JSON object per line
#[derive(Debug, Clone)]
pub struct JsonLinesCollection {
    root: PathBuf,
    database: String,
    collection: String,
}

impl JsonLinesCollection {
    pub fn new(root: impl Into<PathBuf>, database: &str, collection: &str) -> Self {
        Self {
            root: root.into(),
            database: database.to_string(),
            collection: collection.to_string(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.root
            .join(&self.database)
            .join(format!("{}.jsonl", self.collection))
    }

    fn ensure_reachable(&self) -> Result<()> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(PipelineError::Connectivity(format!(
                "document store root {} is not reachable",
                self.root.display()
            )))
        }
    }
}

impl RowSource for JsonLinesCollection {
    fn fetch_all(&self) -> Result<Vec<Record>> {
        self.ensure_reachable()?;
        let path = self.path();
        if !path.exists() {
            debug!(path = %path.display(), "collection does not exist yet");
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&path)?);
        let mut records = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(&line)? {
                Value::Object(map) => records.push(map),
                _ => {
                    return Err(PipelineError::DataError(format!(
                        "{}:{} is not a JSON object",
                        path.display(),
                        line_no + 1
                    )))
                }
            }
        }
        Ok(records)
    }

    fn insert_many(&self, records: Vec<Record>) -> Result<usize> {
        self.ensure_reachable()?;
        let path = self.path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = BufWriter::new(file);
        let count = records.len();
        for record in records {
            let record = with_generated_id(record, self.id_field());
            serde_json::to_writer(&mut writer, &Value::Object(record))?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(count)
    }

    fn describe(&self) -> String {
        format!("{}/{}.{}", self.root.display(), self.database, self.collection)
    }
}

/// Collection held in memory, mainly for tests
#[derive(Debug, Default)]
pub struct InMemoryCollection {
    records: Mutex<Vec<Record>>,
}

impl InMemoryCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl RowSource for InMemoryCollection {
    fn fetch_all(&self) -> Result<Vec<Record>> {
        Ok(self.records.lock().clone())
    }

    fn insert_many(&self, records: Vec<Record>) -> Result<usize> {
        let count = records.len();
        let mut guard = self.records.lock();
        guard.extend(
            records
                .into_iter()
                .map(|r| with_generated_id(r, DEFAULT_ID_FIELD)),
        );
        Ok(count)
    }

    fn describe(&self) -> String {
        "in-memory".to_string()
    }
}

impl Dataset {
    /// Read a CSV file with a header row
    pub fn read_csv(path: &Path) -> Result<Self> {
        let frame = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(1000))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;
        Ok(Self::new(frame))
    }

    /// One JSON record per row, keyed by column name
    pub fn to_records(&self) -> Result<Vec<Record>> {
        let mut records = vec![Record::new(); self.height()];
        for name in self.column_names() {
            let values: Vec<Value> = match self.column_kind(&name)? {
                ColumnKind::Integer => {
                    let column = self.frame().column(&name)?.cast(&DataType::Int64)?;
                    column
                        .i64()?
                        .into_iter()
                        .map(|v| v.map_or(Value::Null, Value::from))
                        .collect()
                }
                ColumnKind::Boolean => {
                    let column = self.frame().column(&name)?;
                    column
                        .bool()?
                        .into_iter()
                        .map(|v| v.map_or(Value::Null, Value::Bool))
                        .collect()
                }
                ColumnKind::Float => self
                    .column_values(&name)?
                    .into_iter()
                    .map(|v| v.and_then(Number::from_f64).map_or(Value::Null, Value::Number))
                    .collect(),
                ColumnKind::Text | ColumnKind::Other => {
                    let column = self.frame().column(&name)?.cast(&DataType::String)?;
                    column
                        .str()?
                        .into_iter()
                        .map(|v| v.map_or(Value::Null, |s| Value::String(s.to_string())))
                        .collect()
                }
            };
            for (record, value) in records.iter_mut().zip(values) {
                record.insert(name.clone(), value);
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unreachable_root_is_connectivity_error() {
        let collection = JsonLinesCollection::new("/definitely/not/here", "db", "rows");
        assert!(matches!(
            collection.fetch_all(),
            Err(PipelineError::Connectivity(_))
        ));
    }

    #[test]
    fn test_jsonl_insert_then_fetch_assigns_ids() {
        let dir = tempfile::tempdir().unwrap();
        let collection = JsonLinesCollection::new(dir.path(), "db", "rows");

        let records: Vec<Record> = (0..3)
            .map(|i| match json!({"x": i}) {
                Value::Object(m) => m,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(collection.insert_many(records).unwrap(), 3);

        let fetched = collection.fetch_all().unwrap();
        assert_eq!(fetched.len(), 3);
        assert!(fetched.iter().all(|r| r.contains_key("_id")));
        assert_eq!(fetched[2]["x"], json!(2));
    }

    #[test]
    fn test_records_from_dataset() {
        let ds = Dataset::new(
            df!("a" => &[1i64, -1], "b" => &[Some(0.5), None], "c" => &["x", "y"]).unwrap(),
        );
        let records = ds.to_records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["a"], json!(-1));
        assert_eq!(records[1]["b"], Value::Null);
        assert_eq!(records[0]["c"], json!("x"));

        let memory = InMemoryCollection::new();
        memory.insert_many(records).unwrap();
        assert_eq!(memory.len(), 2);
    }
}
