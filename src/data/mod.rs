//! Tabular data handling
//!
//! `Dataset` wraps a polars `DataFrame` and exposes the handful of column
//! operations the pipeline stages need: selection and removal, type
//! introspection, sentinel replacement, row sampling and conversion to
//! dense `ndarray` matrices.

pub mod schema;
mod source;

pub use schema::{Schema, SchemaValidator};
pub use source::{InMemoryCollection, JsonLinesCollection, Record, RowSource, DEFAULT_ID_FIELD};

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

/// Coarse column kind, as seen by schema validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Integer,
    Float,
    Boolean,
    Text,
    Other,
}

impl ColumnKind {
    fn of(dtype: &DataType) -> Self {
        if dtype.is_integer() {
            ColumnKind::Integer
        } else if dtype.is_float() {
            ColumnKind::Float
        } else {
            match dtype {
                DataType::Boolean => ColumnKind::Boolean,
                DataType::String => ColumnKind::Text,
                _ => ColumnKind::Other,
            }
        }
    }
}

/// Fraction of rows routed to the test partition, strictly inside (0, 1)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitRatio(f64);

impl SplitRatio {
    pub fn new(ratio: f64) -> Result<Self> {
        if ratio.is_finite() && ratio > 0.0 && ratio < 1.0 {
            Ok(Self(ratio))
        } else {
            Err(PipelineError::InvalidParameter {
                name: "split_ratio".to_string(),
                value: ratio.to_string(),
                reason: "must lie strictly between 0 and 1".to_string(),
            })
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// Number of test rows for `n_rows` input rows (rounded up)
    pub fn test_rows(&self, n_rows: usize) -> usize {
        ((self.0 * n_rows as f64).ceil() as usize).min(n_rows)
    }
}

impl Default for SplitRatio {
    fn default() -> Self {
        Self(0.2)
    }
}

impl fmt::Display for SplitRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// In-memory table of named, row-aligned columns
#[derive(Debug, Clone)]
pub struct Dataset {
    frame: DataFrame,
}

impl Dataset {
    pub fn new(frame: DataFrame) -> Self {
        Self { frame }
    }

    /// Build a dataset from untyped document records.
    ///
    /// Columns appear in first-seen order. A column whose values are all
    /// integers becomes `Int64`, all numbers `Float64`, all booleans
    /// `Boolean`; anything else is kept as text. Absent keys and JSON
    /// nulls become missing values.
    pub fn from_records(records: &[Record]) -> Result<Self> {
        let mut names: Vec<String> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for record in records {
            for key in record.keys() {
                if seen.insert(key.as_str()) {
                    names.push(key.clone());
                }
            }
        }

        let columns = names
            .iter()
            .map(|name| {
                let values: Vec<&Value> = records
                    .iter()
                    .map(|r| r.get(name).unwrap_or(&Value::Null))
                    .collect();
                json_column(name, &values)
            })
            .collect::<Vec<Column>>();

        Ok(Self::new(DataFrame::new(columns)?))
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn width(&self) -> usize {
        self.frame.width()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.frame.column(name).is_ok()
    }

    pub fn column_kind(&self, name: &str) -> Result<ColumnKind> {
        let column = self
            .frame
            .column(name)
            .map_err(|_| PipelineError::MissingColumn(name.to_string()))?;
        Ok(ColumnKind::of(column.dtype()))
    }

    /// Names of the columns holding integer values
    pub fn integer_columns(&self) -> Vec<String> {
        self.frame
            .get_columns()
            .iter()
            .filter(|c| ColumnKind::of(c.dtype()) == ColumnKind::Integer)
            .map(|c| c.name().to_string())
            .collect()
    }

    pub fn select(&self, names: &[String]) -> Result<Self> {
        for name in names {
            if !self.has_column(name) {
                return Err(PipelineError::MissingColumn(name.clone()));
            }
        }
        Ok(Self::new(self.frame.select(names.iter().map(|s| s.as_str()))?))
    }

    pub fn drop_column(&self, name: &str) -> Result<Self> {
        if !self.has_column(name) {
            return Err(PipelineError::MissingColumn(name.to_string()));
        }
        Ok(Self::new(self.frame.drop(name)?))
    }

    /// Replace every occurrence of `token` in text columns with a missing
    /// value, then re-infer the column as numeric when every remaining
    /// value parses.
    pub fn replace_with_missing(&self, token: &str) -> Result<Self> {
        let mut frame = self.frame.clone();
        for column in self.frame.get_columns() {
            if column.dtype() != &DataType::String {
                continue;
            }
            let values: Vec<Option<String>> = column
                .as_materialized_series()
                .str()?
                .into_iter()
                .map(|v| v.filter(|s| *s != token).map(str::to_string))
                .collect();
            frame.with_column(reinfer_text(column.name().clone(), &values))?;
        }
        Ok(Self::new(frame))
    }

    /// Rows at `indices`, in that order
    pub fn take_rows(&self, indices: &[usize]) -> Result<Self> {
        let idx = IdxCa::from_vec(
            "idx".into(),
            indices.iter().map(|&i| i as IdxSize).collect(),
        );
        Ok(Self::new(self.frame.take(&idx)?))
    }

    /// Reproducible random partition into (train, test).
    ///
    /// The test side receives `ratio.test_rows(n)` rows. Identical input
    /// order and seed always produce identical partitions.
    pub fn train_test_split(&self, ratio: SplitRatio, seed: u64) -> Result<(Self, Self)> {
        let n = self.height();
        let n_test = ratio.test_rows(n);
        if n_test == 0 || n_test == n {
            return Err(PipelineError::DataError(format!(
                "cannot split {} rows with test ratio {}: one side would be empty",
                n, ratio
            )));
        }

        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let (test_idx, train_idx) = indices.split_at(n_test);
        Ok((self.take_rows(train_idx)?, self.take_rows(test_idx)?))
    }

    /// Column values as floats, `None` for missing or non-numeric cells
    pub fn column_values(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let column = self
            .frame
            .column(name)
            .map_err(|_| PipelineError::MissingColumn(name.to_string()))?;
        let cast = column.cast(&DataType::Float64)?;
        Ok(cast.f64()?.into_iter().collect())
    }

    /// Single column as a dense vector; missing cells become NaN
    pub fn column_array(&self, name: &str) -> Result<Array1<f64>> {
        Ok(self
            .column_values(name)?
            .into_iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect())
    }

    /// Row-major matrix of the named columns; missing cells become NaN
    pub fn to_matrix(&self, names: &[String]) -> Result<Array2<f64>> {
        let columns = names
            .iter()
            .map(|name| self.column_array(name))
            .collect::<Result<Vec<Array1<f64>>>>()?;
        Ok(Array2::from_shape_fn(
            (self.height(), columns.len()),
            |(r, c)| columns[c][r],
        ))
    }

    /// Matrix of every column, in frame order
    pub fn to_full_matrix(&self) -> Result<Array2<f64>> {
        self.to_matrix(&self.column_names())
    }

    pub fn with_column(&self, column: Column) -> Result<Self> {
        let mut frame = self.frame.clone();
        frame.with_column(column)?;
        Ok(Self::new(frame))
    }
}

impl From<DataFrame> for Dataset {
    fn from(frame: DataFrame) -> Self {
        Self::new(frame)
    }
}

fn json_column(name: &str, values: &[&Value]) -> Column {
    let present: Vec<&Value> = values.iter().copied().filter(|v| !v.is_null()).collect();

    if !present.is_empty() && present.iter().all(|v| v.is_i64()) {
        let data: Vec<Option<i64>> = values.iter().map(|v| v.as_i64()).collect();
        return Series::new(name.into(), data).into();
    }
    if !present.is_empty() && present.iter().all(|v| v.is_number()) {
        let data: Vec<Option<f64>> = values.iter().map(|v| v.as_f64()).collect();
        return Series::new(name.into(), data).into();
    }
    if !present.is_empty() && present.iter().all(|v| v.is_boolean()) {
        let data: Vec<Option<bool>> = values.iter().map(|v| v.as_bool()).collect();
        return Series::new(name.into(), data).into();
    }

    let data: Vec<Option<String>> = values
        .iter()
        .map(|v| match v {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        })
        .collect();
    reinfer_text(name.into(), &data)
}

fn reinfer_text(name: PlSmallStr, values: &[Option<String>]) -> Column {
    let present = || values.iter().flatten();
    let any_present = present().next().is_some();

    if any_present && present().all(|s| s.trim().parse::<i64>().is_ok()) {
        let data: Vec<Option<i64>> = values
            .iter()
            .map(|v| v.as_ref().and_then(|s| s.trim().parse().ok()))
            .collect();
        return Series::new(name, data).into();
    }
    if any_present && present().all(|s| s.trim().parse::<f64>().is_ok()) {
        let data: Vec<Option<f64>> = values
            .iter()
            .map(|v| v.as_ref().and_then(|s| s.trim().parse().ok()))
            .collect();
        return Series::new(name, data).into();
    }
    Series::new(name, values.to_vec()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_split_ratio_bounds() {
        assert!(SplitRatio::new(0.2).is_ok());
        assert!(SplitRatio::new(0.0).is_err());
        assert!(SplitRatio::new(1.0).is_err());
        assert!(SplitRatio::new(f64::NAN).is_err());
        assert_eq!(SplitRatio::new(0.2).unwrap().test_rows(100), 20);
        assert_eq!(SplitRatio::new(0.25).unwrap().test_rows(10), 3);
    }

    #[test]
    fn test_from_records_infers_kinds() {
        let records = vec![
            record(json!({"_id": "a", "x": 1, "y": 0.5, "z": "na"})),
            record(json!({"_id": "b", "x": -1, "y": 2, "z": "1"})),
        ];
        let ds = Dataset::from_records(&records).unwrap();

        assert_eq!(ds.column_names(), vec!["_id", "x", "y", "z"]);
        assert_eq!(ds.column_kind("x").unwrap(), ColumnKind::Integer);
        assert_eq!(ds.column_kind("y").unwrap(), ColumnKind::Float);
        assert_eq!(ds.column_kind("z").unwrap(), ColumnKind::Text);

        let cleaned = ds.replace_with_missing("na").unwrap().drop_column("_id").unwrap();
        assert_eq!(cleaned.column_kind("z").unwrap(), ColumnKind::Integer);
        assert_eq!(cleaned.column_values("z").unwrap(), vec![None, Some(1.0)]);
        assert!(!cleaned.has_column("_id"));
    }

    #[test]
    fn test_missing_column_errors() {
        let ds = Dataset::new(df!("a" => &[1i64, 2]).unwrap());
        assert!(matches!(ds.drop_column("b"), Err(PipelineError::MissingColumn(_))));
        assert!(matches!(ds.column_kind("b"), Err(PipelineError::MissingColumn(_))));
    }

    #[test]
    fn test_split_is_reproducible_and_disjoint() {
        let ids: Vec<i64> = (0..50).collect();
        let ds = Dataset::new(df!("id" => &ids).unwrap());
        let ratio = SplitRatio::new(0.2).unwrap();

        let (train_a, test_a) = ds.train_test_split(ratio, 7).unwrap();
        let (train_b, test_b) = ds.train_test_split(ratio, 7).unwrap();

        assert_eq!(train_a.height(), 40);
        assert_eq!(test_a.height(), 10);
        assert_eq!(train_a.column_values("id").unwrap(), train_b.column_values("id").unwrap());
        assert_eq!(test_a.column_values("id").unwrap(), test_b.column_values("id").unwrap());

        let mut all: Vec<i64> = train_a
            .column_values("id")
            .unwrap()
            .into_iter()
            .chain(test_a.column_values("id").unwrap())
            .map(|v| v.unwrap() as i64)
            .collect();
        all.sort();
        assert_eq!(all, ids);
    }

    #[test]
    fn test_to_matrix_maps_nulls_to_nan() {
        let ds = Dataset::new(
            df!("a" => &[Some(1.0), None], "b" => &[Some(3i64), Some(4)]).unwrap(),
        );
        let m = ds.to_full_matrix().unwrap();
        assert_eq!(m.shape(), &[2, 2]);
        assert_eq!(m[[0, 0]], 1.0);
        assert!(m[[1, 0]].is_nan());
        assert_eq!(m[[1, 1]], 4.0);
    }
}
