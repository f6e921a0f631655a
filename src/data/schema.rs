//! Declared dataset schema and advisory schema checks

use super::Dataset;
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use tracing::{info, warn};

/// On-disk layout: `columns` is a list of single-entry `name: kind` maps
#[derive(Debug, Deserialize, Serialize)]
struct SchemaDocument {
    columns: Vec<BTreeMap<String, String>>,
    #[serde(default)]
    numerical_columns: Vec<String>,
}

/// Ordered column declarations plus the subset declared numerical
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    columns: Vec<(String, String)>,
    numerical_columns: Vec<String>,
}

impl Schema {
    /// Build a schema, rejecting duplicate column names
    pub fn new(columns: Vec<(String, String)>, numerical_columns: Vec<String>) -> Result<Self> {
        let mut seen = HashSet::new();
        for (name, _) in &columns {
            if !seen.insert(name.as_str()) {
                return Err(PipelineError::ConfigError(format!(
                    "duplicate column '{}' in schema",
                    name
                )));
            }
        }
        Ok(Self {
            columns,
            numerical_columns,
        })
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let doc: SchemaDocument = serde_yaml::from_str(text)?;
        let mut columns = Vec::with_capacity(doc.columns.len());
        for entry in doc.columns {
            if entry.len() != 1 {
                return Err(PipelineError::ConfigError(format!(
                    "schema column entries must have exactly one name, got {}",
                    entry.len()
                )));
            }
            columns.extend(entry);
        }
        Self::new(columns, doc.numerical_columns)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::ConfigError(format!("cannot read schema {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        let doc = SchemaDocument {
            columns: self
                .columns
                .iter()
                .map(|(name, kind)| BTreeMap::from([(name.clone(), kind.clone())]))
                .collect(),
            numerical_columns: self.numerical_columns.clone(),
        };
        Ok(serde_yaml::to_string(&doc)?)
    }

    pub fn columns(&self) -> &[(String, String)] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn numerical_columns(&self) -> &[String] {
        &self.numerical_columns
    }
}

/// Advisory checks of a dataset against a [`Schema`].
///
/// Mismatches are logged and reported as `false`; they never abort a run.
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    schema: Schema,
}

impl SchemaValidator {
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// True iff the dataset has as many columns as the schema declares
    pub fn column_count_matches(&self, dataset: &Dataset) -> bool {
        let required = self.schema.columns().len();
        let actual = dataset.width();
        info!(required, actual, "checking column count");
        if required != actual {
            warn!(required, actual, "column count does not match schema");
        }
        required == actual
    }

    /// True iff the number of integer-valued columns equals the number of
    /// declared numerical columns. Only the counts are compared, so a
    /// dataset with the right count of the wrong columns still passes.
    pub fn numerical_columns_match(&self, dataset: &Dataset) -> bool {
        let required: BTreeSet<String> = self.schema.numerical_columns().iter().cloned().collect();
        let actual: BTreeSet<String> = dataset.integer_columns().into_iter().collect();

        let matches = required.len() == actual.len();
        if !matches {
            let missing: Vec<&String> = required.difference(&actual).collect();
            let unexpected: Vec<&String> = actual.difference(&required).collect();
            warn!(
                required = required.len(),
                actual = actual.len(),
                ?missing,
                ?unexpected,
                "numerical column count does not match schema"
            );
        }
        matches
    }
}
