//! Formula Fields Report.
//!
//! Source formulas are never translated; their calculated values are written
//! as static cells and every formula-bearing field is listed in this CSV so
//! the owning team can rebuild the formulas by hand.

use crate::error::{MigrationError, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// One reported formula field.
#[derive(Debug, Clone, Serialize)]
pub struct FormulaFieldEntry {
    #[serde(rename = "Workspace Name")]
    pub workspace_name: String,
    #[serde(rename = "Workspace ID")]
    pub workspace_id: u64,
    #[serde(rename = "Sheet Name")]
    pub sheet_name: String,
    #[serde(rename = "Sheet ID")]
    pub sheet_id: u64,
    #[serde(rename = "Column Name")]
    pub column_name: String,
    #[serde(rename = "Column ID")]
    pub column_id: u64,
    #[serde(rename = "Internal Field Name")]
    pub internal_field_name: String,
    #[serde(rename = "Display Name")]
    pub display_name: String,
    #[serde(rename = "Entity Type")]
    pub entity_type: String,
    #[serde(rename = "Sample Values")]
    pub sample_values: String,
}

/// Accumulates entries across concurrent projects and writes one CSV.
pub struct FormulaFieldsReport {
    path: PathBuf,
    entries: Mutex<Vec<FormulaFieldEntry>>,
}

impl FormulaFieldsReport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, entry: FormulaFieldEntry) {
        self.entries.lock().await.push(entry);
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Write the collected entries. A run with no formula fields writes
    /// nothing and leaves no file behind.
    pub async fn write(&self) -> Result<usize> {
        let entries = self.entries.lock().await;
        if entries.is_empty() {
            return Ok(0);
        }
        let mut writer = csv::Writer::from_path(&self.path).map_err(|e| {
            MigrationError::config(format!(
                "cannot write formula report {}: {e}",
                self.path.display()
            ))
        })?;
        for entry in entries.iter() {
            writer
                .serialize(entry)
                .map_err(|e| MigrationError::data(format!("formula report row failed: {e}")))?;
        }
        writer
            .flush()
            .map_err(|e| MigrationError::data(format!("formula report flush failed: {e}")))?;
        Ok(entries.len())
    }
}
