// Named table persistence in a single JSON document

use crate::error::TableError;
use crate::table::{Grid, InterpolationTable, TableValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// On-disk form of one table.
#[derive(Debug, Serialize, Deserialize)]
struct TableRecord<T> {
    lower: Vec<f64>,
    upper: Vec<f64>,
    shape: Vec<usize>,
    values: Vec<T>,
}

/// A JSON file holding tables keyed by name, e.g. `"Boltzmann/Qq2Qq/rate/zero"`.
///
/// Saving a table rewrites the document with that one entry replaced and
/// leaves every other entry alone, so several processes can share a file.
#[derive(Debug, Clone)]
pub struct TableStore {
    path: PathBuf,
}

impl TableStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> TableError {
        TableError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn read_document(&self) -> Result<Map<String, Value>, TableError> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let text = fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        if text.trim().is_empty() {
            return Ok(Map::new());
        }
        Ok(serde_json::from_str(&text)?)
    }

    fn write_document(&self, document: &Map<String, Value>) -> Result<(), TableError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        let text = serde_json::to_string(document)?;
        fs::write(&tmp, text).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))
    }

    /// Table names present in the store.
    pub fn names(&self) -> Result<Vec<String>, TableError> {
        Ok(self.read_document()?.keys().cloned().collect())
    }

    /// Persist a filled table under its own name.
    pub fn save<T: TableValue, const N: usize>(
        &self,
        table: &InterpolationTable<T, N>,
    ) -> Result<(), TableError> {
        let values = table
            .values()
            .ok_or_else(|| TableError::NotFilled(table.name().to_string()))?;
        let grid = table.grid();
        let record = TableRecord {
            lower: grid.lower.to_vec(),
            upper: grid.upper.to_vec(),
            shape: grid.shape.to_vec(),
            values: values.to_vec(),
        };
        let mut document = self.read_document()?;
        document.insert(table.name().to_string(), serde_json::to_value(record)?);
        self.write_document(&document)?;
        log::debug!(
            "Saved table '{}' ({} points) to {}",
            table.name(),
            values.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Restore a table saved under its name; the stored grid must equal the table's grid.
    pub fn load<T: TableValue, const N: usize>(
        &self,
        table: &mut InterpolationTable<T, N>,
    ) -> Result<(), TableError> {
        let mut document = self.read_document()?;
        let value = document
            .remove(table.name())
            .ok_or_else(|| TableError::Missing {
                name: table.name().to_string(),
                path: self.path.display().to_string(),
            })?;
        let record: TableRecord<T> = serde_json::from_value(value)?;
        if !grid_matches(table.grid(), &record) {
            return Err(TableError::GridMismatch(table.name().to_string()));
        }
        table.fill(record.values)
    }
}

fn grid_matches<T, const N: usize>(grid: &Grid<N>, record: &TableRecord<T>) -> bool {
    record.lower.as_slice() == grid.lower.as_slice()
        && record.upper.as_slice() == grid.upper.as_slice()
        && record.shape.as_slice() == grid.shape.as_slice()
}
