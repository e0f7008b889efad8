//! In-memory tabular dataset backed by CSV text.
//!
//! Cells are kept as the raw text read from storage, so a dataset written
//! back with [`Dataset::to_csv`] carries exactly the values it was loaded with.

use std::collections::HashSet;

use crate::error::{Error, Result};

/// A table of string cells with named, ordered columns.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Dataset {
    /// Build a dataset from column names and rows.
    ///
    /// # Errors
    /// Returns [`Error::Dataset`] if column names repeat or a row has the
    /// wrong number of cells.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        let mut seen = HashSet::new();
        for name in &columns {
            if !seen.insert(name.as_str()) {
                return Err(Error::Dataset(format!("duplicate column name: {name}")));
            }
        }

        if let Some((index, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(Error::Dataset(format!(
                "row {index} has {} cells, expected {}",
                row.len(),
                columns.len()
            )));
        }

        Ok(Self { columns, rows })
    }

    /// Parse comma-delimited text whose first record is the header row.
    ///
    /// # Errors
    /// Returns [`Error::Dataset`] if the text has no header or is not valid CSV.
    pub fn from_csv(text: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(text.as_bytes());

        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if columns.is_empty() || columns.iter().all(String::is_empty) {
            return Err(Error::Dataset("missing header row".to_string()));
        }

        let rows = reader
            .records()
            .map(|record| record.map(|r| r.iter().map(str::to_string).collect()))
            .collect::<std::result::Result<Vec<Vec<String>>, csv::Error>>()?;

        Self::new(columns, rows)
    }

    /// Serialize to comma-delimited text without a row index.
    ///
    /// With `include_header` false only data rows are written, which is the
    /// payload shape inference endpoints expect.
    ///
    /// # Errors
    /// Returns [`Error::Dataset`] if the CSV writer fails.
    pub fn to_csv(&self, include_header: bool) -> Result<String> {
        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());

        if include_header {
            writer.write_record(&self.columns)?;
        }
        for row in &self.rows {
            writer.write_record(row)?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| Error::Dataset(e.error().to_string()))?;
        String::from_utf8(bytes).map_err(|e| Error::Dataset(e.to_string()))
    }

    /// Column names in order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Data rows in order.
    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Values of one column, if present.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(|row| row[index].as_str()).collect())
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Remove the named columns, keeping every other column and every row.
    ///
    /// All names are checked before anything is removed, so on error the
    /// dataset is unchanged.
    ///
    /// # Errors
    /// Returns [`Error::MissingColumn`] for the first name not in the dataset.
    pub fn drop_columns<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()> {
        let mut doomed = HashSet::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let index = self
                .column_index(name)
                .ok_or_else(|| Error::MissingColumn(name.to_string()))?;
            doomed.insert(index);
        }

        let keep = |index: &usize| !doomed.contains(index);
        self.columns = std::mem::take(&mut self.columns)
            .into_iter()
            .enumerate()
            .filter(|(i, _)| keep(i))
            .map(|(_, c)| c)
            .collect();
        for row in &mut self.rows {
            *row = std::mem::take(row)
                .into_iter()
                .enumerate()
                .filter(|(i, _)| keep(i))
                .map(|(_, v)| v)
                .collect();
        }

        Ok(())
    }

    /// Set a column from one value per row, appending it if it is new.
    ///
    /// # Errors
    /// Returns [`Error::Dataset`] if `values` does not have one entry per row.
    pub fn set_column(&mut self, name: impl Into<String>, values: Vec<String>) -> Result<()> {
        let name = name.into();
        if values.len() != self.rows.len() {
            return Err(Error::Dataset(format!(
                "column {name} has {} values for {} rows",
                values.len(),
                self.rows.len()
            )));
        }

        match self.column_index(&name) {
            Some(index) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[index] = value;
                }
            }
            None => {
                self.columns.push(name);
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }

        Ok(())
    }
}
