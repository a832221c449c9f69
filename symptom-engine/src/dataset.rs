//! Loading of the tabular inputs: the training table that yields the symptom
//! catalog and disease profiles, and the raw rows of the doctor table.
//!
//! Both are read with the `csv` crate. Cells are trimmed on read.

use csv::{ReaderBuilder, Trim};
use std::{collections::BTreeMap, fs::File, io::Read, path::Path};
use tracing::{info, warn};

use crate::{
    catalog::SymptomCatalog,
    error::{DiagnosisError, Result},
    profile::DiseaseProfileTable,
};

/// Name of the column holding the disease label in the training table
pub const DEFAULT_LABEL_COLUMN: &str = "prognosis";

/// Header row plus data rows of a training dataset, still as text
#[derive(Debug, Clone, Default)]
pub struct TrainingTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TrainingTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Reads a CSV document whose first record is the header row.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);

        let headers = reader
            .headers()
            .map_err(|e| DiagnosisError::DataFormat(format!("unreadable header row: {}", e)))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for (row_idx, record) in reader.records().enumerate() {
            let record = record.map_err(|e| {
                DiagnosisError::DataFormat(format!("unreadable row {}: {}", row_idx + 1, e))
            })?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { headers, rows })
    }

    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let table = Self::from_reader(file)?;
        info!(
            path = %path.display(),
            columns = table.headers.len(),
            rows = table.rows.len(),
            "Loaded training table"
        );
        Ok(table)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }
}

/// Symptom catalog and disease profiles derived from a training table
#[derive(Debug, Clone)]
pub struct TrainingData {
    catalog: SymptomCatalog,
    profiles: DiseaseProfileTable,
}

impl TrainingData {
    /// Derives the catalog and the profiles from a training table.
    ///
    /// Every column other than `label_column` is a symptom indicator, in file
    /// order. A blank symptom header is a format error.
    /// Each disease profile is the element-wise maximum of that disease's rows.
    pub fn from_table(table: &TrainingTable, label_column: &str) -> Result<Self> {
        let headers = table.headers();
        let label_idx = headers
            .iter()
            .position(|h| h == label_column)
            .ok_or_else(|| {
                DiagnosisError::DataFormat(format!(
                    "label column '{}' not found in training table",
                    label_column
                ))
            })?;

        let indicator_columns: Vec<usize> =
            (0..headers.len()).filter(|&idx| idx != label_idx).collect();
        if let Some(blank) = indicator_columns.iter().find(|&&idx| headers[idx].is_empty()) {
            return Err(DiagnosisError::DataFormat(format!(
                "training column {} has a blank header",
                blank + 1
            )));
        }

        let catalog =
            SymptomCatalog::new(indicator_columns.iter().map(|&idx| headers[idx].clone()))?;

        let mut aggregates: BTreeMap<String, Vec<u8>> = BTreeMap::new();
        for (row_idx, row) in table.rows().iter().enumerate() {
            let row_number = row_idx + 1;
            if row.len() != headers.len() {
                return Err(DiagnosisError::DataFormat(format!(
                    "row {} has {} cells, header has {}",
                    row_number,
                    row.len(),
                    headers.len()
                )));
            }

            let label = &row[label_idx];
            if label.is_empty() {
                return Err(DiagnosisError::DataFormat(format!(
                    "row {} has an empty '{}' label",
                    row_number, label_column
                )));
            }

            let presence = aggregates
                .entry(label.clone())
                .or_insert_with(|| vec![0; catalog.len()]);
            for (feature, &column) in indicator_columns.iter().enumerate() {
                let value = parse_indicator(&row[column]).ok_or_else(|| {
                    DiagnosisError::DataFormat(format!(
                        "row {}, column '{}': '{}' is not 0 or 1",
                        row_number, headers[column], row[column]
                    ))
                })?;
                presence[feature] = presence[feature].max(value);
            }
        }

        if aggregates.is_empty() {
            warn!("Training table has no rows; every disease profile lookup will fail");
        }

        let profiles = DiseaseProfileTable::from_aggregates(&catalog, aggregates);
        info!(
            symptoms = catalog.len(),
            diseases = profiles.len(),
            "Built symptom catalog and disease profiles"
        );

        Ok(Self { catalog, profiles })
    }

    pub fn load(path: impl AsRef<Path>, label_column: &str) -> Result<Self> {
        let table = TrainingTable::from_csv_path(path)?;
        Self::from_table(&table, label_column)
    }

    pub fn catalog(&self) -> &SymptomCatalog {
        &self.catalog
    }

    pub fn profiles(&self) -> &DiseaseProfileTable {
        &self.profiles
    }

    pub fn into_parts(self) -> (SymptomCatalog, DiseaseProfileTable) {
        (self.catalog, self.profiles)
    }
}

/// Reads a 0/1 indicator cell; `1.0` and `0.0` count too.
fn parse_indicator(cell: &str) -> Option<u8> {
    let value: f64 = cell.trim().parse().ok()?;
    if value == 0.0 {
        Some(0)
    } else if value == 1.0 {
        Some(1)
    } else {
        None
    }
}

/// Reads a headerless CSV document into raw rows.
pub fn read_headerless_rows<R: Read>(reader: R) -> Result<Vec<Vec<String>>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (row_idx, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            DiagnosisError::DataFormat(format!("unreadable row {}: {}", row_idx + 1, e))
        })?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}
