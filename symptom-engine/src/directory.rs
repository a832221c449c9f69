use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs::File, path::Path};
use tracing::{info, warn};

use crate::{
    dataset::read_headerless_rows,
    error::{DiagnosisError, Result},
};

/// Specialist to consult for a disease, with a reference link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorRecommendation {
    pub name: String,
    pub reference: String,
}

/// Exact disease label → specialist mapping
#[derive(Debug, Clone, Default)]
pub struct DoctorDirectory {
    entries: HashMap<String, DoctorRecommendation>,
}

impl DoctorDirectory {
    /// Builds the directory from `(disease, name, reference)` triples.
    /// The first entry for a disease wins.
    pub fn from_entries<I, D, N, R>(entries: I) -> Self
    where
        I: IntoIterator<Item = (D, N, R)>,
        D: Into<String>,
        N: Into<String>,
        R: Into<String>,
    {
        let mut directory = Self::default();
        for (disease, name, reference) in entries {
            directory.insert_first(disease.into(), name.into(), reference.into());
        }
        directory
    }

    /// Builds the directory from raw doctor rows.
    ///
    /// Three-cell rows are `disease,name,reference`. Two-cell rows are
    /// `name,reference` and are paired by position with `diseases`, which should
    /// be the sorted disease labels of the training data.
    pub fn from_rows<S: AsRef<str>>(rows: Vec<Vec<String>>, diseases: &[S]) -> Result<Self> {
        let mut directory = Self::default();
        let mut positional = 0usize;

        for (row_idx, row) in rows.into_iter().enumerate() {
            let mut cells = row.into_iter();
            match (cells.next(), cells.next(), cells.next(), cells.next()) {
                (Some(disease), Some(name), Some(reference), None) => {
                    directory.insert_first(disease, name, reference);
                }
                (Some(name), Some(reference), None, None) => {
                    match diseases.get(positional) {
                        Some(disease) => {
                            directory.insert_first(disease.as_ref().to_string(), name, reference)
                        }
                        None => warn!(
                            row = row_idx + 1,
                            diseases = diseases.len(),
                            "Doctor row has no disease to pair with; ignoring"
                        ),
                    }
                    positional += 1;
                }
                _ => {
                    return Err(DiagnosisError::DataFormat(format!(
                        "doctor row {} must have 2 or 3 cells",
                        row_idx + 1
                    )));
                }
            }
        }

        Ok(directory)
    }

    /// Loads a headerless doctor CSV; see [`DoctorDirectory::from_rows`].
    pub fn load<S: AsRef<str>>(path: impl AsRef<Path>, diseases: &[S]) -> Result<Self> {
        let path = path.as_ref();
        let rows = read_headerless_rows(File::open(path)?)?;
        let directory = Self::from_rows(rows, diseases)?;
        info!(
            path = %path.display(),
            entries = directory.len(),
            "Loaded doctor directory"
        );
        Ok(directory)
    }

    fn insert_first(&mut self, disease: String, name: String, reference: String) {
        if self.entries.contains_key(&disease) {
            warn!(disease = %disease, "Duplicate doctor entry ignored");
            return;
        }
        self.entries
            .insert(disease, DoctorRecommendation { name, reference });
    }

    pub fn lookup(&self, disease: &str) -> Option<&DoctorRecommendation> {
        self.entries.get(disease)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
