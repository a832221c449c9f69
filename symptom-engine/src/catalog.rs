use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{DiagnosisError, Result};

/// Ordered vocabulary of canonical symptom names.
///
/// A symptom's position in the catalog is its feature index: the column it
/// occupies in a [`FeatureVector`](crate::FeatureVector) and the index tree
/// nodes split on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct SymptomCatalog {
    symptoms: Vec<String>,
    #[serde(skip)]
    positions: HashMap<String, usize>,
}

impl SymptomCatalog {
    /// Builds a catalog from names in feature order.
    ///
    /// Empty or duplicate names are rejected, since either would make two
    /// feature columns indistinguishable.
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut symptoms = Vec::new();
        let mut positions = HashMap::new();

        for name in names {
            let name: String = name.into();
            if name.trim().is_empty() {
                return Err(DiagnosisError::DataFormat(format!(
                    "empty symptom name at column {}",
                    symptoms.len()
                )));
            }
            if positions.insert(name.clone(), symptoms.len()).is_some() {
                return Err(DiagnosisError::DataFormat(format!(
                    "duplicate symptom name '{}'",
                    name
                )));
            }
            symptoms.push(name);
        }

        Ok(Self { symptoms, positions })
    }

    pub fn len(&self) -> usize {
        self.symptoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symptoms.is_empty()
    }

    /// Feature index of an exact canonical name
    pub fn index_of(&self, symptom: &str) -> Option<usize> {
        self.positions.get(symptom).copied()
    }

    pub fn contains(&self, symptom: &str) -> bool {
        self.positions.contains_key(symptom)
    }

    /// Canonical name at a feature index
    pub fn name(&self, index: usize) -> Option<&str> {
        self.symptoms.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.symptoms.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.symptoms
    }
}

impl TryFrom<Vec<String>> for SymptomCatalog {
    type Error = DiagnosisError;

    fn try_from(names: Vec<String>) -> Result<Self> {
        Self::new(names)
    }
}

impl From<SymptomCatalog> for Vec<String> {
    fn from(catalog: SymptomCatalog) -> Self {
        catalog.symptoms
    }
}
