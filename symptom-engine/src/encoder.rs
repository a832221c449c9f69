use serde::{Deserialize, Serialize};

use crate::{
    catalog::SymptomCatalog,
    error::{DiagnosisError, Result},
};

/// Binary presence vector aligned to catalog order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureVector(Vec<u8>);

impl FeatureVector {
    pub fn zeros(len: usize) -> Self {
        Self(vec![0; len])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Value at a feature index; out-of-range indices read as absent.
    pub fn get(&self, index: usize) -> u8 {
        self.0.get(index).copied().unwrap_or(0)
    }

    /// Marks a feature present.
    /// # Panics
    /// Panics if `index` is out of range.
    pub fn set(&mut self, index: usize) {
        self.0[index] = 1;
    }

    /// Indices holding a 1, ascending
    pub fn ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, value)| **value == 1)
            .map(|(index, _)| index)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

/// Encodes canonical symptom names as a [`FeatureVector`].
///
/// Every name is checked against the catalog even when it came out of the
/// matcher. Repeated names set the same position once.
pub fn encode<I, S>(catalog: &SymptomCatalog, symptoms: I) -> Result<FeatureVector>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut vector = FeatureVector::zeros(catalog.len());
    for symptom in symptoms {
        let symptom = symptom.as_ref();
        let index = catalog
            .index_of(symptom)
            .ok_or_else(|| DiagnosisError::UnknownSymptom(symptom.to_string()))?;
        vector.set(index);
    }
    Ok(vector)
}
