use serde::Serialize;
use std::collections::BTreeMap;

use crate::{
    catalog::SymptomCatalog,
    error::{DiagnosisError, Result},
};

/// Typical symptoms per disease label.
///
/// A symptom is typical for a disease when at least one training case with that
/// label reported it. Labels iterate in sorted order and each profile lists its
/// symptoms in catalog order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiseaseProfileTable {
    profiles: BTreeMap<String, Vec<String>>,
}

impl DiseaseProfileTable {
    /// Builds profiles from per-label presence vectors already max-aggregated
    /// over that label's training rows.
    pub(crate) fn from_aggregates(
        catalog: &SymptomCatalog,
        aggregates: BTreeMap<String, Vec<u8>>,
    ) -> Self {
        let profiles = aggregates
            .into_iter()
            .map(|(label, presence)| {
                let symptoms = presence
                    .iter()
                    .enumerate()
                    .filter(|(_, value)| **value == 1)
                    .filter_map(|(index, _)| catalog.name(index).map(str::to_string))
                    .collect();
                (label, symptoms)
            })
            .collect();
        Self { profiles }
    }

    /// Builds profiles from explicit symptom lists.
    ///
    /// Every symptom must be in the catalog. A label given more than once gets
    /// the union of its lists.
    pub fn from_profiles<I, L, S>(catalog: &SymptomCatalog, profiles: I) -> Result<Self>
    where
        I: IntoIterator<Item = (L, Vec<S>)>,
        L: Into<String>,
        S: AsRef<str>,
    {
        let mut aggregates: BTreeMap<String, Vec<u8>> = BTreeMap::new();
        for (label, symptoms) in profiles {
            let presence = aggregates
                .entry(label.into())
                .or_insert_with(|| vec![0; catalog.len()]);
            for symptom in symptoms {
                let symptom = symptom.as_ref();
                let index = catalog
                    .index_of(symptom)
                    .ok_or_else(|| DiagnosisError::UnknownSymptom(symptom.to_string()))?;
                presence[index] = 1;
            }
        }
        Ok(Self::from_aggregates(catalog, aggregates))
    }

    pub fn typical_symptoms(&self, disease: &str) -> Option<&[String]> {
        self.profiles.get(disease).map(Vec::as_slice)
    }

    pub fn contains(&self, disease: &str) -> bool {
        self.profiles.contains_key(disease)
    }

    /// Disease labels in sorted order
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
