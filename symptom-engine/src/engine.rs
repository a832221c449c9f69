use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    catalog::SymptomCatalog,
    config::EngineConfig,
    dataset::TrainingData,
    directory::DoctorDirectory,
    encoder::encode,
    error::{DiagnosisError, Result},
    matcher::{SymptomMatch, SymptomMatcher},
    profile::DiseaseProfileTable,
    traversal::TraversalState,
    tree::ClassificationTree,
};

/// Outcome of a diagnosis in either mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisResult {
    pub disease: String,
    pub symptoms_reported: Vec<String>,
    pub symptoms_typical: Vec<String>,
    pub confidence: f64,
    pub doctor_name: Option<String>,
    pub doctor_reference: Option<String>,
}

/// Raw inputs split into catalog symptoms and inputs nothing matched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymptomResolution {
    /// Canonical symptoms in order of first appearance, without repeats
    pub matched: Vec<String>,
    /// Inputs that cleared no threshold, as given
    pub unmatched: Vec<String>,
}

/// Share of a disease's typical symptoms that were reported.
///
/// Defined as 0.0 when the disease has no typical symptoms.
pub fn confidence<S, T>(reported: &[S], typical: &[T]) -> f64
where
    S: AsRef<str>,
    T: AsRef<str>,
{
    if typical.is_empty() {
        return 0.0;
    }
    let shared = typical
        .iter()
        .filter(|symptom| {
            reported
                .iter()
                .any(|reported| reported.as_ref() == symptom.as_ref())
        })
        .count();
    shared as f64 / typical.len() as f64
}

/// Read-only diagnosis engine.
///
/// Holds the catalog, profiles, tree and doctor directory built at startup.
/// Nothing here mutates after construction, so one engine can sit behind an
/// `Arc` and serve any number of callers.
pub struct DiagnosisEngine {
    catalog: SymptomCatalog,
    matcher: SymptomMatcher,
    profiles: DiseaseProfileTable,
    tree: ClassificationTree,
    doctors: DoctorDirectory,
}

impl DiagnosisEngine {
    pub fn new(
        catalog: SymptomCatalog,
        profiles: DiseaseProfileTable,
        tree: ClassificationTree,
        doctors: DoctorDirectory,
    ) -> Result<Self> {
        let matcher = SymptomMatcher::new(&catalog);
        Self::with_matcher(catalog, matcher, profiles, tree, doctors)
    }

    pub fn with_matcher(
        catalog: SymptomCatalog,
        matcher: SymptomMatcher,
        profiles: DiseaseProfileTable,
        tree: ClassificationTree,
        doctors: DoctorDirectory,
    ) -> Result<Self> {
        if tree.feature_count() != catalog.len() {
            return Err(DiagnosisError::DataFormat(format!(
                "classification tree expects {} features but the catalog has {} symptoms",
                tree.feature_count(),
                catalog.len()
            )));
        }
        for label in tree.labels() {
            if !profiles.contains(label) {
                warn!(disease = %label, "Tree leaf label has no disease profile");
            }
        }

        Ok(Self {
            catalog,
            matcher,
            profiles,
            tree,
            doctors,
        })
    }

    /// Loads every input named by the configuration and assembles an engine.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        config.validate()?;

        let (catalog, profiles) =
            TrainingData::load(&config.training_path, &config.label_column)?.into_parts();
        let tree = ClassificationTree::load(&config.tree_path, &catalog)?;
        let diseases: Vec<&str> = profiles.labels().collect();
        let doctors = DoctorDirectory::load(&config.doctors_path, &diseases)?;
        let matcher = SymptomMatcher::with_threshold(&catalog, config.match_threshold)?;

        let engine = Self::with_matcher(catalog, matcher, profiles, tree, doctors)?;
        info!(
            symptoms = engine.catalog.len(),
            diseases = engine.profiles.len(),
            tree_nodes = engine.tree.len(),
            doctors = engine.doctors.len(),
            match_threshold = engine.matcher.threshold(),
            "Diagnosis engine ready"
        );
        Ok(engine)
    }

    pub fn catalog(&self) -> &SymptomCatalog {
        &self.catalog
    }

    pub fn profiles(&self) -> &DiseaseProfileTable {
        &self.profiles
    }

    pub fn tree(&self) -> &ClassificationTree {
        &self.tree
    }

    pub fn doctors(&self) -> &DoctorDirectory {
        &self.doctors
    }

    pub fn match_symptom(&self, raw_text: &str) -> Option<SymptomMatch> {
        self.matcher.match_symptom(raw_text)
    }

    pub fn resolve_symptoms<S: AsRef<str>>(&self, symptom_texts: &[S]) -> SymptomResolution {
        let mut resolution = SymptomResolution::default();
        for text in symptom_texts {
            let text = text.as_ref();
            match self.matcher.match_symptom(text) {
                Some(found) => {
                    if !resolution.matched.contains(&found.symptom) {
                        resolution.matched.push(found.symptom);
                    }
                }
                None => {
                    if !text.trim().is_empty() {
                        resolution.unmatched.push(text.to_string());
                    }
                }
            }
        }
        resolution
    }

    /// One-shot diagnosis from free-text symptoms.
    pub fn diagnose<S: AsRef<str>>(&self, symptom_texts: &[S]) -> Result<DiagnosisResult> {
        let resolution = self.resolve_symptoms(symptom_texts);
        if !resolution.unmatched.is_empty() {
            info!(unmatched = ?resolution.unmatched, "Some symptoms were not recognised");
        }
        self.diagnose_matched(&resolution.matched)
    }

    /// One-shot diagnosis from canonical symptom names.
    pub fn diagnose_matched<S: AsRef<str>>(&self, symptoms: &[S]) -> Result<DiagnosisResult> {
        let mut reported: Vec<String> = Vec::with_capacity(symptoms.len());
        for symptom in symptoms {
            let symptom = symptom.as_ref();
            if !reported.iter().any(|seen| seen == symptom) {
                reported.push(symptom.to_string());
            }
        }
        if reported.is_empty() {
            return Err(DiagnosisError::NoSymptoms);
        }

        let vector = encode(&self.catalog, &reported)?;
        let disease = self.tree.predict(&vector)?.to_string();
        self.conclude(&disease, reported)
    }

    /// Builds the result for a known disease: typical symptoms, confidence and
    /// doctor recommendation.
    pub fn conclude(&self, disease: &str, reported: Vec<String>) -> Result<DiagnosisResult> {
        let typical = self
            .profiles
            .typical_symptoms(disease)
            .ok_or_else(|| DiagnosisError::ProfileLookup(disease.to_string()))?;
        let confidence = confidence(&reported, typical);
        let doctor = self.doctors.lookup(disease);

        info!(
            disease = %disease,
            reported = reported.len(),
            typical = typical.len(),
            confidence,
            has_doctor = doctor.is_some(),
            "Diagnosis concluded"
        );

        Ok(DiagnosisResult {
            disease: disease.to_string(),
            symptoms_reported: reported,
            symptoms_typical: typical.to_vec(),
            confidence,
            doctor_name: doctor.map(|d| d.name.clone()),
            doctor_reference: doctor.map(|d| d.reference.clone()),
        })
    }

    pub fn start_traversal(&self) -> TraversalState {
        TraversalState::start(&self.tree)
    }

    /// Builds the result of a finished interactive traversal from its leaf
    /// label and affirmed symptoms.
    pub fn conclude_traversal(&self, state: &TraversalState) -> Result<DiagnosisResult> {
        let disease = state.resolved_label().ok_or_else(|| {
            DiagnosisError::InvalidState(format!(
                "traversal is still asking at node {}",
                state.current_node()
            ))
        })?;
        self.conclude(disease, state.affirmed_symptoms().to_vec())
    }
}
