use thiserror::Error;

/// Errors produced while loading diagnosis data or running a diagnosis
#[derive(Error, Debug)]
pub enum DiagnosisError {
    /// Initialization data (training table, doctor table, tree artifact) is malformed
    #[error("Data format error: {0}")]
    DataFormat(String),

    /// A symptom outside the catalog reached the encoder
    #[error("Unknown symptom: {0}")]
    UnknownSymptom(String),

    /// None of the reported symptoms could be resolved against the catalog
    #[error("No recognised symptoms were provided")]
    NoSymptoms,

    /// The classification structure produced a label with no disease profile
    #[error("Disease '{0}' has no profile entry")]
    ProfileLookup(String),

    /// The traversal state machine was driven outside its contract
    #[error("Invalid traversal state: {0}")]
    InvalidState(String),

    #[error("Feature vector has length {actual}, expected {expected}")]
    VectorLength { expected: usize, actual: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DiagnosisError {
    /// Whether the caller should treat this as user guidance rather than a failure.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DiagnosisError::NoSymptoms)
    }
}

pub type Result<T> = std::result::Result<T, DiagnosisError>;
