use symptom_engine::DiagnosisError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error(transparent)]
    Engine(#[from] DiagnosisError),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
