use serde::{Deserialize, Serialize};
use symptom_engine::{Answer, DiagnosisResult, Question};

#[derive(Debug, Serialize, Deserialize)]
pub struct DiagnoseRequest {
    pub symptoms: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DiagnoseResponse {
    pub result: DiagnosisResult,
    /// Inputs that matched no catalog symptom
    pub unmatched: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MatchRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnswerRequest {
    pub answer: Answer,
}

#[derive(Debug, Default, Deserialize)]
pub struct SymptomQuery {
    pub prefix: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionView {
    pub session_id: String,
    /// "asking" or "resolved"
    pub status: String,
    pub question: Option<Question>,
    pub affirmed_symptoms: Vec<String>,
    pub result: Option<DiagnosisResult>,
}
