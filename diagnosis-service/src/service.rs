use axum::{
    Router,
    extract::{Path, Query, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::{Next, from_fn},
    response::{Json, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use std::sync::Arc;
use symptom_engine::{DiagnosisEngine, DiagnosisError, SymptomMatch, normalize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, error, info, warn};
use uuid::Uuid;

use crate::{
    error::ServiceError,
    models::{
        AnswerRequest, DiagnoseRequest, DiagnoseResponse, MatchRequest, SessionView, SymptomQuery,
    },
    runner::TraversalRunner,
    sessions::{InMemorySessionStorage, SessionStorage},
};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

const CORRELATION_HEADER: &str = "x-correlation-id";

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "session_id": id
        })),
    )
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

fn service_error(err: ServiceError) -> ApiError {
    match err {
        ServiceError::SessionNotFound(id) => not_found_error("Session not found", &id),
        ServiceError::Engine(DiagnosisError::NoSymptoms) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "error": DiagnosisError::NoSymptoms.to_string(),
                "hint": "Describe at least one symptom, e.g. 'fever' or 'headache'. GET /symptoms lists them all."
            })),
        ),
        ServiceError::Engine(DiagnosisError::InvalidState(details)) => (
            StatusCode::CONFLICT,
            Json(json!({
                "error": "Session cannot accept this request",
                "details": details
            })),
        ),
        other => {
            error!("Request failed: {}", other);
            internal_error("Diagnosis failed", &other.to_string())
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DiagnosisEngine>,
    pub runner: TraversalRunner,
}

/// Builds the router; sessions idle for longer than `session_idle_timeout` are dropped.
pub fn create_app(engine: Arc<DiagnosisEngine>, session_idle_timeout: chrono::Duration) -> Router {
    let session_storage: Arc<dyn SessionStorage> = Arc::new(InMemorySessionStorage::new());
    let runner = TraversalRunner::new(engine.clone(), session_storage, session_idle_timeout);
    build_router(AppState { engine, runner })
}

fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/symptoms", get(list_symptoms))
        .route("/symptoms/match", post(match_symptom))
        .route("/diagnose", post(diagnose))
        .route("/sessions", post(start_session))
        .route("/sessions/{session_id}", get(get_session).delete(abandon_session))
        .route("/sessions/{session_id}/answer", post(answer_question))
        .layer(from_fn(correlation_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Tags every request with a correlation id span and echoes the id back
async fn correlation_id_middleware(mut request: Request, next: Next) -> Response {
    let correlation_id = request
        .headers()
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let header = HeaderValue::from_str(&correlation_id).ok();
    if let Some(value) = &header {
        request.headers_mut().insert(CORRELATION_HEADER, value.clone());
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    let mut response = next.run(request).instrument(span).await;
    if let Some(value) = header {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Symptom Diagnosis Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Decision-tree diagnosis from reported symptoms, one-shot or one question at a time",
        "endpoints": {
            "GET /symptoms?prefix=": "List known symptoms",
            "POST /symptoms/match": "Match free text to a known symptom",
            "POST /diagnose": "Diagnose a list of symptoms",
            "POST /sessions": "Start an interactive diagnosis",
            "GET /sessions/{session_id}": "Current question or result",
            "POST /sessions/{session_id}/answer": "Answer yes or no",
            "DELETE /sessions/{session_id}": "Abandon a session",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn list_symptoms(
    State(state): State<AppState>,
    Query(query): Query<SymptomQuery>,
) -> Json<Vec<String>> {
    let prefix = query.prefix.as_deref().map(normalize).unwrap_or_default();
    Json(
        state
            .engine
            .catalog()
            .iter()
            .filter(|symptom| symptom.starts_with(&prefix))
            .map(str::to_string)
            .collect(),
    )
}

async fn match_symptom(
    State(state): State<AppState>,
    Json(request): Json<MatchRequest>,
) -> ApiResult<SymptomMatch> {
    if request.text.trim().is_empty() {
        return Err(bad_request_error("Symptom text is required"));
    }

    match state.engine.match_symptom(&request.text) {
        Some(matched) => Ok(Json(matched)),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "No known symptom matches this text",
                "text": request.text,
                "hint": "Try a different spelling, or GET /symptoms for the full list"
            })),
        )),
    }
}

async fn diagnose(
    State(state): State<AppState>,
    Json(request): Json<DiagnoseRequest>,
) -> ApiResult<DiagnoseResponse> {
    info!("Diagnosing {} reported symptoms", request.symptoms.len());

    let resolution = state.engine.resolve_symptoms(&request.symptoms);
    if !resolution.unmatched.is_empty() {
        warn!("Unrecognised symptoms: {:?}", resolution.unmatched);
    }

    let result = state
        .engine
        .diagnose_matched(&resolution.matched)
        .map_err(|e| service_error(e.into()))?;

    Ok(Json(DiagnoseResponse {
        result,
        unmatched: resolution.unmatched,
    }))
}

async fn start_session(State(state): State<AppState>) -> ApiResult<SessionView> {
    state.runner.start().await.map(Json).map_err(service_error)
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionView> {
    state
        .runner
        .view(&session_id)
        .await
        .map(Json)
        .map_err(service_error)
}

async fn answer_question(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<AnswerRequest>,
) -> ApiResult<SessionView> {
    state
        .runner
        .answer(&session_id, request.answer)
        .await
        .map(Json)
        .map_err(service_error)
}

async fn abandon_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Value> {
    state
        .runner
        .abandon(&session_id)
        .await
        .map_err(service_error)?;

    Ok(Json(json!({
        "session_id": session_id,
        "status": "abandoned"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request};
    use symptom_engine::{
        ClassificationTree, DiseaseProfileTable, DoctorDirectory, SymptomCatalog, TreeNode,
    };
    use tower::ServiceExt;

    fn app() -> Router {
        let catalog = SymptomCatalog::new(["fever", "cough", "runny_nose"]).unwrap();
        let profiles = DiseaseProfileTable::from_profiles(
            &catalog,
            [
                ("Flu", vec!["fever", "cough"]),
                ("Common Cold", vec!["cough", "runny_nose"]),
            ],
        )
        .unwrap();
        let tree = ClassificationTree::new(
            vec![
                TreeNode::split(0, 1, 2),
                TreeNode::leaf("Common Cold"),
                TreeNode::leaf("Flu"),
            ],
            &catalog,
        )
        .unwrap();
        let doctors = DoctorDirectory::from_entries([(
            "Flu",
            "General Physician",
            "https://example.org/gp",
        )]);
        let engine = DiagnosisEngine::new(catalog, profiles, tree, doctors).unwrap();
        create_app(Arc::new(engine), chrono::Duration::minutes(30))
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health_carries_correlation_id() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(CORRELATION_HEADER, "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CORRELATION_HEADER], "abc-123");
    }

    #[tokio::test]
    async fn test_list_symptoms_by_prefix() {
        let app = app();
        let (status, body) = send(&app, Method::GET, "/symptoms", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!(["fever", "cough", "runny_nose"]));

        let (_, body) = send(&app, Method::GET, "/symptoms?prefix=Runny%20N", None).await;
        assert_eq!(body, json!(["runny_nose"]));
    }

    #[tokio::test]
    async fn test_match_symptom() {
        let app = app();
        let (status, body) =
            send(&app, Method::POST, "/symptoms/match", Some(json!({ "text": "fevr" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["symptom"], "fever");
        assert_eq!(body["index"], 0);

        let (status, _) =
            send(&app, Method::POST, "/symptoms/match", Some(json!({ "text": "xyz" }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) =
            send(&app, Method::POST, "/symptoms/match", Some(json!({ "text": "  " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_diagnose() {
        let app = app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/diagnose",
            Some(json!({ "symptoms": ["Fever", "qwerty"] })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["disease"], "Flu");
        assert_eq!(body["result"]["confidence"], 0.5);
        assert_eq!(body["result"]["doctor_name"], "General Physician");
        assert_eq!(body["unmatched"], json!(["qwerty"]));
    }

    #[tokio::test]
    async fn test_diagnose_without_symptoms_is_unprocessable() {
        let (status, body) = send(
            &app(),
            Method::POST,
            "/diagnose",
            Some(json!({ "symptoms": ["qwerty"] })),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["hint"].is_string());
    }

    #[tokio::test]
    async fn test_session_flow() {
        let app = app();
        let (status, view) = send(&app, Method::POST, "/sessions", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["status"], "asking");
        assert_eq!(view["question"]["prompt"], "Is fever present?");

        let id = view["session_id"].as_str().unwrap().to_string();
        let answer_uri = format!("/sessions/{}/answer", id);

        let (status, view) =
            send(&app, Method::POST, &answer_uri, Some(json!({ "answer": "no" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["status"], "resolved");
        assert_eq!(view["result"]["disease"], "Common Cold");
        assert_eq!(view["result"]["confidence"], 0.0);
        assert!(view["result"]["doctor_name"].is_null());

        let (status, _) =
            send(&app, Method::POST, &answer_uri, Some(json!({ "answer": "yes" }))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let session_uri = format!("/sessions/{}", id);
        let (status, view) = send(&app, Method::GET, &session_uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["result"]["disease"], "Common Cold");

        let (status, _) = send(&app, Method::DELETE, &session_uri, None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = send(&app, Method::GET, &session_uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["session_id"], id);
    }
}
