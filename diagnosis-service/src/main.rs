use anyhow::Context;
use diagnosis_service::create_app;
use std::sync::Arc;
use symptom_engine::{DiagnosisEngine, EngineConfig};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_SESSION_IDLE_MINUTES: i64 = 30;

fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "diagnosis_service=debug,symptom_engine=debug,tower_http=debug".into()
    });

    match log_format.as_str() {
        "pretty" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = EngineConfig::from_env().context("Invalid engine configuration")?;
    let engine = DiagnosisEngine::from_config(&config).with_context(|| {
        format!(
            "Failed to load diagnosis data (training: {}, tree: {}, doctors: {})",
            config.training_path.display(),
            config.tree_path.display(),
            config.doctors_path.display()
        )
    })?;

    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse::<u16>()
        .unwrap_or(3000);

    let idle_minutes = std::env::var("SESSION_IDLE_MINUTES")
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|minutes| *minutes > 0)
        .unwrap_or(DEFAULT_SESSION_IDLE_MINUTES);

    let app = create_app(Arc::new(engine), chrono::Duration::minutes(idle_minutes));
    let listener = TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    let addr = listener.local_addr()?;

    info!("Symptom Diagnosis Service starting on {}", addr);
    info!("API Documentation available at http://{}/", addr);
    info!("Health check endpoint: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
