/// API сервер пайплайна прогноза энергопотребления

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{Method, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use energy_ml::{
    config::{server_addr, PipelineConfig},
    models::metrics::evaluate,
    preprocessing::{ClipSides, OutlierClipper},
    ColumnBounds, EnergyError, Pipeline, PipelineReport, RegressionReport,
};

#[derive(Clone)]
struct AppState {
    config: Arc<PipelineConfig>,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Инициализация логирования
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let state = AppState {
        config: Arc::new(PipelineConfig::from_env()?),
    };

    // CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/config", get(get_config))
        .route("/api/pipeline", post(run_pipeline))
        .route("/api/clip", post(clip_values))
        .route("/api/evaluate", post(evaluate_predictions))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state);

    let addr = server_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "Energy ML API",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

async fn get_config(State(state): State<AppState>) -> Json<PipelineConfig> {
    Json(state.config.as_ref().clone())
}

fn status_for(error: &EnergyError) -> StatusCode {
    match error {
        EnergyError::Io(_) | EnergyError::Training(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

fn api_error(error: EnergyError) -> (StatusCode, String) {
    tracing::error!("Request failed: {}", error);
    (status_for(&error), error.to_string())
}

/// Полный прогон. Без тела используется конфигурация сервера, иначе конфигурация из запроса;
/// некорректное тело отклоняется с 400
async fn run_pipeline(State(state): State<AppState>, body: Bytes) -> ApiResult<PipelineReport> {
    let config = PipelineConfig::from_request_body(&body, &state.config).map_err(api_error)?;

    let report = tokio::task::spawn_blocking(move || Pipeline::new(config)?.run())
        .await
        .map_err(|e| {
            tracing::error!("Pipeline task panicked: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?
        .map_err(api_error)?;

    Ok(Json(report))
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct ClipRequest {
    #[serde(default)]
    column: Option<String>,
    values: Vec<f64>,
    #[serde(default = "default_true")]
    clip_lower: bool,
    #[serde(default = "default_true")]
    clip_upper: bool,
}

#[derive(Debug, Serialize)]
struct ClipResponse {
    bounds: ColumnBounds,
    values: Vec<f64>,
    clipped: usize,
}

async fn clip_values(Json(request): Json<ClipRequest>) -> ApiResult<ClipResponse> {
    let name = request.column.as_deref().unwrap_or("values");
    let sides = ClipSides {
        lower: request.clip_lower,
        upper: request.clip_upper,
    };
    let (values, bounds) =
        OutlierClipper::clip_column(name, ArrayView1::from(&request.values[..]), sides)
            .map_err(api_error)?;
    let clipped = request
        .values
        .iter()
        .zip(values.iter())
        .filter(|(a, b)| a.to_bits() != b.to_bits())
        .count();

    Ok(Json(ClipResponse {
        bounds,
        values: values.to_vec(),
        clipped,
    }))
}

#[derive(Debug, Deserialize)]
struct EvaluateRequest {
    y_true: Vec<f64>,
    y_pred: Vec<f64>,
    #[serde(default)]
    n_features: usize,
}

async fn evaluate_predictions(Json(request): Json<EvaluateRequest>) -> ApiResult<RegressionReport> {
    let y_true = Array1::from(request.y_true);
    let y_pred = Array1::from(request.y_pred);
    let report = evaluate(&y_true, &y_pred, request.n_features).map_err(api_error)?;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> State<AppState> {
        State(AppState {
            config: Arc::new(PipelineConfig::default()),
        })
    }

    #[tokio::test]
    async fn pipeline_rejects_malformed_config_body() {
        let body = Bytes::from_static(br#"{"seed":"not-a-number","test_size":5}"#);
        let (status, message) = run_pipeline(state(), body).await.unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(message.starts_with("JSON error"), "{}", message);
    }

    #[tokio::test]
    async fn pipeline_rejects_invalid_config_values() {
        let body = Bytes::from_static(br#"{"test_size": 5}"#);
        let (status, _) = run_pipeline(state(), body).await.unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn evaluate_reports_metrics() {
        let request = EvaluateRequest {
            y_true: vec![1.0, 2.0, 3.0],
            y_pred: vec![1.0, 2.0, 3.0],
            n_features: 1,
        };
        let Json(report) = evaluate_predictions(Json(request)).await.unwrap();
        assert_eq!(report.rmse, 0.0);
        assert_eq!(report.n_samples, 3);
    }

    #[tokio::test]
    async fn clip_replaces_outliers_with_bounds() {
        let request = ClipRequest {
            column: None,
            values: vec![1.0, 2.0, 3.0, 4.0, 5.0, 100.0],
            clip_lower: true,
            clip_upper: true,
        };
        let Json(response) = clip_values(Json(request)).await.unwrap();
        assert_eq!(response.clipped, 1);
        assert_eq!(response.values[5], 8.5);
        assert_eq!(response.bounds.column, "values");
    }
}
