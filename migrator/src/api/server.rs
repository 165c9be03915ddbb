//! HTTP Server for the csv-migrator API.
//!
//! # API Endpoints
//!
//! | Method | Path              | Description                               |
//! |--------|-------------------|-------------------------------------------|
//! | GET    | `/health`         | Health check                              |
//! | POST   | `/api/convert`    | Convert an uploaded CSV with two schemas  |
//! | POST   | `/api/generate`   | Generate a schema pair from two samples   |
//! | GET    | `/api/logs`       | SSE stream for real-time logs             |

use axum::{
    extract::{Multipart, State},
    http::{header, Method},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{collections::HashMap, convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, log_info, LOG_BROADCASTER};
use super::types::{error_response, status_for, ConvertResponse, GenerateResponse};
use crate::ai::AiClient;
use crate::cache::SchemaRegistry;
use crate::config::{AiMode, AppConfig};
use crate::error::{PipelineError, ServerError, ServerResult};
use crate::generator::generate_schema_pair_from_bytes;
use crate::models::Schema;
use crate::transform::pipeline::convert_bytes;

/// Shared handler state
pub struct AppState {
    pub config: AppConfig,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        log_error(self.to_string());
        (status, Json(error_response(&self.to_string()))).into_response()
    }
}

/// Build the router (exposed for tests and embedding)
pub fn router(config: AppConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/convert", post(convert_upload))
        .route("/api/generate", post(generate_upload))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
        .with_state(Arc::new(AppState { config }))
}

/// Start the HTTP server
pub async fn start_server(port: u16, config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(config);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "csvmigrate server listening");
    log_info("POST /api/convert  - Convert CSV with source/target schemas");
    log_info("POST /api/generate - Generate schemas from samples");
    log_info("GET  /api/logs     - SSE log stream");
    log_info("GET  /health       - Health check");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "csvmigrate",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "convert": "POST /api/convert",
            "generate": "POST /api/generate",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    // Lagged receivers skip the entries they missed
    let stream = BroadcastStream::new(rx).filter_map(|result| {
        let entry = result.ok()?;
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok::<_, Infallible>(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Read every multipart field into memory, keyed by field name.
async fn read_fields(mut multipart: Multipart) -> ServerResult<HashMap<String, Vec<u8>>> {
    let mut fields = HashMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
        fields.insert(name, bytes.to_vec());
    }

    Ok(fields)
}

fn required<'a>(fields: &'a HashMap<String, Vec<u8>>, name: &str) -> ServerResult<&'a [u8]> {
    fields
        .get(name)
        .map(Vec::as_slice)
        .ok_or_else(|| ServerError::BadRequest(format!("No {} provided", name)))
}

fn optional_text(fields: &HashMap<String, Vec<u8>>, name: &str) -> Option<String> {
    fields
        .get(name)
        .map(|bytes| String::from_utf8_lossy(bytes).trim().to_string())
        .filter(|s| !s.is_empty())
}

fn schema_field(fields: &HashMap<String, Vec<u8>>, name: &str) -> ServerResult<Schema> {
    let bytes = required(fields, name)?;
    let text = std::str::from_utf8(bytes)
        .map_err(|e| ServerError::BadRequest(format!("{} is not UTF-8: {}", name, e)))?;
    Schema::from_json(text).map_err(|e| ServerError::BadRequest(format!("Invalid {}: {}", name, e)))
}

/// Convert endpoint: multipart `data`, `source_schema`, `target_schema`
async fn convert_upload(multipart: Multipart) -> ServerResult<Json<ConvertResponse>> {
    let fields = read_fields(multipart).await?;
    let data = required(&fields, "data")?;
    let source = schema_field(&fields, "source_schema")?;
    let target = schema_field(&fields, "target_schema")?;

    log_info(format!("New conversion request ({} bytes)", data.len()));
    let converted = convert_bytes(data, &source, &target)?;
    let csv = converted.to_csv_string()?;

    Ok(Json(ConvertResponse::new(converted, csv)))
}

/// Generate endpoint: multipart `source_sample`, `target_sample`, optional `mode` and `name`
async fn generate_upload(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> ServerResult<Json<GenerateResponse>> {
    let fields = read_fields(multipart).await?;
    let source_sample = required(&fields, "source_sample")?;
    let target_sample = required(&fields, "target_sample")?;

    let mut ai = state.config.ai.clone();
    if let Some(mode) = optional_text(&fields, "mode") {
        ai = ai.with_mode(mode.parse::<AiMode>().map_err(PipelineError::from)?);
    }
    let client = AiClient::new(ai).map_err(PipelineError::from)?;

    log_info("New schema generation request");
    let pair = generate_schema_pair_from_bytes(&client, source_sample, target_sample).await?;

    let name = match optional_text(&fields, "name") {
        Some(name) => {
            let registry = SchemaRegistry::with_dir(state.config.schemas_dir());
            Some(registry.save(&name, &pair).map_err(PipelineError::from)?)
        }
        None => None,
    };

    Ok(Json(GenerateResponse::new(&pair, name)))
}
