//! HTTP API gateway for Coursemate.
//!
//! Routes:
//! - `POST /api/chat` answer a question (`?format=legacy` for `{"reply"}`)
//! - `POST /api/search` raw semantic search over course content
//! - `GET /api/health` liveness plus store mode and provider
//! - `GET /` service banner
//!
//! Built on Axum. The gateway holds no session state: the widget sends its
//! history and summary with every request.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::{
    Router,
    routing::{get, post},
};
use coursemate_assistant::{AnswerPipeline, AnswerRequest};
use coursemate_config::{AppConfig, GatewayConfig};
use coursemate_core::error::InputError;
use coursemate_core::passage::RetrievedPassage;
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{error, info, warn};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub pipeline: Arc<AnswerPipeline>,
}

type SharedState = Arc<GatewayState>;

const BODY_LIMIT_BYTES: usize = 1024 * 1024;
const DEFAULT_NUM_RESULTS: usize = 5;

/// Build the Axum router with all gateway routes.
///
/// Layers applied:
/// - CORS (configured origins, or any origin when none are listed)
/// - Request body size limit (1 MB)
/// - HTTP trace logging
pub fn build_router(state: SharedState, config: &GatewayConfig) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/api/health", get(health_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/search", post(search_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(cors_layer(&config.allowed_origins))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    if origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(allowed))
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let pipeline = Arc::new(AnswerPipeline::connect(&config).await);
    info!(
        provider = pipeline.provider_name(),
        mode = pipeline.store_mode().label(),
        "Answer pipeline ready"
    );

    let state = Arc::new(GatewayState { pipeline });
    let app = build_router(state, &config.gateway);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

// --- Handlers ---

#[derive(Debug, Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
}

fn client_error(err: InputError) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

/// Malformed JSON bodies get the same `{"error": ...}` shape as other
/// client errors, with axum's status (400, 413, 415 or 422).
fn rejection_error(rejection: JsonRejection) -> (StatusCode, Json<ErrorResponse>) {
    warn!(error = %rejection.body_text(), "Rejected request body");
    (
        rejection.status(),
        Json(ErrorResponse {
            error: rejection.body_text(),
        }),
    )
}

#[derive(Debug, Serialize, Deserialize)]
struct BannerResponse {
    message: String,
    version: String,
}

async fn root_handler(State(state): State<SharedState>) -> Json<BannerResponse> {
    Json(BannerResponse {
        message: format!("{} Chat API", state.pipeline.course_name()),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

#[derive(Debug, Serialize, Deserialize)]
struct HealthResponse {
    status: String,
    version: String,
    /// "real data" or "mock data"
    mode: String,
    provider: String,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        mode: state.pipeline.store_mode().label().into(),
        provider: state.pipeline.provider_name().into(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ChatQuery {
    #[serde(default)]
    format: Option<String>,
}

async fn chat_handler(
    State(state): State<SharedState>,
    Query(query): Query<ChatQuery>,
    payload: Result<Json<AnswerRequest>, JsonRejection>,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    let Json(payload) = payload.map_err(rejection_error)?;
    info!(
        message_len = payload.message.len(),
        history = payload.conversation_history.len(),
        "Chat request"
    );

    let answer = state
        .pipeline
        .answer_question(payload)
        .await
        .map_err(client_error)?;

    let response = match query.format.as_deref() {
        Some("legacy") => Json(answer.to_legacy()).into_response(),
        _ => Json(answer).into_response(),
    };
    Ok(response)
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    #[serde(default)]
    query: String,
    #[serde(default = "default_num_results")]
    num_results: usize,
}

fn default_num_results() -> usize {
    DEFAULT_NUM_RESULTS
}

#[derive(Debug, Serialize, Deserialize)]
struct SearchResponse {
    results: Vec<RetrievedPassage>,
    query: String,
    count: usize,
}

async fn search_handler(
    State(state): State<SharedState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, (StatusCode, Json<ErrorResponse>)> {
    let Json(payload) = payload.map_err(rejection_error)?;
    let query = payload.query.trim();
    if query.is_empty() {
        return Err(client_error(InputError::MissingQuery));
    }

    match state.pipeline.retrieval().search(query, payload.num_results).await {
        Ok(results) => Ok(Json(SearchResponse {
            count: results.len(),
            query: query.to_string(),
            results,
        })),
        Err(e) => {
            error!(error = %e, "Search failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Search failed: {e}"),
                }),
            ))
        }
    }
}
