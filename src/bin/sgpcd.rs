//! sgpcd: the scene-graph query daemon.
//!
//! Serves the loaded model over HTTP:
//!
//! - `GET  /`: liveness (name, version, description)
//! - `GET  /health`: status plus loaded vocabulary sizes
//! - `POST /parse-prompt`: `{text}` → scene graph
//! - `POST /parse-scene-graph`: scene graph → evidence and ranked queries
//! - `POST /scene-graph`: same as `/parse-scene-graph`
//! - `POST /evidence`: scene graph → `{evidences}`
//! - `POST /prompt-to-image`: `{text}` → `image/png`
//!
//! Configuration comes from the TOML file named by `SGPC_CONFIG` (optional),
//! then `SGPC_*` overrides.
//!
//! Build and run: `cargo run --features server --bin sgpcd`

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use sgpc::analysis::SceneAnalysis;
use sgpc::config::ServiceConfig;
use sgpc::error::{QueryError, SgpcError, SgpcResult};
use sgpc::scene::SceneGraph;
use sgpc::service::{Service, ServiceInfo};

// ── Server state ──────────────────────────────────────────────────────────

struct ServerState {
    service: Service,
}

type ApiError = (StatusCode, Json<ErrorDetail>);

#[derive(Serialize)]
struct ErrorDetail {
    detail: String,
}

fn api_error(status: StatusCode, err: impl std::fmt::Display) -> ApiError {
    (
        status,
        Json(ErrorDetail {
            detail: err.to_string(),
        }),
    )
}

/// Run blocking service work on the blocking pool.
async fn blocking<T, F>(state: &Arc<ServerState>, status: StatusCode, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Service) -> SgpcResult<T> + Send + 'static,
{
    let service = state.service.clone();
    match tokio::task::spawn_blocking(move || f(&service)).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(SgpcError::Diffusion(sgpc::diffusion::DiffusionError::NotConfigured))) => Err(
            api_error(StatusCode::SERVICE_UNAVAILABLE, "image generation is not configured"),
        ),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "request failed");
            Err(api_error(status, e))
        }
        Err(e) => {
            let err = SgpcError::from(QueryError::Worker {
                message: e.to_string(),
            });
            tracing::error!(error = %err, "blocking task failed");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, err))
        }
    }
}

// ── Request / response types ──────────────────────────────────────────────

#[derive(Deserialize)]
struct PromptRequest {
    text: String,
}

#[derive(Serialize)]
struct RootResponse {
    name: String,
    version: String,
    description: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    #[serde(flatten)]
    info: ServiceInfo,
}

#[derive(Serialize)]
struct EvidenceResponse {
    evidences: Vec<String>,
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        name: "Scene Graph Probabilistic Completion".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        description: env!("CARGO_PKG_DESCRIPTION").to_string(),
    })
}

async fn health(State(state): State<Arc<ServerState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        info: state.service.info(),
    })
}

async fn parse_prompt(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<PromptRequest>,
) -> Result<Json<SceneGraph>, ApiError> {
    let scene = blocking(&state, StatusCode::INTERNAL_SERVER_ERROR, move |svc| {
        svc.parse_prompt(&req.text)
    })
    .await?;
    Ok(Json(scene))
}

async fn parse_scene_graph(
    State(state): State<Arc<ServerState>>,
    Json(scene): Json<SceneGraph>,
) -> Result<Json<SceneAnalysis>, ApiError> {
    let analysis = blocking(&state, StatusCode::BAD_REQUEST, move |svc| svc.analyze(&scene)).await?;
    Ok(Json(analysis))
}

async fn evidence(
    State(state): State<Arc<ServerState>>,
    Json(scene): Json<SceneGraph>,
) -> Json<EvidenceResponse> {
    Json(EvidenceResponse {
        evidences: state.service.evidence(&scene),
    })
}

async fn prompt_to_image(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<PromptRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let png = blocking(&state, StatusCode::BAD_GATEWAY, move |svc| {
        svc.generate_image(&req.text)
    })
    .await?;
    Ok(([(header::CONTENT_TYPE, "image/png")], png))
}

// ── Main ──────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut config = match std::env::var("SGPC_CONFIG") {
        Ok(path) => ServiceConfig::load(&PathBuf::from(path)).unwrap_or_else(|e| {
            tracing::error!("{e}");
            std::process::exit(1);
        }),
        Err(_) => ServiceConfig::default(),
    };
    if let Err(e) = config.apply_env() {
        tracing::error!("{e}");
        std::process::exit(1);
    }

    let service = Service::from_config(&config).unwrap_or_else(|e| {
        tracing::error!("failed to load service: {e}");
        std::process::exit(1);
    });
    let state = Arc::new(ServerState { service });

    tracing::info!("sgpcd initialized");

    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/parse-prompt", post(parse_prompt))
        .route("/parse-scene-graph", post(parse_scene_graph))
        .route("/scene-graph", post(parse_scene_graph))
        .route("/evidence", post(evidence))
        .route("/prompt-to-image", post(prompt_to_image))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = config.addr();
    tracing::info!("sgpcd listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("failed to bind {addr}: {e}");
            std::process::exit(1);
        });

    // Serve with graceful shutdown on SIGTERM/SIGINT.
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let ctrl_c = tokio::signal::ctrl_c();
            #[cfg(unix)]
            {
                let mut sigterm =
                    tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                        .expect("failed to register SIGTERM handler");
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            #[cfg(not(unix))]
            {
                ctrl_c.await.ok();
            }
            tracing::info!("sgpcd shutting down");
        })
        .await
        .expect("server error");
}
