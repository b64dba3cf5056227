// Company Lookup - Web Server
// REST API with Axum over the cleaned company snapshot

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use std::collections::HashMap;
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use company_lookup::{
    parse_limit, CompanyDatabase, CompanyLookup, Config, ErrorKind, HttpFetcher, Predicates,
};

/// Shared application state. The lookup wraps an immutable snapshot, so handlers share it without a lock.
#[derive(Clone)]
struct AppState {
    lookup: CompanyLookup,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

/// Stats response
#[derive(Serialize)]
struct StatsResponse {
    total_companies: usize,
    columns: Vec<String>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/stats - Size and shape of the cleaned table
async fn get_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(StatsResponse {
        total_companies: state.lookup.len(),
        columns: state.lookup.columns().to_vec(),
    }))
}

/// GET /api/companies?name=..&country=..&current_employees=..&limit=..
async fn get_companies(
    State(state): State<AppState>,
    Query(mut params): Query<HashMap<String, String>>,
) -> Response {
    let limit = match params.remove("limit").map(|l| parse_limit(&l)).transpose() {
        Ok(limit) => limit,
        Err(e) => return bad_request(e.to_string()),
    };

    let result = Predicates::from_pairs(params.iter())
        .and_then(|predicates| state.lookup.query(&predicates, limit));

    match result {
        Ok(result) => (StatusCode::OK, Json(ApiResponse::ok(result))).into_response(),
        Err(e) if e.kind() == ErrorKind::InvalidPredicate => bad_request(e.to_string()),
        Err(e) => {
            error!("Error querying companies: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::err(e.to_string())),
            )
                .into_response()
        }
    }
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(ApiResponse::<()>::err(message))).into_response()
}

// ============================================================================
// Main Server
// ============================================================================

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}

fn app(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/stats", get(get_stats))
        .route("/companies", get(get_companies))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

async fn serve(addr: String, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Server running on http://{}", addr);
    info!("API: http://{}/api/companies?country=benin&limit=3", addr);

    axum::serve(listener, app(state))
        .await
        .context("Server stopped unexpectedly")
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = Config::from_env();
    let addr = config.listen_addr.clone();

    // Blocking setup (download + clean) happens before the runtime starts
    let fetcher = HttpFetcher::new()?;
    let mut db = CompanyDatabase::open(config, &fetcher).context("Failed to open the company store")?;
    let report = db.clean().context("Failed to clean the company table")?;
    info!("{}", report.summary());

    let lookup = db
        .lookup()
        .context("Cleaning finished without a snapshot")?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    runtime.block_on(serve(addr, AppState { lookup }))
}
