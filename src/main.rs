use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use estimo_backend::estimation::summary::{summarize, MarketSummary};
use estimo_backend::estimation::types::{
    ComparableSale, PropertyCondition, PropertyKind, TargetProperty,
};
use estimo_backend::estimation::{aggregate, source::DvfDirectory};
use estimo_backend::geo::Geocoder;
use estimo_backend::leads::{Lead, LeadStore};
use estimo_backend::pois::{PoiClient, ProximityReport};
use estimo_backend::{
    estimate_range, notary_fees, rental_projection, NotaryFees, RentalProjection,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

#[derive(Clone)]
struct AppState {
    geocoder: Arc<Geocoder>,
    pois: Arc<PoiClient>,
    source: Arc<DvfDirectory>,
    leads: Arc<Mutex<LeadStore>>,
    config: Arc<Config>,
}

#[derive(Serialize, Deserialize)]
struct ApiResponse {
    message: String,
    status: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_target(false)
        .init();

    info!("🏠 Starting estimation API server...");

    let config = Config::from_env()?;
    info!("Configuration loaded, DVF data dir: {:?}", config.data_dir);

    let state = AppState {
        geocoder: Arc::new(Geocoder::new(&config.ban_base_url)?),
        pois: Arc::new(PoiClient::new(&config.overpass_url)?),
        source: Arc::new(DvfDirectory::new(&config.data_dir)),
        leads: Arc::new(Mutex::new(LeadStore::new(&config.leads_file))),
        config: Arc::new(config.clone()),
    };

    let app = router(state);

    let addr = config.bind_addr;
    info!("🚀 Server running on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/api/health", get(health_check))
        .route("/api/suggest", get(suggest_addresses))
        .route("/api/estimate", post(estimate_property))
        .route("/api/pois", get(nearby_pois))
        .route(
            "/api/leads",
            post(create_lead).get(list_leads).delete(reset_leads),
        )
        .route("/api/leads/:index", delete(delete_lead))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Error)]
enum ApiError {
    #[error("address not found")]
    AddressNotFound,

    #[error("lead not found")]
    LeadNotFound,

    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::AddressNotFound => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::LeadNotFound => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Internal(e) => {
                error!("internal error: {e:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

async fn health_check() -> Json<ApiResponse> {
    Json(ApiResponse {
        message: "Estimation API is running!".to_string(),
        status: "ok".to_string(),
    })
}

#[derive(Debug, Deserialize)]
struct SuggestParams {
    q: String,
    limit: Option<usize>,
}

async fn suggest_addresses(
    State(state): State<AppState>,
    Query(params): Query<SuggestParams>,
) -> Json<Vec<String>> {
    let limit = params.limit.unwrap_or(5).clamp(1, 10);
    Json(state.geocoder.suggest(&params.q, limit).await)
}

#[derive(Debug, Deserialize)]
struct EstimateRequest {
    address: String,
    property_kind: PropertyKind,
    floor_area_sqm: f64,
    condition: PropertyCondition,
    #[serde(default = "default_years")]
    years: Vec<i32>,
    #[serde(default = "default_radius_km")]
    radius_km: f64,
}

fn default_years() -> Vec<i32> {
    vec![2024, 2023]
}

fn default_radius_km() -> f64 {
    1.0
}

#[derive(Debug, Serialize)]
struct EstimateResponse {
    address: String,
    postal_code: String,
    price_per_sqm: Option<f64>,
    sample_size: usize,
    estimate_low_eur: Option<f64>,
    estimate_high_eur: Option<f64>,
    notary_fees: Option<NotaryFees>,
    rental_projection: Option<RentalProjection>,
    market_summary: Option<MarketSummary>,
    evidence: Vec<ComparableSale>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

async fn estimate_property(
    State(state): State<AppState>,
    Json(req): Json<EstimateRequest>,
) -> Result<Json<EstimateResponse>, ApiError> {
    if req.floor_area_sqm <= 0.0 {
        return Err(ApiError::BadRequest(
            "floor_area_sqm must be positive".to_string(),
        ));
    }
    if req.radius_km <= 0.0 {
        return Err(ApiError::BadRequest("radius_km must be positive".to_string()));
    }

    let resolved = state
        .geocoder
        .resolve_with_postal_code(&req.address)
        .await
        .ok_or(ApiError::AddressNotFound)?;

    let target = TargetProperty {
        coordinates: resolved.coordinates,
        postal_code: resolved.postal_code,
        kind: req.property_kind,
        floor_area_sqm: req.floor_area_sqm,
    };

    info!(
        "estimating {} ({}) around {}, radius {} km, years {:?}",
        resolved.label, target.kind, target.postal_code, req.radius_km, req.years
    );

    let result = aggregate::estimate(
        state.source.as_ref(),
        state.geocoder.as_ref(),
        &target,
        &req.years,
        req.radius_km,
        state.config.max_plausible_distance_km,
    )
    .await;

    let market_summary = summarize(&result.evidence);

    let response = match result.price_per_sqm {
        Some(price_per_sqm) => {
            let estimate_eur = price_per_sqm * target.floor_area_sqm;
            let (low, high) = estimate_range(estimate_eur, req.condition);

            EstimateResponse {
                address: resolved.label,
                postal_code: target.postal_code,
                price_per_sqm: Some(price_per_sqm),
                sample_size: result.sample_size,
                estimate_low_eur: Some(low),
                estimate_high_eur: Some(high),
                notary_fees: Some(notary_fees(estimate_eur)),
                rental_projection: rental_projection(target.floor_area_sqm, estimate_eur),
                market_summary,
                evidence: result.evidence,
                message: None,
            }
        }
        None => EstimateResponse {
            address: resolved.label,
            postal_code: target.postal_code,
            price_per_sqm: None,
            sample_size: 0,
            estimate_low_eur: None,
            estimate_high_eur: None,
            notary_fees: None,
            rental_projection: None,
            market_summary,
            evidence: result.evidence,
            message: Some("no comparable sales found".to_string()),
        },
    };

    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct PoiParams {
    lat: f64,
    lon: f64,
    radius_m: Option<u32>,
}

async fn nearby_pois(
    State(state): State<AppState>,
    Query(params): Query<PoiParams>,
) -> Json<ProximityReport> {
    let radius_m = params.radius_m.unwrap_or(2000);
    Json(state.pois.nearby(params.lat, params.lon, radius_m).await)
}

#[derive(Debug, Deserialize)]
struct LeadRequest {
    name: String,
    email: String,
    phone: String,
    address: String,
    property_kind: Option<PropertyKind>,
    #[serde(default)]
    project: String,
    condition: Option<PropertyCondition>,
    floor_area_sqm: Option<f64>,
    estimate_eur: Option<f64>,
    asking_price_eur: Option<f64>,
    #[serde(default)]
    callback_requested: bool,
}

async fn create_lead(
    State(state): State<AppState>,
    Json(req): Json<LeadRequest>,
) -> Result<(StatusCode, Json<Lead>), ApiError> {
    let lead = Lead {
        name: req.name,
        email: req.email,
        phone: req.phone,
        address: req.address,
        property_kind: req.property_kind,
        project: req.project,
        condition: req.condition,
        floor_area_sqm: req.floor_area_sqm,
        estimate_eur: req.estimate_eur,
        asking_price_eur: req.asking_price_eur,
        callback_requested: req.callback_requested,
        submitted_at: Some(chrono::Utc::now()),
    };

    lock_store(&state)?.append(&lead)?;

    Ok((StatusCode::CREATED, Json(lead)))
}

async fn list_leads(State(state): State<AppState>) -> Result<Json<Vec<Lead>>, ApiError> {
    let leads = lock_store(&state)?.read_all()?;
    Ok(Json(leads))
}

async fn delete_lead(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Result<StatusCode, ApiError> {
    let deleted = lock_store(&state)?.delete_at(index)?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::LeadNotFound)
    }
}

async fn reset_leads(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    lock_store(&state)?.reset()?;
    Ok(StatusCode::NO_CONTENT)
}

fn lock_store(state: &AppState) -> Result<std::sync::MutexGuard<'_, LeadStore>, ApiError> {
    state
        .leads
        .lock()
        .map_err(|_| ApiError::Internal(anyhow::anyhow!("lead store lock poisoned")))
}

/// Configuration loaded from environment variables
#[derive(Debug, Clone)]
struct Config {
    bind_addr: SocketAddr,
    data_dir: PathBuf,
    leads_file: PathBuf,
    ban_base_url: String,
    overpass_url: String,
    max_plausible_distance_km: Option<f64>,
}

impl Config {
    fn from_env() -> anyhow::Result<Self> {
        let bind_addr = std::env::var("BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3001".to_string())
            .parse()?;

        // Guard against record addresses resolving to the wrong
        // municipality. 0 or negative disables it.
        let max_plausible_distance_km = std::env::var("MAX_PLAUSIBLE_DISTANCE_KM")
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .map_or(Some(20.0), |km| if km > 0.0 { Some(km) } else { None });

        Ok(Config {
            bind_addr,

            data_dir: std::env::var("DVF_DATA_DIR")
                .unwrap_or_else(|_| "./data".to_string())
                .into(),

            leads_file: std::env::var("LEADS_FILE")
                .unwrap_or_else(|_| "./leads.csv".to_string())
                .into(),

            ban_base_url: std::env::var("BAN_BASE_URL")
                .unwrap_or_else(|_| "https://api-adresse.data.gouv.fr/search/".to_string()),

            overpass_url: std::env::var("OVERPASS_URL")
                .unwrap_or_else(|_| "https://overpass-api.de/api/interpreter".to_string()),

            max_plausible_distance_km,
        })
    }
}
