use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use garde::Validate;
use tracing::error;

use crate::app_state::AppState;
use crate::models::key::StoreKey;
use crate::models::pricing::{PriceRequest, PriceResponse, Snapshot, StatusQuery, StoresResponse};

/// POST /api/v1/prices — dispatch a batch of price lookups.
///
/// Always returns HTTP 200 with one snapshot per URL once the batch
/// passes validation; per-URL failures are carried inside the snapshots.
pub async fn get_prices(
    State(state): State<AppState>,
    Json(request): Json<PriceRequest>,
) -> Result<Json<PriceResponse>, (StatusCode, String)> {
    request
        .validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    if request.has_duplicate_urls() {
        return Err((
            StatusCode::BAD_REQUEST,
            "duplicate URLs are not allowed".to_string(),
        ));
    }

    let results = state
        .dispatcher
        .dispatch(&request.store, &request.urls)
        .await;

    Ok(Json(PriceResponse { results }))
}

/// GET /api/v1/prices/status — latest job state for one key, without
/// triggering a fetch.
pub async fn get_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Snapshot>, StatusCode> {
    let key = StoreKey::new(&query.store, &query.url);

    match state.tracker.get_status(&key).await {
        Ok(Some(job)) => {
            let timeout = state.config.job_timeout().as_secs_f64();
            Ok(Json(Snapshot::from_job(&job, timeout, Utc::now())))
        }
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            error!(key = %key, error = %e, "status lookup failed");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// GET /api/v1/stores — the stores this deployment can fetch from.
pub async fn supported_stores(State(state): State<AppState>) -> Json<StoresResponse> {
    Json(StoresResponse {
        supported_stores: state.registry.supported_stores(),
    })
}
