use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::area::{AreaError, CityArea, Granularity, ResolvedVia};
use crate::compare::{ComparisonOutcome, ComparisonRequest, FailureKind};

use super::state::AppState;

// ─── Error response ──────────────────────────────────────────────

#[derive(Serialize)]
struct ApiErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<FailureKind>,
    code: u16,
}

pub struct ApiError(StatusCode, Option<FailureKind>, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.2,
            kind: self.1,
            code: self.0.as_u16(),
        };
        (self.0, Json(body)).into_response()
    }
}

fn status_for(kind: FailureKind) -> StatusCode {
    match kind {
        FailureKind::InvalidRequest | FailureKind::UnknownState => StatusCode::BAD_REQUEST,
        FailureKind::AmbiguousAreaRecord => StatusCode::MULTIPLE_CHOICES,
        FailureKind::RemoteUnavailable | FailureKind::InvalidResponse => StatusCode::BAD_GATEWAY,
        FailureKind::DataUnavailableAfterFallback => StatusCode::NOT_FOUND,
        FailureKind::InconsistentReferenceData => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ─── GET /api/compare ────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CompareQuery {
    pub city_from: Option<String>,
    pub state_from: Option<String>,
    pub city_to: Option<String>,
    pub state_to: Option<String>,
}

#[derive(Serialize)]
pub struct CompareResponse {
    #[serde(flatten)]
    pub outcome: ComparisonOutcome,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

pub async fn compare(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CompareQuery>,
) -> Result<Json<CompareResponse>, Response> {
    let start = Instant::now();

    let req = ComparisonRequest::new(
        params.city_from.as_deref().unwrap_or(""),
        params.state_from.as_deref().unwrap_or(""),
        params.city_to.as_deref().unwrap_or(""),
        params.state_to.as_deref().unwrap_or(""),
    )
    .map_err(|f| ApiError(status_for(f.kind), Some(f.kind), f.to_string()).into_response())?;

    // The BLS client blocks; keep it off the async workers.
    let coordinator = state.coordinator.clone();
    let task_req = req.clone();
    let outcome = tokio::task::spawn_blocking(move || coordinator.compare(&task_req))
        .await
        .map_err(|e| {
            ApiError(StatusCode::INTERNAL_SERVER_ERROR, None, format!("Comparison task failed: {}", e))
                .into_response()
        })?;

    info!(
        "GET /api/compare {} → {} ({:.1}ms)",
        req.place(crate::compare::Endpoint::From),
        req.place(crate::compare::Endpoint::To),
        start.elapsed().as_secs_f64() * 1000.0,
    );

    if let ComparisonOutcome::Failure(f) = &outcome {
        return Err(ApiError(status_for(f.kind), Some(f.kind), f.to_string()).into_response());
    }

    Ok(Json(CompareResponse {
        message: outcome.sentence(&req),
        notes: outcome.notes(&req),
        outcome,
    }))
}

// ─── GET /api/resolve ────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ResolveQuery {
    pub city: Option<String>,
    pub state: Option<String>,
}

#[derive(Serialize)]
pub struct ResolveResponse {
    pub city: String,
    pub state: String,
    pub area_code: String,
    pub granularity: Granularity,
    pub resolved_via: ResolvedVia,
}

pub async fn resolve(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ResolveQuery>,
) -> Result<Json<ResolveResponse>, ApiError> {
    let city = params.city.as_deref().unwrap_or("").trim().to_uppercase();
    let st = params.state.as_deref().unwrap_or("").trim().to_uppercase();
    if city.is_empty() || st.chars().count() != 2 {
        return Err(ApiError(
            StatusCode::BAD_REQUEST,
            Some(FailureKind::InvalidRequest),
            "Provide 'city' and a 2-character 'state'".into(),
        ));
    }

    let resolved = state.coordinator.resolver().resolve(&city, &st).map_err(|e| {
        let (status, kind) = match e {
            AreaError::UnknownState(_) => (StatusCode::BAD_REQUEST, Some(FailureKind::UnknownState)),
            AreaError::AmbiguousAreaRecord { .. } => {
                (StatusCode::MULTIPLE_CHOICES, Some(FailureKind::AmbiguousAreaRecord))
            }
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Some(FailureKind::InconsistentReferenceData),
            ),
        };
        ApiError(status, kind, e.to_string())
    })?;

    info!("GET /api/resolve {}, {} → {}", city, st, resolved.area_code);

    Ok(Json(ResolveResponse {
        city,
        state: st,
        area_code: resolved.area_code,
        granularity: resolved.granularity,
        resolved_via: resolved.resolved_via,
    }))
}

// ─── GET /api/areas ──────────────────────────────────────────────

pub async fn area_list(State(state): State<Arc<AppState>>) -> Json<Vec<CityArea>> {
    Json(state.coordinator.resolver().directory().cities())
}
