use std::sync::Arc;

use axum::{
    extract::{Query, State as AxumState},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use gridfall_types::api::{
    AchievementsQuery, ApiErrorBody, ClaimAchievementRequest, ExchangeRequest, Reason,
    SessionStartRequest,
};
use gridfall_types::SessionStats;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::Simulator;

/// HTTP surface over the simulator, matching the backend gateway contract
/// consumed by `gridfall-client`.
pub struct Api {
    simulator: Arc<Simulator>,
}

type ApiRejection = (StatusCode, Json<ApiErrorBody>);

fn reject(body: ApiErrorBody) -> ApiRejection {
    let status =
        StatusCode::from_u16(body.error.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(body))
}

fn authorize(simulator: &Simulator, headers: &HeaderMap) -> Result<(), ApiRejection> {
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    if presented == Some(simulator.bearer_token()) {
        return Ok(());
    }
    warn!("rejecting request with missing or invalid bearer token");
    Err(reject(ApiErrorBody::new(
        401,
        "invalid credentials",
        Some(Reason::Unauthorized),
    )))
}

impl Api {
    pub fn new(simulator: Arc<Simulator>) -> Self {
        Self { simulator }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/spin", post(spin))
            .route("/exchange/status", get(exchange_status))
            .route("/exchange", post(exchange))
            .route("/achievements/mine", get(achievements))
            .route("/achievements/claim", post(claim_achievement))
            .route("/daily-rewards/status", get(daily_status))
            .route("/daily-rewards/claim", post(daily_claim))
            .route("/session/start", post(session_start))
            .route("/session/heartbeat", post(heartbeat))
            .route("/session/end", post(session_end))
            .layer(TraceLayer::new_for_http())
            .with_state(self.simulator.clone())
    }
}

async fn spin(
    AxumState(simulator): AxumState<Arc<Simulator>>,
    headers: HeaderMap,
) -> Result<Response, ApiRejection> {
    authorize(&simulator, &headers)?;
    let response = simulator.spin().map_err(reject)?;
    Ok(Json(response).into_response())
}

async fn exchange_status(
    AxumState(simulator): AxumState<Arc<Simulator>>,
    headers: HeaderMap,
) -> Result<Response, ApiRejection> {
    authorize(&simulator, &headers)?;
    let response = simulator.exchange_status().map_err(reject)?;
    Ok(Json(response).into_response())
}

async fn exchange(
    AxumState(simulator): AxumState<Arc<Simulator>>,
    headers: HeaderMap,
    Json(request): Json<ExchangeRequest>,
) -> Result<Response, ApiRejection> {
    authorize(&simulator, &headers)?;
    let response = simulator.exchange(request).map_err(reject)?;
    Ok(Json(response).into_response())
}

async fn achievements(
    AxumState(simulator): AxumState<Arc<Simulator>>,
    headers: HeaderMap,
    Query(query): Query<AchievementsQuery>,
) -> Result<Response, ApiRejection> {
    authorize(&simulator, &headers)?;
    let response = simulator.achievements(query).map_err(reject)?;
    Ok(Json(response).into_response())
}

async fn claim_achievement(
    AxumState(simulator): AxumState<Arc<Simulator>>,
    headers: HeaderMap,
    Json(request): Json<ClaimAchievementRequest>,
) -> Result<Response, ApiRejection> {
    authorize(&simulator, &headers)?;
    let response = simulator.claim_achievement(request.uuid).map_err(reject)?;
    Ok(Json(response).into_response())
}

async fn daily_status(
    AxumState(simulator): AxumState<Arc<Simulator>>,
    headers: HeaderMap,
) -> Result<Response, ApiRejection> {
    authorize(&simulator, &headers)?;
    let response = simulator.daily_status().map_err(reject)?;
    Ok(Json(response).into_response())
}

async fn daily_claim(
    AxumState(simulator): AxumState<Arc<Simulator>>,
    headers: HeaderMap,
) -> Result<Response, ApiRejection> {
    authorize(&simulator, &headers)?;
    let response = simulator.daily_claim().map_err(reject)?;
    Ok(Json(response).into_response())
}

async fn session_start(
    AxumState(simulator): AxumState<Arc<Simulator>>,
    headers: HeaderMap,
    Json(request): Json<SessionStartRequest>,
) -> Result<Response, ApiRejection> {
    authorize(&simulator, &headers)?;
    let response = simulator.session_start(request).map_err(reject)?;
    Ok(Json(response).into_response())
}

async fn heartbeat(
    AxumState(simulator): AxumState<Arc<Simulator>>,
    headers: HeaderMap,
    Json(stats): Json<SessionStats>,
) -> Result<Response, ApiRejection> {
    authorize(&simulator, &headers)?;
    simulator.heartbeat(stats).map_err(reject)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn session_end(
    AxumState(simulator): AxumState<Arc<Simulator>>,
    headers: HeaderMap,
    Json(stats): Json<SessionStats>,
) -> Result<Response, ApiRejection> {
    authorize(&simulator, &headers)?;
    simulator.session_end(stats).map_err(reject)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
