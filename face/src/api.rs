use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc::UnboundedSender, watch};
use tracing::info;

use weatherface_common::{config::parse_timezone, render::DrawCommand, FaceEvent, FaceStatus};

/// Stands in for the OS on the host: lifecycle signals arrive over HTTP and
/// are queued for the face like any other event.
#[derive(Clone)]
pub struct ApiState {
    pub events: UnboundedSender<FaceEvent>,
    pub timezone: Arc<watch::Sender<Tz>>,
    pub status: watch::Receiver<FaceStatus>,
    pub frame: watch::Receiver<Vec<DrawCommand>>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct Queued {
    queued: &'static str,
}

#[derive(Debug, Deserialize)]
struct TimezoneUpdate {
    timezone: String,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/status", get(handle_get_status))
        .route("/api/frame", get(handle_get_frame))
        .route("/api/visibility", post(handle_set_visibility))
        .route("/api/ambient", post(handle_set_ambient))
        .route("/api/properties", post(handle_set_properties))
        .route("/api/insets", post(handle_set_insets))
        .route("/api/tick", post(handle_time_tick))
        .route("/api/timezone", put(handle_put_timezone))
        .with_state(state)
}

async fn handle_get_status(State(state): State<ApiState>) -> impl IntoResponse {
    let status = state.status.borrow().clone();
    Json(status)
}

async fn handle_get_frame(State(state): State<ApiState>) -> impl IntoResponse {
    let frame = state.frame.borrow().clone();
    Json(frame)
}

async fn handle_set_visibility(
    State(state): State<ApiState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    match flag_param(&params, "value") {
        Ok(visible) => enqueue(&state, FaceEvent::VisibilityChanged(visible), "visibility"),
        Err(message) => error_response(StatusCode::BAD_REQUEST, message),
    }
}

async fn handle_set_ambient(
    State(state): State<ApiState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    match flag_param(&params, "value") {
        Ok(ambient) => enqueue(&state, FaceEvent::AmbientModeChanged(ambient), "ambient"),
        Err(message) => error_response(StatusCode::BAD_REQUEST, message),
    }
}

async fn handle_set_properties(
    State(state): State<ApiState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    match flag_param(&params, "lowBitAmbient") {
        Ok(low_bit_ambient) => enqueue(
            &state,
            FaceEvent::PropertiesChanged { low_bit_ambient },
            "properties",
        ),
        Err(message) => error_response(StatusCode::BAD_REQUEST, message),
    }
}

async fn handle_set_insets(
    State(state): State<ApiState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    match flag_param(&params, "round") {
        Ok(round) => enqueue(&state, FaceEvent::InsetsApplied { round }, "insets"),
        Err(message) => error_response(StatusCode::BAD_REQUEST, message),
    }
}

async fn handle_time_tick(State(state): State<ApiState>) -> impl IntoResponse {
    enqueue(&state, FaceEvent::TimeTick, "tick")
}

async fn handle_put_timezone(
    State(state): State<ApiState>,
    Json(update): Json<TimezoneUpdate>,
) -> impl IntoResponse {
    let timezone = match parse_timezone(&update.timezone) {
        Ok(timezone) => timezone,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    };

    info!("system timezone set to {}", timezone.name());
    state.timezone.send_replace(timezone);
    enqueue(&state, FaceEvent::TimezoneChanged, "timezone")
}

fn enqueue(state: &ApiState, event: FaceEvent, what: &'static str) -> axum::response::Response {
    if state.events.send(event).is_err() {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "Face engine has shut down");
    }
    (StatusCode::ACCEPTED, Json(Queued { queued: what })).into_response()
}

fn flag_param(params: &HashMap<String, String>, name: &str) -> Result<bool, &'static str> {
    let Some(value) = params.get(name) else {
        return Err("Missing flag parameter");
    };
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "on" => Ok(true),
        "false" | "0" | "off" => Ok(false),
        _ => Err("Invalid flag value. Use 'true' or 'false'"),
    }
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}
