use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::crtp::SetpointCommand;
use crate::error::{TransportFailure, ValidationFailure};
use crate::grading::{self, FlightTrace, GradeResult, SuccessCriteria};
use crate::link::{LinkSession, SendOutcome, TelemetryFrame};

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum ControlRequest {
    Setpoint {
        roll: f64,
        pitch: f64,
        yaw: f64,
        thrust: f64,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum TelemetryRequest {
    RequestTelemetry,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GradeRequest {
    trace: FlightTrace,
    #[serde(default)]
    source_code: String,
    #[serde(default)]
    criteria: SuccessCriteria,
}

#[derive(Debug, Serialize)]
struct CommandResponse {
    success: bool,
    status: &'static str,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Invalid(ValidationFailure),
    Link(TransportFailure),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Invalid(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
            ApiError::Link(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
        };
        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}

impl From<TransportFailure> for ApiError {
    fn from(e: TransportFailure) -> Self {
        ApiError::Link(e)
    }
}

impl From<ValidationFailure> for ApiError {
    fn from(e: ValidationFailure) -> Self {
        ApiError::Invalid(e)
    }
}

pub fn routes(session: Arc<LinkSession>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/control", post(control))
        .route("/api/telemetry", get(telemetry).post(request_telemetry))
        .route("/api/grade", post(grade_run))
        .with_state(session)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

async fn control(
    State(session): State<Arc<LinkSession>>,
    Json(body): Json<Value>,
) -> Result<Json<CommandResponse>, ApiError> {
    let request: ControlRequest =
        serde_json::from_value(body).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let ControlRequest::Setpoint {
        roll,
        pitch,
        yaw,
        thrust,
    } = request;
    // Thrust is clamped into range; angles have nothing sensible to clamp to
    for (name, value) in [("roll", roll), ("pitch", pitch), ("yaw", yaw)] {
        if !(value as f32).is_finite() {
            return Err(ApiError::BadRequest(format!("{} is out of range", name)));
        }
    }

    let cmd = SetpointCommand::from_raw(roll, pitch, yaw, thrust);
    let status = match session.send_setpoint(cmd).await? {
        SendOutcome::Sent => "sent",
        SendOutcome::Throttled => "throttled",
    };
    Ok(Json(CommandResponse {
        success: true,
        status,
    }))
}

async fn telemetry(State(session): State<Arc<LinkSession>>) -> Json<TelemetryFrame> {
    Json(session.telemetry())
}

async fn request_telemetry(
    State(session): State<Arc<LinkSession>>,
    Json(body): Json<Value>,
) -> Result<Json<CommandResponse>, ApiError> {
    let TelemetryRequest::RequestTelemetry =
        serde_json::from_value(body).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    session.request_telemetry_refresh().await?;
    Ok(Json(CommandResponse {
        success: true,
        status: "requested",
    }))
}

async fn grade_run(Json(request): Json<GradeRequest>) -> Result<Json<GradeResult>, ApiError> {
    request.criteria.validate()?;

    let result = grading::grade(&request.trace, &request.source_code, &request.criteria);
    info!(
        "Graded run: score {} ({})",
        result.score,
        if result.passed { "passed" } else { "failed" }
    );
    debug!("Grade breakdown: {:?}", result.breakdown);
    Ok(Json(result))
}
