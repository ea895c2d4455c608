//! HTTP request handlers for the clean route service.

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::AppState;
use crate::aqi::AqiProvider;
use crate::directions::{DirectionsProvider, TravelMode};
use crate::engine::{RouteComparison, RouteRequest};
use crate::error::RouteError;
use crate::geo_utils::Point;
use crate::segments::SegmentRepository;

/// Query parameters for the route comparison endpoint.
///
/// Everything is optional at the parsing layer so a missing parameter is
/// reported with a useful message instead of a generic rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanRouteQuery {
    pub start_lat: Option<f64>,
    pub start_lng: Option<f64>,
    pub end_lat: Option<f64>,
    pub end_lng: Option<f64>,
    pub user_id: Option<String>,
    /// `walking` (default) or `cycling`.
    pub mode: Option<String>,
}

impl CleanRouteQuery {
    pub fn into_request(self) -> Result<RouteRequest, RouteError> {
        fn required(value: Option<f64>, name: &str) -> Result<f64, RouteError> {
            value.ok_or_else(|| RouteError::InvalidRequest(format!("missing {name}")))
        }

        let start = Point::new(required(self.start_lat, "startLat")?, required(self.start_lng, "startLng")?);
        let end = Point::new(required(self.end_lat, "endLat")?, required(self.end_lng, "endLng")?);
        let user_id = self
            .user_id
            .ok_or_else(|| RouteError::InvalidRequest("missing userId".to_string()))?;
        let mode = match self.mode.as_deref() {
            None | Some("") => TravelMode::default(),
            Some(raw) => raw.parse()?,
        };

        Ok(RouteRequest {
            start,
            end,
            user_id,
            mode,
        })
    }
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message.
    pub error: String,
    /// Diagnostic detail for server-side failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            RouteError::InvalidRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: message,
                    details: None,
                },
            ),
            RouteError::UpstreamUnavailable(details) => (
                StatusCode::BAD_GATEWAY,
                ErrorResponse {
                    error: "Upstream unavailable".to_string(),
                    details: Some(details),
                },
            ),
            other @ (RouteError::NoNodesAvailable | RouteError::Internal(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse {
                    error: "Internal server error".to_string(),
                    details: Some(other.to_string()),
                },
            ),
        };

        tracing::warn!(status = status.as_u16(), error = %body.error, "Route request failed");
        (status, Json(body)).into_response()
    }
}

/// Compare the fastest and the cleanest route between two points.
///
/// # Query Parameters
///
/// - `startLat`, `startLng`, `endLat`, `endLng`: decimal degrees (required)
/// - `userId`: caller id used for attribution (required)
/// - `mode`: `walking` (default) or `cycling`
///
/// # Returns
///
/// - `200 OK` with `{fastest, cleanest}`
/// - `400 Bad Request` for missing or invalid parameters
/// - `502 Bad Gateway` when the directions provider is unavailable
/// - `500 Internal Server Error` on unexpected failures
pub async fn clean_route<D, S, A>(
    State(state): State<Arc<AppState<D, S, A>>>,
    query: Result<Query<CleanRouteQuery>, QueryRejection>,
) -> Result<Json<RouteComparison>, RouteError>
where
    D: DirectionsProvider + 'static,
    S: SegmentRepository + 'static,
    A: AqiProvider + 'static,
{
    let Query(query) = query.map_err(|e| RouteError::InvalidRequest(e.body_text()))?;
    let request = query.into_request()?;

    tracing::info!(
        user_id = %request.user_id,
        start_lat = request.start.lat,
        start_lng = request.start.lng,
        end_lat = request.end.lat,
        end_lng = request.end.lng,
        mode = %request.mode,
        "Received cleanroute request"
    );

    let comparison = state.engine.compare(&request).await?;
    Ok(Json(comparison))
}

/// Health check endpoint.
///
/// Returns service status and version.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
