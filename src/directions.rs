//! Directions provider: the "fastest" route and its alternates.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{ProviderError, RouteError};
use crate::geo_utils::Point;

/// How the route will be travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelMode {
    #[default]
    Walking,
    Cycling,
}

impl TravelMode {
    /// Assumed average speed in meters per second.
    pub fn speed_mps(self) -> f64 {
        match self {
            TravelMode::Walking => 1.4,
            TravelMode::Cycling => 4.2,
        }
    }

    /// Mode name understood by the Google Directions API.
    pub fn google_name(self) -> &'static str {
        match self {
            TravelMode::Walking => "walking",
            TravelMode::Cycling => "bicycling",
        }
    }
}

impl fmt::Display for TravelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TravelMode::Walking => write!(f, "walking"),
            TravelMode::Cycling => write!(f, "cycling"),
        }
    }
}

impl FromStr for TravelMode {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "walking" => Ok(TravelMode::Walking),
            "cycling" | "bicycling" => Ok(TravelMode::Cycling),
            other => Err(RouteError::InvalidRequest(format!(
                "unknown travel mode {other:?}, expected walking or cycling"
            ))),
        }
    }
}

/// One route as reported by a directions provider.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteSummary {
    /// Encoded polyline, precision 1e5.
    pub polyline: String,
    pub distance_meters: f64,
    pub duration_seconds: f64,
}

/// Routes between two points, ordered by provider preference (index 0 is the
/// primary/fastest route).
pub trait DirectionsProvider: Send + Sync {
    fn route(
        &self,
        origin: Point,
        destination: Point,
        mode: TravelMode,
    ) -> impl Future<Output = Result<Vec<RouteSummary>, ProviderError>> + Send;
}

#[derive(Debug, Deserialize)]
pub(crate) struct DirectionsResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    routes: Vec<RawRoute>,
}

#[derive(Debug, Deserialize)]
struct RawRoute {
    overview_polyline: RawPolyline,
    #[serde(default)]
    legs: Vec<RawLeg>,
}

#[derive(Debug, Deserialize)]
struct RawPolyline {
    points: String,
}

#[derive(Debug, Deserialize)]
struct RawLeg {
    distance: RawValue,
    duration: RawValue,
}

#[derive(Debug, Deserialize)]
struct RawValue {
    value: f64,
}

impl DirectionsResponse {
    /// Routes with a first leg; anything else is dropped.
    pub(crate) fn into_summaries(self) -> Vec<RouteSummary> {
        self.routes
            .into_iter()
            .enumerate()
            .filter_map(|(i, route)| {
                let Some(leg) = route.legs.first() else {
                    tracing::warn!(route = i, "Directions route has no legs, dropping");
                    return None;
                };
                Some(RouteSummary {
                    polyline: route.overview_polyline.points,
                    distance_meters: leg.distance.value,
                    duration_seconds: leg.duration.value,
                })
            })
            .collect()
    }
}

/// Google Maps Directions API client.
pub struct GoogleDirections {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GoogleDirections {
    pub const DEFAULT_BASE_URL: &'static str = "https://maps.googleapis.com";

    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: Self::DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

impl DirectionsProvider for GoogleDirections {
    async fn route(
        &self,
        origin: Point,
        destination: Point,
        mode: TravelMode,
    ) -> Result<Vec<RouteSummary>, ProviderError> {
        let url = format!("{}/maps/api/directions/json", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("origin", format!("{},{}", origin.lat, origin.lng)),
                ("destination", format!("{},{}", destination.lat, destination.lng)),
                ("mode", mode.google_name().to_string()),
                ("alternatives", "true".to_string()),
                ("key", self.api_key.clone()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: DirectionsResponse = response.json().await?;
        tracing::debug!(
            status = body.status.as_deref().unwrap_or("?"),
            routes = body.routes.len(),
            "Directions response"
        );
        if let Some(message) = &body.error_message {
            tracing::warn!(message = %message, "Directions provider reported an error");
        }

        Ok(body.into_summaries())
    }
}
