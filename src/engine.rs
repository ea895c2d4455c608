//! Route comparison: fastest route from the directions provider, cleanest
//! route from the segment graph, both scored by sampled AQI exposure.
//!
//! A request always ends in a full two-route answer unless the input is bad
//! or the directions provider cannot be reached. When the graph cannot
//! produce a path the cleanest route degrades to the provider's alternate,
//! then to the fastest route itself.

use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio::time::timeout;

use crate::aqi::{AqiProvider, mean_exposure};
use crate::directions::{DirectionsProvider, RouteSummary, TravelMode};
use crate::error::RouteError;
use crate::geo_utils::{
    Point, bounding_polygon, decode_polyline, encode_polyline, line_length, sample_along_line,
};
use crate::graph::RouteGraph;
use crate::segments::{SegmentRepository, StreetSegment};

/// Tunables for a route comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Degrees added on every side of the start/end box when querying segments.
    pub buffer_degrees: f64,
    pub sample_interval_m: f64,
    pub max_samples: usize,
    pub directions_timeout: Duration,
    pub segments_timeout: Duration,
    /// Per AQI lookup; a timed-out lookup counts as a failed sample.
    pub aqi_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            buffer_degrees: 0.15,
            sample_interval_m: 200.0,
            max_samples: 10,
            directions_timeout: Duration::from_secs(10),
            segments_timeout: Duration::from_secs(10),
            aqi_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteRequest {
    pub start: Point,
    pub end: Point,
    /// Opaque caller id, only used for attribution in logs.
    pub user_id: String,
    pub mode: TravelMode,
}

impl RouteRequest {
    pub fn validate(&self) -> Result<(), RouteError> {
        if !self.start.is_valid() {
            return Err(RouteError::InvalidRequest(format!(
                "start coordinate ({}, {}) is not a valid lat/lng",
                self.start.lat, self.start.lng
            )));
        }
        if !self.end.is_valid() {
            return Err(RouteError::InvalidRequest(format!(
                "end coordinate ({}, {}) is not a valid lat/lng",
                self.end.lat, self.end.lng
            )));
        }
        if self.user_id.trim().is_empty() {
            return Err(RouteError::InvalidRequest("userId is required".to_string()));
        }
        Ok(())
    }
}

/// A scored route as returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteResult {
    pub polyline: String,
    #[serde(rename = "distance")]
    pub distance_meters: f64,
    #[serde(rename = "time")]
    pub duration_seconds: f64,
    /// Mean AQI over the sampled points, 0 when no sample succeeded.
    pub exposure: f64,
}

impl RouteResult {
    fn scored(route: &RouteSummary, exposure: f64) -> Self {
        Self {
            polyline: route.polyline.clone(),
            distance_meters: route.distance_meters,
            duration_seconds: route.duration_seconds,
            exposure,
        }
    }
}

/// Where the cleanest route came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CleanSource {
    Graph,
    Alternate,
    Fastest,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteComparison {
    pub fastest: RouteResult,
    pub cleanest: RouteResult,
    #[serde(skip)]
    pub cleanest_source: CleanSource,
}

/// Fallback ladder: graph path, else the provider's alternate, else fastest.
pub fn select_cleanest(
    graph_route: Option<RouteSummary>,
    fastest: &RouteSummary,
    alternate: Option<&RouteSummary>,
) -> (RouteSummary, CleanSource) {
    if let Some(route) = graph_route {
        return (route, CleanSource::Graph);
    }
    if let Some(route) = alternate {
        return (route.clone(), CleanSource::Alternate);
    }
    (fastest.clone(), CleanSource::Fastest)
}

/// Build the segment graph, snap both endpoints and search it. `None` when
/// there is nothing usable to route over.
pub fn search_clean_route(
    segments: &[StreetSegment],
    start: Point,
    end: Point,
    mode: TravelMode,
) -> Option<RouteSummary> {
    let graph = RouteGraph::build(segments);

    let (Ok(start_key), Ok(end_key)) = (graph.find_nearest_node(start), graph.find_nearest_node(end)) else {
        tracing::warn!("No graph nodes to snap to");
        return None;
    };
    tracing::debug!(start = start_key, end = end_key, "Snapped endpoints");

    let Some(path) = graph.dijkstra(start_key, end_key) else {
        tracing::warn!(start = start_key, end = end_key, "No clean path between snapped nodes");
        return None;
    };

    let geometry = graph.path_to_geometry(&path);
    if geometry.len() < 2 {
        tracing::warn!(nodes = path.len(), "Clean path has no usable geometry");
        return None;
    }

    let distance = line_length(&geometry);
    Some(RouteSummary {
        polyline: encode_polyline(&geometry),
        distance_meters: distance,
        duration_seconds: distance / mode.speed_mps(),
    })
}

/// Run a graph search off the async runtime. A panic inside `job` becomes
/// [`RouteError::Internal`].
async fn run_search<F>(job: F) -> Result<Option<RouteSummary>, RouteError>
where
    F: FnOnce() -> Option<RouteSummary> + Send + 'static,
{
    tokio::task::spawn_blocking(job).await.map_err(|e| {
        tracing::error!(error = %e, "Route search aborted");
        RouteError::Internal(format!("route search failed: {e}"))
    })
}

pub struct CleanRouteEngine<D, S, A> {
    directions: D,
    segments: S,
    aqi: A,
    config: EngineConfig,
}

impl<D, S, A> CleanRouteEngine<D, S, A>
where
    D: DirectionsProvider,
    S: SegmentRepository,
    A: AqiProvider,
{
    pub fn new(directions: D, segments: S, aqi: A, config: EngineConfig) -> Self {
        Self {
            directions,
            segments,
            aqi,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn directions(&self) -> &D {
        &self.directions
    }

    /// Compute and score the fastest and cleanest routes for `request`.
    #[tracing::instrument(
        name = "clean_route",
        skip_all,
        fields(user_id = %request.user_id, mode = %request.mode)
    )]
    pub async fn compare(&self, request: &RouteRequest) -> Result<RouteComparison, RouteError> {
        request.validate()?;

        let (routes, segments) = tokio::join!(self.fetch_routes(request), self.fetch_segments(request));
        let routes = routes?;
        let Some(fastest) = routes.first() else {
            tracing::error!("Directions provider returned no routes");
            return Err(RouteError::UpstreamUnavailable(
                "directions provider returned no routes".to_string(),
            ));
        };

        let graph_route = if segments.is_empty() {
            tracing::warn!("No segments found, falling back to provider routes");
            None
        } else {
            self.search(segments, request).await?
        };

        let (cleanest, source) = select_cleanest(graph_route, fastest, routes.get(1));
        tracing::info!(source = ?source, "Cleanest route selected");

        let (fastest_exposure, cleanest_exposure) = tokio::join!(
            self.exposure(&fastest.polyline),
            self.exposure(&cleanest.polyline)
        );
        tracing::info!(fastest_exposure, cleanest_exposure, "Computed routes successfully");

        Ok(RouteComparison {
            fastest: RouteResult::scored(fastest, fastest_exposure),
            cleanest: RouteResult::scored(&cleanest, cleanest_exposure),
            cleanest_source: source,
        })
    }

    async fn fetch_routes(&self, request: &RouteRequest) -> Result<Vec<RouteSummary>, RouteError> {
        let limit = self.config.directions_timeout;
        match timeout(limit, self.directions.route(request.start, request.end, request.mode)).await {
            Ok(Ok(routes)) => {
                tracing::debug!(routes = routes.len(), "Directions fetched");
                Ok(routes)
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Directions request failed");
                Err(RouteError::UpstreamUnavailable(e.to_string()))
            }
            Err(_) => {
                tracing::error!(timeout = ?limit, "Directions request timed out");
                Err(RouteError::UpstreamUnavailable(format!(
                    "directions request timed out after {limit:?}"
                )))
            }
        }
    }

    /// Segments around the request. Failures degrade to "no data".
    async fn fetch_segments(&self, request: &RouteRequest) -> Vec<StreetSegment> {
        let polygon = bounding_polygon(request.start, request.end, self.config.buffer_degrees);
        let limit = self.config.segments_timeout;
        match timeout(limit, self.segments.find_segments_intersecting(&polygon)).await {
            Ok(Ok(segments)) => {
                tracing::info!(segments = segments.len(), "Found street segments");
                segments
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Segment query failed");
                Vec::new()
            }
            Err(_) => {
                tracing::warn!(timeout = ?limit, "Segment query timed out");
                Vec::new()
            }
        }
    }

    async fn search(
        &self,
        segments: Vec<StreetSegment>,
        request: &RouteRequest,
    ) -> Result<Option<RouteSummary>, RouteError> {
        let (start, end, mode) = (request.start, request.end, request.mode);
        run_search(move || search_clean_route(&segments, start, end, mode)).await
    }

    /// Mean AQI over points sampled along an encoded polyline. All lookups
    /// run concurrently and are joined before averaging.
    pub async fn exposure(&self, polyline: &str) -> f64 {
        let line = match decode_polyline(polyline) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "Cannot decode route polyline, exposure unknown");
                return 0.0;
            }
        };

        let points = sample_along_line(&line, self.config.sample_interval_m, self.config.max_samples);
        let limit = self.config.aqi_timeout;
        let samples = join_all(points.iter().map(|&point| async move {
            timeout(limit, self.aqi.lookup(point)).await.unwrap_or_else(|_| {
                tracing::debug!(lat = point.lat, lng = point.lng, "AQI lookup timed out");
                None
            })
        }))
        .await;

        let valid = samples.iter().flatten().count();
        tracing::debug!(valid, total = samples.len(), "Sampled AQI values");
        mean_exposure(&samples)
    }
}
