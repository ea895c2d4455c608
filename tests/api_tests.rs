//! Integration tests for the HTTP API.

use axum::http::StatusCode;
use axum_test::TestServer;
use cleanroute::aqi::AqiProvider;
use cleanroute::directions::{DirectionsProvider, RouteSummary, TravelMode};
use cleanroute::engine::{CleanRouteEngine, EngineConfig};
use cleanroute::error::ProviderError;
use cleanroute::geo_utils::{Point, decode_polyline, encode_polyline};
use cleanroute::pollution::PollutionMap;
use cleanroute::segments::SegmentStore;
use cleanroute::{AppState, router};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Directions stub returning canned routes and recording the requested mode.
struct StubDirections {
    routes: Vec<RouteSummary>,
    modes: Mutex<Vec<TravelMode>>,
}

impl DirectionsProvider for StubDirections {
    async fn route(
        &self,
        _origin: Point,
        _destination: Point,
        mode: TravelMode,
    ) -> Result<Vec<RouteSummary>, ProviderError> {
        self.modes.lock().unwrap().push(mode);
        Ok(self.routes.clone())
    }
}

/// Fails for points east of `cutoff`, 50 elsewhere.
struct PatchyAqi {
    cutoff: f64,
}

impl AqiProvider for PatchyAqi {
    async fn lookup(&self, point: Point) -> Option<u32> {
        (point.lng <= self.cutoff).then_some(50)
    }
}

const SEGMENTS: &str = r#"{
    "type": "FeatureCollection",
    "features": [
        {"type": "Feature", "id": "A", "properties": {"embedding": [5.0]},
         "geometry": {"type": "LineString", "coordinates": [[0.0, 0.0], [0.0005, 0.0]]}},
        {"type": "Feature", "id": "B", "properties": {"embedding": [1.0]},
         "geometry": {"type": "LineString", "coordinates": [[0.001, 0.0], [0.0005, 0.0]]}},
        {"type": "Feature", "id": "C", "properties": {"embedding": [100.0]},
         "geometry": {"type": "LineString", "coordinates": [[0.0, 0.0], [0.0005, 0.0003], [0.001, 0.0]]}}
    ]
}"#;

fn summary(points: &[(f64, f64)], distance: f64, time: f64) -> RouteSummary {
    let points: Vec<Point> = points.iter().map(|&(lat, lng)| Point::new(lat, lng)).collect();
    RouteSummary {
        polyline: encode_polyline(&points),
        distance_meters: distance,
        duration_seconds: time,
    }
}

fn fastest() -> RouteSummary {
    summary(&[(0.0, 0.0), (0.0001, 0.0005), (0.0, 0.001)], 112.0, 80.0)
}

fn alternate() -> RouteSummary {
    summary(&[(0.0, 0.0), (-0.0001, 0.0005), (0.0, 0.001)], 115.0, 82.0)
}

fn write_segments(dir: &TempDir) -> SegmentStore {
    let path = dir.path().join("segments.geojson");
    std::fs::write(&path, SEGMENTS).unwrap();
    SegmentStore::from_path(&path, &PollutionMap::new()).unwrap()
}

fn create_test_server(routes: Vec<RouteSummary>, segments: SegmentStore) -> (TestServer, Arc<AppState<StubDirections, SegmentStore, PatchyAqi>>) {
    let directions = StubDirections {
        routes,
        modes: Mutex::new(Vec::new()),
    };
    let engine = CleanRouteEngine::new(
        directions,
        segments,
        PatchyAqi { cutoff: 180.0 },
        EngineConfig::default(),
    );
    let state = Arc::new(AppState { engine });
    let server = TestServer::new(router(state.clone())).unwrap();
    (server, state)
}

const ROUTE_QUERY: &str = "/cleanroute?startLat=0&startLng=0&endLat=0&endLng=0.001&userId=u-42";

#[tokio::test]
async fn test_health_endpoint() {
    let (server, _) = create_test_server(vec![fastest()], SegmentStore::empty());

    let response = server.get("/health").await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["status"], "healthy");
    assert!(json["version"].as_str().is_some());
}

#[tokio::test]
async fn test_cleanroute_uses_segment_graph() {
    let dir = TempDir::new().unwrap();
    let (server, _) = create_test_server(vec![fastest(), alternate()], write_segments(&dir));

    let response = server.get(ROUTE_QUERY).await;

    response.assert_status_ok();
    let json: Value = response.json();

    assert_eq!(json["fastest"]["polyline"], fastest().polyline);
    assert_eq!(json["fastest"]["distance"], 112.0);
    assert_eq!(json["fastest"]["time"], 80.0);
    assert_eq!(json["fastest"]["exposure"], 50.0);

    // A (5) + B (1) beats the direct C (100)
    let cleanest = decode_polyline(json["cleanest"]["polyline"].as_str().unwrap()).unwrap();
    assert_eq!(
        cleanest,
        vec![Point::new(0.0, 0.0), Point::new(0.0, 0.0005), Point::new(0.0, 0.001)]
    );
    let distance = json["cleanest"]["distance"].as_f64().unwrap();
    assert!((distance - 111.2).abs() < 0.5, "got {distance}");
    let time = json["cleanest"]["time"].as_f64().unwrap();
    assert!((time - distance / 1.4).abs() < 1e-6);
    assert_eq!(json["cleanest"]["exposure"], 50.0);
}

#[tokio::test]
async fn test_cleanroute_without_segments_uses_alternate() {
    let (server, _) = create_test_server(vec![fastest(), alternate()], SegmentStore::empty());

    let response = server.get(ROUTE_QUERY).await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["cleanest"]["polyline"], alternate().polyline);
    assert_eq!(json["cleanest"]["distance"], 115.0);
    assert_eq!(json["cleanest"]["time"], 82.0);
}

#[tokio::test]
async fn test_cleanroute_single_route_repeats_fastest() {
    let (server, _) = create_test_server(vec![fastest()], SegmentStore::empty());

    let response = server.get(ROUTE_QUERY).await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["cleanest"], json["fastest"]);
}

#[tokio::test]
async fn test_cleanroute_no_directions_is_bad_gateway() {
    let (server, _) = create_test_server(Vec::new(), SegmentStore::empty());

    let response = server.get(ROUTE_QUERY).await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    let json: Value = response.json();
    assert_eq!(json["error"], "Upstream unavailable");
    assert!(json["details"].as_str().unwrap().contains("no routes"));
}

#[tokio::test]
async fn test_cleanroute_missing_params() {
    let (server, _) = create_test_server(vec![fastest()], SegmentStore::empty());

    let response = server.get("/cleanroute?startLat=0&startLng=0&endLat=0&endLng=0.001").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let json: Value = response.json();
    assert!(json["error"].as_str().unwrap().contains("userId"));

    let response = server.get("/cleanroute?startLng=0&endLat=0&endLng=0.001&userId=u").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let json: Value = response.json();
    assert!(json["error"].as_str().unwrap().contains("startLat"));

    let response = server.get("/cleanroute").await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cleanroute_invalid_params() {
    let (server, _) = create_test_server(vec![fastest()], SegmentStore::empty());

    let response = server
        .get("/cleanroute?startLat=abc&startLng=0&endLat=0&endLng=0.001&userId=u")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .get("/cleanroute?startLat=95&startLng=0&endLat=0&endLng=0.001&userId=u")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server.get(&format!("{ROUTE_QUERY}&mode=driving")).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let json: Value = response.json();
    assert!(json["error"].as_str().unwrap().contains("driving"));
}

#[tokio::test]
async fn test_cleanroute_mode_forwarded() {
    let (server, state) = create_test_server(vec![fastest()], SegmentStore::empty());

    server.get(ROUTE_QUERY).await.assert_status_ok();
    server.get(&format!("{ROUTE_QUERY}&mode=cycling")).await.assert_status_ok();

    let modes = state.engine.directions().modes.lock().unwrap().clone();
    assert_eq!(modes, vec![TravelMode::Walking, TravelMode::Cycling]);
}

#[tokio::test]
async fn test_cleanroute_failed_samples_average_to_zero() {
    let directions = StubDirections {
        routes: vec![fastest()],
        modes: Mutex::new(Vec::new()),
    };
    // every point is east of the cutoff, so every lookup fails
    let engine = CleanRouteEngine::new(
        directions,
        SegmentStore::empty(),
        PatchyAqi { cutoff: -1.0 },
        EngineConfig::default(),
    );
    let server = TestServer::new(router(Arc::new(AppState { engine }))).unwrap();

    let response = server.get(ROUTE_QUERY).await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["fastest"]["exposure"], 0.0);
    assert_eq!(json["cleanest"]["exposure"], 0.0);
}
