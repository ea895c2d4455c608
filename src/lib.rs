//! Clean-air route engine.
//!
//! Compares the fastest route between two points with the route that
//! minimises cumulative pollution cost over a street-segment graph, and
//! scores both by AQI sampled along the way. The library backs the
//! `cleanroute` binary and the integration tests.

pub mod aqi;
pub mod config;
pub mod directions;
pub mod engine;
pub mod error;
pub mod geo_utils;
pub mod graph;
pub mod handlers;
pub mod osm;
pub mod pollution;
pub mod segments;

use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use aqi::{AqiProvider, GoogleAirQuality};
use directions::{DirectionsProvider, GoogleDirections};
use engine::CleanRouteEngine;
use segments::{SegmentRepository, SegmentStore};

/// Application state shared across handlers.
pub struct AppState<D, S, A> {
    pub engine: CleanRouteEngine<D, S, A>,
}

/// State wired to the production providers.
pub type ServiceState = AppState<GoogleDirections, SegmentStore, GoogleAirQuality>;

/// HTTP routes: `GET /cleanroute` and `GET /health`.
pub fn router<D, S, A>(state: Arc<AppState<D, S, A>>) -> Router
where
    D: DirectionsProvider + 'static,
    S: SegmentRepository + 'static,
    A: AqiProvider + 'static,
{
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/cleanroute", get(handlers::clean_route::<D, S, A>))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

// Re-export commonly used types for convenience
pub use engine::{EngineConfig, RouteComparison, RouteRequest, RouteResult};
pub use error::RouteError;
pub use geo_utils::Point;
