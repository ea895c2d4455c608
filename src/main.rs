//! Clean route service: compares the fastest and the least polluted route
//! between two points.
//!
//! See [`cleanroute::config`] for environment variables.
//!
//! ## Endpoints
//!
//! - `GET /cleanroute?startLat=..&startLng=..&endLat=..&endLng=..&userId=..&mode=walking`
//! - `GET /health`

use std::net::SocketAddr;
use std::sync::Arc;

use cleanroute::aqi::GoogleAirQuality;
use cleanroute::config::Config;
use cleanroute::directions::GoogleDirections;
use cleanroute::engine::CleanRouteEngine;
use cleanroute::pollution::PollutionMap;
use cleanroute::segments::SegmentStore;
use cleanroute::{AppState, ServiceState, router};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cleanroute=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    // 1. Pollution weighting (only used for OSM extracts)
    let pollution = match &config.pollution_path {
        Some(path) => PollutionMap::from_json_file(path)?,
        None => PollutionMap::new(),
    };

    // 2. Street segments
    let segments = match &config.segments_path {
        Some(path) => SegmentStore::from_path(path, &pollution)?,
        None => {
            tracing::warn!("CLEANROUTE_SEGMENTS not set, cleanest routes will use provider alternates");
            SegmentStore::empty()
        }
    };

    // 3. Upstream providers
    let mut directions = GoogleDirections::new(&config.maps_api_key, config.engine.directions_timeout)?;
    if let Some(url) = &config.directions_base_url {
        directions = directions.with_base_url(url);
    }
    let mut aqi = GoogleAirQuality::new(&config.air_quality_api_key, config.engine.aqi_timeout)?;
    if let Some(url) = &config.air_quality_base_url {
        aqi = aqi.with_base_url(url);
    }

    tracing::info!(
        segments = segments.len(),
        pollution_cells = pollution.cell_count(),
        buffer_degrees = config.engine.buffer_degrees,
        max_samples = config.engine.max_samples,
        port = config.port,
        "Starting clean route service"
    );

    let engine = CleanRouteEngine::new(directions, segments, aqi, config.engine.clone());
    let state: Arc<ServiceState> = Arc::new(AppState { engine });
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
