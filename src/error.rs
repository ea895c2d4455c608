//! Error types for the clean-air route engine.

use thiserror::Error;

/// Errors surfaced by a route comparison request.
///
/// Missing segment data and unreachable targets are not errors: they feed
/// the fallback ladder in [`crate::engine`] instead.
#[derive(Error, Debug)]
pub enum RouteError {
    /// Bad or missing request parameters.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The directions provider failed or returned no routes.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The graph has no vertices to snap a point onto.
    #[error("No graph nodes available for snapping")]
    NoNodesAvailable,

    /// Graph build or search failed unexpectedly.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failures talking to an external collaborator.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed upstream response: {0}")]
    Malformed(String),
}

/// Encoded polyline could not be decoded.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PolylineError {
    #[error("Invalid polyline character {byte:#04x} at offset {offset}")]
    InvalidCharacter { byte: u8, offset: usize },

    #[error("Polyline ends in the middle of a value")]
    Truncated,

    #[error("Polyline value at offset {0} does not fit in 64 bits")]
    Overflow(usize),
}

/// Errors loading segment or pollution data from disk.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("OSM PBF error: {0}")]
    Osm(#[from] osmpbf::Error),

    #[error("Invalid coordinate: {0}")]
    InvalidLatLng(#[from] h3o::error::InvalidLatLng),

    #[error("Invalid data: {0}")]
    Invalid(String),
}

/// Startup configuration problems.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RouteError::InvalidRequest("missing startLat".to_string());
        assert!(err.to_string().contains("startLat"));

        let err = ProviderError::Status {
            status: 503,
            body: "busy".to_string(),
        };
        assert!(err.to_string().contains("503"));

        let err = PolylineError::InvalidCharacter {
            byte: b' ',
            offset: 4,
        };
        assert!(err.to_string().contains("offset 4"));

        let err = ConfigError::Missing("GOOGLE_MAPS_API_KEY");
        assert!(err.to_string().contains("GOOGLE_MAPS_API_KEY"));
    }
}
