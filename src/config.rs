//! Service configuration from environment variables.
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `CLEANROUTE_PORT` | HTTP server port | 8080 |
//! | `CLEANROUTE_SEGMENTS` | GeoJSON or OSM PBF street segment file | None (no segment data) |
//! | `CLEANROUTE_POLLUTION` | JSON hotspot file used to weight PBF segments | None |
//! | `GOOGLE_MAPS_API_KEY` | Directions API key | Required |
//! | `GOOGLE_AIR_QUALITY_API_KEY` | Air Quality API key | Required |
//! | `CLEANROUTE_DIRECTIONS_URL` | Directions API base URL | Google |
//! | `CLEANROUTE_AIR_QUALITY_URL` | Air Quality API base URL | Google |
//! | `CLEANROUTE_BUFFER_DEGREES` | Segment search buffer around start/end | 0.15 |
//! | `CLEANROUTE_SAMPLE_INTERVAL_M` | Exposure sampling interval, at least 1 | 200 |
//! | `CLEANROUTE_MAX_SAMPLES` | Exposure samples per route, 1 to 10 | 10 |
//! | `CLEANROUTE_UPSTREAM_TIMEOUT_MS` | Directions and segment query timeout | 10000 |
//! | `CLEANROUTE_AQI_TIMEOUT_MS` | Timeout per AQI lookup | 5000 |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::engine::EngineConfig;
use crate::error::ConfigError;

/// Upper bound on AQI lookups per route.
const MAX_SAMPLES_LIMIT: usize = 10;
const MIN_SAMPLE_INTERVAL_M: f64 = 1.0;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub segments_path: Option<PathBuf>,
    pub pollution_path: Option<PathBuf>,
    pub maps_api_key: String,
    pub air_quality_api_key: String,
    pub directions_base_url: Option<String>,
    pub air_quality_base_url: Option<String>,
    pub engine: EngineConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = EngineConfig::default();

        let buffer_degrees: f64 = parse(&get, "CLEANROUTE_BUFFER_DEGREES", defaults.buffer_degrees)?;
        if !buffer_degrees.is_finite() || buffer_degrees < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "CLEANROUTE_BUFFER_DEGREES",
                value: buffer_degrees.to_string(),
            });
        }
        let sample_interval_m: f64 = parse(&get, "CLEANROUTE_SAMPLE_INTERVAL_M", defaults.sample_interval_m)?;
        if !sample_interval_m.is_finite() || sample_interval_m < MIN_SAMPLE_INTERVAL_M {
            return Err(ConfigError::InvalidValue {
                key: "CLEANROUTE_SAMPLE_INTERVAL_M",
                value: sample_interval_m.to_string(),
            });
        }
        let max_samples: usize = parse(&get, "CLEANROUTE_MAX_SAMPLES", defaults.max_samples)?;
        if !(1..=MAX_SAMPLES_LIMIT).contains(&max_samples) {
            return Err(ConfigError::InvalidValue {
                key: "CLEANROUTE_MAX_SAMPLES",
                value: max_samples.to_string(),
            });
        }
        let upstream_ms: u64 = parse(
            &get,
            "CLEANROUTE_UPSTREAM_TIMEOUT_MS",
            defaults.directions_timeout.as_millis() as u64,
        )?;
        let aqi_ms: u64 = parse(&get, "CLEANROUTE_AQI_TIMEOUT_MS", defaults.aqi_timeout.as_millis() as u64)?;

        Ok(Self {
            port: parse(&get, "CLEANROUTE_PORT", 8080)?,
            segments_path: get("CLEANROUTE_SEGMENTS").map(PathBuf::from),
            pollution_path: get("CLEANROUTE_POLLUTION").map(PathBuf::from),
            maps_api_key: get("GOOGLE_MAPS_API_KEY").ok_or(ConfigError::Missing("GOOGLE_MAPS_API_KEY"))?,
            air_quality_api_key: get("GOOGLE_AIR_QUALITY_API_KEY")
                .ok_or(ConfigError::Missing("GOOGLE_AIR_QUALITY_API_KEY"))?,
            directions_base_url: get("CLEANROUTE_DIRECTIONS_URL"),
            air_quality_base_url: get("CLEANROUTE_AIR_QUALITY_URL"),
            engine: EngineConfig {
                buffer_degrees,
                sample_interval_m,
                max_samples,
                directions_timeout: Duration::from_millis(upstream_ms),
                segments_timeout: Duration::from_millis(upstream_ms),
                aqi_timeout: Duration::from_millis(aqi_ms),
            },
        })
    }
}

fn parse<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
    }
}
