//! Air-quality lookups for sampled route points.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::geo_utils::Point;

/// Point pollution index source. Failures are reported as `None` and never
/// abort the caller.
pub trait AqiProvider: Send + Sync {
    fn lookup(&self, point: Point) -> impl Future<Output = Option<u32>> + Send;
}

/// Mean of the successful samples; 0.0 when every sample failed.
pub fn mean_exposure(samples: &[Option<u32>]) -> f64 {
    let (sum, count) = samples
        .iter()
        .flatten()
        .fold((0.0, 0usize), |(sum, count), &aqi| (sum + f64::from(aqi), count + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

#[derive(Debug, Serialize)]
struct LookupRequest {
    location: LookupLocation,
}

#[derive(Debug, Serialize)]
struct LookupLocation {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LookupResponse {
    #[serde(default)]
    indexes: Vec<AqiIndex>,
}

#[derive(Debug, Deserialize)]
struct AqiIndex {
    #[serde(default)]
    aqi: Option<f64>,
}

impl LookupResponse {
    /// First index carrying a value, rounded. An AQI of 0 is a real reading
    /// and is returned, not skipped.
    pub(crate) fn aqi(&self) -> Option<u32> {
        self.indexes
            .iter()
            .find_map(|index| index.aqi)
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| v.round() as u32)
    }
}

/// Google Air Quality API client (`currentConditions:lookup`).
pub struct GoogleAirQuality {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GoogleAirQuality {
    pub const DEFAULT_BASE_URL: &'static str = "https://airquality.googleapis.com";

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

    async fn fetch(&self, point: Point) -> Result<Option<u32>, ProviderError> {
        let url = format!("{}/v1/currentConditions:lookup", self.base_url);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&LookupRequest {
                location: LookupLocation {
                    latitude: point.lat,
                    longitude: point.lng,
                },
            })
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

        let body: LookupResponse = response.json().await?;
        Ok(body.aqi())
    }
}

impl AqiProvider for GoogleAirQuality {
    async fn lookup(&self, point: Point) -> Option<u32> {
        match self.fetch(point).await {
            Ok(Some(aqi)) => Some(aqi),
            Ok(None) => {
                tracing::warn!(lat = point.lat, lng = point.lng, "No AQI data found in response");
                None
            }
            Err(e) => {
                tracing::warn!(lat = point.lat, lng = point.lng, error = %e, "AQI fetch failed");
                None
            }
        }
    }
}
