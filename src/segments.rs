//! Street segments and the geospatial store they are queried from.

use std::future::Future;
use std::path::Path;

use geo::prelude::*;
use geo::{LineString, Polygon};
use geojson::{Feature, GeoJson, Value as GeoJsonValue, feature::Id};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{AABB, RTree};
use serde_json::Value as JsonValue;

use crate::error::{DataError, ProviderError};
use crate::geo_utils::Point;
use crate::osm;
use crate::pollution::PollutionMap;

/// A piece of street between two intersections.
#[derive(Debug, Clone, PartialEq)]
pub struct StreetSegment {
    pub id: String,
    /// At least two points, in travel-agnostic order.
    pub geometry: Vec<Point>,
    /// Opaque per-segment routing cost supplied by the data source.
    pub weight: Option<f64>,
}

impl StreetSegment {
    pub fn new(id: impl Into<String>, geometry: Vec<Point>, weight: Option<f64>) -> Self {
        Self {
            id: id.into(),
            geometry,
            weight,
        }
    }

    /// Edge cost used by the search. Missing, zero, negative or non-finite
    /// weights become 1.0.
    pub fn cost(&self) -> f64 {
        match self.weight {
            Some(w) if w.is_finite() && w > 0.0 => w,
            _ => 1.0,
        }
    }

    pub fn line_string(&self) -> LineString<f64> {
        self.geometry
            .iter()
            .map(|p| geo::Coord::from(*p))
            .collect()
    }
}

/// Source of street segments for a search area.
///
/// An area without data yields an empty list, not an error.
pub trait SegmentRepository: Send + Sync {
    fn find_segments_intersecting(
        &self,
        polygon: &Polygon<f64>,
    ) -> impl Future<Output = Result<Vec<StreetSegment>, ProviderError>> + Send;
}

type IndexedBounds = GeomWithData<Rectangle<[f64; 2]>, usize>;

/// In-memory segment repository indexed by bounding rectangle.
pub struct SegmentStore {
    segments: Vec<StreetSegment>,
    index: RTree<IndexedBounds>,
}

impl SegmentStore {
    pub fn new(segments: Vec<StreetSegment>) -> Self {
        let entries = segments
            .iter()
            .enumerate()
            .filter_map(|(i, segment)| {
                let rect = segment.line_string().bounding_rect()?;
                let (min, max) = (rect.min(), rect.max());
                Some(GeomWithData::new(
                    Rectangle::from_corners([min.x, min.y], [max.x, max.y]),
                    i,
                ))
            })
            .collect();

        Self {
            segments,
            index: RTree::bulk_load(entries),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Load segments from a GeoJSON FeatureCollection (`.geojson`, `.json`)
    /// or an OpenStreetMap extract (`.pbf`).
    pub fn from_path(path: impl AsRef<Path>, pollution: &PollutionMap) -> Result<Self, DataError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        let segments = match extension.as_deref() {
            Some("geojson") | Some("json") => {
                let text = std::fs::read_to_string(path)?;
                segments_from_geojson(&text)?
            }
            Some("pbf") => osm::segments_from_pbf(path, pollution)?,
            _ => {
                return Err(DataError::Invalid(format!(
                    "unsupported segment file: {}",
                    path.display()
                )));
            }
        };

        tracing::info!(path = %path.display(), segments = segments.len(), "Segment store loaded");
        Ok(Self::new(segments))
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segments whose geometry intersects `polygon`.
    pub fn query(&self, polygon: &Polygon<f64>) -> Vec<StreetSegment> {
        let Some(rect) = polygon.bounding_rect() else {
            return Vec::new();
        };
        let envelope = AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);

        self.index
            .locate_in_envelope_intersecting(&envelope)
            .map(|entry| &self.segments[entry.data])
            .filter(|segment| polygon.intersects(&segment.line_string()))
            .cloned()
            .collect()
    }
}

impl SegmentRepository for SegmentStore {
    async fn find_segments_intersecting(
        &self,
        polygon: &Polygon<f64>,
    ) -> Result<Vec<StreetSegment>, ProviderError> {
        Ok(self.query(polygon))
    }
}

/// Parse a FeatureCollection of line geometries into segments.
pub fn segments_from_geojson(text: &str) -> Result<Vec<StreetSegment>, DataError> {
    let collection = match text.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(fc) => fc,
        _ => {
            return Err(DataError::Invalid(
                "expected a GeoJSON FeatureCollection".to_string(),
            ));
        }
    };

    let mut segments = Vec::new();
    for (position, feature) in collection.features.iter().enumerate() {
        let Some(geometry) = &feature.geometry else {
            continue;
        };
        let id = feature_id(feature).unwrap_or_else(|| position.to_string());
        let weight = feature_weight(feature);

        match &geometry.value {
            GeoJsonValue::LineString(coords) => {
                if let Some(line) = to_points(coords) {
                    segments.push(StreetSegment::new(id, line, weight));
                }
            }
            GeoJsonValue::MultiLineString(parts) => {
                for (n, coords) in parts.iter().enumerate() {
                    if let Some(line) = to_points(coords) {
                        segments.push(StreetSegment::new(format!("{id}/{n}"), line, weight));
                    }
                }
            }
            _ => {
                tracing::debug!(id = %id, "Skipping non-line feature");
            }
        }
    }

    Ok(segments)
}

fn to_points(coords: &[Vec<f64>]) -> Option<Vec<Point>> {
    let points: Vec<Point> = coords
        .iter()
        .filter(|c| c.len() >= 2)
        .map(|c| Point::new(c[1], c[0]))
        .collect();
    (points.len() >= 2).then_some(points)
}

fn feature_id(feature: &Feature) -> Option<String> {
    match &feature.id {
        Some(Id::String(s)) => return Some(s.clone()),
        Some(Id::Number(n)) => return Some(n.to_string()),
        None => {}
    }
    ["id", "_id"]
        .iter()
        .find_map(|key| match feature.property(*key)? {
            JsonValue::String(s) => Some(s.clone()),
            JsonValue::Number(n) => Some(n.to_string()),
            JsonValue::Object(o) => o.get("$oid").and_then(|v| v.as_str()).map(str::to_string),
            _ => None,
        })
}

fn feature_weight(feature: &Feature) -> Option<f64> {
    if let Some(w) = feature.property("weight").and_then(JsonValue::as_f64) {
        return Some(w);
    }
    feature
        .property("embedding")
        .and_then(JsonValue::as_array)
        .and_then(|values| values.first())
        .and_then(JsonValue::as_f64)
}
