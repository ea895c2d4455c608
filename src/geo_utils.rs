//! Geodesic helpers: distances, search polygons, encoded polylines and
//! fixed-interval sampling along a path.

use geo::prelude::*;
use geo::{LineString, Polygon};
use serde::{Deserialize, Serialize};

use crate::error::PolylineError;

const POLYLINE_FACTOR: f64 = 1e5;

/// A WGS84 coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lat: f64,
    pub lng: f64,
}

impl Point {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// True when both components are finite and inside the WGS84 ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

impl From<Point> for geo::Point<f64> {
    fn from(p: Point) -> Self {
        geo::Point::new(p.lng, p.lat)
    }
}

impl From<geo::Point<f64>> for Point {
    fn from(p: geo::Point<f64>) -> Self {
        Point::new(p.y(), p.x())
    }
}

impl From<Point> for geo::Coord<f64> {
    fn from(p: Point) -> Self {
        geo::Coord { x: p.lng, y: p.lat }
    }
}

/// Great-circle distance in meters.
pub fn haversine_distance(a: Point, b: Point) -> f64 {
    geo::Point::from(a).haversine_distance(&geo::Point::from(b))
}

/// Total haversine length of a path in meters.
pub fn line_length(points: &[Point]) -> f64 {
    points
        .windows(2)
        .map(|w| haversine_distance(w[0], w[1]))
        .sum()
}

/// Axis-aligned search rectangle around two points, grown by `buffer_degrees`
/// on every side. The exterior ring is closed and in (lng, lat) order.
pub fn bounding_polygon(a: Point, b: Point, buffer_degrees: f64) -> Polygon<f64> {
    let min_lat = a.lat.min(b.lat) - buffer_degrees;
    let max_lat = a.lat.max(b.lat) + buffer_degrees;
    let min_lng = a.lng.min(b.lng) - buffer_degrees;
    let max_lng = a.lng.max(b.lng) + buffer_degrees;

    Polygon::new(
        LineString::from(vec![
            (min_lng, min_lat),
            (max_lng, min_lat),
            (max_lng, max_lat),
            (min_lng, max_lat),
            (min_lng, min_lat),
        ]),
        vec![],
    )
}

/// Encode points with the standard polyline algorithm (precision 1e5).
pub fn encode_polyline(points: &[Point]) -> String {
    let mut out = String::with_capacity(points.len() * 8);
    let (mut prev_lat, mut prev_lng) = (0i64, 0i64);

    for p in points {
        let lat = (p.lat * POLYLINE_FACTOR).round() as i64;
        let lng = (p.lng * POLYLINE_FACTOR).round() as i64;
        encode_value(lat - prev_lat, &mut out);
        encode_value(lng - prev_lng, &mut out);
        prev_lat = lat;
        prev_lng = lng;
    }

    out
}

fn encode_value(value: i64, out: &mut String) {
    let mut v = value << 1;
    if value < 0 {
        v = !v;
    }
    let mut v = v as u64;
    while v >= 0x20 {
        out.push((((v & 0x1f) | 0x20) as u8 + 63) as char);
        v >>= 5;
    }
    out.push((v as u8 + 63) as char);
}

/// Decode a standard encoded polyline (precision 1e5).
pub fn decode_polyline(encoded: &str) -> Result<Vec<Point>, PolylineError> {
    let bytes = encoded.as_bytes();
    let mut index = 0;
    let (mut lat, mut lng) = (0i64, 0i64);
    let mut points = Vec::new();

    while index < bytes.len() {
        let start = index;
        lat = lat
            .checked_add(decode_value(bytes, &mut index)?)
            .ok_or(PolylineError::Overflow(start))?;
        let start = index;
        lng = lng
            .checked_add(decode_value(bytes, &mut index)?)
            .ok_or(PolylineError::Overflow(start))?;
        points.push(Point::new(
            lat as f64 / POLYLINE_FACTOR,
            lng as f64 / POLYLINE_FACTOR,
        ));
    }

    Ok(points)
}

fn decode_value(bytes: &[u8], index: &mut usize) -> Result<i64, PolylineError> {
    let start = *index;
    let mut result: u64 = 0;
    let mut shift = 0;

    loop {
        let byte = *bytes.get(*index).ok_or(PolylineError::Truncated)?;
        if !(63..=126).contains(&byte) {
            return Err(PolylineError::InvalidCharacter {
                byte,
                offset: *index,
            });
        }
        if shift > 60 {
            return Err(PolylineError::Overflow(start));
        }
        let chunk = u64::from(byte - 63);
        *index += 1;
        result |= (chunk & 0x1f) << shift;
        shift += 5;
        if chunk < 0x20 {
            break;
        }
    }

    let value = (result >> 1) as i64;
    Ok(if result & 1 != 0 { !value } else { value })
}

/// Evenly spaced points along `line`, roughly `interval_meters` apart and never
/// more than `max_samples`. Both endpoints are included when `max_samples >= 2`.
pub fn sample_along_line(line: &[Point], interval_meters: f64, max_samples: usize) -> Vec<Point> {
    let Some(&first) = line.first() else {
        return Vec::new();
    };
    if max_samples == 0 {
        return Vec::new();
    }

    let mut cumulative = Vec::with_capacity(line.len());
    let mut total = 0.0;
    cumulative.push(0.0);
    for w in line.windows(2) {
        total += haversine_distance(w[0], w[1]);
        cumulative.push(total);
    }

    if total <= 0.0 || max_samples == 1 {
        return vec![first];
    }

    let segments = if interval_meters > 0.0 {
        (total / interval_meters).ceil().max(1.0) as usize
    } else {
        max_samples - 1
    };
    let count = segments.saturating_add(1).min(max_samples);
    let step = total / (count - 1) as f64;

    let mut samples = Vec::with_capacity(count);
    let mut seg = 0;
    for i in 0..count {
        if i == 0 {
            samples.push(first);
            continue;
        }
        if i == count - 1 {
            samples.push(line[line.len() - 1]);
            break;
        }
        let target = step * i as f64;
        while seg + 2 < cumulative.len() && cumulative[seg + 1] < target {
            seg += 1;
        }
        let (a, b) = (line[seg], line[seg + 1]);
        let span = cumulative[seg + 1] - cumulative[seg];
        if span <= 0.0 {
            samples.push(a);
            continue;
        }
        let fraction = ((target - cumulative[seg]) / span).clamp(0.0, 1.0);
        let p = geo::Point::from(a).haversine_intermediate(&geo::Point::from(b), fraction);
        samples.push(p.into());
    }

    samples
}
