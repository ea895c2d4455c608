use h3o::{CellIndex, LatLng, Resolution};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::error::DataError;
use crate::geo_utils::{Point, line_length};

const RESOLUTION: Resolution = Resolution::Nine;
const BACKGROUND_LEVEL: f64 = 0.1;

/// A known pollution source. `level` is 0.0 (clean) to 1.0 (heavily polluted).
#[derive(Debug, Clone, Deserialize)]
pub struct Hotspot {
    pub lat: f64,
    pub lng: f64,
    pub level: f64,
    /// H3 rings around the hotspot cell that get half the level.
    #[serde(default)]
    pub rings: u32,
}

// 0.0 = Clean, 1.0 = Polluted
pub struct PollutionMap {
    cells: HashMap<CellIndex, f64>,
}

impl Default for PollutionMap {
    fn default() -> Self {
        Self::new()
    }
}

impl PollutionMap {
    /// A map with no hotspots: every point scores the background level.
    pub fn new() -> Self {
        Self {
            cells: HashMap::new(),
        }
    }

    pub fn from_hotspots(hotspots: &[Hotspot]) -> Result<Self, DataError> {
        let mut cells = HashMap::new();

        for spot in hotspots {
            let level = spot.level.clamp(0.0, 1.0);
            let center = LatLng::new(spot.lat, spot.lng)?.to_cell(RESOLUTION);

            for neighbor in center.grid_disk::<Vec<_>>(spot.rings) {
                let value = if neighbor == center { level } else { level / 2.0 };
                cells
                    .entry(neighbor)
                    .and_modify(|v: &mut f64| *v = v.max(value))
                    .or_insert(value);
            }
        }

        Ok(Self { cells })
    }

    /// Load hotspots from a JSON array file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let text = std::fs::read_to_string(path)?;
        let hotspots: Vec<Hotspot> = serde_json::from_str(&text)?;
        Self::from_hotspots(&hotspots)
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn score(&self, point: Point) -> f64 {
        let Ok(latlng) = LatLng::new(point.lat, point.lng) else {
            return BACKGROUND_LEVEL;
        };
        let cell = latlng.to_cell(RESOLUTION);
        *self.cells.get(&cell).unwrap_or(&BACKGROUND_LEVEL)
    }

    /// Routing cost for a piece of street: its length scaled up by how
    /// polluted its vertices are. Always positive for non-degenerate input.
    pub fn segment_weight(&self, geometry: &[Point]) -> f64 {
        if geometry.is_empty() {
            return 1.0;
        }
        let mean = geometry.iter().map(|p| self.score(*p)).sum::<f64>() / geometry.len() as f64;
        let length = line_length(geometry).max(1.0);
        length * (1.0 + mean)
    }
}
