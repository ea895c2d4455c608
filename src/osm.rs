use std::collections::HashMap;
use std::path::Path;

use osmpbf::{Element, ElementReader};

use crate::error::DataError;
use crate::geo_utils::Point;
use crate::pollution::PollutionMap;
use crate::segments::StreetSegment;

/// Whether a way with these tags can be walked or cycled.
pub fn is_routable(tags: &HashMap<&str, &str>) -> bool {
    let highway = tags.get("highway").copied().unwrap_or("");
    let foot = tags.get("foot").copied().unwrap_or("");
    let sidewalk = tags.get("sidewalk").copied().unwrap_or("");

    let is_walkable_type = matches!(
        highway,
        "footway"
            | "path"
            | "steps"
            | "pedestrian"
            | "living_street"
            | "residential"
            | "tertiary"
            | "service"
            | "unclassified"
            | "cycleway"
    );

    let is_motor_road = matches!(highway, "motorway" | "trunk" | "primary" | "secondary");
    let foot_allowed = matches!(foot, "yes" | "designated" | "permissive");
    let has_sidewalk = matches!(sidewalk, "both" | "left" | "right" | "yes" | "separate");

    is_walkable_type || (is_motor_road && (foot_allowed || has_sidewalk))
}

/// Read an OSM extract into one segment per consecutive node pair of every
/// routable way, weighted by `pollution`.
pub fn segments_from_pbf(path: &Path, pollution: &PollutionMap) -> Result<Vec<StreetSegment>, DataError> {
    tracing::info!(path = %path.display(), "Parsing OSM PBF");

    // PASS 1: Nodes
    let mut nodes: HashMap<i64, Point> = HashMap::new();
    ElementReader::from_path(path)?.for_each(|element| match element {
        Element::Node(node) => {
            nodes.insert(node.id(), Point::new(node.lat(), node.lon()));
        }
        Element::DenseNode(node) => {
            nodes.insert(node.id(), Point::new(node.lat(), node.lon()));
        }
        _ => {}
    })?;

    tracing::info!(nodes = nodes.len(), "Loaded nodes, building segments");

    // PASS 2: Ways
    let mut segments = Vec::new();
    ElementReader::from_path(path)?.for_each(|element| {
        let Element::Way(way) = element else {
            return;
        };
        let tags: HashMap<&str, &str> = way.tags().collect();
        if !is_routable(&tags) {
            return;
        }

        let refs: Vec<i64> = way.refs().collect();
        for (n, window) in refs.windows(2).enumerate() {
            if let (Some(&a), Some(&b)) = (nodes.get(&window[0]), nodes.get(&window[1])) {
                let geometry = vec![a, b];
                let weight = pollution.segment_weight(&geometry);
                segments.push(StreetSegment::new(
                    format!("way/{}/{}", way.id(), n),
                    geometry,
                    Some(weight),
                ));
            }
        }
    })?;

    tracing::info!(segments = segments.len(), "OSM segments built");
    Ok(segments)
}
