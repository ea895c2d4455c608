use std::collections::HashMap;

use itertools::{Either, Itertools};
use petgraph::algo::astar;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;

use crate::error::RouteError;
use crate::geo_utils::{Point, haversine_distance};
use crate::segments::StreetSegment;

/// Quantized coordinate identifying a graph vertex.
pub type NodeKey = String;

/// Directed `(from, to)` key pair -> index of the segment joining them.
pub type EdgeSegmentIndex = HashMap<(NodeKey, NodeKey), usize>;

#[derive(Debug, Clone)]
pub struct GraphNode {
    pub key: NodeKey,
    pub point: Point,
}

#[derive(Debug, Clone, Copy)]
pub struct SegmentEdge {
    pub weight: f64,
    pub segment: usize,
}

/// Vertex key for a coordinate: lat/lng at 6 decimals (about 11 cm), so
/// segments meeting at the same intersection share a vertex.
pub fn node_key(point: Point) -> NodeKey {
    // + 0.0 folds -0.0 into 0.0
    format!("{:.6},{:.6}", point.lat + 0.0, point.lng + 0.0)
}

/// Request-scoped routing graph over a borrowed set of segments.
pub struct RouteGraph<'a> {
    pub graph: UnGraph<GraphNode, SegmentEdge>,
    nodes: HashMap<NodeKey, NodeIndex>,
    edge_index: EdgeSegmentIndex,
    segments: &'a [StreetSegment],
}

impl<'a> RouteGraph<'a> {
    /// Join segments at their endpoints. Intermediate shape points never
    /// become vertices.
    pub fn build(segments: &'a [StreetSegment]) -> Self {
        let mut graph = UnGraph::new_undirected();
        let mut nodes: HashMap<NodeKey, NodeIndex> = HashMap::new();
        let mut edge_index = EdgeSegmentIndex::new();
        let mut skipped = 0usize;

        for (i, segment) in segments.iter().enumerate() {
            let (Some(&start), Some(&end)) = (segment.geometry.first(), segment.geometry.last()) else {
                skipped += 1;
                continue;
            };
            let start_key = node_key(start);
            let end_key = node_key(end);
            if start_key == end_key {
                skipped += 1;
                continue;
            }

            let idx_a = *nodes.entry(start_key.clone()).or_insert_with(|| {
                graph.add_node(GraphNode {
                    key: start_key.clone(),
                    point: start,
                })
            });
            let idx_b = *nodes.entry(end_key.clone()).or_insert_with(|| {
                graph.add_node(GraphNode {
                    key: end_key.clone(),
                    point: end,
                })
            });

            let weight = segment.cost();
            graph.add_edge(idx_a, idx_b, SegmentEdge { weight, segment: i });

            // Parallel segments: keep the cheapest, it is the one the search takes.
            let replace = match edge_index.get(&(start_key.clone(), end_key.clone())) {
                Some(&existing) => weight < segments[existing].cost(),
                None => true,
            };
            if replace {
                edge_index.insert((start_key.clone(), end_key.clone()), i);
                edge_index.insert((end_key, start_key), i);
            }
        }

        tracing::debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            skipped,
            "Route graph built"
        );

        Self {
            graph,
            nodes,
            edge_index,
            segments,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_index(&self) -> &EdgeSegmentIndex {
        &self.edge_index
    }

    pub fn node(&self, key: &str) -> Option<&GraphNode> {
        self.nodes.get(key).map(|&idx| &self.graph[idx])
    }

    /// Neighbouring keys of `key` with the weight of each connecting edge.
    pub fn adjacent<'g>(&'g self, key: &str) -> impl Iterator<Item = (&'g str, f64)> + 'g {
        let idx = self.nodes.get(key).copied();
        idx.into_iter().flat_map(move |idx| {
            self.graph
                .edges(idx)
                .map(move |edge| {
                    let other = if edge.source() == idx { edge.target() } else { edge.source() };
                    (self.graph[other].key.as_str(), edge.weight().weight)
                })
        })
    }

    /// Snap `point` to the closest vertex by haversine distance.
    pub fn find_nearest_node(&self, point: Point) -> Result<&str, RouteError> {
        self.graph
            .node_indices()
            .map(|idx| &self.graph[idx])
            .map(|node| (node, haversine_distance(node.point, point)))
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(node, _)| node.key.as_str())
            .ok_or(RouteError::NoNodesAvailable)
    }

    /// Cheapest path by cumulative segment weight (not length). `None` when
    /// either key is unknown or the end is unreachable from the start.
    pub fn dijkstra(&self, start: &str, end: &str) -> Option<Vec<NodeKey>> {
        let &start_idx = self.nodes.get(start)?;
        let &end_idx = self.nodes.get(end)?;

        // A* with a zero heuristic: plain Dijkstra that stops once `end` is popped.
        let (_cost, path) = astar(
            &self.graph,
            start_idx,
            |n| n == end_idx,
            |e| e.weight().weight,
            |_| 0.0,
        )?;

        let keys: Vec<NodeKey> = path.into_iter().map(|idx| self.graph[idx].key.clone()).collect();
        (keys.first().map(String::as_str) == Some(start)).then_some(keys)
    }

    /// Real-world geometry of a key path, each segment flipped as needed so
    /// consecutive segments chain head to tail.
    pub fn path_to_geometry(&self, path: &[NodeKey]) -> Vec<Point> {
        let mut coords: Vec<Point> = Vec::new();

        for (from, to) in path.iter().tuple_windows() {
            let Some(&i) = self.edge_index.get(&(from.clone(), to.clone())) else {
                tracing::warn!(from = %from, to = %to, "Path step has no segment");
                continue;
            };
            let segment = &self.segments[i];
            let forward = segment.geometry.first().map(|p| node_key(*p)).as_ref() == Some(from);

            let oriented = if forward {
                Either::Left(segment.geometry.iter())
            } else {
                Either::Right(segment.geometry.iter().rev())
            };

            for p in oriented {
                if coords.last() != Some(p) {
                    coords.push(*p);
                }
            }
        }

        coords
    }
}
