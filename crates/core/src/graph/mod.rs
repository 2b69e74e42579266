use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};

use crate::{LedGraphError, Result};

/// Point in installation space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f32; 3]", into = "[f32; 3]")]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Linear blend between `self` (t = 0) and `other` (t = 1).
    pub fn lerp(self, other: Vec3, t: f32) -> Vec3 {
        Vec3 {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
            z: self.z + (other.z - self.z) * t,
        }
    }

    pub fn axis(self, axis: Axis) -> f32 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }
}

impl From<[f32; 3]> for Vec3 {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Self { x, y, z }
    }
}

impl From<Vec3> for [f32; 3] {
    fn from(value: Vec3) -> Self {
        [value.x, value.y, value.z]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

/// Author-facing node identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

/// Author-facing edge identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub String);

macro_rules! impl_id_conversions {
    ($ty:ident) => {
        impl From<&str> for $ty {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $ty {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<u32> for $ty {
            fn from(value: u32) -> Self {
                Self(value.to_string())
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

impl_id_conversions!(NodeId);
impl_id_conversions!(EdgeId);

/// Arena handle of a node inside one [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIx(pub usize);

/// Arena handle of an edge inside one [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeIx(pub usize);

/// Node record as supplied by a shape definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: NodeId,
    pub position: Vec3,
}

impl NodeSpec {
    pub fn new(id: impl Into<NodeId>, position: impl Into<Vec3>) -> Self {
        Self {
            id: id.into(),
            position: position.into(),
        }
    }
}

/// Edge record as supplied by a shape definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeSpec {
    pub id: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
    pub led_count: usize,
    pub start_index: usize,
}

impl EdgeSpec {
    pub fn new(
        id: impl Into<EdgeId>,
        from: impl Into<NodeId>,
        to: impl Into<NodeId>,
        led_count: usize,
        start_index: usize,
    ) -> Self {
        Self {
            id: id.into(),
            from: from.into(),
            to: to.into(),
            led_count,
            start_index,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub position: Vec3,
    pub incoming: Vec<EdgeIx>,
    pub outgoing: Vec<EdgeIx>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: EdgeId,
    pub from: NodeIx,
    pub to: NodeIx,
    pub led_count: usize,
    pub start_index: usize,
}

impl Edge {
    /// Global buffer index of the LED at `local` along this edge.
    pub fn global_index(&self, local: usize) -> usize {
        self.start_index + local
    }
}

/// Node/edge model of an installation. Nodes and edges live in flat arenas
/// and refer to each other through [`NodeIx`] / [`EdgeIx`] handles; string
/// ids are only used to resolve references while the graph is built.
///
/// A changed definition produces a new graph; an existing one is never
/// edited in place.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    node_lookup: HashMap<NodeId, NodeIx>,
    edge_lookup: HashMap<EdgeId, EdgeIx>,
    total_leds: usize,
}

/// Builds a graph and populates every node's adjacency lists exactly once.
///
/// Fails when an edge references a node that is not in `nodes`, when an id is
/// reused, or when an LED range does not fit in `usize`. Overlaps and gaps are
/// not checked here; see [`Graph::validate_led_ranges`].
pub fn build_graph(nodes: &[NodeSpec], edges: &[EdgeSpec]) -> Result<Graph> {
    let mut graph = Graph {
        nodes: Vec::with_capacity(nodes.len()),
        edges: Vec::with_capacity(edges.len()),
        node_lookup: HashMap::with_capacity(nodes.len()),
        edge_lookup: HashMap::with_capacity(edges.len()),
        total_leds: 0,
    };

    for spec in nodes {
        let ix = NodeIx(graph.nodes.len());
        if graph.node_lookup.insert(spec.id.clone(), ix).is_some() {
            return Err(LedGraphError::DuplicateNode(spec.id.to_string()));
        }
        graph.nodes.push(Node {
            id: spec.id.clone(),
            position: spec.position,
            incoming: Vec::new(),
            outgoing: Vec::new(),
        });
    }

    for spec in edges {
        let from = graph.resolve_endpoint(spec, &spec.from)?;
        let to = graph.resolve_endpoint(spec, &spec.to)?;
        let ix = EdgeIx(graph.edges.len());
        if graph.edge_lookup.insert(spec.id.clone(), ix).is_some() {
            return Err(LedGraphError::DuplicateEdge(spec.id.to_string()));
        }

        graph.nodes[from.0].outgoing.push(ix);
        graph.nodes[to.0].incoming.push(ix);
        graph.total_leds = spec
            .start_index
            .checked_add(spec.led_count)
            .and_then(|_| graph.total_leds.checked_add(spec.led_count))
            .ok_or_else(|| {
                LedGraphError::LedRange(format!(
                    "edge `{}` LED range starting at {} overflows",
                    spec.id, spec.start_index
                ))
            })?;
        graph.edges.push(Edge {
            id: spec.id.clone(),
            from,
            to,
            led_count: spec.led_count,
            start_index: spec.start_index,
        });
    }

    Ok(graph)
}

impl Graph {
    fn resolve_endpoint(&self, edge: &EdgeSpec, node: &NodeId) -> Result<NodeIx> {
        self.node_lookup
            .get(node)
            .copied()
            .ok_or_else(|| LedGraphError::UnknownNode {
                edge: edge.id.to_string(),
                node: node.to_string(),
            })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, ix: NodeIx) -> &Node {
        &self.nodes[ix.0]
    }

    pub fn edge(&self, ix: EdgeIx) -> &Edge {
        &self.edges[ix.0]
    }

    pub fn node_index(&self, id: &NodeId) -> Option<NodeIx> {
        self.node_lookup.get(id).copied()
    }

    pub fn edge_index(&self, id: &EdgeId) -> Option<EdgeIx> {
        self.edge_lookup.get(id).copied()
    }

    /// Sum of the LED counts of every edge.
    pub fn total_leds(&self) -> usize {
        self.total_leds
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Union of incoming and outgoing edges of `node`, outgoing first.
    ///
    /// A self-loop is reported once.
    pub fn connected_edges(&self, node: NodeIx) -> Vec<EdgeIx> {
        let node = &self.nodes[node.0];
        let mut edges = Vec::with_capacity(node.outgoing.len() + node.incoming.len());
        edges.extend_from_slice(&node.outgoing);
        for edge in &node.incoming {
            if !node.outgoing.contains(edge) {
                edges.push(*edge);
            }
        }
        edges
    }

    /// Same as [`Graph::connected_edges`] but addressed by author id.
    pub fn connected_edge_ids(&self, node: &NodeId) -> Option<Vec<&EdgeId>> {
        let ix = self.node_index(node)?;
        Some(
            self.connected_edges(ix)
                .into_iter()
                .map(|edge| &self.edges[edge.0].id)
                .collect(),
        )
    }

    pub fn degree(&self, node: NodeIx) -> usize {
        self.connected_edges(node).len()
    }

    /// Endpoint of `edge` that is not `node`. For a self-loop this is `node`.
    pub fn other_endpoint(&self, edge: EdgeIx, node: NodeIx) -> NodeIx {
        let edge = &self.edges[edge.0];
        if edge.from == node {
            edge.to
        } else {
            edge.from
        }
    }

    /// Checks that the edge LED ranges tile `[0, total_leds)` exactly.
    ///
    /// Not called by [`build_graph`]: unvalidated shapes keep rendering with
    /// aliased or orphaned buffer slots.
    pub fn validate_led_ranges(&self) -> Result<()> {
        let problems = self.led_range_problems();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(LedGraphError::LedRange(problems.join("; ")))
        }
    }

    /// Human readable list of every tiling violation.
    pub fn led_range_problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let mut ranges: Vec<(usize, usize, &EdgeId)> = Vec::with_capacity(self.edges.len());

        for edge in &self.edges {
            if edge.led_count == 0 {
                problems.push(format!("edge `{}` has no LEDs", edge.id));
                continue;
            }
            ranges.push((
                edge.start_index,
                edge.start_index.saturating_add(edge.led_count),
                &edge.id,
            ));
        }
        ranges.sort_by_key(|(start, end, _)| (*start, *end));

        let mut cursor = 0;
        let mut previous: Option<&EdgeId> = None;
        for (start, end, id) in ranges {
            if start > cursor {
                problems.push(format!("indices {cursor}..{start} are not covered by any edge"));
            } else if start < cursor {
                let other = previous.map(|p| p.to_string()).unwrap_or_default();
                problems.push(format!(
                    "edge `{id}` overlaps edge `{other}` at indices {start}..{}",
                    cursor.min(end)
                ));
            }
            if end > self.total_leds {
                problems.push(format!(
                    "edge `{id}` ends at {end}, past the {} LEDs of the shape",
                    self.total_leds
                ));
            }
            if end > cursor {
                cursor = end;
                previous = Some(id);
            }
        }
        if cursor < self.total_leds {
            problems.push(format!(
                "indices {cursor}..{} are not covered by any edge",
                self.total_leds
            ));
        }

        problems
    }
}
