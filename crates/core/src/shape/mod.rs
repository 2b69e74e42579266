use std::{f32::consts::TAU, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    graph::{build_graph, EdgeSpec, Graph, NodeId, NodeSpec, Vec3},
    LedGraphError, Result,
};

/// Node and edge lists describing one installation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeDefinition {
    pub name: String,
    pub nodes: Vec<NodeSpec>,
    pub edges: Vec<EdgeSpec>,
}

impl ShapeDefinition {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn build(&self) -> Result<Graph> {
        build_graph(&self.nodes, &self.edges)
    }

    /// Resolves one of the procedural shapes by name.
    pub fn procedural(name: &str, leds_per_edge: usize) -> Result<Self> {
        match name {
            "strip" => Ok(Self::strip(leds_per_edge)),
            "ring" => Ok(Self::ring(8, leds_per_edge, 1.0)),
            "cube" => Ok(Self::cube(1.0, leds_per_edge)),
            other => Err(LedGraphError::msg(format!(
                "unknown shape `{other}` (expected strip, ring or cube)"
            ))),
        }
    }

    /// A single straight run of `leds` LEDs along the x axis.
    pub fn strip(leds: usize) -> Self {
        let mut builder = ShapeBuilder::new("strip");
        builder.node("start", [0.0, 0.0, 0.0]);
        builder.node("end", [leds as f32, 0.0, 0.0]);
        builder.edge("start", "end", leds);
        builder.finish()
    }

    /// Closed polygon of `segments` edges in the xy plane.
    pub fn ring(segments: usize, leds_per_segment: usize, radius: f32) -> Self {
        let mut builder = ShapeBuilder::new("ring");
        let segments = segments.max(1);
        for i in 0..segments {
            let angle = TAU * i as f32 / segments as f32;
            builder.node(i as u32, [radius * angle.cos(), radius * angle.sin(), 0.0]);
        }
        for i in 0..segments {
            builder.edge(i as u32, ((i + 1) % segments) as u32, leds_per_segment);
        }
        builder.finish()
    }

    /// Wireframe cube: eight corners, twelve edges.
    pub fn cube(size: f32, leds_per_edge: usize) -> Self {
        let mut builder = ShapeBuilder::new("cube");
        for corner in 0..8u32 {
            let coord = |bit: u32| if corner & bit != 0 { size } else { 0.0 };
            builder.node(corner, [coord(1), coord(2), coord(4)]);
        }
        for corner in 0..8u32 {
            for bit in [1, 2, 4] {
                if corner & bit == 0 {
                    builder.edge(corner, corner | bit, leds_per_edge);
                }
            }
        }
        builder.finish()
    }
}

/// Procedural shape construction. Edges receive contiguous start indices in
/// the order they are added, so built shapes always tile the LED buffer.
#[derive(Debug, Clone)]
pub struct ShapeBuilder {
    name: String,
    nodes: Vec<NodeSpec>,
    edges: Vec<EdgeSpec>,
    next_index: usize,
}

impl ShapeBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
            next_index: 0,
        }
    }

    pub fn node(&mut self, id: impl Into<NodeId>, position: impl Into<Vec3>) -> &mut Self {
        self.nodes.push(NodeSpec::new(id, position));
        self
    }

    /// Adds an edge with an id derived from its endpoints.
    pub fn edge(
        &mut self,
        from: impl Into<NodeId>,
        to: impl Into<NodeId>,
        led_count: usize,
    ) -> &mut Self {
        let from = from.into();
        let to = to.into();
        let id = format!("{from}-{to}");
        self.edges
            .push(EdgeSpec::new(id, from, to, led_count, self.next_index));
        self.next_index += led_count;
        self
    }

    pub fn finish(self) -> ShapeDefinition {
        ShapeDefinition {
            name: self.name,
            nodes: self.nodes,
            edges: self.edges,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_has_twelve_tiled_edges() {
        let graph = ShapeDefinition::cube(2.0, 5).build().unwrap();
        assert_eq!(graph.nodes().len(), 8);
        assert_eq!(graph.edges().len(), 12);
        assert_eq!(graph.total_leds(), 60);
        assert!(graph.validate_led_ranges().is_ok());
        for node in 0..8 {
            assert_eq!(graph.degree(crate::graph::NodeIx(node)), 3);
        }
    }

    #[test]
    fn ring_closes_on_itself() {
        let graph = ShapeDefinition::ring(6, 4, 1.0).build().unwrap();
        assert_eq!(graph.edges().len(), 6);
        assert!(graph.nodes().iter().all(|n| n.incoming.len() == 1 && n.outgoing.len() == 1));
    }

    #[test]
    fn parses_json_definition() {
        let json = r#"{
            "name": "tee",
            "nodes": [
                { "id": "a", "position": [0, 0, 0] },
                { "id": "b", "position": [1, 0, 0] },
                { "id": "c", "position": [1, 1, 0] }
            ],
            "edges": [
                { "id": "ab", "from": "a", "to": "b", "led_count": 3, "start_index": 0 },
                { "id": "bc", "from": "b", "to": "c", "led_count": 2, "start_index": 3 }
            ]
        }"#;
        let shape = ShapeDefinition::from_json_str(json).unwrap();
        assert_eq!(shape.nodes[2].position, Vec3::new(1.0, 1.0, 0.0));
        let graph = shape.build().unwrap();
        assert_eq!(graph.total_leds(), 5);

        let again = ShapeDefinition::from_json_str(&shape.to_json_string().unwrap()).unwrap();
        assert_eq!(again, shape);
    }

    #[test]
    fn unknown_procedural_shape_is_rejected() {
        assert!(ShapeDefinition::procedural("dodecahedron", 4).is_err());
        assert_eq!(ShapeDefinition::procedural("strip", 12).unwrap().edges[0].led_count, 12);
    }
}
