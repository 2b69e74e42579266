use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};

use crate::{
    graph::{EdgeIx, Graph, NodeIx},
    leds::{LedBuffer, Rgb},
};

/// Motion and trail parameters shared by a group of walkers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkerSettings {
    /// LED units advanced per tick.
    pub speed: f32,
    pub tail_length: usize,
    /// Distance into a fresh edge before the trail is drawn.
    pub draw_margin: f32,
}

impl Default for WalkerSettings {
    fn default() -> Self {
        Self {
            speed: 0.5,
            tail_length: 8,
            draw_margin: 2.0,
        }
    }
}

/// What happened to a walker during one [`Walker::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Standing on a node with no edge to take.
    Idle,
    /// Left the node it was standing on.
    Departed { edge: EdgeIx },
    /// Still inside the current edge.
    Moved,
    /// Reached `node` and, when one exists, set off along `next`.
    Arrived { node: NodeIx, next: Option<EdgeIx> },
}

/// Agent that travels the graph and leaves a fading trail. It either stands
/// on a node or travels along an edge; arrival and the choice of the next
/// edge happen in the same step.
#[derive(Debug, Clone, PartialEq)]
pub struct Walker {
    /// Node stood on, or the node the current edge was entered from.
    node: NodeIx,
    edge: Option<EdgeIx>,
    last_edge: Option<EdgeIx>,
    position: f32,
    speed: f32,
    tail_length: usize,
    color: Rgb,
}

impl Walker {
    pub fn at_node(node: NodeIx, settings: &WalkerSettings, color: Rgb) -> Self {
        Self {
            node,
            edge: None,
            last_edge: None,
            position: 0.0,
            speed: settings.speed.abs(),
            tail_length: settings.tail_length,
            color,
        }
    }

    pub fn node(&self) -> NodeIx {
        self.node
    }

    pub fn edge(&self) -> Option<EdgeIx> {
        self.edge
    }

    pub fn position(&self) -> f32 {
        self.position
    }

    /// Signed speed; negative while travelling against the edge direction.
    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn color(&self) -> Rgb {
        self.color
    }

    pub fn is_at_node(&self) -> bool {
        self.edge.is_none()
    }

    /// Advances the walker by one tick.
    pub fn step<R: Rng + ?Sized>(&mut self, graph: &Graph, rng: &mut R) -> Step {
        let Some(ix) = self.edge else {
            return match self.route(graph, rng) {
                Some(edge) => Step::Departed { edge },
                None => Step::Idle,
            };
        };

        let led_count = graph.edge(ix).led_count as f32;
        self.position += self.speed;
        if self.position >= 0.0 && self.position < led_count {
            return Step::Moved;
        }

        let arrived = graph.other_endpoint(ix, self.node);
        self.node = arrived;
        self.last_edge = Some(ix);
        self.edge = None;
        let next = self.route(graph, rng);
        Step::Arrived {
            node: arrived,
            next,
        }
    }

    /// Picks the next edge out of the current node, avoiding the edge just
    /// travelled unless it is the only one.
    fn route<R: Rng + ?Sized>(&mut self, graph: &Graph, rng: &mut R) -> Option<EdgeIx> {
        let connected = graph.connected_edges(self.node);
        let candidates: Vec<EdgeIx> = connected
            .iter()
            .copied()
            .filter(|edge| Some(*edge) != self.last_edge)
            .collect();

        // Dead end: backtracking is the only way out.
        let choice = match candidates.choose(rng) {
            Some(edge) => *edge,
            None => *connected.first()?,
        };

        let edge = graph.edge(choice);
        let speed = self.speed.abs();
        if edge.from == self.node {
            self.position = 0.0;
            self.speed = speed;
        } else {
            self.position = edge.led_count.saturating_sub(1) as f32;
            self.speed = -speed;
        }
        self.edge = Some(choice);
        Some(choice)
    }

    /// Adds the trail into `leds`. The head is drawn at full color and each
    /// LED behind it is dimmed linearly towards zero.
    pub fn render(&self, graph: &Graph, leds: &mut LedBuffer, draw_margin: f32) {
        let Some(ix) = self.edge else {
            return;
        };
        let edge = graph.edge(ix);
        if edge.led_count == 0 || self.tail_length == 0 {
            return;
        }

        let last = (edge.led_count - 1) as f32;
        let forward = self.speed >= 0.0;
        let travelled = if forward {
            self.position
        } else {
            last - self.position
        };
        if travelled < draw_margin.min(last) {
            return;
        }

        // Head is the last LED actually reached in the direction of travel.
        let head = if forward {
            self.position.floor()
        } else {
            self.position.ceil()
        };
        let head = head.clamp(0.0, last) as usize;
        for k in 0..self.tail_length {
            let local = if forward {
                head.checked_sub(k)
            } else {
                Some(head + k).filter(|local| *local < edge.led_count)
            };
            let Some(local) = local else {
                break;
            };
            let intensity = 1.0 - k as f32 / self.tail_length as f32;
            leds.add(edge.global_index(local), self.color.scaled(intensity));
        }
    }
}

/// A group of walkers updated and drawn in a fixed order.
#[derive(Debug, Clone, Default)]
pub struct WalkerSwarm {
    walkers: Vec<Walker>,
    draw_margin: f32,
}

impl WalkerSwarm {
    pub fn new(walkers: Vec<Walker>, draw_margin: f32) -> Self {
        Self {
            walkers,
            draw_margin,
        }
    }

    /// Places `count` walkers on random nodes, preferring nodes that have at
    /// least one edge. Colors are assigned round-robin from `palette`.
    pub fn spawn<R: Rng + ?Sized>(
        graph: &Graph,
        count: usize,
        settings: &WalkerSettings,
        palette: &[Rgb],
        rng: &mut R,
    ) -> Self {
        let connected: Vec<NodeIx> = (0..graph.nodes().len())
            .map(NodeIx)
            .filter(|node| graph.degree(*node) > 0)
            .collect();
        let starts = if connected.is_empty() {
            (0..graph.nodes().len()).map(NodeIx).collect()
        } else {
            connected
        };

        let walkers = if starts.is_empty() {
            Vec::new()
        } else {
            (0..count)
                .map(|i| {
                    let node = starts[rng.gen_range(0..starts.len())];
                    let color = palette
                        .get(i % palette.len().max(1))
                        .copied()
                        .unwrap_or(Rgb::WHITE);
                    Walker::at_node(node, settings, color)
                })
                .collect()
        };

        Self::new(walkers, settings.draw_margin)
    }

    pub fn walkers(&self) -> &[Walker] {
        &self.walkers
    }

    pub fn len(&self) -> usize {
        self.walkers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.walkers.is_empty()
    }

    /// Moves every walker, then blends every trail into `leds`.
    pub fn tick<R: Rng + ?Sized>(&mut self, graph: &Graph, leds: &mut LedBuffer, rng: &mut R) {
        for walker in &mut self.walkers {
            walker.step(graph, rng);
        }
        for walker in &self.walkers {
            walker.render(graph, leds, self.draw_margin);
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::{
        graph::{build_graph, EdgeSpec, NodeSpec},
        shape::ShapeDefinition,
    };

    fn strip(led_count: usize) -> Graph {
        let nodes = vec![
            NodeSpec::new("a", [0.0, 0.0, 0.0]),
            NodeSpec::new("b", [1.0, 0.0, 0.0]),
        ];
        let edges = vec![EdgeSpec::new("ab", "a", "b", led_count, 0)];
        build_graph(&nodes, &edges).unwrap()
    }

    fn settings(speed: f32, tail_length: usize) -> WalkerSettings {
        WalkerSettings {
            speed,
            tail_length,
            draw_margin: 2.0,
        }
    }

    #[test]
    fn departs_forward_from_edge_source() {
        let graph = strip(5);
        let mut rng = StdRng::seed_from_u64(1);
        let mut walker = Walker::at_node(NodeIx(0), &settings(1.0, 3), Rgb::WHITE);

        assert_eq!(walker.step(&graph, &mut rng), Step::Departed { edge: EdgeIx(0) });
        assert_eq!(walker.position(), 0.0);
        assert!(walker.speed() > 0.0);
    }

    #[test]
    fn departs_in_reverse_from_edge_target() {
        let graph = strip(5);
        let mut rng = StdRng::seed_from_u64(1);
        let mut walker = Walker::at_node(NodeIx(1), &settings(1.0, 3), Rgb::WHITE);

        walker.step(&graph, &mut rng);
        assert_eq!(walker.position(), 4.0);
        assert!(walker.speed() < 0.0);
    }

    #[test]
    fn dead_end_forces_backtrack() {
        let graph = strip(3);
        let mut rng = StdRng::seed_from_u64(7);
        let mut walker = Walker::at_node(NodeIx(0), &settings(1.0, 3), Rgb::WHITE);

        walker.step(&graph, &mut rng);
        let mut arrival = None;
        for _ in 0..10 {
            if let Step::Arrived { node, next } = walker.step(&graph, &mut rng) {
                arrival = Some((node, next));
                break;
            }
        }

        assert_eq!(arrival, Some((NodeIx(1), Some(EdgeIx(0)))));
        assert_eq!(walker.position(), 2.0);
        assert!(walker.speed() < 0.0);
    }

    #[test]
    fn avoids_the_edge_it_arrived_on() {
        // a -> b -> c: arriving at b from ab must continue onto bc.
        let nodes = vec![
            NodeSpec::new("a", [0.0, 0.0, 0.0]),
            NodeSpec::new("b", [1.0, 0.0, 0.0]),
            NodeSpec::new("c", [2.0, 0.0, 0.0]),
        ];
        let edges = vec![
            EdgeSpec::new("ab", "a", "b", 2, 0),
            EdgeSpec::new("bc", "b", "c", 2, 2),
        ];
        let graph = build_graph(&nodes, &edges).unwrap();

        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut walker = Walker::at_node(NodeIx(0), &settings(1.0, 1), Rgb::WHITE);
            walker.step(&graph, &mut rng);
            let arrival = (0..5)
                .map(|_| walker.step(&graph, &mut rng))
                .find(|step| matches!(step, Step::Arrived { .. }));
            assert_eq!(
                arrival,
                Some(Step::Arrived {
                    node: NodeIx(1),
                    next: Some(EdgeIx(1)),
                })
            );
        }
    }

    #[test]
    fn position_stays_inside_edge_between_transitions() {
        let graph = ShapeDefinition::cube(1.0, 7).build().unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let mut walker = Walker::at_node(NodeIx(0), &settings(0.7, 4), Rgb::WHITE);

        for _ in 0..2_000 {
            let step = walker.step(&graph, &mut rng);
            assert_ne!(step, Step::Idle);
            if step == Step::Moved {
                let edge = graph.edge(walker.edge().unwrap());
                assert!(walker.position() >= 0.0);
                assert!(walker.position() < edge.led_count as f32);
            }
        }
    }

    #[test]
    fn edgeless_graph_is_a_no_op() {
        let graph = build_graph(&[NodeSpec::new("lonely", [0.0, 0.0, 0.0])], &[]).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let mut swarm = WalkerSwarm::spawn(&graph, 2, &settings(1.0, 4), &[Rgb::WHITE], &mut rng);
        let mut leds = LedBuffer::new(&graph);

        assert_eq!(swarm.len(), 2);
        for _ in 0..10 {
            swarm.tick(&graph, &mut leds, &mut rng);
        }
        assert!(swarm.walkers().iter().all(Walker::is_at_node));
        assert!(leds.colors().is_empty());

        let empty = Graph::default();
        let swarm = WalkerSwarm::spawn(&empty, 3, &settings(1.0, 4), &[], &mut rng);
        assert!(swarm.is_empty());
    }

    #[test]
    fn trail_is_suppressed_near_edge_start() {
        let graph = strip(10);
        let mut rng = StdRng::seed_from_u64(5);
        let mut walker = Walker::at_node(NodeIx(0), &settings(1.0, 4), Rgb::WHITE);
        let mut leds = LedBuffer::new(&graph);

        walker.step(&graph, &mut rng);
        walker.step(&graph, &mut rng);
        walker.render(&graph, &mut leds, 2.0);
        assert!(leds.colors().iter().all(|c| *c == Rgb::BLACK));

        walker.step(&graph, &mut rng);
        walker.render(&graph, &mut leds, 2.0);
        assert_eq!(leds.color(2), Some(Rgb::WHITE));
        assert_eq!(leds.color(1), Some(Rgb::WHITE.scaled(0.75)));
        assert_eq!(leds.color(0), Some(Rgb::WHITE.scaled(0.5)));
        assert_eq!(leds.color(3), Some(Rgb::BLACK));
    }

    #[test]
    fn reverse_trail_extends_towards_higher_indices() {
        let graph = strip(10);
        let mut rng = StdRng::seed_from_u64(5);
        let mut walker = Walker::at_node(NodeIx(1), &settings(1.0, 3), Rgb::new(0, 90, 0));
        let mut leds = LedBuffer::new(&graph);

        for _ in 0..4 {
            walker.step(&graph, &mut rng);
        }
        assert_eq!(walker.position(), 6.0);
        walker.render(&graph, &mut leds, 2.0);
        assert_eq!(leds.color(6), Some(Rgb::new(0, 90, 0)));
        assert_eq!(leds.color(7), Some(Rgb::new(0, 60, 0)));
        assert_eq!(leds.color(8), Some(Rgb::new(0, 30, 0)));
        assert_eq!(leds.color(5), Some(Rgb::BLACK));
    }

    #[test]
    fn reverse_head_stays_on_the_led_already_reached() {
        let graph = strip(10);
        let mut rng = StdRng::seed_from_u64(5);
        let mut walker = Walker::at_node(NodeIx(1), &settings(0.5, 2), Rgb::new(0, 90, 0));
        let mut leds = LedBuffer::new(&graph);

        for _ in 0..6 {
            walker.step(&graph, &mut rng);
        }
        assert_eq!(walker.position(), 6.5);
        walker.render(&graph, &mut leds, 2.0);
        assert_eq!(leds.color(7), Some(Rgb::new(0, 90, 0)));
        assert_ne!(leds.color(8), Some(Rgb::BLACK));
        assert_eq!(leds.color(6), Some(Rgb::BLACK));
    }

    #[test]
    fn overlapping_walkers_blend_additively() {
        let graph = strip(10);
        let mut rng = StdRng::seed_from_u64(9);

        let mix = WalkerSwarm::new(
            vec![
                Walker::at_node(NodeIx(0), &settings(1.0, 1), Rgb::new(200, 0, 0)),
                Walker::at_node(NodeIx(0), &settings(1.0, 1), Rgb::new(0, 0, 200)),
            ],
            2.0,
        );
        let clamp = WalkerSwarm::new(
            vec![
                Walker::at_node(NodeIx(0), &settings(1.0, 1), Rgb::new(200, 0, 0)),
                Walker::at_node(NodeIx(0), &settings(1.0, 1), Rgb::new(100, 0, 0)),
            ],
            2.0,
        );

        for (mut swarm, expected) in [(mix, Rgb::new(200, 0, 200)), (clamp, Rgb::new(255, 0, 0))] {
            let mut leds = LedBuffer::new(&graph);
            for _ in 0..3 {
                leds.clear();
                swarm.tick(&graph, &mut leds, &mut rng);
            }
            assert_eq!(leds.color(2), Some(expected));
        }
    }
}
