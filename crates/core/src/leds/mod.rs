use serde::{Deserialize, Serialize};

use crate::graph::{EdgeIx, Graph, Vec3};

/// 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(from = "[u8; 3]", into = "[u8; 3]")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Per-channel sum clamped to 255.
    pub fn saturating_add(self, other: Rgb) -> Rgb {
        Rgb {
            r: self.r.saturating_add(other.r),
            g: self.g.saturating_add(other.g),
            b: self.b.saturating_add(other.b),
        }
    }

    /// Multiplies every channel by `intensity`, clamped to `[0, 1]`.
    pub fn scaled(self, intensity: f32) -> Rgb {
        let k = intensity.clamp(0.0, 1.0);
        let scale = |c: u8| (c as f32 * k).round() as u8;
        Rgb {
            r: scale(self.r),
            g: scale(self.g),
            b: scale(self.b),
        }
    }

    /// Hue in turns (wraps), saturation and value in `[0, 1]`.
    pub fn from_hsv(hue: f32, saturation: f32, value: f32) -> Rgb {
        let h = hue.rem_euclid(1.0) * 6.0;
        let s = saturation.clamp(0.0, 1.0);
        let v = value.clamp(0.0, 1.0);
        let c = v * s;
        let x = c * (1.0 - ((h % 2.0) - 1.0).abs());
        let m = v - c;
        let (r, g, b) = match h as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        let to_u8 = |v: f32| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
        Rgb::new(to_u8(r), to_u8(g), to_u8(b))
    }
}

impl From<[u8; 3]> for Rgb {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self { r, g, b }
    }
}

impl From<Rgb> for [u8; 3] {
    fn from(value: Rgb) -> Self {
        [value.r, value.g, value.b]
    }
}

/// Render record of one physical LED.
#[derive(Debug, Clone, PartialEq)]
pub struct Led {
    pub position: Vec3,
    pub edge: EdgeIx,
    /// Position along the owning edge, starting at its `from` node.
    pub local_index: usize,
    /// Global buffer index (`start_index + local_index`).
    pub index: usize,
}

/// Expands every edge into its LEDs, interpolating positions between the
/// edge's endpoints.
///
/// Records are emitted in edge order, not sorted by `index`.
pub fn generate_leds(graph: &Graph) -> Vec<Led> {
    let mut leds = Vec::with_capacity(graph.total_leds());
    for (edge_ix, edge) in graph.edges().iter().enumerate() {
        let start = graph.node(edge.from).position;
        let end = graph.node(edge.to).position;
        for local in 0..edge.led_count {
            let t = if edge.led_count == 1 {
                0.5
            } else {
                local as f32 / (edge.led_count - 1) as f32
            };
            leds.push(Led {
                position: start.lerp(end, t),
                edge: EdgeIx(edge_ix),
                local_index: local,
                index: edge.global_index(local),
            });
        }
    }
    leds
}

/// LED records plus one color slot per global index.
///
/// Colors are addressed by global index, so two LEDs sharing an index also
/// share a color (last write in a tick wins) and an index no edge covers
/// keeps the color it was initialized with. There are exactly `total_leds`
/// slots; an LED whose index falls past them reads as black and ignores
/// writes.
#[derive(Debug, Clone, Default)]
pub struct LedBuffer {
    leds: Vec<Led>,
    colors: Vec<Rgb>,
}

impl LedBuffer {
    pub fn new(graph: &Graph) -> Self {
        Self::from_leds(generate_leds(graph), graph.total_leds())
    }

    pub fn from_leds(leds: Vec<Led>, total_leds: usize) -> Self {
        Self {
            leds,
            colors: vec![Rgb::BLACK; total_leds],
        }
    }

    pub fn leds(&self) -> &[Led] {
        &self.leds
    }

    /// Number of LED records.
    pub fn len(&self) -> usize {
        self.leds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leds.is_empty()
    }

    /// Color slots by global index.
    pub fn colors(&self) -> &[Rgb] {
        &self.colors
    }

    pub fn color(&self, index: usize) -> Option<Rgb> {
        self.colors.get(index).copied()
    }

    /// Overwrites the slot at `index`. Out-of-range writes are ignored.
    pub fn set(&mut self, index: usize, color: Rgb) {
        if let Some(slot) = self.colors.get_mut(index) {
            *slot = color;
        }
    }

    /// Adds `color` into the slot at `index`, clamping each channel.
    pub fn add(&mut self, index: usize, color: Rgb) {
        if let Some(slot) = self.colors.get_mut(index) {
            *slot = slot.saturating_add(color);
        }
    }

    pub fn fill(&mut self, color: Rgb) {
        self.colors.fill(color);
    }

    pub fn clear(&mut self) {
        self.fill(Rgb::BLACK);
    }

    /// Scales every slot by `factor`, leaving an afterglow of the last frame.
    pub fn dim(&mut self, factor: f32) {
        for slot in &mut self.colors {
            *slot = slot.scaled(factor);
        }
    }

    /// Pairs each LED record with its current color.
    pub fn iter(&self) -> impl Iterator<Item = (&Led, Rgb)> + '_ {
        self.leds
            .iter()
            .map(|led| (led, self.colors.get(led.index).copied().unwrap_or_default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{build_graph, EdgeSpec, NodeSpec};

    fn single_edge(led_count: usize) -> Graph {
        let nodes = vec![
            NodeSpec::new("a", [0.0, 0.0, 0.0]),
            NodeSpec::new("b", [10.0, 0.0, 0.0]),
        ];
        let edges = vec![EdgeSpec::new("ab", "a", "b", led_count, 0)];
        build_graph(&nodes, &edges).unwrap()
    }

    #[test]
    fn interpolates_along_edge() {
        let leds = generate_leds(&single_edge(5));
        let xs: Vec<f32> = leds.iter().map(|led| led.position.x).collect();
        assert_eq!(xs, vec![0.0, 2.5, 5.0, 7.5, 10.0]);
    }

    #[test]
    fn single_led_sits_at_midpoint() {
        let leds = generate_leds(&single_edge(1));
        assert_eq!(leds.len(), 1);
        assert_eq!(leds[0].position, Vec3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn indices_cover_buffer_for_out_of_order_edges() {
        let nodes = vec![
            NodeSpec::new("a", [0.0, 0.0, 0.0]),
            NodeSpec::new("b", [1.0, 0.0, 0.0]),
            NodeSpec::new("c", [2.0, 0.0, 0.0]),
        ];
        // Authored in reverse buffer order.
        let edges = vec![
            EdgeSpec::new("bc", "b", "c", 3, 4),
            EdgeSpec::new("ab", "a", "b", 4, 0),
        ];
        let graph = build_graph(&nodes, &edges).unwrap();
        let leds = generate_leds(&graph);
        assert_eq!(leds.len(), graph.total_leds());
        assert_eq!(leds[0].index, 4);

        let mut indices: Vec<usize> = leds.iter().map(|led| led.index).collect();
        indices.sort_unstable();
        assert_eq!(indices, (0..graph.total_leds()).collect::<Vec<_>>());
    }

    #[test]
    fn aliased_leds_share_a_slot_and_gaps_stay_dark() {
        let nodes = vec![
            NodeSpec::new("a", [0.0, 0.0, 0.0]),
            NodeSpec::new("b", [1.0, 0.0, 0.0]),
        ];
        let edges = vec![
            EdgeSpec::new("e1", "a", "b", 2, 0),
            EdgeSpec::new("e2", "b", "a", 2, 1),
        ];
        let graph = build_graph(&nodes, &edges).unwrap();
        let mut buffer = LedBuffer::new(&graph);
        assert_eq!(buffer.colors().len(), 4);

        buffer.set(1, Rgb::new(10, 0, 0));
        buffer.set(1, Rgb::new(0, 20, 0));
        let shared: Vec<Rgb> = buffer
            .iter()
            .filter(|(led, _)| led.index == 1)
            .map(|(_, color)| color)
            .collect();
        assert_eq!(shared, vec![Rgb::new(0, 20, 0); 2]);
        assert_eq!(buffer.color(3), Some(Rgb::BLACK));
    }

    #[test]
    fn far_start_index_keeps_buffer_at_total_leds() {
        let nodes = vec![
            NodeSpec::new("a", [0.0, 0.0, 0.0]),
            NodeSpec::new("b", [1.0, 0.0, 0.0]),
        ];
        let far = usize::MAX / 2;
        let edges = vec![EdgeSpec::new("e", "a", "b", 2, far)];
        let graph = build_graph(&nodes, &edges).unwrap();
        let mut buffer = LedBuffer::new(&graph);

        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.colors().len(), 2);
        buffer.set(far, Rgb::WHITE);
        buffer.add(far + 1, Rgb::WHITE);
        assert!(buffer.iter().all(|(_, color)| color == Rgb::BLACK));
        assert_eq!(buffer.color(far), None);
    }

    #[test]
    fn additive_writes_clamp() {
        let mut buffer = LedBuffer::new(&single_edge(2));
        buffer.add(0, Rgb::new(200, 0, 0));
        buffer.add(0, Rgb::new(0, 0, 200));
        assert_eq!(buffer.color(0), Some(Rgb::new(200, 0, 200)));

        buffer.add(1, Rgb::new(200, 0, 0));
        buffer.add(1, Rgb::new(100, 0, 0));
        assert_eq!(buffer.color(1), Some(Rgb::new(255, 0, 0)));

        buffer.add(99, Rgb::WHITE);
        assert_eq!(buffer.colors().len(), 2);
    }

    #[test]
    fn hsv_primaries() {
        assert_eq!(Rgb::from_hsv(0.0, 1.0, 1.0), Rgb::new(255, 0, 0));
        assert_eq!(Rgb::from_hsv(1.0 / 3.0, 1.0, 1.0), Rgb::new(0, 255, 0));
        assert_eq!(Rgb::from_hsv(2.0 / 3.0, 1.0, 1.0), Rgb::new(0, 0, 255));
        assert_eq!(Rgb::new(200, 100, 0).scaled(0.5), Rgb::new(100, 50, 0));
    }
}
