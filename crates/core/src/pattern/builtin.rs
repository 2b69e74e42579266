use serde::{Deserialize, Serialize};

use super::{parse_params, Pattern, PatternResult, StateBox};
use crate::{
    graph::{Axis, Graph},
    leds::{LedBuffer, Rgb},
    walker::{WalkerSettings, WalkerSwarm},
};

/// Every LED set to one color.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolidPattern {
    pub color: Rgb,
}

impl SolidPattern {
    pub const NAME: &'static str = "solid";

    pub fn from_params(params: &serde_json::Value) -> PatternResult<Self> {
        parse_params(params)
    }
}

impl Default for SolidPattern {
    fn default() -> Self {
        Self {
            color: Rgb::new(255, 120, 40),
        }
    }
}

impl Pattern for SolidPattern {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn tick(&self, leds: &mut LedBuffer, _: u64, _: &Graph, _: &mut StateBox) -> PatternResult<()> {
        leds.fill(self.color);
        Ok(())
    }
}

/// Hue cycling along the global LED index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RainbowPattern {
    /// Hue turns per frame.
    pub speed: f32,
    /// Hue turns spread across the whole buffer.
    pub spread: f32,
    pub brightness: f32,
}

impl RainbowPattern {
    pub const NAME: &'static str = "rainbow";

    pub fn from_params(params: &serde_json::Value) -> PatternResult<Self> {
        parse_params(params)
    }
}

impl Default for RainbowPattern {
    fn default() -> Self {
        Self {
            speed: 0.01,
            spread: 1.0,
            brightness: 1.0,
        }
    }
}

impl Pattern for RainbowPattern {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn tick(
        &self,
        leds: &mut LedBuffer,
        frame: u64,
        _: &Graph,
        _: &mut StateBox,
    ) -> PatternResult<()> {
        let slots = leds.colors().len().max(1) as f32;
        let offset = frame as f32 * self.speed;
        for index in 0..leds.colors().len() {
            let hue = offset + index as f32 / slots * self.spread;
            leds.set(index, Rgb::from_hsv(hue, 1.0, self.brightness));
        }
        Ok(())
    }
}

/// A band of light sweeping through space along one axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepPattern {
    pub axis: Axis,
    /// Fraction of the installation's extent covered per frame.
    pub speed: f32,
    /// Band half-width as a fraction of the extent.
    pub width: f32,
    pub color: Rgb,
}

/// Extent of the installation along the sweep axis, measured once.
#[derive(Debug, Clone, Copy)]
struct SweepBounds {
    min: f32,
    max: f32,
}

impl SweepPattern {
    pub const NAME: &'static str = "sweep";

    pub fn from_params(params: &serde_json::Value) -> PatternResult<Self> {
        parse_params(params)
    }
}

impl Default for SweepPattern {
    fn default() -> Self {
        Self {
            axis: Axis::Y,
            speed: 0.02,
            width: 0.15,
            color: Rgb::new(40, 160, 255),
        }
    }
}

impl Pattern for SweepPattern {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn tick(
        &self,
        leds: &mut LedBuffer,
        frame: u64,
        _: &Graph,
        state: &mut StateBox,
    ) -> PatternResult<()> {
        let axis = self.axis;
        let bounds = *state.get_or_insert_with(|| {
            leds.leds().iter().map(|led| led.position.axis(axis)).fold(
                SweepBounds {
                    min: f32::INFINITY,
                    max: f32::NEG_INFINITY,
                },
                |b, v| SweepBounds {
                    min: b.min.min(v),
                    max: b.max.max(v),
                },
            )
        })?;

        let extent = (bounds.max - bounds.min).max(f32::EPSILON);
        let plane = (frame as f32 * self.speed).rem_euclid(1.0);
        let width = self.width.max(f32::EPSILON);

        leds.clear();
        let lit: Vec<(usize, f32)> = leds
            .leds()
            .iter()
            .map(|led| {
                let t = (led.position.axis(axis) - bounds.min) / extent;
                (led.index, 1.0 - (t - plane).abs() / width)
            })
            .filter(|(_, intensity)| *intensity > 0.0)
            .collect();
        for (index, intensity) in lit {
            leds.set(index, self.color.scaled(intensity));
        }
        Ok(())
    }
}

/// Walkers roaming the graph with fading trails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkersPattern {
    pub count: usize,
    #[serde(flatten)]
    pub walker: WalkerSettings,
    /// One color per walker, reused round-robin.
    pub colors: Vec<Rgb>,
    /// Fraction of the previous frame kept as afterglow; 0 clears every frame.
    pub afterglow: f32,
}

impl WalkersPattern {
    pub const NAME: &'static str = "walkers";

    pub fn from_params(params: &serde_json::Value) -> PatternResult<Self> {
        parse_params(params)
    }
}

impl Default for WalkersPattern {
    fn default() -> Self {
        Self {
            count: 3,
            walker: WalkerSettings::default(),
            colors: vec![
                Rgb::new(255, 40, 40),
                Rgb::new(40, 255, 80),
                Rgb::new(60, 80, 255),
            ],
            afterglow: 0.0,
        }
    }
}

impl Pattern for WalkersPattern {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn tick(
        &self,
        leds: &mut LedBuffer,
        _: u64,
        graph: &Graph,
        state: &mut StateBox,
    ) -> PatternResult<()> {
        let mut rng = rand::thread_rng();
        let swarm = state.get_or_insert_with(|| {
            WalkerSwarm::spawn(graph, self.count, &self.walker, &self.colors, &mut rng)
        })?;

        if self.afterglow > 0.0 {
            leds.dim(self.afterglow);
        } else {
            leds.clear();
        }
        swarm.tick(graph, leds, &mut rng);
        Ok(())
    }
}
