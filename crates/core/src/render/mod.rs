use serde::{Deserialize, Serialize};

use crate::{
    graph::Vec3,
    leds::{LedBuffer, Rgb},
    Result,
};

/// One LED as seen by a renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedLed {
    pub index: usize,
    pub position: Vec3,
    pub color: Rgb,
}

/// Snapshot of the buffer after a completed tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderFrame {
    pub frame: u64,
    pub leds: Vec<RenderedLed>,
}

impl RenderFrame {
    pub fn capture(frame: u64, buffer: &LedBuffer) -> Self {
        Self {
            frame,
            leds: buffer
                .iter()
                .map(|(led, color)| RenderedLed {
                    index: led.index,
                    position: led.position,
                    color,
                })
                .collect(),
        }
    }

    /// Number of LEDs that are not black.
    pub fn lit(&self) -> usize {
        self.leds.iter().filter(|led| led.color != Rgb::BLACK).count()
    }
}

/// Consumer of completed frames (a preview, a recorder, a strip driver).
pub trait FrameSink {
    fn present(&mut self, frame: &RenderFrame) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Grb,
}

/// Packs buffer colors into the byte stream a physical strip expects: one
/// triple per global index, in index order.
#[derive(Debug, Clone)]
pub struct StripEncoder {
    order: ChannelOrder,
    brightness: f32,
}

impl StripEncoder {
    pub fn new(order: ChannelOrder, brightness: f32) -> Self {
        Self {
            order,
            brightness: brightness.clamp(0.0, 1.0),
        }
    }

    pub fn encode(&self, buffer: &LedBuffer) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(buffer.colors().len() * 3);
        for color in buffer.colors() {
            let Rgb { r, g, b } = color.scaled(self.brightness);
            match self.order {
                ChannelOrder::Rgb => bytes.extend_from_slice(&[r, g, b]),
                ChannelOrder::Grb => bytes.extend_from_slice(&[g, r, b]),
            }
        }
        bytes
    }
}

impl Default for StripEncoder {
    fn default() -> Self {
        Self::new(ChannelOrder::Rgb, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::ShapeDefinition;

    #[test]
    fn capture_pairs_records_with_slot_colors() {
        let graph = ShapeDefinition::strip(3).build().unwrap();
        let mut buffer = LedBuffer::new(&graph);
        buffer.set(1, Rgb::new(1, 2, 3));

        let frame = RenderFrame::capture(4, &buffer);
        assert_eq!(frame.frame, 4);
        assert_eq!(frame.leds.len(), 3);
        assert_eq!(frame.leds[1].color, Rgb::new(1, 2, 3));
        assert_eq!(frame.lit(), 1);
    }

    #[test]
    fn encodes_in_channel_order_with_brightness() {
        let graph = ShapeDefinition::strip(2).build().unwrap();
        let mut buffer = LedBuffer::new(&graph);
        buffer.set(0, Rgb::new(200, 100, 50));

        let rgb = StripEncoder::default().encode(&buffer);
        assert_eq!(rgb, vec![200, 100, 50, 0, 0, 0]);

        let grb = StripEncoder::new(ChannelOrder::Grb, 0.5).encode(&buffer);
        assert_eq!(&grb[..3], &[50, 100, 25]);
    }
}
