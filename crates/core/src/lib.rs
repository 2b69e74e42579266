//! Core library for LED installations modelled as graphs.
//!
//! Nodes are connection points in space and edges are runs of LEDs between
//! them. A shape is built into a [`Graph`] once, expanded into a flat
//! [`LedBuffer`], and then painted every frame by the active [`Pattern`],
//! which the [`Installation`] drives and isolates.

pub mod config;
pub mod error;
pub mod graph;
pub mod installation;
pub mod leds;
pub mod pattern;
pub mod record;
pub mod render;
pub mod scheduler;
pub mod shape;
pub mod walker;

pub use config::{AppConfig, SchedulerConfig};
pub use error::{LedGraphError, Result};
pub use graph::{build_graph, EdgeId, EdgeSpec, Graph, NodeId, NodeSpec, Vec3};
pub use installation::Installation;
pub use leds::{generate_leds, Led, LedBuffer, Rgb};
pub use pattern::{Pattern, PatternError, PatternRegistry, PatternSource, StateBox};
pub use record::FrameRecorder;
pub use render::{ChannelOrder, FrameSink, RenderFrame, StripEncoder};
pub use scheduler::{FrameScheduler, ScheduleMode};
pub use shape::{ShapeBuilder, ShapeDefinition};
pub use walker::{Walker, WalkerSettings, WalkerSwarm};
