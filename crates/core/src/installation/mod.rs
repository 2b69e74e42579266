use std::{
    any::Any,
    fmt,
    panic::{self, AssertUnwindSafe},
    time::Instant,
};

use tracing::{debug, info, warn};

use crate::{
    config::AppConfig,
    graph::Graph,
    leds::LedBuffer,
    pattern::{Pattern, PatternRegistry, PatternSource, StateBox},
    render::RenderFrame,
    scheduler::FrameScheduler,
    shape::ShapeDefinition,
    LedGraphError, Result,
};

struct ActivePattern {
    /// `None` when the logic was installed directly rather than compiled.
    source: Option<PatternSource>,
    logic: Box<dyn Pattern>,
}

/// One graph, its LED buffer, the active pattern and the state that pattern
/// keeps between frames.
///
/// Shape and pattern changes are all-or-nothing: a shape that fails to build
/// or a pattern that fails to compile leaves the running setup alone. A tick
/// that fails keeps the logic and falls back to the last committed state.
pub struct Installation {
    registry: PatternRegistry,
    shape_name: String,
    graph: Graph,
    leds: LedBuffer,
    active: Option<ActivePattern>,
    state: StateBox,
    frame: u64,
    scheduler: FrameScheduler,
    strict_led_ranges: bool,
    last_error: Option<String>,
}

impl Installation {
    /// Creates an installation with an empty shape and the configured
    /// pattern compiled from the built-in registry.
    pub fn new(config: &AppConfig) -> Result<Self> {
        Self::with_registry(config, PatternRegistry::with_builtins())
    }

    pub fn with_registry(config: &AppConfig, registry: PatternRegistry) -> Result<Self> {
        config.validate()?;
        let mut installation = Self {
            registry,
            shape_name: String::new(),
            graph: Graph::default(),
            leds: LedBuffer::default(),
            active: None,
            state: StateBox::new(),
            frame: 0,
            scheduler: FrameScheduler::new(config.scheduler.target_fps)?,
            strict_led_ranges: config.strict_led_ranges,
            last_error: None,
        };
        installation.load_pattern(&config.pattern)?;
        Ok(installation)
    }

    pub fn registry(&self) -> &PatternRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut PatternRegistry {
        &mut self.registry
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Buffer as left by the most recent tick.
    pub fn leds(&self) -> &LedBuffer {
        &self.leds
    }

    pub fn shape_name(&self) -> &str {
        &self.shape_name
    }

    /// Number of the frame the next tick will render.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn pattern_name(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.logic.name())
    }

    pub fn pattern_source(&self) -> Option<&PatternSource> {
        self.active.as_ref()?.source.as_ref()
    }

    /// Message of the most recent rejected change or failed tick, cleared by
    /// the next success.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    pub fn snapshot(&self) -> RenderFrame {
        RenderFrame::capture(self.frame.saturating_sub(1), &self.leds)
    }

    /// Builds `shape` and swaps it in, regenerating the LED buffer and
    /// resetting the pattern state. On failure the current shape stays.
    pub fn load_shape(&mut self, shape: &ShapeDefinition) -> Result<()> {
        let graph = match shape.build() {
            Ok(graph) => graph,
            Err(err) => return Err(self.reject("shape", &shape.name, err)),
        };

        let problems = graph.led_range_problems();
        if !problems.is_empty() {
            if self.strict_led_ranges {
                let err = LedGraphError::LedRange(problems.join("; "));
                return Err(self.reject("shape", &shape.name, err));
            }
            warn!(
                shape = %shape.name,
                ?problems,
                "LED ranges do not tile the buffer; shared indices will alias"
            );
        }

        info!(
            shape = %shape.name,
            nodes = graph.nodes().len(),
            edges = graph.edges().len(),
            leds = graph.total_leds(),
            "shape loaded"
        );
        self.leds = LedBuffer::new(&graph);
        self.graph = graph;
        self.shape_name = shape.name.clone();
        self.last_error = None;
        self.reset_state();
        Ok(())
    }

    /// Compiles `source` and makes it the active pattern. On failure the
    /// current pattern keeps running.
    pub fn load_pattern(&mut self, source: &PatternSource) -> Result<()> {
        let logic = match self.registry.compile(source) {
            Ok(logic) => logic,
            Err(err) => return Err(self.reject("pattern", &source.name, err)),
        };
        info!(pattern = %source.name, "pattern compiled");
        self.active = Some(ActivePattern {
            source: Some(source.clone()),
            logic,
        });
        self.last_error = None;
        self.reset_state();
        Ok(())
    }

    /// Activates the pattern at `index` in registry order.
    pub fn select_pattern(&mut self, index: usize) -> Result<()> {
        let source = self
            .registry
            .source_at(index)
            .ok_or_else(|| LedGraphError::msg("pattern registry is empty"))?;
        self.load_pattern(&source)
    }

    /// Installs ready-made pattern logic, bypassing the registry.
    pub fn set_pattern(&mut self, logic: Box<dyn Pattern>) {
        info!(pattern = logic.name(), "pattern installed");
        self.active = Some(ActivePattern {
            source: None,
            logic,
        });
        self.last_error = None;
        self.reset_state();
    }

    /// Empties the pattern state; the next tick is treated as the first.
    pub fn reset_state(&mut self) {
        debug!(frame = self.frame, "pattern state reset");
        self.state.clear();
        self.frame = 0;
    }

    pub fn start(&mut self) {
        info!(fps = self.scheduler.target_fps(), "continuous playback started");
        self.scheduler.start();
    }

    pub fn stop(&mut self) {
        info!(frame = self.frame, "continuous playback stopped");
        self.scheduler.stop();
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn set_target_fps(&mut self, fps: f32) -> Result<()> {
        self.scheduler.set_target_fps(fps)?;
        debug!(fps, "target frame rate changed");
        Ok(())
    }

    /// Renders exactly one frame regardless of wall-clock time and returns
    /// its number.
    pub fn step(&mut self) -> Result<u64> {
        self.tick()
    }

    /// Renders a frame if continuous playback is on and one is due at `now`.
    /// Returns the rendered frame number, or `None` when the tick was skipped.
    pub fn poll(&mut self, now: Instant) -> Result<Option<u64>> {
        if !self.scheduler.due(now) {
            return Ok(None);
        }
        self.tick().map(Some)
    }

    fn tick(&mut self) -> Result<u64> {
        let frame = self.frame;
        self.frame += 1;

        let Some(active) = &self.active else {
            return Ok(frame);
        };

        let leds = &mut self.leds;
        let graph = &self.graph;
        let state = &mut self.state;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            active.logic.tick(leds, frame, graph, state)
        }));

        let reason = match outcome {
            Ok(Ok(())) => {
                self.state.commit();
                self.last_error = None;
                return Ok(frame);
            }
            Ok(Err(err)) => err.to_string(),
            Err(payload) => panic_message(payload.as_ref()),
        };
        self.state.rollback();

        let pattern = active.logic.name().to_string();
        warn!(%pattern, frame, %reason, "pattern tick failed; keeping current logic");
        let err = LedGraphError::PatternRuntime {
            pattern,
            frame,
            reason,
        };
        self.last_error = Some(err.to_string());
        Err(err)
    }

    fn reject(&mut self, what: &str, name: &str, err: LedGraphError) -> LedGraphError {
        warn!(%what, %name, error = %err, "rejected; keeping the active one");
        self.last_error = Some(err.to_string());
        err
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}

impl fmt::Debug for Installation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Installation")
            .field("shape", &self.shape_name)
            .field("leds", &self.leds.len())
            .field("pattern", &self.pattern_name())
            .field("state", &self.state)
            .field("frame", &self.frame)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}
