use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    thread,
    time::Instant,
};

use clap::{Args, Parser, Subcommand};
use ledgraph_core::{
    AppConfig, FrameRecorder, FrameSink, Installation, PatternRegistry, PatternSource,
    RenderFrame, ShapeDefinition,
};
use tracing_subscriber::EnvFilter;

fn main() -> ledgraph_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            setup,
            fps,
            frames,
            preview,
        } => run_continuous(&setup, fps, frames, preview),
        Commands::Step { setup, frames } => run_single_step(&setup, frames),
        Commands::Inspect { shape } => inspect(&shape),
        Commands::Patterns => {
            for name in PatternRegistry::with_builtins().names() {
                println!("{name}");
            }
            Ok(())
        }
    }
}

fn run_continuous(
    setup: &Setup,
    fps: Option<f32>,
    frames: u64,
    preview: bool,
) -> ledgraph_core::Result<()> {
    let mut installation = setup.build()?;
    if let Some(fps) = fps {
        installation.set_target_fps(fps)?;
    }
    let mut recorder = setup.recorder()?;
    let mut terminal = preview.then(|| TerminalPreview::new(io::stdout()));

    tracing::info!(
        shape = installation.shape_name(),
        pattern = installation.pattern_name(),
        frames,
        "starting continuous playback"
    );

    installation.start();
    let mut rendered = 0;
    while rendered < frames {
        match installation.poll(Instant::now()) {
            Ok(Some(_)) => {
                rendered += 1;
                let frame = installation.snapshot();
                present(&frame, recorder.as_mut(), terminal.as_mut())?;
            }
            Ok(None) => {}
            Err(err) => {
                // The failed frame still counts; the pattern stays active.
                rendered += 1;
                tracing::warn!(error = %err, "frame failed");
            }
        }

        if let Some(wait) = installation.scheduler().until_next(Instant::now()) {
            thread::sleep(wait);
        }
    }
    installation.stop();

    finish_recording(recorder)
}

fn run_single_step(setup: &Setup, frames: u64) -> ledgraph_core::Result<()> {
    let mut installation = setup.build()?;
    let mut recorder = setup.recorder()?;

    for _ in 0..frames {
        match installation.step() {
            Ok(number) => {
                let frame = installation.snapshot();
                tracing::info!(frame = number, lit = frame.lit(), "stepped");
                present(&frame, recorder.as_mut(), None)?;
            }
            Err(err) => tracing::warn!(error = %err, "frame failed"),
        }
    }

    finish_recording(recorder)
}

fn inspect(shape: &ShapeArgs) -> ledgraph_core::Result<()> {
    let definition = shape.load()?;
    let graph = definition.build()?;

    println!("shape:  {}", definition.name);
    println!("nodes:  {}", graph.nodes().len());
    println!("edges:  {}", graph.edges().len());
    println!("leds:   {}", graph.total_leds());

    let problems = graph.led_range_problems();
    if problems.is_empty() {
        println!("ranges: ok");
    } else {
        println!("ranges: {} problem(s)", problems.len());
        for problem in problems {
            println!("  - {problem}");
        }
    }
    Ok(())
}

fn present(
    frame: &RenderFrame,
    recorder: Option<&mut FrameRecorder<BufWriter<File>>>,
    terminal: Option<&mut TerminalPreview<io::Stdout>>,
) -> ledgraph_core::Result<()> {
    if let Some(recorder) = recorder {
        recorder.present(frame)?;
    }
    if let Some(terminal) = terminal {
        terminal.present(frame)?;
    }
    Ok(())
}

fn finish_recording(recorder: Option<FrameRecorder<BufWriter<File>>>) -> ledgraph_core::Result<()> {
    if let Some(mut recorder) = recorder {
        recorder.stop()?;
        tracing::info!(frames = recorder.frames_written(), "recording finished");
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .try_init();
}

/// Draws each frame as one line of colored blocks in index order.
struct TerminalPreview<W: Write> {
    out: W,
}

impl<W: Write> TerminalPreview<W> {
    fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> FrameSink for TerminalPreview<W> {
    fn present(&mut self, frame: &RenderFrame) -> ledgraph_core::Result<()> {
        let mut leds: Vec<_> = frame.leds.iter().collect();
        leds.sort_by_key(|led| led.index);

        let mut line = String::with_capacity(leds.len() * 20);
        for led in leds {
            let c = led.color;
            line.push_str(&format!("\x1b[38;2;{};{};{}m█", c.r, c.g, c.b));
        }
        writeln!(self.out, "\r{line}\x1b[0m")?;
        self.out.flush()?;
        Ok(())
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Drive an LED installation modelled as a graph", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play frames continuously at the target frame rate.
    Run {
        #[command(flatten)]
        setup: Setup,
        /// Overrides the configured target frame rate.
        #[arg(long)]
        fps: Option<f32>,
        /// Number of frames to play before exiting.
        #[arg(long, default_value_t = 300)]
        frames: u64,
        /// Print every frame to the terminal.
        #[arg(long)]
        preview: bool,
    },
    /// Render frames one at a time without wall-clock pacing.
    Step {
        #[command(flatten)]
        setup: Setup,
        #[arg(long, default_value_t = 1)]
        frames: u64,
    },
    /// Print a summary of a shape and check its LED index ranges.
    Inspect {
        #[command(flatten)]
        shape: ShapeArgs,
    },
    /// List the bundled patterns.
    Patterns,
}

#[derive(Args, Debug)]
struct ShapeArgs {
    /// Procedural shape name (strip, ring, cube) or path to a JSON definition.
    #[arg(long, default_value = "cube")]
    shape: String,
    /// LEDs per edge for procedural shapes.
    #[arg(long, default_value_t = 16)]
    leds_per_edge: usize,
}

impl ShapeArgs {
    fn load(&self) -> ledgraph_core::Result<ShapeDefinition> {
        let path = Path::new(&self.shape);
        if path.extension().is_some_and(|ext| ext == "json") || path.is_file() {
            ShapeDefinition::from_path(path)
        } else {
            ShapeDefinition::procedural(&self.shape, self.leds_per_edge)
        }
    }
}

#[derive(Args, Debug)]
struct Setup {
    #[command(flatten)]
    shape: ShapeArgs,
    /// JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Pattern to activate, overriding the configuration.
    #[arg(long)]
    pattern: Option<String>,
    /// Pattern parameters as a JSON object.
    #[arg(long)]
    params: Option<String>,
    /// Reject shapes whose LED index ranges overlap or leave gaps.
    #[arg(long)]
    strict: bool,
    /// Write every rendered frame to this file as JSON lines.
    #[arg(long)]
    record: Option<PathBuf>,
}

impl Setup {
    fn config(&self) -> ledgraph_core::Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::from_path(path)?,
            None => AppConfig::default(),
        };
        if let Some(name) = &self.pattern {
            config.pattern = PatternSource::new(name.clone());
        }
        if let Some(params) = &self.params {
            config.pattern.params = serde_json::from_str(params)?;
        }
        config.strict_led_ranges |= self.strict;
        Ok(config)
    }

    fn build(&self) -> ledgraph_core::Result<Installation> {
        let config = self.config()?;
        let mut installation = Installation::new(&config)?;
        installation.load_shape(&self.shape.load()?)?;
        Ok(installation)
    }

    fn recorder(&self) -> ledgraph_core::Result<Option<FrameRecorder<BufWriter<File>>>> {
        let Some(path) = &self.record else {
            return Ok(None);
        };
        tracing::info!(?path, "recording frames");
        let mut recorder = FrameRecorder::new(BufWriter::new(File::create(path)?));
        recorder.start()?;
        Ok(Some(recorder))
    }
}
