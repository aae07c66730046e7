mod app;
mod util;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use uwb_layout::feed::{Scenario, decode_triples};
use uwb_layout::{
    Diagnostics, EdgeSnapshot, ManualClock, NodeSnapshot, Simulation, SimulationConfig,
};

/// Simulated wall time per headless tick.
const FRAME_MS: u64 = 16;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// JSON settings file; missing fields fall back to defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Seeds initial placement and the simulated feed.
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Runs a canned scenario without a window and prints the final layout as JSON.
    Headless {
        #[arg(long, default_value = "simple-triangle")]
        scenario: Scenario,

        #[arg(long, default_value_t = 600)]
        ticks: u64,

        /// Resubmit the scenario every N ticks so nothing goes stale. 0 submits once.
        #[arg(long, default_value_t = 60)]
        resubmit_every: u64,
    },
    /// Feeds a file of JSON payloads, one `[[idA, idB, meters], ...]` array per line.
    Replay {
        file: PathBuf,

        #[arg(long, default_value_t = 60)]
        ticks_per_batch: u64,
    },
    /// Opens the live viewer. Without a scenario it runs the simulated network.
    View {
        #[arg(long)]
        scenario: Option<Scenario>,

        /// Feed batches per second.
        #[arg(long, default_value_t = 10.0)]
        rate: f32,
    },
}

#[derive(Serialize)]
struct Report<'a> {
    scale: f32,
    nodes: Vec<NodeSnapshot>,
    edges: Vec<EdgeSnapshot>,
    diagnostics: &'a Diagnostics,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "uwb_layout=info".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_deref(), args.seed)?;

    match args.command {
        Some(Command::Headless {
            scenario,
            ticks,
            resubmit_every,
        }) => run_headless(config, scenario, ticks, resubmit_every),
        Some(Command::Replay {
            file,
            ticks_per_batch,
        }) => run_replay(config, &file, ticks_per_batch),
        Some(Command::View { scenario, rate }) => run_viewer(config, scenario, args.seed, rate),
        None => run_viewer(config, None, args.seed, 10.0),
    }
}

fn load_config(path: Option<&Path>, seed: Option<u64>) -> Result<SimulationConfig> {
    let mut config = match path {
        Some(path) => SimulationConfig::load(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => SimulationConfig::default(),
    };
    if seed.is_some() {
        config.seed = seed;
    }
    Ok(config)
}

fn manual_simulation(config: SimulationConfig) -> Result<(Simulation, ManualClock)> {
    let clock = ManualClock::new(0);
    let simulation = Simulation::new(config)
        .context("invalid simulation settings")?
        .with_clock(clock.clone());
    Ok((simulation, clock))
}

fn run_headless(
    config: SimulationConfig,
    scenario: Scenario,
    ticks: u64,
    resubmit_every: u64,
) -> Result<()> {
    let (mut simulation, clock) = manual_simulation(config)?;
    let measurements = scenario.measurements();
    info!(%scenario, ticks, "running headless");

    for tick in 0..ticks {
        if tick == 0 || (resubmit_every > 0 && tick % resubmit_every == 0) {
            let now = clock.now_ms();
            for result in simulation.submit_batch(&measurements, now) {
                if let Err(error) = result {
                    warn!(%error, "scenario measurement rejected");
                }
            }
        }
        simulation.tick(None);
        clock.advance(FRAME_MS);
    }

    print_report(&simulation)
}

fn run_replay(config: SimulationConfig, file: &Path, ticks_per_batch: u64) -> Result<()> {
    let (mut simulation, clock) = manual_simulation(config)?;
    let reader = BufReader::new(
        File::open(file).with_context(|| format!("failed to open {}", file.display()))?,
    );

    let mut batches = 0usize;
    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read {}", file.display()))?;
        if line.trim().is_empty() {
            continue;
        }

        match decode_triples(&line) {
            Ok(batch) => {
                let now = clock.now_ms();
                let rejected = simulation
                    .submit_batch(&batch, now)
                    .iter()
                    .filter(|result| result.is_err())
                    .count();
                if rejected > 0 {
                    warn!(line = index + 1, rejected, "some measurements were rejected");
                }
                batches += 1;
            }
            Err(error) => warn!(line = index + 1, %error, "skipping malformed payload"),
        }

        for _ in 0..ticks_per_batch {
            simulation.tick(None);
            clock.advance(FRAME_MS);
        }
    }

    info!(batches, "replay finished");
    print_report(&simulation)
}

fn print_report(simulation: &Simulation) -> Result<()> {
    let report = Report {
        scale: simulation.scale(),
        nodes: simulation.snapshot_nodes(),
        edges: simulation.snapshot_edges(),
        diagnostics: simulation.diagnostics(),
    };
    let json = serde_json::to_string_pretty(&report).context("failed to serialize report")?;
    println!("{json}");
    Ok(())
}

fn run_viewer(
    config: SimulationConfig,
    scenario: Option<Scenario>,
    seed: Option<u64>,
    rate_hz: f32,
) -> Result<()> {
    let simulation = Simulation::new(config).context("invalid simulation settings")?;
    let source = match scenario {
        Some(scenario) => app::FeedSource::Scenario(scenario),
        None => app::FeedSource::Live { seed },
    };

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1280.0, 820.0]),
        ..Default::default()
    };

    eframe::run_native(
        "uwb-layout",
        options,
        Box::new(move |cc| Ok(Box::new(app::LayoutApp::new(cc, simulation, source, rate_hz)))),
    )
    .map_err(|error| anyhow!("viewer exited with an error: {error}"))
}
