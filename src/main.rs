use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;

use roomwalk::animation::TARGET_FPS;
use roomwalk::app::{App, AppConfig};
use roomwalk::blueprint::BlueprintJson;
use roomwalk::config::SimConfig;
use roomwalk::demo::{demo_blueprint, DEFAULT_DEMO_BOTS, DEMO_ROOM_ID};

/// Roomwalk: bots wandering grid rooms
///
/// Loads a room blueprint, feeds it bot events (from a JSON-lines file or a
/// built-in demo) and prints the bots' poses as JSON lines.
#[derive(Parser, Debug)]
#[command(name = "roomwalk")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Room blueprint (JSON)
    #[arg(short, long, value_name = "FILE")]
    blueprint: Option<PathBuf>,

    /// Use the built-in demo office and generate demo events
    #[arg(long)]
    demo: bool,

    /// Events file to watch (JSON lines format)
    #[arg(short, long, value_name = "FILE")]
    events: Option<PathBuf>,

    /// Engine tuning overrides (JSON)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Room id used to match meeting events (defaults to the blueprint id)
    #[arg(long)]
    room: Option<String>,

    /// Number of demo bots; personalities repeat past the first five
    #[arg(long, default_value_t = DEFAULT_DEMO_BOTS)]
    bots: usize,

    /// Seed for wander randomness and demo events
    #[arg(long)]
    seed: Option<u64>,

    /// Simulation frame rate
    #[arg(long, default_value_t = TARGET_FPS)]
    fps: u32,

    /// Stop after this many frames
    #[arg(long)]
    ticks: Option<u64>,

    /// Print a frame every N ticks
    #[arg(long, default_value_t = 3)]
    emit_every: u64,

    /// Print the room layout summary and prop list, then exit
    #[arg(long)]
    summary: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if !cli.demo && cli.blueprint.is_none() {
        bail!("either --blueprint or --demo must be specified (see 'roomwalk --help')");
    }

    let mut sim = match &cli.config {
        Some(path) => SimConfig::load(path).with_context(|| format!("loading config {}", path.display()))?,
        None => SimConfig::default(),
    };
    if let Some(seed) = cli.seed {
        sim.movement.seed = seed;
    }

    let (blueprint, room_id) = match &cli.blueprint {
        Some(path) => {
            let json = BlueprintJson::load(path).with_context(|| format!("loading blueprint {}", path.display()))?;
            let room_id = json.id.clone().unwrap_or_else(|| json.name.to_lowercase());
            let blueprint = json
                .compile()
                .with_context(|| format!("compiling blueprint {}", path.display()))?;
            (blueprint, room_id)
        }
        None => (demo_blueprint().context("building demo office")?, DEMO_ROOM_ID.to_string()),
    };
    let blueprint = Arc::new(blueprint);

    let config = AppConfig {
        room_id: cli.room.unwrap_or(room_id),
        events_path: cli.events,
        demo_mode: cli.demo,
        demo_bots: cli.bots,
        fps: cli.fps.max(1),
        max_ticks: cli.ticks,
        emit_every: cli.emit_every,
        sim,
    };

    let mut app = App::new(config, blueprint);
    if cli.summary {
        let simulation = app.simulation();
        println!("{}", simulation.manager().layout_summary());
        println!("{}", serde_json::to_string_pretty(&simulation.manager().prop_layout())?);
        return Ok(());
    }

    info!("Starting simulation");
    app.run().await
}
