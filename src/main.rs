use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use congestion_sim::simulation::{CsvHistorySink, SimConfig, SimWorld, StalePathPolicy};

#[derive(Parser)]
#[command(name = "congestion_sim")]
#[command(about = "Grid traffic simulation with congestion-aware routing")]
struct Cli {
    /// Side length of the generated city
    #[arg(long, default_value = "20")]
    grid_size: usize,

    /// Number of vehicles spawned before the first tick
    #[arg(long, default_value = "100")]
    vehicles: usize,

    /// Maximum number of ticks to simulate
    #[arg(long, default_value = "100")]
    ticks: u32,

    /// Recompute all paths every N ticks
    #[arg(long, default_value = "5")]
    repath_interval: u32,

    /// Tick at which the rush-hour batch is injected
    #[arg(long, default_value = "20")]
    rush_hour_tick: u32,

    /// Number of vehicles injected at rush hour
    #[arg(long, default_value = "30")]
    rush_hour_batch: usize,

    /// Seed for city generation and vehicle spawning
    #[arg(long, default_value = "42")]
    seed: u64,

    /// What a vehicle does when it finds itself off its cached path
    #[arg(long, value_enum, default_value_t = StalePathPolicy::HoldAndRepath)]
    stale_path: StalePathPolicy,

    /// Where to write the per-tick vehicle history
    #[arg(long, default_value = "simulation_history.csv")]
    output: PathBuf,
}

impl Cli {
    fn config(&self) -> SimConfig {
        SimConfig {
            grid_size: self.grid_size,
            num_initial_vehicles: self.vehicles,
            max_ticks: self.ticks,
            repath_interval: self.repath_interval,
            rush_hour_tick: self.rush_hour_tick,
            rush_hour_batch_size: self.rush_hour_batch,
            seed: self.seed,
            stale_path_policy: self.stale_path,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("warn,congestion_sim=info"),
    )
    .init();

    let cli = Cli::parse();

    let mut world = SimWorld::from_config(cli.config())?;
    let mut sink = CsvHistorySink::create(&cli.output)
        .with_context(|| format!("Failed to create {}", cli.output.display()))?;

    world.run(&mut sink)?;

    info!(
        "History saved to {} ({} rows)",
        cli.output.display(),
        sink.rows_written()
    );
    Ok(())
}
