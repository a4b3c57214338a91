//! Main simulation world that ties everything together
//!
//! Each tick runs, in order: congestion snapshot, rush-hour injection,
//! periodic repathing, batched movement, history output. Congestion and
//! costs are always taken from positions before the tick's moves, so
//! routing lags observed traffic by one tick.

use anyhow::{Context, Result};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::city::CityGrid;
use super::config::SimConfig;
use super::congestion::CongestionMap;
use super::history::{HistorySink, SnapshotRow};
use super::road_network::{CostGrid, PathCache, RoutingGraph};
use super::summary::{CongestionStats, RunSummary};
use super::types::VehicleId;
use super::vehicle::Vehicle;
use super::vehicle_manager::{admit_vehicles, move_vehicles, spawn_vehicles, MotionReport};

/// Progress is logged every this many ticks
const PROGRESS_LOG_INTERVAL: u32 = 10;

/// What happened during a single tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u32,
    pub moving: usize,
    pub arrived: usize,
    pub peak_congestion: u32,
    /// Vehicles injected by rush hour this tick
    pub spawned: usize,
    pub repathed: bool,
    pub motion: MotionReport,
}

/// The main simulation world
pub struct SimWorld {
    grid: CityGrid,

    /// All vehicles, indexed in id order
    vehicles: Vec<Vehicle>,

    path_cache: PathCache,

    config: SimConfig,

    /// Seeded RNG for rush-hour spawning
    rng: StdRng,

    /// Index of the next tick to run
    current_tick: u32,

    rush_hour_fired: bool,

    /// Vehicles that lost their path mid-cycle and are routed on the next tick
    pending_repath: Vec<VehicleId>,

    stats: CongestionStats,
}

impl SimWorld {
    /// Build a world around an initial population
    ///
    /// Fails if the vehicles are not densely numbered or leave the grid.
    /// Vehicles already at their destination are dropped.
    pub fn new(
        grid: CityGrid,
        vehicles: Vec<Vehicle>,
        config: SimConfig,
        rng: StdRng,
    ) -> Result<Self> {
        let vehicles = admit_vehicles(&grid, vehicles).context("Invalid initial vehicles")?;

        Ok(Self {
            grid,
            vehicles,
            path_cache: PathCache::new(),
            config,
            rng,
            current_tick: 0,
            rush_hour_fired: false,
            pending_repath: Vec::new(),
            stats: CongestionStats::default(),
        })
    }

    /// Generate the city and the initial vehicles from one seeded RNG
    pub fn from_config(config: SimConfig) -> Result<Self> {
        config.validate().context("Invalid simulation config")?;

        let mut rng = StdRng::seed_from_u64(config.seed);
        let grid = CityGrid::generate(config.grid_size, &mut rng)
            .context("Failed to generate city grid")?;
        let vehicles = spawn_vehicles(&grid, config.num_initial_vehicles, 0, &mut rng);
        info!(
            "Spawned {} vehicles on a {}x{} city",
            vehicles.len(),
            grid.size(),
            grid.size()
        );

        Self::new(grid, vehicles, config, rng)
    }

    pub fn grid(&self) -> &CityGrid {
        &self.grid
    }

    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    pub fn path_cache(&self) -> &PathCache {
        &self.path_cache
    }

    /// Mutable access to the cache, for seeding paths from outside a
    /// repathing cycle
    pub fn path_cache_mut(&mut self) -> &mut PathCache {
        &mut self.path_cache
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn current_tick(&self) -> u32 {
        self.current_tick
    }

    /// Resume from a given tick index. Rush hour still fires at most once
    /// per world, even if the loop passes its tick again.
    pub fn set_current_tick(&mut self, tick: u32) {
        self.current_tick = tick;
    }

    pub fn rush_hour_fired(&self) -> bool {
        self.rush_hour_fired
    }

    pub fn moving_count(&self) -> usize {
        self.vehicles.iter().filter(|v| v.is_moving()).count()
    }

    pub fn arrived_count(&self) -> usize {
        self.vehicles.iter().filter(|v| v.has_arrived()).count()
    }

    /// True once the tick budget is spent or nothing is left moving
    pub fn is_finished(&self) -> bool {
        self.current_tick >= self.config.max_ticks || self.moving_count() == 0
    }

    fn next_vehicle_id(&self) -> usize {
        self.vehicles
            .iter()
            .map(|v| v.id.0 + 1)
            .max()
            .unwrap_or(0)
    }

    fn inject_rush_hour(&mut self) -> usize {
        self.rush_hour_fired = true;

        let first_id = self.next_vehicle_id();
        let batch = spawn_vehicles(
            &self.grid,
            self.config.rush_hour_batch_size,
            first_id,
            &mut self.rng,
        );
        info!(
            "Rush hour! Spawning {} extra vehicles at tick {}",
            batch.len(),
            self.current_tick
        );

        let spawned = batch.len();
        self.vehicles.extend(batch);
        spawned
    }

    fn routing_graph(&self, congestion: &CongestionMap) -> RoutingGraph {
        let cost_grid = CostGrid::build(&self.grid, congestion);
        RoutingGraph::from_cost_grid(&cost_grid)
    }

    /// Run one simulation tick and write its rows to `sink`
    pub fn tick(&mut self, sink: &mut dyn HistorySink) -> Result<TickReport> {
        let tick = self.current_tick;

        let congestion = CongestionMap::from_vehicles(&self.vehicles, self.grid.size());

        let spawned = if tick == self.config.rush_hour_tick && !self.rush_hour_fired {
            self.inject_rush_hour()
        } else {
            0
        };

        let repathed = tick % self.config.repath_interval == 0;
        if repathed {
            let graph = self.routing_graph(&congestion);
            self.path_cache.recompute(&self.vehicles, &graph);
            self.pending_repath.clear();
            debug!(
                "Tick {}: recomputed {} paths",
                tick,
                self.path_cache.len()
            );
        } else if !self.pending_repath.is_empty() {
            let graph = self.routing_graph(&congestion);
            let pending = std::mem::take(&mut self.pending_repath);
            self.path_cache.repath(&pending, &self.vehicles, &graph);
            debug!("Tick {}: repathed {} off-route vehicles", tick, pending.len());
        }

        let motion = move_vehicles(
            &mut self.vehicles,
            &self.path_cache,
            self.config.stale_path_policy,
        );
        for id in &motion.repath_requests {
            self.path_cache.invalidate(*id);
        }
        self.pending_repath.extend(motion.repath_requests.iter().copied());

        let rows: Vec<SnapshotRow> = self
            .vehicles
            .iter()
            .map(|vehicle| SnapshotRow::capture(tick, vehicle, &congestion))
            .collect();
        sink.write_rows(&rows)
            .with_context(|| format!("Failed to write history for tick {}", tick))?;
        self.stats.record(&rows);

        self.current_tick += 1;

        let report = TickReport {
            tick,
            moving: self.moving_count(),
            arrived: self.arrived_count(),
            peak_congestion: congestion.max(),
            spawned,
            repathed,
            motion,
        };

        if tick % PROGRESS_LOG_INTERVAL == 0 || tick + 1 == self.config.max_ticks {
            info!(
                "Tick {:03} | Moving: {:3} | Arrived: {:3} | Peak congestion: {} cars/cell",
                tick, report.moving, report.arrived, report.peak_congestion
            );
        }

        Ok(report)
    }

    /// Run until the tick budget is spent or every vehicle has arrived
    ///
    /// The sink is finished whether the loop completes, stops early, or fails.
    pub fn run(&mut self, sink: &mut dyn HistorySink) -> Result<RunSummary> {
        let outcome = self.run_ticks(sink);
        let finished = sink.finish().context("Failed to finish history output");
        outcome?;
        finished?;

        let summary = self.summary();
        summary.log();
        Ok(summary)
    }

    fn run_ticks(&mut self, sink: &mut dyn HistorySink) -> Result<()> {
        info!(
            "Starting simulation: {} vehicles, {} ticks",
            self.vehicles.len(),
            self.config.max_ticks
        );

        while self.current_tick < self.config.max_ticks {
            let report = self.tick(sink)?;
            if self.is_finished() {
                if report.moving == 0 {
                    info!("All vehicles arrived by tick {}", report.tick);
                }
                break;
            }
        }
        Ok(())
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary::new(self.current_tick, &self.vehicles, &self.stats)
    }
}
