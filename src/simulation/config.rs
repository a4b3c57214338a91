//! Run parameters for a simulation

use clap::ValueEnum;
use thiserror::Error;

use super::types::DEFAULT_GRID_SIZE;

/// How a vehicle behaves when its current cell is missing from its cached path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum StalePathPolicy {
    /// Stay put this tick and get routed again on the next tick
    #[default]
    HoldAndRepath,
    /// Jump to the path's second waypoint, adjacent or not
    SecondWaypoint,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be positive")]
    NotPositive(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimConfig {
    pub grid_size: usize,
    pub num_initial_vehicles: usize,
    pub max_ticks: u32,
    /// Paths are recomputed on every tick divisible by this
    pub repath_interval: u32,
    /// Tick at which the rush-hour batch is injected, once
    pub rush_hour_tick: u32,
    pub rush_hour_batch_size: usize,
    pub seed: u64,
    pub stale_path_policy: StalePathPolicy,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            grid_size: DEFAULT_GRID_SIZE,
            num_initial_vehicles: 100,
            max_ticks: 100,
            repath_interval: 5,
            rush_hour_tick: 20,
            rush_hour_batch_size: 30,
            seed: 42,
            stale_path_policy: StalePathPolicy::default(),
        }
    }
}

impl SimConfig {
    /// Reject zero counts and intervals. Tick 0 is a valid rush-hour tick.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_size == 0 {
            return Err(ConfigError::NotPositive("grid_size"));
        }
        if self.num_initial_vehicles == 0 {
            return Err(ConfigError::NotPositive("num_initial_vehicles"));
        }
        if self.max_ticks == 0 {
            return Err(ConfigError::NotPositive("max_ticks"));
        }
        if self.repath_interval == 0 {
            return Err(ConfigError::NotPositive("repath_interval"));
        }
        if self.rush_hour_batch_size == 0 {
            return Err(ConfigError::NotPositive("rush_hour_batch_size"));
        }
        Ok(())
    }
}
