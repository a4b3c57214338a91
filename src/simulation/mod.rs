//! Congestion-aware grid traffic simulation
//!
//! Vehicles drive across a generated grid city, following shortest paths
//! that are recomputed on a fixed cadence against a cost surface penalised
//! by current congestion. Everything here runs headless and can be driven
//! directly from tests.

mod city;
mod config;
mod congestion;
mod history;
mod road_network;
mod summary;
mod types;
mod vehicle;
mod vehicle_manager;
mod world;

// Re-export public types for external use
pub use city::{CityGrid, BUILDING_DENSITY, HIGHWAY_COL, HIGHWAY_ROW, TRAFFIC_LIGHT_SPACING};
pub use config::{ConfigError, SimConfig, StalePathPolicy};
pub use congestion::CongestionMap;
pub use history::{
    CsvHistorySink, HistoryError, HistoryResult, HistorySink, MemoryHistorySink, SnapshotRow,
};
pub use road_network::{CostGrid, Path, PathCache, RoutingGraph};
pub use summary::{CongestionStats, RunSummary};
pub use types::{
    Cell, CellKind, VehicleId, VehicleStatus, CONGESTION_PENALTY, DEFAULT_GRID_SIZE, IMPASSABLE,
};
pub use vehicle::{MoveOutcome, PlannedStep, Vehicle};
pub use vehicle_manager::{
    admit_vehicles, move_vehicles, spawn_vehicles, AdmissionError, MotionReport, BASE_SPEED,
    HIGHWAY_SPEED_MULTIPLIER,
};
pub use world::{SimWorld, TickReport};
