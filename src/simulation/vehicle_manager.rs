//! Vehicle spawning and batched movement
//!
//! Spawning picks random start and destination cells; movement advances the
//! whole population by one tick against a frozen path cache.

use log::{debug, warn};
use rand::Rng;
use thiserror::Error;

use super::city::CityGrid;
use super::config::StalePathPolicy;
use super::road_network::PathCache;
use super::types::{Cell, CellKind, VehicleId};
use super::vehicle::{MoveOutcome, PlannedStep, Vehicle};

/// Speed of a vehicle that starts off the highway
pub const BASE_SPEED: u32 = 1;
/// Vehicles starting on a highway get this multiple of the base speed
pub const HIGHWAY_SPEED_MULTIPLIER: u32 = 2;

/// Spawn `count` vehicles with random passable start and destination cells
///
/// A destination drawn on the start cell is redrawn, so no vehicle begins
/// at its destination. Ids are assigned densely from `first_id`. Returns no
/// vehicles if the city has fewer than two passable cells.
pub fn spawn_vehicles<R: Rng + ?Sized>(
    grid: &CityGrid,
    count: usize,
    first_id: usize,
    rng: &mut R,
) -> Vec<Vehicle> {
    let valid_cells = grid.passable_cells();
    if valid_cells.len() < 2 {
        warn!("Fewer than two passable cells in the city, no vehicles spawned");
        return Vec::new();
    }

    let mut vehicles = Vec::with_capacity(count);
    for offset in 0..count {
        let start = valid_cells[rng.random_range(0..valid_cells.len())];
        let destination = loop {
            let candidate = valid_cells[rng.random_range(0..valid_cells.len())];
            if candidate != start {
                break candidate;
            }
        };

        let speed = if grid.kind(start) == CellKind::Highway {
            BASE_SPEED * HIGHWAY_SPEED_MULTIPLIER
        } else {
            BASE_SPEED
        };
        vehicles.push(Vehicle::new(
            VehicleId(first_id + offset),
            start,
            destination,
            speed,
        ));
    }

    debug!("Spawned {} vehicles (ids from {})", vehicles.len(), first_id);
    vehicles
}

/// Why an initial population was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    #[error("vehicle at index {index} has id {id}, expected ids dense from 0")]
    NonDenseId { index: usize, id: VehicleId },

    #[error("vehicle {id} has {what} {cell} outside the {size}x{size} grid")]
    OutOfGrid {
        id: VehicleId,
        what: &'static str,
        cell: Cell,
        size: usize,
    },
}

/// Check an initial population against the grid and drop trips that start
/// at their destination
///
/// Ids must run 0, 1, 2, ... in order and every start and destination must
/// be on the grid. Excluded vehicles leave gaps in the id sequence.
pub fn admit_vehicles(
    grid: &CityGrid,
    vehicles: Vec<Vehicle>,
) -> Result<Vec<Vehicle>, AdmissionError> {
    for (index, vehicle) in vehicles.iter().enumerate() {
        if vehicle.id != VehicleId(index) {
            return Err(AdmissionError::NonDenseId {
                index,
                id: vehicle.id,
            });
        }
        let ends = [
            ("start", vehicle.position()),
            ("destination", vehicle.destination()),
        ];
        for (what, cell) in ends {
            if !grid.contains(cell) {
                return Err(AdmissionError::OutOfGrid {
                    id: vehicle.id,
                    what,
                    cell,
                    size: grid.size(),
                });
            }
        }
    }

    let total = vehicles.len();
    let admitted: Vec<Vehicle> = vehicles
        .into_iter()
        .filter(|v| v.position() != v.destination())
        .collect();
    if admitted.len() < total {
        warn!(
            "Excluded {} vehicle(s) starting at their destination",
            total - admitted.len()
        );
    }
    Ok(admitted)
}

/// Tallies from one batched movement pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MotionReport {
    pub moved: usize,
    pub arrived: usize,
    pub stalled: usize,
    pub held: usize,
    /// Off-path vehicles sent to their path's second waypoint
    pub fallbacks: usize,
    /// Off-path vehicles that held position and need a fresh path
    pub repath_requests: Vec<VehicleId>,
}

/// Advance every moving vehicle one step along its cached path
///
/// All steps are planned from the current state before any vehicle is
/// updated. The cache is not modified; vehicles that need a new path are
/// listed in the report.
pub fn move_vehicles(
    vehicles: &mut [Vehicle],
    cache: &PathCache,
    policy: StalePathPolicy,
) -> MotionReport {
    let steps: Vec<PlannedStep> = vehicles
        .iter()
        .map(|vehicle| vehicle.plan_step(cache.get(vehicle.id), policy))
        .collect();

    let mut report = MotionReport::default();
    for (vehicle, step) in vehicles.iter_mut().zip(steps) {
        match step {
            PlannedStep::Fallback(waypoint) => {
                debug!(
                    "Vehicle {} at {} is off its path, jumping to {}",
                    vehicle.id,
                    vehicle.position(),
                    waypoint
                );
                report.fallbacks += 1;
            }
            PlannedStep::Hold => report.repath_requests.push(vehicle.id),
            _ => {}
        }

        match vehicle.apply(step) {
            MoveOutcome::Moved => report.moved += 1,
            MoveOutcome::Arrived => report.arrived += 1,
            MoveOutcome::Stalled => report.stalled += 1,
            MoveOutcome::Held => report.held += 1,
            MoveOutcome::Idle => {}
        }
    }

    if report.fallbacks > 0 || report.held > 0 {
        warn!(
            "{} vehicle(s) were off their cached path ({} jumped, {} held for repath)",
            report.fallbacks + report.held,
            report.fallbacks,
            report.held
        );
    }

    report
}
