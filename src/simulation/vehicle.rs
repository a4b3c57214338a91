//! Vehicle movement logic for the congestion simulation
//!
//! A vehicle advances at most one cell per tick along its cached path.
//! Moves are planned against a frozen view of the path cache and applied
//! afterwards, so no vehicle ever sees another vehicle's move from the
//! same tick.

use super::config::StalePathPolicy;
use super::road_network::Path;
use super::types::{Cell, VehicleId, VehicleStatus};

/// What a vehicle intends to do this tick, decided before anything moves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedStep {
    /// Already arrived; nothing changes
    Idle,
    /// No usable path; stays put
    Stall,
    /// Next cell along the cached path
    Advance(Cell),
    /// Current cell is not on the cached path; jump to its second waypoint
    Fallback(Cell),
    /// Current cell is not on the cached path; stay put until repathed
    Hold,
}

/// Result of applying a planned step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Idle,
    Stalled,
    Moved,
    Held,
    Arrived,
}

/// A vehicle in the simulation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vehicle {
    pub id: VehicleId,
    pub x: usize,
    pub y: usize,
    pub dest_x: usize,
    pub dest_y: usize,
    pub status: VehicleStatus,
    /// Informational only, movement never reads it
    pub speed: u32,
    pub ticks_traveled: u32,
    /// Always the Manhattan distance from (x, y) to the destination
    pub distance_to_dest: usize,
}

impl Vehicle {
    /// A freshly spawned vehicle is always moving. Trips that start at their
    /// destination are filtered out when the world admits its population.
    pub fn new(id: VehicleId, start: Cell, destination: Cell, speed: u32) -> Self {
        Self {
            id,
            x: start.x,
            y: start.y,
            dest_x: destination.x,
            dest_y: destination.y,
            status: VehicleStatus::Moving,
            speed,
            ticks_traveled: 0,
            distance_to_dest: start.manhattan(&destination),
        }
    }

    pub fn position(&self) -> Cell {
        Cell::new(self.x, self.y)
    }

    pub fn destination(&self) -> Cell {
        Cell::new(self.dest_x, self.dest_y)
    }

    pub fn is_moving(&self) -> bool {
        self.status == VehicleStatus::Moving
    }

    pub fn has_arrived(&self) -> bool {
        self.status == VehicleStatus::Arrived
    }

    /// Decide this tick's step from the vehicle's cached path
    pub fn plan_step(&self, path: Option<&Path>, policy: StalePathPolicy) -> PlannedStep {
        if !self.is_moving() {
            return PlannedStep::Idle;
        }

        let path = match path {
            Some(path) if path.len() >= 2 => path,
            _ => return PlannedStep::Stall,
        };

        if let Some(next) = path.next_after(self.position()) {
            return PlannedStep::Advance(next);
        }

        match (policy, path.fallback_waypoint()) {
            (StalePathPolicy::SecondWaypoint, Some(waypoint)) => PlannedStep::Fallback(waypoint),
            (StalePathPolicy::SecondWaypoint, None) => PlannedStep::Stall,
            (StalePathPolicy::HoldAndRepath, _) => PlannedStep::Hold,
        }
    }

    /// Commit a planned step, updating position, counters and status
    pub fn apply(&mut self, step: PlannedStep) -> MoveOutcome {
        match step {
            PlannedStep::Idle => MoveOutcome::Idle,
            PlannedStep::Stall => {
                self.ticks_traveled += 1;
                MoveOutcome::Stalled
            }
            PlannedStep::Hold => {
                self.ticks_traveled += 1;
                MoveOutcome::Held
            }
            PlannedStep::Advance(cell) | PlannedStep::Fallback(cell) => {
                self.x = cell.x;
                self.y = cell.y;
                self.ticks_traveled += 1;
                self.distance_to_dest = self.position().manhattan(&self.destination());

                if self.distance_to_dest == 0 {
                    self.status = VehicleStatus::Arrived;
                    MoveOutcome::Arrived
                } else {
                    MoveOutcome::Moved
                }
            }
        }
    }
}
