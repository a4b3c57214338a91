//! Per-cell count of moving vehicles
//!
//! Rebuilt from scratch every tick from the vehicle positions as they stand
//! before anything moves.

use super::types::Cell;
use super::vehicle::Vehicle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CongestionMap {
    size: usize,
    counts: Vec<u32>,
}

impl CongestionMap {
    pub fn empty(size: usize) -> Self {
        Self {
            size,
            counts: vec![0; size * size],
        }
    }

    /// Count every moving vehicle at its current cell. Arrived vehicles are
    /// ignored; several vehicles on one cell are all counted.
    pub fn from_vehicles(vehicles: &[Vehicle], size: usize) -> Self {
        let mut map = Self::empty(size);
        for vehicle in vehicles.iter().filter(|v| v.is_moving()) {
            map.counts[vehicle.y * size + vehicle.x] += 1;
        }
        map
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, cell: Cell) -> u32 {
        self.counts[cell.y * self.size + cell.x]
    }

    /// Peak congestion on any single cell
    pub fn max(&self) -> u32 {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.counts.iter().sum()
    }
}
