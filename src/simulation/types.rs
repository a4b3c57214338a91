//! Core types for the congestion simulation
//!
//! Plain value types shared by the grid, routing and motion code.

use std::fmt;

/// Extra traversal cost added per moving vehicle on a cell
pub const CONGESTION_PENALTY: f32 = 0.5;

/// Cost assigned to cells that can never be entered
pub const IMPASSABLE: f32 = f32::INFINITY;

/// Side length of the generated city when none is configured
pub const DEFAULT_GRID_SIZE: usize = 20;

/// A unique identifier for a vehicle
///
/// Ids are dense and only ever grow, since rush-hour batches continue
/// numbering from the current maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VehicleId(pub usize);

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A grid coordinate. `x` is the column, `y` is the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Cell {
    pub x: usize,
    pub y: usize,
}

impl Cell {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    pub fn manhattan(&self, other: &Cell) -> usize {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    pub fn is_adjacent(&self, other: &Cell) -> bool {
        self.manhattan(other) == 1
    }

    /// In-bounds 4-connected neighbours on a `size` x `size` grid
    pub fn neighbors(&self, size: usize) -> impl Iterator<Item = Cell> {
        const DIRECTIONS: [(isize, isize); 4] = [(0, -1), (0, 1), (-1, 0), (1, 0)];
        let origin = *self;
        DIRECTIONS.into_iter().filter_map(move |(dx, dy)| {
            let x = origin.x.checked_add_signed(dx)?;
            let y = origin.y.checked_add_signed(dy)?;
            (x < size && y < size).then_some(Cell::new(x, y))
        })
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Terrain type of a single grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellKind {
    Road,
    Building,
    Highway,
    TrafficLight,
}

impl CellKind {
    /// Traversal cost before any congestion is applied
    pub fn base_cost(&self) -> f32 {
        match self {
            CellKind::Road => 1.0,
            CellKind::Highway => 0.5,
            CellKind::TrafficLight => 1.5,
            CellKind::Building => IMPASSABLE,
        }
    }

    pub fn is_passable(&self) -> bool {
        !matches!(self, CellKind::Building)
    }

    /// Single character used by text layouts
    pub fn symbol(&self) -> char {
        match self {
            CellKind::Road => '.',
            CellKind::Building => '#',
            CellKind::Highway => '=',
            CellKind::TrafficLight => '+',
        }
    }

    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '.' => Some(CellKind::Road),
            '#' => Some(CellKind::Building),
            '=' => Some(CellKind::Highway),
            '+' => Some(CellKind::TrafficLight),
            _ => None,
        }
    }
}

/// Lifecycle state of a vehicle. `Arrived` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VehicleStatus {
    Moving,
    Arrived,
}

impl VehicleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleStatus::Moving => "moving",
            VehicleStatus::Arrived => "arrived",
        }
    }
}

impl fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
