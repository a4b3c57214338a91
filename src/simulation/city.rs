//! City grid generation
//!
//! The grid is built once from a seeded generator and is never mutated
//! afterwards. Everything downstream only reads it.

use anyhow::{bail, Context, Result};
use log::debug;
use rand::seq::index::sample;
use rand::Rng;

use super::types::{Cell, CellKind};

/// Fraction of cells turned into buildings
pub const BUILDING_DENSITY: f64 = 0.15;
/// Row carrying the horizontal highway
pub const HIGHWAY_ROW: usize = 5;
/// Column carrying the vertical highway
pub const HIGHWAY_COL: usize = 10;
/// Every Nth highway cell is a traffic light
pub const TRAFFIC_LIGHT_SPACING: usize = 4;

/// Immutable square grid of cell kinds, stored row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityGrid {
    size: usize,
    cells: Vec<CellKind>,
}

impl CityGrid {
    /// Generate a city of `size` x `size` cells
    ///
    /// Buildings are scattered at random, then one horizontal and one vertical
    /// highway are laid over them with traffic lights at a fixed spacing.
    /// The outer border is always road so edge cells stay enterable.
    pub fn generate<R: Rng + ?Sized>(size: usize, rng: &mut R) -> Result<Self> {
        if size == 0 {
            bail!("City grid size must be positive");
        }

        let total = size * size;
        let mut cells = vec![CellKind::Road; total];

        let num_buildings = (total as f64 * BUILDING_DENSITY).floor() as usize;
        for index in sample(rng, total, num_buildings).iter() {
            cells[index] = CellKind::Building;
        }

        let highway_row = HIGHWAY_ROW.min(size - 1);
        let highway_col = HIGHWAY_COL.min(size - 1);
        for i in 0..size {
            cells[highway_row * size + i] = CellKind::Highway;
            cells[i * size + highway_col] = CellKind::Highway;
        }
        for i in (0..size).step_by(TRAFFIC_LIGHT_SPACING) {
            cells[highway_row * size + i] = CellKind::TrafficLight;
            cells[i * size + highway_col] = CellKind::TrafficLight;
        }

        for i in 0..size {
            cells[i] = CellKind::Road;
            cells[(size - 1) * size + i] = CellKind::Road;
            cells[i * size] = CellKind::Road;
            cells[i * size + size - 1] = CellKind::Road;
        }

        let grid = Self { size, cells };
        debug!(
            "Generated {}x{} city: {} buildings, {} highway cells, {} traffic lights",
            size,
            size,
            grid.count(CellKind::Building),
            grid.count(CellKind::Highway),
            grid.count(CellKind::TrafficLight)
        );
        Ok(grid)
    }

    /// Build a grid from explicit rows. Every row must be as long as there
    /// are rows.
    pub fn from_rows(rows: Vec<Vec<CellKind>>) -> Result<Self> {
        let size = rows.len();
        if size == 0 {
            bail!("City grid must have at least one row");
        }
        if let Some((y, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != size) {
            bail!(
                "City grid must be square: row {} has {} cells, expected {}",
                y,
                row.len(),
                size
            );
        }

        Ok(Self {
            size,
            cells: rows.into_iter().flatten().collect(),
        })
    }

    /// Parse a text layout, one row per line, using the `CellKind` symbols
    /// (`.` road, `#` building, `=` highway, `+` traffic light).
    pub fn parse(layout: &str) -> Result<Self> {
        let rows = layout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .enumerate()
            .map(|(y, line)| {
                line.chars()
                    .enumerate()
                    .map(|(x, symbol)| {
                        CellKind::from_symbol(symbol).with_context(|| {
                            format!("Unknown cell symbol {:?} at ({}, {})", symbol, x, y)
                        })
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        Self::from_rows(rows)
    }

    /// A grid made entirely of road
    pub fn open(size: usize) -> Result<Self> {
        Self::from_rows(vec![vec![CellKind::Road; size]; size])
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn contains(&self, cell: Cell) -> bool {
        cell.x < self.size && cell.y < self.size
    }

    pub fn kind(&self, cell: Cell) -> CellKind {
        self.cells[cell.y * self.size + cell.x]
    }

    /// All cells in row-major order
    pub fn cells(&self) -> impl Iterator<Item = (Cell, CellKind)> + '_ {
        let size = self.size;
        self.cells
            .iter()
            .enumerate()
            .map(move |(index, kind)| (Cell::new(index % size, index / size), *kind))
    }

    pub fn passable_cells(&self) -> Vec<Cell> {
        self.cells()
            .filter(|(_, kind)| kind.is_passable())
            .map(|(cell, _)| cell)
            .collect()
    }

    pub fn count(&self, kind: CellKind) -> usize {
        self.cells.iter().filter(|k| **k == kind).count()
    }
}
