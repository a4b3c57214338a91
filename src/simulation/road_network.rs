//! Cost surface and road network graph for pathfinding
//!
//! Each repathing cycle freezes a `CostGrid` from the grid and the current
//! congestion, turns it into a `RoutingGraph`, and recomputes every moving
//! vehicle's path against that one graph.

use log::{debug, warn};
use ordered_float::OrderedFloat;
use petgraph::algo::astar;
use petgraph::graph::{DiGraph, NodeIndex};
use rayon::prelude::*;
use std::collections::HashMap;

use super::city::CityGrid;
use super::congestion::CongestionMap;
use super::types::{Cell, CellKind, VehicleId, CONGESTION_PENALTY, IMPASSABLE};
use super::vehicle::Vehicle;

/// Traversal cost of every cell: terrain base cost plus a congestion penalty
#[derive(Debug, Clone, PartialEq)]
pub struct CostGrid {
    size: usize,
    costs: Vec<f32>,
}

impl CostGrid {
    pub fn build(grid: &CityGrid, congestion: &CongestionMap) -> Self {
        let mut costs: Vec<f32> = grid.cells().map(|(_, kind)| kind.base_cost()).collect();

        for ((cell, _), cost) in grid.cells().zip(costs.iter_mut()) {
            *cost += CONGESTION_PENALTY * congestion.get(cell) as f32;
        }

        // Must run last: buildings stay impassable whatever the congestion.
        for ((_, kind), cost) in grid.cells().zip(costs.iter_mut()) {
            if kind == CellKind::Building {
                *cost = IMPASSABLE;
            }
        }

        Self {
            size: grid.size(),
            costs,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn cost(&self, cell: Cell) -> f32 {
        self.costs[cell.y * self.size + cell.x]
    }

    pub fn is_passable(&self, cell: Cell) -> bool {
        self.cost(cell).is_finite()
    }
}

/// An ordered run of adjacent cells from a start to a destination, both
/// included. An empty path means the destination is unreachable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Path(Vec<Cell>);

impl Path {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self(cells)
    }

    pub fn cells(&self) -> &[Cell] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn start(&self) -> Option<Cell> {
        self.0.first().copied()
    }

    pub fn end(&self) -> Option<Cell> {
        self.0.last().copied()
    }

    /// The cell following `cell`, if `cell` is on the path and not its end
    pub fn next_after(&self, cell: Cell) -> Option<Cell> {
        let index = self.0.iter().position(|c| *c == cell)?;
        self.0.get(index + 1).copied()
    }

    /// Second waypoint, used when a vehicle has drifted off its path
    pub fn fallback_waypoint(&self) -> Option<Cell> {
        self.0.get(1).copied()
    }

    /// Every consecutive pair of cells is 4-adjacent
    pub fn is_contiguous(&self) -> bool {
        self.0.windows(2).all(|pair| pair[0].is_adjacent(&pair[1]))
    }

    /// Sum of entry costs of every cell after the first
    pub fn cost(&self, cost_grid: &CostGrid) -> f32 {
        self.0.iter().skip(1).map(|cell| cost_grid.cost(*cell)).sum()
    }
}

/// Directed 4-connected grid graph. The edge A -> B carries the cost of
/// entering B; impassable cells have no incoming edges.
#[derive(Debug, Clone)]
pub struct RoutingGraph {
    graph: DiGraph<Cell, OrderedFloat<f32>>,
    size: usize,
}

impl RoutingGraph {
    pub fn from_cost_grid(cost_grid: &CostGrid) -> Self {
        let size = cost_grid.size();
        let mut graph = DiGraph::with_capacity(size * size, 4 * size * size);

        // Nodes go in row-major order so a cell's node index is its flat index.
        for y in 0..size {
            for x in 0..size {
                graph.add_node(Cell::new(x, y));
            }
        }

        for y in 0..size {
            for x in 0..size {
                let cell = Cell::new(x, y);
                for neighbor in cell.neighbors(size) {
                    if cost_grid.is_passable(neighbor) {
                        graph.add_edge(
                            NodeIndex::new(y * size + x),
                            NodeIndex::new(neighbor.y * size + neighbor.x),
                            OrderedFloat(cost_grid.cost(neighbor)),
                        );
                    }
                }
            }
        }

        Self { graph, size }
    }

    fn node(&self, cell: Cell) -> Option<NodeIndex> {
        (cell.x < self.size && cell.y < self.size)
            .then(|| NodeIndex::new(cell.y * self.size + cell.x))
    }

    /// Lowest-cost path and its total cost, or `None` if `end` is unreachable
    ///
    /// Dijkstra via A* with a zero heuristic; the search stops as soon as
    /// `end` is settled. Ties between equal-cost routes are broken by heap
    /// order, so only the cost is guaranteed, not the exact cells.
    pub fn find_path_with_cost(&self, start: Cell, end: Cell) -> Option<(f32, Path)> {
        let start_node = self.node(start)?;
        let end_node = self.node(end)?;

        let (cost, nodes) = astar(
            &self.graph,
            start_node,
            |node| node == end_node,
            |edge| *edge.weight(),
            |_| OrderedFloat(0.0),
        )?;

        let cells = nodes.into_iter().map(|node| self.graph[node]).collect();
        Some((cost.into_inner(), Path::new(cells)))
    }

    /// Lowest-cost path from `start` to `end`, empty if unreachable
    pub fn find_path(&self, start: Cell, end: Cell) -> Path {
        self.find_path_with_cost(start, end)
            .map(|(_, path)| path)
            .unwrap_or_default()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

/// Current path of every routed vehicle
///
/// Replaced wholesale each repathing cycle. Entries for vehicles that
/// arrive between cycles are left in place until the next replace.
#[derive(Debug, Clone, Default)]
pub struct PathCache {
    paths: HashMap<VehicleId, Path>,
}

impl PathCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every entry and route all moving vehicles against `graph`
    ///
    /// Vehicles are routed in parallel; each search only reads the shared
    /// graph. Returns the number of vehicles left without a path.
    pub fn recompute(&mut self, vehicles: &[Vehicle], graph: &RoutingGraph) -> usize {
        self.paths.clear();
        self.route(vehicles.iter().filter(|v| v.is_moving()), graph)
    }

    /// Route only the listed vehicles, keeping every other entry
    pub fn repath(&mut self, ids: &[VehicleId], vehicles: &[Vehicle], graph: &RoutingGraph) -> usize {
        self.route(
            vehicles
                .iter()
                .filter(|v| v.is_moving() && ids.contains(&v.id)),
            graph,
        )
    }

    fn route<'a>(
        &mut self,
        vehicles: impl Iterator<Item = &'a Vehicle>,
        graph: &RoutingGraph,
    ) -> usize {
        let requests: Vec<(VehicleId, Cell, Cell)> = vehicles
            .map(|v| (v.id, v.position(), v.destination()))
            .collect();

        let routed: Vec<(VehicleId, Path)> = requests
            .par_iter()
            .map(|(id, start, end)| (*id, graph.find_path(*start, *end)))
            .collect();

        let mut unreachable = 0;
        for (id, path) in routed {
            if path.is_empty() {
                debug!("Vehicle {} has no route to its destination", id);
                self.paths.remove(&id);
                unreachable += 1;
            } else {
                self.paths.insert(id, path);
            }
        }

        if unreachable > 0 {
            warn!("{} vehicle(s) have no reachable destination", unreachable);
        }
        unreachable
    }

    pub fn get(&self, id: VehicleId) -> Option<&Path> {
        self.paths.get(&id)
    }

    pub fn insert(&mut self, id: VehicleId, path: Path) {
        self.paths.insert(id, path);
    }

    /// Forget a vehicle's path so it stalls until it is routed again
    pub fn invalidate(&mut self, id: VehicleId) -> Option<Path> {
        self.paths.remove(&id)
    }

    pub fn contains(&self, id: VehicleId) -> bool {
        self.paths.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
