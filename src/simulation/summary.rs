//! End-of-run statistics

use log::info;
use std::collections::BTreeMap;

use super::history::SnapshotRow;
use super::types::Cell;
use super::vehicle::Vehicle;

#[derive(Debug, Clone, Copy, Default)]
struct Mean {
    sum: u64,
    count: u64,
}

impl Mean {
    fn add(&mut self, value: u32) {
        self.sum += u64::from(value);
        self.count += 1;
    }

    fn value(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum as f64 / self.count as f64
        }
    }
}

/// Running mean of local congestion, per tick and per cell, over every
/// emitted snapshot row
#[derive(Debug, Clone, Default)]
pub struct CongestionStats {
    per_tick: BTreeMap<u32, Mean>,
    per_cell: BTreeMap<Cell, Mean>,
}

impl CongestionStats {
    pub fn record(&mut self, rows: &[SnapshotRow]) {
        for row in rows {
            self.per_tick.entry(row.tick).or_default().add(row.local_congestion);
            self.per_cell.entry(row.cell()).or_default().add(row.local_congestion);
        }
    }

    /// Tick with the highest mean local congestion (earliest on ties)
    pub fn busiest_tick(&self) -> Option<u32> {
        arg_max(&self.per_tick)
    }

    /// Cell with the highest mean local congestion (lowest `(x, y)` on ties)
    pub fn hotspot(&self) -> Option<Cell> {
        arg_max(&self.per_cell)
    }
}

fn arg_max<K: Copy>(means: &BTreeMap<K, Mean>) -> Option<K> {
    let mut best: Option<(K, f64)> = None;
    for (key, mean) in means {
        let value = mean.value();
        if best.map_or(true, |(_, best_value)| value > best_value) {
            best = Some((*key, value));
        }
    }
    best.map(|(key, _)| key)
}

/// Outcome of a finished (or stopped) run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub ticks_run: u32,
    pub total_vehicles: usize,
    pub arrived: usize,
    pub still_moving: usize,
    pub avg_trip_ticks: Option<f64>,
    pub shortest_trip: Option<u32>,
    pub longest_trip: Option<u32>,
    pub busiest_tick: Option<u32>,
    pub hotspot: Option<Cell>,
}

impl RunSummary {
    pub fn new(ticks_run: u32, vehicles: &[Vehicle], stats: &CongestionStats) -> Self {
        let trips: Vec<u32> = vehicles
            .iter()
            .filter(|v| v.has_arrived())
            .map(|v| v.ticks_traveled)
            .collect();

        let avg_trip_ticks = (!trips.is_empty())
            .then(|| trips.iter().map(|t| f64::from(*t)).sum::<f64>() / trips.len() as f64);

        Self {
            ticks_run,
            total_vehicles: vehicles.len(),
            arrived: trips.len(),
            still_moving: vehicles.iter().filter(|v| v.is_moving()).count(),
            avg_trip_ticks,
            shortest_trip: trips.iter().copied().min(),
            longest_trip: trips.iter().copied().max(),
            busiest_tick: stats.busiest_tick(),
            hotspot: stats.hotspot(),
        }
    }

    /// Share of vehicles that reached their destination, in percent
    pub fn arrival_rate(&self) -> f64 {
        if self.total_vehicles == 0 {
            0.0
        } else {
            self.arrived as f64 / self.total_vehicles as f64 * 100.0
        }
    }

    pub fn log(&self) {
        info!("=== SIMULATION COMPLETE ===");
        info!("Ticks run: {}", self.ticks_run);
        info!("Total vehicles: {}", self.total_vehicles);
        info!("Arrived: {} ({:.1}%)", self.arrived, self.arrival_rate());
        info!("Still moving: {}", self.still_moving);
        if let (Some(avg), Some(shortest), Some(longest)) =
            (self.avg_trip_ticks, self.shortest_trip, self.longest_trip)
        {
            info!("Avg trip length: {:.1} ticks", avg);
            info!("Shortest trip: {} ticks", shortest);
            info!("Longest trip: {} ticks", longest);
        }
        if let Some(tick) = self.busiest_tick {
            info!("Busiest tick: {}", tick);
        }
        if let Some(cell) = self.hotspot {
            info!("Congestion hotspot: cell {}", cell);
        }
    }
}
