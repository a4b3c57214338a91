//! Per-tick vehicle history output
//!
//! The simulation emits one `SnapshotRow` per vehicle per tick into a
//! `HistorySink`. The CSV sink writes the same columns the downstream
//! analysis reads: `tick,car_id,x,y,status,ticks_traveled,distance_to_dest,
//! speed,local_congestion`.

use std::fs::File;
use std::path::Path;

use csv::Writer;
use thiserror::Error;

use super::congestion::CongestionMap;
use super::types::{Cell, VehicleId, VehicleStatus};
use super::vehicle::Vehicle;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("history sink already finished")]
    Finished,
}

pub type HistoryResult<T> = Result<T, HistoryError>;

/// One vehicle's state at the end of a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotRow {
    pub tick: u32,
    pub vehicle_id: VehicleId,
    pub x: usize,
    pub y: usize,
    pub status: VehicleStatus,
    pub ticks_traveled: u32,
    pub distance_to_dest: usize,
    pub speed: u32,
    /// Pre-move congestion count at the vehicle's post-move cell
    pub local_congestion: u32,
}

impl SnapshotRow {
    pub fn capture(tick: u32, vehicle: &Vehicle, congestion: &CongestionMap) -> Self {
        Self {
            tick,
            vehicle_id: vehicle.id,
            x: vehicle.x,
            y: vehicle.y,
            status: vehicle.status,
            ticks_traveled: vehicle.ticks_traveled,
            distance_to_dest: vehicle.distance_to_dest,
            speed: vehicle.speed,
            local_congestion: congestion.get(vehicle.position()),
        }
    }

    pub fn cell(&self) -> Cell {
        Cell::new(self.x, self.y)
    }
}

/// Append-only destination for snapshot rows
pub trait HistorySink {
    /// Append one tick's rows
    fn write_rows(&mut self, rows: &[SnapshotRow]) -> HistoryResult<()>;

    /// Flush and close. Safe to call more than once.
    fn finish(&mut self) -> HistoryResult<()>;
}

/// Writes snapshot rows to a CSV file
pub struct CsvHistorySink {
    writer: Writer<File>,
    rows_written: usize,
    finished: bool,
}

impl CsvHistorySink {
    /// Create (or truncate) the file at `path` and write the header row
    pub fn create(path: &Path) -> HistoryResult<Self> {
        let mut writer = Writer::from_path(path)?;
        writer.write_record([
            "tick",
            "car_id",
            "x",
            "y",
            "status",
            "ticks_traveled",
            "distance_to_dest",
            "speed",
            "local_congestion",
        ])?;

        Ok(Self {
            writer,
            rows_written: 0,
            finished: false,
        })
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }
}

impl HistorySink for CsvHistorySink {
    fn write_rows(&mut self, rows: &[SnapshotRow]) -> HistoryResult<()> {
        if self.finished {
            return Err(HistoryError::Finished);
        }
        for row in rows {
            self.writer.write_record(&[
                row.tick.to_string(),
                row.vehicle_id.0.to_string(),
                row.x.to_string(),
                row.y.to_string(),
                row.status.as_str().to_string(),
                row.ticks_traveled.to_string(),
                row.distance_to_dest.to_string(),
                row.speed.to_string(),
                row.local_congestion.to_string(),
            ])?;
        }
        self.rows_written += rows.len();
        Ok(())
    }

    fn finish(&mut self) -> HistoryResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.writer.flush()?;
        Ok(())
    }
}

/// Keeps every row in memory
#[derive(Debug, Default)]
pub struct MemoryHistorySink {
    rows: Vec<SnapshotRow>,
    finished: bool,
}

impl MemoryHistorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[SnapshotRow] {
        &self.rows
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Rows emitted for one tick
    pub fn rows_for_tick(&self, tick: u32) -> impl Iterator<Item = &SnapshotRow> {
        self.rows.iter().filter(move |row| row.tick == tick)
    }
}

impl HistorySink for MemoryHistorySink {
    fn write_rows(&mut self, rows: &[SnapshotRow]) -> HistoryResult<()> {
        if self.finished {
            return Err(HistoryError::Finished);
        }
        self.rows.extend_from_slice(rows);
        Ok(())
    }

    fn finish(&mut self) -> HistoryResult<()> {
        self.finished = true;
        Ok(())
    }
}
